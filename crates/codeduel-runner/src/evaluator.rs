use std::pin::pin;
use std::sync::Arc;

use codeduel_core::{
    EvaluationError, EvaluationEvent, EvaluationReport, EvaluatorConfig, ExecutionError,
    ExecutionRequest, Language, Submission, TestCase, TestReport, WrappedProgram,
};
use futures::{stream, Stream, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::comparator::compare;
use crate::sandbox::Sandbox;
use crate::{signature, wrapper};

/// Runs a candidate solution against a task's test cases.
pub struct Evaluator {
    sandbox: Arc<dyn Sandbox>,
    config: EvaluatorConfig,
}

/// Wrapping error carried to every test of the batch.
struct WrapFailure {
    message: String,
    kind: &'static str,
}

struct Prepared {
    language: Language,
    caller: String,
    program: Result<WrappedProgram, WrapFailure>,
}

impl Evaluator {
    pub fn new(sandbox: Arc<dyn Sandbox>, config: EvaluatorConfig) -> Self {
        Self { sandbox, config }
    }

    pub async fn evaluate(
        &self,
        submission: &Submission,
        tests: &[TestCase],
    ) -> Result<EvaluationReport, EvaluationError> {
        let prepared = self.prepare(submission, tests)?;
        let results: Vec<TestReport> = self.reports(&prepared, tests).collect().await;

        let report = EvaluationReport::from_results(results);
        info!(
            language = %submission.language,
            total = report.total,
            passed = report.passed,
            "Evaluation finished"
        );
        Ok(report)
    }

    /// Same as [`evaluate`](Self::evaluate), also sending progress events.
    /// A closed receiver does not stop the evaluation.
    pub async fn evaluate_streaming(
        &self,
        submission: &Submission,
        tests: &[TestCase],
        tx: mpsc::Sender<EvaluationEvent>,
    ) -> Result<EvaluationReport, EvaluationError> {
        let prepared = self.prepare(submission, tests)?;
        let total = tests.len() as u32;
        let _ = tx.send(EvaluationEvent::Started { total }).await;

        let mut results = Vec::with_capacity(tests.len());
        let mut reports = pin!(self.reports(&prepared, tests));
        while let Some(report) = reports.next().await {
            let _ = tx
                .send(EvaluationEvent::TestResult {
                    test_num: results.len() as u32 + 1,
                    test_total: total,
                    report: report.clone(),
                })
                .await;
            results.push(report);
        }

        let report = EvaluationReport::from_results(results);
        let _ = tx
            .send(EvaluationEvent::Done {
                total: report.total,
                passed: report.passed,
                verified_solution: report.verified_solution,
            })
            .await;
        Ok(report)
    }

    fn prepare(&self, submission: &Submission, tests: &[TestCase]) -> Result<Prepared, EvaluationError> {
        if submission.candidate_code.trim().is_empty() {
            return Err(EvaluationError::MissingCandidate);
        }
        if tests.is_empty() {
            return Err(EvaluationError::NoTestCases);
        }

        let language = submission.language;
        let signature_source = submission
            .reference_code
            .as_deref()
            .filter(|code| !code.trim().is_empty())
            .unwrap_or(&submission.candidate_code);
        let signature = signature::extract(language, signature_source);

        let program = wrapper::wrap(language, &submission.candidate_code, &signature).map_err(|e| {
            warn!(%language, "Cannot wrap candidate: {}", e);
            WrapFailure {
                message: e.to_string(),
                kind: e.kind(),
            }
        });

        Ok(Prepared {
            language,
            caller: submission.caller.clone(),
            program,
        })
    }

    /// Reports in test order, at most `concurrency` runs in flight.
    fn reports<'a>(
        &'a self,
        prepared: &'a Prepared,
        tests: &'a [TestCase],
    ) -> impl Stream<Item = TestReport> + 'a {
        stream::iter(tests.iter().map(move |test| self.run_test(prepared, test)))
            .buffered(self.config.concurrency.max(1))
    }

    async fn run_test(&self, prepared: &Prepared, test: &TestCase) -> TestReport {
        let mut report = TestReport {
            test_id: test.id,
            input: test.input.clone(),
            expected: test.expected.clone(),
            actual: None,
            passed: false,
            error: None,
            error_kind: None,
            strategy: None,
            execution_time_ms: 0.0,
        };

        let program = match &prepared.program {
            Ok(program) => program.clone(),
            Err(failure) => {
                report.error = Some(failure.message.clone());
                report.error_kind = Some(failure.kind.to_string());
                return report;
            }
        };

        let request = ExecutionRequest::new(
            prepared.language,
            program,
            test.input.clone(),
            prepared.caller.clone(),
        );
        let output = self.sandbox.run(request).await.and_then(|result| {
            report.execution_time_ms = result.wall_time_ms;
            result.into_output()
        });

        match output {
            Ok(actual) => {
                let outcome = compare(&test.expected, &actual);
                report.passed = outcome.passed;
                report.strategy = Some(outcome.strategy);
                report.actual = Some(actual);
            }
            Err(e) => record_error(&mut report, e),
        }

        debug!(test_id = ?test.id, passed = report.passed, "Test case evaluated");
        report
    }
}

fn record_error(report: &mut TestReport, error: ExecutionError) {
    report.error_kind = Some(error.kind().to_string());
    report.error = Some(error.to_string());
}
