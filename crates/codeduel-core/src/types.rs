use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{EvaluationError, ExecutionError};
use crate::Language;

// =============================================================================
// Signature & programs
// =============================================================================

/// Ordered parameter type tags of an entry function. `"any"` marks a
/// position whose type could not be inferred.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterSignature(Vec<String>);

impl ParameterSignature {
    pub const ANY: &'static str = "any";

    pub fn new(types: Vec<String>) -> Self {
        Self(types)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn types(&self) -> &[String] {
        &self.0
    }
}

impl From<Vec<String>> for ParameterSignature {
    fn from(types: Vec<String>) -> Self {
        Self(types)
    }
}

impl<'a> From<Vec<&'a str>> for ParameterSignature {
    fn from(types: Vec<&'a str>) -> Self {
        Self(types.into_iter().map(str::to_string).collect())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrappedProgram {
    pub source: String,
    pub file_name: String,
}

impl WrappedProgram {
    pub fn new(source: String, language: Language) -> Self {
        Self {
            source,
            file_name: language.profile().file_name.to_string(),
        }
    }
}

// =============================================================================
// Execution
// =============================================================================

#[derive(Clone, Debug)]
pub struct ExecutionRequest {
    /// Unique per execution; names the workspace and the container.
    pub id: Uuid,
    pub language: Language,
    pub program: WrappedProgram,
    pub stdin: String,
    /// Caller identity. Recorded for tracing only, never used for paths.
    pub isolation_key: String,
}

impl ExecutionRequest {
    pub fn new(
        language: Language,
        program: WrappedProgram,
        stdin: impl Into<String>,
        isolation_key: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            language,
            program,
            stdin: stdin.into(),
            isolation_key: isolation_key.into(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "code", rename_all = "snake_case")]
pub enum ExecutionStatus {
    Exited(i32),
    CompileFailed(i32),
    TimedOut,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub stdout: String,
    pub stderr: String,
    pub status: ExecutionStatus,
    pub wall_time_ms: f64,
    /// Configured limit, reported back on timeout.
    pub timeout_ms: u64,
}

impl ExecutionResult {
    pub fn success(&self) -> bool {
        self.status == ExecutionStatus::Exited(0)
    }

    pub fn timed_out(&self) -> bool {
        self.status == ExecutionStatus::TimedOut
    }

    /// Classifies the run: trimmed stdout on success, otherwise the matching failure.
    pub fn into_output(self) -> Result<String, ExecutionError> {
        match self.status {
            ExecutionStatus::Exited(0) => Ok(self.stdout.trim().to_string()),
            ExecutionStatus::Exited(code) => Err(ExecutionError::RuntimeFailure(failure_message(
                &self.stderr,
                code,
            ))),
            ExecutionStatus::CompileFailed(code) => Err(ExecutionError::CompileFailure(
                failure_message(&self.stderr, code),
            )),
            ExecutionStatus::TimedOut => Err(ExecutionError::Timeout(self.timeout_ms)),
        }
    }
}

fn failure_message(stderr: &str, code: i32) -> String {
    match stderr.trim() {
        "" if code == 137 => format!("Container exited with code {code} (killed, memory limit exceeded?)"),
        "" => format!("Container exited with code {code}"),
        msg => msg.to_string(),
    }
}

// =============================================================================
// Test cases & comparison
// =============================================================================

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestKind {
    #[default]
    Sample,
    Hidden,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub input: String,
    #[serde(alias = "output")]
    pub expected: String,
    #[serde(default)]
    pub kind: TestKind,
}

impl TestCase {
    pub fn sample(input: impl Into<String>, expected: impl Into<String>) -> Self {
        Self {
            id: None,
            input: input.into(),
            expected: expected.into(),
            kind: TestKind::Sample,
        }
    }

    pub fn hidden(input: impl Into<String>, expected: impl Into<String>) -> Self {
        Self {
            kind: TestKind::Hidden,
            ..Self::sample(input, expected)
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComparisonStrategy {
    Structured,
    Numeric,
    Text,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonOutcome {
    pub passed: bool,
    pub strategy: ComparisonStrategy,
}

// =============================================================================
// Submissions & reports
// =============================================================================

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Submission {
    pub language: Language,
    pub candidate_code: String,
    /// Task's reference solution, the source of the parameter signature.
    #[serde(default)]
    pub reference_code: Option<String>,
    #[serde(default)]
    pub caller: String,
}

impl Submission {
    /// Builds a submission from the store's raw language tag.
    pub fn new(
        language_tag: &str,
        candidate_code: impl Into<String>,
        reference_code: Option<String>,
        caller: impl Into<String>,
    ) -> Result<Self, EvaluationError> {
        let language = language_tag
            .parse::<Language>()
            .map_err(|_| EvaluationError::UnsupportedLanguage(language_tag.to_string()))?;

        Ok(Self {
            language,
            candidate_code: candidate_code.into(),
            reference_code,
            caller: caller.into(),
        })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TestReport {
    pub test_id: Option<i64>,
    pub input: String,
    pub expected: String,
    pub actual: Option<String>,
    pub passed: bool,
    pub error: Option<String>,
    #[serde(default)]
    pub error_kind: Option<String>,
    #[serde(default)]
    pub strategy: Option<ComparisonStrategy>,
    #[serde(default)]
    pub execution_time_ms: f64,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub total: u32,
    pub passed: u32,
    /// Every test passed: the collaborator should record a verified solution.
    pub verified_solution: bool,
    pub results: Vec<TestReport>,
}

impl EvaluationReport {
    pub fn from_results(results: Vec<TestReport>) -> Self {
        let total = results.len() as u32;
        let passed = results.iter().filter(|r| r.passed).count() as u32;
        Self {
            total,
            passed,
            verified_solution: total > 0 && passed == total,
            results,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EvaluationEvent {
    Started { total: u32 },
    TestResult { test_num: u32, test_total: u32, report: TestReport },
    Done { total: u32, passed: u32, verified_solution: bool },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(status: ExecutionStatus, stdout: &str, stderr: &str) -> ExecutionResult {
        ExecutionResult {
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            status,
            wall_time_ms: 1.0,
            timeout_ms: 10_000,
        }
    }

    #[test]
    fn test_into_output_trims_stdout() {
        let out = result(ExecutionStatus::Exited(0), "7\n", "").into_output().unwrap();
        assert_eq!(out, "7");
    }

    #[test]
    fn test_nonzero_exit_uses_stderr() {
        let err = result(ExecutionStatus::Exited(1), "", "Traceback: boom\n")
            .into_output()
            .unwrap_err();
        assert!(matches!(err, ExecutionError::RuntimeFailure(msg) if msg == "Traceback: boom"));
    }

    #[test]
    fn test_nonzero_exit_generic_message() {
        let err = result(ExecutionStatus::Exited(3), "", "  ").into_output().unwrap_err();
        assert_eq!(err.to_string(), "Container exited with code 3");
    }

    #[test]
    fn test_compile_and_timeout_are_distinct() {
        let compile = result(ExecutionStatus::CompileFailed(1), "", "error: x")
            .into_output()
            .unwrap_err();
        assert!(matches!(compile, ExecutionError::CompileFailure(_)));

        let timeout = result(ExecutionStatus::TimedOut, "", "").into_output().unwrap_err();
        assert!(matches!(timeout, ExecutionError::Timeout(10_000)));
    }

    #[test]
    fn test_report_tally() {
        let report_for = |passed| TestReport {
            test_id: None,
            input: String::new(),
            expected: String::new(),
            actual: None,
            passed,
            error: None,
            error_kind: None,
            strategy: None,
            execution_time_ms: 0.0,
        };
        let report = EvaluationReport::from_results(vec![report_for(true), report_for(false)]);
        assert_eq!((report.total, report.passed), (2, 1));
        assert!(!report.verified_solution);

        let empty = EvaluationReport::from_results(vec![]);
        assert!(!empty.verified_solution);
    }

    #[test]
    fn test_case_accepts_output_alias() {
        let tc: TestCase = serde_json::from_str(r#"{"input": "3 4", "output": "7"}"#).unwrap();
        assert_eq!(tc.expected, "7");
        assert_eq!(tc.kind, TestKind::Sample);
    }

    #[test]
    fn test_submission_rejects_unknown_language() {
        let err = Submission::new("brainfuck", "x", None, "u1").unwrap_err();
        assert!(matches!(err, EvaluationError::UnsupportedLanguage(tag) if tag == "brainfuck"));
    }
}
