use std::sync::Arc;

use async_stream::stream;
use codeduel_core::{ExecutionRequest, GeneratorConfig, Language, ParameterSignature, TestCase};
use futures::Stream;
use rand::distr::Alphabetic;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use crate::lang::{classify, Scalar, ValueKind};
use crate::sandbox::Sandbox;
use crate::{signature, wrapper};

/// Produces hidden test cases by running the reference solution on random
/// inputs shaped by its parameter signature.
pub struct HiddenTestGenerator {
    sandbox: Arc<dyn Sandbox>,
    config: GeneratorConfig,
}

impl HiddenTestGenerator {
    pub fn new(sandbox: Arc<dyn Sandbox>, config: GeneratorConfig) -> Self {
        Self { sandbox, config }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Lazily yields at most `attempts` hidden tests; attempts whose run
    /// fails are skipped. A reference that cannot be wrapped yields nothing.
    pub fn generate(
        &self,
        language: Language,
        reference: String,
        attempts: usize,
    ) -> impl Stream<Item = TestCase> + '_ {
        stream! {
            let signature = signature::extract(language, &reference);
            let program = match wrapper::wrap(language, &reference, &signature) {
                Ok(program) => program,
                Err(e) => {
                    warn!(%language, "Cannot wrap reference solution: {}", e);
                    return;
                }
            };

            let mut rng = match self.config.seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_os_rng(),
            };

            info!(%language, attempts, params = signature.len(), "Generating hidden tests");
            let mut produced = 0usize;
            for attempt in 0..attempts {
                let input = synthesize_input(&signature, &mut rng);
                let request = ExecutionRequest::new(
                    language,
                    program.clone(),
                    input.clone(),
                    self.config.isolation_key.clone(),
                );
                match self.sandbox.execute(request).await {
                    Ok(output) => {
                        produced += 1;
                        debug!(attempt, "Generated hidden test");
                        yield TestCase::hidden(input, output);
                    }
                    Err(e) => warn!(attempt, kind = e.kind(), "Skipping generated input: {}", e),
                }
            }
            info!(%language, produced, attempts, "Hidden test generation finished");
        }
    }

    /// Collects [`generate`](Self::generate) with the configured attempt count.
    pub async fn generate_all(&self, language: Language, reference: String) -> Vec<TestCase> {
        use futures::StreamExt;

        self.generate(language, reference, self.config.attempts)
            .collect()
            .await
    }
}

/// One line per parameter. Sequences are space-separated on their own line.
pub fn synthesize_input<R: Rng>(signature: &ParameterSignature, rng: &mut R) -> String {
    signature
        .iter()
        .map(|tag| synthesize_value(tag, rng))
        .collect::<Vec<_>>()
        .join("\n")
}

fn synthesize_value<R: Rng>(tag: &str, rng: &mut R) -> String {
    match classify(tag) {
        ValueKind::Scalar(Scalar::Int) => rng.random_range(-100..=100).to_string(),
        ValueKind::Scalar(Scalar::Float) => format!("{:.4}", rng.random_range(-10.0..=10.0)),
        ValueKind::Scalar(Scalar::Str) => word(rng),
        ValueKind::Scalar(Scalar::Bool) => rng.random_bool(0.5).to_string(),
        ValueKind::List(scalar) => {
            let len = rng.random_range(1..=5);
            (0..len)
                .map(|_| match scalar {
                    Scalar::Int => rng.random_range(1..=100).to_string(),
                    Scalar::Float => format!("{:.4}", rng.random_range(1.0..=100.0)),
                    Scalar::Bool => rng.random_bool(0.5).to_string(),
                    Scalar::Str => word(rng),
                })
                .collect::<Vec<_>>()
                .join(" ")
        }
        ValueKind::Opaque => rng.random_range(1..=100).to_string(),
    }
}

fn word<R: Rng>(rng: &mut R) -> String {
    let len = rng.random_range(1..=20);
    (0..len).map(|_| rng.sample(Alphabetic) as char).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use codeduel_core::{ExecutionError, ExecutionResult, ExecutionStatus, Result, TestKind};
    use futures::StreamExt;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Sums the integer tokens of its input; fails every `fail_every`-th run.
    struct SummingSandbox {
        runs: AtomicUsize,
        fail_every: usize,
    }

    impl SummingSandbox {
        fn new(fail_every: usize) -> Self {
            Self {
                runs: AtomicUsize::new(0),
                fail_every,
            }
        }
    }

    #[async_trait]
    impl Sandbox for SummingSandbox {
        async fn run(&self, request: ExecutionRequest) -> Result<ExecutionResult> {
            let n = self.runs.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail_every > 0 && n % self.fail_every == 0 {
                return Err(ExecutionError::RuntimeFailure("ZeroDivisionError".into()));
            }
            let sum: i64 = request
                .stdin
                .split_whitespace()
                .filter_map(|t| t.parse::<i64>().ok())
                .sum();
            Ok(ExecutionResult {
                stdout: format!("{sum}\n"),
                stderr: String::new(),
                status: ExecutionStatus::Exited(0),
                wall_time_ms: 1.0,
                timeout_ms: 10_000,
            })
        }
    }

    fn generator(sandbox: Arc<dyn Sandbox>, seed: Option<u64>) -> HiddenTestGenerator {
        let config = GeneratorConfig {
            seed,
            ..GeneratorConfig::default()
        };
        HiddenTestGenerator::new(sandbox, config)
    }

    const ADD: &str = "def add(a: int, b: int):\n    return a + b";

    #[test]
    fn test_scalar_ranges() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let n: i64 = synthesize_value("int", &mut rng).parse().unwrap();
            assert!((-100..=100).contains(&n));

            let f = synthesize_value("float", &mut rng);
            assert_eq!(f.split('.').nth(1).map(str::len), Some(4), "{f}");
            let f: f64 = f.parse().unwrap();
            assert!((-10.0..=10.0).contains(&f));

            let s = synthesize_value("str", &mut rng);
            assert!((1..=20).contains(&s.len()));
            assert!(s.chars().all(|c| c.is_ascii_alphabetic()));

            let b = synthesize_value("bool", &mut rng);
            assert!(b == "true" || b == "false");
        }
    }

    #[test]
    fn test_sequences_and_opaque() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..100 {
            let items: Vec<i64> = synthesize_value("list[int]", &mut rng)
                .split(' ')
                .map(|t| t.parse().unwrap())
                .collect();
            assert!((1..=5).contains(&items.len()));
            assert!(items.iter().all(|n| (1..=100).contains(n)));

            let opaque: i64 = synthesize_value("Matrix", &mut rng).parse().unwrap();
            assert!((1..=100).contains(&opaque));
        }
    }

    #[test]
    fn test_one_line_per_argument() {
        let mut rng = StdRng::seed_from_u64(3);
        let sig = ParameterSignature::from(vec!["Vec<i32>", "i32"]);
        let input = synthesize_input(&sig, &mut rng);
        assert_eq!(input.lines().count(), 2);
        assert!(!input.lines().nth(1).unwrap().contains(' '));

        assert_eq!(synthesize_input(&ParameterSignature::default(), &mut rng), "");
    }

    #[test]
    fn test_seed_is_reproducible() {
        let sig = ParameterSignature::from(vec!["int", "string", "double[]"]);
        let a = synthesize_input(&sig, &mut StdRng::seed_from_u64(42));
        let b = synthesize_input(&sig, &mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_generate_yields_hidden_tests() {
        let generator = generator(Arc::new(SummingSandbox::new(0)), Some(1));
        let tests: Vec<TestCase> = generator
            .generate(Language::Python, ADD.to_string(), 5)
            .collect()
            .await;

        assert_eq!(tests.len(), 5);
        for test in &tests {
            assert_eq!(test.kind, TestKind::Hidden);
            let sum: i64 = test.input.lines().map(|l| l.parse::<i64>().unwrap()).sum();
            assert_eq!(test.expected, sum.to_string());
        }
    }

    #[tokio::test]
    async fn test_failed_runs_are_skipped() {
        let generator = generator(Arc::new(SummingSandbox::new(2)), Some(1));
        let tests: Vec<TestCase> = generator
            .generate(Language::Python, ADD.to_string(), 6)
            .collect()
            .await;
        assert_eq!(tests.len(), 3);
    }

    #[tokio::test]
    async fn test_every_successful_attempt_yields() {
        let sandbox = Arc::new(SummingSandbox::new(0));
        let generator = generator(sandbox.clone(), Some(2));
        let tests: Vec<TestCase> = generator
            .generate(Language::Python, ADD.to_string(), 50)
            .collect()
            .await;
        assert_eq!(tests.len(), 50);
        assert_eq!(sandbox.runs.load(Ordering::SeqCst), 50);
    }

    #[tokio::test]
    async fn test_always_failing_reference_yields_nothing() {
        let sandbox = Arc::new(SummingSandbox::new(1));
        let generator = generator(sandbox.clone(), Some(2));
        let tests: Vec<TestCase> = generator
            .generate(Language::Python, ADD.to_string(), 50)
            .collect()
            .await;
        assert!(tests.is_empty());
        assert_eq!(sandbox.runs.load(Ordering::SeqCst), 50);
    }

    #[tokio::test]
    async fn test_unwrappable_reference_yields_nothing() {
        let sandbox = Arc::new(SummingSandbox::new(0));
        let generator = generator(sandbox.clone(), None);
        let tests: Vec<TestCase> = generator
            .generate(Language::Python, "print('no function')".to_string(), 10)
            .collect()
            .await;
        assert!(tests.is_empty());
        assert_eq!(sandbox.runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_generate_all_uses_configured_attempts() {
        let config = GeneratorConfig {
            attempts: 3,
            seed: Some(9),
            ..GeneratorConfig::default()
        };
        let generator = HiddenTestGenerator::new(Arc::new(SummingSandbox::new(0)), config);
        let tests = generator.generate_all(Language::Python, ADD.to_string()).await;
        assert_eq!(tests.len(), 3);
    }
}
