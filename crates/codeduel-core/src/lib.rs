// Domain modules
pub mod config;
pub mod error;
pub mod language;
pub mod types;

pub use config::{CodeDuelConfig, ConfigError, EvaluatorConfig, GeneratorConfig, SandboxConfig};
pub use error::{EvaluationError, ExecutionError, Result};
pub use language::{Language, LanguageProfile};
pub use types::{
    ComparisonOutcome, ComparisonStrategy, EvaluationEvent, EvaluationReport, ExecutionRequest,
    ExecutionResult, ExecutionStatus, ParameterSignature, Submission, TestCase, TestKind,
    TestReport, WrappedProgram,
};
