use thiserror::Error;

use crate::Language;

/// Failure of a single wrap-and-execute attempt.
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("Function definition not found in {} code", .0.label())]
    NoEntryPoint(Language),

    #[error("Entry function declares {found} parameter(s) but the signature has {expected}")]
    ArityMismatch { expected: usize, found: usize },

    #[error("Compilation failed: {0}")]
    CompileFailure(String),

    #[error("{0}")]
    RuntimeFailure(String),

    #[error("Container execution timed out after {0}ms")]
    Timeout(u64),

    #[error("Workspace error: {0}")]
    Workspace(#[from] std::io::Error),

    #[error("Container error: {0}")]
    Container(String),
}

impl ExecutionError {
    /// Short machine-readable kind, recorded next to the message in reports.
    pub fn kind(&self) -> &'static str {
        match self {
            ExecutionError::UnsupportedLanguage(_) => "unsupported_language",
            ExecutionError::NoEntryPoint(_) => "no_entry_point",
            ExecutionError::ArityMismatch { .. } => "arity_mismatch",
            ExecutionError::CompileFailure(_) => "compile_failure",
            ExecutionError::RuntimeFailure(_) => "runtime_failure",
            ExecutionError::Timeout(_) => "timeout",
            ExecutionError::Workspace(_) => "workspace",
            ExecutionError::Container(_) => "container",
        }
    }
}

/// Submission-level problems raised to the caller instead of being recorded per test.
#[derive(Error, Debug)]
pub enum EvaluationError {
    #[error("Submission has no candidate code")]
    MissingCandidate,

    #[error("Task has no test cases")]
    NoTestCases,

    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),
}

pub type Result<T> = std::result::Result<T, ExecutionError>;
