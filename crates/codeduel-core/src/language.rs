use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ExecutionError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    JavaScript,
    C,
    Cpp,
    Rust,
    Go,
}

/// How a language is staged and run inside its container.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LanguageProfile {
    pub image: &'static str,
    pub file_name: &'static str,
    pub compile: Option<&'static str>,
    pub run: &'static str,
}

impl LanguageProfile {
    /// Shell pipeline executed in the workspace: compile (if any), then run.
    pub fn pipeline(&self, compile_failed_marker: &str) -> String {
        match self.compile {
            Some(compile) => format!(
                "{compile} || {{ rc=$?; echo '{compile_failed_marker}' >&2; exit $rc; }}; {run}",
                run = self.run
            ),
            None => self.run.to_string(),
        }
    }
}

const PYTHON: LanguageProfile = LanguageProfile {
    image: "python:3.11-slim",
    file_name: "solution.py",
    compile: None,
    run: "python solution.py",
};

const JAVASCRIPT: LanguageProfile = LanguageProfile {
    image: "node:20-slim",
    file_name: "solution.js",
    compile: None,
    run: "node solution.js",
};

const C: LanguageProfile = LanguageProfile {
    image: "gcc:12",
    file_name: "solution.c",
    compile: Some("gcc solution.c -o solution"),
    run: "./solution",
};

const CPP: LanguageProfile = LanguageProfile {
    image: "gcc:12",
    file_name: "solution.cpp",
    compile: Some("g++ solution.cpp -o solution"),
    run: "./solution",
};

const RUST: LanguageProfile = LanguageProfile {
    image: "rust:1.72",
    file_name: "solution.rs",
    compile: Some("rustc solution.rs -o solution"),
    run: "./solution",
};

const GO: LanguageProfile = LanguageProfile {
    image: "golang:1.21",
    file_name: "solution.go",
    compile: None,
    run: "go run solution.go",
};

impl Language {
    pub fn label(&self) -> &'static str {
        match self {
            Language::Python => "Python",
            Language::JavaScript => "JavaScript",
            Language::C => "C",
            Language::Cpp => "C++",
            Language::Rust => "Rust",
            Language::Go => "Go",
        }
    }

    /// Canonical tag as stored by the task/submission store.
    pub fn tag(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::C => "c",
            Language::Cpp => "cpp",
            Language::Rust => "rust",
            Language::Go => "go",
        }
    }

    pub fn profile(&self) -> &'static LanguageProfile {
        match self {
            Language::Python => &PYTHON,
            Language::JavaScript => &JAVASCRIPT,
            Language::C => &C,
            Language::Cpp => &CPP,
            Language::Rust => &RUST,
            Language::Go => &GO,
        }
    }

    pub fn is_compiled(&self) -> bool {
        self.profile().compile.is_some()
    }

    pub fn all() -> &'static [Language] {
        &[
            Language::Python,
            Language::JavaScript,
            Language::C,
            Language::Cpp,
            Language::Rust,
            Language::Go,
        ]
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Language {
    type Err = ExecutionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "python" | "py" => Ok(Language::Python),
            "javascript" | "js" | "node" => Ok(Language::JavaScript),
            "c" => Ok(Language::C),
            "cpp" | "c++" => Ok(Language::Cpp),
            "rust" | "rs" => Ok(Language::Rust),
            "go" | "golang" => Ok(Language::Go),
            _ => Err(ExecutionError::UnsupportedLanguage(s.to_string())),
        }
    }
}
