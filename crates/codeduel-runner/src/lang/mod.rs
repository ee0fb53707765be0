//! Per-language strategies. Each supported language implements
//! [`LanguageStrategy`]; [`strategy_for`] is the only dispatch point.

mod c;
mod cpp;
mod go;
mod javascript;
mod python;
mod rust;
pub mod scan;

use codeduel_core::Language;

pub use scan::{classify, Scalar, ValueKind};

/// The located entry-function declaration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntryPoint {
    pub name: String,
    /// Raw text between the declaration's parentheses.
    pub params: String,
    /// Declared return type, for languages that spell one out.
    pub returns: Option<String>,
}

/// Source fragments turning one raw input into one call argument.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Conversion {
    pub statements: Vec<String>,
    pub expression: String,
}

impl Conversion {
    pub fn new(statements: Vec<String>, expression: impl Into<String>) -> Self {
        Self {
            statements,
            expression: expression.into(),
        }
    }

    /// One statement binding `arg{index}`, passed by value.
    pub fn bind(statement: String, index: usize) -> Self {
        Self::new(vec![statement], format!("arg{index}"))
    }
}

/// Everything a template needs to render a wrapped program.
pub struct ProgramParts<'a> {
    pub source: &'a str,
    pub entry: &'a EntryPoint,
    pub conversions: &'a [Conversion],
}

impl ProgramParts<'_> {
    pub fn statements(&self, indent: &str) -> String {
        self.conversions
            .iter()
            .flat_map(|c| c.statements.iter())
            .map(|s| format!("{indent}{s}"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn arguments(&self) -> String {
        self.conversions
            .iter()
            .map(|c| c.expression.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn call(&self) -> String {
        format!("{}({})", self.entry.name, self.arguments())
    }
}

pub trait LanguageStrategy: Send + Sync {
    fn language(&self) -> Language;

    /// First entry-function declaration in `source`.
    fn locate_entry_point(&self, source: &str) -> Option<EntryPoint>;

    /// Declared parameter types in order; `"any"` where none is spelled out.
    fn extract_parameter_types(&self, entry: &EntryPoint) -> Vec<String>;

    /// Source already owns process control (its own `main`) and runs as-is.
    fn defines_program_entry(&self, _source: &str) -> bool {
        false
    }

    /// Conversion rule for the parameter at `index` declared as `tag`.
    fn convert(&self, tag: &str, index: usize) -> Conversion;

    fn render(&self, parts: &ProgramParts<'_>) -> String;
}

static PYTHON: python::Python = python::Python;
static JAVASCRIPT: javascript::JavaScript = javascript::JavaScript;
static C: c::C = c::C;
static CPP: cpp::Cpp = cpp::Cpp;
static RUST: rust::Rust = rust::Rust;
static GO: go::Go = go::Go;

pub fn strategy_for(language: Language) -> &'static dyn LanguageStrategy {
    match language {
        Language::Python => &PYTHON,
        Language::JavaScript => &JAVASCRIPT,
        Language::C => &C,
        Language::Cpp => &CPP,
        Language::Rust => &RUST,
        Language::Go => &GO,
    }
}
