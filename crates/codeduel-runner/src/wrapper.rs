use codeduel_core::{ExecutionError, Language, ParameterSignature, Result, WrappedProgram};

use crate::lang::{strategy_for, ProgramParts};

/// Builds a self-contained program around the entry function: read stdin,
/// convert each argument in signature order, call, print the result.
///
/// Compiled sources that already define their own `main` are kept as they are.
pub fn wrap(language: Language, source: &str, signature: &ParameterSignature) -> Result<WrappedProgram> {
    let strategy = strategy_for(language);

    if strategy.defines_program_entry(source) {
        tracing::debug!(%language, "Source defines its own entry point, embedding unmodified");
        return Ok(WrappedProgram::new(source.to_string(), language));
    }

    let entry = strategy
        .locate_entry_point(source)
        .ok_or(ExecutionError::NoEntryPoint(language))?;

    let declared = strategy.extract_parameter_types(&entry).len();
    if declared != signature.len() {
        return Err(ExecutionError::ArityMismatch {
            expected: signature.len(),
            found: declared,
        });
    }

    let conversions: Vec<_> = signature
        .iter()
        .enumerate()
        .map(|(index, tag)| strategy.convert(tag, index))
        .collect();

    let program = strategy.render(&ProgramParts {
        source,
        entry: &entry,
        conversions: &conversions,
    });

    tracing::debug!(%language, function = %entry.name, params = signature.len(), "Wrapped program");
    Ok(WrappedProgram::new(program, language))
}
