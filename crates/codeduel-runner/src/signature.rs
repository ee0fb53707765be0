use codeduel_core::{Language, ParameterSignature};

use crate::lang::strategy_for;

/// Infers the entry function's parameter types.
///
/// Never fails: source without a recognisable entry function yields an empty
/// signature. Wrapping is where a missing entry point becomes an error.
pub fn extract(language: Language, source: &str) -> ParameterSignature {
    let strategy = strategy_for(language);
    match strategy.locate_entry_point(source) {
        Some(entry) => {
            let types = strategy.extract_parameter_types(&entry);
            tracing::debug!(%language, function = %entry.name, ?types, "Extracted signature");
            ParameterSignature::new(types)
        }
        None => {
            tracing::debug!(%language, "No entry function found, empty signature");
            ParameterSignature::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_python_signature() {
        let sig = extract(Language::Python, "def add(a: int, b: int):\n    return a + b");
        assert_eq!(sig, ParameterSignature::from(vec!["int", "int"]));
    }

    #[test]
    fn test_javascript_signature_is_any() {
        let sig = extract(Language::JavaScript, "function add(a, b) { return a + b; }");
        assert_eq!(sig, ParameterSignature::from(vec!["any", "any"]));
    }

    #[test]
    fn test_typed_languages() {
        assert_eq!(
            extract(Language::C, "int sum(int arr[], int n) {\n  return 0;\n}").types(),
            ["int[]", "int"]
        );
        assert_eq!(
            extract(Language::Rust, "fn sum(v: &[i32]) -> i32 {\n    v.iter().sum()\n}").types(),
            ["&[i32]"]
        );
        assert_eq!(
            extract(Language::Go, "func add(a, b int) int {\n\treturn a + b\n}").types(),
            ["int", "int"]
        );
        assert_eq!(
            extract(Language::Cpp, "std::vector<int> twice(std::vector<int> v) {\n  return v;\n}").types(),
            ["std::vector<int>"]
        );
    }

    #[test]
    fn test_missing_function_is_empty() {
        for &lang in Language::all() {
            assert!(extract(lang, "   ").is_empty());
        }
        assert!(extract(Language::Python, "print(input())").is_empty());
    }

    #[test]
    fn test_extract_is_idempotent() {
        let src = "def f(xs: list[int], k: int = 2):\n    return xs[:k]";
        assert_eq!(extract(Language::Python, src), extract(Language::Python, src));
    }
}
