use std::sync::LazyLock;

use codeduel_core::{Language, ParameterSignature};
use regex::Regex;

use super::scan::{find_top_level, matching_paren, split_top_level, strip_default};
use super::{classify, Conversion, EntryPoint, LanguageStrategy, ProgramParts, Scalar, ValueKind};

static DEF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*(?:async[ \t]+)?def[ \t]+([A-Za-z_]\w*)[ \t]*\(").unwrap()
});

pub struct Python;

impl LanguageStrategy for Python {
    fn language(&self) -> Language {
        Language::Python
    }

    fn locate_entry_point(&self, source: &str) -> Option<EntryPoint> {
        DEF.captures_iter(source).find_map(|caps| {
            let whole = caps.get(0)?;
            let open = whole.end() - 1;
            let close = matching_paren(source, open)?;
            let tail = &source[close + 1..];
            let colon = tail.find(':')?;
            let returns = tail[..colon]
                .trim()
                .strip_prefix("->")
                .map(|r| r.trim().to_string());
            Some(EntryPoint {
                name: caps[1].to_string(),
                params: source[open + 1..close].to_string(),
                returns,
            })
        })
    }

    fn extract_parameter_types(&self, entry: &EntryPoint) -> Vec<String> {
        split_top_level(&entry.params)
            .into_iter()
            .filter(|p| p != "*" && p != "/")
            .map(|param| {
                let colon = find_top_level(&param, ':');
                let eq = find_top_level(&param, '=');
                match colon {
                    Some(c) if eq.map_or(true, |e| c < e) => {
                        strip_default(&param[c + 1..]).to_string()
                    }
                    _ => ParameterSignature::ANY.to_string(),
                }
            })
            .collect()
    }

    fn convert(&self, tag: &str, index: usize) -> Conversion {
        let value = match classify(tag) {
            ValueKind::Scalar(Scalar::Int) => "int(_reader.token())".to_string(),
            ValueKind::Scalar(Scalar::Float) => "float(_reader.token())".to_string(),
            ValueKind::Scalar(Scalar::Bool) => "_reader.token().lower() == 'true'".to_string(),
            ValueKind::Scalar(Scalar::Str) | ValueKind::Opaque => "_reader.token()".to_string(),
            ValueKind::List(Scalar::Int) => "[int(x) for x in _reader.line().split()]".to_string(),
            ValueKind::List(Scalar::Float) => {
                "[float(x) for x in _reader.line().split()]".to_string()
            }
            ValueKind::List(Scalar::Bool) => {
                "[x.lower() == 'true' for x in _reader.line().split()]".to_string()
            }
            ValueKind::List(Scalar::Str) => "_reader.line().split()".to_string(),
        };
        Conversion::bind(format!("arg{index} = {value}"), index)
    }

    fn render(&self, parts: &ProgramParts<'_>) -> String {
        format!(
            r#"import sys

{code}


class _ArgReader:
    def __init__(self, text):
        self.lines = text.splitlines()
        self.row = 0
        self.col = 0

    def token(self):
        while self.row < len(self.lines):
            line = self.lines[self.row]
            while self.col < len(line) and line[self.col].isspace():
                self.col += 1
            if self.col < len(line):
                start = self.col
                while self.col < len(line) and not line[self.col].isspace():
                    self.col += 1
                return line[start:self.col]
            self.row += 1
            self.col = 0
        raise EOFError("not enough input tokens")

    def line(self):
        while self.row < len(self.lines):
            rest = self.lines[self.row][self.col:].strip()
            self.row += 1
            self.col = 0
            if rest:
                return rest
        return ""


if __name__ == "__main__":
    _reader = _ArgReader(sys.stdin.read())
{statements}
    _result = {call}
    print(_result)
"#,
            code = parts.source.trim_end(),
            statements = parts.statements("    "),
            call = parts.call(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn types(source: &str) -> Vec<String> {
        let entry = Python.locate_entry_point(source).unwrap();
        Python.extract_parameter_types(&entry)
    }

    #[test]
    fn test_annotated_parameters() {
        assert_eq!(types("def add(a: int, b: int):\n    return a + b"), vec!["int", "int"]);
    }

    #[test]
    fn test_defaults_and_missing_annotations() {
        assert_eq!(
            types("def f(a, b: float = 1.5, c=3, d: list[int] = []):\n    pass"),
            vec!["any", "float", "any", "list[int]"]
        );
    }

    #[test]
    fn test_multiline_generic_declaration() {
        let src = "from typing import Dict\n\ndef count(\n    words: List[str],\n    table: Dict[str, int],\n) -> int:\n    return 0\n";
        let entry = Python.locate_entry_point(src).unwrap();
        assert_eq!(entry.name, "count");
        assert_eq!(entry.returns.as_deref(), Some("int"));
        assert_eq!(Python.extract_parameter_types(&entry), vec!["List[str]", "Dict[str, int]"]);
    }

    #[test]
    fn test_keyword_only_marker_skipped() {
        assert_eq!(types("def f(a: int, *, b: str):\n    pass"), vec!["int", "str"]);
    }

    #[test]
    fn test_no_function() {
        assert!(Python.locate_entry_point("print(42)").is_none());
    }

    #[test]
    fn test_conversions() {
        assert_eq!(Python.convert("int", 0).statements, vec!["arg0 = int(_reader.token())"]);
        assert_eq!(
            Python.convert("list[int]", 2).statements,
            vec!["arg2 = [int(x) for x in _reader.line().split()]"]
        );
        assert_eq!(Python.convert("Widget", 1).statements, vec!["arg1 = _reader.token()"]);
    }

    #[test]
    fn test_render_calls_entry() {
        let source = "def add(a: int, b: int):\n    return a + b";
        let entry = Python.locate_entry_point(source).unwrap();
        let conversions = vec![Python.convert("int", 0), Python.convert("int", 1)];
        let program = Python.render(&ProgramParts {
            source,
            entry: &entry,
            conversions: &conversions,
        });
        assert!(program.starts_with("import sys\n\ndef add"));
        assert!(program.contains("    arg1 = int(_reader.token())\n"));
        assert!(program.contains("    _result = add(arg0, arg1)\n    print(_result)"));
    }
}
