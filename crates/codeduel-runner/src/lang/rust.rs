use std::sync::LazyLock;

use codeduel_core::Language;
use regex::Regex;

use super::scan::{element_type, find_top_level, matching_paren, split_top_level, strip_qualifiers};
use super::{classify, Conversion, EntryPoint, LanguageStrategy, ProgramParts, Scalar, ValueKind};

static FN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bfn\s+([A-Za-z_]\w*)\s*").unwrap());

static MAIN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bfn\s+main\s*\(").unwrap());

const PRELUDE: &str = r#"#[allow(dead_code)]
struct ArgReader {
    lines: Vec<String>,
    row: usize,
    col: usize,
}

#[allow(dead_code)]
impl ArgReader {
    fn from_stdin() -> ArgReader {
        let mut input = String::new();
        std::io::Read::read_to_string(&mut std::io::stdin(), &mut input).expect("cannot read stdin");
        ArgReader {
            lines: input.lines().map(|l| l.to_string()).collect(),
            row: 0,
            col: 0,
        }
    }

    fn token(&mut self) -> String {
        while self.row < self.lines.len() {
            let line = &self.lines[self.row];
            let rest = &line[self.col..];
            let trimmed = rest.trim_start();
            if !trimmed.is_empty() {
                let start = self.col + (rest.len() - trimmed.len());
                let end = trimmed.find(char::is_whitespace).map_or(line.len(), |i| start + i);
                let token = line[start..end].to_string();
                self.col = end;
                return token;
            }
            self.row += 1;
            self.col = 0;
        }
        panic!("not enough input tokens");
    }

    fn line(&mut self) -> String {
        while self.row < self.lines.len() {
            let rest = self.lines[self.row][self.col..].trim().to_string();
            self.row += 1;
            self.col = 0;
            if !rest.is_empty() {
                return rest;
            }
        }
        String::new()
    }

    fn parse<T: std::str::FromStr>(&mut self) -> T
    where
        T::Err: std::fmt::Debug,
    {
        self.token().parse().expect("malformed argument")
    }

    fn flag(&mut self) -> bool {
        self.token().eq_ignore_ascii_case("true")
    }

    fn list<T: std::str::FromStr>(&mut self) -> Vec<T>
    where
        T::Err: std::fmt::Debug,
    {
        self.line()
            .split_whitespace()
            .map(|w| w.parse().expect("malformed list element"))
            .collect()
    }

    fn flags(&mut self) -> Vec<bool> {
        self.line()
            .split_whitespace()
            .map(|w| w.eq_ignore_ascii_case("true"))
            .collect()
    }
}"#;

pub struct Rust;

/// How the parameter receives its converted value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Passing {
    Value,
    Shared,
    Exclusive,
}

impl Passing {
    fn of(tag: &str) -> Self {
        let t = tag.trim();
        if t.starts_with("&mut ") {
            Passing::Exclusive
        } else if t.starts_with('&') {
            // `&'a mut T`
            let after = t[1..].trim_start_matches(|c: char| c == '\'' || c.is_alphanumeric() || c == '_');
            if after.trim_start().starts_with("mut ") && t[1..].starts_with('\'') {
                Passing::Exclusive
            } else {
                Passing::Shared
            }
        } else {
            Passing::Value
        }
    }

    fn binding(self, index: usize) -> String {
        match self {
            Passing::Exclusive => format!("mut arg{index}"),
            _ => format!("arg{index}"),
        }
    }

    fn expression(self, index: usize) -> String {
        match self {
            Passing::Value => format!("arg{index}"),
            Passing::Shared => format!("&arg{index}"),
            Passing::Exclusive => format!("&mut arg{index}"),
        }
    }
}

/// Element type spelled the way a `Vec` needs it.
fn owned_element(tag: &str, scalar: Scalar) -> String {
    match scalar {
        Scalar::Str => "String".to_string(),
        Scalar::Bool => "bool".to_string(),
        Scalar::Int => element_type(tag).unwrap_or_else(|| "i64".to_string()),
        Scalar::Float => element_type(tag).unwrap_or_else(|| "f64".to_string()),
    }
}

/// Display for scalar results, Debug for everything else.
fn print_format(returns: &str) -> &'static str {
    let bare = strip_qualifiers(returns);
    match classify(returns) {
        ValueKind::Scalar(_) => "{}",
        _ if bare == "char" => "{}",
        _ => "{:?}",
    }
}

impl LanguageStrategy for Rust {
    fn language(&self) -> Language {
        Language::Rust
    }

    fn locate_entry_point(&self, source: &str) -> Option<EntryPoint> {
        FN.captures_iter(source).find_map(|caps| {
            let name = &caps[1];
            if name == "main" {
                return None;
            }

            let mut open = caps.get(0)?.end();
            if source[open..].starts_with('<') {
                open = skip_generics(source, open)?;
                open += source[open..].len() - source[open..].trim_start().len();
            }
            let close = matching_paren(source, open)?;

            let tail = source[close + 1..].trim_start();
            let returns = tail.strip_prefix("->").and_then(|after| {
                let end = after
                    .find(|c: char| c == '{' || c == ';')
                    .map(|i| after[..i].find(" where").unwrap_or(i))?;
                Some(after[..end].trim().to_string())
            });

            Some(EntryPoint {
                name: name.to_string(),
                params: source[open + 1..close].to_string(),
                returns,
            })
        })
    }

    fn extract_parameter_types(&self, entry: &EntryPoint) -> Vec<String> {
        split_top_level(&entry.params)
            .into_iter()
            .filter(|param| !is_receiver(param))
            .filter_map(|param| {
                let colon = find_top_level(&param, ':')?;
                Some(param[colon + 1..].trim().to_string())
            })
            .collect()
    }

    fn defines_program_entry(&self, source: &str) -> bool {
        MAIN.is_match(source)
    }

    fn convert(&self, tag: &str, index: usize) -> Conversion {
        let passing = Passing::of(tag);
        let binding = passing.binding(index);
        let expression = passing.expression(index);
        let inner = strip_qualifiers(tag);

        let statements = match classify(tag) {
            ValueKind::Scalar(Scalar::Int | Scalar::Float) => {
                vec![format!("let {binding}: {inner} = reader.parse();")]
            }
            ValueKind::Scalar(Scalar::Bool) => vec![format!("let {binding}: bool = reader.flag();")],
            ValueKind::Scalar(Scalar::Str) | ValueKind::Opaque => {
                vec![format!("let {binding}: String = reader.token();")]
            }
            ValueKind::List(Scalar::Bool) => {
                vec![format!("let {binding}: Vec<bool> = reader.flags();")]
            }
            ValueKind::List(Scalar::Str) if borrows_words(tag) => vec![
                format!("let words{index}: Vec<String> = reader.list();"),
                format!("let {binding}: Vec<&str> = words{index}.iter().map(|w| w.as_str()).collect();"),
            ],
            ValueKind::List(scalar) => {
                let elem = owned_element(tag, scalar);
                vec![format!("let {binding}: Vec<{elem}> = reader.list();")]
            }
        };
        Conversion::new(statements, expression)
    }

    fn render(&self, parts: &ProgramParts<'_>) -> String {
        let output = match parts.entry.returns.as_deref() {
            Some(returns) => format!(
                "let result = {call};\n    println!(\"{format}\", result);",
                call = parts.call(),
                format = print_format(returns),
            ),
            None => format!("{};", parts.call()),
        };
        format!(
            "{code}\n\n{PRELUDE}\n\nfn main() {{\n    #[allow(unused_mut, unused_variables)]\n    let mut reader = ArgReader::from_stdin();\n{statements}\n    {output}\n}}\n",
            code = parts.source.trim_end(),
            statements = parts.statements("    "),
        )
    }
}

/// Index just past the `>` closing the generic list opening at `open`.
fn skip_generics(source: &str, open: usize) -> Option<usize> {
    let mut depth = 0i32;
    let mut prev = ' ';
    for (i, c) in source[open..].char_indices() {
        match c {
            '<' => depth += 1,
            '>' if prev != '-' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + i + 1);
                }
            }
            _ => {}
        }
        prev = c;
    }
    None
}

fn is_receiver(param: &str) -> bool {
    let mut p = param.trim().trim_start_matches('&');
    if let Some(rest) = p.strip_prefix('\'') {
        p = rest.trim_start_matches(|c: char| c.is_alphanumeric() || c == '_');
    }
    let p = p.trim_start();
    let p = p.strip_prefix("mut ").unwrap_or(p).trim_start();
    p == "self" || p.starts_with("self:") || p.starts_with("self :")
}

/// `&[&str]` and `Vec<&str>` borrow their elements from an owned buffer.
fn borrows_words(tag: &str) -> bool {
    let compact: String = tag.chars().filter(|c| !c.is_whitespace()).collect();
    compact.contains("[&") || compact.contains("<&")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn types(source: &str) -> Vec<String> {
        let entry = Rust.locate_entry_point(source).unwrap();
        Rust.extract_parameter_types(&entry)
    }

    #[test]
    fn test_typed_parameters() {
        let src = "fn add(a: i32, b: i32) -> i32 {\n    a + b\n}";
        let entry = Rust.locate_entry_point(src).unwrap();
        assert_eq!(entry.name, "add");
        assert_eq!(entry.returns.as_deref(), Some("i32"));
        assert_eq!(Rust.extract_parameter_types(&entry), vec!["i32", "i32"]);
    }

    #[test]
    fn test_generic_and_slice_parameters() {
        let src = "pub fn count<'a, T: PartialEq>(\n    items: &'a [T],\n    lookup: HashMap<String, i32>,\n    mut v: Vec<i32>,\n) -> usize where T: Clone {\n    0\n}";
        let entry = Rust.locate_entry_point(src).unwrap();
        assert_eq!(entry.name, "count");
        assert_eq!(entry.returns.as_deref(), Some("usize"));
        assert_eq!(
            Rust.extract_parameter_types(&entry),
            vec!["&'a [T]", "HashMap<String, i32>", "Vec<i32>"]
        );
    }

    #[test]
    fn test_main_and_receivers_skipped() {
        let src = "fn main() {}\nfn area(&self, scale: f64) -> f64 { 0.0 }";
        assert_eq!(types(src), vec!["f64"]);
        assert!(Rust.defines_program_entry(src));
        assert!(is_receiver("&'a mut self"));
        assert!(is_receiver("self: Box<Self>"));
        assert!(!is_receiver("selfish: i32"));
    }

    #[test]
    fn test_no_return_type() {
        let entry = Rust.locate_entry_point("fn shout(s: &str) {\n    println!(\"{}\", s);\n}").unwrap();
        assert!(entry.returns.is_none());
    }

    #[test]
    fn test_passing_modes() {
        assert_eq!(Passing::of("i32"), Passing::Value);
        assert_eq!(Passing::of("&str"), Passing::Shared);
        assert_eq!(Passing::of("&mut Vec<i32>"), Passing::Exclusive);
        assert_eq!(Passing::of("&'a mut String"), Passing::Exclusive);
        assert_eq!(Passing::of("&'a str"), Passing::Shared);
    }

    #[test]
    fn test_conversions() {
        let slice = Rust.convert("&[i64]", 0);
        assert_eq!(slice.statements, vec!["let arg0: Vec<i64> = reader.list();"]);
        assert_eq!(slice.expression, "&arg0");

        let text = Rust.convert("&str", 1);
        assert_eq!(text.statements, vec!["let arg1: String = reader.token();"]);
        assert_eq!(text.expression, "&arg1");

        let owned = Rust.convert("u64", 2);
        assert_eq!(owned.statements, vec!["let arg2: u64 = reader.parse();"]);
        assert_eq!(owned.expression, "arg2");

        let mutable = Rust.convert("&mut Vec<i32>", 3);
        assert_eq!(mutable.statements, vec!["let mut arg3: Vec<i32> = reader.list();"]);
        assert_eq!(mutable.expression, "&mut arg3");

        let borrowed = Rust.convert("&[&str]", 4);
        assert_eq!(borrowed.statements.len(), 2);
        assert_eq!(borrowed.expression, "&arg4");
    }

    #[test]
    fn test_print_format() {
        assert_eq!(print_format("i32"), "{}");
        assert_eq!(print_format("String"), "{}");
        assert_eq!(print_format("char"), "{}");
        assert_eq!(print_format("Vec<i32>"), "{:?}");
        assert_eq!(print_format("Option<usize>"), "{:?}");
    }

    #[test]
    fn test_render_defines_main() {
        let source = "fn add(a: i32, b: i32) -> i32 {\n    a + b\n}";
        let entry = Rust.locate_entry_point(source).unwrap();
        let conversions = vec![Rust.convert("i32", 0), Rust.convert("i32", 1)];
        let program = Rust.render(&ProgramParts {
            source,
            entry: &entry,
            conversions: &conversions,
        });
        assert!(program.starts_with("fn add(a: i32, b: i32) -> i32"));
        assert!(program.contains("    let arg0: i32 = reader.parse();\n"));
        assert!(program.contains("    let result = add(arg0, arg1);\n    println!(\"{}\", result);\n}"));
    }
}
