use std::sync::LazyLock;

use codeduel_core::{Language, ParameterSignature};
use regex::{Captures, Regex};

use super::scan::{matching_paren, split_top_level};
use super::{classify, Conversion, EntryPoint, LanguageStrategy, ProgramParts, Scalar, ValueKind};

static FUNCTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:async\s+)?function\s*\*?\s*([A-Za-z_$][\w$]*)\s*\(").unwrap()
});

static ARROW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:const|let|var)\s+([A-Za-z_$][\w$]*)\s*=\s*(?:async\s*)?\(").unwrap()
});

static FUNCTION_EXPR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(?:const|let|var)\s+([A-Za-z_$][\w$]*)\s*=\s*(?:async\s+)?function\s*\*?\s*(?:[A-Za-z_$][\w$]*)?\s*\(",
    )
    .unwrap()
});

static SINGLE_ARROW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:const|let|var)\s+([A-Za-z_$][\w$]*)\s*=\s*(?:async\s+)?([A-Za-z_$][\w$]*)\s*=>")
        .unwrap()
});

const PRELUDE: &str = r#"class __ArgReader {
  constructor(text) {
    this.lines = text.split(/\r?\n/);
    this.row = 0;
    this.col = 0;
  }

  token() {
    while (this.row < this.lines.length) {
      const rest = this.lines[this.row].slice(this.col);
      const match = /\S+/.exec(rest);
      if (match) {
        this.col += match.index + match[0].length;
        return match[0];
      }
      this.row += 1;
      this.col = 0;
    }
    throw new Error('not enough input tokens');
  }

  line() {
    while (this.row < this.lines.length) {
      const rest = this.lines[this.row].slice(this.col).trim();
      this.row += 1;
      this.col = 0;
      if (rest) return rest;
    }
    return '';
  }

  words() {
    const line = this.line();
    return line ? line.split(/\s+/) : [];
  }
}

const __reader = new __ArgReader(require('fs').readFileSync(0, 'utf-8'));"#;

pub struct JavaScript;

/// Parameter text between the parentheses opening at the end of `caps`.
fn parenthesised(source: &str, caps: &Captures<'_>) -> Option<(usize, usize)> {
    let open = caps.get(0)?.end() - 1;
    let close = matching_paren(source, open)?;
    Some((open, close))
}

impl LanguageStrategy for JavaScript {
    fn language(&self) -> Language {
        Language::JavaScript
    }

    fn locate_entry_point(&self, source: &str) -> Option<EntryPoint> {
        let mut found: Vec<(usize, EntryPoint)> = Vec::new();

        let plain = FUNCTION
            .captures_iter(source)
            .chain(FUNCTION_EXPR.captures_iter(source))
            .filter_map(|caps| {
                let (open, close) = parenthesised(source, &caps)?;
                Some((caps.get(0)?.start(), entry(&caps[1], &source[open + 1..close])))
            });
        found.extend(plain);

        // `(...)` after `=` is only a function when an arrow follows it
        let arrows = ARROW.captures_iter(source).filter_map(|caps| {
            let (open, close) = parenthesised(source, &caps)?;
            source[close + 1..].trim_start().starts_with("=>").then(|| {
                (caps.get(0).map_or(0, |m| m.start()), entry(&caps[1], &source[open + 1..close]))
            })
        });
        found.extend(arrows);

        let single = SINGLE_ARROW
            .captures_iter(source)
            .filter_map(|caps| Some((caps.get(0)?.start(), entry(&caps[1], &caps[2]))));
        found.extend(single);

        found.into_iter().min_by_key(|(start, _)| *start).map(|(_, e)| e)
    }

    fn extract_parameter_types(&self, entry: &EntryPoint) -> Vec<String> {
        split_top_level(&entry.params)
            .into_iter()
            .map(|_| ParameterSignature::ANY.to_string())
            .collect()
    }

    fn convert(&self, tag: &str, index: usize) -> Conversion {
        let value = match classify(tag) {
            ValueKind::Scalar(Scalar::Int) => "parseInt(__reader.token(), 10)",
            ValueKind::Scalar(Scalar::Float) => "parseFloat(__reader.token())",
            ValueKind::Scalar(Scalar::Bool) => "__reader.token().toLowerCase() === 'true'",
            // untyped parameters, `any` included, receive the raw string token
            ValueKind::Scalar(Scalar::Str) | ValueKind::Opaque => "__reader.token()",
            ValueKind::List(Scalar::Int) => "__reader.words().map((x) => parseInt(x, 10))",
            ValueKind::List(Scalar::Float) => "__reader.words().map((x) => parseFloat(x))",
            ValueKind::List(Scalar::Bool) => {
                "__reader.words().map((x) => x.toLowerCase() === 'true')"
            }
            ValueKind::List(Scalar::Str) => "__reader.words()",
        };
        Conversion::bind(format!("const arg{index} = {value};"), index)
    }

    fn render(&self, parts: &ProgramParts<'_>) -> String {
        format!(
            "{prelude}\n\n{code}\n\n{statements}\nconst __result = {call};\n\
             console.log(typeof __result === 'object' && __result !== null ? JSON.stringify(__result) : __result);\n",
            prelude = PRELUDE,
            code = parts.source.trim_end(),
            statements = parts.statements(""),
            call = parts.call(),
        )
    }
}

fn entry(name: &str, params: &str) -> EntryPoint {
    EntryPoint {
        name: name.to_string(),
        params: params.to_string(),
        returns: None,
    }
}
