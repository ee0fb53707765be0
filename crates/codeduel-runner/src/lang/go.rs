use std::sync::LazyLock;

use codeduel_core::Language;
use regex::Regex;

use super::scan::{element_type, matching_paren, split_top_level};
use super::{classify, Conversion, EntryPoint, LanguageStrategy, ProgramParts, Scalar, ValueKind};

static FUNC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^func\s+([A-Za-z_]\w*)\s*").unwrap());

static MAIN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^func\s+main\s*\(\s*\)").unwrap());

static PACKAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^package\s+\w+[ \t]*\n?").unwrap());

static IMPORT_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?ms)^import\s*\((.*?)\)[ \t]*\n?").unwrap());

static IMPORT_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^import\s+((?:[A-Za-z_.]\w*\s+)?"[^"]+")[ \t]*\n?"#).unwrap()
});

const WRAPPER_IMPORTS: &[&str] = &[r#""fmt""#, r#""io""#, r#""os""#, r#""strconv""#, r#""strings""#];

const PRELUDE: &str = r#"type argReader struct {
	lines []string
	row   int
	col   int
}

func newArgReader() *argReader {
	data, err := io.ReadAll(os.Stdin)
	if err != nil {
		panic(err)
	}
	text := strings.ReplaceAll(string(data), "\r\n", "\n")
	return &argReader{lines: strings.Split(text, "\n")}
}

func (r *argReader) token() string {
	for r.row < len(r.lines) {
		rest := r.lines[r.row][r.col:]
		trimmed := strings.TrimLeft(rest, " \t\r")
		if trimmed != "" {
			start := r.col + len(rest) - len(trimmed)
			end := strings.IndexAny(trimmed, " \t\r")
			if end < 0 {
				end = len(trimmed)
			}
			r.col = start + end
			return trimmed[:end]
		}
		r.row++
		r.col = 0
	}
	panic("not enough input tokens")
}

func (r *argReader) line() string {
	for r.row < len(r.lines) {
		rest := strings.TrimSpace(r.lines[r.row][r.col:])
		r.row++
		r.col = 0
		if rest != "" {
			return rest
		}
	}
	return ""
}

func (r *argReader) nextInt() int64 { return cwParseInt(r.token()) }

func (r *argReader) nextFloat() float64 { return cwParseFloat(r.token()) }

func (r *argReader) nextBool() bool { return cwParseBool(r.token()) }

func cwParseInt(s string) int64 {
	v, err := strconv.ParseInt(s, 10, 64)
	if err != nil {
		panic(err)
	}
	return v
}

func cwParseFloat(s string) float64 {
	v, err := strconv.ParseFloat(s, 64)
	if err != nil {
		panic(err)
	}
	return v
}

func cwParseBool(s string) bool { return strings.EqualFold(s, "true") }"#;

pub struct Go;

/// User code without its package clause and imports, plus the import specs it declared.
fn hoist_imports(source: &str) -> (String, Vec<String>) {
    let mut specs = Vec::new();
    for caps in IMPORT_BLOCK.captures_iter(source) {
        for line in caps[1].lines() {
            let spec = line.split("//").next().unwrap_or_default().trim();
            if !spec.is_empty() {
                specs.push(spec.split_whitespace().collect::<Vec<_>>().join(" "));
            }
        }
    }
    for caps in IMPORT_LINE.captures_iter(source) {
        specs.push(caps[1].split_whitespace().collect::<Vec<_>>().join(" "));
    }

    let body = PACKAGE.replace_all(source, "");
    let body = IMPORT_BLOCK.replace_all(&body, "");
    let body = IMPORT_LINE.replace_all(&body, "");
    (body.trim().to_string(), specs)
}

/// Go lets consecutive parameters share one type: `a, b int`.
fn grouped_types(params: &str) -> Vec<String> {
    let parts = split_top_level(params);
    let named = parts.iter().any(|p| p.split_once(char::is_whitespace).is_some());
    if !named {
        return parts;
    }

    let mut types = Vec::with_capacity(parts.len());
    let mut pending = 0;
    for part in parts {
        match part.split_once(char::is_whitespace) {
            Some((_, ty)) => {
                let ty = ty.trim();
                types.extend(std::iter::repeat(ty.to_string()).take(pending + 1));
                pending = 0;
            }
            None => pending += 1,
        }
    }
    types
}

impl LanguageStrategy for Go {
    fn language(&self) -> Language {
        Language::Go
    }

    fn locate_entry_point(&self, source: &str) -> Option<EntryPoint> {
        FUNC.captures_iter(source).find_map(|caps| {
            let name = &caps[1];
            if name == "main" {
                return None;
            }

            let mut open = caps.get(0)?.end();
            if source[open..].starts_with('[') {
                let close = source[open..].find(']')?;
                open += close + 1;
                open += source[open..].len() - source[open..].trim_start().len();
            }
            let close = matching_paren(source, open)?;

            let tail = &source[close + 1..];
            let returns = tail[..tail.find('{')?].trim();
            Some(EntryPoint {
                name: name.to_string(),
                params: source[open + 1..close].to_string(),
                returns: (!returns.is_empty()).then(|| returns.to_string()),
            })
        })
    }

    fn extract_parameter_types(&self, entry: &EntryPoint) -> Vec<String> {
        grouped_types(&entry.params)
    }

    fn defines_program_entry(&self, source: &str) -> bool {
        MAIN.is_match(source)
    }

    fn convert(&self, tag: &str, index: usize) -> Conversion {
        // variadic parameters take a slice spread at the call site
        let (tag, expression) = match tag.trim().strip_prefix("...") {
            Some(elem) => (format!("[]{elem}"), format!("arg{index}...")),
            None => (tag.trim().to_string(), format!("arg{index}")),
        };

        let statements = match classify(&tag) {
            ValueKind::Scalar(Scalar::Int) => vec![format!("arg{index} := {tag}(reader.nextInt())")],
            ValueKind::Scalar(Scalar::Float) => {
                vec![format!("arg{index} := {tag}(reader.nextFloat())")]
            }
            ValueKind::Scalar(Scalar::Bool) => vec![format!("arg{index} := reader.nextBool()")],
            ValueKind::Scalar(Scalar::Str) | ValueKind::Opaque => {
                vec![format!("arg{index} := reader.token()")]
            }
            ValueKind::List(scalar) => {
                let elem = element_type(&tag).unwrap_or_else(|| "string".to_string());
                let parse = match scalar {
                    Scalar::Int => format!("{elem}(cwParseInt(w))"),
                    Scalar::Float => format!("{elem}(cwParseFloat(w))"),
                    Scalar::Bool => "cwParseBool(w)".to_string(),
                    Scalar::Str => "w".to_string(),
                };
                vec![
                    format!("fields{index} := strings.Fields(reader.line())"),
                    format!("arg{index} := make([]{elem}, len(fields{index}))"),
                    format!("for k, w := range fields{index} {{"),
                    format!("\targ{index}[k] = {parse}"),
                    "}".to_string(),
                ]
            }
        };
        Conversion::new(statements, expression)
    }

    fn render(&self, parts: &ProgramParts<'_>) -> String {
        let (body, user_imports) = hoist_imports(parts.source);
        let mut imports: Vec<String> = WRAPPER_IMPORTS.iter().map(|s| s.to_string()).collect();
        for spec in user_imports {
            if !imports.contains(&spec) {
                imports.push(spec);
            }
        }
        let imports = imports
            .iter()
            .map(|spec| format!("\t{spec}"))
            .collect::<Vec<_>>()
            .join("\n");

        let output = match parts.entry.returns {
            Some(_) => format!("fmt.Println({})", parts.call()),
            None => parts.call(),
        };

        format!(
            "package main\n\nimport (\n{imports}\n)\n\nvar _ = fmt.Sprint\n\n{body}\n\n{PRELUDE}\n\n\
             func main() {{\n\treader := newArgReader()\n\t_ = reader\n{statements}\n\t{output}\n}}\n",
            statements = parts.statements("\t"),
        )
    }
}
