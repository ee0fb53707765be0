use std::sync::LazyLock;

use codeduel_core::Language;
use regex::Regex;

use super::scan::{
    element_type, matching_paren, split_top_level, strip_default, strip_qualifiers, tidy_type,
};
use super::{classify, Conversion, EntryPoint, LanguageStrategy, ProgramParts, Scalar, ValueKind};

// =============================================================================
// C-family declarations (shared with C++)
// =============================================================================

static DECLARATION: LazyLock<Regex> = LazyLock::new(|| {
    // the name may start the line after its return type (GNU style)
    Regex::new(r"(?m)^[ \t]*([A-Za-z_][\w:<>, \t*&]*(?:[ \t*&]|\r?\n[ \t]*))([A-Za-z_]\w*)\s*\(")
        .unwrap()
});

static MAIN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:int|void)\s+main\s*\(").unwrap());

const NOT_FUNCTIONS: &[&str] = &[
    "main", "if", "for", "while", "switch", "return", "sizeof", "else", "do", "case", "catch",
    "new", "delete",
];

const STORAGE: &[&str] = &[
    "static", "inline", "extern", "constexpr", "virtual", "explicit", "friend",
];

const TRAILING: &[&str] = &["const", "noexcept", "override", "final"];

const QUALIFIERS: &[&str] = &["const", "volatile", "struct", "enum", "union", "register", "restrict"];

/// Words that end a type, so an unnamed parameter is not mistaken for a name.
const TYPE_WORDS: &[&str] = &[
    "int", "char", "short", "long", "float", "double", "bool", "_Bool", "void", "unsigned",
    "signed", "size_t", "auto", "string",
];

/// First `<type> name(...) {` definition that is not `main`.
pub(super) fn locate_definition(source: &str) -> Option<EntryPoint> {
    DECLARATION.captures_iter(source).find_map(|caps| {
        let name = &caps[2];
        let leading = caps[1].split_whitespace().next().unwrap_or_default();
        if NOT_FUNCTIONS.contains(&name) || NOT_FUNCTIONS.contains(&leading) {
            return None;
        }

        let open = caps.get(0)?.end() - 1;
        let close = matching_paren(source, open)?;
        let trailing_return = body_follows(&source[close + 1..])?;

        let returns = trailing_return.unwrap_or_else(|| return_type(&caps[1]));
        Some(EntryPoint {
            name: name.to_string(),
            params: source[open + 1..close].to_string(),
            returns: Some(returns),
        })
    })
}

/// Checks that a body follows the parameter list. The inner value is a
/// trailing `-> type` when present.
fn body_follows(tail: &str) -> Option<Option<String>> {
    let mut rest = tail.trim_start();
    loop {
        let before = rest;
        for word in TRAILING {
            if let Some(after) = rest.strip_prefix(word) {
                rest = after.trim_start();
            }
        }
        if rest == before {
            break;
        }
    }

    if rest.starts_with('{') {
        return Some(None);
    }
    let arrow = rest.strip_prefix("->")?;
    let brace = arrow.find('{')?;
    let declared = &arrow[..brace];
    (!declared.contains(';')).then(|| Some(tidy_type(declared)))
}

fn return_type(raw: &str) -> String {
    let words: Vec<&str> = raw
        .split_whitespace()
        .skip_while(|w| STORAGE.contains(w))
        .collect();
    tidy_type(&words.join(" "))
}

pub(super) fn parameter_types(entry: &EntryPoint) -> Vec<String> {
    split_top_level(&entry.params)
        .iter()
        .filter_map(|param| declared_type(param))
        .collect()
}

/// Type of one C-family parameter with its name and default dropped.
/// Array suffixes move onto the type: `int arr[]` becomes `int[]`.
fn declared_type(param: &str) -> Option<String> {
    let mut decl = strip_default(param).to_string();
    if decl.is_empty() || decl == "void" || decl == "..." {
        return None;
    }

    let mut suffix = String::new();
    while decl.ends_with(']') {
        let Some(open) = decl.rfind('[') else { break };
        decl.truncate(open);
        decl.truncate(decl.trim_end().len());
        suffix.push_str("[]");
    }

    let name_start = decl
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_alphanumeric() || *c == '_')
        .last()
        .map_or(decl.len(), |(i, _)| i);
    let (head, name) = decl.split_at(name_start);
    let head_trimmed = head.trim();
    let unnamed = name.is_empty()
        || head_trimmed.is_empty()
        || head_trimmed.ends_with("::")
        || TYPE_WORDS.contains(&name)
        || head_trimmed.split_whitespace().all(|w| QUALIFIERS.contains(&w));

    let ty = if unnamed { decl.as_str() } else { head };
    Some(tidy_type(&format!("{}{}", ty.trim(), suffix)))
}

pub(super) fn defines_main(source: &str) -> bool {
    MAIN.is_match(source)
}

// =============================================================================
// C
// =============================================================================

const PRELUDE: &str = r#"#include <ctype.h>
#include <stdbool.h>
#include <stdio.h>
#include <stdlib.h>
#include <string.h>

static char *cw_input = NULL;
static size_t cw_pos = 0;

static void cw_read_all(void) {
    size_t cap = 4096, len = 0;
    int ch;
    cw_input = malloc(cap);
    while ((ch = getchar()) != EOF) {
        if (len + 1 >= cap) {
            cap *= 2;
            cw_input = realloc(cw_input, cap);
        }
        cw_input[len++] = (char)ch;
    }
    cw_input[len] = '\0';
}

static char *cw_copy(size_t start, size_t end) {
    char *out = malloc(end - start + 1);
    memcpy(out, cw_input + start, end - start);
    out[end - start] = '\0';
    return out;
}

static char *cw_next_token(void) {
    while (cw_input[cw_pos] && isspace((unsigned char)cw_input[cw_pos])) cw_pos++;
    if (!cw_input[cw_pos]) {
        fprintf(stderr, "not enough input tokens\n");
        exit(1);
    }
    size_t start = cw_pos;
    while (cw_input[cw_pos] && !isspace((unsigned char)cw_input[cw_pos])) cw_pos++;
    return cw_copy(start, cw_pos);
}

static char *cw_rest_of_line(void) {
    for (;;) {
        while (cw_input[cw_pos] == ' ' || cw_input[cw_pos] == '\t' || cw_input[cw_pos] == '\r') cw_pos++;
        if (cw_input[cw_pos] != '\n') break;
        cw_pos++;
    }
    size_t start = cw_pos;
    while (cw_input[cw_pos] && cw_input[cw_pos] != '\n') cw_pos++;
    return cw_copy(start, cw_pos);
}

static size_t cw_split(char *line, char ***words) {
    size_t count = 0, cap = 8;
    char **out = malloc(cap * sizeof(char *));
    for (char *w = strtok(line, " \t\r"); w != NULL; w = strtok(NULL, " \t\r")) {
        if (count == cap) {
            cap *= 2;
            out = realloc(out, cap * sizeof(char *));
        }
        out[count++] = w;
    }
    *words = out;
    return count;
}

static bool cw_is_true(const char *token) {
    const char *expected = "true";
    for (; *token && *expected; token++, expected++) {
        if (tolower((unsigned char)*token) != *expected) return false;
    }
    return *token == '\0' && *expected == '\0';
}"#;

pub struct C;

impl C {
    fn element(tag: &str, scalar: Scalar) -> String {
        element_type(tag).unwrap_or_else(|| {
            match scalar {
                Scalar::Int => "long long",
                Scalar::Float => "double",
                Scalar::Bool => "bool",
                Scalar::Str => "char*",
            }
            .to_string()
        })
    }

    fn output(returns: Option<&str>, call: &str) -> String {
        let Some(returns) = returns else {
            return format!("{call};");
        };
        let key = strip_qualifiers(returns).replace(' ', "");
        if key == "char" {
            return format!("printf(\"%c\\n\", {call});");
        }
        match classify(returns) {
            ValueKind::Scalar(Scalar::Int) => format!("printf(\"%lld\\n\", (long long){call});"),
            ValueKind::Scalar(Scalar::Float) => format!("printf(\"%.10g\\n\", (double){call});"),
            ValueKind::Scalar(Scalar::Bool) => format!("puts({call} ? \"true\" : \"false\");"),
            ValueKind::Scalar(Scalar::Str) => format!("printf(\"%s\\n\", {call});"),
            // void, pointers to data and structs have no printable form
            _ => format!("{call};"),
        }
    }
}

impl LanguageStrategy for C {
    fn language(&self) -> Language {
        Language::C
    }

    fn locate_entry_point(&self, source: &str) -> Option<EntryPoint> {
        locate_definition(source)
    }

    fn extract_parameter_types(&self, entry: &EntryPoint) -> Vec<String> {
        parameter_types(entry)
    }

    fn defines_program_entry(&self, source: &str) -> bool {
        defines_main(source)
    }

    fn convert(&self, tag: &str, index: usize) -> Conversion {
        let ty = strip_qualifiers(tag);
        match classify(tag) {
            ValueKind::Scalar(Scalar::Int) => Conversion::bind(
                format!("{ty} arg{index} = ({ty})strtoll(cw_next_token(), NULL, 10);"),
                index,
            ),
            ValueKind::Scalar(Scalar::Float) => Conversion::bind(
                format!("{ty} arg{index} = ({ty})strtod(cw_next_token(), NULL);"),
                index,
            ),
            ValueKind::Scalar(Scalar::Bool) => Conversion::bind(
                format!("{ty} arg{index} = cw_is_true(cw_next_token());"),
                index,
            ),
            ValueKind::Scalar(Scalar::Str) | ValueKind::Opaque => {
                Conversion::bind(format!("char *arg{index} = cw_next_token();"), index)
            }
            ValueKind::List(scalar) => {
                let elem = Self::element(tag, scalar);
                let word = format!("words{index}[k]");
                let parse = match scalar {
                    Scalar::Int => format!("({elem})strtoll({word}, NULL, 10)"),
                    Scalar::Float => format!("({elem})strtod({word}, NULL)"),
                    Scalar::Bool => format!("cw_is_true({word})"),
                    Scalar::Str => word,
                };
                Conversion::new(
                    vec![
                        format!("char **words{index} = NULL;"),
                        format!("size_t count{index} = cw_split(cw_rest_of_line(), &words{index});"),
                        format!("{elem} *arg{index} = malloc((count{index} + 1) * sizeof({elem}));"),
                        format!("for (size_t k = 0; k < count{index}; k++) arg{index}[k] = {parse};"),
                    ],
                    format!("arg{index}"),
                )
            }
        }
    }

    fn render(&self, parts: &ProgramParts<'_>) -> String {
        format!(
            "{PRELUDE}\n\n{code}\n\nint main(void) {{\n    cw_read_all();\n{statements}\n    {output}\n    return 0;\n}}\n",
            code = parts.source.trim_end(),
            statements = parts.statements("    "),
            output = Self::output(parts.entry.returns.as_deref(), &parts.call()),
        )
    }
}
