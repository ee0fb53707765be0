//! Lexical helpers shared by the language strategies: balanced scanning of
//! parameter lists and classification of declared type tags.

/// Index of the `)` closing the `(` at `open`. Double-quoted strings are skipped.
pub fn matching_paren(source: &str, open: usize) -> Option<usize> {
    let bytes = source.as_bytes();
    if bytes.get(open) != Some(&b'(') {
        return None;
    }

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate().skip(open) {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Splits a parameter list on commas that are not nested inside
/// `()`, `[]`, `{}`, `<>` or a string literal.
pub fn split_top_level(params: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;
    let mut in_string = false;
    let mut prev = ' ';

    for c in params.chars() {
        if in_string {
            current.push(c);
            if c == '"' && prev != '\\' {
                in_string = false;
            }
            prev = c;
            continue;
        }
        match c {
            '"' => in_string = true,
            '(' | '[' | '{' | '<' => depth += 1,
            // `->` and `=>` are arrows, not closing brackets
            '>' if prev == '-' || prev == '=' => {}
            ')' | ']' | '}' | '>' => depth -= 1,
            ',' if depth <= 0 => {
                push_part(&mut parts, &current);
                current.clear();
                prev = c;
                continue;
            }
            _ => {}
        }
        current.push(c);
        prev = c;
    }
    push_part(&mut parts, &current);
    parts
}

fn push_part(parts: &mut Vec<String>, raw: &str) {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
        parts.push(trimmed.to_string());
    }
}

/// Byte index of the first top-level occurrence of `needle` in `text`.
pub fn find_top_level(text: &str, needle: char) -> Option<usize> {
    let mut depth = 0i32;
    let mut prev = ' ';
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    for (pos, &(i, c)) in chars.iter().enumerate() {
        let next = chars.get(pos + 1).map(|&(_, n)| n).unwrap_or(' ');
        match c {
            '(' | '[' | '{' | '<' => depth += 1,
            '>' if prev == '-' || prev == '=' => {}
            ')' | ']' | '}' | '>' => depth -= 1,
            _ if c == needle && depth == 0 => {
                // `==`, `<=`, `>=`, `!=` and `=>` are operators, not assignments
                let operator = needle == '=' && (next == '=' || next == '>' || "<>!=".contains(prev));
                if !operator {
                    return Some(i);
                }
            }
            _ => {}
        }
        prev = c;
    }
    None
}

/// Removes a `= default` suffix from a parameter.
pub fn strip_default(param: &str) -> &str {
    match find_top_level(param, '=') {
        Some(idx) => param[..idx].trim(),
        None => param.trim(),
    }
}

/// Collapses whitespace and glues pointer/reference/array markers to the type.
pub fn tidy_type(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut out = String::with_capacity(collapsed.len());
    for c in collapsed.chars() {
        if matches!(c, '*' | '&' | '[' | ']' | '>') && out.ends_with(' ') {
            out.pop();
        }
        if c == ' ' && (out.ends_with('<') || out.ends_with('[')) {
            continue;
        }
        out.push(c);
    }
    out
}

// =============================================================================
// Type classification
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scalar {
    Int,
    Float,
    Bool,
    Str,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueKind {
    Scalar(Scalar),
    List(Scalar),
    /// Unrecognised tag: handed over as the raw string token.
    Opaque,
}

const INT_TYPES: &[&str] = &[
    "int", "integer", "i8", "i16", "i32", "i64", "i128", "isize", "u8", "u16", "u32", "u64",
    "u128", "usize", "long", "longlong", "longint", "longlongint", "short", "shortint",
    "unsigned", "unsignedint", "unsignedlong", "unsignedlonglong", "signed", "size_t", "int8",
    "int16", "int32", "int64", "uint", "uint8", "uint16", "uint32", "uint64", "int8_t",
    "int16_t", "int32_t", "int64_t", "uint8_t", "uint16_t", "uint32_t", "uint64_t",
];

const FLOAT_TYPES: &[&str] = &[
    "float", "double", "longdouble", "f32", "f64", "float32", "float64", "number", "decimal",
];

const BOOL_TYPES: &[&str] = &["bool", "boolean", "_bool"];

const STR_TYPES: &[&str] = &["str", "string", "char*", "char[]", "string_view"];

const CONTAINERS: &[&str] = &[
    "list", "vec", "vector", "array", "sequence", "iterable", "deque", "set", "arraylist",
    "slice",
];

/// Removes reference, mutability and constness qualifiers, keeping case.
pub fn strip_qualifiers(tag: &str) -> &str {
    let mut t = tag.trim();
    loop {
        let before = t;
        for prefix in ["&mut ", "&", "mut ", "const ", "typing.", "std::"] {
            if let Some(rest) = t.strip_prefix(prefix) {
                t = rest.trim_start();
            }
        }
        // lifetimes, as in `&'a str`
        if let Some(rest) = t.strip_prefix('\'') {
            t = rest
                .trim_start_matches(|c: char| c.is_alphanumeric() || c == '_')
                .trim_start();
        }
        t = t.trim_end_matches('&').trim_end();
        if t == before {
            return t;
        }
    }
}

fn normalize(tag: &str) -> String {
    strip_qualifiers(tag)
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase()
}

fn scalar(key: &str) -> Option<Scalar> {
    if INT_TYPES.contains(&key) {
        Some(Scalar::Int)
    } else if FLOAT_TYPES.contains(&key) {
        Some(Scalar::Float)
    } else if BOOL_TYPES.contains(&key) {
        Some(Scalar::Bool)
    } else if STR_TYPES.contains(&key) {
        Some(Scalar::Str)
    } else {
        None
    }
}

/// Element type of a sequence-shaped tag, in its original spelling:
/// `int[]`, `int*`, `[]int`, `[i32]`, `&[i32]`, `Vec<i32>`, `list[int]`,
/// `std::vector<int>`.
pub fn element_type(tag: &str) -> Option<String> {
    let t = strip_qualifiers(tag);

    let inner = if let Some(before) = t.strip_suffix("[]") {
        before
    } else if let Some(before) = t.strip_suffix('*') {
        before
    } else if let Some(after) = t.strip_prefix("[]") {
        after
    } else if t.starts_with('[') && t.ends_with(']') {
        let body = &t[1..t.len() - 1];
        body.split(';').next().unwrap_or(body)
    } else {
        let open = t.find(&['<', '['][..])?;
        let close = match &t[open..open + 1] {
            "<" => '>',
            _ => ']',
        };
        let container = t[..open].trim().to_lowercase();
        let container = container.rsplit("::").next().unwrap_or(&container);
        if !t.ends_with(close) || !CONTAINERS.contains(&container) {
            return None;
        }
        &t[open + 1..t.len() - 1]
    };

    let inner = strip_qualifiers(inner);
    (!inner.is_empty()).then(|| inner.to_string())
}

/// Classifies a declared type tag into the conversion it needs.
pub fn classify(tag: &str) -> ValueKind {
    let key = normalize(tag);
    if let Some(s) = scalar(&key) {
        return ValueKind::Scalar(s);
    }
    if CONTAINERS.contains(&key.as_str()) {
        return ValueKind::List(Scalar::Str);
    }
    element_type(tag)
        .and_then(|elem| scalar(&normalize(&elem)))
        .map(ValueKind::List)
        .unwrap_or(ValueKind::Opaque)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matching_paren_multiline() {
        let src = "def f(a: int,\n      b: tuple = (1, 2)):\n    pass";
        let open = src.find('(').unwrap();
        let close = matching_paren(src, open).unwrap();
        assert_eq!(&src[close..close + 2], "):");
    }

    #[test]
    fn test_matching_paren_ignores_string_parens() {
        let src = r#"f(a = ")", b)"#;
        assert_eq!(matching_paren(src, 1), Some(src.len() - 1));
    }

    #[test]
    fn test_split_respects_generics() {
        assert_eq!(
            split_top_level("m: HashMap<String, i32>, v: &[i32]"),
            vec!["m: HashMap<String, i32>", "v: &[i32]"]
        );
        assert_eq!(
            split_top_level("d: Dict[str, int] = {}, n=3"),
            vec!["d: Dict[str, int] = {}", "n=3"]
        );
        assert_eq!(
            split_top_level("f: impl Fn(i32) -> i32, x: i32"),
            vec!["f: impl Fn(i32) -> i32", "x: i32"]
        );
        assert!(split_top_level("  ").is_empty());
    }

    #[test]
    fn test_strip_default() {
        assert_eq!(strip_default("x: int = 5"), "x: int");
        assert_eq!(strip_default("flag=a==b"), "flag");
        assert_eq!(strip_default("int n"), "int n");
    }

    #[test]
    fn test_tidy_type() {
        assert_eq!(tidy_type("char  *"), "char*");
        assert_eq!(tidy_type("const std::vector< int > &"), "const std::vector<int>&");
    }

    #[test]
    fn test_classify_scalars() {
        assert_eq!(classify("int"), ValueKind::Scalar(Scalar::Int));
        assert_eq!(classify("i64"), ValueKind::Scalar(Scalar::Int));
        assert_eq!(classify("long long"), ValueKind::Scalar(Scalar::Int));
        assert_eq!(classify("const int&"), ValueKind::Scalar(Scalar::Int));
        assert_eq!(classify("float64"), ValueKind::Scalar(Scalar::Float));
        assert_eq!(classify("bool"), ValueKind::Scalar(Scalar::Bool));
        assert_eq!(classify("&str"), ValueKind::Scalar(Scalar::Str));
        assert_eq!(classify("&'a str"), ValueKind::Scalar(Scalar::Str));
        assert_eq!(classify("const char*"), ValueKind::Scalar(Scalar::Str));
        assert_eq!(classify("std::string"), ValueKind::Scalar(Scalar::Str));
    }

    #[test]
    fn test_classify_sequences() {
        assert_eq!(classify("list[int]"), ValueKind::List(Scalar::Int));
        assert_eq!(classify("List[float]"), ValueKind::List(Scalar::Float));
        assert_eq!(classify("Vec<String>"), ValueKind::List(Scalar::Str));
        assert_eq!(classify("&[i32]"), ValueKind::List(Scalar::Int));
        assert_eq!(classify("&mut Vec<i64>"), ValueKind::List(Scalar::Int));
        assert_eq!(classify("[]float64"), ValueKind::List(Scalar::Float));
        assert_eq!(classify("int[]"), ValueKind::List(Scalar::Int));
        assert_eq!(classify("double*"), ValueKind::List(Scalar::Float));
        assert_eq!(classify("std::vector<int>"), ValueKind::List(Scalar::Int));
        assert_eq!(classify("array<int>"), ValueKind::List(Scalar::Int));
        assert_eq!(classify("list"), ValueKind::List(Scalar::Str));
    }

    #[test]
    fn test_classify_opaque() {
        assert_eq!(classify("any"), ValueKind::Opaque);
        assert_eq!(classify("Optional[int]"), ValueKind::Opaque);
        assert_eq!(classify("Dict[str, int]"), ValueKind::Opaque);
        assert_eq!(classify("Vec<Vec<i32>>"), ValueKind::Opaque);
        assert_eq!(classify("map[string]int"), ValueKind::Opaque);
    }

    #[test]
    fn test_element_type_keeps_spelling() {
        assert_eq!(element_type("std::vector<long long>").as_deref(), Some("long long"));
        assert_eq!(element_type("&[f64]").as_deref(), Some("f64"));
        assert_eq!(element_type("[]int").as_deref(), Some("int"));
        assert_eq!(element_type("const int*").as_deref(), Some("int"));
        assert_eq!(element_type("int"), None);
    }
}
