use codeduel_core::Language;

use super::c::{defines_main, locate_definition, parameter_types};
use super::scan::element_type;
use super::{classify, Conversion, EntryPoint, LanguageStrategy, ProgramParts, Scalar, ValueKind};

const PRELUDE: &str = r#"#include <cctype>
#include <cstdlib>
#include <iostream>
#include <sstream>
#include <string>
#include <type_traits>
#include <vector>

namespace cw {

std::vector<std::string> lines;
std::size_t row = 0;
std::size_t col = 0;

void read_all() {
    std::string text;
    while (std::getline(std::cin, text)) {
        if (!text.empty() && text.back() == '\r') text.pop_back();
        lines.push_back(text);
    }
}

std::string token() {
    while (row < lines.size()) {
        const std::string &current = lines[row];
        while (col < current.size() && std::isspace(static_cast<unsigned char>(current[col]))) ++col;
        if (col < current.size()) {
            std::size_t start = col;
            while (col < current.size() && !std::isspace(static_cast<unsigned char>(current[col]))) ++col;
            return current.substr(start, col - start);
        }
        ++row;
        col = 0;
    }
    std::cerr << "not enough input tokens" << std::endl;
    std::exit(1);
}

std::string line() {
    while (row < lines.size()) {
        std::string rest = lines[row].substr(col);
        ++row;
        col = 0;
        if (rest.find_first_not_of(" \t") != std::string::npos) return rest;
    }
    return std::string();
}

template <typename T> T parse(const std::string &text) {
    T value{};
    std::istringstream in(text);
    in >> value;
    return value;
}

template <> std::string parse<std::string>(const std::string &text) { return text; }

template <> bool parse<bool>(const std::string &text) {
    std::string lower;
    for (char c : text) lower += static_cast<char>(std::tolower(static_cast<unsigned char>(c)));
    return lower == "true";
}

template <typename T> std::vector<T> split(const std::string &text) {
    std::vector<T> values;
    std::istringstream in(text);
    std::string word;
    while (in >> word) values.push_back(parse<T>(word));
    return values;
}

template <typename T> void emit(const T &value) { std::cout << value; }

inline void emit(bool value) { std::cout << (value ? "true" : "false"); }

template <typename T> void emit(const std::vector<T> &values) {
    std::cout << '[';
    bool first = true;
    for (const T &item : values) {
        if (!first) std::cout << ", ";
        first = false;
        emit(item);
    }
    std::cout << ']';
}

template <typename F> void invoke(F &&call) {
    if constexpr (std::is_void_v<decltype(call())>) {
        call();
    } else {
        emit(call());
        std::cout << '\n';
    }
}

}  // namespace cw"#;

pub struct Cpp;

/// Declared type without constness and references: `const std::string&` -> `std::string`.
fn value_type(tag: &str) -> &str {
    let t = tag.trim();
    let t = t.strip_prefix("const ").unwrap_or(t).trim_start();
    let t = t.trim_end_matches('&').trim_end();
    t.strip_suffix(" const").unwrap_or(t).trim_end()
}

/// Raw pointer or array parameters take the buffer of the parsed value.
fn is_buffer(value_type: &str) -> bool {
    value_type.ends_with('*') || value_type.ends_with(']')
}

impl LanguageStrategy for Cpp {
    fn language(&self) -> Language {
        Language::Cpp
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
        let vt = value_type(tag);
        match classify(tag) {
            ValueKind::Scalar(Scalar::Int | Scalar::Float) => Conversion::bind(
                format!("{vt} arg{index} = cw::parse<{vt}>(cw::token());"),
                index,
            ),
            ValueKind::Scalar(Scalar::Bool) => Conversion::bind(
                format!("bool arg{index} = cw::parse<bool>(cw::token());"),
                index,
            ),
            ValueKind::Scalar(Scalar::Str) => {
                let expression = if !is_buffer(vt) {
                    format!("arg{index}")
                } else if tag.contains("const") {
                    format!("arg{index}.c_str()")
                } else {
                    format!("&arg{index}[0]")
                };
                Conversion::new(
                    vec![format!("std::string arg{index} = cw::token();")],
                    expression,
                )
            }
            ValueKind::List(scalar) => {
                let elem = match scalar {
                    Scalar::Str => "std::string".to_string(),
                    Scalar::Bool => "bool".to_string(),
                    Scalar::Int => element_type(tag).unwrap_or_else(|| "long long".to_string()),
                    Scalar::Float => element_type(tag).unwrap_or_else(|| "double".to_string()),
                };
                let expression = if is_buffer(vt) {
                    format!("arg{index}.data()")
                } else {
                    format!("arg{index}")
                };
                Conversion::new(
                    vec![format!(
                        "std::vector<{elem}> arg{index} = cw::split<{elem}>(cw::line());"
                    )],
                    expression,
                )
            }
            ValueKind::Opaque => {
                Conversion::bind(format!("std::string arg{index} = cw::token();"), index)
            }
        }
    }

    fn render(&self, parts: &ProgramParts<'_>) -> String {
        format!(
            "{PRELUDE}\n\n{code}\n\nint main() {{\n    cw::read_all();\n{statements}\n    \
             cw::invoke([&]() -> decltype(auto) {{ return {call}; }});\n    return 0;\n}}\n",
            code = parts.source.trim_end(),
            statements = parts.statements("    "),
            call = parts.call(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_reference_parameter() {
        let src = "#include <vector>\nusing namespace std;\n\nint total(const vector<int>& nums, int bonus) {\n    int s = bonus;\n    for (int n : nums) s += n;\n    return s;\n}";
        let entry = Cpp.locate_entry_point(src).unwrap();
        assert_eq!(entry.name, "total");
        assert_eq!(
            Cpp.extract_parameter_types(&entry),
            vec!["const vector<int>&", "int"]
        );
    }

    #[test]
    fn test_qualified_return_and_defaults() {
        let src = "std::vector<std::string> split_words(std::string text, char sep = ' ') const {\n}";
        let entry = Cpp.locate_entry_point(src).unwrap();
        assert_eq!(entry.name, "split_words");
        assert_eq!(entry.returns.as_deref(), Some("std::vector<std::string>"));
        assert_eq!(Cpp.extract_parameter_types(&entry), vec!["std::string", "char"]);
    }

    #[test]
    fn test_trailing_return_type() {
        let entry = Cpp.locate_entry_point("auto twice(int x) -> int {\n  return 2 * x;\n}").unwrap();
        assert_eq!(entry.returns.as_deref(), Some("int"));
    }

    #[test]
    fn test_own_main_detected() {
        assert!(Cpp.defines_program_entry("int main() {\n  return 0;\n}"));
        assert!(!Cpp.defines_program_entry("int domain(int x) { return x; }"));
    }

    #[test]
    fn test_value_type() {
        assert_eq!(value_type("const std::string&"), "std::string");
        assert_eq!(value_type("int const&"), "int");
        assert_eq!(value_type("long long"), "long long");
    }

    #[test]
    fn test_conversions() {
        let vector = Cpp.convert("const vector<int>&", 0);
        assert_eq!(
            vector.statements,
            vec!["std::vector<int> arg0 = cw::split<int>(cw::line());"]
        );
        assert_eq!(vector.expression, "arg0");

        let words = Cpp.convert("std::vector<std::string>", 1);
        assert_eq!(
            words.statements,
            vec!["std::vector<std::string> arg1 = cw::split<std::string>(cw::line());"]
        );

        assert_eq!(Cpp.convert("const char*", 2).expression, "arg2.c_str()");
        assert_eq!(Cpp.convert("char*", 3).expression, "&arg3[0]");
        assert_eq!(Cpp.convert("int*", 4).expression, "arg4.data()");
        assert_eq!(
            Cpp.convert("long long", 5).statements,
            vec!["long long arg5 = cw::parse<long long>(cw::token());"]
        );
    }

    #[test]
    fn test_class_member_and_split_declaration() {
        let src = "class Solution {\npublic:\n    int add(int a, int b) {\n        return a + b;\n    }\n};";
        let entry = Cpp.locate_entry_point(src).unwrap();
        assert_eq!(entry.name, "add");
        assert_eq!(entry.returns.as_deref(), Some("int"));

        let src = "template <typename T>\nT biggest(std::vector<T> xs) {\n  return xs[0];\n}";
        let entry = Cpp.locate_entry_point(src).unwrap();
        assert_eq!(entry.name, "biggest");
        assert_eq!(entry.returns.as_deref(), Some("T"));

        let src = "static std::string\nshout(std::string s)\n{\n  return s;\n}";
        let entry = Cpp.locate_entry_point(src).unwrap();
        assert_eq!(entry.name, "shout");
        assert_eq!(Cpp.extract_parameter_types(&entry), vec!["std::string"]);
    }

    #[test]
    fn test_exhausted_input_exits_with_error() {
        let token = &PRELUDE[PRELUDE.find("std::string token()").unwrap()..PRELUDE.find("std::string line()").unwrap()];
        assert!(token.contains("std::cerr << \"not enough input tokens\""));
        assert!(token.contains("std::exit(1);"));
        assert!(!token.contains("return std::string();"));
    }

    #[test]
    fn test_render_invokes_through_emitter() {
        let source = "int add(int a, int b) {\n    return a + b;\n}";
        let entry = Cpp.locate_entry_point(source).unwrap();
        let conversions = vec![Cpp.convert("int", 0), Cpp.convert("int", 1)];
        let program = Cpp.render(&ProgramParts {
            source,
            entry: &entry,
            conversions: &conversions,
        });
        assert!(program.contains("}  // namespace cw\n\nint add(int a, int b)"));
        assert!(program.contains("    int arg1 = cw::parse<int>(cw::token());\n"));
        assert!(program.contains("cw::invoke([&]() -> decltype(auto) { return add(arg0, arg1); });"));
    }
}
