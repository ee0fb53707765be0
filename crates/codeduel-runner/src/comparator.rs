use codeduel_core::{ComparisonOutcome, ComparisonStrategy};
use serde_json::Value;

/// Largest difference at which two numbers still count as equal.
pub const TOLERANCE: f64 = 1e-6;

/// Decides whether `actual` matches `expected`. The first tier that applies
/// decides: structured (both JSON), numeric (both parse as numbers), then
/// normalised text.
pub fn compare(expected: &str, actual: &str) -> ComparisonOutcome {
    let expected = expected.trim();
    let actual = actual.trim();

    if let (Ok(e), Ok(a)) = (
        serde_json::from_str::<Value>(expected),
        serde_json::from_str::<Value>(actual),
    ) {
        return outcome(json_equal(&e, &a), ComparisonStrategy::Structured);
    }

    if let Some(equal) = numeric_equal(expected, actual) {
        return outcome(equal, ComparisonStrategy::Numeric);
    }

    outcome(normalize(expected) == normalize(actual), ComparisonStrategy::Text)
}

fn outcome(passed: bool, strategy: ComparisonStrategy) -> ComparisonOutcome {
    ComparisonOutcome { passed, strategy }
}

/// Deep equality; numbers compare by value so `5` equals `5.0`.
fn json_equal(expected: &Value, actual: &Value) -> bool {
    match (expected, actual) {
        (Value::Number(e), Value::Number(a)) => match (e.as_i64(), a.as_i64()) {
            (Some(e), Some(a)) => e == a,
            _ => match (e.as_f64(), a.as_f64()) {
                (Some(e), Some(a)) => (e - a).abs() < TOLERANCE,
                _ => e == a,
            },
        },
        (Value::Array(e), Value::Array(a)) => {
            e.len() == a.len() && e.iter().zip(a).all(|(e, a)| json_equal(e, a))
        }
        (Value::Object(e), Value::Object(a)) => {
            e.len() == a.len()
                && e.iter()
                    .all(|(key, value)| a.get(key).is_some_and(|other| json_equal(value, other)))
        }
        _ => expected == actual,
    }
}

/// `None` when either side is not a number of the kind being compared.
fn numeric_equal(expected: &str, actual: &str) -> Option<bool> {
    if expected.contains('.') || actual.contains('.') {
        let e: f64 = expected.parse().ok()?;
        let a: f64 = actual.parse().ok()?;
        return Some((e - a).abs() < TOLERANCE);
    }
    let e: i128 = expected.parse().ok()?;
    let a: i128 = actual.parse().ok()?;
    Some(e == a)
}

fn normalize(text: &str) -> String {
    text.replace("\r\n", "\n")
        .replace('\r', "\n")
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(expected: &str, actual: &str) -> (bool, ComparisonStrategy) {
        let outcome = compare(expected, actual);
        (outcome.passed, outcome.strategy)
    }

    #[test]
    fn test_structured_tier() {
        assert_eq!(check("[1, 2, 3]", "[1,2,3]"), (true, ComparisonStrategy::Structured));
        assert_eq!(check("[1, 2, 3]", "[3, 2, 1]"), (false, ComparisonStrategy::Structured));
        assert_eq!(
            check(r#"{"a": 1, "b": [true]}"#, r#"{"b":[true],"a":1}"#),
            (true, ComparisonStrategy::Structured)
        );
        assert_eq!(check(r#""hi""#, r#""hi""#), (true, ComparisonStrategy::Structured));
    }

    #[test]
    fn test_structured_numbers_use_tolerance() {
        assert_eq!(check("5", "5.0"), (true, ComparisonStrategy::Structured));
        assert_eq!(check("[0.1]", "[0.1000000001]"), (true, ComparisonStrategy::Structured));
        assert_eq!(check("0.5", "0.51"), (false, ComparisonStrategy::Structured));
        assert_eq!(
            check("9007199254740993", "9007199254740992"),
            (false, ComparisonStrategy::Structured)
        );
    }

    #[test]
    fn test_numeric_tier() {
        assert_eq!(check("007", "7"), (true, ComparisonStrategy::Numeric));
        assert_eq!(check(".5", "0.5000001"), (true, ComparisonStrategy::Numeric));
        assert_eq!(check("+3", "4"), (false, ComparisonStrategy::Numeric));
    }

    #[test]
    fn test_text_tier() {
        assert_eq!(
            check("hello world", "  hello world \n"),
            (true, ComparisonStrategy::Text)
        );
        assert_eq!(check("a  \r\nb\r\n", "a\nb"), (true, ComparisonStrategy::Text));
        assert_eq!(check("True", "true"), (false, ComparisonStrategy::Text));
    }

    #[test]
    fn test_failed_number_parse_falls_through_to_text() {
        // contains a dot but is not a float
        assert_eq!(check("v1.2", "v1.2"), (true, ComparisonStrategy::Text));
        assert_eq!(check("1.2.3", "1.2.4"), (false, ComparisonStrategy::Text));
    }
}
