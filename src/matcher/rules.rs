//! Match rule evaluation for conditional response selection.
//!
//! A response's `(match_type, match_expression)` pair is modeled as a closed
//! [`MatchRule`] variant and dispatched exhaustively. Every parse failure
//! (bad regex, bad JSON) evaluates to non-match; rule evaluation never
//! returns an error to the caller.

use crate::catalog::{MatchType, MockResponse};
use serde_json::Value;
use std::collections::HashMap;

/// Closed set of rule kinds a response can carry.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchRule<'a> {
    /// Expression is a regular expression tested against the raw body.
    Regex(&'a str),
    /// Tiny dot-path DSL: `<path><op><value>` or bare `<path>` (existence).
    ///
    /// Operator detection is first occurrence of `!=`, else `==`, else
    /// existence. A literal `!=`/`==` inside a path segment is therefore
    /// misparsed; the first occurrence dictates the split.
    JsonPath(&'a str),
    /// Expression is a JSON document subset-checked against the parsed body.
    BodySubset(&'a str),
    /// Expression is `{"key": ..., "value": ...}` compared against request
    /// headers (name case-insensitive, value exact).
    HeaderEquals(&'a str),
    /// Response carries no usable rule.
    None,
}

impl<'a> MatchRule<'a> {
    /// Rule used under the QUERY_MATCH strategy.
    pub fn query_rule(response: &'a MockResponse) -> Self {
        match (response.match_type, response.match_expression.as_deref()) {
            (Some(MatchType::Regex), Some(expr)) => MatchRule::Regex(expr),
            (Some(MatchType::Json), Some(expr)) => MatchRule::JsonPath(expr),
            (Some(MatchType::BodyJson), Some(expr)) => MatchRule::BodySubset(expr),
            (Some(MatchType::Header), Some(expr)) => MatchRule::HeaderEquals(expr),
            _ => MatchRule::None,
        }
    }

    /// Rule used under the HEADER_MATCH strategy: the expression is read as
    /// a header condition regardless of the declared `match_type`.
    pub fn header_rule(response: &'a MockResponse) -> Self {
        match response.match_expression.as_deref() {
            Some(expr) => MatchRule::HeaderEquals(expr),
            None => MatchRule::None,
        }
    }

    /// Evaluate against the raw request body.
    pub fn matches_body(&self, body: &str) -> bool {
        match self {
            MatchRule::Regex(expr) => regex::Regex::new(expr)
                .map(|re| re.is_match(body))
                .unwrap_or(false),
            MatchRule::JsonPath(expr) => eval_json_path(expr, body),
            MatchRule::BodySubset(expr) => {
                match (
                    serde_json::from_str::<Value>(expr),
                    serde_json::from_str::<Value>(body),
                ) {
                    (Ok(subset), Ok(actual)) => is_subset(&subset, &actual),
                    _ => false,
                }
            }
            // Header rules carry no body condition.
            MatchRule::HeaderEquals(_) => false,
            MatchRule::None => false,
        }
    }

    /// Evaluate against the request headers.
    pub fn matches_headers(&self, headers: &HashMap<String, String>) -> bool {
        let MatchRule::HeaderEquals(expr) = self else {
            return false;
        };
        let Ok(condition) = serde_json::from_str::<Value>(expr) else {
            return false;
        };
        let Some(key) = condition.get("key").and_then(Value::as_str) else {
            return false;
        };
        if key.is_empty() {
            return false;
        }
        let Some(expected) = condition.get("value").and_then(Value::as_str) else {
            return false;
        };
        headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(key))
            .map(|(_, actual)| actual == expected)
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PathOp {
    Eq,
    Ne,
    Exists,
}

fn eval_json_path(expression: &str, body: &str) -> bool {
    let Ok(json_body) = serde_json::from_str::<Value>(body) else {
        return false;
    };

    let (op, path, raw_expected) = if let Some(idx) = expression.find("!=") {
        (
            PathOp::Ne,
            expression[..idx].trim(),
            Some(expression[idx + 2..].trim()),
        )
    } else if let Some(idx) = expression.find("==") {
        (
            PathOp::Eq,
            expression[..idx].trim(),
            Some(expression[idx + 2..].trim()),
        )
    } else {
        (PathOp::Exists, expression.trim(), None)
    };

    let actual = get_object_value(&json_body, path);

    match op {
        PathOp::Exists => matches!(actual, Some(value) if !value.is_null()),
        PathOp::Eq => loose_eq(actual, &coerce_expected(raw_expected.unwrap_or(""))),
        PathOp::Ne => !loose_eq(actual, &coerce_expected(raw_expected.unwrap_or(""))),
    }
}

/// Resolve a dot-notation path (`items[0].id` or `$.user.name`) inside a
/// JSON value. Returns `None` when any segment is missing.
pub fn get_object_value<'v>(root: &'v Value, path: &str) -> Option<&'v Value> {
    if path.is_empty() {
        return None;
    }
    let clean = path.strip_prefix("$.").unwrap_or(path);
    // Normalize numeric bracket indices: items[0].id -> items.0.id
    let normalized = normalize_brackets(clean);

    let mut current = root;
    for segment in normalized.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

fn normalize_brackets(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut chars = path.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c == '[' {
            if let Some(close) = path[i..].find(']') {
                let inner = &path[i + 1..i + close];
                if !inner.is_empty() && inner.bytes().all(|b| b.is_ascii_digit()) {
                    out.push('.');
                    out.push_str(inner);
                    // Skip until past the closing bracket.
                    while let Some(&(j, _)) = chars.peek() {
                        if j > i + close {
                            break;
                        }
                        chars.next();
                    }
                    continue;
                }
            }
        }
        out.push(c);
    }
    out
}

/// Coerce the right-hand side of a path expression into a JSON value:
/// quoted -> string, `true`/`false`/`null` literals, numeric parse, else
/// the raw string.
fn coerce_expected(raw: &str) -> Value {
    if (raw.starts_with('\'') && raw.ends_with('\'') && raw.len() >= 2)
        || (raw.starts_with('"') && raw.ends_with('"') && raw.len() >= 2)
    {
        return Value::String(raw[1..raw.len() - 1].to_string());
    }
    match raw {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        "null" => return Value::Null,
        _ => {}
    }
    if let Ok(n) = raw.parse::<f64>() {
        if let Some(num) = serde_json::Number::from_f64(n) {
            return Value::Number(num);
        }
    }
    Value::String(raw.to_string())
}

/// Loose (type-coercing) equality over the cases reachable through
/// [`coerce_expected`]: numbers, numeric strings and booleans compare by
/// numeric value; a missing value equals `null`; everything else is strict.
fn loose_eq(actual: Option<&Value>, expected: &Value) -> bool {
    let actual = match actual {
        Some(value) => value,
        // An absent path loosely equals an expected null.
        None => return expected.is_null(),
    };
    match (actual, expected) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::String(a), Value::String(b)) => a == b,
        _ => match (to_number(actual), to_number(expected)) {
            (Some(a), Some(b)) => a == b,
            _ => actual == expected,
        },
    }
}

fn to_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Partial deep-equality: every key/position present in `subset` must match
/// in `actual`. Arrays are prefix-aligned (order matters, the subset array
/// may not be longer than the actual one); extra keys in actual objects are
/// ignored.
pub fn is_subset(subset: &Value, actual: &Value) -> bool {
    match (subset, actual) {
        (Value::Array(sub_items), Value::Array(actual_items)) => sub_items
            .iter()
            .enumerate()
            .all(|(i, item)| actual_items.get(i).is_some_and(|a| is_subset(item, a))),
        (Value::Array(_), _) => false,
        (Value::Object(sub_map), Value::Object(actual_map)) => sub_map
            .iter()
            .all(|(key, value)| actual_map.get(key).is_some_and(|a| is_subset(value, a))),
        (Value::Object(_), _) => false,
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => subset == actual,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn test_existence_operator() {
        let rule = MatchRule::JsonPath("token");
        assert!(rule.matches_body(r#"{"token": "x"}"#));
        assert!(!rule.matches_body(r#"{"token": null}"#));
        assert!(!rule.matches_body("{}"));
    }

    #[test]
    fn test_loose_equality_coercion() {
        let rule = MatchRule::JsonPath("count == 0");
        assert!(rule.matches_body(r#"{"count": 0}"#));
        assert!(rule.matches_body(r#"{"count": "0"}"#));
        assert!(!rule.matches_body(r#"{"count": 1}"#));

        let rule = MatchRule::JsonPath("count != 0");
        assert!(rule.matches_body(r#"{"count": 1}"#));
        assert!(!rule.matches_body(r#"{"count": 0}"#));
    }

    #[test]
    fn test_quoted_and_literal_values() {
        assert!(MatchRule::JsonPath(r#"status == "active""#).matches_body(r#"{"status":"active"}"#));
        assert!(MatchRule::JsonPath("status == 'active'").matches_body(r#"{"status":"active"}"#));
        assert!(MatchRule::JsonPath("enabled == true").matches_body(r#"{"enabled": true}"#));
        assert!(MatchRule::JsonPath("missing == null").matches_body("{}"));
        assert!(MatchRule::JsonPath("value == null").matches_body(r#"{"value": null}"#));
    }

    #[test]
    fn test_operator_detection_prefers_not_equal() {
        // "!=" is found first even when "==" also appears later.
        let rule = MatchRule::JsonPath("a != b == c");
        // path "a", expected "b == c" (string); {"a": "x"} -> x != "b == c"
        assert!(rule.matches_body(r#"{"a": "x"}"#));
    }

    #[test]
    fn test_dot_path_with_bracket_indices() {
        let body = json!({"items": [{"id": 7}, {"id": 8}], "user": {"name": "ada"}});
        assert_eq!(get_object_value(&body, "items[0].id"), Some(&json!(7)));
        assert_eq!(get_object_value(&body, "items.1.id"), Some(&json!(8)));
        assert_eq!(get_object_value(&body, "$.user.name"), Some(&json!("ada")));
        assert_eq!(get_object_value(&body, "items[5].id"), None);
        assert_eq!(get_object_value(&body, ""), None);
    }

    #[test]
    fn test_regex_rule() {
        let rule = MatchRule::Regex(r#""kind"\s*:\s*"order""#);
        assert!(rule.matches_body(r#"{"kind": "order"}"#));
        assert!(!rule.matches_body(r#"{"kind": "user"}"#));
    }

    #[test]
    fn test_invalid_regex_is_non_match() {
        assert!(!MatchRule::Regex("([unclosed").matches_body("anything"));
    }

    #[test]
    fn test_subset_primitives_and_objects() {
        assert!(is_subset(&json!({"a": 1}), &json!({"a": 1, "b": 2})));
        assert!(!is_subset(&json!({"a": 1}), &json!({"a": 2})));
        assert!(!is_subset(&json!({"a": null}), &json!({})));
        assert!(is_subset(&json!({"a": null}), &json!({"a": null})));
        // Integer and float spellings of the same number are equal.
        assert!(is_subset(&json!({"a": 1}), &json!({"a": 1.0})));
    }

    #[test]
    fn test_subset_array_positionality() {
        let condition = json!({"items": [{"id": 1}]});
        assert!(is_subset(
            &condition,
            &json!({"items": [{"id": 1}, {"id": 2}]})
        ));
        assert!(!is_subset(
            &condition,
            &json!({"items": [{"id": 2}, {"id": 1}]})
        ));
        // Subset array longer than actual never matches.
        assert!(!is_subset(&json!([1, 2, 3]), &json!([1, 2])));
    }

    #[test]
    fn test_body_subset_rule_tolerates_bad_json() {
        let rule = MatchRule::BodySubset("{not json");
        assert!(!rule.matches_body(r#"{"a": 1}"#));
        let rule = MatchRule::BodySubset(r#"{"a": 1}"#);
        assert!(!rule.matches_body("{not json"));
    }

    #[test]
    fn test_header_rule() {
        let mut headers = HashMap::new();
        headers.insert("X-Api-Version".to_string(), "v2".to_string());

        let rule = MatchRule::HeaderEquals(r#"{"key": "x-api-version", "value": "v2"}"#);
        assert!(rule.matches_headers(&headers));

        let wrong_value = MatchRule::HeaderEquals(r#"{"key": "x-api-version", "value": "v1"}"#);
        assert!(!wrong_value.matches_headers(&headers));

        let empty_key = MatchRule::HeaderEquals(r#"{"key": "", "value": "v2"}"#);
        assert!(!empty_key.matches_headers(&headers));

        let malformed = MatchRule::HeaderEquals("not json");
        assert!(!malformed.matches_headers(&headers));
    }

    #[test]
    fn test_rule_construction_from_response() {
        let mut response = crate::catalog::MockResponse {
            id: "r1".into(),
            endpoint_id: "e1".into(),
            name: "r".into(),
            status_code: 200,
            headers: HashMap::new(),
            body: "{}".into(),
            delay: 0,
            delay_mode: Default::default(),
            delay_min: None,
            delay_max: None,
            match_type: Some(MatchType::Regex),
            match_expression: Some("abc".into()),
        };
        assert_eq!(MatchRule::query_rule(&response), MatchRule::Regex("abc"));

        response.match_expression = None;
        assert_eq!(MatchRule::query_rule(&response), MatchRule::None);
        assert_eq!(MatchRule::header_rule(&response), MatchRule::None);
    }
}
