use std::cmp::Ordering;

use serde_json::Value;

/// A compiled predicate over one stored record.
///
/// Field names address top-level keys of the record's JSON form; a dotted
/// path (`credential.username`) walks into nested objects.
#[derive(Debug, Clone, PartialEq)]
pub enum Matcher {
    /// Matches every record.
    All,
    /// Field equals the value. Numbers compare by value, not representation.
    Eq(String, Value),
    /// Case-insensitive substring match against the field's text form.
    Like(String, String),
    Not(Box<Matcher>),
    And(Vec<Matcher>),
    Or(Vec<Matcher>),
}

impl Matcher {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Matcher::Eq(field.into(), value.into())
    }

    pub fn like(field: impl Into<String>, needle: impl Into<String>) -> Self {
        Matcher::Like(field.into(), needle.into())
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(inner: Matcher) -> Self {
        Matcher::Not(Box::new(inner))
    }

    pub fn and(matchers: Vec<Matcher>) -> Self {
        Matcher::And(matchers)
    }

    pub fn or(matchers: Vec<Matcher>) -> Self {
        Matcher::Or(matchers)
    }

    /// Evaluate against a record's JSON form.
    pub fn matches(&self, doc: &Value) -> bool {
        match self {
            Matcher::All => true,
            Matcher::Eq(field, expected) => match lookup(doc, field) {
                Some(actual) => values_equal(actual, expected),
                None => expected.is_null(),
            },
            Matcher::Like(field, needle) => lookup(doc, field)
                .and_then(text_of)
                .map(|text| text.to_lowercase().contains(&needle.to_lowercase()))
                .unwrap_or(false),
            Matcher::Not(inner) => !inner.matches(doc),
            Matcher::And(all) => all.iter().all(|m| m.matches(doc)),
            Matcher::Or(any) => any.iter().any(|m| m.matches(doc)),
        }
    }
}

/// Resolve a (possibly dotted) field path inside a JSON document.
pub fn lookup<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = doc;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x == y,
            _ => x.as_f64() == y.as_f64(),
        },
        _ => a == b,
    }
}

/// Total order used by `Query::order_by`. Missing and null values sort first.
pub(crate) fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let rank = |v: Option<&Value>| match v {
        None | Some(Value::Null) => 0,
        Some(Value::Bool(_)) => 1,
        Some(Value::Number(_)) => 2,
        Some(Value::String(_)) => 3,
        Some(_) => 4,
    };
    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => x
                .as_f64()
                .partial_cmp(&y.as_f64())
                .unwrap_or(Ordering::Equal),
        },
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}
