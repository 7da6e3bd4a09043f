//! Event filter matching
//!
//! A filter is a set of `property → text` constraints evaluated against the
//! arguments of a pushed event. All constraints must hold:
//!
//! - an empty filter matches everything, even absent arguments
//! - a non-empty filter never matches absent (or `null`) arguments
//! - a property missing from the arguments never matches
//! - an empty constraint matches any present value, `null` included
//! - exact equality with the value's text form matches
//! - otherwise the value's JSON type picks the comparison:
//!   - strings: case-insensitive substring ([`string_matches`])
//!   - numbers: comma-separated alternatives ([`number_matches`])
//!   - booleans: case- and whitespace-insensitive ([`bool_matches`])
//!   - anything else: no match
//!
//! # Examples
//!
//! ```rust
//! use jsonservices_client::EventFilter;
//! use serde_json::json;
//!
//! let filter = EventFilter::new().with("Name", "jill").with("Age", "30,31");
//! assert!(filter.matches(Some(&json!({"Name": "BGWJJILLIGKKK", "Age": 31}))));
//! assert!(!filter.matches(Some(&json!({"Name": "Bozo", "Age": 31}))));
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::collections::BTreeMap;

/// Property constraints applied to event arguments
///
/// Serializes as a flat JSON object, the shape the server expects in a
/// subscription descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventFilter(BTreeMap<String, String>);

impl EventFilter {
    /// An empty filter, which matches everything
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a constraint
    pub fn with(mut self, property: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(property.into(), value.into());
        self
    }

    /// Whether the filter has no constraints
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Evaluate the filter against event arguments
    pub fn matches(&self, event_args: Option<&Value>) -> bool {
        matches(Some(self), event_args)
    }
}

impl From<BTreeMap<String, String>> for EventFilter {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }
}

impl From<EventFilter> for BTreeMap<String, String> {
    fn from(filter: EventFilter) -> Self {
        filter.0
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for EventFilter {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Evaluate an optional filter against optional event arguments
pub fn matches(filter: Option<&EventFilter>, event_args: Option<&Value>) -> bool {
    let filter = match filter {
        Some(filter) if !filter.is_empty() => filter,
        _ => return true,
    };

    let args = match event_args {
        Some(Value::Null) | None => return false,
        Some(args) => args,
    };

    filter
        .0
        .iter()
        .all(|(property, constraint)| value_matches(constraint, args.get(property)))
}

/// Evaluate one constraint against one property value
///
/// `None` stands for a property missing from the arguments.
pub fn value_matches(filter: &str, value: Option<&Value>) -> bool {
    let Some(value) = value else {
        return false;
    };

    if filter.is_empty() {
        return true;
    }

    if text_form(value).as_deref() == Some(filter) {
        return true;
    }

    match value {
        Value::String(s) => string_matches(Some(filter), Some(s)),
        Value::Number(n) => number_matches(Some(filter), Some(n)),
        Value::Bool(b) => bool_matches(Some(filter), Some(*b)),
        _ => false,
    }
}

/// Case-insensitive substring containment of `filter` within `value`
///
/// Absent inputs behave as empty strings.
pub fn string_matches(filter: Option<&str>, value: Option<&str>) -> bool {
    let filter = filter.unwrap_or_default().to_lowercase();
    let value = value.unwrap_or_default().to_lowercase();
    value.contains(&filter)
}

/// Whether one comma-separated alternative of `filter` equals the number's text
///
/// An empty filter matches; an absent number only matches an empty filter.
pub fn number_matches(filter: Option<&str>, value: Option<&Number>) -> bool {
    let filter = filter.unwrap_or_default();
    if filter.is_empty() {
        return true;
    }

    let Some(value) = value else {
        return false;
    };

    let text = number_text(value);
    filter.to_lowercase().split(',').any(|alternative| alternative == text)
}

/// Case- and whitespace-insensitive comparison with `"true"` / `"false"`
///
/// An empty filter matches; an absent value compares as `false`.
pub fn bool_matches(filter: Option<&str>, value: Option<bool>) -> bool {
    let filter = filter.unwrap_or_default();
    if filter.is_empty() {
        return true;
    }

    let text = if value.unwrap_or(false) { "true" } else { "false" };
    filter.trim().to_lowercase() == text
}

/// Text form of a scalar used by the exact-equality fast path
///
/// `null` renders as the empty string so that a non-empty constraint never
/// matches it; arrays and objects have no text form.
fn text_form(value: &Value) -> Option<String> {
    match value {
        Value::Null => Some(String::new()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(number_text(n)),
        Value::String(s) => Some(s.clone()),
        Value::Array(_) | Value::Object(_) => None,
    }
}

/// Locale-free decimal rendering; integral floats drop their fraction
fn number_text(n: &Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    match n.as_f64() {
        Some(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 => (f as i64).to_string(),
        Some(f) => f.to_string(),
        None => n.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn num(value: Value) -> Number {
        match value {
            Value::Number(n) => n,
            other => panic!("not a number: {}", other),
        }
    }

    #[test]
    fn test_empty_or_missing_filter_matches_everything() {
        assert!(matches(None, None));
        assert!(matches(None, Some(&json!({"a": 1}))));
        assert!(matches(Some(&EventFilter::new()), None));
        assert!(matches(Some(&EventFilter::new()), Some(&Value::Null)));
    }

    #[test]
    fn test_non_empty_filter_rejects_missing_args() {
        let filter = EventFilter::new().with("Name", "");
        assert!(!filter.matches(None));
        assert!(!filter.matches(Some(&Value::Null)));
    }

    #[test]
    fn test_missing_property_never_matches() {
        let filter = EventFilter::new().with("Name", "");
        assert!(!filter.matches(Some(&json!({"Other": "x"}))));
    }

    #[test]
    fn test_empty_constraint_matches_null_property() {
        let filter = EventFilter::new().with("Name", "");
        assert!(filter.matches(Some(&json!({"Name": null}))));
    }

    #[test]
    fn test_null_text_does_not_match_null_value() {
        let filter = EventFilter::new().with("Name", "null");
        assert!(!filter.matches(Some(&json!({"Name": null}))));
    }

    #[test]
    fn test_string_substring_case_insensitive() {
        let filter = EventFilter::new().with("Name", "jill");
        assert!(filter.matches(Some(&json!({"Name": "BGWJJILLIGKKK"}))));
        assert!(!filter.matches(Some(&json!({"Name": "Bozo"}))));
    }

    #[test]
    fn test_conjunction_over_keys() {
        let filter = EventFilter::new().with("Name", "jill").with("Active", "true");
        assert!(filter.matches(Some(&json!({"Name": "Jill", "Active": true}))));
        assert!(!filter.matches(Some(&json!({"Name": "Jill", "Active": false}))));
        assert!(!filter.matches(Some(&json!({"Name": "Jill"}))));
    }

    #[test]
    fn test_number_alternatives() {
        let filter = EventFilter::new().with("Id", "1,2,45.67");
        assert!(filter.matches(Some(&json!({"Id": 2}))));
        assert!(filter.matches(Some(&json!({"Id": 45.67}))));
        assert!(!filter.matches(Some(&json!({"Id": 3}))));
        assert!(EventFilter::new().with("Id", "0").matches(Some(&json!({"Id": 0}))));
    }

    #[test]
    fn test_number_matches_helper() {
        assert!(number_matches(None, None));
        assert!(number_matches(Some(""), Some(&num(json!(12)))));
        assert!(number_matches(Some("123,45.67"), Some(&num(json!(45.67)))));
        assert!(number_matches(Some("123"), Some(&num(json!(123)))));
        assert!(!number_matches(Some("123"), None));
        assert!(!number_matches(Some("12"), Some(&num(json!(123)))));
        assert!(number_matches(Some("10"), Some(&num(json!(10.0)))));
    }

    #[test]
    fn test_bool_matches_helper() {
        assert!(bool_matches(None, None));
        assert!(bool_matches(Some("TRUE"), Some(true)));
        assert!(bool_matches(Some("  True "), Some(true)));
        assert!(!bool_matches(Some("false"), Some(true)));
        assert!(bool_matches(Some("false"), None));
        assert!(!bool_matches(Some("true"), Some(false)));
    }

    #[test]
    fn test_string_matches_helper() {
        assert!(string_matches(None, None));
        assert!(string_matches(Some("foo"), Some("SomeFoo")));
        assert!(!string_matches(Some("goo"), Some("SomeFoo")));
        assert!(string_matches(Some(""), Some("anything")));
        assert!(!string_matches(Some("x"), None));
    }

    #[test]
    fn test_exact_text_fast_path() {
        assert!(value_matches("true", Some(&json!(true))));
        assert!(value_matches("42", Some(&json!(42))));
        assert!(!value_matches("[]", Some(&json!([]))));
        assert!(!value_matches("a", Some(&json!({"a": 1}))));
    }

    #[test]
    fn test_filter_serializes_flat() {
        let filter: EventFilter = [("Name", "jill")].into_iter().collect();
        assert_eq!(serde_json::to_value(&filter).unwrap(), json!({"Name": "jill"}));
    }
}
