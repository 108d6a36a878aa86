// Built-in rules

use crate::SyncRule;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::borrow::Cow;

// Common regex patterns
static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$").unwrap()
});

static URL_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^https?://[^\s/$.?#].[^\s]*$").unwrap());

/// Text form of a scalar value; `None` for arrays and objects.
fn as_text(value: &Value) -> Option<Cow<'_, str>> {
    match value {
        Value::String(s) => Some(Cow::Borrowed(s)),
        Value::Null => Some(Cow::Borrowed("")),
        Value::Number(n) => Some(Cow::Owned(n.to_string())),
        Value::Bool(b) => Some(Cow::Owned(b.to_string())),
        Value::Array(_) | Value::Object(_) => None,
    }
}

/// Length in characters for strings, in elements for arrays and objects.
fn length(value: &Value) -> usize {
    match value {
        Value::String(s) => s.chars().count(),
        Value::Array(items) => items.len(),
        Value::Object(map) => map.len(),
        Value::Null => 0,
        other => as_text(other).map_or(0, |t| t.chars().count()),
    }
}

fn first(values: &[Value]) -> &Value {
    values.first().unwrap_or(&Value::Null)
}

/// Value must not be null, blank, or an empty collection
pub struct NotEmpty;

impl SyncRule for NotEmpty {
    fn check(&self, values: &[Value]) -> Option<String> {
        let empty = match first(values) {
            Value::Null => true,
            Value::String(s) => s.trim().is_empty(),
            Value::Array(items) => items.is_empty(),
            Value::Object(map) => map.is_empty(),
            _ => false,
        };
        empty.then(|| "should not be empty".to_string())
    }
}

/// Minimum length
pub struct MinLength(pub usize);

impl SyncRule for MinLength {
    fn check(&self, values: &[Value]) -> Option<String> {
        (length(first(values)) < self.0).then(|| format!("must be at least {} characters", self.0))
    }
}

/// Maximum length
pub struct MaxLength(pub usize);

impl SyncRule for MaxLength {
    fn check(&self, values: &[Value]) -> Option<String> {
        (length(first(values)) > self.0).then(|| format!("must be at most {} characters", self.0))
    }
}

/// Email format; empty values pass (combine with [`NotEmpty`])
pub struct IsEmail;

impl SyncRule for IsEmail {
    fn check(&self, values: &[Value]) -> Option<String> {
        match as_text(first(values)) {
            Some(text) if text.is_empty() || EMAIL_REGEX.is_match(&text) => None,
            _ => Some("must be a valid email".to_string()),
        }
    }
}

/// URL format; empty values pass
pub struct IsUrl;

impl SyncRule for IsUrl {
    fn check(&self, values: &[Value]) -> Option<String> {
        match as_text(first(values)) {
            Some(text) if text.is_empty() || URL_REGEX.is_match(&text) => None,
            _ => Some("must be a valid URL".to_string()),
        }
    }
}

/// Custom regex over the text form of the value
pub struct Matches(pub Regex);

impl Matches {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self(Regex::new(pattern)?))
    }
}

impl SyncRule for Matches {
    fn check(&self, values: &[Value]) -> Option<String> {
        match as_text(first(values)) {
            Some(text) if self.0.is_match(&text) => None,
            _ => Some("does not match required pattern".to_string()),
        }
    }
}

/// Numeric value within `min..=max`; numeric strings are accepted
pub struct InRange {
    pub min: f64,
    pub max: f64,
}

impl SyncRule for InRange {
    fn check(&self, values: &[Value]) -> Option<String> {
        let number = match first(values) {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        match number {
            Some(n) if n >= self.min && n <= self.max => None,
            _ => Some(format!("must be between {} and {}", self.min, self.max)),
        }
    }
}

/// Keyed rule: every member value must be equal (e.g. password confirmation)
pub struct AllEqual;

impl SyncRule for AllEqual {
    fn check(&self, values: &[Value]) -> Option<String> {
        let mut iter = values.iter();
        let head = iter.next()?;
        iter.any(|v| v != head).then(|| "values do not match".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn passes(rule: &dyn SyncRule, value: Value) -> bool {
        rule.check(&[value]).is_none()
    }

    #[test]
    fn test_not_empty() {
        assert!(passes(&NotEmpty, json!("test")));
        assert!(!passes(&NotEmpty, json!("")));
        assert!(!passes(&NotEmpty, json!("\t\n  \r")));
        assert!(!passes(&NotEmpty, json!(null)));
        assert!(!passes(&NotEmpty, json!([])));
        assert!(passes(&NotEmpty, json!(0)));
    }

    #[test]
    fn test_min_length_exact() {
        let rule = MinLength(5);
        assert!(passes(&rule, json!("exact")));
        assert!(!passes(&rule, json!("four")));
        assert_eq!(
            rule.check(&[json!("hi")]).as_deref(),
            Some("must be at least 5 characters")
        );
    }

    #[test]
    fn test_max_length_counts_chars_and_items() {
        let rule = MaxLength(3);
        assert!(passes(&rule, json!("äöü")));
        assert!(!passes(&rule, json!("four")));
        assert!(!passes(&rule, json!([1, 2, 3, 4])));
    }

    #[test]
    fn test_email_variations() {
        assert!(passes(&IsEmail, json!("user+tag@example.com")));
        assert!(passes(&IsEmail, json!("user.name@example.co.uk")));
        assert!(passes(&IsEmail, json!("")));
        assert!(!passes(&IsEmail, json!("@example.com")));
        assert!(!passes(&IsEmail, json!("user@")));
        assert!(!passes(&IsEmail, json!(["a@b.c"])));
    }

    #[test]
    fn test_url_variations() {
        assert!(passes(&IsUrl, json!("https://example.com")));
        assert!(passes(&IsUrl, json!("http://test.com/path")));
        assert!(!passes(&IsUrl, json!("//example.com")));
    }

    #[test]
    fn test_matches() {
        let rule = Matches::new(r"^\d{3}-\d{4}$").unwrap();
        assert!(passes(&rule, json!("555-1234")));
        assert!(!passes(&rule, json!("5551234")));
    }

    #[test]
    fn test_in_range_boundaries() {
        let rule = InRange { min: 0.0, max: 10.0 };
        assert!(passes(&rule, json!(0)));
        assert!(passes(&rule, json!(10)));
        assert!(passes(&rule, json!("7.5")));
        assert!(!passes(&rule, json!(-1)));
        assert!(!passes(&rule, json!("eleven")));
    }

    #[test]
    fn test_all_equal() {
        assert!(AllEqual.check(&[json!("pw"), json!("pw")]).is_none());
        assert!(AllEqual.check(&[json!("pw"), json!("pW")]).is_some());
        assert!(AllEqual.check(&[]).is_none());
    }
}
