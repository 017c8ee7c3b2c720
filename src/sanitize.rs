//! Recursive input sanitization.
//!
//! Structured input is modeled as a tagged value (string / sequence /
//! mapping / other) and walked by one depth-limited recursive visitor;
//! the attack detector in [`crate::detect`] reuses the same walk.

use crate::error::{Result, SecurityError};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// Script-tag blocks, tags included.
static SCRIPT_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<script[^>]*>.*?</script>").unwrap());

/// Unclosed or orphaned script tags left after block removal.
static SCRIPT_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)</?script[^>]*>").unwrap());

/// `javascript:`-scheme references.
static JS_SCHEME: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)javascript:").unwrap());

/// Inline event-handler attribute assignments, e.g. `onerror=`.
static EVENT_HANDLER: Lazy<Regex> = Lazy::new(|| Regex::new(r#"(?i)\bon\w+\s*="#).unwrap());

/// Apply `f` to every string leaf of `value`, depth-first.
///
/// # Errors
/// Returns [`SecurityError::Validation`] when nesting exceeds `max_depth`;
/// maliciously deep input is rejected rather than partially processed.
pub fn for_each_string_mut<F>(value: &mut Value, max_depth: usize, f: &mut F) -> Result<()>
where
    F: FnMut(&mut String),
{
    if max_depth == 0 {
        return Err(SecurityError::validation("Input nesting too deep"));
    }

    match value {
        Value::String(s) => f(s),
        Value::Array(items) => {
            for item in items {
                for_each_string_mut(item, max_depth - 1, f)?;
            }
        }
        Value::Object(map) => {
            for (_, item) in map.iter_mut() {
                for_each_string_mut(item, max_depth - 1, f)?;
            }
        }
        // Numbers, booleans, null pass through unchanged.
        _ => {}
    }

    Ok(())
}

/// Visit every string leaf of `value`, stopping at the first `Some` result.
///
/// # Errors
/// Returns [`SecurityError::Validation`] when nesting exceeds `max_depth`.
pub fn find_in_strings<T, F>(value: &Value, max_depth: usize, f: &F) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<T>,
{
    if max_depth == 0 {
        return Err(SecurityError::validation("Input nesting too deep"));
    }

    match value {
        Value::String(s) => Ok(f(s)),
        Value::Array(items) => {
            for item in items {
                if let Some(found) = find_in_strings(item, max_depth - 1, f)? {
                    return Ok(Some(found));
                }
            }
            Ok(None)
        }
        Value::Object(map) => {
            for item in map.values() {
                if let Some(found) = find_in_strings(item, max_depth - 1, f)? {
                    return Ok(Some(found));
                }
            }
            Ok(None)
        }
        _ => Ok(None),
    }
}

/// Strips dangerous markup and script fragments from structured input.
#[derive(Debug, Clone)]
pub struct Sanitizer {
    max_depth: usize,
}

impl Sanitizer {
    /// Create a sanitizer with the given recursion depth limit.
    #[must_use]
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    /// Remove script blocks, `javascript:` schemes, and inline event
    /// handlers from every string leaf; non-string leaves pass through.
    ///
    /// # Errors
    /// Returns [`SecurityError::Validation`] when nesting exceeds the limit.
    pub fn sanitize(&self, value: &mut Value) -> Result<()> {
        for_each_string_mut(value, self.max_depth, &mut |s| {
            let cleaned = sanitize_str(s);
            if cleaned != *s {
                *s = cleaned;
            }
        })
    }
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self::new(crate::config::ContentConfig::default().max_depth)
    }
}

/// Sanitize a single string value.
#[must_use]
pub fn sanitize_str(input: &str) -> String {
    let result = SCRIPT_BLOCK.replace_all(input, "");
    let result = SCRIPT_TAG.replace_all(&result, "");
    let result = JS_SCHEME.replace_all(&result, "");
    EVENT_HANDLER.replace_all(&result, "").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_strips_script_blocks() {
        assert_eq!(sanitize_str("<script>alert(1)</script>"), "");
        assert_eq!(
            sanitize_str("before<script type=\"text/javascript\">x()</script>after"),
            "beforeafter"
        );
    }

    #[test]
    fn test_strips_js_scheme_and_handlers() {
        assert_eq!(sanitize_str("javascript:alert(1)"), "alert(1)");
        assert_eq!(sanitize_str("<img onerror=alert(1)>"), "<img alert(1)>");
        assert_eq!(sanitize_str("a onclick = doEvil()"), "a doEvil()");
    }

    #[test]
    fn test_unrelated_text_unchanged() {
        let text = "wheat yield for field 12 was 6.4 t/ha";
        assert_eq!(sanitize_str(text), text);
    }

    #[test]
    fn test_recursive_sanitize() {
        let sanitizer = Sanitizer::default();
        let mut value = json!({
            "q": "<script>alert(1)</script>",
            "notes": ["fine", "javascript:run()"],
            "nested": { "field": "onload=x" },
            "count": 3,
            "flag": true,
        });

        sanitizer.sanitize(&mut value).unwrap();

        assert_eq!(value["q"], "");
        assert_eq!(value["notes"][0], "fine");
        assert_eq!(value["notes"][1], "run()");
        assert_eq!(value["nested"]["field"], "x");
        assert_eq!(value["count"], 3);
        assert_eq!(value["flag"], true);
    }

    #[test]
    fn test_depth_limit_rejects_deep_input() {
        let sanitizer = Sanitizer::new(4);
        let mut deep = json!("leaf");
        for _ in 0..6 {
            deep = json!([deep]);
        }

        let result = sanitizer.sanitize(&mut deep);
        assert!(matches!(result, Err(SecurityError::Validation(_))));
    }

    #[test]
    fn test_depth_limit_allows_shallow_input() {
        let sanitizer = Sanitizer::new(4);
        let mut shallow = json!({ "a": ["b"] });
        assert!(sanitizer.sanitize(&mut shallow).is_ok());
    }

    #[test]
    fn test_find_in_strings_short_circuits() {
        let value = json!({ "a": "clean", "b": ["also clean", "needle here"] });
        let found = find_in_strings(&value, 32, &|s: &str| {
            s.contains("needle").then(|| s.to_string())
        })
        .unwrap();
        assert_eq!(found.as_deref(), Some("needle here"));

        let missing =
            find_in_strings(&value, 32, &|s: &str| s.contains("absent").then_some(())).unwrap();
        assert!(missing.is_none());
    }
}
