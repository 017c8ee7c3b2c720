//! Attack signature scanning.

use crate::config::ContentConfig;
use crate::error::{Result, SecurityError};
use crate::sanitize::find_in_strings;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;

/// Category of a known malicious input pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AttackCategory {
    /// Script or iframe injection.
    ScriptInjection,
    /// SQL injection keywords and tautologies.
    SqlInjection,
    /// Directory traversal sequences.
    PathTraversal,
}

impl AttackCategory {
    /// Category name for logs and error bodies.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ScriptInjection => "script-injection",
            Self::SqlInjection => "sql-injection",
            Self::PathTraversal => "path-traversal",
        }
    }
}

/// A compiled pattern with its category. Loaded once at startup.
#[derive(Debug)]
pub struct AttackSignature {
    /// Signature category.
    pub category: AttackCategory,
    pattern: Regex,
}

static SIGNATURES: Lazy<Vec<AttackSignature>> = Lazy::new(|| {
    let sig = |category, pattern: &str| AttackSignature {
        category,
        pattern: Regex::new(pattern).unwrap(),
    };
    vec![
        sig(AttackCategory::ScriptInjection, r"(?i)<script[^>]*>"),
        sig(AttackCategory::ScriptInjection, r"(?i)<iframe[^>]*>"),
        sig(AttackCategory::ScriptInjection, r"(?i)javascript:"),
        sig(AttackCategory::ScriptInjection, r#"(?i)\bon\w+\s*="#),
        sig(
            AttackCategory::SqlInjection,
            r"(?i)\b(SELECT|INSERT|UPDATE|DELETE|DROP|UNION|ALTER|TRUNCATE)\b.*\b(FROM|INTO|TABLE|DATABASE|SELECT)\b",
        ),
        sig(AttackCategory::SqlInjection, r"(?i)\b(OR|AND)\b\s+\d+\s*=\s*\d+"),
        sig(AttackCategory::SqlInjection, r"(?i);\s*(SELECT|INSERT|UPDATE|DELETE|DROP)\b"),
        sig(AttackCategory::SqlInjection, r"--\s"),
        sig(AttackCategory::PathTraversal, r"\.\./"),
        sig(AttackCategory::PathTraversal, r"\.\.\\"),
        sig(AttackCategory::PathTraversal, r"(?i)%2e%2e[/\\]"),
        sig(AttackCategory::PathTraversal, r"(?i)file://"),
    ]
});

/// Result of a positive scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttackMatch {
    /// Which signature category fired.
    pub category: AttackCategory,
    /// The string leaf that matched.
    ///
    /// Logged for audit. This may capture sensitive data supplied by the
    /// attacker, or legitimate text that happens to contain a keyword; the
    /// false-positive/privacy tension is a known tradeoff of auditing raw
    /// payloads.
    pub matched: String,
}

/// Scans structured input against the static signature tables.
#[derive(Debug, Clone)]
pub struct AttackDetector {
    config: ContentConfig,
}

impl AttackDetector {
    /// Create a detector from content configuration.
    #[must_use]
    pub fn new(config: ContentConfig) -> Self {
        Self { config }
    }

    /// Scan `value` and return the first signature match, if any.
    ///
    /// Uses the same depth-limited recursive walk as the sanitizer; the
    /// first match short-circuits the scan.
    ///
    /// # Errors
    /// Returns [`SecurityError::Validation`] when nesting exceeds the
    /// configured depth limit.
    pub fn scan(&self, value: &Value) -> Result<Option<AttackMatch>> {
        find_in_strings(value, self.config.max_depth, &|leaf: &str| {
            self.scan_str(leaf)
        })
    }

    /// Scan a single string leaf.
    #[must_use]
    pub fn scan_str(&self, input: &str) -> Option<AttackMatch> {
        SIGNATURES
            .iter()
            .filter(|s| self.enabled(s.category))
            .find(|s| s.pattern.is_match(input))
            .map(|s| AttackMatch {
                category: s.category,
                matched: input.to_string(),
            })
    }

    /// Scan and convert a match into the request-rejecting error, logging
    /// the match for audit.
    ///
    /// # Errors
    /// [`SecurityError::AttackDetected`] on a match,
    /// [`SecurityError::Validation`] on over-deep input.
    pub fn reject_if_matched(&self, value: &Value) -> Result<()> {
        if let Some(hit) = self.scan(value)? {
            tracing::warn!(
                category = hit.category.as_str(),
                matched = %hit.matched,
                "attack signature matched"
            );
            return Err(SecurityError::AttackDetected {
                category: hit.category.as_str().to_string(),
            });
        }
        Ok(())
    }

    fn enabled(&self, category: AttackCategory) -> bool {
        match category {
            AttackCategory::ScriptInjection => self.config.script_injection_detection,
            AttackCategory::SqlInjection => self.config.sql_injection_detection,
            AttackCategory::PathTraversal => self.config.path_traversal_detection,
        }
    }
}

impl Default for AttackDetector {
    fn default() -> Self {
        Self::new(ContentConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sanitize::Sanitizer;
    use serde_json::json;

    #[test]
    fn test_sql_injection_detected() {
        let detector = AttackDetector::default();
        let hit = detector
            .scan_str("1 OR 1=1 UNION SELECT * FROM users")
            .unwrap();
        assert_eq!(hit.category, AttackCategory::SqlInjection);
    }

    #[test]
    fn test_benign_text_passes() {
        let detector = AttackDetector::default();
        assert!(detector.scan_str("hello world").is_none());
        assert!(detector
            .scan_str("please select the best fertilizer for maize")
            .is_none());
    }

    #[test]
    fn test_script_injection_detected() {
        let detector = AttackDetector::default();
        assert_eq!(
            detector.scan_str("<script>alert(1)</script>").unwrap().category,
            AttackCategory::ScriptInjection
        );
        assert_eq!(
            detector.scan_str("<iframe src=x>").unwrap().category,
            AttackCategory::ScriptInjection
        );
    }

    #[test]
    fn test_path_traversal_detected() {
        let detector = AttackDetector::default();
        assert_eq!(
            detector.scan_str("../../etc/passwd").unwrap().category,
            AttackCategory::PathTraversal
        );
        assert_eq!(
            detector.scan_str("%2e%2e/secret").unwrap().category,
            AttackCategory::PathTraversal
        );
    }

    #[test]
    fn test_structured_scan() {
        let detector = AttackDetector::default();
        let value = json!({
            "crop": "barley",
            "notes": ["ok", { "deep": "1 OR 1=1 UNION SELECT * FROM users" }],
        });

        let hit = detector.scan(&value).unwrap().unwrap();
        assert_eq!(hit.category, AttackCategory::SqlInjection);

        let clean = json!({ "crop": "barley", "area": 12.5 });
        assert!(detector.scan(&clean).unwrap().is_none());
    }

    #[test]
    fn test_sanitized_input_no_longer_flags_script() {
        let detector = AttackDetector::default();
        let sanitizer = Sanitizer::default();

        let mut value = json!({ "q": "<script>alert(1)</script>" });
        assert!(detector.scan(&value).unwrap().is_some());

        sanitizer.sanitize(&mut value).unwrap();
        assert!(detector.scan(&value).unwrap().is_none());
    }

    #[test]
    fn test_disabled_category_is_skipped() {
        let detector = AttackDetector::new(ContentConfig {
            sql_injection_detection: false,
            ..ContentConfig::default()
        });
        assert!(detector
            .scan_str("1 OR 1=1 UNION SELECT * FROM users")
            .is_none());
    }

    #[test]
    fn test_reject_if_matched() {
        let detector = AttackDetector::default();
        let value = json!({ "path": "../../etc/shadow" });

        let result = detector.reject_if_matched(&value);
        assert!(matches!(
            result,
            Err(SecurityError::AttackDetected { ref category }) if category == "path-traversal"
        ));
    }
}
