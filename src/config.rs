//! Security configuration.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Environment variable prefix for all externally supplied material.
pub const ENV_PREFIX: &str = "FARMGATE_";

/// Top-level security configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Secret material configuration.
    #[serde(default)]
    pub secrets: SecretsConfig,

    /// Rate limiting profiles.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Sanitization and attack detection configuration.
    #[serde(default)]
    pub content: ContentConfig,

    /// Security headers configuration.
    #[serde(default)]
    pub headers: HeadersConfig,

    /// Allow-listed API keys for key-gated routes.
    #[serde(default)]
    pub api_keys: Vec<String>,

    /// Allow-listed CORS origins.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

impl SecurityConfig {
    /// Create a new config builder.
    #[must_use]
    pub fn builder() -> SecurityConfigBuilder {
        SecurityConfigBuilder::default()
    }

    /// Production preset: externally supplied secrets are mandatory.
    #[must_use]
    pub fn production() -> Self {
        Self {
            secrets: SecretsConfig {
                policy: SecretsPolicy::RequireConfigured,
                ..SecretsConfig::default()
            },
            ..Self::default()
        }
    }

    /// Development preset: missing secrets fall back to ephemeral material.
    #[must_use]
    pub fn development() -> Self {
        Self::default()
    }

    /// Load configuration from `FARMGATE_`-prefixed environment variables.
    ///
    /// Recognized variables: `FARMGATE_ACCESS_TOKEN_SECRET`,
    /// `FARMGATE_REFRESH_TOKEN_SECRET`, `FARMGATE_ENCRYPTION_KEY` (hex),
    /// `FARMGATE_API_KEYS` and `FARMGATE_CORS_ORIGINS` (comma-separated).
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(v) = std::env::var(format!("{ENV_PREFIX}ACCESS_TOKEN_SECRET")) {
            config.secrets.access_token_secret = Some(SecretString::new(v));
        }
        if let Ok(v) = std::env::var(format!("{ENV_PREFIX}REFRESH_TOKEN_SECRET")) {
            config.secrets.refresh_token_secret = Some(SecretString::new(v));
        }
        if let Ok(v) = std::env::var(format!("{ENV_PREFIX}ENCRYPTION_KEY")) {
            config.secrets.encryption_key_hex = Some(SecretString::new(v));
        }
        if let Ok(v) = std::env::var(format!("{ENV_PREFIX}API_KEYS")) {
            config.api_keys = split_list(&v);
        }
        if let Ok(v) = std::env::var(format!("{ENV_PREFIX}CORS_ORIGINS")) {
            config.cors_origins = split_list(&v);
        }

        config
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Builder for security configuration.
#[derive(Debug, Default)]
pub struct SecurityConfigBuilder {
    config: SecurityConfig,
}

impl SecurityConfigBuilder {
    /// Set secrets config.
    #[must_use]
    pub fn secrets(mut self, secrets: SecretsConfig) -> Self {
        self.config.secrets = secrets;
        self
    }

    /// Set rate limit config.
    #[must_use]
    pub fn rate_limit(mut self, rate_limit: RateLimitConfig) -> Self {
        self.config.rate_limit = rate_limit;
        self
    }

    /// Set content config.
    #[must_use]
    pub fn content(mut self, content: ContentConfig) -> Self {
        self.config.content = content;
        self
    }

    /// Set headers config.
    #[must_use]
    pub fn headers(mut self, headers: HeadersConfig) -> Self {
        self.config.headers = headers;
        self
    }

    /// Set the API key allow-list.
    #[must_use]
    pub fn api_keys(mut self, keys: Vec<String>) -> Self {
        self.config.api_keys = keys;
        self
    }

    /// Set the CORS origin allow-list.
    #[must_use]
    pub fn cors_origins(mut self, origins: Vec<String>) -> Self {
        self.config.cors_origins = origins;
        self
    }

    /// Build the configuration.
    #[must_use]
    pub fn build(self) -> SecurityConfig {
        self.config
    }
}

/// Policy for handling missing secret material at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecretsPolicy {
    /// Generate ephemeral material when none is configured.
    ///
    /// Tokens issued by one process instance cannot be verified by another
    /// instance or across a restart. Development only.
    #[default]
    AllowEphemeral,

    /// Fail startup when any secret material is missing.
    RequireConfigured,
}

/// Secret material configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecretsConfig {
    /// Signing secret for access tokens.
    #[serde(default, skip_serializing)]
    pub access_token_secret: Option<SecretString>,

    /// Signing secret for refresh tokens.
    #[serde(default, skip_serializing)]
    pub refresh_token_secret: Option<SecretString>,

    /// Hex-encoded 32-byte symmetric encryption key.
    #[serde(default, skip_serializing)]
    pub encryption_key_hex: Option<SecretString>,

    /// Missing-material policy.
    #[serde(default)]
    pub policy: SecretsPolicy,
}

/// Settings for one rate-limit profile.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ProfileSettings {
    /// Window duration.
    #[serde(with = "humantime_serde")]
    pub window: Duration,

    /// Maximum requests per key per window.
    pub limit: u32,
}

impl ProfileSettings {
    /// Human-readable window remainder hint, e.g. "15 minutes".
    #[must_use]
    pub fn retry_after_hint(&self) -> String {
        let secs = self.window.as_secs();
        if secs >= 60 {
            let minutes = secs / 60;
            if minutes == 1 {
                "1 minute".to_string()
            } else {
                format!("{minutes} minutes")
            }
        } else if secs == 1 {
            "1 second".to_string()
        } else {
            format!("{secs} seconds")
        }
    }
}

/// Rate limiting configuration: three independent named profiles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Broad per-key limit for ordinary routes.
    #[serde(default = "default_general")]
    pub general: ProfileSettings,

    /// Login attempt limit; successful attempts are excluded.
    #[serde(default = "default_auth")]
    pub auth: ProfileSettings,

    /// Limit guarding expensive AI-backed routes.
    #[serde(default = "default_inference")]
    pub inference: ProfileSettings,
}

fn default_general() -> ProfileSettings {
    ProfileSettings {
        window: Duration::from_secs(15 * 60),
        limit: 100,
    }
}

fn default_auth() -> ProfileSettings {
    ProfileSettings {
        window: Duration::from_secs(15 * 60),
        limit: 5,
    }
}

fn default_inference() -> ProfileSettings {
    ProfileSettings {
        window: Duration::from_secs(60),
        limit: 10,
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            general: default_general(),
            auth: default_auth(),
            inference: default_inference(),
        }
    }
}

/// Sanitization and attack detection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentConfig {
    /// Maximum recursion depth when walking structured input.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Enable script/markup injection detection.
    #[serde(default = "default_true")]
    pub script_injection_detection: bool,

    /// Enable SQL injection detection.
    #[serde(default = "default_true")]
    pub sql_injection_detection: bool,

    /// Enable path traversal detection.
    #[serde(default = "default_true")]
    pub path_traversal_detection: bool,
}

fn default_max_depth() -> usize {
    32
}

fn default_true() -> bool {
    true
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            script_injection_detection: true,
            sql_injection_detection: true,
            path_traversal_detection: true,
        }
    }
}

/// Security headers configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeadersConfig {
    /// Send `Strict-Transport-Security`.
    #[serde(default = "default_true")]
    pub hsts_enabled: bool,

    /// HSTS max-age in seconds.
    #[serde(default = "default_hsts_max_age")]
    pub hsts_max_age: u64,

    /// Send `X-Content-Type-Options: nosniff`.
    #[serde(default = "default_true")]
    pub nosniff: bool,

    /// `X-Frame-Options` value.
    #[serde(default = "default_frame_options")]
    pub frame_options: String,
}

fn default_hsts_max_age() -> u64 {
    31_536_000 // one year
}

fn default_frame_options() -> String {
    "DENY".to_string()
}

impl Default for HeadersConfig {
    fn default() -> Self {
        Self {
            hsts_enabled: true,
            hsts_max_age: default_hsts_max_age(),
            nosniff: true,
            frame_options: default_frame_options(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_profiles_match_contract() {
        let config = RateLimitConfig::default();
        assert_eq!(config.general.limit, 100);
        assert_eq!(config.general.window, Duration::from_secs(900));
        assert_eq!(config.auth.limit, 5);
        assert_eq!(config.auth.window, Duration::from_secs(900));
        assert_eq!(config.inference.limit, 10);
        assert_eq!(config.inference.window, Duration::from_secs(60));
    }

    #[test]
    fn test_retry_after_hint() {
        assert_eq!(default_general().retry_after_hint(), "15 minutes");
        assert_eq!(default_inference().retry_after_hint(), "1 minute");
        let short = ProfileSettings {
            window: Duration::from_secs(30),
            limit: 1,
        };
        assert_eq!(short.retry_after_hint(), "30 seconds");
    }

    #[test]
    fn test_builder() {
        let config = SecurityConfig::builder()
            .api_keys(vec!["key-1".to_string()])
            .cors_origins(vec!["https://app.farmgate.example".to_string()])
            .build();

        assert_eq!(config.api_keys, vec!["key-1"]);
        assert_eq!(config.cors_origins.len(), 1);
    }

    #[test]
    fn test_production_preset_requires_secrets() {
        let config = SecurityConfig::production();
        assert_eq!(config.secrets.policy, SecretsPolicy::RequireConfigured);

        let dev = SecurityConfig::development();
        assert_eq!(dev.secrets.policy, SecretsPolicy::AllowEphemeral);
    }

    #[test]
    fn test_split_list() {
        assert_eq!(split_list("a, b ,c,,"), vec!["a", "b", "c"]);
        assert!(split_list("").is_empty());
    }

    #[test]
    fn test_content_defaults() {
        let content = ContentConfig::default();
        assert_eq!(content.max_depth, 32);
        assert!(content.sql_injection_detection);
    }
}
