//! Security error types.

use serde_json::json;

/// Result type for security operations.
pub type Result<T> = std::result::Result<T, SecurityError>;

/// Security error type.
///
/// Every variant is terminal for the current request: the cause is
/// client-supplied (bad credential, excessive rate, malicious payload),
/// so nothing here is retried.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SecurityError {
    /// No bearer token on a route that requires one.
    #[error("Access token required")]
    MissingToken,

    /// Token failed signature, issuer, audience, or kind checks.
    #[error("Invalid or expired token")]
    InvalidToken,

    /// Token passed every check except expiry.
    #[error("Invalid or expired token")]
    ExpiredToken,

    /// Authorization was evaluated without a verified principal.
    #[error("Authentication required")]
    NotAuthenticated,

    /// Principal role is not in the route's allowed set.
    #[error("Insufficient permissions")]
    InsufficientPermissions,

    /// Request count exceeded a rate-limit profile.
    #[error("Too many requests, retry after {retry_after}")]
    RateLimited {
        /// Human-readable hint for when the window resets.
        retry_after: String,
    },

    /// Request content matched an attack signature.
    #[error("Malicious content detected: {category}")]
    AttackDetected {
        /// Signature category that matched.
        category: String,
    },

    /// No API key on a key-gated route.
    #[error("API key required")]
    MissingApiKey,

    /// API key not in the configured allow-list.
    #[error("Invalid API key")]
    InvalidApiKey,

    /// Input exceeded limits before any guard could evaluate it.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Encryption failure.
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// Malformed or tampered ciphertext on decrypt.
    #[error("Decryption error: {0}")]
    Decryption(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl SecurityError {
    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a config error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Check if error is a client error (4xx).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            Self::Encryption(_) | Self::Decryption(_) | Self::Config(_)
        )
    }

    /// Get HTTP status code for this error.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::MissingToken
            | Self::InvalidToken
            | Self::ExpiredToken
            | Self::NotAuthenticated
            | Self::MissingApiKey
            | Self::InvalidApiKey => 401,
            Self::InsufficientPermissions => 403,
            Self::RateLimited { .. } => 429,
            Self::AttackDetected { .. } | Self::Validation(_) => 400,
            Self::Encryption(_) | Self::Decryption(_) | Self::Config(_) => 500,
        }
    }

    /// Get the wire error code for the `{error, code}` response body.
    ///
    /// Expired tokens share `INVALID_TOKEN` with invalid ones: the wire
    /// contract does not distinguish them, only the library surface does.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::MissingToken => "MISSING_TOKEN",
            Self::InvalidToken | Self::ExpiredToken => "INVALID_TOKEN",
            Self::NotAuthenticated => "NOT_AUTHENTICATED",
            Self::InsufficientPermissions => "INSUFFICIENT_PERMISSIONS",
            Self::RateLimited { .. } => "RATE_LIMITED",
            Self::AttackDetected { .. } => "ATTACK_DETECTED",
            Self::MissingApiKey => "MISSING_API_KEY",
            Self::InvalidApiKey => "INVALID_API_KEY",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Encryption(_) | Self::Decryption(_) => "ENCRYPTION_ERROR",
            Self::Config(_) => "CONFIGURATION_ERROR",
        }
    }

    /// Build the JSON response body for this error.
    #[must_use]
    pub fn to_body(&self) -> serde_json::Value {
        match self {
            Self::RateLimited { retry_after } => json!({
                "error": self.to_string(),
                "code": self.error_code(),
                "retryAfter": retry_after,
            }),
            _ => json!({
                "error": self.to_string(),
                "code": self.error_code(),
            }),
        }
    }
}
