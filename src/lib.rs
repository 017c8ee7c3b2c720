//! # FarmGate Security
//!
//! Trust and access-control layer for the FarmGate agriculture platform.
//!
//! ## Features
//!
//! - **Credential Verification**: Argon2id password hashing
//! - **Signed Tokens**: access/refresh JWT issuance and verification
//! - **Role Authorization**: admin / agronomist / farmer role checks
//! - **Rate Limiting**: per-client windows with named profiles
//! - **Input Hygiene**: recursive sanitization and attack-signature scanning
//! - **Field Encryption**: AES-256-GCM for sensitive stored values
//! - **Security Headers**: HSTS, nosniff, X-Frame-Options, CORS
//!
//! ## Example
//!
//! ```rust,no_run
//! use farmgate_security::{RouteGuard, SecurityConfig, SecurityState};
//!
//! let config = SecurityConfig::from_env();
//! let state = SecurityState::from_config(&config).unwrap();
//! let guard = RouteGuard::authenticated();
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod crypto;
pub mod detect;
pub mod error;
pub mod guard;
pub mod headers;
pub mod password;
pub mod rate_limit;
pub mod sanitize;
pub mod secrets;
pub mod token;

pub use config::{SecurityConfig, SecurityConfigBuilder, SecretsPolicy};
pub use crypto::{EncryptedField, FieldCipher};
pub use detect::{AttackCategory, AttackDetector, AttackMatch};
pub use error::{Result, SecurityError};
pub use guard::{GuardedRoute, PrincipalExt, RequestContext, RouteGuard, SecurityState};
pub use headers::{SecurityHeaders, SecurityHeadersLayer};
pub use password::PasswordVault;
pub use rate_limit::{RateLimitProfile, RateLimiter};
pub use sanitize::Sanitizer;
pub use secrets::SecretStore;
pub use token::{Principal, PrincipalClaims, Role, TokenKind, TokenPair, TokenService};
