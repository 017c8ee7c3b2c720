//! Signed token issuance and verification.

use crate::error::{Result, SecurityError};
use crate::secrets::SecretStore;
use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Issuer claim stamped into every token.
pub const ISSUER: &str = "farmgate-platform";

/// Audience claim stamped into every token.
pub const AUDIENCE: &str = "farmgate-clients";

/// Access token lifetime.
pub const ACCESS_TTL: Duration = Duration::from_secs(15 * 60);

/// Refresh token lifetime.
pub const REFRESH_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Token kind. Each kind is signed with its own secret and TTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    /// Short-lived credential presented on every request.
    Access,
    /// Long-lived credential exchanged for new access tokens.
    Refresh,
}

impl TokenKind {
    /// Lifetime for this kind.
    #[must_use]
    pub fn ttl(self) -> Duration {
        match self {
            Self::Access => ACCESS_TTL,
            Self::Refresh => REFRESH_TTL,
        }
    }
}

/// Closed set of platform roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Full platform administration.
    Admin,
    /// Advisory access across farmer accounts.
    Agronomist,
    /// Standard account holder.
    Farmer,
}

impl Role {
    /// Whether this role may manage other accounts.
    #[must_use]
    pub fn can_manage_accounts(self) -> bool {
        matches!(self, Self::Admin)
    }

    /// Whether this role may read data belonging to other accounts.
    #[must_use]
    pub fn can_read_foreign_data(self) -> bool {
        matches!(self, Self::Admin | Self::Agronomist)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Admin => "admin",
            Self::Agronomist => "agronomist",
            Self::Farmer => "farmer",
        };
        f.write_str(name)
    }
}

/// Identity claims supplied by the caller at issuance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalClaims {
    /// Stable user identifier.
    pub user_id: String,
    /// Platform role.
    pub role: Role,
}

/// The authenticated identity attached to a request after verification.
///
/// Immutable once constructed; lives for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    /// Stable user identifier.
    pub user_id: String,
    /// Platform role.
    pub role: Role,
    /// When the presented token was issued.
    pub issued_at: DateTime<Utc>,
    /// When the presented token expires.
    pub expires_at: DateTime<Utc>,
}

/// An issued access/refresh token pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    /// Access token, 15 minute TTL.
    pub access_token: String,
    /// Refresh token, 7 day TTL.
    pub refresh_token: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    role: String,
    kind: TokenKind,
    iss: String,
    aud: String,
    iat: i64,
    exp: i64,
}

/// Issues and verifies signed tokens against the [`SecretStore`].
pub struct TokenService<'a> {
    secrets: &'a SecretStore,
}

impl<'a> TokenService<'a> {
    /// Create a token service backed by the given secret store.
    #[must_use]
    pub fn new(secrets: &'a SecretStore) -> Self {
        Self { secrets }
    }

    /// Sign the claims into an access/refresh token pair.
    ///
    /// # Errors
    /// Returns [`SecurityError::Config`] if signing fails.
    pub fn issue(&self, claims: &PrincipalClaims) -> Result<TokenPair> {
        let now = Utc::now();
        Ok(TokenPair {
            access_token: self.sign(claims, TokenKind::Access, now)?,
            refresh_token: self.sign(claims, TokenKind::Refresh, now)?,
        })
    }

    /// Verify a token of the expected kind and produce its [`Principal`].
    ///
    /// # Errors
    /// [`SecurityError::ExpiredToken`] when only the expiry check fails;
    /// [`SecurityError::InvalidToken`] for any other mismatch (signature,
    /// issuer, audience, kind, malformed payload, unknown role).
    pub fn verify(&self, token: &str, kind: TokenKind) -> Result<Principal> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_issuer(&[ISSUER]);
        validation.set_audience(&[AUDIENCE]);

        let key = DecodingKey::from_secret(self.secrets.signing_secret(kind));
        let data = decode::<Claims>(token, &key, &validation).map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => SecurityError::ExpiredToken,
            _ => SecurityError::InvalidToken,
        })?;

        let claims = data.claims;
        if claims.kind != kind {
            return Err(SecurityError::InvalidToken);
        }

        let role: Role =
            serde_json::from_value(serde_json::Value::String(claims.role.clone()))
                .map_err(|_| SecurityError::InvalidToken)?;

        let issued_at = Utc
            .timestamp_opt(claims.iat, 0)
            .single()
            .ok_or(SecurityError::InvalidToken)?;
        let expires_at = Utc
            .timestamp_opt(claims.exp, 0)
            .single()
            .ok_or(SecurityError::InvalidToken)?;

        Ok(Principal {
            user_id: claims.sub,
            role,
            issued_at,
            expires_at,
        })
    }

    fn sign(&self, claims: &PrincipalClaims, kind: TokenKind, now: DateTime<Utc>) -> Result<String> {
        self.sign_with_expiry(
            claims,
            kind,
            now,
            now + chrono::Duration::from_std(kind.ttl()).unwrap_or_default(),
        )
    }

    fn sign_with_expiry(
        &self,
        claims: &PrincipalClaims,
        kind: TokenKind,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<String> {
        let payload = Claims {
            sub: claims.user_id.clone(),
            role: claims.role.to_string(),
            kind,
            iss: ISSUER.to_string(),
            aud: AUDIENCE.to_string(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
        };

        let key = EncodingKey::from_secret(self.secrets.signing_secret(kind));
        encode(&jsonwebtoken::Header::default(), &payload, &key)
            .map_err(|e| SecurityError::config(format!("Token signing failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims() -> PrincipalClaims {
        PrincipalClaims {
            user_id: "user-42".to_string(),
            role: Role::Farmer,
        }
    }

    #[test]
    fn test_issue_verify_roundtrip() {
        let secrets = SecretStore::ephemeral();
        let service = TokenService::new(&secrets);

        let pair = service.issue(&claims()).unwrap();
        let principal = service.verify(&pair.access_token, TokenKind::Access).unwrap();

        assert_eq!(principal.user_id, "user-42");
        assert_eq!(principal.role, Role::Farmer);
        let ttl = principal.expires_at - principal.issued_at;
        assert_eq!(ttl.num_seconds(), ACCESS_TTL.as_secs() as i64);
    }

    #[test]
    fn test_refresh_has_long_ttl() {
        let secrets = SecretStore::ephemeral();
        let service = TokenService::new(&secrets);

        let pair = service.issue(&claims()).unwrap();
        let principal = service.verify(&pair.refresh_token, TokenKind::Refresh).unwrap();

        let ttl = principal.expires_at - principal.issued_at;
        assert_eq!(ttl.num_seconds(), REFRESH_TTL.as_secs() as i64);
    }

    #[test]
    fn test_wrong_kind_fails_invalid() {
        let secrets = SecretStore::ephemeral();
        let service = TokenService::new(&secrets);
        let pair = service.issue(&claims()).unwrap();

        // Access token checked against the refresh secret and vice versa.
        assert!(matches!(
            service.verify(&pair.access_token, TokenKind::Refresh),
            Err(SecurityError::InvalidToken)
        ));
        assert!(matches!(
            service.verify(&pair.refresh_token, TokenKind::Access),
            Err(SecurityError::InvalidToken)
        ));
    }

    #[test]
    fn test_expired_token_fails_expired() {
        let secrets = SecretStore::ephemeral();
        let service = TokenService::new(&secrets);

        let issued = Utc::now() - chrono::Duration::minutes(30);
        let expired = Utc::now() - chrono::Duration::minutes(15);
        let token = service
            .sign_with_expiry(&claims(), TokenKind::Access, issued, expired)
            .unwrap();

        assert!(matches!(
            service.verify(&token, TokenKind::Access),
            Err(SecurityError::ExpiredToken)
        ));
    }

    #[test]
    fn test_tampered_token_fails_invalid() {
        let secrets = SecretStore::ephemeral();
        let service = TokenService::new(&secrets);
        let pair = service.issue(&claims()).unwrap();

        let mut tampered = pair.access_token.clone();
        tampered.replace_range(tampered.len() - 4.., "AAAA");

        assert!(matches!(
            service.verify(&tampered, TokenKind::Access),
            Err(SecurityError::InvalidToken)
        ));
    }

    #[test]
    fn test_foreign_secret_fails_invalid() {
        let issuing = SecretStore::ephemeral();
        let verifying = SecretStore::ephemeral();

        let pair = TokenService::new(&issuing).issue(&claims()).unwrap();
        let result = TokenService::new(&verifying).verify(&pair.access_token, TokenKind::Access);

        assert!(matches!(result, Err(SecurityError::InvalidToken)));
    }

    #[test]
    fn test_garbage_token_fails_invalid() {
        let secrets = SecretStore::ephemeral();
        let service = TokenService::new(&secrets);

        assert!(matches!(
            service.verify("not-a-token", TokenKind::Access),
            Err(SecurityError::InvalidToken)
        ));
    }

    #[test]
    fn test_role_capabilities() {
        assert!(Role::Admin.can_manage_accounts());
        assert!(!Role::Farmer.can_manage_accounts());
        assert!(Role::Agronomist.can_read_foreign_data());
        assert!(!Role::Farmer.can_read_foreign_data());
    }

    #[test]
    fn test_role_serde_names() {
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
        let role: Role = serde_json::from_str("\"farmer\"").unwrap();
        assert_eq!(role, Role::Farmer);
        assert!(serde_json::from_str::<Role>("\"superuser\"").is_err());
    }
}
