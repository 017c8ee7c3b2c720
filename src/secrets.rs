//! Process-wide secret material.
//!
//! The [`SecretStore`] owns the token signing secrets and the field
//! encryption key for the process lifetime. Material is never rotated while
//! the process is live: rotation would instantly invalidate every token
//! signed with the old material inside its TTL window.

use crate::config::{SecretsConfig, SecretsPolicy};
use crate::error::{Result, SecurityError};
use crate::token::TokenKind;
use rand::RngCore;
use secrecy::ExposeSecret;
use zeroize::Zeroizing;

const GENERATED_SECRET_LEN: usize = 48;

/// Holder of process-wide signing and encryption key material.
pub struct SecretStore {
    access_secret: Zeroizing<Vec<u8>>,
    refresh_secret: Zeroizing<Vec<u8>>,
    encryption_key: Zeroizing<[u8; 32]>,
    ephemeral: bool,
}

impl SecretStore {
    /// Build the store from configuration.
    ///
    /// Missing material is replaced with freshly generated random material
    /// when the policy allows it. Generated material is process-local:
    /// tokens issued by this instance cannot be verified by any other
    /// instance or across a restart, so the fallback is logged loudly.
    ///
    /// # Errors
    /// Returns [`SecurityError::Config`] when the policy is
    /// [`SecretsPolicy::RequireConfigured`] and any material is missing, or
    /// when a configured encryption key is not 32 hex-encoded bytes.
    pub fn from_config(config: &SecretsConfig) -> Result<Self> {
        let mut ephemeral = false;

        let access_secret = match &config.access_token_secret {
            Some(s) => Zeroizing::new(s.expose_secret().as_bytes().to_vec()),
            None => {
                require_ephemeral_allowed(config.policy, "access token signing secret")?;
                ephemeral = true;
                generate_secret()
            }
        };

        let refresh_secret = match &config.refresh_token_secret {
            Some(s) => Zeroizing::new(s.expose_secret().as_bytes().to_vec()),
            None => {
                require_ephemeral_allowed(config.policy, "refresh token signing secret")?;
                ephemeral = true;
                generate_secret()
            }
        };

        let encryption_key = match &config.encryption_key_hex {
            Some(hex_key) => {
                let bytes = hex::decode(hex_key.expose_secret())
                    .map_err(|e| SecurityError::config(format!("Invalid hex encryption key: {e}")))?;
                if bytes.len() != 32 {
                    return Err(SecurityError::config("Encryption key must be 32 bytes"));
                }
                let mut key = Zeroizing::new([0u8; 32]);
                key.copy_from_slice(&bytes);
                key
            }
            None => {
                require_ephemeral_allowed(config.policy, "encryption key")?;
                ephemeral = true;
                let mut key = Zeroizing::new([0u8; 32]);
                rand::thread_rng().fill_bytes(&mut *key);
                key
            }
        };

        if ephemeral {
            tracing::warn!(
                "secret material generated at startup; tokens and ciphertext will not \
                 survive a restart and cannot be shared across instances"
            );
        }

        Ok(Self {
            access_secret,
            refresh_secret,
            encryption_key,
            ephemeral,
        })
    }

    /// Build a store with entirely generated material, for tests and local use.
    #[must_use]
    pub fn ephemeral() -> Self {
        let mut key = Zeroizing::new([0u8; 32]);
        rand::thread_rng().fill_bytes(&mut *key);
        Self {
            access_secret: generate_secret(),
            refresh_secret: generate_secret(),
            encryption_key: key,
            ephemeral: true,
        }
    }

    /// Signing secret for the given token kind.
    #[must_use]
    pub fn signing_secret(&self, kind: TokenKind) -> &[u8] {
        match kind {
            TokenKind::Access => &self.access_secret,
            TokenKind::Refresh => &self.refresh_secret,
        }
    }

    /// Symmetric key for field-level encryption.
    #[must_use]
    pub fn encryption_key(&self) -> &[u8; 32] {
        &self.encryption_key
    }

    /// Whether any material was generated rather than configured.
    #[must_use]
    pub fn is_ephemeral(&self) -> bool {
        self.ephemeral
    }
}

impl std::fmt::Debug for SecretStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretStore")
            .field("access_secret", &"[REDACTED]")
            .field("refresh_secret", &"[REDACTED]")
            .field("encryption_key", &"[REDACTED]")
            .field("ephemeral", &self.ephemeral)
            .finish()
    }
}

fn require_ephemeral_allowed(policy: SecretsPolicy, what: &str) -> Result<()> {
    match policy {
        SecretsPolicy::AllowEphemeral => Ok(()),
        SecretsPolicy::RequireConfigured => Err(SecurityError::config(format!(
            "Missing {what} and policy requires configured material"
        ))),
    }
}

fn generate_secret() -> Zeroizing<Vec<u8>> {
    let mut secret = Zeroizing::new(vec![0u8; GENERATED_SECRET_LEN]);
    rand::thread_rng().fill_bytes(&mut secret);
    secret
}
