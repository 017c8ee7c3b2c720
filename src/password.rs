//! Adaptive-cost password hashing.

use crate::error::{Result, SecurityError};
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use secrecy::{ExposeSecret, SecretString};

/// Password hashing and verification.
///
/// Argon2id with parameters tuned so a single hash takes on the order of
/// 100ms on reference hardware. The PHC output string embeds the parameters
/// and salt, so old hashes stay verifiable after a cost change.
#[derive(Debug, Clone)]
pub struct PasswordVault {
    memory_cost: u32,
    time_cost: u32,
    parallelism: u32,
}

impl PasswordVault {
    /// Create a vault with the default cost parameters.
    #[must_use]
    pub fn new() -> Self {
        Self {
            memory_cost: 19 * 1024, // 19 MiB
            time_cost: 2,
            parallelism: 1,
        }
    }

    /// Create with custom cost parameters.
    #[must_use]
    pub fn with_params(memory_cost: u32, time_cost: u32, parallelism: u32) -> Self {
        Self {
            memory_cost,
            time_cost,
            parallelism,
        }
    }

    /// Hash a password.
    ///
    /// # Errors
    /// Returns [`SecurityError::Config`] if the parameters are rejected or
    /// hashing fails.
    pub fn hash(&self, password: &SecretString) -> Result<String> {
        let salt = SaltString::generate(&mut rand::thread_rng());
        let argon2 = self.hasher()?;

        argon2
            .hash_password(password.expose_secret().as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| SecurityError::config(format!("Password hashing failed: {e}")))
    }

    /// Verify a password against a stored hash.
    ///
    /// Comparison is constant-time by construction of the verifier.
    ///
    /// # Errors
    /// Returns [`SecurityError::Validation`] if the stored hash is not a
    /// valid PHC string.
    pub fn verify(&self, password: &SecretString, hash: &str) -> Result<bool> {
        let parsed = PasswordHash::new(hash)
            .map_err(|e| SecurityError::validation(format!("Invalid password hash: {e}")))?;

        Ok(Argon2::default()
            .verify_password(password.expose_secret().as_bytes(), &parsed)
            .is_ok())
    }

    fn hasher(&self) -> Result<Argon2<'static>> {
        Ok(Argon2::new(
            argon2::Algorithm::Argon2id,
            argon2::Version::V0x13,
            argon2::Params::new(self.memory_cost, self.time_cost, self.parallelism, None)
                .map_err(|e| SecurityError::config(format!("Invalid Argon2 params: {e}")))?,
        ))
    }
}

impl Default for PasswordVault {
    fn default() -> Self {
        Self::new()
    }
}
