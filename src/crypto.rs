//! Field-level encryption of sensitive values.

use crate::error::{Result, SecurityError};
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

const NONCE_LEN: usize = 12;

/// An encrypted field value.
///
/// The IV is generated fresh per encryption call and is a required input to
/// decryption; it travels with the ciphertext rather than being derived or
/// assumed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedField {
    /// Base64-encoded 96-bit nonce.
    pub iv: String,
    /// Base64-encoded ciphertext (includes the AEAD tag).
    pub ciphertext: String,
}

impl EncryptedField {
    /// Render as a single `iv:ciphertext` string for storage.
    #[must_use]
    pub fn to_wire(&self) -> String {
        format!("{}:{}", self.iv, self.ciphertext)
    }

    /// Parse the `iv:ciphertext` wire form.
    ///
    /// # Errors
    /// Returns [`SecurityError::Decryption`] when the separator is missing.
    pub fn from_wire(wire: &str) -> Result<Self> {
        let (iv, ciphertext) = wire
            .split_once(':')
            .ok_or_else(|| SecurityError::Decryption("Missing iv separator".to_string()))?;
        Ok(Self {
            iv: iv.to_string(),
            ciphertext: ciphertext.to_string(),
        })
    }
}

/// AES-256-GCM cipher keyed by the secret store's encryption key.
#[derive(Clone)]
pub struct FieldCipher {
    key: Zeroizing<[u8; 32]>,
}

impl FieldCipher {
    /// Create a cipher from a 32-byte key.
    #[must_use]
    pub fn new(key: &[u8; 32]) -> Self {
        Self {
            key: Zeroizing::new(*key),
        }
    }

    /// Encrypt a plaintext string with a fresh random IV.
    ///
    /// # Errors
    /// Returns [`SecurityError::Encryption`] if encryption fails.
    pub fn encrypt(&self, plaintext: &str) -> Result<EncryptedField> {
        let cipher = Aes256Gcm::new_from_slice(&*self.key)
            .map_err(|e| SecurityError::Encryption(format!("Failed to create cipher: {e}")))?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| SecurityError::Encryption(format!("Encryption failed: {e}")))?;

        Ok(EncryptedField {
            iv: BASE64.encode(nonce_bytes),
            ciphertext: BASE64.encode(ciphertext),
        })
    }

    /// Decrypt a field using the IV it was encrypted with.
    ///
    /// # Errors
    /// Returns [`SecurityError::Decryption`] on malformed encoding, a wrong
    /// IV length, or an authentication failure (wrong key, tampered data,
    /// mismatched IV).
    pub fn decrypt(&self, field: &EncryptedField) -> Result<String> {
        let nonce_bytes = BASE64
            .decode(&field.iv)
            .map_err(|e| SecurityError::Decryption(format!("Invalid iv encoding: {e}")))?;
        if nonce_bytes.len() != NONCE_LEN {
            return Err(SecurityError::Decryption(format!(
                "IV must be {NONCE_LEN} bytes"
            )));
        }

        let ciphertext = BASE64
            .decode(&field.ciphertext)
            .map_err(|e| SecurityError::Decryption(format!("Invalid ciphertext encoding: {e}")))?;

        let cipher = Aes256Gcm::new_from_slice(&*self.key)
            .map_err(|e| SecurityError::Decryption(format!("Failed to create cipher: {e}")))?;

        let plaintext = cipher
            .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_ref())
            .map_err(|_| SecurityError::Decryption("Authentication failed".to_string()))?;

        String::from_utf8(plaintext)
            .map_err(|e| SecurityError::Decryption(format!("Invalid UTF-8: {e}")))
    }
}

impl std::fmt::Debug for FieldCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldCipher")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::SecretStore;

    fn cipher() -> FieldCipher {
        let secrets = SecretStore::ephemeral();
        FieldCipher::new(secrets.encryption_key())
    }

    #[test]
    fn test_roundtrip() {
        let cipher = cipher();
        let field = cipher.encrypt("soil report: field 7, nitrogen low").unwrap();
        let plaintext = cipher.decrypt(&field).unwrap();
        assert_eq!(plaintext, "soil report: field 7, nitrogen low");
    }

    #[test]
    fn test_empty_string_roundtrip() {
        let cipher = cipher();
        let field = cipher.encrypt("").unwrap();
        assert_eq!(cipher.decrypt(&field).unwrap(), "");
    }

    #[test]
    fn test_fresh_iv_per_call() {
        let cipher = cipher();
        let first = cipher.encrypt("same plaintext").unwrap();
        let second = cipher.encrypt("same plaintext").unwrap();
        assert_ne!(first.iv, second.iv);
        assert_ne!(first.ciphertext, second.ciphertext);
    }

    #[test]
    fn test_wrong_iv_rejected() {
        let cipher = cipher();
        let first = cipher.encrypt("value one").unwrap();
        let second = cipher.encrypt("value two").unwrap();

        let mixed = EncryptedField {
            iv: second.iv,
            ciphertext: first.ciphertext,
        };
        assert!(matches!(
            cipher.decrypt(&mixed),
            Err(SecurityError::Decryption(_))
        ));
    }

    #[test]
    fn test_wrong_key_rejected() {
        let field = cipher().encrypt("secret").unwrap();
        let other = cipher();
        assert!(matches!(
            other.decrypt(&field),
            Err(SecurityError::Decryption(_))
        ));
    }

    #[test]
    fn test_malformed_input_rejected() {
        let cipher = cipher();
        let garbage = EncryptedField {
            iv: "!!not-base64!!".to_string(),
            ciphertext: "AAAA".to_string(),
        };
        assert!(matches!(
            cipher.decrypt(&garbage),
            Err(SecurityError::Decryption(_))
        ));

        let short_iv = EncryptedField {
            iv: BASE64.encode([0u8; 4]),
            ciphertext: BASE64.encode([0u8; 32]),
        };
        assert!(matches!(
            cipher.decrypt(&short_iv),
            Err(SecurityError::Decryption(_))
        ));
    }

    #[test]
    fn test_wire_form() {
        let cipher = cipher();
        let field = cipher.encrypt("harvest estimate").unwrap();

        let wire = field.to_wire();
        let parsed = EncryptedField::from_wire(&wire).unwrap();
        assert_eq!(parsed, field);
        assert_eq!(cipher.decrypt(&parsed).unwrap(), "harvest estimate");

        assert!(EncryptedField::from_wire("no-separator").is_err());
    }
}
