//! Password key-derivation logics.

use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::Sha512;

use crate::config::Kdf as KdfConfig;

/// Salt length in bytes. 128 bits of entropy per account.
pub const SALT_LENGTH: usize = 16;

/// Secret material stored for one user: the per-account random salt and
/// the key derived from it and the password.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credential {
    pub salt: Vec<u8>,
    pub derived_key: Vec<u8>,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("salt", &"[REDACTED]")
            .field("derived_key", &"[REDACTED]")
            .finish()
    }
}

/// Derives and verifies password secrets with PBKDF2-HMAC-SHA-512.
///
/// Stateless besides its tuning parameters; safe to share between tasks.
#[derive(Clone, Debug)]
pub struct CredentialCodec {
    iterations: u32,
    key_length: usize,
}

impl CredentialCodec {
    /// Create a new [`CredentialCodec`].
    pub fn new(config: Option<KdfConfig>) -> Self {
        let config = config.unwrap_or_default();

        Self {
            iterations: config.iterations,
            key_length: config.key_length,
        }
    }

    /// Generate a fresh random salt from the OS entropy source.
    pub fn generate_salt(&self) -> Vec<u8> {
        let mut salt = vec![0u8; SALT_LENGTH];
        OsRng.fill_bytes(&mut salt);
        salt
    }

    /// Derive a fixed-length secret from a password and salt.
    ///
    /// Deterministic for identical inputs and parameters.
    pub fn derive_secret(&self, password: &[u8], salt: &[u8]) -> Vec<u8> {
        let mut key = vec![0u8; self.key_length];
        pbkdf2_hmac::<Sha512>(password, salt, self.iterations, &mut key);
        key
    }

    /// Derive a [`Credential`] with a brand-new salt.
    pub fn issue(&self, password: &[u8]) -> Credential {
        let salt = self.generate_salt();
        let derived_key = self.derive_secret(password, &salt);

        Credential { salt, derived_key }
    }

    /// Check a password against stored material.
    ///
    /// The comparison runs in constant time over the whole key so the
    /// position of the first mismatching byte is never observable.
    pub fn verify(&self, password: &[u8], salt: &[u8], expected: &[u8]) -> bool {
        let candidate = self.derive_secret(password, salt);
        constant_time_eq(&candidate, expected)
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b) {
        diff |= x ^ y;
    }
    diff == 0
}
