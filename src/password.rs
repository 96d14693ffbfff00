use tracing::warn;

use crate::types::StoredPassword;

/// Decides whether a presented password matches what the directory holds for a principal.
pub trait PasswordVerifier: Send + Sync + 'static {
    fn verify(&self, presented: &str, stored: &StoredPassword) -> bool;
}

/// Exact string comparison against a plaintext stored password.
///
/// Only suitable for seeded test principals. Use [`Argon2Passwords`] for anything real.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaintextPasswords;

impl PasswordVerifier for PlaintextPasswords {
    fn verify(&self, presented: &str, stored: &StoredPassword) -> bool {
        presented == stored.0
    }
}

/// Salted argon2 hashes. Stored passwords are the encoded hash strings produced by
/// [`Argon2Passwords::hash`].
#[derive(Debug, Clone)]
pub struct Argon2Passwords {
    /// If the salt changes, previously hashed passwords still verify (the salt is encoded
    /// into each hash), but new hashes will differ.
    salt: String,
}

impl Argon2Passwords {
    pub fn new(salt: impl Into<String>) -> Self {
        Self { salt: salt.into() }
    }

    pub fn hash(&self, password: &str) -> Result<StoredPassword, argon2::Error> {
        let encoded = argon2::hash_encoded(
            password.as_bytes(),
            self.salt.as_bytes(),
            &Default::default(),
        )?;

        Ok(StoredPassword(encoded))
    }
}

impl PasswordVerifier for Argon2Passwords {
    fn verify(&self, presented: &str, stored: &StoredPassword) -> bool {
        argon2::verify_encoded(&stored.0, presented.as_bytes()).unwrap_or_else(|err| {
            warn!(error = %err, "stored password is not a valid argon2 hash");
            false
        })
    }
}
