use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[repr(transparent)]
pub struct PrincipalId(pub i64);

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[repr(transparent)]
pub struct Username(pub String);

/// Whatever the configured [`PasswordVerifier`](crate::PasswordVerifier) compares against:
/// a plaintext placeholder or an encoded argon2 hash.
#[derive(Clone, Deserialize, Serialize)]
#[repr(transparent)]
pub struct StoredPassword(pub String);

impl std::fmt::Debug for StoredPassword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StoredPassword(..)")
    }
}

/// A registered identity. Principals are seeded into a directory at startup and never
/// created or destroyed at runtime.
#[derive(Debug, Clone)]
pub struct Principal {
    pub id: PrincipalId,
    pub username: Username,
    pub password: StoredPassword,
    pub is_admin: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Public principal fields returned by a successful login. Never carries the password.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginOutcome {
    pub username: String,
    pub is_admin: bool,
    #[serde(flatten)]
    pub tokens: TokenPair,
}
