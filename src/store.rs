use std::{collections::HashSet, sync::Arc};

use tokio::sync::{Mutex, MutexGuard};

/// The allow-list of outstanding refresh tokens.
///
/// Membership alone does not make a token usable: an entry may have expired without being
/// removed, so callers verify the token as well. Nothing is evicted automatically.
#[derive(Clone, Default)]
pub struct CredentialStore {
    tokens: Arc<Mutex<HashSet<String>>>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold the store for a sequence of operations that must not interleave with other
    /// requests, such as check-then-retire during rotation.
    pub async fn lock(&self) -> CredentialStoreGuard<'_> {
        CredentialStoreGuard {
            tokens: self.tokens.lock().await,
        }
    }

    pub async fn add(&self, token: impl Into<String>) {
        self.lock().await.add(token);
    }

    pub async fn contains(&self, token: &str) -> bool {
        self.lock().await.contains(token)
    }

    pub async fn revoke(&self, token: &str) -> bool {
        self.lock().await.revoke(token)
    }

    pub async fn revoke_all_matching<F>(&self, predicate: F) -> usize
    where
        F: FnMut(&str) -> bool,
    {
        self.lock().await.revoke_all_matching(predicate)
    }

    pub async fn len(&self) -> usize {
        self.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

pub struct CredentialStoreGuard<'a> {
    tokens: MutexGuard<'a, HashSet<String>>,
}

impl CredentialStoreGuard<'_> {
    /// Adding a token that is already present is a no-op.
    pub fn add(&mut self, token: impl Into<String>) {
        self.tokens.insert(token.into());
    }

    pub fn contains(&self, token: &str) -> bool {
        self.tokens.contains(token)
    }

    /// Returns whether the token was present.
    pub fn revoke(&mut self, token: &str) -> bool {
        self.tokens.remove(token)
    }

    /// Returns the number of tokens removed.
    pub fn revoke_all_matching<F>(&mut self, mut predicate: F) -> usize
    where
        F: FnMut(&str) -> bool,
    {
        let before = self.tokens.len();
        self.tokens.retain(|token| !predicate(token));
        before - self.tokens.len()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}
