use std::{collections::HashMap, env, error::Error, sync::Arc, time::Duration};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::{
    case_insensitive_string_ext::CaseInsensitiveStrExt,
    error::{AuthError, TokenError},
    password::{PasswordVerifier, PlaintextPasswords},
    store::CredentialStore,
    token::{AccessClaims, Identity, TokenCodec},
    types::{LoginOutcome, Principal, TokenPair, Username},
};

pub const DEFAULT_ACCESS_TOKEN_LIFETIME: Duration = Duration::from_secs(5);
pub const DEFAULT_REFRESH_TOKEN_LIFETIME: Duration = Duration::from_secs(15 * 60);

pub const ACCESS_TOKEN_SECRET_VAR: &str = "AUTH_ACCESS_TOKEN_SECRET";
pub const REFRESH_TOKEN_SECRET_VAR: &str = "AUTH_REFRESH_TOKEN_SECRET";
pub const ACCESS_TOKEN_LIFETIME_VAR: &str = "AUTH_ACCESS_TOKEN_LIFETIME_SECS";
pub const REFRESH_TOKEN_LIFETIME_VAR: &str = "AUTH_REFRESH_TOKEN_LIFETIME_SECS";

#[async_trait]
pub trait PrincipalDirectory: Send + Sync + 'static {
    /// Retrieve the principal registered under the specified username, if any.
    async fn find_by_username(
        &self,
        username: &Username,
    ) -> Result<Option<Principal>, Box<dyn Error + Send + Sync>>;
}

/// A fixed set of principals, seeded once.
pub struct InMemoryDirectory {
    principals: HashMap<String, Principal>,
}

impl InMemoryDirectory {
    pub fn new(principals: impl IntoIterator<Item = Principal>) -> Self {
        Self {
            principals: principals
                .into_iter()
                .map(|principal| (principal.username.0.clone(), principal))
                .collect(),
        }
    }
}

#[async_trait]
impl PrincipalDirectory for InMemoryDirectory {
    async fn find_by_username(
        &self,
        username: &Username,
    ) -> Result<Option<Principal>, Box<dyn Error + Send + Sync>> {
        Ok(self.principals.get(&username.0).cloned())
    }
}

#[derive(Clone)]
pub struct AuthConfig {
    /// The secret used to sign access tokens.
    /// If the secret changes, every outstanding access token stops verifying.
    pub access_token_secret: String,
    /// The secret used to sign refresh tokens. Must differ from `access_token_secret`.
    pub refresh_token_secret: String,
    /// How long an access token authorizes requests before the client has to refresh.
    pub access_token_lifetime: Duration,
    /// How long a refresh token can be exchanged. After this interval, the client will have to re-login.
    pub refresh_token_lifetime: Duration,
    pub directory: Arc<dyn PrincipalDirectory>,
    pub password_verifier: Arc<dyn PasswordVerifier>,
}

impl AuthConfig {
    /// Default lifetimes and plaintext password comparison.
    pub fn new(
        access_token_secret: impl Into<String>,
        refresh_token_secret: impl Into<String>,
        directory: Arc<dyn PrincipalDirectory>,
    ) -> Self {
        Self {
            access_token_secret: access_token_secret.into(),
            refresh_token_secret: refresh_token_secret.into(),
            access_token_lifetime: DEFAULT_ACCESS_TOKEN_LIFETIME,
            refresh_token_lifetime: DEFAULT_REFRESH_TOKEN_LIFETIME,
            directory,
            password_verifier: Arc::new(PlaintextPasswords),
        }
    }

    /// Read secrets (required) and lifetimes in seconds (optional) from the environment.
    pub fn from_env(directory: Arc<dyn PrincipalDirectory>) -> Result<Self, AuthError> {
        let mut config = Self::new(
            required_var(ACCESS_TOKEN_SECRET_VAR)?,
            required_var(REFRESH_TOKEN_SECRET_VAR)?,
            directory,
        );

        if let Some(lifetime) = lifetime_var(ACCESS_TOKEN_LIFETIME_VAR)? {
            config.access_token_lifetime = lifetime;
        }
        if let Some(lifetime) = lifetime_var(REFRESH_TOKEN_LIFETIME_VAR)? {
            config.refresh_token_lifetime = lifetime;
        }

        Ok(config)
    }

    pub fn with_password_verifier(mut self, verifier: Arc<dyn PasswordVerifier>) -> Self {
        self.password_verifier = verifier;
        self
    }

    fn validate(&self) -> Result<(), AuthError> {
        if self.access_token_secret.is_empty() || self.refresh_token_secret.is_empty() {
            return Err(AuthError::configuration("token secrets must not be empty"));
        }
        if self.access_token_secret == self.refresh_token_secret {
            return Err(AuthError::configuration(
                "access and refresh tokens must be signed with distinct secrets",
            ));
        }
        Ok(())
    }
}

fn required_var(name: &str) -> Result<String, AuthError> {
    env::var(name).map_err(|_| AuthError::configuration(format!("{name} is not set")))
}

fn lifetime_var(name: &str) -> Result<Option<Duration>, AuthError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse::<u64>()
            .map(|secs| Some(Duration::from_secs(secs)))
            .map_err(|_| {
                AuthError::configuration(format!("{name} must be a whole number of seconds"))
            }),
        Err(_) => Ok(None),
    }
}

pub(crate) struct AuthInternal {
    directory: Arc<dyn PrincipalDirectory>,
    password_verifier: Arc<dyn PasswordVerifier>,
    codec: TokenCodec,
    store: CredentialStore,
}

impl AuthInternal {
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginOutcome, AuthError> {
        let username = Username(username.to_owned());

        let principal = self
            .directory
            .find_by_username(&username)
            .await
            .map_err(|err| {
                warn!(error = %err, "principal directory lookup failed");
                AuthError::from(err)
            })?
            .filter(|principal| self.password_verifier.verify(password, &principal.password))
            .ok_or(AuthError::InvalidCredentials)?;

        let tokens = self.codec.issue_pair(Identity::from(&principal))?;
        self.store.add(tokens.refresh_token.clone()).await;

        info!(principal = principal.id.0, "login succeeded");

        Ok(LoginOutcome {
            username: principal.username.0,
            is_admin: principal.is_admin,
            tokens,
        })
    }

    /// Exchange a stored refresh token for a fresh pair. The presented token is retired.
    pub async fn refresh(&self, token: Option<&str>) -> Result<TokenPair, AuthError> {
        let token = token
            .filter(|token| !token.is_empty())
            .ok_or(AuthError::Unauthenticated)?;

        let mut tokens = self.store.lock().await;

        if !tokens.contains(token) {
            debug!("refresh token is not in the credential store");
            return Err(AuthError::InvalidToken { source: None });
        }

        let claims = self.codec.verify_renewal(token).map_err(|err| {
            debug!(error = %err, "refresh token failed verification");
            AuthError::InvalidToken { source: Some(err) }
        })?;

        let pair = self.codec.issue_pair(Identity::from(&claims))?;

        tokens.revoke(token);
        tokens.add(pair.refresh_token.clone());

        info!(principal = claims.id.0, "refresh token rotated");

        Ok(pair)
    }

    pub async fn logout(&self, token: Option<&str>) {
        let removed = match token {
            Some(token) => self.store.revoke(token).await,
            None => false,
        };

        info!(removed, "logout");
    }

    pub fn authorize(&self, authorization: Option<&str>) -> Result<AccessClaims, AuthError> {
        let header = authorization
            .map(str::trim)
            .filter(|header| !header.is_empty())
            .ok_or(AuthError::Unauthenticated)?;

        let token = header
            .strip_prefix_ignore_ascii_case("bearer ")
            .ok_or(AuthError::Forbidden { source: None })?;

        self.codec.verify_access(token.trim()).map_err(|err| {
            debug!(error = %err, "access token rejected");
            AuthError::Forbidden { source: Some(err) }
        })
    }

    pub async fn purge_expired_renewals(&self) -> usize {
        let removed = self
            .store
            .revoke_all_matching(|token| {
                matches!(self.codec.verify_renewal(token), Err(TokenError::Expired))
            })
            .await;

        info!(removed, "purged expired refresh tokens");

        removed
    }
}

#[derive(Clone)]
pub struct Auth {
    pub(crate) internal: Arc<AuthInternal>,
}

impl Auth {
    pub fn new(config: AuthConfig) -> Result<Self, AuthError> {
        config.validate()?;

        let codec = TokenCodec::new(
            &config.access_token_secret,
            config.access_token_lifetime,
            &config.refresh_token_secret,
            config.refresh_token_lifetime,
        );

        Ok(Self {
            internal: Arc::new(AuthInternal {
                directory: config.directory,
                password_verifier: config.password_verifier,
                codec,
                store: CredentialStore::new(),
            }),
        })
    }

    /// Check the credentials and, on a match, issue an access/refresh pair and register
    /// the refresh token. Does not reveal whether the username or the password was wrong.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginOutcome, AuthError> {
        self.internal.login(username, password).await
    }

    pub async fn refresh(&self, token: Option<&str>) -> Result<TokenPair, AuthError> {
        self.internal.refresh(token).await
    }

    /// Retire a refresh token. Always succeeds, whether or not the token was known.
    pub async fn logout(&self, token: Option<&str>) {
        self.internal.logout(token).await
    }

    /// Verify the value of an `Authorization: Bearer <token>` header.
    pub fn authorize(&self, authorization: Option<&str>) -> Result<AccessClaims, AuthError> {
        self.internal.authorize(authorization)
    }

    /// Remove refresh tokens whose expiry has passed. The store never does this on its own.
    pub async fn purge_expired_renewals(&self) -> usize {
        self.internal.purge_expired_renewals().await
    }

    pub fn credential_store(&self) -> &CredentialStore {
        &self.internal.store
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.internal.codec
    }
}
