use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::TokenError,
    types::{Principal, PrincipalId, TokenPair},
};

/// Claims carried by both access and refresh tokens. The two kinds only differ in the key
/// they are signed with and how long they live.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub id: PrincipalId,
    pub is_admin: bool,
    pub iat: u64,
    pub exp: u64,
    /// Random per-token id, so two tokens issued to the same principal within one second
    /// never collide in the credential store.
    pub jti: String,
}

pub type AccessClaims = Claims;
pub type RenewalClaims = Claims;

impl Claims {
    /// Whether the holder may act on the principal `target`: either it is themselves, or
    /// they are an admin.
    pub fn can_act_on(&self, target: PrincipalId) -> bool {
        self.id == target || self.is_admin
    }
}

/// The subject a token is issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub id: PrincipalId,
    pub is_admin: bool,
}

impl From<&Principal> for Identity {
    fn from(principal: &Principal) -> Self {
        Self {
            id: principal.id,
            is_admin: principal.is_admin,
        }
    }
}

impl From<&Claims> for Identity {
    fn from(claims: &Claims) -> Self {
        Self {
            id: claims.id,
            is_admin: claims.is_admin,
        }
    }
}

struct SigningDomain {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    lifetime: Duration,
}

impl SigningDomain {
    fn new(secret: &str, lifetime: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            lifetime,
        }
    }

    fn issue(&self, identity: Identity) -> Result<String, jsonwebtoken::errors::Error> {
        let iat = unix_now();

        let claims = Claims {
            id: identity.id,
            is_admin: identity.is_admin,
            iat,
            exp: iat + self.lifetime.as_secs(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
    }

    fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::default();
        // lifetimes are a few seconds long, the default minute of leeway would swallow them
        validation.leeway = 0;

        let token = decode::<Claims>(token, &self.decoding_key, &validation)?;

        // jsonwebtoken still accepts `exp == now`; the window is half-open
        if token.claims.exp <= unix_now() {
            return Err(TokenError::Expired);
        }

        Ok(token.claims)
    }
}

/// Signs and verifies tokens in two independent domains. A refresh token never verifies as
/// an access token, and vice versa, because each domain has its own secret.
pub struct TokenCodec {
    access: SigningDomain,
    renewal: SigningDomain,
}

impl TokenCodec {
    pub fn new(
        access_secret: &str,
        access_lifetime: Duration,
        renewal_secret: &str,
        renewal_lifetime: Duration,
    ) -> Self {
        Self {
            access: SigningDomain::new(access_secret, access_lifetime),
            renewal: SigningDomain::new(renewal_secret, renewal_lifetime),
        }
    }

    pub fn issue_access(&self, identity: Identity) -> Result<String, jsonwebtoken::errors::Error> {
        self.access.issue(identity)
    }

    pub fn issue_renewal(
        &self,
        identity: Identity,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        self.renewal.issue(identity)
    }

    pub fn issue_pair(&self, identity: Identity) -> Result<TokenPair, jsonwebtoken::errors::Error> {
        Ok(TokenPair {
            access_token: self.issue_access(identity)?,
            refresh_token: self.issue_renewal(identity)?,
        })
    }

    pub fn verify_access(&self, token: &str) -> Result<AccessClaims, TokenError> {
        self.access.verify(token)
    }

    pub fn verify_renewal(&self, token: &str) -> Result<RenewalClaims, TokenError> {
        self.renewal.verify(token)
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
