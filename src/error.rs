use warp::reject::Reject;

#[derive(thiserror::Error, Debug)]
pub enum AuthError {
    #[error("no credential presented")]
    Unauthenticated,
    #[error("access denied")]
    Forbidden {
        #[source]
        source: Option<TokenError>,
    },
    #[error("username or password incorrect")]
    InvalidCredentials,
    #[error("refresh token is not valid")]
    InvalidToken {
        #[source]
        source: Option<TokenError>,
    },
    #[error("request body is not valid JSON")]
    MalformedBody {
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid configuration: {reason}")]
    Configuration { reason: String },
    #[error("error during directory lookup")]
    DirectoryError {
        #[from]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("error while issuing token")]
    TokenIssue {
        #[from]
        source: jsonwebtoken::errors::Error,
    },
}

impl AuthError {
    pub(crate) fn configuration(reason: impl Into<String>) -> Self {
        AuthError::Configuration {
            reason: reason.into(),
        }
    }
}

impl Reject for AuthError {}

/// Why a presented token failed verification. Malformed tokens count as a bad signature.
#[derive(thiserror::Error, Debug)]
pub enum TokenError {
    #[error("token has expired")]
    Expired,
    #[error("token signature is invalid")]
    InvalidSignature {
        #[source]
        source: jsonwebtoken::errors::Error,
    },
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::InvalidSignature { source: err },
        }
    }
}
