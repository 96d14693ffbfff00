use std::{convert::Infallible, sync::Arc};

use serde::{de::DeserializeOwned, Deserialize};
use tracing::warn;
use warp::{
    hyper::{body::Bytes, StatusCode},
    path, Filter, Rejection, Reply,
};

use crate::{
    auth::{Auth, AuthInternal},
    error::AuthError,
    token::AccessClaims,
    types::PrincipalId,
};

const MAX_BODY_BYTES: u64 = 16 * 1024;

pub fn build_api_route_filter(
    auth: &Auth,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let login = path!("api" / "login")
        .and(warp::post())
        .and(json_body())
        .and(with_auth_state(auth.internal.clone()))
        .and_then(user_login);

    let refresh = path!("api" / "refresh")
        .and(warp::post())
        .and(optional_json_body())
        .and(with_auth_state(auth.internal.clone()))
        .and_then(token_refresh);

    let logout = path!("api" / "logout")
        .and(warp::post())
        .and(with_auth(auth))
        .and(optional_json_body())
        .and(with_auth_state(auth.internal.clone()))
        .and_then(user_logout);

    let delete_user = path!("api" / "users" / String)
        .and(warp::delete())
        .and(with_auth(auth))
        .and_then(user_delete);

    login.or(refresh).or(logout).or(delete_user)
}

/// Gate for protected routes: verifies the bearer access token and extracts its claims.
/// Rejects with [`AuthError::Unauthenticated`] when no header is sent and
/// [`AuthError::Forbidden`] when the token does not verify.
pub fn with_auth(
    auth: &Auth,
) -> impl Filter<Extract = (AccessClaims,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization")
        .and(with_auth_state(auth.internal.clone()))
        .and_then(user_auth_check)
}

pub async fn handle_auth_errors(err: Rejection) -> Result<impl Reply, Rejection> {
    if let Some(auth_error) = err.find::<AuthError>() {
        let (status, message) = match &auth_error {
            AuthError::Unauthenticated => (StatusCode::UNAUTHORIZED, "not authenticated"),
            AuthError::InvalidCredentials => {
                (StatusCode::BAD_REQUEST, "username or password incorrect")
            }
            AuthError::MalformedBody { .. } => {
                (StatusCode::BAD_REQUEST, "malformed request body")
            }
            AuthError::Forbidden { .. } => (StatusCode::FORBIDDEN, "access denied"),
            AuthError::InvalidToken { .. } => (StatusCode::FORBIDDEN, "refresh token is not valid"),
            _ => {
                warn!(error = %auth_error, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "an unknown error has occurred",
                )
            }
        };
        return Ok(warp::reply::with_status(warp::reply::json(&message), status));
    }

    Err(err)
}

#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    pub username: String,
    pub password: String,
}

async fn user_login(
    input: LoginQuery,
    auth: Arc<AuthInternal>,
) -> Result<impl Reply, Rejection> {
    let outcome = auth
        .login(&input.username, &input.password)
        .await
        .map_err(warp::reject::custom)?;

    Ok(warp::reply::json(&outcome))
}

#[derive(Debug, Default, Deserialize)]
pub struct TokenQuery {
    #[serde(default)]
    pub token: Option<String>,
}

async fn token_refresh(
    input: TokenQuery,
    auth: Arc<AuthInternal>,
) -> Result<impl Reply, Rejection> {
    let tokens = auth
        .refresh(input.token.as_deref())
        .await
        .map_err(warp::reject::custom)?;

    Ok(warp::reply::json(&tokens))
}

async fn user_logout(
    _claims: AccessClaims,
    input: TokenQuery,
    auth: Arc<AuthInternal>,
) -> Result<impl Reply, Rejection> {
    auth.logout(input.token.as_deref()).await;

    Ok(warp::reply::json(&"logged out"))
}

async fn user_delete(user_id: String, claims: AccessClaims) -> Result<impl Reply, Rejection> {
    // an id that is not a number can only be somebody else
    let allowed = match user_id.trim().parse::<i64>() {
        Ok(id) => claims.can_act_on(PrincipalId(id)),
        Err(_) => claims.is_admin,
    };

    if !allowed {
        return Err(warp::reject::custom(AuthError::Forbidden { source: None }));
    }

    Ok(warp::reply::json(&"user has been deleted"))
}

async fn user_auth_check(
    header: Option<String>,
    auth: Arc<AuthInternal>,
) -> Result<AccessClaims, Rejection> {
    auth.authorize(header.as_deref())
        .map_err(warp::reject::custom)
}

fn json_body<T>() -> impl Filter<Extract = (T,), Error = Rejection> + Clone
where
    T: DeserializeOwned + Send,
{
    warp::body::content_length_limit(MAX_BODY_BYTES).and(warp::body::json())
}

/// Like [`json_body`], but a request without a body (no length and no transfer encoding, or an
/// empty one) deserializes as `T::default()`.
fn optional_json_body<T>() -> impl Filter<Extract = (T,), Error = Rejection> + Clone
where
    T: DeserializeOwned + Default + Send + 'static,
{
    let with_body = warp::body::content_length_limit(MAX_BODY_BYTES)
        .and(warp::body::bytes())
        .and_then(|body: Bytes| async move { parse_body::<T>(&body) });

    let without_body = warp::header::optional::<String>("content-length")
        .and(warp::header::optional::<String>("transfer-encoding"))
        .and_then(
            |length: Option<String>, encoding: Option<String>| async move {
                if length.is_none() && encoding.is_none() {
                    Ok::<T, Rejection>(T::default())
                } else {
                    Err(warp::reject::not_found())
                }
            },
        );

    with_body.or(without_body).unify()
}

fn parse_body<T>(body: &[u8]) -> Result<T, Rejection>
where
    T: DeserializeOwned + Default,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }

    serde_json::from_slice(body)
        .map_err(|source| warp::reject::custom(AuthError::MalformedBody { source }))
}

// functor that adds a reference to the internal auth state into the filter chain
fn with_auth_state(
    auth: Arc<AuthInternal>,
) -> impl Filter<Extract = (Arc<AuthInternal>,), Error = Infallible> + Clone {
    warp::any().map(move || auth.clone())
}
