use std::{net::SocketAddr, sync::Arc, time::Duration};

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use token_rotation_for_warp::{
    build_api_route_filter, handle_auth_errors, Argon2Passwords, Auth, AuthConfig,
    InMemoryDirectory, Principal, PrincipalId, StoredPassword, Username,
};
use warp::Filter;

fn principal(id: i64, username: &str, password: StoredPassword, is_admin: bool) -> Principal {
    Principal {
        id: PrincipalId(id),
        username: Username(username.into()),
        password,
        is_admin,
    }
}

fn test_config() -> AuthConfig {
    let directory = Arc::new(InMemoryDirectory::new([
        principal(1, "John", StoredPassword("John0908".into()), true),
        principal(2, "Jane", StoredPassword("Jane0908".into()), false),
    ]));

    AuthConfig::new("access secret", "refresh secret", directory)
}

async fn start_server(auth: &Auth) -> anyhow::Result<SocketAddr> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    let routes = build_api_route_filter(auth).recover(handle_auth_errors);

    tokio::spawn(warp::serve(routes).run_incoming(TcpListenerStream::new(listener)));

    Ok(addr)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    username: String,
    is_admin: bool,
    access_token: String,
    refresh_token: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    access_token: String,
    refresh_token: String,
}

async fn login(
    client: &reqwest::Client,
    addr: SocketAddr,
    username: &str,
    password: &str,
) -> anyhow::Result<LoginResponse> {
    let response = client
        .post(format!("http://{addr}/api/login"))
        .json(&json!({"username": username, "password": password}))
        .send()
        .await?
        .error_for_status()?;

    Ok(response.json().await?)
}

#[tokio::test]
async fn login_refresh_and_replay() -> anyhow::Result<()> {
    let auth = Auth::new(test_config())?;
    let addr = start_server(&auth).await?;
    let client = reqwest::Client::new();

    let john = login(&client, addr, "John", "John0908").await?;
    assert_eq!(john.username, "John");
    assert!(john.is_admin);
    assert!(auth.credential_store().contains(&john.refresh_token).await);

    assert_eq!(
        client
            .post(format!("http://{addr}/api/login"))
            .json(&json!({"username": "John", "password": "wrong"}))
            .send()
            .await?
            .status(),
        StatusCode::BAD_REQUEST,
        "login with a wrong password should have been refused"
    );

    let refreshed = client
        .post(format!("http://{addr}/api/refresh"))
        .json(&json!({ "token": john.refresh_token }))
        .send()
        .await?;
    assert_eq!(refreshed.status(), StatusCode::OK, "failed to refresh");
    let refreshed = refreshed.json::<RefreshResponse>().await?;
    assert_ne!(refreshed.refresh_token, john.refresh_token);
    assert!(auth.codec().verify_access(&refreshed.access_token).is_ok());
    assert_eq!(auth.credential_store().len().await, 1);

    assert_eq!(
        client
            .post(format!("http://{addr}/api/refresh"))
            .json(&json!({ "token": john.refresh_token }))
            .send()
            .await?
            .status(),
        StatusCode::FORBIDDEN,
        "a rotated refresh token should not be accepted again"
    );

    assert_eq!(
        client
            .post(format!("http://{addr}/api/refresh"))
            .json(&json!({}))
            .send()
            .await?
            .status(),
        StatusCode::UNAUTHORIZED,
        "refresh without a token should be unauthenticated"
    );

    assert_eq!(
        client
            .post(format!("http://{addr}/api/refresh"))
            .send()
            .await?
            .status(),
        StatusCode::UNAUTHORIZED,
        "refresh without any body should be unauthenticated"
    );

    assert_eq!(
        client
            .post(format!("http://{addr}/api/refresh"))
            .header("content-type", "application/json")
            .body("{not json")
            .send()
            .await?
            .status(),
        StatusCode::BAD_REQUEST
    );
    assert_eq!(auth.credential_store().len().await, 1);

    Ok(())
}

#[tokio::test]
async fn delete_user_requires_self_or_admin() -> anyhow::Result<()> {
    let auth = Auth::new(test_config())?;
    let addr = start_server(&auth).await?;
    let client = reqwest::Client::new();

    let john = login(&client, addr, "John", "John0908").await?;
    let jane = login(&client, addr, "Jane", "Jane0908").await?;

    let delete = |user_id: i64| client.delete(format!("http://{addr}/api/users/{user_id}"));

    assert_eq!(
        delete(1).send().await?.status(),
        StatusCode::UNAUTHORIZED,
        "deleting without credentials should be unauthenticated"
    );
    assert_eq!(
        delete(1).bearer_auth("fake token").send().await?.status(),
        StatusCode::FORBIDDEN
    );
    assert_eq!(
        delete(1).bearer_auth(&jane.refresh_token).send().await?.status(),
        StatusCode::FORBIDDEN,
        "a refresh token must not authorize requests"
    );
    assert_eq!(
        delete(1).bearer_auth(&jane.access_token).send().await?.status(),
        StatusCode::FORBIDDEN,
        "a non-admin should not delete someone else"
    );
    assert_eq!(
        delete(2).bearer_auth(&jane.access_token).send().await?.status(),
        StatusCode::OK
    );
    assert_eq!(
        delete(2).bearer_auth(&john.access_token).send().await?.status(),
        StatusCode::OK,
        "an admin may delete anyone"
    );

    let non_numeric = || client.delete(format!("http://{addr}/api/users/abc"));

    assert_eq!(
        non_numeric().send().await?.status(),
        StatusCode::UNAUTHORIZED,
        "a non-numeric id still goes through authentication"
    );
    assert_eq!(
        non_numeric().bearer_auth(&jane.access_token).send().await?.status(),
        StatusCode::FORBIDDEN,
        "a non-numeric id is never the caller's own"
    );
    assert_eq!(
        non_numeric().bearer_auth(&john.access_token).send().await?.status(),
        StatusCode::OK
    );

    Ok(())
}

#[tokio::test]
async fn logout_retires_the_refresh_token() -> anyhow::Result<()> {
    let auth = Auth::new(test_config())?;
    let addr = start_server(&auth).await?;
    let client = reqwest::Client::new();

    let jane = login(&client, addr, "Jane", "Jane0908").await?;

    assert_eq!(
        client
            .post(format!("http://{addr}/api/logout"))
            .json(&json!({ "token": jane.refresh_token }))
            .send()
            .await?
            .status(),
        StatusCode::UNAUTHORIZED,
        "logout requires an access token"
    );
    assert!(auth.credential_store().contains(&jane.refresh_token).await);

    for _ in 0..2 {
        assert_eq!(
            client
                .post(format!("http://{addr}/api/logout"))
                .bearer_auth(&jane.access_token)
                .json(&json!({ "token": jane.refresh_token }))
                .send()
                .await?
                .status(),
            StatusCode::OK,
            "logout should succeed whether or not the token is still known"
        );
    }
    assert!(auth.credential_store().is_empty().await);

    assert_eq!(
        client
            .post(format!("http://{addr}/api/logout"))
            .bearer_auth(&jane.access_token)
            .send()
            .await?
            .status(),
        StatusCode::OK,
        "logout without a body still succeeds"
    );

    assert_eq!(
        client
            .post(format!("http://{addr}/api/refresh"))
            .json(&json!({ "token": jane.refresh_token }))
            .send()
            .await?
            .status(),
        StatusCode::FORBIDDEN
    );

    Ok(())
}

#[tokio::test]
async fn access_token_stops_working_after_its_lifetime() -> anyhow::Result<()> {
    let mut config = test_config();
    config.access_token_lifetime = Duration::from_secs(2);
    let auth = Auth::new(config)?;
    let addr = start_server(&auth).await?;
    let client = reqwest::Client::new();

    let jane = login(&client, addr, "Jane", "Jane0908").await?;
    let url = format!("http://{addr}/api/users/2");

    assert_eq!(
        client.delete(&url).bearer_auth(&jane.access_token).send().await?.status(),
        StatusCode::OK
    );

    tokio::time::sleep(Duration::from_millis(3100)).await;

    assert_eq!(
        client.delete(&url).bearer_auth(&jane.access_token).send().await?.status(),
        StatusCode::FORBIDDEN,
        "an expired access token should be refused"
    );

    Ok(())
}

#[tokio::test]
async fn argon2_directory() -> anyhow::Result<()> {
    let passwords = Argon2Passwords::new("this is a terrible salt");
    let directory = Arc::new(InMemoryDirectory::new([principal(
        7,
        "Sam I Am",
        passwords.hash("foobar")?,
        false,
    )]));
    let config = AuthConfig::new("access secret", "refresh secret", directory)
        .with_password_verifier(Arc::new(passwords));
    let auth = Auth::new(config)?;
    let addr = start_server(&auth).await?;
    let client = reqwest::Client::new();

    let sam = login(&client, addr, "Sam I Am", "foobar").await?;
    assert!(!sam.is_admin);

    assert_eq!(
        client
            .post(format!("http://{addr}/api/login"))
            .json(&json!({"username": "Sam I Am", "password": "hunter1"}))
            .send()
            .await?
            .status(),
        StatusCode::BAD_REQUEST,
        "attempt to login with an invalid password should have been denied"
    );

    Ok(())
}
