use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use token_rotation_for_warp::{
    build_api_route_filter, handle_auth_errors, with_auth, AccessClaims, Auth, AuthConfig,
    InMemoryDirectory, Principal, PrincipalId, StoredPassword, Username,
};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use warp::{path, Filter};

// AUTH_ACCESS_TOKEN_SECRET=... AUTH_REFRESH_TOKEN_SECRET=... cargo run --example server
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .init();

    let directory = Arc::new(InMemoryDirectory::new([
        Principal {
            id: PrincipalId(1),
            username: Username("John".into()),
            password: StoredPassword("John0908".into()),
            is_admin: true,
        },
        Principal {
            id: PrincipalId(2),
            username: Username("Jane".into()),
            password: StoredPassword("Jane0908".into()),
            is_admin: false,
        },
    ]));

    let auth = Auth::new(AuthConfig::from_env(directory)?)?;

    let whoami = path!("api" / "whoami")
        .and(warp::get())
        .and(with_auth(&auth))
        .map(|claims: AccessClaims| warp::reply::json(&claims));

    let routes = build_api_route_filter(&auth)
        .or(whoami)
        .recover(handle_auth_errors);

    let addr: SocketAddr = std::env::var("AUTH_DEMO_ADDR")
        .unwrap_or_else(|_| "127.0.0.1:6000".into())
        .parse()
        .context("AUTH_DEMO_ADDR is not a socket address")?;

    info!(%addr, "server started");
    warp::serve(routes).run(addr).await;

    Ok(())
}
