mod config;

mod app;
mod auth;
mod ctx;
mod db;
mod errors;
mod notes;
mod openapi;
mod shared;

use std::net::SocketAddr;

use aide::axum::ApiRouter;
use app::AppParams;
use auth::{Authenticator, JwtIdentityResolver};
pub use config::config;
pub use db::{init_db, DB};
pub use errors::{Error, Result};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> errors::Result<()> {
    let config = config::init().map_err(|e| Error::Unexpected(format!("invalid configuration: {e}")))?;

    shared::tracing::setup_tracing(config.log_json);

    let Some(secret) = config.jwt_secret.clone() else {
        tracing::error!("JWT_SECRET is not set");
        return Err(Error::Unexpected("JWT_SECRET is required".into()));
    };
    let authenticator = Authenticator::new(JwtIdentityResolver::new(secret, config.jwt_audience.clone()));

    let db = init_db(&config.database_url).await?;

    let (app, _api) = app::create(AppParams {
        db,
        authenticator,
        router: ApiRouter::new().merge(notes::router()),
    })
    .await?;

    let app = shared::tracing::add_tracing_layer(app);

    let listener = TcpListener::bind((config.host.as_str(), config.port))
        .await
        .map_err(|e| Error::Unexpected(format!("cannot bind {}:{}: {e}", config.host, config.port)))?;

    if let Ok(addr) = listener.local_addr() {
        tracing::info!("listening on http://{addr}");
    }

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .map_err(|e| Error::Unexpected(e.to_string()))?;

    Ok(())
}
