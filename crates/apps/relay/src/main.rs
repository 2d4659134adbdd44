//! Relay - local HTTP façade over the 42 Intra API
//!
//! Wires the sync core to an axum router: credentials from config, a
//! SQLite store under the config directory, and the sync endpoints.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use log::info;
use scores::{ApiConfig, IntraClient, LogSink, SqliteScoreStore, TokenManager};

mod error;
mod routes;

use routes::AppState;

/// Lifetime assumed for a pre-seeded access token (the upstream grant
/// length); its real expiry is unknown, so the first refresh replaces it.
const SEEDED_TOKEN_TTL_SECS: i64 = 7200;

fn database_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("DB_PATH") {
        return Ok(PathBuf::from(path));
    }
    config::ensure_config_dir().map(|dir| dir.join("scores.db"))
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    config::init().context("Failed to initialize config directory")?;

    let api_config = ApiConfig::load().context("Failed to load API credentials")?;

    let auth = Arc::new(TokenManager::new(&api_config));
    if let Some(token) = &api_config.access_token {
        auth.seed_access_token(token.clone(), SEEDED_TOKEN_TTL_SECS);
        info!("seeded access token from config");
    }

    let client = Arc::new(IntraClient::new(Arc::clone(&auth), &api_config.api_root));

    let db_path = database_path()?;
    let store = SqliteScoreStore::new(&db_path)
        .with_context(|| format!("Failed to open database at {}", db_path.display()))?;
    info!("database ready at {}", db_path.display());

    let state = AppState {
        auth,
        client,
        store: Arc::new(store),
        sink: Arc::new(LogSink),
    };

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("Failed to bind port {}", port))?;
    info!("relay listening on port {}", port);

    axum::serve(listener, routes::router(state))
        .await
        .context("Server error")?;

    Ok(())
}
