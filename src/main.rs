// main.rs
// Axum server wiring: loads config, connects MongoDB, builds router, and serves.
//
// Endpoints:
// - GET  /                               -> login form posting to /login
// - POST /login                          -> validates {"email","code"} against the operator's TOTP
// - GET  /authenticators                 -> live list page (polls codes)
// - GET  /api/authenticators             -> entries with current codes (no secrets)
// - POST /api/authenticators             -> create from secret or otpauth URI
// - GET  /api/authenticators/{id}/code   -> current code + seconds remaining
// - POST /api/otpauth/parse              -> parse an otpauth URI
// - POST /api/otpauth/scan               -> read a QR screenshot and parse it
// - GET  /secret?bytes=20                -> generates a new Base32 secret (no persistence)

use std::sync::Arc;

use anyhow::{Context, Result};
use dotenvy::dotenv;
use tokio::net::TcpListener;
use tracing::info;

use authdesk::{config::Config, routes, state, telemetry};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let config = Config::from_env()?;
    telemetry::init_tracing(&config.log_level, config.log_json);

    let state = Arc::new(
        state::init_state(&config)
            .await
            .context("failed to initialize MongoDB state")?,
    );
    let app = routes::router(state);

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("cannot bind {}", config.bind_addr))?;
    info!(addr = %config.bind_addr, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}
