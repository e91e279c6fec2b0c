// state module: AppState, initialization, and re-exports of submodules.

use std::{sync::Arc, time::Duration};

use anyhow::Result;
use mongodb::{Client, Collection, Database};
use tokio::sync::Semaphore;
use tracing::info;

use crate::config::Config;
use crate::models::{AuthenticatorEntry, Profile, Session, User};
use crate::qr::{MAX_CONCURRENT_DECODES, QrDecoder, RqrrDecoder};

mod authenticators;
mod profiles;
mod seed;
mod users;

pub use authenticators::*;
pub use profiles::*;
pub use users::*;

pub const SESSION_TTL_SECONDS: u64 = 60 * 60 * 24; // 1 day
/// Skew accepted when an operator logs in with a TOTP code.
pub const LOGIN_SKEW_STEPS: u64 = 1;

#[derive(Clone)]
pub struct AppState {
    pub users: Collection<User>,
    pub sessions: Collection<Session>,
    pub profiles: Collection<Profile>,
    pub authenticators: Collection<AuthenticatorEntry>,
    pub qr_decoder: Arc<dyn QrDecoder>,
    pub qr_permits: Arc<Semaphore>,
    pub qr_timeout: Duration,
}

impl AppState {
    pub fn from_database(db: &Database, qr_decoder: Arc<dyn QrDecoder>, qr_timeout: Duration) -> Self {
        AppState {
            users: db.collection::<User>("users"),
            sessions: db.collection::<Session>("sessions"),
            profiles: db.collection::<Profile>("profiles"),
            authenticators: db.collection::<AuthenticatorEntry>("authenticators"),
            qr_decoder,
            qr_permits: Arc::new(Semaphore::new(MAX_CONCURRENT_DECODES)),
            qr_timeout,
        }
    }

    /// Swaps the QR decoder, e.g. for a stub in tests.
    pub fn with_decoder(mut self, qr_decoder: Arc<dyn QrDecoder>) -> Self {
        self.qr_decoder = qr_decoder;
        self
    }
}

pub async fn init_state(config: &Config) -> Result<AppState> {
    let client = Client::with_uri_str(&config.mongodb_uri).await?;
    let db = client.database(&config.mongodb_db);

    seed::ensure_collections(&db).await?;
    seed::ensure_indexes(&db).await?;

    // Only seed when no operator exists yet.
    if seed::is_database_empty(&db).await? {
        let default_users = seed::load_default_users(&config.users_file)?;
        let seeded = seed::seed_default_users(&db, &default_users).await?;
        info!(operators = seeded, db = %config.mongodb_db, "seeded default operators");
    }

    Ok(AppState::from_database(
        &db,
        Arc::new(RqrrDecoder),
        config.qr_decode_timeout,
    ))
}
