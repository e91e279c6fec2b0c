#![allow(dead_code)]

use std::{
    env,
    sync::{Mutex, MutexGuard, OnceLock},
    time::{SystemTime, UNIX_EPOCH},
};

use mongodb::Client;

use authdesk::config::Config;
use authdesk::state::{AppState, init_state};

/// Global lock so integration tests that mutate the DB run one-at-a-time.
static TEST_DB_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

pub struct TestContext {
    pub state: AppState,
    pub db_name: String,
    pub uri: String,
    _guard: MutexGuard<'static, ()>,
}

fn test_uri() -> String {
    let uri = env::var("MONGODB_URI").unwrap_or_else(|_| "mongodb://localhost:27017".to_string());
    // fail fast when no server is running
    if uri.contains("serverSelectionTimeoutMS") {
        uri
    } else if uri.contains('?') {
        format!("{uri}&serverSelectionTimeoutMS=2000")
    } else {
        format!("{uri}/?serverSelectionTimeoutMS=2000")
    }
}

pub fn test_config(uri: &str, db_name: &str) -> Config {
    let mut config = Config::from_lookup(|_| None).expect("default config");
    config.mongodb_uri = uri.to_string();
    config.mongodb_db = db_name.to_string();
    config.users_file = "./tests/fixtures/users.json".to_string();
    config
}

pub async fn setup_state() -> Option<TestContext> {
    let guard = TEST_DB_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());

    let uri = test_uri();
    let db_name = format!(
        "authdesktest_{}",
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_millis()
    );

    let client = match Client::with_uri_str(&uri).await {
        Ok(c) => c,
        Err(err) => {
            eprintln!("Skipping test; cannot connect to MongoDB: {err:?}");
            return None;
        }
    };
    if let Err(err) = client.database(&db_name).drop().await {
        eprintln!("Skipping test; cannot drop test DB: {err:?}");
        return None;
    }

    match init_state(&test_config(&uri, &db_name)).await {
        Ok(state) => Some(TestContext {
            state,
            db_name,
            uri,
            _guard: guard,
        }),
        Err(err) => {
            eprintln!("Skipping test; init_state failed: {err:?}");
            None
        }
    }
}

pub async fn teardown(ctx: TestContext) {
    if let Ok(client) = Client::with_uri_str(&ctx.uri).await {
        let _ = client.database(&ctx.db_name).drop().await;
    }
}
