use std::time::{Duration, SystemTime};

use anyhow::Result;
use data_encoding::BASE32_NOPAD;
use mongodb::bson::{DateTime, doc};
use rand::RngCore;
use tracing::warn;

use crate::models::{Session, User};
use crate::totp::{Algorithm, DEFAULT_DIGITS, DEFAULT_PERIOD, unix_now, verify_code};

use super::{AppState, LOGIN_SKEW_STEPS, SESSION_TTL_SECONDS};

pub async fn find_user(state: &AppState, email: &str) -> Result<Option<User>> {
    Ok(state.users.find_one(doc! { "email": email }).await?)
}

/// Operators use the console defaults (SHA1, 6 digits, 30 s) with ±1 step.
pub fn check_login_code(user: &User, code: &str) -> Result<bool> {
    Ok(verify_code(
        &user.secret,
        Algorithm::Sha1,
        DEFAULT_DIGITS,
        DEFAULT_PERIOD,
        code,
        unix_now(),
        LOGIN_SKEW_STEPS,
    )?)
}

pub async fn create_session(state: &AppState, email: &str) -> Result<String> {
    // a stale session left behind still expires on its own
    if let Err(e) = state
        .sessions
        .delete_many(doc! { "user_email": email.to_string() })
        .await
    {
        warn!(email, error = %e, "could not clear previous sessions");
    }

    let mut token_bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut token_bytes);
    let token = BASE32_NOPAD.encode(&token_bytes);

    let expires_at =
        DateTime::from_system_time(SystemTime::now() + Duration::from_secs(SESSION_TTL_SECONDS));

    state
        .sessions
        .insert_one(Session {
            id: None,
            token: token.clone(),
            user_email: email.to_string(),
            expires_at,
        })
        .await?;

    Ok(token)
}

pub async fn find_user_by_session(state: &AppState, token: &str) -> Result<Option<User>> {
    if let Some(session) = state.sessions.find_one(doc! { "token": token }).await? {
        let expires_at = session.expires_at.to_system_time();
        if expires_at <= SystemTime::now() {
            // Remove expired session, ignore result
            let _ = state.sessions.delete_one(doc! { "token": token }).await;
            return Ok(None);
        }
        find_user(state, &session.user_email).await
    } else {
        Ok(None)
    }
}

pub async fn delete_session(state: &AppState, token: &str) -> Result<()> {
    state.sessions.delete_one(doc! { "token": token }).await?;
    Ok(())
}
