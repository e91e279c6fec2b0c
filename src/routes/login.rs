// routes/login.rs
// POST /login { "email": "...", "code": "123456" } -> { "ok": true|false } + session cookie.

use std::sync::Arc;

use axum::{
    extract::{Json, State},
    http::{HeaderValue, StatusCode, header::SET_COOKIE},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::session::SESSION_COOKIE_NAME;
use crate::state::{AppState, SESSION_TTL_SECONDS, check_login_code, create_session, find_user};

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub code: String,
}

/// Verifies the operator's current TOTP code, accepting ±1 time step.
pub async fn login(State(st): State<Arc<AppState>>, Json(body): Json<LoginRequest>) -> Response {
    let user = match find_user(&st, &body.email).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            warn!(email = %body.email, "login for unknown operator");
            return rejected();
        }
        Err(e) => {
            error!(error = %e, "operator lookup failed");
            return internal("db error");
        }
    };

    match check_login_code(&user, &body.code) {
        Ok(true) => {}
        Ok(false) => {
            warn!(email = %user.email, "login with wrong code");
            return rejected();
        }
        Err(e) => {
            // stored operator secret is unusable
            error!(email = %user.email, error = %e, "operator secret rejected by engine");
            return internal("invalid operator secret");
        }
    }

    match create_session(&st, &user.email).await {
        Ok(token) => {
            info!(email = %user.email, "operator logged in");
            let mut response =
                (StatusCode::OK, Json(serde_json::json!({ "ok": true }))).into_response();
            if let Ok(header_value) = HeaderValue::from_str(&session_cookie(&token)) {
                response.headers_mut().append(SET_COOKIE, header_value);
            }
            response
        }
        Err(e) => {
            error!(error = %e, "session creation failed");
            internal("session error")
        }
    }
}

pub(crate) fn session_cookie(token: &str) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE_NAME, token, SESSION_TTL_SECONDS
    )
}

fn rejected() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({ "ok": false })),
    )
        .into_response()
}

fn internal(message: &str) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({ "error": message })),
    )
        .into_response()
}
