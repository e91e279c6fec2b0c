// routes/logout.rs
// POST /logout -> clears the session cookie and removes the session entry.

use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    http::{HeaderValue, StatusCode, header::SET_COOKIE},
    response::{IntoResponse, Response},
};
use tracing::{error, info};

use crate::session::{SESSION_COOKIE_NAME, SessionUser};
use crate::state::{AppState, delete_session};

pub async fn logout(State(st): State<Arc<AppState>>, session: SessionUser) -> Response {
    let mut response = match delete_session(&st, session.token()).await {
        Ok(()) => {
            info!(email = %session.email(), "operator logged out");
            (StatusCode::OK, Json(serde_json::json!({ "ok": true }))).into_response()
        }
        Err(e) => {
            error!(error = %e, "session delete failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "session error" })),
            )
                .into_response()
        }
    };

    // the cookie is cleared either way
    let clear = format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if let Ok(header_value) = HeaderValue::from_str(&clear) {
        response.headers_mut().append(SET_COOKIE, header_value);
    }
    response
}
