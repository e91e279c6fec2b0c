// routes/mod.rs
// Route handlers, the router that wires them, and shared JSON error helpers.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use mongodb::bson::oid::ObjectId;
use tracing::error;

use crate::session::require_session;
use crate::state::{AppState, EntryError};
use crate::totp::TotpError;

pub mod authenticators;
pub mod home;
pub mod login;
pub mod logout;
pub mod otpauth;
pub mod profiles;
pub mod qrcode;
pub mod secret;

pub use authenticators::*;
pub use home::{healthz, home};
pub use login::login;
pub use logout::logout;
pub use otpauth::{otpauth_parse, otpauth_scan};
pub use profiles::{profiles_create, profiles_delete, profiles_index};
pub use qrcode::authenticators_qrcode;
pub use secret::secret_generate;

/// Screenshots of QR codes are rarely above a few MB.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

pub fn router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/authenticators", get(authenticators_page))
        .route(
            "/api/authenticators",
            get(authenticators_index).post(authenticators_create),
        )
        .route("/api/authenticators/{id}", get(authenticators_show))
        .route("/api/authenticators/{id}/code", get(authenticators_code))
        .route(
            "/api/authenticators/{id}/update",
            post(authenticators_update),
        )
        .route(
            "/api/authenticators/{id}/delete",
            post(authenticators_delete),
        )
        .route(
            "/api/authenticators/{id}/reveal",
            post(authenticators_reveal),
        )
        .route(
            "/api/authenticators/{id}/qrcode",
            get(authenticators_qrcode),
        )
        .route("/api/otpauth/parse", post(otpauth_parse))
        .route("/api/otpauth/scan", post(otpauth_scan))
        .route("/api/profiles", get(profiles_index).post(profiles_create))
        .route("/api/profiles/{id}/delete", post(profiles_delete))
        .route("/secret", get(secret_generate))
        .route("/logout", post(logout))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_session,
        ));

    Router::new()
        .route("/", get(home))
        .route("/login", post(login))
        .route("/healthz", get(healthz))
        .merge(protected)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}

pub(crate) fn json_error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

pub(crate) fn not_found() -> Response {
    json_error(StatusCode::NOT_FOUND, "not found")
}

pub(crate) fn parse_id(raw: &str) -> Result<ObjectId, Response> {
    ObjectId::parse_str(raw).map_err(|_| not_found())
}

pub(crate) fn totp_error(err: &TotpError) -> Response {
    match err {
        TotpError::InvalidSecret => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invalid secret key")
        }
        TotpError::InvalidParameters(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, msg.clone())
        }
    }
}

/// Validation failures become 422; anything else is a storage failure.
pub(crate) fn store_error(err: anyhow::Error) -> Response {
    if let Some(entry) = err.downcast_ref::<EntryError>() {
        return match entry {
            EntryError::Totp(totp) => totp_error(totp),
            other => json_error(StatusCode::UNPROCESSABLE_ENTITY, other.to_string()),
        };
    }
    error!(error = %err, "store operation failed");
    json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
}
