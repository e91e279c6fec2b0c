// routes/secret.rs
// GET /secret?bytes=20 -> returns a fresh Base32 secret; DOES NOT persist.

use axum::{Json, extract::Query, http::StatusCode, response::IntoResponse};
use serde::Deserialize;

use crate::totp::{DEFAULT_SECRET_BYTES, MIN_SECRET_BYTES, generate_base32_secret_n};

/// Upper bound so a query cannot request an arbitrarily large allocation.
const MAX_SECRET_BYTES: usize = 64;

#[derive(Deserialize)]
pub struct SecretQuery {
    pub bytes: Option<usize>,
}

/// Only generates and returns a Base32 secret (NOPAD), e.g. for manual entry.
pub async fn secret_generate(Query(q): Query<SecretQuery>) -> impl IntoResponse {
    let n = q
        .bytes
        .unwrap_or(DEFAULT_SECRET_BYTES)
        .clamp(MIN_SECRET_BYTES, MAX_SECRET_BYTES);
    let secret = generate_base32_secret_n(n);
    (
        StatusCode::OK,
        Json(serde_json::json!({ "secret": secret, "bytes": n })),
    )
}
