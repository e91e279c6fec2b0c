// routes/otpauth.rs
// POST /api/otpauth/parse { "uri": "otpauth://totp/..." } -> parsed fields
// POST /api/otpauth/scan  multipart `image` -> decoded payload + parsed fields

use std::sync::Arc;

use axum::{
    Json,
    extract::{Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    otpauth::{ParsedAuthenticator, parse_uri},
    qr::decode_with_timeout,
    routes::json_error,
    state::AppState,
    totp::Algorithm,
};

#[derive(Deserialize)]
pub struct ParseRequest {
    pub uri: String,
}

/// Parsed provisioning fields without the secret.
#[derive(Debug, Serialize)]
pub struct ParsedView {
    pub issuer: Option<String>,
    pub account_name: Option<String>,
    pub algorithm: Algorithm,
    pub digits: u32,
    pub period: u64,
}

impl From<ParsedAuthenticator> for ParsedView {
    fn from(parsed: ParsedAuthenticator) -> Self {
        ParsedView {
            issuer: parsed.issuer,
            account_name: parsed.account_name,
            algorithm: parsed.algorithm,
            digits: parsed.digits,
            period: parsed.period,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ScanResponse {
    /// Raw QR payload; submitted back as `uri` to save the entry.
    pub uri: String,
    pub parsed: ParsedView,
}

pub async fn otpauth_parse(Json(body): Json<ParseRequest>) -> Response {
    match parse_uri(&body.uri) {
        Ok(parsed) => Json(ParsedView::from(parsed)).into_response(),
        Err(e) => json_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            format!("invalid QR code data: {e}"),
        ),
    }
}

pub async fn otpauth_scan(State(st): State<Arc<AppState>>, mut multipart: Multipart) -> Response {
    let mut image = None;
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                if field.name() != Some("image") {
                    continue;
                }
                match field.bytes().await {
                    Ok(bytes) => image = Some(bytes.to_vec()),
                    Err(e) => return json_error(StatusCode::BAD_REQUEST, e.body_text()),
                }
            }
            Ok(None) => break,
            Err(e) => return json_error(StatusCode::BAD_REQUEST, e.body_text()),
        }
    }
    let Some(image) = image else {
        return json_error(StatusCode::BAD_REQUEST, "image field is required");
    };

    let size = image.len();
    let decoded = decode_with_timeout(
        st.qr_decoder.clone(),
        st.qr_permits.clone(),
        image,
        st.qr_timeout,
    )
    .await;
    let payload = match decoded {
        Ok(payload) => payload,
        Err(e) => {
            warn!(bytes = size, error = %e, "qr decode failed");
            return json_error(StatusCode::UNPROCESSABLE_ENTITY, "could not read QR code");
        }
    };

    match parse_uri(&payload) {
        Ok(parsed) => {
            info!(bytes = size, issuer = ?parsed.issuer, "qr code scanned");
            Json(ScanResponse {
                uri: payload,
                parsed: ParsedView::from(parsed),
            })
            .into_response()
        }
        // a readable QR code that is not an authenticator
        Err(e) => json_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            format!("invalid QR code data: {e}"),
        ),
    }
}
