// routes/qrcode.rs
// GET /api/authenticators/{id}/qrcode -> PNG QR code of the entry's otpauth URI,
// so it can be enrolled in a phone authenticator app.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use tracing::{error, info};

use crate::{
    otpauth::build_uri,
    qr::render_png,
    routes::{json_error, not_found, parse_id, store_error, totp_error},
    session::SessionUser,
    state::{AppState, get_authenticator},
};

pub async fn authenticators_qrcode(
    session: SessionUser,
    State(st): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let entry = match get_authenticator(&st, &id).await {
        Ok(Some(entry)) => entry,
        Ok(None) => return not_found(),
        Err(e) => return store_error(e),
    };
    let uri = match build_uri(&entry.provisioning()) {
        Ok(uri) => uri,
        Err(e) => return totp_error(&e),
    };
    match render_png(&uri) {
        Ok(png) => {
            // the QR code carries the secret
            info!(authenticator = %id, operator = %session.email(), "secret exported as qr code");
            (
                [
                    (header::CONTENT_TYPE, "image/png"),
                    (header::CACHE_CONTROL, "no-store"),
                ],
                Body::from(png),
            )
                .into_response()
        }
        Err(e) => {
            error!(authenticator = %id, error = %e, "qr rendering failed");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "failed to build qr")
        }
    }
}
