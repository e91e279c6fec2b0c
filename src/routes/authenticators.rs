// routes/authenticators.rs
// Authenticator API: list with live codes, create from secret or otpauth URI,
// compute current code, cosmetic update, delete, explicit secret reveal, and
// the polling list page.

use std::sync::Arc;

use askama::Template;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use mongodb::bson::DateTime;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    models::{AuthenticatorEntry, Owner, Platform},
    otpauth::parse_uri,
    routes::{json_error, not_found, parse_id, store_error, totp_error},
    session::SessionUser,
    state::{
        AppState, NewAuthenticator, create_authenticator, delete_authenticator, get_authenticator,
        list_authenticators, list_authenticators_for, touch_last_used, update_authenticator_label,
    },
    totp::{Algorithm, DEFAULT_DIGITS, DEFAULT_PERIOD, compute_code_now},
};

/// How often the list page re-fetches codes; the countdown runs locally in between.
pub const POLL_INTERVAL_SECONDS: u64 = 10;

fn render<T: Template>(tpl: T) -> Result<Html<String>, StatusCode> {
    tpl.render()
        .map(Html)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

/// Public view of an entry: never carries the secret.
#[derive(Debug, Serialize)]
pub struct EntryView {
    pub id: String,
    pub profile_id: Option<String>,
    pub name: String,
    pub platform: Platform,
    pub issuer: Option<String>,
    pub account_name: Option<String>,
    pub algorithm: Algorithm,
    pub digits: u32,
    pub period: u64,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub last_used_at: Option<String>,
    pub code: Option<String>,
    pub remaining_seconds: Option<u64>,
}

impl From<AuthenticatorEntry> for EntryView {
    fn from(entry: AuthenticatorEntry) -> Self {
        let id = entry.id.map(|i| i.to_hex()).unwrap_or_default();
        let (code, remaining_seconds) =
            match compute_code_now(&entry.secret, entry.algorithm, entry.digits, entry.period) {
                Ok(c) => (Some(c.code), Some(c.remaining_seconds)),
                Err(e) => {
                    warn!(authenticator = %id, error = %e, "stored authenticator cannot produce a code");
                    (None, None)
                }
            };
        EntryView {
            id,
            profile_id: entry.profile_id.map(|p| p.to_hex()),
            name: entry.name,
            platform: entry.platform,
            issuer: entry.issuer,
            account_name: entry.account_name,
            algorithm: entry.algorithm,
            digits: entry.digits,
            period: entry.period,
            notes: entry.notes,
            created_at: fmt_date(entry.created_at),
            updated_at: fmt_date(entry.updated_at),
            last_used_at: entry.last_used_at.map(fmt_date),
            code,
            remaining_seconds,
        }
    }
}

fn fmt_date(dt: DateTime) -> String {
    dt.try_to_rfc3339_string().unwrap_or_default()
}

#[derive(Deserialize)]
pub struct ListQuery {
    pub profile_id: Option<String>,
    #[serde(default)]
    pub standalone: bool,
}

pub async fn authenticators_index(
    State(st): State<Arc<AppState>>,
    Query(q): Query<ListQuery>,
) -> Response {
    let owner = match (q.profile_id.as_deref(), q.standalone) {
        (Some(raw), _) => match parse_id(raw) {
            Ok(id) => Some(Owner::Profile(id)),
            Err(resp) => return resp,
        },
        (None, true) => Some(Owner::Standalone),
        (None, false) => None,
    };
    let entries = match &owner {
        Some(owner) => list_authenticators_for(&st, owner).await,
        None => list_authenticators(&st).await,
    };
    match entries {
        Ok(entries) => {
            let views: Vec<EntryView> = entries.into_iter().map(EntryView::from).collect();
            Json(views).into_response()
        }
        Err(e) => store_error(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateRequest {
    pub profile_id: Option<String>,
    pub name: Option<String>,
    #[serde(default)]
    pub platform: Platform,
    pub uri: Option<String>,
    pub secret: Option<String>,
    pub issuer: Option<String>,
    pub account_name: Option<String>,
    pub algorithm: Option<String>,
    pub digits: Option<u32>,
    pub period: Option<u64>,
    pub notes: Option<String>,
}

/// Creates an entry from a pasted/scanned otpauth URI or a manual secret.
pub async fn authenticators_create(
    State(st): State<Arc<AppState>>,
    Json(body): Json<CreateRequest>,
) -> Response {
    let owner = match body.profile_id.as_deref().filter(|p| !p.is_empty()) {
        Some(raw) => match parse_id(raw) {
            Ok(id) => Owner::Profile(id),
            Err(_) => return json_error(StatusCode::UNPROCESSABLE_ENTITY, "owner profile not found"),
        },
        None => Owner::Standalone,
    };

    let mut new = match (body.uri.as_deref(), body.secret.as_deref()) {
        (Some(uri), _) => match parse_uri(uri) {
            Ok(parsed) => NewAuthenticator::from_parsed(parsed, owner, body.name, body.platform),
            Err(e) => {
                return json_error(
                    StatusCode::UNPROCESSABLE_ENTITY,
                    format!("invalid QR code data: {e}"),
                );
            }
        },
        (None, Some(secret)) => {
            let algorithm = match body.algorithm.as_deref() {
                Some(raw) => match raw.parse::<Algorithm>() {
                    Ok(a) => a,
                    Err(e) => return totp_error(&e),
                },
                None => Algorithm::default(),
            };
            NewAuthenticator {
                owner,
                name: body.name.unwrap_or_default(),
                platform: body.platform,
                issuer: body.issuer,
                account_name: body.account_name,
                secret: secret.to_string(),
                algorithm,
                digits: body.digits.unwrap_or(DEFAULT_DIGITS),
                period: body.period.unwrap_or(DEFAULT_PERIOD),
                notes: None,
            }
        }
        (None, None) => {
            return json_error(
                StatusCode::UNPROCESSABLE_ENTITY,
                "either uri or secret is required",
            );
        }
    };
    new.notes = body.notes;

    let id = match create_authenticator(&st, new).await {
        Ok(id) => id,
        Err(e) => return store_error(e),
    };
    match get_authenticator(&st, &id).await {
        Ok(Some(entry)) => (StatusCode::CREATED, Json(EntryView::from(entry))).into_response(),
        Ok(None) => not_found(),
        Err(e) => store_error(e),
    }
}

pub async fn authenticators_show(
    State(st): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match get_authenticator(&st, &id).await {
        Ok(Some(entry)) => Json(EntryView::from(entry)).into_response(),
        Ok(None) => not_found(),
        Err(e) => store_error(e),
    }
}

#[derive(Serialize)]
pub struct CodeResponse {
    pub code: String,
    pub remaining_seconds: u64,
    pub period: u64,
}

/// Computes the current code for one entry and records the use.
pub async fn authenticators_code(
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
    let current = match compute_code_now(&entry.secret, entry.algorithm, entry.digits, entry.period)
    {
        Ok(c) => c,
        Err(e) => return totp_error(&e),
    };
    if let Err(e) = touch_last_used(&st, &id).await {
        warn!(authenticator = %id, error = %e, "could not record last use");
    }
    Json(CodeResponse {
        code: current.code,
        remaining_seconds: current.remaining_seconds,
        period: entry.period,
    })
    .into_response()
}

#[derive(Deserialize)]
pub struct UpdateRequest {
    pub name: String,
    pub notes: Option<String>,
}

pub async fn authenticators_update(
    State(st): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<UpdateRequest>,
) -> Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match update_authenticator_label(&st, &id, &body.name, body.notes).await {
        Ok(true) => match get_authenticator(&st, &id).await {
            Ok(Some(entry)) => Json(EntryView::from(entry)).into_response(),
            Ok(None) => not_found(),
            Err(e) => store_error(e),
        },
        Ok(false) => not_found(),
        Err(e) => store_error(e),
    }
}

pub async fn authenticators_delete(
    State(st): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match delete_authenticator(&st, &id).await {
        Ok(true) => Json(serde_json::json!({ "ok": true })).into_response(),
        Ok(false) => not_found(),
        Err(e) => store_error(e),
    }
}

/// Returns the stored secret. Only on explicit request; the access is logged
/// (without the secret itself).
pub async fn authenticators_reveal(
    session: SessionUser,
    State(st): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match get_authenticator(&st, &id).await {
        Ok(Some(entry)) => {
            info!(authenticator = %id, operator = %session.email(), "secret revealed");
            Json(serde_json::json!({ "secret": entry.secret })).into_response()
        }
        Ok(None) => not_found(),
        Err(e) => store_error(e),
    }
}

#[derive(Template)]
#[template(path = "authenticators/index.html")]
struct AuthenticatorsTemplate {
    operator: String,
    rows: Vec<EntryRow>,
    poll_interval_seconds: u64,
}

struct EntryRow {
    id: String,
    name: String,
    platform: String,
    account: String,
    code: String,
    has_code: bool,
    remaining_seconds: u64,
}

pub async fn authenticators_page(
    session: SessionUser,
    State(st): State<Arc<AppState>>,
) -> Result<Html<String>, StatusCode> {
    let entries = list_authenticators(&st)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    let rows = entries
        .into_iter()
        .map(EntryView::from)
        .map(|v| EntryRow {
            account: match (&v.issuer, &v.account_name) {
                (Some(issuer), Some(account)) => format!("{issuer} / {account}"),
                (Some(only), None) | (None, Some(only)) => only.clone(),
                (None, None) => String::new(),
            },
            id: v.id,
            name: v.name,
            platform: v.platform.as_str().to_string(),
            has_code: v.code.is_some(),
            code: v.code.unwrap_or_else(|| "------".to_string()),
            remaining_seconds: v.remaining_seconds.unwrap_or(0),
        })
        .collect();

    render(AuthenticatorsTemplate {
        operator: session.email().to_string(),
        rows,
        poll_interval_seconds: POLL_INTERVAL_SECONDS,
    })
}
