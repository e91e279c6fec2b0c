// routes/profiles.rs
// Minimal identity-profile endpoints: list, create, delete (cascades to the
// profile's authenticators).

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::{
    routes::{json_error, not_found, parse_id, store_error},
    state::{AppState, create_profile, delete_profile, get_profile, list_profiles},
};

#[derive(Serialize)]
pub struct ProfileView {
    pub id: String,
    pub name: String,
}

#[derive(Deserialize)]
pub struct ProfileRequest {
    pub name: String,
}

pub async fn profiles_index(State(st): State<Arc<AppState>>) -> Response {
    match list_profiles(&st).await {
        Ok(profiles) => {
            let views: Vec<ProfileView> = profiles
                .into_iter()
                .map(|p| ProfileView {
                    id: p.id.map(|i| i.to_hex()).unwrap_or_default(),
                    name: p.name,
                })
                .collect();
            Json(views).into_response()
        }
        Err(e) => store_error(e),
    }
}

pub async fn profiles_create(
    State(st): State<Arc<AppState>>,
    Json(body): Json<ProfileRequest>,
) -> Response {
    if body.name.trim().is_empty() {
        return json_error(StatusCode::UNPROCESSABLE_ENTITY, "profile name is required");
    }
    let id = match create_profile(&st, &body.name).await {
        Ok(id) => id,
        Err(e) => return store_error(e),
    };
    match get_profile(&st, &id).await {
        Ok(Some(profile)) => (
            StatusCode::CREATED,
            Json(ProfileView {
                id: id.to_hex(),
                name: profile.name,
            }),
        )
            .into_response(),
        Ok(None) => not_found(),
        Err(e) => store_error(e),
    }
}

pub async fn profiles_delete(
    State(st): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match delete_profile(&st, &id).await {
        Ok(true) => Json(serde_json::json!({ "ok": true })).into_response(),
        Ok(false) => not_found(),
        Err(e) => store_error(e),
    }
}
