use anyhow::{Context, Result};
use futures::stream::TryStreamExt;
use mongodb::bson::{DateTime, doc, oid::ObjectId};
use tracing::info;

use crate::models::Profile;

use super::AppState;

pub async fn list_profiles(state: &AppState) -> Result<Vec<Profile>> {
    let mut cursor = state.profiles.find(doc! {}).sort(doc! { "name": 1 }).await?;
    let mut profiles = Vec::new();
    while let Some(profile) = cursor.try_next().await? {
        profiles.push(profile);
    }
    Ok(profiles)
}

pub async fn get_profile(state: &AppState, id: &ObjectId) -> Result<Option<Profile>> {
    state
        .profiles
        .find_one(doc! { "_id": id })
        .await
        .map_err(Into::into)
}

pub async fn create_profile(state: &AppState, name: &str) -> Result<ObjectId> {
    let name = name.trim();
    anyhow::ensure!(!name.is_empty(), "profile name is required");
    let res = state
        .profiles
        .insert_one(Profile {
            id: None,
            name: name.to_string(),
            created_at: DateTime::now(),
        })
        .await?;
    res.inserted_id
        .as_object_id()
        .context("profile insert missing _id")
}

/// Deletes the profile and every authenticator it owns.
/// Returns false when no such profile existed.
pub async fn delete_profile(state: &AppState, id: &ObjectId) -> Result<bool> {
    // profile first: an entry inserted after this point fails its owner re-check
    let res = state.profiles.delete_one(doc! { "_id": id }).await?;
    let removed = state
        .authenticators
        .delete_many(doc! { "profile_id": id })
        .await?;
    info!(
        profile = %id,
        authenticators = removed.deleted_count,
        "profile deleted with its authenticators"
    );
    Ok(res.deleted_count > 0)
}
