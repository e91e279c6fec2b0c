use std::fs;

use anyhow::{Context, Result};
use mongodb::{
    Database, IndexModel,
    bson::{Document, doc},
    options::IndexOptions,
};
use tracing::warn;

use crate::models::{SeedUser, User};
use crate::totp::normalize_secret;

const COLLECTIONS: [&str; 4] = ["users", "sessions", "profiles", "authenticators"];

pub(super) async fn is_database_empty(db: &Database) -> Result<bool> {
    let users_coll = db.collection::<User>("users");
    let count = users_coll.estimated_document_count().await?;
    Ok(count == 0)
}

/// Reads operators from `path`. A missing file seeds nothing.
pub(super) fn load_default_users(path: &str) -> Result<Vec<SeedUser>> {
    let users_json = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) => {
            warn!(path, error = %err, "users file not readable; no operators seeded");
            return Ok(Vec::new());
        }
    };
    let users = serde_json::from_str::<Vec<SeedUser>>(&users_json)
        .with_context(|| format!("invalid users file {path}"))?;
    Ok(users)
}

pub(super) async fn ensure_collections(db: &Database) -> Result<()> {
    let existing = db.list_collection_names().await?;
    for name in COLLECTIONS {
        if !existing.iter().any(|n| n == name) {
            db.create_collection(name).await?;
        }
    }
    Ok(())
}

pub(super) async fn ensure_indexes(db: &Database) -> Result<()> {
    let unique = || IndexOptions::builder().unique(true).build();

    db.collection::<Document>("users")
        .create_index(
            IndexModel::builder()
                .keys(doc! { "email": 1 })
                .options(unique())
                .build(),
        )
        .await?;
    db.collection::<Document>("sessions")
        .create_index(
            IndexModel::builder()
                .keys(doc! { "token": 1 })
                .options(unique())
                .build(),
        )
        .await?;
    db.collection::<Document>("authenticators")
        .create_index(IndexModel::builder().keys(doc! { "profile_id": 1 }).build())
        .await?;
    Ok(())
}

pub(super) async fn seed_default_users(db: &Database, users: &[SeedUser]) -> Result<usize> {
    let users_coll = db.collection::<User>("users");
    let mut seeded = 0;
    for user in users {
        let secret = normalize_secret(&user.secret)
            .with_context(|| format!("seed operator {} has an invalid secret", user.email))?;
        users_coll
            .update_one(
                doc! { "email": &user.email },
                doc! { "$set": { "email": &user.email, "secret": &secret } },
            )
            .upsert(true)
            .await?;
        seeded += 1;
    }
    Ok(seeded)
}
