use anyhow::{Context, Result};
use futures::stream::TryStreamExt;
use mongodb::bson::{Bson, DateTime, Document, doc, oid::ObjectId};
use thiserror::Error;
use tracing::{info, warn};

use crate::models::{AuthenticatorEntry, Owner, Platform};
use crate::otpauth::ParsedAuthenticator;
use crate::totp::{Algorithm, DEFAULT_DIGITS, DEFAULT_PERIOD, TotpError, compute_code, normalize_secret};

use super::AppState;

/// Validation failures when writing an entry. Wrapped in `anyhow::Error`;
/// callers `downcast_ref` to tell them apart from storage failures.
#[derive(Debug, Error)]
pub enum EntryError {
    #[error(transparent)]
    Totp(#[from] TotpError),
    #[error("owner profile not found")]
    UnknownOwner,
    #[error("name is required")]
    MissingName,
}

/// Input for [`create_authenticator`]; the secret may still carry spaces,
/// dashes or lowercase letters.
#[derive(Debug, Clone)]
pub struct NewAuthenticator {
    pub owner: Owner,
    pub name: String,
    pub platform: Platform,
    pub issuer: Option<String>,
    pub account_name: Option<String>,
    pub secret: String,
    pub algorithm: Algorithm,
    pub digits: u32,
    pub period: u64,
    pub notes: Option<String>,
}

impl NewAuthenticator {
    /// Manual entry with the usual defaults (SHA1, 6 digits, 30 s).
    pub fn manual(owner: Owner, name: &str, secret: &str) -> Self {
        NewAuthenticator {
            owner,
            name: name.to_string(),
            platform: Platform::Other,
            issuer: None,
            account_name: None,
            secret: secret.to_string(),
            algorithm: Algorithm::Sha1,
            digits: DEFAULT_DIGITS,
            period: DEFAULT_PERIOD,
            notes: None,
        }
    }

    /// Entry from a scanned otpauth URI. Without an explicit name the label
    /// becomes "Issuer - account".
    pub fn from_parsed(
        parsed: ParsedAuthenticator,
        owner: Owner,
        name: Option<String>,
        platform: Platform,
    ) -> Self {
        let name = name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| default_name(&parsed));
        NewAuthenticator {
            owner,
            name,
            platform,
            issuer: parsed.issuer,
            account_name: parsed.account_name,
            secret: parsed.secret,
            algorithm: parsed.algorithm,
            digits: parsed.digits,
            period: parsed.period,
            notes: None,
        }
    }
}

fn default_name(parsed: &ParsedAuthenticator) -> String {
    match (&parsed.issuer, &parsed.account_name) {
        (Some(issuer), Some(account)) => format!("{issuer} - {account}"),
        (Some(only), None) | (None, Some(only)) => only.clone(),
        (None, None) => "Authenticator".to_string(),
    }
}

fn owner_filter(owner: &Owner) -> Document {
    match owner {
        Owner::Profile(id) => doc! { "profile_id": id },
        Owner::Standalone => doc! { "profile_id": Bson::Null },
    }
}

pub async fn list_authenticators(state: &AppState) -> Result<Vec<AuthenticatorEntry>> {
    collect(state, doc! {}).await
}

pub async fn list_authenticators_for(
    state: &AppState,
    owner: &Owner,
) -> Result<Vec<AuthenticatorEntry>> {
    collect(state, owner_filter(owner)).await
}

async fn collect(state: &AppState, filter: Document) -> Result<Vec<AuthenticatorEntry>> {
    let mut cursor = state
        .authenticators
        .find(filter)
        .sort(doc! { "name": 1 })
        .await?;
    let mut entries = Vec::new();
    while let Some(entry) = cursor.try_next().await? {
        entries.push(entry);
    }
    Ok(entries)
}

pub async fn get_authenticator(
    state: &AppState,
    id: &ObjectId,
) -> Result<Option<AuthenticatorEntry>> {
    state
        .authenticators
        .find_one(doc! { "_id": id })
        .await
        .map_err(Into::into)
}

/// Validates and stores a new entry.
pub async fn create_authenticator(state: &AppState, new: NewAuthenticator) -> Result<ObjectId> {
    let entry = prepare_authenticator(state, new).await?;
    insert_authenticator(state, entry).await
}

/// Builds the document for `new` without writing it. The secret is
/// normalized here, once; digits/period/secret are checked by computing a
/// code, and a profile owner must exist.
pub async fn prepare_authenticator(
    state: &AppState,
    new: NewAuthenticator,
) -> Result<AuthenticatorEntry> {
    let name = new.name.trim().to_string();
    if name.is_empty() {
        return Err(EntryError::MissingName.into());
    }
    let secret = normalize_secret(&new.secret).map_err(EntryError::from)?;
    compute_code(&secret, new.algorithm, new.digits, new.period, 0).map_err(EntryError::from)?;

    if let Owner::Profile(profile_id) = &new.owner {
        if !profile_exists(state, profile_id).await? {
            return Err(EntryError::UnknownOwner.into());
        }
    }

    let now = DateTime::now();
    Ok(AuthenticatorEntry {
        id: None,
        profile_id: new.owner.profile_id(),
        name,
        platform: new.platform,
        issuer: new.issuer,
        account_name: new.account_name,
        secret,
        algorithm: new.algorithm,
        digits: new.digits,
        period: new.period,
        notes: new.notes.filter(|n| !n.trim().is_empty()),
        created_at: now,
        updated_at: now,
        last_used_at: None,
    })
}

/// Writes an entry from [`prepare_authenticator`].
///
/// The owner is looked up again after the write. `delete_profile` removes
/// the profile before its entries, so an insert that still sees the
/// profile here is caught by that cascade; one that does not is undone
/// and reported as [`EntryError::UnknownOwner`].
pub async fn insert_authenticator(state: &AppState, entry: AuthenticatorEntry) -> Result<ObjectId> {
    let platform = entry.platform;
    let owner = entry.profile_id;
    let res = state.authenticators.insert_one(entry).await?;
    let id = res
        .inserted_id
        .as_object_id()
        .context("authenticator insert missing _id")?;

    if let Some(profile_id) = owner {
        if !profile_exists(state, &profile_id).await? {
            state.authenticators.delete_one(doc! { "_id": id }).await?;
            warn!(authenticator = %id, profile = %profile_id, "owner deleted during insert; entry removed");
            return Err(EntryError::UnknownOwner.into());
        }
    }

    info!(authenticator = %id, platform = platform.as_str(), "authenticator created");
    Ok(id)
}

async fn profile_exists(state: &AppState, id: &ObjectId) -> Result<bool> {
    Ok(state.profiles.find_one(doc! { "_id": id }).await?.is_some())
}

/// Cosmetic edit: only `name` and `notes` may change after creation.
/// Returns false when the entry does not exist.
pub async fn update_authenticator_label(
    state: &AppState,
    id: &ObjectId,
    name: &str,
    notes: Option<String>,
) -> Result<bool> {
    let name = name.trim();
    if name.is_empty() {
        return Err(EntryError::MissingName.into());
    }
    let notes = notes.filter(|n| !n.trim().is_empty());
    let res = state
        .authenticators
        .update_one(
            doc! { "_id": id },
            doc! { "$set": {
                "name": name,
                "notes": notes,
                "updated_at": DateTime::now(),
            } },
        )
        .await?;
    Ok(res.matched_count > 0)
}

pub async fn touch_last_used(state: &AppState, id: &ObjectId) -> Result<()> {
    state
        .authenticators
        .update_one(
            doc! { "_id": id },
            doc! { "$set": { "last_used_at": DateTime::now() } },
        )
        .await?;
    Ok(())
}

pub async fn delete_authenticator(state: &AppState, id: &ObjectId) -> Result<bool> {
    let res = state.authenticators.delete_one(doc! { "_id": id }).await?;
    if res.deleted_count > 0 {
        info!(authenticator = %id, "authenticator deleted");
    }
    Ok(res.deleted_count > 0)
}
