// models.rs
// Domain models for seed data (users.json) and MongoDB collections.

use mongodb::bson::{DateTime, oid::ObjectId};
use serde::{Deserialize, Serialize};

use crate::otpauth::ParsedAuthenticator;
use crate::totp::Algorithm;

/// Platform tag shown next to an authenticator. Display hint only.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Google,
    Meta,
    Tiktok,
    Microsoft,
    #[default]
    Other,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Google => "google",
            Platform::Meta => "meta",
            Platform::Tiktok => "tiktok",
            Platform::Microsoft => "microsoft",
            Platform::Other => "other",
        }
    }
}

/// Who an authenticator belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Owner {
    Profile(ObjectId),
    Standalone,
}

impl Owner {
    pub fn from_profile_id(profile_id: Option<ObjectId>) -> Self {
        match profile_id {
            Some(id) => Owner::Profile(id),
            None => Owner::Standalone,
        }
    }

    pub fn profile_id(&self) -> Option<ObjectId> {
        match self {
            Owner::Profile(id) => Some(*id),
            Owner::Standalone => None,
        }
    }
}

/// Operator definition as stored in users.json.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedUser {
    pub email: String,
    pub secret: String,
}

/// Console operator; logs in with a TOTP code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub email: String,
    pub secret: String,
}

/// Session document linking a token to an operator and expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub token: String,
    pub user_email: String,
    pub expires_at: DateTime,
}

/// Identity profile. Only what authenticator ownership needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub name: String,
    pub created_at: DateTime,
}

/// Stored shared secret plus display metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticatorEntry {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    #[serde(default)]
    pub profile_id: Option<ObjectId>,
    pub name: String,
    #[serde(default)]
    pub platform: Platform,
    #[serde(default)]
    pub issuer: Option<String>,
    #[serde(default)]
    pub account_name: Option<String>,
    pub secret: String,
    #[serde(default)]
    pub algorithm: Algorithm,
    pub digits: u32,
    pub period: u64,
    #[serde(default)]
    pub notes: Option<String>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
    #[serde(default)]
    pub last_used_at: Option<DateTime>,
}

impl AuthenticatorEntry {
    pub fn owner(&self) -> Owner {
        Owner::from_profile_id(self.profile_id)
    }

    /// Provisioning fields, as needed to export the entry as an otpauth URI.
    pub fn provisioning(&self) -> ParsedAuthenticator {
        ParsedAuthenticator {
            secret: self.secret.clone(),
            issuer: self.issuer.clone(),
            account_name: self.account_name.clone(),
            algorithm: self.algorithm,
            digits: self.digits,
            period: self.period,
        }
    }
}
