use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// External identity provider an account can be linked to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "auth_provider", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthProvider {
    Google,
    Facebook,
}

impl fmt::Display for AuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AuthProvider::Google => "GOOGLE",
            AuthProvider::Facebook => "FACEBOOK",
        })
    }
}

impl FromStr for AuthProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GOOGLE" => Ok(AuthProvider::Google),
            "FACEBOOK" => Ok(AuthProvider::Facebook),
            other => Err(format!("unknown provider {other:?}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "gender", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Gender {
    Male,
    Female,
    Other,
    PreferNotToSay,
}

impl FromStr for Gender {
    type Err = String;

    /// Accepts the wire names (`MALE`, ...) as well as the lowercase values
    /// identity providers report (`male`, `female`, ...).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MALE" => Ok(Gender::Male),
            "FEMALE" => Ok(Gender::Female),
            "OTHER" => Ok(Gender::Other),
            "PREFER_NOT_TO_SAY" => Ok(Gender::PreferNotToSay),
            other => Err(format!("unknown gender {other:?}")),
        }
    }
}

/// Account record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>, // argon2 PHC string, absent for OAuth-only accounts
    pub auth_provider: Option<AuthProvider>,
    pub external_id: Option<String>,
    pub display_name: String,
    pub age: Option<i32>,
    pub gender: Option<Gender>,
    pub avatar_url: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl Account {
    /// Linked OAuth accounts must carry age and gender before onboarding is done.
    pub fn profile_incomplete(&self) -> bool {
        self.auth_provider.is_some() && (self.age.is_none() || self.gender.is_none())
    }
}

/// Fields for inserting a new account. `id` and timestamps are assigned by the store.
#[derive(Debug, Clone, Default)]
pub struct NewAccount {
    pub email: String,
    pub password_hash: Option<String>,
    pub auth_provider: Option<AuthProvider>,
    pub external_id: Option<String>,
    pub display_name: String,
    pub age: Option<i32>,
    pub gender: Option<Gender>,
    pub avatar_url: Option<String>,
}

/// Partial update; `None` leaves the column untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountChanges {
    pub display_name: Option<String>,
    pub age: Option<i32>,
    pub gender: Option<Gender>,
    pub avatar_url: Option<String>,
    pub auth_provider: Option<AuthProvider>,
    pub external_id: Option<String>,
}

impl AccountChanges {
    pub fn is_empty(&self) -> bool {
        *self == AccountChanges::default()
    }
}
