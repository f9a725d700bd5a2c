use tracing::{info, warn};
use uuid::Uuid;

use super::password::{hash_password, verify_password};
use crate::{
    accounts::{Account, AccountStore, AuthProvider, NewAccount, StoreError},
    error::ApiError,
    forms::ProfileInput,
};

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("email {email} is already registered")]
    DuplicateEmail {
        email: String,
        existing_provider: Option<AuthProvider>,
    },
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("account has no password")]
    NoPasswordSet,
    #[error("current password is incorrect")]
    IncorrectCurrentPassword,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::DuplicateEmail {
                email,
                existing_provider: Some(provider),
            } => ApiError::conflict(format!(
                "Email {email} is already associated with a {provider} account. Please use {provider} to sign in."
            ))
            .with_body(|b| b.existing_provider = Some(provider)),
            AuthError::DuplicateEmail { .. } => ApiError::bad_request("User already exists"),
            AuthError::InvalidCredentials => ApiError::unauthorized("Invalid credentials"),
            AuthError::NoPasswordSet => {
                ApiError::bad_request("Password reset is not available for OAuth accounts")
            }
            AuthError::IncorrectCurrentPassword => {
                ApiError::unauthorized("Current password is incorrect")
            }
            AuthError::Store(e) => e.into(),
            AuthError::Internal(e) => ApiError::internal(e),
        }
    }
}

/// Fails when any account, password or OAuth, already owns the email.
pub async fn ensure_email_available(
    accounts: &dyn AccountStore,
    email: &str,
) -> Result<(), AuthError> {
    if let Some(existing) = accounts.find_by_email(email).await? {
        warn!(email = %email, "email already registered");
        return Err(AuthError::DuplicateEmail {
            email: email.to_string(),
            existing_provider: existing.auth_provider,
        });
    }
    Ok(())
}

pub async fn register(
    accounts: &dyn AccountStore,
    email: String,
    password: &str,
    profile: ProfileInput,
    avatar_url: Option<String>,
) -> Result<Account, AuthError> {
    let hash = hash_password(password)?;
    let account = accounts
        .create(NewAccount {
            email,
            password_hash: Some(hash),
            display_name: profile.name,
            age: Some(profile.age),
            gender: Some(profile.gender),
            avatar_url,
            ..Default::default()
        })
        .await?;
    info!(account_id = %account.id, "account registered");
    Ok(account)
}

/// Same error whether the email is unknown, has no password, or the password is wrong.
pub async fn authenticate(
    accounts: &dyn AccountStore,
    email: &str,
    password: &str,
) -> Result<Account, AuthError> {
    let Some(account) = accounts.find_by_email(email).await? else {
        warn!(email = %email, "login unknown email");
        return Err(AuthError::InvalidCredentials);
    };
    let Some(hash) = account.password_hash.as_deref() else {
        warn!(account_id = %account.id, "login on account without password");
        return Err(AuthError::InvalidCredentials);
    };
    if !verify_password(password, hash)? {
        warn!(account_id = %account.id, "login invalid password");
        return Err(AuthError::InvalidCredentials);
    }
    info!(account_id = %account.id, "account logged in");
    Ok(account)
}

pub async fn change_password(
    accounts: &dyn AccountStore,
    account_id: Uuid,
    current: &str,
    new: &str,
) -> Result<(), AuthError> {
    let account = accounts
        .find_by_id(account_id)
        .await?
        .ok_or(StoreError::NotFound)?;
    let hash = account
        .password_hash
        .as_deref()
        .ok_or(AuthError::NoPasswordSet)?;
    if !verify_password(current, hash)? {
        return Err(AuthError::IncorrectCurrentPassword);
    }
    accounts.set_password(account_id, &hash_password(new)?).await?;
    info!(%account_id, "password changed");
    Ok(())
}
