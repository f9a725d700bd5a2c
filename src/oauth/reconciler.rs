//! Maps a verified external identity onto zero or one local account.
//!
//! Outcomes: log in to an existing account (merging any supplied profile
//! fields and linking the provider if needed), create a new account, or
//! refuse because the email belongs to a password account or to a different
//! provider. A successful outcome always ends with a fresh session token.

use std::sync::Arc;

use axum::extract::FromRef;
use tracing::{debug, info, warn};

use super::{
    identity::{ExternalIdentity, SupplementalProfile},
    verifier::{CredentialVerifier, VerifyError},
};
use crate::{
    accounts::{Account, AccountChanges, AccountStore, AuthProvider, NewAccount, StoreError},
    auth::jwt::JwtKeys,
    state::AppState,
};

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("no account matches this identity")]
    AccountNotFound,
    #[error("email {email} is registered with a password")]
    ConflictRequiresPassword { email: String },
    #[error("email {email} is linked to {existing}")]
    ConflictDifferentProvider {
        email: String,
        existing: AuthProvider,
    },
    #[error("credential verification failed: {0}")]
    VerificationFailed(#[from] VerifyError),
    #[error("a matching account was written concurrently")]
    ConcurrentWrite,
    #[error("account store unavailable: {0}")]
    StoreUnavailable(StoreError),
    #[error("session issue failed: {0}")]
    Session(anyhow::Error),
}

impl From<StoreError> for ReconcileError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::DuplicateEmail | StoreError::DuplicateIdentity => {
                ReconcileError::ConcurrentWrite
            }
            other => ReconcileError::StoreUnavailable(other),
        }
    }
}

#[derive(Debug)]
pub struct OAuthLogin {
    pub account: Account,
    /// True when the account was just created or still needs onboarding.
    pub is_new_account: bool,
    pub token: String,
}

#[derive(Clone)]
pub struct IdentityReconciler {
    accounts: Arc<dyn AccountStore>,
    verifier: Arc<dyn CredentialVerifier>,
    keys: JwtKeys,
}

impl FromRef<AppState> for IdentityReconciler {
    fn from_ref(state: &AppState) -> Self {
        IdentityReconciler::new(
            state.accounts.clone(),
            state.verifier.clone(),
            JwtKeys::from_ref(state),
        )
    }
}

impl IdentityReconciler {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        verifier: Arc<dyn CredentialVerifier>,
        keys: JwtKeys,
    ) -> Self {
        Self {
            accounts,
            verifier,
            keys,
        }
    }

    pub async fn login(
        &self,
        provider: AuthProvider,
        access_token: &str,
        supplemental: Option<SupplementalProfile>,
    ) -> Result<OAuthLogin, ReconcileError> {
        let identity = self.verifier.verify(provider, access_token).await?;
        debug!(%provider, external_id = %identity.external_id, "identity verified");

        let (account, created) = match self.lookup(provider, &identity).await? {
            None => {
                let Some(profile) = supplemental else {
                    debug!(email = %identity.email, "no account and no profile; new account flow required");
                    return Err(ReconcileError::AccountNotFound);
                };
                let account = self.create(provider, &identity, &profile).await?;
                (account, true)
            }
            Some(account) => {
                check_conflicts(&account, provider, &identity.email)?;
                let changes = merge_changes(&account, provider, &identity, supplemental.as_ref());
                let account = if changes.is_empty() {
                    debug!(account_id = %account.id, "no profile changes");
                    account
                } else {
                    self.accounts.update(account.id, changes).await?
                };
                (account, false)
            }
        };

        let is_new_account = created || account.profile_incomplete();
        let token = self
            .keys
            .sign(account.id, &account.email)
            .map_err(ReconcileError::Session)?;

        info!(account_id = %account.id, %provider, created, is_new_account, "oauth login");
        Ok(OAuthLogin {
            account,
            is_new_account,
            token,
        })
    }

    /// Linked identity first, then the email claim.
    async fn lookup(
        &self,
        provider: AuthProvider,
        identity: &ExternalIdentity,
    ) -> Result<Option<Account>, ReconcileError> {
        if let Some(account) = self
            .accounts
            .find_by_identity(provider, &identity.external_id)
            .await
            .map_err(ReconcileError::StoreUnavailable)?
        {
            return Ok(Some(account));
        }
        self.accounts
            .find_by_email(&identity.email)
            .await
            .map_err(ReconcileError::StoreUnavailable)
    }

    async fn create(
        &self,
        provider: AuthProvider,
        identity: &ExternalIdentity,
        profile: &SupplementalProfile,
    ) -> Result<Account, ReconcileError> {
        let new = NewAccount {
            email: identity.email.clone(),
            password_hash: None,
            auth_provider: Some(provider),
            external_id: Some(identity.external_id.clone()),
            display_name: profile
                .name()
                .unwrap_or(identity.display_name.as_str())
                .to_string(),
            age: profile.age.or(identity.age),
            gender: profile.gender.or(identity.gender),
            avatar_url: identity.avatar_url.clone(),
        };
        self.accounts.create(new).await.map_err(|e| {
            if matches!(e, StoreError::DuplicateEmail | StoreError::DuplicateIdentity) {
                warn!(email = %identity.email, "account created concurrently");
            }
            ReconcileError::from(e)
        })
    }
}

/// A password account may only be entered through OAuth once it is linked to
/// the same provider; a linked account only through its own provider.
fn check_conflicts(
    account: &Account,
    provider: AuthProvider,
    email: &str,
) -> Result<(), ReconcileError> {
    if account.password_hash.is_some() && account.auth_provider != Some(provider) {
        return Err(ReconcileError::ConflictRequiresPassword {
            email: email.to_string(),
        });
    }
    match account.auth_provider {
        Some(existing) if existing != provider => Err(ReconcileError::ConflictDifferentProvider {
            email: email.to_string(),
            existing,
        }),
        _ => Ok(()),
    }
}

/// Only fields whose value differs from the stored one end up in the result.
fn merge_changes(
    account: &Account,
    provider: AuthProvider,
    identity: &ExternalIdentity,
    supplemental: Option<&SupplementalProfile>,
) -> AccountChanges {
    let mut changes = AccountChanges::default();

    if let Some(profile) = supplemental {
        if let Some(name) = profile.name().filter(|n| *n != account.display_name) {
            changes.display_name = Some(name.to_string());
        }
        changes.age = profile.age.filter(|a| account.age != Some(*a));
        changes.gender = profile.gender.filter(|g| account.gender != Some(*g));
        changes.avatar_url = identity
            .avatar_url
            .as_deref()
            .filter(|url| !url.is_empty() && account.avatar_url.as_deref() != Some(*url))
            .map(str::to_string);
    }

    if account.auth_provider.is_none() || account.external_id.is_none() {
        changes.auth_provider = Some(provider);
        changes.external_id = Some(identity.external_id.clone());
    }

    changes
}
