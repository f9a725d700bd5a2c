use std::time::Duration;

use tracing::{error, info};
use uuid::Uuid;

use crate::{
    accounts::{Account, AccountChanges, AccountStore, StoreError},
    error::ApiError,
    forms::ProfileInput,
    images::{delete_avatar, upload_avatar, UploadItem},
    storage::StorageClient,
};

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, thiserror::Error)]
pub enum UserError {
    #[error("account not found")]
    NotFound,
    #[error("cannot act on another account")]
    Forbidden,
    #[error("avatar upload failed: {0}")]
    Upload(anyhow::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<UserError> for ApiError {
    fn from(e: UserError) -> Self {
        match e {
            UserError::NotFound => ApiError::not_found("User not found"),
            UserError::Forbidden => ApiError::forbidden("You can only delete your own account"),
            UserError::Upload(e) => {
                error!(error = %e, "avatar upload failed");
                ApiError::new(
                    axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to upload profile picture. Please try again.",
                )
            }
            UserError::Store(e) => e.into(),
        }
    }
}

/// One page of the account listing, newest first.
#[derive(Debug)]
pub struct Page {
    pub accounts: Vec<Account>,
    pub page: i64,
    pub limit: i64,
    pub total_count: i64,
}

impl Page {
    pub fn total_pages(&self) -> i64 {
        (self.total_count + self.limit - 1) / self.limit
    }
}

/// Applies defaults and clamps: page starts at 1, limit stays in `1..=100`.
pub fn page_bounds(page: Option<i64>, limit: Option<i64>) -> (i64, i64) {
    let page = page.filter(|p| *p >= 1).unwrap_or(1);
    let limit = limit
        .filter(|l| *l >= 1)
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .min(MAX_PAGE_SIZE);
    (page, limit)
}

pub async fn list_accounts(
    accounts: &dyn AccountStore,
    page: i64,
    limit: i64,
) -> Result<Page, UserError> {
    let offset = (page - 1).saturating_mul(limit);
    let rows = accounts.list(limit, offset).await?;
    let total_count = accounts.count().await?;
    Ok(Page {
        accounts: rows,
        page,
        limit,
        total_count,
    })
}

pub async fn get_account(accounts: &dyn AccountStore, id: Uuid) -> Result<Account, UserError> {
    accounts.find_by_id(id).await?.ok_or(UserError::NotFound)
}

/// Replaces name, age and gender; a new picture supersedes the stored one.
pub async fn update_profile(
    accounts: &dyn AccountStore,
    storage: &dyn StorageClient,
    timeout: Duration,
    account: &Account,
    profile: ProfileInput,
    picture: Option<UploadItem>,
) -> Result<Account, UserError> {
    let avatar_url = match picture {
        Some(item) => Some(
            upload_avatar(storage, item, timeout)
                .await
                .map_err(UserError::Upload)?,
        ),
        None => None,
    };

    let result = accounts
        .update(
            account.id,
            AccountChanges {
                display_name: Some(profile.name),
                age: Some(profile.age),
                gender: Some(profile.gender),
                avatar_url: avatar_url.clone(),
                ..Default::default()
            },
        )
        .await;
    let updated = match (result, avatar_url) {
        (Ok(updated), Some(_)) => {
            if let Some(old) = account.avatar_url.as_deref() {
                delete_avatar(storage, old, timeout).await;
            }
            updated
        }
        (Ok(updated), None) => updated,
        (Err(e), new_url) => {
            if let Some(url) = new_url {
                delete_avatar(storage, &url, timeout).await;
            }
            return Err(e.into());
        }
    };
    info!(account_id = %updated.id, "profile updated");
    Ok(updated)
}

/// Deletes the caller's own account along with its hosted avatar.
pub async fn delete_account(
    accounts: &dyn AccountStore,
    storage: &dyn StorageClient,
    timeout: Duration,
    caller: &Account,
    target: Uuid,
) -> Result<Account, UserError> {
    if caller.id != target {
        return Err(UserError::Forbidden);
    }
    if let Some(url) = caller.avatar_url.as_deref() {
        delete_avatar(storage, url, timeout).await;
    }
    if !accounts.delete(target).await? {
        return Err(UserError::NotFound);
    }
    info!(account_id = %target, "account deleted");
    Ok(caller.clone())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use bytes::Bytes;

    use super::*;
    use crate::{
        accounts::{memory::MemoryAccountStore, Gender, NewAccount},
        storage::FakeStorage,
    };

    const T: Duration = Duration::from_secs(1);

    fn seeded(store: &MemoryAccountStore, email: &str, avatar: Option<String>) -> Account {
        store.seed(NewAccount {
            email: email.into(),
            password_hash: Some("hash".into()),
            display_name: "Ann".into(),
            age: Some(30),
            gender: Some(Gender::Female),
            avatar_url: avatar,
            ..Default::default()
        })
    }

    fn profile() -> ProfileInput {
        ProfileInput {
            name: "Annie".into(),
            age: 31,
            gender: Gender::Other,
        }
    }

    #[test]
    fn page_bounds_defaults_and_clamps() {
        assert_eq!(page_bounds(None, None), (1, 10));
        assert_eq!(page_bounds(Some(0), Some(0)), (1, 10));
        assert_eq!(page_bounds(Some(3), Some(500)), (3, 100));
        assert_eq!(page_bounds(Some(-2), Some(5)), (1, 5));
    }

    #[test]
    fn total_pages_rounds_up() {
        let page = |total_count, limit| Page {
            accounts: vec![],
            page: 1,
            limit,
            total_count,
        };
        assert_eq!(page(0, 10).total_pages(), 0);
        assert_eq!(page(10, 10).total_pages(), 1);
        assert_eq!(page(11, 10).total_pages(), 2);
    }

    #[tokio::test]
    async fn update_replaces_hosted_avatar() {
        let store = MemoryAccountStore::new();
        let storage = FakeStorage::default();
        let old = format!("{}/avatars/old.png", FakeStorage::BASE);
        let account = seeded(&store, "a@x.com", Some(old));

        let updated = update_profile(
            &store,
            &storage,
            T,
            &account,
            profile(),
            Some(UploadItem {
                body: Bytes::from_static(b"png"),
                content_type: "image/png".into(),
            }),
        )
        .await
        .unwrap();

        assert_eq!(updated.display_name, "Annie");
        assert_eq!(updated.gender, Some(Gender::Other));
        assert_eq!(*storage.deletes.lock().unwrap(), vec!["avatars/old.png".to_string()]);
        let new_key = storage.puts.lock().unwrap()[0].clone();
        assert_eq!(updated.avatar_url, Some(storage.public_url(&new_key)));
    }

    #[tokio::test]
    async fn failed_upload_keeps_old_avatar() {
        let store = MemoryAccountStore::new();
        let storage = FakeStorage::default();
        storage.fail_puts.store(true, Ordering::SeqCst);
        let old = format!("{}/avatars/old.png", FakeStorage::BASE);
        let account = seeded(&store, "a@x.com", Some(old.clone()));

        let result = update_profile(
            &store,
            &storage,
            T,
            &account,
            profile(),
            Some(UploadItem {
                body: Bytes::from_static(b"png"),
                content_type: "image/png".into(),
            }),
        )
        .await;

        assert!(matches!(result, Err(UserError::Upload(_))));
        assert!(storage.deletes.lock().unwrap().is_empty());
        let stored = store.find_by_id(account.id).await.unwrap().unwrap();
        assert_eq!(stored.avatar_url, Some(old));
        assert_eq!(stored.display_name, account.display_name);
    }

    #[tokio::test]
    async fn failed_write_removes_new_upload_only() {
        let store = MemoryAccountStore::new();
        let storage = FakeStorage::default();
        let old = format!("{}/avatars/old.png", FakeStorage::BASE);
        let account = seeded(&store, "a@x.com", Some(old.clone()));
        store.fail_writes();

        let result = update_profile(
            &store,
            &storage,
            T,
            &account,
            profile(),
            Some(UploadItem {
                body: Bytes::from_static(b"png"),
                content_type: "image/png".into(),
            }),
        )
        .await;

        assert!(matches!(result, Err(UserError::Store(_))));
        let new_key = storage.puts.lock().unwrap()[0].clone();
        assert_eq!(*storage.deletes.lock().unwrap(), vec![new_key]);
        let stored = store.find_by_id(account.id).await.unwrap().unwrap();
        assert_eq!(stored.avatar_url, Some(old));
    }

    #[tokio::test]
    async fn update_without_picture_keeps_avatar() {
        let store = MemoryAccountStore::new();
        let storage = FakeStorage::default();
        let account = seeded(&store, "a@x.com", Some("https://cdn.example/p.png".into()));

        let updated = update_profile(&store, &storage, T, &account, profile(), None)
            .await
            .unwrap();
        assert_eq!(updated.avatar_url.as_deref(), Some("https://cdn.example/p.png"));
        assert!(storage.deletes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_is_limited_to_own_account() {
        let store = MemoryAccountStore::new();
        let storage = FakeStorage::default();
        let me = seeded(&store, "me@x.com", None);
        let other = seeded(&store, "other@x.com", None);

        let err = delete_account(&store, &storage, T, &me, other.id)
            .await
            .unwrap_err();
        assert!(matches!(err, UserError::Forbidden));
        assert_eq!(store.len(), 2);

        delete_account(&store, &storage, T, &me, me.id).await.unwrap();
        assert_eq!(store.len(), 1);
        assert!(matches!(
            get_account(&store, me.id).await,
            Err(UserError::NotFound)
        ));
    }

    #[tokio::test]
    async fn listing_is_paged() {
        let store = MemoryAccountStore::new();
        for i in 0..12 {
            seeded(&store, &format!("u{i}@x.com"), None);
        }
        let page = list_accounts(&store, 2, 5).await.unwrap();
        assert_eq!(page.accounts.len(), 5);
        assert_eq!(page.total_count, 12);
        assert_eq!(page.total_pages(), 3);

        let last = list_accounts(&store, 3, 5).await.unwrap();
        assert_eq!(last.accounts.len(), 2);
    }
}
