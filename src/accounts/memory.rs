use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Mutex,
};

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo::{AccountStore, StoreError};
use super::repo_types::{Account, AccountChanges, AuthProvider, NewAccount};

/// In-memory store with the same uniqueness rules as the `accounts` table.
/// Counts reads and successful writes so tests can assert on side effects.
#[derive(Default)]
pub struct MemoryAccountStore {
    rows: Mutex<Vec<Account>>,
    reads: AtomicUsize,
    writes: AtomicUsize,
    fail_writes: AtomicBool,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Every later write fails as if the database were down.
    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    fn read(&self) {
        self.reads.fetch_add(1, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    /// Inserts a row directly, bypassing the write counter.
    pub fn seed(&self, new: NewAccount) -> Account {
        let account = Self::materialize(new);
        self.rows.lock().unwrap().push(account.clone());
        account
    }

    fn materialize(new: NewAccount) -> Account {
        let now = OffsetDateTime::now_utc();
        Account {
            id: Uuid::new_v4(),
            email: new.email,
            password_hash: new.password_hash,
            auth_provider: new.auth_provider,
            external_id: new.external_id,
            display_name: new.display_name,
            age: new.age,
            gender: new.gender,
            avatar_url: new.avatar_url,
            created_at: now,
            updated_at: now,
        }
    }

    fn check_unique(
        rows: &[Account],
        skip: Option<Uuid>,
        email: &str,
        provider: Option<AuthProvider>,
        external_id: Option<&str>,
    ) -> Result<(), StoreError> {
        let others = rows.iter().filter(|a| Some(a.id) != skip);
        for a in others {
            if a.email == email {
                return Err(StoreError::DuplicateEmail);
            }
            if provider.is_some()
                && a.auth_provider == provider
                && a.external_id.as_deref() == external_id
            {
                return Err(StoreError::DuplicateIdentity);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, StoreError> {
        self.read();
        Ok(self.rows.lock().unwrap().iter().find(|a| a.id == id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        self.read();
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|a| a.email == email)
            .cloned())
    }

    async fn find_by_identity(
        &self,
        provider: AuthProvider,
        external_id: &str,
    ) -> Result<Option<Account>, StoreError> {
        self.read();
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|a| {
                a.auth_provider == Some(provider) && a.external_id.as_deref() == Some(external_id)
            })
            .cloned())
    }

    async fn create(&self, new: NewAccount) -> Result<Account, StoreError> {
        self.check_writable()?;
        let mut rows = self.rows.lock().unwrap();
        Self::check_unique(
            &rows,
            None,
            &new.email,
            new.auth_provider,
            new.external_id.as_deref(),
        )?;
        let account = Self::materialize(new);
        rows.push(account.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(account)
    }

    async fn update(&self, id: Uuid, changes: AccountChanges) -> Result<Account, StoreError> {
        self.check_writable()?;
        let mut rows = self.rows.lock().unwrap();
        let idx = rows
            .iter()
            .position(|a| a.id == id)
            .ok_or(StoreError::NotFound)?;

        let mut next = rows[idx].clone();
        if let Some(v) = changes.display_name {
            next.display_name = v;
        }
        if let Some(v) = changes.age {
            next.age = Some(v);
        }
        if let Some(v) = changes.gender {
            next.gender = Some(v);
        }
        if let Some(v) = changes.avatar_url {
            next.avatar_url = Some(v);
        }
        if let Some(v) = changes.auth_provider {
            next.auth_provider = Some(v);
        }
        if let Some(v) = changes.external_id {
            next.external_id = Some(v);
        }
        Self::check_unique(
            &rows,
            Some(id),
            &next.email,
            next.auth_provider,
            next.external_id.as_deref(),
        )?;
        next.updated_at = OffsetDateTime::now_utc();
        rows[idx] = next.clone();
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(next)
    }

    async fn set_password(&self, id: Uuid, password_hash: &str) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(StoreError::NotFound)?;
        row.password_hash = Some(password_hash.to_string());
        row.updated_at = OffsetDateTime::now_utc();
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Account>, StoreError> {
        self.read();
        let mut rows = self.rows.lock().unwrap().clone();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn count(&self) -> Result<i64, StoreError> {
        self.read();
        Ok(self.rows.lock().unwrap().len() as i64)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        self.check_writable()?;
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|a| a.id != id);
        let removed = rows.len() != before;
        if removed {
            self.writes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oauth_row(email: &str, external_id: &str) -> NewAccount {
        NewAccount {
            email: email.into(),
            auth_provider: Some(AuthProvider::Google),
            external_id: Some(external_id.into()),
            display_name: "x".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn create_rejects_duplicate_email_and_identity() {
        let store = MemoryAccountStore::new();
        store.create(oauth_row("a@x.com", "g1")).await.unwrap();

        let err = store.create(oauth_row("a@x.com", "g2")).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEmail));

        let err = store.create(oauth_row("b@x.com", "g1")).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateIdentity));
        assert_eq!(store.len(), 1);
        assert_eq!(store.writes(), 1);
    }

    #[tokio::test]
    async fn update_applies_only_present_fields() {
        let store = MemoryAccountStore::new();
        let a = store.seed(oauth_row("a@x.com", "g1"));
        let updated = store
            .update(
                a.id,
                AccountChanges {
                    age: Some(41),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.age, Some(41));
        assert_eq!(updated.display_name, "x");
        assert_eq!(store.writes(), 1);
    }

    #[tokio::test]
    async fn failing_writes_leave_rows_untouched() {
        let store = MemoryAccountStore::new();
        let a = store.seed(oauth_row("a@x.com", "g1"));
        store.fail_writes();

        let err = store.create(oauth_row("b@x.com", "g2")).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
        assert!(store.delete(a.id).await.is_err());
        assert_eq!(store.len(), 1);
        assert_eq!(store.writes(), 0);

        assert!(store.find_by_id(a.id).await.unwrap().is_some());
        assert_eq!(store.reads(), 1);
    }
}
