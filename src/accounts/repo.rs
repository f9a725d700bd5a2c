use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::{Account, AccountChanges, AuthProvider, NewAccount};

const EMAIL_CONSTRAINT: &str = "accounts_email_key";
const IDENTITY_CONSTRAINT: &str = "accounts_identity_key";

const ACCOUNT_COLUMNS: &str = "id, email, password_hash, auth_provider, external_id, \
     display_name, age, gender, avatar_url, created_at, updated_at";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("an account with this email already exists")]
    DuplicateEmail,
    #[error("this external identity is already linked to an account")]
    DuplicateIdentity,
    #[error("account not found")]
    NotFound,
    #[error("account store unavailable: {0}")]
    Unavailable(#[from] sqlx::Error),
}

impl StoreError {
    /// Maps unique-constraint violations onto the duplicate variants.
    fn from_write(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &e {
            if db.is_unique_violation() {
                match db.constraint() {
                    Some(EMAIL_CONSTRAINT) => return StoreError::DuplicateEmail,
                    Some(IDENTITY_CONSTRAINT) => return StoreError::DuplicateIdentity,
                    _ => {}
                }
            }
        }
        StoreError::Unavailable(e)
    }
}

/// Persistence of account records.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, StoreError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError>;
    async fn find_by_identity(
        &self,
        provider: AuthProvider,
        external_id: &str,
    ) -> Result<Option<Account>, StoreError>;
    async fn create(&self, new: NewAccount) -> Result<Account, StoreError>;
    async fn update(&self, id: Uuid, changes: AccountChanges) -> Result<Account, StoreError>;
    async fn set_password(&self, id: Uuid, password_hash: &str) -> Result<(), StoreError>;
    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Account>, StoreError>;
    async fn count(&self) -> Result<i64, StoreError>;
    async fn delete(&self, id: Uuid) -> Result<bool, StoreError>;
}

#[derive(Clone)]
pub struct PgAccountStore {
    db: PgPool,
}

impl PgAccountStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AccountStore for PgAccountStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, StoreError> {
        let account = sqlx::query_as::<_, Account>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(account)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        let account = sqlx::query_as::<_, Account>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(account)
    }

    async fn find_by_identity(
        &self,
        provider: AuthProvider,
        external_id: &str,
    ) -> Result<Option<Account>, StoreError> {
        let account = sqlx::query_as::<_, Account>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts \
             WHERE auth_provider = $1 AND external_id = $2"
        ))
        .bind(provider)
        .bind(external_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(account)
    }

    async fn create(&self, new: NewAccount) -> Result<Account, StoreError> {
        sqlx::query_as::<_, Account>(&format!(
            r#"
            INSERT INTO accounts
                (email, password_hash, auth_provider, external_id, display_name, age, gender, avatar_url)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {ACCOUNT_COLUMNS}
            "#
        ))
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(new.auth_provider)
        .bind(&new.external_id)
        .bind(&new.display_name)
        .bind(new.age)
        .bind(new.gender)
        .bind(&new.avatar_url)
        .fetch_one(&self.db)
        .await
        .map_err(StoreError::from_write)
    }

    async fn update(&self, id: Uuid, changes: AccountChanges) -> Result<Account, StoreError> {
        sqlx::query_as::<_, Account>(&format!(
            r#"
            UPDATE accounts SET
                display_name  = COALESCE($2, display_name),
                age           = COALESCE($3, age),
                gender        = COALESCE($4, gender),
                avatar_url    = COALESCE($5, avatar_url),
                auth_provider = COALESCE($6, auth_provider),
                external_id   = COALESCE($7, external_id),
                updated_at    = now()
            WHERE id = $1
            RETURNING {ACCOUNT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&changes.display_name)
        .bind(changes.age)
        .bind(changes.gender)
        .bind(&changes.avatar_url)
        .bind(changes.auth_provider)
        .bind(&changes.external_id)
        .fetch_optional(&self.db)
        .await
        .map_err(StoreError::from_write)?
        .ok_or(StoreError::NotFound)
    }

    async fn set_password(&self, id: Uuid, password_hash: &str) -> Result<(), StoreError> {
        let res = sqlx::query(
            r#"UPDATE accounts SET password_hash = $2, updated_at = now() WHERE id = $1"#,
        )
        .bind(id)
        .bind(password_hash)
        .execute(&self.db)
        .await?;
        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Account>, StoreError> {
        let rows = sqlx::query_as::<_, Account>(&format!(
            r#"
            SELECT {ACCOUNT_COLUMNS}
            FROM accounts
            ORDER BY created_at DESC
            LIMIT $1 OFFSET $2
            "#
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn count(&self) -> Result<i64, StoreError> {
        let (n,): (i64,) = sqlx::query_as(r#"SELECT COUNT(*) FROM accounts"#)
            .fetch_one(&self.db)
            .await?;
        Ok(n)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let res = sqlx::query(r#"DELETE FROM accounts WHERE id = $1"#)
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}
