use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::{Account, AuthProvider, Gender};

/// Account as returned to clients. Never carries the password hash.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicAccount {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub age: Option<i32>,
    pub gender: Option<Gender>,
    pub profile_picture: Option<String>,
    pub oauth_provider: Option<AuthProvider>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oauth_id: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl PublicAccount {
    /// Listing view: the provider subject id stays private.
    pub fn summary(account: Account) -> Self {
        Self {
            oauth_id: None,
            ..Self::from(account)
        }
    }
}

impl From<Account> for PublicAccount {
    fn from(a: Account) -> Self {
        Self {
            id: a.id,
            email: a.email,
            name: a.display_name,
            age: a.age,
            gender: a.gender,
            profile_picture: a.avatar_url,
            oauth_provider: a.auth_provider,
            oauth_id: a.external_id,
            created_at: a.created_at,
            updated_at: a.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account() -> Account {
        let now = OffsetDateTime::now_utc();
        Account {
            id: Uuid::new_v4(),
            email: "a@x.com".into(),
            password_hash: Some("$argon2id$secret".into()),
            auth_provider: Some(AuthProvider::Google),
            external_id: Some("g1".into()),
            display_name: "Ann".into(),
            age: Some(30),
            gender: Some(Gender::Female),
            avatar_url: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn public_account_hides_password_hash() {
        let json = serde_json::to_string(&PublicAccount::from(account())).unwrap();
        assert!(!json.contains("argon2"));
        assert!(!json.to_lowercase().contains("password"));
        assert!(json.contains("\"name\":\"Ann\""));
        assert!(json.contains("\"oauthProvider\":\"GOOGLE\""));
        assert!(json.contains("\"oauthId\":\"g1\""));
    }

    #[test]
    fn summary_hides_external_id() {
        let json = serde_json::to_value(PublicAccount::summary(account())).unwrap();
        assert!(json.get("oauthId").is_none());
        assert_eq!(json["gender"], "FEMALE");
    }
}
