use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::accounts::PublicAccount;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthLoginRequest {
    pub provider: String,
    pub access_token: String,
    #[serde(default)]
    pub user_data: Option<OAuthUserData>,
}

/// Profile fields a client collects when the account does not exist yet.
#[derive(Debug, Default, Deserialize)]
pub struct OAuthUserData {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "de_opt_age")]
    pub age: Option<i32>,
    #[serde(default)]
    pub gender: Option<String>,
}

/// `age` arrives as either a JSON number or a numeric string; blank means absent.
fn de_opt_age<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .and_then(|v| i32::try_from(v).ok())
            .map(Some)
            .ok_or_else(|| D::Error::custom("Age must be a number")),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse::<i32>()
            .map(Some)
            .map_err(|_| D::Error::custom("Age must be a number")),
        Some(_) => Err(D::Error::custom("Age must be a number")),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthLoginResponse {
    pub message: &'static str,
    pub user: PublicAccount,
    pub is_new_user: bool,
}
