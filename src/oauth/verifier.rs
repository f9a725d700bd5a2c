use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use serde_json::Value;
use time::{Date, Month, OffsetDateTime};
use tracing::{debug, warn};

use super::identity::ExternalIdentity;
use crate::{
    accounts::{AuthProvider, Gender},
    config::OAuthConfig,
};

#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error("Unsupported auth provider: {0}")]
    UnsupportedProvider(AuthProvider),
    #[error("invalid identity token: {0}")]
    InvalidToken(String),
    #[error("identity token is missing {0}")]
    MissingClaims(&'static str),
    #[error("identity provider request failed: {0}")]
    Upstream(#[from] reqwest::Error),
}

/// Validates an externally supplied credential and yields the identity behind it.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    async fn verify(
        &self,
        provider: AuthProvider,
        access_token: &str,
    ) -> Result<ExternalIdentity, VerifyError>;
}

pub struct GoogleVerifier {
    http: reqwest::Client,
    userinfo_url: String,
    people_url: String,
    assertion_key: Option<DecodingKey>,
}

#[derive(Debug, Deserialize)]
struct GoogleUserInfo {
    id: String,
    email: Option<String>,
    name: Option<String>,
    picture: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PeopleResponse {
    #[serde(default)]
    birthdays: Vec<PeopleBirthday>,
    #[serde(default)]
    genders: Vec<PeopleGender>,
}

#[derive(Debug, Deserialize)]
struct PeopleBirthday {
    date: Option<PeopleDate>,
}

#[derive(Debug, Deserialize)]
struct PeopleDate {
    year: Option<i32>,
    month: Option<u8>,
    day: Option<u8>,
}

#[derive(Debug, Deserialize)]
struct PeopleGender {
    value: Option<String>,
}

impl GoogleVerifier {
    pub fn new(cfg: &OAuthConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.http_timeout_secs))
            .build()?;
        Ok(Self {
            http,
            userinfo_url: cfg.google_userinfo_url.clone(),
            people_url: cfg.google_people_url.clone(),
            assertion_key: cfg
                .assertion_secret
                .as_ref()
                .map(|s| DecodingKey::from_secret(s.as_bytes())),
        })
    }

    /// Signed JWT issued by the auth broker in front of Google.
    fn verify_assertion(&self, token: &str) -> Result<ExternalIdentity, VerifyError> {
        let key = self.assertion_key.as_ref().ok_or_else(|| {
            VerifyError::InvalidToken("signed assertions are not accepted".into())
        })?;
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_aud = false;
        let data = decode::<Value>(token, key, &validation)
            .map_err(|e| VerifyError::InvalidToken(e.to_string()))?;
        identity_from_assertion(&data.claims)
    }

    async fn fetch_userinfo(&self, access_token: &str) -> Result<ExternalIdentity, VerifyError> {
        let res = self
            .http
            .get(&self.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await?;
        if !res.status().is_success() {
            return Err(VerifyError::InvalidToken(format!(
                "userinfo returned {}",
                res.status()
            )));
        }
        let info: GoogleUserInfo = res.json().await?;
        let email = info
            .email
            .filter(|e| !e.is_empty())
            .ok_or(VerifyError::MissingClaims("email"))?;

        let people = self.fetch_people(access_token).await;
        let today = OffsetDateTime::now_utc().date();

        Ok(ExternalIdentity {
            external_id: info.id,
            display_name: info.name.filter(|n| !n.is_empty()).unwrap_or_else(|| email.clone()),
            email,
            avatar_url: info.picture,
            age: people.birthdays.iter().find_map(|b| {
                let d = b.date.as_ref()?;
                age_on(d.year?, d.month?, d.day?, today)
            }),
            gender: people
                .genders
                .iter()
                .find_map(|g| g.value.as_deref()?.parse::<Gender>().ok()),
        })
    }

    /// Birthday and gender are optional extras; any failure yields an empty response.
    async fn fetch_people(&self, access_token: &str) -> PeopleResponse {
        let res = match self
            .http
            .get(&self.people_url)
            .bearer_auth(access_token)
            .send()
            .await
        {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                debug!(status = %r.status(), "people api unavailable");
                return PeopleResponse::default();
            }
            Err(e) => {
                debug!(error = %e, "people api request failed");
                return PeopleResponse::default();
            }
        };
        res.json().await.unwrap_or_else(|e| {
            debug!(error = %e, "people api returned unexpected body");
            PeopleResponse::default()
        })
    }
}

#[async_trait]
impl CredentialVerifier for GoogleVerifier {
    async fn verify(
        &self,
        provider: AuthProvider,
        access_token: &str,
    ) -> Result<ExternalIdentity, VerifyError> {
        if provider != AuthProvider::Google {
            return Err(VerifyError::UnsupportedProvider(provider));
        }
        let token = access_token.trim();
        if token.is_empty() {
            return Err(VerifyError::InvalidToken("empty token".into()));
        }
        let result = if is_signed_assertion(token) {
            self.verify_assertion(token)
        } else {
            self.fetch_userinfo(token).await
        };
        if let Err(e) = &result {
            warn!(error = %e, "google credential rejected");
        }
        result
    }
}

/// Compact JWS with a parseable header. Google access tokens (`ya29.…`) contain
/// dots too, so the segment count alone is not enough.
fn is_signed_assertion(token: &str) -> bool {
    token.split('.').count() == 3 && jsonwebtoken::decode_header(token).is_ok()
}

fn str_at<'a>(claims: &'a Value, path: &[&str]) -> Option<&'a str> {
    let mut v = claims;
    for key in path {
        v = v.get(key)?;
    }
    v.as_str().filter(|s| !s.is_empty())
}

fn identity_from_assertion(claims: &Value) -> Result<ExternalIdentity, VerifyError> {
    let external_id = str_at(claims, &["sub"])
        .or_else(|| str_at(claims, &["user_id"]))
        .or_else(|| str_at(claims, &["id"]))
        .ok_or(VerifyError::MissingClaims("subject"))?;
    let email = str_at(claims, &["email"])
        .or_else(|| str_at(claims, &["user", "email"]))
        .ok_or(VerifyError::MissingClaims("email"))?;
    let display_name = str_at(claims, &["name"])
        .or_else(|| str_at(claims, &["full_name"]))
        .or_else(|| str_at(claims, &["user_metadata", "full_name"]))
        .unwrap_or(email);
    let avatar_url = str_at(claims, &["picture"])
        .or_else(|| str_at(claims, &["avatar_url"]))
        .or_else(|| str_at(claims, &["user_metadata", "avatar_url"]));

    Ok(ExternalIdentity {
        external_id: external_id.to_string(),
        email: email.to_string(),
        display_name: display_name.to_string(),
        avatar_url: avatar_url.map(str::to_string),
        age: None,
        gender: None,
    })
}

/// Completed years between the birth date and `today`.
fn age_on(year: i32, month: u8, day: u8, today: Date) -> Option<i32> {
    let born = Date::from_calendar_date(year, Month::try_from(month).ok()?, day).ok()?;
    let mut age = today.year() - born.year();
    if (today.month() as u8, today.day()) < (born.month() as u8, born.day()) {
        age -= 1;
    }
    (age >= 0).then_some(age)
}

/// Resolves tokens from a fixed table; anything else fails verification.
#[cfg(test)]
#[derive(Default)]
pub struct StaticVerifier {
    identities: std::collections::HashMap<String, ExternalIdentity>,
}

#[cfg(test)]
impl StaticVerifier {
    pub fn with(mut self, token: &str, identity: ExternalIdentity) -> Self {
        self.identities.insert(token.to_string(), identity);
        self
    }
}

#[cfg(test)]
#[async_trait]
impl CredentialVerifier for StaticVerifier {
    async fn verify(
        &self,
        provider: AuthProvider,
        access_token: &str,
    ) -> Result<ExternalIdentity, VerifyError> {
        if provider != AuthProvider::Google {
            return Err(VerifyError::UnsupportedProvider(provider));
        }
        self.identities
            .get(access_token)
            .cloned()
            .ok_or_else(|| VerifyError::InvalidToken("unknown token".into()))
    }
}
