use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    /// Base URL under which stored objects are publicly reachable.
    pub public_url: String,
    pub timeout_secs: u64,
}

impl StorageConfig {
    /// Upper bound on a single upload or delete.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OAuthConfig {
    pub google_userinfo_url: String,
    pub google_people_url: String,
    /// HS256 secret for signed identity assertions; assertions are refused when unset.
    pub assertion_secret: Option<String>,
    pub http_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub production: bool,
    pub cors_origins: Vec<String>,
    pub jwt: JwtConfig,
    pub storage: StorageConfig,
    pub oauth: OAuthConfig,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.into())
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL")?;
        let production = env_or("APP_ENV", "development") == "production";
        let cors_origins = env_or("CORS_ORIGINS", "")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET")?,
            issuer: env_or("JWT_ISSUER", "accountd"),
            audience: env_or("JWT_AUDIENCE", "accountd-users"),
        };

        let endpoint = std::env::var("MINIO_ENDPOINT").context("MINIO_ENDPOINT")?;
        let bucket = std::env::var("MINIO_BUCKET").context("MINIO_BUCKET")?;
        let public_url = std::env::var("STORAGE_PUBLIC_URL")
            .unwrap_or_else(|_| format!("{}/{}", endpoint.trim_end_matches('/'), bucket));
        let storage = StorageConfig {
            access_key: std::env::var("MINIO_ACCESS_KEY").context("MINIO_ACCESS_KEY")?,
            secret_key: std::env::var("MINIO_SECRET_KEY").context("MINIO_SECRET_KEY")?,
            endpoint,
            bucket,
            public_url,
            timeout_secs: env_u64("STORAGE_TIMEOUT_SECS", 15),
        };

        let oauth = OAuthConfig {
            google_userinfo_url: env_or(
                "GOOGLE_USERINFO_URL",
                "https://www.googleapis.com/oauth2/v2/userinfo",
            ),
            google_people_url: env_or(
                "GOOGLE_PEOPLE_URL",
                "https://people.googleapis.com/v1/people/me?personFields=birthdays,genders",
            ),
            assertion_secret: std::env::var("OAUTH_ASSERTION_SECRET")
                .ok()
                .filter(|s| !s.is_empty()),
            http_timeout_secs: env_u64("OAUTH_HTTP_TIMEOUT_SECS", 10),
        };

        Ok(Self {
            database_url,
            production,
            cors_origins,
            jwt,
            storage,
            oauth,
        })
    }
}
