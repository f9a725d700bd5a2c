use anyhow::Context;
use async_trait::async_trait;
use aws_config::{defaults, BehaviorVersion};
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    config::{Builder as S3ConfigBuilder, Region},
    Client,
};
use aws_smithy_types::byte_stream::ByteStream;
use bytes::Bytes;

use crate::config::StorageConfig;

/// Object store holding avatar images.
#[async_trait]
pub trait StorageClient: Send + Sync {
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> anyhow::Result<()>;
    async fn delete_object(&self, key: &str) -> anyhow::Result<()>;
    /// Public URL for `key`.
    fn public_url(&self, key: &str) -> String;
    /// Inverse of [`StorageClient::public_url`]; `None` for URLs hosted elsewhere.
    fn key_from_url(&self, url: &str) -> Option<String>;
}

fn join_url(base: &str, key: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), key)
}

fn strip_base(base: &str, url: &str) -> Option<String> {
    let prefix = format!("{}/", base.trim_end_matches('/'));
    url.strip_prefix(&prefix)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
}

#[derive(Clone)]
pub struct Storage {
    client: Client,
    bucket: String,
    public_url: String,
}

impl Storage {
    pub async fn new(cfg: &StorageConfig, region: &str) -> anyhow::Result<Self> {
        let shared = defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .credentials_provider(Credentials::new(
                &cfg.access_key,
                &cfg.secret_key,
                None,
                None,
                "static",
            ))
            .endpoint_url(&cfg.endpoint)
            .load()
            .await;

        let conf = S3ConfigBuilder::from(&shared)
            .endpoint_url(&cfg.endpoint)
            .force_path_style(true)
            .build();

        Ok(Self {
            client: Client::from_conf(conf),
            bucket: cfg.bucket.clone(),
            public_url: cfg.public_url.clone(),
        })
    }
}

#[async_trait]
impl StorageClient for Storage {
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> anyhow::Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await
            .context("s3 put_object")?;
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .context("s3 delete_object")?;
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        join_url(&self.public_url, key)
    }

    fn key_from_url(&self, url: &str) -> Option<String> {
        strip_base(&self.public_url, url)
    }
}

/// Records puts and deletes instead of talking to S3.
#[cfg(test)]
#[derive(Default)]
pub struct FakeStorage {
    pub puts: std::sync::Mutex<Vec<String>>,
    pub deletes: std::sync::Mutex<Vec<String>>,
    pub fail_puts: std::sync::atomic::AtomicBool,
}

#[cfg(test)]
impl FakeStorage {
    pub const BASE: &'static str = "https://fake.local/avatars-bucket";
}

#[cfg(test)]
#[async_trait]
impl StorageClient for FakeStorage {
    async fn put_object(&self, key: &str, _body: Bytes, _ct: &str) -> anyhow::Result<()> {
        if self.fail_puts.load(std::sync::atomic::Ordering::SeqCst) {
            anyhow::bail!("storage unavailable");
        }
        self.puts.lock().unwrap().push(key.to_string());
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
        self.deletes.lock().unwrap().push(key.to_string());
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        join_url(Self::BASE, key)
    }

    fn key_from_url(&self, url: &str) -> Option<String> {
        strip_base(Self::BASE, url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_and_key_are_inverse() {
        let url = join_url("https://cdn.example.com/bucket/", "avatars/u/1.png");
        assert_eq!(url, "https://cdn.example.com/bucket/avatars/u/1.png");
        assert_eq!(
            strip_base("https://cdn.example.com/bucket", &url).as_deref(),
            Some("avatars/u/1.png")
        );
    }

    #[test]
    fn foreign_urls_have_no_key() {
        assert_eq!(
            strip_base(
                "https://cdn.example.com/bucket",
                "https://lh3.googleusercontent.com/a/photo.jpg"
            ),
            None
        );
        assert_eq!(strip_base("https://cdn.example.com/bucket", "https://cdn.example.com/bucket/"), None);
    }
}
