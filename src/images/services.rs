use std::time::Duration;

use anyhow::Context;
use bytes::Bytes;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::storage::StorageClient;

/// Avatars larger than this are refused.
pub const MAX_AVATAR_BYTES: usize = 5 * 1024 * 1024;

pub struct UploadItem {
    pub body: Bytes,
    pub content_type: String,
}

pub fn is_image(content_type: &str) -> bool {
    content_type.starts_with("image/")
}

/// Stores the avatar and returns its public URL.
pub async fn upload_avatar(
    storage: &dyn StorageClient,
    item: UploadItem,
    timeout: Duration,
) -> anyhow::Result<String> {
    anyhow::ensure!(is_image(&item.content_type), "not an image");
    let ext = ext_from_mime(&item.content_type).unwrap_or("bin");
    let key = format!("avatars/{}.{}", Uuid::new_v4(), ext);
    tokio::time::timeout(timeout, storage.put_object(&key, item.body, &item.content_type))
        .await
        .with_context(|| format!("put_object {} timed out", key))?
        .with_context(|| format!("put_object {}", key))?;
    debug!(%key, "avatar uploaded");
    Ok(storage.public_url(&key))
}

/// Removes an avatar we host. Failures are logged and swallowed.
pub async fn delete_avatar(storage: &dyn StorageClient, url: &str, timeout: Duration) {
    let Some(key) = storage.key_from_url(url) else {
        debug!(%url, "avatar not hosted by us; skipping delete");
        return;
    };
    match tokio::time::timeout(timeout, storage.delete_object(&key)).await {
        Ok(Ok(())) => debug!(%key, "avatar deleted"),
        Ok(Err(e)) => warn!(error = %e, %key, "avatar delete failed"),
        Err(_) => warn!(%key, "avatar delete timed out"),
    }
}

fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        "image/heic" => Some("heic"),
        _ => None,
    }
}

#[cfg(test)]
mod image_tests {
    use super::*;
    use crate::storage::FakeStorage;

    const T: Duration = Duration::from_secs(1);

    #[test]
    fn test_ext_from_mime() {
        assert_eq!(ext_from_mime("image/jpeg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/jpg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/png"), Some("png"));
        assert_eq!(ext_from_mime("image/webp"), Some("webp"));
        assert_eq!(ext_from_mime("image/heic"), Some("heic"));
        assert_eq!(ext_from_mime("application/octet-stream"), None);
    }

    #[tokio::test]
    async fn upload_stores_under_avatar_prefix() {
        let storage = FakeStorage::default();
        let url = upload_avatar(
            &storage,
            UploadItem {
                body: Bytes::from_static(b"png"),
                content_type: "image/png".into(),
            },
            T,
        )
        .await
        .unwrap();

        let puts = storage.puts.lock().unwrap().clone();
        assert_eq!(puts.len(), 1);
        assert!(puts[0].starts_with("avatars/"));
        assert!(puts[0].ends_with(".png"));
        assert_eq!(url, format!("{}/{}", FakeStorage::BASE, puts[0]));
    }

    #[tokio::test]
    async fn upload_refuses_non_images() {
        let storage = FakeStorage::default();
        let res = upload_avatar(
            &storage,
            UploadItem {
                body: Bytes::from_static(b"%PDF"),
                content_type: "application/pdf".into(),
            },
            T,
        )
        .await;
        assert!(res.is_err());
        assert!(storage.puts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_only_touches_our_objects() {
        let storage = FakeStorage::default();
        delete_avatar(&storage, "https://lh3.googleusercontent.com/a/x.jpg", T).await;
        assert!(storage.deletes.lock().unwrap().is_empty());

        let ours = format!("{}/avatars/u/1.png", FakeStorage::BASE);
        delete_avatar(&storage, &ours, T).await;
        assert_eq!(*storage.deletes.lock().unwrap(), vec!["avatars/u/1.png".to_string()]);
    }
}
