//! Filesystem blob store for uploaded media and event logos.
//!
//! Blobs live under `<root>/<namespace>/<name>` and are addressed by the
//! stable URL `/media/<namespace>/<name>`.

use bytes::Bytes;
use rand::Rng;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

pub const URL_PREFIX: &str = "/media/";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Invalid blob path: {0}")]
    InvalidPath(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Logical partition of the blob store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Namespace {
    EventMedia(String),
    EventLogo(String),
}

impl Namespace {
    fn relative(&self) -> PathBuf {
        match self {
            Namespace::EventMedia(event_id) => Path::new("events").join(event_id),
            Namespace::EventLogo(event_id) => Path::new("logos").join(event_id),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoredBlob {
    pub url: String,
    pub path: PathBuf,
    pub size: u64,
}

#[derive(Debug, Clone)]
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Write `data` under a name unique within the namespace.
    pub async fn put(
        &self,
        namespace: &Namespace,
        extension: &str,
        data: Bytes,
    ) -> Result<StoredBlob, StorageError> {
        let relative = namespace.relative().join(unique_name(extension));
        let path = self.root.join(&relative);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &data).await?;

        let url = format!("{}{}", URL_PREFIX, to_url_path(&relative));
        tracing::debug!("Stored blob {} ({} bytes)", url, data.len());
        Ok(StoredBlob {
            url,
            path,
            size: data.len() as u64,
        })
    }

    /// Remove the blob behind `url`. Returns `false` when it was already gone.
    pub async fn delete(&self, url: &str) -> Result<bool, StorageError> {
        let path = self.resolve(url)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!("Blob {} already absent", url);
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Remove a whole namespace. Missing directories are fine.
    pub async fn delete_namespace(&self, namespace: &Namespace) -> Result<(), StorageError> {
        let dir = self.root.join(namespace.relative());
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Map a blob URL (or the path part after `/media/`) to a file on disk,
    /// refusing anything that would escape the root.
    pub fn resolve(&self, url: &str) -> Result<PathBuf, StorageError> {
        let relative = url.strip_prefix(URL_PREFIX).unwrap_or(url);
        let relative = Path::new(relative);
        let safe = !relative.as_os_str().is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(StorageError::InvalidPath(url.to_string()));
        }
        Ok(self.root.join(relative))
    }

    pub async fn read(&self, url: &str) -> Result<Option<Bytes>, StorageError> {
        let path = self.resolve(url)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// `<unix millis>-<8 random bytes hex>.<ext>`
fn unique_name(extension: &str) -> String {
    let suffix: [u8; 8] = rand::thread_rng().gen();
    format!(
        "{}-{}.{}",
        chrono::Utc::now().timestamp_millis(),
        hex::encode(suffix),
        extension
    )
}

fn to_url_path(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|c| c.as_os_str().to_str())
        .collect::<Vec<_>>()
        .join("/")
}

/// Event id owning a media blob URL (`/media/events/<id>/...`).
pub fn event_of_media_url(url: &str) -> Option<&str> {
    let rest = url.strip_prefix(URL_PREFIX).unwrap_or(url);
    let mut parts = rest.splitn(3, '/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("events"), Some(event_id), Some(_)) if !event_id.is_empty() => Some(event_id),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_delete_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let store = BlobStore::new(tmp.path());
        let ns = Namespace::EventMedia("e1".into());

        let blob = store
            .put(&ns, "jpg", Bytes::from_static(b"jpeg-bytes"))
            .await
            .unwrap();
        assert!(blob.url.starts_with("/media/events/e1/"));
        assert!(blob.url.ends_with(".jpg"));
        assert!(blob.path.exists());
        assert_eq!(
            store.read(&blob.url).await.unwrap().unwrap(),
            Bytes::from_static(b"jpeg-bytes")
        );

        assert!(store.delete(&blob.url).await.unwrap());
        assert!(!store.delete(&blob.url).await.unwrap());
        assert!(store.read(&blob.url).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn names_do_not_collide() {
        let tmp = tempfile::tempdir().unwrap();
        let store = BlobStore::new(tmp.path());
        let ns = Namespace::EventMedia("e1".into());

        let a = store.put(&ns, "png", Bytes::from_static(b"a")).await.unwrap();
        let b = store.put(&ns, "png", Bytes::from_static(b"b")).await.unwrap();
        assert_ne!(a.url, b.url);
    }

    #[tokio::test]
    async fn delete_namespace_tolerates_missing_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let store = BlobStore::new(tmp.path());
        let ns = Namespace::EventLogo("nobody".into());
        store.delete_namespace(&ns).await.unwrap();

        let blob = store.put(&ns, "jpg", Bytes::from_static(b"x")).await.unwrap();
        store.delete_namespace(&ns).await.unwrap();
        assert!(!blob.path.exists());
    }

    #[test]
    fn resolve_rejects_traversal() {
        let store = BlobStore::new("/srv/uploads");
        assert!(store.resolve("/media/../etc/passwd").is_err());
        assert!(store.resolve("/media/events/../../x").is_err());
        assert!(store.resolve("/media//etc/passwd").is_err());
        assert!(store.resolve("/media/").is_err());
        assert_eq!(
            store.resolve("/media/events/e1/a.jpg").unwrap(),
            PathBuf::from("/srv/uploads/events/e1/a.jpg")
        );
    }

    #[test]
    fn event_of_media_url_extracts_owner() {
        assert_eq!(event_of_media_url("/media/events/e1/a.jpg"), Some("e1"));
        assert_eq!(event_of_media_url("events/e2/b.mp4"), Some("e2"));
        assert_eq!(event_of_media_url("/media/logos/e1/a.jpg"), None);
    }
}
