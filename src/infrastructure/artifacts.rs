//! Transient on-disk storage for URL-mode outputs
//!
//! Everything lives under one process-owned temporary directory. Files are
//! staged through a [`NamedTempFile`] and only persisted once fully written,
//! so failed writes leave nothing behind. Dropping the store deletes the
//! directory and all remaining artifacts.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tempfile::{NamedTempFile, TempDir};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::ArtifactConfig;
use crate::domain::DomainError;

/// Metadata for one stored artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredArtifact {
    pub id: Uuid,
    pub media_type: String,
    pub size: usize,
    pub created_at: DateTime<Utc>,
    path: PathBuf,
}

impl StoredArtifact {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[derive(Debug)]
pub struct ArtifactStore {
    dir: TempDir,
    entries: RwLock<HashMap<Uuid, StoredArtifact>>,
    ttl: chrono::Duration,
    public_path: String,
}

impl ArtifactStore {
    pub fn new(config: &ArtifactConfig) -> Result<Self, DomainError> {
        let dir = match &config.directory {
            Some(parent) => {
                std::fs::create_dir_all(parent).map_err(|e| {
                    DomainError::storage(format!("Cannot create {}: {}", parent.display(), e))
                })?;
                tempfile::Builder::new().prefix("coinforge-").tempdir_in(parent)
            }
            None => tempfile::Builder::new().prefix("coinforge-").tempdir(),
        }
        .map_err(|e| DomainError::storage(format!("Cannot create artifact directory: {}", e)))?;

        let ttl_secs = i64::try_from(config.ttl_secs).unwrap_or(i64::MAX / 1000);
        let ttl = chrono::Duration::try_seconds(ttl_secs).unwrap_or(chrono::Duration::MAX);

        info!(path = %dir.path().display(), ttl_secs = config.ttl_secs, "Artifact store ready");

        Ok(Self {
            dir,
            entries: RwLock::new(HashMap::new()),
            ttl,
            public_path: config.public_path.trim_end_matches('/').to_string(),
        })
    }

    pub fn directory(&self) -> &Path {
        self.dir.path()
    }

    /// Whether the backing directory still exists and is writable
    pub fn is_writable(&self) -> bool {
        NamedTempFile::new_in(self.dir.path()).is_ok()
    }

    /// Public download URL path for an artifact
    pub fn url_for(&self, artifact: &StoredArtifact) -> String {
        format!("{}/{}", self.public_path, artifact.id)
    }

    pub async fn put(
        &self,
        bytes: Bytes,
        media_type: &str,
        extension: &str,
    ) -> Result<StoredArtifact, DomainError> {
        let id = Uuid::new_v4();
        let dir = self.dir.path().to_path_buf();
        let target = dir.join(format!("{}.{}", id, extension.trim_start_matches('.')));
        let size = bytes.len();

        let path = tokio::task::spawn_blocking(move || write_atomically(&dir, &target, &bytes))
            .await
            .map_err(|e| DomainError::internal(format!("Artifact write task failed: {}", e)))??;

        let artifact = StoredArtifact {
            id,
            media_type: media_type.to_string(),
            size,
            created_at: Utc::now(),
            path,
        };
        self.entries.write().await.insert(id, artifact.clone());

        debug!(id = %id, media_type, size, "Artifact stored");
        Ok(artifact)
    }

    /// Look up an artifact and read its contents; expired entries are not found
    pub async fn get(&self, id: &str) -> Result<(StoredArtifact, Bytes), DomainError> {
        let not_found = || DomainError::not_found(format!("Artifact '{}' not found", id));
        let id = Uuid::parse_str(id).map_err(|_| not_found())?;

        let artifact = self
            .entries
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(not_found)?;

        if self.is_expired(&artifact, Utc::now()) {
            return Err(not_found());
        }

        let bytes = tokio::fs::read(&artifact.path)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to read artifact {}: {}", id, e)))?;

        Ok((artifact, Bytes::from(bytes)))
    }

    /// Drop one artifact and its file; false when it was not stored
    pub async fn remove(&self, id: &Uuid) -> bool {
        let Some(artifact) = self.entries.write().await.remove(id) else {
            return false;
        };
        delete_file(&artifact).await;
        true
    }

    /// Roll back artifacts written for a request that failed later on
    pub async fn release(&self, ids: &[Uuid]) {
        for id in ids {
            self.remove(id).await;
        }
        if !ids.is_empty() {
            debug!(released = ids.len(), "Artifacts released");
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Remove artifacts older than the TTL; returns how many were removed
    pub async fn sweep(&self) -> usize {
        self.sweep_at(Utc::now()).await
    }

    async fn sweep_at(&self, now: DateTime<Utc>) -> usize {
        let expired: Vec<StoredArtifact> = {
            let mut entries = self.entries.write().await;
            let ids: Vec<Uuid> = entries
                .values()
                .filter(|a| self.is_expired(a, now))
                .map(|a| a.id)
                .collect();
            ids.iter().filter_map(|id| entries.remove(id)).collect()
        };

        for artifact in &expired {
            delete_file(artifact).await;
        }

        if !expired.is_empty() {
            debug!(removed = expired.len(), "Expired artifacts swept");
        }
        expired.len()
    }

    fn is_expired(&self, artifact: &StoredArtifact, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(artifact.created_at) > self.ttl
    }

    /// Periodically sweep until the store is dropped
    pub fn spawn_sweeper(store: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let weak: Weak<Self> = Arc::downgrade(store);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every.max(Duration::from_secs(1)));
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(store) = weak.upgrade() else {
                    break;
                };
                store.sweep().await;
            }
        })
    }
}

async fn delete_file(artifact: &StoredArtifact) {
    if let Err(e) = tokio::fs::remove_file(&artifact.path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(id = %artifact.id, error = %e, "Failed to remove artifact file");
        }
    }
}

fn write_atomically(dir: &Path, target: &Path, bytes: &[u8]) -> Result<PathBuf, DomainError> {
    let mut staged = NamedTempFile::new_in(dir)
        .map_err(|e| DomainError::storage(format!("Failed to stage artifact: {}", e)))?;
    staged
        .write_all(bytes)
        .and_then(|_| staged.flush())
        .map_err(|e| DomainError::storage(format!("Failed to write artifact: {}", e)))?;
    staged
        .persist(target)
        .map_err(|e| DomainError::storage(format!("Failed to persist artifact: {}", e.error)))?;
    Ok(target.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(parent: &Path, ttl_secs: u64) -> ArtifactStore {
        ArtifactStore::new(&ArtifactConfig {
            directory: Some(parent.to_path_buf()),
            ttl_secs,
            public_path: "/api/artifacts/".to_string(),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let parent = tempfile::tempdir().unwrap();
        let store = store_in(parent.path(), 60);

        let artifact = store
            .put(Bytes::from_static(b"glTF...."), "model/gltf-binary", "glb")
            .await
            .unwrap();
        assert!(artifact.path().exists());
        assert_eq!(store.url_for(&artifact), format!("/api/artifacts/{}", artifact.id));

        let (found, bytes) = store.get(&artifact.id.to_string()).await.unwrap();
        assert_eq!(found.media_type, "model/gltf-binary");
        assert_eq!(&bytes[..], b"glTF....");
    }

    #[tokio::test]
    async fn test_unknown_or_malformed_id_is_not_found() {
        let parent = tempfile::tempdir().unwrap();
        let store = store_in(parent.path(), 60);

        let missing = store.get(&Uuid::new_v4().to_string()).await.unwrap_err();
        let malformed = store.get("../etc/passwd").await.unwrap_err();
        assert!(matches!(missing, DomainError::NotFound { .. }));
        assert!(matches!(malformed, DomainError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_sweep_removes_expired_files() {
        let parent = tempfile::tempdir().unwrap();
        let store = store_in(parent.path(), 60);
        let artifact = store
            .put(Bytes::from_static(b"png"), "image/png", "png")
            .await
            .unwrap();

        assert_eq!(store.sweep().await, 0);

        let later = Utc::now() + chrono::Duration::try_seconds(120).unwrap();
        assert_eq!(store.sweep_at(later).await, 1);
        assert!(!artifact.path().exists());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_release_removes_entries_and_files() {
        let parent = tempfile::tempdir().unwrap();
        let store = store_in(parent.path(), 60);
        let first = store
            .put(Bytes::from_static(b"png"), "image/png", "png")
            .await
            .unwrap();
        let second = store
            .put(Bytes::from_static(b"glTF"), "model/gltf-binary", "glb")
            .await
            .unwrap();

        store.release(&[first.id, second.id, Uuid::new_v4()]).await;

        assert!(store.is_empty().await);
        assert!(!first.path().exists());
        assert!(!second.path().exists());
        assert!(!store.remove(&first.id).await);
    }

    #[tokio::test]
    async fn test_drop_removes_directory() {
        let parent = tempfile::tempdir().unwrap();
        let store = store_in(parent.path(), 60);
        store
            .put(Bytes::from_static(b"png"), "image/png", "png")
            .await
            .unwrap();

        let dir = store.directory().to_path_buf();
        assert!(dir.exists());
        assert!(store.is_writable());
        drop(store);
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn test_no_staging_files_left_behind() {
        let parent = tempfile::tempdir().unwrap();
        let store = store_in(parent.path(), 60);
        store
            .put(Bytes::from_static(b"abc"), "image/png", "png")
            .await
            .unwrap();

        let files = std::fs::read_dir(store.directory()).unwrap().count();
        assert_eq!(files, 1);
    }
}
