// Snapshot store: the one shared, copy-on-write view of the latest bulk pull,
// plus its gzipped JSON copy on disk.

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::BotError;
use crate::metrics;
use crate::model::{NationSnapshot, Snapshot};

/// On-disk layout of the cache file.
#[derive(Debug, Deserialize)]
pub struct CacheFile {
    pub snapshot: Snapshot,
    #[serde(default)]
    pub previous_nations: Vec<NationSnapshot>,
}

#[derive(Serialize)]
struct CacheFileRef<'a> {
    snapshot: &'a Snapshot,
    previous_nations: &'a [NationSnapshot],
}

/// Summary of the loaded snapshot for status displays.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatus {
    pub last_update: Option<DateTime<Utc>>,
    pub collections: std::collections::BTreeMap<String, usize>,
    pub previous_nations: usize,
}

pub struct SnapshotStore {
    current: RwLock<Option<Arc<Snapshot>>>,
    previous_nations: RwLock<Arc<Vec<NationSnapshot>>>,
    path: Option<PathBuf>,
}

impl SnapshotStore {
    /// An empty store that never touches the disk.
    pub fn in_memory() -> Self {
        Self {
            current: RwLock::new(None),
            previous_nations: RwLock::new(Arc::new(Vec::new())),
            path: None,
        }
    }

    /// Open the store backed by `path`. A missing or unreadable file leaves the
    /// store empty (and therefore not ready).
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let store = Self {
            path: Some(path.clone()),
            ..Self::in_memory()
        };

        if !path.exists() {
            info!("No cache file at {}, starting empty", path.display());
            return store;
        }
        match read_cache_file(&path) {
            Ok(file) if file.snapshot.metadata.last_update.is_some() => {
                info!(
                    "Loaded cache from {} ({} nations, updated {:?})",
                    path.display(),
                    file.snapshot.nations.len(),
                    file.snapshot.metadata.last_update
                );
                store.set_previous_nations(Arc::new(file.previous_nations));
                store.swap(Arc::new(file.snapshot));
            }
            Ok(_) => warn!("Cache file {} was never completed, ignoring it", path.display()),
            Err(e) => warn!("Ignoring unreadable cache file: {e}"),
        }
        store
    }

    /// The current snapshot, or `CacheNotReady` if no refresh ever succeeded.
    pub fn current(&self) -> Result<Arc<Snapshot>, BotError> {
        self.snapshot().ok_or(BotError::CacheNotReady)
    }

    pub fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_ready(&self) -> bool {
        self.snapshot().is_some()
    }

    /// Nations as they were before the last changed refresh.
    pub fn previous_nations(&self) -> Arc<Vec<NationSnapshot>> {
        self.previous_nations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_previous_nations(&self, nations: Arc<Vec<NationSnapshot>>) {
        *self
            .previous_nations
            .write()
            .unwrap_or_else(PoisonError::into_inner) = nations;
    }

    /// Replace the current snapshot wholesale, returning the one it replaced.
    /// Readers holding the old `Arc` keep a consistent view.
    pub fn swap(&self, next: Arc<Snapshot>) -> Option<Arc<Snapshot>> {
        metrics::SNAPSHOT_NATIONS.set(next.nations.len() as i64);
        if let Some(ts) = next.metadata.last_update {
            metrics::SNAPSHOT_LAST_UPDATE_SECONDS.set(ts.timestamp());
        }
        self.current
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(next)
    }

    pub fn status(&self) -> Option<CacheStatus> {
        let snapshot = self.snapshot()?;
        Some(CacheStatus {
            last_update: snapshot.metadata.last_update,
            collections: snapshot.metadata.source_collection_sizes.clone(),
            previous_nations: self.previous_nations().len(),
        })
    }

    /// Write `snapshot` and `previous` to the backing file (no-op for an
    /// in-memory store). The file is replaced atomically via a rename.
    pub async fn persist(
        &self,
        snapshot: Arc<Snapshot>,
        previous: Arc<Vec<NationSnapshot>>,
    ) -> Result<(), BotError> {
        let Some(path) = self.path.clone() else {
            return Ok(());
        };
        tokio::task::spawn_blocking(move || write_cache_file(&path, &snapshot, &previous))
            .await
            .map_err(|e| BotError::Persistence(e.to_string()))?
    }
}

pub fn read_cache_file(path: &Path) -> Result<CacheFile, BotError> {
    let compressed = fs::read(path)
        .map_err(|e| BotError::Persistence(format!("{}: {e}", path.display())))?;
    let mut json = String::new();
    GzDecoder::new(compressed.as_slice())
        .read_to_string(&mut json)
        .map_err(|e| BotError::Persistence(format!("{}: {e}", path.display())))?;
    serde_json::from_str(&json)
        .map_err(|e| BotError::Persistence(format!("{}: {e}", path.display())))
}

pub fn write_cache_file(
    path: &Path,
    snapshot: &Snapshot,
    previous_nations: &[NationSnapshot],
) -> Result<(), BotError> {
    let io_err = |e: std::io::Error| BotError::Persistence(format!("{}: {e}", path.display()));

    let json = serde_json::to_vec(&CacheFileRef {
        snapshot,
        previous_nations,
    })
    .map_err(|e| BotError::Persistence(e.to_string()))?;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::fast());
    encoder.write_all(&json).map_err(io_err)?;
    let compressed = encoder.finish().map_err(io_err)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, compressed).map_err(io_err)?;
    fs::rename(&tmp, path).map_err(io_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CacheMetadata;

    fn ready_snapshot(nations: usize) -> Snapshot {
        Snapshot {
            nations: (1..=nations as i64)
                .map(|id| NationSnapshot::new(id, 100.0 * id as f64))
                .collect(),
            metadata: CacheMetadata {
                last_update: Some(Utc::now()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_store_is_not_ready() {
        let store = SnapshotStore::in_memory();
        assert!(!store.is_ready());
        assert!(matches!(store.current(), Err(BotError::CacheNotReady)));
        assert!(store.status().is_none());
    }

    #[test]
    fn test_swap_keeps_old_readers_consistent() {
        let store = SnapshotStore::in_memory();
        store.swap(Arc::new(ready_snapshot(2)));
        let reader = store.current().unwrap();

        let old = store.swap(Arc::new(ready_snapshot(5)));
        assert_eq!(old.map(|s| s.nations.len()), Some(2));
        assert_eq!(reader.nations.len(), 2);
        assert_eq!(store.current().unwrap().nations.len(), 5);
    }

    #[test]
    fn test_missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::open(dir.path().join("absent.json.gz"));
        assert!(!store.is_ready());
    }

    #[test]
    fn test_corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json.gz");
        fs::write(&path, b"not gzip at all").unwrap();
        let store = SnapshotStore::open(&path);
        assert!(!store.is_ready());
    }

    #[tokio::test]
    async fn test_persist_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("cache.json.gz");

        let store = SnapshotStore::open(&path);
        let snapshot = Arc::new(ready_snapshot(3));
        let previous = Arc::new(vec![NationSnapshot::new(1, 90.0)]);
        store.persist(snapshot.clone(), previous).await.unwrap();

        let reopened = SnapshotStore::open(&path);
        let loaded = reopened.current().unwrap();
        assert_eq!(*loaded, *snapshot);
        assert_eq!(reopened.previous_nations().len(), 1);
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_file_without_last_update_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json.gz");
        write_cache_file(&path, &Snapshot::default(), &[]).unwrap();
        assert!(!SnapshotStore::open(&path).is_ready());
    }
}
