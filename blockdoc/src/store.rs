//! Where snapshots live between sessions.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::document::Document;
use crate::snapshot::Snapshot;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to access {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("snapshot is not valid JSON for a document")]
    Corrupt(#[source] serde_json::Error),
    #[error("failed to encode snapshot")]
    Encode(#[source] serde_json::Error),
}

/// Opaque get/set of a whole-document snapshot.
pub trait SnapshotStore {
    /// `Ok(None)` when nothing has been saved yet.
    fn load(&self) -> Result<Option<Snapshot>, StoreError>;
    fn save(&mut self, snapshot: &Snapshot) -> Result<(), StoreError>;
}

/// Pretty-printed JSON in one file.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl SnapshotStore for FileStore {
    fn load(&self) -> Result<Option<Snapshot>, StoreError> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no snapshot on disk");
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.path).map_err(|e| self.io_error(e))?;
        let snapshot = serde_json::from_str(&raw).map_err(StoreError::Corrupt)?;
        info!(path = %self.path.display(), "loaded snapshot");
        Ok(Some(snapshot))
    }

    /// Written to a sibling temp file first, then renamed over the target.
    fn save(&mut self, snapshot: &Snapshot) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        let json = serde_json::to_string_pretty(snapshot).map_err(StoreError::Encode)?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, json).map_err(|e| self.io_error(e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))?;
        debug!(path = %self.path.display(), "saved snapshot");
        Ok(())
    }
}

/// Raw JSON text held in memory. Useful in tests and for hosts that
/// persist the text themselves.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    raw: Option<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from previously saved text, valid or not.
    pub fn with_raw(raw: impl Into<String>) -> Self {
        MemoryStore {
            raw: Some(raw.into()),
        }
    }

    pub fn raw(&self) -> Option<&str> {
        self.raw.as_deref()
    }
}

impl SnapshotStore for MemoryStore {
    fn load(&self) -> Result<Option<Snapshot>, StoreError> {
        self.raw
            .as_deref()
            .map(|raw| serde_json::from_str(raw).map_err(StoreError::Corrupt))
            .transpose()
    }

    fn save(&mut self, snapshot: &Snapshot) -> Result<(), StoreError> {
        self.raw = Some(serde_json::to_string(snapshot).map_err(StoreError::Encode)?);
        Ok(())
    }
}

impl Document {
    /// Load the saved document, or the bootstrap document if there is none
    /// or it cannot be read.
    pub fn load_or_bootstrap(store: &impl SnapshotStore) -> Document {
        match store.load() {
            Ok(Some(snapshot)) => Document::from_snapshot(snapshot),
            Ok(None) => Document::bootstrap(),
            Err(err) => {
                warn!(error = %err, "could not load saved document; starting from the default");
                Document::bootstrap()
            }
        }
    }

    pub fn save_to(&self, store: &mut impl SnapshotStore) -> Result<(), StoreError> {
        store.save(&self.to_snapshot())
    }
}
