use agrocast_forest::{ForestError, ForestModel};
use agrocast_types::{SegmentKey, ARTIFACT_SUFFIX};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// File extension used by [`FileArtifactStore`].
pub const ARTIFACT_EXTENSION: &str = "bin";

/// Storage errors
#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("artifact {name} is unreadable: {source}")]
    Corrupt {
        name: String,
        #[source]
        source: ForestError,
    },
    #[error("failed to encode model: {0}")]
    Encode(#[source] ForestError),
}

impl StorageError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Persisted model artifacts, addressed by segment.
///
/// Artifacts are named by [`SegmentKey::artifact_name`]; a `put` replaces any
/// previous artifact for the same key wholesale.
pub trait ArtifactStore: Send + Sync {
    fn get(&self, key: &SegmentKey) -> Result<Option<ForestModel>, StorageError>;
    fn put(&self, key: &SegmentKey, model: &ForestModel) -> Result<(), StorageError>;
    fn exists(&self, key: &SegmentKey) -> Result<bool, StorageError>;
    /// Remove every artifact, returning how many were deleted.
    fn purge(&self) -> Result<usize, StorageError>;
}

/// One `<artifact_name>.bin` file per segment inside a directory.
///
/// Writes go to a temp file in the same directory which is synced and then
/// renamed over the target, so readers never observe a partial artifact.
#[derive(Debug, Clone)]
pub struct FileArtifactStore {
    dir: PathBuf,
}

impl FileArtifactStore {
    /// Open (and create if needed) the artifact directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| StorageError::io(&dir, e))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &SegmentKey) -> PathBuf {
        self.dir
            .join(format!("{}.{}", key.artifact_name(), ARTIFACT_EXTENSION))
    }

    fn is_artifact(path: &Path) -> bool {
        path.extension().map_or(false, |ext| ext == ARTIFACT_EXTENSION)
            && path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .map_or(false, |stem| stem.ends_with(ARTIFACT_SUFFIX))
    }
}

impl ArtifactStore for FileArtifactStore {
    fn get(&self, key: &SegmentKey) -> Result<Option<ForestModel>, StorageError> {
        let path = self.path_for(key);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::io(&path, e)),
        };

        let model = ForestModel::from_bytes(&bytes).map_err(|source| StorageError::Corrupt {
            name: key.artifact_name(),
            source,
        })?;
        debug!("Loaded artifact {}", path.display());
        Ok(Some(model))
    }

    fn put(&self, key: &SegmentKey, model: &ForestModel) -> Result<(), StorageError> {
        let path = self.path_for(key);
        let bytes = model.to_bytes().map_err(StorageError::Encode)?;

        let mut temp = NamedTempFile::new_in(&self.dir).map_err(|e| StorageError::io(&self.dir, e))?;
        temp.write_all(&bytes)
            .map_err(|e| StorageError::io(temp.path(), e))?;
        temp.as_file()
            .sync_all()
            .map_err(|e| StorageError::io(temp.path(), e))?;
        temp.persist(&path)
            .map_err(|e| StorageError::io(&path, e.error))?;

        debug!("Wrote artifact {} ({} bytes)", path.display(), bytes.len());
        Ok(())
    }

    fn exists(&self, key: &SegmentKey) -> Result<bool, StorageError> {
        Ok(self.path_for(key).is_file())
    }

    fn purge(&self) -> Result<usize, StorageError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(StorageError::io(&self.dir, e)),
        };

        let mut removed = 0;
        for entry in entries {
            let path = entry.map_err(|e| StorageError::io(&self.dir, e))?.path();
            if !Self::is_artifact(&path) {
                continue;
            }
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
            }
        }
        Ok(removed)
    }
}

/// In-memory testing backend. Models are kept encoded so reads go through
/// the same decode and verification path as the file store.
#[derive(Default)]
pub struct MemoryArtifactStore {
    artifacts: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.artifacts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.read().is_empty()
    }

    /// Overwrite the raw bytes stored for `key`.
    pub fn put_raw(&self, key: &SegmentKey, bytes: Vec<u8>) {
        self.artifacts.write().insert(key.artifact_name(), bytes);
    }
}

impl ArtifactStore for MemoryArtifactStore {
    fn get(&self, key: &SegmentKey) -> Result<Option<ForestModel>, StorageError> {
        let name = key.artifact_name();
        let guard = self.artifacts.read();
        let Some(bytes) = guard.get(&name) else {
            return Ok(None);
        };
        ForestModel::from_bytes(bytes)
            .map(Some)
            .map_err(|source| StorageError::Corrupt { name, source })
    }

    fn put(&self, key: &SegmentKey, model: &ForestModel) -> Result<(), StorageError> {
        let bytes = model.to_bytes().map_err(StorageError::Encode)?;
        self.artifacts.write().insert(key.artifact_name(), bytes);
        Ok(())
    }

    fn exists(&self, key: &SegmentKey) -> Result<bool, StorageError> {
        Ok(self.artifacts.read().contains_key(&key.artifact_name()))
    }

    fn purge(&self) -> Result<usize, StorageError> {
        let mut guard = self.artifacts.write();
        let removed = guard.len();
        guard.clear();
        Ok(removed)
    }
}
