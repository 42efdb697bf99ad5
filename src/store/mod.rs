//! Best-effort client persistence
//!
//! Everything the client keeps between page loads goes through [`ClientStore`].
//! Every call returns a `Result`; callers log a warning and carry on, so a
//! torn-down or quota-exhausted store never stops the feed pipeline.

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

/// Errors raised at the persistence boundary
#[derive(Error, Debug)]
pub enum StoreError {
    /// The backing store is gone (context torn down, quota exhausted)
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("store JSON error for {key}: {source}")]
    Json {
        key: String,
        source: serde_json::Error,
    },
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Keys the client persists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreKey {
    WatchHistory,
    LearningComplete,
    LearningCompletedAt,
    ZenfeedActive,
    EnableBackend,
    BackendUrl,
}

impl StoreKey {
    pub const ALL: [StoreKey; 6] = [
        StoreKey::WatchHistory,
        StoreKey::LearningComplete,
        StoreKey::LearningCompletedAt,
        StoreKey::ZenfeedActive,
        StoreKey::EnableBackend,
        StoreKey::BackendUrl,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StoreKey::WatchHistory => "watchHistory",
            StoreKey::LearningComplete => "learningComplete",
            StoreKey::LearningCompletedAt => "learningCompletedAt",
            StoreKey::ZenfeedActive => "zenfeedActive",
            StoreKey::EnableBackend => "enableBackend",
            StoreKey::BackendUrl => "backendUrl",
        }
    }
}

impl std::fmt::Display for StoreKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key-value persistence used by the client side of the pipeline
pub trait ClientStore: Send + Sync {
    fn get(&self, key: StoreKey) -> StoreResult<Option<Value>>;

    fn set(&self, key: StoreKey, value: Value) -> StoreResult<()>;

    fn remove(&self, key: StoreKey) -> StoreResult<()>;

    fn get_bool(&self, key: StoreKey) -> StoreResult<Option<bool>> {
        Ok(self.get(key)?.and_then(|v| v.as_bool()))
    }

    fn get_i64(&self, key: StoreKey) -> StoreResult<Option<i64>> {
        Ok(self.get(key)?.and_then(|v| v.as_i64()))
    }

    fn get_string(&self, key: StoreKey) -> StoreResult<Option<String>> {
        Ok(self
            .get(key)?
            .and_then(|v| v.as_str().map(|s| s.to_string())))
    }
}

/// In-memory store. `set_available(false)` simulates a torn-down context.
#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<StoreKey, Value>>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    fn check(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable(
                "memory store marked unavailable".to_string(),
            ))
        } else {
            Ok(())
        }
    }
}

impl ClientStore for MemoryStore {
    fn get(&self, key: StoreKey) -> StoreResult<Option<Value>> {
        self.check()?;
        let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(values.get(&key).cloned())
    }

    fn set(&self, key: StoreKey, value: Value) -> StoreResult<()> {
        self.check()?;
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.insert(key, value);
        Ok(())
    }

    fn remove(&self, key: StoreKey) -> StoreResult<()> {
        self.check()?;
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.remove(&key);
        Ok(())
    }
}

/// Store backed by a single JSON object on disk
///
/// Writes go to a sibling temp file that is renamed over the original.
pub struct JsonFileStore {
    path: PathBuf,
    guard: Mutex<()>,
}

impl JsonFileStore {
    /// Open (or lazily create) the store at `path`
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        Ok(Self {
            path,
            guard: Mutex::new(()),
        })
    }

    /// Default location inside the data directory
    pub fn in_data_dir(data_dir: &Path) -> StoreResult<Self> {
        Self::open(data_dir.join("store.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> StoreResult<Map<String, Value>> {
        if !self.path.exists() {
            return Ok(Map::new());
        }

        let content = std::fs::read_to_string(&self.path).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })?;

        if content.trim().is_empty() {
            return Ok(Map::new());
        }

        serde_json::from_str(&content).map_err(|source| StoreError::Json {
            key: self.path.display().to_string(),
            source,
        })
    }

    fn write_all(&self, map: &Map<String, Value>) -> StoreResult<()> {
        let content = serde_json::to_string_pretty(map).map_err(|source| StoreError::Json {
            key: self.path.display().to_string(),
            source,
        })?;

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, content).map_err(|source| StoreError::Io {
            path: tmp.clone(),
            source,
        })?;
        std::fs::rename(&tmp, &self.path).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

impl ClientStore for JsonFileStore {
    fn get(&self, key: StoreKey) -> StoreResult<Option<Value>> {
        let _guard = self.guard.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.read_all()?.get(key.as_str()).cloned())
    }

    fn set(&self, key: StoreKey, value: Value) -> StoreResult<()> {
        let _guard = self.guard.lock().unwrap_or_else(PoisonError::into_inner);
        let mut map = self.read_all()?;
        map.insert(key.as_str().to_string(), value);
        self.write_all(&map)
    }

    fn remove(&self, key: StoreKey) -> StoreResult<()> {
        let _guard = self.guard.lock().unwrap_or_else(PoisonError::into_inner);
        let mut map = self.read_all()?;
        if map.remove(key.as_str()).is_some() {
            self.write_all(&map)?;
        }
        Ok(())
    }
}
