//! Cached dongle identifier
//!
//! The 2.4G dongle reports its identifier once, via a vendor input report,
//! after being poked with an init report. To skip that round-trip on later
//! connects the identifier is kept in one text file under the per-user data
//! directory. It is overwritten on discovery and deleted when the dongle
//! disconnects.
//!
//! Every I/O failure here is a cache miss, never a fault: the daemon works
//! fine without the file, it just has to probe the dongle again.

use crate::config::Config;
use crate::error::CacheError;
use std::path::PathBuf;

const CACHE_FILE: &str = "device_id.txt";

/// Persisted identifier note with get/set/delete semantics
#[derive(Debug, Clone)]
pub struct IdCache {
    /// None disables persistence entirely (pipeline.persistence = false)
    path: Option<PathBuf>,
}

impl IdCache {
    /// Cache backed by a file at the given path
    pub fn new(path: PathBuf) -> Self {
        Self { path: Some(path) }
    }

    /// In-memory no-op cache: load always misses, store/clear do nothing
    pub fn disabled() -> Self {
        Self { path: None }
    }

    /// Cache at the default per-user location
    pub fn at_default_location() -> Self {
        match Config::data_dir() {
            Some(dir) => Self::new(dir.join(CACHE_FILE)),
            None => {
                tracing::warn!("No per-user data directory, identifier cache disabled");
                Self::disabled()
            }
        }
    }

    /// Read the cached identifier, if any. Unreadable is a miss.
    pub fn load(&self) -> Option<String> {
        let path = self.path.as_ref()?;
        match std::fs::read_to_string(path) {
            Ok(contents) => {
                let id = contents.lines().next().unwrap_or("").trim().to_string();
                if id.is_empty() {
                    None
                } else {
                    Some(id)
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                tracing::warn!("Failed to read identifier cache {:?}: {}", path, e);
                None
            }
        }
    }

    /// Overwrite the cached identifier
    pub fn store(&self, id: &str) -> Result<(), CacheError> {
        let Some(path) = self.path.as_ref() else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| CacheError::Io {
                path: path.clone(),
                source,
            })?;
        }

        std::fs::write(path, id).map_err(|source| CacheError::Io {
            path: path.clone(),
            source,
        })?;

        tracing::debug!("Cached identifier {} at {:?}", id, path);
        Ok(())
    }

    /// Delete the cached identifier. Missing file is fine.
    pub fn clear(&self) {
        let Some(path) = self.path.as_ref() else {
            return;
        };

        match std::fs::remove_file(path) {
            Ok(()) => tracing::debug!("Deleted identifier cache {:?}", path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Failed to delete identifier cache {:?}: {}", path, e),
        }
    }
}
