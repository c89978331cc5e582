//! The ordinal result cache.
//!
//! Every listing is written here so that a later invocation can refer to
//! "result number N". The file is a JSON array of machine records; ordinal
//! `n` is the record at position `n - 1`. Writes replace the file
//! atomically. Readers and writers do not lock.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::CacheError;
use crate::inventory::Machine;

/// File name of the result cache in the temporary directory.
pub const DEFAULT_FILE_NAME: &str = "ss.instances.json";

/// The last displayed result list.
#[derive(Debug, Clone)]
pub struct ResultCache {
    path: PathBuf,
}

impl ResultCache {
    /// A cache stored at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The cache file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the cached list.
    ///
    /// # Errors
    ///
    /// Returns an error if the list cannot be serialized or written.
    pub fn save(&self, machines: &[Machine]) -> Result<(), CacheError> {
        let data = serde_json::to_vec_pretty(machines)?;
        write_atomic(&self.path, &data).map_err(|source| CacheError::Io {
            path: self.path.clone(),
            source,
        })?;
        tracing::debug!(path = %self.path.display(), entries = machines.len(), "saved result list");
        Ok(())
    }

    /// The cached list.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Missing`] if nothing has been saved, or an
    /// error if the file cannot be read or parsed.
    pub fn load(&self) -> Result<Vec<Machine>, CacheError> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(CacheError::Missing {
                    path: self.path.clone(),
                });
            }
            Err(source) => {
                return Err(CacheError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        Ok(serde_json::from_slice(&data)?)
    }

    /// Entry `ordinal` (1-based).
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::OutOfRange`] for `0` or an ordinal past the
    /// end, [`CacheError::Missing`] if nothing has been saved, or an error
    /// if the cache cannot be loaded.
    pub fn get(&self, ordinal: usize) -> Result<Machine, CacheError> {
        let list = self.load()?;
        let cached = list.len();
        ordinal
            .checked_sub(1)
            .and_then(|i| list.into_iter().nth(i))
            .ok_or(CacheError::OutOfRange { ordinal, cached })
    }

    /// Delete the cache. A missing file is fine.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be removed.
    pub fn invalidate(&self) -> Result<(), CacheError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(CacheError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

/// Write `data` to a temporary file next to `path`, then rename it over
/// `path`.
pub(crate) fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(data)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machines() -> Vec<Machine> {
        vec![
            Machine::new("i-1", "10.0.0.1", "prod").with_tag("Name", "web-1"),
            Machine::new("i-2", "10.0.0.2", "prod").with_tag("Name", "web-2"),
            Machine::new("i-3", "10.0.0.3", "prod"),
        ]
    }

    #[test]
    fn save_then_load_is_identity() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResultCache::new(dir.path().join(DEFAULT_FILE_NAME));
        cache.save(&machines()).unwrap();
        assert_eq!(cache.load().unwrap(), machines());
    }

    #[test]
    fn ordinals_are_one_based() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResultCache::new(dir.path().join(DEFAULT_FILE_NAME));
        cache.save(&machines()).unwrap();

        assert_eq!(cache.get(1).unwrap().instance_id, "i-1");
        assert_eq!(cache.get(3).unwrap().instance_id, "i-3");
        assert!(matches!(
            cache.get(0),
            Err(CacheError::OutOfRange { ordinal: 0, cached: 3 })
        ));
        assert!(matches!(
            cache.get(4),
            Err(CacheError::OutOfRange { ordinal: 4, cached: 3 })
        ));
    }

    #[test]
    fn save_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResultCache::new(dir.path().join(DEFAULT_FILE_NAME));
        cache.save(&machines()).unwrap();
        cache.save(&machines()[..1]).unwrap();
        assert_eq!(cache.load().unwrap().len(), 1);
    }

    #[test]
    fn missing_and_invalidate() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResultCache::new(dir.path().join(DEFAULT_FILE_NAME));
        assert!(matches!(cache.load(), Err(CacheError::Missing { .. })));
        cache.invalidate().unwrap();

        cache.save(&machines()).unwrap();
        cache.invalidate().unwrap();
        assert!(!cache.path().exists());
    }

    #[test]
    fn corrupt_cache_is_a_json_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_FILE_NAME);
        fs::write(&path, b"[not json").unwrap();
        assert!(matches!(ResultCache::new(path).load(), Err(CacheError::Json(_))));
    }
}
