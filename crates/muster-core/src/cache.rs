use crate::error::Result;
use crate::inventory::Inventory;
use crate::paths;
use std::path::{Path, PathBuf};
use tracing::warn;

// ---------------------------------------------------------------------------
// InventoryCache
// ---------------------------------------------------------------------------

/// Persisted inventory, one file per project under `.muster/`.
///
/// A present cache file is authoritative: the resolver returns it without
/// freshness checks or reconciliation against running state. Staleness is
/// the caller's problem — [`InventoryCache::invalidate`] deletes the file
/// and the next resolution recomputes.
#[derive(Debug, Clone)]
pub struct InventoryCache {
    path: PathBuf,
}

impl InventoryCache {
    pub fn for_project(root: &Path) -> Self {
        Self {
            path: paths::cache_path(root),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Read the cached inventory. An unreadable or corrupt file is treated
    /// as absent (the resolver recomputes) rather than a hard error.
    pub fn load(&self) -> Option<Inventory> {
        if !self.path.exists() {
            return None;
        }
        let data = match std::fs::read_to_string(&self.path) {
            Ok(d) => d,
            Err(e) => {
                warn!("failed to read inventory cache {}: {e}", self.path.display());
                return None;
            }
        };
        match serde_json::from_str::<Inventory>(&data) {
            Ok(inv) => Some(inv),
            Err(e) => {
                warn!(
                    "corrupt inventory cache {}: {e}; ignoring",
                    self.path.display()
                );
                None
            }
        }
    }

    /// Persist a resolved inventory. An empty inventory is never written,
    /// so a later invocation can re-resolve once the cluster exists.
    pub fn store(&self, inventory: &Inventory) -> Result<()> {
        if inventory.is_empty() {
            warn!("refusing to cache an empty inventory");
            return Ok(());
        }
        let data = serde_json::to_string_pretty(inventory)?;
        crate::io::atomic_write(&self.path, data.as_bytes())
    }

    /// Delete the cache file. Missing file is not an error.
    pub fn invalidate(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::HostRecord;
    use tempfile::TempDir;

    fn sample() -> Inventory {
        Inventory::new(vec![HostRecord::new("node1"), HostRecord::new("node2")])
    }

    #[test]
    fn store_then_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let cache = InventoryCache::for_project(dir.path());
        cache.store(&sample()).unwrap();
        assert_eq!(cache.load().unwrap(), sample());
    }

    #[test]
    fn load_missing_returns_none() {
        let dir = TempDir::new().unwrap();
        assert!(InventoryCache::for_project(dir.path()).load().is_none());
    }

    #[test]
    fn never_stores_empty_inventory() {
        let dir = TempDir::new().unwrap();
        let cache = InventoryCache::for_project(dir.path());
        cache.store(&Inventory::empty()).unwrap();
        assert!(!cache.exists());
    }

    #[test]
    fn stored_file_is_byte_stable() {
        let dir = TempDir::new().unwrap();
        let cache = InventoryCache::for_project(dir.path());
        cache.store(&sample()).unwrap();
        let first = std::fs::read(cache.path()).unwrap();
        cache.store(&sample()).unwrap();
        let second = std::fs::read(cache.path()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn corrupt_cache_treated_as_absent() {
        let dir = TempDir::new().unwrap();
        let cache = InventoryCache::for_project(dir.path());
        std::fs::create_dir_all(dir.path().join(".muster")).unwrap();
        std::fs::write(cache.path(), "not json").unwrap();
        assert!(cache.load().is_none());
    }

    #[test]
    fn invalidate_removes_file_and_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let cache = InventoryCache::for_project(dir.path());
        cache.store(&sample()).unwrap();
        assert!(cache.exists());
        cache.invalidate().unwrap();
        assert!(!cache.exists());
        cache.invalidate().unwrap();
    }
}
