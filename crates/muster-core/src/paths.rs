use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const MUSTER_DIR: &str = ".muster";

pub const CONFIG_FILE: &str = ".muster/config.yaml";
pub const INVENTORY_CACHE_FILE: &str = ".muster/inventory.json";

pub const HOSTS_FILE: &str = "hosts";
pub const VAGRANTFILE: &str = "Vagrantfile";

/// Private keys looked up by convention, in authentication order.
/// Paths that do not exist on disk are skipped.
pub const KEY_FILES: &[&str] = &["keys/secure/muster_rsa", "keys/muster_rsa"];

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn muster_dir(root: &Path) -> PathBuf {
    root.join(MUSTER_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn cache_path(root: &Path) -> PathBuf {
    root.join(INVENTORY_CACHE_FILE)
}

pub fn hosts_path(root: &Path) -> PathBuf {
    root.join(HOSTS_FILE)
}

pub fn vagrantfile_path(root: &Path) -> PathBuf {
    root.join(VAGRANTFILE)
}

/// Conventional private-key paths under the project, filtered to those
/// that exist.
pub fn key_paths(root: &Path) -> Vec<PathBuf> {
    KEY_FILES
        .iter()
        .map(|k| root.join(k))
        .filter(|p| p.exists())
        .collect()
}

/// A directory counts as a cluster project if it carries either the
/// provider artifact or our state directory.
pub fn is_project(root: &Path) -> bool {
    vagrantfile_path(root).exists() || muster_dir(root).is_dir()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn path_helpers() {
        let root = Path::new("/tmp/proj");
        assert_eq!(
            config_path(root),
            PathBuf::from("/tmp/proj/.muster/config.yaml")
        );
        assert_eq!(
            cache_path(root),
            PathBuf::from("/tmp/proj/.muster/inventory.json")
        );
        assert_eq!(hosts_path(root), PathBuf::from("/tmp/proj/hosts"));
    }

    #[test]
    fn key_paths_filters_missing() {
        let dir = TempDir::new().unwrap();
        assert!(key_paths(dir.path()).is_empty());

        std::fs::create_dir_all(dir.path().join("keys/secure")).unwrap();
        std::fs::write(dir.path().join("keys/secure/muster_rsa"), "k").unwrap();
        let keys = key_paths(dir.path());
        assert_eq!(keys, vec![dir.path().join("keys/secure/muster_rsa")]);
    }

    #[test]
    fn key_paths_preserves_order() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("keys/secure")).unwrap();
        std::fs::write(dir.path().join("keys/secure/muster_rsa"), "a").unwrap();
        std::fs::write(dir.path().join("keys/muster_rsa"), "b").unwrap();
        let keys = key_paths(dir.path());
        assert_eq!(keys.len(), 2);
        assert!(keys[0].ends_with("keys/secure/muster_rsa"));
        assert!(keys[1].ends_with("keys/muster_rsa"));
    }

    #[test]
    fn is_project_detects_markers() {
        let dir = TempDir::new().unwrap();
        assert!(!is_project(dir.path()));

        std::fs::write(dir.path().join("Vagrantfile"), "").unwrap();
        assert!(is_project(dir.path()));

        let dir2 = TempDir::new().unwrap();
        std::fs::create_dir_all(dir2.path().join(".muster")).unwrap();
        assert!(is_project(dir2.path()));
    }
}
