use crate::error::Result;
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::Path;

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Project configuration, read from `.muster/config.yaml`.
///
/// A missing file yields the defaults: read-only commands must work in a
/// directory that has never been initialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Remote login user on cluster members.
    #[serde(default = "default_username")]
    pub username: String,

    /// DNS zone appended to host ids to form addresses. Empty disables
    /// zone-based addressing (hosts are reached by bare id).
    #[serde(default = "default_domain")]
    pub domain: String,

    /// Group name used for the role-tagged section of the hosts file.
    #[serde(default = "default_role_group")]
    pub role_group: String,

    /// Worker-pool ceiling for parallel dispatch.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,

    /// Per-host remote command timeout in seconds.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_username() -> String {
    "core".to_string()
}

fn default_domain() -> String {
    "a8.nl".to_string()
}

fn default_role_group() -> String {
    "coreos".to_string()
}

fn default_pool_size() -> usize {
    8
}

fn default_timeout_seconds() -> u64 {
    60
}

impl Default for Config {
    fn default() -> Self {
        Self {
            username: default_username(),
            domain: default_domain(),
            role_group: default_role_group(),
            pool_size: default_pool_size(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

impl Config {
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    /// Address of a host with no provider connection metadata: `id.domain`,
    /// or the bare id when no domain is configured.
    pub fn host_fqdn(&self, id: &str) -> String {
        if self.domain.is_empty() {
            id.to_string()
        } else {
            format!("{}.{}", id, self.domain)
        }
    }

    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_seconds)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.username, "core");
        assert_eq!(cfg.domain, "a8.nl");
        assert_eq!(cfg.role_group, "coreos");
        assert_eq!(cfg.pool_size, 8);
        assert_eq!(cfg.timeout_seconds, 60);
    }

    #[test]
    fn load_missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let cfg = Config::load(dir.path()).unwrap();
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn save_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let cfg = Config {
            username: "admin".into(),
            domain: "cluster.local".into(),
            role_group: "flatcar".into(),
            pool_size: 4,
            timeout_seconds: 30,
        };
        cfg.save(dir.path()).unwrap();
        let loaded = Config::load(dir.path()).unwrap();
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".muster")).unwrap();
        std::fs::write(dir.path().join(".muster/config.yaml"), "username: ops\n").unwrap();
        let cfg = Config::load(dir.path()).unwrap();
        assert_eq!(cfg.username, "ops");
        assert_eq!(cfg.pool_size, 8);
        assert_eq!(cfg.domain, "a8.nl");
    }

    #[test]
    fn host_fqdn_with_and_without_domain() {
        let mut cfg = Config::default();
        assert_eq!(cfg.host_fqdn("node1"), "node1.a8.nl");
        cfg.domain = String::new();
        assert_eq!(cfg.host_fqdn("node1"), "node1");
    }
}
