use crate::cache::InventoryCache;
use crate::error::Result;
use crate::inventory::{HostRecord, Inventory};
use crate::paths;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;
use tracing::warn;

// ---------------------------------------------------------------------------
// HostPlatform
// ---------------------------------------------------------------------------

/// Host platform of the machine running the VMs. Decides the naming prefix
/// used when host names are synthesized from a declared instance count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostPlatform {
    MacOs,
    Linux,
}

impl HostPlatform {
    pub fn detect() -> Self {
        if std::env::consts::OS == "macos" {
            Self::MacOs
        } else {
            Self::Linux
        }
    }

    pub fn host_prefix(self) -> &'static str {
        match self {
            Self::MacOs => "core",
            Self::Linux => "node",
        }
    }
}

// ---------------------------------------------------------------------------
// StatusSource
// ---------------------------------------------------------------------------

/// Live cluster-provider query, injected so resolution is pure given its
/// inputs. Each entry is a raw machine name as reported by the provider
/// (the resolver takes the token before the first space) plus whatever
/// connection parameters the provider knows.
pub trait StatusSource {
    fn live_status(&self) -> Result<Vec<(String, BTreeMap<String, String>)>>;
}

// ---------------------------------------------------------------------------
// resolve
// ---------------------------------------------------------------------------

const MAX_QUERY_RETRIES: u32 = 1;

/// Resolve the cluster membership for a project directory.
///
/// Never fails hard: an empty inventory is a legitimate "no cluster yet"
/// state, so irrecoverable errors degrade to empty with a warning.
///
/// Fallback order, first success wins:
/// 1. the inventory cache, returned unconditionally when present;
/// 2. a declared instance count parsed from the provider artifact,
///    synthesizing `core<N>`/`node<N>` records with no connection metadata;
/// 3. a live provider query, retried once on transient failure.
///
/// A non-empty result from steps 2–3 is persisted to the cache.
pub fn resolve(root: &Path, platform: HostPlatform, source: &dyn StatusSource) -> Inventory {
    let cache = InventoryCache::for_project(root);
    if let Some(inv) = cache.load() {
        return inv;
    }

    let inventory = match declared_instance_count(root) {
        Some(count) => synthesize(count, platform),
        None => query_live(source),
    };

    if !inventory.is_empty() {
        if let Err(e) = cache.store(&inventory) {
            warn!("failed to persist inventory cache: {e}");
        }
    }

    inventory
}

fn synthesize(count: u32, platform: HostPlatform) -> Inventory {
    let prefix = platform.host_prefix();
    Inventory::new(
        (1..=count)
            .map(|i| HostRecord::new(format!("{prefix}{i}")))
            .collect(),
    )
}

/// Bounded retry loop around the live query: transient invocation failures
/// are retried exactly once, then degrade to an empty inventory.
fn query_live(source: &dyn StatusSource) -> Inventory {
    for attempt in 0..=MAX_QUERY_RETRIES {
        match source.live_status() {
            Ok(rows) => {
                let hosts = rows
                    .into_iter()
                    .filter_map(|(raw, conn)| {
                        let id = raw.split(' ').next().unwrap_or("").trim().to_string();
                        if id.is_empty() {
                            None
                        } else {
                            Some(HostRecord::with_connection(id, conn))
                        }
                    })
                    .collect();
                return Inventory::new(hosts);
            }
            Err(e) if attempt < MAX_QUERY_RETRIES => {
                warn!("provider query failed ({e}); retrying once");
            }
            Err(e) => {
                warn!("provider query failed after retry ({e}); treating as no cluster");
            }
        }
    }
    Inventory::empty()
}

// ---------------------------------------------------------------------------
// Declared instance count
// ---------------------------------------------------------------------------

static NUM_INSTANCES_RE: OnceLock<Regex> = OnceLock::new();

fn num_instances_re() -> &'static Regex {
    NUM_INSTANCES_RE.get_or_init(|| Regex::new(r"\$num_instances\s*=\s*(\d+)").unwrap())
}

/// Instance count declared in the provider artifact, when the project
/// carries one. The artifact itself belongs to the templating layer; we
/// only read the one assignment.
pub fn declared_instance_count(root: &Path) -> Option<u32> {
    let data = std::fs::read_to_string(paths::vagrantfile_path(root)).ok()?;
    num_instances_re()
        .captures(&data)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MusterError;
    use std::cell::RefCell;
    use tempfile::TempDir;

    /// Scripted status source: pops one outcome per call.
    struct Scripted {
        outcomes: RefCell<Vec<Result<Vec<(String, BTreeMap<String, String>)>>>>,
        calls: RefCell<u32>,
    }

    impl Scripted {
        fn new(outcomes: Vec<Result<Vec<(String, BTreeMap<String, String>)>>>) -> Self {
            Self {
                outcomes: RefCell::new(outcomes),
                calls: RefCell::new(0),
            }
        }

        fn calls(&self) -> u32 {
            *self.calls.borrow()
        }
    }

    impl StatusSource for Scripted {
        fn live_status(&self) -> Result<Vec<(String, BTreeMap<String, String>)>> {
            *self.calls.borrow_mut() += 1;
            self.outcomes.borrow_mut().remove(0)
        }
    }

    fn transient() -> MusterError {
        MusterError::ProviderQuery("spawn failed".into())
    }

    fn row(name: &str) -> (String, BTreeMap<String, String>) {
        let mut conn = BTreeMap::new();
        conn.insert("HostName".to_string(), format!("10.0.0.{}", name.len()));
        (format!("{name} running (vmware)"), conn)
    }

    fn write_vagrantfile(dir: &TempDir, count: u32) {
        std::fs::write(
            dir.path().join("Vagrantfile"),
            format!("# cluster\n$num_instances = {count}\n$vm_memory = 1024\n"),
        )
        .unwrap();
    }

    #[test]
    fn cache_wins_over_everything() {
        let dir = TempDir::new().unwrap();
        write_vagrantfile(&dir, 4);
        let cached = Inventory::new(vec![HostRecord::new("node9")]);
        InventoryCache::for_project(dir.path()).store(&cached).unwrap();

        let src = Scripted::new(vec![]);
        let inv = resolve(dir.path(), HostPlatform::Linux, &src);
        assert_eq!(inv, cached);
        assert_eq!(src.calls(), 0);
    }

    #[test]
    fn declared_count_synthesizes_node_names() {
        let dir = TempDir::new().unwrap();
        write_vagrantfile(&dir, 4);

        let src = Scripted::new(vec![]);
        let inv = resolve(dir.path(), HostPlatform::Linux, &src);
        assert_eq!(inv.ids(), vec!["node1", "node2", "node3", "node4"]);
        assert!(inv.iter().all(|h| h.connection.is_none()));
        assert_eq!(src.calls(), 0);
    }

    #[test]
    fn declared_count_uses_core_prefix_on_macos() {
        let dir = TempDir::new().unwrap();
        write_vagrantfile(&dir, 2);

        let src = Scripted::new(vec![]);
        let inv = resolve(dir.path(), HostPlatform::MacOs, &src);
        assert_eq!(inv.ids(), vec!["core1", "core2"]);
    }

    #[test]
    fn synthesized_inventory_is_cached() {
        let dir = TempDir::new().unwrap();
        write_vagrantfile(&dir, 2);
        resolve(dir.path(), HostPlatform::Linux, &Scripted::new(vec![]));
        assert!(InventoryCache::for_project(dir.path()).exists());
    }

    #[test]
    fn live_query_parses_name_token_and_attaches_connection() {
        let dir = TempDir::new().unwrap();
        let src = Scripted::new(vec![Ok(vec![row("node1"), row("node2")])]);
        let inv = resolve(dir.path(), HostPlatform::Linux, &src);
        assert_eq!(inv.ids(), vec!["node1", "node2"]);
        assert!(inv.get("node1").unwrap().conn("HostName").is_some());
    }

    #[test]
    fn transient_failure_retried_exactly_once() {
        let dir = TempDir::new().unwrap();
        let src = Scripted::new(vec![Err(transient()), Ok(vec![row("node1")])]);
        let inv = resolve(dir.path(), HostPlatform::Linux, &src);
        assert_eq!(inv.ids(), vec!["node1"]);
        assert_eq!(src.calls(), 2);
    }

    #[test]
    fn second_failure_degrades_to_empty() {
        let dir = TempDir::new().unwrap();
        let src = Scripted::new(vec![Err(transient()), Err(transient())]);
        let inv = resolve(dir.path(), HostPlatform::Linux, &src);
        assert!(inv.is_empty());
        assert_eq!(src.calls(), 2);
        assert!(!InventoryCache::for_project(dir.path()).exists());
    }

    #[test]
    fn empty_live_result_is_not_cached() {
        let dir = TempDir::new().unwrap();
        let src = Scripted::new(vec![Ok(vec![])]);
        let inv = resolve(dir.path(), HostPlatform::Linux, &src);
        assert!(inv.is_empty());
        assert!(!InventoryCache::for_project(dir.path()).exists());
    }

    #[test]
    fn resolving_twice_with_cache_is_byte_identical() {
        let dir = TempDir::new().unwrap();
        write_vagrantfile(&dir, 3);
        let first = resolve(dir.path(), HostPlatform::Linux, &Scripted::new(vec![]));
        let cache_bytes_1 =
            std::fs::read(InventoryCache::for_project(dir.path()).path()).unwrap();
        let second = resolve(dir.path(), HostPlatform::Linux, &Scripted::new(vec![]));
        let cache_bytes_2 =
            std::fs::read(InventoryCache::for_project(dir.path()).path()).unwrap();
        assert_eq!(first, second);
        assert_eq!(cache_bytes_1, cache_bytes_2);
    }

    #[test]
    fn declared_instance_count_parses_assignment() {
        let dir = TempDir::new().unwrap();
        write_vagrantfile(&dir, 12);
        assert_eq!(declared_instance_count(dir.path()), Some(12));
    }

    #[test]
    fn declared_instance_count_absent_without_artifact() {
        let dir = TempDir::new().unwrap();
        assert_eq!(declared_instance_count(dir.path()), None);
    }
}
