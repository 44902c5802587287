pub mod hosts;
pub mod provider;
pub mod put;
pub mod refresh;
pub mod run;
pub mod ssh;
pub mod status;

use muster_core::config::Config;
use muster_core::provider::VagrantStatusSource;
use muster_core::resolver::{self, HostPlatform};
use muster_core::{paths, Inventory};
use ssh_exec::SshExecutor;
use std::path::Path;

/// Resolve cluster membership for a project: cache, declared count, or a
/// live provider query. Empty means "no cluster yet".
pub(crate) fn resolve_inventory(root: &Path, platform: HostPlatform) -> Inventory {
    let source = VagrantStatusSource::new(root);
    resolver::resolve(root, platform, &source)
}

pub(crate) fn executor(root: &Path, config: &Config) -> SshExecutor {
    SshExecutor::new(&config.username, &config.domain).with_keys(paths::key_paths(root))
}

pub(crate) const NO_MEMBERS_NOTICE: &str =
    "no cluster members resolved (create the cluster first, or 'muster refresh' after changes)";
