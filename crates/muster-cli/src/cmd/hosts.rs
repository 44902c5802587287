use crate::cmd;
use anyhow::{bail, Context};
use muster_core::config::Config;
use muster_core::hostsfile;
use muster_core::resolver::HostPlatform;
use std::path::Path;

pub fn run(root: &Path, platform: HostPlatform) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;

    let inventory = cmd::resolve_inventory(root, platform);
    if inventory.is_empty() {
        bail!("no cluster members resolved; nothing to write");
    }

    let path = hostsfile::write_hosts_file(root, &inventory, &config)
        .context("failed to write hosts file")?;
    println!("wrote {} ({} hosts)", path.display(), inventory.len());
    Ok(())
}
