use crate::cmd;
use anyhow::{bail, Context};
use muster_core::config::Config;
use muster_core::resolver::HostPlatform;
use muster_core::MusterError;
use ssh_exec::Remote;
use std::path::Path;

pub fn run(
    root: &Path,
    platform: HostPlatform,
    local: &Path,
    remote: &str,
    on: &str,
) -> anyhow::Result<()> {
    if on == "all" {
        bail!("invalid target: cannot upload to 'all', name one member");
    }
    if !local.is_file() {
        bail!("local file not found: {}", local.display());
    }

    let config = Config::load(root).context("failed to load config")?;
    let inventory = cmd::resolve_inventory(root, platform);
    let host = inventory
        .find(on)
        .ok_or_else(|| MusterError::HostNotFound(on.to_string()))?;

    let executor = cmd::executor(root, &config);
    let rt = tokio::runtime::Runtime::new().context("failed to start runtime")?;
    rt.block_on(executor.put_file(host, local, remote, config.timeout()))
        .with_context(|| format!("upload to {} failed", host.id))?;

    println!("uploaded {} to {}:{}", local.display(), host.id, remote);
    Ok(())
}
