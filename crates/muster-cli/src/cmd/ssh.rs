use crate::cmd;
use anyhow::Context;
use muster_core::config::Config;
use muster_core::resolver::HostPlatform;
use muster_core::{paths, HostRecord};
use ssh_exec::{ConnectionSession, SshAttachTransport, TargetMenu};
use std::io::Write as _;
use std::path::Path;

pub fn run(root: &Path, platform: HostPlatform, target: &str) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let inventory = cmd::resolve_inventory(root, platform);

    let mut transport = SshAttachTransport {
        username: config.username.clone(),
        domain: config.domain.clone(),
        key_paths: paths::key_paths(root),
    };
    let mut menu = ConsoleMenu;

    ConnectionSession::new(&inventory)
        .run(target, &mut transport, &mut menu)
        .map_err(anyhow::Error::from)
}

/// Numbered selection menu on the operator's terminal. Accepts a number or
/// a host id; an empty line backs out.
struct ConsoleMenu;

impl TargetMenu for ConsoleMenu {
    fn choose(&mut self, hosts: &[HostRecord]) -> Option<String> {
        if hosts.is_empty() {
            return None;
        }
        eprintln!("available members:");
        for (idx, host) in hosts.iter().enumerate() {
            eprintln!("  {}) {}", idx + 1, host.id);
        }
        eprint!("enter number: ");
        let _ = std::io::stderr().flush();

        let mut line = String::new();
        match std::io::stdin().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => {
                let choice = line.trim();
                if choice.is_empty() {
                    None
                } else {
                    Some(choice.to_string())
                }
            }
        }
    }
}
