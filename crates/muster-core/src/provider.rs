use crate::error::{MusterError, Result};
use crate::resolver::StatusSource;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::debug;

const PROVIDER_BIN: &str = "vagrant";

// ---------------------------------------------------------------------------
// VagrantStatusSource
// ---------------------------------------------------------------------------

/// Live cluster state via the provider CLI: `vagrant status` for the
/// machine list, `vagrant ssh-config <name>` for per-machine connection
/// parameters.
///
/// Runs synchronously (std::process); resolution happens once per
/// invocation and blocking here is fine.
#[derive(Debug, Clone)]
pub struct VagrantStatusSource {
    root: PathBuf,
}

impl VagrantStatusSource {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }
}

impl StatusSource for VagrantStatusSource {
    fn live_status(&self) -> Result<Vec<(String, BTreeMap<String, String>)>> {
        let bin = which::which(PROVIDER_BIN)
            .map_err(|_| MusterError::ProviderMissing(PROVIDER_BIN.into()))?;

        let output = Command::new(&bin)
            .arg("status")
            .current_dir(&self.root)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| MusterError::ProviderQuery(format!("spawn {PROVIDER_BIN}: {e}")))?;

        if !output.status.success() {
            return Err(MusterError::ProviderQuery(format!(
                "{PROVIDER_BIN} status exited with {}",
                output.status
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut rows = Vec::new();
        for raw in parse_status_block(&stdout) {
            let name = raw.split(' ').next().unwrap_or("").to_string();
            let conn = self.ssh_config(&bin, &name).unwrap_or_default();
            rows.push((raw, conn));
        }
        Ok(rows)
    }
}

impl VagrantStatusSource {
    /// Connection parameters for one machine. A failure here leaves the
    /// record without metadata (the machine may be down) instead of
    /// failing the whole query.
    fn ssh_config(&self, bin: &Path, name: &str) -> Option<BTreeMap<String, String>> {
        let output = Command::new(bin)
            .args(["ssh-config", name])
            .current_dir(&self.root)
            .stdin(Stdio::null())
            .output()
            .ok()?;
        if !output.status.success() {
            debug!("ssh-config for {name} failed; leaving connection metadata empty");
            return None;
        }
        Some(parse_ssh_config(&String::from_utf8_lossy(&output.stdout)))
    }
}

// ---------------------------------------------------------------------------
// Output parsing
// ---------------------------------------------------------------------------

/// Machine lines from `vagrant status`: the indented block between the
/// "Current machine states:" header and the following blank line.
pub fn parse_status_block(stdout: &str) -> Vec<String> {
    let mut lines = stdout.lines();
    for line in lines.by_ref() {
        if line.trim_end().ends_with("machine states:") {
            break;
        }
    }
    let mut rows = Vec::new();
    for line in lines {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            if rows.is_empty() {
                continue;
            }
            break;
        }
        rows.push(trimmed.to_string());
    }
    rows
}

/// `Key Value` pairs from `vagrant ssh-config` output, minus the `Host`
/// header line.
pub fn parse_ssh_config(stdout: &str) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    for line in stdout.lines() {
        let trimmed = line.trim();
        let Some((key, value)) = trimmed.split_once(char::is_whitespace) else {
            continue;
        };
        if key == "Host" {
            continue;
        }
        map.insert(key.to_string(), value.trim().trim_matches('"').to_string());
    }
    map
}

// ---------------------------------------------------------------------------
// Passthrough commands
// ---------------------------------------------------------------------------

/// Run a provider subcommand (`up`, `halt`, `reload`, `destroy -f`) with
/// inherited stdio. The provider's own semantics are not our concern: run
/// it, surface the exit status, nothing more.
pub fn provider_passthrough(root: &Path, args: &[&str]) -> Result<()> {
    let bin = which::which(PROVIDER_BIN)
        .map_err(|_| MusterError::ProviderMissing(PROVIDER_BIN.into()))?;

    let status = Command::new(&bin)
        .args(args)
        .current_dir(root)
        .status()
        .map_err(|e| MusterError::ProviderQuery(format!("spawn {PROVIDER_BIN}: {e}")))?;

    if status.success() {
        Ok(())
    } else {
        Err(MusterError::ProviderExit {
            command: format!("{PROVIDER_BIN} {}", args.join(" ")),
            code: status.code().unwrap_or(-1),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_status_block_extracts_machine_lines() {
        let stdout = "\
Current machine states:

node1                     running (vmware_workstation)
node2                     not created (vmware_workstation)

This environment represents multiple VMs. The VMs are all listed
above with their current state.
";
        let rows = parse_status_block(stdout);
        assert_eq!(rows.len(), 2);
        assert!(rows[0].starts_with("node1 "));
        assert!(rows[1].starts_with("node2 "));
    }

    #[test]
    fn parse_status_block_empty_output() {
        assert!(parse_status_block("").is_empty());
        assert!(parse_status_block("Current machine states:\n\n\n").is_empty());
    }

    #[test]
    fn parse_ssh_config_collects_pairs() {
        let stdout = "\
Host node1
  HostName 192.168.14.51
  User core
  Port 22
  IdentityFile \"/home/op/.vagrant.d/insecure_private_key\"
";
        let map = parse_ssh_config(stdout);
        assert_eq!(map.get("HostName").unwrap(), "192.168.14.51");
        assert_eq!(map.get("User").unwrap(), "core");
        assert_eq!(map.get("Port").unwrap(), "22");
        assert_eq!(
            map.get("IdentityFile").unwrap(),
            "/home/op/.vagrant.d/insecure_private_key"
        );
        assert!(!map.contains_key("Host"));
    }

    #[test]
    fn parse_ssh_config_ignores_malformed_lines() {
        let map = parse_ssh_config("garbage\n  HostName 10.0.0.1\n");
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("HostName").unwrap(), "10.0.0.1");
    }
}
