use crate::config::Config;
use crate::error::Result;
use crate::inventory::Inventory;
use crate::paths;
use std::net::ToSocketAddrs;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Hosts inventory file
// ---------------------------------------------------------------------------

/// Write the line-oriented group file consumed by the external
/// provisioning collaborator. Returns the path written.
pub fn write_hosts_file(root: &Path, inventory: &Inventory, config: &Config) -> Result<PathBuf> {
    let path = paths::hosts_path(root);
    let rendered = render_hosts_file(inventory, config);
    crate::io::atomic_write(&path, rendered.as_bytes())?;
    Ok(path)
}

/// Render the group file:
/// - one `<id> ansible_ssh_host=<addr> ansible_ssh_port=22` line per host;
/// - `[masters]` (first host), `[etcd]` (second host), `[nodes]` (all but
///   first), `[all]`;
/// - `[all_groups:children]` tying the role groups together;
/// - a role-tagged section mirroring `all`, with fixed connection vars.
pub fn render_hosts_file(inventory: &Inventory, config: &Config) -> String {
    let mut out = String::new();

    for host in inventory {
        let addr = host_address(host.id.as_str(), host.conn("HostName"), config);
        out.push_str(&format!(
            "{} ansible_ssh_host={} ansible_ssh_port=22\n",
            host.id, addr
        ));
    }

    out.push_str("\n[masters]\n");
    if let Some(primary) = inventory.primary() {
        out.push_str(&primary.id);
        out.push('\n');
    }

    out.push_str("\n[etcd]\n");
    if let Some(secondary) = inventory.secondary() {
        out.push_str(&secondary.id);
        out.push('\n');
    }

    out.push_str("\n[nodes]\n");
    for host in inventory.workers() {
        out.push_str(&host.id);
        out.push('\n');
    }

    out.push_str("\n[all]\n");
    for host in inventory {
        out.push_str(&host.id);
        out.push('\n');
    }

    out.push_str("\n[all_groups:children]\nmasters\netcd\nnodes\n");

    out.push_str(&format!("\n[{}]\n", config.role_group));
    for host in inventory {
        out.push_str(&host.id);
        out.push('\n');
    }

    out.push_str(&format!("\n[{}:vars]\n", config.role_group));
    out.push_str(&format!("ansible_ssh_user={}\n", config.username));
    out.push_str(&format!(
        "ansible_python_interpreter=\"PATH=/home/{}/bin:$PATH python\"\n",
        config.username
    ));

    out
}

/// Address for one host: provider-reported `HostName` when present,
/// otherwise the DNS-resolved fqdn, falling back to the fqdn itself.
fn host_address(id: &str, reported: Option<&str>, config: &Config) -> String {
    if let Some(hostname) = reported {
        return hostname.to_string();
    }
    let fqdn = config.host_fqdn(id);
    if config.domain.is_empty() {
        return fqdn;
    }
    let resolved = (fqdn.as_str(), 22).to_socket_addrs();
    match resolved {
        Ok(mut addrs) => addrs.next().map(|a| a.ip().to_string()).unwrap_or(fqdn),
        Err(_) => fqdn,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
