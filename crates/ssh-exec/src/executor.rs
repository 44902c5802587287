use crate::error::ExecError;
use crate::Result;
use async_trait::async_trait;
use muster_core::inventory::HostRecord;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

// ─── Remote ───────────────────────────────────────────────────────────────

/// A transport that can run one command on one host, or upload one file.
///
/// Stateless from the caller's point of view; both dispatch modes and the
/// connection session consume it. Implementations must enforce the timeout
/// and surface a non-zero remote exit as [`ExecError::RemoteCommandFailed`],
/// not as a transport error.
#[async_trait]
pub trait Remote: Send + Sync {
    /// Run `command` on `host`. Returns the remote stdout with trailing
    /// whitespace trimmed.
    async fn execute(&self, host: &HostRecord, command: &str, timeout: Duration)
        -> Result<String>;

    /// Upload `local` to `remote` on `host`, same identity/timeout contract
    /// as [`Remote::execute`].
    async fn put_file(
        &self,
        host: &HostRecord,
        local: &Path,
        remote: &str,
        timeout: Duration,
    ) -> Result<()>;
}

// ─── SshExecutor ──────────────────────────────────────────────────────────

/// Production [`Remote`] that shells out to `ssh`/`scp`.
///
/// Identity handling: the configured key paths are passed `-i` in order;
/// when none succeeds, ssh falls through to any ambient agent identity on
/// its own. Host keys are accepted on first contact
/// (`StrictHostKeyChecking=accept-new`) — managing known_hosts belongs to
/// the operator, not this tool.
#[derive(Debug, Clone)]
pub struct SshExecutor {
    username: String,
    domain: String,
    key_paths: Vec<PathBuf>,
    ssh_program: String,
    scp_program: String,
}

impl SshExecutor {
    pub fn new(username: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            domain: domain.into(),
            key_paths: Vec::new(),
            ssh_program: "ssh".to_string(),
            scp_program: "scp".to_string(),
        }
    }

    /// Private keys to offer, in order. Missing files should already be
    /// filtered out by the caller (`muster_core::paths::key_paths`).
    pub fn with_keys(mut self, keys: Vec<PathBuf>) -> Self {
        self.key_paths = keys;
        self
    }

    /// Swap the spawned binary. Used in tests to inject a stub that emits
    /// fixed output or exit codes.
    #[cfg(test)]
    pub(crate) fn with_programs(mut self, ssh: &str, scp: &str) -> Self {
        self.ssh_program = ssh.to_string();
        self.scp_program = scp.to_string();
        self
    }

    /// Address and optional port for a host: provider connection metadata
    /// when present, else `id.domain` (or the bare id with no domain).
    fn address(&self, host: &HostRecord) -> (String, Option<String>) {
        let addr = match host.conn("HostName") {
            Some(h) => h.to_string(),
            None if self.domain.is_empty() => host.id.clone(),
            None => format!("{}.{}", host.id, self.domain),
        };
        let port = host.conn("Port").map(str::to_string);
        (addr, port)
    }

    fn login(&self, host: &HostRecord) -> String {
        let user = host.conn("User").unwrap_or(&self.username);
        let (addr, _) = self.address(host);
        format!("{user}@{addr}")
    }

    fn common_args(&self, timeout: Duration) -> Vec<String> {
        let connect_timeout = timeout.as_secs().clamp(1, 30);
        let mut args = vec![
            "-o".to_string(),
            "StrictHostKeyChecking=accept-new".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={connect_timeout}"),
        ];
        for key in &self.key_paths {
            args.push("-i".to_string());
            args.push(key.display().to_string());
        }
        args
    }

    fn ssh_args(&self, host: &HostRecord, command: &str, timeout: Duration) -> Vec<String> {
        let mut args = self.common_args(timeout);
        if let (_, Some(port)) = self.address(host) {
            args.push("-p".to_string());
            args.push(port);
        }
        args.push(self.login(host));
        args.push(command.to_string());
        args
    }

    fn scp_args(
        &self,
        host: &HostRecord,
        local: &Path,
        remote: &str,
        timeout: Duration,
    ) -> Vec<String> {
        let mut args = self.common_args(timeout);
        if let (_, Some(port)) = self.address(host) {
            args.push("-P".to_string());
            args.push(port);
        }
        args.push(local.display().to_string());
        args.push(format!("{}:{}", self.login(host), remote));
        args
    }

    async fn run(
        &self,
        program: &str,
        args: Vec<String>,
        host_id: &str,
        timeout: Duration,
    ) -> Result<std::process::Output> {
        debug!("{program} {}", args.join(" "));
        let child = Command::new(program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ExecError::TransientInvocation(format!("spawn {program}: {e}")))?;

        // On expiry the output future is dropped, which drops the child;
        // kill_on_drop reaps it.
        match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Err(_) => {
                debug!("{program} to {host_id} exceeded {timeout:?}");
                Err(ExecError::Timeout(timeout))
            }
            Ok(Err(e)) => Err(ExecError::TransientInvocation(format!(
                "wait for {program}: {e}"
            ))),
            Ok(Ok(output)) => Ok(output),
        }
    }
}

#[async_trait]
impl Remote for SshExecutor {
    async fn execute(
        &self,
        host: &HostRecord,
        command: &str,
        timeout: Duration,
    ) -> Result<String> {
        let args = self.ssh_args(host, command, timeout);
        let output = self
            .run(&self.ssh_program, args, &host.id, timeout)
            .await?;
        classify(&host.id, output).map(|stdout| stdout.trim_end().to_string())
    }

    async fn put_file(
        &self,
        host: &HostRecord,
        local: &Path,
        remote: &str,
        timeout: Duration,
    ) -> Result<()> {
        let args = self.scp_args(host, local, remote, timeout);
        let output = self
            .run(&self.scp_program, args, &host.id, timeout)
            .await?;
        classify(&host.id, output).map(|_| ())
    }
}

// ─── Exit classification ──────────────────────────────────────────────────

/// Map a finished ssh/scp process onto the error taxonomy.
///
/// Exit 255 is the transport's own failure channel: authentication refusals
/// become `AuthenticationExhausted`, anything else is a transient transport
/// failure. Every other non-zero code came from the remote command itself.
fn classify(host_id: &str, output: std::process::Output) -> Result<String> {
    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

    if output.status.success() {
        return Ok(stdout);
    }

    match output.status.code() {
        Some(255) => {
            if stderr.contains("Permission denied")
                || stderr.contains("No more authentication methods")
            {
                Err(ExecError::AuthenticationExhausted(host_id.to_string()))
            } else {
                Err(ExecError::TransientInvocation(if stderr.is_empty() {
                    format!("connection to {host_id} failed")
                } else {
                    stderr
                }))
            }
        }
        _ => Err(ExecError::RemoteCommandFailed {
            host: host_id.to_string(),
            stderr,
        }),
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────
