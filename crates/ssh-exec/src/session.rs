use crate::error::ExecError;
use crate::Result;
use muster_core::inventory::{HostRecord, Inventory};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

/// Interactive attachment to every host at once is not a meaningful
/// operation; the wildcard fails fast without touching the transport.
const WILDCARD: &str = "all";

const RECONNECT_PAUSE: Duration = Duration::from_secs(1);

// ─── States and seams ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    SelectingTarget,
    Connecting,
    /// The operator's terminal is bridged to the remote shell. Entered and
    /// left inside [`AttachTransport::attach`], which blocks for the whole
    /// phase and reports how the bridge ended.
    Attached,
    Disconnected,
    Done,
}

/// How an attached bridge ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachOutcome {
    /// Remote shell exited normally.
    Clean,
    /// Network drop or abnormal remote close; the session reconnects.
    Dropped,
    /// Local operator interrupt; the session ends.
    Interrupted,
}

/// Bridges the operator's terminal to one host. Authentication order is the
/// implementation's concern: discovered project keys first, then any
/// ambient agent identity.
pub trait AttachTransport {
    fn attach(&mut self, host: &HostRecord) -> Result<AttachOutcome>;
}

/// Numbered-menu fallback when the requested target resolves to nothing.
/// Returns the chosen host id, or `None` when the operator backs out.
pub trait TargetMenu {
    fn choose(&mut self, hosts: &[HostRecord]) -> Option<String>;
}

// ─── ConnectionSession ────────────────────────────────────────────────────

/// Attach-to-one-host workflow with reconnect-on-drop.
///
/// `SelectingTarget → Connecting → Attached → (Disconnected → Connecting |
/// Done)`. The target is selected once; reconnects never re-select.
pub struct ConnectionSession<'a> {
    inventory: &'a Inventory,
    reconnect_pause: Duration,
}

impl<'a> ConnectionSession<'a> {
    pub fn new(inventory: &'a Inventory) -> Self {
        Self {
            inventory,
            reconnect_pause: RECONNECT_PAUSE,
        }
    }

    pub fn with_reconnect_pause(mut self, pause: Duration) -> Self {
        self.reconnect_pause = pause;
        self
    }

    pub fn run(
        &self,
        target: &str,
        transport: &mut dyn AttachTransport,
        menu: &mut dyn TargetMenu,
    ) -> Result<()> {
        let mut state = SessionState::SelectingTarget;
        let mut host: Option<&HostRecord> = None;

        loop {
            state = match state {
                SessionState::SelectingTarget => {
                    host = Some(self.select_target(target, menu)?);
                    SessionState::Connecting
                }
                SessionState::Connecting | SessionState::Attached => match host {
                    Some(h) => {
                        debug!("attaching to {}", h.id);
                        match transport.attach(h)? {
                            AttachOutcome::Dropped => SessionState::Disconnected,
                            AttachOutcome::Clean | AttachOutcome::Interrupted => {
                                SessionState::Done
                            }
                        }
                    }
                    None => SessionState::Done,
                },
                SessionState::Disconnected => {
                    info!(
                        "connection lost, retrying in {:?} (interrupt to quit)",
                        self.reconnect_pause
                    );
                    std::thread::sleep(self.reconnect_pause);
                    SessionState::Connecting
                }
                SessionState::Done => return Ok(()),
            };
        }
    }

    /// Resolve the operator's target spec: host id, 1-based index, or the
    /// rejected wildcard. An unknown spec gets one menu fallback; an
    /// unresolvable choice after that is fatal.
    fn select_target(&self, target: &str, menu: &mut dyn TargetMenu) -> Result<&'a HostRecord> {
        if target == WILDCARD {
            return Err(ExecError::InvalidTarget(
                "interactive attach to 'all' is not possible".into(),
            ));
        }
        if let Some(host) = self.inventory.find(target) {
            return Ok(host);
        }

        info!("server '{target}' not found, presenting selection menu");
        let choice = menu
            .choose(self.inventory.hosts())
            .ok_or_else(|| ExecError::InvalidTarget(target.to_string()))?;
        if choice == WILDCARD {
            return Err(ExecError::InvalidTarget(
                "interactive attach to 'all' is not possible".into(),
            ));
        }
        self.inventory
            .find(&choice)
            .ok_or(ExecError::InvalidTarget(choice))
    }
}

// ─── SshAttachTransport ───────────────────────────────────────────────────

/// Production transport: interactive `ssh` with inherited stdio.
pub struct SshAttachTransport {
    pub username: String,
    pub domain: String,
    pub key_paths: Vec<PathBuf>,
}

impl AttachTransport for SshAttachTransport {
    fn attach(&mut self, host: &HostRecord) -> Result<AttachOutcome> {
        let addr = match host.conn("HostName") {
            Some(h) => h.to_string(),
            None if self.domain.is_empty() => host.id.clone(),
            None => format!("{}.{}", host.id, self.domain),
        };
        let user = host.conn("User").unwrap_or(&self.username);

        let mut cmd = std::process::Command::new("ssh");
        cmd.arg("-o").arg("StrictHostKeyChecking=accept-new");
        for key in &self.key_paths {
            cmd.arg("-i").arg(key);
        }
        if let Some(port) = host.conn("Port") {
            cmd.arg("-p").arg(port);
        }
        cmd.arg(format!("{user}@{addr}"));

        let status = cmd
            .status()
            .map_err(|e| ExecError::TransientInvocation(format!("spawn ssh: {e}")))?;

        if status.success() {
            Ok(AttachOutcome::Clean)
        } else if interrupted_locally(&status) {
            Ok(AttachOutcome::Interrupted)
        } else {
            Ok(AttachOutcome::Dropped)
        }
    }
}

/// Exit-by-SIGINT: the operator interrupted the bridge locally.
fn interrupted_locally(status: &std::process::ExitStatus) -> bool {
    if status.code() == Some(130) {
        return true;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if status.signal() == Some(2) {
            return true;
        }
    }
    false
}

// ─── Tests ────────────────────────────────────────────────────────────────
