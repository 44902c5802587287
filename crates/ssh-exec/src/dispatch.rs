use crate::error::ErrorKind;
use crate::executor::Remote;
use muster_core::inventory::Inventory;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::warn;

// ─── Request / result types ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Serial,
    Parallel,
}

/// Delay policy between successive hosts in serial dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pacing {
    None,
    /// Ask the operator whether to continue before each next host.
    InteractiveWait,
    FixedDelay(Duration),
}

/// One logical command applied to a set of targets.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub command: String,
    pub targets: Inventory,
    pub mode: Mode,
    pub timeout: Duration,
    pub pacing: Pacing,
}

/// Per-host outcome. Failures are data, never exceptions: a bad host must
/// not abort its siblings.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    pub host_id: String,
    /// Remote stdout, trailing whitespace trimmed. Always the full text —
    /// display-level deduplication never touches this.
    pub output: String,
    pub succeeded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ExecFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecFailure {
    pub kind: ErrorKind,
    pub message: String,
}

impl ExecutionResult {
    pub fn from_outcome(host_id: &str, outcome: crate::Result<String>) -> Self {
        match outcome {
            Ok(output) => Self {
                host_id: host_id.to_string(),
                output,
                succeeded: true,
                error: None,
            },
            Err(e) => Self {
                host_id: host_id.to_string(),
                output: String::new(),
                succeeded: false,
                error: Some(ExecFailure {
                    kind: e.kind(),
                    message: e.to_string(),
                }),
            },
        }
    }
}

// ─── Progress / pacing seams ──────────────────────────────────────────────

/// Receives each result as soon as it is produced, so serial dispatch shows
/// partial progress and parallel dispatch streams completions.
pub trait ProgressSink: Send {
    fn on_result(&mut self, result: &ExecutionResult);
}

/// Sink that discards progress; callers that only want the returned Vec.
pub struct NullSink;

impl ProgressSink for NullSink {
    fn on_result(&mut self, _result: &ExecutionResult) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaceDecision {
    Continue,
    Abort,
}

/// Operator confirmation between serial hosts (`InteractiveWait` pacing).
pub trait PacingPrompt: Send {
    fn continue_after(&mut self, host_id: &str) -> PaceDecision;
}

/// Prompt that always continues; used whenever pacing is not interactive.
pub struct AutoContinue;

impl PacingPrompt for AutoContinue {
    fn continue_after(&mut self, _host_id: &str) -> PaceDecision {
        PaceDecision::Continue
    }
}

/// Interpret an operator's answer. Recognized abort tokens are `n` and `q`;
/// anything else (including an empty line) continues. Plain string
/// comparison only — operator input is never evaluated.
pub fn parse_decision(input: &str) -> PaceDecision {
    match input.trim().to_ascii_lowercase().as_str() {
        "n" | "q" => PaceDecision::Abort,
        _ => PaceDecision::Continue,
    }
}

// ─── Display dedup ────────────────────────────────────────────────────────

pub const DEDUP_PLACEHOLDER: &str = "same";

/// Render-time suppression of repeated identical host output.
///
/// Tracks the most recently rendered non-empty output; a result textually
/// identical to it renders as [`DEDUP_PLACEHOLDER`]. Display-layer only:
/// the `ExecutionResult` set returned to the caller always carries full
/// output.
#[derive(Debug, Default)]
pub struct OutputDedup {
    last: String,
}

impl OutputDedup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render<'a>(&mut self, output: &'a str) -> &'a str {
        if output.is_empty() {
            return output;
        }
        if output == self.last {
            DEDUP_PLACEHOLDER
        } else {
            self.last = output.to_string();
            output
        }
    }
}

// ─── DispatchEngine ───────────────────────────────────────────────────────

pub const DEFAULT_POOL_SIZE: usize = 8;

const POOL_GRACE: Duration = Duration::from_secs(5);

/// Applies one [`ExecutionRequest`] across its targets.
///
/// Serial mode walks the inventory in order, reporting each result
/// immediately and applying pacing between hosts; an operator abort stops
/// the remaining queue without marking the skipped hosts failed. Parallel
/// mode runs one task per host under a fixed-ceiling semaphore and returns
/// results in completion order. Either way, every attempted host yields
/// exactly one result.
pub struct DispatchEngine<R> {
    executor: Arc<R>,
    pool_size: usize,
    pool_grace: Duration,
    cancel: Option<watch::Receiver<bool>>,
}

impl<R: Remote + 'static> DispatchEngine<R> {
    pub fn new(executor: Arc<R>) -> Self {
        Self {
            executor,
            pool_size: DEFAULT_POOL_SIZE,
            pool_grace: POOL_GRACE,
            cancel: None,
        }
    }

    pub fn with_pool_size(mut self, size: usize) -> Self {
        self.pool_size = size.max(1);
        self
    }

    /// Extra wall-clock allowance past the per-host timeouts before a
    /// parallel dispatch gives up on stragglers.
    pub fn with_pool_grace(mut self, grace: Duration) -> Self {
        self.pool_grace = grace;
        self
    }

    /// Local-interrupt signal: when the watched value turns `true`,
    /// in-flight work is abandoned and only completed results are
    /// returned. Results are never fabricated for unstarted hosts.
    pub fn with_cancel(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = cancel.into();
        self
    }

    pub async fn dispatch(
        &self,
        request: &ExecutionRequest,
        sink: &mut dyn ProgressSink,
        prompt: &mut dyn PacingPrompt,
    ) -> Vec<ExecutionResult> {
        // Nothing to do is a valid outcome, not a failure.
        if request.targets.is_empty() {
            return Vec::new();
        }
        match request.mode {
            Mode::Serial => self.dispatch_serial(request, sink, prompt).await,
            Mode::Parallel => self.dispatch_parallel(request, sink).await,
        }
    }

    async fn dispatch_serial(
        &self,
        request: &ExecutionRequest,
        sink: &mut dyn ProgressSink,
        prompt: &mut dyn PacingPrompt,
    ) -> Vec<ExecutionResult> {
        let mut cancel = self.cancel.clone();
        let mut results = Vec::new();
        let total = request.targets.len();

        for (idx, host) in request.targets.iter().enumerate() {
            if is_cancelled(&cancel) {
                break;
            }

            let outcome = tokio::select! {
                biased;
                _ = cancelled(&mut cancel) => None,
                res = self.executor.execute(host, &request.command, request.timeout) => Some(res),
            };
            let Some(outcome) = outcome else {
                // Interrupted mid-host: the aborted host is not reported.
                break;
            };

            let result = ExecutionResult::from_outcome(&host.id, outcome);
            sink.on_result(&result);
            results.push(result);

            if idx + 1 == total {
                break;
            }
            match request.pacing {
                Pacing::None => {}
                Pacing::FixedDelay(delay) => tokio::time::sleep(delay).await,
                Pacing::InteractiveWait => {
                    if prompt.continue_after(&host.id) == PaceDecision::Abort {
                        break;
                    }
                }
            }
        }

        results
    }

    async fn dispatch_parallel(
        &self,
        request: &ExecutionRequest,
        sink: &mut dyn ProgressSink,
    ) -> Vec<ExecutionResult> {
        let semaphore = Arc::new(Semaphore::new(self.pool_size));
        let mut set: JoinSet<ExecutionResult> = JoinSet::new();

        for host in request.targets.iter().cloned() {
            let semaphore = Arc::clone(&semaphore);
            let executor = Arc::clone(&self.executor);
            let command = request.command.clone();
            let timeout = request.timeout;
            set.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return ExecutionResult::from_outcome(
                            &host.id,
                            Err(crate::ExecError::TransientInvocation(
                                "worker pool closed".into(),
                            )),
                        )
                    }
                };
                let outcome = executor.execute(&host, &command, timeout).await;
                ExecutionResult::from_outcome(&host.id, outcome)
            });
        }

        // The executor enforces the per-host timeout; the pool-wide
        // deadline only guards against a transport that fails to.
        let deadline = tokio::time::sleep(self.pool_deadline(request));
        tokio::pin!(deadline);

        let mut cancel = self.cancel.clone();
        let mut results = Vec::with_capacity(request.targets.len());
        loop {
            tokio::select! {
                biased;
                _ = cancelled(&mut cancel) => {
                    set.abort_all();
                    break;
                }
                _ = &mut deadline => {
                    warn!("parallel dispatch exceeded its deadline; abandoning in-flight hosts");
                    set.abort_all();
                    break;
                }
                joined = set.join_next() => match joined {
                    None => break,
                    Some(Ok(result)) => {
                        sink.on_result(&result);
                        results.push(result);
                    }
                    Some(Err(e)) => {
                        if !e.is_cancelled() {
                            warn!("dispatch task failed to join: {e}");
                        }
                    }
                },
            }
        }

        results
    }

    fn pool_deadline(&self, request: &ExecutionRequest) -> Duration {
        let waves = request.targets.len().div_ceil(self.pool_size).max(1) as u32;
        request.timeout * waves + self.pool_grace
    }
}

// ─── Cancel plumbing ──────────────────────────────────────────────────────

fn is_cancelled(cancel: &Option<watch::Receiver<bool>>) -> bool {
    cancel.as_ref().map(|rx| *rx.borrow()).unwrap_or(false)
}

/// Resolves when the cancel signal fires; pends forever without one.
async fn cancelled(cancel: &mut Option<watch::Receiver<bool>>) {
    match cancel {
        None => futures::future::pending().await,
        Some(rx) => {
            loop {
                if *rx.borrow() {
                    return;
                }
                if rx.changed().await.is_err() {
                    // Sender gone; no cancellation can arrive any more.
                    futures::future::pending::<()>().await;
                }
            }
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────
