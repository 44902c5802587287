use crate::cmd;
use crate::output::print_json;
use anyhow::Context;
use muster_core::config::Config;
use muster_core::resolver::HostPlatform;
use muster_core::Inventory;
use ssh_exec::{
    parse_decision, DispatchEngine, ExecutionRequest, ExecutionResult, Mode, OutputDedup,
    PaceDecision, Pacing, PacingPrompt, ProgressSink,
};
use std::io::Write as _;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

#[allow(clippy::too_many_arguments)]
pub fn run(
    root: &Path,
    platform: HostPlatform,
    command: &str,
    serial: bool,
    wait: Option<f64>,
    timeout: Option<u64>,
    on: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;

    let inventory = cmd::resolve_inventory(root, platform);
    let targets = select_targets(inventory, on)?;
    if targets.is_empty() {
        println!("{}", cmd::NO_MEMBERS_NOTICE);
        return Ok(());
    }

    let pacing = match wait {
        None => Pacing::None,
        Some(w) if w < 0.0 => Pacing::InteractiveWait,
        Some(w) => Pacing::FixedDelay(Duration::from_secs_f64(w)),
    };
    let mode = if serial || wait.is_some() {
        Mode::Serial
    } else {
        Mode::Parallel
    };

    let request = ExecutionRequest {
        command: command.to_string(),
        targets,
        mode,
        timeout: timeout.map(Duration::from_secs).unwrap_or(config.timeout()),
        pacing,
    };

    let rt = tokio::runtime::Runtime::new().context("failed to start runtime")?;
    let results = rt.block_on(dispatch(root, &config, &request, json));

    if json {
        print_json(&results)?;
    } else {
        let failed = results.iter().filter(|r| !r.succeeded).count();
        if failed > 0 {
            eprintln!("{failed} of {} host(s) failed", results.len());
        }
    }
    Ok(())
}

fn select_targets(inventory: Inventory, on: Option<&str>) -> anyhow::Result<Inventory> {
    match on {
        None => Ok(inventory),
        Some("all") => Ok(inventory),
        Some(target) => {
            let host = inventory
                .find(target)
                .cloned()
                .ok_or_else(|| muster_core::MusterError::HostNotFound(target.to_string()))?;
            Ok(Inventory::new(vec![host]))
        }
    }
}

async fn dispatch(
    root: &Path,
    config: &Config,
    request: &ExecutionRequest,
    json: bool,
) -> Vec<ExecutionResult> {
    // Ctrl-C flips the cancel signal: in-flight hosts are abandoned and
    // only completed results are reported.
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = tx.send(true);
        }
    });

    let executor = Arc::new(cmd::executor(root, config));
    let engine = DispatchEngine::new(executor)
        .with_pool_size(config.pool_size)
        .with_cancel(rx);

    let mut sink = ConsoleSink {
        dedup: OutputDedup::new(),
        quiet: json,
    };
    engine.dispatch(request, &mut sink, &mut ConsolePrompt).await
}

// ---------------------------------------------------------------------------
// Console progress / pacing
// ---------------------------------------------------------------------------

/// Streams per-host results as they complete, suppressing repeated
/// identical output at render time only.
struct ConsoleSink {
    dedup: OutputDedup,
    quiet: bool,
}

impl ProgressSink for ConsoleSink {
    fn on_result(&mut self, result: &ExecutionResult) {
        if self.quiet {
            return;
        }
        if result.succeeded {
            if result.output.is_empty() {
                println!("{} ... done", result.host_id);
            } else {
                println!("== {} ==", result.host_id);
                println!("{}", self.dedup.render(&result.output));
            }
        } else if let Some(failure) = &result.error {
            eprintln!("== {} == failed: {}", result.host_id, failure.message);
        }
    }
}

struct ConsolePrompt;

impl PacingPrompt for ConsolePrompt {
    fn continue_after(&mut self, _host_id: &str) -> PaceDecision {
        eprint!("continue (y/n): ");
        let _ = std::io::stderr().flush();
        let mut line = String::new();
        match std::io::stdin().read_line(&mut line) {
            Ok(0) | Err(_) => PaceDecision::Abort,
            Ok(_) => parse_decision(&line),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use muster_core::HostRecord;

    fn inv(ids: &[&str]) -> Inventory {
        Inventory::new(ids.iter().map(|i| HostRecord::new(*i)).collect())
    }

    #[test]
    fn select_targets_whole_cluster_by_default() {
        let targets = select_targets(inv(&["node1", "node2"]), None).unwrap();
        assert_eq!(targets.len(), 2);
    }

    #[test]
    fn select_targets_single_host() {
        let targets = select_targets(inv(&["node1", "node2"]), Some("node2")).unwrap();
        assert_eq!(targets.ids(), vec!["node2"]);
    }

    #[test]
    fn select_targets_by_index() {
        let targets = select_targets(inv(&["node1", "node2"]), Some("1")).unwrap();
        assert_eq!(targets.ids(), vec!["node1"]);
    }

    #[test]
    fn select_targets_unknown_host_fails() {
        assert!(select_targets(inv(&["node1"]), Some("node9")).is_err());
    }
}
