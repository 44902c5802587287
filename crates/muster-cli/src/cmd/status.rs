use crate::cmd;
use crate::output::print_json;
use anyhow::Context;
use muster_core::config::Config;
use muster_core::resolver::HostPlatform;
use ssh_exec::{
    AutoContinue, DispatchEngine, ExecutionRequest, ExecutionResult, Mode, Pacing, ProgressSink,
};
use std::path::Path;
use std::sync::Arc;

/// Remote probe whose output identifies the running OS release.
const PROBE_COMMAND: &str = "cat /etc/os-release | grep VERSION_ID";

pub fn run(root: &Path, platform: HostPlatform, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;

    let inventory = cmd::resolve_inventory(root, platform);
    if inventory.is_empty() {
        println!("{}", cmd::NO_MEMBERS_NOTICE);
        return Ok(());
    }

    let addresses: Vec<(String, String)> = inventory
        .iter()
        .map(|h| {
            let addr = h
                .conn("HostName")
                .map(str::to_string)
                .unwrap_or_else(|| config.host_fqdn(&h.id));
            (h.id.clone(), addr)
        })
        .collect();

    let request = ExecutionRequest {
        command: PROBE_COMMAND.to_string(),
        targets: inventory,
        mode: Mode::Serial,
        timeout: config.timeout(),
        pacing: Pacing::None,
    };

    let rt = tokio::runtime::Runtime::new().context("failed to start runtime")?;
    let results = rt.block_on(async {
        let executor = Arc::new(cmd::executor(root, &config));
        let engine = DispatchEngine::new(executor).with_pool_size(config.pool_size);
        let mut sink = StatusSink {
            addresses: &addresses,
            quiet: json,
        };
        engine
            .dispatch(&request, &mut sink, &mut AutoContinue)
            .await
    });

    if json {
        print_json(&results)?;
    }
    Ok(())
}

struct StatusSink<'a> {
    addresses: &'a [(String, String)],
    quiet: bool,
}

impl ProgressSink for StatusSink<'_> {
    fn on_result(&mut self, result: &ExecutionResult) {
        if self.quiet {
            return;
        }
        let addr = self
            .addresses
            .iter()
            .find(|(id, _)| *id == result.host_id)
            .map(|(_, a)| a.as_str())
            .unwrap_or("-");
        if result.succeeded {
            println!("{}  {}  up  {}", result.host_id, addr, result.output.trim());
        } else {
            println!("{}  {}  down", result.host_id, addr);
        }
    }
}
