mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand, ValueEnum};
use muster_core::resolver::HostPlatform;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "muster",
    about = "Cluster fleet controller — resolve VM inventory and run commands across members",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .muster/ or Vagrantfile)
    #[arg(long, global = true, env = "MUSTER_ROOT")]
    root: Option<PathBuf>,

    /// Host platform override (decides core<N> vs node<N> naming)
    #[arg(long, global = true, value_enum)]
    platform: Option<PlatformArg>,

    /// Output results as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum PlatformArg {
    Osx,
    Linux,
}

impl PlatformArg {
    fn into_platform(self) -> HostPlatform {
        match self {
            PlatformArg::Osx => HostPlatform::MacOs,
            PlatformArg::Linux => HostPlatform::Linux,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a command on every cluster member (parallel by default)
    Run {
        /// The remote command
        command: String,

        /// Execute hosts one at a time, in inventory order
        #[arg(long)]
        serial: bool,

        /// Seconds to wait between hosts (-1 = ask before each next host);
        /// implies --serial
        #[arg(long, allow_negative_numbers = true)]
        wait: Option<f64>,

        /// Per-host timeout in seconds (default from config)
        #[arg(long)]
        timeout: Option<u64>,

        /// Run on a single member instead of the whole cluster
        #[arg(long)]
        on: Option<String>,
    },

    /// Attach an interactive shell to one member (id or 1-based index)
    Ssh { target: String },

    /// Per-host cluster status
    Status,

    /// Write the provisioning hosts inventory file
    Hosts,

    /// Invalidate the cached inventory (next command re-resolves)
    Refresh,

    /// Upload a file to one member
    Put {
        local: PathBuf,
        remote: String,

        /// Target member (id or 1-based index)
        #[arg(long)]
        on: String,
    },

    /// Bring the cluster up (provider passthrough)
    Up,

    /// Halt the cluster
    Halt,

    /// Reload the cluster
    Reload,

    /// Destroy the cluster
    Destroy,
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_target(false)
        .init();

    let root = root::resolve_root(cli.root.as_deref());
    let platform = cli
        .platform
        .map(PlatformArg::into_platform)
        .unwrap_or_else(HostPlatform::detect);

    let result = match cli.command {
        Commands::Run {
            command,
            serial,
            wait,
            timeout,
            on,
        } => cmd::run::run(
            &root,
            platform,
            &command,
            serial,
            wait,
            timeout,
            on.as_deref(),
            cli.json,
        ),
        Commands::Ssh { target } => cmd::ssh::run(&root, platform, &target),
        Commands::Status => cmd::status::run(&root, platform, cli.json),
        Commands::Hosts => cmd::hosts::run(&root, platform),
        Commands::Refresh => cmd::refresh::run(&root),
        Commands::Put { local, remote, on } => cmd::put::run(&root, platform, &local, &remote, &on),
        Commands::Up => cmd::provider::run(&root, cmd::provider::ProviderAction::Up),
        Commands::Halt => cmd::provider::run(&root, cmd::provider::ProviderAction::Halt),
        Commands::Reload => cmd::provider::run(&root, cmd::provider::ProviderAction::Reload),
        Commands::Destroy => cmd::provider::run(&root, cmd::provider::ProviderAction::Destroy),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
