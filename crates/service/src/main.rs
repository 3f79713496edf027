//! Kite power controller daemon (kited)

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use kitepower_orchestrator::KiteConfig;
use kitepower_service::{DaemonOptions, KiteDaemon};
use kitepower_state::SystemComponent;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "kited")]
#[command(about = "Kite power controller daemon")]
#[command(version)]
struct Cli {
    /// YAML configuration file; defaults apply when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Print the effective configuration as YAML and exit
    #[arg(long)]
    print_config: bool,

    /// Make a simulated driver fail to initialize (repeatable)
    #[arg(long, value_name = "COMPONENT", value_parser = parse_component)]
    fail_init: Vec<SystemComponent>,

    /// Make a simulated driver stop heartbeating after boot (repeatable)
    #[arg(long, value_name = "COMPONENT", value_parser = parse_component)]
    stall: Vec<SystemComponent>,
}

fn parse_component(name: &str) -> Result<SystemComponent, String> {
    SystemComponent::from_name(name).ok_or_else(|| {
        let known: Vec<_> = SystemComponent::ALL.iter().map(|c| c.as_str()).collect();
        format!("unknown component '{name}', expected one of {}", known.join(", "))
    })
}

fn log_filter(verbose: u8) -> String {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    format!("kited={level},kitepower={level}")
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter(cli.verbose).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let config = match &cli.config {
        Some(path) => KiteConfig::load(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => KiteConfig::default(),
    };

    if cli.print_config {
        print!("{}", config.to_yaml()?);
        return Ok(ExitCode::SUCCESS);
    }

    info!("Starting kite controller v{}", env!("CARGO_PKG_VERSION"));
    let options = DaemonOptions {
        fail_initialize: cli.fail_init,
        stall: cli.stall,
        ..DaemonOptions::default()
    };
    let daemon = KiteDaemon::start(config, &options)?;
    let exit = daemon.wait_for_exit().await;
    daemon.stop(exit)?;

    info!(code = exit.code(), "Controller stopped");
    Ok(exit.exit_code())
}
