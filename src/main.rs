use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use std::io::stderr;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, registry, EnvFilter};

mod cmd;

use cmd::dhcp::DhcpArgs;
use cmd::link_local::LinkLocalArgs;
use cmd::run::RunArgs;

#[derive(Parser, Debug)]
#[command(author, version, about = "Single-interface IPv4 address manager", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Verbose output - shows more detailed logs
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage the interface (default action)
    Run(RunArgs),
    /// Run one DHCP attempt and print the lease
    Dhcp(DhcpArgs),
    /// Print the link-local address derived from a hardware address
    LinkLocal(LinkLocalArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    let default_directives = format!(
        "ipconfd={level},ipconfd_agent={level},ipconfd_dhcp={level}",
        level = level
    );
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));
    registry()
        .with(filter)
        .with(fmt::layer().with_writer(stderr))
        .init();

    match cli.command {
        Some(Commands::LinkLocal(args)) => cmd::link_local::run_link_local(args)?,
        Some(Commands::Dhcp(args)) => cmd::dhcp::run_dhcp(args).await?,
        Some(Commands::Run(args)) => run_until_signal(args).await?,
        None => run_until_signal(RunArgs::parse_from(["ipconfd-run"])).await?,
    }

    Ok(())
}

async fn run_until_signal(args: RunArgs) -> Result<()> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        wait_for_signal().await;
        info!("Shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    if let Err(e) = cmd::run::run_agent(args, shutdown_rx).await {
        error!("Agent failed: {:#}", e);
        return Err(e);
    }
    Ok(())
}

async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
