use crate::cmd::listener::{self, DEFAULT_GROUP, DEFAULT_PORT};
use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use ipconfd_agent::{
    create_store, read_hardware_address, Agent, AgentConfig, IpCommandConfigurator, StoreConfig,
};
use ipconfd_dhcp::DhcpClient;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::{info, warn};

/// Manage the interface until stopped
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// YAML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[arg(short, long)]
    pub interface: Option<String>,

    #[arg(long)]
    pub hostname: Option<String>,

    /// ReDB file for the persisted static address
    #[arg(long)]
    pub store: Option<PathBuf>,

    /// DHCP client binary
    #[arg(long)]
    pub dhcp_client: Option<PathBuf>,

    /// Multicast group for control requests
    #[arg(long, default_value_t = DEFAULT_GROUP)]
    pub group: Ipv4Addr,

    /// UDP port for control requests
    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Do not listen for control requests
    #[arg(long, default_value_t = false)]
    pub no_listen: bool,
}

impl RunArgs {
    /// File config with command line overrides applied
    pub fn resolve_config(&self) -> Result<AgentConfig> {
        let mut config = match &self.config {
            Some(path) => AgentConfig::load(path)?,
            None => AgentConfig::default(),
        };
        if let Some(interface) = &self.interface {
            config = config.with_interface(interface.clone());
        }
        if let Some(hostname) = &self.hostname {
            config = config.with_hostname(hostname.clone());
        }
        if let Some(path) = &self.store {
            config = config.with_store(StoreConfig::Redb { path: path.clone() });
        }
        if let Some(client) = &self.dhcp_client {
            config = config.with_dhcp_client(client.clone());
        }
        config.validate()?;
        Ok(config)
    }
}

pub async fn run_agent(args: RunArgs, shutdown: watch::Receiver<bool>) -> Result<()> {
    let config = args.resolve_config()?;
    info!(
        interface = %config.interface,
        hostname = %config.hostname,
        store = ?config.store,
        "Starting ipconfd"
    );

    let hardware_address = read_hardware_address(&config.interface)?;

    let dhcp = DhcpClient::new(config.dhcp.client_config());
    dhcp.install_script()
        .await
        .wrap_err("DHCP helper script is required")?;

    let store = create_store(&config.store, &config.interface)?;
    let (agent, handle) = Agent::build(
        &config,
        hardware_address,
        Arc::new(dhcp),
        Arc::new(IpCommandConfigurator::new()),
        store,
    );

    let mut updates = handle.subscribe();
    tokio::spawn(async move {
        loop {
            match updates.recv().await {
                Ok(changes) => {
                    for (attr, value) in &changes {
                        info!(attribute = %attr, value = ?value, "Attribute changed");
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Change log fell behind");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    if !args.no_listen {
        match listener::bind_multicast(args.group, args.port) {
            Ok(socket) => {
                tokio::spawn(listener::serve(socket, handle.clone(), shutdown.clone()));
            }
            Err(e) => {
                warn!(
                    group = %args.group,
                    port = args.port,
                    error = %e,
                    "Could not join control group, remote requests disabled"
                );
            }
        }
    }

    agent.run(shutdown).await;
    Ok(())
}
