use clap::Parser;
use color_eyre::eyre::Result;
use ipconfd_agent::AgentConfig;
use ipconfd_dhcp::DhcpClient;
use std::path::PathBuf;
use tracing::info;

/// One-shot DHCP attempt, printing what the client reported
#[derive(Parser, Debug)]
pub struct DhcpArgs {
    /// YAML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[arg(short, long)]
    pub interface: Option<String>,

    #[arg(long)]
    pub hostname: Option<String>,

    /// DHCP client binary
    #[arg(long)]
    pub dhcp_client: Option<PathBuf>,
}

pub async fn run_dhcp(args: DhcpArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => AgentConfig::load(path)?,
        None => AgentConfig::default(),
    };
    if let Some(interface) = args.interface {
        config = config.with_interface(interface);
    }
    if let Some(hostname) = args.hostname {
        config = config.with_hostname(hostname);
    }
    if let Some(client) = args.dhcp_client {
        config = config.with_dhcp_client(client);
    }
    config.validate()?;

    let client = DhcpClient::new(config.dhcp.client_config());
    client.install_script().await?;

    info!(interface = %config.interface, "Requesting lease");
    let lease = client.try_request(&config.interface, &config.hostname).await?;

    println!("outcome: {:?}", lease.outcome());
    let show = |name: &str, value: Option<String>| {
        if let Some(value) = value {
            println!("{}: {}", name, value);
        }
    };
    let list = |addrs: &[std::net::Ipv4Addr]| {
        (!addrs.is_empty()).then(|| {
            addrs
                .iter()
                .map(|a| a.to_string())
                .collect::<Vec<_>>()
                .join(" ")
        })
    };
    show("ip", lease.ip.map(|v| v.to_string()));
    show("mask", lease.mask.map(|v| v.to_string()));
    show("subnet", lease.subnet.map(|v| v.to_string()));
    show("router", lease.router.map(|v| v.to_string()));
    show("dns", list(&lease.dns));
    show("domain", lease.domain.clone());
    show("lease", lease.lease.map(|v| v.to_string()));
    show("broadcast", lease.broadcast.map(|v| v.to_string()));
    show("timezone", lease.timezone.clone());
    show("ntp_servers", list(&lease.ntp_servers));
    show("server_id", lease.server_id.map(|v| v.to_string()));
    Ok(())
}
