//! ipconfd addressing agent
//!
//! Keeps one network interface addressed. At startup the agent restores a
//! persisted static address, falls back to a built-in one, or asks DHCP.
//! When DHCP fails it derives a stable 169.254.0.0/16 address from the
//! hardware address and keeps retrying DHCP in the background.
//!
//! # Architecture
//!
//! ```text
//!   multicast packets ─┐
//!   lease / retry  ────┼──▶ mailbox ──▶ Agent ──▶ ConfigMachine
//!   snapshot queries ──┘                              │
//!                          ┌────────────┬─────────────┼──────────────┐
//!                          ▼            ▼             ▼              ▼
//!                    DhcpRequester  Configurator  ConfigStore    Scheduler
//! ```
//!
//! Every collaborator is a trait object, so the machine runs against mocks in
//! tests and against `udhcpc`, `ip(8)`, ReDB and tokio timers in production.
//!
//! # Example
//!
//! ```ignore
//! use ipconfd_agent::{Agent, AgentConfig, IpCommandConfigurator, read_hardware_address};
//! use ipconfd_dhcp::DhcpClient;
//!
//! let config = AgentConfig::load("/etc/ipconfd.yaml".as_ref())?;
//! let mac = read_hardware_address(&config.interface)?;
//! let (agent, handle) = Agent::build(
//!     &config,
//!     mac,
//!     Arc::new(DhcpClient::new(config.dhcp.client_config())),
//!     Arc::new(IpCommandConfigurator::new()),
//!     None,
//! );
//! tokio::spawn(agent.run(shutdown_rx));
//! ```

pub mod agent;
pub mod config;
pub mod configurator;
pub mod error;
pub mod hwaddr;
pub mod link_local;
pub mod machine;
pub mod protocol;
pub mod retry;
pub mod state;
pub mod store;
pub mod timer;

pub use agent::{mailbox, Agent, AgentHandle, AgentMessage};
pub use config::{AgentConfig, DhcpSettings, PresenceConfig};
pub use configurator::{ConfigureError, InterfaceConfigurator, IpCommandConfigurator};
pub use error::{AgentError, Result};
pub use hwaddr::{parse_hardware_address, read_hardware_address};
pub use link_local::{link_local_address, LINK_LOCAL_PREFIX};
pub use machine::{ChangeCallback, ConfigMachine, Dispatch};
pub use protocol::{DevicePresence, InboundRequest, Presence, ProtocolRoutes, Route};
pub use retry::RetryPolicy;
pub use state::{AddressConfig, Attribute, AttributeChanges, InterfaceState, PublicAttributes, Status};
pub use store::{create_store, ConfigStore, MemoryStore, RedbStore, StoreConfig, StoreError};
pub use timer::{Scheduler, TimerEvent, TimerHandle, TimerKind, Timers, TokioScheduler};
