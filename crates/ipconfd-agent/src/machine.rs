//! Addressing state machine
//!
//! ```text
//!            ┌── persisted / built-in static ──────────────▶ Static
//!   Init ────┤                                               ▲   │ DELETE
//!            └──▶ Requesting ──bound/renew──▶ Bound/Renew    │   ▼
//!                    │  ▲                        │ PUT ──────┘ Requesting
//!                    │  └──── lease expiry ──────┘
//!                    └─failed──▶ Ip4ll ──retry timer──▶ DHCP attempt
//! ```
//!
//! [`ConfigMachine`] is only ever driven from one task (see
//! [`crate::agent::Agent`]), so it takes `&mut self` everywhere and holds no
//! locks. Collaborator failures are logged and never change the transition
//! taken.

use crate::config::AgentConfig;
use crate::configurator::InterfaceConfigurator;
use crate::link_local::{link_local_address, LINK_LOCAL_PREFIX};
use crate::protocol::{parse_request, route, InboundRequest, Presence, ProtocolRoutes, Route};
use crate::retry::RetryPolicy;
use crate::state::{AddressConfig, AttributeChanges, InterfaceState, PublicAttributes, Status};
use crate::store::ConfigStore;
use crate::timer::{Scheduler, TimerEvent, TimerKind, Timers};
use ipconfd_dhcp::{parse_prefix, DhcpLease, DhcpOutcome, DhcpRequester};
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Observer of public attribute changes
///
/// Called inline with the transition, so it must return promptly.
pub type ChangeCallback = Arc<dyn Fn(&AttributeChanges) + Send + Sync>;

/// What became of an inbound packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Aimed at another device, or not a request at all
    NotForUs,
    /// Aimed at this device, but no route matches
    Unrouted,
    /// Recognized, intentionally not acted on
    Unsupported,
    /// Static request with missing or invalid parameters
    Rejected,
    /// Static request matching the current address
    Unchanged,
    Applied,
}

pub struct ConfigMachine {
    state: InterfaceState,
    hardware_address: Vec<u8>,
    static_config: Option<AddressConfig>,
    routes: ProtocolRoutes,
    retry: RetryPolicy,
    timers: Timers,
    /// The interface accepted the current link-local address
    link_local_applied: bool,
    dhcp: Arc<dyn DhcpRequester>,
    configurator: Arc<dyn InterfaceConfigurator>,
    store: Option<Arc<dyn ConfigStore>>,
    presence: Arc<dyn Presence>,
    on_change: Option<ChangeCallback>,
}

impl ConfigMachine {
    pub fn new(
        config: &AgentConfig,
        hardware_address: Vec<u8>,
        dhcp: Arc<dyn DhcpRequester>,
        configurator: Arc<dyn InterfaceConfigurator>,
        scheduler: Arc<dyn Scheduler>,
    ) -> Self {
        Self {
            state: InterfaceState::new(&config.interface, &config.hostname, &config.kind),
            hardware_address,
            static_config: config.static_config.clone(),
            routes: config.routes.clone(),
            retry: config.retry,
            timers: Timers::new(scheduler),
            link_local_applied: false,
            dhcp,
            configurator,
            store: None,
            presence: Arc::new(config.device_presence()),
            on_change: None,
        }
    }

    pub fn with_store(mut self, store: Option<Arc<dyn ConfigStore>>) -> Self {
        self.store = store;
        self
    }

    pub fn with_presence(mut self, presence: Arc<dyn Presence>) -> Self {
        self.presence = presence;
        self
    }

    pub fn with_on_change<F>(mut self, on_change: F) -> Self
    where
        F: Fn(&AttributeChanges) + Send + Sync + 'static,
    {
        self.on_change = Some(Arc::new(on_change));
        self
    }

    pub fn state(&self) -> &InterfaceState {
        &self.state
    }

    pub fn snapshot(&self) -> PublicAttributes {
        self.state.public()
    }

    pub fn timers(&self) -> &Timers {
        &self.timers
    }

    /// Pick the initial strategy: persisted static, built-in static, DHCP
    pub async fn start(&mut self) {
        info!(
            interface = %self.state.interface,
            hostname = %self.state.hostname,
            "Starting address configuration"
        );

        if let Some(saved) = self.load_persisted().await {
            info!(address = %saved, "Restoring persisted static configuration");
            self.become_static(&saved);
            self.configure().await;
            return;
        }

        if let Some(built_in) = self.static_config.clone() {
            info!(address = %built_in, "Applying built-in static configuration");
            self.become_static(&built_in);
            self.configure().await;
            return;
        }

        self.acquire().await;
    }

    pub async fn handle_timer(&mut self, event: TimerEvent) {
        if !self.timers.fire(event) {
            debug!(?event, "Ignoring superseded timer");
            return;
        }

        match event.kind {
            TimerKind::LeaseExpiry => {
                if self.state.status() == Status::Static {
                    debug!("Lease expiry ignored while static");
                    return;
                }
                info!(interface = %self.state.interface, "DHCP lease expired");
                self.acquire().await;
            }
            TimerKind::Retry => {
                info!(
                    interface = %self.state.interface,
                    dhcp_retries = self.state.dhcp_retries,
                    "Retrying DHCP"
                );
                self.attempt_dhcp().await;
            }
        }
    }

    /// Act on an inbound control packet
    pub async fn handle_packet(&mut self, packet: &str) -> Dispatch {
        let base_uri = self.presence.base_uri();
        let request = match parse_request(packet, &base_uri) {
            Some(request) => request,
            None => return Dispatch::NotForUs,
        };
        debug!(verb = %request.verb, path = %request.path, "Request for this device");

        match route(&request, &self.routes) {
            Route::SetStatic => match static_from_request(&request) {
                Ok(address) => {
                    if self.set_static(address).await {
                        Dispatch::Applied
                    } else {
                        Dispatch::Unchanged
                    }
                }
                Err(reason) => {
                    warn!(reason, "Rejected static configuration request");
                    Dispatch::Rejected
                }
            },
            Route::ClearStatic => {
                info!("Static configuration cleared by request");
                self.clear_static().await;
                Dispatch::Applied
            }
            Route::SetAuto => {
                info!("Automatic addressing request is not supported, ignoring");
                Dispatch::Unsupported
            }
            Route::ClearAuto => {
                info!("Dynamic addressing restarted by request");
                self.restart_dynamic().await;
                Dispatch::Applied
            }
            Route::Unrouted => {
                debug!(verb = %request.verb, path = %request.path, "No route for request");
                Dispatch::Unrouted
            }
        }
    }

    /// Switch to a static address, persisting it when it differs
    ///
    /// Returns false when the interface already carried this address.
    pub async fn set_static(&mut self, address: AddressConfig) -> bool {
        if !self.become_static(&address) {
            debug!(address = %address, "Static address already in place");
            return false;
        }
        info!(address = %address, "Applying static configuration");
        self.configure().await;
        self.persist(&address).await;
        true
    }

    /// Forget the persisted address and go back to DHCP
    pub async fn clear_static(&mut self) {
        if let Some(store) = &self.store {
            if let Err(e) = store.delete().await {
                warn!(error = %e, "Failed to delete persisted configuration");
            }
        }
        self.restart_dynamic().await;
    }

    pub async fn restart_dynamic(&mut self) {
        self.timers.cancel_all();
        self.acquire().await;
    }

    async fn acquire(&mut self) {
        self.transition(|s| s.set_status(Status::Requesting));
        self.attempt_dhcp().await;
    }

    async fn attempt_dhcp(&mut self) {
        let lease = self
            .dhcp
            .request(&self.state.interface, &self.state.hostname)
            .await;

        match lease.outcome() {
            DhcpOutcome::Bound | DhcpOutcome::Renew if lease.address().is_some() => {
                self.enter_leased(lease).await;
            }
            DhcpOutcome::Bound | DhcpOutcome::Renew => {
                warn!(status = ?lease.status, "DHCP succeeded without an address");
                self.enter_link_local().await;
            }
            DhcpOutcome::Failed { status } => {
                info!(status = ?status, "DHCP failed, using link-local address");
                self.enter_link_local().await;
            }
        }
    }

    async fn enter_leased(&mut self, lease: DhcpLease) {
        let status = match lease.outcome() {
            DhcpOutcome::Renew => Status::Renew,
            _ => Status::Bound,
        };

        self.timers.cancel(TimerKind::Retry);
        self.transition(|s| {
            s.apply_lease(&lease);
            s.set_status(status);
        });
        self.configure().await;

        match lease.lease.filter(|secs| *secs > 0) {
            Some(secs) => {
                self.timers
                    .arm(TimerKind::LeaseExpiry, Duration::from_secs(secs));
            }
            None => self.timers.cancel(TimerKind::LeaseExpiry),
        }

        info!(
            interface = %self.state.interface,
            status = %status,
            ip = ?self.state.ip,
            mask = ?self.state.mask,
            lease_secs = ?lease.lease,
            "DHCP lease applied"
        );
    }

    async fn enter_link_local(&mut self) {
        let address = AddressConfig::new(
            link_local_address(&self.hardware_address),
            LINK_LOCAL_PREFIX,
        );
        let already_applied = self.link_local_applied
            && self.state.status() == Status::Ip4ll
            && self.state.address().as_ref() == Some(&address);

        self.timers.cancel(TimerKind::LeaseExpiry);
        let before = self.state.public();
        self.state.apply_address(&address);
        self.state.set_status(Status::Ip4ll);
        let delay = self.retry.arm(&mut self.timers, &mut self.state);
        self.publish(&before);

        if !already_applied {
            self.link_local_applied = self.configure().await;
        }

        info!(
            interface = %self.state.interface,
            address = %address,
            dhcp_retries = self.state.dhcp_retries,
            retry_in = ?delay,
            "Link-local address in use"
        );
    }

    /// Enter Static without touching the interface; true if the address changes
    fn become_static(&mut self, address: &AddressConfig) -> bool {
        let changed = self.state.address().as_ref() != Some(address);
        self.timers.cancel_all();
        self.transition(|s| {
            s.apply_address(address);
            s.set_status(Status::Static);
        });
        changed
    }

    /// Push the current address to the interface; false if that failed
    async fn configure(&self) -> bool {
        let address = match self.state.address() {
            Some(address) => address,
            None => return false,
        };
        match self
            .configurator
            .apply(&self.state.interface, &address)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    interface = %self.state.interface,
                    address = %address,
                    error = %e,
                    "Failed to configure interface"
                );
                false
            }
        }
    }

    async fn load_persisted(&self) -> Option<AddressConfig> {
        let store = self.store.as_ref()?;
        match store.get().await {
            Ok(saved) => saved,
            Err(e) => {
                warn!(error = %e, "Failed to read persisted configuration");
                None
            }
        }
    }

    async fn persist(&self, address: &AddressConfig) {
        let store = match &self.store {
            Some(store) => store,
            None => return,
        };
        match store.put(address).await {
            Ok(()) => debug!(address = %address, "Persisted static configuration"),
            Err(e) => warn!(error = %e, "Failed to persist static configuration"),
        }
    }

    fn transition(&mut self, change: impl FnOnce(&mut InterfaceState)) {
        let before = self.state.public();
        change(&mut self.state);
        self.publish(&before);
    }

    fn publish(&self, before: &PublicAttributes) {
        let changes = before.diff(&self.state.public());
        if changes.is_empty() {
            return;
        }
        debug!(?changes, "Public attributes changed");
        if let Some(on_change) = &self.on_change {
            on_change(&changes);
        }
    }
}

fn static_from_request(request: &InboundRequest) -> Result<AddressConfig, &'static str> {
    let ip = request
        .param("ip")
        .ok_or("missing ip")?
        .parse::<Ipv4Addr>()
        .map_err(|_| "invalid ip")?;
    let mask = parse_prefix(request.param("mask").ok_or("missing mask")?).ok_or("invalid mask")?;
    let router = match request.param("router") {
        None | Some("") => None,
        Some(router) => Some(router.parse::<Ipv4Addr>().map_err(|_| "invalid router")?),
    };
    Ok(AddressConfig::new(ip, mask).with_router(router))
}
