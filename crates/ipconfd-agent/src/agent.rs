//! Mailbox actor around the state machine
//!
//! Timers, inbound packets and snapshot queries all become
//! [`AgentMessage`]s on one bounded channel and are handled strictly one
//! at a time. A DHCP attempt blocks the loop until the client exits; queued
//! messages wait.

use crate::config::AgentConfig;
use crate::configurator::InterfaceConfigurator;
use crate::error::{AgentError, Result};
use crate::machine::ConfigMachine;
use crate::state::{AttributeChanges, PublicAttributes};
use crate::store::ConfigStore;
use crate::timer::{TimerEvent, TokioScheduler};
use ipconfd_dhcp::DhcpRequester;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{debug, info};

const CHANGE_BUFFER: usize = 32;

pub enum AgentMessage {
    /// A lease or retry timer fired
    Timer(TimerEvent),
    /// Raw inbound control packet
    Packet(String),
    /// Reply with the current public attributes
    Snapshot(oneshot::Sender<PublicAttributes>),
}

/// Cloneable sender side of the agent mailbox
#[derive(Clone)]
pub struct AgentHandle {
    tx: mpsc::Sender<AgentMessage>,
    changes: broadcast::Sender<AttributeChanges>,
}

/// Create a mailbox of the given capacity
pub fn mailbox(capacity: usize) -> (AgentHandle, mpsc::Receiver<AgentMessage>) {
    let (tx, rx) = mpsc::channel(capacity);
    let (changes, _) = broadcast::channel(CHANGE_BUFFER);
    (AgentHandle { tx, changes }, rx)
}

impl AgentHandle {
    pub(crate) fn sender(&self) -> mpsc::Sender<AgentMessage> {
        self.tx.clone()
    }

    /// Queue an inbound packet
    pub async fn deliver_packet(&self, packet: String) -> Result<()> {
        self.tx
            .send(AgentMessage::Packet(packet))
            .await
            .map_err(|_| AgentError::NotRunning)
    }

    /// Current public attributes, after everything queued before this call
    pub async fn snapshot(&self) -> Result<PublicAttributes> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(AgentMessage::Snapshot(reply))
            .await
            .map_err(|_| AgentError::NotRunning)?;
        rx.await.map_err(|_| AgentError::NotRunning)
    }

    /// Stream of public attribute changes
    pub fn subscribe(&self) -> broadcast::Receiver<AttributeChanges> {
        self.changes.subscribe()
    }
}

pub struct Agent {
    machine: ConfigMachine,
    mailbox: mpsc::Receiver<AgentMessage>,
}

impl Agent {
    pub fn new(machine: ConfigMachine, mailbox: mpsc::Receiver<AgentMessage>) -> Self {
        Self { machine, mailbox }
    }

    /// Wire a machine to a fresh mailbox with tokio timers
    ///
    /// Attribute changes are published to [`AgentHandle::subscribe`].
    pub fn build(
        config: &AgentConfig,
        hardware_address: Vec<u8>,
        dhcp: Arc<dyn DhcpRequester>,
        configurator: Arc<dyn InterfaceConfigurator>,
        store: Option<Arc<dyn ConfigStore>>,
    ) -> (Self, AgentHandle) {
        let (handle, rx) = mailbox(config.mailbox_capacity);
        let scheduler = Arc::new(TokioScheduler::new(&handle));
        let changes = handle.changes.clone();

        let machine = ConfigMachine::new(config, hardware_address, dhcp, configurator, scheduler)
            .with_store(store)
            .with_on_change(move |c| {
                // no subscribers is fine
                let _ = changes.send(c.clone());
            });

        (Self::new(machine, rx), handle)
    }

    pub fn machine(&self) -> &ConfigMachine {
        &self.machine
    }

    /// Choose the startup strategy, then serve the mailbox until shutdown
    pub async fn run(mut self, shutdown: watch::Receiver<bool>) {
        let mut shutdown = shutdown;

        self.machine.start().await;
        info!(
            interface = %self.machine.state().interface,
            status = %self.machine.state().status(),
            "Agent running"
        );

        loop {
            tokio::select! {
                msg = self.mailbox.recv() => match msg {
                    Some(msg) => self.handle(msg).await,
                    None => {
                        debug!("Mailbox closed");
                        break;
                    }
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Agent shutting down");
                        break;
                    }
                }
            }
        }
    }

    async fn handle(&mut self, msg: AgentMessage) {
        match msg {
            AgentMessage::Timer(event) => self.machine.handle_timer(event).await,
            AgentMessage::Packet(packet) => {
                let dispatch = self.machine.handle_packet(&packet).await;
                debug!(?dispatch, "Packet handled");
            }
            AgentMessage::Snapshot(reply) => {
                let _ = reply.send(self.machine.snapshot());
            }
        }
    }
}
