//! Multicast control listener
//!
//! Every packet on the group is handed to the agent as text; the agent
//! decides whether it was meant for this device.

use ipconfd_agent::{AgentError, AgentHandle};
use socket2::{Domain, Protocol, Socket, Type};
use std::net::{Ipv4Addr, SocketAddrV4};
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

pub const DEFAULT_GROUP: Ipv4Addr = Ipv4Addr::new(239, 255, 255, 250);
pub const DEFAULT_PORT: u16 = 1900;

/// Largest UDP payload over IPv4
const MAX_DATAGRAM: usize = 65_507;

/// Bind `port` on all interfaces and join `group`
pub fn bind_multicast(group: Ipv4Addr, port: u16) -> std::io::Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    socket.set_reuse_port(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port).into())?;
    socket.join_multicast_v4(&group, &Ipv4Addr::UNSPECIFIED)?;
    UdpSocket::from_std(socket.into())
}

pub async fn serve(socket: UdpSocket, handle: AgentHandle, shutdown: watch::Receiver<bool>) {
    let mut shutdown = shutdown;
    let mut buf = vec![0u8; MAX_DATAGRAM];

    if let Ok(addr) = socket.local_addr() {
        info!(addr = %addr, "Listening for control requests");
    }

    loop {
        tokio::select! {
            result = socket.recv_from(&mut buf) => {
                match result {
                    Ok((len, src)) => {
                        let packet = String::from_utf8_lossy(&buf[..len]).into_owned();
                        debug!(src = %src, len, "Control packet");
                        match handle.deliver_packet(packet).await {
                            Ok(()) => {}
                            Err(AgentError::NotRunning) => {
                                warn!("Agent stopped, closing listener");
                                break;
                            }
                            Err(e) => error!(error = %e, "Failed to deliver packet"),
                        }
                    }
                    Err(e) => {
                        error!(error = %e, "Error receiving packet");
                    }
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    info!("Listener shutting down");
                    break;
                }
            }
        }
    }
}
