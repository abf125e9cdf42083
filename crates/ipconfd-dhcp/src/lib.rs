//! ipconfd DHCP adapter
//!
//! This crate does not speak the DHCP wire protocol. It drives an external
//! client (busybox `udhcpc` by default) in foreground, single-attempt mode and
//! turns whatever the client reported into a typed [`DhcpLease`].
//!
//! # How a request works
//!
//! ```text
//! ┌──────────────┐   -s helper.sh   ┌──────────────┐
//! │  DhcpClient  │ ───────────────▶ │   udhcpc     │
//! └──────────────┘                  └──────────────┘
//!        ▲                                 │ helper.sh dumps its
//!        │  stdout                         │ environment between
//!        └─────────────────────────────────┘ "[" and "]" lines
//!
//!  last "[ ... ]" block → key='value' pairs → whitelist → DhcpLease
//! ```
//!
//! Anything that goes wrong (spawn failure, non-zero exit, no block in the
//! output) yields an empty lease whose [`DhcpOutcome`] is `Failed`. Callers
//! treat that the same way as an explicit failure reported by the client.
//!
//! # Example
//!
//! ```ignore
//! use ipconfd_dhcp::{DhcpClient, DhcpClientConfig, DhcpRequester};
//!
//! let client = DhcpClient::new(DhcpClientConfig::default());
//! client.install_script().await?;
//!
//! let lease = client.request("eth0", "ipconfd-device").await;
//! if lease.outcome().is_success() {
//!     println!("bound to {:?}/{:?}", lease.ip, lease.mask);
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod lease;

pub use client::*;
pub use config::*;
pub use error::*;
pub use lease::*;
