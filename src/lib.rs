//! Dual-mode transport: TLS and plaintext on a single port
//!
//! Lets cluster nodes move from plaintext to TLS internal transport one node
//! at a time. The inbound side inspects the first bytes of every connection
//! and installs TLS only when the peer starts a TLS handshake. The outbound
//! side probes each peer before connecting and falls back to plaintext only
//! when the peer clearly does not speak TLS.
//!
//! # Main Features
//!
//! - Port unification on the first five bytes of a connection
//! - Opportunistic client TLS with a fail-open probe
//! - Process-wide SSL dual mode flag, fixed at startup
//! - Mutual TLS with the node certificate in both directions
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use dual_mode_transport::config::{dual_mode, NodeConfig};
//! use dual_mode_transport::tls::OpensslEngineFactory;
//! use dual_mode_transport::transport::{ConnectionSettings, DualModeTransport, TransportServer};
//! use dual_mode_transport::Result;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = NodeConfig::default();
//!     let flag = dual_mode::initialize(true);
//!     let factory = Arc::new(OpensslEngineFactory::from_config(&config)?);
//!     let hook = Arc::new(DualModeTransport::from_config(&config, flag, factory)?);
//!
//!     let server = TransportServer::bind(config.listen, hook, ConnectionSettings::from_config(&config)).await?;
//!     server.run().await
//! }
//! ```

pub mod admin;
pub mod common;
pub mod config;
pub mod protocol;
pub mod tls;
pub mod transport;

pub use common::{parse_socket_addr, PeerAddress, Result, TransportError};
pub use config::{DualModeConfig, NodeConfig};
pub use transport::{DualModeTransport, OpportunisticConnector, TransportServer};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
