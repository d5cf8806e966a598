//! Configuration types
//!
//! This module contains the main configuration types used throughout the application.

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use log::info;
use serde::{Deserialize, Deserializer, Serialize};

use crate::common::parse_socket_addr;
use crate::config::defaults;
use crate::config::error::ConfigError;

/// Client certificate verification mode
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ClientCertMode {
    /// Require client certificate, connection fails if not provided
    Required,
    /// Verify the client certificate if provided but don't require it
    Optional,
    /// Don't verify client certificates
    None,
}

impl Default for ClientCertMode {
    fn default() -> Self {
        defaults::client_cert_mode()
    }
}

// Case-insensitive deserialization
impl<'de> Deserialize<'de> for ClientCertMode {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        ClientCertMode::from_str(&s).map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for ClientCertMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Required => write!(f, "required"),
            Self::Optional => write!(f, "optional"),
            Self::None => write!(f, "none"),
        }
    }
}

impl FromStr for ClientCertMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "required" => Ok(Self::Required),
            "optional" => Ok(Self::Optional),
            "none" => Ok(Self::None),
            _ => Err(ConfigError::InvalidValue(
                "client_cert_mode".to_string(),
                format!("Invalid client certificate mode: {}. Valid values are: required, optional, none", s)
            )),
        }
    }
}

/// Custom deserializer for socket addresses
fn deserialize_socket_addr<'de, D>(deserializer: D) -> std::result::Result<SocketAddr, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_socket_addr(&s).map_err(serde::de::Error::custom)
}

fn deserialize_opt_socket_addr<'de, D>(deserializer: D) -> std::result::Result<Option<SocketAddr>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(s) => parse_socket_addr(&s).map(Some).map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}

/// A local plaintext listener whose connections are carried to a remote peer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct OutboundRoute {
    /// Local listen address
    #[serde(deserialize_with = "deserialize_socket_addr")]
    pub listen: SocketAddr,

    /// Remote peer as `host:port`; the host form matters for hostname verification
    pub peer: String,
}

/// Node transport configuration
///
/// Loaded once at startup: defaults, then the JSON file, then environment
/// variables, then command-line arguments.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
#[serde(default)]
pub struct NodeConfig {
    // --- Network settings ---

    /// Transport listen address (serves TLS and, in dual mode, plaintext)
    #[serde(deserialize_with = "deserialize_socket_addr")]
    pub listen: SocketAddr,

    /// Local service that receives inbound application traffic
    #[serde(deserialize_with = "deserialize_socket_addr")]
    pub target: SocketAddr,

    /// Outbound routes to remote peers
    pub outbound: Vec<OutboundRoute>,

    /// Admin API listen address; the admin API is disabled when unset
    #[serde(deserialize_with = "deserialize_opt_socket_addr", skip_serializing_if = "Option::is_none")]
    pub admin_listen: Option<SocketAddr>,

    // --- General settings ---

    /// Log level (error, warn, info, debug, trace)
    pub log_level: String,

    /// Buffer size for data transfer (in bytes)
    pub buffer_size: usize,

    /// Connection timeout in seconds
    pub connection_timeout: u64,

    /// How long an inbound connection may take to send a full record header
    pub classification_timeout_ms: u64,

    /// Connect + handshake budget of the client-side TLS probe
    pub probe_timeout_ms: u64,

    // --- Dual mode settings ---

    /// Serve TLS and plaintext on the same port, probe peers before connecting
    pub dual_mode_enabled: bool,

    /// Verify the peer host name on outbound TLS connections
    pub enforce_hostname_verification: bool,

    /// Verify against the DNS host name instead of the literal host string
    pub resolve_hostname: bool,

    // --- Certificate settings ---

    /// Node certificate (presented on both server and client side)
    pub cert: PathBuf,

    /// Node private key
    pub key: PathBuf,

    /// CA certificate used to verify peers
    pub ca_cert: PathBuf,

    /// Client certificate verification mode for inbound TLS connections
    pub client_cert_mode: ClientCertMode,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            listen: defaults::listen(),
            target: defaults::target(),
            outbound: Vec::new(),
            admin_listen: None,
            log_level: defaults::log_level(),
            buffer_size: defaults::buffer_size(),
            connection_timeout: defaults::connection_timeout(),
            classification_timeout_ms: defaults::classification_timeout_ms(),
            probe_timeout_ms: defaults::probe_timeout_ms(),
            dual_mode_enabled: defaults::dual_mode_enabled(),
            enforce_hostname_verification: defaults::enforce_hostname_verification(),
            resolve_hostname: defaults::resolve_hostname(),
            cert: defaults::cert_path(),
            key: defaults::key_path(),
            ca_cert: defaults::ca_cert_path(),
            client_cert_mode: defaults::client_cert_mode(),
        }
    }
}

impl NodeConfig {
    /// Log the effective configuration
    pub fn log(&self) {
        info!("Listen address: {}", self.listen);
        info!("Target service: {}", self.target);
        info!("SSL dual mode: {}", if self.dual_mode_enabled { "enabled" } else { "disabled" });
        info!("Hostname verification: {} (resolve host name: {})",
              self.enforce_hostname_verification, self.resolve_hostname);
        info!("Certificate: {}, CA: {}", self.cert.display(), self.ca_cert.display());
        info!("Client certificate mode: {}", self.client_cert_mode);
        for route in &self.outbound {
            info!("Outbound route: {} -> {}", route.listen, route.peer);
        }
        if let Some(admin) = self.admin_listen {
            info!("Admin API: {}", admin);
        }
    }
}
