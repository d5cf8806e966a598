//! Network utility functions
//!
//! This module provides utility functions for network operations.

use std::fmt;
use std::net::{IpAddr, SocketAddr, ToSocketAddrs};
use std::str::FromStr;

use super::error::{TransportError, Result};

/// Parse a socket address
///
/// # Arguments
///
/// * `addr` - The address string to parse
///
/// # Returns
///
/// The parsed `SocketAddr`
pub fn parse_socket_addr(addr: &str) -> Result<SocketAddr> {
    // Try direct parsing first
    if let Ok(socket_addr) = SocketAddr::from_str(addr) {
        return Ok(socket_addr);
    }

    // Try using ToSocketAddrs trait
    match addr.to_socket_addrs() {
        Ok(mut addrs) => {
            if let Some(addr) = addrs.next() {
                Ok(addr)
            } else {
                Err(TransportError::Config(format!("Failed to parse address: {}", addr)))
            }
        }
        Err(e) => Err(TransportError::Config(format!("Failed to parse address {}: {}", addr, e))),
    }
}

/// Address of a remote peer
///
/// Keeps the host exactly as it was configured next to the resolved socket
/// address, so hostname verification can use either form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerAddress {
    /// Host string as configured (name or IP literal)
    host: String,
    /// DNS host name, when the peer was configured by name
    host_name: Option<String>,
    /// Resolved socket address
    addr: SocketAddr,
}

impl PeerAddress {
    /// Create a peer address from already-known parts
    pub fn new(host: impl Into<String>, host_name: Option<String>, addr: SocketAddr) -> Self {
        Self {
            host: host.into(),
            host_name,
            addr,
        }
    }

    /// Resolve a `host:port` string
    ///
    /// IP literals are not reverse-resolved; they have no DNS host name.
    pub fn resolve(peer: &str) -> Result<Self> {
        let (host, port) = split_host_port(peer)?;
        let addr = parse_socket_addr(&format_host_port(host, port))?;
        let host_name = match host.parse::<IpAddr>() {
            Ok(_) => None,
            Err(_) => Some(host.to_string()),
        };

        Ok(Self::new(host, host_name, addr))
    }

    /// Literal host string
    pub fn host_string(&self) -> &str {
        &self.host
    }

    /// DNS host name, falling back to the literal host string
    pub fn host_name(&self) -> &str {
        self.host_name.as_deref().unwrap_or(&self.host)
    }

    /// Resolved socket address
    pub fn socket_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Port of the peer
    pub fn port(&self) -> u16 {
        self.addr.port()
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.host, self.addr)
    }
}

impl From<SocketAddr> for PeerAddress {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr.ip().to_string(), None, addr)
    }
}

fn split_host_port(peer: &str) -> Result<(&str, u16)> {
    let (host, port) = peer.rsplit_once(':')
        .ok_or_else(|| TransportError::Config(format!("Peer address '{}' has no port", peer)))?;
    let port = port.parse::<u16>()
        .map_err(|e| TransportError::Config(format!("Invalid port in peer address '{}': {}", peer, e)))?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.is_empty() {
        return Err(TransportError::Config(format!("Peer address '{}' has no host", peer)));
    }
    Ok((host, port))
}

fn format_host_port(host: &str, port: u16) -> String {
    if host.contains(':') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}
