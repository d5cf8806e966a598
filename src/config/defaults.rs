//! Default configuration values
//!
//! Single source of truth for defaults, shared by serde and the CLI.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use super::types::ClientCertMode;

/// Environment variable prefix for all configuration options
pub const ENV_PREFIX: &str = "DUAL_MODE_TRANSPORT_";

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

/// Default listen address as string
pub const LISTEN_STR: &str = "0.0.0.0:9300";

/// Default target address as string
pub const TARGET_STR: &str = "127.0.0.1:9400";

/// Default certificate path as string
pub const CERT_PATH_STR: &str = "certs/node.crt";

/// Default private key path as string
pub const KEY_PATH_STR: &str = "certs/node.key";

/// Default CA certificate path as string
pub const CA_CERT_PATH_STR: &str = "certs/ca.crt";

/// Default log level as string
pub const LOG_LEVEL_STR: &str = "info";

/// Default listen address
pub fn listen() -> SocketAddr {
    SocketAddr::from_str(LISTEN_STR)
        .expect("Default listen address should be valid")
}

/// Default target address
pub fn target() -> SocketAddr {
    SocketAddr::from_str(TARGET_STR)
        .expect("Default target address should be valid")
}

/// Default certificate path
pub fn cert_path() -> PathBuf {
    PathBuf::from(CERT_PATH_STR)
}

/// Default private key path
pub fn key_path() -> PathBuf {
    PathBuf::from(KEY_PATH_STR)
}

/// Default CA certificate path
pub fn ca_cert_path() -> PathBuf {
    PathBuf::from(CA_CERT_PATH_STR)
}

/// Default log level
pub fn log_level() -> String {
    LOG_LEVEL_STR.to_string()
}

/// Default client certificate mode
///
/// Internal transport is mutually authenticated.
pub fn client_cert_mode() -> ClientCertMode {
    ClientCertMode::Required
}

/// Default buffer size (8KB)
pub fn buffer_size() -> usize {
    8192
}

/// Default connection timeout in seconds
pub fn connection_timeout() -> u64 {
    30
}

/// Default time a new connection has to send its first record header
pub fn classification_timeout_ms() -> u64 {
    10_000
}

/// Default connect + handshake budget for the client-side TLS probe
pub fn probe_timeout_ms() -> u64 {
    5_000
}

/// Dual mode is off unless explicitly enabled
pub fn dual_mode_enabled() -> bool {
    false
}

/// Hostname verification is enforced by default
pub fn enforce_hostname_verification() -> bool {
    true
}

/// Verify against the DNS host name rather than the literal host string
pub fn resolve_hostname() -> bool {
    true
}
