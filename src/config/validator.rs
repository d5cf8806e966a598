//! Configuration validator
//!
//! This module provides functionality for validating configuration.

use std::collections::HashSet;
use std::path::Path;

use log::warn;

use crate::common::PeerAddress;
use crate::config::error::{ConfigError, Result};
use crate::config::types::NodeConfig;

/// Validate the configuration
pub fn validate_config(config: &NodeConfig) -> Result<()> {
    validate_network_settings(config)?;
    validate_certificate_settings(config)?;
    validate_general_settings(config)?;
    Ok(())
}

/// Validate network settings
fn validate_network_settings(config: &NodeConfig) -> Result<()> {
    if config.listen == config.target {
        return Err(ConfigError::InvalidCombination(
            "Listen and target addresses must be different".to_string()
        ));
    }

    let mut seen = HashSet::new();
    seen.insert(config.listen);
    if let Some(admin) = config.admin_listen {
        if !seen.insert(admin) {
            return Err(ConfigError::InvalidCombination(format!(
                "Admin API address {} is already used by the transport listener", admin
            )));
        }
    }

    for route in &config.outbound {
        if !seen.insert(route.listen) {
            return Err(ConfigError::InvalidCombination(format!(
                "Outbound listen address {} is used more than once", route.listen
            )));
        }
        // Peers are resolved at connect time; only the shape is checked here
        if !route.peer.contains(':') {
            return Err(ConfigError::InvalidValue(
                "outbound.peer".to_string(),
                format!("Peer '{}' must be host:port", route.peer),
            ));
        }
    }

    Ok(())
}

/// Validate certificate settings
fn validate_certificate_settings(config: &NodeConfig) -> Result<()> {
    validate_file_exists(&config.cert, "Node certificate")?;
    validate_file_exists(&config.key, "Node private key")?;

    // The client context is always built and trusts only this CA
    validate_file_exists(&config.ca_cert, "CA certificate")?;

    Ok(())
}

/// Validate general settings
fn validate_general_settings(config: &NodeConfig) -> Result<()> {
    match config.log_level.as_str() {
        "error" | "warn" | "info" | "debug" | "trace" => {}
        level => {
            warn!("Invalid log level: {}. Using default: info", level);
        }
    }

    let positive = [
        ("buffer_size", config.buffer_size as u64),
        ("connection_timeout", config.connection_timeout),
        ("classification_timeout_ms", config.classification_timeout_ms),
        ("probe_timeout_ms", config.probe_timeout_ms),
    ];
    for (name, value) in positive {
        if value == 0 {
            return Err(ConfigError::InvalidValue(
                name.to_string(),
                format!("{} must be greater than 0", name),
            ));
        }
    }

    if !config.enforce_hostname_verification && config.resolve_hostname {
        // Only meaningful together with enforcement
        warn!("resolve_hostname has no effect while hostname verification is disabled");
    }

    Ok(())
}

fn validate_file_exists(path: &Path, what: &str) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue(
            what.to_string(),
            format!("{} not found: {}", what, path.display()),
        ))
    }
}

/// Check outbound peers for problems that do not prevent startup
///
/// Returns one warning per peer that cannot be resolved right now.
pub fn check_warnings(config: &NodeConfig) -> Vec<String> {
    config.outbound.iter()
        .filter_map(|route| PeerAddress::resolve(&route.peer).err()
            .map(|e| format!("Outbound peer {} is not resolvable yet: {}", route.peer, e)))
        .collect()
}
