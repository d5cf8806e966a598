//! Configuration loading functionality
//!
//! This module provides functionality for loading configuration from
//! files and environment variables.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::common::parse_socket_addr;
use crate::config::error::{ConfigError, Result};
use crate::config::types::{ClientCertMode, NodeConfig};

/// Trait for loading configuration from different sources
pub trait ConfigLoader {
    /// Load configuration from a JSON file
    fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> where Self: Sized;

    /// Override fields from prefixed environment variables
    fn apply_env(&mut self, prefix: &str) -> Result<()>;
}

impl ConfigLoader for NodeConfig {
    fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        info!("Loading configuration from file: {}", path.display());
        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::FileReadError(path.to_path_buf(), e.to_string()))?;

        serde_json::from_str(&content)
            .map_err(|e| ConfigError::ParseError(format!("{}: {}", path.display(), e)))
    }

    fn apply_env(&mut self, prefix: &str) -> Result<()> {
        let get_env = |name: &str| -> Option<String> {
            env::var(format!("{}{}", prefix, name)).ok()
        };

        fn parse_field<T, E: std::fmt::Display>(
            name: &str,
            value: &str,
            parser: impl FnOnce(&str) -> std::result::Result<T, E>,
        ) -> Result<T> {
            parser(value).map_err(|e| ConfigError::InvalidValue(name.to_lowercase(), e.to_string()))
        }

        // Network settings
        if let Some(value) = get_env("LISTEN") {
            self.listen = parse_field("LISTEN", &value, parse_socket_addr)?;
        }
        if let Some(value) = get_env("TARGET") {
            self.target = parse_field("TARGET", &value, parse_socket_addr)?;
        }
        if let Some(value) = get_env("ADMIN_LISTEN") {
            self.admin_listen = Some(parse_field("ADMIN_LISTEN", &value, parse_socket_addr)?);
        }

        // Dual mode settings
        if let Some(value) = get_env("DUAL_MODE_ENABLED") {
            self.dual_mode_enabled = parse_field("DUAL_MODE_ENABLED", &value, parse_bool)?;
        }
        if let Some(value) = get_env("ENFORCE_HOSTNAME_VERIFICATION") {
            self.enforce_hostname_verification =
                parse_field("ENFORCE_HOSTNAME_VERIFICATION", &value, parse_bool)?;
        }
        if let Some(value) = get_env("RESOLVE_HOSTNAME") {
            self.resolve_hostname = parse_field("RESOLVE_HOSTNAME", &value, parse_bool)?;
        }

        // Certificates
        if let Some(value) = get_env("CERT") {
            self.cert = PathBuf::from(value);
        }
        if let Some(value) = get_env("KEY") {
            self.key = PathBuf::from(value);
        }
        if let Some(value) = get_env("CA_CERT") {
            self.ca_cert = PathBuf::from(value);
        }
        if let Some(value) = get_env("CLIENT_CERT_MODE") {
            self.client_cert_mode = value.parse::<ClientCertMode>()?;
        }

        // Other settings
        if let Some(value) = get_env("LOG_LEVEL") {
            self.log_level = value;
        }
        if let Some(value) = get_env("BUFFER_SIZE") {
            self.buffer_size = parse_field("BUFFER_SIZE", &value, str::parse::<usize>)?;
        }
        if let Some(value) = get_env("CONNECTION_TIMEOUT") {
            self.connection_timeout = parse_field("CONNECTION_TIMEOUT", &value, str::parse::<u64>)?;
        }
        if let Some(value) = get_env("CLASSIFICATION_TIMEOUT_MS") {
            self.classification_timeout_ms =
                parse_field("CLASSIFICATION_TIMEOUT_MS", &value, str::parse::<u64>)?;
        }
        if let Some(value) = get_env("PROBE_TIMEOUT_MS") {
            self.probe_timeout_ms = parse_field("PROBE_TIMEOUT_MS", &value, str::parse::<u64>)?;
        }

        debug!("Applied environment overrides with prefix {}", prefix);
        Ok(())
    }
}

fn parse_bool(value: &str) -> std::result::Result<bool, String> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(format!("expected a boolean, got '{}'", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"dual_mode_enabled": true, "resolve_hostname": false}}"#).unwrap();

        let config = NodeConfig::from_file(file.path()).unwrap();
        assert!(config.dual_mode_enabled);
        assert!(!config.resolve_hostname);
    }

    #[test]
    fn test_from_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        match NodeConfig::from_file(dir.path().join("missing.json")) {
            Err(ConfigError::FileNotFound(_)) => {}
            other => panic!("Expected FileNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_from_invalid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(NodeConfig::from_file(file.path()), Err(ConfigError::ParseError(_))));
    }

    #[test]
    #[serial]
    fn test_apply_env() {
        let prefix = "DMT_LOADER_TEST_";
        env::set_var(format!("{}DUAL_MODE_ENABLED", prefix), "true");
        env::set_var(format!("{}ENFORCE_HOSTNAME_VERIFICATION", prefix), "off");
        env::set_var(format!("{}PROBE_TIMEOUT_MS", prefix), "250");

        let mut config = NodeConfig::default();
        config.apply_env(prefix).unwrap();

        assert!(config.dual_mode_enabled);
        assert!(!config.enforce_hostname_verification);
        assert_eq!(config.probe_timeout_ms, 250);

        env::remove_var(format!("{}DUAL_MODE_ENABLED", prefix));
        env::remove_var(format!("{}ENFORCE_HOSTNAME_VERIFICATION", prefix));
        env::remove_var(format!("{}PROBE_TIMEOUT_MS", prefix));
    }

    #[test]
    #[serial]
    fn test_apply_env_invalid_bool() {
        let prefix = "DMT_LOADER_BAD_";
        env::set_var(format!("{}DUAL_MODE_ENABLED", prefix), "maybe");

        let mut config = NodeConfig::default();
        let result = config.apply_env(prefix);
        env::remove_var(format!("{}DUAL_MODE_ENABLED", prefix));

        assert!(matches!(result, Err(ConfigError::InvalidValue(_, _))));
    }
}
