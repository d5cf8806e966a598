//! Node configuration errors

use std::path::PathBuf;

use thiserror::Error;

use crate::common::TransportError;

/// Why a node configuration could not be loaded or accepted
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("node config file {} does not exist", .0.display())]
    FileNotFound(PathBuf),

    #[error("cannot read node config {}: {1}", .0.display())]
    FileReadError(PathBuf, String),

    #[error("malformed node config: {0}")]
    ParseError(String),

    /// Setting name, then what is wrong with its value
    #[error("node setting '{0}' rejected: {1}")]
    InvalidValue(String, String),

    #[error("conflicting node settings: {0}")]
    InvalidCombination(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

impl From<ConfigError> for TransportError {
    fn from(err: ConfigError) -> Self {
        TransportError::Config(err.to_string())
    }
}
