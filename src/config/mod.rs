//! Configuration module
//!
//! This module handles application configuration, including loading from
//! different sources (files, environment variables, command line arguments),
//! validating it, and the process-wide SSL dual mode setting.

mod defaults;
mod error;
mod loader;
mod types;
mod validator;
pub mod dual_mode;

pub use self::defaults::{ENV_PREFIX, DEFAULT_CONFIG_FILE, LISTEN_STR, TARGET_STR, LOG_LEVEL_STR};
pub use self::dual_mode::{DualModeConfig, DualModeFlag};
pub use self::error::ConfigError;
pub use self::loader::ConfigLoader;
pub use self::types::{ClientCertMode, NodeConfig, OutboundRoute};
pub use self::validator::{check_warnings, validate_config};
