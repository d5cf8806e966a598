//! SSL dual mode setting
//!
//! Dual mode is decided once per process, before the first connection is
//! accepted, and never changes afterwards. Components receive the resulting
//! [`DualModeConfig`] by `Arc` when they are constructed instead of reading a
//! global on every connection.

use std::sync::Arc;

use log::info;
use once_cell::sync::OnceCell;

/// Immutable dual mode setting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DualModeConfig {
    enabled: bool,
}

impl DualModeConfig {
    /// Create a dual mode setting
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    /// Whether one port serves both TLS and plaintext connections
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

/// Construct-once holder for a [`DualModeConfig`]
///
/// Concurrent first calls to [`get_or_init`](Self::get_or_init) run the
/// constructor exactly once; every caller observes the same instance. Reads
/// after initialization take no lock.
#[derive(Debug, Default)]
pub struct DualModeFlag {
    cell: OnceCell<Arc<DualModeConfig>>,
}

impl DualModeFlag {
    /// Create an empty flag
    pub const fn new() -> Self {
        Self { cell: OnceCell::new() }
    }

    /// Return the setting, constructing it with `init` on first use
    pub fn get_or_init<F>(&self, init: F) -> Arc<DualModeConfig>
    where
        F: FnOnce() -> DualModeConfig,
    {
        Arc::clone(self.cell.get_or_init(|| Arc::new(init())))
    }

    /// Return the setting if it has been initialized
    pub fn get(&self) -> Option<Arc<DualModeConfig>> {
        self.cell.get().map(Arc::clone)
    }
}

static DUAL_MODE: DualModeFlag = DualModeFlag::new();

/// Initialize the process-wide dual mode setting
///
/// Called once at startup, before any listener is bound. A later call
/// returns the setting that was installed first.
pub fn initialize(enabled: bool) -> Arc<DualModeConfig> {
    let config = DUAL_MODE.get_or_init(|| DualModeConfig::new(enabled));
    if config.is_enabled() != enabled {
        log::warn!(
            "SSL dual mode already initialized as {}, ignoring {}",
            config.is_enabled(), enabled
        );
    } else {
        info!("SSL dual mode {}", if enabled { "enabled" } else { "disabled" });
    }
    config
}
