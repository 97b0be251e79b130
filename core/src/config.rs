//! Plugin configuration
//!
//! Exposed to mobile hosts as a UniFFI record and serializable to/from JSON
//! for the desktop CLI.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::PluginError;

/// Android `GATT_ERROR`, reported when the controller was out of connection
/// resources or the link collapsed during setup
pub const DEFAULT_BUSY_STATUS_CODE: i32 = 133;

/// Smallest ATT MTU every BLE link supports
pub const MIN_ATT_MTU: u32 = 23;
/// Largest ATT MTU Android will negotiate
pub const MAX_ATT_MTU: u32 = 517;

/// What to do when a single characteristic read reports a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReadFailurePolicy {
    /// Leave the characteristic out of its service's list
    #[default]
    Omit,
    /// Re-issue the read once, then omit it if it fails again
    RetryOnce,
    /// Keep the characteristic with an empty value and its failure status
    Report,
}

/// Session tuning shared by the scan and connection state machines
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginConfig {
    /// How long a scan collects sightings before delivering
    pub scan_window_ms: u64,
    /// Reconnect attempts allowed after a busy disconnect
    pub max_retries: u32,
    /// Disconnect status treated as transient
    pub busy_status_code: i32,
    /// MTU requested once connected
    pub preferred_mtu: u32,
    /// Only connect to addresses seen in the last completed scan
    pub require_scanned_device: bool,
    pub read_failure_policy: ReadFailurePolicy,
    /// Fail a connection that makes no progress for this long; `None` leaves
    /// timing to the platform stack
    pub operation_timeout_ms: Option<u64>,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            scan_window_ms: 10_000,
            max_retries: 3,
            busy_status_code: DEFAULT_BUSY_STATUS_CODE,
            preferred_mtu: 512,
            require_scanned_device: true,
            read_failure_policy: ReadFailurePolicy::Omit,
            operation_timeout_ms: None,
        }
    }
}

impl PluginConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), PluginError> {
        if self.scan_window_ms == 0 {
            return Err(PluginError::InvalidConfig(
                "scan_window_ms must be > 0".to_string(),
            ));
        }
        if !(MIN_ATT_MTU..=MAX_ATT_MTU).contains(&self.preferred_mtu) {
            return Err(PluginError::InvalidConfig(format!(
                "preferred_mtu must be within {}..={}",
                MIN_ATT_MTU, MAX_ATT_MTU
            )));
        }
        if self.operation_timeout_ms == Some(0) {
            return Err(PluginError::InvalidConfig(
                "operation_timeout_ms must be > 0 when set".to_string(),
            ));
        }
        Ok(())
    }

    pub fn scan_window(&self) -> Duration {
        Duration::from_millis(self.scan_window_ms)
    }

    pub fn operation_timeout(&self) -> Option<Duration> {
        self.operation_timeout_ms.map(Duration::from_millis)
    }
}
