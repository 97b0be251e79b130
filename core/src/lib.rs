// gattscope core: BLE scan and GATT inspection
#![allow(clippy::empty_line_after_doc_comments)]
//
// Platform adapters own the radio. Everything that decides what happens
// next lives here.

pub mod ble;
pub mod channel;
pub mod config;
pub mod plugin;

// Mobile bridge module
pub mod mobile_bridge;

use thiserror::Error;

pub use ble::{
    BleError, BleEvent, BleTransport, CharacteristicRecord, CharacteristicRef, ConnectionEvent,
    ConnectionHandle, DiscoveredCharacteristic, DiscoveredDevice, DiscoveredService,
    ServiceRecord,
};
pub use channel::{handle_method_call, MethodResult};
pub use config::{PluginConfig, ReadFailurePolicy};
pub use plugin::BlePlugin;

// Mobile bridge exports for UniFFI
pub use mobile_bridge::*;

// UniFFI scaffolding - clippy warnings in generated code
uniffi::include_scaffolding!("api");

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Plugin construction failures. Request-level failures are [`BleError`]s
/// delivered through result sinks.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PluginError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Async runtime unavailable: {0}")]
    RuntimeUnavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plugin_error_messages() {
        let err = PluginError::InvalidConfig("scan_window_ms must be > 0".to_string());
        assert_eq!(
            err.to_string(),
            "Invalid configuration: scan_window_ms must be > 0"
        );

        let err = PluginError::RuntimeUnavailable("no threads".to_string());
        assert!(err.to_string().contains("no threads"));
    }
}
