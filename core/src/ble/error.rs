//! Request-level error taxonomy
//!
//! Every variant is terminal for its request and reaches the result sink
//! exactly once with a stable code.

use thiserror::Error;

/// Errors surfaced to the application shell
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BleError {
    #[error("Bluetooth permissions are not granted")]
    PermissionDenied,
    #[error("Bluetooth is not available")]
    BluetoothUnavailable,
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Device not found: {0}")]
    DeviceNotFound(String),
    #[error("Failed to discover services (status {0})")]
    ServiceDiscoveryFailed(i32),
    #[error("Disconnected before reading all characteristics: {0}")]
    Disconnected(String),
    #[error("A {0} request is already in progress")]
    Busy(&'static str),
    #[error("Operation timed out while {0}")]
    Timeout(&'static str),
}

impl BleError {
    /// Stable code delivered across the method channel
    pub fn code(&self) -> &'static str {
        match self {
            BleError::PermissionDenied => "PERMISSION_DENIED",
            BleError::BluetoothUnavailable => "BLUETOOTH_NOT_AVAILABLE",
            BleError::InvalidArgument(_) => "INVALID_ARGUMENT",
            BleError::DeviceNotFound(_) => "DEVICE_NOT_FOUND",
            BleError::ServiceDiscoveryFailed(_) => "SERVICE_DISCOVERY_FAILED",
            BleError::Disconnected(_) => "DISCONNECTED",
            BleError::Busy(_) => "BUSY",
            BleError::Timeout(_) => "TIMEOUT",
        }
    }
}
