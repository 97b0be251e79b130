/// Platform radio seam
///
/// The plugin drives the platform BLE stack through [`BleTransport`] and is
/// fed the stack's asynchronous callbacks as [`BleEvent`]s. Implementations
/// must not call back into the plugin synchronously from these methods.

use super::connection::ConnectionEvent;
use super::types::{CharacteristicRef, ConnectionHandle};

/// Platform BLE stack: permissions, radio state, discovery and GATT client
#[cfg_attr(test, mockall::automock)]
pub trait BleTransport: Send + Sync {
    /// Whether the app holds (or was just granted) the scan/connect permissions
    fn request_radio_permission(&self) -> bool;
    fn is_radio_available(&self) -> bool;

    fn begin_discovery(&self);
    fn end_discovery(&self);

    /// Open a GATT client link. Returns false if the address does not
    /// resolve to a peer.
    fn open_connection(&self, handle: ConnectionHandle, address: String) -> bool;
    fn request_high_priority(&self, handle: ConnectionHandle);
    fn request_mtu(&self, handle: ConnectionHandle, mtu: u32);
    fn discover_services(&self, handle: ConnectionHandle);
    fn read_characteristic(&self, handle: ConnectionHandle, characteristic: CharacteristicRef);
    fn close_connection(&self, handle: ConnectionHandle);
}

/// Callback delivered by the platform stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BleEvent {
    DeviceSighted {
        address: String,
        name: Option<String>,
    },
    ScanFailed {
        error_code: i32,
    },
    RadioStateChanged {
        available: bool,
    },
    Connection {
        handle: ConnectionHandle,
        event: ConnectionEvent,
    },
}
