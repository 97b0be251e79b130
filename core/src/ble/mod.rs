//! BLE scan and GATT inspection
//!
//! Sans-IO sessions plus the transport seam they are driven through.

pub mod connection;
pub mod error;
pub mod names;
pub mod scan;
pub mod sink;
pub mod transport;
pub mod types;
pub mod walker;

pub use connection::{
    ConnectionCommand, ConnectionEvent, ConnectionSession, ConnectionState, Transition,
};
pub use error::BleError;
pub use names::{characteristic_name, service_name};
pub use scan::{ScanSession, ScanState, DEFAULT_SCAN_WINDOW};
pub use sink::{channel_sink, ChannelSink, Delivery, OneShot, RecordingSink, ResultSink};
pub use transport::{BleEvent, BleTransport};
pub use types::{
    CharacteristicRecord, CharacteristicRef, ConnectionHandle, DiscoveredCharacteristic,
    DiscoveredDevice, DiscoveredService, ServiceRecord, GATT_SUCCESS, UNKNOWN_DEVICE_NAME,
};
pub use walker::{ReadProgress, TraversalState};
