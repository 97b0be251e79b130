/// Shared BLE data types
///
/// Records exchanged between the session state machines, the platform
/// transport and the application shell. Serde names follow the method-channel
/// payload (`id`, `name`, `uuid`, `characteristics`, `value`).

use serde::{Deserialize, Serialize};

/// Sentinel name for peripherals that advertise no local name
pub const UNKNOWN_DEVICE_NAME: &str = "Unknown Device";

/// GATT status reported by the stack for a successful operation
pub const GATT_SUCCESS: i32 = 0;

/// Characteristic property bits (Bluetooth Core Vol 3, Part G, 3.3.1.1).
/// Android `PROPERTY_*` and CoreBluetooth `CBCharacteristicProperties` use the
/// same values.
pub mod properties {
    pub const BROADCAST: u32 = 0x01;
    pub const READ: u32 = 0x02;
    pub const WRITE_WITHOUT_RESPONSE: u32 = 0x04;
    pub const WRITE: u32 = 0x08;
    pub const NOTIFY: u32 = 0x10;
    pub const INDICATE: u32 = 0x20;
}

/// A peripheral observed during a scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredDevice {
    /// Platform-stable identifier (MAC address on Android, UUID on iOS)
    #[serde(rename = "id")]
    pub address: String,
    /// Advertised local name, or [`UNKNOWN_DEVICE_NAME`]
    pub name: String,
}

impl DiscoveredDevice {
    /// Build a device from a raw sighting. Absent and empty names both map to
    /// the sentinel.
    pub fn from_sighting(address: impl Into<String>, name: Option<String>) -> Self {
        let name = name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| UNKNOWN_DEVICE_NAME.to_string());
        Self {
            address: address.into(),
            name,
        }
    }
}

/// Identifies one connection attempt. A retry gets a new `attempt` number, so
/// stack events for an earlier attempt can be told apart and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionHandle {
    pub request_id: u64,
    pub attempt: u32,
}

/// Reference to a characteristic on a connected peer
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CharacteristicRef {
    pub service_uuid: String,
    pub uuid: String,
}

impl CharacteristicRef {
    pub fn new(service_uuid: impl Into<String>, uuid: impl Into<String>) -> Self {
        Self {
            service_uuid: service_uuid.into(),
            uuid: uuid.into(),
        }
    }
}

/// A characteristic as reported by service discovery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredCharacteristic {
    pub uuid: String,
    /// Raw property bitmask, see [`properties`]
    pub properties: u32,
}

impl DiscoveredCharacteristic {
    pub fn is_readable(&self) -> bool {
        self.properties & properties::READ != 0
    }
}

/// A service as reported by service discovery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredService {
    pub uuid: String,
    pub characteristics: Vec<DiscoveredCharacteristic>,
}

/// A characteristic in the aggregated result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacteristicRecord {
    pub uuid: String,
    #[serde(rename = "name")]
    pub display_name: String,
    pub value: Vec<u8>,
    #[serde(skip)]
    pub readable: bool,
    /// Stack status of a failed read; only set under `ReadFailurePolicy::Report`
    #[serde(
        rename = "failureStatus",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub failure_status: Option<i32>,
}

/// A service in the aggregated result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRecord {
    pub uuid: String,
    #[serde(rename = "name")]
    pub display_name: String,
    pub characteristics: Vec<CharacteristicRecord>,
}
