/// Static UUID → display-name lookup for SIG-assigned GATT numbers
///
/// Accepts the 16-bit ("180F"), 32-bit ("0000180F") and full 128-bit
/// Bluetooth Base UUID forms, in any case. Unknown UUIDs resolve to the
/// "Unknown ..." sentinels; lookup never fails.

use uuid::Uuid;

/// Bluetooth Base UUID (0000xxxx-0000-1000-8000-00805F9B34FB) with the
/// 32-bit alias field zeroed
pub const BLUETOOTH_BASE_UUID: u128 = 0x0000_0000_0000_1000_8000_00805F9B34FB;

pub const UNKNOWN_SERVICE: &str = "Unknown Service";
pub const UNKNOWN_CHARACTERISTIC: &str = "Unknown Characteristic";

const ALIAS_SHIFT: u32 = 96;
const BASE_MASK: u128 = (1u128 << ALIAS_SHIFT) - 1;

/// Extract the assigned number from any of the accepted UUID spellings.
/// Returns `None` for vendor UUIDs outside the Bluetooth base.
pub fn assigned_number(uuid: &str) -> Option<u32> {
    let uuid = uuid.trim();
    match uuid.len() {
        4 => u16::from_str_radix(uuid, 16).ok().map(u32::from),
        8 => u32::from_str_radix(uuid, 16).ok(),
        _ => {
            let value = Uuid::parse_str(uuid).ok()?.as_u128();
            if value & BASE_MASK == BLUETOOTH_BASE_UUID {
                Some((value >> ALIAS_SHIFT) as u32)
            } else {
                None
            }
        }
    }
}

/// Display name for a service UUID
pub fn service_name(uuid: &str) -> &'static str {
    match assigned_number(uuid) {
        Some(0x1800) => "Generic Access",
        Some(0x1801) => "Generic Attribute",
        Some(0x1802) => "Immediate Alert",
        Some(0x1803) => "Link Loss",
        Some(0x1804) => "Tx Power",
        Some(0x1805) => "Current Time Service",
        Some(0x1808) => "Glucose",
        Some(0x1809) => "Health Thermometer",
        Some(0x180A) => "Device Information",
        Some(0x180D) => "Heart Rate",
        Some(0x180F) => "Battery Service",
        Some(0x1810) => "Blood Pressure",
        Some(0x1812) => "Human Interface Device",
        Some(0x1814) => "Running Speed and Cadence",
        Some(0x1816) => "Cycling Speed and Cadence",
        Some(0x1818) => "Cycling Power",
        Some(0x1819) => "Location and Navigation",
        Some(0x181A) => "Environmental Sensing",
        Some(0x181C) => "User Data",
        Some(0x181D) => "Weight Scale",
        Some(0x1826) => "Fitness Machine",
        _ => UNKNOWN_SERVICE,
    }
}

/// Display name for a characteristic UUID
pub fn characteristic_name(uuid: &str) -> &'static str {
    match assigned_number(uuid) {
        Some(0x2A00) => "Device Name",
        Some(0x2A01) => "Appearance",
        Some(0x2A04) => "Peripheral Preferred Connection Parameters",
        Some(0x2A05) => "Service Changed",
        Some(0x2A06) => "Alert Level",
        Some(0x2A07) => "Tx Power Level",
        Some(0x2A19) => "Battery Level",
        Some(0x2A1C) => "Temperature Measurement",
        Some(0x2A1D) => "Temperature Type",
        Some(0x2A23) => "System ID",
        Some(0x2A24) => "Model Number String",
        Some(0x2A25) => "Serial Number String",
        Some(0x2A26) => "Firmware Revision String",
        Some(0x2A27) => "Hardware Revision String",
        Some(0x2A28) => "Software Revision String",
        Some(0x2A29) => "Manufacturer Name String",
        Some(0x2A2A) => "IEEE 11073-20601 Regulatory Certification Data List",
        Some(0x2A2B) => "Current Time",
        Some(0x2A37) => "Heart Rate Measurement",
        Some(0x2A38) => "Body Sensor Location",
        Some(0x2A39) => "Heart Rate Control Point",
        Some(0x2A50) => "PnP ID",
        Some(0x2A5B) => "CSC Measurement",
        Some(0x2A5C) => "CSC Feature",
        Some(0x2A63) => "Cycling Power Measurement",
        Some(0x2A65) => "Cycling Power Feature",
        Some(0x2A6D) => "Pressure",
        Some(0x2A6E) => "Temperature",
        Some(0x2A6F) => "Humidity",
        Some(0x2AA6) => "Central Address Resolution",
        _ => UNKNOWN_CHARACTERISTIC,
    }
}
