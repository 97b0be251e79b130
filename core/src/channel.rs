//! Method channel surface
//!
//! String-keyed calls from the application shell with JSON arguments and
//! JSON success payloads, answered through a [`MethodResult`].

use serde::{Deserialize, Serialize};

use crate::ble::types::{DiscoveredDevice, ServiceRecord};
use crate::ble::BleError;
use crate::plugin::BlePlugin;

/// Channel the application shell registers the handler on
pub const CHANNEL_NAME: &str = "ble.flutter.dev/ble";

pub const SCAN_FOR_DEVICES: &str = "scanForDevices";
pub const CONNECT_TO_DEVICE: &str = "connectToDevice";

const INVALID_ARGUMENT: &str = "INVALID_ARGUMENT";
const ENCODING_FAILED: &str = "ENCODING_FAILED";

/// Reply handle for one method call (implemented by the host shell)
pub trait MethodResult: Send + Sync {
    fn success(&self, payload: String);
    fn error(&self, code: String, message: String);
    fn not_implemented(&self);
}

#[derive(Debug, Deserialize)]
struct ConnectArguments {
    #[serde(rename = "deviceId")]
    device_id: Option<String>,
}

/// Extract `deviceId`; `None` for missing, null, non-string or unparseable
/// arguments
fn device_id(arguments: &str) -> Option<String> {
    match serde_json::from_str::<ConnectArguments>(arguments) {
        Ok(args) => args.device_id,
        Err(e) => {
            tracing::debug!("Unparseable connect arguments: {}", e);
            None
        }
    }
}

fn respond<T: Serialize>(result: &dyn MethodResult, outcome: Result<T, BleError>) {
    match outcome {
        Ok(value) => match serde_json::to_string(&value) {
            Ok(payload) => result.success(payload),
            Err(e) => result.error(ENCODING_FAILED.to_string(), e.to_string()),
        },
        Err(e) => result.error(e.code().to_string(), e.to_string()),
    }
}

/// Dispatch one method call onto `plugin`
pub fn handle_method_call(
    plugin: &BlePlugin,
    method: &str,
    arguments: &str,
    result: Box<dyn MethodResult>,
) {
    tracing::debug!("Method call: {}", method);
    match method {
        SCAN_FOR_DEVICES => plugin.start_scan(Box::new(
            move |outcome: Result<Vec<DiscoveredDevice>, BleError>| respond(&*result, outcome),
        )),
        CONNECT_TO_DEVICE => match device_id(arguments) {
            Some(id) => plugin.connect(
                &id,
                Box::new(move |outcome: Result<Vec<ServiceRecord>, BleError>| {
                    respond(&*result, outcome)
                }),
            ),
            None => result.error(INVALID_ARGUMENT.to_string(), "Device ID is null".to_string()),
        },
        _ => result.not_implemented(),
    }
}
