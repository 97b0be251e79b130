//! Method channel dispatch with JSON arguments and payloads
//!
//! Run with: cargo test --test integration_method_channel

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{readable, service, FakeRadio};
use gattscope_core::channel::{CONNECT_TO_DEVICE, SCAN_FOR_DEVICES};
use gattscope_core::{
    BleEvent, BlePlugin, CharacteristicRef, ConnectionEvent, MethodResult, PluginConfig,
};
use parking_lot::Mutex;
use serde_json::json;

#[derive(Debug, Clone, PartialEq)]
enum Reply {
    Success(serde_json::Value),
    Error(String, String),
    NotImplemented,
}

#[derive(Clone, Default)]
struct Replies(Arc<Mutex<Vec<Reply>>>);

impl Replies {
    fn all(&self) -> Vec<Reply> {
        self.0.lock().clone()
    }
}

impl MethodResult for Replies {
    fn success(&self, payload: String) {
        let value = serde_json::from_str(&payload).expect("payload is JSON");
        self.0.lock().push(Reply::Success(value));
    }

    fn error(&self, code: String, message: String) {
        self.0.lock().push(Reply::Error(code, message));
    }

    fn not_implemented(&self) {
        self.0.lock().push(Reply::NotImplemented);
    }
}

fn call(plugin: &BlePlugin, method: &str, arguments: &str) -> Replies {
    let replies = Replies::default();
    plugin.handle_method_call(
        method.to_string(),
        arguments.to_string(),
        Box::new(replies.clone()),
    );
    replies
}

fn plugin(radio: &Arc<FakeRadio>) -> BlePlugin {
    BlePlugin::with_transport(radio.clone(), PluginConfig::default()).expect("plugin")
}

#[tokio::test]
async fn test_unknown_method() {
    let radio = FakeRadio::new();
    let replies = call(&plugin(&radio), "disconnectDevice", "{}");
    assert_eq!(replies.all(), vec![Reply::NotImplemented]);
}

#[tokio::test]
async fn test_missing_device_id() {
    let radio = FakeRadio::new();
    let plugin = plugin(&radio);

    for arguments in ["{}", r#"{"deviceId":null}"#, r#"{"deviceId":7}"#, "not json"] {
        let replies = call(&plugin, CONNECT_TO_DEVICE, arguments);
        assert_eq!(
            replies.all(),
            vec![Reply::Error(
                "INVALID_ARGUMENT".to_string(),
                "Device ID is null".to_string()
            )],
            "arguments: {}",
            arguments
        );
    }
    assert!(radio.opens().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_scan_then_connect_payloads() {
    let radio = FakeRadio::new();
    let plugin = plugin(&radio);

    let scan = call(&plugin, SCAN_FOR_DEVICES, "");
    plugin.handle_event(BleEvent::DeviceSighted {
        address: "AA:BB".to_string(),
        name: Some("X".to_string()),
    });
    plugin.handle_event(BleEvent::DeviceSighted {
        address: "AA:BB".to_string(),
        name: Some("Y".to_string()),
    });
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert_eq!(
        scan.all(),
        vec![Reply::Success(json!([{"id": "AA:BB", "name": "X"}]))]
    );

    let connect = call(&plugin, CONNECT_TO_DEVICE, r#"{"deviceId":"AA:BB"}"#);
    let handle = radio.last_open();
    plugin.on_connected(handle);
    plugin.on_services_discovered(
        handle,
        0,
        vec![service("0000180f-0000-1000-8000-00805f9b34fb", vec![readable("2a19")])],
    );
    plugin.on_characteristic_read(
        handle,
        CharacteristicRef::new("0000180f-0000-1000-8000-00805f9b34fb", "2a19"),
        0,
        vec![0x5a],
    );

    assert_eq!(
        connect.all(),
        vec![Reply::Success(json!([{
            "uuid": "0000180f-0000-1000-8000-00805f9b34fb",
            "name": "Battery Service",
            "characteristics": [{"uuid": "2a19", "name": "Battery Level", "value": [90]}]
        }]))]
    );
}

#[tokio::test]
async fn test_connect_unknown_device() {
    let radio = FakeRadio::new();
    let replies = call(&plugin(&radio), CONNECT_TO_DEVICE, r#"{"deviceId":"11:22"}"#);

    assert_eq!(
        replies.all(),
        vec![Reply::Error(
            "DEVICE_NOT_FOUND".to_string(),
            "Device not found: 11:22".to_string()
        )]
    );
}

#[tokio::test]
async fn test_scan_permission_denied() {
    let radio = FakeRadio::new();
    radio.set_permission(false);
    let replies = call(&plugin(&radio), SCAN_FOR_DEVICES, "");

    assert_eq!(
        replies.all(),
        vec![Reply::Error(
            "PERMISSION_DENIED".to_string(),
            "Bluetooth permissions are not granted".to_string()
        )]
    );
}

#[tokio::test]
async fn test_disconnect_error_code() {
    let radio = FakeRadio::new();
    let config = PluginConfig {
        require_scanned_device: false,
        max_retries: 0,
        ..PluginConfig::default()
    };
    let plugin = BlePlugin::with_transport(radio.clone(), config).expect("plugin");

    let replies = call(&plugin, CONNECT_TO_DEVICE, r#"{"deviceId":"AA:BB"}"#);
    plugin.handle_event(BleEvent::Connection {
        handle: radio.last_open(),
        event: ConnectionEvent::Disconnected { status: 133 },
    });

    match replies.all().as_slice() {
        [Reply::Error(code, _)] => assert_eq!(code, "DISCONNECTED"),
        other => panic!("unexpected replies: {:?}", other),
    }
}
