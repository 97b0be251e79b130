// Mobile bridge types for UniFFI bindings
//
// Foreign-facing half of the plugin declared in api.udl. Kotlin/Swift
// adapters implement BleTransport and the result callbacks, and forward
// their stack callbacks through the on_* methods.

use std::sync::Arc;

use crate::ble::names;
use crate::ble::{
    BleError, BleEvent, BleTransport, CharacteristicRef, ConnectionEvent, ConnectionHandle,
    DiscoveredDevice, DiscoveredService, ServiceRecord,
};
use crate::channel::{self, MethodResult};
use crate::config::PluginConfig;
use crate::plugin::BlePlugin;
use crate::PluginError;

// ============================================================================
// RESULT CALLBACKS
// ============================================================================

/// Scan outcome callback (implemented by mobile platforms)
pub trait ScanCallback: Send + Sync {
    fn on_success(&self, devices: Vec<DiscoveredDevice>);
    fn on_error(&self, code: String, message: String);
}

/// Connect outcome callback (implemented by mobile platforms)
pub trait ConnectCallback: Send + Sync {
    fn on_success(&self, services: Vec<ServiceRecord>);
    fn on_error(&self, code: String, message: String);
}

struct ScanCallbackSink(Box<dyn ScanCallback>);

impl crate::ble::ResultSink<Vec<DiscoveredDevice>> for ScanCallbackSink {
    fn deliver(&self, result: Result<Vec<DiscoveredDevice>, BleError>) {
        match result {
            Ok(devices) => self.0.on_success(devices),
            Err(e) => self.0.on_error(e.code().to_string(), e.to_string()),
        }
    }
}

struct ConnectCallbackSink(Box<dyn ConnectCallback>);

impl crate::ble::ResultSink<Vec<ServiceRecord>> for ConnectCallbackSink {
    fn deliver(&self, result: Result<Vec<ServiceRecord>, BleError>) {
        match result {
            Ok(services) => self.0.on_success(services),
            Err(e) => self.0.on_error(e.code().to_string(), e.to_string()),
        }
    }
}

// ============================================================================
// PLUGIN OBJECT
// ============================================================================

impl BlePlugin {
    pub fn new(
        transport: Box<dyn BleTransport>,
        config: PluginConfig,
    ) -> Result<Self, PluginError> {
        Self::with_transport(Arc::from(transport), config)
    }

    pub fn scan_for_devices(&self, callback: Box<dyn ScanCallback>) {
        self.start_scan(Box::new(ScanCallbackSink(callback)));
    }

    pub fn connect_to_device(&self, device_id: String, callback: Box<dyn ConnectCallback>) {
        self.connect(&device_id, Box::new(ConnectCallbackSink(callback)));
    }

    pub fn handle_method_call(
        &self,
        method: String,
        arguments: String,
        result: Box<dyn MethodResult>,
    ) {
        channel::handle_method_call(self, &method, &arguments, result);
    }

    pub fn on_device_sighted(&self, address: String, name: Option<String>) {
        self.handle_event(BleEvent::DeviceSighted { address, name });
    }

    pub fn on_scan_failed(&self, error_code: i32) {
        self.handle_event(BleEvent::ScanFailed { error_code });
    }

    pub fn on_radio_state_changed(&self, available: bool) {
        self.handle_event(BleEvent::RadioStateChanged { available });
    }

    pub fn on_connected(&self, handle: ConnectionHandle) {
        self.connection_event(handle, ConnectionEvent::Connected);
    }

    pub fn on_disconnected(&self, handle: ConnectionHandle, status: i32) {
        self.connection_event(handle, ConnectionEvent::Disconnected { status });
    }

    pub fn on_mtu_changed(&self, handle: ConnectionHandle, mtu: u32, status: i32) {
        self.connection_event(handle, ConnectionEvent::MtuChanged { mtu, status });
    }

    pub fn on_services_discovered(
        &self,
        handle: ConnectionHandle,
        status: i32,
        services: Vec<DiscoveredService>,
    ) {
        self.connection_event(
            handle,
            ConnectionEvent::ServicesDiscovered { status, services },
        );
    }

    pub fn on_characteristic_read(
        &self,
        handle: ConnectionHandle,
        characteristic: CharacteristicRef,
        status: i32,
        value: Vec<u8>,
    ) {
        self.connection_event(
            handle,
            ConnectionEvent::CharacteristicRead {
                characteristic,
                status,
                value,
            },
        );
    }

    fn connection_event(&self, handle: ConnectionHandle, event: ConnectionEvent) {
        self.handle_event(BleEvent::Connection { handle, event });
    }
}

// ============================================================================
// NAMESPACE FUNCTIONS
// ============================================================================

pub fn service_display_name(uuid: String) -> String {
    names::service_name(&uuid).to_string()
}

pub fn characteristic_display_name(uuid: String) -> String {
    names::characteristic_name(&uuid).to_string()
}

pub fn default_plugin_config() -> PluginConfig {
    PluginConfig::default()
}

/// Install a `tracing` subscriber for the host app. Later calls are no-ops.
pub fn init_logging(filter: String) {
    let env_filter = tracing_subscriber::EnvFilter::try_new(&filter)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .try_init()
        .is_ok()
    {
        tracing::info!("gattscope logging initialized ({})", filter);
    }
}
