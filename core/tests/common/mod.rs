//! Shared fixtures for the plugin integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use gattscope_core::ble::types::properties;
use gattscope_core::{
    BleTransport, CharacteristicRef, ConnectionHandle, DiscoveredCharacteristic,
    DiscoveredService,
};
use parking_lot::Mutex;

/// A transport call as observed by [`FakeRadio`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    BeginDiscovery,
    EndDiscovery,
    Open(ConnectionHandle, String),
    HighPriority(ConnectionHandle),
    Mtu(ConnectionHandle, u32),
    DiscoverServices(ConnectionHandle),
    Read(ConnectionHandle, CharacteristicRef),
    Close(ConnectionHandle),
}

/// Scriptable in-memory radio that records every call
pub struct FakeRadio {
    permission: AtomicBool,
    powered: AtomicBool,
    resolves: AtomicBool,
    calls: Mutex<Vec<Call>>,
}

impl Default for FakeRadio {
    fn default() -> Self {
        Self {
            permission: AtomicBool::new(true),
            powered: AtomicBool::new(true),
            resolves: AtomicBool::new(true),
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl FakeRadio {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_permission(&self, granted: bool) {
        self.permission.store(granted, Ordering::SeqCst);
    }

    pub fn set_powered(&self, powered: bool) {
        self.powered.store(powered, Ordering::SeqCst);
    }

    pub fn set_resolves(&self, resolves: bool) {
        self.resolves.store(resolves, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().iter().filter(|c| predicate(c)).count()
    }

    /// Handles passed to `open_connection`, in call order
    pub fn opens(&self) -> Vec<(ConnectionHandle, String)> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                Call::Open(handle, address) => Some((*handle, address.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn last_open(&self) -> ConnectionHandle {
        self.opens().last().expect("no connection opened").0
    }

    pub fn reads(&self) -> Vec<CharacteristicRef> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                Call::Read(_, characteristic) => Some(characteristic.clone()),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }
}

impl BleTransport for FakeRadio {
    fn request_radio_permission(&self) -> bool {
        self.permission.load(Ordering::SeqCst)
    }

    fn is_radio_available(&self) -> bool {
        self.powered.load(Ordering::SeqCst)
    }

    fn begin_discovery(&self) {
        self.record(Call::BeginDiscovery);
    }

    fn end_discovery(&self) {
        self.record(Call::EndDiscovery);
    }

    fn open_connection(&self, handle: ConnectionHandle, address: String) -> bool {
        self.record(Call::Open(handle, address));
        self.resolves.load(Ordering::SeqCst)
    }

    fn request_high_priority(&self, handle: ConnectionHandle) {
        self.record(Call::HighPriority(handle));
    }

    fn request_mtu(&self, handle: ConnectionHandle, mtu: u32) {
        self.record(Call::Mtu(handle, mtu));
    }

    fn discover_services(&self, handle: ConnectionHandle) {
        self.record(Call::DiscoverServices(handle));
    }

    fn read_characteristic(&self, handle: ConnectionHandle, characteristic: CharacteristicRef) {
        self.record(Call::Read(handle, characteristic));
    }

    fn close_connection(&self, handle: ConnectionHandle) {
        self.record(Call::Close(handle));
    }
}

pub fn readable(uuid: &str) -> DiscoveredCharacteristic {
    DiscoveredCharacteristic {
        uuid: uuid.to_string(),
        properties: properties::READ,
    }
}

pub fn write_only(uuid: &str) -> DiscoveredCharacteristic {
    DiscoveredCharacteristic {
        uuid: uuid.to_string(),
        properties: properties::WRITE,
    }
}

pub fn service(uuid: &str, characteristics: Vec<DiscoveredCharacteristic>) -> DiscoveredService {
    DiscoveredService {
        uuid: uuid.to_string(),
        characteristics,
    }
}
