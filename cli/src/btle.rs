// Desktop BLE transport backed by btleplug
//
// The plugin calls transport methods synchronously; each one spawns the
// async btleplug work onto the runtime and reports the stack's answer as a
// BleEvent on the channel main.rs drains into the plugin.

use anyhow::{Context, Result};
use btleplug::api::{Central, CentralEvent, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::StreamExt;
use gattscope_core::{
    BleEvent, BleTransport, CharacteristicRef, ConnectionEvent, ConnectionHandle,
    DiscoveredCharacteristic, DiscoveredService,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedSender;

/// HCI "connection terminated by local host"; desktop stacks don't surface
/// a GATT status
const LINK_CLOSED_STATUS: i32 = 0x16;
/// HCI "connection failed to be established"
const CONNECT_FAILED_STATUS: i32 = 0x3E;
/// Generic GATT failure (Android `GATT_FAILURE`)
const GATT_FAILURE_STATUS: i32 = 0x101;
/// Scan could not be started
const SCAN_START_FAILED: i32 = 1;

pub struct BtleTransport {
    adapter: Adapter,
    runtime: Handle,
    events: UnboundedSender<BleEvent>,
    scanning: Arc<AtomicBool>,
    /// Peripherals sighted so far, keyed by the address reported to the plugin
    peripherals: Arc<Mutex<HashMap<String, Peripheral>>>,
    links: Arc<Mutex<HashMap<ConnectionHandle, Peripheral>>>,
}

impl BtleTransport {
    /// Open the first adapter and start listening to its event stream
    pub async fn new(events: UnboundedSender<BleEvent>) -> Result<Self> {
        let manager = Manager::new()
            .await
            .context("Failed to open the Bluetooth manager")?;
        let adapter = manager
            .adapters()
            .await
            .context("Failed to list Bluetooth adapters")?
            .into_iter()
            .next()
            .context("No Bluetooth adapter found")?;

        if let Ok(info) = adapter.adapter_info().await {
            tracing::info!("Using Bluetooth adapter {}", info);
        }

        let transport = Self {
            adapter,
            runtime: Handle::current(),
            events,
            scanning: Arc::new(AtomicBool::new(false)),
            peripherals: Arc::new(Mutex::new(HashMap::new())),
            links: Arc::new(Mutex::new(HashMap::new())),
        };
        transport.spawn_event_listener().await?;
        Ok(transport)
    }

    async fn spawn_event_listener(&self) -> Result<()> {
        let mut stream = self
            .adapter
            .events()
            .await
            .context("Failed to subscribe to Bluetooth adapter events")?;
        let adapter = self.adapter.clone();
        let events = self.events.clone();
        let scanning = self.scanning.clone();
        let peripherals = self.peripherals.clone();
        let links = self.links.clone();

        self.runtime.spawn(async move {
            while let Some(event) = stream.next().await {
                match event {
                    CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => {
                        if !scanning.load(Ordering::SeqCst) {
                            continue;
                        }
                        let Ok(peripheral) = adapter.peripheral(&id).await else {
                            continue;
                        };
                        let name = match peripheral.properties().await {
                            Ok(Some(props)) => props.local_name,
                            _ => None,
                        };
                        let address = peripheral.address().to_string();
                        peripherals.lock().insert(address.clone(), peripheral);
                        let _ = events.send(BleEvent::DeviceSighted { address, name });
                    }
                    CentralEvent::DeviceDisconnected(id) => {
                        let dropped: Vec<ConnectionHandle> = links
                            .lock()
                            .iter()
                            .filter(|(_, p)| p.id() == id)
                            .map(|(handle, _)| *handle)
                            .collect();
                        for handle in dropped {
                            links.lock().remove(&handle);
                            let _ = events.send(BleEvent::Connection {
                                handle,
                                event: ConnectionEvent::Disconnected {
                                    status: LINK_CLOSED_STATUS,
                                },
                            });
                        }
                    }
                    _ => {}
                }
            }
            tracing::debug!("Bluetooth adapter event stream ended");
        });
        Ok(())
    }

    fn link(&self, handle: ConnectionHandle) -> Option<Peripheral> {
        self.links.lock().get(&handle).cloned()
    }

    fn emit(&self, handle: ConnectionHandle, event: ConnectionEvent) {
        let _ = self.events.send(BleEvent::Connection { handle, event });
    }
}

impl BleTransport for BtleTransport {
    fn request_radio_permission(&self) -> bool {
        // Desktop permissions are granted to the binary by the OS
        true
    }

    fn is_radio_available(&self) -> bool {
        true
    }

    fn begin_discovery(&self) {
        self.scanning.store(true, Ordering::SeqCst);
        let adapter = self.adapter.clone();
        let events = self.events.clone();
        self.runtime.spawn(async move {
            if let Err(e) = adapter.start_scan(ScanFilter::default()).await {
                tracing::warn!("Failed to start scan: {}", e);
                let _ = events.send(BleEvent::ScanFailed {
                    error_code: SCAN_START_FAILED,
                });
            }
        });
    }

    fn end_discovery(&self) {
        self.scanning.store(false, Ordering::SeqCst);
        let adapter = self.adapter.clone();
        self.runtime.spawn(async move {
            if let Err(e) = adapter.stop_scan().await {
                tracing::debug!("Failed to stop scan: {}", e);
            }
        });
    }

    fn open_connection(&self, handle: ConnectionHandle, address: String) -> bool {
        let Some(peripheral) = self.peripherals.lock().get(&address).cloned() else {
            return false;
        };
        self.links.lock().insert(handle, peripheral.clone());

        let events = self.events.clone();
        self.runtime.spawn(async move {
            let event = match peripheral.connect().await {
                Ok(()) => ConnectionEvent::Connected,
                Err(e) => {
                    tracing::warn!("Connection to {} failed: {}", address, e);
                    ConnectionEvent::Disconnected {
                        status: CONNECT_FAILED_STATUS,
                    }
                }
            };
            let _ = events.send(BleEvent::Connection { handle, event });
        });
        true
    }

    fn request_high_priority(&self, handle: ConnectionHandle) {
        tracing::debug!("Link priority is managed by the OS ({:?})", handle);
    }

    fn request_mtu(&self, handle: ConnectionHandle, mtu: u32) {
        tracing::debug!("MTU {} negotiated by the OS ({:?})", mtu, handle);
    }

    fn discover_services(&self, handle: ConnectionHandle) {
        let Some(peripheral) = self.link(handle) else {
            return;
        };
        let events = self.events.clone();
        self.runtime.spawn(async move {
            let event = match peripheral.discover_services().await {
                Ok(()) => ConnectionEvent::ServicesDiscovered {
                    status: 0,
                    services: peripheral
                        .services()
                        .into_iter()
                        .map(|service| DiscoveredService {
                            uuid: service.uuid.to_string(),
                            characteristics: service
                                .characteristics
                                .iter()
                                .map(|c| DiscoveredCharacteristic {
                                    uuid: c.uuid.to_string(),
                                    properties: u32::from(c.properties.bits()),
                                })
                                .collect(),
                        })
                        .collect(),
                },
                Err(e) => {
                    tracing::warn!("Service discovery failed: {}", e);
                    ConnectionEvent::ServicesDiscovered {
                        status: GATT_FAILURE_STATUS,
                        services: Vec::new(),
                    }
                }
            };
            let _ = events.send(BleEvent::Connection { handle, event });
        });
    }

    fn read_characteristic(&self, handle: ConnectionHandle, characteristic: CharacteristicRef) {
        let Some(peripheral) = self.link(handle) else {
            return;
        };
        let target = peripheral.characteristics().into_iter().find(|c| {
            c.uuid.to_string() == characteristic.uuid
                && c.service_uuid.to_string() == characteristic.service_uuid
        });
        let Some(target) = target else {
            self.emit(
                handle,
                ConnectionEvent::CharacteristicRead {
                    characteristic,
                    status: GATT_FAILURE_STATUS,
                    value: Vec::new(),
                },
            );
            return;
        };

        let events = self.events.clone();
        self.runtime.spawn(async move {
            let (status, value) = match peripheral.read(&target).await {
                Ok(value) => (0, value),
                Err(e) => {
                    tracing::debug!("Read of {} failed: {}", characteristic.uuid, e);
                    (GATT_FAILURE_STATUS, Vec::new())
                }
            };
            let _ = events.send(BleEvent::Connection {
                handle,
                event: ConnectionEvent::CharacteristicRead {
                    characteristic,
                    status,
                    value,
                },
            });
        });
    }

    fn close_connection(&self, handle: ConnectionHandle) {
        let Some(peripheral) = self.links.lock().remove(&handle) else {
            return;
        };
        self.runtime.spawn(async move {
            if let Err(e) = peripheral.disconnect().await {
                tracing::debug!("Disconnect failed: {}", e);
            }
        });
    }
}
