//! Plugin orchestrator
//!
//! Owns at most one scan and one connection at a time, routes platform
//! events to the matching session and arms their timers. Transitions are
//! computed under a single lock; transport calls and result deliveries run
//! after it is released, so adapters may call back into the plugin from
//! inside a transport method.

use std::collections::HashSet;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::runtime::Handle;
use tokio::time::Instant;

use crate::ble::connection::{ConnectionCommand, ConnectionEvent, ConnectionSession};
use crate::ble::scan::ScanSession;
use crate::ble::sink::{channel_sink, Delivery, OneShot, ResultSink};
use crate::ble::transport::{BleEvent, BleTransport};
use crate::ble::types::{ConnectionHandle, DiscoveredDevice, ServiceRecord};
use crate::ble::BleError;
use crate::config::PluginConfig;
use crate::PluginError;

// Mobile callback threads usually have no tokio context, so timers fall back
// to a process-wide runtime built on first use.
static GLOBAL_RT: RwLock<Option<tokio::runtime::Runtime>> = RwLock::new(None);

fn get_global_runtime() -> Result<Handle, PluginError> {
    let rt_read = GLOBAL_RT.read();
    if let Some(rt) = &*rt_read {
        return Ok(rt.handle().clone());
    }
    drop(rt_read);

    let mut rt_write = GLOBAL_RT.write();
    if let Some(rt) = &*rt_write {
        return Ok(rt.handle().clone());
    }

    tracing::info!("Initializing global Tokio runtime for BLE timers...");
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .thread_name("gattscope-timer")
        .enable_all()
        .build()
        .map_err(|e| PluginError::RuntimeUnavailable(e.to_string()))?;
    let handle = rt.handle().clone();
    *rt_write = Some(rt);
    Ok(handle)
}

fn runtime_handle() -> Result<Handle, PluginError> {
    match Handle::try_current() {
        Ok(handle) => Ok(handle),
        Err(_) => get_global_runtime(),
    }
}

fn deliver<T>(delivery: Option<Delivery<T>>) {
    if let Some(delivery) = delivery {
        delivery.send();
    }
}

struct ActiveScan {
    session: ScanSession,
    sink: OneShot<Vec<DiscoveredDevice>>,
}

struct ActiveConnection {
    session: ConnectionSession,
    sink: OneShot<Vec<ServiceRecord>>,
    last_progress: Instant,
}

#[derive(Default)]
struct PluginState {
    next_request_id: u64,
    scan: Option<ActiveScan>,
    connection: Option<ActiveConnection>,
    /// Addresses delivered by the last completed scan
    known_devices: HashSet<String>,
}

impl PluginState {
    fn next_id(&mut self) -> u64 {
        self.next_request_id += 1;
        self.next_request_id
    }
}

struct Inner {
    transport: Arc<dyn BleTransport>,
    config: PluginConfig,
    state: Mutex<PluginState>,
    runtime: Handle,
}

/// BLE scan + GATT inspection plugin
#[derive(Clone)]
pub struct BlePlugin {
    inner: Arc<Inner>,
}

impl BlePlugin {
    /// Build a plugin whose timers run on the current tokio runtime, or on a
    /// shared background runtime when called outside one
    pub fn with_transport(
        transport: Arc<dyn BleTransport>,
        config: PluginConfig,
    ) -> Result<Self, PluginError> {
        let runtime = runtime_handle()?;
        Self::with_runtime(transport, config, runtime)
    }

    pub fn with_runtime(
        transport: Arc<dyn BleTransport>,
        config: PluginConfig,
        runtime: Handle,
    ) -> Result<Self, PluginError> {
        config.validate()?;
        tracing::debug!("BlePlugin created with {:?}", config);
        Ok(Self {
            inner: Arc::new(Inner {
                transport,
                config,
                state: Mutex::new(PluginState::default()),
                runtime,
            }),
        })
    }

    pub fn config(&self) -> &PluginConfig {
        &self.inner.config
    }

    pub fn is_scanning(&self) -> bool {
        self.inner.state.lock().scan.is_some()
    }

    pub fn is_connecting(&self) -> bool {
        self.inner.state.lock().connection.is_some()
    }

    /// Addresses from the last completed scan
    pub fn known_devices(&self) -> Vec<String> {
        let mut addresses: Vec<_> = self.inner.state.lock().known_devices.iter().cloned().collect();
        addresses.sort();
        addresses
    }

    /// Scan for nearby devices for the configured window. `sink` receives
    /// the devices in first-seen order, or the error that prevented the scan.
    pub fn start_scan(&self, sink: Box<dyn ResultSink<Vec<DiscoveredDevice>>>) {
        let mut once = OneShot::new("scan", sink);
        let transport = &self.inner.transport;

        if !transport.request_radio_permission() {
            tracing::warn!("Scan refused: Bluetooth permissions are not granted");
            return deliver(once.settle(Err(BleError::PermissionDenied)));
        }
        if !transport.is_radio_available() {
            tracing::warn!("Scan refused: Bluetooth is not available");
            return deliver(once.settle(Err(BleError::BluetoothUnavailable)));
        }

        let (id, window) = {
            let mut state = self.inner.state.lock();
            if state.scan.is_some() {
                drop(state);
                return deliver(once.settle(Err(BleError::Busy("scan"))));
            }
            let id = state.next_id();
            let mut session = ScanSession::new(id, self.inner.config.scan_window());
            if let Err(e) = session.start() {
                drop(state);
                return deliver(once.settle(Err(e)));
            }
            let window = session.window();
            state.scan = Some(ActiveScan {
                session,
                sink: once,
            });
            (id, window)
        };

        tracing::info!("Starting BLE scan #{} for {:?}", id, window);
        transport.begin_discovery();

        let inner = Arc::downgrade(&self.inner);
        self.inner.runtime.spawn(async move {
            tokio::time::sleep(window).await;
            if let Some(inner) = inner.upgrade() {
                inner.finish_scan(id, None);
            }
        });
    }

    /// Connect to `address`, discover its services and read every readable
    /// characteristic. `sink` receives the aggregated services once.
    pub fn connect(&self, address: &str, sink: Box<dyn ResultSink<Vec<ServiceRecord>>>) {
        let mut once = OneShot::new("connect", sink);
        let address = address.trim();
        let transport = &self.inner.transport;

        if address.is_empty() {
            return deliver(once.settle(Err(BleError::InvalidArgument(
                "Device ID is empty".to_string(),
            ))));
        }
        if !transport.request_radio_permission() {
            tracing::warn!("Connect refused: Bluetooth permissions are not granted");
            return deliver(once.settle(Err(BleError::PermissionDenied)));
        }
        if !transport.is_radio_available() {
            tracing::warn!("Connect refused: Bluetooth is not available");
            return deliver(once.settle(Err(BleError::BluetoothUnavailable)));
        }

        let (request_id, transition) = {
            let mut state = self.inner.state.lock();
            if state.connection.is_some() {
                drop(state);
                return deliver(once.settle(Err(BleError::Busy("connect"))));
            }
            if self.inner.config.require_scanned_device && !state.known_devices.contains(address) {
                drop(state);
                tracing::warn!("Device {} was not seen in the last scan", address);
                return deliver(once.settle(Err(BleError::DeviceNotFound(address.to_string()))));
            }

            let request_id = state.next_id();
            let mut session =
                ConnectionSession::new(request_id, address, self.inner.config.clone());
            let transition = session.start();
            state.connection = Some(ActiveConnection {
                session,
                sink: once,
                last_progress: Instant::now(),
            });
            (request_id, transition)
        };

        if let Some(timeout) = self.inner.config.operation_timeout() {
            self.inner.arm_operation_timer(request_id, timeout);
        }
        self.inner.run_commands(transition.commands);
    }

    /// Feed one platform callback into the plugin
    pub fn handle_event(&self, event: BleEvent) {
        match event {
            BleEvent::DeviceSighted { address, name } => {
                let mut state = self.inner.state.lock();
                match state.scan.as_mut() {
                    Some(active) => {
                        active.session.record_sighting(&address, name);
                    }
                    None => tracing::trace!("Sighting of {} with no active scan", address),
                }
            }
            BleEvent::ScanFailed { error_code } => {
                let mut state = self.inner.state.lock();
                match state.scan.as_mut() {
                    Some(active) => active.session.record_failure(error_code),
                    None => tracing::debug!("Scan failure {} with no active scan", error_code),
                }
            }
            BleEvent::RadioStateChanged { available } => {
                if available {
                    tracing::debug!("Bluetooth radio available");
                    return;
                }
                tracing::warn!("Bluetooth radio switched off");
                let scan_id = self.inner.state.lock().scan.as_ref().map(|a| a.session.id());
                if let Some(id) = scan_id {
                    self.inner.finish_scan(id, Some(BleError::BluetoothUnavailable));
                }
            }
            BleEvent::Connection { handle, event } => self.inner.on_connection_event(handle, event),
        }
    }

    /// Await a scan from async Rust code
    pub async fn scan(&self) -> Result<Vec<DiscoveredDevice>, BleError> {
        let (sink, rx) = channel_sink();
        self.start_scan(Box::new(sink));
        rx.await
            .unwrap_or_else(|_| Err(BleError::Disconnected("scan abandoned".to_string())))
    }

    /// Await a connect-and-read from async Rust code
    pub async fn inspect(&self, address: &str) -> Result<Vec<ServiceRecord>, BleError> {
        let (sink, rx) = channel_sink();
        self.connect(address, Box::new(sink));
        rx.await
            .unwrap_or_else(|_| Err(BleError::Disconnected("request abandoned".to_string())))
    }
}

impl Inner {
    /// Complete scan `id` with its devices, or with `error` when the radio
    /// went away. A stale id (the window firing after an abort) is a no-op.
    fn finish_scan(&self, id: u64, error: Option<BleError>) {
        let delivery = {
            let mut state = self.state.lock();
            if state.scan.as_ref().map(|a| a.session.id()) != Some(id) {
                tracing::debug!("Scan #{} already finished", id);
                return;
            }
            let Some(mut active) = state.scan.take() else {
                return;
            };
            let devices = active.session.complete().unwrap_or_default();
            let result = match error {
                Some(e) => {
                    tracing::warn!("Scan #{} aborted: {}", id, e);
                    Err(e)
                }
                None => {
                    tracing::info!("Scan #{} finished with {} devices", id, devices.len());
                    state.known_devices = devices.iter().map(|d| d.address.clone()).collect();
                    Ok(devices)
                }
            };
            active.sink.settle(result)
        };

        self.transport.end_discovery();
        deliver(delivery);
    }

    fn on_connection_event(&self, handle: ConnectionHandle, event: ConnectionEvent) {
        let (commands, delivery) = {
            let mut state = self.state.lock();
            let Some(active) = state.connection.as_mut() else {
                tracing::debug!("No active connection for {:?}; ignoring {:?}", handle, event);
                return;
            };
            if active.session.request_id() != handle.request_id {
                tracing::debug!("Event for finished request {}; ignoring", handle.request_id);
                return;
            }

            let before = active.session.progress();
            let transition = active.session.on_event(handle, event);
            if active.session.progress() != before {
                active.last_progress = Instant::now();
            }
            let delivery = transition
                .outcome
                .and_then(|outcome| active.sink.settle(outcome));
            if active.session.is_terminal() {
                state.connection = None;
            }
            (transition.commands, delivery)
        };

        self.run_commands(commands);
        deliver(delivery);
    }

    fn run_commands(&self, commands: Vec<ConnectionCommand>) {
        for command in commands {
            match command {
                ConnectionCommand::Open { handle, address } => {
                    if !self.transport.open_connection(handle, address) {
                        self.on_connection_event(handle, ConnectionEvent::OpenRejected);
                    }
                }
                ConnectionCommand::RequestHighPriority(handle) => {
                    self.transport.request_high_priority(handle)
                }
                ConnectionCommand::RequestMtu { handle, mtu } => {
                    self.transport.request_mtu(handle, mtu)
                }
                ConnectionCommand::DiscoverServices(handle) => {
                    self.transport.discover_services(handle)
                }
                ConnectionCommand::Read {
                    handle,
                    characteristic,
                } => self.transport.read_characteristic(handle, characteristic),
                ConnectionCommand::Close(handle) => self.transport.close_connection(handle),
            }
        }
    }

    /// Fail request `request_id` once no event has advanced it for `timeout`
    fn arm_operation_timer(self: &Arc<Self>, request_id: u64, timeout: Duration) {
        let inner: Weak<Inner> = Arc::downgrade(self);
        self.runtime.spawn(async move {
            let mut deadline = Instant::now() + timeout;
            loop {
                tokio::time::sleep_until(deadline).await;
                let Some(inner) = inner.upgrade() else {
                    return;
                };
                let (handle, next) = {
                    let state = inner.state.lock();
                    match state.connection.as_ref() {
                        Some(active) if active.session.request_id() == request_id => {
                            (active.session.handle(), active.last_progress + timeout)
                        }
                        _ => return,
                    }
                };
                if next <= Instant::now() {
                    inner.on_connection_event(handle, ConnectionEvent::TimedOut);
                    return;
                }
                deadline = next;
            }
        });
    }
}
