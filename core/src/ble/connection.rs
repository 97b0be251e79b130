/// GATT connection session
///
/// Explicit state machine for one `connect` request. Every stack event goes
/// through [`ConnectionSession::handle`], which returns the transport
/// commands to issue and, at most once, the request's outcome. The session
/// performs no I/O itself.
///
/// ```text
/// Idle → Connecting → ServiceDiscovering → Reading → Completed
///          ↺ busy disconnect (≤ max_retries)
/// any non-terminal state → Failed
/// ```

use serde::{Deserialize, Serialize};

use super::error::BleError;
use super::types::{
    CharacteristicRef, ConnectionHandle, DiscoveredService, ServiceRecord, GATT_SUCCESS,
};
use super::walker::{ReadProgress, TraversalState};
use crate::config::PluginConfig;

/// Connection session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    Idle,
    Connecting,
    ServiceDiscovering,
    Reading,
    Completed,
    Failed,
}

impl ConnectionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConnectionState::Completed | ConnectionState::Failed)
    }

    fn activity(&self) -> &'static str {
        match self {
            ConnectionState::Idle | ConnectionState::Connecting => "connecting",
            ConnectionState::ServiceDiscovering => "discovering services",
            ConnectionState::Reading => "reading characteristics",
            ConnectionState::Completed | ConnectionState::Failed => "finished",
        }
    }
}

/// Stack events relevant to a connection session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// The link is up
    Connected,
    /// The link went down with the given stack status
    Disconnected { status: i32 },
    /// The transport could not resolve the address to a peer
    OpenRejected,
    MtuChanged { mtu: u32, status: i32 },
    ServicesDiscovered {
        status: i32,
        services: Vec<DiscoveredService>,
    },
    CharacteristicRead {
        characteristic: CharacteristicRef,
        status: i32,
        value: Vec<u8>,
    },
    /// No event advanced the session within the operation timeout
    TimedOut,
}

/// Transport work requested by a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionCommand {
    Open {
        handle: ConnectionHandle,
        address: String,
    },
    RequestHighPriority(ConnectionHandle),
    RequestMtu {
        handle: ConnectionHandle,
        mtu: u32,
    },
    DiscoverServices(ConnectionHandle),
    Read {
        handle: ConnectionHandle,
        characteristic: CharacteristicRef,
    },
    Close(ConnectionHandle),
}

/// Output of one transition
#[derive(Debug, Default)]
pub struct Transition {
    pub commands: Vec<ConnectionCommand>,
    pub outcome: Option<Result<Vec<ServiceRecord>, BleError>>,
}

impl Transition {
    fn commands(commands: Vec<ConnectionCommand>) -> Self {
        Self {
            commands,
            outcome: None,
        }
    }
}

/// One `connect` request: the current attempt, its retry count and its
/// traversal
#[derive(Debug)]
pub struct ConnectionSession {
    request_id: u64,
    address: String,
    state: ConnectionState,
    retry_count: u32,
    config: PluginConfig,
    traversal: TraversalState,
    progress: u64,
}

impl ConnectionSession {
    pub fn new(request_id: u64, address: impl Into<String>, config: PluginConfig) -> Self {
        Self {
            request_id,
            address: address.into(),
            state: ConnectionState::Idle,
            retry_count: 0,
            config,
            traversal: TraversalState::new(),
            progress: 0,
        }
    }

    pub fn request_id(&self) -> u64 {
        self.request_id
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Handle owned by the current attempt
    pub fn handle(&self) -> ConnectionHandle {
        ConnectionHandle {
            request_id: self.request_id,
            attempt: self.retry_count,
        }
    }

    pub fn traversal(&self) -> &TraversalState {
        &self.traversal
    }

    /// Monotonic counter bumped by every accepted event; used to tell whether
    /// an operation timer is stale
    pub fn progress(&self) -> u64 {
        self.progress
    }

    /// Idle → Connecting: open attempt #0
    pub fn start(&mut self) -> Transition {
        if self.state != ConnectionState::Idle {
            return Transition::default();
        }
        self.state = ConnectionState::Connecting;
        self.progress += 1;
        tracing::info!("Connecting to {}", self.address);
        Transition::commands(vec![ConnectionCommand::Open {
            handle: self.handle(),
            address: self.address.clone(),
        }])
    }

    /// Apply one stack event for `handle`
    pub fn on_event(&mut self, handle: ConnectionHandle, event: ConnectionEvent) -> Transition {
        if self.state.is_terminal() {
            tracing::debug!(
                "Ignoring {:?} for {}: session already {:?}",
                event,
                self.address,
                self.state
            );
            return Transition::default();
        }
        if handle != self.handle() {
            tracing::debug!(
                "Ignoring event for stale attempt {} of {} (current {})",
                handle.attempt,
                self.address,
                self.retry_count
            );
            return Transition::default();
        }
        self.progress += 1;

        match event {
            ConnectionEvent::Connected => self.on_connected(),
            ConnectionEvent::Disconnected { status } => self.on_disconnected(status),
            ConnectionEvent::OpenRejected => {
                self.state = ConnectionState::Failed;
                Transition {
                    commands: Vec::new(),
                    outcome: Some(Err(BleError::DeviceNotFound(self.address.clone()))),
                }
            }
            ConnectionEvent::MtuChanged { mtu, status } => {
                if status == GATT_SUCCESS {
                    tracing::info!("MTU size successfully changed to {}", mtu);
                } else {
                    tracing::warn!("Failed to change MTU size (status {})", status);
                }
                Transition::default()
            }
            ConnectionEvent::ServicesDiscovered { status, services } => {
                self.on_services_discovered(status, services)
            }
            ConnectionEvent::CharacteristicRead {
                characteristic,
                status,
                value,
            } => self.on_characteristic_read(characteristic, status, value),
            ConnectionEvent::TimedOut => {
                let activity = self.state.activity();
                tracing::warn!("{} timed out while {}", self.address, activity);
                self.fail(BleError::Timeout(activity))
            }
        }
    }

    fn on_connected(&mut self) -> Transition {
        if self.state != ConnectionState::Connecting {
            tracing::debug!("Duplicate connected event for {}", self.address);
            return Transition::default();
        }
        tracing::info!("Connected to GATT server. Discovering services...");
        self.state = ConnectionState::ServiceDiscovering;
        let handle = self.handle();
        Transition::commands(vec![
            ConnectionCommand::RequestHighPriority(handle),
            ConnectionCommand::RequestMtu {
                handle,
                mtu: self.config.preferred_mtu,
            },
            ConnectionCommand::DiscoverServices(handle),
        ])
    }

    fn on_disconnected(&mut self, status: i32) -> Transition {
        let busy = status == self.config.busy_status_code;
        if busy && self.retry_count < self.config.max_retries {
            let stale = self.handle();
            self.retry_count += 1;
            self.traversal = TraversalState::new();
            self.state = ConnectionState::Connecting;
            tracing::warn!(
                "Connection failed with status {}. Retrying... ({}/{})",
                status,
                self.retry_count,
                self.config.max_retries
            );
            return Transition::commands(vec![
                ConnectionCommand::Close(stale),
                ConnectionCommand::Open {
                    handle: self.handle(),
                    address: self.address.clone(),
                },
            ]);
        }

        let reason = if busy {
            format!(
                "status {} after {} retries",
                status, self.config.max_retries
            )
        } else {
            format!("status {} while {}", status, self.state.activity())
        };
        tracing::warn!("Disconnected from {}: {}", self.address, reason);
        self.fail(BleError::Disconnected(reason))
    }

    fn on_services_discovered(
        &mut self,
        status: i32,
        services: Vec<DiscoveredService>,
    ) -> Transition {
        if self.state != ConnectionState::ServiceDiscovering {
            tracing::debug!("Unexpected service discovery result for {}", self.address);
            return Transition::default();
        }
        if status != GATT_SUCCESS {
            tracing::warn!("Service discovery on {} failed with status {}", self.address, status);
            return self.fail(BleError::ServiceDiscoveryFailed(status));
        }

        let handle = self.handle();
        let reads = self.traversal.begin(services);
        if self.traversal.is_complete() {
            tracing::info!("No characteristics to read. Returning services list.");
            return self.complete();
        }

        self.state = ConnectionState::Reading;
        Transition::commands(
            reads
                .into_iter()
                .map(|characteristic| ConnectionCommand::Read {
                    handle,
                    characteristic,
                })
                .collect(),
        )
    }

    fn on_characteristic_read(
        &mut self,
        characteristic: CharacteristicRef,
        status: i32,
        value: Vec<u8>,
    ) -> Transition {
        if self.state != ConnectionState::Reading {
            tracing::debug!("Unexpected characteristic read for {}", self.address);
            return Transition::default();
        }

        match self.traversal.record_read(
            &characteristic,
            status,
            value,
            self.config.read_failure_policy,
        ) {
            ReadProgress::Retry(characteristic) => Transition::commands(vec![ConnectionCommand::Read {
                handle: self.handle(),
                characteristic,
            }]),
            ReadProgress::Ignored => Transition::default(),
            ReadProgress::Recorded if self.traversal.is_complete() => {
                tracing::info!("All characteristics read. Returning services list.");
                self.complete()
            }
            ReadProgress::Recorded => Transition::default(),
        }
    }

    fn complete(&mut self) -> Transition {
        self.state = ConnectionState::Completed;
        Transition {
            commands: vec![ConnectionCommand::Close(self.handle())],
            outcome: Some(Ok(self.traversal.take_services())),
        }
    }

    fn fail(&mut self, error: BleError) -> Transition {
        self.state = ConnectionState::Failed;
        Transition {
            commands: vec![ConnectionCommand::Close(self.handle())],
            outcome: Some(Err(error)),
        }
    }
}
