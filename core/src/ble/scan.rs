/// BLE scan session
///
/// One discovery pass: sightings are deduplicated by address (first sighting
/// wins), stream errors are recorded without failing the pass, and the
/// session completes exactly once.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::{Duration, Instant};

use super::error::BleError;
use super::types::DiscoveredDevice;

/// Default scan window
pub const DEFAULT_SCAN_WINDOW: Duration = Duration::from_secs(10);

/// Scan session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanState {
    /// Created, discovery not yet opened
    Idle,
    /// Discovery stream open, collecting sightings
    Scanning,
    /// Terminal; the result has been taken
    Completed,
}

/// A single device-discovery pass
#[derive(Debug)]
pub struct ScanSession {
    id: u64,
    state: ScanState,
    window: Duration,
    started_at: Option<Instant>,
    devices: Vec<DiscoveredDevice>,
    seen: HashSet<String>,
    stream_errors: Vec<i32>,
}

impl ScanSession {
    pub fn new(id: u64, window: Duration) -> Self {
        Self {
            id,
            state: ScanState::Idle,
            window,
            started_at: None,
            devices: Vec::new(),
            seen: HashSet::new(),
            stream_errors: Vec::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn started_at(&self) -> Option<Instant> {
        self.started_at
    }

    /// Devices collected so far, in first-seen order
    pub fn devices(&self) -> &[DiscoveredDevice] {
        &self.devices
    }

    /// Error codes reported by the discovery stream
    pub fn stream_errors(&self) -> &[i32] {
        &self.stream_errors
    }

    /// Idle → Scanning
    pub fn start(&mut self) -> Result<(), BleError> {
        match self.state {
            ScanState::Idle => {
                self.state = ScanState::Scanning;
                self.started_at = Some(Instant::now());
                Ok(())
            }
            ScanState::Scanning | ScanState::Completed => Err(BleError::Busy("scan")),
        }
    }

    /// Record a sighting. Returns true if the address was new.
    pub fn record_sighting(&mut self, address: &str, name: Option<String>) -> bool {
        if self.state != ScanState::Scanning {
            tracing::trace!("Sighting of {} outside an active scan dropped", address);
            return false;
        }
        if !self.seen.insert(address.to_string()) {
            return false;
        }

        let device = DiscoveredDevice::from_sighting(address, name);
        tracing::debug!("Discovered {} ({})", device.address, device.name);
        self.devices.push(device);
        true
    }

    /// Record a stream-level failure. The pass keeps running until its window
    /// elapses.
    pub fn record_failure(&mut self, error_code: i32) {
        tracing::warn!(
            "Scan failed with error: {} ({} devices so far)",
            error_code,
            self.devices.len()
        );
        if self.state == ScanState::Scanning {
            self.stream_errors.push(error_code);
        }
    }

    /// Scanning → Completed. Yields the device list exactly once.
    pub fn complete(&mut self) -> Option<Vec<DiscoveredDevice>> {
        match self.state {
            ScanState::Scanning => {
                self.state = ScanState::Completed;
                self.seen.clear();
                Some(std::mem::take(&mut self.devices))
            }
            ScanState::Idle | ScanState::Completed => None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.state == ScanState::Completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ble::types::UNKNOWN_DEVICE_NAME;

    fn scanning() -> ScanSession {
        let mut session = ScanSession::new(1, DEFAULT_SCAN_WINDOW);
        session.start().expect("start");
        session
    }

    #[test]
    fn test_scan_session_lifecycle() {
        let mut session = ScanSession::new(7, Duration::from_millis(500));
        assert_eq!(session.state(), ScanState::Idle);
        assert!(session.started_at().is_none());

        session.start().expect("start");
        assert_eq!(session.state(), ScanState::Scanning);
        assert!(session.started_at().is_some());

        let devices = session.complete().expect("first completion");
        assert!(devices.is_empty());
        assert!(session.is_completed());
    }

    #[test]
    fn test_double_start_is_rejected() {
        let mut session = scanning();
        assert_eq!(session.start(), Err(BleError::Busy("scan")));
    }

    #[test]
    fn test_first_sighting_wins() {
        let mut session = scanning();

        assert!(session.record_sighting("AA:BB", Some("X".to_string())));
        assert!(!session.record_sighting("AA:BB", Some("Y".to_string())));

        let devices = session.complete().unwrap();
        assert_eq!(
            devices,
            vec![DiscoveredDevice {
                address: "AA:BB".to_string(),
                name: "X".to_string(),
            }]
        );
    }

    #[test]
    fn test_unnamed_sighting_is_not_upgraded_later() {
        let mut session = scanning();

        session.record_sighting("11:22", None);
        session.record_sighting("11:22", Some("Named Later".to_string()));

        let devices = session.complete().unwrap();
        assert_eq!(devices[0].name, UNKNOWN_DEVICE_NAME);
    }

    #[test]
    fn test_first_seen_order_is_kept() {
        let mut session = scanning();
        for address in ["C", "A", "B", "A", "C"] {
            session.record_sighting(address, None);
        }

        let addresses: Vec<_> = session
            .complete()
            .unwrap()
            .into_iter()
            .map(|d| d.address)
            .collect();
        assert_eq!(addresses, vec!["C", "A", "B"]);
    }

    #[test]
    fn test_stream_failure_does_not_complete_scan() {
        let mut session = scanning();
        session.record_failure(2);
        assert_eq!(session.state(), ScanState::Scanning);
        assert_eq!(session.stream_errors(), &[2]);

        session.record_sighting("AA:BB", Some("X".to_string()));
        assert_eq!(session.complete().unwrap().len(), 1);
    }

    #[test]
    fn test_completion_happens_once() {
        let mut session = scanning();
        session.record_sighting("AA:BB", None);

        assert!(session.complete().is_some());
        assert!(session.complete().is_none());
        assert!(!session.record_sighting("CC:DD", None));
    }

    #[test]
    fn test_sightings_before_start_are_dropped() {
        let mut session = ScanSession::new(1, DEFAULT_SCAN_WINDOW);
        assert!(!session.record_sighting("AA:BB", None));
        assert!(session.complete().is_none());
    }
}
