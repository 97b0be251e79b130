//! Property tests for the scan and connection sessions
//!
//! Run with: cargo test --test test_session_properties

use std::collections::{HashMap, HashSet};

use gattscope_core::ble::connection::{ConnectionCommand, ConnectionSession};
use gattscope_core::ble::scan::{ScanSession, DEFAULT_SCAN_WINDOW};
use gattscope_core::ble::types::properties;
use gattscope_core::{
    BleError, CharacteristicRef, ConnectionEvent, DiscoveredCharacteristic, DiscoveredService,
    PluginConfig,
};
use proptest::prelude::*;

fn sightings() -> impl Strategy<Value = Vec<(String, Option<String>)>> {
    prop::collection::vec(
        (
            prop::sample::select(vec!["AA:01", "AA:02", "AA:03", "AA:04"]),
            prop::option::of("[a-z]{0,6}"),
        ),
        0..40,
    )
    .prop_map(|v| {
        v.into_iter()
            .map(|(address, name)| (address.to_string(), name))
            .collect()
    })
}

fn opens(commands: &[ConnectionCommand]) -> usize {
    commands
        .iter()
        .filter(|c| matches!(c, ConnectionCommand::Open { .. }))
        .count()
}

proptest! {
    #[test]
    fn test_scan_keeps_first_sighting_per_address(sightings in sightings()) {
        let mut session = ScanSession::new(1, DEFAULT_SCAN_WINDOW);
        session.start().unwrap();
        for (address, name) in &sightings {
            session.record_sighting(address, name.clone());
        }
        let devices = session.complete().unwrap();

        let unique: HashSet<_> = devices.iter().map(|d| d.address.clone()).collect();
        prop_assert_eq!(unique.len(), devices.len());

        let mut first: Vec<(String, Option<String>)> = Vec::new();
        for (address, name) in sightings {
            if !first.iter().any(|(a, _)| *a == address) {
                first.push((address, name));
            }
        }
        prop_assert_eq!(first.len(), devices.len());
        for (device, (address, name)) in devices.iter().zip(first) {
            prop_assert_eq!(&device.address, &address);
            match name.filter(|n| !n.trim().is_empty()) {
                Some(name) => prop_assert_eq!(&device.name, &name),
                None => prop_assert_eq!(device.name.as_str(), "Unknown Device"),
            }
        }
    }

    #[test]
    fn test_busy_retries_are_bounded(max_retries in 0u32..6, drops in 0u32..10) {
        let config = PluginConfig { max_retries, ..PluginConfig::default() };
        let busy = config.busy_status_code;
        let mut session = ConnectionSession::new(1, "AA:BB", config);

        let mut open_count = opens(&session.start().commands);
        let mut outcome = None;
        for _ in 0..drops {
            let handle = session.handle();
            let transition = session.on_event(handle, ConnectionEvent::Disconnected { status: busy });
            open_count += opens(&transition.commands);
            if let Some(result) = transition.outcome {
                prop_assert!(outcome.is_none());
                outcome = Some(result);
            }
        }

        prop_assert!(session.retry_count() <= max_retries);
        prop_assert_eq!(open_count as u32, drops.min(max_retries) + 1);
        if drops > max_retries {
            prop_assert!(matches!(outcome, Some(Err(BleError::Disconnected(_)))));
        } else {
            prop_assert!(outcome.is_none());
        }
    }

    #[test]
    fn test_walk_completes_once_with_successful_reads(
        layout in prop::collection::vec(prop::collection::vec((any::<bool>(), any::<bool>()), 0..5), 0..4)
    ) {
        // layout[s][c] = (readable, read succeeds)
        let services: Vec<DiscoveredService> = layout
            .iter()
            .enumerate()
            .map(|(s, chars)| DiscoveredService {
                uuid: format!("s{}", s),
                characteristics: chars
                    .iter()
                    .enumerate()
                    .map(|(c, (readable, _))| DiscoveredCharacteristic {
                        uuid: format!("s{}c{}", s, c),
                        properties: if *readable { properties::READ } else { properties::NOTIFY },
                    })
                    .collect(),
            })
            .collect();
        let succeeds: HashMap<String, bool> = layout
            .iter()
            .enumerate()
            .flat_map(|(s, chars)| {
                chars
                    .iter()
                    .enumerate()
                    .map(move |(c, (_, ok))| (format!("s{}c{}", s, c), *ok))
            })
            .collect();

        let mut session = ConnectionSession::new(1, "AA:BB", PluginConfig::default());
        session.start();
        let handle = session.handle();
        session.on_event(handle, ConnectionEvent::Connected);
        let discovered = session.on_event(
            handle,
            ConnectionEvent::ServicesDiscovered { status: 0, services },
        );

        let reads: Vec<CharacteristicRef> = discovered
            .commands
            .iter()
            .filter_map(|c| match c {
                ConnectionCommand::Read { characteristic, .. } => Some(characteristic.clone()),
                _ => None,
            })
            .collect();

        let mut outcomes = Vec::new();
        outcomes.extend(discovered.outcome);
        for characteristic in &reads {
            let ok = succeeds[&characteristic.uuid];
            let transition = session.on_event(
                handle,
                ConnectionEvent::CharacteristicRead {
                    characteristic: characteristic.clone(),
                    status: if ok { 0 } else { 1 },
                    value: vec![1],
                },
            );
            outcomes.extend(transition.outcome);
        }

        prop_assert_eq!(outcomes.len(), 1);
        let services = outcomes.remove(0).unwrap();
        prop_assert_eq!(services.len(), layout.len());
        let recorded: usize = services.iter().map(|s| s.characteristics.len()).sum();
        let expected = layout
            .iter()
            .flatten()
            .filter(|(readable, ok)| *readable && *ok)
            .count();
        prop_assert_eq!(recorded, expected);
    }
}
