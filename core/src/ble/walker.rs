//! Service/characteristic walker
//!
//! Accumulates the nested service → characteristic result for one connection
//! attempt. Reads may complete in any order: progress is a tally of terminal
//! read outcomes against the number of reads registered, not an index.

use std::collections::{HashMap, HashSet};

use super::names;
use super::types::{
    CharacteristicRecord, CharacteristicRef, DiscoveredService, ServiceRecord, GATT_SUCCESS,
};
use crate::config::ReadFailurePolicy;

/// What the session should do after a read completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadProgress {
    /// The outcome was tallied
    Recorded,
    /// Re-issue this read; nothing was tallied
    Retry(CharacteristicRef),
    /// The completion did not match an outstanding read and was dropped
    Ignored,
}

/// Read traversal state for one connection attempt
#[derive(Debug, Default)]
pub struct TraversalState {
    services: Vec<ServiceRecord>,
    service_index: HashMap<String, usize>,
    outstanding: HashMap<CharacteristicRef, usize>,
    retried: HashSet<CharacteristicRef>,
    pending_read_count: usize,
    completed_read_count: usize,
    discovery_finished: bool,
}

impl TraversalState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending_read_count(&self) -> usize {
        self.pending_read_count
    }

    pub fn completed_read_count(&self) -> usize {
        self.completed_read_count
    }

    pub fn discovery_finished(&self) -> bool {
        self.discovery_finished
    }

    /// Services accumulated so far, in discovery order
    pub fn services(&self) -> &[ServiceRecord] {
        &self.services
    }

    /// Register the discovered services and return the reads to issue, in
    /// stack order. Services sharing a UUID collapse into the first record.
    pub fn begin(&mut self, discovered: Vec<DiscoveredService>) -> Vec<CharacteristicRef> {
        let mut reads = Vec::new();

        for service in discovered {
            if !self.service_index.contains_key(&service.uuid) {
                self.service_index
                    .insert(service.uuid.clone(), self.services.len());
                self.services.push(ServiceRecord {
                    display_name: names::service_name(&service.uuid).to_string(),
                    uuid: service.uuid.clone(),
                    characteristics: Vec::new(),
                });
            }

            for characteristic in service.characteristics {
                if !characteristic.is_readable() {
                    tracing::debug!(
                        "Characteristic {} does not allow reading",
                        characteristic.uuid
                    );
                    continue;
                }
                let read = CharacteristicRef::new(service.uuid.clone(), characteristic.uuid);
                *self.outstanding.entry(read.clone()).or_insert(0) += 1;
                self.pending_read_count += 1;
                reads.push(read);
            }
        }

        self.discovery_finished = true;
        tracing::debug!(
            "Walking {} services with {} readable characteristics",
            self.services.len(),
            self.pending_read_count
        );
        reads
    }

    /// Apply one read completion
    pub fn record_read(
        &mut self,
        characteristic: &CharacteristicRef,
        status: i32,
        value: Vec<u8>,
        policy: ReadFailurePolicy,
    ) -> ReadProgress {
        let Some(remaining) = self.outstanding.get_mut(characteristic) else {
            tracing::warn!(
                "Read completion for {} / {} was not outstanding",
                characteristic.service_uuid,
                characteristic.uuid
            );
            return ReadProgress::Ignored;
        };

        if status != GATT_SUCCESS {
            tracing::warn!(
                "Failed to read characteristic: {} (status {})",
                characteristic.uuid,
                status
            );
            if policy == ReadFailurePolicy::RetryOnce && self.retried.insert(characteristic.clone())
            {
                return ReadProgress::Retry(characteristic.clone());
            }
        }

        *remaining -= 1;
        if *remaining == 0 {
            self.outstanding.remove(characteristic);
        }
        self.completed_read_count += 1;

        let record = if status == GATT_SUCCESS {
            tracing::debug!(
                "Read {} = {}",
                characteristic.uuid,
                hex::encode(&value)
            );
            Some(Self::record(characteristic, value, None))
        } else if policy == ReadFailurePolicy::Report {
            Some(Self::record(characteristic, Vec::new(), Some(status)))
        } else {
            None
        };

        if let Some(record) = record {
            match self.service_index.get(&characteristic.service_uuid) {
                Some(&index) => self.services[index].characteristics.push(record),
                None => tracing::warn!(
                    "Characteristic {} belongs to undiscovered service {}",
                    characteristic.uuid,
                    characteristic.service_uuid
                ),
            }
        }

        ReadProgress::Recorded
    }

    /// Discovery has finished and every registered read reached a terminal
    /// outcome
    pub fn is_complete(&self) -> bool {
        self.discovery_finished && self.completed_read_count == self.pending_read_count
    }

    /// Take the accumulated result, leaving the state empty
    pub fn take_services(&mut self) -> Vec<ServiceRecord> {
        self.service_index.clear();
        std::mem::take(&mut self.services)
    }

    fn record(
        characteristic: &CharacteristicRef,
        value: Vec<u8>,
        failure_status: Option<i32>,
    ) -> CharacteristicRecord {
        CharacteristicRecord {
            uuid: characteristic.uuid.clone(),
            display_name: names::characteristic_name(&characteristic.uuid).to_string(),
            value,
            readable: true,
            failure_status,
        }
    }
}
