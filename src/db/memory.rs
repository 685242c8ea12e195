//! In-memory store for pipeline tests
//!
//! Mirrors the PostgreSQL upsert semantics (merge on device id, dedup key or
//! fallback key for uplinks, one measurement per uplink) and can inject
//! constraint violations, an unreachable database, or a connection that drops
//! after a number of uplink writes.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use parking_lot::Mutex;

use super::store::{IngestStore, JobTransaction, StoreError, StoreErrorKind};
use crate::types::{
    DeviceUpsert, MeasurementUpsert, SoundReading, UplinkKey, UplinkUpsert, UpsertOutcome,
};

type FallbackKey = (String, NaiveDateTime, Option<i64>);

#[derive(Debug, Clone, Default)]
struct Tables {
    devices: HashMap<String, DeviceUpsert>,
    uplinks: HashMap<i64, UplinkUpsert>,
    by_dedup: HashMap<String, i64>,
    by_fallback: HashMap<FallbackKey, i64>,
    measurements: HashMap<i64, SoundReading>,
    next_uplink_id: i64,
}

#[derive(Default)]
struct Faults {
    unavailable: bool,
    failing_dedup_ids: HashMap<String, StoreErrorKind>,
    hidden_dedup_ids: HashSet<String>,
    disconnect_after_uplinks: Option<usize>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    committed: Arc<Mutex<Tables>>,
    faults: Arc<Mutex<Faults>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `begin` fail as if the database were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.faults.lock().unavailable = unavailable;
    }

    /// Reject uplink writes carrying this dedup id with a constraint violation.
    pub fn reject_dedup_id(&self, dedup_id: &str) {
        self.fail_dedup_id(dedup_id, StoreErrorKind::Constraint);
    }

    /// Fail uplink writes carrying this dedup id with an error of `kind`.
    pub fn fail_dedup_id(&self, dedup_id: &str, kind: StoreErrorKind) {
        self.faults.lock().failing_dedup_ids.insert(dedup_id.to_string(), kind);
    }

    /// Accept the uplink write but make the id lookup for it come back empty.
    pub fn hide_uplink_id(&self, dedup_id: &str) {
        self.faults.lock().hidden_dedup_ids.insert(dedup_id.to_string());
    }

    /// Drop the connection of subsequent transactions after `n` uplink writes.
    pub fn lose_connection_after(&self, n: Option<usize>) {
        self.faults.lock().disconnect_after_uplinks = n;
    }

    pub fn device_count(&self) -> usize {
        self.committed.lock().devices.len()
    }

    pub fn uplink_count(&self) -> usize {
        self.committed.lock().uplinks.len()
    }

    pub fn measurement_count(&self) -> usize {
        self.committed.lock().measurements.len()
    }

    pub fn device(&self, dev_eui: &str) -> Option<DeviceUpsert> {
        self.committed.lock().devices.get(dev_eui).cloned()
    }

    pub fn measurement_for_dedup_id(&self, dedup_id: &str) -> Option<SoundReading> {
        let tables = self.committed.lock();
        let id = tables.by_dedup.get(dedup_id)?;
        tables.measurements.get(id).cloned()
    }

    pub fn uplink_by_dedup_id(&self, dedup_id: &str) -> Option<UplinkUpsert> {
        let tables = self.committed.lock();
        let id = tables.by_dedup.get(dedup_id)?;
        tables.uplinks.get(id).cloned()
    }
}

#[async_trait]
impl IngestStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn JobTransaction>, StoreError> {
        let (failing_dedup_ids, hidden_dedup_ids, disconnect_after_uplinks) = {
            let faults = self.faults.lock();
            if faults.unavailable {
                return Err(StoreError::new(
                    StoreErrorKind::Connectivity,
                    "connection refused",
                ));
            }
            (
                faults.failing_dedup_ids.clone(),
                faults.hidden_dedup_ids.clone(),
                faults.disconnect_after_uplinks,
            )
        };
        let working = self.committed.lock().clone();

        Ok(Box::new(MemoryTransaction {
            committed: Arc::clone(&self.committed),
            working,
            savepoint: None,
            failing_dedup_ids,
            hidden_dedup_ids,
            disconnect_after_uplinks,
            uplink_writes: 0,
        }))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

struct MemoryTransaction {
    committed: Arc<Mutex<Tables>>,
    working: Tables,
    savepoint: Option<Tables>,
    failing_dedup_ids: HashMap<String, StoreErrorKind>,
    hidden_dedup_ids: HashSet<String>,
    disconnect_after_uplinks: Option<usize>,
    uplink_writes: usize,
}

impl MemoryTransaction {
    fn check_connection(&self) -> Result<(), StoreError> {
        match self.disconnect_after_uplinks {
            Some(limit) if self.uplink_writes >= limit => Err(StoreError::new(
                StoreErrorKind::Connectivity,
                "connection reset by peer",
            )),
            _ => Ok(()),
        }
    }
}

fn merge(stored: &mut Option<String>, incoming: &Option<String>) {
    if incoming.is_some() {
        stored.clone_from(incoming);
    }
}

#[async_trait]
impl JobTransaction for MemoryTransaction {
    async fn savepoint(&mut self) -> Result<(), StoreError> {
        self.check_connection()?;
        self.savepoint = Some(self.working.clone());
        Ok(())
    }

    async fn release_savepoint(&mut self) -> Result<(), StoreError> {
        self.check_connection()?;
        self.savepoint = None;
        Ok(())
    }

    async fn rollback_to_savepoint(&mut self) -> Result<(), StoreError> {
        self.check_connection()?;
        if let Some(snapshot) = self.savepoint.take() {
            self.working = snapshot;
        }
        Ok(())
    }

    async fn upsert_device(&mut self, device: &DeviceUpsert) -> Result<UpsertOutcome, StoreError> {
        self.check_connection()?;
        match self.working.devices.get_mut(&device.dev_eui) {
            Some(stored) => {
                merge(&mut stored.device_name, &device.device_name);
                merge(&mut stored.application_name, &device.application_name);
                merge(&mut stored.tenant_name, &device.tenant_name);
                merge(&mut stored.device_profile_name, &device.device_profile_name);
                merge(&mut stored.description, &device.description);
                merge(&mut stored.address, &device.address);
                if device.location.is_some() {
                    stored.location = device.location;
                }
                Ok(UpsertOutcome::Updated)
            }
            None => {
                self.working.devices.insert(device.dev_eui.clone(), device.clone());
                Ok(UpsertOutcome::Inserted)
            }
        }
    }

    async fn upsert_uplink(&mut self, uplink: &UplinkUpsert) -> Result<UpsertOutcome, StoreError> {
        self.check_connection()?;
        if let Some(dedup_id) = &uplink.deduplication_id {
            match self.failing_dedup_ids.get(dedup_id) {
                Some(StoreErrorKind::Constraint) => {
                    return Err(StoreError::new(
                        StoreErrorKind::Constraint,
                        format!("value too long for deduplication_id '{}'", dedup_id),
                    ));
                }
                Some(kind) => {
                    return Err(StoreError::new(
                        *kind,
                        format!("unexpected failure writing uplink '{}'", dedup_id),
                    ));
                }
                None => {}
            }
        }
        if !self.working.devices.contains_key(&uplink.dev_eui) {
            return Err(StoreError::new(
                StoreErrorKind::Constraint,
                "uplinks_dev_eui_fkey violated",
            ));
        }

        self.uplink_writes += 1;

        let existing = match uplink.key() {
            UplinkKey::Dedup(id) => self.working.by_dedup.get(&id).copied(),
            UplinkKey::Fallback { dev_eui, time, f_cnt } => {
                self.working.by_fallback.get(&(dev_eui, time, f_cnt)).copied()
            }
        };

        match existing {
            Some(id) => {
                if let Some(stored) = self.working.uplinks.get_mut(&id) {
                    let dev_eui = std::mem::take(&mut stored.dev_eui);
                    let time = stored.time;
                    *stored = UplinkUpsert {
                        dev_eui,
                        time,
                        ..uplink.clone()
                    };
                }
                Ok(UpsertOutcome::Updated)
            }
            None => {
                self.working.next_uplink_id += 1;
                let id = self.working.next_uplink_id;
                match uplink.key() {
                    UplinkKey::Dedup(dedup_id) => {
                        self.working.by_dedup.insert(dedup_id, id);
                    }
                    UplinkKey::Fallback { dev_eui, time, f_cnt } => {
                        self.working.by_fallback.insert((dev_eui, time, f_cnt), id);
                    }
                }
                self.working.uplinks.insert(id, uplink.clone());
                Ok(UpsertOutcome::Inserted)
            }
        }
    }

    async fn find_uplink_id(&mut self, key: &UplinkKey) -> Result<Option<i64>, StoreError> {
        self.check_connection()?;
        Ok(match key {
            UplinkKey::Dedup(id) if self.hidden_dedup_ids.contains(id) => None,
            UplinkKey::Dedup(id) => self.working.by_dedup.get(id).copied(),
            UplinkKey::Fallback { dev_eui, time, f_cnt } => self
                .working
                .by_fallback
                .get(&(dev_eui.clone(), *time, *f_cnt))
                .copied(),
        })
    }

    async fn upsert_measurement(
        &mut self,
        measurement: &MeasurementUpsert,
    ) -> Result<UpsertOutcome, StoreError> {
        self.check_connection()?;
        if !self.working.uplinks.contains_key(&measurement.uplink_id) {
            return Err(StoreError::new(
                StoreErrorKind::Constraint,
                "sound_measurements_uplink_id_fkey violated",
            ));
        }
        let previous = self
            .working
            .measurements
            .insert(measurement.uplink_id, measurement.reading.clone());
        Ok(UpsertOutcome::from_inserted(previous.is_none()))
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.check_connection()?;
        let working = self.working;
        *self.committed.lock() = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}
