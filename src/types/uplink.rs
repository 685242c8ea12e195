//! Typed write models for the three ingested entities

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Whether an upsert created a new row or updated an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

impl UpsertOutcome {
    pub fn from_inserted(inserted: bool) -> Self {
        if inserted {
            Self::Inserted
        } else {
            Self::Updated
        }
    }
}

/// Latitude/longitude pair. Only ever built when both components parsed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeviceUpsert {
    pub dev_eui: String,
    pub device_name: Option<String>,
    pub application_name: Option<String>,
    pub tenant_name: Option<String>,
    pub device_profile_name: Option<String>,
    pub description: Option<String>,
    pub address: Option<String>,
    /// `None` leaves stored coordinates untouched
    pub location: Option<Location>,
}

/// Idempotency key of an uplink
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UplinkKey {
    Dedup(String),
    Fallback {
        dev_eui: String,
        time: NaiveDateTime,
        f_cnt: Option<i64>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct UplinkUpsert {
    pub deduplication_id: Option<String>,
    pub dev_eui: String,
    pub time: NaiveDateTime,
    pub f_port: Option<i64>,
    pub f_cnt: Option<i64>,
    pub adr: Option<bool>,
    pub dr: Option<i64>,
    pub confirmed: Option<bool>,
    pub margin: Option<i64>,
    pub battery_level_unavailable: Option<bool>,
    pub external_power_source: Option<bool>,
    pub battery_level: Option<f64>,
    pub raw_data: Option<String>,
}

impl UplinkUpsert {
    pub fn key(&self) -> UplinkKey {
        match &self.deduplication_id {
            Some(id) => UplinkKey::Dedup(id.clone()),
            None => UplinkKey::Fallback {
                dev_eui: self.dev_eui.clone(),
                time: self.time,
                f_cnt: self.f_cnt,
            },
        }
    }
}

/// Acoustic readings, without the parent link
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SoundReading {
    pub laeq: Option<f64>,
    pub lai: Option<f64>,
    pub lai_max: Option<f64>,
    pub object_battery: Option<f64>,
    pub status: Option<String>,
}

impl SoundReading {
    /// A measurement row is only written when at least one value is present.
    pub fn has_values(&self) -> bool {
        self.laeq.is_some()
            || self.lai.is_some()
            || self.lai_max.is_some()
            || self.object_battery.is_some()
            || self.status.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementUpsert {
    pub uplink_id: i64,
    pub reading: SoundReading,
}

/// One fully resolved and typed CSV row, ready for the upsert engine
#[derive(Debug, Clone, PartialEq)]
pub struct UplinkRow {
    pub device: DeviceUpsert,
    pub uplink: UplinkUpsert,
    pub reading: SoundReading,
}
