//! Ordered, idempotent writes for one resolved row
//!
//! Device first, then uplink, then the uplink id is read back and the
//! measurement is attached to it. The engine never commits; it only issues
//! writes against the job transaction it is handed.

use chrono::NaiveDateTime;

use super::parsers::{parse_bool, parse_float, parse_int, parse_location};
use crate::db::store::JobTransaction;
use crate::error::RowError;
use crate::types::{
    CsvUplinkRecord, DeviceUpsert, MeasurementUpsert, SoundReading, UplinkRow, UplinkUpsert,
    UpsertOutcome,
};

/// Entity-level effects of one successfully written row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowEffects {
    pub device: UpsertOutcome,
    pub uplink: UpsertOutcome,
    pub measurement_written: bool,
}

/// Build the typed row for a record whose identity and timestamp resolved.
pub fn build_row(dev_eui: String, time: NaiveDateTime, record: &CsvUplinkRecord) -> UplinkRow {
    let text = CsvUplinkRecord::text;

    let device = DeviceUpsert {
        dev_eui: dev_eui.clone(),
        device_name: text(&record.device_name),
        application_name: text(&record.application_name),
        tenant_name: text(&record.tenant_name),
        device_profile_name: text(&record.device_profile_name),
        description: text(&record.description),
        address: text(&record.address),
        location: parse_location(record.location.as_deref()),
    };

    let uplink = UplinkUpsert {
        deduplication_id: record.dedup_key().map(str::to_string),
        dev_eui,
        time,
        f_port: parse_int(record.f_port.as_deref()),
        f_cnt: parse_int(record.f_cnt.as_deref()),
        adr: parse_bool(record.adr.as_deref()),
        dr: parse_int(record.dr.as_deref()),
        confirmed: parse_bool(record.confirmed.as_deref()),
        margin: parse_int(record.margin.as_deref()),
        battery_level_unavailable: parse_bool(record.battery_level_unavailable.as_deref()),
        external_power_source: parse_bool(record.external_power_source.as_deref()),
        battery_level: parse_float(record.battery_level.as_deref()),
        raw_data: text(&record.data),
    };

    let reading = SoundReading {
        laeq: parse_float(record.laeq.as_deref()),
        lai: parse_float(record.lai.as_deref()),
        lai_max: parse_float(record.lai_max.as_deref()),
        object_battery: parse_float(record.object_battery.as_deref()),
        status: text(&record.object_status),
    };

    UplinkRow {
        device,
        uplink,
        reading,
    }
}

/// Write one row: device, uplink, uplink id lookup, optional measurement.
pub async fn apply_row(
    tx: &mut dyn JobTransaction,
    row: &UplinkRow,
) -> Result<RowEffects, RowError> {
    let device = tx.upsert_device(&row.device).await?;
    let uplink = tx.upsert_uplink(&row.uplink).await?;

    let uplink_id = tx
        .find_uplink_id(&row.uplink.key())
        .await?
        .ok_or(RowError::UplinkNotFound)?;

    let measurement_written = if row.reading.has_values() {
        tx.upsert_measurement(&MeasurementUpsert {
            uplink_id,
            reading: row.reading.clone(),
        })
        .await?;
        true
    } else {
        false
    };

    Ok(RowEffects {
        device,
        uplink,
        measurement_written,
    })
}
