//! Raw CSV row as exported by the network server
//!
//! Every column is an optional string; typing happens later in
//! `services::parsers`. Missing columns and empty cells both decode as `None`.

use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CsvUplinkRecord {
    #[serde(rename = "devAddr")]
    pub dev_addr: Option<String>,
    #[serde(rename = "deviceInfo.devEui")]
    pub dev_eui: Option<String>,
    #[serde(rename = "deviceInfo.devEUI")]
    pub dev_eui_upper: Option<String>,
    #[serde(rename = "time")]
    pub time: Option<String>,

    #[serde(rename = "deviceInfo.deviceName")]
    pub device_name: Option<String>,
    #[serde(rename = "deviceInfo.applicationName")]
    pub application_name: Option<String>,
    #[serde(rename = "deviceInfo.tenantName")]
    pub tenant_name: Option<String>,
    #[serde(rename = "deviceInfo.deviceProfileName")]
    pub device_profile_name: Option<String>,
    #[serde(rename = "deviceInfo.tags.Description")]
    pub description: Option<String>,
    #[serde(rename = "deviceInfo.tags.Address")]
    pub address: Option<String>,
    #[serde(rename = "deviceInfo.tags.Location")]
    pub location: Option<String>,

    #[serde(rename = "context.deduplication_id")]
    pub context_deduplication_id: Option<String>,
    #[serde(rename = "deduplicationId")]
    pub deduplication_id: Option<String>,

    #[serde(rename = "fPort")]
    pub f_port: Option<String>,
    #[serde(rename = "fCnt")]
    pub f_cnt: Option<String>,
    #[serde(rename = "adr")]
    pub adr: Option<String>,
    #[serde(rename = "dr")]
    pub dr: Option<String>,
    #[serde(rename = "confirmed")]
    pub confirmed: Option<String>,
    #[serde(rename = "margin")]
    pub margin: Option<String>,
    #[serde(rename = "batteryLevelUnavailable")]
    pub battery_level_unavailable: Option<String>,
    #[serde(rename = "externalPowerSource")]
    pub external_power_source: Option<String>,
    #[serde(rename = "batteryLevel")]
    pub battery_level: Option<String>,
    #[serde(rename = "data")]
    pub data: Option<String>,

    #[serde(rename = "object.LAeq")]
    pub laeq: Option<String>,
    #[serde(rename = "object.LAI")]
    pub lai: Option<String>,
    #[serde(rename = "object.LAImax")]
    pub lai_max: Option<String>,
    #[serde(rename = "object.battery")]
    pub object_battery: Option<String>,
    #[serde(rename = "object.status")]
    pub object_status: Option<String>,
}

/// Trimmed, non-empty view of an optional cell.
fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl CsvUplinkRecord {
    /// Device EUI, preferring the lower-case header spelling.
    pub fn device_identifier(&self) -> Option<&str> {
        present(&self.dev_eui).or_else(|| present(&self.dev_eui_upper))
    }

    pub fn device_address(&self) -> Option<&str> {
        present(&self.dev_addr)
    }

    /// Deduplication id, preferring `context.deduplication_id`.
    pub fn dedup_key(&self) -> Option<&str> {
        present(&self.context_deduplication_id).or_else(|| present(&self.deduplication_id))
    }

    pub fn text(value: &Option<String>) -> Option<String> {
        present(value).map(str::to_string)
    }
}

/// A decoded row together with its position in the source file.
#[derive(Debug, Clone)]
pub struct DecodedRow {
    /// 1-based line number of the record (header is line 1).
    pub line: u64,
    pub record: CsvUplinkRecord,
}
