//! Fixtures shared by unit tests

use std::path::PathBuf;

use uuid::Uuid;

pub const HEADER: &str = "devAddr,deviceInfo.devEui,time,deviceInfo.deviceName,\
deviceInfo.applicationName,deviceInfo.tenantName,deviceInfo.deviceProfileName,\
deviceInfo.tags.Description,deviceInfo.tags.Address,deviceInfo.tags.Location,\
deduplicationId,fPort,fCnt,adr,dr,confirmed,margin,batteryLevelUnavailable,\
externalPowerSource,batteryLevel,data,object.LAeq,object.LAI,object.LAImax,\
object.battery,object.status";

/// Fresh empty directory under the system temp dir
pub fn temp_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("sonometer-test-{}", Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

pub fn write_temp_file(contents: &str) -> PathBuf {
    let path = temp_dir().join("uplinks.csv");
    std::fs::write(&path, contents).unwrap();
    path
}

/// One CSV row in `HEADER` column order; unset fields are left empty
#[derive(Debug, Clone, Default)]
pub struct CsvRow {
    pub dev_addr: Option<String>,
    pub dev_eui: Option<String>,
    pub time: Option<String>,
    pub device_name: Option<String>,
    pub location: Option<String>,
    pub dedup_id: Option<String>,
    pub f_cnt: Option<String>,
    pub adr: Option<String>,
    pub laeq: Option<String>,
    pub status: Option<String>,
}

impl CsvRow {
    /// A complete, valid row for `dev_eui` with a measurement
    pub fn valid(dev_eui: &str, dedup_id: &str, minute: u32) -> Self {
        Self {
            dev_addr: Some(format!("addr-{}", dev_eui)),
            dev_eui: Some(dev_eui.to_string()),
            time: Some(format!("2024-11-13T22:{:02}:00.123Z", minute % 60)),
            device_name: Some(format!("Sonometer {}", dev_eui)),
            location: Some("-17.3935,-66.1570".to_string()),
            dedup_id: Some(dedup_id.to_string()),
            f_cnt: Some(minute.to_string()),
            adr: Some("true".to_string()),
            laeq: Some("61.5".to_string()),
            status: Some("OK".to_string()),
        }
    }

    fn fields(&self) -> Vec<String> {
        let cell = |v: &Option<String>| v.clone().unwrap_or_default();
        let mut fields = vec![String::new(); 26];
        fields[0] = cell(&self.dev_addr);
        fields[1] = cell(&self.dev_eui);
        fields[2] = cell(&self.time);
        fields[3] = cell(&self.device_name);
        fields[9] = cell(&self.location);
        fields[10] = cell(&self.dedup_id);
        fields[11] = "2".to_string();
        fields[12] = cell(&self.f_cnt);
        fields[13] = cell(&self.adr);
        fields[20] = "AQID".to_string();
        fields[21] = cell(&self.laeq);
        fields[25] = cell(&self.status);
        fields
    }
}

/// Write `rows` as a CSV file with the full export header
pub fn write_csv(rows: &[CsvRow]) -> PathBuf {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(HEADER.split(','))
        .unwrap();
    for row in rows {
        writer.write_record(row.fields()).unwrap();
    }
    let bytes = writer.into_inner().unwrap();
    write_temp_file(&String::from_utf8(bytes).unwrap())
}
