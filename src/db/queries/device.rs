//! Device database queries

use sqlx::PgConnection;

use crate::types::{DeviceUpsert, UpsertOutcome};

// `xmax = 0` holds only for a tuple created by this statement, so it tells
// an insert from an ON CONFLICT update.
const UPSERT_DEVICE_WITH_LOCATION: &str = r#"
    INSERT INTO devices (
        dev_eui, device_name, application_name, tenant_name,
        device_profile_name, description, address,
        location_lat, location_lon
    )
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
    ON CONFLICT (dev_eui) DO UPDATE
        SET device_name         = COALESCE(EXCLUDED.device_name, devices.device_name),
            application_name    = COALESCE(EXCLUDED.application_name, devices.application_name),
            tenant_name         = COALESCE(EXCLUDED.tenant_name, devices.tenant_name),
            device_profile_name = COALESCE(EXCLUDED.device_profile_name, devices.device_profile_name),
            description         = COALESCE(EXCLUDED.description, devices.description),
            address             = COALESCE(EXCLUDED.address, devices.address),
            location_lat        = EXCLUDED.location_lat,
            location_lon        = EXCLUDED.location_lon,
            updated_at          = now()
    RETURNING (xmax = 0) AS inserted
"#;

const UPSERT_DEVICE: &str = r#"
    INSERT INTO devices (
        dev_eui, device_name, application_name, tenant_name,
        device_profile_name, description, address
    )
    VALUES ($1, $2, $3, $4, $5, $6, $7)
    ON CONFLICT (dev_eui) DO UPDATE
        SET device_name         = COALESCE(EXCLUDED.device_name, devices.device_name),
            application_name    = COALESCE(EXCLUDED.application_name, devices.application_name),
            tenant_name         = COALESCE(EXCLUDED.tenant_name, devices.tenant_name),
            device_profile_name = COALESCE(EXCLUDED.device_profile_name, devices.device_profile_name),
            description         = COALESCE(EXCLUDED.description, devices.description),
            address             = COALESCE(EXCLUDED.address, devices.address),
            updated_at          = now()
    RETURNING (xmax = 0) AS inserted
"#;

/// Insert or merge a device. Coordinates are only written when both parsed.
pub async fn upsert_device(
    conn: &mut PgConnection,
    device: &DeviceUpsert,
) -> Result<UpsertOutcome, sqlx::Error> {
    let query = match device.location {
        Some(_) => UPSERT_DEVICE_WITH_LOCATION,
        None => UPSERT_DEVICE,
    };

    let mut query = sqlx::query_scalar::<_, bool>(query)
        .bind(&device.dev_eui)
        .bind(device.device_name.as_deref())
        .bind(device.application_name.as_deref())
        .bind(device.tenant_name.as_deref())
        .bind(device.device_profile_name.as_deref())
        .bind(device.description.as_deref())
        .bind(device.address.as_deref());

    if let Some(location) = device.location {
        query = query.bind(location.lat).bind(location.lon);
    }

    let inserted = query.fetch_one(conn).await?;
    Ok(UpsertOutcome::from_inserted(inserted))
}
