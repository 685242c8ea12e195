//! Sound measurement database queries

use sqlx::PgConnection;

use crate::types::{MeasurementUpsert, UpsertOutcome};

/// Insert or overwrite the measurement attached to an uplink
pub async fn upsert_measurement(
    conn: &mut PgConnection,
    measurement: &MeasurementUpsert,
) -> Result<UpsertOutcome, sqlx::Error> {
    let reading = &measurement.reading;
    let inserted = sqlx::query_scalar::<_, bool>(
        r#"
        INSERT INTO sound_measurements (
            uplink_id, laeq, lai, lai_max, object_battery, status
        )
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (uplink_id) DO UPDATE
            SET laeq           = EXCLUDED.laeq,
                lai            = EXCLUDED.lai,
                lai_max        = EXCLUDED.lai_max,
                object_battery = EXCLUDED.object_battery,
                status         = EXCLUDED.status
        RETURNING (xmax = 0) AS inserted
        "#,
    )
    .bind(measurement.uplink_id)
    .bind(reading.laeq)
    .bind(reading.lai)
    .bind(reading.lai_max)
    .bind(reading.object_battery)
    .bind(reading.status.as_deref())
    .fetch_one(conn)
    .await?;

    Ok(UpsertOutcome::from_inserted(inserted))
}
