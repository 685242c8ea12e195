//! Uplink database queries

use sqlx::PgConnection;

use crate::types::{UplinkKey, UplinkUpsert, UpsertOutcome};

const UPSERT_BY_DEDUP_ID: &str = r#"
    INSERT INTO uplinks (
        deduplication_id, dev_eui, time,
        f_port, f_cnt, adr, dr, confirmed,
        margin, battery_level_unavailable,
        external_power_source, battery_level, raw_data
    )
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
    ON CONFLICT (deduplication_id) DO UPDATE
        SET f_port                    = EXCLUDED.f_port,
            f_cnt                     = EXCLUDED.f_cnt,
            adr                       = EXCLUDED.adr,
            dr                        = EXCLUDED.dr,
            confirmed                 = EXCLUDED.confirmed,
            margin                    = EXCLUDED.margin,
            battery_level_unavailable = EXCLUDED.battery_level_unavailable,
            external_power_source     = EXCLUDED.external_power_source,
            battery_level             = EXCLUDED.battery_level,
            raw_data                  = EXCLUDED.raw_data
    RETURNING (xmax = 0) AS inserted
"#;

const UPSERT_BY_FALLBACK_KEY: &str = r#"
    INSERT INTO uplinks (
        deduplication_id, dev_eui, time,
        f_port, f_cnt, adr, dr, confirmed,
        margin, battery_level_unavailable,
        external_power_source, battery_level, raw_data
    )
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
    ON CONFLICT (dev_eui, time, f_cnt) WHERE deduplication_id IS NULL DO UPDATE
        SET f_port                    = EXCLUDED.f_port,
            adr                       = EXCLUDED.adr,
            dr                        = EXCLUDED.dr,
            confirmed                 = EXCLUDED.confirmed,
            margin                    = EXCLUDED.margin,
            battery_level_unavailable = EXCLUDED.battery_level_unavailable,
            external_power_source     = EXCLUDED.external_power_source,
            battery_level             = EXCLUDED.battery_level,
            raw_data                  = EXCLUDED.raw_data
    RETURNING (xmax = 0) AS inserted
"#;

/// Insert or update an uplink under its idempotency key
pub async fn upsert_uplink(
    conn: &mut PgConnection,
    uplink: &UplinkUpsert,
) -> Result<UpsertOutcome, sqlx::Error> {
    let query = if uplink.deduplication_id.is_some() {
        UPSERT_BY_DEDUP_ID
    } else {
        UPSERT_BY_FALLBACK_KEY
    };

    let inserted = sqlx::query_scalar::<_, bool>(query)
        .bind(uplink.deduplication_id.as_deref())
        .bind(&uplink.dev_eui)
        .bind(uplink.time)
        .bind(uplink.f_port)
        .bind(uplink.f_cnt)
        .bind(uplink.adr)
        .bind(uplink.dr)
        .bind(uplink.confirmed)
        .bind(uplink.margin)
        .bind(uplink.battery_level_unavailable)
        .bind(uplink.external_power_source)
        .bind(uplink.battery_level)
        .bind(uplink.raw_data.as_deref())
        .fetch_one(conn)
        .await?;

    Ok(UpsertOutcome::from_inserted(inserted))
}

/// Look up the surrogate id of a stored uplink
pub async fn find_uplink_id(
    conn: &mut PgConnection,
    key: &UplinkKey,
) -> Result<Option<i64>, sqlx::Error> {
    let id = match key {
        UplinkKey::Dedup(dedup_id) => {
            sqlx::query_scalar::<_, i64>("SELECT id FROM uplinks WHERE deduplication_id = $1")
                .bind(dedup_id)
                .fetch_optional(conn)
                .await?
        }
        UplinkKey::Fallback { dev_eui, time, f_cnt } => {
            sqlx::query_scalar::<_, i64>(
                r#"
                SELECT id FROM uplinks
                WHERE dev_eui = $1
                  AND time = $2
                  AND f_cnt IS NOT DISTINCT FROM $3
                  AND deduplication_id IS NULL
                ORDER BY id DESC
                LIMIT 1
                "#,
            )
            .bind(dev_eui)
            .bind(time)
            .bind(f_cnt)
            .fetch_optional(conn)
            .await?
        }
    };

    Ok(id)
}
