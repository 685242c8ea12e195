//! PostgreSQL implementation of the ingestion store

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};

use super::queries;
use super::store::{IngestStore, JobTransaction, StoreError};
use crate::types::{DeviceUpsert, MeasurementUpsert, UplinkKey, UplinkUpsert, UpsertOutcome};

const ROW_SAVEPOINT: &str = "ingest_row";

/// Store backed by a connection pool; every job gets its own connection
#[derive(Clone)]
pub struct PgIngestStore {
    pool: PgPool,
}

impl PgIngestStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IngestStore for PgIngestStore {
    async fn begin(&self) -> Result<Box<dyn JobTransaction>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgJobTransaction { tx }))
    }

    fn name(&self) -> &'static str {
        "postgres"
    }
}

pub struct PgJobTransaction {
    tx: Transaction<'static, Postgres>,
}

impl PgJobTransaction {
    async fn exec(&mut self, sql: &str) -> Result<(), StoreError> {
        sqlx::query(sql).execute(&mut *self.tx).await?;
        Ok(())
    }
}

#[async_trait]
impl JobTransaction for PgJobTransaction {
    async fn savepoint(&mut self) -> Result<(), StoreError> {
        self.exec(&format!("SAVEPOINT {}", ROW_SAVEPOINT)).await
    }

    async fn release_savepoint(&mut self) -> Result<(), StoreError> {
        self.exec(&format!("RELEASE SAVEPOINT {}", ROW_SAVEPOINT)).await
    }

    async fn rollback_to_savepoint(&mut self) -> Result<(), StoreError> {
        self.exec(&format!("ROLLBACK TO SAVEPOINT {}", ROW_SAVEPOINT)).await
    }

    async fn upsert_device(&mut self, device: &DeviceUpsert) -> Result<UpsertOutcome, StoreError> {
        Ok(queries::device::upsert_device(&mut *self.tx, device).await?)
    }

    async fn upsert_uplink(&mut self, uplink: &UplinkUpsert) -> Result<UpsertOutcome, StoreError> {
        Ok(queries::uplink::upsert_uplink(&mut *self.tx, uplink).await?)
    }

    async fn find_uplink_id(&mut self, key: &UplinkKey) -> Result<Option<i64>, StoreError> {
        Ok(queries::uplink::find_uplink_id(&mut *self.tx, key).await?)
    }

    async fn upsert_measurement(
        &mut self,
        measurement: &MeasurementUpsert,
    ) -> Result<UpsertOutcome, StoreError> {
        Ok(queries::measurement::upsert_measurement(&mut *self.tx, measurement).await?)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.rollback().await?;
        Ok(())
    }
}
