//! Storage collaborators for the antenna catalog and the sample stores.

use crate::{
    db::PgPool,
    error::{Result, ServiceError},
    locator::BoundingBox,
    models::{Antenna, NewSample, SampleRow},
    schema::{bts_antennas, speed_tests},
};
use async_trait::async_trait;
use bb8::PooledConnection;
use chrono::{DateTime, Utc};
use diesel::dsl::max;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use std::sync::Arc;
use tracing::error;

/// Read access to the BTS antenna catalog.
#[async_trait]
pub trait AntennaCatalog: Send + Sync {
    /// Antennas inside the inclusive box, in catalog order.
    async fn antennas_in_box(&self, bounds: &BoundingBox) -> Result<Vec<Antenna>>;

    /// At most `limit` antennas, in catalog order.
    async fn antennas_up_to(&self, limit: i64) -> Result<Vec<Antenna>>;
}

/// Append-only access to a speed-test store.
#[async_trait]
pub trait SampleStore: Send + Sync {
    async fn insert_sample(&self, sample: &NewSample) -> Result<()>;

    /// Highest stored timestamp, `None` for an empty store.
    async fn max_timestamp(&self) -> Result<Option<DateTime<Utc>>>;

    /// Rows strictly newer than `watermark`, ascending by timestamp.
    async fn samples_newer_than(&self, watermark: DateTime<Utc>) -> Result<Vec<SampleRow>>;
}

/// A store that carries both a catalog and samples.
pub trait CellStore: AntennaCatalog + SampleStore {}

impl<T> CellStore for T where T: AntennaCatalog + SampleStore + ?Sized {}

#[async_trait]
impl<T> AntennaCatalog for Arc<T>
where
    T: AntennaCatalog + ?Sized,
{
    async fn antennas_in_box(&self, bounds: &BoundingBox) -> Result<Vec<Antenna>> {
        (**self).antennas_in_box(bounds).await
    }

    async fn antennas_up_to(&self, limit: i64) -> Result<Vec<Antenna>> {
        (**self).antennas_up_to(limit).await
    }
}

#[async_trait]
impl<T> SampleStore for Arc<T>
where
    T: SampleStore + ?Sized,
{
    async fn insert_sample(&self, sample: &NewSample) -> Result<()> {
        (**self).insert_sample(sample).await
    }

    async fn max_timestamp(&self) -> Result<Option<DateTime<Utc>>> {
        (**self).max_timestamp().await
    }

    async fn samples_newer_than(&self, watermark: DateTime<Utc>) -> Result<Vec<SampleRow>> {
        (**self).samples_newer_than(watermark).await
    }
}

/// Catalog snapshot held in memory, iterated in vector order.
#[async_trait]
impl AntennaCatalog for Vec<Antenna> {
    async fn antennas_in_box(&self, bounds: &BoundingBox) -> Result<Vec<Antenna>> {
        Ok(self
            .iter()
            .filter(|antenna| bounds.contains(antenna.latitude, antenna.longitude))
            .cloned()
            .collect())
    }

    async fn antennas_up_to(&self, limit: i64) -> Result<Vec<Antenna>> {
        let limit = usize::try_from(limit.max(0)).unwrap_or(usize::MAX);
        Ok(self.iter().take(limit).cloned().collect())
    }
}

/// PostgreSQL-backed catalog and sample store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn conn(&self) -> Result<PooledConnection<'_, crate::db::PgConnectionManager>> {
        self.pool.get().await.map_err(|err| {
            error!(error = ?err, "failed to acquire database connection");
            ServiceError::Storage(anyhow::anyhow!("{err:?}"))
        })
    }
}

#[async_trait]
impl AntennaCatalog for PgStore {
    async fn antennas_in_box(&self, bounds: &BoundingBox) -> Result<Vec<Antenna>> {
        let mut conn = self.conn().await?;
        bts_antennas::table
            .filter(
                bts_antennas::latitude
                    .between(bounds.lat_min, bounds.lat_max)
                    .and(bts_antennas::longitude.between(bounds.lon_min, bounds.lon_max)),
            )
            .order(bts_antennas::id.asc())
            .select(Antenna::as_select())
            .load(&mut *conn)
            .await
            .map_err(ServiceError::storage)
    }

    async fn antennas_up_to(&self, limit: i64) -> Result<Vec<Antenna>> {
        let mut conn = self.conn().await?;
        bts_antennas::table
            .order(bts_antennas::id.asc())
            .limit(limit)
            .select(Antenna::as_select())
            .load(&mut *conn)
            .await
            .map_err(ServiceError::storage)
    }
}

#[async_trait]
impl SampleStore for PgStore {
    async fn insert_sample(&self, sample: &NewSample) -> Result<()> {
        let mut conn = self.conn().await?;
        diesel::insert_into(speed_tests::table)
            .values(sample)
            .execute(&mut *conn)
            .await
            .map_err(ServiceError::storage)?;
        Ok(())
    }

    async fn max_timestamp(&self) -> Result<Option<DateTime<Utc>>> {
        let mut conn = self.conn().await?;
        speed_tests::table
            .select(max(speed_tests::timestamp))
            .get_result(&mut *conn)
            .await
            .map_err(ServiceError::storage)
    }

    async fn samples_newer_than(&self, watermark: DateTime<Utc>) -> Result<Vec<SampleRow>> {
        let mut conn = self.conn().await?;
        speed_tests::table
            .filter(speed_tests::timestamp.gt(watermark))
            .order((speed_tests::timestamp.asc(), speed_tests::id.asc()))
            .select(SampleRow::as_select())
            .load(&mut *conn)
            .await
            .map_err(ServiceError::storage)
    }
}
