//! One-shot replay of new samples from a source store into a destination store.
//!
//! The destination's highest timestamp is the watermark; source rows newer
//! than it are replayed in ascending timestamp order, so the next run's
//! watermark moves past everything inserted by this one. Rows without a
//! cell id are attributed against the destination's antenna catalog.
//!
//! The batch is not transactional. A failed insert stops the run and keeps
//! rows already appended. Rows that share the exact watermark timestamp can
//! be skipped or replayed twice across an interrupted run: the watermark
//! carries no tie-breaking key. Only one run may execute at a time.

use crate::{
    error::Result,
    locator::AntennaLocator,
    models::{NewSample, SampleRow},
    store::{CellStore, SampleStore},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileSummary {
    pub watermark: Option<DateTime<Utc>>,
    pub fetched: usize,
    pub inserted: usize,
    /// Rows whose missing cell id was filled in.
    pub derived: usize,
    /// Rows still without a cell id after the catalog lookup.
    pub unresolved: usize,
}

pub struct ReconciliationJob {
    source: Arc<dyn SampleStore>,
    destination: Arc<dyn CellStore>,
}

impl ReconciliationJob {
    pub fn new(source: Arc<dyn SampleStore>, destination: Arc<dyn CellStore>) -> Self {
        Self {
            source,
            destination,
        }
    }

    pub async fn run(&self) -> Result<ReconcileSummary> {
        let stored_max = self.destination.max_timestamp().await?;
        let watermark = stored_max.unwrap_or(DateTime::UNIX_EPOCH);
        info!(%watermark, "starting reconciliation");

        let rows = self.source.samples_newer_than(watermark).await?;
        let mut summary = ReconcileSummary {
            watermark: stored_max,
            fetched: rows.len(),
            ..Default::default()
        };
        info!(fetched = rows.len(), "fetched new source rows");

        if rows.is_empty() {
            info!("destination is up to date");
            return Ok(summary);
        }

        let mut warned_empty_catalog = false;
        for row in rows {
            let needs_cell = row.known_cell_id().is_none();
            let sample = self.fill_cell_id(row, &mut warned_empty_catalog).await?;
            if needs_cell {
                if sample.cell_id.is_some() {
                    summary.derived += 1;
                } else {
                    summary.unresolved += 1;
                }
            }

            self.destination.insert_sample(&sample).await?;
            summary.inserted += 1;
        }

        info!(
            inserted = summary.inserted,
            derived = summary.derived,
            unresolved = summary.unresolved,
            "reconciliation complete"
        );
        Ok(summary)
    }

    async fn fill_cell_id(
        &self,
        row: SampleRow,
        warned_empty_catalog: &mut bool,
    ) -> Result<NewSample> {
        if row.known_cell_id().is_some() {
            return Ok(row.into_new_sample());
        }

        let position = row.position();
        let mut sample = row.into_new_sample();
        sample.cell_id = None;

        let Some(point) = position else {
            return Ok(sample);
        };

        debug!(
            test_id = sample.test_id.as_deref().unwrap_or_default(),
            latitude = point.latitude,
            longitude = point.longitude,
            "missing cell id, searching nearest antenna"
        );
        let locator = AntennaLocator::new(self.destination.as_ref());
        match locator.attribute(&point).await? {
            Some(attribution) => {
                debug!(cell_id = ?attribution.cell_id, "derived cell id");
                sample.cell_id = attribution.cell_id;
            }
            None if !*warned_empty_catalog => {
                warn!("destination antenna catalog is empty");
                *warned_empty_catalog = true;
            }
            None => {}
        }

        Ok(sample)
    }
}
