//! Row types for the antenna catalog and the speed-test store.

use crate::geo::Coordinate;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;

/// BTS catalog entry. Read-only reference data maintained by the operator.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Serialize)]
#[diesel(table_name = crate::schema::bts_antennas)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Antenna {
    pub id: i64,
    /// Display name, only used in logs.
    pub nom: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub wilaya: Option<String>,
    pub commune: Option<String>,
    pub cell_id_a: Option<String>,
    pub cell_id_b: Option<String>,
    pub cell_id_c: Option<String>,
}

impl Antenna {
    /// Catalog position, or `None` when the stored coordinates are not finite.
    pub fn position(&self) -> Option<Coordinate> {
        Coordinate::new(self.latitude, self.longitude).ok()
    }

    pub fn display_name(&self) -> &str {
        self.nom.as_deref().unwrap_or("<unnamed>")
    }
}

/// A speed-test sample ready to be appended to a store.
#[derive(Debug, Clone, PartialEq, Insertable, Serialize)]
#[diesel(table_name = crate::schema::speed_tests)]
pub struct NewSample {
    pub test_id: Option<String>,
    pub cell_id: Option<String>,
    pub download_mbps: Option<f64>,
    pub upload_mbps: Option<f64>,
    pub latency_ms: Option<f64>,
    pub jitter_ms: Option<f64>,
    pub network_type: Option<String>,
    pub signal_strength_dbm: Option<i32>,
    pub operator: Option<String>,
    pub device_type: Option<String>,
    pub wilaya: Option<String>,
    pub commune: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

/// A persisted speed-test sample as read back from a store.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Serialize)]
#[diesel(table_name = crate::schema::speed_tests)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct SampleRow {
    pub id: i64,
    pub test_id: Option<String>,
    pub cell_id: Option<String>,
    pub download_mbps: Option<f64>,
    pub upload_mbps: Option<f64>,
    pub latency_ms: Option<f64>,
    pub jitter_ms: Option<f64>,
    pub network_type: Option<String>,
    pub signal_strength_dbm: Option<i32>,
    pub operator: Option<String>,
    pub device_type: Option<String>,
    pub wilaya: Option<String>,
    pub commune: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl SampleRow {
    /// Stored location when both coordinates are present and finite.
    pub fn position(&self) -> Option<Coordinate> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Coordinate::new(lat, lon).ok(),
            _ => None,
        }
    }

    /// Stored cell id, treating blank strings as missing.
    pub fn known_cell_id(&self) -> Option<&str> {
        self.cell_id
            .as_deref()
            .filter(|value| !value.trim().is_empty())
    }

    /// Copies every field verbatim, dropping only the store-local row id.
    pub fn into_new_sample(self) -> NewSample {
        NewSample {
            test_id: self.test_id,
            cell_id: self.cell_id,
            download_mbps: self.download_mbps,
            upload_mbps: self.upload_mbps,
            latency_ms: self.latency_ms,
            jitter_ms: self.jitter_ms,
            network_type: self.network_type,
            signal_strength_dbm: self.signal_strength_dbm,
            operator: self.operator,
            device_type: self.device_type,
            wilaya: self.wilaya,
            commune: self.commune,
            latitude: self.latitude,
            longitude: self.longitude,
            timestamp: self.timestamp,
        }
    }
}
