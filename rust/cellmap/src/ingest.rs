//! Speed-test submission handling: normalisation, cell attribution, persistence.

use crate::{
    error::{Result, ServiceError},
    geo::Coordinate,
    locator::{AntennaLocator, CellAttribution},
    models::NewSample,
    store::CellStore,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

pub const DEFAULT_OPERATOR: &str = "Unknown";

/// A JSON value that may carry a number either natively or as text.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum LooseNumber {
    Number(f64),
    Text(String),
}

impl LooseNumber {
    /// `Ok(None)` for blank text, an error for anything non-numeric.
    fn parse(&self, field: &str) -> Result<Option<f64>> {
        let value = match self {
            LooseNumber::Number(value) => *value,
            LooseNumber::Text(text) => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    return Ok(None);
                }
                trimmed.parse::<f64>().map_err(|_| {
                    ServiceError::InvalidRequest(format!("{field} must be numeric"))
                })?
            }
        };

        if value.is_finite() {
            Ok(Some(value))
        } else {
            Err(ServiceError::InvalidRequest(format!(
                "{field} must be a finite number"
            )))
        }
    }
}

/// Raw body of `POST /api/speedtest`.
///
/// Numeric fields accept JSON numbers or numeric strings. There is no
/// `cell_id` field: the cell is only ever derived from the antenna catalog.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct SpeedTestSubmission {
    pub test_id: Option<String>,
    pub download_mbps: Option<LooseNumber>,
    pub upload_mbps: Option<LooseNumber>,
    pub latency_ms: Option<LooseNumber>,
    pub jitter_ms: Option<LooseNumber>,
    pub network_type: Option<String>,
    pub signal_strength_dbm: Option<LooseNumber>,
    pub device_type: Option<String>,
    pub latitude: Option<LooseNumber>,
    pub longitude: Option<LooseNumber>,
    pub wilaya: Option<String>,
    pub commune: Option<String>,
    pub operator: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl SpeedTestSubmission {
    /// Applies defaults and validates coordinates.
    ///
    /// Returns the row to persist and the sample position when both
    /// coordinates were supplied.
    pub fn normalize(self, now: DateTime<Utc>) -> Result<(NewSample, Option<Coordinate>)> {
        let latitude = parse_optional(self.latitude.as_ref(), "latitude")?;
        let longitude = parse_optional(self.longitude.as_ref(), "longitude")?;
        let position = match (latitude, longitude) {
            (Some(lat), Some(lon)) => Some(Coordinate::new(lat, lon)?),
            _ => None,
        };

        let signal_strength_dbm =
            parse_optional(self.signal_strength_dbm.as_ref(), "signal_strength_dbm")?
                .map(whole_dbm)
                .transpose()?;

        let sample = NewSample {
            test_id: self.test_id,
            cell_id: None,
            download_mbps: parse_optional(self.download_mbps.as_ref(), "download_mbps")?,
            upload_mbps: parse_optional(self.upload_mbps.as_ref(), "upload_mbps")?,
            latency_ms: parse_optional(self.latency_ms.as_ref(), "latency_ms")?,
            jitter_ms: parse_optional(self.jitter_ms.as_ref(), "jitter_ms")?,
            network_type: self.network_type,
            signal_strength_dbm,
            operator: non_blank(self.operator).or_else(|| Some(DEFAULT_OPERATOR.to_string())),
            device_type: self.device_type,
            wilaya: non_blank(self.wilaya),
            commune: non_blank(self.commune),
            latitude,
            longitude,
            timestamp: self.timestamp.unwrap_or(now),
        };

        Ok((sample, position))
    }
}

fn parse_optional(value: Option<&LooseNumber>, field: &str) -> Result<Option<f64>> {
    match value {
        Some(value) => value.parse(field),
        None => Ok(None),
    }
}

/// Signal strength is stored as whole dBm; fractional readings are rounded.
fn whole_dbm(value: f64) -> Result<i32> {
    let rounded = value.round();
    if rounded < f64::from(i32::MIN) || rounded > f64::from(i32::MAX) {
        return Err(ServiceError::InvalidRequest(
            "signal_strength_dbm is out of range".into(),
        ));
    }
    Ok(rounded as i32)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.trim().is_empty())
}

/// Fills derived fields from a located antenna.
///
/// The antenna decides `cell_id`; region labels are only filled when the
/// caller left them empty.
pub fn apply_attribution(sample: &mut NewSample, attribution: &CellAttribution) {
    sample.cell_id = attribution.cell_id.clone();
    if sample.wilaya.is_none() {
        sample.wilaya = attribution.antenna.wilaya.clone();
    }
    if sample.commune.is_none() {
        sample.commune = attribution.antenna.commune.clone();
    }
}

/// Fields echoed back to the submitting client.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestDetails {
    pub wilaya: Option<String>,
    pub commune: Option<String>,
    pub cell_id: Option<String>,
    pub operator: Option<String>,
}

impl From<&NewSample> for IngestDetails {
    fn from(sample: &NewSample) -> Self {
        Self {
            wilaya: sample.wilaya.clone(),
            commune: sample.commune.clone(),
            cell_id: sample.cell_id.clone(),
            operator: sample.operator.clone(),
        }
    }
}

#[derive(Clone)]
pub struct SampleIngestor {
    store: Arc<dyn CellStore>,
}

impl SampleIngestor {
    pub fn new(store: Arc<dyn CellStore>) -> Self {
        Self { store }
    }

    /// Normalises, attributes and appends one sample.
    ///
    /// A position that matches no antenna is not an error; the row is stored
    /// without derived fields.
    pub async fn ingest(&self, submission: SpeedTestSubmission) -> Result<NewSample> {
        let (mut sample, position) = submission.normalize(Utc::now())?;
        info!(
            test_id = sample.test_id.as_deref().unwrap_or_default(),
            latitude = ?sample.latitude,
            longitude = ?sample.longitude,
            "received speed test"
        );

        if let Some(point) = position {
            let locator = AntennaLocator::new(self.store.as_ref());
            if let Some(attribution) = locator.attribute(&point).await? {
                apply_attribution(&mut sample, &attribution);
            }
        }

        self.store.insert_sample(&sample).await?;
        Ok(sample)
    }
}
