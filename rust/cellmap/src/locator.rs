//! Nearest-antenna search over the BTS catalog.
//!
//! A degree-space box around the sample is queried first. When the box is
//! empty the search falls back to a bounded scan of the catalog. Both paths
//! pick the minimum haversine distance by linear scan; ties go to the first
//! candidate in catalog order, which is implementation-defined.
//!
//! The box is not geodesically uniform: a degree of longitude shrinks with
//! `cos(latitude)`, so the box narrows toward the poles.

use crate::{
    error::Result,
    geo::Coordinate,
    models::Antenna,
    sector::{self, Sector},
    store::AntennaCatalog,
};
use serde::Serialize;
use tracing::{debug, info};

/// Half-width of the prefilter box, in degrees, on each axis.
pub const BOX_HALF_SPAN_DEG: f64 = 0.5;

/// Maximum number of catalog rows scanned when the prefilter box is empty.
pub const FALLBACK_SCAN_LIMIT: i64 = 1000;

/// Inclusive latitude/longitude rectangle in degree space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
}

impl BoundingBox {
    pub fn around(latitude: f64, longitude: f64, half_span_deg: f64) -> Self {
        Self {
            lat_min: latitude - half_span_deg,
            lat_max: latitude + half_span_deg,
            lon_min: longitude - half_span_deg,
            lon_max: longitude + half_span_deg,
        }
    }

    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        latitude >= self.lat_min
            && latitude <= self.lat_max
            && longitude >= self.lon_min
            && longitude <= self.lon_max
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NearestAntenna {
    pub antenna: Antenna,
    pub distance_m: f64,
}

/// Result of attributing a sample position to a sector cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellAttribution {
    pub antenna: Antenna,
    pub distance_m: f64,
    pub bearing_deg: f64,
    pub sector: Option<Sector>,
    pub cell_id: Option<String>,
}

pub struct AntennaLocator<'a, C: ?Sized> {
    catalog: &'a C,
}

impl<'a, C> AntennaLocator<'a, C>
where
    C: AntennaCatalog + ?Sized,
{
    pub fn new(catalog: &'a C) -> Self {
        Self { catalog }
    }

    /// Nearest antenna to `point`, or `None` when the catalog is empty.
    pub async fn locate(&self, point: &Coordinate) -> Result<Option<NearestAntenna>> {
        let bounds = BoundingBox::around(point.latitude, point.longitude, BOX_HALF_SPAN_DEG);
        let candidates = self.catalog.antennas_in_box(&bounds).await?;
        if !candidates.is_empty() {
            debug!(candidates = candidates.len(), "prefilter box matched");
            return Ok(nearest(point, candidates));
        }

        let fallback = self.catalog.antennas_up_to(FALLBACK_SCAN_LIMIT).await?;
        debug!(
            candidates = fallback.len(),
            "prefilter box empty, scanning bounded catalog slice"
        );
        Ok(nearest(point, fallback))
    }

    /// Locates the nearest antenna and resolves the sector cell facing `point`.
    pub async fn attribute(&self, point: &Coordinate) -> Result<Option<CellAttribution>> {
        let Some(NearestAntenna {
            antenna,
            distance_m,
        }) = self.locate(point).await?
        else {
            info!(
                latitude = point.latitude,
                longitude = point.longitude,
                "no nearby antenna found"
            );
            return Ok(None);
        };

        info!(
            antenna = antenna.display_name(),
            distance_m, "nearest antenna found"
        );

        let resolution = sector::resolve(&antenna, point);
        debug!(
            bearing_deg = resolution.bearing_deg,
            sector = ?resolution.sector,
            cell_id = ?resolution.cell_id,
            "resolved sector"
        );

        Ok(Some(CellAttribution {
            antenna,
            distance_m,
            bearing_deg: resolution.bearing_deg,
            sector: resolution.sector,
            cell_id: resolution.cell_id,
        }))
    }
}

/// Linear minimum-distance scan; the first of equally distant candidates wins.
pub fn nearest<I>(point: &Coordinate, candidates: I) -> Option<NearestAntenna>
where
    I: IntoIterator<Item = Antenna>,
{
    let mut best: Option<NearestAntenna> = None;
    for antenna in candidates {
        let Some(position) = antenna.position() else {
            continue;
        };
        let distance_m = point.distance_to(&position);
        let closer = best
            .as_ref()
            .map_or(true, |current| distance_m < current.distance_m);
        if closer {
            best = Some(NearestAntenna {
                antenna,
                distance_m,
            });
        }
    }
    best
}
