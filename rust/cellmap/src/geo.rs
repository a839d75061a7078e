//! Spherical bearing and distance helpers.
//!
//! Inputs are decimal degrees (WGS84 assumed). Ranges are not validated:
//! out-of-range latitudes or longitudes produce degenerate but finite
//! results. Non-finite input is rejected earlier by [`Coordinate::new`].

use crate::error::{Result, ServiceError};
use serde::Serialize;

/// Mean equatorial radius used for surface distances, in meters.
pub const EARTH_RADIUS_METERS: f64 = 6_378_137.0;

/// A finite latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        if !latitude.is_finite() {
            return Err(ServiceError::InvalidRequest(
                "latitude must be a finite number".into(),
            ));
        }
        if !longitude.is_finite() {
            return Err(ServiceError::InvalidRequest(
                "longitude must be a finite number".into(),
            ));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    pub fn bearing_to(&self, other: &Coordinate) -> f64 {
        bearing(self.latitude, self.longitude, other.latitude, other.longitude)
    }

    pub fn distance_to(&self, other: &Coordinate) -> f64 {
        distance_meters(self.latitude, self.longitude, other.latitude, other.longitude)
    }
}

/// Initial great-circle bearing from the first point to the second, in `[0, 360)`.
///
/// Coincident points yield `0`.
pub fn bearing(from_lat: f64, from_lon: f64, to_lat: f64, to_lon: f64) -> f64 {
    let phi1 = from_lat.to_radians();
    let phi2 = to_lat.to_radians();
    let delta_lambda = (to_lon - from_lon).to_radians();

    let y = delta_lambda.sin() * phi2.cos();
    let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * delta_lambda.cos();

    let degrees = (y.atan2(x).to_degrees() + 360.0) % 360.0;
    // (-tiny + 360.0) can round to exactly 360.0 before the modulo is applied.
    if degrees >= 360.0 {
        0.0
    } else {
        degrees
    }
}

/// Haversine surface distance in meters.
pub fn distance_meters(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let delta_phi = (lat2 - lat1).to_radians();
    let delta_lambda = (lon2 - lon1).to_radians();

    let a = (delta_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (delta_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).max(0.0).sqrt());

    EARTH_RADIUS_METERS * c
}
