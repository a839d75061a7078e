//! Bearing-to-sector mapping for three-sector BTS sites.

use crate::{geo::Coordinate, models::Antenna};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Sector {
    A,
    B,
    C,
}

/// Half-open bearing range `[start_deg, end_deg)` served by one sector.
#[derive(Clone, Copy)]
pub struct SectorRange {
    pub sector: Sector,
    pub start_deg: f64,
    pub end_deg: f64,
    select: fn(&Antenna) -> Option<&str>,
}

impl SectorRange {
    pub fn contains(&self, bearing_deg: f64) -> bool {
        bearing_deg >= self.start_deg && bearing_deg < self.end_deg
    }

    pub fn cell_id<'a>(&self, antenna: &'a Antenna) -> Option<&'a str> {
        (self.select)(antenna)
    }
}

fn cell_a(antenna: &Antenna) -> Option<&str> {
    antenna.cell_id_a.as_deref()
}

fn cell_b(antenna: &Antenna) -> Option<&str> {
    antenna.cell_id_b.as_deref()
}

fn cell_c(antenna: &Antenna) -> Option<&str> {
    antenna.cell_id_c.as_deref()
}

/// Fixed partition of the compass into three contiguous 120° sectors starting at north.
pub const SECTORS: [SectorRange; 3] = [
    SectorRange {
        sector: Sector::A,
        start_deg: 0.0,
        end_deg: 120.0,
        select: cell_a,
    },
    SectorRange {
        sector: Sector::B,
        start_deg: 120.0,
        end_deg: 240.0,
        select: cell_b,
    },
    SectorRange {
        sector: Sector::C,
        start_deg: 240.0,
        end_deg: 360.0,
        select: cell_c,
    },
];

pub fn sector_for_bearing(bearing_deg: f64) -> Option<&'static SectorRange> {
    SECTORS.iter().find(|range| range.contains(bearing_deg))
}

/// Sector of an antenna facing a sample position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectorResolution {
    pub bearing_deg: f64,
    pub sector: Option<Sector>,
    pub cell_id: Option<String>,
}

pub fn resolve(antenna: &Antenna, sample: &Coordinate) -> SectorResolution {
    let bearing_deg = crate::geo::bearing(
        antenna.latitude,
        antenna.longitude,
        sample.latitude,
        sample.longitude,
    );
    let range = sector_for_bearing(bearing_deg);
    SectorResolution {
        bearing_deg,
        sector: range.map(|range| range.sector),
        cell_id: range
            .and_then(|range| range.cell_id(antenna))
            .map(str::to_string),
    }
}

/// Cell id of the sector of `antenna` facing `sample`.
///
/// `None` when that sector has no configured cell.
pub fn resolve_cell_id(antenna: &Antenna, sample: &Coordinate) -> Option<String> {
    resolve(antenna, sample).cell_id
}
