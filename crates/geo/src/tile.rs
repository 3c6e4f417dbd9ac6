use std::f64::consts::PI;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::GeoPoint;

/// Highest zoom level accepted for a tile address.
pub const MAX_ZOOM: u8 = 30;

/// Errors from tile addressing.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeoError {
    #[error("invalid tile address {zoom}/{x}/{y}: {reason}")]
    InvalidTileAddress {
        zoom: u8,
        x: i64,
        y: i64,
        reason: &'static str,
    },
}

/// A tile on the slippy-map pyramid.
///
/// Tile numbers follow the common XYZ convention: `y` grows southward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileAddress {
    zoom: u8,
    x: u32,
    y: u32,
}

/// Geographic extent of a tile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileBounds {
    pub min: GeoPoint,
    pub max: GeoPoint,
    /// Arithmetic midpoint of `min` and `max`, not a geodesic centroid.
    pub center: GeoPoint,
}

impl TileAddress {
    /// Create an address, checking that `x` and `y` lie on the pyramid at `zoom`.
    pub fn new(zoom: u8, x: i64, y: i64) -> Result<Self, GeoError> {
        let invalid = |reason| GeoError::InvalidTileAddress { zoom, x, y, reason };
        if zoom > MAX_ZOOM {
            return Err(invalid("zoom above maximum"));
        }
        if x < 0 || y < 0 {
            return Err(invalid("x and y must not be negative"));
        }
        let size = 1i64 << zoom;
        if x >= size {
            return Err(invalid("x too large"));
        }
        if y >= size {
            return Err(invalid("y too large"));
        }
        Ok(Self {
            zoom,
            x: x as u32,
            y: y as u32,
        })
    }

    /// The tile containing `point` at `zoom`.
    ///
    /// Points at or past the Web-Mercator latitude limit, or with non-finite
    /// components, have no tile and produce [`GeoError::InvalidTileAddress`].
    pub fn at_geo_point(zoom: u8, point: GeoPoint) -> Result<Self, GeoError> {
        if !point.is_finite() {
            return Err(GeoError::InvalidTileAddress {
                zoom,
                x: 0,
                y: 0,
                reason: "non-finite coordinate",
            });
        }
        let n = tiles_per_side(zoom);
        let lat = point.lat.to_radians();
        let x = ((point.lon + 180.0) / 360.0 * n).floor();
        let y = ((1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / PI) / 2.0 * n).floor();
        if !y.is_finite() {
            return Err(GeoError::InvalidTileAddress {
                zoom,
                x: x as i64,
                y: 0,
                reason: "latitude outside the projected range",
            });
        }
        Self::new(zoom, x as i64, y as i64)
    }

    pub fn zoom(&self) -> u8 {
        self.zoom
    }

    pub fn x(&self) -> u32 {
        self.x
    }

    pub fn y(&self) -> u32 {
        self.y
    }

    /// Neighbouring tile at the same zoom. Fails when stepping off the pyramid.
    pub fn add(&self, dx: i64, dy: i64) -> Result<Self, GeoError> {
        Self::new(self.zoom, self.x as i64 + dx, self.y as i64 + dy)
    }

    /// Chebyshev distance to another tile, ignoring zoom.
    pub fn ring_distance(&self, other: &TileAddress) -> u32 {
        self.x.abs_diff(other.x).max(self.y.abs_diff(other.y))
    }

    pub fn bounds(&self) -> TileBounds {
        let min = GeoPoint::new(
            tile_to_lat(self.y as f64 + 1.0, self.zoom),
            tile_to_lon(self.x as f64, self.zoom),
        );
        let max = GeoPoint::new(
            tile_to_lat(self.y as f64, self.zoom),
            tile_to_lon(self.x as f64 + 1.0, self.zoom),
        );
        let center = GeoPoint::new((min.lat + max.lat) / 2.0, (min.lon + max.lon) / 2.0);
        TileBounds { min, max, center }
    }
}

impl fmt::Display for TileAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.x, self.y)
    }
}

fn tiles_per_side(zoom: u8) -> f64 {
    2f64.powi(zoom as i32)
}

fn tile_to_lon(x: f64, zoom: u8) -> f64 {
    x / tiles_per_side(zoom) * 360.0 - 180.0
}

fn tile_to_lat(y: f64, zoom: u8) -> f64 {
    let n = PI - (2.0 * PI * y) / tiles_per_side(zoom);
    n.sinh().atan().to_degrees()
}
