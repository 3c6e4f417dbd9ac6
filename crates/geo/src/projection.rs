use serde::{Deserialize, Serialize};

use crate::types::{GeoPoint, PlanarPoint};

/// Mean globe radius in meters.
pub const GLOBE_RADIUS: f64 = 6_371_000.0;

/// Below this magnitude the longitude denominator is treated as singular and
/// the origin longitude is returned instead.
const LON_DIV_EPSILON: f64 = 1e-5;

/// Orthographic azimuthal projection onto a plane touching the globe at
/// `origin`.
///
/// Accurate for data covering a small part of the globe. Planar points are
/// only meaningful relative to the origin that produced them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrthographicProjection {
    origin: GeoPoint,
    lat0: f64,
    lon0: f64,
}

impl OrthographicProjection {
    pub fn new(origin: GeoPoint) -> Self {
        Self {
            origin,
            lat0: origin.lat.to_radians(),
            lon0: origin.lon.to_radians(),
        }
    }

    pub fn origin(&self) -> GeoPoint {
        self.origin
    }

    /// Project a geographic point onto the tangent plane.
    pub fn to_planar(&self, point: GeoPoint) -> PlanarPoint {
        let lat = point.lat.to_radians();
        let dlon = point.lon.to_radians() - self.lon0;

        let x = GLOBE_RADIUS * lat.cos() * dlon.sin();
        let z = GLOBE_RADIUS
            * (self.lat0.cos() * lat.sin() - self.lat0.sin() * lat.cos() * dlon.cos());

        PlanarPoint::new(x, z)
    }

    /// Inverse projection back to geographic coordinates.
    pub fn to_geo(&self, pos: PlanarPoint) -> GeoPoint {
        let rho = (pos.x * pos.x + pos.z * pos.z).sqrt();
        if rho == 0.0 {
            return self.origin;
        }

        // Clamped so points past the horizon stay on the visible hemisphere rim.
        let c = (rho / GLOBE_RADIUS).min(1.0).asin();
        let (sin_c, cos_c) = c.sin_cos();
        let (sin_lat0, cos_lat0) = self.lat0.sin_cos();

        let lat = (cos_c * sin_lat0 + (pos.z * sin_c * cos_lat0) / rho).asin();

        let div = rho * cos_lat0 * cos_c - pos.z * sin_lat0 * sin_c;
        let lon = if div.abs() > LON_DIV_EPSILON {
            self.lon0 + (pos.x * sin_c).atan2(div)
        } else {
            self.lon0
        };

        GeoPoint::new(lat.to_degrees(), lon.to_degrees())
    }
}
