//! Geodesy: geographic and planar coordinates, the orthographic azimuthal
//! projection, and slippy-map tile addressing.
//!
//! # Invariants
//! - Everything here is pure; no function holds state between calls.
//! - A [`TileAddress`] always lies on the pyramid for its zoom.
//! - Planar points are only meaningful relative to the projection origin that
//!   produced them.

mod lod;
mod projection;
mod tile;
mod types;

pub use lod::{Lod, TileWithLod};
pub use projection::{GLOBE_RADIUS, OrthographicProjection};
pub use tile::{GeoError, MAX_ZOOM, TileAddress, TileBounds};
pub use types::{GeoPoint, PlanarPoint};

pub fn crate_info() -> &'static str {
    "terrascope-geo v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("geo"));
    }
}
