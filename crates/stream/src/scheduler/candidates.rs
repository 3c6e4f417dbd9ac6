use terrascope_geo::{OrthographicProjection, PlanarPoint, TileAddress, TileBounds, TileWithLod};

use crate::config::StreamConfig;

/// A tile wanted this tick at a specific detail tier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Candidate {
    pub(crate) key: TileWithLod,
    /// Chebyshev distance from the center tile.
    pub(crate) ring: u32,
    /// Meters from the camera target to the tile.
    pub(crate) distance: f64,
}

/// Distance from `point` to the projected rectangle of `bounds`.
///
/// Zero inside the rectangle. Outside, the nearest of the four corners is
/// used, so a point level with an edge gets the corner distance rather than
/// the perpendicular one.
pub fn distance_to_tile(
    projection: &OrthographicProjection,
    point: PlanarPoint,
    bounds: &TileBounds,
) -> f64 {
    let a = projection.to_planar(bounds.min);
    let b = projection.to_planar(bounds.max);
    let (min_x, max_x) = (a.x.min(b.x), a.x.max(b.x));
    let (min_z, max_z) = (a.z.min(b.z), a.z.max(b.z));

    if (min_x..=max_x).contains(&point.x) && (min_z..=max_z).contains(&point.z) {
        return 0.0;
    }

    [
        PlanarPoint::new(min_x, min_z),
        PlanarPoint::new(min_x, max_z),
        PlanarPoint::new(max_x, min_z),
        PlanarPoint::new(max_x, max_z),
    ]
    .into_iter()
    .map(|corner| point.distance_to(corner))
    .fold(f64::INFINITY, f64::min)
}

/// Wanted tiles around `center`, sorted by ring and then by distance.
///
/// Neighbours off the pyramid edge are skipped. The detailed tier needs both
/// the tile and the camera within the high-detail radius.
pub(crate) fn collect_candidates(
    config: &StreamConfig,
    projection: &OrthographicProjection,
    target: PlanarPoint,
    camera_radius: f64,
    center: TileAddress,
) -> Vec<Candidate> {
    let rings = i64::from(config.ring_limit);
    let camera_close = camera_radius <= config.high_detail_radius;
    let mut candidates = Vec::new();

    for dy in -rings..=rings {
        for dx in -rings..=rings {
            let Ok(tile) = center.add(dx, dy) else {
                continue;
            };
            let distance = distance_to_tile(projection, target, &tile.bounds());
            if distance > config.scene_radius {
                continue;
            }
            let lod = if camera_close && distance <= config.high_detail_radius {
                config.detailed_lod
            } else {
                config.base_lod
            };
            candidates.push(Candidate {
                key: TileWithLod::new(tile, lod),
                ring: center.ring_distance(&tile),
                distance,
            });
        }
    }

    candidates.sort_by(|a, b| {
        a.ring
            .cmp(&b.ring)
            .then(a.distance.total_cmp(&b.distance))
            .then(a.key.cmp(&b.key))
    });
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use terrascope_geo::{GeoPoint, Lod};

    const MUNICH: GeoPoint = GeoPoint::new(48.14738, 11.57403);

    fn setup() -> (OrthographicProjection, TileAddress) {
        let proj = OrthographicProjection::new(MUNICH);
        let center = TileAddress::at_geo_point(15, MUNICH).unwrap();
        (proj, center)
    }

    #[test]
    fn inside_tile_is_zero() {
        let (proj, center) = setup();
        let d = distance_to_tile(&proj, PlanarPoint::ORIGIN, &center.bounds());
        assert_eq!(d, 0.0);
    }

    #[test]
    fn outside_tile_uses_nearest_corner() {
        let (proj, center) = setup();
        let bounds = center.bounds();
        let corner = proj.to_planar(bounds.max);
        let probe = PlanarPoint::new(corner.x + 30.0, corner.z + 40.0);
        let d = distance_to_tile(&proj, probe, &bounds);
        assert!((d - 50.0).abs() < 1.0, "d = {d}");
    }

    #[test]
    fn neighbour_distance_is_positive_and_grows() {
        let (proj, center) = setup();
        let near = distance_to_tile(&proj, PlanarPoint::ORIGIN, &center.add(2, 0).unwrap().bounds());
        let far = distance_to_tile(&proj, PlanarPoint::ORIGIN, &center.add(5, 0).unwrap().bounds());
        assert!(near > 0.0);
        assert!(far > near);
    }

    #[test]
    fn candidates_are_ring_ordered_and_radius_limited() {
        let (proj, center) = setup();
        let config = StreamConfig::default();
        let candidates = collect_candidates(&config, &proj, PlanarPoint::ORIGIN, 500.0, center);

        assert_eq!(candidates[0].key.tile, center);
        assert_eq!(candidates[0].ring, 0);
        assert!(candidates.windows(2).all(|w| w[0].ring <= w[1].ring));
        assert!(candidates.iter().all(|c| c.distance <= config.scene_radius));
        // ~815 m tiles, 5 km radius: well short of the full 21x21 square.
        assert!(candidates.len() < 21 * 21);
        assert!(candidates.len() > 9);
    }

    #[test]
    fn detailed_tier_needs_close_camera() {
        let (proj, center) = setup();
        let config = StreamConfig::default();

        let close = collect_candidates(&config, &proj, PlanarPoint::ORIGIN, 500.0, center);
        assert_eq!(close[0].key.lod, Lod(3));
        assert!(close.iter().any(|c| c.key.lod == Lod(1)));

        let far = collect_candidates(&config, &proj, PlanarPoint::ORIGIN, 2_000.0, center);
        assert!(far.iter().all(|c| c.key.lod == Lod(1)));
    }

    #[test]
    fn pyramid_edge_neighbours_are_skipped() {
        let config = StreamConfig {
            reference_zoom: 2,
            ring_limit: 2,
            scene_radius: f64::MAX,
            ..StreamConfig::default()
        };
        let origin = GeoPoint::new(80.0, -170.0);
        let proj = OrthographicProjection::new(origin);
        let center = TileAddress::at_geo_point(2, origin).unwrap();
        assert_eq!((center.x(), center.y()), (0, 0));

        let candidates = collect_candidates(&config, &proj, PlanarPoint::ORIGIN, 500.0, center);
        assert_eq!(candidates.len(), 9);
    }
}
