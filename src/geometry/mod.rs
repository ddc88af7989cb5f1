//! Geometry primitives: distance, containment and envelope helpers.
//!
//! All functions here are pure. Coordinates are WGS84 with x = longitude and
//! y = latitude.

mod simplify;
mod validate;

pub use simplify::{simplify, simplify_ring};
pub use validate::{polygon_problem, sanitize_multi_polygon, SanitizeReport};

use std::f64::consts::PI;

use geo::{BoundingRect, Coord, Distance, Haversine, LineString, MultiPolygon, Point, Polygon};
use rstar::AABB;

use crate::error::{EngineError, Result};

/// Mean Earth radius in metres, the sphere the haversine distance is taken on.
pub const MEAN_EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Half the circumference of the mean sphere. Any two points are at most this far apart.
pub const MAX_SURFACE_DISTANCE_M: f64 = PI * MEAN_EARTH_RADIUS_M;

/// Check that a lon/lat pair is finite and in range, and build a point from it.
pub fn validate_coord(lon: f64, lat: f64) -> Result<Point<f64>> {
    if !lon.is_finite() || !lat.is_finite() {
        return Err(EngineError::InvalidInput(format!(
            "coordinates must be finite (lon={}, lat={})",
            lon, lat
        )));
    }
    if !(-180.0..=180.0).contains(&lon) {
        return Err(EngineError::InvalidInput(format!(
            "longitude {} outside [-180, 180]",
            lon
        )));
    }
    if !(-90.0..=90.0).contains(&lat) {
        return Err(EngineError::InvalidInput(format!(
            "latitude {} outside [-90, 90]",
            lat
        )));
    }
    Ok(Point::new(lon, lat))
}

/// Great-circle distance in metres.
///
/// Haversine on the mean sphere. Against the WGS84 ellipsoid the error stays
/// under 0.5% for city-scale distances.
pub fn distance(a: &Point<f64>, b: &Point<f64>) -> f64 {
    Haversine.distance(*a, *b)
}

/// Boundary-inclusive containment: points on an edge or vertex count as inside.
pub fn contains(area: &MultiPolygon<f64>, point: &Point<f64>) -> bool {
    area.0.iter().any(|poly| polygon_contains(poly, point))
}

/// Boundary-inclusive containment for a single polygon, holes respected.
pub fn polygon_contains(poly: &Polygon<f64>, point: &Point<f64>) -> bool {
    let p = point.0;

    if let Some(rect) = poly.exterior().bounding_rect() {
        if p.x < rect.min().x || p.x > rect.max().x || p.y < rect.min().y || p.y > rect.max().y {
            return false;
        }
    } else {
        return false;
    }

    match ring_position(poly.exterior(), p) {
        RingPosition::Outside => return false,
        RingPosition::OnBoundary => return true,
        RingPosition::Inside => {}
    }

    for hole in poly.interiors() {
        match ring_position(hole, p) {
            RingPosition::Inside => return false,
            RingPosition::OnBoundary => return true,
            RingPosition::Outside => {}
        }
    }

    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RingPosition {
    Inside,
    OnBoundary,
    Outside,
}

/// Locate a coordinate relative to a closed ring using the winding number.
pub(crate) fn ring_position(ring: &LineString<f64>, p: Coord<f64>) -> RingPosition {
    let mut winding = 0i32;

    for line in ring.lines() {
        let (a, b) = (line.start, line.end);
        let cross = (b.x - a.x) * (p.y - a.y) - (p.x - a.x) * (b.y - a.y);

        if cross == 0.0
            && p.x >= a.x.min(b.x)
            && p.x <= a.x.max(b.x)
            && p.y >= a.y.min(b.y)
            && p.y <= a.y.max(b.y)
        {
            return RingPosition::OnBoundary;
        }

        if a.y <= p.y {
            if b.y > p.y && cross > 0.0 {
                winding += 1;
            }
        } else if b.y <= p.y && cross < 0.0 {
            winding -= 1;
        }
    }

    if winding == 0 {
        RingPosition::Outside
    } else {
        RingPosition::Inside
    }
}

/// R-tree envelope of a multi-polygon, `None` if it has no coordinates.
pub fn bounding_envelope(area: &MultiPolygon<f64>) -> Option<AABB<[f64; 2]>> {
    area.bounding_rect()
        .map(|rect| AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]))
}

/// Lon/lat envelopes covering every point within `radius_m` of `center`.
///
/// The longitude half-width is `asin(sin(d) / cos(lat))` for angular radius
/// `d`. Circles reaching a pole get the full longitude range, and circles
/// crossing the antimeridian come back as two envelopes.
pub fn radius_envelopes(center: &Point<f64>, radius_m: f64) -> Vec<AABB<[f64; 2]>> {
    let world = AABB::from_corners([-180.0, -90.0], [180.0, 90.0]);

    // Slight inflation keeps points right at the radius inside despite rounding.
    let angular = radius_m.max(0.0) * (1.0 + 1e-6) / MEAN_EARTH_RADIUS_M + 1e-12;
    if angular >= PI {
        return vec![world];
    }

    let (lon, lat) = (center.x(), center.y());
    let dlat = angular.to_degrees();
    let min_lat = (lat - dlat).max(-90.0);
    let max_lat = (lat + dlat).min(90.0);

    if lat - dlat <= -90.0 || lat + dlat >= 90.0 {
        return vec![AABB::from_corners([-180.0, min_lat], [180.0, max_lat])];
    }

    let ratio = angular.sin() / lat.to_radians().cos();
    if ratio >= 1.0 {
        return vec![AABB::from_corners([-180.0, min_lat], [180.0, max_lat])];
    }
    let dlon = ratio.asin().to_degrees();

    let min_lon = lon - dlon;
    let max_lon = lon + dlon;

    if min_lon < -180.0 {
        vec![
            AABB::from_corners([min_lon + 360.0, min_lat], [180.0, max_lat]),
            AABB::from_corners([-180.0, min_lat], [max_lon, max_lat]),
        ]
    } else if max_lon > 180.0 {
        vec![
            AABB::from_corners([min_lon, min_lat], [180.0, max_lat]),
            AABB::from_corners([-180.0, min_lat], [max_lon - 360.0, max_lat]),
        ]
    } else {
        vec![AABB::from_corners([min_lon, min_lat], [max_lon, max_lat])]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, Geodesic};
    use rstar::Envelope;

    fn square(min: f64, max: f64) -> MultiPolygon<f64> {
        MultiPolygon::new(vec![polygon![
            (x: min, y: min),
            (x: max, y: min),
            (x: max, y: max),
            (x: min, y: max),
            (x: min, y: min),
        ]])
    }

    #[test]
    fn test_validate_coord() {
        assert!(validate_coord(-6.26, 53.35).is_ok());
        assert!(validate_coord(180.0, -90.0).is_ok());
        assert!(validate_coord(180.1, 0.0).is_err());
        assert!(validate_coord(0.0, 90.5).is_err());
        assert!(validate_coord(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn test_distance_small_offset() {
        let d = distance(&Point::new(0.0, 0.0), &Point::new(0.0, 0.001));
        assert!((d - 111.19).abs() < 0.1, "got {}", d);
    }

    #[test]
    fn test_distance_matches_geodesic_at_city_scale() {
        let pairs = [
            (Point::new(-6.26, 53.35), Point::new(-6.24, 53.33)),
            (Point::new(-6.28, 53.36), Point::new(-6.24, 53.33)),
            (Point::new(-8.47, 51.90), Point::new(-8.40, 51.95)),
            (Point::new(-74.0060, 40.7128), Point::new(-73.9442, 40.6782)),
        ];
        for (a, b) in pairs {
            let h = distance(&a, &b);
            let g = Geodesic.distance(a, b);
            assert!((h - g).abs() / g < 0.005, "haversine {} vs geodesic {}", h, g);
        }
    }

    #[test]
    fn test_contains_boundary_inclusive() {
        let area = square(0.0, 1.0);
        assert!(contains(&area, &Point::new(0.5, 0.5)));
        assert!(contains(&area, &Point::new(0.0, 0.5)));
        assert!(contains(&area, &Point::new(1.0, 1.0)));
        assert!(!contains(&area, &Point::new(1.0001, 0.5)));
        assert!(!contains(&area, &Point::new(-0.5, -0.5)));
    }

    #[test]
    fn test_contains_respects_holes() {
        let poly = Polygon::new(
            LineString::from(vec![(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (0.0, 4.0), (0.0, 0.0)]),
            vec![LineString::from(vec![
                (1.0, 1.0),
                (3.0, 1.0),
                (3.0, 3.0),
                (1.0, 3.0),
                (1.0, 1.0),
            ])],
        );
        let area = MultiPolygon::new(vec![poly]);
        assert!(!contains(&area, &Point::new(2.0, 2.0)));
        assert!(contains(&area, &Point::new(1.0, 2.0)));
        assert!(contains(&area, &Point::new(0.5, 2.0)));
    }

    #[test]
    fn test_contains_concave() {
        // U shape: notch between x=1..2 above y=1
        let poly = polygon![
            (x: 0.0, y: 0.0),
            (x: 3.0, y: 0.0),
            (x: 3.0, y: 3.0),
            (x: 2.0, y: 3.0),
            (x: 2.0, y: 1.0),
            (x: 1.0, y: 1.0),
            (x: 1.0, y: 3.0),
            (x: 0.0, y: 3.0),
            (x: 0.0, y: 0.0),
        ];
        assert!(!polygon_contains(&poly, &Point::new(1.5, 2.0)));
        assert!(polygon_contains(&poly, &Point::new(0.5, 2.0)));
        assert!(polygon_contains(&poly, &Point::new(1.5, 1.0)));
    }

    #[test]
    fn test_radius_envelope_contains_circle() {
        let center = Point::new(-6.26, 53.35);
        let envelopes = radius_envelopes(&center, 1000.0);
        assert_eq!(envelopes.len(), 1);
        for bearing in 0..36 {
            let angle = (bearing as f64 * 10.0).to_radians();
            // Sample just inside the radius in every direction
            let dlat = (999.0 / MEAN_EARTH_RADIUS_M).to_degrees() * angle.cos();
            let dlon = (999.0 / MEAN_EARTH_RADIUS_M).to_degrees() * angle.sin()
                / center.y().to_radians().cos();
            let sample = Point::new(center.x() + dlon, center.y() + dlat);
            if distance(&center, &sample) <= 1000.0 {
                assert!(envelopes[0].contains_point(&[sample.x(), sample.y()]));
            }
        }
    }

    #[test]
    fn test_radius_envelope_antimeridian_split() {
        let envelopes = radius_envelopes(&Point::new(179.999, 0.0), 5_000.0);
        assert_eq!(envelopes.len(), 2);
        assert!(envelopes.iter().any(|e| e.contains_point(&[-179.99, 0.0])));
        assert!(envelopes.iter().any(|e| e.contains_point(&[179.99, 0.0])));
    }

    #[test]
    fn test_radius_envelope_polar() {
        let envelopes = radius_envelopes(&Point::new(10.0, 89.99), 10_000.0);
        assert_eq!(envelopes.len(), 1);
        assert!(envelopes[0].contains_point(&[-170.0, 89.95]));
    }

    #[test]
    fn test_radius_envelope_whole_world() {
        let envelopes = radius_envelopes(&Point::new(0.0, 0.0), MAX_SURFACE_DISTANCE_M);
        assert_eq!(envelopes.len(), 1);
        assert!(envelopes[0].contains_point(&[180.0, -90.0]));
    }

    #[test]
    fn test_bounding_envelope() {
        let env = bounding_envelope(&square(-1.0, 2.0)).unwrap();
        assert_eq!(env.lower(), [-1.0, -1.0]);
        assert_eq!(env.upper(), [2.0, 2.0]);
        assert!(bounding_envelope(&MultiPolygon::new(vec![])).is_none());
    }
}
