//! Boundary validation and clean-up.

use geo::line_intersection::{line_intersection, LineIntersection};
use geo::{Area, BoundingRect, Coord, Line, LineString, MultiPolygon, Polygon, Relate};
use rstar::{RTree, RTreeObject, AABB};

use super::{ring_position, RingPosition};

/// One edge of a ring, indexed for crossing checks.
struct Segment {
    line: Line<f64>,
    ring: usize,
    index: usize,
    ring_len: usize,
}

impl RTreeObject for Segment {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(
            [self.line.start.x, self.line.start.y],
            [self.line.end.x, self.line.end.y],
        )
    }
}

impl Segment {
    fn is_adjacent(&self, other: &Segment) -> bool {
        if self.ring != other.ring {
            return false;
        }
        let (a, b) = (self.index, other.index);
        a + 1 == b || b + 1 == a || (a == 0 && b + 1 == self.ring_len) || (b == 0 && a + 1 == self.ring_len)
    }
}

/// Envelope of one part of a multi-polygon, keyed by its position.
pub(super) struct PartEnvelope {
    pub(super) slot: usize,
    envelope: AABB<[f64; 2]>,
}

impl PartEnvelope {
    pub(super) fn of(slot: usize, poly: &Polygon<f64>) -> Option<Self> {
        poly.bounding_rect().map(|rect| Self {
            slot,
            envelope: AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
        })
    }
}

impl RTreeObject for PartEnvelope {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Whether two parts share interior area or cross each other.
///
/// Parts that only touch along their boundaries do not overlap.
pub(super) fn parts_overlap(a: &Polygon<f64>, b: &Polygon<f64>) -> bool {
    let matrix = a.relate(b);
    matrix.is_intersects() && !matrix.is_touches()
}

/// Describe what's wrong with a polygon, or `None` if it's usable.
///
/// Rings must be closed, have at least four coordinates and no repeated
/// consecutive vertex, stay in lon/lat range and enclose a non-zero area.
/// Separate rings may not touch at all. No two edges may cross or
/// overlap (apart from neighbours sharing a vertex), and every hole must lie
/// inside the exterior.
pub fn polygon_problem(poly: &Polygon<f64>) -> Option<String> {
    let rings: Vec<&LineString<f64>> = std::iter::once(poly.exterior())
        .chain(poly.interiors().iter())
        .collect();

    for (i, ring) in rings.iter().enumerate() {
        if let Some(problem) = ring_problem(ring) {
            return Some(format!("ring {}: {}", i, problem));
        }
    }

    let mut segments = Vec::new();
    for (ring_idx, ring) in rings.iter().enumerate() {
        let ring_len = ring.0.len() - 1;
        for (index, line) in ring.lines().enumerate() {
            segments.push(Segment {
                line,
                ring: ring_idx,
                index,
                ring_len,
            });
        }
    }

    let tree = RTree::bulk_load(segments);
    for seg in tree.iter() {
        for other in tree.locate_in_envelope_intersecting(&seg.envelope()) {
            // Visit each pair once
            if (other.ring, other.index) <= (seg.ring, seg.index) {
                continue;
            }
            let Some(hit) = line_intersection(seg.line, other.line) else {
                continue;
            };
            let crossing = match hit {
                LineIntersection::Collinear { .. } => true,
                LineIntersection::SinglePoint { .. } => !seg.is_adjacent(other),
            };
            if crossing {
                return Some(format!(
                    "edges {}:{} and {}:{} intersect",
                    seg.ring, seg.index, other.ring, other.index
                ));
            }
        }
    }

    for (i, hole) in poly.interiors().iter().enumerate() {
        if ring_position(poly.exterior(), hole.0[0]) != RingPosition::Inside {
            return Some(format!("hole {} is outside the exterior ring", i));
        }
    }

    None
}

fn ring_problem(ring: &LineString<f64>) -> Option<String> {
    if ring.0.len() < 4 {
        return Some(format!("only {} coordinates", ring.0.len()));
    }
    if ring.0.first() != ring.0.last() {
        return Some("ring is not closed".to_string());
    }
    if ring.0.windows(2).any(|w| w[0] == w[1]) {
        return Some("repeated vertex".to_string());
    }
    if let Some(c) = ring.0.iter().find(|c| !coord_in_range(c)) {
        return Some(format!("coordinate ({}, {}) out of range", c.x, c.y));
    }
    if Polygon::new(ring.clone(), vec![]).unsigned_area() == 0.0 {
        return Some("ring has zero area".to_string());
    }
    None
}

fn coord_in_range(c: &Coord<f64>) -> bool {
    c.x.is_finite()
        && c.y.is_finite()
        && (-180.0..=180.0).contains(&c.x)
        && (-90.0..=90.0).contains(&c.y)
}

/// Outcome of [`sanitize_multi_polygon`].
#[derive(Debug, Clone)]
pub struct SanitizeReport {
    pub boundary: MultiPolygon<f64>,
    /// One entry per polygon that was dropped
    pub dropped: Vec<String>,
}

/// Clean a raw boundary: close open rings, drop repeated vertices, then drop
/// every polygon that still fails [`polygon_problem`].
///
/// Polygons are taken in order, and one that overlaps an already kept polygon
/// is dropped as well, so the parts of the result only ever touch.
pub fn sanitize_multi_polygon(raw: MultiPolygon<f64>) -> SanitizeReport {
    let mut kept: Vec<Polygon<f64>> = Vec::with_capacity(raw.0.len());
    let mut kept_from: Vec<usize> = Vec::with_capacity(raw.0.len());
    let mut envelopes: RTree<PartEnvelope> = RTree::new();
    let mut dropped = Vec::new();

    for (i, poly) in raw.0.into_iter().enumerate() {
        let (exterior, interiors) = poly.into_inner();
        let cleaned = Polygon::new(
            clean_ring(exterior),
            interiors.into_iter().map(clean_ring).collect(),
        );
        if let Some(problem) = polygon_problem(&cleaned) {
            dropped.push(format!("polygon {}: {}", i, problem));
            continue;
        }
        let Some(part) = PartEnvelope::of(kept.len(), &cleaned) else {
            dropped.push(format!("polygon {}: no coordinates", i));
            continue;
        };

        let overlapping = envelopes
            .locate_in_envelope_intersecting(&part.envelope)
            .map(|other| other.slot)
            .filter(|&slot| parts_overlap(&kept[slot], &cleaned))
            .min();
        if let Some(slot) = overlapping {
            dropped.push(format!("polygon {}: overlaps polygon {}", i, kept_from[slot]));
            continue;
        }

        envelopes.insert(part);
        kept.push(cleaned);
        kept_from.push(i);
    }

    SanitizeReport {
        boundary: MultiPolygon::new(kept),
        dropped,
    }
}

fn clean_ring(ring: LineString<f64>) -> LineString<f64> {
    let mut coords: Vec<Coord<f64>> = Vec::with_capacity(ring.0.len() + 1);
    for c in ring.0 {
        if coords.last() != Some(&c) {
            coords.push(c);
        }
    }

    // Close the ring if needed
    if coords.len() >= 3 && coords.first() != coords.last() {
        coords.push(coords[0]);
    }

    LineString::new(coords)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    #[test]
    fn test_valid_square() {
        let poly = polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 0.0),
            (x: 1.0, y: 1.0),
            (x: 0.0, y: 1.0),
            (x: 0.0, y: 0.0),
        ];
        assert!(polygon_problem(&poly).is_none());
    }

    #[test]
    fn test_bowtie_is_rejected() {
        // Unequal lobes, so the signed areas don't cancel out
        let poly = polygon![
            (x: 0.0, y: 0.0),
            (x: 2.0, y: 1.0),
            (x: 2.0, y: 0.0),
            (x: 0.0, y: 2.0),
            (x: 0.0, y: 0.0),
        ];
        let problem = polygon_problem(&poly).unwrap();
        assert_eq!(problem, "edges 0:0 and 0:2 intersect");
    }

    #[test]
    fn test_symmetric_bowtie_has_zero_area() {
        let poly = polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 1.0),
            (x: 1.0, y: 0.0),
            (x: 0.0, y: 1.0),
            (x: 0.0, y: 0.0),
        ];
        assert_eq!(polygon_problem(&poly).as_deref(), Some("ring 0: ring has zero area"));
    }

    #[test]
    fn test_zero_area_is_rejected() {
        let poly = polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 0.0),
            (x: 2.0, y: 0.0),
            (x: 0.0, y: 0.0),
        ];
        assert!(polygon_problem(&poly).is_some());
    }

    #[test]
    fn test_hole_outside_is_rejected() {
        let poly = Polygon::new(
            LineString::from(vec![(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0), (0.0, 0.0)]),
            vec![LineString::from(vec![
                (2.0, 2.0),
                (3.0, 2.0),
                (3.0, 3.0),
                (2.0, 2.0),
            ])],
        );
        assert!(polygon_problem(&poly).unwrap().contains("hole"));
    }

    #[test]
    fn test_sanitize_closes_rings_and_drops_bad_parts() {
        let open = Polygon::new(
            LineString::from(vec![(0.0, 0.0), (1.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]),
            vec![],
        );
        let line_like = Polygon::new(
            LineString::from(vec![(5.0, 5.0), (6.0, 6.0), (5.0, 5.0)]),
            vec![],
        );
        let report = sanitize_multi_polygon(MultiPolygon::new(vec![open, line_like]));
        assert_eq!(report.boundary.0.len(), 1);
        assert_eq!(report.dropped.len(), 1);
        let ring = report.boundary.0[0].exterior();
        assert_eq!(ring.0.len(), 5);
        assert_eq!(ring.0.first(), ring.0.last());
    }

    fn square(x: f64, y: f64, size: f64) -> Polygon<f64> {
        polygon![
            (x: x, y: y),
            (x: x + size, y: y),
            (x: x + size, y: y + size),
            (x: x, y: y + size),
            (x: x, y: y),
        ]
    }

    #[test]
    fn test_sanitize_drops_overlapping_parts() {
        let report = sanitize_multi_polygon(MultiPolygon::new(vec![
            square(0.0, 0.0, 2.0),
            square(1.0, 1.0, 2.0),
            square(5.0, 5.0, 1.0),
            square(0.5, 0.5, 0.5),
        ]));
        assert_eq!(report.boundary.0, vec![square(0.0, 0.0, 2.0), square(5.0, 5.0, 1.0)]);
        assert_eq!(
            report.dropped,
            vec!["polygon 1: overlaps polygon 0", "polygon 3: overlaps polygon 0"]
        );
    }

    #[test]
    fn test_sanitize_keeps_touching_parts() {
        let report = sanitize_multi_polygon(MultiPolygon::new(vec![
            square(0.0, 0.0, 1.0),
            square(1.0, 0.0, 1.0),
            square(2.0, 1.0, 1.0),
        ]));
        assert_eq!(report.boundary.0.len(), 3);
        assert!(report.dropped.is_empty());
    }

    #[test]
    fn test_out_of_range_coordinate() {
        let poly = polygon![
            (x: 179.0, y: 0.0),
            (x: 181.0, y: 0.0),
            (x: 181.0, y: 1.0),
            (x: 179.0, y: 0.0),
        ];
        assert!(polygon_problem(&poly).unwrap().contains("out of range"));
    }
}
