//! Topology-preserving boundary simplification for export.

use geo::{Coord, Intersects, LineString, MultiPolygon, Polygon};
use rstar::{RTree, RTreeObject};

use super::polygon_problem;
use super::validate::{parts_overlap, PartEnvelope};

/// Simplify every ring of a boundary with Douglas-Peucker, tolerance in degrees.
///
/// A simplified ring is only kept if the polygon it belongs to stays valid
/// (see [`polygon_problem`]); otherwise the original ring is used. A simplified
/// polygon that would overlap, or newly touch, another polygon of the same
/// boundary is replaced by its original too. Polygon and hole counts never
/// change. With `tolerance <= 0` only vertices lying exactly on the segment
/// between their kept neighbours are removed, so containment is unchanged for
/// every point.
pub fn simplify(area: &MultiPolygon<f64>, tolerance: f64) -> MultiPolygon<f64> {
    if area.0.len() < 2 {
        return MultiPolygon::new(
            area.0
                .iter()
                .map(|poly| simplify_polygon(poly, tolerance))
                .collect(),
        );
    }
    let mut parts = area.0.clone();

    // Simplified rings keep a subset of the original vertices, so these
    // envelopes stay valid as parts get replaced.
    let envelopes: RTree<PartEnvelope> = RTree::bulk_load(
        parts
            .iter()
            .enumerate()
            .filter_map(|(slot, poly)| PartEnvelope::of(slot, poly))
            .collect(),
    );

    for i in 0..parts.len() {
        let candidate = simplify_polygon(&parts[i], tolerance);
        if candidate == parts[i] {
            continue;
        }
        let Some(own) = PartEnvelope::of(i, &parts[i]) else {
            continue;
        };

        let clashes = envelopes
            .locate_in_envelope_intersecting(&own.envelope())
            .filter(|other| other.slot != i)
            .any(|other| {
                let sibling = &parts[other.slot];
                parts_overlap(&candidate, sibling)
                    || (candidate.intersects(sibling) && !parts[i].intersects(sibling))
            });
        if !clashes {
            parts[i] = candidate;
        }
    }

    MultiPolygon::new(parts)
}

fn simplify_polygon(poly: &Polygon<f64>, tolerance: f64) -> Polygon<f64> {
    let mut exterior = poly.exterior().clone();
    let mut interiors = poly.interiors().to_vec();

    let candidate = simplify_ring(&exterior, tolerance);
    if candidate.0.len() != exterior.0.len()
        && polygon_problem(&Polygon::new(candidate.clone(), interiors.clone())).is_none()
    {
        exterior = candidate;
    }

    for i in 0..interiors.len() {
        let candidate = simplify_ring(&interiors[i], tolerance);
        if candidate.0.len() == interiors[i].0.len() {
            continue;
        }
        let original = std::mem::replace(&mut interiors[i], candidate);
        if polygon_problem(&Polygon::new(exterior.clone(), interiors.clone())).is_some() {
            interiors[i] = original;
        }
    }

    Polygon::new(exterior, interiors)
}

/// Douglas-Peucker on a single closed ring.
///
/// The ring is split at the vertex farthest from its start so that neither
/// half has coincident end points. Rings with fewer than four coordinates
/// are returned unchanged.
pub fn simplify_ring(ring: &LineString<f64>, tolerance: f64) -> LineString<f64> {
    let coords = &ring.0;
    if coords.len() < 4 {
        return ring.clone();
    }

    let last = coords.len() - 1;
    let split = (1..last)
        .max_by(|&a, &b| dist2(coords[0], coords[a]).total_cmp(&dist2(coords[0], coords[b])))
        .unwrap_or(1);

    let mut keep = vec![false; coords.len()];
    keep[0] = true;
    keep[split] = true;
    keep[last] = true;

    let tolerance = tolerance.max(0.0);
    douglas_peucker(coords, 0, split, tolerance, &mut keep);
    douglas_peucker(coords, split, last, tolerance, &mut keep);

    LineString::new(
        coords
            .iter()
            .zip(keep)
            .filter_map(|(c, k)| k.then_some(*c))
            .collect(),
    )
}

fn douglas_peucker(coords: &[Coord<f64>], start: usize, end: usize, tolerance: f64, keep: &mut [bool]) {
    let mut stack = vec![(start, end)];

    while let Some((s, e)) = stack.pop() {
        if e <= s + 1 {
            continue;
        }

        let mut farthest = s;
        let mut max_dist = -1.0;
        for (i, c) in coords.iter().enumerate().take(e).skip(s + 1) {
            let d = segment_distance(*c, coords[s], coords[e]);
            if d > max_dist {
                max_dist = d;
                farthest = i;
            }
        }

        if max_dist > tolerance {
            keep[farthest] = true;
            stack.push((s, farthest));
            stack.push((farthest, e));
        }
    }
}

fn dist2(a: Coord<f64>, b: Coord<f64>) -> f64 {
    let (dx, dy) = (a.x - b.x, a.y - b.y);
    dx * dx + dy * dy
}

/// Planar distance from `p` to the segment `a`-`b`.
fn segment_distance(p: Coord<f64>, a: Coord<f64>, b: Coord<f64>) -> f64 {
    let len2 = dist2(a, b);
    if len2 == 0.0 {
        return dist2(p, a).sqrt();
    }
    let t = (((p.x - a.x) * (b.x - a.x) + (p.y - a.y) * (b.y - a.y)) / len2).clamp(0.0, 1.0);
    let projected = Coord {
        x: a.x + t * (b.x - a.x),
        y: a.y + t * (b.y - a.y),
    };
    dist2(p, projected).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::contains;
    use geo::Point;

    fn jagged_ring() -> LineString<f64> {
        // A square with small teeth along the bottom edge
        let mut coords = vec![(0.0, 0.0)];
        for i in 1..10 {
            let x = i as f64 * 0.1;
            let y = if i % 2 == 0 { 0.0 } else { 0.01 };
            coords.push((x, y));
        }
        coords.extend([(1.0, 0.0), (1.0, 1.0), (0.5, 1.0), (0.0, 1.0), (0.0, 0.0)]);
        LineString::from(coords)
    }

    #[test]
    fn test_zero_tolerance_drops_only_collinear() {
        let ring = LineString::from(vec![
            (0.0, 0.0),
            (0.5, 0.0),
            (1.0, 0.0),
            (1.0, 1.0),
            (0.0, 1.0),
            (0.0, 0.0),
        ]);
        let simplified = simplify_ring(&ring, 0.0);
        assert_eq!(simplified.0.len(), 5);
        assert!(!simplified.0.contains(&Coord { x: 0.5, y: 0.0 }));
    }

    #[test]
    fn test_tolerance_removes_teeth() {
        let area = MultiPolygon::new(vec![Polygon::new(jagged_ring(), vec![])]);
        let simplified = simplify(&area, 0.05);
        assert_eq!(simplified.0.len(), 1);
        assert!(simplified.0[0].exterior().0.len() < jagged_ring().0.len());
        assert!(polygon_problem(&simplified.0[0]).is_none());
    }

    #[test]
    fn test_huge_tolerance_keeps_valid_ring() {
        let area = MultiPolygon::new(vec![Polygon::new(jagged_ring(), vec![])]);
        let simplified = simplify(&area, 10.0);
        let ring = simplified.0[0].exterior();
        assert!(ring.0.len() >= 4);
        assert!(polygon_problem(&simplified.0[0]).is_none());
    }

    #[test]
    fn test_holes_are_preserved() {
        let poly = Polygon::new(
            LineString::from(vec![(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (0.0, 4.0), (0.0, 0.0)]),
            vec![LineString::from(vec![
                (1.0, 1.0),
                (2.0, 1.0),
                (3.0, 1.0),
                (3.0, 3.0),
                (1.0, 3.0),
                (1.0, 1.0),
            ])],
        );
        let simplified = simplify(&MultiPolygon::new(vec![poly]), 100.0);
        assert_eq!(simplified.0[0].interiors().len(), 1);
        assert!(polygon_problem(&simplified.0[0]).is_none());
    }

    fn notched_square() -> Polygon<f64> {
        // Unit square with a shallow notch cut into its right edge
        Polygon::new(
            LineString::from(vec![
                (0.0, 0.0),
                (1.0, 0.0),
                (1.0, 0.4),
                (0.9, 0.5),
                (1.0, 0.6),
                (1.0, 1.0),
                (0.0, 1.0),
                (0.0, 0.0),
            ]),
            vec![],
        )
    }

    #[test]
    fn test_simplified_part_cannot_swallow_sibling() {
        let island = Polygon::new(
            LineString::from(vec![(0.97, 0.47), (0.99, 0.5), (0.97, 0.53), (0.97, 0.47)]),
            vec![],
        );

        // On its own the notch is below tolerance and disappears
        let alone = simplify(&MultiPolygon::new(vec![notched_square()]), 0.2);
        assert_eq!(alone.0[0].exterior().0.len(), 5);

        let area = MultiPolygon::new(vec![notched_square(), island.clone()]);
        let simplified = simplify(&area, 0.2);
        assert_eq!(simplified.0.len(), 2);
        assert!(!simplified.0[0].intersects(&simplified.0[1]));
        assert_eq!(simplified.0[1], island);

        let in_notch = Point::new(0.93, 0.5);
        assert!(!contains(&area, &in_notch));
        assert!(!contains(&simplified, &in_notch));
    }

    #[test]
    fn test_disjoint_parts_still_simplify() {
        let far = Polygon::new(
            LineString::from(vec![(5.0, 5.0), (6.0, 5.0), (6.0, 6.0), (5.0, 6.0), (5.0, 5.0)]),
            vec![],
        );
        let simplified = simplify(&MultiPolygon::new(vec![notched_square(), far.clone()]), 0.2);
        assert_eq!(simplified.0[0].exterior().0.len(), 5);
        assert_eq!(simplified.0[1], far);
    }

    #[test]
    fn test_zero_tolerance_keeps_containment() {
        let area = MultiPolygon::new(vec![Polygon::new(jagged_ring(), vec![])]);
        let simplified = simplify(&area, 0.0);
        for i in 0..=20 {
            for j in 0..=20 {
                let p = Point::new(i as f64 * 0.05, j as f64 * 0.05 - 0.01);
                assert_eq!(contains(&area, &p), contains(&simplified, &p), "at {:?}", p);
            }
        }
    }
}
