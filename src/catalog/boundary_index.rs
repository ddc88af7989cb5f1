//! Envelope index over region and quarter boundaries.

use geo::{MultiPolygon, Point};
use rstar::{RTree, RTreeObject, AABB};

use crate::geometry;

/// Wrapper for R-tree indexing of a boundary by its catalog slot
#[derive(Clone)]
struct IndexedBoundary {
    slot: usize,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for IndexedBoundary {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Pre-filter for point-in-polygon lookups.
///
/// Only answers "whose envelope covers this point"; callers run the exact
/// containment test on the returned slots.
pub struct BoundaryIndex {
    tree: RTree<IndexedBoundary>,
}

impl BoundaryIndex {
    pub fn build<'a>(boundaries: impl Iterator<Item = &'a MultiPolygon<f64>>) -> Self {
        let indexed: Vec<IndexedBoundary> = boundaries
            .enumerate()
            .filter_map(|(slot, boundary)| {
                geometry::bounding_envelope(boundary).map(|envelope| IndexedBoundary { slot, envelope })
            })
            .collect();

        Self {
            tree: RTree::bulk_load(indexed),
        }
    }

    /// Slots whose envelope covers `point`, in ascending slot order
    pub fn candidates(&self, point: &Point<f64>) -> Vec<usize> {
        let query_envelope = AABB::from_point([point.x(), point.y()]);
        let mut slots: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&query_envelope)
            .map(|ib| ib.slot)
            .collect();
        slots.sort_unstable();
        slots
    }

    pub(crate) fn len(&self) -> usize {
        self.tree.size()
    }
}
