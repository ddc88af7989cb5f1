//! R-tree index for POI lookups.

use std::cmp::Ordering;
use std::sync::Arc;

use geo::{MultiPolygon, Point};
use rstar::{RTree, RTreeObject, AABB};
use tracing::{debug, info};

use crate::geometry::{self, MAX_SURFACE_DISTANCE_M};
use crate::models::{Poi, PoiId};

/// First radius tried by the expanding k-nearest search
const KNN_START_RADIUS_M: f64 = 250.0;

/// Radius growth factor between k-nearest rounds
const KNN_GROWTH: f64 = 4.0;

/// Wrapper for R-tree indexing of POIs
#[derive(Clone)]
struct IndexedPoi {
    poi: Arc<Poi>,
}

impl RTreeObject for IndexedPoi {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.poi.lon(), self.poi.lat()])
    }
}

/// A POI together with its distance from the query centre.
#[derive(Debug, Clone)]
pub struct PoiMatch {
    pub poi: Arc<Poi>,
    pub distance_m: f64,
}

impl PoiMatch {
    /// Ascending distance, then ascending id
    fn cmp_by_distance(&self, other: &Self) -> Ordering {
        self.distance_m
            .total_cmp(&other.distance_m)
            .then_with(|| self.poi.id.cmp(&other.poi.id))
    }
}

/// Immutable spatial index over a POI snapshot
pub struct PoiIndex {
    tree: RTree<IndexedPoi>,
    /// All POIs sorted by id, for ordered export
    by_id: Vec<Arc<Poi>>,
}

impl PoiIndex {
    /// Build the index from already validated POIs
    pub fn build(pois: Vec<Poi>) -> Self {
        info!("Building spatial index for {} POIs...", pois.len());

        let mut by_id: Vec<Arc<Poi>> = pois.into_iter().map(Arc::new).collect();
        by_id.sort_by_key(|p| p.id);

        let indexed: Vec<IndexedPoi> = by_id
            .iter()
            .map(|poi| IndexedPoi {
                poi: Arc::clone(poi),
            })
            .collect();
        let tree = RTree::bulk_load(indexed);

        info!("Spatial index built with {} entries", tree.size());

        Self { tree, by_id }
    }

    /// All POIs within `radius_m` metres of `center`, sorted by distance then id
    pub fn within_radius(&self, center: &Point<f64>, radius_m: f64) -> Vec<PoiMatch> {
        if radius_m >= MAX_SURFACE_DISTANCE_M {
            return self.scan_all(center);
        }

        let mut matches: Vec<PoiMatch> = geometry::radius_envelopes(center, radius_m)
            .iter()
            .flat_map(|envelope| self.tree.locate_in_envelope(envelope))
            .filter_map(|ip| {
                let distance_m = geometry::distance(center, &ip.poi.location);
                (distance_m <= radius_m).then(|| PoiMatch {
                    poi: Arc::clone(&ip.poi),
                    distance_m,
                })
            })
            .collect();

        matches.sort_by(PoiMatch::cmp_by_distance);

        debug!(
            "Radius query at ({}, {}) r={}m: {} matches",
            center.x(),
            center.y(),
            radius_m,
            matches.len()
        );

        matches
    }

    /// Up to `k` POIs nearest to `center`, ordered by distance then id.
    ///
    /// Searches a growing radius until it holds at least `k` POIs; everything
    /// outside that radius is farther than the k-th match, so the result is
    /// exact. Ties at the cut-off are settled by id.
    pub fn k_nearest(&self, center: &Point<f64>, k: usize) -> Vec<PoiMatch> {
        if k == 0 || self.is_empty() {
            return Vec::new();
        }

        let mut radius = KNN_START_RADIUS_M;
        loop {
            let mut found = self.within_radius(center, radius);
            if found.len() >= k || radius >= MAX_SURFACE_DISTANCE_M {
                found.truncate(k);
                return found;
            }
            radius = (radius * KNN_GROWTH).min(MAX_SURFACE_DISTANCE_M);
        }
    }

    /// POIs inside `area` (boundary inclusive), sorted by id
    pub fn within_polygon(&self, area: &MultiPolygon<f64>) -> Vec<Arc<Poi>> {
        let Some(envelope) = geometry::bounding_envelope(area) else {
            return Vec::new();
        };

        let mut inside: Vec<Arc<Poi>> = self
            .tree
            .locate_in_envelope(&envelope)
            .filter(|ip| geometry::contains(area, &ip.poi.location))
            .map(|ip| Arc::clone(&ip.poi))
            .collect();
        inside.sort_by_key(|p| p.id);
        inside
    }

    fn scan_all(&self, center: &Point<f64>) -> Vec<PoiMatch> {
        let mut matches: Vec<PoiMatch> = self
            .by_id
            .iter()
            .map(|poi| PoiMatch {
                poi: Arc::clone(poi),
                distance_m: geometry::distance(center, &poi.location),
            })
            .collect();
        matches.sort_by(PoiMatch::cmp_by_distance);
        matches
    }

    /// Iterate over all POIs in id order
    pub fn all(&self) -> impl Iterator<Item = &Arc<Poi>> {
        self.by_id.iter()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}
