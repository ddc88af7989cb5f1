//! Spatial index over points of interest.
//!
//! Radius, k-nearest and polygon queries share one R-tree: the tree narrows
//! candidates by envelope and the exact predicate runs on what's left.

mod poi;

pub use poi::{PoiIndex, PoiMatch};
