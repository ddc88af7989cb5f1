//! Core data models for the query engine.

pub mod poi;
pub mod region;

pub use poi::{Address, Poi, PoiId};
pub use region::{title_case, NameField, Quarter, Region, RegionId, RegionNames};
