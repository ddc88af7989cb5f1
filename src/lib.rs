//! Cafemap - an in-process geospatial query engine for POIs, regions and quarters
//!
//! This library provides the engine, its data loading and the shared types used
//! by the `query` binary.

pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod index;
pub mod loader;
pub mod models;
pub mod results;

pub use config::Config;
pub use engine::{QueryEngine, Snapshot};
pub use error::{EngineError, LoadError};
pub use loader::{DataSource, FileSource};
pub use models::{Poi, Quarter, Region};
pub use results::{PoiHit, Projection};
