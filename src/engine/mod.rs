//! Query engine: validated operations over the current snapshot.
//!
//! Readers take an `Arc<Snapshot>` under a brief read lock and run their query
//! with no lock held. [`QueryEngine::reload`] builds a complete new snapshot
//! off to the side and swaps the `Arc`, so a query sees either the old data or
//! the new data, never a mix. A failed reload leaves the old snapshot serving.

mod snapshot;

pub use snapshot::Snapshot;

use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, info, warn};

use crate::config::{Config, QueryConfig};
use crate::error::{EngineError, Result};
use crate::geometry;
use crate::loader::{self, DataSource};
use crate::results::{
    annotate, unannotated, LocatedQuarter, LocatedRegion, Location, PoiHit, QuarterExport,
    RegionExport, Stats,
};

pub struct QueryEngine {
    limits: QueryConfig,
    max_reject_ratio: f64,
    current: RwLock<Option<Arc<Snapshot>>>,
}

impl QueryEngine {
    /// Create an engine with no data. Queries fail with `DataUnavailable`
    /// until [`Self::install`] or [`Self::reload`] succeeds.
    pub fn new(config: &Config) -> Self {
        Self {
            limits: config.query.clone(),
            max_reject_ratio: config.load.max_reject_ratio,
            current: RwLock::new(None),
        }
    }

    /// Make `snapshot` current
    pub fn install(&self, snapshot: Snapshot) -> Arc<Snapshot> {
        let snapshot = Arc::new(snapshot);
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *current = Some(Arc::clone(&snapshot));
        snapshot
    }

    /// Load, validate and index everything from `source`, then swap it in.
    ///
    /// On failure the previous snapshot (if any) stays current.
    pub fn reload(&self, source: &dyn DataSource) -> Result<Arc<Snapshot>> {
        info!("Reloading data...");
        match loader::validate(source, self.max_reject_ratio) {
            Ok(data) => Ok(self.install(Snapshot::from_validated(data))),
            Err(e) => {
                warn!("Reload failed, keeping previous snapshot: {}", e);
                Err(e.into())
            }
        }
    }

    /// The snapshot queries currently run against
    pub fn snapshot(&self) -> Result<Arc<Snapshot>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| EngineError::DataUnavailable("no data loaded yet".to_string()))
    }

    pub fn is_loaded(&self) -> bool {
        self.snapshot().is_ok()
    }

    /// POIs within `radius_m` metres (default from config), nearest first
    pub fn radius_search(&self, lon: f64, lat: f64, radius_m: Option<f64>) -> Result<Vec<PoiHit>> {
        let center = geometry::validate_coord(lon, lat)?;
        let radius_m = self.check_radius(radius_m)?;
        let snapshot = self.snapshot()?;

        let hits = annotate(snapshot.pois.within_radius(&center, radius_m));
        debug!("radius_search({}, {}, {}m) -> {} hits", lon, lat, radius_m, hits.len());
        Ok(hits)
    }

    /// Up to `k` nearest POIs (default from config)
    pub fn k_nearest(&self, lon: f64, lat: f64, k: Option<usize>) -> Result<Vec<PoiHit>> {
        let center = geometry::validate_coord(lon, lat)?;
        let k = k.unwrap_or(self.limits.default_k);
        if k > self.limits.max_k {
            return Err(EngineError::InvalidInput(format!(
                "k {} exceeds the maximum of {}",
                k, self.limits.max_k
            )));
        }
        let snapshot = self.snapshot()?;

        let hits = annotate(snapshot.pois.k_nearest(&center, k));
        debug!("k_nearest({}, {}, {}) -> {} hits", lon, lat, k, hits.len());
        Ok(hits)
    }

    /// POIs inside the region the name resolves to
    pub fn within_region_by_name(&self, name: &str) -> Result<Vec<PoiHit>> {
        let snapshot = self.snapshot()?;
        let region = snapshot
            .catalog
            .resolve_by_name(name)
            .ok_or_else(|| EngineError::NotFound(format!("no region named '{}'", name.trim())))?;

        let hits = unannotated(snapshot.pois.within_polygon(&region.boundary));
        debug!("within_region_by_name('{}') -> region {}, {} hits", name, region.id, hits.len());
        Ok(hits)
    }

    /// POIs inside the quarter with this rank
    pub fn within_quarter_by_rank(&self, rank: u32) -> Result<Vec<PoiHit>> {
        let snapshot = self.snapshot()?;
        let quarter = snapshot
            .catalog
            .lookup_by_rank(rank)
            .ok_or_else(|| EngineError::NotFound(format!("no quarter with rank {}", rank)))?;

        let hits = unannotated(snapshot.pois.within_polygon(&quarter.boundary));
        debug!("within_quarter_by_rank({}) -> {} hits", rank, hits.len());
        Ok(hits)
    }

    /// Every region, simplified with `tolerance` degrees (default from config)
    pub fn list_regions(&self, tolerance: Option<f64>) -> Result<Vec<RegionExport>> {
        let tolerance = self.check_tolerance(tolerance)?;
        let snapshot = self.snapshot()?;
        Ok(snapshot
            .catalog
            .all_regions()
            .map(|region| RegionExport::from_region(region, tolerance))
            .collect())
    }

    /// Every quarter in rank order, simplified like [`Self::list_regions`]
    pub fn list_quarters(&self, tolerance: Option<f64>) -> Result<Vec<QuarterExport>> {
        let tolerance = self.check_tolerance(tolerance)?;
        let snapshot = self.snapshot()?;
        Ok(snapshot
            .catalog
            .all_quarters()
            .map(|quarter| QuarterExport::from_quarter(quarter, tolerance))
            .collect())
    }

    /// Every POI, by id
    pub fn all_pois(&self) -> Result<Vec<PoiHit>> {
        let snapshot = self.snapshot()?;
        Ok(snapshot.pois.all().cloned().map(PoiHit::without_distance).collect())
    }

    /// Regions and quarter covering a point
    pub fn locate(&self, lon: f64, lat: f64) -> Result<Location> {
        let point = geometry::validate_coord(lon, lat)?;
        let snapshot = self.snapshot()?;

        let regions = snapshot
            .catalog
            .regions_at(&point)
            .into_iter()
            .map(|r| LocatedRegion::from(&**r))
            .collect();
        let quarter = snapshot.catalog.quarter_at(&point).map(|q| LocatedQuarter {
            rank: q.rank,
            name: q.name.clone(),
        });

        Ok(Location {
            lon,
            lat,
            regions,
            quarter,
        })
    }

    pub fn stats(&self) -> Result<Stats> {
        let snapshot = self.snapshot()?;
        Ok(Stats {
            pois: snapshot.pois.len(),
            regions: snapshot.catalog.region_count(),
            quarters: snapshot.catalog.quarter_count(),
            loaded_at: snapshot.loaded_at,
            load: snapshot.report.clone(),
        })
    }

    fn check_radius(&self, radius_m: Option<f64>) -> Result<f64> {
        let radius_m = radius_m.unwrap_or(self.limits.default_radius_m);
        if !radius_m.is_finite() || radius_m < 0.0 {
            return Err(EngineError::InvalidInput(format!(
                "radius must be a non-negative number of metres, got {}",
                radius_m
            )));
        }
        if radius_m > self.limits.max_radius_m {
            return Err(EngineError::InvalidInput(format!(
                "radius {}m exceeds the maximum of {}m",
                radius_m, self.limits.max_radius_m
            )));
        }
        Ok(radius_m)
    }

    fn check_tolerance(&self, tolerance: Option<f64>) -> Result<f64> {
        let tolerance = tolerance.unwrap_or(self.limits.default_simplify_tolerance);
        if !tolerance.is_finite() || tolerance < 0.0 {
            return Err(EngineError::InvalidInput(format!(
                "tolerance must be a non-negative number of degrees, got {}",
                tolerance
            )));
        }
        Ok(tolerance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{MemorySource, PoiRecord};
    use crate::models::{Poi, PoiId, Quarter, Region, RegionNames};
    use geo::{polygon, MultiPolygon, Point};

    fn square(min_x: f64, min_y: f64, size: f64) -> MultiPolygon<f64> {
        MultiPolygon::new(vec![polygon![
            (x: min_x, y: min_y),
            (x: min_x + size, y: min_y),
            (x: min_x + size, y: min_y + size),
            (x: min_x, y: min_y + size),
            (x: min_x, y: min_y),
        ]])
    }

    fn ids(hits: &[PoiHit]) -> Vec<PoiId> {
        hits.iter().map(|h| h.poi.id).collect()
    }

    /// Three POIs around the origin, one region and four quarters
    fn loaded_engine() -> QueryEngine {
        let engine = QueryEngine::new(&Config::default());
        let pois = vec![
            Poi::new(1, Point::new(0.0, 0.0)),
            Poi::new(2, Point::new(0.0, 0.001)),
            Poi::new(3, Point::new(1.0, 1.0)),
        ];
        let regions = vec![Region {
            id: 1,
            code: None,
            names: RegionNames {
                english: Some("Dublin".to_string()),
                ..Default::default()
            },
            boundary: square(-0.5, -0.5, 1.0),
        }];
        let quarters = (0..4)
            .map(|i| Quarter {
                rank: i + 1,
                name: None,
                boundary: square(-1.0 + (i % 2) as f64 * 1.5, -1.0 + (i / 2) as f64 * 1.5, 1.5),
            })
            .collect();
        engine.install(Snapshot::build(pois, regions, quarters));
        engine
    }

    #[test]
    fn test_queries_fail_before_first_load() {
        let engine = QueryEngine::new(&Config::default());
        assert!(!engine.is_loaded());
        assert!(matches!(
            engine.radius_search(0.0, 0.0, None),
            Err(EngineError::DataUnavailable(_))
        ));
        assert!(matches!(engine.stats(), Err(EngineError::DataUnavailable(_))));
    }

    #[test]
    fn test_radius_scenario() {
        let engine = loaded_engine();
        let hits = engine.radius_search(0.0, 0.0, Some(200.0)).unwrap();
        assert_eq!(ids(&hits), vec![1, 2]);
        assert_eq!(hits[0].distance_m, Some(0.0));
        assert!(hits[1].distance_m.unwrap() > 110.0);
    }

    #[test]
    fn test_default_radius_is_500m() {
        let engine = loaded_engine();
        let hits = engine.radius_search(0.0, 0.004, None).unwrap();
        // 334m and 445m away
        assert_eq!(ids(&hits), vec![2, 1]);
        assert_eq!(ids(&engine.radius_search(0.0, 0.005, None).unwrap()), vec![2]);
    }

    #[test]
    fn test_k_nearest_scenario() {
        let engine = loaded_engine();
        let hits = engine.k_nearest(0.0, 0.0, Some(1)).unwrap();
        assert_eq!(ids(&hits), vec![1]);

        let hits = engine.k_nearest(0.0, 0.0, None).unwrap();
        assert_eq!(ids(&hits), vec![1, 2, 3]);
        assert!(engine.k_nearest(0.0, 0.0, Some(0)).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_input() {
        let engine = loaded_engine();
        for (lon, lat) in [(181.0, 0.0), (0.0, -90.5), (f64::NAN, 0.0)] {
            assert!(matches!(
                engine.radius_search(lon, lat, None),
                Err(EngineError::InvalidInput(_))
            ));
            assert!(matches!(engine.locate(lon, lat), Err(EngineError::InvalidInput(_))));
        }
        for radius in [-1.0, f64::INFINITY, 50_001.0] {
            assert!(matches!(
                engine.radius_search(0.0, 0.0, Some(radius)),
                Err(EngineError::InvalidInput(_))
            ));
        }
        assert!(matches!(
            engine.k_nearest(0.0, 0.0, Some(1001)),
            Err(EngineError::InvalidInput(_))
        ));
        assert!(matches!(
            engine.list_regions(Some(-0.1)),
            Err(EngineError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_region_by_name() {
        let engine = loaded_engine();
        let hits = engine.within_region_by_name("DUBLIN").unwrap();
        assert_eq!(ids(&hits), vec![1, 2]);
        assert!(hits.iter().all(|h| h.distance_m.is_none()));

        assert!(matches!(
            engine.within_region_by_name("Cork"),
            Err(EngineError::NotFound(_))
        ));
    }

    #[test]
    fn test_quarter_by_rank() {
        let engine = loaded_engine();
        assert!(matches!(
            engine.within_quarter_by_rank(99),
            Err(EngineError::NotFound(_))
        ));

        // Quarters tile [-1, 2] x [-1, 2]; a POI on a shared edge lands in both
        let mut union: Vec<PoiId> = (1..=4)
            .flat_map(|rank| ids(&engine.within_quarter_by_rank(rank).unwrap()))
            .collect();
        union.sort();
        union.dedup();
        assert_eq!(union, vec![1, 2, 3]);
    }

    #[test]
    fn test_list_regions_and_quarters() {
        let engine = loaded_engine();
        let regions = engine.list_regions(None).unwrap();
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].english_name, "Dublin");
        assert_eq!(regions[0].localized_name, "Gan Ainm");
        assert_eq!(regions[0].province, "Unknown");

        let ranks: Vec<u32> = engine
            .list_quarters(Some(0.01))
            .unwrap()
            .iter()
            .map(|q| q.rank)
            .collect();
        assert_eq!(ranks, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_locate_and_stats() {
        let engine = loaded_engine();
        let location = engine.locate(0.0, 0.0).unwrap();
        assert_eq!(location.regions.len(), 1);
        assert_eq!(location.quarter.map(|q| q.rank), Some(1));

        let location = engine.locate(10.0, 10.0).unwrap();
        assert!(location.regions.is_empty());
        assert!(location.quarter.is_none());

        let stats = engine.stats().unwrap();
        assert_eq!((stats.pois, stats.regions, stats.quarters), (3, 1, 4));
        assert_eq!(ids(&engine.all_pois().unwrap()), vec![1, 2, 3]);
    }

    #[test]
    fn test_failed_reload_keeps_previous_snapshot() {
        let engine = loaded_engine();
        let before = engine.snapshot().unwrap().loaded_at;

        let bad = MemorySource {
            pois: vec![PoiRecord::new(1, 500.0, 0.0)],
            ..Default::default()
        };
        assert!(matches!(engine.reload(&bad), Err(EngineError::DataUnavailable(_))));
        assert_eq!(engine.snapshot().unwrap().loaded_at, before);
        assert_eq!(engine.stats().unwrap().pois, 3);

        let good = MemorySource {
            pois: vec![PoiRecord::new(1, 0.0, 0.0)],
            ..Default::default()
        };
        engine.reload(&good).unwrap();
        assert_eq!(engine.stats().unwrap().pois, 1);
        assert_eq!(engine.stats().unwrap().regions, 0);
    }

    #[test]
    fn test_readers_see_whole_snapshots_during_reload() {
        let engine = loaded_engine();
        let bigger = MemorySource {
            pois: (1..=50)
                .map(|i| PoiRecord::new(i, 0.0, i as f64 * 0.0001))
                .collect(),
            ..Default::default()
        };

        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for _ in 0..200 {
                        let snapshot = engine.snapshot().unwrap();
                        let count = snapshot.pois.len();
                        // Old snapshot has 3 POIs, new one 50; nothing in between
                        assert!(count == 3 || count == 50);
                        assert_eq!(snapshot.pois.all().count(), count);
                    }
                });
            }
            scope.spawn(|| {
                engine.reload(&bigger).unwrap();
            });
        });

        assert_eq!(engine.stats().unwrap().pois, 50);
    }
}
