use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub data: DataConfig,
    pub query: QueryConfig,
    pub load: LoadConfig,
}

/// Input files. Any of them may be left out, giving an empty set of that kind.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct DataConfig {
    /// POI CSV, optionally gzipped
    pub pois: Option<PathBuf>,
    /// Region GeoJSON FeatureCollection
    pub regions: Option<PathBuf>,
    /// Quarter GeoJSON FeatureCollection
    pub quarters: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct QueryConfig {
    pub default_radius_m: f64,
    pub max_radius_m: f64,
    pub default_k: usize,
    pub max_k: usize,
    /// Douglas-Peucker tolerance in degrees used when an export gives none
    pub default_simplify_tolerance: f64,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_radius_m: 500.0,
            max_radius_m: 50_000.0,
            default_k: 5,
            max_k: 1000,
            default_simplify_tolerance: 0.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoadConfig {
    /// Largest tolerated fraction of rejected records per entity kind
    pub max_reject_ratio: f64,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            max_reject_ratio: 0.1,
        }
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to read config file")?;
        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let q = &self.query;
        if !q.max_radius_m.is_finite() || q.max_radius_m <= 0.0 {
            bail!("query.max_radius_m must be a positive number");
        }
        if !q.default_radius_m.is_finite()
            || q.default_radius_m < 0.0
            || q.default_radius_m > q.max_radius_m
        {
            bail!("query.default_radius_m must be between 0 and query.max_radius_m");
        }
        if q.max_k == 0 {
            bail!("query.max_k must be at least 1");
        }
        if q.default_k > q.max_k {
            bail!("query.default_k must not exceed query.max_k");
        }
        if !q.default_simplify_tolerance.is_finite() || q.default_simplify_tolerance < 0.0 {
            bail!("query.default_simplify_tolerance must be a non-negative number");
        }

        let ratio = self.load.max_reject_ratio;
        if !(0.0..=1.0).contains(&ratio) {
            bail!("load.max_reject_ratio must be between 0 and 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.query.default_radius_m, 500.0);
        assert_eq!(config.query.default_k, 5);
        assert_eq!(config.load.max_reject_ratio, 0.1);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [data]
            pois = "cafes.csv.gz"

            [query]
            max_k = 50
            "#,
        )
        .unwrap();
        assert_eq!(config.data.pois, Some(PathBuf::from("cafes.csv.gz")));
        assert!(config.data.regions.is_none());
        assert_eq!(config.query.max_k, 50);
        assert_eq!(config.query.max_radius_m, 50_000.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_inconsistent_limits() {
        let mut config = Config::default();
        config.query.default_k = 10;
        config.query.max_k = 5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.query.default_radius_m = 60_000.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.load.max_reject_ratio = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cafemap.toml");
        fs::write(&path, "[load]\nmax_reject_ratio = 0.25\n").unwrap();
        let config = Config::load_from_file(&path).unwrap();
        assert_eq!(config.load.max_reject_ratio, 0.25);

        assert!(Config::load_from_file(dir.path().join("missing.toml")).is_err());
    }
}
