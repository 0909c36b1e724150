use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::distance::DistanceMetric;
use crate::error::{BkmeansError, Result};

/// Knobs shared by every Lloyd run inside a bisecting run.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct BisectConfig {
    /// Maximum Lloyd iterations per bisection.
    pub max_iter: usize,
    /// Relative tolerance of the centroid stability test.
    pub rtol: f64,
    /// Absolute tolerance of the centroid stability test.
    pub atol: f64,
    pub metric: DistanceMetric,
}

impl Default for BisectConfig {
    fn default() -> Self {
        Self {
            max_iter: 100,
            rtol: 1e-5,
            atol: 1e-8,
            metric: DistanceMetric::Euclidean,
        }
    }
}

impl BisectConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_iter == 0 {
            return Err(BkmeansError::InvalidConfig("max_iter must be > 0".into()));
        }
        let bad = |v: f64| v.is_nan() || v < 0.0;
        if bad(self.rtol) || bad(self.atol) {
            return Err(BkmeansError::InvalidConfig(
                "rtol and atol must be non-negative".into(),
            ));
        }
        Ok(())
    }
}

/// Settings for scanning a range of cluster counts.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ScanConfig {
    /// Smallest cluster count tried (inclusive).
    pub k_min: usize,
    /// Largest cluster count tried (inclusive).
    pub k_max: usize,
    /// Seed of the single generator shared by the whole scan.
    pub seed: u64,
    /// Where the score series is written.
    pub output: PathBuf,
    pub bisect: BisectConfig,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            k_min: 2,
            k_max: 9,
            seed: 42,
            output: PathBuf::from("silhouette_scores.json"),
            bisect: BisectConfig::default(),
        }
    }
}

impl ScanConfig {
    /// Load a config from a JSON file. Missing fields take their defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: ScanConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.k_min == 0 {
            return Err(BkmeansError::InvalidConfig("k_min must be > 0".into()));
        }
        if self.k_min > self.k_max {
            return Err(BkmeansError::InvalidConfig(format!(
                "k_min ({}) must be <= k_max ({})",
                self.k_min, self.k_max
            )));
        }
        self.bisect.validate()
    }
}
