//! Scores bisecting runs over a range of cluster counts.

use std::path::Path;

use ndarray::{ArrayBase, Axis, Data, Ix2};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::bisecting::{BisectStatus, BisectingKMeans};
use crate::config::ScanConfig;
use crate::error::{BkmeansError, Result};
use crate::quality::silhouette_score;

/// Score of one requested cluster count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanPoint {
    pub k: usize,
    /// Clusters actually produced; 0 when the run could not start.
    pub n_clusters: usize,
    /// `None` when fewer than two distinct labels were produced.
    pub silhouette: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<BisectStatus>,
}

/// The silhouette series of a scan, in increasing `k`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanReport {
    pub seed: u64,
    pub points: Vec<ScanPoint>,
}

impl ScanReport {
    /// Pairs with a score, i.e. the points a chart of this scan would draw.
    pub fn plotted(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.points
            .iter()
            .filter_map(|p| p.silhouette.map(|s| (p.k, s)))
    }

    /// The `k` with the highest silhouette, first one on ties.
    pub fn best(&self) -> Option<(usize, f64)> {
        self.plotted()
            .fold(None, |best: Option<(usize, f64)>, (k, s)| match best {
                Some((_, b)) if b >= s => best,
                _ => Some((k, s)),
            })
    }

    /// Persist the report as JSON.
    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Runs bisecting k-means for every `k` in `config.k_min..=config.k_max`, all
/// drawing in increasing `k` from one generator seeded with `config.seed`.
///
/// A `k` larger than the number of rows is recorded without a score instead of
/// aborting the scan.
pub fn scan_k<S>(data: &ArrayBase<S, Ix2>, config: &ScanConfig) -> Result<ScanReport>
where
    S: Data<Elem = f64> + Sync,
{
    config.validate()?;
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let mut points = Vec::with_capacity(config.k_max - config.k_min + 1);

    for k in config.k_min..=config.k_max {
        let model = BisectingKMeans::new(k).with_config(config.bisect.clone());
        let partition = match model.fit(data, &mut rng) {
            Ok(partition) => partition,
            Err(BkmeansError::Initialization {
                requested,
                available,
            }) => {
                warn!(k, requested, available, "not enough rows, skipping");
                points.push(ScanPoint {
                    k,
                    n_clusters: 0,
                    silhouette: None,
                    status: None,
                });
                continue;
            }
            Err(e) => return Err(e),
        };

        let silhouette = silhouette_score(data, &partition.labels);
        match silhouette {
            Some(score) => info!(k, clusters = partition.n_clusters(), score, "silhouette"),
            None => warn!(k, "skipping silhouette score due to insufficient unique clusters"),
        }
        points.push(ScanPoint {
            k,
            n_clusters: partition.n_clusters(),
            silhouette,
            status: Some(partition.status),
        });
    }

    info!(rows = data.len_of(Axis(0)), runs = points.len(), "scan finished");
    Ok(ScanReport {
        seed: config.seed,
        points,
    })
}
