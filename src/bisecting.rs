use std::cmp::Ordering;
use std::collections::BinaryHeap;

use ndarray::{Array1, Array2, ArrayBase, Axis, Data, Ix2};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::BisectConfig;
use crate::error::{BkmeansError, Result};
use crate::kmeans::KMeans;
use crate::quality::sse;

/// A set of rows of the dataset, identified by their original indices.
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    indices: Vec<usize>,
    sse: f64,
}

impl Cluster {
    fn new<S>(data: &ArrayBase<S, Ix2>, indices: Vec<usize>) -> Self
    where
        S: Data<Elem = f64>,
    {
        let sse = sse(&data.select(Axis(0), &indices));
        Cluster { indices, sse }
    }

    /// Original row indices owned by this cluster, in ascending order.
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Sum of squared distances of the members to their own mean.
    pub fn sse(&self) -> f64 {
        self.sse
    }
}

/// How a bisecting run ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "status")]
pub enum BisectStatus {
    /// The requested number of clusters was reached.
    Done,
    /// A selected cluster could not be split in two non-empty halves; the run
    /// stopped early with fewer clusters than requested.
    SplitFailure { cluster_size: usize, cluster_sse: f64 },
}

/// Final clusters and the per-row labels derived from them.
#[derive(Debug, Clone)]
pub struct Partition {
    /// Cluster id of every row, in `0..clusters.len()`.
    pub labels: Array1<usize>,
    /// Clusters in worklist order; `clusters[i]` carries label `i`.
    pub clusters: Vec<Cluster>,
    pub status: BisectStatus,
    /// Cluster count that was asked for.
    pub requested: usize,
}

impl Partition {
    /// Number of clusters actually produced. Smaller than `requested` after a split failure.
    pub fn n_clusters(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_complete(&self) -> bool {
        self.status == BisectStatus::Done
    }
}

/// Worklist entry. Highest SSE first; among equal SSE the earliest created wins,
/// which is also the earliest position in the active list.
#[derive(Debug)]
struct Ranked {
    seq: usize,
    cluster: Cluster,
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        self.cluster
            .sse
            .total_cmp(&other.cluster.sse)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

/// Bisecting K-Means: split the worst cluster in two until `n_clusters` exist.
#[derive(Debug, Clone)]
pub struct BisectingKMeans {
    pub n_clusters: usize,
    pub config: BisectConfig,
}

impl BisectingKMeans {
    /// Creates a new BisectingKMeans instance with default Lloyd settings.
    pub fn new(n_clusters: usize) -> Self {
        BisectingKMeans {
            n_clusters,
            config: BisectConfig::default(),
        }
    }

    pub fn with_config(mut self, config: BisectConfig) -> Self {
        self.config = config;
        self
    }

    /// Partitions the rows of `data`.
    ///
    /// Every Lloyd run draws its initial centroids from `rng` in turn, so the
    /// result is reproducible from the generator's seed and the call order.
    pub fn fit<S, R>(&self, data: &ArrayBase<S, Ix2>, rng: &mut R) -> Result<Partition>
    where
        S: Data<Elem = f64> + Sync,
        R: Rng + ?Sized,
    {
        self.config.validate()?;
        let n_samples = data.len_of(Axis(0));
        if self.n_clusters == 0 {
            return Err(BkmeansError::InvalidConfig("n_clusters must be > 0".into()));
        }
        if self.n_clusters > n_samples {
            return Err(BkmeansError::Initialization {
                requested: self.n_clusters,
                available: n_samples,
            });
        }

        let mut worklist = BinaryHeap::with_capacity(self.n_clusters);
        let mut next_seq = 0;
        let mut push = |worklist: &mut BinaryHeap<Ranked>, cluster: Cluster| {
            worklist.push(Ranked {
                seq: next_seq,
                cluster,
            });
            next_seq += 1;
        };
        push(&mut worklist, Cluster::new(data, (0..n_samples).collect()));

        let mut status = BisectStatus::Done;
        while worklist.len() < self.n_clusters {
            let Some(worst) = worklist.pop() else {
                break;
            };
            match self.bisect(data, &worst.cluster, rng)? {
                Some((left, right)) => {
                    debug!(
                        active = worklist.len() + 2,
                        size = worst.cluster.len(),
                        sse = worst.cluster.sse,
                        left = left.len(),
                        right = right.len(),
                        "bisected cluster"
                    );
                    push(&mut worklist, left);
                    push(&mut worklist, right);
                }
                None => {
                    warn!(
                        requested = self.n_clusters,
                        reached = worklist.len() + 1,
                        size = worst.cluster.len(),
                        "splitting failed, ending early"
                    );
                    status = BisectStatus::SplitFailure {
                        cluster_size: worst.cluster.len(),
                        cluster_sse: worst.cluster.sse,
                    };
                    worklist.push(worst);
                    break;
                }
            }
        }

        let mut ranked = worklist.into_vec();
        ranked.sort_by_key(|r| r.seq);
        let clusters: Vec<Cluster> = ranked.into_iter().map(|r| r.cluster).collect();

        let mut labels = Array1::<usize>::zeros(n_samples);
        for (id, cluster) in clusters.iter().enumerate() {
            for &idx in cluster.indices() {
                labels[idx] = id;
            }
        }

        Ok(Partition {
            labels,
            clusters,
            status,
            requested: self.n_clusters,
        })
    }

    /// Two-way Lloyd run on one cluster. `None` when a half would be empty.
    fn bisect<S, R>(
        &self,
        data: &ArrayBase<S, Ix2>,
        cluster: &Cluster,
        rng: &mut R,
    ) -> Result<Option<(Cluster, Cluster)>>
    where
        S: Data<Elem = f64> + Sync,
        R: Rng + ?Sized,
    {
        // A single row cannot seed two distinct centroids. Reported as a split
        // failure here; only a direct `KMeans::init_centroids` call errors on it.
        if cluster.len() < 2 {
            return Ok(None);
        }
        let points: Array2<f64> = data.select(Axis(0), cluster.indices());
        let outcome = KMeans::from_config(2, &self.config).fit_predict(&points, rng)?;

        let mut left = Vec::new();
        let mut right = Vec::new();
        for (&idx, &label) in cluster.indices().iter().zip(outcome.labels.iter()) {
            if label == 0 {
                left.push(idx);
            } else {
                right.push(idx);
            }
        }
        if left.is_empty() || right.is_empty() {
            return Ok(None);
        }
        Ok(Some((Cluster::new(data, left), Cluster::new(data, right))))
    }
}

/// Labels every row of `data` with one of at most `n_clusters` cluster ids.
///
/// Inspect the number of distinct labels: it is smaller than `n_clusters` when a
/// split failed.
pub fn bisecting_kmeans<S, R>(
    data: &ArrayBase<S, Ix2>,
    n_clusters: usize,
    rng: &mut R,
) -> Result<Array1<usize>>
where
    S: Data<Elem = f64> + Sync,
    R: Rng + ?Sized,
{
    Ok(BisectingKMeans::new(n_clusters).fit(data, rng)?.labels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn cluster(indices: Vec<usize>, sse: f64, seq: usize) -> Ranked {
        Ranked {
            seq,
            cluster: Cluster { indices, sse },
        }
    }

    #[test]
    fn worklist_prefers_highest_sse_then_earliest() {
        let mut heap = BinaryHeap::new();
        heap.push(cluster(vec![0], 4.0, 0));
        heap.push(cluster(vec![1], 9.0, 1));
        heap.push(cluster(vec![2], 9.0, 2));
        heap.push(cluster(vec![3], 1.0, 3));
        let order: Vec<usize> = std::iter::from_fn(|| heap.pop().map(|r| r.seq)).collect();
        assert_eq!(order, vec![1, 2, 0, 3]);
    }

    #[test]
    fn single_point_single_cluster() {
        let data = array![[4.0, 2.0]];
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let partition = BisectingKMeans::new(1).fit(&data, &mut rng).unwrap();
        assert_eq!(partition.labels, array![0]);
        assert_eq!(partition.n_clusters(), 1);
        assert!(partition.is_complete());
        assert_eq!(partition.clusters[0].sse(), 0.0);
    }

    #[test]
    fn too_many_clusters_fail_before_any_work() {
        let data = array![[0.0], [1.0]];
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let err = BisectingKMeans::new(3).fit(&data, &mut rng).unwrap_err();
        assert!(matches!(
            err,
            BkmeansError::Initialization {
                requested: 3,
                available: 2
            }
        ));
        // No draw was made from the generator.
        let mut fresh = ChaCha8Rng::seed_from_u64(42);
        assert_eq!(rng.gen::<u64>(), fresh.gen::<u64>());
    }

    #[test]
    fn identical_points_report_split_failure() {
        let data = array![[1.0, 1.0], [1.0, 1.0], [1.0, 1.0], [1.0, 1.0]];
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let partition = BisectingKMeans::new(3).fit(&data, &mut rng).unwrap();
        assert_eq!(partition.n_clusters(), 1);
        assert_eq!(partition.labels, array![0, 0, 0, 0]);
        assert_eq!(
            partition.status,
            BisectStatus::SplitFailure {
                cluster_size: 4,
                cluster_sse: 0.0
            }
        );
        assert!(!partition.is_complete());
    }

    #[test]
    fn one_row_cluster_is_a_split_failure_not_an_error() {
        let data = array![[0.0, 0.0], [3.0, 3.0]];
        let single = Cluster::new(&data, vec![1]);
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let split = BisectingKMeans::new(2).bisect(&data, &single, &mut rng).unwrap();
        assert!(split.is_none());
        let mut fresh = ChaCha8Rng::seed_from_u64(42);
        assert_eq!(rng.gen::<u64>(), fresh.gen::<u64>());

        // The Lloyd initializer itself still refuses to draw two centroids from one row.
        let err = KMeans::new(2, 10)
            .init_centroids(&data.select(Axis(0), &[1]), &mut rng)
            .unwrap_err();
        assert!(matches!(err, BkmeansError::Initialization { .. }));
    }

    #[test]
    fn failed_cluster_keeps_its_rows() {
        // Rows 0 and 1 are identical, so four clusters can never be reached; the
        // cluster whose split fails stays in the result with all of its rows.
        let data = array![[0.0], [0.0], [50.0], [100.0]];
        for seed in 0..16 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let partition = BisectingKMeans::new(4).fit(&data, &mut rng).unwrap();
            assert!(!partition.is_complete());
            assert!(partition.n_clusters() <= 3);
            let mut owned: Vec<usize> = partition
                .clusters
                .iter()
                .flat_map(|c| c.indices().iter().copied())
                .collect();
            owned.sort_unstable();
            assert_eq!(owned, vec![0, 1, 2, 3]);
            assert_eq!(partition.labels[0], partition.labels[1]);
            assert!(partition.labels.iter().all(|&l| l < partition.n_clusters()));
        }
    }

    #[test]
    fn children_sse_never_exceeds_parent() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let data = Array2::from_shape_fn((80, 2), |_| rng.gen_range(-5.0..5.0));
        let whole = sse(&data);
        let partition = BisectingKMeans::new(2).fit(&data, &mut rng).unwrap();
        let children: f64 = partition.clusters.iter().map(Cluster::sse).sum();
        assert!(children <= whole + 1e-9);
    }
}
