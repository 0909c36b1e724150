use ndarray::{Array1, Array2, ArrayBase, Axis, Data, Ix1, Ix2};
use rand::seq::IteratorRandom;
use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::BisectConfig;
use crate::distance::DistanceMetric;
use crate::error::{BkmeansError, Result};

/// Why a Lloyd run stopped. Both states carry the latest labels and centroids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KMeansState {
    /// Every centroid component moved less than the tolerance.
    Converged,
    /// The iteration cap was hit before the tolerance test passed.
    MaxIterReached,
}

/// Result of a single Lloyd run.
#[derive(Debug, Clone)]
pub struct KMeansOutcome {
    /// Centroids as rows (`k` x `dim`).
    pub centroids: Array2<f64>,
    /// Centroid index of every input row.
    pub labels: Array1<usize>,
    /// Number of assign/recompute rounds performed.
    pub iterations: usize,
    pub state: KMeansState,
    /// How many times a centroid was left without points and kept its previous position.
    pub degenerate_events: usize,
}

impl KMeansOutcome {
    /// Number of rows assigned to each centroid.
    pub fn cluster_sizes(&self) -> Vec<usize> {
        count_labels(&self.labels, self.centroids.nrows())
    }
}

/// Standard Lloyd-style K-Means clustering.
#[derive(Debug, Clone)]
pub struct KMeans {
    pub n_clusters: usize,
    pub max_iter: usize,
    /// Relative tolerance of the centroid stability test.
    pub rtol: f64,
    /// Absolute tolerance of the centroid stability test.
    pub atol: f64,
    pub metric: DistanceMetric,
}

impl KMeans {
    /// Creates a new KMeans instance with the given number of clusters and iterations.
    pub fn new(n_clusters: usize, max_iter: usize) -> Self {
        KMeans {
            n_clusters,
            max_iter,
            rtol: 1e-5,
            atol: 1e-8,
            metric: DistanceMetric::Euclidean,
        }
    }

    pub fn from_config(n_clusters: usize, config: &BisectConfig) -> Self {
        KMeans {
            n_clusters,
            max_iter: config.max_iter,
            rtol: config.rtol,
            atol: config.atol,
            metric: config.metric,
        }
    }

    pub fn with_tolerance(mut self, rtol: f64, atol: f64) -> Self {
        self.rtol = rtol;
        self.atol = atol;
        self
    }

    /// Fits the model to the data and returns the final centroids and labels.
    ///
    /// The generator is borrowed, not owned: successive calls continue the same
    /// random sequence, so a whole bisecting run is reproducible from one seed.
    pub fn fit_predict<S, R>(&self, x: &ArrayBase<S, Ix2>, rng: &mut R) -> Result<KMeansOutcome>
    where
        S: Data<Elem = f64> + Sync,
        R: Rng + ?Sized,
    {
        if self.max_iter == 0 {
            return Err(BkmeansError::InvalidConfig("max_iter must be > 0".into()));
        }

        let n_samples = x.len_of(Axis(0));
        let mut centroids = self.init_centroids(x, rng)?;
        let mut labels = Array1::<usize>::zeros(n_samples);
        let mut state = KMeansState::MaxIterReached;
        let mut iterations = 0;
        let mut degenerate_events = 0;

        while iterations < self.max_iter {
            iterations += 1;
            labels = self.assign_labels(x, &centroids);

            let (new_centroids, empty) = self.compute_representatives(x, &labels, &centroids);
            if empty > 0 {
                warn!(
                    iteration = iterations,
                    empty, "centroid without points kept at its previous position"
                );
                degenerate_events += empty;
            }

            let stable = self.is_stable(&centroids, &new_centroids);
            centroids = new_centroids;
            if stable {
                state = KMeansState::Converged;
                break;
            }
        }

        debug!(
            n_samples,
            n_clusters = self.n_clusters,
            iterations,
            ?state,
            "lloyd run finished"
        );

        Ok(KMeansOutcome {
            centroids,
            labels,
            iterations,
            state,
            degenerate_events,
        })
    }

    /// Draws `n_clusters` distinct rows uniformly without replacement.
    pub fn init_centroids<S, R>(&self, x: &ArrayBase<S, Ix2>, rng: &mut R) -> Result<Array2<f64>>
    where
        S: Data<Elem = f64>,
        R: Rng + ?Sized,
    {
        let n_samples = x.len_of(Axis(0));
        let n_features = x.len_of(Axis(1));
        if self.n_clusters == 0 {
            return Err(BkmeansError::InvalidConfig("n_clusters must be > 0".into()));
        }
        if self.n_clusters > n_samples {
            return Err(BkmeansError::Initialization {
                requested: self.n_clusters,
                available: n_samples,
            });
        }

        let indices: Vec<usize> = (0..n_samples).choose_multiple(rng, self.n_clusters);
        let mut centroids = Array2::<f64>::zeros((self.n_clusters, n_features));
        for (i, &idx) in indices.iter().enumerate() {
            centroids.row_mut(i).assign(&x.row(idx));
        }
        Ok(centroids)
    }

    /// Assigns labels to each sample based on the closest centroid.
    ///
    /// Centroids are scanned in index order and only a strictly smaller distance
    /// replaces the current best, so ties go to the lowest centroid index.
    pub fn assign_labels<S1, S2>(
        &self,
        x: &ArrayBase<S1, Ix2>,
        centroids: &ArrayBase<S2, Ix2>,
    ) -> Array1<usize>
    where
        S1: Data<Elem = f64> + Sync,
        S2: Data<Elem = f64> + Sync,
    {
        let n_samples = x.len_of(Axis(0));
        let labels: Vec<usize> = (0..n_samples)
            .into_par_iter()
            .map(|i| self.nearest(&x.row(i), centroids))
            .collect();

        Array1::from(labels)
    }

    fn nearest<S1, S2>(&self, point: &ArrayBase<S1, Ix1>, centroids: &ArrayBase<S2, Ix2>) -> usize
    where
        S1: Data<Elem = f64>,
        S2: Data<Elem = f64>,
    {
        let mut min_dist = f64::INFINITY;
        let mut min_j = 0;
        for (j, c) in centroids.axis_iter(Axis(0)).enumerate() {
            let dist = self.metric.distance(point, &c);
            if dist < min_dist {
                min_dist = dist;
                min_j = j;
            }
        }
        min_j
    }

    /// Recomputes every centroid as the mean of the rows labelled with it.
    ///
    /// A centroid that received no rows keeps its row from `previous`. Returns the
    /// new centroids and the number of such empty centroids.
    pub fn compute_representatives<S1, S2>(
        &self,
        x: &ArrayBase<S1, Ix2>,
        labels: &Array1<usize>,
        previous: &ArrayBase<S2, Ix2>,
    ) -> (Array2<f64>, usize)
    where
        S1: Data<Elem = f64>,
        S2: Data<Elem = f64>,
    {
        let n_features = x.len_of(Axis(1));
        let mut new_centroids = Array2::<f64>::zeros((self.n_clusters, n_features));
        let mut counts = vec![0usize; self.n_clusters];
        x.axis_iter(Axis(0))
            .zip(labels.iter())
            .for_each(|(row, &label)| {
                new_centroids
                    .row_mut(label)
                    .zip_mut_with(&row, |a, &b| *a += b);
                counts[label] += 1;
            });

        let mut empty = 0;
        new_centroids
            .axis_iter_mut(Axis(0))
            .enumerate()
            .for_each(|(i, mut c)| {
                if counts[i] > 0 {
                    c.mapv_inplace(|v| v / counts[i] as f64);
                } else {
                    c.assign(&previous.row(i));
                    empty += 1;
                }
            });

        (new_centroids, empty)
    }

    /// Component-wise `|old - new| <= atol + rtol * |new|` over all centroids.
    fn is_stable(&self, old: &Array2<f64>, new: &Array2<f64>) -> bool {
        old.iter()
            .zip(new.iter())
            .all(|(&a, &b)| (a - b).abs() <= self.atol + self.rtol * b.abs())
    }
}

/// Counts the number of occurrences of each label.
pub(crate) fn count_labels(labels: &Array1<usize>, n_labels: usize) -> Vec<usize> {
    let mut counts = vec![0; n_labels];
    labels.iter().for_each(|&label| {
        counts[label] += 1;
    });
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn two_groups() -> Array2<f64> {
        array![
            [0.0, 0.0],
            [0.0, 1.0],
            [1.0, 0.0],
            [10.0, 10.0],
            [10.0, 11.0],
            [11.0, 10.0]
        ]
    }

    #[test]
    fn init_draws_distinct_rows() {
        let x = Array2::from_shape_fn((20, 3), |(i, j)| (i * 3 + j) as f64);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let centroids = KMeans::new(5, 10).init_centroids(&x, &mut rng).unwrap();
        assert_eq!(centroids.dim(), (5, 3));

        let mut firsts: Vec<i64> = centroids.column(0).iter().map(|&v| v as i64).collect();
        firsts.sort_unstable();
        firsts.dedup();
        assert_eq!(firsts.len(), 5);
        for row in centroids.axis_iter(Axis(0)) {
            assert!(x.axis_iter(Axis(0)).any(|r| r == row));
        }
    }

    #[test]
    fn init_rejects_more_centroids_than_points() {
        let x = two_groups();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let err = KMeans::new(7, 10).init_centroids(&x, &mut rng).unwrap_err();
        assert!(matches!(
            err,
            BkmeansError::Initialization {
                requested: 7,
                available: 6
            }
        ));
    }

    #[test]
    fn assignment_ties_go_to_lowest_centroid() {
        let x = array![[0.0, 0.0], [5.0, 0.0]];
        let centroids = array![[-1.0, 0.0], [1.0, 0.0], [4.0, 0.0], [6.0, 0.0]];
        let labels = KMeans::new(4, 10).assign_labels(&x, &centroids);
        assert_eq!(labels, array![0, 2]);
    }

    #[test]
    fn assignment_is_idempotent() {
        let x = two_groups();
        let centroids = array![[0.5, 0.5], [9.0, 9.0]];
        let kmeans = KMeans::new(2, 10);
        let first = kmeans.assign_labels(&x, &centroids);
        let second = kmeans.assign_labels(&x, &centroids);
        assert_eq!(first, second);
        assert_eq!(first, array![0, 0, 0, 1, 1, 1]);
    }

    #[test]
    fn representatives_are_means_and_empty_centroids_are_kept() {
        let x = array![[0.0, 0.0], [2.0, 4.0], [10.0, 10.0]];
        let labels = array![0, 0, 2];
        let previous = array![[9.0, 9.0], [3.0, -3.0], [0.0, 0.0]];
        let (centroids, empty) = KMeans::new(3, 10).compute_representatives(&x, &labels, &previous);
        assert_eq!(empty, 1);
        assert_eq!(centroids, array![[1.0, 2.0], [3.0, -3.0], [10.0, 10.0]]);
        assert!(centroids.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn separated_groups_converge_for_any_seed() {
        let x = two_groups();
        for seed in 0..32 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let outcome = KMeans::new(2, 100).fit_predict(&x, &mut rng).unwrap();
            assert_eq!(outcome.state, KMeansState::Converged);
            assert!(outcome.iterations <= 100);
            let labels = &outcome.labels;
            assert!(labels[0] == labels[1] && labels[1] == labels[2]);
            assert!(labels[3] == labels[4] && labels[4] == labels[5]);
            assert_ne!(labels[0], labels[3]);
            assert_eq!(outcome.cluster_sizes(), vec![3, 3]);
        }
    }

    #[test]
    fn iteration_cap_is_respected() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let x = Array2::from_shape_fn((200, 2), |_| rng.gen_range(-1.0..1.0));
        let outcome = KMeans::new(8, 1)
            .with_tolerance(0.0, 0.0)
            .fit_predict(&x, &mut rng)
            .unwrap();
        assert_eq!(outcome.iterations, 1);
        assert_eq!(outcome.state, KMeansState::MaxIterReached);
        assert_eq!(outcome.labels.len(), 200);
    }

    #[test]
    fn converged_centroids_are_means_of_their_points() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let x = Array2::from_shape_fn((60, 3), |_| rng.gen_range(0.0..10.0));
        let kmeans = KMeans::new(3, 100);
        let outcome = kmeans.fit_predict(&x, &mut rng).unwrap();
        assert_eq!(outcome.state, KMeansState::Converged);
        let (means, empty) =
            kmeans.compute_representatives(&x, &outcome.labels, &outcome.centroids);
        assert_eq!(empty, 0);
        for (a, b) in means.iter().zip(outcome.centroids.iter()) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn identical_points_leave_one_centroid_empty() {
        let x = array![[1.0, 1.0], [1.0, 1.0], [1.0, 1.0]];
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let outcome = KMeans::new(2, 100).fit_predict(&x, &mut rng).unwrap();
        assert_eq!(outcome.labels, array![0, 0, 0]);
        assert_eq!(outcome.state, KMeansState::Converged);
        assert!(outcome.degenerate_events > 0);
        assert!(outcome.centroids.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn zero_iterations_are_rejected() {
        let x = two_groups();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let err = KMeans::new(2, 0).fit_predict(&x, &mut rng).unwrap_err();
        assert!(matches!(err, BkmeansError::InvalidConfig(_)));
    }
}
