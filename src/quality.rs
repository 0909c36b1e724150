//! Cluster quality measures.
//!
//! [`sse`] ranks clusters for splitting; [`silhouette_score`] grades a whole
//! labelling and is only used when scanning over candidate cluster counts.

use std::collections::BTreeSet;

use ndarray::{Array1, ArrayBase, Axis, Data, Ix2};
use rayon::prelude::*;

use crate::distance::DistanceMetric;

/// Sum of squared Euclidean distances from each row to the mean of all rows.
///
/// Returns `0.0` for an empty set.
pub fn sse<S>(points: &ArrayBase<S, Ix2>) -> f64
where
    S: Data<Elem = f64>,
{
    let Some(center) = points.mean_axis(Axis(0)) else {
        return 0.0;
    };
    points
        .axis_iter(Axis(0))
        .map(|row| DistanceMetric::Euclidean.squared(&row, &center))
        .sum()
}

/// Mean silhouette coefficient of a labelling.
///
/// For every point `a` is the mean distance to the other members of its own
/// cluster and `b` the smallest mean distance to the members of another cluster;
/// the point scores `(b - a) / max(a, b)`, and points alone in their cluster score 0.
/// Returns `None` when fewer than two distinct labels are present. A labelling in
/// which every cluster is a singleton is scored `Some(0.0)` rather than rejected.
pub fn silhouette_score<S>(points: &ArrayBase<S, Ix2>, labels: &Array1<usize>) -> Option<f64>
where
    S: Data<Elem = f64> + Sync,
{
    let n = points.len_of(Axis(0));
    debug_assert_eq!(n, labels.len());

    let distinct: BTreeSet<usize> = labels.iter().copied().collect();
    if distinct.len() < 2 {
        return None;
    }
    let n_labels = distinct.iter().max().map_or(0, |&m| m + 1);
    let mut sizes = vec![0usize; n_labels];
    labels.iter().for_each(|&l| sizes[l] += 1);

    // Summed sequentially in row order.
    let scores: Vec<f64> = (0..n)
        .into_par_iter()
        .map(|i| {
            let own = labels[i];
            if sizes[own] <= 1 {
                return 0.0;
            }
            let mut sums = vec![0.0f64; n_labels];
            let row = points.row(i);
            for (j, other) in points.axis_iter(Axis(0)).enumerate() {
                if j != i {
                    sums[labels[j]] += DistanceMetric::Euclidean.distance(&row, &other);
                }
            }
            let a = sums[own] / (sizes[own] - 1) as f64;
            let b = (0..n_labels)
                .filter(|&l| l != own && sizes[l] > 0)
                .map(|l| sums[l] / sizes[l] as f64)
                .fold(f64::INFINITY, f64::min);
            let denom = a.max(b);
            if denom > 0.0 {
                (b - a) / denom
            } else {
                0.0
            }
        })
        .collect();
    let total: f64 = scores.iter().sum();

    Some(total / n as f64)
}
