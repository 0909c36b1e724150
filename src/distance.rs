use ndarray::{ArrayBase, Data, Ix1};
use serde::{Deserialize, Serialize};

/// Enum representing the distance metric to be used.
///
/// Only Euclidean distance is supported; the enum keeps the metric an explicit
/// part of every clustering configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DistanceMetric {
    #[default]
    Euclidean,
}

impl DistanceMetric {
    /// Computes the distance between two points of equal dimensionality.
    pub fn distance<S1, S2>(&self, x: &ArrayBase<S1, Ix1>, y: &ArrayBase<S2, Ix1>) -> f64
    where
        S1: Data<Elem = f64>,
        S2: Data<Elem = f64>,
    {
        match self {
            DistanceMetric::Euclidean => self.squared(x, y).sqrt(),
        }
    }

    /// Squared distance. Same ordering as [`DistanceMetric::distance`] without the `sqrt`.
    pub fn squared<S1, S2>(&self, x: &ArrayBase<S1, Ix1>, y: &ArrayBase<S2, Ix1>) -> f64
    where
        S1: Data<Elem = f64>,
        S2: Data<Elem = f64>,
    {
        debug_assert_eq!(x.len(), y.len(), "dimension mismatch");
        match self {
            DistanceMetric::Euclidean => x
                .iter()
                .zip(y.iter())
                .map(|(a, b)| {
                    let diff = a - b;
                    diff * diff
                })
                .sum(),
        }
    }
}
