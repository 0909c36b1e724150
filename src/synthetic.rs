//! Synthetic datasets for demos and tests.

use ndarray::{Array1, Array2, Axis};
use ndarray_rand::RandomExt;
use rand::distributions::Uniform;
use rand::Rng;
use rand_distr::Normal;

use crate::error::{BkmeansError, Result};

/// Gaussian blobs together with the blob each row was drawn from.
#[derive(Debug, Clone)]
pub struct Blobs {
    pub data: Array2<f64>,
    pub truth: Array1<usize>,
}

pub fn uniform_matrix<R: Rng + ?Sized>(rows: usize, cols: usize, rng: &mut R) -> Array2<f64> {
    Array2::random_using((rows, cols), Uniform::new(0.0, 1.0), rng)
}

/// Draws `n_blobs` centers with coordinates ~ N(50, 10).
pub fn random_centers<R: Rng + ?Sized>(
    n_blobs: usize,
    n_features: usize,
    rng: &mut R,
) -> Result<Array2<f64>> {
    let dist = normal(50.0, 10.0)?;
    Ok(Array2::random_using((n_blobs, n_features), dist, rng))
}

/// Draws `n_per_blob` rows around every center with per-coordinate noise ~ N(0, spread).
///
/// Rows are grouped by blob: rows `b * n_per_blob .. (b + 1) * n_per_blob` belong to blob `b`.
pub fn gaussian_blobs<R: Rng + ?Sized>(
    centers: &Array2<f64>,
    n_per_blob: usize,
    spread: f64,
    rng: &mut R,
) -> Result<Blobs> {
    if !spread.is_finite() || spread < 0.0 {
        return Err(BkmeansError::InvalidConfig(format!(
            "spread must be finite and >= 0, got {spread}"
        )));
    }
    let (n_blobs, n_features) = centers.dim();
    let noise = normal(0.0, spread)?;

    let mut data = Array2::<f64>::random_using((n_blobs * n_per_blob, n_features), noise, rng);
    for (b, center) in centers.axis_iter(Axis(0)).enumerate() {
        for mut row in data
            .axis_iter_mut(Axis(0))
            .skip(b * n_per_blob)
            .take(n_per_blob)
        {
            row += &center;
        }
    }
    let truth = Array1::from_shape_fn(n_blobs * n_per_blob, |i| i / n_per_blob.max(1));

    Ok(Blobs { data, truth })
}

fn normal(mean: f64, std_dev: f64) -> Result<Normal<f64>> {
    Normal::new(mean, std_dev)
        .map_err(|e| BkmeansError::InvalidConfig(format!("normal({mean}, {std_dev}): {e}")))
}
