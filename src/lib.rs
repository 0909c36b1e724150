//! Bisecting k-means clustering.
//!
//! Starting from one cluster holding every row, the cluster with the largest sum
//! of squared errors is repeatedly split in two by a Lloyd-style 2-means run until
//! the requested number of clusters exists, or a split fails.
//!
//! ```no_run
//! use bkmeans::{bisecting::BisectingKMeans, dataset::load_dataset};
//! use rand::SeedableRng;
//! use rand_chacha::ChaCha8Rng;
//!
//! let data = load_dataset("dataset")?;
//! let mut rng = ChaCha8Rng::seed_from_u64(42);
//! let partition = BisectingKMeans::new(3).fit(&data, &mut rng)?;
//! println!("{} clusters", partition.n_clusters());
//! # Ok::<(), bkmeans::error::BkmeansError>(())
//! ```

pub mod bisecting;
pub mod config;
pub mod dataset;
pub mod distance;
pub mod error;
pub mod kmeans;
pub mod quality;
pub mod scan;
pub mod synthetic;

pub use bisecting::{bisecting_kmeans, BisectStatus, BisectingKMeans, Cluster, Partition};
pub use config::{BisectConfig, ScanConfig};
pub use error::{BkmeansError, Result};
pub use kmeans::{KMeans, KMeansOutcome, KMeansState};
