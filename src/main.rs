use std::path::PathBuf;

use anyhow::Context;
use bkmeans::config::ScanConfig;
use bkmeans::dataset::load_dataset;
use bkmeans::scan::scan_k;
use bkmeans::synthetic::{gaussian_blobs, random_centers};
use bkmeans::BisectingKMeans;
use clap::{Args, Parser, Subcommand};
use ndarray::Array2;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

#[derive(Parser, Debug)]
#[command(name = "bkmeans")]
#[command(about = "Bisecting k-means clustering and silhouette scans")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Score every k in a range with the silhouette metric and write the series as JSON.
    Scan {
        #[command(flatten)]
        input: Input,

        /// JSON scan config; flags below override its fields.
        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long)]
        k_min: Option<usize>,

        #[arg(long)]
        k_max: Option<usize>,

        #[arg(long)]
        seed: Option<u64>,

        /// Where to write the score series.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Cluster once and print the cluster sizes.
    Cluster {
        #[command(flatten)]
        input: Input,

        /// Number of clusters.
        #[arg(short, long)]
        k: usize,

        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Maximum Lloyd iterations per bisection.
        #[arg(long, default_value_t = 100)]
        max_iter: usize,

        /// Write one label per line to this file.
        #[arg(long)]
        labels: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct Input {
    /// Whitespace-delimited numeric dataset.
    #[arg(long, default_value = "dataset")]
    dataset: PathBuf,

    /// Generate this many rows of Gaussian blobs instead of reading the dataset.
    #[arg(long)]
    synthetic: Option<usize>,

    /// Number of blobs for --synthetic.
    #[arg(long, default_value_t = 4)]
    blobs: usize,

    /// Dimensions for --synthetic.
    #[arg(long, default_value_t = 2)]
    dims: usize,
}

impl Input {
    fn load(&self, seed: u64) -> anyhow::Result<Array2<f64>> {
        let Some(n_samples) = self.synthetic else {
            return load_dataset(&self.dataset)
                .with_context(|| format!("loading {}", self.dataset.display()));
        };
        anyhow::ensure!(self.blobs > 0, "--blobs must be > 0");
        tracing::info!(
            "Generating {} samples in {} blobs of {} dimensions",
            n_samples,
            self.blobs,
            self.dims
        );
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let centers = random_centers(self.blobs, self.dims, &mut rng)?;
        let blobs = gaussian_blobs(&centers, n_samples / self.blobs, 5.0, &mut rng)?;
        Ok(blobs.data)
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("bkmeans=info".parse()?),
        )
        .init();

    match Cli::parse().command {
        Command::Scan {
            input,
            config,
            k_min,
            k_max,
            seed,
            output,
        } => {
            let mut config = match config {
                Some(path) => ScanConfig::from_json_file(&path)
                    .with_context(|| format!("reading config {}", path.display()))?,
                None => ScanConfig::default(),
            };
            config.k_min = k_min.unwrap_or(config.k_min);
            config.k_max = k_max.unwrap_or(config.k_max);
            config.seed = seed.unwrap_or(config.seed);
            config.output = output.unwrap_or(config.output);

            let data = input.load(config.seed)?;
            tracing::info!("Loaded {} rows x {} columns", data.nrows(), data.ncols());

            let report = scan_k(&data, &config)?;
            for point in &report.points {
                match point.silhouette {
                    Some(score) => println!("k = {}: silhouette {:.4}", point.k, score),
                    None => println!("k = {}: no score", point.k),
                }
            }
            if let Some((k, score)) = report.best() {
                println!("Best k = {} (silhouette {:.4})", k, score);
            }
            report.write_json(&config.output)?;
            tracing::info!("Scores written to {}", config.output.display());
        }
        Command::Cluster {
            input,
            k,
            seed,
            max_iter,
            labels,
        } => {
            let data = input.load(seed)?;
            tracing::info!("Loaded {} rows x {} columns", data.nrows(), data.ncols());

            let mut model = BisectingKMeans::new(k);
            model.config.max_iter = max_iter;
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let partition = model.fit(&data, &mut rng)?;

            if !partition.is_complete() {
                println!(
                    "Splitting failed: {} of {} clusters produced",
                    partition.n_clusters(),
                    k
                );
            }
            println!("Cluster Assignment Counts:");
            for (id, cluster) in partition.clusters.iter().enumerate() {
                println!(
                    "Cluster {}: {} points (sse {:.4})",
                    id,
                    cluster.len(),
                    cluster.sse()
                );
            }

            if let Some(path) = labels {
                let text: Vec<String> = partition.labels.iter().map(|l| l.to_string()).collect();
                std::fs::write(&path, text.join("\n") + "\n")
                    .with_context(|| format!("writing labels to {}", path.display()))?;
            }
        }
    }

    Ok(())
}
