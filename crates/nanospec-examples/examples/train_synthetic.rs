//! Train a spectrum model on a synthetic dataset (or a JSON dataset).
//!
//! # Usage
//!
//! ```bash
//! # Synthetic data, default configuration
//! cargo run --release --example train_synthetic -- --samples 128 --epochs 100
//!
//! # JSON dataset plus a TOML configuration
//! cargo run --release --example train_synthetic -- \
//!   --dataset spectra.json --config nanospec.toml
//!
//! # Write the synthetic dataset for later runs
//! cargo run --example train_synthetic -- --samples 256 --save-dataset spectra.json --epochs 0
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use burn::module::AutodiffModule;
use clap::Parser;
use nanospec_core::backend::{init_cpu_device, TrainBackend};
use nanospec_core::{GraphBuilder, NanoSpecConfig, RngKey};
use nanospec_examples::{synthetic_samples, SyntheticConfig};
use nanospec_models::SpectrumModel;
use nanospec_train::{evaluate_splits, SpectrumDataset, Trainer};

#[derive(Parser)]
#[command(name = "train_synthetic")]
#[command(author, version, about = "Train a nanoparticle spectrum model")]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// JSON dataset; a synthetic one is generated when omitted
    #[arg(short, long)]
    dataset: Option<PathBuf>,

    /// Number of synthetic samples
    #[arg(long, default_value = "128")]
    samples: usize,

    /// Override the number of training epochs
    #[arg(short, long)]
    epochs: Option<usize>,

    /// Fraction of data for validation
    #[arg(long, default_value = "0.15")]
    val_split: f32,

    /// Fraction of data for testing
    #[arg(long, default_value = "0.15")]
    test_split: f32,

    /// Write the dataset as JSON before training
    #[arg(long)]
    save_dataset: Option<PathBuf>,

    /// Random seed
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Average weights from this epoch on (stochastic weight averaging)
    #[arg(long)]
    swa_start: Option<usize>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => NanoSpecConfig::load(path).with_context(|| format!("Failed to load {:?}", path))?,
        None => NanoSpecConfig::default(),
    };
    if let Some(epochs) = args.epochs {
        config.training.num_epochs = epochs;
    }
    config.training.seed = args.seed;
    if args.swa_start.is_some() {
        config.training.swa_start_epoch = args.swa_start;
    }

    let builder = GraphBuilder::new(&config.graph);
    let (data_key, split_key) = RngKey::new(args.seed).split_two();
    let dataset = match &args.dataset {
        Some(path) => SpectrumDataset::from_json_file(path, &builder)?,
        None => {
            let synthetic = SyntheticConfig {
                n_samples: args.samples,
                n_bins: config.readout.n_output,
                ..Default::default()
            };
            let samples = synthetic_samples(&synthetic, builder.vocabulary(), data_key);
            SpectrumDataset::from_samples(samples, &builder)?
        }
    };
    if let Some(path) = &args.save_dataset {
        dataset.save_json(path)?;
        log::info!("wrote {} samples to {:?}", dataset.len(), path);
    }
    config.readout.n_output = dataset.n_output();

    let data = dataset.split(args.val_split, args.test_split, split_key)?;
    log::info!(
        "split: {} train, {} validation, {} test",
        data.train.len(),
        data.validation.len(),
        data.test.len()
    );
    if config.training.num_epochs == 0 {
        return Ok(());
    }

    let device = init_cpu_device();
    let model = SpectrumModel::<TrainBackend>::from_config(&config, &device)?;
    let (model, report) = Trainer::new(&config.training)?.fit(model, &data, &device)?;
    log::info!(
        "best epoch {} with val_loss={:.5}{}",
        report.best_epoch,
        report.best_val_loss,
        if report.early_stopped { " (early stopped)" } else { "" }
    );
    if let Some(loss) = report.swa_val_loss {
        log::info!("returned weight average of {} epochs, val_loss={:.5}", report.swa_epochs, loss);
    }

    let metrics = evaluate_splits(&model.valid(), &data, config.training.batch_size, &device)?;
    println!("train      {}", metrics.train);
    println!("validation {}", metrics.validation);
    println!("test       {}", metrics.test);
    println!("test mse per sample: {}", metrics.test.distribution.mse);
    println!("test cos per sample: {}", metrics.test.distribution.cosine);
    Ok(())
}
