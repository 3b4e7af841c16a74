//! # nanospec-train
//!
//! Training and evaluation of [`nanospec_models::SpectrumModel`]:
//!
//! - [`SpectrumDataset`]: JSON samples of nanoparticle + log-spectrum,
//!   graphs built at load time, deterministic splits and minibatches
//! - [`SpectrumLoss`]: MSE / MAE / Huber
//! - [`ReduceLrOnPlateauWithWarmup`] and [`EarlyStopping`]
//! - [`Trainer`]: Adam or SGD with weight decay, best-model retention
//! - [`StochasticWeightAveraging`]: optional parameter average over late epochs
//! - [`MetricReport`]: MSE, MAE, Huber, cosine similarity, their per-sample
//!   distributions, plus the UV window
//!
//! ```rust,ignore
//! let data = SpectrumDataset::from_json_file(path, &builder)?.split(0.1, 0.1, RngKey::new(0))?;
//! let model = SpectrumModel::<TrainBackend>::from_config(&config, &device)?;
//! let (model, report) = Trainer::new(&config.training)?.fit(model, &data, &device)?;
//! let metrics = evaluate_splits(&model.valid(), &data, 32, &device)?;
//! ```

pub mod dataset;
pub mod loss;
pub mod metrics;
pub mod schedule;
pub mod swa;
pub mod trainer;

pub use dataset::{DatasetSplit, SpectrumBatch, SpectrumDataset, SpectrumSample};
pub use loss::SpectrumLoss;
pub use metrics::{MetricDistribution, MetricDistributions, MetricReport, SpectrumMetrics, UV_WINDOW};
pub use schedule::{EarlyStopping, ReduceLrOnPlateauWithWarmup};
pub use swa::StochasticWeightAveraging;
pub use trainer::{evaluate_metrics, evaluate_splits, predict, EvaluationReport, Trainer, TrainingReport};
