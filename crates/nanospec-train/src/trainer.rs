//! Minibatch training of a [`SpectrumModel`].
//!
//! ```text
//! for epoch:
//!     lr = schedule.learning_rate()
//!     for batch in train.batches(shuffled):   loss → backward → optimizer step
//!     val_loss = eval(model.valid(), validation)
//!     schedule.step(val_loss); keep best model; early stop on plateau
//!     epoch >= swa_start: fold weights into the running average
//! return averaged model (SWA) or best model
//! ```

use anyhow::{ensure, Result};
use burn::module::AutodiffModule;
use burn::optim::decay::WeightDecayConfig;
use burn::optim::{AdamConfig, GradientsParams, Optimizer, SgdConfig};
use burn::tensor::backend::{AutodiffBackend, Backend};
use nanospec_core::{OptimizerKind, RngKey, TrainingConfig};
use nanospec_models::ops::to_vec;
use nanospec_models::SpectrumModel;

use crate::dataset::{DatasetSplit, SpectrumDataset};
use crate::loss::SpectrumLoss;
use crate::metrics::MetricReport;
use crate::schedule::{EarlyStopping, ReduceLrOnPlateauWithWarmup};
use crate::swa::StochasticWeightAveraging;

#[derive(Debug, Clone, Default)]
pub struct TrainingReport {
    pub train_losses: Vec<f64>,
    pub val_losses: Vec<f64>,
    pub learning_rates: Vec<f64>,
    pub best_epoch: usize,
    pub best_val_loss: f64,
    pub early_stopped: bool,
    pub skipped_batches: usize,
    /// Epochs folded into the weight average; 0 when SWA is off or never started.
    pub swa_epochs: usize,
    /// Validation loss of the averaged model, when one was returned.
    pub swa_val_loss: Option<f64>,
}

/// Metrics of the retained model on every split.
#[derive(Debug, Clone, Default)]
pub struct EvaluationReport {
    pub train: MetricReport,
    pub validation: MetricReport,
    pub test: MetricReport,
}

/// Mini-batch training loop over a [`DatasetSplit`].
pub struct Trainer<'a> {
    config: &'a TrainingConfig,
    loss: SpectrumLoss,
}

impl<'a> Trainer<'a> {
    /// # Errors
    ///
    /// Fails if `config` does not validate.
    pub fn new(config: &'a TrainingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            loss: SpectrumLoss::new(config.loss),
        })
    }

    /// Train with the configured optimizer; returns the best model seen.
    ///
    /// # Arguments
    ///
    /// * `model` - freshly initialized or pre-trained model
    /// * `data` - train, validation and test sets; only train and validation are read
    /// * `device` - device for batches
    ///
    /// # Returns
    ///
    /// The model with the lowest validation loss (training loss when the
    /// validation set is empty), or its weight average when SWA is on, and
    /// the per-epoch report.
    pub fn fit<B: AutodiffBackend>(
        &self,
        model: SpectrumModel<B>,
        data: &DatasetSplit,
        device: &B::Device,
    ) -> Result<(SpectrumModel<B>, TrainingReport)> {
        let weight_decay =
            (self.config.weight_decay > 0.0).then(|| WeightDecayConfig::new(self.config.weight_decay));
        match self.config.optimizer {
            OptimizerKind::Adam => {
                let optim = AdamConfig::new().with_weight_decay(weight_decay).init();
                self.fit_with(model, optim, data, device)
            }
            OptimizerKind::Sgd => {
                let optim = SgdConfig::new().with_weight_decay(weight_decay).init();
                self.fit_with(model, optim, data, device)
            }
        }
    }

    /// [`fit`](Self::fit) with a caller-supplied optimizer.
    pub fn fit_with<B, O>(
        &self,
        mut model: SpectrumModel<B>,
        mut optim: O,
        data: &DatasetSplit,
        device: &B::Device,
    ) -> Result<(SpectrumModel<B>, TrainingReport)>
    where
        B: AutodiffBackend,
        O: Optimizer<SpectrumModel<B>, B>,
    {
        ensure!(!data.train.is_empty(), "training set is empty");
        ensure!(
            data.train.n_output() == model.n_output(),
            "dataset spectra have {} bins but the model predicts {}",
            data.train.n_output(),
            model.n_output()
        );

        let config = self.config;
        let mut schedule = ReduceLrOnPlateauWithWarmup::from_config(config);
        let mut stopper = EarlyStopping::new(config.early_stop_patience);
        let mut report = TrainingReport {
            best_val_loss: f64::INFINITY,
            ..Default::default()
        };
        let mut best = model.clone();
        let mut swa = config.swa_start_epoch.map(StochasticWeightAveraging::<B>::new);

        let keys = RngKey::new(config.seed).split(config.num_epochs);
        for (epoch, key) in keys.into_iter().enumerate() {
            let lr = schedule.learning_rate();
            let (mut total, mut count) = (0.0f64, 0usize);

            for batch in data.train.batches(config.batch_size, Some(key)) {
                let inputs = model.prepare(&batch.graphs, device)?;
                let target = batch.target_tensor::<B>(device);
                let loss = self.loss.compute(model.forward(&inputs)?, target);
                let value = to_vec(loss.clone())[0] as f64;
                if !value.is_finite() {
                    log::warn!("epoch {}: skipping batch with non-finite loss", epoch);
                    report.skipped_batches += 1;
                    continue;
                }
                let grads = GradientsParams::from_grads(loss.backward(), &model);
                model = optim.step(lr, model, grads);
                total += value * batch.len() as f64;
                count += batch.len();
            }
            let train_loss = if count > 0 { total / count as f64 } else { f64::NAN };

            let val_loss = if data.validation.is_empty() {
                train_loss
            } else {
                self.evaluate_loss(&model.valid(), &data.validation, device)?
            };

            report.train_losses.push(train_loss);
            report.val_losses.push(val_loss);
            report.learning_rates.push(lr);
            schedule.step(val_loss);

            if let Some(swa) = swa.as_mut() {
                swa.update(epoch, &model);
            }

            if val_loss < report.best_val_loss {
                report.best_val_loss = val_loss;
                report.best_epoch = epoch;
                best = model.clone();
            }

            if epoch % 10 == 0 {
                log::info!(
                    "epoch {}: train_loss={:.5} val_loss={:.5} lr={:.3e}",
                    epoch,
                    train_loss,
                    val_loss,
                    lr
                );
            } else {
                log::debug!("epoch {}: train_loss={:.5} val_loss={:.5}", epoch, train_loss, val_loss);
            }

            if stopper.update(val_loss) {
                log::warn!(
                    "early stopping at epoch {} (best val_loss={:.5} at epoch {})",
                    epoch,
                    report.best_val_loss,
                    report.best_epoch
                );
                report.early_stopped = true;
                break;
            }
        }

        match swa {
            Some(swa) if swa.n_averaged() > 0 => {
                let averaged = swa.apply(model);
                let loss = if data.validation.is_empty() {
                    self.evaluate_loss(&averaged.valid(), &data.train, device)?
                } else {
                    self.evaluate_loss(&averaged.valid(), &data.validation, device)?
                };
                log::info!(
                    "weight average over {} epochs: val_loss={:.5} (best single epoch {:.5})",
                    swa.n_averaged(),
                    loss,
                    report.best_val_loss
                );
                report.swa_epochs = swa.n_averaged();
                report.swa_val_loss = Some(loss);
                Ok((averaged, report))
            }
            Some(swa) => {
                log::warn!(
                    "training ended before swa_start_epoch={}; returning the best model",
                    swa.start_epoch()
                );
                Ok((best, report))
            }
            None => Ok((best, report)),
        }
    }

    /// Mean per-sample loss over `dataset`.
    pub fn evaluate_loss<B: Backend>(
        &self,
        model: &SpectrumModel<B>,
        dataset: &SpectrumDataset,
        device: &B::Device,
    ) -> Result<f64> {
        let (mut total, mut count) = (0.0f64, 0usize);
        for batch in dataset.batches(self.config.batch_size, None) {
            let inputs = model.prepare(&batch.graphs, device)?;
            let loss = self
                .loss
                .compute(model.forward(&inputs)?, batch.target_tensor::<B>(device));
            total += to_vec(loss)[0] as f64 * batch.len() as f64;
            count += batch.len();
        }
        Ok(if count > 0 { total / count as f64 } else { f64::NAN })
    }
}

/// Predictions `[len, n_output]`, row-major, in dataset order.
pub fn predict<B: Backend>(
    model: &SpectrumModel<B>,
    dataset: &SpectrumDataset,
    batch_size: usize,
    device: &B::Device,
) -> Result<Vec<f32>> {
    let mut out = Vec::with_capacity(dataset.len() * model.n_output());
    for batch in dataset.batches(batch_size, None) {
        let inputs = model.prepare(&batch.graphs, device)?;
        out.extend(to_vec(model.forward(&inputs)?));
    }
    Ok(out)
}

/// Spectrum metrics of `model` on `dataset`, averaged and per sample.
pub fn evaluate_metrics<B: Backend>(
    model: &SpectrumModel<B>,
    dataset: &SpectrumDataset,
    batch_size: usize,
    device: &B::Device,
) -> Result<MetricReport> {
    let prediction = predict(model, dataset, batch_size, device)?;
    let target: Vec<f32> = dataset
        .samples()
        .iter()
        .flat_map(|s| s.log_y.iter().copied())
        .collect();
    Ok(MetricReport::compute(&prediction, &target, model.n_output()))
}

/// [`evaluate_metrics`] on all three splits.
pub fn evaluate_splits<B: Backend>(
    model: &SpectrumModel<B>,
    data: &DatasetSplit,
    batch_size: usize,
    device: &B::Device,
) -> Result<EvaluationReport> {
    Ok(EvaluationReport {
        train: evaluate_metrics(model, &data.train, batch_size, device)?,
        validation: evaluate_metrics(model, &data.validation, batch_size, device)?,
        test: evaluate_metrics(model, &data.test, batch_size, device)?,
    })
}
