//! Learning-rate schedule and early stopping driven by the validation loss.
//!
//! ```text
//! lr
//!  │      ┌──────────┐
//!  │     ╱           └───┐          reduce by `factor` after `patience`
//!  │    ╱                └────┐     epochs without improvement
//!  │   ╱ warmup                 └── … floor at `min_lr`
//!  └──────────────────────────────────► epoch
//! ```

use nanospec_core::TrainingConfig;

/// Relative improvement required to reset the plateau counter.
const IMPROVEMENT_THRESHOLD: f64 = 1e-4;

fn improves(value: f64, best: f64) -> bool {
    value < best * (1.0 - IMPROVEMENT_THRESHOLD)
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReduceLrOnPlateauWithWarmup {
    base_lr: f64,
    warmup_epochs: usize,
    patience: usize,
    factor: f64,
    min_lr: f64,
    epoch: usize,
    plateau_lr: f64,
    best: f64,
    bad_epochs: usize,
}

impl ReduceLrOnPlateauWithWarmup {
    /// # Arguments
    ///
    /// * `base_lr` - rate reached at the end of warm-up
    /// * `warmup_epochs` - epochs of linear ramp from `base_lr / warmup_epochs`
    /// * `patience` - epochs without improvement before a reduction
    /// * `factor` - multiplier applied on each reduction
    /// * `min_lr` - floor for reductions
    pub fn new(base_lr: f64, warmup_epochs: usize, patience: usize, factor: f64, min_lr: f64) -> Self {
        Self {
            base_lr,
            warmup_epochs,
            patience,
            factor,
            min_lr,
            epoch: 0,
            plateau_lr: base_lr,
            best: f64::INFINITY,
            bad_epochs: 0,
        }
    }

    pub fn from_config(config: &TrainingConfig) -> Self {
        Self::new(
            config.learning_rate,
            config.warmup_epochs,
            config.lr_patience,
            config.lr_factor,
            config.min_learning_rate,
        )
    }

    /// Learning rate for the current epoch.
    pub fn learning_rate(&self) -> f64 {
        if self.epoch < self.warmup_epochs {
            return self.base_lr * (self.epoch + 1) as f64 / self.warmup_epochs as f64;
        }
        self.plateau_lr
    }

    /// Record the epoch's validation loss and advance one epoch.
    pub fn step(&mut self, metric: f64) {
        let in_warmup = self.epoch < self.warmup_epochs;
        self.epoch += 1;
        if !metric.is_finite() {
            return;
        }
        if improves(metric, self.best) {
            self.best = metric;
            self.bad_epochs = 0;
            return;
        }
        if in_warmup {
            return;
        }
        self.bad_epochs += 1;
        if self.bad_epochs > self.patience {
            let reduced = (self.plateau_lr * self.factor).max(self.min_lr);
            if reduced < self.plateau_lr {
                log::info!("reducing learning rate to {:.3e}", reduced);
            }
            self.plateau_lr = reduced;
            self.bad_epochs = 0;
        }
    }

    pub fn epoch(&self) -> usize {
        self.epoch
    }
}

/// Stops training after `patience` epochs without improvement.
#[derive(Debug, Clone, PartialEq)]
pub struct EarlyStopping {
    patience: Option<usize>,
    best: f64,
    bad_epochs: usize,
}

impl EarlyStopping {
    /// `None` never stops.
    pub fn new(patience: Option<usize>) -> Self {
        Self {
            patience,
            best: f64::INFINITY,
            bad_epochs: 0,
        }
    }

    /// Returns `true` when training should stop.
    pub fn update(&mut self, metric: f64) -> bool {
        if metric.is_finite() && improves(metric, self.best) {
            self.best = metric;
            self.bad_epochs = 0;
            return false;
        }
        self.bad_epochs += 1;
        self.patience.is_some_and(|p| self.bad_epochs >= p)
    }

    pub fn best(&self) -> f64 {
        self.best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_warmup() {
        let mut s = ReduceLrOnPlateauWithWarmup::new(1e-3, 4, 10, 0.5, 1e-7);
        let mut lrs = Vec::new();
        for _ in 0..6 {
            lrs.push(s.learning_rate());
            s.step(1.0);
        }
        let expected = [0.25e-3, 0.5e-3, 0.75e-3, 1e-3, 1e-3, 1e-3];
        for (a, b) in lrs.iter().zip(&expected) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn test_plateau_reduction_and_floor() {
        let mut s = ReduceLrOnPlateauWithWarmup::new(1.0, 0, 2, 0.5, 0.2);
        s.step(1.0); // best
        s.step(1.0);
        s.step(1.0);
        assert_eq!(s.learning_rate(), 1.0);
        s.step(1.0); // third bad epoch > patience
        assert_eq!(s.learning_rate(), 0.5);
        for _ in 0..3 {
            s.step(1.0);
        }
        assert_eq!(s.learning_rate(), 0.25);
        for _ in 0..3 {
            s.step(1.0);
        }
        assert_eq!(s.learning_rate(), 0.2);
    }

    #[test]
    fn test_improvement_resets_plateau() {
        let mut s = ReduceLrOnPlateauWithWarmup::new(1.0, 0, 1, 0.5, 0.0);
        s.step(1.0);
        s.step(1.0);
        s.step(0.5);
        s.step(0.5);
        assert_eq!(s.learning_rate(), 1.0);
    }

    #[test]
    fn test_early_stopping() {
        let mut stop = EarlyStopping::new(Some(2));
        assert!(!stop.update(1.0));
        assert!(!stop.update(0.9));
        assert!(!stop.update(0.95));
        assert!(stop.update(0.95));
        assert_eq!(stop.best(), 0.9);

        let mut never = EarlyStopping::new(None);
        assert!((0..100).all(|_| !never.update(1.0)));
    }
}
