//! Stochastic weight averaging.
//!
//! ```text
//! epoch ≥ start:   w̄ ← w̄ + (w - w̄) / (k + 1),   k = epochs averaged so far
//! end of training: load w̄ into the model
//! ```
//!
//! Only parameters are averaged. Batch-norm running statistics are buffers,
//! not parameters, and keep the values of the last epoch.

use std::collections::HashMap;

use burn::module::{Module, ModuleMapper, ModuleVisitor, Param, ParamId};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

/// Running average of a module's parameters, keyed by [`ParamId`].
///
/// The averaged values are detached copies, so keeping them does not retain
/// any autodiff graph.
#[derive(Debug, Clone)]
pub struct StochasticWeightAveraging<B: Backend> {
    start_epoch: usize,
    averages: HashMap<ParamId, Tensor<B, 1>>,
    n_averaged: usize,
}

impl<B: Backend> StochasticWeightAveraging<B> {
    /// Average every epoch from `start_epoch` (0-based) on.
    pub fn new(start_epoch: usize) -> Self {
        Self {
            start_epoch,
            averages: HashMap::new(),
            n_averaged: 0,
        }
    }

    pub fn start_epoch(&self) -> usize {
        self.start_epoch
    }

    /// Number of snapshots folded into the average.
    pub fn n_averaged(&self) -> usize {
        self.n_averaged
    }

    /// Fold the parameters of `model` into the average.
    ///
    /// # Arguments
    ///
    /// * `epoch` - epoch that just finished; earlier than the start epoch is a no-op
    /// * `model` - module whose parameter ids match previous snapshots
    ///
    /// # Returns
    ///
    /// Whether the snapshot was taken.
    pub fn update<M: Module<B>>(&mut self, epoch: usize, model: &M) -> bool {
        if epoch < self.start_epoch {
            return false;
        }
        let mut collector = ParamCollector { params: Vec::new() };
        model.visit(&mut collector);

        let weight = 1.0 / (self.n_averaged as f64 + 1.0);
        for (id, value) in collector.params {
            let average = match self.averages.remove(&id) {
                Some(average) => average.clone() + (value - average).mul_scalar(weight),
                None => value,
            };
            self.averages.insert(id, average);
        }
        self.n_averaged += 1;
        true
    }

    /// Replace the parameters of `model` with their averages.
    ///
    /// Returns `model` unchanged when nothing was averaged yet.
    pub fn apply<M: Module<B>>(&self, model: M) -> M {
        if self.n_averaged == 0 {
            return model;
        }
        model.map(&mut AverageLoader {
            averages: &self.averages,
        })
    }
}

struct ParamCollector<B: Backend> {
    params: Vec<(ParamId, Tensor<B, 1>)>,
}

impl<B: Backend> ModuleVisitor<B> for ParamCollector<B> {
    fn visit_float<const D: usize>(&mut self, id: ParamId, tensor: &Tensor<B, D>) {
        let value = tensor.clone().detach();
        let n = value.shape().num_elements();
        self.params.push((id, value.reshape([n])));
    }
}

struct AverageLoader<'a, B: Backend> {
    averages: &'a HashMap<ParamId, Tensor<B, 1>>,
}

impl<B: Backend> ModuleMapper<B> for AverageLoader<'_, B> {
    fn map_float<const D: usize>(&mut self, id: ParamId, tensor: Tensor<B, D>) -> Tensor<B, D> {
        let Some(average) = self.averages.get(&id) else {
            return tensor;
        };
        let average = average.clone();
        let value = average.reshape(tensor.shape());
        if tensor.is_require_grad() {
            value.require_grad()
        } else {
            value
        }
    }
}
