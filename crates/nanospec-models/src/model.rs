//! Spectrum model: graph representation followed by the readout MLP.

use burn::module::Module;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use nanospec_core::{HeteroBatch, NanoSpecConfig, ReadoutConfig, RepresentationConfig, Result};

use crate::inputs::HeteroInputs;
use crate::mlp::NonLinearMlp;
use crate::representation::HeteroDcvRepresentation;

/// Representation module plus readout MLP.
///
/// Generic over the backend: build it on `Autodiff<_>` for training and call
/// [`valid`](burn::module::AutodiffModule::valid) for evaluation.
#[derive(Module, Debug)]
pub struct SpectrumModel<B: Backend> {
    representation: HeteroDcvRepresentation<B>,
    readout: NonLinearMlp<B>,
}

impl<B: Backend> SpectrumModel<B> {
    /// Build a model from its two configuration sections.
    ///
    /// # Arguments
    ///
    /// * `representation` - graph representation hyperparameters
    /// * `readout` - readout MLP widths, dropout and spectrum length
    /// * `device` - device for every parameter
    ///
    /// # Errors
    ///
    /// [`NanoSpecError::Config`](nanospec_core::NanoSpecError::Config) when either section fails validation.
    pub fn new(
        representation: &RepresentationConfig,
        readout: &ReadoutConfig,
        device: &B::Device,
    ) -> Result<Self> {
        readout.validate()?;
        let representation = HeteroDcvRepresentation::new(representation, device)?;
        let readout = NonLinearMlp::new(
            representation.embed_dim(),
            readout.n_output,
            &readout.hidden,
            readout.dropout,
            device,
        );
        log::info!(
            "spectrum model: {} parameters, {} outputs",
            representation.num_params() + readout.num_params(),
            readout.output_dim()
        );
        Ok(Self {
            representation,
            readout,
        })
    }

    /// Build from a full configuration, validating all sections first.
    pub fn from_config(config: &NanoSpecConfig, device: &B::Device) -> Result<Self> {
        config.validate()?;
        Self::new(&config.representation, &config.readout, device)
    }

    /// Upload a host batch with this model's dopant vocabulary size.
    pub fn prepare(&self, batch: &HeteroBatch, device: &B::Device) -> Result<HeteroInputs<B>> {
        HeteroInputs::from_batch(batch, self.representation.n_dopant_types(), device)
    }

    /// Predicted spectra `[num_graphs, n_output]`.
    pub fn forward(&self, inputs: &HeteroInputs<B>) -> Result<Tensor<B, 2>> {
        Ok(self.readout.forward(self.representation.forward(inputs)?))
    }

    /// Pooled graph representation `[num_graphs, D]`.
    pub fn get_representation(&self, inputs: &HeteroInputs<B>) -> Result<Tensor<B, 2>> {
        self.representation.forward(inputs)
    }

    /// Borrow the representation module.
    pub fn representation(&self) -> &HeteroDcvRepresentation<B> {
        &self.representation
    }

    /// Length of the predicted spectrum.
    pub fn n_output(&self) -> usize {
        self.readout.output_dim()
    }
}
