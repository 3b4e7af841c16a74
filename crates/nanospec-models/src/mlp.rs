//! Non-linear MLP used for the spectrum readout.
//!
//! ```text
//! x ──► Linear ──► SiLU ──► Dropout ──► … ──► Linear ──► y
//!       └──────── per hidden width ───────┘   (no activation)
//! ```

use burn::module::Module;
use burn::nn::{Dropout, DropoutConfig, Linear, LinearConfig};
use burn::tensor::activation::silu;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

/// `Linear → SiLU → Dropout` per hidden layer, then a final `Linear`.
#[derive(Module, Debug)]
pub struct NonLinearMlp<B: Backend> {
    hidden: Vec<Linear<B>>,
    output: Linear<B>,
    dropout: Dropout,
}

impl<B: Backend> NonLinearMlp<B> {
    /// # Arguments
    ///
    /// * `input_dim` - width of the input features
    /// * `output_dim` - width of the output
    /// * `hidden` - hidden widths; empty gives a single linear map
    /// * `dropout` - dropout probability after each hidden activation
    /// * `device` - device for the parameters
    pub fn new(
        input_dim: usize,
        output_dim: usize,
        hidden: &[usize],
        dropout: f64,
        device: &B::Device,
    ) -> Self {
        let mut layers = Vec::with_capacity(hidden.len());
        let mut width = input_dim;
        for &h in hidden {
            layers.push(LinearConfig::new(width, h).init(device));
            width = h;
        }
        Self {
            hidden: layers,
            output: LinearConfig::new(width, output_dim).init(device),
            dropout: DropoutConfig::new(dropout).init(),
        }
    }

    /// Works on any rank; the last dimension is the feature dimension.
    pub fn forward<const D: usize>(&self, x: Tensor<B, D>) -> Tensor<B, D> {
        let mut x = x;
        for layer in &self.hidden {
            x = self.dropout.forward(silu(layer.forward(x)));
        }
        self.output.forward(x)
    }

    pub fn output_dim(&self) -> usize {
        let [_, out] = self.output.weight.val().dims();
        out
    }
}
