//! Feature-wise linear modulation.
//!
//! ```text
//! context [N, C] ──► MLP ──► [N, 2D] ──┬── scale = [:, :D]
//!                                      └── shift = [:, D:]
//! out = embedding * (1 + scale) + shift
//! ```

use burn::module::{Ignored, Module};
use burn::nn::{Linear, LinearConfig};
use burn::tensor::activation::silu;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

/// Context-conditioned affine modulation of an embedding.
#[derive(Module, Debug)]
pub struct FilmLayer<B: Backend> {
    layers: Vec<Linear<B>>,
    embed_dim: Ignored<usize>,
    context_dim: Ignored<usize>,
}

impl<B: Backend> FilmLayer<B> {
    /// Create a FiLM layer whose MLP maps `context_dim` to `2 * embed_dim`.
    ///
    /// # Arguments
    ///
    /// * `context_dim` - width `C` of the conditioning vector
    /// * `embed_dim` - width `D` of the modulated embedding
    /// * `hidden` - hidden widths of the modulation MLP, SiLU between layers
    /// * `device` - device for the parameters
    pub fn new(context_dim: usize, embed_dim: usize, hidden: &[usize], device: &B::Device) -> Self {
        let mut widths = Vec::with_capacity(hidden.len() + 2);
        widths.push(context_dim);
        widths.extend_from_slice(hidden);
        widths.push(2 * embed_dim);
        let layers = widths
            .windows(2)
            .map(|w| LinearConfig::new(w[0], w[1]).init(device))
            .collect();
        Self {
            layers,
            embed_dim: Ignored(embed_dim),
            context_dim: Ignored(context_dim),
        }
    }

    pub fn context_dim(&self) -> usize {
        self.context_dim.0
    }

    /// `(scale, shift)`, each `[N, D]`.
    pub fn modulation(&self, context: Tensor<B, 2>) -> (Tensor<B, 2>, Tensor<B, 2>) {
        let last = self.layers.len() - 1;
        let mut out = context;
        for (i, layer) in self.layers.iter().enumerate() {
            out = layer.forward(out);
            if i < last {
                out = silu(out);
            }
        }
        let [n, _] = out.dims();
        let d = self.embed_dim.0;
        let scale = out.clone().slice([0..n, 0..d]);
        let shift = out.slice([0..n, d..2 * d]);
        (scale, shift)
    }

    /// `embedding * (1 + scale) + shift`, row by row.
    ///
    /// `embedding [N, D]` and `context [N, C]` must have the same row count.
    /// Zero rows pass through untouched.
    pub fn forward(&self, embedding: Tensor<B, 2>, context: Tensor<B, 2>) -> Tensor<B, 2> {
        if embedding.dims()[0] == 0 {
            return embedding;
        }
        let (scale, shift) = self.modulation(context);
        embedding * scale.add_scalar(1.0) + shift
    }

    /// Same as [`forward`](Self::forward) over arbitrary leading dimensions.
    pub fn forward_nd<const D: usize>(
        &self,
        embedding: Tensor<B, D>,
        context: Tensor<B, D>,
    ) -> Tensor<B, D> {
        let dims = embedding.dims();
        let out = self.forward(embedding.flatten(0, D - 2), context.flatten(0, D - 2));
        out.reshape(dims)
    }
}
