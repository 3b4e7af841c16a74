//! Bipartite GATv2 attention convolution.
//!
//! For an edge `j → i`:
//!
//! ```text
//! e_ij  = aᵀ · LeakyReLU(W_s x_j + W_t x_i)      (per head)
//! α_ij  = softmax_j(e_ij)                         (over incoming edges of i)
//! out_i = mean_heads( Σ_j α_ij · W_s x_j ) + b
//! ```
//!
//! No self loops are added. The bias `b` is added only to targets with at
//! least one incoming edge, so a target without incoming edges receives
//! exact zeros whatever else shares its batch.

use burn::module::{Ignored, Module, Param};
use burn::nn::{Linear, LinearConfig};
use burn::tensor::activation::leaky_relu;
use burn::tensor::backend::Backend;
use burn::tensor::{Distribution, Tensor};

use crate::inputs::EdgeIndex;
use crate::ops::{segment_softmax, segment_sum};

/// GATv2 convolution from a source node population to a target one.
#[derive(Module, Debug)]
pub struct GatV2Conv<B: Backend> {
    lin_src: Linear<B>,
    lin_dst: Linear<B>,
    attention: Param<Tensor<B, 2>>,
    bias: Param<Tensor<B, 1>>,
    heads: Ignored<usize>,
    out_dim: Ignored<usize>,
    negative_slope: Ignored<f64>,
}

impl<B: Backend> GatV2Conv<B> {
    /// Create a convolution with Xavier-uniform attention vectors and a zero bias.
    ///
    /// # Arguments
    ///
    /// * `in_dim` - feature width of both source and target nodes
    /// * `out_dim` - output width `C` per head
    /// * `heads` - attention heads `H`; outputs are averaged over heads
    /// * `negative_slope` - LeakyReLU slope in the attention score
    /// * `device` - device for the parameters
    pub fn new(
        in_dim: usize,
        out_dim: usize,
        heads: usize,
        negative_slope: f64,
        device: &B::Device,
    ) -> Self {
        let bound = (6.0 / (heads + out_dim) as f64).sqrt();
        let attention = Tensor::random([heads, out_dim], Distribution::Uniform(-bound, bound), device);
        Self {
            lin_src: LinearConfig::new(in_dim, heads * out_dim).init(device),
            lin_dst: LinearConfig::new(in_dim, heads * out_dim).init(device),
            attention: Param::from_tensor(attention),
            bias: Param::from_tensor(Tensor::zeros([out_dim], device)),
            heads: Ignored(heads),
            out_dim: Ignored(out_dim),
            negative_slope: Ignored(negative_slope),
        }
    }

    /// Attention-weighted messages along `edges`.
    ///
    /// # Arguments
    ///
    /// * `x_src` - source features `[Ns, in]`
    /// * `x_dst` - target features `[Nt, in]`
    /// * `edges` - `src` indexes `x_src`, `dst` indexes `x_dst`
    ///
    /// # Returns
    ///
    /// `[Nt, out]`; rows of targets without incoming edges are zero.
    pub fn forward(&self, x_src: Tensor<B, 2>, x_dst: Tensor<B, 2>, edges: &EdgeIndex<B>) -> Tensor<B, 2> {
        let [nt, _] = x_dst.dims();
        let (h, c) = (self.heads.0, self.out_dim.0);
        let e = edges.len();
        let device = x_dst.device();
        if e == 0 || nt == 0 {
            return Tensor::zeros([nt, c], &device);
        }

        let xs = self.lin_src.forward(x_src).select(0, edges.src.clone());
        let xt = self.lin_dst.forward(x_dst).select(0, edges.dst.clone());

        let z = leaky_relu(xs.clone() + xt, self.negative_slope.0).reshape([e, h, c]);
        let att = self.attention.val().reshape([1, h, c]).repeat_dim(0, e);
        let logits = (z * att).sum_dim(2).reshape([e, h]);
        let alpha = segment_softmax(logits, edges.dst.clone(), edges.dst_host(), nt);

        let messages = xs.reshape([e, h, c]) * alpha.reshape([e, h, 1]).repeat_dim(2, c);
        let out = segment_sum(messages, edges.dst.clone(), nt)
            .mean_dim(1)
            .reshape([nt, c]);

        // 1 for targets with incoming edges, 0 otherwise
        let in_degree = segment_sum(Tensor::<B, 2>::ones([e, 1], &device), edges.dst.clone(), nt);
        let reached = in_degree.clamp_max(1.0).repeat_dim(1, c);
        out + reached * self.bias.val().reshape([1, c]).repeat_dim(0, nt)
    }
}
