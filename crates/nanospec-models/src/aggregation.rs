//! Per-graph pooling of node features.

use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor};
use nanospec_core::Pooling;

use crate::ops::segment_sum;

/// Pooling strategy keyed by the graph-membership index of each node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Aggregation {
    /// Node features summed per graph.
    #[default]
    Sum,
    /// Node features averaged per graph.
    Mean,
}

impl From<Pooling> for Aggregation {
    fn from(pooling: Pooling) -> Self {
        match pooling {
            Pooling::Sum => Aggregation::Sum,
            Pooling::Mean => Aggregation::Mean,
        }
    }
}

impl Aggregation {
    /// `x [N, D]`, `batch [N]` → `[num_graphs, D]`. Graphs without nodes pool to zero.
    pub fn pool<B: Backend>(
        &self,
        x: Tensor<B, 2>,
        batch: Tensor<B, 1, Int>,
        num_graphs: usize,
    ) -> Tensor<B, 2> {
        let [n, d] = x.dims();
        let device = x.device();
        let summed = segment_sum(x, batch.clone(), num_graphs);
        match self {
            Aggregation::Sum => summed,
            Aggregation::Mean => {
                let counts = segment_sum(Tensor::<B, 2>::ones([n, 1], &device), batch, num_graphs);
                summed / counts.clamp_min(1.0).repeat_dim(1, d)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::{float_tensor, index_tensor, to_vec};
    use burn::backend::NdArray;

    type B = NdArray<f32>;

    #[test]
    fn test_sum_and_mean() {
        let device = Default::default();
        let x = float_tensor::<B, 2>(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], [3, 2], &device);
        let batch = index_tensor::<B>(&[0, 0, 2], &device);

        let sum = to_vec(Aggregation::Sum.pool(x.clone(), batch.clone(), 3));
        assert_eq!(sum, vec![4.0, 6.0, 0.0, 0.0, 5.0, 6.0]);

        let mean = to_vec(Aggregation::Mean.pool(x, batch, 3));
        assert_eq!(mean, vec![2.0, 3.0, 0.0, 0.0, 5.0, 6.0]);
    }

    #[test]
    fn test_empty_nodes() {
        let device = Default::default();
        let x = Tensor::<B, 2>::zeros([0, 4], &device);
        let out = Aggregation::Mean.pool(x, index_tensor::<B>(&[], &device), 2);
        assert_eq!(out.dims(), [2, 4]);
    }
}
