//! Small tensor helpers shared by the layers.
//!
//! [`segment_softmax`] reads the attention logits back to the host once per
//! convolution to take per-target maxima. The device sync is intentional;
//! burn has no scatter-max.

use burn::tensor::backend::Backend;
use burn::tensor::{ElementConversion, Int, Tensor, TensorData};

/// Index tensor `[n]` from host indices.
pub fn index_tensor<B: Backend>(values: &[usize], device: &B::Device) -> Tensor<B, 1, Int> {
    let data: Vec<i64> = values.iter().map(|&v| v as i64).collect();
    Tensor::from_data(TensorData::new(data, [values.len()]).convert::<B::IntElem>(), device)
}

/// Index tensor `[n, 2]` from host index pairs.
pub fn pair_index_tensor<B: Backend>(values: &[[usize; 2]], device: &B::Device) -> Tensor<B, 2, Int> {
    let data: Vec<i64> = values.iter().flat_map(|p| p.iter().map(|&v| v as i64)).collect();
    Tensor::from_data(TensorData::new(data, [values.len(), 2]).convert::<B::IntElem>(), device)
}

/// Float tensor of `shape` from row-major host values.
pub fn float_tensor<B: Backend, const D: usize>(
    values: Vec<f32>,
    shape: [usize; D],
    device: &B::Device,
) -> Tensor<B, D> {
    Tensor::from_data(TensorData::new(values, shape).convert::<B::FloatElem>(), device)
}

/// Copy a float tensor to the host.
pub fn to_vec<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Vec<f32> {
    tensor
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .expect("f32 tensor data to vec")
}

/// Copy an index tensor to the host.
pub fn index_to_vec<B: Backend, const D: usize>(tensor: Tensor<B, D, Int>) -> Vec<i64> {
    tensor
        .into_data()
        .convert::<i64>()
        .to_vec::<i64>()
        .expect("i64 tensor data to vec")
}

/// `(min, max)` of a non-empty index tensor.
pub fn index_range<B: Backend, const D: usize>(tensor: &Tensor<B, D, Int>) -> Option<(i64, i64)> {
    if tensor.shape().num_elements() == 0 {
        return None;
    }
    let min = tensor.clone().min().into_scalar().elem::<i64>();
    let max = tensor.clone().max().into_scalar().elem::<i64>();
    Some((min, max))
}

/// Column `col` of a `[n, k]` index tensor as `[n]`.
pub fn index_column<B: Backend>(tensor: Tensor<B, 2, Int>, col: usize) -> Tensor<B, 1, Int> {
    let [n, _] = tensor.dims();
    tensor.slice([0..n, col..col + 1]).reshape([n])
}

/// Column `col` of a `[n, k]` float tensor as `[n, 1]`.
pub fn column<B: Backend>(tensor: Tensor<B, 2>, col: usize) -> Tensor<B, 2> {
    let [n, _] = tensor.dims();
    tensor.slice([0..n, col..col + 1])
}

/// Sum rows of `values` into `n_segments` buckets given by `index`.
///
/// Buckets that no row maps to are zero. Differentiable in `values`.
pub fn segment_sum<B: Backend, const D: usize>(
    values: Tensor<B, D>,
    index: Tensor<B, 1, Int>,
    n_segments: usize,
) -> Tensor<B, D> {
    let mut shape = values.dims();
    shape[0] = n_segments;
    let zeros = Tensor::zeros(shape, &values.device());
    if values.dims()[0] == 0 {
        return zeros;
    }
    zeros.select_assign(0, index, values)
}

/// Softmax of `logits [E, H]` over the entries sharing the same segment.
///
/// The per-segment maximum used for stabilisation is computed from a
/// detached host copy; softmax is invariant to that shift so gradients are
/// unaffected.
pub fn segment_softmax<B: Backend>(
    logits: Tensor<B, 2>,
    index: Tensor<B, 1, Int>,
    index_host: &[usize],
    n_segments: usize,
) -> Tensor<B, 2> {
    let [e, h] = logits.dims();
    let device = logits.device();
    if e == 0 {
        return logits;
    }

    let values = to_vec(logits.clone());
    let mut seg_max = vec![f32::NEG_INFINITY; n_segments * h];
    for (k, &s) in index_host.iter().enumerate() {
        for j in 0..h {
            let v = values[k * h + j];
            if v > seg_max[s * h + j] {
                seg_max[s * h + j] = v;
            }
        }
    }
    let shift: Vec<f32> = index_host
        .iter()
        .flat_map(|&s| seg_max[s * h..(s + 1) * h].iter().copied())
        .collect();
    let shift = float_tensor::<B, 2>(shift, [e, h], &device);

    let exp = (logits - shift).exp();
    let denom = segment_sum(exp.clone(), index.clone(), n_segments);
    exp / denom.select(0, index).add_scalar(1e-16)
}
