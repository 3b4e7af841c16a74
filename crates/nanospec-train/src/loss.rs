//! Regression losses between predicted and target log-spectra.

use burn::nn::loss::{HuberLossConfig, MseLoss, Reduction};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use nanospec_core::LossKind;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SpectrumLoss {
    kind: LossKind,
}

impl SpectrumLoss {
    pub const fn new(kind: LossKind) -> Self {
        Self { kind }
    }

    pub const fn kind(&self) -> LossKind {
        self.kind
    }

    /// Mean loss over every element, as a one-element tensor.
    pub fn compute<B: Backend>(&self, prediction: Tensor<B, 2>, target: Tensor<B, 2>) -> Tensor<B, 1> {
        match self.kind {
            LossKind::Mse => MseLoss::new().forward(prediction, target, Reduction::Mean),
            LossKind::Mae => (prediction - target).abs().mean(),
            LossKind::Huber { delta } => {
                HuberLossConfig::new(delta)
                    .init()
                    .forward(prediction, target, Reduction::Mean)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::TensorData;

    type B = NdArray<f32>;

    fn tensors(p: [f32; 4], t: [f32; 4]) -> (Tensor<B, 2>, Tensor<B, 2>) {
        let device = Default::default();
        (
            Tensor::from_data(TensorData::new(p.to_vec(), [2, 2]), &device),
            Tensor::from_data(TensorData::new(t.to_vec(), [2, 2]), &device),
        )
    }

    fn value(loss: SpectrumLoss, p: [f32; 4], t: [f32; 4]) -> f32 {
        let (p, t) = tensors(p, t);
        loss.compute(p, t).into_scalar()
    }

    #[test]
    fn test_known_values() {
        let p = [1.0, 2.0, 3.0, 4.0];
        let t = [1.0, 0.0, 3.0, 7.0];
        assert!((value(SpectrumLoss::new(LossKind::Mse), p, t) - 13.0 / 4.0).abs() < 1e-6);
        assert!((value(SpectrumLoss::new(LossKind::Mae), p, t) - 5.0 / 4.0).abs() < 1e-6);
        // |d| = 2 -> 1.5, |d| = 3 -> 2.5 with delta = 1
        let huber = value(SpectrumLoss::new(LossKind::Huber { delta: 1.0 }), p, t);
        assert!((huber - 4.0 / 4.0).abs() < 1e-6);
    }

    #[test]
    fn test_huber_delta_moves_the_kink() {
        // |d| = 2 and 3 with delta = 2.5: 0.5*4 = 2, 2.5*(3 - 1.25) = 4.375
        let p = [1.0, 2.0, 3.0, 4.0];
        let t = [1.0, 0.0, 3.0, 7.0];
        let huber = value(SpectrumLoss::new(LossKind::Huber { delta: 2.5 }), p, t);
        assert!((huber - 6.375 / 4.0).abs() < 1e-6);
    }

    #[test]
    fn test_huber_quadratic_region() {
        let huber = value(
            SpectrumLoss::new(LossKind::Huber { delta: 1.0 }),
            [0.5, 0.0, 0.0, 0.0],
            [0.0, 0.0, 0.0, 0.0],
        );
        assert!((huber - 0.125 / 4.0).abs() < 1e-7);
    }
}
