//! Gaussian radial overlap between two concentric shells.
//!
//! For every characteristic width `σ_k` the integrator evaluates
//!
//! ```text
//!   I_k = ∫_{a0}^{a1} ∫_{b0}^{b1} exp(-(r - s)² / 2σ_k²) ds dr
//! ```
//!
//! in closed form through the second antiderivative of the Gaussian
//!
//! ```text
//!   H(u) = σ² exp(-u² / 2σ²) + u σ √(π/2) erf(u / σ√2)
//!   I    = H(a1 - b0) - H(a1 - b1) - H(a0 - b0) + H(a0 - b1)
//! ```
//!
//! Shells narrower than [`MIN_SHELL_WIDTH`] exchange nothing: the value is
//! exactly zero there.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use nanospec_core::{NanoSpecError, Result};
use std::f32::consts::{PI, SQRT_2};

use crate::ops::float_tensor;

/// Shells at most this wide are treated as degenerate.
pub const MIN_SHELL_WIDTH: f32 = 1e-6;

/// Parameter-free, differentiable radial interaction integrator.
#[derive(Debug, Clone, PartialEq)]
pub struct RadialInteractionIntegrator {
    sigmas: Vec<f32>,
}

impl RadialInteractionIntegrator {
    /// `nsigma` widths evenly spaced over `[sigma_min, sigma_max]`.
    ///
    /// With `nsigma == 1` the single width is `sigma_min`; with `nsigma == 0`
    /// every integral has zero columns.
    pub fn new(sigma_min: f32, sigma_max: f32, nsigma: usize) -> Self {
        let sigmas = match nsigma {
            0 => Vec::new(),
            1 => vec![sigma_min],
            n => {
                let step = (sigma_max - sigma_min) / (n - 1) as f32;
                (0..n).map(|k| sigma_min + step * k as f32).collect()
            }
        };
        Self { sigmas }
    }

    /// Number of Gaussian widths, the column count of [`integrate`](Self::integrate).
    pub fn nsigma(&self) -> usize {
        self.sigmas.len()
    }

    /// The Gaussian widths, ascending.
    pub fn sigmas(&self) -> &[f32] {
        &self.sigmas
    }

    /// Overlap of shells `[a0, a1]` and `[b0, b1]`, one pair per row.
    ///
    /// # Arguments
    ///
    /// * `a0`, `a1` - inner and outer radius of the first shell, `[E]`
    /// * `b0`, `b1` - inner and outer radius of the second shell, `[E]`
    ///
    /// # Returns
    ///
    /// `[E, nsigma]`, non-negative and finite. Rows where either shell is no
    /// wider than [`MIN_SHELL_WIDTH`] are exactly zero.
    ///
    /// # Errors
    ///
    /// [`NanoSpecError::ShapeMismatch`] when the four inputs differ in length.
    pub fn integrate<B: Backend>(
        &self,
        a0: Tensor<B, 1>,
        a1: Tensor<B, 1>,
        b0: Tensor<B, 1>,
        b1: Tensor<B, 1>,
    ) -> Result<Tensor<B, 2>> {
        let [e] = a0.dims();
        for (name, t) in [("r_a1", &a1), ("r_b0", &b0), ("r_b1", &b1)] {
            let [len] = t.dims();
            if len != e {
                return Err(NanoSpecError::shape(name, format!("[{e}]"), format!("[{len}]")));
            }
        }

        let k = self.nsigma();
        let device = a0.device();
        if e == 0 || k == 0 {
            return Ok(Tensor::zeros([e, k], &device));
        }

        let degenerate = (a1.clone() - a0.clone())
            .min_pair(b1.clone() - b0.clone())
            .lower_equal_elem(MIN_SHELL_WIDTH);

        let sigma = float_tensor::<B, 2>(self.sigmas.clone(), [1, k], &device).repeat_dim(0, e);
        let expand = |t: Tensor<B, 1>| t.reshape([e, 1]).repeat_dim(1, k);
        let (a0, a1, b0, b1) = (expand(a0), expand(a1), expand(b0), expand(b1));

        let h = |u: Tensor<B, 2>| antiderivative(u, sigma.clone());
        let integral = h(a1.clone() - b0.clone()) - h(a1 - b1.clone()) - h(a0.clone() - b0) + h(a0 - b1);

        let mask = degenerate.reshape([e, 1]).repeat_dim(1, k);
        Ok(integral.clamp_min(0.0).mask_fill(mask, 0.0))
    }
}

fn antiderivative<B: Backend>(u: Tensor<B, 2>, sigma: Tensor<B, 2>) -> Tensor<B, 2> {
    let sigma_sq = sigma.clone() * sigma.clone();
    let gauss = sigma_sq.clone() * (-(u.clone() * u.clone()) / (sigma_sq * 2.0)).exp();
    let erf = (u.clone() / (sigma.clone() * SQRT_2)).erf();
    gauss + u * sigma * (PI / 2.0).sqrt() * erf
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::to_vec;
    use burn::backend::NdArray;

    type B = NdArray<f32>;

    fn radii(values: &[f32]) -> Tensor<B, 1> {
        float_tensor::<B, 1>(values.to_vec(), [values.len()], &Default::default())
    }

    /// Midpoint-rule reference for a single sigma.
    fn numeric(a: (f32, f32), b: (f32, f32), sigma: f32) -> f32 {
        let n = 400;
        let (da, db) = ((a.1 - a.0) / n as f32, (b.1 - b.0) / n as f32);
        let mut acc = 0.0f64;
        for i in 0..n {
            let r = a.0 + (i as f32 + 0.5) * da;
            for j in 0..n {
                let s = b.0 + (j as f32 + 0.5) * db;
                acc += (-((r - s) * (r - s)) / (2.0 * sigma * sigma)).exp() as f64;
            }
        }
        (acc * (da * db) as f64) as f32
    }

    #[test]
    fn test_sigma_grid() {
        let integrator = RadialInteractionIntegrator::new(1.0, 5.0, 5);
        assert_eq!(integrator.sigmas(), &[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(RadialInteractionIntegrator::new(2.0, 5.0, 1).sigmas(), &[2.0]);
    }

    #[test]
    fn test_matches_numeric_integral() {
        let integrator = RadialInteractionIntegrator::new(1.0, 5.0, 3);
        let out = integrator
            .integrate(radii(&[0.0, 2.0]), radii(&[3.0, 4.0]), radii(&[3.0, 2.0]), radii(&[6.0, 4.0]))
            .unwrap();
        assert_eq!(out.dims(), [2, 3]);
        let values = to_vec(out);
        for (row, (a, b)) in [((0.0, 3.0), (3.0, 6.0)), ((2.0, 4.0), (2.0, 4.0))].iter().enumerate() {
            for (col, &sigma) in integrator.sigmas().iter().enumerate() {
                let expected = numeric(*a, *b, sigma);
                let got = values[row * 3 + col];
                assert!((got - expected).abs() < 1e-2 * expected.max(1.0), "{got} vs {expected}");
            }
        }
    }

    #[test]
    fn test_zero_width_shells_are_finite_and_zero() {
        let integrator = RadialInteractionIntegrator::new(1.0, 5.0, 5);
        let out = integrator
            .integrate(radii(&[5.0, 0.0]), radii(&[5.0, 3.0]), radii(&[5.0, 3.0]), radii(&[5.0, 3.0]))
            .unwrap();
        let values = to_vec(out);
        assert!(values.iter().all(|v| v.is_finite()));
        assert!(values.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_length_mismatch() {
        let integrator = RadialInteractionIntegrator::new(1.0, 5.0, 5);
        let err = integrator
            .integrate(radii(&[0.0, 1.0]), radii(&[1.0]), radii(&[0.0, 1.0]), radii(&[1.0, 2.0]))
            .unwrap_err();
        assert!(err.to_string().contains("r_a1"));
    }

    #[test]
    fn test_empty_input() {
        let integrator = RadialInteractionIntegrator::new(1.0, 5.0, 4);
        let out = integrator
            .integrate(radii(&[]), radii(&[]), radii(&[]), radii(&[]))
            .unwrap();
        assert_eq!(out.dims(), [0, 4]);
    }
}
