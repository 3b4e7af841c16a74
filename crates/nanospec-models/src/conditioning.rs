//! Conditioning vectors resolved once from the representation flags.
//!
//! | flag                              | dopant conc. | dopant geometry | pair conditioning |
//! |-----------------------------------|--------------|-----------------|-------------------|
//! | none                              | `[c]`        | `[r_in, r_out]` | `c_i c_j · I`     |
//! | `use_inverse_concentration`       | `[c, 1/(c+ε)]` |               | 4 factors ⊗ `I`   |
//! | `use_volume_in_dopant_constraint` |              | `+ [V]`         |                   |

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use nanospec_core::RepresentationConfig;

/// How a pair's concentrations scale its radial overlap.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConcentrationFactor {
    /// `c_i c_j`.
    Product,
    /// `{c_i c_j, c_i/(c_j+ε), c_j/(c_i+ε), 1/((c_i+ε)(c_j+ε))}`, factor-major.
    WithInverse { eps: f32 },
}

impl ConcentrationFactor {
    /// Concentration terms per Gaussian width.
    pub fn n_factors(&self) -> usize {
        match self {
            ConcentrationFactor::Product => 1,
            ConcentrationFactor::WithInverse { .. } => 4,
        }
    }

    /// `c_i, c_j [E]`, `integral [E, K]` → `[E, n_factors * K]`.
    pub fn apply<B: Backend>(
        &self,
        c_i: Tensor<B, 1>,
        c_j: Tensor<B, 1>,
        integral: Tensor<B, 2>,
    ) -> Tensor<B, 2> {
        let [e, k] = integral.dims();
        match *self {
            ConcentrationFactor::Product => (c_i * c_j).reshape([e, 1]).repeat_dim(1, k) * integral,
            ConcentrationFactor::WithInverse { eps } => {
                let inv_i = c_i.clone().add_scalar(eps).recip();
                let inv_j = c_j.clone().add_scalar(eps).recip();
                let factors = Tensor::stack::<2>(
                    vec![
                        c_i.clone() * c_j.clone(),
                        c_i * inv_j.clone(),
                        inv_i.clone() * c_j,
                        inv_i * inv_j,
                    ],
                    1,
                );
                let factors = factors.reshape([e, 4, 1]).repeat_dim(2, k);
                let integral = integral.reshape([e, 1, k]).repeat_dim(1, 4);
                (factors * integral).reshape([e, 4 * k])
            }
        }
    }
}

/// Conditioning widths and strategies derived from [`RepresentationConfig`].
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConditioning {
    pub concentration_width: usize,
    pub geometry_width: usize,
    pub interaction_width: usize,
    pub factor: ConcentrationFactor,
    pub use_volume_in_geometry: bool,
    pub normalize_by_volume: bool,
    pub volume_scale: f32,
    conc_eps: Option<f32>,
}

impl ResolvedConditioning {
    /// Derive widths and strategies from the configuration flags.
    pub fn resolve(config: &RepresentationConfig) -> Self {
        let factor = if config.use_inverse_concentration {
            ConcentrationFactor::WithInverse { eps: config.conc_eps }
        } else {
            ConcentrationFactor::Product
        };
        Self {
            concentration_width: if config.use_inverse_concentration { 2 } else { 1 },
            geometry_width: if config.use_volume_in_dopant_constraint { 3 } else { 2 },
            interaction_width: factor.n_factors() * config.nsigma,
            factor,
            use_volume_in_geometry: config.use_volume_in_dopant_constraint,
            normalize_by_volume: config.normalize_interaction_by_volume,
            volume_scale: config.volume_scale,
            conc_eps: config.use_inverse_concentration.then_some(config.conc_eps),
        }
    }

    /// Per-dopant concentration context `[N, concentration_width]`.
    pub fn dopant_concentration<B: Backend>(&self, concs: Tensor<B, 1>) -> Tensor<B, 2> {
        let [n] = concs.dims();
        let c = concs.reshape([n, 1]);
        match self.conc_eps {
            None => c,
            Some(eps) => Tensor::cat(vec![c.clone(), c.add_scalar(eps).recip()], 1),
        }
    }
}
