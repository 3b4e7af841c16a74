//! Heterogeneous dopant-coupling representation.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────────┐
//! │ HeteroDcvRepresentation                                               │
//! │  dopants:  embed(type) ─► FiLM(conc) ─► FiLM(r_in, r_out[, V]) ─► BN  │
//! │  pairs:    embed(pair type) ─► FiLM(BN(factor(c_i, c_j) ⊗ I_σ))       │
//! │            I_σ = radial overlap of the two dopants' shells            │
//! │  R × HeteroConvRound (GATv2 per relation, sum per type, SiLU)         │
//! │  pool(dopant features, dopant_batch) ─► [num_graphs, D]               │
//! └───────────────────────────────────────────────────────────────────────┘
//! ```

use std::f32::consts::PI;

use burn::module::{Ignored, Module};
use burn::nn::{BatchNorm, BatchNormConfig, Embedding, EmbeddingConfig, Linear, LinearConfig};
use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor};
use nanospec_core::{RepresentationConfig, Result};

use crate::aggregation::Aggregation;
use crate::conditioning::ResolvedConditioning;
use crate::film::FilmLayer;
use crate::hetero_conv::{HeteroConvRound, MessagePassingStage, NodeFeatures};
use crate::inputs::{HeteroInputs, PairInputs};
use crate::integrator::RadialInteractionIntegrator;
use crate::ops::{column, index_column};

/// Pair-node embedding.
#[derive(Module, Debug)]
pub enum PairEmbedder<B: Backend> {
    /// Linear map of the two dopant types `[t_i, t_j]`.
    Linear(Linear<B>),
    /// One learned vector per ordered type pair, `V²` rows.
    Table(Embedding<B>),
}

impl<B: Backend> PairEmbedder<B> {
    fn new(n_dopant_types: usize, dim: usize, use_table: bool, device: &B::Device) -> Self {
        if use_table {
            let n = n_dopant_types * n_dopant_types;
            PairEmbedder::Table(EmbeddingConfig::new(n, dim).init(device))
        } else {
            PairEmbedder::Linear(LinearConfig::new(2, dim).init(device))
        }
    }

    fn forward(&self, pairs: &PairInputs<B>) -> Tensor<B, 2> {
        match self {
            PairEmbedder::Linear(linear) => linear.forward(pairs.type_pairs.clone().float()),
            PairEmbedder::Table(table) => embed(table, pairs.types.clone(), pairs.len()),
        }
    }
}

/// Embedding, conditioning norm and FiLM of one pair-node population.
#[derive(Module, Debug)]
pub struct PairBranch<B: Backend> {
    embedder: PairEmbedder<B>,
    norm: BatchNorm<B, 0>,
    film: FilmLayer<B>,
}

/// Heterogeneous dopant-coupling representation; see the module docs.
#[derive(Module, Debug)]
pub struct HeteroDcvRepresentation<B: Backend> {
    dopant_embedder: Embedding<B>,
    dopant_film: FilmLayer<B>,
    dopant_constraint_film: FilmLayer<B>,
    dopant_norm: BatchNorm<B, 0>,
    interaction: PairBranch<B>,
    intraaction: PairBranch<B>,
    rounds: Vec<HeteroConvRound<B>>,
    integrator: Ignored<RadialInteractionIntegrator>,
    conditioning: Ignored<ResolvedConditioning>,
    aggregation: Ignored<Aggregation>,
    embed_dim: Ignored<usize>,
    n_dopant_types: Ignored<usize>,
}

impl<B: Backend> HeteroDcvRepresentation<B> {
    /// Build every sub-module from `config`.
    ///
    /// The conditioning flags are resolved here, once; the widths of the FiLM
    /// contexts and of the pair batch norms follow from them.
    ///
    /// # Errors
    ///
    /// [`NanoSpecError::Config`](nanospec_core::NanoSpecError::Config) if `config` fails validation.
    pub fn new(config: &RepresentationConfig, device: &B::Device) -> Result<Self> {
        config.validate()?;
        let d = config.embed_dim;
        let conditioning = ResolvedConditioning::resolve(config);
        log::info!(
            "representation: D={} rounds={} widths conc={} geometry={} interaction={}",
            d,
            config.n_message_passing,
            conditioning.concentration_width,
            conditioning.geometry_width,
            conditioning.interaction_width
        );

        let film = |width: usize| FilmLayer::new(width, d, &config.film_hidden, device);
        let branch = || PairBranch {
            embedder: PairEmbedder::new(config.n_dopant_types, d, config.interaction_embedding, device),
            norm: BatchNormConfig::new(conditioning.interaction_width).init(device),
            film: film(conditioning.interaction_width),
        };

        Ok(Self {
            dopant_embedder: EmbeddingConfig::new(config.n_dopant_types, d).init(device),
            dopant_film: film(conditioning.concentration_width),
            dopant_constraint_film: film(conditioning.geometry_width),
            dopant_norm: BatchNormConfig::new(d).init(device),
            interaction: branch(),
            intraaction: branch(),
            rounds: (0..config.n_message_passing)
                .map(|_| {
                    HeteroConvRound::new(d, config.attention_heads, config.negative_slope, device)
                })
                .collect(),
            integrator: Ignored(RadialInteractionIntegrator::new(
                config.sigma_min,
                config.sigma_max,
                config.nsigma,
            )),
            aggregation: Ignored(config.pooling.into()),
            conditioning: Ignored(conditioning),
            embed_dim: Ignored(d),
            n_dopant_types: Ignored(config.n_dopant_types),
        })
    }

    /// Width `D` of node and graph representations.
    pub fn embed_dim(&self) -> usize {
        self.embed_dim.0
    }

    pub fn n_dopant_types(&self) -> usize {
        self.n_dopant_types.0
    }

    pub fn conditioning(&self) -> &ResolvedConditioning {
        &self.conditioning.0
    }

    /// Pooled representation `[num_graphs, D]`.
    pub fn forward(&self, inputs: &HeteroInputs<B>) -> Result<Tensor<B, 2>> {
        let nodes = self.node_features(inputs)?;
        Ok(self
            .aggregation
            .0
            .pool(nodes.dopant, inputs.dopant_batch.clone(), inputs.num_graphs))
    }

    /// Dopant, interaction and intraaction features after message passing.
    pub fn node_features(&self, inputs: &HeteroInputs<B>) -> Result<NodeFeatures<B>> {
        inputs.validate(self.n_dopant_types())?;
        let geometry = ShellGeometry::new(inputs, self.conditioning.0.volume_scale);

        let mut state = NodeFeatures {
            dopant: self.dopant_features(inputs, &geometry),
            interaction: self.pair_features(&self.interaction, &inputs.interaction, inputs, &geometry)?,
            intraaction: self.pair_features(&self.intraaction, &inputs.intraaction, inputs, &geometry)?,
        };
        for round in &self.rounds {
            state = round.apply(state, &inputs.edges);
        }
        Ok(state)
    }

    fn dopant_features(&self, inputs: &HeteroInputs<B>, geometry: &ShellGeometry<B>) -> Tensor<B, 2> {
        let n = inputs.n_dopants();
        let cond = &self.conditioning.0;

        let x = embed(&self.dopant_embedder, inputs.dopant_types.clone(), n);
        let x = self
            .dopant_film
            .forward(x, cond.dopant_concentration(inputs.dopant_concs.clone()));

        let shells = inputs.dopant_constraint_indices.clone();
        let mut context = vec![geometry.bounds(shells.clone())];
        if cond.use_volume_in_geometry {
            context.push(geometry.volume(shells));
        }
        let x = self.dopant_constraint_film.forward(x, Tensor::cat(context, 1));
        normalize(&self.dopant_norm, x)
    }

    fn pair_features(
        &self,
        branch: &PairBranch<B>,
        pairs: &PairInputs<B>,
        inputs: &HeteroInputs<B>,
        geometry: &ShellGeometry<B>,
    ) -> Result<Tensor<B, 2>> {
        let e = pairs.len();
        if e == 0 {
            return Ok(Tensor::zeros([0, self.embed_dim()], &inputs.radii.device()));
        }
        let cond = &self.conditioning.0;
        let x = branch.embedder.forward(pairs);

        let (a, b) = (
            index_column(pairs.dopant_indices.clone(), 0),
            index_column(pairs.dopant_indices.clone(), 1),
        );
        let shell_a = inputs.dopant_constraint_indices.clone().select(0, a.clone());
        let shell_b = inputs.dopant_constraint_indices.clone().select(0, b.clone());
        let bounds_a = geometry.bounds(shell_a.clone());
        let bounds_b = geometry.bounds(shell_b.clone());
        let flat = |t: Tensor<B, 2>| t.reshape([e]);
        let integral = self.integrator.0.integrate(
            flat(column(bounds_a.clone(), 0)),
            flat(column(bounds_a, 1)),
            flat(column(bounds_b.clone(), 0)),
            flat(column(bounds_b, 1)),
        )?;

        let c_a = inputs.dopant_concs.clone().select(0, a);
        let c_b = inputs.dopant_concs.clone().select(0, b);
        let mut context = cond.factor.apply(c_a, c_b, integral);
        if cond.normalize_by_volume {
            let width = cond.interaction_width;
            let volumes = (geometry.volume(shell_a) * geometry.volume(shell_b)).clamp_min(1e-12);
            context = context / volumes.repeat_dim(1, width);
        }
        let context = normalize(&branch.norm, context);
        Ok(branch.film.forward(x, context))
    }
}

/// Shell radii and volumes gathered once per forward pass.
struct ShellGeometry<B: Backend> {
    /// `[S, 2]`
    bounds: Tensor<B, 2>,
    /// `[S, 1]`
    volumes: Tensor<B, 2>,
}

impl<B: Backend> ShellGeometry<B> {
    fn new(inputs: &HeteroInputs<B>, volume_scale: f32) -> Self {
        let s = inputs.n_shells();
        let device = inputs.radii.device();
        if s == 0 {
            return Self {
                bounds: Tensor::zeros([0, 2], &device),
                volumes: Tensor::zeros([0, 1], &device),
            };
        }
        let bounds = inputs
            .radii
            .clone()
            .select(0, inputs.constraint_radii_idx.clone().reshape([s * 2]))
            .reshape([s, 2]);
        let cube = |r: Tensor<B, 2>| r.clone() * r.clone() * r;
        let volumes = (cube(column(bounds.clone(), 1)) - cube(column(bounds.clone(), 0)))
            * (4.0 / 3.0 * PI * volume_scale);
        Self { bounds, volumes }
    }

    fn bounds(&self, shells: Tensor<B, 1, Int>) -> Tensor<B, 2> {
        gather_rows(self.bounds.clone(), shells)
    }

    fn volume(&self, shells: Tensor<B, 1, Int>) -> Tensor<B, 2> {
        gather_rows(self.volumes.clone(), shells)
    }
}

fn gather_rows<B: Backend>(table: Tensor<B, 2>, index: Tensor<B, 1, Int>) -> Tensor<B, 2> {
    let [n] = index.dims();
    if n == 0 {
        return Tensor::zeros([0, table.dims()[1]], &table.device());
    }
    table.select(0, index)
}

fn embed<B: Backend>(table: &Embedding<B>, index: Tensor<B, 1, Int>, n: usize) -> Tensor<B, 2> {
    let [_, d] = table.weight.val().dims();
    if n == 0 {
        return Tensor::zeros([0, d], &index.device());
    }
    table.forward(index.reshape([n, 1])).reshape([n, d])
}

/// Batch norm, skipped for empty inputs so running statistics stay untouched.
fn normalize<B: Backend>(norm: &BatchNorm<B, 0>, x: Tensor<B, 2>) -> Tensor<B, 2> {
    if x.dims()[0] == 0 {
        return x;
    }
    norm.forward(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::to_vec;
    use burn::backend::NdArray;
    use nanospec_core::{DopantSpec, GraphBuilder, NanoparticleDescription};

    type B = NdArray<f32>;

    fn inputs(np: &NanoparticleDescription) -> HeteroInputs<B> {
        let graph = GraphBuilder::default().build(np).unwrap();
        HeteroInputs::from_graph(&graph, 3, &Default::default()).unwrap()
    }

    fn two_shell() -> NanoparticleDescription {
        NanoparticleDescription::from_radii(
            &[10.0, 20.0],
            vec![
                DopantSpec::new(0, 0.02, "Yb"),
                DopantSpec::new(0, 0.01, "Er"),
                DopantSpec::new(1, 0.05, "Yb"),
            ],
        )
    }

    #[test]
    fn test_shell_volumes() {
        let geometry = ShellGeometry::new(&inputs(&two_shell()), 1.0);
        let v = to_vec(geometry.volumes);
        let expected = [4.0 / 3.0 * PI * 1000.0, 4.0 / 3.0 * PI * (8000.0 - 1000.0)];
        for (g, e) in v.iter().zip(&expected) {
            assert!((g - e).abs() / e < 1e-5);
        }
    }

    #[test]
    fn test_forward_shapes_all_flags() {
        let device = Default::default();
        let config = RepresentationConfig::default()
            .with_embed_dim(8)
            .with_inverse_concentration(true)
            .with_volume_in_dopant_constraint(true)
            .with_interaction_volume_normalization(true)
            .with_interaction_embedding(true);
        let model = HeteroDcvRepresentation::<B>::new(&config, &device).unwrap();
        let nodes = model.node_features(&inputs(&two_shell())).unwrap();
        assert_eq!(nodes.dopant.dims(), [3, 8]);
        assert_eq!(nodes.interaction.dims(), [2, 8]);
        assert_eq!(nodes.intraaction.dims(), [1, 8]);
        let pooled = model.forward(&inputs(&two_shell())).unwrap();
        assert_eq!(pooled.dims(), [1, 8]);
        assert!(to_vec(pooled).iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_pair_embedder_variant_follows_flag() {
        let device = Default::default();
        let inputs = inputs(&two_shell());
        for (use_table, rows) in [(true, 2), (false, 2)] {
            let embedder = PairEmbedder::<B>::new(3, 4, use_table, &device);
            assert_eq!(matches!(embedder, PairEmbedder::Table(_)), use_table);
            assert_eq!(embedder.forward(&inputs.interaction).dims(), [rows, 4]);
        }
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = RepresentationConfig::default().with_embed_dim(0);
        assert!(HeteroDcvRepresentation::<B>::new(&config, &Default::default()).is_err());
    }
}
