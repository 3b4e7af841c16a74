//! Heterogeneous message passing.
//!
//! ```text
//!            dopant ──► interaction ──► dopant
//!            dopant ──► intraaction ──► dopant
//!
//! round r:  for each Relation: msg = GATv2_r,rel(x_src, x_dst, edges)
//!           x'_t = SiLU( Σ_{rel: target(rel) = t} msg )
//! ```
//!
//! Rounds are typed stage objects applied in order.

use burn::module::Module;
use burn::tensor::activation::silu;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use nanospec_core::{NodeType, Relation};

use crate::gat::GatV2Conv;
use crate::inputs::RelationEdges;

/// Features of every node population.
#[derive(Debug, Clone)]
pub struct NodeFeatures<B: Backend> {
    pub dopant: Tensor<B, 2>,
    pub interaction: Tensor<B, 2>,
    pub intraaction: Tensor<B, 2>,
}

impl<B: Backend> NodeFeatures<B> {
    /// Features of one node population.
    pub fn get(&self, node_type: NodeType) -> &Tensor<B, 2> {
        match node_type {
            NodeType::Dopant => &self.dopant,
            NodeType::Interaction => &self.interaction,
            NodeType::Intraaction => &self.intraaction,
        }
    }

    pub fn get_mut(&mut self, node_type: NodeType) -> &mut Tensor<B, 2> {
        match node_type {
            NodeType::Dopant => &mut self.dopant,
            NodeType::Interaction => &mut self.interaction,
            NodeType::Intraaction => &mut self.intraaction,
        }
    }

    fn zeros_like(&self, dim: usize) -> Self {
        let device = self.dopant.device();
        let zeros = |t: &Tensor<B, 2>| Tensor::zeros([t.dims()[0], dim], &device);
        Self {
            dopant: zeros(&self.dopant),
            interaction: zeros(&self.interaction),
            intraaction: zeros(&self.intraaction),
        }
    }

    fn map(self, f: impl Fn(Tensor<B, 2>) -> Tensor<B, 2>) -> Self {
        Self {
            dopant: f(self.dopant),
            interaction: f(self.interaction),
            intraaction: f(self.intraaction),
        }
    }
}

/// One step of message passing over all node populations.
pub trait MessagePassingStage<B: Backend> {
    /// Consume the current features and return the updated ones. Shapes are
    /// preserved for every population.
    fn apply(&self, state: NodeFeatures<B>, edges: &RelationEdges<B>) -> NodeFeatures<B>;
}

/// One independent attention convolution per relation.
#[derive(Module, Debug)]
pub struct RelationConvs<B: Backend> {
    dopant_to_interaction: GatV2Conv<B>,
    interaction_to_dopant: GatV2Conv<B>,
    dopant_to_intraaction: GatV2Conv<B>,
    intraaction_to_dopant: GatV2Conv<B>,
}

impl<B: Backend> RelationConvs<B> {
    /// Four independent `dim → dim` convolutions.
    pub fn new(dim: usize, heads: usize, negative_slope: f64, device: &B::Device) -> Self {
        let conv = || GatV2Conv::new(dim, dim, heads, negative_slope, device);
        Self {
            dopant_to_interaction: conv(),
            interaction_to_dopant: conv(),
            dopant_to_intraaction: conv(),
            intraaction_to_dopant: conv(),
        }
    }

    pub fn get(&self, relation: Relation) -> &GatV2Conv<B> {
        match relation {
            Relation::DopantToInteraction => &self.dopant_to_interaction,
            Relation::InteractionToDopant => &self.interaction_to_dopant,
            Relation::DopantToIntraaction => &self.dopant_to_intraaction,
            Relation::IntraactionToDopant => &self.intraaction_to_dopant,
        }
    }
}

/// One round: a convolution per relation, messages summed per target type,
/// then SiLU.
#[derive(Module, Debug)]
pub struct HeteroConvRound<B: Backend> {
    convs: RelationConvs<B>,
}

impl<B: Backend> HeteroConvRound<B> {
    /// Create a round over `dim`-wide features.
    ///
    /// # Arguments
    ///
    /// * `dim` - feature width of every node population, kept by the round
    /// * `heads` - attention heads per convolution
    /// * `negative_slope` - LeakyReLU slope in the attention scores
    /// * `device` - device for the parameters
    pub fn new(dim: usize, heads: usize, negative_slope: f64, device: &B::Device) -> Self {
        Self {
            convs: RelationConvs::new(dim, heads, negative_slope, device),
        }
    }

    pub fn convs(&self) -> &RelationConvs<B> {
        &self.convs
    }

    /// Per-relation outputs summed per target type, before the activation.
    pub fn messages(&self, state: &NodeFeatures<B>, edges: &RelationEdges<B>) -> NodeFeatures<B> {
        let dim = state.dopant.dims()[1];
        let mut out = state.zeros_like(dim);
        for relation in Relation::ALL {
            let msg = self.convs.get(relation).forward(
                state.get(relation.source()).clone(),
                state.get(relation.target()).clone(),
                edges.get(relation),
            );
            let acc = out.get_mut(relation.target());
            *acc = acc.clone() + msg;
        }
        out
    }
}

impl<B: Backend> MessagePassingStage<B> for HeteroConvRound<B> {
    fn apply(&self, state: NodeFeatures<B>, edges: &RelationEdges<B>) -> NodeFeatures<B> {
        self.messages(&state, edges).map(silu)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inputs::HeteroInputs;
    use crate::ops::to_vec;
    use burn::backend::NdArray;
    use nanospec_core::{DopantSpec, GraphBuilder, NanoparticleDescription};

    type B = NdArray<f32>;

    fn state(inputs: &HeteroInputs<B>, dim: usize) -> NodeFeatures<B> {
        let device = Default::default();
        let init = |n: usize| Tensor::<B, 2>::random([n, dim], burn::tensor::Distribution::Default, &device);
        NodeFeatures {
            dopant: init(inputs.n_dopants()),
            interaction: init(inputs.interaction.len()),
            intraaction: init(inputs.intraaction.len()),
        }
    }

    #[test]
    fn test_round_preserves_shapes() {
        let device = Default::default();
        let np = NanoparticleDescription::from_radii(
            &[10.0, 20.0],
            vec![
                DopantSpec::new(0, 0.02, "Yb"),
                DopantSpec::new(0, 0.01, "Er"),
                DopantSpec::new(1, 0.05, "Yb"),
            ],
        );
        let graph = GraphBuilder::default().build(&np).unwrap();
        let inputs = HeteroInputs::<B>::from_graph(&graph, 3, &device).unwrap();
        let round = HeteroConvRound::<B>::new(8, 1, 0.2, &device);
        let out = round.apply(state(&inputs, 8), &inputs.edges);
        assert_eq!(out.dopant.dims(), [3, 8]);
        assert_eq!(out.interaction.dims(), [2, 8]);
        assert_eq!(out.intraaction.dims(), [1, 8]);
    }

    #[test]
    fn test_relation_without_edges_contributes_zero() {
        // one dopant per shell: no intraaction nodes, so both intraaction
        // relations are empty
        let device = Default::default();
        let np = NanoparticleDescription::from_radii(
            &[5.0, 9.0],
            vec![DopantSpec::new(0, 0.2, "Yb"), DopantSpec::new(1, 0.1, "Er")],
        );
        let graph = GraphBuilder::default().build(&np).unwrap();
        let inputs = HeteroInputs::<B>::from_graph(&graph, 3, &device).unwrap();
        let round = HeteroConvRound::<B>::new(4, 2, 0.2, &device);
        let s = state(&inputs, 4);

        let total = round.messages(&s, &inputs.edges).dopant;
        let only_interaction = round.convs().get(Relation::InteractionToDopant).forward(
            s.interaction.clone(),
            s.dopant.clone(),
            inputs.edges.get(Relation::InteractionToDopant),
        );
        let from_intra = round.convs().get(Relation::IntraactionToDopant).forward(
            s.intraaction.clone(),
            s.dopant.clone(),
            inputs.edges.get(Relation::IntraactionToDopant),
        );
        assert!(to_vec(from_intra).iter().all(|&v| v == 0.0));
        assert_eq!(to_vec(total), to_vec(only_interaction));
        assert_eq!(s.intraaction.dims(), [0, 4]);
    }
}
