//! Device-side input tensors for the representation module.
//!
//! ```text
//! HeteroBatch (host, validated) ──► HeteroInputs (device tensors)
//!   dopant_types [Nd]      dopant_concs [Nd]     dopant_constraint_indices [Nd]
//!   interaction / intraaction: types [E], type_pairs [E,2], dopant_indices [E,2]
//!   edges: one EdgeIndex per Relation
//!   radii [R]  constraint_radii_idx [S,2]  dopant_batch [Nd]  num_graphs
//! ```
//!
//! Every edge set keeps a host copy of its target indices; the attention
//! softmax uses it to compute per-target maxima without a scatter-max kernel.

use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor};
use nanospec_core::{
    EdgeList, HeteroBatch, HeteroGraph, NanoSpecError, NodeType, PairNodes, Relation, Result,
};

use crate::ops::{float_tensor, index_range, index_tensor, index_to_vec, pair_index_tensor};

/// Source/target indices of one relation.
#[derive(Debug, Clone)]
pub struct EdgeIndex<B: Backend> {
    pub src: Tensor<B, 1, Int>,
    pub dst: Tensor<B, 1, Int>,
    dst_host: Vec<usize>,
}

impl<B: Backend> EdgeIndex<B> {
    /// Upload a host edge list.
    pub fn from_list(edges: &EdgeList, device: &B::Device) -> Self {
        Self {
            src: index_tensor(&edges.src, device),
            dst: index_tensor(&edges.dst, device),
            dst_host: edges.dst.clone(),
        }
    }

    /// Wrap tensors produced elsewhere; reads `dst` back to the host.
    pub fn from_tensors(src: Tensor<B, 1, Int>, dst: Tensor<B, 1, Int>) -> Result<Self> {
        let ([ns], [nd]) = (src.dims(), dst.dims());
        if ns != nd {
            return Err(NanoSpecError::shape("edge dst", format!("[{ns}]"), format!("[{nd}]")));
        }
        let host = index_to_vec(dst.clone());
        if let Some(&bad) = host.iter().find(|&&v| v < 0) {
            return Err(NanoSpecError::shape("edge dst", "indices >= 0", format!("index {bad}")));
        }
        let dst_host = host.into_iter().map(|v| v as usize).collect();
        Ok(Self { src, dst, dst_host })
    }

    pub fn len(&self) -> usize {
        self.dst_host.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dst_host.is_empty()
    }

    /// Host copy of the target indices.
    pub fn dst_host(&self) -> &[usize] {
        &self.dst_host
    }

    fn validate(&self, relation: Relation, n_src: usize, n_dst: usize) -> Result<()> {
        let name = relation.name();
        let e = self.len();
        check_dims(&format!("{name} src"), &self.src.dims(), &[e])?;
        check_dims(&format!("{name} dst"), &self.dst.dims(), &[e])?;
        check_range(&format!("{name} src"), &self.src, n_src)?;
        if let Some(&bad) = self.dst_host.iter().find(|&&v| v >= n_dst) {
            return Err(NanoSpecError::shape(
                format!("{name} dst"),
                format!("indices < {n_dst}"),
                format!("index {bad}"),
            ));
        }
        Ok(())
    }
}

/// One pair-node population (interaction or intraaction).
#[derive(Debug, Clone)]
pub struct PairInputs<B: Backend> {
    /// `[E]`, categorical pair type `t_i * V + t_j`.
    pub types: Tensor<B, 1, Int>,
    /// `[E, 2]`, the two dopant types.
    pub type_pairs: Tensor<B, 2, Int>,
    /// `[E, 2]`, the two dopant node indices.
    pub dopant_indices: Tensor<B, 2, Int>,
}

impl<B: Backend> PairInputs<B> {
    /// Upload one pair-node population.
    pub fn from_nodes(pairs: &PairNodes, device: &B::Device) -> Self {
        Self {
            types: index_tensor(&pairs.types, device),
            type_pairs: pair_index_tensor(&pairs.type_pairs, device),
            dopant_indices: pair_index_tensor(&pairs.dopant_indices, device),
        }
    }

    pub fn len(&self) -> usize {
        self.types.dims()[0]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn validate(&self, name: &str, n_dopants: usize, n_dopant_types: usize) -> Result<()> {
        let e = self.len();
        check_dims(&format!("{name}_type_indices"), &self.type_pairs.dims(), &[e, 2])?;
        check_dims(&format!("{name}_dopant_indices"), &self.dopant_indices.dims(), &[e, 2])?;
        check_range(&format!("{name}_types"), &self.types, n_dopant_types * n_dopant_types)?;
        check_range(&format!("{name}_type_indices"), &self.type_pairs, n_dopant_types)?;
        check_range(&format!("{name}_dopant_indices"), &self.dopant_indices, n_dopants)
    }
}

/// Struct-of-arrays over [`Relation`].
#[derive(Debug, Clone)]
pub struct RelationEdges<B: Backend> {
    pub dopant_to_interaction: EdgeIndex<B>,
    pub interaction_to_dopant: EdgeIndex<B>,
    pub dopant_to_intraaction: EdgeIndex<B>,
    pub intraaction_to_dopant: EdgeIndex<B>,
}

impl<B: Backend> RelationEdges<B> {
    pub fn get(&self, relation: Relation) -> &EdgeIndex<B> {
        match relation {
            Relation::DopantToInteraction => &self.dopant_to_interaction,
            Relation::InteractionToDopant => &self.interaction_to_dopant,
            Relation::DopantToIntraaction => &self.dopant_to_intraaction,
            Relation::IntraactionToDopant => &self.intraaction_to_dopant,
        }
    }
}

/// Every tensor the representation module reads, for one batch of graphs.
#[derive(Debug, Clone)]
pub struct HeteroInputs<B: Backend> {
    /// `[Nd]`, vocabulary index of each dopant.
    pub dopant_types: Tensor<B, 1, Int>,
    /// `[Nd]`, fractional concentration of each dopant.
    pub dopant_concs: Tensor<B, 1>,
    /// `[Nd]`, shell index of each dopant.
    pub dopant_constraint_indices: Tensor<B, 1, Int>,
    /// Pairs of dopants in different shells.
    pub interaction: PairInputs<B>,
    /// Pairs of dopants in the same shell.
    pub intraaction: PairInputs<B>,
    pub edges: RelationEdges<B>,
    /// `[R]`, radii of all graphs, each graph starting with its origin `0`.
    pub radii: Tensor<B, 1>,
    /// `[S, 2]`, indices into `radii` of each shell's inner and outer radius.
    pub constraint_radii_idx: Tensor<B, 2, Int>,
    /// `[Nd]`, graph index of each dopant.
    pub dopant_batch: Tensor<B, 1, Int>,
    pub num_graphs: usize,
}

impl<B: Backend> HeteroInputs<B> {
    /// Validate `batch` on the host and upload it.
    ///
    /// # Arguments
    ///
    /// * `batch` - collated graphs
    /// * `n_dopant_types` - vocabulary size `V`; bounds dopant types and the
    ///   `V²` pair types
    /// * `device` - target device
    ///
    /// # Errors
    ///
    /// [`NanoSpecError::ShapeMismatch`] naming the first inconsistent array.
    pub fn from_batch(batch: &HeteroBatch, n_dopant_types: usize, device: &B::Device) -> Result<Self> {
        batch.validate(n_dopant_types)?;
        let graph = &batch.graph;
        if graph.shell_bounds().iter().any(|[i, o]| o - i <= crate::integrator::MIN_SHELL_WIDTH) {
            log::debug!("batch contains zero-width shells; their radial overlap is zero");
        }

        let edges = RelationEdges {
            dopant_to_interaction: EdgeIndex::from_list(&graph.edges.dopant_to_interaction, device),
            interaction_to_dopant: EdgeIndex::from_list(&graph.edges.interaction_to_dopant, device),
            dopant_to_intraaction: EdgeIndex::from_list(&graph.edges.dopant_to_intraaction, device),
            intraaction_to_dopant: EdgeIndex::from_list(&graph.edges.intraaction_to_dopant, device),
        };
        Ok(Self {
            dopant_types: index_tensor(&graph.dopant_types, device),
            dopant_concs: float_tensor(graph.dopant_concs.clone(), [graph.n_dopants()], device),
            dopant_constraint_indices: index_tensor(&graph.dopant_constraint_indices, device),
            interaction: PairInputs::from_nodes(&graph.interaction, device),
            intraaction: PairInputs::from_nodes(&graph.intraaction, device),
            edges,
            radii: float_tensor(graph.radii.clone(), [graph.radii.len()], device),
            constraint_radii_idx: pair_index_tensor(&graph.constraint_radii_idx, device),
            dopant_batch: index_tensor(&batch.dopant_batch, device),
            num_graphs: batch.num_graphs,
        })
    }

    /// Single-graph batch, see [`from_batch`](Self::from_batch).
    pub fn from_graph(graph: &HeteroGraph, n_dopant_types: usize, device: &B::Device) -> Result<Self> {
        Self::from_batch(&HeteroBatch::single(graph.clone()), n_dopant_types, device)
    }

    pub fn n_dopants(&self) -> usize {
        self.dopant_types.dims()[0]
    }

    pub fn n_shells(&self) -> usize {
        self.constraint_radii_idx.dims()[0]
    }

    /// Pair-node inputs of `node_type`; `None` for dopants.
    pub fn pairs(&self, node_type: NodeType) -> Option<&PairInputs<B>> {
        match node_type {
            NodeType::Dopant => None,
            NodeType::Interaction => Some(&self.interaction),
            NodeType::Intraaction => Some(&self.intraaction),
        }
    }

    pub fn n_nodes(&self, node_type: NodeType) -> usize {
        self.pairs(node_type).map_or_else(|| self.n_dopants(), PairInputs::len)
    }

    /// Check every tensor against its declared role.
    ///
    /// Checks ranks and leading dimensions, then index bounds against the
    /// node counts they reference. Reads index ranges back from the device.
    pub fn validate(&self, n_dopant_types: usize) -> Result<()> {
        let nd = self.n_dopants();
        let ns = self.n_shells();
        check_dims("dopant_concs", &self.dopant_concs.dims(), &[nd])?;
        check_dims(
            "dopant_constraint_indices",
            &self.dopant_constraint_indices.dims(),
            &[nd],
        )?;
        check_dims("dopant_batch", &self.dopant_batch.dims(), &[nd])?;
        check_dims("constraint_radii_idx", &self.constraint_radii_idx.dims(), &[ns, 2])?;

        check_range("dopant_types", &self.dopant_types, n_dopant_types)?;
        check_range("dopant_constraint_indices", &self.dopant_constraint_indices, ns)?;
        check_range("constraint_radii_idx", &self.constraint_radii_idx, self.radii.dims()[0])?;
        check_range("dopant_batch", &self.dopant_batch, self.num_graphs)?;

        self.interaction.validate("interaction", nd, n_dopant_types)?;
        self.intraaction.validate("intraaction", nd, n_dopant_types)?;
        for relation in Relation::ALL {
            self.edges.get(relation).validate(
                relation,
                self.n_nodes(relation.source()),
                self.n_nodes(relation.target()),
            )?;
        }
        Ok(())
    }
}

fn check_dims(tensor: &str, actual: &[usize], expected: &[usize]) -> Result<()> {
    if actual != expected {
        return Err(NanoSpecError::shape(
            tensor,
            format!("{expected:?}"),
            format!("{actual:?}"),
        ));
    }
    Ok(())
}

fn check_range<B: Backend, const D: usize>(
    tensor: &str,
    values: &Tensor<B, D, Int>,
    bound: usize,
) -> Result<()> {
    match index_range(values) {
        Some((min, max)) if min < 0 || max >= bound as i64 => Err(NanoSpecError::shape(
            tensor,
            format!("indices in [0, {bound})"),
            format!("range [{min}, {max}]"),
        )),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::to_vec;
    use burn::backend::NdArray;
    use nanospec_core::{DopantSpec, GraphBuilder, NanoparticleDescription};

    type B = NdArray<f32>;

    fn two_shell() -> HeteroGraph {
        let np = NanoparticleDescription::from_radii(
            &[10.0, 20.0],
            vec![
                DopantSpec::new(0, 0.02, "Yb"),
                DopantSpec::new(0, 0.01, "Er"),
                DopantSpec::new(1, 0.05, "Yb"),
            ],
        );
        GraphBuilder::default().build(&np).unwrap()
    }

    #[test]
    fn test_from_graph() {
        let device = Default::default();
        let inputs = HeteroInputs::<B>::from_graph(&two_shell(), 3, &device).unwrap();
        inputs.validate(3).unwrap();
        assert_eq!(inputs.n_dopants(), 3);
        assert_eq!(inputs.n_nodes(NodeType::Interaction), 2);
        assert_eq!(inputs.n_nodes(NodeType::Intraaction), 1);
        assert_eq!(inputs.edges.get(Relation::DopantToInteraction).len(), 4);
        assert_eq!(to_vec(inputs.radii.clone()), vec![0.0, 10.0, 20.0]);
        assert_eq!(inputs.num_graphs, 1);
    }

    #[test]
    fn test_validate_names_tensor() {
        let device = Default::default();
        let mut inputs = HeteroInputs::<B>::from_graph(&two_shell(), 3, &device).unwrap();
        inputs.dopant_concs = Tensor::zeros([2], &device);
        match inputs.validate(3) {
            Err(NanoSpecError::ShapeMismatch { tensor, .. }) => assert_eq!(tensor, "dopant_concs"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_validate_vocabulary_bound() {
        let device = Default::default();
        let inputs = HeteroInputs::<B>::from_graph(&two_shell(), 3, &device).unwrap();
        let err = inputs.validate(1).unwrap_err();
        assert!(err.to_string().contains("dopant_types"));
    }

    #[test]
    fn test_edge_index_from_tensors() {
        let device = Default::default();
        let edges = EdgeIndex::<B>::from_tensors(
            index_tensor(&[0, 1, 2], &device),
            index_tensor(&[1, 1, 0], &device),
        )
        .unwrap();
        assert_eq!(edges.dst_host(), &[1, 1, 0]);
        assert!(EdgeIndex::<B>::from_tensors(index_tensor(&[0], &device), index_tensor(&[], &device)).is_err());
    }
}
