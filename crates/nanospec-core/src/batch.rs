//! Collation of several nanoparticle graphs into one disconnected graph.

use crate::error::Result;
use crate::graph::HeteroGraph;
use crate::node::NodeType;

/// A batch of graphs merged into one [`HeteroGraph`] with index offsets,
/// plus the graph each node belongs to.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HeteroBatch {
    pub graph: HeteroGraph,
    pub dopant_batch: Vec<usize>,
    pub interaction_batch: Vec<usize>,
    pub intraaction_batch: Vec<usize>,
    pub num_graphs: usize,
}

impl HeteroBatch {
    /// Concatenate `graphs`, offsetting every index into the merged arrays.
    ///
    /// Graph `g` of the iterator gets batch index `g`.
    pub fn from_graphs<'a, I>(graphs: I) -> Self
    where
        I: IntoIterator<Item = &'a HeteroGraph>,
    {
        let mut batch = HeteroBatch::default();
        for (g, graph) in graphs.into_iter().enumerate() {
            batch.dopant_batch.extend(std::iter::repeat(g).take(graph.n_dopants()));
            batch
                .interaction_batch
                .extend(std::iter::repeat(g).take(graph.interaction.len()));
            batch
                .intraaction_batch
                .extend(std::iter::repeat(g).take(graph.intraaction.len()));
            batch.graph.append(graph);
            batch.num_graphs += 1;
        }
        batch
    }

    /// Wrap a single graph.
    pub fn single(graph: HeteroGraph) -> Self {
        Self {
            dopant_batch: vec![0; graph.n_dopants()],
            interaction_batch: vec![0; graph.interaction.len()],
            intraaction_batch: vec![0; graph.intraaction.len()],
            num_graphs: 1,
            graph,
        }
    }

    /// Graph index of every node of `node_type`.
    pub fn batch_index(&self, node_type: NodeType) -> &[usize] {
        match node_type {
            NodeType::Dopant => &self.dopant_batch,
            NodeType::Interaction => &self.interaction_batch,
            NodeType::Intraaction => &self.intraaction_batch,
        }
    }

    /// Number of dopant nodes per graph.
    pub fn dopant_counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.num_graphs];
        for &g in &self.dopant_batch {
            counts[g] += 1;
        }
        counts
    }

    /// Validate the merged graph, then every batch index against `num_graphs`.
    ///
    /// # Errors
    ///
    /// [`NanoSpecError::ShapeMismatch`](crate::NanoSpecError::ShapeMismatch) naming the offending array.
    pub fn validate(&self, n_dopant_types: usize) -> Result<()> {
        self.graph.validate(n_dopant_types)?;
        for node_type in NodeType::ALL {
            let index = self.batch_index(node_type);
            let name = format!("{}_batch", node_type.name());
            if index.len() != self.graph.n_nodes(node_type) {
                return Err(crate::error::NanoSpecError::shape(
                    name,
                    format!("leading dimension {}", self.graph.n_nodes(node_type)),
                    format!("leading dimension {}", index.len()),
                ));
            }
            if let Some(&g) = index.iter().find(|&&g| g >= self.num_graphs) {
                return Err(crate::error::NanoSpecError::shape(
                    name,
                    format!("graph ids < {}", self.num_graphs),
                    format!("graph id {}", g),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphBuilder;
    use crate::nanoparticle::{DopantSpec, NanoparticleDescription};

    fn graphs() -> Vec<HeteroGraph> {
        let builder = GraphBuilder::default();
        let a = NanoparticleDescription::from_radii(
            &[10.0, 20.0],
            vec![
                DopantSpec::new(0, 0.02, "Yb"),
                DopantSpec::new(0, 0.01, "Er"),
                DopantSpec::new(1, 0.05, "Yb"),
            ],
        );
        let b = NanoparticleDescription::from_radii(
            &[5.0, 8.0, 12.0],
            vec![DopantSpec::new(0, 0.3, "Nd"), DopantSpec::new(2, 0.1, "Er")],
        );
        vec![builder.build(&a).unwrap(), builder.build(&b).unwrap()]
    }

    #[test]
    fn test_collate_offsets() {
        let gs = graphs();
        let batch = HeteroBatch::from_graphs(&gs);
        batch.validate(3).unwrap();

        assert_eq!(batch.num_graphs, 2);
        assert_eq!(batch.dopant_batch, vec![0, 0, 0, 1, 1]);
        assert_eq!(batch.interaction_batch, vec![0, 0, 1]);
        assert_eq!(batch.intraaction_batch, vec![0]);
        assert_eq!(batch.graph.interaction.dopant_indices[2], [3, 4]);
        assert_eq!(batch.graph.dopant_constraint_indices, vec![0, 0, 1, 2, 4]);
        assert_eq!(batch.graph.radii.len(), 3 + 4);
        assert_eq!(batch.graph.constraint_radii_idx[2], [3, 4]);
        assert_eq!(batch.graph.edges.interaction_to_dopant.dst[4..], [3, 4]);
        assert_eq!(batch.dopant_counts(), vec![3, 2]);
    }

    #[test]
    fn test_shell_bounds_survive_collation() {
        let gs = graphs();
        let batch = HeteroBatch::from_graphs(&gs);
        let bounds = batch.graph.shell_bounds();
        assert_eq!(bounds[0], [0.0, 10.0]);
        assert_eq!(bounds[2], [0.0, 5.0]);
        assert_eq!(bounds[4], [8.0, 12.0]);
    }
}
