//! Host-side heterogeneous graph of a nanoparticle.
//!
//! The graph has three node populations stored as struct-of-arrays:
//!
//! ```text
//!   dopant ──coupled_to──► interaction ──coupled_to──► dopant
//!   dopant ──coupled_to──► intraaction ──coupled_to──► dopant
//! ```
//!
//! - [`HeteroGraph`]: node attributes, radii and the four edge lists
//! - [`PairNodes`]: interaction or intraaction node attributes
//! - [`EdgeSets`]: one [`EdgeList`] per [`Relation`]
//! - [`GraphBuilder`]: builds a graph from a [`NanoparticleDescription`]

use crate::config::GraphBuilderConfig;
use crate::error::{NanoSpecError, Result};
use crate::nanoparticle::NanoparticleDescription;
use crate::node::{DopantVocabulary, NodeType, Relation};

/// Directed (source, target) pairs of one relation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EdgeList {
    pub src: Vec<usize>,
    pub dst: Vec<usize>,
}

impl EdgeList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, src: usize, dst: usize) {
        self.src.push(src);
        self.dst.push(dst);
    }

    pub fn len(&self) -> usize {
        self.src.len()
    }

    pub fn is_empty(&self) -> bool {
        self.src.is_empty()
    }

    /// `(src, dst)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.src.iter().copied().zip(self.dst.iter().copied())
    }

    /// Adjacency list keyed by target.
    pub fn incoming(&self, n_targets: usize) -> Vec<Vec<usize>> {
        let mut adj = vec![Vec::new(); n_targets];
        for (s, d) in self.iter() {
            adj[d].push(s);
        }
        adj
    }

    fn extend_offset(&mut self, other: &EdgeList, src_offset: usize, dst_offset: usize) {
        self.src.extend(other.src.iter().map(|s| s + src_offset));
        self.dst.extend(other.dst.iter().map(|d| d + dst_offset));
    }
}

/// Edge lists of all four relations.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EdgeSets {
    pub dopant_to_interaction: EdgeList,
    pub interaction_to_dopant: EdgeList,
    pub dopant_to_intraaction: EdgeList,
    pub intraaction_to_dopant: EdgeList,
}

impl EdgeSets {
    pub fn get(&self, relation: Relation) -> &EdgeList {
        match relation {
            Relation::DopantToInteraction => &self.dopant_to_interaction,
            Relation::InteractionToDopant => &self.interaction_to_dopant,
            Relation::DopantToIntraaction => &self.dopant_to_intraaction,
            Relation::IntraactionToDopant => &self.intraaction_to_dopant,
        }
    }

    pub fn get_mut(&mut self, relation: Relation) -> &mut EdgeList {
        match relation {
            Relation::DopantToInteraction => &mut self.dopant_to_interaction,
            Relation::InteractionToDopant => &mut self.interaction_to_dopant,
            Relation::DopantToIntraaction => &mut self.dopant_to_intraaction,
            Relation::IntraactionToDopant => &mut self.intraaction_to_dopant,
        }
    }

    pub fn n_edges(&self) -> usize {
        Relation::ALL.iter().map(|&r| self.get(r).len()).sum()
    }
}

/// Attributes of interaction or intraaction nodes.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PairNodes {
    /// Dopant types of the two constituents (two-hot pair).
    pub type_pairs: Vec<[usize; 2]>,
    /// Pair category `type_a * V + type_b`.
    pub types: Vec<usize>,
    /// Dopant node indices of the two constituents.
    pub dopant_indices: Vec<[usize; 2]>,
}

impl PairNodes {
    pub fn len(&self) -> usize {
        self.dopant_indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dopant_indices.is_empty()
    }

    fn push(&mut self, type_pair: [usize; 2], pair_type: usize, dopants: [usize; 2]) {
        self.type_pairs.push(type_pair);
        self.types.push(pair_type);
        self.dopant_indices.push(dopants);
    }

    fn extend_offset(&mut self, other: &PairNodes, dopant_offset: usize) {
        self.type_pairs.extend_from_slice(&other.type_pairs);
        self.types.extend_from_slice(&other.types);
        self.dopant_indices.extend(
            other
                .dopant_indices
                .iter()
                .map(|[a, b]| [a + dopant_offset, b + dopant_offset]),
        );
    }
}

/// Heterogeneous graph of one nanoparticle (or of a collated batch, see
/// [`crate::batch::HeteroBatch`]).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HeteroGraph {
    pub dopant_types: Vec<usize>,
    pub dopant_concs: Vec<f32>,
    /// Row of `constraint_radii_idx` (shell) each dopant lives in.
    pub dopant_constraint_indices: Vec<usize>,
    pub interaction: PairNodes,
    pub intraaction: PairNodes,
    pub edges: EdgeSets,
    /// Shell boundaries with a leading zero.
    pub radii: Vec<f32>,
    /// `[inner, outer]` indices into `radii` per shell.
    pub constraint_radii_idx: Vec<[usize; 2]>,
}

impl HeteroGraph {
    pub fn n_dopants(&self) -> usize {
        self.dopant_types.len()
    }

    pub fn n_shells(&self) -> usize {
        self.constraint_radii_idx.len()
    }

    pub fn n_nodes(&self, node_type: NodeType) -> usize {
        match node_type {
            NodeType::Dopant => self.dopant_types.len(),
            NodeType::Interaction => self.interaction.len(),
            NodeType::Intraaction => self.intraaction.len(),
        }
    }

    /// Pair-node population of `node_type`; `None` for dopants.
    pub fn pair_nodes(&self, node_type: NodeType) -> Option<&PairNodes> {
        match node_type {
            NodeType::Dopant => None,
            NodeType::Interaction => Some(&self.interaction),
            NodeType::Intraaction => Some(&self.intraaction),
        }
    }

    /// `[inner, outer]` radius of every shell.
    pub fn shell_bounds(&self) -> Vec<[f32; 2]> {
        self.constraint_radii_idx
            .iter()
            .map(|&[i, o]| [self.radii[i], self.radii[o]])
            .collect()
    }

    /// Volume of every shell, see [`shell_volume`](crate::nanoparticle::shell_volume).
    pub fn shell_volumes(&self) -> Vec<f32> {
        self.shell_bounds()
            .into_iter()
            .map(|[i, o]| crate::nanoparticle::shell_volume(i, o))
            .collect()
    }

    /// Append `other`, offsetting every index by the current node counts.
    pub(crate) fn append(&mut self, other: &HeteroGraph) {
        let dopant_offset = self.n_dopants();
        let interaction_offset = self.interaction.len();
        let intraaction_offset = self.intraaction.len();
        let shell_offset = self.n_shells();
        let radii_offset = self.radii.len();

        self.dopant_types.extend_from_slice(&other.dopant_types);
        self.dopant_concs.extend_from_slice(&other.dopant_concs);
        self.dopant_constraint_indices
            .extend(other.dopant_constraint_indices.iter().map(|c| c + shell_offset));
        self.interaction.extend_offset(&other.interaction, dopant_offset);
        self.intraaction.extend_offset(&other.intraaction, dopant_offset);

        for relation in Relation::ALL {
            let offset_of = |ty: NodeType| match ty {
                NodeType::Dopant => dopant_offset,
                NodeType::Interaction => interaction_offset,
                NodeType::Intraaction => intraaction_offset,
            };
            let (src_off, dst_off) = (offset_of(relation.source()), offset_of(relation.target()));
            self.edges
                .get_mut(relation)
                .extend_offset(other.edges.get(relation), src_off, dst_off);
        }

        self.radii.extend_from_slice(&other.radii);
        self.constraint_radii_idx.extend(
            other
                .constraint_radii_idx
                .iter()
                .map(|[i, o]| [i + radii_offset, o + radii_offset]),
        );
    }

    /// Check every array against its declared role.
    ///
    /// `n_dopant_types` bounds the categorical dopant type.
    pub fn validate(&self, n_dopant_types: usize) -> Result<()> {
        let n_dopants = self.n_dopants();
        let n_shells = self.n_shells();

        check_len("dopant_concs", self.dopant_concs.len(), n_dopants)?;
        check_len(
            "dopant_constraint_indices",
            self.dopant_constraint_indices.len(),
            n_dopants,
        )?;
        check_bound("dopant_types", &self.dopant_types, n_dopant_types)?;
        check_bound("dopant_constraint_indices", &self.dopant_constraint_indices, n_shells)?;

        let n_radii = self.radii.len();
        for (s, &[inner, outer]) in self.constraint_radii_idx.iter().enumerate() {
            if inner >= n_radii || outer >= n_radii {
                return Err(NanoSpecError::shape(
                    "constraint_radii_idx",
                    format!("indices < {}", n_radii),
                    format!("[{}, {}] at row {}", inner, outer, s),
                ));
            }
            let (ri, ro) = (self.radii[inner], self.radii[outer]);
            if !(ri >= 0.0 && ro >= ri) {
                return Err(NanoSpecError::InvalidGeometry(format!(
                    "shell {} has radii [{}, {}]; radii must be non-negative and non-decreasing",
                    s, ri, ro
                )));
            }
        }

        for &c in &self.dopant_concs {
            if !(0.0..=1.0).contains(&c) {
                return Err(NanoSpecError::InvalidComposition(format!(
                    "dopant concentration {} outside [0, 1]",
                    c
                )));
            }
        }

        self.validate_pairs(NodeType::Interaction, n_dopant_types)?;
        self.validate_pairs(NodeType::Intraaction, n_dopant_types)?;

        for relation in Relation::ALL {
            let edges = self.edges.get(relation);
            let name = relation.name();
            check_len(&format!("{} dst", name), edges.dst.len(), edges.src.len())?;
            check_bound(
                &format!("{} src", name),
                &edges.src,
                self.n_nodes(relation.source()),
            )?;
            check_bound(
                &format!("{} dst", name),
                &edges.dst,
                self.n_nodes(relation.target()),
            )?;
        }
        Ok(())
    }

    fn validate_pairs(&self, node_type: NodeType, n_dopant_types: usize) -> Result<()> {
        let Some(pairs) = self.pair_nodes(node_type) else {
            return Ok(());
        };
        let n = pairs.len();
        let name = node_type.name();
        check_len(&format!("{}_types", name), pairs.types.len(), n)?;
        check_len(&format!("{}_type_indices", name), pairs.type_pairs.len(), n)?;
        check_bound(
            &format!("{}_types", name),
            &pairs.types,
            n_dopant_types * n_dopant_types,
        )?;

        for (k, &[a, b]) in pairs.dopant_indices.iter().enumerate() {
            if a >= self.n_dopants() || b >= self.n_dopants() {
                return Err(NanoSpecError::shape(
                    format!("{}_dopant_indices", name),
                    format!("indices < {} (dopant count)", self.n_dopants()),
                    format!("[{}, {}] at row {}", a, b, k),
                ));
            }
            if a == b {
                return Err(NanoSpecError::shape(
                    format!("{}_dopant_indices", name),
                    "two distinct dopants",
                    format!("[{}, {}] at row {}", a, b, k),
                ));
            }
            let same_shell =
                self.dopant_constraint_indices[a] == self.dopant_constraint_indices[b];
            let expect_same = node_type == NodeType::Intraaction;
            if same_shell != expect_same {
                return Err(NanoSpecError::InvalidComposition(format!(
                    "{} node {} joins dopants {} and {} which are {} the same shell",
                    name,
                    k,
                    a,
                    b,
                    if same_shell { "in" } else { "not in" }
                )));
            }
        }
        for (k, pair) in pairs.type_pairs.iter().enumerate() {
            if pair.iter().any(|&t| t >= n_dopant_types) {
                return Err(NanoSpecError::shape(
                    format!("{}_type_indices", name),
                    format!("types < {}", n_dopant_types),
                    format!("{:?} at row {}", pair, k),
                ));
            }
        }
        Ok(())
    }
}

fn check_len(tensor: &str, actual: usize, expected: usize) -> Result<()> {
    if actual != expected {
        return Err(NanoSpecError::shape(
            tensor,
            format!("leading dimension {}", expected),
            format!("leading dimension {}", actual),
        ));
    }
    Ok(())
}

fn check_bound(tensor: &str, values: &[usize], bound: usize) -> Result<()> {
    if let Some((row, &v)) = values.iter().enumerate().find(|&(_, &v)| v >= bound) {
        return Err(NanoSpecError::shape(
            tensor,
            format!("indices < {}", bound),
            format!("index {} at row {}", v, row),
        ));
    }
    Ok(())
}

/// Builds [`HeteroGraph`]s from structural descriptions.
#[derive(Clone, Debug, Default)]
pub struct GraphBuilder {
    vocabulary: DopantVocabulary,
}

impl GraphBuilder {
    /// Builder over the configured element vocabulary.
    pub fn new(config: &GraphBuilderConfig) -> Self {
        Self {
            vocabulary: config.elements.clone(),
        }
    }

    pub fn with_vocabulary(vocabulary: DopantVocabulary) -> Self {
        Self { vocabulary }
    }

    pub fn vocabulary(&self) -> &DopantVocabulary {
        &self.vocabulary
    }

    /// Build the graph of one nanoparticle.
    ///
    /// Dopant nodes are ordered by shell, then by vocabulary position.
    /// Every unordered pair of dopant nodes becomes an interaction node
    /// (different shells) or an intraaction node (same shell); each pair
    /// node is linked to both of its dopants in both directions.
    pub fn build(&self, np: &NanoparticleDescription) -> Result<HeteroGraph> {
        np.validate()?;

        let n_shells = np.n_shells();
        let n_types = self.vocabulary.len();

        // (shell, type) -> concentration
        let mut grid: Vec<Option<f32>> = vec![None; n_shells * n_types];
        for d in &np.dopants {
            let ty = self.vocabulary.index_of(&d.element)?;
            let slot = &mut grid[d.shell * n_types + ty];
            if slot.is_some() {
                return Err(NanoSpecError::InvalidComposition(format!(
                    "dopant {} listed twice in shell {}",
                    d.element, d.shell
                )));
            }
            *slot = Some(d.concentration);
        }

        let mut graph = HeteroGraph {
            radii: np.radii_with_origin(),
            constraint_radii_idx: (0..n_shells).map(|s| [s, s + 1]).collect(),
            ..Default::default()
        };

        for (slot, conc) in grid.iter().enumerate() {
            if let Some(c) = conc.filter(|&c| c > 0.0) {
                graph.dopant_types.push(slot % n_types);
                graph.dopant_concs.push(c);
                graph.dopant_constraint_indices.push(slot / n_types);
            }
        }

        let n_dopants = graph.n_dopants();
        for i in 0..n_dopants {
            for j in (i + 1)..n_dopants {
                let (ti, tj) = (graph.dopant_types[i], graph.dopant_types[j]);
                let pair_type = self.vocabulary.pair_type(ti, tj);
                let same_shell =
                    graph.dopant_constraint_indices[i] == graph.dopant_constraint_indices[j];

                let (pairs, to_pair, from_pair) = if same_shell {
                    (
                        &mut graph.intraaction,
                        Relation::DopantToIntraaction,
                        Relation::IntraactionToDopant,
                    )
                } else {
                    (
                        &mut graph.interaction,
                        Relation::DopantToInteraction,
                        Relation::InteractionToDopant,
                    )
                };
                let k = pairs.len();
                pairs.push([ti, tj], pair_type, [i, j]);
                for dopant in [i, j] {
                    graph.edges.get_mut(to_pair).push(dopant, k);
                    graph.edges.get_mut(from_pair).push(k, dopant);
                }
            }
        }

        log::debug!(
            "built graph: {} shells, {} dopants, {} interaction, {} intraaction, {} edges",
            n_shells,
            n_dopants,
            graph.interaction.len(),
            graph.intraaction.len(),
            graph.edges.n_edges()
        );

        graph.validate(n_types)?;
        Ok(graph)
    }
}
