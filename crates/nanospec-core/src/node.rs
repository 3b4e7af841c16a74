//! Node-type and relation tags for the heterogeneous nanoparticle graph.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{NanoSpecError, Result};

/// The three node populations of a nanoparticle graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    /// One per (shell, dopant element) with nonzero concentration.
    Dopant,
    /// Coupling between two dopants in different shells.
    Interaction,
    /// Coupling between two dopants in the same shell.
    Intraaction,
}

impl NodeType {
    pub const ALL: [NodeType; 3] = [NodeType::Dopant, NodeType::Interaction, NodeType::Intraaction];

    pub const fn name(self) -> &'static str {
        match self {
            NodeType::Dopant => "dopant",
            NodeType::Interaction => "interaction",
            NodeType::Intraaction => "intraaction",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The four directed relations messages travel along.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
    DopantToInteraction,
    InteractionToDopant,
    DopantToIntraaction,
    IntraactionToDopant,
}

impl Relation {
    pub const ALL: [Relation; 4] = [
        Relation::DopantToInteraction,
        Relation::InteractionToDopant,
        Relation::DopantToIntraaction,
        Relation::IntraactionToDopant,
    ];

    pub const fn source(self) -> NodeType {
        match self {
            Relation::DopantToInteraction | Relation::DopantToIntraaction => NodeType::Dopant,
            Relation::InteractionToDopant => NodeType::Interaction,
            Relation::IntraactionToDopant => NodeType::Intraaction,
        }
    }

    pub const fn target(self) -> NodeType {
        match self {
            Relation::InteractionToDopant | Relation::IntraactionToDopant => NodeType::Dopant,
            Relation::DopantToInteraction => NodeType::Interaction,
            Relation::DopantToIntraaction => NodeType::Intraaction,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Relation::DopantToInteraction => "dopant->interaction",
            Relation::InteractionToDopant => "interaction->dopant",
            Relation::DopantToIntraaction => "dopant->intraaction",
            Relation::IntraactionToDopant => "intraaction->dopant",
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Ordered list of dopant element symbols. The position of a symbol is its
/// categorical type index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DopantVocabulary {
    elements: Vec<String>,
}

impl Default for DopantVocabulary {
    fn default() -> Self {
        Self::new(["Yb", "Er", "Nd"])
    }
}

impl DopantVocabulary {
    pub fn new<S: Into<String>>(elements: impl IntoIterator<Item = S>) -> Self {
        Self {
            elements: elements.into_iter().map(Into::into).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Number of ordered (type, type) pair categories.
    pub fn n_pair_types(&self) -> usize {
        self.elements.len() * self.elements.len()
    }

    /// # Errors
    ///
    /// [`NanoSpecError::InvalidComposition`](crate::NanoSpecError::InvalidComposition) if `symbol` is not in the vocabulary.
    pub fn index_of(&self, symbol: &str) -> Result<usize> {
        self.elements
            .iter()
            .position(|e| e == symbol)
            .ok_or_else(|| {
                NanoSpecError::InvalidComposition(format!(
                    "unknown dopant element `{}` (known: {})",
                    symbol,
                    self.elements.join(", ")
                ))
            })
    }

    pub fn symbol(&self, index: usize) -> Option<&str> {
        self.elements.get(index).map(String::as_str)
    }

    /// Pair category of two dopant types.
    pub fn pair_type(&self, a: usize, b: usize) -> usize {
        a * self.elements.len() + b
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.elements.iter().map(String::as_str)
    }
}
