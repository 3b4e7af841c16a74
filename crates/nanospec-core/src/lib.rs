//! # nanospec-core
//!
//! Core types for predicting emission spectra of lanthanide-doped
//! core/shell nanoparticles with heterogeneous graph networks.
//!
//! - [`NanoparticleDescription`]: concentric shells plus dopant composition
//! - [`GraphBuilder`]: turns a description into a [`HeteroGraph`] with
//!   dopant, interaction and intraaction nodes and four relation edge sets
//! - [`HeteroBatch`]: several graphs collated with index offsets
//! - [`NodeType`] / [`Relation`]: closed tags for node populations and
//!   message directions
//! - [`NanoSpecConfig`]: TOML-backed configuration records
//! - [`NanoSpecError`]: error taxonomy shared by the workspace
//!
//! ```rust,ignore
//! use nanospec_core::{DopantSpec, GraphBuilder, NanoparticleDescription};
//!
//! let np = NanoparticleDescription::from_radii(
//!     &[10.0, 20.0],
//!     vec![DopantSpec::new(0, 0.02, "Yb"), DopantSpec::new(1, 0.05, "Er")],
//! );
//! let graph = GraphBuilder::default().build(&np)?;
//! assert_eq!(graph.interaction.len(), 1);
//! ```

pub mod backend;
pub mod batch;
pub mod config;
pub mod error;
pub mod graph;
pub mod nanoparticle;
pub mod node;
pub mod rng;

pub use backend::*;
pub use batch::*;
pub use config::*;
pub use error::*;
pub use graph::*;
pub use nanoparticle::*;
pub use node::*;
pub use rng::*;
