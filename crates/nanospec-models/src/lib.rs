//! # nanospec-models
//!
//! Heterogeneous graph network mapping nanoparticle graphs to emission
//! spectra.
//!
//! ```text
//! HeteroInputs ──► HeteroDcvRepresentation ──► [G, D] ──► NonLinearMlp ──► [G, n_output]
//!                   ├── RadialInteractionIntegrator (Gaussian shell overlap)
//!                   ├── FilmLayer per node type
//!                   ├── R × HeteroConvRound (GatV2Conv per Relation)
//!                   └── Aggregation (sum / mean per graph)
//! ```
//!
//! ```rust,ignore
//! use nanospec_core::{CpuBackend, HeteroBatch, NanoSpecConfig};
//! use nanospec_models::SpectrumModel;
//!
//! let device = Default::default();
//! let model = SpectrumModel::<CpuBackend>::from_config(&NanoSpecConfig::default(), &device)?;
//! let inputs = model.prepare(&HeteroBatch::from_graphs(&graphs), &device)?;
//! let spectra = model.forward(&inputs)?;
//! ```

pub mod aggregation;
pub mod conditioning;
pub mod film;
pub mod gat;
pub mod hetero_conv;
pub mod inputs;
pub mod integrator;
pub mod mlp;
pub mod model;
pub mod ops;
pub mod representation;

pub use aggregation::Aggregation;
pub use conditioning::{ConcentrationFactor, ResolvedConditioning};
pub use film::FilmLayer;
pub use gat::GatV2Conv;
pub use hetero_conv::{HeteroConvRound, MessagePassingStage, NodeFeatures, RelationConvs};
pub use inputs::{EdgeIndex, HeteroInputs, PairInputs, RelationEdges};
pub use integrator::RadialInteractionIntegrator;
pub use mlp::NonLinearMlp;
pub use model::SpectrumModel;
pub use representation::HeteroDcvRepresentation;
