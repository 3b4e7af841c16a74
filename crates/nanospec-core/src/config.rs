//! Configuration records for graph building, the representation module,
//! the readout and the training loop.
//!
//! All records deserialize with defaults, so a TOML file only needs the
//! keys it overrides:
//!
//! ```toml
//! [representation]
//! embed_dim = 32
//! use_inverse_concentration = true
//!
//! [readout]
//! n_output = 600
//!
//! [training]
//! learning_rate = 5e-4
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{NanoSpecError, Result};
use crate::node::DopantVocabulary;

/// Pooling of dopant-node features into one vector per nanoparticle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pooling {
    /// Sum of the dopant features of each graph.
    #[default]
    Sum,
    /// Mean of the dopant features of each graph.
    Mean,
}

/// Gradient-descent optimizer used by the training loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizerKind {
    /// Adam with default moments.
    #[default]
    Adam,
    /// Plain stochastic gradient descent.
    Sgd,
}

/// Regression loss between predicted and target log-spectra.
///
/// In TOML the variant is selected with a `kind` key:
///
/// ```toml
/// [training.loss]
/// kind = "huber"
/// delta = 0.5
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind")]
pub enum LossKind {
    /// Mean squared error.
    #[default]
    Mse,
    /// Mean absolute error.
    Mae,
    /// Quadratic below `delta`, linear above.
    Huber {
        /// Transition point between the two regimes; must be positive.
        delta: f32,
    },
}

/// Settings for turning nanoparticle descriptions into graphs.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphBuilderConfig {
    /// Dopant element vocabulary; a symbol's position is its type index.
    pub elements: DopantVocabulary,
}

/// Hyperparameters of the heterogeneous representation module.
///
/// The three boolean flags select how concentrations and shell geometry
/// condition the node embeddings; they are resolved once, at model
/// construction, into a fixed set of conditioning widths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepresentationConfig {
    /// Width `D` of every node embedding and of the pooled representation.
    pub embed_dim: usize,
    /// Rounds of heterogeneous message passing.
    pub n_message_passing: usize,
    /// Number of Gaussian widths in the radial interaction integral.
    pub nsigma: usize,
    /// Smallest Gaussian width, in the unit of the radii.
    pub sigma_min: f32,
    /// Largest Gaussian width; widths are evenly spaced in between.
    pub sigma_max: f32,
    /// Size of the dopant type vocabulary.
    pub n_dopant_types: usize,
    /// Append the shell volume to the dopant geometry context
    /// `[r_inner, r_outer]`.
    pub use_volume_in_dopant_constraint: bool,
    /// Divide pair conditioning by the product of the two shell volumes.
    pub normalize_interaction_by_volume: bool,
    /// Add `1 / (c + eps)` terms to the concentration conditioning, and use
    /// four concentration factors per pair instead of `c_i c_j`.
    pub use_inverse_concentration: bool,
    /// Embed pair nodes with a `V^2` lookup table instead of a linear map of
    /// the two-hot type pair.
    pub interaction_embedding: bool,
    /// Offset in `1 / (c + eps)`.
    pub conc_eps: f32,
    /// Multiplier applied to shell volumes before they are used.
    pub volume_scale: f32,
    /// Hidden widths of every FiLM modulation MLP.
    pub film_hidden: Vec<usize>,
    /// Attention heads per GATv2 convolution; head outputs are averaged.
    pub attention_heads: usize,
    /// LeakyReLU slope inside the attention score.
    pub negative_slope: f64,
    /// Per-graph pooling of dopant features.
    pub pooling: Pooling,
}

impl Default for RepresentationConfig {
    fn default() -> Self {
        Self {
            embed_dim: 16,
            n_message_passing: 3,
            nsigma: 5,
            sigma_min: 1.0,
            sigma_max: 5.0,
            n_dopant_types: 3,
            use_volume_in_dopant_constraint: false,
            normalize_interaction_by_volume: false,
            use_inverse_concentration: false,
            interaction_embedding: false,
            conc_eps: 0.01,
            volume_scale: 1.0,
            film_hidden: vec![16, 16],
            attention_heads: 1,
            negative_slope: 0.2,
            pooling: Pooling::Sum,
        }
    }
}

impl RepresentationConfig {
    /// Set the embedding width `D`.
    pub fn with_embed_dim(mut self, embed_dim: usize) -> Self {
        self.embed_dim = embed_dim;
        self
    }

    /// Set the number of message-passing rounds.
    pub fn with_message_passing(mut self, rounds: usize) -> Self {
        self.n_message_passing = rounds;
        self
    }

    /// Set the number of Gaussian widths of the radial integral.
    pub fn with_nsigma(mut self, nsigma: usize) -> Self {
        self.nsigma = nsigma;
        self
    }

    /// Enable inverse-concentration conditioning.
    ///
    /// Doubles the dopant concentration context and quadruples the pair
    /// conditioning width.
    pub fn with_inverse_concentration(mut self, enabled: bool) -> Self {
        self.use_inverse_concentration = enabled;
        self
    }

    /// Include the shell volume in the dopant geometry context.
    pub fn with_volume_in_dopant_constraint(mut self, enabled: bool) -> Self {
        self.use_volume_in_dopant_constraint = enabled;
        self
    }

    /// Normalise pair conditioning by the shell volumes.
    pub fn with_interaction_volume_normalization(mut self, enabled: bool) -> Self {
        self.normalize_interaction_by_volume = enabled;
        self
    }

    /// Use a `V²` lookup table for pair-node embeddings.
    pub fn with_interaction_embedding(mut self, enabled: bool) -> Self {
        self.interaction_embedding = enabled;
        self
    }

    /// Set the per-graph pooling.
    pub fn with_pooling(mut self, pooling: Pooling) -> Self {
        self.pooling = pooling;
        self
    }

    /// Check every value against its domain.
    ///
    /// # Errors
    ///
    /// [`NanoSpecError::Config`] naming the first offending key: zero widths,
    /// counts or heads, an inverted or non-positive sigma range, or a
    /// non-positive `conc_eps` / `volume_scale`.
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(NanoSpecError::Config(msg));
        if self.embed_dim == 0 {
            return fail("representation.embed_dim must be positive".into());
        }
        if self.nsigma == 0 {
            return fail("representation.nsigma must be positive".into());
        }
        if self.n_dopant_types == 0 {
            return fail("representation.n_dopant_types must be positive".into());
        }
        if self.attention_heads == 0 {
            return fail("representation.attention_heads must be positive".into());
        }
        if !(self.sigma_min > 0.0 && self.sigma_max >= self.sigma_min) {
            return fail(format!(
                "representation sigma range [{}, {}] must be positive and ordered",
                self.sigma_min, self.sigma_max
            ));
        }
        if !(self.conc_eps > 0.0) {
            return fail(format!("representation.conc_eps must be > 0, got {}", self.conc_eps));
        }
        if !(self.volume_scale > 0.0) {
            return fail(format!(
                "representation.volume_scale must be > 0, got {}",
                self.volume_scale
            ));
        }
        if self.film_hidden.iter().any(|&w| w == 0) {
            return fail("representation.film_hidden widths must be positive".into());
        }
        Ok(())
    }
}

/// Readout MLP from the pooled representation to the spectrum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadoutConfig {
    /// Hidden layer widths, SiLU between layers.
    pub hidden: Vec<usize>,
    /// Dropout after every hidden layer, active in training mode only.
    pub dropout: f64,
    /// Length of the predicted spectrum.
    pub n_output: usize,
}

impl Default for ReadoutConfig {
    fn default() -> Self {
        Self {
            hidden: vec![128],
            dropout: 0.25,
            n_output: 400,
        }
    }
}

impl ReadoutConfig {
    /// Set the predicted spectrum length.
    pub fn with_n_output(mut self, n_output: usize) -> Self {
        self.n_output = n_output;
        self
    }

    /// Set the dropout probability, in `[0, 1)`.
    pub fn with_dropout(mut self, dropout: f64) -> Self {
        self.dropout = dropout;
        self
    }

    /// # Errors
    ///
    /// [`NanoSpecError::Config`] for a zero `n_output` or a dropout outside `[0, 1)`.
    pub fn validate(&self) -> Result<()> {
        if self.n_output == 0 {
            return Err(NanoSpecError::Config("readout.n_output must be positive".into()));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(NanoSpecError::Config(format!(
                "readout.dropout must be in [0, 1), got {}",
                self.dropout
            )));
        }
        if self.hidden.iter().any(|&w| w == 0) {
            return Err(NanoSpecError::Config("readout.hidden widths must be positive".into()));
        }
        Ok(())
    }
}

/// Settings of the minibatch training loop.
///
/// The learning rate ramps up linearly over `warmup_epochs`, then follows a
/// reduce-on-plateau schedule driven by the validation loss.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Adam or SGD.
    pub optimizer: OptimizerKind,
    /// Peak learning rate, reached at the end of warmup.
    pub learning_rate: f64,
    /// L2 regularisation weight.
    pub weight_decay: f32,
    /// Nanoparticles per minibatch.
    pub batch_size: usize,
    /// Upper bound on training epochs.
    pub num_epochs: usize,
    /// Epochs of linear learning-rate warmup; 0 disables warmup.
    pub warmup_epochs: usize,
    /// Epochs without improvement before the learning rate is reduced.
    pub lr_patience: usize,
    /// Multiplier applied on each plateau reduction.
    pub lr_factor: f64,
    /// Floor of the learning rate.
    pub min_learning_rate: f64,
    /// Epochs without validation improvement before training stops.
    pub early_stop_patience: Option<usize>,
    /// Seed of the per-epoch shuffling keys.
    pub seed: u64,
    pub loss: LossKind,
    /// First epoch (0-based) folded into a stochastic weight average. When
    /// set, training returns the averaged model instead of the best one.
    pub swa_start_epoch: Option<usize>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            optimizer: OptimizerKind::Adam,
            learning_rate: 1e-3,
            weight_decay: 0.0,
            batch_size: 16,
            num_epochs: 2000,
            warmup_epochs: 10,
            lr_patience: 100,
            lr_factor: 0.8,
            min_learning_rate: 1e-7,
            early_stop_patience: Some(200),
            seed: 0,
            loss: LossKind::Mse,
            swa_start_epoch: None,
        }
    }
}

impl TrainingConfig {
    /// Set the peak learning rate.
    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    /// Set the maximum number of epochs.
    pub fn with_epochs(mut self, epochs: usize) -> Self {
        self.num_epochs = epochs;
        self
    }

    /// Set the number of graphs per mini-batch.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the number of warmup epochs.
    pub fn with_warmup(mut self, epochs: usize) -> Self {
        self.warmup_epochs = epochs;
        self
    }

    /// Set the seed for the split and the shuffles.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Enable stochastic weight averaging from `epoch` on.
    pub fn with_swa_start(mut self, epoch: usize) -> Self {
        self.swa_start_epoch = Some(epoch);
        self
    }

    /// Check rates, sizes and split fractions.
    pub fn validate(&self) -> Result<()> {
        if !(self.learning_rate > 0.0) {
            return Err(NanoSpecError::Config("training.learning_rate must be > 0".into()));
        }
        if self.batch_size == 0 {
            return Err(NanoSpecError::Config("training.batch_size must be positive".into()));
        }
        if !(self.lr_factor > 0.0 && self.lr_factor <= 1.0) {
            return Err(NanoSpecError::Config(format!(
                "training.lr_factor must be in (0, 1], got {}",
                self.lr_factor
            )));
        }
        if self.weight_decay < 0.0 {
            return Err(NanoSpecError::Config("training.weight_decay must be >= 0".into()));
        }
        if let LossKind::Huber { delta } = self.loss {
            if !(delta > 0.0) {
                return Err(NanoSpecError::Config("huber delta must be > 0".into()));
            }
        }
        Ok(())
    }
}

/// Full configuration file.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NanoSpecConfig {
    /// `[graph]`
    pub graph: GraphBuilderConfig,
    /// `[representation]`
    pub representation: RepresentationConfig,
    /// `[readout]`
    pub readout: ReadoutConfig,
    /// `[training]`
    pub training: TrainingConfig,
}

impl NanoSpecConfig {
    /// Parse and validate a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: NanoSpecConfig =
            toml::from_str(contents).map_err(|e| NanoSpecError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| NanoSpecError::Config(format!("failed to read {:?}: {}", path, e)))?;
        Self::from_toml_str(&contents)
    }

    /// Serialize as pretty TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| NanoSpecError::Config(e.to_string()))
    }

    /// Write the configuration as pretty TOML, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        let toml_str = self.to_toml_string()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| NanoSpecError::Config(format!("failed to create {:?}: {}", parent, e)))?;
        }
        fs::write(path, toml_str)
            .map_err(|e| NanoSpecError::Config(format!("failed to write {:?}: {}", path, e)))
    }

    /// Validate every section, and that the graph vocabulary size matches
    /// `representation.n_dopant_types`.
    pub fn validate(&self) -> Result<()> {
        self.representation.validate()?;
        self.readout.validate()?;
        self.training.validate()?;
        if self.graph.elements.len() != self.representation.n_dopant_types {
            return Err(NanoSpecError::Config(format!(
                "graph vocabulary has {} elements but representation.n_dopant_types = {}",
                self.graph.elements.len(),
                self.representation.n_dopant_types
            )));
        }
        Ok(())
    }
}
