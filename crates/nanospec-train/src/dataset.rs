//! Spectrum datasets: JSON loading, graph construction, splits and
//! minibatches.
//!
//! File format: a JSON array of samples
//!
//! ```json
//! [{ "nanoparticle": { "constraints": [{"radius": 10.0}],
//!                      "dopants": [{"shell": 0, "concentration": 0.2, "element": "Yb"}] },
//!    "log_y": [0.0, 0.1, …] }]
//! ```

use std::path::Path;

use anyhow::{ensure, Context, Result};
use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData};
use nanospec_core::{GraphBuilder, HeteroBatch, HeteroGraph, NanoparticleDescription, RngKey};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectrumSample {
    pub nanoparticle: NanoparticleDescription,
    /// Log-scaled emission spectrum.
    pub log_y: Vec<f32>,
}

/// Samples with their graphs built once at load time.
#[derive(Debug, Clone, Default)]
pub struct SpectrumDataset {
    samples: Vec<SpectrumSample>,
    graphs: Vec<HeteroGraph>,
}

impl SpectrumDataset {
    /// Build a graph for every sample.
    ///
    /// # Errors
    ///
    /// Spectra of different lengths, an empty spectrum, or a nanoparticle
    /// the builder rejects. The error names the sample index.
    pub fn from_samples(samples: Vec<SpectrumSample>, builder: &GraphBuilder) -> Result<Self> {
        if let Some(first) = samples.first() {
            let n = first.log_y.len();
            ensure!(n > 0, "sample 0 has an empty spectrum");
            for (i, s) in samples.iter().enumerate() {
                ensure!(
                    s.log_y.len() == n,
                    "sample {} has {} spectrum bins, expected {}",
                    i,
                    s.log_y.len(),
                    n
                );
            }
        }
        let graphs = samples
            .iter()
            .enumerate()
            .map(|(i, s)| {
                builder
                    .build(&s.nanoparticle)
                    .with_context(|| format!("invalid nanoparticle in sample {}", i))
            })
            .collect::<Result<Vec<_>>>()?;
        log::info!("dataset: {} samples, {} spectrum bins", samples.len(), samples.first().map_or(0, |s| s.log_y.len()));
        Ok(Self { samples, graphs })
    }

    /// Parse a JSON array of [`SpectrumSample`].
    pub fn from_json_str(json: &str, builder: &GraphBuilder) -> Result<Self> {
        let samples: Vec<SpectrumSample> =
            serde_json::from_str(json).context("Invalid spectrum dataset JSON")?;
        Self::from_samples(samples, builder)
    }

    pub fn from_json_file(path: &Path, builder: &GraphBuilder) -> Result<Self> {
        let data = std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
        Self::from_json_str(&data, builder).with_context(|| format!("Failed to load {:?}", path))
    }

    /// Write the samples back in the format [`from_json_file`](Self::from_json_file) reads.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string(&self.samples)?;
        std::fs::write(path, json).with_context(|| format!("Failed to write {:?}", path))
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Spectrum length shared by all samples.
    pub fn n_output(&self) -> usize {
        self.samples.first().map_or(0, |s| s.log_y.len())
    }

    pub fn samples(&self) -> &[SpectrumSample] {
        &self.samples
    }

    /// Graphs, index-aligned with [`samples`](Self::samples).
    pub fn graphs(&self) -> &[HeteroGraph] {
        &self.graphs
    }

    fn subset(&self, indices: &[usize]) -> Self {
        Self {
            samples: indices.iter().map(|&i| self.samples[i].clone()).collect(),
            graphs: indices.iter().map(|&i| self.graphs[i].clone()).collect(),
        }
    }

    /// Shuffle with `key` and split into train / validation / test.
    pub fn split(&self, val_fraction: f32, test_fraction: f32, key: RngKey) -> Result<DatasetSplit> {
        ensure!(
            val_fraction >= 0.0 && test_fraction >= 0.0 && val_fraction + test_fraction < 1.0,
            "split fractions ({}, {}) must be non-negative and sum below 1",
            val_fraction,
            test_fraction
        );
        let n = self.len();
        let order = key.permutation(n);
        let n_val = (n as f32 * val_fraction).round() as usize;
        let n_test = ((n as f32 * test_fraction).round() as usize).min(n - n_val);
        let (val, rest) = order.split_at(n_val);
        let (test, train) = rest.split_at(n_test);
        Ok(DatasetSplit {
            train: self.subset(train),
            validation: self.subset(val),
            test: self.subset(test),
        })
    }

    /// Minibatches of at most `batch_size` samples, shuffled when a key is given.
    pub fn batches(&self, batch_size: usize, shuffle: Option<RngKey>) -> Vec<SpectrumBatch> {
        let order = match shuffle {
            Some(key) => key.permutation(self.len()),
            None => (0..self.len()).collect(),
        };
        order
            .chunks(batch_size.max(1))
            .map(|chunk| SpectrumBatch {
                graphs: HeteroBatch::from_graphs(chunk.iter().map(|&i| &self.graphs[i])),
                targets: chunk
                    .iter()
                    .flat_map(|&i| self.samples[i].log_y.iter().copied())
                    .collect(),
                n_output: self.n_output(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct DatasetSplit {
    pub train: SpectrumDataset,
    pub validation: SpectrumDataset,
    pub test: SpectrumDataset,
}

/// Collated graphs plus row-major targets `[num_graphs, n_output]`.
#[derive(Debug, Clone)]
pub struct SpectrumBatch {
    pub graphs: HeteroBatch,
    pub targets: Vec<f32>,
    pub n_output: usize,
}

impl SpectrumBatch {
    pub fn len(&self) -> usize {
        self.graphs.num_graphs
    }

    pub fn is_empty(&self) -> bool {
        self.graphs.num_graphs == 0
    }

    /// Targets as `[len, n_output]`.
    pub fn target_tensor<B: Backend>(&self, device: &B::Device) -> Tensor<B, 2> {
        let data = TensorData::new(self.targets.clone(), [self.len(), self.n_output]);
        Tensor::from_data(data.convert::<B::FloatElem>(), device)
    }
}
