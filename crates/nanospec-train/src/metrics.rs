//! Host-side evaluation metrics.
//!
//! Predictions and targets are row-major `[n_samples, n_bins]` slices. The
//! same metrics are reported on the whole spectrum and on the UV window
//! (bins `200..257`) when the spectrum is long enough.

use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};

pub const UV_WINDOW: Range<usize> = 200..257;

const HUBER_DELTA: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SpectrumMetrics {
    pub mse: f32,
    pub mae: f32,
    pub huber: f32,
    /// Mean over samples of the per-sample cosine similarity.
    pub cosine: f32,
}

impl SpectrumMetrics {
    /// Metrics of every sample over the columns in `window` (all columns
    /// when `None`).
    ///
    /// # Arguments
    ///
    /// * `prediction`, `target` - row-major `[n_samples, n_bins]`
    /// * `n_bins` - spectrum length
    /// * `window` - column range; empty, or reaching past `n_bins`, yields no samples
    pub fn per_sample(
        prediction: &[f32],
        target: &[f32],
        n_bins: usize,
        window: Option<Range<usize>>,
    ) -> Vec<Self> {
        let window = window.unwrap_or(0..n_bins);
        let n_samples = if n_bins == 0 { 0 } else { prediction.len().min(target.len()) / n_bins };
        if n_samples == 0 || window.is_empty() || window.end > n_bins {
            return Vec::new();
        }

        let width = window.len() as f64;
        (0..n_samples)
            .map(|row| {
                let offset = row * n_bins;
                let p = &prediction[offset + window.start..offset + window.end];
                let t = &target[offset + window.start..offset + window.end];
                let (mut se, mut ae, mut hub) = (0.0f64, 0.0f64, 0.0f64);
                let (mut dot, mut pp, mut tt) = (0.0f64, 0.0f64, 0.0f64);
                for (&a, &b) in p.iter().zip(t) {
                    let d = (a - b).abs();
                    se += (d * d) as f64;
                    ae += d as f64;
                    hub += if d <= HUBER_DELTA {
                        0.5 * (d * d) as f64
                    } else {
                        (HUBER_DELTA * (d - 0.5 * HUBER_DELTA)) as f64
                    };
                    dot += (a * b) as f64;
                    pp += (a * a) as f64;
                    tt += (b * b) as f64;
                }
                Self {
                    mse: (se / width) as f32,
                    mae: (ae / width) as f32,
                    huber: (hub / width) as f32,
                    cosine: (dot / (pp.sqrt() * tt.sqrt()).max(1e-8)) as f32,
                }
            })
            .collect()
    }

    /// Metrics over the columns in `window` (all columns when `None`),
    /// averaged over samples.
    pub fn compute(
        prediction: &[f32],
        target: &[f32],
        n_bins: usize,
        window: Option<Range<usize>>,
    ) -> Self {
        Self::mean(&Self::per_sample(prediction, target, n_bins, window))
    }

    fn mean(samples: &[Self]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }
        let n = samples.len() as f64;
        let avg = |f: fn(&Self) -> f32| (samples.iter().map(|m| f(m) as f64).sum::<f64>() / n) as f32;
        Self {
            mse: avg(|m| m.mse),
            mae: avg(|m| m.mae),
            huber: avg(|m| m.huber),
            cosine: avg(|m| m.cosine),
        }
    }
}

/// Summary statistics of one metric across samples.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MetricDistribution {
    pub mean: f32,
    /// Population standard deviation.
    pub std: f32,
    pub min: f32,
    pub max: f32,
    pub median: f32,
}

impl MetricDistribution {
    /// All zero for an empty slice.
    pub fn from_values(values: &[f32]) -> Self {
        if values.is_empty() {
            return Self::default();
        }
        let n = values.len() as f64;
        let mean = values.iter().map(|&v| v as f64).sum::<f64>() / n;
        let var = values.iter().map(|&v| (v as f64 - mean).powi(2)).sum::<f64>() / n;

        let mut sorted = values.to_vec();
        sorted.sort_by(f32::total_cmp);
        let mid = sorted.len() / 2;
        let median = if sorted.len() % 2 == 0 {
            0.5 * (sorted[mid - 1] + sorted[mid])
        } else {
            sorted[mid]
        };
        Self {
            mean: mean as f32,
            std: var.sqrt() as f32,
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            median,
        }
    }
}

impl fmt::Display for MetricDistribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.5}±{:.5} [min {:.5}, median {:.5}, max {:.5}]",
            self.mean, self.std, self.min, self.median, self.max
        )
    }
}

/// Per-sample distribution of every [`SpectrumMetrics`] field.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MetricDistributions {
    pub mse: MetricDistribution,
    pub mae: MetricDistribution,
    pub huber: MetricDistribution,
    pub cosine: MetricDistribution,
}

impl MetricDistributions {
    pub fn from_samples(samples: &[SpectrumMetrics]) -> Self {
        let field = |f: fn(&SpectrumMetrics) -> f32| {
            MetricDistribution::from_values(&samples.iter().map(f).collect::<Vec<_>>())
        };
        Self {
            mse: field(|m| m.mse),
            mae: field(|m| m.mae),
            huber: field(|m| m.huber),
            cosine: field(|m| m.cosine),
        }
    }
}

impl fmt::Display for SpectrumMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "mse={:.5} mae={:.5} huber={:.5} cos_sim={:.4}",
            self.mse, self.mae, self.huber, self.cosine
        )
    }
}

/// Full-spectrum and UV-window metrics.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MetricReport {
    /// Sample means over the whole spectrum.
    pub full: SpectrumMetrics,
    /// Spread of the whole-spectrum metrics across samples.
    pub distribution: MetricDistributions,
    /// Sample means over [`UV_WINDOW`], present for spectra that cover it.
    pub uv: Option<SpectrumMetrics>,
}

impl MetricReport {
    /// # Arguments
    ///
    /// * `prediction`, `target` - row-major `[samples, n_bins]`
    /// * `n_bins` - spectrum length
    pub fn compute(prediction: &[f32], target: &[f32], n_bins: usize) -> Self {
        let samples = SpectrumMetrics::per_sample(prediction, target, n_bins, None);
        Self {
            full: SpectrumMetrics::mean(&samples),
            distribution: MetricDistributions::from_samples(&samples),
            uv: (n_bins >= UV_WINDOW.end)
                .then(|| SpectrumMetrics::compute(prediction, target, n_bins, Some(UV_WINDOW))),
        }
    }
}

impl fmt::Display for MetricReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.full)?;
        if let Some(uv) = &self.uv {
            write!(f, " | uv {}", uv)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_vectors() {
        let p = [1.0, 0.0, 0.0, 2.0];
        let t = [1.0, 0.0, 0.0, 1.0];
        let m = SpectrumMetrics::compute(&p, &t, 2, None);
        assert!((m.mse - 0.25).abs() < 1e-6);
        assert!((m.mae - 0.25).abs() < 1e-6);
        assert!((m.huber - 0.125).abs() < 1e-6);
        assert!((m.cosine - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal_and_opposite() {
        let m = SpectrumMetrics::compute(&[1.0, 0.0, 1.0, 1.0], &[0.0, 1.0, -1.0, -1.0], 2, None);
        assert!((m.cosine - (-0.5)).abs() < 1e-6);
    }

    #[test]
    fn test_window() {
        let p = [0.0, 5.0, 1.0];
        let t = [0.0, 5.0, 3.0];
        let m = SpectrumMetrics::compute(&p, &t, 3, Some(0..2));
        assert_eq!(m.mse, 0.0);
        let m = SpectrumMetrics::compute(&p, &t, 3, Some(2..3));
        assert!((m.mse - 4.0).abs() < 1e-6);
    }

    #[test]
    fn test_per_sample_and_distribution() {
        // sample errors: 0, 1, 4 (mse per sample)
        let p = [0.0, 0.0, 1.0, 1.0, 2.0, 2.0];
        let t = [0.0; 6];
        let samples = SpectrumMetrics::per_sample(&p, &t, 2, None);
        assert_eq!(samples.iter().map(|m| m.mse).collect::<Vec<_>>(), vec![0.0, 1.0, 4.0]);

        let report = MetricReport::compute(&p, &t, 2);
        assert!((report.full.mse - 5.0 / 3.0).abs() < 1e-6);
        let mse = report.distribution.mse;
        assert_eq!((mse.min, mse.median, mse.max), (0.0, 1.0, 4.0));
        assert!((mse.mean - report.full.mse).abs() < 1e-6);
        let expected_std = ((25.0f32 / 9.0 + 4.0 / 9.0 + 49.0 / 9.0) / 3.0).sqrt();
        assert!((mse.std - expected_std).abs() < 1e-5);
    }

    #[test]
    fn test_distribution_even_median_and_empty() {
        let d = MetricDistribution::from_values(&[4.0, 1.0, 3.0, 2.0]);
        assert_eq!(d.median, 2.5);
        assert_eq!(MetricDistribution::from_values(&[]), MetricDistribution::default());
    }

    #[test]
    fn test_uv_window_needs_long_spectrum() {
        let short = MetricReport::compute(&[0.0; 100], &[0.0; 100], 100);
        assert!(short.uv.is_none());
        let p = vec![1.0; 400];
        let mut t = vec![1.0; 400];
        t[210] = 3.0;
        let report = MetricReport::compute(&p, &t, 400);
        let uv = report.uv.unwrap();
        assert!((uv.mse - 4.0 / 57.0).abs() < 1e-6);
        assert!(report.full.mse < uv.mse);
    }
}
