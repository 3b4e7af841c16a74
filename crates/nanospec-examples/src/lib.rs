//! # nanospec-examples utilities
//!
//! Synthetic nanoparticle datasets for the example programs. The spectra
//! are a toy stand-in for simulated emission: one Gaussian band per dopant
//! element, scaled by concentration and by how much the dopant's shell
//! overlaps the other shells, then log-transformed.

use nanospec_core::{DopantSpec, DopantVocabulary, NanoparticleDescription, RngKey};
use nanospec_train::SpectrumSample;
use rand::Rng;

/// Band centre (as a fraction of the spectrum) for each vocabulary entry.
const BAND_CENTRES: [f32; 3] = [0.2, 0.55, 0.8];

#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    pub n_samples: usize,
    pub n_bins: usize,
    pub max_shells: usize,
    pub max_radius: f32,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            n_samples: 64,
            n_bins: 400,
            max_shells: 3,
            max_radius: 30.0,
        }
    }
}

/// A random core/shell particle with one to `max_shells` shells.
pub fn random_nanoparticle(
    rng: &mut impl Rng,
    vocabulary: &DopantVocabulary,
    config: &SyntheticConfig,
) -> NanoparticleDescription {
    let n_shells = rng.random_range(1..=config.max_shells.max(1));
    let step = config.max_radius / n_shells as f32;
    let mut radius = 0.0;
    let mut radii = Vec::with_capacity(n_shells);
    for _ in 0..n_shells {
        radius += rng.random_range(0.3 * step..step);
        radii.push(radius);
    }

    let mut dopants = Vec::new();
    for shell in 0..n_shells {
        for element in vocabulary.iter() {
            if rng.random_bool(0.6) {
                dopants.push(DopantSpec::new(shell, rng.random_range(0.005..0.5), element));
            }
        }
    }
    if dopants.is_empty() {
        if let Some(element) = vocabulary.iter().next() {
            dopants.push(DopantSpec::new(0, 0.1, element));
        }
    }
    NanoparticleDescription::from_radii(&radii, dopants)
}

/// Toy log-spectrum of `np` over `n_bins` bins.
pub fn toy_spectrum(np: &NanoparticleDescription, vocabulary: &DopantVocabulary, n_bins: usize) -> Vec<f32> {
    let radii = np.radii_with_origin();
    let total_volume = np.shell_volumes().iter().sum::<f32>().max(f32::EPSILON);
    let mut y = vec![0.0f32; n_bins];
    for d in &np.dopants {
        let Ok(ty) = vocabulary.index_of(&d.element) else {
            continue;
        };
        let centre = BAND_CENTRES[ty % BAND_CENTRES.len()] * n_bins as f32;
        let width = 0.02 * n_bins as f32 * (1.0 + radii[d.shell + 1] / radii[radii.len() - 1]);
        let share = np.shell_volumes()[d.shell] / total_volume;
        let amplitude = 100.0 * d.concentration * share;
        for (k, v) in y.iter_mut().enumerate() {
            let u = (k as f32 - centre) / width;
            *v += amplitude * (-0.5 * u * u).exp();
        }
    }
    y.into_iter().map(|v| v.ln_1p()).collect()
}

/// Random nanoparticles labelled with [`toy_spectrum`].
///
/// Deterministic for a given `key`.
pub fn synthetic_samples(
    config: &SyntheticConfig,
    vocabulary: &DopantVocabulary,
    key: RngKey,
) -> Vec<SpectrumSample> {
    let mut rng = key.rng();
    (0..config.n_samples)
        .map(|_| {
            let nanoparticle = random_nanoparticle(&mut rng, vocabulary, config);
            let log_y = toy_spectrum(&nanoparticle, vocabulary, config.n_bins);
            SpectrumSample { nanoparticle, log_y }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use nanospec_core::GraphBuilder;

    #[test]
    fn test_synthetic_samples_are_valid() {
        let vocabulary = DopantVocabulary::default();
        let config = SyntheticConfig {
            n_samples: 20,
            n_bins: 50,
            ..Default::default()
        };
        let samples = synthetic_samples(&config, &vocabulary, RngKey::new(5));
        assert_eq!(samples.len(), 20);
        let builder = GraphBuilder::with_vocabulary(vocabulary);
        for s in &samples {
            assert_eq!(s.log_y.len(), 50);
            assert!(s.log_y.iter().all(|v| v.is_finite() && *v >= 0.0));
            builder.build(&s.nanoparticle).unwrap();
        }
        let again = synthetic_samples(&config, &DopantVocabulary::default(), RngKey::new(5));
        assert_eq!(again, samples);
    }
}
