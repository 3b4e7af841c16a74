//! Structural description of a core/shell nanoparticle.
//!
//! A nanoparticle is a sequence of concentric spherical shells
//! ("constraints") with strictly increasing outer radii, plus a list of
//! dopant entries placing an element at some concentration in a shell.

use std::f32::consts::PI;

use serde::{Deserialize, Serialize};

use crate::error::{NanoSpecError, Result};

/// Outer boundary of one shell, in nanometres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShellConstraint {
    pub radius: f32,
}

impl ShellConstraint {
    pub const fn new(radius: f32) -> Self {
        Self { radius }
    }
}

/// One dopant entry of the composition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DopantSpec {
    /// Index into [`NanoparticleDescription::constraints`].
    pub shell: usize,
    /// Fraction of host sites occupied, in `[0, 1]`.
    pub concentration: f32,
    pub element: String,
    #[serde(default = "default_host")]
    pub host: String,
}

fn default_host() -> String {
    "Y".to_string()
}

impl DopantSpec {
    /// Dopant replacing the default host `Y`.
    pub fn new(shell: usize, concentration: f32, element: impl Into<String>) -> Self {
        Self {
            shell,
            concentration,
            element: element.into(),
            host: default_host(),
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }
}

/// Shell radii plus the dopants placed in them.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NanoparticleDescription {
    pub constraints: Vec<ShellConstraint>,
    #[serde(alias = "dopant_specification")]
    pub dopants: Vec<DopantSpec>,
}

impl NanoparticleDescription {
    pub fn new(constraints: Vec<ShellConstraint>, dopants: Vec<DopantSpec>) -> Self {
        Self {
            constraints,
            dopants,
        }
    }

    /// Build from bare radii.
    pub fn from_radii(radii: &[f32], dopants: Vec<DopantSpec>) -> Self {
        Self::new(radii.iter().copied().map(ShellConstraint::new).collect(), dopants)
    }

    pub fn n_shells(&self) -> usize {
        self.constraints.len()
    }

    /// Radii with a leading zero: `[0, r_1, ..., r_S]`.
    pub fn radii_with_origin(&self) -> Vec<f32> {
        std::iter::once(0.0)
            .chain(self.constraints.iter().map(|c| c.radius))
            .collect()
    }

    /// Spherical-shell volume of every shell, `4/3 pi (r_out^3 - r_in^3)`.
    pub fn shell_volumes(&self) -> Vec<f32> {
        self.radii_with_origin()
            .windows(2)
            .map(|w| shell_volume(w[0], w[1]))
            .collect()
    }

    /// Check radii ordering and composition bounds.
    pub fn validate(&self) -> Result<()> {
        if self.constraints.is_empty() {
            return Err(NanoSpecError::InvalidGeometry(
                "nanoparticle has no shells".into(),
            ));
        }

        let mut previous = 0.0f32;
        for (i, c) in self.constraints.iter().enumerate() {
            if !c.radius.is_finite() || c.radius <= 0.0 {
                return Err(NanoSpecError::InvalidGeometry(format!(
                    "shell {} has non-positive radius {}",
                    i, c.radius
                )));
            }
            if c.radius <= previous {
                return Err(NanoSpecError::InvalidGeometry(format!(
                    "shell radii must be strictly increasing: shell {} radius {} <= {}",
                    i, c.radius, previous
                )));
            }
            previous = c.radius;
        }

        for d in &self.dopants {
            if d.shell >= self.constraints.len() {
                return Err(NanoSpecError::InvalidComposition(format!(
                    "dopant {} references shell {} but only {} shells exist",
                    d.element,
                    d.shell,
                    self.constraints.len()
                )));
            }
            if !(0.0..=1.0).contains(&d.concentration) {
                return Err(NanoSpecError::InvalidComposition(format!(
                    "dopant {} in shell {} has concentration {} outside [0, 1]",
                    d.element, d.shell, d.concentration
                )));
            }
        }
        Ok(())
    }
}

/// Volume between two concentric spheres, `4/3 π (outer³ - inner³)`.
pub fn shell_volume(inner: f32, outer: f32) -> f32 {
    4.0 / 3.0 * PI * (outer.powi(3) - inner.powi(3))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_volumes() {
        let np = NanoparticleDescription::from_radii(&[10.0, 20.0], vec![]);
        let v = np.shell_volumes();
        assert!((v[0] - 4.0 / 3.0 * PI * 1000.0).abs() < 1e-2);
        assert!((v[1] - 4.0 / 3.0 * PI * 7000.0).abs() < 1e-1);
    }

    #[test]
    fn test_rejects_decreasing_radii() {
        let np = NanoparticleDescription::from_radii(&[20.0, 10.0], vec![]);
        assert!(matches!(np.validate(), Err(NanoSpecError::InvalidGeometry(_))));
    }

    #[test]
    fn test_rejects_bad_concentration() {
        let np = NanoparticleDescription::from_radii(&[5.0], vec![DopantSpec::new(0, 1.5, "Yb")]);
        assert!(matches!(np.validate(), Err(NanoSpecError::InvalidComposition(_))));
    }

    #[test]
    fn test_rejects_missing_shell() {
        let np = NanoparticleDescription::from_radii(&[5.0], vec![DopantSpec::new(3, 0.1, "Yb")]);
        assert!(np.validate().is_err());
    }
}
