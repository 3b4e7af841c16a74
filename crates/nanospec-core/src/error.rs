use thiserror::Error;

/// Errors raised while building graphs, converting inputs or running models.
///
/// Degenerate geometry (zero-width shells, zero concentration) is not an
/// error: it is handled by documented fallback values.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum NanoSpecError {
    #[error("shape mismatch for `{tensor}`: expected {expected}, got {actual}")]
    ShapeMismatch {
        tensor: String,
        expected: String,
        actual: String,
    },

    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("invalid composition: {0}")]
    InvalidComposition(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl NanoSpecError {
    pub fn shape(
        tensor: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::ShapeMismatch {
            tensor: tensor.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, NanoSpecError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_mismatch_message_names_tensor() {
        let err = NanoSpecError::shape("interaction_dopant_indices", "[E, 2]", "[4, 3]");
        let msg = err.to_string();
        assert!(msg.contains("interaction_dopant_indices"));
        assert!(msg.contains("[E, 2]"));
        assert!(msg.contains("[4, 3]"));
    }
}
