// error.rs
// Description: Error type shared by every public model operation.
// History:
// - 2026-10-18: Replace string errors with a typed error enum.

use thiserror::Error;

/// Errors surfaced by model construction, forward, training and generation.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Caller supplied ids or sequences that violate an operation precondition.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Two matrices with incompatible shapes met inside an operation.
    #[error("shape mismatch in {op}: {left:?} vs {right:?}")]
    ShapeMismatch {
        /// Operation that detected the mismatch
        op: &'static str,
        /// Shape of the left operand
        left: (usize, usize),
        /// Shape of the right operand
        right: (usize, usize),
    },

    /// Model configuration cannot be used to build a model.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// Checkpoint content does not match what the loader expects.
    #[error("checkpoint error: {0}")]
    Checkpoint(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl ModelError {
    pub(crate) fn invalid_input(s_msg: impl Into<String>) -> Self {
        ModelError::InvalidInput(s_msg.into())
    }

    /// True for precondition failures at the operation boundary.
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, ModelError::InvalidInput(_))
    }
}

pub type Result<T> = std::result::Result<T, ModelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let e = ModelError::invalid_input("empty_sequence");
        assert_eq!(e.to_string(), "invalid input: empty_sequence");
        assert!(e.is_invalid_input());

        let e = ModelError::ShapeMismatch {
            op: "matmul",
            left: (2, 3),
            right: (4, 5),
        };
        assert_eq!(e.to_string(), "shape mismatch in matmul: (2, 3) vs (4, 5)");
        assert!(!e.is_invalid_input());
    }

    #[test]
    fn test_io_error_converts() {
        fn open_missing() -> Result<String> {
            Ok(std::fs::read_to_string("/definitely/not/here/tiny_lm.json")?)
        }
        assert!(matches!(open_missing(), Err(ModelError::Io(_))));
    }
}
