//! Error type shared by every reconciliation stage.

use crate::predictor::PredictorError;

/// Errors that can occur while reconciling predictor outputs.
#[derive(Debug)]
pub enum ReconcileError {
    /// A label array contained a negative value.
    NegativeLabel {
        /// First offending value encountered in raster order.
        value: i64,
    },
    /// An array had the wrong number of dimensions for the operation.
    Dimension {
        /// Human-readable description of the accepted dimensionality.
        expected: &'static str,
        /// Dimensionality that was supplied.
        got: usize,
    },
    /// Two arrays that must share a shape did not.
    ShapeMismatch {
        /// Which input was inconsistent.
        what: &'static str,
        /// Shape the stage required.
        expected: Vec<usize>,
        /// Shape that was supplied.
        got: Vec<usize>,
    },
    /// Axis string could not be mapped to a supported layout.
    InvalidLayout {
        /// The rejected axis string.
        axes: String,
    },
    /// An injected predictor failed; reconciliation of the image is aborted.
    Predictor {
        /// Pipeline stage that invoked the predictor.
        stage: &'static str,
        /// Error reported by the predictor.
        source: PredictorError,
    },
    /// Label ids do not fit the requested export range.
    LabelOverflow {
        /// Largest representable id.
        max: u32,
    },
    /// Arrays could not be combined (stacking frames of differing shape).
    Shape(String),
    /// Configuration could not be read or parsed.
    Config(String),
}

impl std::fmt::Display for ReconcileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NegativeLabel { value } => write!(
                f,
                "negative label value {} is not supported; relabel the input first",
                value
            ),
            Self::Dimension { expected, got } => {
                write!(f, "expected {} array, got {} dimensions", expected, got)
            }
            Self::ShapeMismatch {
                what,
                expected,
                got,
            } => write!(
                f,
                "{} has shape {:?}, expected {:?}",
                what, got, expected
            ),
            Self::InvalidLayout { axes } => write!(
                f,
                "unsupported axes '{}': expected one of YX, ZYX, TYX, TZYX",
                axes
            ),
            Self::Predictor { stage, source } => {
                write!(f, "{} predictor failed: {}", stage, source)
            }
            Self::LabelOverflow { max } => {
                write!(f, "label ids exceed the exportable maximum {}", max)
            }
            Self::Shape(msg) => write!(f, "array shape error: {}", msg),
            Self::Config(msg) => write!(f, "invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for ReconcileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Predictor { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl From<ndarray::ShapeError> for ReconcileError {
    fn from(e: ndarray::ShapeError) -> Self {
        Self::Shape(e.to_string())
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ReconcileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_mentions_offending_value() {
        let err = ReconcileError::NegativeLabel { value: -3 };
        assert!(err.to_string().contains("-3"));
    }

    #[test]
    fn predictor_error_exposes_source() {
        use std::error::Error;
        let err = ReconcileError::Predictor {
            stage: "semantic",
            source: "model exploded".into(),
        };
        assert!(err.source().is_some());
        assert!(err.to_string().starts_with("semantic predictor failed"));
    }
}
