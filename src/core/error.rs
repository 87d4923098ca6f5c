use thiserror::Error;

/// Errors that can occur during manifold and bundle operations
#[derive(Debug, Error, Clone)]
pub enum Error {
    /// Point is not on the manifold
    #[error("point not on manifold: {0}")]
    NotOnManifold(String),

    /// Dimension mismatch
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// Invalid parameter value
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Input cannot be mapped onto the correlation manifold
    #[error("projection failed: {0}")]
    Projection(String),

    /// Fiber alignment did not reach its tolerance
    #[error("no convergence after {iterations} iterations (residual {residual:e})")]
    Convergence { iterations: usize, residual: f64 },

    /// A linear solve met a numerically singular system
    #[error("singular system: {0}")]
    Singular(String),

    /// Numerical error from ndarray-linalg
    #[error("linear algebra error: {0}")]
    LinalgError(String),

    /// Failure of one sample inside a batch
    #[error("sample {index}: {source}")]
    Batch { index: usize, source: Box<Error> },
}

impl Error {
    /// Attach the position of the failing sample in its batch.
    pub fn at_sample(self, index: usize) -> Self {
        Error::Batch {
            index,
            source: Box::new(self),
        }
    }

    /// Input failed a shape, symmetry or definiteness requirement.
    pub fn is_domain(&self) -> bool {
        match self {
            Error::NotOnManifold(_)
            | Error::DimensionMismatch { .. }
            | Error::InvalidParameter(_) => true,
            Error::Batch { source, .. } => source.is_domain(),
            _ => false,
        }
    }
}

/// Convert ndarray-linalg errors to Error
impl From<ndarray_linalg::error::LinalgError> for Error {
    fn from(err: ndarray_linalg::error::LinalgError) -> Self {
        Error::LinalgError(format!("{:?}", err))
    }
}

/// Result type for manifold operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_error_keeps_domain_kind() {
        let err = Error::NotOnManifold("diagonal".to_string()).at_sample(3);
        assert!(err.is_domain());
        assert_eq!(
            err.to_string(),
            "sample 3: point not on manifold: diagonal"
        );
    }

    #[test]
    fn test_convergence_is_not_domain() {
        let err = Error::Convergence {
            iterations: 10,
            residual: 1e-3,
        };
        assert!(!err.is_domain());
        assert!(err.to_string().contains("10 iterations"));
    }
}
