pub mod algorithms;
pub mod bundles;
pub mod core;
pub mod manifolds;

// Flat re-exports for convenience
pub use crate::core::{
    EmbeddedManifold, Error, FiberBundle, Manifold, Result, DEFAULT_ATOL, VALIDATION_ATOL,
};

// Re-export manifold types
pub use crate::manifolds::{FullRankCorrelationMatrices, SymmetricMatrices, SPD};

// Re-export bundle types
pub use crate::bundles::{CorrelationMatricesBundle, FullRankCorrelationAffineQuotientMetric, QuotientMetric};

// Re-export alignment types
pub use crate::algorithms::alignment::{AlignmentResult, Convergence, FiberAligner, LineSearch};

/// Convenience re-exports for common use cases
pub mod prelude {
    pub use crate::algorithms::alignment::{Convergence, FiberAligner, LineSearch};
    pub use crate::bundles::{
        CorrelationMatricesBundle, FullRankCorrelationAffineQuotientMetric, QuotientMetric,
    };
    pub use crate::core::{EmbeddedManifold, Error, FiberBundle, Manifold, Result};
    pub use crate::manifolds::{FullRankCorrelationMatrices, SymmetricMatrices, SPD};
}
