pub mod batch;
pub mod bundle;
pub mod error;
pub mod linalg;
pub mod traits;

pub use bundle::FiberBundle;
pub use error::{Error, Result};
pub use traits::{EmbeddedManifold, Manifold};

/// Default tolerance of the membership and splitting tests
pub const DEFAULT_ATOL: f64 = 1e-10;

/// Tolerance used when validating inputs of exp, log and lifts
pub const VALIDATION_ATOL: f64 = 1e-8;
