pub mod alignment;

pub use alignment::{AlignmentResult, Convergence, FiberAligner, LineSearch};
