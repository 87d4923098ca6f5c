pub mod correlation;
pub mod quotient;

pub use correlation::CorrelationMatricesBundle;
pub use quotient::{FullRankCorrelationAffineQuotientMetric, QuotientMetric};
