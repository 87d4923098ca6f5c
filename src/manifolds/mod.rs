pub mod correlation;
pub mod spd;
pub mod symmetric;

pub use correlation::FullRankCorrelationMatrices;
pub use spd::SPD;
pub use symmetric::SymmetricMatrices;
