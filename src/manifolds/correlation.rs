use ndarray::{Array1, Array2};
use rand::Rng;

use crate::core::linalg::{
    check_square, diag_action, is_positive_definite, is_symmetric, symmetrize,
};
use crate::core::{EmbeddedManifold, Error, Manifold, Result, VALIDATION_ATOL};
use crate::manifolds::SPD;

/// Manifold of full-rank correlation matrices
///
/// Corr(n) = {C ∈ SPD(n) : C_ii = 1}
///
/// A level set of SPD(n) under the diagonal map. The tangent space at any
/// point is the space of symmetric matrices with zero diagonal, the
/// linearization of the unit-diagonal constraint.
pub struct FullRankCorrelationMatrices {
    n: usize,
    spd: SPD,
}

impl FullRankCorrelationMatrices {
    pub fn new(n: usize) -> Self {
        FullRankCorrelationMatrices { n, spd: SPD::new(n) }
    }

    /// D·P·D with D = diag(diagonal)
    pub fn diag_action(diagonal: &Array1<f64>, point: &Array2<f64>) -> Array2<f64> {
        diag_action(diagonal, point)
    }

    /// Normalize a covariance matrix to its correlation matrix
    pub fn from_covariance(covariance: &Array2<f64>) -> Result<Array2<f64>> {
        let n = covariance.nrows();
        check_square(covariance, n)?;
        let diagonal = covariance.diag();
        if let Some(index) = diagonal.iter().position(|d| !(*d > 0.0) || !d.is_finite()) {
            return Err(Error::NotOnManifold(format!(
                "diagonal entry {} is {}, expected a positive variance",
                index, diagonal[index]
            )));
        }
        let scale = diagonal.mapv(|d| 1.0 / d.sqrt());
        let mut correlation = diag_action(&scale, covariance);
        correlation.diag_mut().fill(1.0);
        Ok(correlation)
    }
}

impl EmbeddedManifold for FullRankCorrelationMatrices {
    fn n(&self) -> usize {
        self.n
    }

    fn ambient_dim(&self) -> usize {
        self.n * (self.n + 1) / 2
    }

    fn dim(&self) -> usize {
        self.n * self.n.saturating_sub(1) / 2
    }

    fn belongs(&self, p: &Array2<f64>, atol: f64) -> bool {
        if p.shape() != [self.n, self.n] {
            return false;
        }
        let unit_diagonal = p.diag().iter().all(|d| (d - 1.0).abs() <= atol);
        unit_diagonal && is_symmetric(p, atol) && is_positive_definite(p)
    }

    fn is_tangent(&self, v: &Array2<f64>, _p: &Array2<f64>, atol: f64) -> bool {
        if v.shape() != [self.n, self.n] {
            return false;
        }
        is_symmetric(v, atol) && v.diag().iter().all(|d| d.abs() <= atol)
    }

    fn to_tangent(&self, v: &Array2<f64>, _p: &Array2<f64>) -> Result<Array2<f64>> {
        check_square(v, self.n)?;
        let mut tangent = symmetrize(v);
        tangent.diag_mut().fill(0.0);
        Ok(tangent)
    }

    /// SPD regularization followed by unit-diagonal rescaling
    fn projection(&self, p: &Array2<f64>) -> Result<Array2<f64>> {
        check_square(p, self.n)?;
        let spd_point = self.spd.project(p).map_err(|err| match err {
            Error::DimensionMismatch { .. } => err,
            other => Error::Projection(other.to_string()),
        })?;
        let correlation = Self::from_covariance(&spd_point)
            .map_err(|err| Error::Projection(err.to_string()))?;
        if !self.belongs(&correlation, VALIDATION_ATOL) {
            return Err(Error::Projection(
                "regularized matrix is not positive definite after rescaling".to_string(),
            ));
        }
        Ok(correlation)
    }

    fn random_point_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Array2<f64>> {
        let spd_point = self.spd.random_point_with(rng)?;
        self.projection(&spd_point)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{arr1, arr2};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_belongs() {
        let space = FullRankCorrelationMatrices::new(2);
        assert!(space.belongs(&arr2(&[[1.0, 0.5], [0.5, 1.0]]), 1e-12));
        // Unit diagonal but not positive definite
        assert!(!space.belongs(&arr2(&[[1.0, 2.0], [2.0, 1.0]]), 1e-12));
        // Positive definite but not unit diagonal
        assert!(!space.belongs(&arr2(&[[2.0, 0.5], [0.5, 1.0]]), 1e-12));
        assert!(!space.belongs(&Array2::eye(3), 1e-12));
    }

    #[test]
    fn test_projection_belongs() {
        let space = FullRankCorrelationMatrices::new(3);
        let mat = arr2(&[[2.0, 1.5, -0.3], [0.1, 4.0, 0.2], [0.0, 0.7, -1.0]]);
        let projected = space.projection(&mat).unwrap();
        assert!(space.belongs(&projected, 1e-10));
    }

    #[test]
    fn test_projection_of_large_indefinite_input() {
        let space = FullRankCorrelationMatrices::new(2);
        let mat = arr2(&[[1e6, 2e6], [2e6, 1e6]]);
        let projected = space.projection(&mat).unwrap();
        assert!(space.belongs(&projected, 1e-10));
        assert!(projected[[0, 1]] < 1.0);
    }

    #[test]
    fn test_projection_rejects_non_finite() {
        let space = FullRankCorrelationMatrices::new(2);
        let mat = arr2(&[[f64::NAN, 0.0], [0.0, 1.0]]);
        assert!(matches!(space.projection(&mat), Err(Error::Projection(_))));
        assert!(matches!(
            space.projection(&Array2::eye(3)),
            Err(Error::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_to_tangent_is_tangent() {
        let space = FullRankCorrelationMatrices::new(3);
        let point = Array2::eye(3);
        let vec = arr2(&[[1.0, 2.0, 3.0], [0.0, 5.0, 1.0], [1.0, 1.0, -2.0]]);
        let tangent = space.to_tangent(&vec, &point).unwrap();
        assert!(space.is_tangent(&tangent, &point, 1e-12));
        assert_relative_eq!(tangent[[0, 1]], 1.0, epsilon = 1e-12);
        assert!(!space.is_tangent(&vec, &point, 1e-12));
    }

    #[test]
    fn test_from_covariance() {
        let cov = arr2(&[[4.0, 1.0], [1.0, 9.0]]);
        let corr = FullRankCorrelationMatrices::from_covariance(&cov).unwrap();
        assert_relative_eq!(corr[[0, 1]], 1.0 / 6.0, epsilon = 1e-12);
        assert_eq!(corr[[0, 0]], 1.0);
        assert!(FullRankCorrelationMatrices::from_covariance(&arr2(&[[0.0, 0.0], [0.0, 1.0]])).is_err());
    }

    #[test]
    fn test_diag_action() {
        let point = arr2(&[[1.0, 0.5], [0.5, 1.0]]);
        let acted = FullRankCorrelationMatrices::diag_action(&arr1(&[2.0, 3.0]), &point);
        assert_relative_eq!(acted[[0, 0]], 4.0, epsilon = 1e-12);
        assert_relative_eq!(acted[[0, 1]], 3.0, epsilon = 1e-12);
        assert_relative_eq!(acted[[1, 1]], 9.0, epsilon = 1e-12);
    }

    #[test]
    fn test_random_point_belongs() {
        for (n, n_points) in [(2, 1), (2, 2), (3, 1), (3, 2), (5, 4)] {
            let space = FullRankCorrelationMatrices::new(n);
            let mut rng = StdRng::seed_from_u64(n as u64 * 31 + n_points as u64);
            let points = space.random_points_with(&mut rng, n_points).unwrap();
            assert_eq!(points.dim(), (n_points, n, n));
            assert!(space.belongs_batch(points.view(), 1e-10).iter().all(|&b| b));
        }
    }

    #[test]
    fn test_dimensions() {
        let space = FullRankCorrelationMatrices::new(4);
        assert_eq!(space.dim(), 6);
        assert_eq!(space.ambient_dim(), 10);
    }
}
