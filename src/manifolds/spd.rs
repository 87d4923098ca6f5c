use ndarray::Array2;
use rand::Rng;

use crate::core::linalg::{
    check_square, eigenvalues, expm_sym, inv_sqrtm_spd, inverse, is_positive_definite,
    is_symmetric, logm_spd, spectral_map, sqrtm_spd, symmetrize, trace_product,
};
use crate::core::{EmbeddedManifold, Error, Manifold, Result};
use crate::manifolds::SymmetricMatrices;

/// Smallest eigenvalue kept by `project`, relative to max(1, λ_max)
const MIN_EIGENVALUE: f64 = 1e-10;

/// Manifold of Symmetric Positive Definite (SPD) matrices
/// with the affine-invariant Riemannian metric
///
/// SPD(n) = {P ∈ R^{n×n} : P = P^T, P ≻ 0}
///
/// This is the natural manifold for:
/// - Covariance matrices
/// - Precision matrices
/// - The total space of the correlation bundle
///
/// The affine-invariant metric makes it invariant under congruence transformations:
/// if P is SPD, then so is A^T P A for any invertible A.
pub struct SPD {
    /// Dimension of the matrices (n x n)
    dim: usize,
}

impl SPD {
    pub fn new(dim: usize) -> Self {
        SPD { dim }
    }

    /// Check if matrix is symmetric positive definite
    fn is_spd(&self, p: &Array2<f64>, tolerance: f64) -> bool {
        if p.shape() != [self.dim, self.dim] {
            return false;
        }
        is_symmetric(p, tolerance) && is_positive_definite(p)
    }
}

impl Manifold for SPD {
    type Point = Array2<f64>;
    type Vector = Array2<f64>;
    type Scalar = f64;

    /// exp_P(X) = P^{1/2} exp(P^{-1/2} X P^{-1/2}) P^{1/2}
    fn exp_unchecked(&self, p: &Self::Point, x: &Self::Vector) -> Result<Self::Point> {
        let p_sqrt = sqrtm_spd(p)?;
        let p_inv_sqrt = inv_sqrtm_spd(p)?;

        // Y = P^{-1/2} X P^{-1/2}
        let y = p_inv_sqrt.dot(&symmetrize(x)).dot(&p_inv_sqrt);
        let exp_y = expm_sym(&y)?;

        Ok(symmetrize(&p_sqrt.dot(&exp_y).dot(&p_sqrt)))
    }

    /// log_P(Q) = P^{1/2} log(P^{-1/2} Q P^{-1/2}) P^{1/2}
    fn log_unchecked(&self, p: &Self::Point, q: &Self::Point) -> Result<Self::Vector> {
        let p_sqrt = sqrtm_spd(p)?;
        let p_inv_sqrt = inv_sqrtm_spd(p)?;

        let y = p_inv_sqrt.dot(q).dot(&p_inv_sqrt);
        let log_y = logm_spd(&y)?;

        Ok(symmetrize(&p_sqrt.dot(&log_y).dot(&p_sqrt)))
    }

    /// Affine-invariant metric: g_P(X, Y) = tr(P^{-1} X P^{-1} Y)
    fn metric(&self, p: &Self::Point, x: &Self::Vector, y: &Self::Vector) -> Result<Self::Scalar> {
        let p_inv = inverse(p)?;
        Ok(trace_product(&p_inv.dot(x), &p_inv.dot(y)))
    }

    /// d(P, Q) = ||log(P^{-1/2} Q P^{-1/2})||_F
    fn distance(&self, p: &Self::Point, q: &Self::Point) -> Result<Self::Scalar> {
        self.validate_point(p)?;
        self.validate_point(q)?;
        let p_inv_sqrt = inv_sqrtm_spd(p)?;
        let y = p_inv_sqrt.dot(q).dot(&p_inv_sqrt);
        let log_y = logm_spd(&y)?;
        Ok(log_y.iter().map(|v| v * v).sum::<f64>().sqrt())
    }

    fn project(&self, p: &Self::Point) -> Result<Self::Point> {
        check_square(p, self.dim)?;
        if p.iter().any(|v| !v.is_finite()) {
            return Err(Error::NotOnManifold(
                "matrix has non-finite entries".to_string(),
            ));
        }
        // An absolute floor vanishes below the rounding of large entries
        let top = eigenvalues(p)?.iter().cloned().fold(1.0, f64::max);
        let floor = MIN_EIGENVALUE * top;
        spectral_map(p, |lambda| lambda.max(floor))
    }

    /// T_P SPD(n) = Sym(n)
    fn project_tangent(&self, _p: &Self::Point, x: &Self::Vector) -> Result<Self::Vector> {
        check_square(x, self.dim)?;
        Ok(symmetrize(x))
    }

    fn validate_point(&self, p: &Self::Point) -> Result<()> {
        check_square(p, self.dim)?;
        if !self.is_spd(p, 1e-10) {
            return Err(Error::NotOnManifold(
                "Matrix is not symmetric positive definite".to_string(),
            ));
        }
        Ok(())
    }

    fn validate_vector(&self, _p: &Self::Point, x: &Self::Vector) -> Result<()> {
        check_square(x, self.dim)?;
        if !is_symmetric(x, 1e-10) {
            return Err(Error::InvalidParameter(
                "Tangent vector must be symmetric".to_string(),
            ));
        }
        Ok(())
    }
}

impl EmbeddedManifold for SPD {
    fn n(&self) -> usize {
        self.dim
    }

    fn ambient_dim(&self) -> usize {
        self.dim * self.dim
    }

    fn dim(&self) -> usize {
        // Open subset of Sym(n)
        self.dim * (self.dim + 1) / 2
    }

    fn belongs(&self, p: &Array2<f64>, atol: f64) -> bool {
        self.is_spd(p, atol)
    }

    fn is_tangent(&self, v: &Array2<f64>, _p: &Array2<f64>, atol: f64) -> bool {
        v.shape() == [self.dim, self.dim] && is_symmetric(v, atol)
    }

    fn to_tangent(&self, v: &Array2<f64>, p: &Array2<f64>) -> Result<Array2<f64>> {
        self.project_tangent(p, v)
    }

    fn projection(&self, p: &Array2<f64>) -> Result<Array2<f64>> {
        self.project(p)
    }

    /// exp of a symmetric matrix with uniform entries in [-1, 1]
    fn random_point_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Array2<f64>> {
        let tangent = SymmetricMatrices::new(self.dim).random_point_with(rng)?;
        expm_sym(&tangent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::arr2;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_spd_exp_log_inverse() {
        let spd = SPD::new(2);
        let p = arr2(&[[4.0, 1.0], [1.0, 3.0]]);
        let x = arr2(&[[0.1, 0.05], [0.05, 0.2]]);

        let q = spd.exp(&p, &x).unwrap();
        let x_recovered = spd.log(&p, &q).unwrap();

        for i in 0..2 {
            for j in 0..2 {
                assert_relative_eq!(x[[i, j]], x_recovered[[i, j]], epsilon = 1e-10);
            }
        }
    }

    #[test]
    fn test_spd_metric_symmetry() {
        let spd = SPD::new(2);
        let p = arr2(&[[2.0, 0.5], [0.5, 3.0]]);
        let x = arr2(&[[0.1, 0.0], [0.0, 0.1]]);
        let y = arr2(&[[0.2, 0.1], [0.1, 0.3]]);

        let gxy = spd.metric(&p, &x, &y).unwrap();
        let gyx = spd.metric(&p, &y, &x).unwrap();

        assert_relative_eq!(gxy, gyx, epsilon = 1e-12);
    }

    #[test]
    fn test_spd_metric_at_identity_is_frobenius() {
        let spd = SPD::new(2);
        let identity = Array2::eye(2);
        let x = arr2(&[[1.0, 2.0], [2.0, 3.0]]);
        assert_relative_eq!(spd.metric(&identity, &x, &x).unwrap(), 18.0, epsilon = 1e-12);
    }

    #[test]
    fn test_spd_distance_matches_log_norm() {
        let spd = SPD::new(2);
        let p = arr2(&[[2.0, 0.3], [0.3, 1.0]]);
        let q = arr2(&[[1.0, -0.2], [-0.2, 3.0]]);

        let direct = spd.distance(&p, &q).unwrap();
        let log = spd.log(&p, &q).unwrap();
        let via_log = spd.norm(&p, &log).unwrap();
        assert_relative_eq!(direct, via_log, epsilon = 1e-10);
    }

    #[test]
    fn test_spd_project() {
        let spd = SPD::new(2);
        let indefinite = arr2(&[[1.0, 2.0], [2.0, 1.0]]);
        let projected = spd.project(&indefinite).unwrap();
        assert!(spd.belongs(&projected, 1e-12));
    }

    #[test]
    fn test_spd_project_large_indefinite() {
        let spd = SPD::new(2);
        let indefinite = arr2(&[[1e6, 2e6], [2e6, 1e6]]);
        let projected = spd.project(&indefinite).unwrap();
        assert!(spd.belongs(&projected, 1e-6));
        assert!(eigenvalues(&projected).unwrap()[0] > 0.0);
    }

    #[test]
    fn test_spd_project_tangent() {
        let spd = SPD::new(2);
        let p = arr2(&[[2.0, 0.0], [0.0, 3.0]]);
        let x = arr2(&[[1.0, 0.5], [0.3, 2.0]]); // Not symmetric

        let x_tan = spd.project_tangent(&p, &x).unwrap();
        assert!(spd.is_tangent(&x_tan, &p, 0.0));
        assert_relative_eq!(x_tan[[0, 1]], 0.4, epsilon = 1e-12);
    }

    #[test]
    fn test_spd_validation() {
        let spd = SPD::new(2);
        let indefinite = arr2(&[[1.0, 2.0], [2.0, 1.0]]);
        assert!(spd.validate_point(&indefinite).is_err());
        assert!(spd.log(&indefinite, &Array2::eye(2)).is_err());
    }

    #[test]
    fn test_spd_random_points_belong() {
        let spd = SPD::new(4);
        let mut rng = StdRng::seed_from_u64(11);
        let points = spd.random_points_with(&mut rng, 6).unwrap();
        assert!(spd.belongs_batch(points.view(), 1e-10).iter().all(|&b| b));
    }

    #[test]
    fn test_spd_dimensions() {
        let spd = SPD::new(3);
        assert_eq!(spd.ambient_dim(), 9);
        assert_eq!(EmbeddedManifold::dim(&spd), 6);
    }
}
