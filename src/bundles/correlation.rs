//! SPD(n) as a principal bundle over the full-rank correlation matrices.
//!
//! The structure group is the group of positive diagonal matrices acting by
//! congruence, P ↦ D·P·D, and the submersion normalizes to unit diagonal:
//!
//! ```text
//! π(P) = Δ^{-1/2} P Δ^{-1/2},   Δ = diag(P)
//! ```
//!
//! With the affine-invariant metric on SPD(n) the vertical space at P is
//! {D·P + P·D : D diagonal}, and a tangent vector H is horizontal iff
//! diag(P⁻¹ H) = 0.

use ndarray::{Array1, Array2};
use ndarray_linalg::Solve;

use crate::algorithms::alignment::FiberAligner;
use crate::core::bundle::FiberBundle;
use crate::core::linalg::{check_square, diag_action, diag_anticommutator, inverse};
use crate::core::{EmbeddedManifold, Error, Manifold, Result, VALIDATION_ATOL};
use crate::manifolds::{FullRankCorrelationMatrices, SPD};

pub struct CorrelationMatricesBundle {
    n: usize,
    total_space: SPD,
    base: FullRankCorrelationMatrices,
}

impl CorrelationMatricesBundle {
    pub fn new(n: usize) -> Result<Self> {
        if n == 0 {
            return Err(Error::InvalidParameter(
                "correlation bundle requires n ≥ 1".to_string(),
            ));
        }
        Ok(CorrelationMatricesBundle {
            n,
            total_space: SPD::new(n),
            base: FullRankCorrelationMatrices::new(n),
        })
    }

    pub fn n(&self) -> usize {
        self.n
    }

    /// Diagonal of `point`, rejecting entries that make Δ^{±1/2} blow up
    fn positive_diagonal(&self, point: &Array2<f64>) -> Result<Array1<f64>> {
        check_square(point, self.n)?;
        let diagonal = point.diag().to_owned();
        if let Some(index) = diagonal
            .iter()
            .position(|d| !d.is_finite() || *d <= f64::MIN_POSITIVE)
        {
            return Err(Error::Singular(format!(
                "diagonal entry {} of the fiber point is {:e}",
                index, diagonal[index]
            )));
        }
        Ok(diagonal)
    }

    /// The positive diagonal D* with D*·point·D* aligned to `base_point`
    pub fn alignment_element(
        &self,
        point: &Array2<f64>,
        base_point: &Array2<f64>,
        tol: f64,
        max_iter: usize,
    ) -> Result<Array1<f64>> {
        let aligned = self.align(point, base_point, tol, max_iter)?;
        let before = self.positive_diagonal(point)?;
        let after = self.positive_diagonal(&aligned)?;
        Ok((&after / &before).mapv(f64::sqrt))
    }

    /// Default alignment solver for quotient computations
    pub fn aligner(&self) -> FiberAligner {
        FiberAligner::new()
    }
}

impl FiberBundle for CorrelationMatricesBundle {
    type Total = SPD;
    type Base = FullRankCorrelationMatrices;

    fn total_space(&self) -> &SPD {
        &self.total_space
    }

    fn base(&self) -> &FullRankCorrelationMatrices {
        &self.base
    }

    fn group_dim(&self) -> usize {
        self.n
    }

    /// Δ^{-1/2}·P·Δ^{-1/2}, with the unit diagonal written exactly
    fn riemannian_submersion(&self, point: &Array2<f64>) -> Result<Array2<f64>> {
        self.total_space.validate_point(point)?;
        FullRankCorrelationMatrices::from_covariance(point)
    }

    /// A correlation matrix is its own representative in SPD(n)
    fn lift(&self, point: &Array2<f64>) -> Result<Array2<f64>> {
        check_square(point, self.n)?;
        if !self.base.belongs(point, VALIDATION_ATOL) {
            return Err(Error::NotOnManifold(
                "only correlation matrices can be lifted".to_string(),
            ));
        }
        Ok(point.clone())
    }

    /// Δ^{-1/2} (X − ½(D_X·P + P·D_X)) Δ^{-1/2} with D_X = diag(X)/diag(P)
    fn tangent_riemannian_submersion(
        &self,
        tangent_vec: &Array2<f64>,
        fiber_point: &Array2<f64>,
    ) -> Result<Array2<f64>> {
        check_square(tangent_vec, self.n)?;
        let diagonal = self.positive_diagonal(fiber_point)?;
        let ratio = &tangent_vec.diag() / &diagonal;
        let mut centered = tangent_vec - &(0.5 * diag_anticommutator(&ratio, fiber_point));
        centered.diag_mut().fill(0.0);
        Ok(diag_action(&diagonal.mapv(|d| 1.0 / d.sqrt()), &centered))
    }

    /// exp(s)·P·exp(s) entrywise, s being the log-diagonal
    fn group_action(&self, element: &Array1<f64>, point: &Array2<f64>) -> Result<Array2<f64>> {
        check_square(point, self.n)?;
        if element.len() != self.n {
            return Err(Error::DimensionMismatch {
                expected: self.n,
                got: element.len(),
            });
        }
        Ok(diag_action(&element.mapv(f64::exp), point))
    }

    /// D·P + P·D
    fn infinitesimal_action(
        &self,
        element: &Array1<f64>,
        fiber_point: &Array2<f64>,
    ) -> Result<Array2<f64>> {
        check_square(fiber_point, self.n)?;
        if element.len() != self.n {
            return Err(Error::DimensionMismatch {
                expected: self.n,
                got: element.len(),
            });
        }
        Ok(diag_anticommutator(element, fiber_point))
    }

    /// Solves (I + P∘P⁻¹)·d = diag(P⁻¹·X).
    ///
    /// Orthogonality of X − (D·P + P·D) to every vertical E·P + P·E under
    /// tr(P⁻¹·U·P⁻¹·V) reduces to diag(P⁻¹·(X − D·P − P·D)) = 0, and
    /// diag(P⁻¹·D·P)_i = Σ_k (P⁻¹)_ik P_ki d_k.
    fn vertical_coordinates(
        &self,
        tangent_vec: &Array2<f64>,
        fiber_point: &Array2<f64>,
    ) -> Result<Array1<f64>> {
        check_square(tangent_vec, self.n)?;
        check_square(fiber_point, self.n)?;
        let inverse_point = inverse(fiber_point)?;
        let operator = Array2::eye(self.n) + fiber_point * &inverse_point;
        let rhs = inverse_point.dot(tangent_vec).diag().to_owned();
        let solution = operator
            .solve(&rhs)
            .map_err(|err| Error::Singular(format!("vertical projection solve: {:?}", err)))?;
        if solution.iter().any(|v| !v.is_finite()) {
            return Err(Error::Singular(
                "vertical projection produced non-finite coefficients".to_string(),
            ));
        }
        Ok(solution)
    }

    /// Δ^{1/2}·W·Δ^{1/2}, which dπ maps back to W for zero-diagonal W
    fn tangent_lift(
        &self,
        tangent_vec: &Array2<f64>,
        fiber_point: &Array2<f64>,
    ) -> Result<Array2<f64>> {
        check_square(tangent_vec, self.n)?;
        let scale = self.positive_diagonal(fiber_point)?.mapv(f64::sqrt);
        if !self.base.is_tangent(tangent_vec, fiber_point, VALIDATION_ATOL) {
            return Err(Error::InvalidParameter(
                "base tangent vectors must be symmetric with zero diagonal".to_string(),
            ));
        }
        let tangent = self.base.to_tangent(tangent_vec, fiber_point)?;
        Ok(diag_action(&scale, &tangent))
    }
}
