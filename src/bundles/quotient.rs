use ndarray::{Array1, Array2, Array3, ArrayView3};

use crate::algorithms::alignment::{AlignmentResult, FiberAligner};
use crate::bundles::CorrelationMatricesBundle;
use crate::core::batch;
use crate::core::bundle::FiberBundle;
use crate::core::{EmbeddedManifold, Error, Manifold, Result, VALIDATION_ATOL};

/// Riemannian metric on the base of a fiber bundle, induced by the metric of
/// the total space through horizontal lifts
///
/// - exp: lift the vector horizontally, follow the total-space geodesic, submerse
/// - log: align the lifted endpoint, take the total-space log, push it down
pub struct QuotientMetric<B: FiberBundle> {
    bundle: B,
    aligner: FiberAligner,
}

/// Quotient of the affine-invariant metric on correlation matrices
pub type FullRankCorrelationAffineQuotientMetric = QuotientMetric<CorrelationMatricesBundle>;

impl FullRankCorrelationAffineQuotientMetric {
    /// Affine quotient metric on n×n correlation matrices
    pub fn correlation(n: usize) -> Result<Self> {
        Ok(QuotientMetric::new(CorrelationMatricesBundle::new(n)?))
    }
}

impl<B: FiberBundle> QuotientMetric<B> {
    pub fn new(bundle: B) -> Self {
        QuotientMetric {
            bundle,
            aligner: FiberAligner::new(),
        }
    }

    /// Set the solver used by `log` and `distance`
    pub fn with_aligner(mut self, aligner: FiberAligner) -> Self {
        self.aligner = aligner;
        self
    }

    pub fn bundle(&self) -> &B {
        &self.bundle
    }

    /// Representative of the fiber of `q` horizontally connected to lift(p)
    fn aligned_lift(&self, p: &Array2<f64>, q: &Array2<f64>) -> Result<(Array2<f64>, Array2<f64>)> {
        let fiber_p = self.bundle.lift(p)?;
        let fiber_q = self.bundle.lift(q)?;
        let AlignmentResult {
            point,
            converged,
            iterations,
            step_norm,
            ..
        } = self.bundle.align_with(&fiber_q, &fiber_p, &self.aligner)?;
        if !converged {
            return Err(Error::Convergence {
                iterations,
                residual: step_norm,
            });
        }
        Ok((fiber_p, point))
    }

    pub fn exp_batch(
        &self,
        base_points: ArrayView3<'_, f64>,
        tangent_vecs: ArrayView3<'_, f64>,
    ) -> Result<Array3<f64>> {
        batch::zip_points(base_points, tangent_vecs, |p, x| self.exp(p, x))
    }

    pub fn log_batch(
        &self,
        base_points: ArrayView3<'_, f64>,
        points: ArrayView3<'_, f64>,
    ) -> Result<Array3<f64>> {
        batch::zip_points(base_points, points, |p, q| self.log(p, q))
    }

    pub fn distance_batch(
        &self,
        first: ArrayView3<'_, f64>,
        second: ArrayView3<'_, f64>,
    ) -> Result<Array1<f64>> {
        batch::zip_scalars(first, second, |p, q| self.distance(p, q))
    }
}

impl<B: FiberBundle> Manifold for QuotientMetric<B> {
    type Point = Array2<f64>;
    type Vector = Array2<f64>;
    type Scalar = f64;

    fn exp_unchecked(&self, p: &Self::Point, x: &Self::Vector) -> Result<Self::Point> {
        let fiber_point = self.bundle.lift(p)?;
        let horizontal = self.bundle.horizontal_lift(x, &fiber_point)?;
        let end = self
            .bundle
            .total_space()
            .exp_unchecked(&fiber_point, &horizontal)?;
        self.bundle.riemannian_submersion(&end)
    }

    fn log_unchecked(&self, p: &Self::Point, q: &Self::Point) -> Result<Self::Vector> {
        let (fiber_p, aligned) = self.aligned_lift(p, q)?;
        let log = self.bundle.total_space().log_unchecked(&fiber_p, &aligned)?;
        self.bundle.tangent_riemannian_submersion(&log, &fiber_p)
    }

    /// g_p(x, y) = G_{lift(p)}(x^h, y^h)
    fn metric(&self, p: &Self::Point, x: &Self::Vector, y: &Self::Vector) -> Result<Self::Scalar> {
        let fiber_point = self.bundle.lift(p)?;
        let x_h = self.bundle.horizontal_lift(x, &fiber_point)?;
        let y_h = self.bundle.horizontal_lift(y, &fiber_point)?;
        self.bundle.total_space().metric(&fiber_point, &x_h, &y_h)
    }

    /// Total-space distance between lift(p) and the aligned lift(q)
    fn distance(&self, p: &Self::Point, q: &Self::Point) -> Result<Self::Scalar> {
        self.validate_point(p)?;
        self.validate_point(q)?;
        let (fiber_p, aligned) = self.aligned_lift(p, q)?;
        self.bundle.total_space().distance(&fiber_p, &aligned)
    }

    fn project(&self, p: &Self::Point) -> Result<Self::Point> {
        self.bundle.base().projection(p)
    }

    fn project_tangent(&self, p: &Self::Point, x: &Self::Vector) -> Result<Self::Vector> {
        self.bundle.base().to_tangent(x, p)
    }

    fn validate_point(&self, p: &Self::Point) -> Result<()> {
        if !self.bundle.base().belongs(p, VALIDATION_ATOL) {
            return Err(Error::NotOnManifold(
                "point is not in the base of the bundle".to_string(),
            ));
        }
        Ok(())
    }

    fn validate_vector(&self, p: &Self::Point, x: &Self::Vector) -> Result<()> {
        if !self.bundle.base().is_tangent(x, p, VALIDATION_ATOL) {
            return Err(Error::InvalidParameter(
                "vector is not tangent to the base".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::arr2;

    fn points() -> (Array2<f64>, Array2<f64>) {
        (
            arr2(&[[1.0, 0.3, -0.2], [0.3, 1.0, 0.4], [-0.2, 0.4, 1.0]]),
            arr2(&[[1.0, -0.1, 0.5], [-0.1, 1.0, 0.2], [0.5, 0.2, 1.0]]),
        )
    }

    #[test]
    fn test_exp_log_round_trip() {
        let metric = FullRankCorrelationAffineQuotientMetric::correlation(3).unwrap();
        let (base_point, point) = points();

        let log = metric.log(&base_point, &point).unwrap();
        assert!(metric.bundle().base().is_tangent(&log, &base_point, 1e-12));

        let recovered = metric.exp(&base_point, &log).unwrap();
        for (x, y) in recovered.iter().zip(point.iter()) {
            assert_relative_eq!(*x, *y, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_distance_is_log_norm() {
        let metric = FullRankCorrelationAffineQuotientMetric::correlation(3).unwrap();
        let (base_point, point) = points();

        let log = metric.log(&base_point, &point).unwrap();
        let norm = metric.norm(&base_point, &log).unwrap();
        let distance = metric.distance(&base_point, &point).unwrap();
        assert_relative_eq!(norm, distance, epsilon = 1e-8);
        assert_relative_eq!(metric.distance(&point, &point).unwrap(), 0.0, epsilon = 1e-10);
    }

    #[test]
    fn test_metric_symmetry() {
        let metric = FullRankCorrelationAffineQuotientMetric::correlation(3).unwrap();
        let (base_point, _) = points();
        let x = arr2(&[[0.0, 0.1, 0.2], [0.1, 0.0, -0.3], [0.2, -0.3, 0.0]]);
        let y = arr2(&[[0.0, -0.5, 0.1], [-0.5, 0.0, 0.4], [0.1, 0.4, 0.0]]);

        let gxy = metric.metric(&base_point, &x, &y).unwrap();
        let gyx = metric.metric(&base_point, &y, &x).unwrap();
        assert_relative_eq!(gxy, gyx, epsilon = 1e-12);
        assert!(metric.metric(&base_point, &x, &x).unwrap() > 0.0);
    }

    #[test]
    fn test_rejects_invalid_inputs() {
        let metric = FullRankCorrelationAffineQuotientMetric::correlation(2).unwrap();
        let base_point = arr2(&[[1.0, 0.5], [0.5, 1.0]]);
        let not_tangent = arr2(&[[1.0, 0.1], [0.1, 0.0]]);
        let not_correlation = arr2(&[[2.0, 0.5], [0.5, 1.0]]);

        assert!(metric.exp(&base_point, &not_tangent).is_err());
        assert!(metric.log(&base_point, &not_correlation).unwrap_err().is_domain());
    }
}
