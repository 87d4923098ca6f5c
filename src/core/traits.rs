use ndarray::{Array1, Array2, Array3, ArrayView3};
use num_traits::Float;
use rand::Rng;

use crate::core::batch;
use crate::core::error::Result;

/// Core trait for a Riemannian manifold
/// All manifolds are assumed to be smooth
pub trait Manifold {
    /// Point on the manifold
    type Point;

    /// Tangent vector at a point
    type Vector;

    /// Scalar field (f64 or f32)
    type Scalar: Float;

    /// Exponential map: TpM → M (unchecked, assumes valid input)
    ///
    /// Maps tangent vector x at point p to a point on the manifold.
    /// Skips input validation; numerical failures are still reported.
    fn exp_unchecked(&self, p: &Self::Point, x: &Self::Vector) -> Result<Self::Point>;

    /// Exponential map with validation
    ///
    /// Validates inputs before calling `exp_unchecked`.
    fn exp(&self, p: &Self::Point, x: &Self::Vector) -> Result<Self::Point> {
        self.validate_point(p)?;
        self.validate_vector(p, x)?;
        self.exp_unchecked(p, x)
    }

    /// Logarithmic map: M → TpM (unchecked, assumes valid input)
    ///
    /// Inverse of exp: finds tangent vector at p pointing to q.
    fn log_unchecked(&self, p: &Self::Point, q: &Self::Point) -> Result<Self::Vector>;

    /// Logarithmic map with validation
    ///
    /// Validates inputs before calling `log_unchecked`.
    fn log(&self, p: &Self::Point, q: &Self::Point) -> Result<Self::Vector> {
        self.validate_point(p)?;
        self.validate_point(q)?;
        self.log_unchecked(p, q)
    }

    /// Riemannian metric: g_p(x, y) for x, y ∈ TpM
    fn metric(&self, p: &Self::Point, x: &Self::Vector, y: &Self::Vector) -> Result<Self::Scalar>;

    /// Norm of a tangent vector induced by the metric
    fn norm(&self, p: &Self::Point, x: &Self::Vector) -> Result<Self::Scalar> {
        Ok(self.metric(p, x, x)?.abs().sqrt())
    }

    /// Riemannian distance between two points
    fn distance(&self, p: &Self::Point, q: &Self::Point) -> Result<Self::Scalar> {
        let x = self.log(p, q)?;
        self.norm(p, &x)
    }

    /// Project a point onto the manifold (for constraints)
    fn project(&self, p: &Self::Point) -> Result<Self::Point>
    where
        Self::Point: Clone,
    {
        Ok(p.clone())
    }

    /// Project a vector onto the tangent space at p
    fn project_tangent(&self, _p: &Self::Point, x: &Self::Vector) -> Result<Self::Vector>
    where
        Self::Vector: Clone,
    {
        Ok(x.clone())
    }

    /// Validate that a point lies on the manifold
    ///
    /// Default implementation is optimistic (always returns Ok).
    /// Override to add actual validation.
    fn validate_point(&self, _p: &Self::Point) -> Result<()> {
        Ok(())
    }

    /// Validate that a vector is in the tangent space at p
    ///
    /// Default implementation is optimistic (always returns Ok).
    /// Override to add actual validation.
    fn validate_vector(&self, _p: &Self::Point, _x: &Self::Vector) -> Result<()> {
        Ok(())
    }
}

/// A manifold of n×n real matrices, embedded in the matrix space.
///
/// Carries the membership surface: tests, projections and sampling. The
/// batched methods take an `Array3` whose first axis indexes samples.
pub trait EmbeddedManifold: Sync {
    /// Matrix size n
    fn n(&self) -> usize;

    /// Dimension of the ambient linear space
    fn ambient_dim(&self) -> usize;

    /// Intrinsic dimension
    fn dim(&self) -> usize;

    fn belongs(&self, p: &Array2<f64>, atol: f64) -> bool;

    fn is_tangent(&self, v: &Array2<f64>, p: &Array2<f64>, atol: f64) -> bool;

    fn to_tangent(&self, v: &Array2<f64>, p: &Array2<f64>) -> Result<Array2<f64>>;

    /// Map an arbitrary square matrix onto the manifold
    fn projection(&self, p: &Array2<f64>) -> Result<Array2<f64>>;

    fn random_point_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Array2<f64>>;

    /// `n_samples` random points drawn with the thread-local generator
    fn random_point(&self, n_samples: usize) -> Result<Array3<f64>> {
        let mut rng = rand::thread_rng();
        self.random_points_with(&mut rng, n_samples)
    }

    fn random_points_with<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        n_samples: usize,
    ) -> Result<Array3<f64>> {
        let points = (0..n_samples)
            .map(|_| self.random_point_with(&mut *rng))
            .collect::<Result<Vec<_>>>()?;
        batch::stack((self.n(), self.n()), points)
    }

    fn belongs_batch(&self, points: ArrayView3<'_, f64>, atol: f64) -> Array1<bool> {
        batch::map_flags(points, |p| self.belongs(p, atol))
    }

    fn is_tangent_batch(
        &self,
        vecs: ArrayView3<'_, f64>,
        points: ArrayView3<'_, f64>,
        atol: f64,
    ) -> Result<Array1<bool>> {
        batch::zip_flags(vecs, points, |v, p| Ok(self.is_tangent(v, p, atol)))
    }

    fn to_tangent_batch(
        &self,
        vecs: ArrayView3<'_, f64>,
        points: ArrayView3<'_, f64>,
    ) -> Result<Array3<f64>> {
        batch::zip_points(vecs, points, |v, p| self.to_tangent(v, p))
    }

    fn projection_batch(&self, points: ArrayView3<'_, f64>) -> Result<Array3<f64>> {
        batch::map_points(points, |p| self.projection(p))
    }
}
