use ndarray::{Array1, Array2, Array3, ArrayView3};

use crate::algorithms::alignment::{AlignmentResult, Convergence, FiberAligner};
use crate::core::batch;
use crate::core::error::{Error, Result};
use crate::core::linalg::max_abs;
use crate::core::traits::{EmbeddedManifold, Manifold};

/// Principal bundle structure π: E → B with a structure group acting on E
///
/// The total space E carries a Riemannian metric; the vertical space at a
/// fiber point is the tangent space of the group orbit, the horizontal space
/// its metric-orthogonal complement. Implementors supply the submersion, the
/// group action and its linearization; the splitting, horizontal lift and
/// alignment are derived from those.
///
/// Group elements are given by Lie algebra coordinates, `group_action(0, p) = p`.
pub trait FiberBundle: Sync {
    type Total: Manifold<Point = Array2<f64>, Vector = Array2<f64>, Scalar = f64>
        + EmbeddedManifold;
    type Base: EmbeddedManifold;

    fn total_space(&self) -> &Self::Total;

    fn base(&self) -> &Self::Base;

    /// Dimension of the structure group
    fn group_dim(&self) -> usize;

    /// π: E → B
    fn riemannian_submersion(&self, point: &Array2<f64>) -> Result<Array2<f64>>;

    /// A section of π: B → E
    fn lift(&self, point: &Array2<f64>) -> Result<Array2<f64>>;

    /// dπ at `fiber_point`
    fn tangent_riemannian_submersion(
        &self,
        tangent_vec: &Array2<f64>,
        fiber_point: &Array2<f64>,
    ) -> Result<Array2<f64>>;

    /// Action of exp(element) on `point`
    fn group_action(&self, element: &Array1<f64>, point: &Array2<f64>) -> Result<Array2<f64>>;

    /// Derivative of the action at the identity: the vertical vector generated
    /// by an algebra element.
    fn infinitesimal_action(
        &self,
        element: &Array1<f64>,
        fiber_point: &Array2<f64>,
    ) -> Result<Array2<f64>>;

    /// Algebra coordinates of the vertical component of `tangent_vec`
    fn vertical_coordinates(
        &self,
        tangent_vec: &Array2<f64>,
        fiber_point: &Array2<f64>,
    ) -> Result<Array1<f64>>;

    /// Any total-space vector at `fiber_point` mapped by dπ to `tangent_vec`
    fn tangent_lift(
        &self,
        tangent_vec: &Array2<f64>,
        fiber_point: &Array2<f64>,
    ) -> Result<Array2<f64>>;

    fn vertical_projection(
        &self,
        tangent_vec: &Array2<f64>,
        fiber_point: &Array2<f64>,
    ) -> Result<Array2<f64>> {
        let coordinates = self.vertical_coordinates(tangent_vec, fiber_point)?;
        self.infinitesimal_action(&coordinates, fiber_point)
    }

    fn horizontal_projection(
        &self,
        tangent_vec: &Array2<f64>,
        fiber_point: &Array2<f64>,
    ) -> Result<Array2<f64>> {
        let vertical = self.vertical_projection(tangent_vec, fiber_point)?;
        Ok(tangent_vec - &vertical)
    }

    fn is_vertical(
        &self,
        tangent_vec: &Array2<f64>,
        fiber_point: &Array2<f64>,
        atol: f64,
    ) -> Result<bool> {
        let horizontal = self.horizontal_projection(tangent_vec, fiber_point)?;
        Ok(max_abs(&horizontal) <= atol)
    }

    fn is_horizontal(
        &self,
        tangent_vec: &Array2<f64>,
        fiber_point: &Array2<f64>,
        atol: f64,
    ) -> Result<bool> {
        let vertical = self.vertical_projection(tangent_vec, fiber_point)?;
        Ok(max_abs(&vertical) <= atol)
    }

    /// The unique horizontal vector at `fiber_point` that dπ maps to `tangent_vec`
    fn horizontal_lift(
        &self,
        tangent_vec: &Array2<f64>,
        fiber_point: &Array2<f64>,
    ) -> Result<Array2<f64>> {
        let lifted = self.tangent_lift(tangent_vec, fiber_point)?;
        self.horizontal_projection(&lifted, fiber_point)
    }

    /// Move `point` along its fiber until it is horizontally connected to
    /// `base_point`.
    ///
    /// Fails with `Error::Convergence` when `tol` is not reached within
    /// `max_iter` iterations.
    fn align(
        &self,
        point: &Array2<f64>,
        base_point: &Array2<f64>,
        tol: f64,
        max_iter: usize,
    ) -> Result<Array2<f64>> {
        let aligner = FiberAligner::new().with_convergence(Convergence {
            max_iterations: max_iter,
            step_tol: tol,
        });
        let result = self.align_with(point, base_point, &aligner)?;
        if !result.converged {
            return Err(Error::Convergence {
                iterations: result.iterations,
                residual: result.step_norm,
            });
        }
        Ok(result.point)
    }

    /// Alignment with full control over the solver; reports instead of failing
    /// when the iteration budget runs out.
    fn align_with(
        &self,
        point: &Array2<f64>,
        base_point: &Array2<f64>,
        aligner: &FiberAligner,
    ) -> Result<AlignmentResult> {
        aligner.align(self, point, base_point)
    }

    fn riemannian_submersion_batch(&self, points: ArrayView3<'_, f64>) -> Result<Array3<f64>> {
        batch::map_points(points, |p| self.riemannian_submersion(p))
    }

    fn lift_batch(&self, points: ArrayView3<'_, f64>) -> Result<Array3<f64>> {
        batch::map_points(points, |p| self.lift(p))
    }

    fn tangent_riemannian_submersion_batch(
        &self,
        tangent_vecs: ArrayView3<'_, f64>,
        fiber_points: ArrayView3<'_, f64>,
    ) -> Result<Array3<f64>> {
        batch::zip_points(tangent_vecs, fiber_points, |v, p| {
            self.tangent_riemannian_submersion(v, p)
        })
    }

    fn vertical_projection_batch(
        &self,
        tangent_vecs: ArrayView3<'_, f64>,
        fiber_points: ArrayView3<'_, f64>,
    ) -> Result<Array3<f64>> {
        batch::zip_points(tangent_vecs, fiber_points, |v, p| {
            self.vertical_projection(v, p)
        })
    }

    fn horizontal_projection_batch(
        &self,
        tangent_vecs: ArrayView3<'_, f64>,
        fiber_points: ArrayView3<'_, f64>,
    ) -> Result<Array3<f64>> {
        batch::zip_points(tangent_vecs, fiber_points, |v, p| {
            self.horizontal_projection(v, p)
        })
    }

    fn is_vertical_batch(
        &self,
        tangent_vecs: ArrayView3<'_, f64>,
        fiber_points: ArrayView3<'_, f64>,
        atol: f64,
    ) -> Result<Array1<bool>> {
        batch::zip_flags(tangent_vecs, fiber_points, |v, p| {
            self.is_vertical(v, p, atol)
        })
    }

    fn is_horizontal_batch(
        &self,
        tangent_vecs: ArrayView3<'_, f64>,
        fiber_points: ArrayView3<'_, f64>,
        atol: f64,
    ) -> Result<Array1<bool>> {
        batch::zip_flags(tangent_vecs, fiber_points, |v, p| {
            self.is_horizontal(v, p, atol)
        })
    }

    fn horizontal_lift_batch(
        &self,
        tangent_vecs: ArrayView3<'_, f64>,
        fiber_points: ArrayView3<'_, f64>,
    ) -> Result<Array3<f64>> {
        batch::zip_points(tangent_vecs, fiber_points, |v, p| {
            self.horizontal_lift(v, p)
        })
    }

    fn align_batch(
        &self,
        points: ArrayView3<'_, f64>,
        base_points: ArrayView3<'_, f64>,
        tol: f64,
        max_iter: usize,
    ) -> Result<Array3<f64>> {
        batch::zip_points(points, base_points, |p, b| self.align(p, b, tol, max_iter))
    }
}
