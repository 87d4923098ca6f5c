use ndarray::Array2;
use rand::Rng;

use crate::core::linalg::{check_square, is_symmetric, symmetrize};
use crate::core::{EmbeddedManifold, Error, Manifold, Result};

/// Vector space Sym(n) of symmetric n×n matrices with the Frobenius metric
///
/// Used as the tangent model of SPD(n) and as a source of random tangent
/// vectors.
pub struct SymmetricMatrices {
    n: usize,
    /// Entries of random points are drawn uniformly from [-bound, bound]
    bound: f64,
}

impl SymmetricMatrices {
    pub fn new(n: usize) -> Self {
        SymmetricMatrices { n, bound: 1.0 }
    }

    pub fn with_bound(mut self, bound: f64) -> Self {
        self.bound = bound;
        self
    }
}

impl Manifold for SymmetricMatrices {
    type Point = Array2<f64>;
    type Vector = Array2<f64>;
    type Scalar = f64;

    /// Exponential map: simple addition in a vector space (unchecked)
    fn exp_unchecked(&self, p: &Self::Point, x: &Self::Vector) -> Result<Self::Point> {
        Ok(p + x)
    }

    /// Logarithmic map: simple subtraction in a vector space (unchecked)
    fn log_unchecked(&self, p: &Self::Point, q: &Self::Point) -> Result<Self::Vector> {
        Ok(q - p)
    }

    /// Frobenius metric: g(x, y) = tr(xᵀ y)
    fn metric(&self, _p: &Self::Point, x: &Self::Vector, y: &Self::Vector) -> Result<Self::Scalar> {
        Ok((x * y).sum())
    }

    fn project(&self, p: &Self::Point) -> Result<Self::Point> {
        check_square(p, self.n)?;
        Ok(symmetrize(p))
    }

    fn project_tangent(&self, _p: &Self::Point, x: &Self::Vector) -> Result<Self::Vector> {
        check_square(x, self.n)?;
        Ok(symmetrize(x))
    }

    fn validate_point(&self, p: &Self::Point) -> Result<()> {
        check_square(p, self.n)?;
        if !is_symmetric(p, 1e-10) {
            return Err(Error::NotOnManifold("matrix is not symmetric".to_string()));
        }
        Ok(())
    }

    fn validate_vector(&self, p: &Self::Point, x: &Self::Vector) -> Result<()> {
        self.validate_point(p)?;
        self.validate_point(x)
    }
}

impl EmbeddedManifold for SymmetricMatrices {
    fn n(&self) -> usize {
        self.n
    }

    fn ambient_dim(&self) -> usize {
        self.n * self.n
    }

    fn dim(&self) -> usize {
        self.n * (self.n + 1) / 2
    }

    fn belongs(&self, p: &Array2<f64>, atol: f64) -> bool {
        p.dim() == (self.n, self.n) && is_symmetric(p, atol)
    }

    fn is_tangent(&self, v: &Array2<f64>, _p: &Array2<f64>, atol: f64) -> bool {
        self.belongs(v, atol)
    }

    fn to_tangent(&self, v: &Array2<f64>, p: &Array2<f64>) -> Result<Array2<f64>> {
        self.project_tangent(p, v)
    }

    fn projection(&self, p: &Array2<f64>) -> Result<Array2<f64>> {
        self.project(p)
    }

    fn random_point_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Array2<f64>> {
        if !(self.bound > 0.0) {
            return Err(Error::InvalidParameter(format!(
                "sampling bound must be positive, got {}",
                self.bound
            )));
        }
        let mut p = Array2::zeros((self.n, self.n));
        for i in 0..self.n {
            for j in i..self.n {
                let value = rng.gen_range(-self.bound..=self.bound);
                p[[i, j]] = value;
                p[[j, i]] = value;
            }
        }
        Ok(p)
    }
}
