//! Dense linear algebra shared by every manifold and bundle in the crate.
//!
//! All matrix functions of symmetric arguments go through one eigendecomposition
//! routine, so the geometric code never talks to LAPACK directly.

use ndarray::{Array1, Array2};
use ndarray_linalg::{Cholesky, Eigh, Inverse, UPLO};

use crate::core::error::{Error, Result};

/// Symmetric part ½(A + Aᵀ)
pub fn symmetrize(a: &Array2<f64>) -> Array2<f64> {
    0.5 * (a + &a.t())
}

/// Require a square n×n matrix.
pub fn check_square(a: &Array2<f64>, n: usize) -> Result<()> {
    if a.nrows() != n {
        return Err(Error::DimensionMismatch {
            expected: n,
            got: a.nrows(),
        });
    }
    if a.ncols() != n {
        return Err(Error::DimensionMismatch {
            expected: n,
            got: a.ncols(),
        });
    }
    Ok(())
}

pub fn is_symmetric(a: &Array2<f64>, atol: f64) -> bool {
    if !a.is_square() {
        return false;
    }
    let n = a.nrows();
    for i in 0..n {
        for j in i + 1..n {
            if (a[[i, j]] - a[[j, i]]).abs() > atol {
                return false;
            }
        }
    }
    true
}

/// Positive definiteness via Cholesky
pub fn is_positive_definite(a: &Array2<f64>) -> bool {
    a.iter().all(|x| x.is_finite()) && a.cholesky(UPLO::Lower).is_ok()
}

/// Largest absolute entry, the norm used by the `atol` membership tests.
pub fn max_abs(a: &Array2<f64>) -> f64 {
    a.iter().fold(0.0, |acc, x| acc.max(x.abs()))
}

/// Q f(Λ) Qᵀ for the eigendecomposition A = Q Λ Qᵀ of the symmetric part of A
pub fn spectral_map<F>(a: &Array2<f64>, f: F) -> Result<Array2<f64>>
where
    F: Fn(f64) -> f64,
{
    let (eigenvalues, eigenvectors) = symmetrize(a).eigh(UPLO::Lower)?;
    let mapped = eigenvalues.mapv(f);
    if mapped.iter().any(|v| !v.is_finite()) {
        return Err(Error::NotOnManifold(
            "matrix function undefined on spectrum".to_string(),
        ));
    }
    // Broadcasting scales column j of Q by f(λ_j)
    let result = (&eigenvectors * &mapped).dot(&eigenvectors.t());
    Ok(symmetrize(&result))
}

/// Eigenvalues of the symmetric part of A, ascending
pub fn eigenvalues(a: &Array2<f64>) -> Result<Array1<f64>> {
    let (eigenvalues, _) = symmetrize(a).eigh(UPLO::Lower)?;
    Ok(eigenvalues)
}

fn require_positive_spectrum(a: &Array2<f64>) -> Result<()> {
    let min = eigenvalues(a)?.iter().cloned().fold(f64::INFINITY, f64::min);
    if !(min > 0.0) {
        return Err(Error::NotOnManifold(format!(
            "matrix is not positive definite: smallest eigenvalue {:e}",
            min
        )));
    }
    Ok(())
}

pub fn sqrtm_spd(a: &Array2<f64>) -> Result<Array2<f64>> {
    require_positive_spectrum(a)?;
    spectral_map(a, f64::sqrt)
}

pub fn inv_sqrtm_spd(a: &Array2<f64>) -> Result<Array2<f64>> {
    require_positive_spectrum(a)?;
    spectral_map(a, |lambda| 1.0 / lambda.sqrt())
}

pub fn logm_spd(a: &Array2<f64>) -> Result<Array2<f64>> {
    require_positive_spectrum(a)?;
    spectral_map(a, f64::ln)
}

pub fn expm_sym(a: &Array2<f64>) -> Result<Array2<f64>> {
    spectral_map(a, f64::exp)
}

/// Matrix inverse, reporting singular input as `Error::Singular`
pub fn inverse(a: &Array2<f64>) -> Result<Array2<f64>> {
    let inv = a
        .inv()
        .map_err(|err| Error::Singular(format!("matrix inverse failed: {:?}", err)))?;
    if inv.iter().any(|v| !v.is_finite()) {
        return Err(Error::Singular(
            "matrix inverse has non-finite entries".to_string(),
        ));
    }
    Ok(inv)
}

/// D·P·D with D = diag(diagonal), computed entrywise as P ∘ (d dᵀ)
pub fn diag_action(diagonal: &Array1<f64>, point: &Array2<f64>) -> Array2<f64> {
    let n = diagonal.len();
    Array2::from_shape_fn((n, n), |(i, j)| point[[i, j]] * (diagonal[i] * diagonal[j]))
}

/// D·P + P·D with D = diag(diagonal), computed entrywise as P ∘ (d_i + d_j)
pub fn diag_anticommutator(diagonal: &Array1<f64>, point: &Array2<f64>) -> Array2<f64> {
    let n = diagonal.len();
    Array2::from_shape_fn((n, n), |(i, j)| point[[i, j]] * (diagonal[i] + diagonal[j]))
}

/// tr(A·B) without forming the product
pub fn trace_product(a: &Array2<f64>, b: &Array2<f64>) -> f64 {
    (a * &b.t()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{arr1, arr2};

    #[test]
    fn test_exp_log_inverse_pair() {
        let p = arr2(&[[4.0, 1.0], [1.0, 3.0]]);
        let recovered = expm_sym(&logm_spd(&p).unwrap()).unwrap();
        for i in 0..2 {
            for j in 0..2 {
                assert_relative_eq!(p[[i, j]], recovered[[i, j]], epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_sqrt_squares_back() {
        let p = arr2(&[[2.0, 0.3, 0.1], [0.3, 1.5, 0.2], [0.1, 0.2, 1.0]]);
        let root = sqrtm_spd(&p).unwrap();
        let square = root.dot(&root);
        for i in 0..3 {
            for j in 0..3 {
                assert_relative_eq!(p[[i, j]], square[[i, j]], epsilon = 1e-12);
            }
        }
        let inv_root = inv_sqrtm_spd(&p).unwrap();
        let identity = inv_root.dot(&p).dot(&inv_root);
        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_relative_eq!(identity[[i, j]], expected, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_log_rejects_indefinite() {
        let a = arr2(&[[1.0, 2.0], [2.0, 1.0]]);
        assert!(logm_spd(&a).is_err());
        assert!(!is_positive_definite(&a));
    }

    #[test]
    fn test_diag_helpers_match_products() {
        let p = arr2(&[[2.0, 0.5], [0.5, 1.0]]);
        let d = arr1(&[2.0, 3.0]);
        let dm = Array2::from_diag(&d);

        let action = diag_action(&d, &p);
        let expected = dm.dot(&p).dot(&dm);
        let anti = diag_anticommutator(&d, &p);
        let expected_anti = dm.dot(&p) + p.dot(&dm);
        for i in 0..2 {
            for j in 0..2 {
                assert_relative_eq!(action[[i, j]], expected[[i, j]], epsilon = 1e-14);
                assert_relative_eq!(anti[[i, j]], expected_anti[[i, j]], epsilon = 1e-14);
            }
        }
    }

    #[test]
    fn test_inverse_singular() {
        let a = arr2(&[[1.0, 1.0], [1.0, 1.0]]);
        assert!(inverse(&a).is_err());
    }

    #[test]
    fn test_check_square() {
        let a = Array2::<f64>::zeros((2, 3));
        assert!(check_square(&a, 2).is_err());
        assert!(check_square(&Array2::zeros((2, 2)), 2).is_ok());
    }
}
