//! Batches of matrices stacked along a leading sample axis.
//!
//! A single matrix is a batch of length one, and a batch of length one
//! broadcasts against a batch of any length. Samples are independent, so
//! every helper here fans out over rayon and keeps sample order.

use ndarray::{Array1, Array2, Array3, ArrayView2, ArrayView3, Axis};
use rayon::prelude::*;

use crate::core::error::{Error, Result};

/// Wrap a single matrix as a batch of length one.
pub fn as_batch(point: &Array2<f64>) -> Array3<f64> {
    point.clone().insert_axis(Axis(0))
}

/// Stack matrices of identical shape into a batch.
pub fn stack(shape: (usize, usize), mats: Vec<Array2<f64>>) -> Result<Array3<f64>> {
    let mut out = Array3::zeros((mats.len(), shape.0, shape.1));
    for (index, (mut slot, mat)) in out.outer_iter_mut().zip(mats.iter()).enumerate() {
        if mat.dim() != shape {
            let err = Error::DimensionMismatch {
                expected: shape.0 * shape.1,
                got: mat.len(),
            };
            return Err(err.at_sample(index));
        }
        slot.assign(mat);
    }
    Ok(out)
}

/// Length of two batches after broadcasting.
pub fn broadcast_len(a: usize, b: usize) -> Result<usize> {
    match (a, b) {
        (a, b) if a == b => Ok(a),
        (1, b) => Ok(b),
        (a, 1) => Ok(a),
        (a, b) => Err(Error::DimensionMismatch {
            expected: a,
            got: b,
        }),
    }
}

fn sample<'a>(batch: &'a ArrayView3<'_, f64>, index: usize) -> ArrayView2<'a, f64> {
    let i = if batch.len_of(Axis(0)) == 1 { 0 } else { index };
    batch.index_axis(Axis(0), i)
}

/// Apply `op` to every sample; failures carry the sample index.
pub fn map_points<F>(points: ArrayView3<'_, f64>, op: F) -> Result<Array3<f64>>
where
    F: Fn(&Array2<f64>) -> Result<Array2<f64>> + Sync,
{
    let (_, rows, cols) = points.dim();
    let results = (0..points.len_of(Axis(0)))
        .into_par_iter()
        .map(|index| op(&points.index_axis(Axis(0), index).to_owned()).map_err(|e| e.at_sample(index)))
        .collect::<Result<Vec<_>>>()?;
    let shape = results.first().map(|m| m.dim()).unwrap_or((rows, cols));
    stack(shape, results)
}

/// Apply `op` pairwise over two broadcast batches.
pub fn zip_points<F>(
    first: ArrayView3<'_, f64>,
    second: ArrayView3<'_, f64>,
    op: F,
) -> Result<Array3<f64>>
where
    F: Fn(&Array2<f64>, &Array2<f64>) -> Result<Array2<f64>> + Sync,
{
    let len = broadcast_len(first.len_of(Axis(0)), second.len_of(Axis(0)))?;
    let (_, rows, cols) = first.dim();
    let results = (0..len)
        .into_par_iter()
        .map(|index| {
            let a = sample(&first, index).to_owned();
            let b = sample(&second, index).to_owned();
            op(&a, &b).map_err(|e| e.at_sample(index))
        })
        .collect::<Result<Vec<_>>>()?;
    let shape = results.first().map(|m| m.dim()).unwrap_or((rows, cols));
    stack(shape, results)
}

/// Evaluate a per-sample predicate.
pub fn map_flags<F>(points: ArrayView3<'_, f64>, pred: F) -> Array1<bool>
where
    F: Fn(&Array2<f64>) -> bool + Sync,
{
    let flags: Vec<bool> = (0..points.len_of(Axis(0)))
        .into_par_iter()
        .map(|index| pred(&points.index_axis(Axis(0), index).to_owned()))
        .collect();
    Array1::from(flags)
}

/// Evaluate a pairwise predicate over two broadcast batches.
pub fn zip_flags<F>(
    first: ArrayView3<'_, f64>,
    second: ArrayView3<'_, f64>,
    pred: F,
) -> Result<Array1<bool>>
where
    F: Fn(&Array2<f64>, &Array2<f64>) -> Result<bool> + Sync,
{
    let len = broadcast_len(first.len_of(Axis(0)), second.len_of(Axis(0)))?;
    let flags = (0..len)
        .into_par_iter()
        .map(|index| {
            let a = sample(&first, index).to_owned();
            let b = sample(&second, index).to_owned();
            pred(&a, &b).map_err(|e| e.at_sample(index))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Array1::from(flags))
}

/// Pairwise scalar over two broadcast batches.
pub fn zip_scalars<F>(
    first: ArrayView3<'_, f64>,
    second: ArrayView3<'_, f64>,
    op: F,
) -> Result<Array1<f64>>
where
    F: Fn(&Array2<f64>, &Array2<f64>) -> Result<f64> + Sync,
{
    let len = broadcast_len(first.len_of(Axis(0)), second.len_of(Axis(0)))?;
    let values = (0..len)
        .into_par_iter()
        .map(|index| {
            let a = sample(&first, index).to_owned();
            let b = sample(&second, index).to_owned();
            op(&a, &b).map_err(|e| e.at_sample(index))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Array1::from(values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    #[test]
    fn test_single_matrix_broadcasts() {
        let base = as_batch(&arr2(&[[1.0, 0.0], [0.0, 1.0]]));
        let vecs = stack(
            (2, 2),
            vec![
                arr2(&[[1.0, 2.0], [2.0, 1.0]]),
                arr2(&[[3.0, 0.0], [0.0, 3.0]]),
                arr2(&[[0.0, 1.0], [1.0, 0.0]]),
            ],
        )
        .unwrap();

        let sums = zip_points(vecs.view(), base.view(), |v, p| Ok(v + p)).unwrap();
        assert_eq!(sums.dim(), (3, 2, 2));
        assert_eq!(sums[[1, 0, 0]], 4.0);
        assert_eq!(sums[[2, 0, 1]], 1.0);
    }

    #[test]
    fn test_incompatible_lengths() {
        let a = Array3::<f64>::zeros((2, 2, 2));
        let b = Array3::<f64>::zeros((3, 2, 2));
        assert!(zip_points(a.view(), b.view(), |x, _| Ok(x.clone())).is_err());
        assert!(broadcast_len(2, 3).is_err());
        assert_eq!(broadcast_len(1, 4).unwrap(), 4);
    }

    #[test]
    fn test_failure_reports_sample_index() {
        let points = Array3::<f64>::zeros((4, 2, 2));
        let err = map_points(points.view(), |p| {
            if p[[0, 0]] == 0.0 {
                Err(Error::NotOnManifold("zero".to_string()))
            } else {
                Ok(p.clone())
            }
        })
        .unwrap_err();
        assert!(matches!(err, Error::Batch { .. }));
        assert!(err.is_domain());
    }

    #[test]
    fn test_empty_batch_keeps_shape() {
        let points = Array3::<f64>::zeros((0, 3, 3));
        let out = map_points(points.view(), |p| Ok(p.clone())).unwrap();
        assert_eq!(out.dim(), (0, 3, 3));
    }
}
