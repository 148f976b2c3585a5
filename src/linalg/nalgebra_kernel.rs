use super::LinalgKernel;
use crate::error::LinalgError;
use nalgebra::{DMatrix, Dyn, Scalar, SymmetricEigen};
use ndarray::prelude::*;
use num_complex::Complex64;

/// Pure Rust kernel. The linear systems are solved by an LU decomposition with partial
/// pivoting, the eigenproblems by the implicit symmetric QR algorithm of `nalgebra`, which
/// handles real symmetric and complex Hermitian matrices alike.
#[derive(Clone, Copy, Debug)]
pub struct NalgebraKernel {
    /// Upper limit of QR sweeps, zero means no limit.
    pub max_iterations: usize,
}

impl Default for NalgebraKernel {
    fn default() -> Self {
        Self {
            max_iterations: 100_000,
        }
    }
}

fn to_dmatrix<T: Scalar + Copy>(a: ArrayView2<T>) -> DMatrix<T> {
    DMatrix::from_fn(a.nrows(), a.ncols(), |i, j| a[[i, j]])
}

/// Converts the decomposition into ascending eigenvalues and the eigenvectors as columns.
fn sorted_eigenpairs<T: Scalar + Copy>(
    values: &[f64],
    vectors: &DMatrix<T>,
) -> (Array1<f64>, Array2<T>) {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|a, b| values[*a].total_cmp(&values[*b]));
    let eigenvalues: Array1<f64> = order.iter().map(|idx| values[*idx]).collect();
    let eigenvectors: Array2<T> =
        Array2::from_shape_fn((vectors.nrows(), order.len()), |(i, j)| vectors[(i, order[j])]);
    (eigenvalues, eigenvectors)
}

impl LinalgKernel for NalgebraKernel {
    fn name(&self) -> &'static str {
        "nalgebra"
    }

    fn solve(
        &self,
        a: ArrayView2<f64>,
        b: ArrayView2<f64>,
    ) -> Result<(Array2<f64>, f64), LinalgError> {
        let lu = to_dmatrix(a).lu();
        // the ratio of the largest and the smallest pivot is a cheap lower bound
        // of the condition number
        let u: DMatrix<f64> = lu.u();
        let (min_pivot, max_pivot): (f64, f64) = u
            .diagonal()
            .iter()
            .fold((f64::INFINITY, 0.0), |(min, max), x| {
                (min.min(x.abs()), max.max(x.abs()))
            });
        let condition: f64 = if min_pivot > 0.0 {
            max_pivot / min_pivot
        } else {
            f64::INFINITY
        };
        if !condition.is_finite() {
            return Err(LinalgError::Singular { condition });
        }
        let x: DMatrix<f64> = lu
            .solve(&to_dmatrix(b))
            .ok_or(LinalgError::Singular { condition })?;
        if x.iter().any(|value| !value.is_finite()) {
            return Err(LinalgError::Singular {
                condition: f64::INFINITY,
            });
        }
        Ok((
            Array2::from_shape_fn((x.nrows(), x.ncols()), |(i, j)| x[(i, j)]),
            condition,
        ))
    }

    fn eigh(&self, a: ArrayView2<f64>) -> Result<(Array1<f64>, Array2<f64>), LinalgError> {
        let decomposition: SymmetricEigen<f64, Dyn> =
            SymmetricEigen::try_new(to_dmatrix(a), f64::EPSILON, self.max_iterations)
                .ok_or(LinalgError::NoConvergence)?;
        Ok(sorted_eigenpairs(
            decomposition.eigenvalues.as_slice(),
            &decomposition.eigenvectors,
        ))
    }

    fn eigh_hermitian(
        &self,
        a: ArrayView2<Complex64>,
    ) -> Result<(Array1<f64>, Array2<Complex64>), LinalgError> {
        let decomposition: SymmetricEigen<Complex64, Dyn> =
            SymmetricEigen::try_new(to_dmatrix(a), f64::EPSILON, self.max_iterations)
                .ok_or(LinalgError::NoConvergence)?;
        Ok(sorted_eigenpairs(
            decomposition.eigenvalues.as_slice(),
            &decomposition.eigenvectors,
        ))
    }
}
