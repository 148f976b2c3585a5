use super::LinalgKernel;
use crate::error::LinalgError;
use ndarray::prelude::*;
use ndarray_linalg::{Eigh, Factorize, ReciprocalConditionNum, Solve, UPLO};
use num_complex::Complex64;

/// Kernel that forwards to LAPACK (getrf/getrs/gecon and syevd/heevd).
#[derive(Clone, Copy, Debug, Default)]
pub struct LapackKernel;

fn backend_error(error: ndarray_linalg::error::LinalgError) -> LinalgError {
    LinalgError::Backend(error.to_string())
}

impl LinalgKernel for LapackKernel {
    fn name(&self) -> &'static str {
        "lapack"
    }

    fn solve(
        &self,
        a: ArrayView2<f64>,
        b: ArrayView2<f64>,
    ) -> Result<(Array2<f64>, f64), LinalgError> {
        let lu = a
            .to_owned()
            .factorize()
            .map_err(|_| LinalgError::Singular {
                condition: f64::INFINITY,
            })?;
        let rcond: f64 = lu.rcond().map_err(backend_error)?;
        let condition: f64 = if rcond > 0.0 { 1.0 / rcond } else { f64::INFINITY };
        if !condition.is_finite() {
            return Err(LinalgError::Singular { condition });
        }
        let mut x: Array2<f64> = Array2::zeros(b.raw_dim());
        for (rhs, mut column) in b.axis_iter(Axis(1)).zip(x.axis_iter_mut(Axis(1))) {
            let solution: Array1<f64> = lu
                .solve(&rhs.to_owned())
                .map_err(|_| LinalgError::Singular { condition })?;
            column.assign(&solution);
        }
        Ok((x, condition))
    }

    fn eigh(&self, a: ArrayView2<f64>) -> Result<(Array1<f64>, Array2<f64>), LinalgError> {
        a.eigh(UPLO::Lower).map_err(|_| LinalgError::NoConvergence)
    }

    fn eigh_hermitian(
        &self,
        a: ArrayView2<Complex64>,
    ) -> Result<(Array1<f64>, Array2<Complex64>), LinalgError> {
        a.eigh(UPLO::Lower).map_err(|_| LinalgError::NoConvergence)
    }
}
