//! Dense linear algebra used by the screening and the coupled oscillator solvers.
//!
//! The rest of the crate only talks to the [LinalgKernel] trait, so the numerical backend can
//! be exchanged without touching the physics. The default backend is pure Rust and based on
//! `nalgebra`; with the `lapack` feature the LAPACK routines are used through `ndarray-linalg`.
#[cfg(feature = "lapack")]
mod lapack;
mod element;
mod nalgebra_kernel;

use crate::error::LinalgError;
use ndarray::prelude::*;
use num_complex::Complex64;
use std::sync::Arc;

#[cfg(feature = "lapack")]
pub use lapack::LapackKernel;
pub use element::MatrixElement;
pub use nalgebra_kernel::NalgebraKernel;

/// The capability set the calculation needs from a linear algebra library.
pub trait LinalgKernel: Send + Sync {
    /// Short name used in the log output.
    fn name(&self) -> &'static str;

    /// Solves `A X = B` for a general square matrix `A` and returns `X` together with an
    /// estimate of the condition number of `A`.
    fn solve(
        &self,
        a: ArrayView2<f64>,
        b: ArrayView2<f64>,
    ) -> Result<(Array2<f64>, f64), LinalgError>;

    /// Eigenvalues (ascending) and eigenvectors (columns) of a real symmetric matrix.
    fn eigh(&self, a: ArrayView2<f64>) -> Result<(Array1<f64>, Array2<f64>), LinalgError>;

    /// Eigenvalues (ascending) and eigenvectors (columns) of a complex Hermitian matrix.
    fn eigh_hermitian(
        &self,
        a: ArrayView2<Complex64>,
    ) -> Result<(Array1<f64>, Array2<Complex64>), LinalgError>;
}

/// The backend that is selected at compile time.
pub fn default_kernel() -> Arc<dyn LinalgKernel> {
    #[cfg(feature = "lapack")]
    {
        Arc::new(LapackKernel)
    }
    #[cfg(not(feature = "lapack"))]
    {
        Arc::new(NalgebraKernel::default())
    }
}
