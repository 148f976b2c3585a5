use super::LinalgKernel;
use crate::error::LinalgError;
use ndarray::prelude::*;
use ndarray::LinalgScalar;
use num_complex::Complex64;
use num_traits::Zero;
use std::fmt::Debug;
use std::ops::{Add, AddAssign, Mul};

/// Scalar type of the interaction matrices: `f64` for finite systems and the Gamma point,
/// `Complex64` for the other k-points of a periodic system.
pub trait MatrixElement:
    Copy
    + Debug
    + Send
    + Sync
    + Zero
    + Add<Output = Self>
    + AddAssign
    + Mul<Output = Self>
    + Mul<f64, Output = Self>
    + LinalgScalar
{
    /// Number of reals that represent one element in the partial results of the workers.
    const REALS: usize;

    /// `phase * x`. For the real type the phase has to be real.
    fn with_phase(phase: Complex64, x: f64) -> Self;

    fn conj(self) -> Self;

    fn re(self) -> f64;

    /// Re(conj(self) * phase), the weight of a real tensor element that entered the matrix
    /// element with `phase`.
    fn project(self, phase: Complex64) -> f64;

    /// Ascending eigenvalues and eigenvectors (columns) of a symmetric/Hermitian matrix.
    fn eigh(
        kernel: &dyn LinalgKernel,
        a: ArrayView2<Self>,
    ) -> Result<(Array1<f64>, Array2<Self>), LinalgError>;

    fn to_reals(a: &Array2<Self>) -> Array1<f64>;

    fn from_reals(reals: ArrayView1<f64>, dim: (usize, usize)) -> Array2<Self>;
}

impl MatrixElement for f64 {
    const REALS: usize = 1;

    fn with_phase(phase: Complex64, x: f64) -> Self {
        phase.re * x
    }

    fn conj(self) -> Self {
        self
    }

    fn re(self) -> f64 {
        self
    }

    fn project(self, phase: Complex64) -> f64 {
        self * phase.re
    }

    fn eigh(
        kernel: &dyn LinalgKernel,
        a: ArrayView2<Self>,
    ) -> Result<(Array1<f64>, Array2<Self>), LinalgError> {
        kernel.eigh(a)
    }

    fn to_reals(a: &Array2<Self>) -> Array1<f64> {
        a.iter().cloned().collect()
    }

    fn from_reals(reals: ArrayView1<f64>, dim: (usize, usize)) -> Array2<Self> {
        Array2::from_shape_fn(dim, |(i, j)| reals[i * dim.1 + j])
    }
}

impl MatrixElement for Complex64 {
    const REALS: usize = 2;

    fn with_phase(phase: Complex64, x: f64) -> Self {
        phase * x
    }

    fn conj(self) -> Self {
        Complex64::conj(&self)
    }

    fn re(self) -> f64 {
        self.re
    }

    fn project(self, phase: Complex64) -> f64 {
        self.re * phase.re + self.im * phase.im
    }

    fn eigh(
        kernel: &dyn LinalgKernel,
        a: ArrayView2<Self>,
    ) -> Result<(Array1<f64>, Array2<Self>), LinalgError> {
        kernel.eigh_hermitian(a)
    }

    fn to_reals(a: &Array2<Self>) -> Array1<f64> {
        a.iter().flat_map(|z| [z.re, z.im]).collect()
    }

    fn from_reals(reals: ArrayView1<f64>, dim: (usize, usize)) -> Array2<Self> {
        Array2::from_shape_fn(dim, |(i, j)| {
            let idx: usize = 2 * (i * dim.1 + j);
            Complex64::new(reals[idx], reals[idx + 1])
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn projection_of_complex_elements() {
        let g: Complex64 = Complex64::new(0.3, -0.7);
        let phase: Complex64 = Complex64::from_polar(1.0, 0.4);
        let expected: f64 = (g.conj() * phase).re;
        assert!((MatrixElement::project(g, phase) - expected).abs() < 1e-15);
        assert_eq!(MatrixElement::project(2.5f64, Complex64::new(1.0, 0.0)), 2.5);
    }

    #[test]
    fn packing_preserves_the_layout() {
        let a: Array2<Complex64> =
            Array2::from_shape_fn((2, 3), |(i, j)| Complex64::new(i as f64, j as f64));
        let reals: Array1<f64> = Complex64::to_reals(&a);
        assert_eq!(reals.len(), 12);
        assert_eq!(Complex64::from_reals(reals.view(), (2, 3)), a);
        let b: Array2<f64> = array![[1.0, 2.0], [3.0, 4.0]];
        assert_eq!(f64::from_reals(f64::to_reals(&b).view(), (2, 2)), b);
    }
}
