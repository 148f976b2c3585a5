//! Analytic gradients of the dispersion energy.
//!
//! All pair loops accumulate into one flat vector per worker (see [GradientLayout]) that
//! holds the derivatives with respect to the atomic positions, to the lattice vectors and to
//! the oscillator parameters. The derivatives with respect to the oscillator parameters are
//! needed to propagate the gradient through the self-consistent screening.
mod hellmann_feynman;
#[cfg(test)]
pub(crate) mod numerical;

pub use hellmann_feynman::{adjoint_matrix, contract_pairs, spectral_matrix};

use crate::dipole::gaussian_width_derivative;
use crate::energy::OscillatorAdjoints;
use crate::periodic::Lattice;
use nalgebra::Vector3;
use ndarray::prelude::*;

/// Offsets in the flat partial vectors of the gradient loops.
#[derive(Clone, Copy, Debug)]
pub struct GradientLayout {
    pub n_atoms: usize,
}

impl GradientLayout {
    pub fn new(n_atoms: usize) -> Self {
        Self { n_atoms }
    }

    pub fn len(&self) -> usize {
        7 * self.n_atoms + 9
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// dE/dR_ic
    pub fn position(&self, i: usize, c: usize) -> usize {
        3 * i + c
    }

    /// dE/dA_mc, the derivative w.r.t. component c of lattice vector m
    pub fn lattice(&self, m: usize, c: usize) -> usize {
        3 * self.n_atoms + 3 * m + c
    }

    pub fn alpha(&self, i: usize) -> usize {
        3 * self.n_atoms + 9 + i
    }

    pub fn omega(&self, i: usize) -> usize {
        4 * self.n_atoms + 9 + i
    }

    pub fn r_vdw(&self, i: usize) -> usize {
        5 * self.n_atoms + 9 + i
    }

    /// Derivative with respect to the Gaussian width of the oscillator.
    pub fn sigma(&self, i: usize) -> usize {
        6 * self.n_atoms + 9 + i
    }

    /// Splits the reduced vector into the gradient [N, 3], the lattice derivative [3, 3] and the
    /// derivatives w.r.t. the oscillator parameters. The derivative w.r.t. the Gaussian widths
    /// is folded into the polarizabilities `alpha` from which the widths were derived.
    pub fn split(
        &self,
        values: ArrayView1<f64>,
        alpha: ArrayView1<f64>,
    ) -> (Array2<f64>, Array2<f64>, OscillatorAdjoints) {
        let n: usize = self.n_atoms;
        let gradient: Array2<f64> = Array2::from_shape_fn((n, 3), |(i, c)| values[self.position(i, c)]);
        let lattice: Array2<f64> = Array2::from_shape_fn((3, 3), |(m, c)| values[self.lattice(m, c)]);
        let adjoints = OscillatorAdjoints {
            alpha: Array1::from_shape_fn(n, |i| {
                values[self.alpha(i)] + values[self.sigma(i)] * gaussian_width_derivative(alpha[i])
            }),
            omega: Array1::from_shape_fn(n, |i| values[self.omega(i)]),
            r_vdw: Array1::from_shape_fn(n, |i| values[self.r_vdw(i)]),
        };
        (gradient, lattice, adjoints)
    }
}

/// Stress tensor sigma_ab = 1/V dE/d(eps_ab) of a homogeneous strain R -> (1 + eps) R that
/// acts on the positions and on the lattice vectors:
///
/// sigma_ab = (sum_i dE/dR_ia R_ib + sum_m dE/dA_ma A_mb) / V
pub fn stress_tensor(
    positions: &[Vector3<f64>],
    gradient: ArrayView2<f64>,
    lattice: &Lattice,
    lattice_gradient: ArrayView2<f64>,
) -> Array2<f64> {
    let vectors: Array2<f64> = lattice.vectors();
    let mut stress: Array2<f64> = lattice_gradient.t().dot(&vectors);
    for (xyz, grad) in positions.iter().zip(gradient.outer_iter()) {
        for a in 0..3 {
            for b in 0..3 {
                stress[[a, b]] += grad[a] * xyz[b];
            }
        }
    }
    stress / lattice.volume()
}
