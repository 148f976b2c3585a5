use crate::dipole::damping::{gaussian_width, DampedTensor, Damping};
use crate::error::MbdError;
use crate::initialization::System;
use crate::io::settings::DampingModel;
use crate::linalg::MatrixElement;
use crate::parallel::{RankOrderedSum, WorkPartition};
use crate::periodic::{Images, KPoint};
use nalgebra::{Matrix3, Vector3};
use ndarray::prelude::*;
use num_complex::Complex64;

/// Assembles damped dipole interaction matrices of dimension 3N x 3N. The damping radii are
/// R_i + R_j and the Gaussian widths are combined as sigma_ij = sqrt(sigma_i^2 + sigma_j^2).
pub struct DipoleBuilder<'a> {
    pub positions: &'a [Vector3<f64>],
    pub images: &'a Images,
    pub damping: Damping,
    pub radii: ArrayView1<'a, f64>,
    pub widths: ArrayView1<'a, f64>,
}

impl<'a> DipoleBuilder<'a> {
    pub fn n_atoms(&self) -> usize {
        self.positions.len()
    }

    pub fn radius(&self, i: usize, j: usize) -> f64 {
        self.radii[i] + self.radii[j]
    }

    pub fn sigma(&self, i: usize, j: usize) -> f64 {
        (self.widths[i].powi(2) + self.widths[j].powi(2)).sqrt()
    }

    /// Calls `f(n, damped tensor)` for every image n of the pair (i, j) within the cutoff.
    pub fn visit_tensors<F>(&self, i: usize, j: usize, mut f: F) -> Result<(), MbdError>
    where
        F: FnMut(&[i32; 3], &DampedTensor),
    {
        let radius: f64 = self.radius(i, j);
        let sigma: f64 = self.sigma(i, j);
        self.images.visit(self.positions, i, j, |n, r| {
            f(n, &self.damping.tensor_with_derivatives(r, radius, sigma))
        })
    }

    /// Lattice sum sum_n T(r_ij - L_n) exp(-i k L_n) of the damped tensor.
    pub fn block<T: MatrixElement>(
        &self,
        i: usize,
        j: usize,
        k_point: &KPoint,
    ) -> Result<[[T; 3]; 3], MbdError> {
        let radius: f64 = self.radius(i, j);
        let sigma: f64 = self.sigma(i, j);
        let mut block: [[T; 3]; 3] = [[T::zero(); 3]; 3];
        self.images.visit(self.positions, i, j, |n, r| {
            let t: Matrix3<f64> = self.damping.tensor(r, radius, sigma);
            let phase: Complex64 = k_point.phase(n);
            for (a, row) in block.iter_mut().enumerate() {
                for (b, element) in row.iter_mut().enumerate() {
                    *element += T::with_phase(phase, t[(a, b)]);
                }
            }
        })?;
        if i == j {
            // the self-image sum is Hermitian only up to rounding
            let mut hermitian: [[T; 3]; 3] = block;
            for a in 0..3 {
                for b in 0..3 {
                    hermitian[a][b] = (block[a][b] + block[b][a].conj()) * 0.5_f64;
                }
            }
            block = hermitian;
        }
        Ok(block)
    }

    /// Contribution of the given pairs to the interaction matrix, each block scaled by
    /// `coupling(i, j)`. The (j, i) blocks are set to the conjugate transpose of the (i, j)
    /// blocks, so that the matrix is exactly Hermitian.
    pub fn partial_matrix<T, F>(
        &self,
        pairs: &[(usize, usize)],
        k_point: &KPoint,
        coupling: F,
    ) -> Result<Array2<T>, MbdError>
    where
        T: MatrixElement,
        F: Fn(usize, usize) -> f64,
    {
        let dim: usize = 3 * self.n_atoms();
        let mut matrix: Array2<T> = Array2::from_elem((dim, dim), T::zero());
        for (i, j) in pairs.iter().cloned() {
            let block: [[T; 3]; 3] = self.block(i, j, k_point)?;
            let c: f64 = coupling(i, j);
            for a in 0..3 {
                for b in 0..3 {
                    let value: T = block[a][b] * c;
                    matrix[[3 * i + a, 3 * j + b]] += value;
                    if i != j {
                        matrix[[3 * j + b, 3 * i + a]] += value.conj();
                    }
                }
            }
        }
        Ok(matrix)
    }

    /// Full interaction matrix, the pairs are distributed over the workers of `partition`.
    pub fn matrix<T, F>(
        &self,
        k_point: &KPoint,
        partition: &WorkPartition,
        coupling: F,
    ) -> Result<Array2<T>, MbdError>
    where
        T: MatrixElement,
        F: Fn(usize, usize) -> f64 + Sync,
    {
        let dim: usize = 3 * self.n_atoms();
        let pairs: Vec<(usize, usize)> = self.images.pairs(self.n_atoms());
        let total: Array1<f64> =
            partition.map_reduce(&pairs, T::REALS * dim * dim, &RankOrderedSum, |_, chunk| {
                let partial: Array2<T> = self.partial_matrix(chunk, k_point, &coupling)?;
                Ok(T::to_reals(&partial))
            })?;
        Ok(T::from_reals(total.view(), (dim, dim)))
    }
}

/// Damped dipole interaction matrix of the free atoms, without any diagonal term, for the
/// given damping model and k-point. The damping uses the free-atom vdW radii and the Gaussian
/// widths of the free-atom polarizabilities. A real matrix can only be requested for the
/// Gamma point.
pub fn dipole_matrix<T: MatrixElement>(
    system: &System,
    model: DampingModel,
    k_point: &KPoint,
) -> Result<Array2<T>, MbdError> {
    if T::REALS == 1 && !k_point.is_gamma() {
        return Err(MbdError::InvalidInput(format!(
            "a real dipole matrix was requested at k = {:?}",
            k_point.fractional
        )));
    }
    let positions: Vec<Vector3<f64>> = system.positions();
    let images: Images = system.images();
    let radii: Array1<f64> = system.r_vdw();
    let widths: Array1<f64> = system.alpha_0().mapv(gaussian_width);
    let builder = DipoleBuilder {
        positions: &positions,
        images: &images,
        damping: Damping::new(model, &system.config.damping),
        radii: radii.view(),
        widths: widths.view(),
    };
    builder.matrix(
        k_point,
        &WorkPartition::new(system.config.parallelization.number_of_workers),
        |_, _| 1.0,
    )
}
