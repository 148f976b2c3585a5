use crate::dipole::DipoleBuilder;
use crate::energy::Oscillators;
use crate::error::MbdError;
use crate::gradients::GradientLayout;
use crate::linalg::MatrixElement;
use crate::periodic::KPoint;
use ndarray::prelude::*;
use num_complex::Complex64;

/// Adjoint of the coupled oscillator matrix, G = 1/4 V L^(-1/2) V^H.
///
/// With E = 1/2 sum_s sqrt(lambda_s) the first-order change of the energy is
/// dE = sum_pq Re(conj(G_pq) dC_pq). Clamped eigenvalues do not contribute.
pub fn adjoint_matrix<T: MatrixElement>(
    eigenvalues: ArrayView1<f64>,
    eigenvectors: ArrayView2<T>,
    clamp: f64,
) -> Array2<T> {
    spectral_matrix(eigenvalues, eigenvectors, |lambda| {
        if lambda < clamp {
            0.0
        } else {
            0.25 / lambda.sqrt()
        }
    })
}

/// The matrix function V f(L) V^H of a decomposed Hermitian matrix.
pub fn spectral_matrix<T, F>(
    eigenvalues: ArrayView1<f64>,
    eigenvectors: ArrayView2<T>,
    f: F,
) -> Array2<T>
where
    T: MatrixElement,
    F: Fn(f64) -> f64,
{
    let factors: Vec<f64> = eigenvalues.iter().map(|lambda| f(*lambda)).collect();
    let scaled: Array2<T> = Array2::from_shape_fn(eigenvectors.raw_dim(), |(p, s)| {
        if factors[s] == 0.0 {
            T::zero()
        } else {
            eigenvectors[[p, s]] * factors[s]
        }
    });
    let conjugated: Array2<T> = eigenvectors.t().mapv(|x| x.conj());
    scaled.dot(&conjugated)
}

/// Contracts the adjoint matrix with the derivatives of the coupling blocks of `pairs` and
/// adds the results, scaled by the k-point weight, to `partial`.
///
/// The block (i, j) of C is c_ij sum_n T(R_i - R_j - L_n) exp(-i k L_n) with
/// c_ij = omega_i omega_j sqrt(alpha_i alpha_j). The (j, i) block is its conjugate transpose
/// and contributes the same amount, so the pairs with i < j are counted twice.
pub fn contract_pairs<T: MatrixElement>(
    builder: &DipoleBuilder,
    oscillators: &Oscillators,
    adjoint: &Array2<T>,
    k_point: &KPoint,
    pairs: &[(usize, usize)],
    layout: &GradientLayout,
    partial: &mut Array1<f64>,
) -> Result<(), MbdError> {
    let weight: f64 = k_point.weight;
    for (i, j) in pairs.iter().cloned() {
        let multiplicity: f64 = if i == j { 1.0 } else { 2.0 };
        let c: f64 = oscillators.coupling(i, j);
        let sigma_ij: f64 = builder.sigma(i, j);
        let prefactor: f64 = weight * multiplicity;
        builder.visit_tensors(i, j, |n, tensor| {
            let phase: Complex64 = k_point.phase(n);
            let mut projected: [[f64; 3]; 3] = [[0.0; 3]; 3];
            for (a, row) in projected.iter_mut().enumerate() {
                for (b, value) in row.iter_mut().enumerate() {
                    *value = adjoint[[3 * i + a, 3 * j + b]].project(phase);
                }
            }
            let contract = |m: &nalgebra::Matrix3<f64>| -> f64 {
                let mut sum: f64 = 0.0;
                for a in 0..3 {
                    for b in 0..3 {
                        sum += projected[a][b] * m[(a, b)];
                    }
                }
                sum
            };
            // positions and lattice vectors, r = R_i - R_j - n A
            for c_idx in 0..3 {
                let g: f64 = prefactor * c * contract(&tensor.grad[c_idx]);
                partial[layout.position(i, c_idx)] += g;
                partial[layout.position(j, c_idx)] -= g;
                for m in 0..3 {
                    partial[layout.lattice(m, c_idx)] -= n[m] as f64 * g;
                }
            }
            // coupling prefactor
            let t: f64 = prefactor * c * contract(&tensor.value);
            partial[layout.omega(i)] += t / oscillators.omega[i];
            partial[layout.omega(j)] += t / oscillators.omega[j];
            partial[layout.alpha(i)] += 0.5 * t / oscillators.alpha[i];
            partial[layout.alpha(j)] += 0.5 * t / oscillators.alpha[j];
            // damping parameters
            let d_radius: f64 = prefactor * c * contract(&tensor.d_radius);
            partial[layout.r_vdw(i)] += d_radius;
            partial[layout.r_vdw(j)] += d_radius;
            let d_sigma: f64 = prefactor * c * contract(&tensor.d_sigma);
            partial[layout.sigma(i)] += d_sigma * builder.widths[i] / sigma_ij;
            partial[layout.sigma(j)] += d_sigma * builder.widths[j] / sigma_ij;
        })?;
    }
    Ok(())
}
