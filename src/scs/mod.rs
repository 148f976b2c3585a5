//! Self-consistent screening (SCS) of the atomic polarizabilities.
//!
//! At every imaginary frequency u the polarizabilities of the free atoms are coupled through
//! a damped dipole interaction,
//!
//! A(u) = diag(1 / alpha_i(u)) + T_d(u),   A(u) Y(u) = E,
//!
//! where E stacks one 3x3 unit matrix per atom, so that block i of Y is the screened 3x3
//! polarizability of atom i contracted over all its partners. The screened static
//! polarizabilities and the Casimir-Polder integrals of the screened polarizabilities
//! define the oscillators of the subsequent coupled oscillator calculation.
//!
//! The range-separated variant (rsSCS) screens with the short-range complement of the Fermi
//! damping, the full-range variant with the erf-screened tensor of Gaussian charge densities.
mod frequency_grid;
mod logging;

pub use frequency_grid::{gauss_legendre, FrequencyGrid};
pub use logging::print_screened_polarizabilities;

use crate::dipole::{gaussian_width, Damping, DipoleBuilder};
use crate::energy::{OscillatorAdjoints, Oscillators};
use crate::error::{LinalgError, MbdError};
use crate::initialization::System;
use crate::io::settings::DampingModel;
use crate::parallel::{RankOrderedSum, WorkPartition};
use crate::periodic::{Images, KPoint};
use log::{debug, trace};
use nalgebra::Vector3;
use ndarray::prelude::*;
use std::f64::consts::PI;

/// Solution of the screening equation at one frequency point.
#[derive(Clone, Debug)]
pub struct ScreeningFrame {
    pub frequency: f64,
    pub weight: f64,
    /// A(u), the 3N x 3N screening matrix
    pub matrix: Array2<f64>,
    /// Y(u) = A(u)^-1 E, dimension 3N x 3
    pub response: Array2<f64>,
    /// Isotropic screened polarizabilities at this frequency
    pub alpha: Array1<f64>,
    /// Condition estimate of A(u)
    pub condition: f64,
}

/// The screened polarizabilities and the derived oscillator parameters.
#[derive(Clone, Debug)]
pub struct ScreenedPolarizabilities {
    /// Anisotropic static polarizabilities with the shape [N, 3, 3]
    pub tensors: Array3<f64>,
    /// Isotropic static polarizabilities, trace / 3 of the tensors
    pub alpha: Array1<f64>,
    pub c6: Array1<f64>,
    pub omega: Array1<f64>,
    pub r_vdw: Array1<f64>,
    /// Largest condition estimate of all screening matrices
    pub max_condition: f64,
    /// Damping of the screening interaction
    pub damping: Damping,
    frames: Vec<ScreeningFrame>,
}

/// The three unit-field right-hand sides, one 3x3 unit matrix per atom.
fn unit_fields(n_atoms: usize) -> Array2<f64> {
    let mut fields: Array2<f64> = Array2::zeros((3 * n_atoms, 3));
    for i in 0..n_atoms {
        for a in 0..3 {
            fields[[3 * i + a, a]] = 1.0;
        }
    }
    fields
}

/// Isotropic part of the blocks of the response, trace / 3.
fn isotropic(response: &Array2<f64>, n_atoms: usize) -> Array1<f64> {
    Array1::from_shape_fn(n_atoms, |i| {
        (response[[3 * i, 0]] + response[[3 * i + 1, 1]] + response[[3 * i + 2, 2]]) / 3.0
    })
}

fn screening_error(frequency: usize, error: LinalgError) -> MbdError {
    let condition: f64 = match error {
        LinalgError::Singular { condition } => condition,
        _ => f64::INFINITY,
    };
    MbdError::SingularScreening {
        frequency,
        condition,
    }
}

impl ScreenedPolarizabilities {
    /// Range-separated screening with the short-range part of the dipole tensor.
    pub fn solve(system: &System, partition: &WorkPartition) -> Result<Self, MbdError> {
        Self::solve_with(system, Damping::short_range(&system.config.damping), partition)
    }

    /// Screening with the full-range dipole interaction of Gaussian charge densities.
    pub fn solve_full_range(system: &System, partition: &WorkPartition) -> Result<Self, MbdError> {
        let damping: Damping = Damping::new(DampingModel::Gaussian, &system.config.damping);
        Self::solve_with(system, damping, partition)
    }

    /// Solves the screening equation on the imaginary frequency grid. Periodic systems are
    /// screened with the Gamma-point lattice sum of the damped tensor.
    pub fn solve_with(
        system: &System,
        damping: Damping,
        partition: &WorkPartition,
    ) -> Result<Self, MbdError> {
        let n_atoms: usize = system.n_atoms;
        let config = &system.config;
        let grid: FrequencyGrid =
            FrequencyGrid::new(config.scs.n_frequencies, config.scs.frequency_grid_scale);
        let positions: Vec<Vector3<f64>> = system.positions();
        let images: Images = system.images();
        let alpha_0: Array1<f64> = system.alpha_0();
        let omega: Array1<f64> = system.omega();
        let r_vdw: Array1<f64> = system.r_vdw();
        let fields: Array2<f64> = unit_fields(n_atoms);
        let gamma: KPoint = KPoint::gamma();

        let mut frames: Vec<ScreeningFrame> = Vec::with_capacity(grid.len());
        for (idx, (u, weight)) in grid.points.iter().zip(grid.weights.iter()).enumerate() {
            let alpha_u: Array1<f64> = alpha_0
                .iter()
                .zip(omega.iter())
                .map(|(a, w)| a / (1.0 + (u / w).powi(2)))
                .collect();
            let widths: Array1<f64> = alpha_u.mapv(gaussian_width);
            let builder = DipoleBuilder {
                positions: &positions,
                images: &images,
                damping,
                radii: r_vdw.view(),
                widths: widths.view(),
            };
            let mut matrix: Array2<f64> = builder.matrix(&gamma, partition, |_, _| 1.0)?;
            for (i, a) in alpha_u.iter().enumerate() {
                for c in 0..3 {
                    matrix[[3 * i + c, 3 * i + c]] += 1.0 / a;
                }
            }
            let (response, condition) = system
                .kernel()
                .solve(matrix.view(), fields.view())
                .map_err(|error| screening_error(idx, error))?;
            if !(condition <= config.scs.condition_limit)
                || response.iter().any(|x| !x.is_finite())
            {
                return Err(MbdError::SingularScreening {
                    frequency: idx,
                    condition,
                });
            }
            trace!(
                "screening at u = {:12.6e}: condition estimate {:10.3e}",
                u,
                condition
            );
            frames.push(ScreeningFrame {
                frequency: *u,
                weight: *weight,
                alpha: isotropic(&response, n_atoms),
                matrix,
                response,
                condition,
            });
        }

        let static_frame: &ScreeningFrame = &frames[0];
        let tensors: Array3<f64> = Array3::from_shape_fn((n_atoms, 3, 3), |(i, a, b)| {
            static_frame.response[[3 * i + a, b]]
        });
        let alpha: Array1<f64> = static_frame.alpha.clone();
        let c6: Array1<f64> = frames
            .iter()
            .fold(Array1::zeros(n_atoms), |acc: Array1<f64>, frame| {
                acc + &(frame.alpha.mapv(|a| a * a) * frame.weight)
            })
            * (3.0 / PI);
        let omega_scs: Array1<f64> = Array1::from_shape_fn(n_atoms, |i| {
            4.0 * c6[i] / (3.0 * alpha[i] * alpha[i])
        });
        let r_vdw_scs: Array1<f64> =
            Array1::from_shape_fn(n_atoms, |i| r_vdw[i] * (alpha[i] / alpha_0[i]).cbrt());
        if alpha.iter().any(|a| !(*a > 0.0)) {
            return Err(MbdError::SingularScreening {
                frequency: 0,
                condition: static_frame.condition,
            });
        }
        let max_condition: f64 = frames
            .iter()
            .map(|frame| frame.condition)
            .fold(0.0, f64::max);
        debug!(
            "screening converged on {} frequency points, largest condition estimate {:10.3e}",
            frames.len(),
            max_condition
        );
        Ok(Self {
            tensors,
            alpha,
            c6,
            omega: omega_scs,
            r_vdw: r_vdw_scs,
            max_condition,
            damping,
            frames,
        })
    }

    pub fn frames(&self) -> &[ScreeningFrame] {
        &self.frames
    }

    /// Oscillators of the coupled oscillator calculation.
    pub fn oscillators(&self) -> Oscillators {
        Oscillators::new(self.alpha.clone(), self.omega.clone(), self.r_vdw.clone())
    }

    /// Chain rule through the screening equation. Takes the derivatives of the energy with
    /// respect to the screened alpha, omega and vdW radii and returns the contribution to the
    /// gradient w.r.t. the atomic positions [N, 3] and to the derivative w.r.t. the lattice
    /// vectors [3, 3].
    ///
    /// With P = A^-1 abar, where abar holds the adjoint of the isotropic polarizabilities of
    /// every frequency on the block diagonal, dE = -1/3 sum_pq (P Y^T)_pq dA_pq.
    pub fn backpropagate(
        &self,
        system: &System,
        adjoints: &OscillatorAdjoints,
        partition: &WorkPartition,
    ) -> Result<(Array2<f64>, Array2<f64>), MbdError> {
        let n_atoms: usize = system.n_atoms;
        let positions: Vec<Vector3<f64>> = system.positions();
        let images: Images = system.images();
        let pairs: Vec<(usize, usize)> = images.pairs(n_atoms);
        let alpha_0: Array1<f64> = system.alpha_0();
        let omega: Array1<f64> = system.omega();
        let r_vdw: Array1<f64> = system.r_vdw();
        let damping: Damping = self.damping;

        let mut gradient: Array2<f64> = Array2::zeros((n_atoms, 3));
        let mut lattice_gradient: Array2<f64> = Array2::zeros((3, 3));
        for (idx, frame) in self.frames.iter().enumerate() {
            // adjoint of the isotropic polarizabilities at this frequency
            let abar: Array1<f64> = if idx == 0 {
                Array1::from_shape_fn(n_atoms, |i| {
                    adjoints.alpha[i] - adjoints.omega[i] * 2.0 * self.omega[i] / self.alpha[i]
                        + adjoints.r_vdw[i] * self.r_vdw[i] / (3.0 * self.alpha[i])
                })
            } else {
                Array1::from_shape_fn(n_atoms, |i| {
                    adjoints.omega[i] * 8.0 * frame.weight * frame.alpha[i]
                        / (PI * self.alpha[i] * self.alpha[i])
                })
            };
            if abar.iter().all(|x| *x == 0.0) {
                continue;
            }
            let mut rhs: Array2<f64> = Array2::zeros((3 * n_atoms, 3));
            for i in 0..n_atoms {
                for a in 0..3 {
                    rhs[[3 * i + a, a]] = abar[i];
                }
            }
            let (p, _) = system
                .kernel()
                .solve(frame.matrix.view(), rhs.view())
                .map_err(|error| screening_error(idx, error))?;
            let y: &Array2<f64> = &frame.response;
            let alpha_u: Array1<f64> = alpha_0
                .iter()
                .zip(omega.iter())
                .map(|(a, w)| a / (1.0 + (frame.frequency / w).powi(2)))
                .collect();
            let widths: Array1<f64> = alpha_u.mapv(gaussian_width);
            let builder = DipoleBuilder {
                positions: &positions,
                images: &images,
                damping,
                radii: r_vdw.view(),
                widths: widths.view(),
            };
            let len: usize = 3 * n_atoms + 9;
            let total: Array1<f64> =
                partition.map_reduce(&pairs, len, &RankOrderedSum, |_, chunk| {
                    let mut partial: Array1<f64> = Array1::zeros(len);
                    for (i, j) in chunk.iter().cloned() {
                        // W = P Y^T, symmetrized over the (i, j) and (j, i) blocks
                        let mut w: [[f64; 3]; 3] = [[0.0; 3]; 3];
                        for a in 0..3 {
                            for b in 0..3 {
                                w[a][b] = p.row(3 * i + a).dot(&y.row(3 * j + b));
                                if i != j {
                                    w[a][b] += p.row(3 * j + b).dot(&y.row(3 * i + a));
                                }
                            }
                        }
                        builder.visit_tensors(i, j, |n, tensor| {
                            for c in 0..3 {
                                let mut g: f64 = 0.0;
                                for a in 0..3 {
                                    for b in 0..3 {
                                        g += w[a][b] * tensor.grad[c][(a, b)];
                                    }
                                }
                                g *= -1.0 / 3.0;
                                partial[3 * i + c] += g;
                                partial[3 * j + c] -= g;
                                for m in 0..3 {
                                    partial[3 * n_atoms + 3 * m + c] -= n[m] as f64 * g;
                                }
                            }
                        })?;
                    }
                    Ok(partial)
                })?;
            for i in 0..n_atoms {
                for c in 0..3 {
                    gradient[[i, c]] += total[3 * i + c];
                }
            }
            for m in 0..3 {
                for c in 0..3 {
                    lattice_gradient[[m, c]] += total[3 * n_atoms + 3 * m + c];
                }
            }
        }
        Ok((gradient, lattice_gradient))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::tests::{get_dimer, get_single_atom, get_trimer};
    use approx::assert_abs_diff_eq;

    #[test]
    fn isolated_atom_keeps_its_free_atom_values() {
        let system: System = get_single_atom();
        let scs = ScreenedPolarizabilities::solve(&system, &WorkPartition::serial()).unwrap();
        assert_abs_diff_eq!(scs.alpha[0], 10.0, epsilon = 1e-12);
        assert_abs_diff_eq!(scs.omega[0], 0.5, epsilon = 1e-4);
        assert_abs_diff_eq!(scs.r_vdw[0], system.atoms[0].r_vdw, epsilon = 1e-12);
        // the static tensor is isotropic
        assert_abs_diff_eq!(scs.tensors[[0, 0, 0]], 10.0, epsilon = 1e-12);
        assert_abs_diff_eq!(scs.tensors[[0, 0, 1]], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn close_dimer_is_screened_anisotropically() {
        // the dimer axis is z, the tensors are axial
        let system: System = get_dimer(2.0);
        let scs = ScreenedPolarizabilities::solve(&system, &WorkPartition::serial()).unwrap();
        let tensor: ArrayView2<f64> = scs.tensors.slice(s![0, .., ..]);
        assert!((tensor[[0, 0]] - tensor[[1, 1]]).abs() < 1e-10);
        assert!((tensor[[2, 2]] - tensor[[0, 0]]).abs() > 1e-6);
        assert_abs_diff_eq!(scs.alpha[0], scs.alpha[1], epsilon = 1e-10);
        assert!(scs.max_condition >= 1.0);
        assert_eq!(scs.frames().len(), 16);
    }

    #[test]
    fn full_range_screening_is_stronger() {
        let system: System = get_trimer();
        let range_separated =
            ScreenedPolarizabilities::solve(&system, &WorkPartition::serial()).unwrap();
        let full_range =
            ScreenedPolarizabilities::solve_full_range(&system, &WorkPartition::serial()).unwrap();
        assert_eq!(full_range.damping.model, DampingModel::Gaussian);
        // 10.072 and 10.018 bohr^3 for the first atom
        assert!(full_range.alpha[0] > range_separated.alpha[0] + 0.03);
        assert!(full_range.omega[0] < range_separated.omega[0]);
        let atom: System = get_single_atom();
        let free = ScreenedPolarizabilities::solve_full_range(&atom, &WorkPartition::serial()).unwrap();
        assert_abs_diff_eq!(free.alpha[0], 10.0, epsilon = 1e-12);
    }

    #[test]
    fn ill_conditioned_screening_is_reported() {
        let mut system: System = get_dimer(2.0);
        system.config.scs.condition_limit = 1.0001;
        match ScreenedPolarizabilities::solve(&system, &WorkPartition::serial()) {
            Err(MbdError::SingularScreening {
                frequency,
                condition,
            }) => {
                assert_eq!(frequency, 0);
                assert!(condition > 1.0001);
            }
            other => panic!("expected a screening failure, got {:?}", other.err()),
        }
    }

    #[test]
    fn worker_count_does_not_change_the_screening() {
        let system: System = get_trimer();
        let reference = ScreenedPolarizabilities::solve(&system, &WorkPartition::serial()).unwrap();
        for n_workers in [2, 4] {
            let scs =
                ScreenedPolarizabilities::solve(&system, &WorkPartition::new(n_workers)).unwrap();
            assert!(scs.alpha.abs_diff_eq(&reference.alpha, 1e-12));
            assert!(scs.omega.abs_diff_eq(&reference.omega, 1e-12));
        }
    }
}
