use crate::dipole::{Damping, DipoleBuilder};
use crate::energy::{Modes, OscillatorAdjoints, Oscillators};
use crate::error::MbdError;
use crate::gradients::{adjoint_matrix, contract_pairs, GradientLayout};
use crate::initialization::System;
use crate::linalg::MatrixElement;
use crate::parallel::{RankOrderedSum, Reducer, WorkPartition};
use crate::periodic::{Images, KPoint};
use log::{debug, warn};
use nalgebra::Vector3;
use ndarray::prelude::*;
use ndarray_stats::QuantileExt;
use num_complex::Complex64;

/// Energy and derivatives of the coupled oscillators, summed over the k-points.
#[derive(Clone, Debug)]
pub struct CoupledResult {
    pub energy: f64,
    /// dE/dR [N, 3], `None` if no gradients were requested
    pub gradient: Option<Array2<f64>>,
    /// dE/dA [3, 3] at fixed Cartesian positions
    pub lattice_gradient: Option<Array2<f64>>,
    pub adjoints: Option<OscillatorAdjoints>,
    pub clamped_eigenvalues: usize,
    pub lowest_eigenvalue: f64,
    pub modes: Option<Modes>,
}

/// Contribution of one k-point. `values` holds [E(k) w_k, number of clamped eigenvalues,
/// gradient layout...].
struct KPointContribution {
    values: Array1<f64>,
    lowest_eigenvalue: f64,
    modes: Option<Modes>,
}

/// The coupled oscillator Hamiltonian
///
/// C = diag(omega_i^2) + omega_i omega_j sqrt(alpha_i alpha_j) T_lr(R_i - R_j)
///
/// whose eigenvalues are the squared frequencies of the coupled modes.
pub struct CoupledOscillators<'a> {
    system: &'a System,
    oscillators: &'a Oscillators,
    positions: Vec<Vector3<f64>>,
    images: Images,
    damping: Damping,
    layout: GradientLayout,
}

impl<'a> CoupledOscillators<'a> {
    pub fn new(system: &'a System, oscillators: &'a Oscillators) -> Self {
        Self {
            system,
            oscillators,
            positions: system.positions(),
            images: system.images(),
            damping: Damping::long_range(&system.config.damping),
            layout: GradientLayout::new(system.n_atoms),
        }
    }

    fn builder(&self) -> DipoleBuilder {
        DipoleBuilder {
            positions: &self.positions,
            images: &self.images,
            damping: self.damping,
            radii: self.oscillators.r_vdw.view(),
            widths: self.oscillators.widths.view(),
        }
    }

    /// The coupled oscillator matrix at the given k-point.
    pub fn matrix<T: MatrixElement>(
        &self,
        k_point: &KPoint,
        partition: &WorkPartition,
    ) -> Result<Array2<T>, MbdError> {
        let mut matrix: Array2<T> = self
            .builder()
            .matrix(k_point, partition, |i, j| self.oscillators.coupling(i, j))?;
        let one: Complex64 = Complex64::new(1.0, 0.0);
        for (i, omega) in self.oscillators.omega.iter().enumerate() {
            for a in 0..3 {
                matrix[[3 * i + a, 3 * i + a]] += T::with_phase(one, omega * omega);
            }
        }
        Ok(matrix)
    }

    /// Energy, and optionally the derivatives, summed over all k-points. With more than one
    /// k-point the k-points are the work units of the workers, otherwise the atom pairs are.
    pub fn calculate(&self, want_gradients: bool) -> Result<CoupledResult, MbdError> {
        let config = &self.system.config;
        let partition: WorkPartition =
            WorkPartition::new(config.parallelization.number_of_workers);
        let k_points: Vec<KPoint> = self.system.k_point_grid()?;
        let len: usize = 2 + self.layout.len();

        let per_rank: Vec<Vec<KPointContribution>> = if k_points.len() > 1 {
            partition.map(&k_points, |_, chunk| {
                chunk
                    .iter()
                    .map(|k_point| self.solve_k_point(k_point, &WorkPartition::serial(), want_gradients))
                    .collect::<Result<Vec<KPointContribution>, MbdError>>()
            })?
        } else {
            vec![vec![self.solve_k_point(&k_points[0], &partition, want_gradients)?]]
        };

        let mut lowest_eigenvalue: f64 = f64::INFINITY;
        let mut modes: Option<Modes> = None;
        let mut partials: Vec<Array1<f64>> = Vec::with_capacity(per_rank.len());
        for contributions in per_rank.into_iter() {
            let mut partial: Array1<f64> = Array1::zeros(len);
            for contribution in contributions.into_iter() {
                partial += &contribution.values;
                lowest_eigenvalue = lowest_eigenvalue.min(contribution.lowest_eigenvalue);
                if modes.is_none() {
                    modes = contribution.modes;
                }
            }
            partials.push(partial);
        }
        let total: Array1<f64> = RankOrderedSum.reduce(partials);

        let energy: f64 = total[0];
        let clamped_eigenvalues: usize = total[1].round() as usize;
        let (gradient, lattice_gradient, adjoints) = if want_gradients {
            let (gradient, lattice_gradient, adjoints) = self
                .layout
                .split(total.slice(s![2..]), self.oscillators.alpha.view());
            (Some(gradient), Some(lattice_gradient), Some(adjoints))
        } else {
            (None, None, None)
        };
        Ok(CoupledResult {
            energy,
            gradient,
            lattice_gradient,
            adjoints,
            clamped_eigenvalues,
            lowest_eigenvalue,
            modes,
        })
    }

    fn solve_k_point(
        &self,
        k_point: &KPoint,
        partition: &WorkPartition,
        want_gradients: bool,
    ) -> Result<KPointContribution, MbdError> {
        if k_point.is_gamma() {
            self.solve::<f64>(k_point, partition, want_gradients)
        } else {
            self.solve::<Complex64>(k_point, partition, want_gradients)
        }
    }

    fn solve<T: MatrixElement>(
        &self,
        k_point: &KPoint,
        partition: &WorkPartition,
        want_gradients: bool,
    ) -> Result<KPointContribution, MbdError> {
        let config = &self.system.config;
        let matrix: Array2<T> = self.matrix(k_point, partition)?;
        let non_convergent = || MbdError::NonConvergentEigen {
            k_point: k_point.fractional,
        };
        let (eigenvalues, eigenvectors) =
            T::eigh(self.system.kernel(), matrix.view()).map_err(|_| non_convergent())?;
        if eigenvalues.iter().any(|x| !x.is_finite()) {
            return Err(non_convergent());
        }
        let lowest_eigenvalue: f64 = *eigenvalues.min().map_err(|_| non_convergent())?;

        let mut clamped: usize = 0;
        let mut energy: f64 = 0.0;
        for lambda in eigenvalues.iter() {
            if *lambda < -config.eigen.negative_eigenvalue_limit {
                return Err(MbdError::NegativeEigenvalue {
                    k_point: k_point.fractional,
                    eigenvalue: *lambda,
                });
            } else if *lambda < config.eigen.clamp {
                clamped += 1;
            } else {
                energy += 0.5 * lambda.sqrt();
            }
        }
        energy -= 1.5 * self.oscillators.omega.sum();
        if clamped > 0 {
            warn!(
                "{} eigenvalues of the coupled oscillator matrix at k = {:?} were clamped to zero, \
                 the lowest one is {:e}",
                clamped, k_point.fractional, lowest_eigenvalue
            );
        }
        debug!(
            "k = {:>8.4?}  E(k) = {:>20.12e}  lowest eigenvalue = {:>12.4e}",
            k_point.fractional, energy, lowest_eigenvalue
        );

        let mut values: Array1<f64> = Array1::zeros(2 + self.layout.len());
        values[0] = k_point.weight * energy;
        values[1] = clamped as f64;
        if want_gradients {
            let adjoint: Array2<T> =
                adjoint_matrix(eigenvalues.view(), eigenvectors.view(), config.eigen.clamp);
            let builder: DipoleBuilder = self.builder();
            let pairs: Vec<(usize, usize)> = self.images.pairs(self.system.n_atoms);
            let layout: GradientLayout = self.layout;
            let gradient: Array1<f64> =
                partition.map_reduce(&pairs, layout.len(), &RankOrderedSum, |_, chunk| {
                    let mut partial: Array1<f64> = Array1::zeros(layout.len());
                    contract_pairs(
                        &builder,
                        self.oscillators,
                        &adjoint,
                        k_point,
                        chunk,
                        &layout,
                        &mut partial,
                    )?;
                    Ok(partial)
                })?;
            let mut slots = values.slice_mut(s![2..]);
            slots += &gradient;
            // diagonal omega_i^2 and the zero-point energy of the free oscillators
            for (i, omega) in self.oscillators.omega.iter().enumerate() {
                let trace: f64 = (0..3)
                    .map(|a| adjoint[[3 * i + a, 3 * i + a]].re())
                    .sum();
                slots[layout.omega(i)] += k_point.weight * (2.0 * omega * trace - 1.5);
            }
        }
        let modes: Option<Modes> = if config.eigen.save_modes && T::REALS == 1 {
            Some(Modes {
                eigenvalues: eigenvalues.clone(),
                eigenvectors: eigenvectors.mapv(|x| x.re()),
            })
        } else {
            None
        };
        Ok(KPointContribution {
            values,
            lowest_eigenvalue,
            modes,
        })
    }
}
