use crate::dipole::{Damping, DipoleBuilder};
use crate::energy::Oscillators;
use crate::error::MbdError;
use crate::gradients::{contract_pairs, spectral_matrix, GradientLayout};
use crate::initialization::System;
use crate::linalg::MatrixElement;
use crate::parallel::{RankOrderedSum, WorkPartition};
use crate::periodic::{Images, KPoint};
use crate::scs::FrequencyGrid;
use log::debug;
use nalgebra::Vector3;
use ndarray::prelude::*;
use num_complex::Complex64;
use std::f64::consts::PI;

/// Random-phase approximation energy and its derivatives.
#[derive(Clone, Debug)]
pub struct RpaResult {
    pub energy: f64,
    pub gradient: Option<Array2<f64>>,
    pub lattice_gradient: Option<Array2<f64>>,
}

/// The dipole-coupled polarizabilities at one imaginary frequency,
/// X(u) = sqrt(alpha(u)) T sqrt(alpha(u)).
struct FrequencyPoint<'a> {
    builder: DipoleBuilder<'a>,
    oscillators: &'a Oscillators,
    pairs: &'a [(usize, usize)],
    layout: GradientLayout,
    /// Quadrature weight of the frequency divided by 2 pi
    prefactor: f64,
}

impl<'a> FrequencyPoint<'a> {
    /// Contribution ln det(1 + X(u, k)) of one k-point, weighted with the quadrature weight of
    /// the frequency and with the weight of the k-point.
    fn solve<T: MatrixElement>(
        &self,
        system: &System,
        k_point: &KPoint,
        partition: &WorkPartition,
        want_gradients: bool,
    ) -> Result<(f64, Option<Array1<f64>>), MbdError> {
        let matrix: Array2<T> = self.builder.matrix(k_point, partition, |i, j| {
            self.oscillators.coupling(i, j)
        })?;
        let non_convergent = || MbdError::NonConvergentEigen {
            k_point: k_point.fractional,
        };
        let (eigenvalues, eigenvectors) =
            T::eigh(system.kernel(), matrix.view()).map_err(|_| non_convergent())?;
        let mut log_det: f64 = 0.0;
        for x in eigenvalues.iter() {
            if !x.is_finite() {
                return Err(non_convergent());
            }
            // 1 + x is an eigenvalue of the coupled response, it has to stay positive
            if 1.0 + x <= 0.0 {
                return Err(MbdError::NegativeEigenvalue {
                    k_point: k_point.fractional,
                    eigenvalue: 1.0 + x,
                });
            }
            log_det += x.ln_1p();
        }
        let energy: f64 = k_point.weight * self.prefactor * log_det;
        if !want_gradients {
            return Ok((energy, None));
        }
        // d ln det(1 + X) = tr[(1 + X)^-1 dX]
        let prefactor: f64 = self.prefactor;
        let adjoint: Array2<T> = spectral_matrix(eigenvalues.view(), eigenvectors.view(), |x| {
            prefactor / (1.0 + x)
        });
        let layout: GradientLayout = self.layout;
        let derivatives: Array1<f64> =
            partition.map_reduce(self.pairs, layout.len(), &RankOrderedSum, |_, chunk| {
                let mut partial: Array1<f64> = Array1::zeros(layout.len());
                contract_pairs(
                    &self.builder,
                    self.oscillators,
                    &adjoint,
                    k_point,
                    chunk,
                    &layout,
                    &mut partial,
                )?;
                Ok(partial)
            })?;
        Ok((energy, Some(derivatives)))
    }
}

/// E = 1/(2 pi) int_0^inf du sum_k w_k ln det(1 + sqrt(alpha(iu)) T(k) sqrt(alpha(iu)))
///
/// with the free-atom polarizabilities alpha(iu) = alpha_0 / (1 + (u / omega)^2) and the
/// configured long-range damping. The integral uses the frequency grid of the screening.
pub fn rpa_energy(
    system: &System,
    partition: &WorkPartition,
    want_gradients: bool,
) -> Result<RpaResult, MbdError> {
    let config = &system.config;
    let n_atoms: usize = system.n_atoms;
    let grid: FrequencyGrid =
        FrequencyGrid::new(config.scs.n_frequencies, config.scs.frequency_grid_scale);
    let positions: Vec<Vector3<f64>> = system.positions();
    let images: Images = system.images();
    let pairs: Vec<(usize, usize)> = images.pairs(n_atoms);
    let damping: Damping = Damping::long_range(&config.damping);
    let alpha_0: Array1<f64> = system.alpha_0();
    let omega: Array1<f64> = system.omega();
    let k_points: Vec<KPoint> = system.k_point_grid()?;
    let layout: GradientLayout = GradientLayout::new(n_atoms);

    let mut energy: f64 = 0.0;
    let mut derivatives: Array1<f64> = Array1::zeros(layout.len());
    for (u, weight) in grid.points.iter().zip(grid.weights.iter()) {
        // the static point only enters the screening
        if *weight == 0.0 {
            continue;
        }
        let alpha_u: Array1<f64> = alpha_0
            .iter()
            .zip(omega.iter())
            .map(|(a, w)| a / (1.0 + (u / w).powi(2)))
            .collect();
        let oscillators: Oscillators =
            Oscillators::new(alpha_u, Array1::ones(n_atoms), system.r_vdw());
        let point = FrequencyPoint {
            builder: DipoleBuilder {
                positions: &positions,
                images: &images,
                damping,
                radii: oscillators.r_vdw.view(),
                widths: oscillators.widths.view(),
            },
            oscillators: &oscillators,
            pairs: &pairs,
            layout,
            prefactor: weight / (2.0 * PI),
        };
        let mut energy_u: f64 = 0.0;
        for k_point in k_points.iter() {
            let (e_k, d_k) = if k_point.is_gamma() {
                point.solve::<f64>(system, k_point, partition, want_gradients)?
            } else {
                point.solve::<Complex64>(system, k_point, partition, want_gradients)?
            };
            energy_u += e_k;
            if let Some(d_k) = d_k {
                derivatives += &d_k;
            }
        }
        debug!("u = {:>12.6e}  dE = {:>20.12e}", u, energy_u);
        energy += energy_u;
    }

    let (gradient, lattice_gradient) = if want_gradients {
        (
            Some(Array2::from_shape_fn((n_atoms, 3), |(i, c)| {
                derivatives[layout.position(i, c)]
            })),
            Some(Array2::from_shape_fn((3, 3), |(m, c)| {
                derivatives[layout.lattice(m, c)]
            })),
        )
    } else {
        (None, None)
    };
    Ok(RpaResult {
        energy,
        gradient,
        lattice_gradient,
    })
}
