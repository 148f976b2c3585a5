//! Dispersion energies and their gradients.
mod coupled;
mod logging;
mod rpa;
mod ts;

pub use coupled::{CoupledOscillators, CoupledResult};
pub use logging::{print_energy, print_gradient};
pub use rpa::{rpa_energy, RpaResult};
pub use ts::{ts_energy, TsResult};

use crate::dipole::gaussian_width;
use crate::error::MbdError;
use crate::gradients::stress_tensor;
use crate::initialization::System;
use crate::io::settings::{GradientPolicy, Method};
use crate::parallel::WorkPartition;
use crate::scs::{print_screened_polarizabilities, ScreenedPolarizabilities};
use crate::utils::Timer;
use log::info;
use ndarray::prelude::*;
use serde::Serialize;

/// Quantum harmonic oscillators that represent the atoms in the coupled oscillator model.
#[derive(Clone, Debug)]
pub struct Oscillators {
    pub alpha: Array1<f64>,
    pub omega: Array1<f64>,
    pub r_vdw: Array1<f64>,
    /// Gaussian widths of the oscillator charge densities, derived from alpha
    pub widths: Array1<f64>,
}

impl Oscillators {
    pub fn new(alpha: Array1<f64>, omega: Array1<f64>, r_vdw: Array1<f64>) -> Self {
        let widths: Array1<f64> = alpha.mapv(gaussian_width);
        Self {
            alpha,
            omega,
            r_vdw,
            widths,
        }
    }

    /// The free-atom oscillators.
    pub fn bare(system: &System) -> Self {
        Self::new(system.alpha_0(), system.omega(), system.r_vdw())
    }

    pub fn len(&self) -> usize {
        self.alpha.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alpha.is_empty()
    }

    /// Prefactor of the dipole coupling, omega_i omega_j sqrt(alpha_i alpha_j).
    pub fn coupling(&self, i: usize, j: usize) -> f64 {
        self.omega[i] * self.omega[j] * (self.alpha[i] * self.alpha[j]).sqrt()
    }
}

/// Derivatives of the energy with respect to the oscillator parameters.
#[derive(Clone, Debug)]
pub struct OscillatorAdjoints {
    pub alpha: Array1<f64>,
    pub omega: Array1<f64>,
    pub r_vdw: Array1<f64>,
}

impl OscillatorAdjoints {
    pub fn zeros(n_atoms: usize) -> Self {
        Self {
            alpha: Array1::zeros(n_atoms),
            omega: Array1::zeros(n_atoms),
            r_vdw: Array1::zeros(n_atoms),
        }
    }
}

/// Eigen-solution of the coupled oscillator matrix of a finite system.
#[derive(Clone, Debug, Serialize)]
pub struct Modes {
    /// Squared mode frequencies in ascending order
    pub eigenvalues: Array1<f64>,
    /// Eigenvectors in the columns, dimension 3N x 3N
    pub eigenvectors: Array2<f64>,
}

/// Per-atom results of the self-consistent screening.
#[derive(Clone, Debug, Serialize)]
pub struct ScreenedSummary {
    pub alpha: Array1<f64>,
    pub c6: Array1<f64>,
    pub omega: Array1<f64>,
    pub r_vdw: Array1<f64>,
    /// Static polarizability tensors [N, 3, 3]
    pub tensors: Array3<f64>,
}

impl From<&ScreenedPolarizabilities> for ScreenedSummary {
    fn from(scs: &ScreenedPolarizabilities) -> Self {
        Self {
            alpha: scs.alpha.clone(),
            c6: scs.c6.clone(),
            omega: scs.omega.clone(),
            r_vdw: scs.r_vdw.clone(),
            tensors: scs.tensors.clone(),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct Diagnostics {
    /// Name of the linear algebra backend
    pub kernel: String,
    pub n_workers: usize,
    pub n_k_points: usize,
    /// Number of eigenvalues that were clamped to zero, summed over the k-points
    pub clamped_eigenvalues: usize,
    /// Lowest raw eigenvalue of the coupled oscillator matrices
    pub lowest_eigenvalue: Option<f64>,
    /// Largest condition estimate of the screening matrices
    pub screening_condition: Option<f64>,
}

/// Result of a dispersion calculation. All values are in atomic units.
#[derive(Clone, Debug, Serialize)]
pub struct MbdResult {
    pub method: Method,
    pub energy: f64,
    /// dE/dR with the shape [N, 3]
    pub gradient: Option<Array2<f64>>,
    /// dE/dA at fixed Cartesian positions, the rows belong to the lattice vectors
    pub lattice_gradient: Option<Array2<f64>>,
    pub stress: Option<Array2<f64>>,
    pub screened: Option<ScreenedSummary>,
    pub diagnostics: Diagnostics,
    pub modes: Option<Modes>,
}

impl System {
    /// Dispersion energy of the system with the configured method.
    pub fn energy(&self) -> Result<f64, MbdError> {
        Ok(self.calculate(false)?.energy)
    }

    /// Dispersion energy and, if `want_gradients` is set, the derivatives with respect to the
    /// atomic positions and lattice vectors.
    pub fn calculate(&self, want_gradients: bool) -> Result<MbdResult, MbdError> {
        // the configuration is public and may have changed since the construction
        self.config.validate()?;
        let timer: Timer = Timer::start();
        let partition: WorkPartition =
            WorkPartition::new(self.config.parallelization.number_of_workers);
        let mut diagnostics = Diagnostics {
            kernel: String::from(self.kernel().name()),
            n_workers: partition.n_workers,
            n_k_points: self.k_points().len(),
            clamped_eigenvalues: 0,
            lowest_eigenvalue: None,
            screening_condition: None,
        };

        let mut screened: Option<ScreenedSummary> = None;
        let mut modes: Option<Modes> = None;
        let (energy, gradient, lattice_gradient) = match self.config.method {
            Method::Ts => {
                let ts: TsResult = ts_energy(self, &partition, want_gradients)?;
                (ts.energy, ts.gradient, ts.lattice_gradient)
            }
            Method::Mbd => {
                let oscillators: Oscillators = Oscillators::bare(self);
                let coupled: CoupledResult =
                    CoupledOscillators::new(self, &oscillators).calculate(want_gradients)?;
                diagnostics.clamped_eigenvalues = coupled.clamped_eigenvalues;
                diagnostics.lowest_eigenvalue = Some(coupled.lowest_eigenvalue);
                modes = coupled.modes;
                (coupled.energy, coupled.gradient, coupled.lattice_gradient)
            }
            Method::Rpa => {
                let rpa: RpaResult = rpa_energy(self, &partition, want_gradients)?;
                (rpa.energy, rpa.gradient, rpa.lattice_gradient)
            }
            Method::MbdScs | Method::MbdRsScs => {
                let scs: ScreenedPolarizabilities = match self.config.method {
                    Method::MbdScs => ScreenedPolarizabilities::solve_full_range(self, &partition)?,
                    _ => ScreenedPolarizabilities::solve(self, &partition)?,
                };
                print_screened_polarizabilities(&scs, self.alpha_0().view());
                diagnostics.screening_condition = Some(scs.max_condition);
                let oscillators: Oscillators = scs.oscillators();
                let coupled: CoupledResult =
                    CoupledOscillators::new(self, &oscillators).calculate(want_gradients)?;
                diagnostics.clamped_eigenvalues = coupled.clamped_eigenvalues;
                diagnostics.lowest_eigenvalue = Some(coupled.lowest_eigenvalue);
                modes = coupled.modes;
                let (mut gradient, mut lattice_gradient) =
                    (coupled.gradient, coupled.lattice_gradient);
                if let (GradientPolicy::Full, Some(adjoints)) =
                    (self.config.gradients.policy, coupled.adjoints.as_ref())
                {
                    let (screening_gradient, screening_lattice) =
                        scs.backpropagate(self, adjoints, &partition)?;
                    if let Some(g) = gradient.as_mut() {
                        *g += &screening_gradient;
                    }
                    if let Some(g) = lattice_gradient.as_mut() {
                        *g += &screening_lattice;
                    }
                }
                screened = Some(ScreenedSummary::from(&scs));
                (coupled.energy, gradient, lattice_gradient)
            }
        };

        // the lattice derivative only exists for periodic systems
        let lattice_gradient: Option<Array2<f64>> = match self.lattice.as_ref() {
            Some(_) => lattice_gradient,
            None => None,
        };
        let stress: Option<Array2<f64>> = match (
            self.lattice.as_ref(),
            gradient.as_ref(),
            lattice_gradient.as_ref(),
        ) {
            (Some(lattice), Some(g), Some(l)) => Some(stress_tensor(
                &self.positions(),
                g.view(),
                lattice,
                l.view(),
            )),
            _ => None,
        };

        let result = MbdResult {
            method: self.config.method,
            energy,
            gradient,
            lattice_gradient,
            stress,
            screened,
            diagnostics,
            modes,
        };
        print_energy(&result);
        if let Some(g) = result.gradient.as_ref() {
            print_gradient(g.view());
        }
        info!("{}", timer);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::ANGS_TO_BOHR;
    use crate::gradients::numerical::assert_deriv;
    use crate::io::settings::DampingModel;
    use crate::utils::tests::*;
    use approx::assert_relative_eq;
    use nalgebra::{Rotation3, Vector3};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::f64::consts::PI;

    fn mbd_dimer(separation: f64) -> System {
        let mut system: System = get_dimer(separation);
        system.config.method = Method::Mbd;
        system
    }

    fn energy_at(system: &System, xyz: ArrayView1<f64>) -> f64 {
        let mut displaced: System = system.clone();
        displaced.update_xyz(xyz).unwrap();
        displaced.energy().unwrap()
    }

    fn check_position_gradient(system: &System, tol: f64) {
        let result: MbdResult = system.calculate(true).unwrap();
        let gradient: Array1<f64> = result
            .gradient
            .unwrap()
            .into_shape(3 * system.n_atoms)
            .unwrap();
        assert_deriv(
            |xyz| energy_at(system, xyz),
            gradient.view(),
            system.get_xyz().view(),
            0.01,
            tol,
        );
    }

    #[test]
    fn single_atom_has_no_dispersion_energy() {
        for method in [
            Method::Ts,
            Method::Mbd,
            Method::Rpa,
            Method::MbdScs,
            Method::MbdRsScs,
        ] {
            let mut system: System = get_single_atom();
            system.config.method = method;
            let result: MbdResult = system.calculate(true).unwrap();
            assert!(result.energy.abs() < 1e-12);
            assert!(result.gradient.unwrap().iter().all(|x| x.abs() < 1e-12));
        }
    }

    #[test]
    fn dimer_reference_energies() {
        for (separation, reference) in [
            (6.0, -1.752190701242995e-05),
            (8.0, -3.1407646421399704e-06),
            (12.0, -2.757724391067029e-07),
        ] {
            let energy: f64 = mbd_dimer(separation).energy().unwrap();
            assert_relative_eq!(energy, reference, max_relative = 1e-8);
        }
    }

    #[test]
    fn energy_vanishes_monotonically_with_the_separation() {
        let mut last: f64 = f64::NEG_INFINITY;
        for separation in [4.0, 5.0, 6.0, 8.0, 10.0, 15.0, 20.0, 40.0] {
            let energy: f64 = get_dimer(separation).energy().unwrap();
            assert!(energy < 0.0);
            assert!(energy > last);
            last = energy;
        }
        assert!(last.abs() < 1e-9);
    }

    #[test]
    fn energy_is_invariant_under_rigid_motions() {
        let system: System = get_trimer();
        let reference: f64 = system.energy().unwrap();
        let mut rng: StdRng = StdRng::seed_from_u64(42);
        for _ in 0..3 {
            let rotation = Rotation3::from_euler_angles(
                rng.gen_range(-PI..PI),
                rng.gen_range(-PI..PI),
                rng.gen_range(-PI..PI),
            );
            let shift: Vector3<f64> = Vector3::from_fn(|_, _| rng.gen_range(-20.0..20.0));
            let mut moved: System = system.clone();
            for atom in moved.atoms.iter_mut() {
                atom.xyz = rotation * atom.xyz + shift;
            }
            assert_relative_eq!(moved.energy().unwrap(), reference, max_relative = 1e-9);
        }
    }

    #[test]
    fn mbd_gradient_agrees_with_finite_differences() {
        for model in [
            DampingModel::Bare,
            DampingModel::Fermi,
            DampingModel::Gaussian,
            DampingModel::FermiGaussian,
        ] {
            let mut system: System = get_trimer();
            system.config.method = Method::Mbd;
            system.config.damping.model = model;
            check_position_gradient(&system, 1e-8);
        }
    }

    #[test]
    fn rsscs_gradient_agrees_with_finite_differences() {
        let system: System = get_trimer();
        check_position_gradient(&system, 1e-8);
    }

    #[test]
    fn ts_gradient_agrees_with_finite_differences() {
        let mut system: System = get_trimer();
        system.config.method = Method::Ts;
        check_position_gradient(&system, 1e-8);
    }

    #[test]
    fn rpa_gradient_agrees_with_finite_differences() {
        let mut system: System = get_trimer();
        system.config.method = Method::Rpa;
        check_position_gradient(&system, 1e-8);
        let mut system: System = get_periodic_pair();
        system.config.method = Method::Rpa;
        system.config.periodic.k_grid = [2, 1, 1];
        check_position_gradient(&system, 1e-8);
    }

    #[test]
    fn full_range_screening_changes_the_energy() {
        let mut system: System = get_trimer();
        let range_separated: MbdResult = system.calculate(false).unwrap();
        system.config.method = Method::MbdScs;
        let full_range: MbdResult = system.calculate(false).unwrap();
        assert_relative_eq!(full_range.energy, -4.792309262078298e-4, max_relative = 1e-6);
        assert_relative_eq!(
            range_separated.energy,
            -4.8021203713943805e-4,
            max_relative = 1e-6
        );
        let alpha: Array1<f64> = full_range.screened.unwrap().alpha;
        assert!(alpha[0] > range_separated.screened.unwrap().alpha[0]);
    }

    #[test]
    fn scs_gradient_agrees_with_finite_differences() {
        let mut system: System = get_trimer();
        system.config.method = Method::MbdScs;
        check_position_gradient(&system, 1e-8);
    }

    #[test]
    fn clamped_modes_are_left_out() {
        // the six eigenvalues of the dimer at 6 A are close to omega^2 = 0.25, three of them
        // are slightly below
        let mut system: System = mbd_dimer(6.0);
        system.config.eigen.clamp = 0.25;
        system.config.eigen.negative_eigenvalue_limit = 1.0;
        system.config.eigen.save_modes = true;
        let result: MbdResult = system.calculate(true).unwrap();
        assert!(result.energy.is_finite());
        assert_eq!(result.diagnostics.clamped_eigenvalues, 3);
        let eigenvalues: Array1<f64> = result.modes.unwrap().eigenvalues;
        let zero_point: f64 = 0.5
            * eigenvalues
                .iter()
                .filter(|lambda| **lambda >= 0.25)
                .map(|lambda| lambda.sqrt())
                .sum::<f64>()
            - 1.5 * 2.0 * 0.5;
        assert_relative_eq!(result.energy, zero_point, max_relative = 1e-10);
        // the gradient is the derivative of the energy without the clamped modes
        check_position_gradient(&system, 1e-8);
    }

    #[test]
    fn changed_configuration_is_checked_again() {
        let mut system: System = get_trimer();
        system.config.damping.a = -6.0;
        match system.calculate(false) {
            Err(MbdError::InvalidConfiguration { option, .. }) => assert_eq!(option, "damping.a"),
            other => panic!("expected an invalid steepness, got {:?}", other.map(|r| r.energy)),
        }
        let mut system: System = get_periodic_pair();
        system.config.periodic.k_grid = [0, 1, 1];
        assert!(system.calculate(true).is_err());
    }

    #[test]
    fn gradient_sums_to_zero() {
        let system: System = get_trimer();
        let gradient: Array2<f64> = system.calculate(true).unwrap().gradient.unwrap();
        for c in 0..3 {
            assert!(gradient.column(c).sum().abs() < 1e-12);
        }
    }

    #[test]
    fn decoupled_gradient_neglects_the_screening_response() {
        let mut system: System = get_trimer();
        let full: Array2<f64> = system.calculate(true).unwrap().gradient.unwrap();
        system.config.gradients.policy = GradientPolicy::Decoupled;
        let decoupled: Array2<f64> = system.calculate(true).unwrap().gradient.unwrap();
        assert!((&full - &decoupled).iter().any(|x| x.abs() > 1e-9));
        // the energy itself is not affected by the policy
        assert_eq!(
            system.energy().unwrap(),
            get_trimer().energy().unwrap()
        );
    }

    #[test]
    fn worker_count_does_not_change_the_results() {
        let system: System = get_trimer();
        let reference: MbdResult = system.calculate(true).unwrap();
        let reference_gradient: Array2<f64> = reference.gradient.unwrap();
        for n_workers in [2, 4] {
            let mut parallel: System = system.clone();
            parallel.config.parallelization.number_of_workers = n_workers;
            let result: MbdResult = parallel.calculate(true).unwrap();
            assert_relative_eq!(result.energy, reference.energy, max_relative = 1e-12);
            assert!(result
                .gradient
                .unwrap()
                .abs_diff_eq(&reference_gradient, 1e-14));
        }
    }

    #[test]
    fn close_contact_is_refused() {
        let mut system: System = get_dimer(6.0);
        let mut xyz: Array1<f64> = system.get_xyz();
        xyz[5] = xyz[2] + 0.01 * ANGS_TO_BOHR;
        system.update_xyz(xyz.view()).unwrap();
        match system.calculate(false) {
            Err(MbdError::DegenerateGeometry { atoms, .. }) => assert_eq!(atoms, (0, 1)),
            other => panic!("expected a degenerate geometry, got {:?}", other.map(|r| r.energy)),
        }
    }

    #[test]
    fn polarization_catastrophe_is_reported() {
        let mut system: System = mbd_dimer(0.6);
        system.config.damping.model = DampingModel::Bare;
        match system.energy() {
            Err(MbdError::NegativeEigenvalue { eigenvalue, .. }) => assert!(eigenvalue < -1.0),
            other => panic!("expected a negative eigenvalue, got {:?}", other),
        }
    }

    #[test]
    fn modes_are_saved_on_request() {
        let mut system: System = mbd_dimer(6.0);
        system.config.eigen.save_modes = true;
        let result: MbdResult = system.calculate(false).unwrap();
        let modes: Modes = result.modes.unwrap();
        assert_eq!(modes.eigenvalues.len(), 6);
        assert_eq!(modes.eigenvectors.dim(), (6, 6));
        let zero_point: f64 = 0.5 * modes.eigenvalues.mapv(f64::sqrt).sum() - 1.5 * 2.0 * 0.5;
        assert_relative_eq!(zero_point, result.energy, max_relative = 1e-8);
    }

    #[test]
    fn periodic_position_gradient_agrees_with_finite_differences() {
        let system: System = get_periodic_pair();
        check_position_gradient(&system, 1e-8);
    }

    #[test]
    fn lattice_gradient_agrees_with_finite_differences() {
        for k_grid in [[1, 1, 1], [2, 1, 1]] {
            let mut system: System = get_periodic_pair();
            system.config.periodic.k_grid = k_grid;
            let result: MbdResult = system.calculate(true).unwrap();
            let lattice_gradient: Array1<f64> =
                result.lattice_gradient.unwrap().into_shape(9).unwrap();
            let vectors: Array1<f64> = system
                .lattice
                .as_ref()
                .unwrap()
                .vectors()
                .into_shape(9)
                .unwrap();
            assert_deriv(
                |x| {
                    let mut strained: System = system.clone();
                    strained
                        .update_lattice(x.into_shape((3, 3)).unwrap())
                        .unwrap();
                    strained.energy().unwrap()
                },
                lattice_gradient.view(),
                vectors.view(),
                0.01,
                1e-8,
            );
        }
    }

    #[test]
    fn stress_agrees_with_a_homogeneous_strain() {
        let system: System = get_periodic_pair();
        let result: MbdResult = system.calculate(true).unwrap();
        let stress: Array2<f64> = result.stress.unwrap();
        let volume: f64 = system.lattice.as_ref().unwrap().volume();
        let vectors: Array2<f64> = system.lattice.as_ref().unwrap().vectors();
        let strained_energy = |eps: ArrayView1<f64>| -> f64 {
            let deformation: Array2<f64> =
                Array2::eye(3) + &eps.to_owned().into_shape((3, 3)).unwrap();
            let mut strained: System = system.clone();
            let xyz: Array2<f64> = system
                .get_xyz()
                .into_shape((system.n_atoms, 3))
                .unwrap()
                .dot(&deformation.t());
            strained
                .update_xyz(xyz.into_shape(3 * system.n_atoms).unwrap().view())
                .unwrap();
            strained
                .update_lattice(vectors.dot(&deformation.t()).view())
                .unwrap();
            strained.energy().unwrap()
        };
        let scaled: Array1<f64> = (stress * volume).into_shape(9).unwrap();
        assert_deriv(
            strained_energy,
            scaled.view(),
            Array1::zeros(9).view(),
            0.001,
            1e-8,
        );
    }

    #[test]
    fn k_point_sampling_is_parallelized_reproducibly() {
        let mut system: System = get_periodic_pair();
        system.config.periodic.k_grid = [3, 1, 1];
        let reference: MbdResult = system.calculate(true).unwrap();
        system.config.parallelization.number_of_workers = 2;
        let parallel: MbdResult = system.calculate(true).unwrap();
        assert_eq!(parallel.diagnostics.n_k_points, 3);
        assert_relative_eq!(parallel.energy, reference.energy, max_relative = 1e-12);
        assert!(parallel
            .gradient
            .unwrap()
            .abs_diff_eq(&reference.gradient.unwrap(), 1e-14));
    }
}
