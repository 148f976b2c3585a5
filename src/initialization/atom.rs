use crate::constants::{VDW_RADIUS_EXPONENT, VDW_RADIUS_PREFACTOR};
use crate::error::MbdError;
use nalgebra::Vector3;
use ndarray::prelude::*;

/// `Atom` type that holds the free-atom response properties of one atom in the system. The
/// atom is described as a quantum harmonic oscillator with the static dipole polarizability
/// `alpha_0` and the characteristic frequency `omega`. All quantities are in atomic units.
#[derive(Clone, Debug, PartialEq)]
pub struct Atom {
    /// Position of the atom in bohr
    pub xyz: Vector3<f64>,
    /// Static polarizability in bohr^3
    pub alpha_0: f64,
    /// Characteristic excitation frequency in Hartree
    pub omega: f64,
    /// Van der Waals radius in bohr that sets the range of the damping
    pub r_vdw: f64,
}

/// Van der Waals radius from the polarizability, R = 2.54 alpha^(1/7).
pub fn vdw_radius_from_alpha(alpha_0: f64) -> f64 {
    VDW_RADIUS_PREFACTOR * alpha_0.powf(VDW_RADIUS_EXPONENT)
}

impl Atom {
    /// Creates an atom. The van der Waals radius is derived from the polarizability.
    pub fn new(xyz: Vector3<f64>, alpha_0: f64, omega: f64) -> Self {
        Self {
            xyz,
            alpha_0,
            omega,
            r_vdw: vdw_radius_from_alpha(alpha_0),
        }
    }

    /// Creates an atom from its dispersion coefficient, omega = 4 C6 / (3 alpha_0^2).
    pub fn from_c6(xyz: Vector3<f64>, alpha_0: f64, c6: f64) -> Self {
        Self::new(xyz, alpha_0, 4.0 * c6 / (3.0 * alpha_0 * alpha_0))
    }

    pub fn with_vdw_radius(mut self, r_vdw: f64) -> Self {
        self.r_vdw = r_vdw;
        self
    }

    /// Homonuclear C6 coefficient of the oscillator, 3/4 alpha^2 omega.
    pub fn c6(&self) -> f64 {
        0.75 * self.alpha_0 * self.alpha_0 * self.omega
    }

    pub fn position_from_ndarray(&mut self, position: ArrayView1<f64>) {
        self.xyz = Vector3::new(position[0], position[1], position[2]);
    }

    /// Checks that the response properties are physical.
    pub fn check(&self, index: usize) -> Result<(), MbdError> {
        if self.xyz.iter().any(|x| !x.is_finite()) {
            return Err(MbdError::InvalidInput(format!(
                "the position of atom {} is not finite",
                index + 1
            )));
        }
        for (name, value) in [
            ("polarizability", self.alpha_0),
            ("frequency", self.omega),
            ("vdW radius", self.r_vdw),
        ] {
            if !(value > 0.0 && value.is_finite()) {
                return Err(MbdError::InvalidInput(format!(
                    "the {} of atom {} is {}, a positive number is required",
                    name,
                    index + 1,
                    value
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn c6_constructor_is_consistent() {
        let atom: Atom = Atom::from_c6(Vector3::zeros(), 10.0, 37.5);
        assert_relative_eq!(atom.omega, 0.5, epsilon = 1e-14);
        assert_relative_eq!(atom.c6(), 37.5, epsilon = 1e-12);
    }

    #[test]
    fn unphysical_values_are_rejected() {
        let atom: Atom = Atom::new(Vector3::zeros(), -1.0, 0.5);
        assert!(matches!(atom.check(0), Err(MbdError::InvalidInput(_))));
        let atom: Atom = Atom::new(Vector3::new(f64::NAN, 0.0, 0.0), 1.0, 0.5);
        assert!(atom.check(0).is_err());
        let atom: Atom = Atom::new(Vector3::zeros(), 10.0, 0.5).with_vdw_radius(3.5);
        assert!(atom.check(0).is_ok());
        assert_eq!(atom.r_vdw, 3.5);
    }
}
