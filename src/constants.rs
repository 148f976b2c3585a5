// CODATA 2018 bohr radius in Angstrom
pub const BOHR_TO_ANGS: f64 = 0.529177210903;
pub const ANGS_TO_BOHR: f64 = 1.0 / BOHR_TO_ANGS;

pub const HARTREE_TO_EV: f64 = 27.211386245988;
pub const HARTREE_TO_KCAL_MOL: f64 = 627.509474063;

pub const PI_SQRT: f64 = 1.7724538509055159;

/// Prefactor of the quantum-mechanical relation between the free-atom polarizability and
/// the van der Waals radius, R_vdW = 2.54 * alpha^(1/7) (both in atomic units).
pub const VDW_RADIUS_PREFACTOR: f64 = 2.54;
pub const VDW_RADIUS_EXPONENT: f64 = 1.0 / 7.0;
