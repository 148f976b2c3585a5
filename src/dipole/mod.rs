//! Damped dipole-dipole interaction tensors and the assembly of the 3N x 3N interaction
//! matrices for finite and periodic systems.
pub mod damping;
mod matrix;
pub mod tensor;

pub use damping::{gaussian_width, gaussian_width_derivative, DampedTensor, Damping};
pub use matrix::{dipole_matrix, DipoleBuilder};
