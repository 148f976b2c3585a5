//! Many-body dispersion (MBD) energies and analytic gradients of finite and periodic systems.
//!
//! Every atom is described as a quantum harmonic oscillator with a static polarizability and
//! a characteristic frequency. The polarizabilities are screened self-consistently with the
//! short-range part of the dipole interaction, the screened oscillators are then coupled by
//! the long-range part and the correlation energy follows from the eigenvalues of the
//! coupled oscillator matrix.
//!
//! ```no_run
//! use ndarray::array;
//! use rusty_mbd::{Configuration, System};
//!
//! let coordinates = array![[0.0, 0.0, 0.0], [0.0, 0.0, 7.0]];
//! let alpha_0 = array![10.0, 10.0];
//! let omega = array![0.5, 0.5];
//! let system = System::from_arrays(
//!     coordinates.view(),
//!     alpha_0.view(),
//!     omega.view(),
//!     None,
//!     None,
//!     Configuration::default(),
//! )
//! .unwrap();
//! let result = system.calculate(true).unwrap();
//! println!("{} {:?}", result.energy, result.gradient);
//! ```
pub mod constants;
pub mod defaults;
pub mod dipole;
pub mod energy;
pub mod error;
pub mod gradients;
pub mod initialization;
pub mod io;
pub mod linalg;
pub mod parallel;
pub mod periodic;
pub mod scs;
pub mod utils;

pub use energy::{Diagnostics, MbdResult, Modes};
pub use error::{LinalgError, MbdError};
pub use initialization::{Atom, System};
pub use io::settings::{DampingModel, GradientPolicy, Method};
pub use io::Configuration;
