//! Lattice geometry, Brillouin-zone sampling and the enumeration of periodic images.
mod images;
mod kgrid;
mod lattice;

pub use images::{check_separations, Images};
pub use kgrid::{monkhorst_pack, KPoint};
pub use lattice::Lattice;
