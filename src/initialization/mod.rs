pub use atom::Atom;
pub use system::System;

pub mod atom;
pub mod system;
