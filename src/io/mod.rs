mod imprint;
mod input;
mod output;
pub mod settings;

pub use imprint::{write_footer, write_header};
pub use input::{read_input, InputFile, LengthUnit, SystemInput};
pub use output::write_result;
pub use settings::Configuration;
