use crate::constants::ANGS_TO_BOHR;
use crate::initialization::{Atom, System};
use crate::io::Configuration;
use anyhow::{bail, Context, Result};
use nalgebra::Vector3;
use ndarray::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Unit of the coordinates and of the lattice vectors in the input file.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LengthUnit {
    Angstrom,
    Bohr,
}

impl LengthUnit {
    pub fn to_bohr(&self) -> f64 {
        match self {
            LengthUnit::Angstrom => ANGS_TO_BOHR,
            LengthUnit::Bohr => 1.0,
        }
    }
}

fn default_unit() -> LengthUnit {
    LengthUnit::Angstrom
}

/// The `[system]` section of the input file. The response properties are in atomic units,
/// either `omega` or `c6` has to be given.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SystemInput {
    #[serde(default = "default_unit")]
    pub unit: LengthUnit,
    pub coordinates: Vec<[f64; 3]>,
    pub alpha_0: Vec<f64>,
    #[serde(default)]
    pub omega: Option<Vec<f64>>,
    #[serde(default)]
    pub c6: Option<Vec<f64>>,
    #[serde(default)]
    pub r_vdw: Option<Vec<f64>>,
    #[serde(default)]
    pub lattice: Option<[[f64; 3]; 3]>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct InputFile {
    pub system: SystemInput,
}

impl SystemInput {
    /// Atoms in atomic units.
    pub fn atoms(&self) -> Result<Vec<Atom>> {
        let n_atoms: usize = self.coordinates.len();
        if self.alpha_0.len() != n_atoms {
            bail!(
                "alpha_0 has {} entries but there are {} atoms",
                self.alpha_0.len(),
                n_atoms
            );
        }
        let scale: f64 = self.unit.to_bohr();
        let positions = self
            .coordinates
            .iter()
            .map(|xyz| Vector3::new(xyz[0], xyz[1], xyz[2]) * scale);
        let mut atoms: Vec<Atom> = match (self.omega.as_ref(), self.c6.as_ref()) {
            (Some(omega), None) => {
                check_length("omega", omega.len(), n_atoms)?;
                positions
                    .zip(self.alpha_0.iter().zip(omega.iter()))
                    .map(|(xyz, (alpha, omega))| Atom::new(xyz, *alpha, *omega))
                    .collect()
            }
            (None, Some(c6)) => {
                check_length("c6", c6.len(), n_atoms)?;
                positions
                    .zip(self.alpha_0.iter().zip(c6.iter()))
                    .map(|(xyz, (alpha, c6))| Atom::from_c6(xyz, *alpha, *c6))
                    .collect()
            }
            (Some(_), Some(_)) => bail!("give either omega or c6, not both"),
            (None, None) => bail!("either omega or c6 is required"),
        };
        if let Some(radii) = self.r_vdw.as_ref() {
            check_length("r_vdw", radii.len(), n_atoms)?;
            for (atom, radius) in atoms.iter_mut().zip(radii.iter()) {
                atom.r_vdw = *radius;
            }
        }
        Ok(atoms)
    }

    /// Lattice vectors (rows) in bohr.
    pub fn lattice(&self) -> Option<Array2<f64>> {
        let scale: f64 = self.unit.to_bohr();
        self.lattice
            .map(|vectors| Array2::from_shape_fn((3, 3), |(m, c)| vectors[m][c] * scale))
    }
}

fn check_length(name: &str, len: usize, n_atoms: usize) -> Result<()> {
    if len != n_atoms {
        bail!("{} has {} entries but there are {} atoms", name, len, n_atoms);
    }
    Ok(())
}

/// Reads the system from the input file and the configuration from the working directory.
/// If the configuration file does not exist, the default settings are written to it.
pub fn read_input(input_file: &str) -> Result<System> {
    let path: &Path = Path::new(input_file);
    let input_string: String = fs::read_to_string(path)
        .with_context(|| format!("Unable to read input file {}", path.display()))?;
    let input: InputFile = toml::from_str(&input_string)
        .with_context(|| format!("Malformed input file {}", path.display()))?;
    let config: Configuration = Configuration::new()?;
    let system: System = System::new(input.system.atoms()?, input.system.lattice(), config)?;
    Ok(system)
}
