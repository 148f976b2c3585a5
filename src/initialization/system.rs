use crate::error::MbdError;
use crate::initialization::atom::{vdw_radius_from_alpha, Atom};
use crate::io::Configuration;
use crate::linalg::{default_kernel, LinalgKernel};
use crate::periodic::{check_separations, monkhorst_pack, Images, KPoint, Lattice};
use nalgebra::Vector3;
use ndarray::prelude::*;
use std::sync::Arc;

/// Type that holds the atoms of a cluster or of the unit cell of a crystal together with the
/// settings of the calculation and the linear algebra backend.
#[derive(Clone)]
pub struct System {
    /// Type that holds all the input settings from the user.
    pub config: Configuration,
    /// Number of atoms
    pub n_atoms: usize,
    /// Vector with the data of the individual atoms
    pub atoms: Vec<Atom>,
    /// Unit cell, `None` for a finite system
    pub lattice: Option<Lattice>,
    kernel: Arc<dyn LinalgKernel>,
}

impl System {
    /// Creates a new [System]. The lattice vectors are the rows of `lattice`. The configuration
    /// and the atoms are checked, a close contact of two atoms is reported as
    /// [MbdError::DegenerateGeometry].
    pub fn new(
        atoms: Vec<Atom>,
        lattice: Option<Array2<f64>>,
        config: Configuration,
    ) -> Result<Self, MbdError> {
        config.validate()?;
        if atoms.is_empty() {
            return Err(MbdError::InvalidInput(String::from(
                "the system does not contain any atoms",
            )));
        }
        for (index, atom) in atoms.iter().enumerate() {
            atom.check(index)?;
        }
        let lattice: Option<Lattice> = match lattice {
            Some(vectors) => Some(Lattice::new(vectors.view())?),
            None => None,
        };
        let system = Self {
            config,
            n_atoms: atoms.len(),
            atoms,
            lattice,
            kernel: default_kernel(),
        };
        check_separations(&system.positions(), system.config.damping.min_separation)?;
        Ok(system)
    }

    /// Creates a new [System] from per-atom arrays. `coordinates` has the shape [N, 3], all
    /// other arrays have the length N. Missing vdW radii are derived from the polarizabilities.
    pub fn from_arrays(
        coordinates: ArrayView2<f64>,
        alpha_0: ArrayView1<f64>,
        omega: ArrayView1<f64>,
        r_vdw: Option<ArrayView1<f64>>,
        lattice: Option<Array2<f64>>,
        config: Configuration,
    ) -> Result<Self, MbdError> {
        let n_atoms: usize = coordinates.nrows();
        if coordinates.ncols() != 3 {
            return Err(MbdError::InvalidInput(format!(
                "the coordinates must have the shape [N, 3], got {:?}",
                coordinates.shape()
            )));
        }
        let mut lengths: Vec<(&str, usize)> =
            vec![("alpha_0", alpha_0.len()), ("omega", omega.len())];
        if let Some(radii) = r_vdw.as_ref() {
            lengths.push(("r_vdw", radii.len()));
        }
        if let Some((name, len)) = lengths.iter().find(|(_, len)| *len != n_atoms) {
            return Err(MbdError::InvalidInput(format!(
                "{} has {} entries but there are {} atoms",
                name, len, n_atoms
            )));
        }
        let atoms: Vec<Atom> = coordinates
            .outer_iter()
            .enumerate()
            .map(|(idx, xyz)| {
                let mut atom: Atom = Atom::new(
                    Vector3::new(xyz[0], xyz[1], xyz[2]),
                    alpha_0[idx],
                    omega[idx],
                );
                atom.r_vdw = match r_vdw.as_ref() {
                    Some(radii) => radii[idx],
                    None => vdw_radius_from_alpha(alpha_0[idx]),
                };
                atom
            })
            .collect();
        Self::new(atoms, lattice, config)
    }

    /// Replaces the linear algebra backend.
    pub fn with_kernel(mut self, kernel: Arc<dyn LinalgKernel>) -> Self {
        self.kernel = kernel;
        self
    }

    pub fn kernel(&self) -> &dyn LinalgKernel {
        self.kernel.as_ref()
    }

    pub fn is_periodic(&self) -> bool {
        self.lattice.is_some()
    }

    pub fn positions(&self) -> Vec<Vector3<f64>> {
        self.atoms.iter().map(|atom| atom.xyz).collect()
    }

    /// Coordinates as a flat array [x1, y1, z1, x2, ...].
    pub fn get_xyz(&self) -> Array1<f64> {
        self.atoms
            .iter()
            .flat_map(|atom| atom.xyz.iter().cloned().collect::<Vec<f64>>())
            .collect()
    }

    pub fn update_xyz(&mut self, coordinates: ArrayView1<f64>) -> Result<(), MbdError> {
        if coordinates.len() != 3 * self.n_atoms {
            return Err(MbdError::InvalidInput(format!(
                "{} coordinates given for {} atoms",
                coordinates.len(),
                self.n_atoms
            )));
        }
        for (atom, xyz) in self
            .atoms
            .iter_mut()
            .zip(coordinates.exact_chunks(3).into_iter())
        {
            atom.position_from_ndarray(xyz);
        }
        Ok(())
    }

    pub fn update_lattice(&mut self, vectors: ArrayView2<f64>) -> Result<(), MbdError> {
        self.lattice = Some(Lattice::new(vectors)?);
        Ok(())
    }

    pub fn alpha_0(&self) -> Array1<f64> {
        self.atoms.iter().map(|atom| atom.alpha_0).collect()
    }

    pub fn omega(&self) -> Array1<f64> {
        self.atoms.iter().map(|atom| atom.omega).collect()
    }

    pub fn r_vdw(&self) -> Array1<f64> {
        self.atoms.iter().map(|atom| atom.r_vdw).collect()
    }

    /// Pair and image enumeration of the current geometry.
    pub fn images(&self) -> Images {
        let min_separation: f64 = self.config.damping.min_separation;
        match self.lattice.as_ref() {
            Some(lattice) => Images::periodic(
                lattice,
                self.config.periodic.real_space_cutoff,
                min_separation,
                &self.positions(),
            ),
            None => Images::cluster(min_separation),
        }
    }

    /// k-points of the Brillouin-zone sampling, only the Gamma point for a finite system.
    pub fn k_points(&self) -> Vec<KPoint> {
        if self.is_periodic() {
            monkhorst_pack(
                self.config.periodic.k_grid,
                self.config.periodic.k_grid_shift,
            )
        } else {
            vec![KPoint::gamma()]
        }
    }

    /// [System::k_points] for a sum over the Brillouin zone, which needs at least one point.
    pub fn k_point_grid(&self) -> Result<Vec<KPoint>, MbdError> {
        let k_points: Vec<KPoint> = self.k_points();
        if k_points.is_empty() {
            return Err(MbdError::invalid_config(
                "periodic.k_grid",
                format!(
                    "the grid {:?} does not contain any k-point",
                    self.config.periodic.k_grid
                ),
            ));
        }
        Ok(k_points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inconsistent_arrays_are_rejected() {
        let coordinates: Array2<f64> = Array2::zeros((2, 3));
        let alpha: Array1<f64> = array![10.0, 10.0];
        let omega: Array1<f64> = array![0.5];
        let result = System::from_arrays(
            coordinates.view(),
            alpha.view(),
            omega.view(),
            None,
            None,
            Configuration::default(),
        );
        assert!(matches!(result, Err(MbdError::InvalidInput(_))));
    }

    #[test]
    fn close_contact_is_a_degenerate_geometry() {
        let d: f64 = 0.01 * crate::constants::ANGS_TO_BOHR;
        let coordinates: Array2<f64> = array![[0.0, 0.0, 0.0], [0.0, 0.0, d]];
        let alpha: Array1<f64> = array![10.0, 10.0];
        let omega: Array1<f64> = array![0.5, 0.5];
        let result = System::from_arrays(
            coordinates.view(),
            alpha.view(),
            omega.view(),
            None,
            None,
            Configuration::default(),
        );
        match result {
            Err(MbdError::DegenerateGeometry {
                atoms, distance, ..
            }) => {
                assert_eq!(atoms, (0, 1));
                assert!((distance - d).abs() < 1e-12);
            }
            _ => panic!("expected a degenerate geometry"),
        }
    }

    #[test]
    fn coordinates_can_be_updated() {
        let mut system: System = crate::utils::tests::get_dimer(6.0);
        let mut xyz: Array1<f64> = system.get_xyz();
        assert_eq!(xyz.len(), 6);
        xyz[5] += 1.0;
        system.update_xyz(xyz.view()).unwrap();
        assert_eq!(system.get_xyz(), xyz);
        assert!(system.update_xyz(xyz.slice(s![0..4])).is_err());
    }
}
