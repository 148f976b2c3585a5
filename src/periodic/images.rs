use crate::error::MbdError;
use crate::periodic::lattice::Lattice;
use itertools::Itertools;
use nalgebra::Vector3;

/// Enumeration of the atom pairs and of the periodic images that enter the pairwise sums.
///
/// Only pairs with i <= j are visited, the (j, i) blocks follow from the symmetry of the
/// dipole tensor. The diagonal pairs (i, i) only exist for periodic systems, where they
/// collect the interaction of an atom with its own images.
#[derive(Clone, Debug)]
pub struct Images {
    translations: Vec<([i32; 3], Vector3<f64>)>,
    cutoff: Option<f64>,
    min_separation: f64,
}

impl Images {
    /// A finite system: only the zero translation and no cutoff.
    pub fn cluster(min_separation: f64) -> Self {
        Self {
            translations: vec![([0; 3], Vector3::zeros())],
            cutoff: None,
            min_separation,
        }
    }

    pub fn periodic(
        lattice: &Lattice,
        cutoff: f64,
        min_separation: f64,
        positions: &[Vector3<f64>],
    ) -> Self {
        let range: [i32; 3] = lattice.image_range(cutoff, positions);
        Self {
            translations: lattice.translations(range),
            cutoff: Some(cutoff),
            min_separation,
        }
    }

    pub fn is_periodic(&self) -> bool {
        self.cutoff.is_some()
    }

    /// The work units of all pairwise loops.
    pub fn pairs(&self, n_atoms: usize) -> Vec<(usize, usize)> {
        let mut pairs: Vec<(usize, usize)> = Vec::with_capacity(n_atoms * (n_atoms + 1) / 2);
        for i in 0..n_atoms {
            if self.is_periodic() {
                pairs.push((i, i));
            }
            pairs.extend((i + 1..n_atoms).map(|j| (i, j)));
        }
        pairs
    }

    /// Calls `f(n, r)` for every image n of atom j with r = R_i - R_j - L_n that lies within
    /// the cutoff. The self term (i == j, n == 0) is skipped. Separations below the minimum
    /// separation are an error.
    pub fn visit<F>(
        &self,
        positions: &[Vector3<f64>],
        i: usize,
        j: usize,
        mut f: F,
    ) -> Result<(), MbdError>
    where
        F: FnMut(&[i32; 3], &Vector3<f64>),
    {
        let r_ij: Vector3<f64> = positions[i] - positions[j];
        for (n, shift) in self.translations.iter() {
            if i == j && n.iter().all(|x| *x == 0) {
                continue;
            }
            let r: Vector3<f64> = r_ij - shift;
            let distance: f64 = r.norm();
            if let Some(cutoff) = self.cutoff {
                if distance > cutoff {
                    continue;
                }
            }
            if !(distance >= self.min_separation) {
                return Err(MbdError::DegenerateGeometry {
                    atoms: (i, j),
                    distance,
                    limit: self.min_separation,
                });
            }
            f(n, &r);
        }
        Ok(())
    }
}

/// Checks that no two atoms of a finite set are closer than `min_separation`.
pub fn check_separations(positions: &[Vector3<f64>], min_separation: f64) -> Result<(), MbdError> {
    for ((i, a), (j, b)) in positions.iter().enumerate().tuple_combinations() {
        let distance: f64 = (a - b).norm();
        if !(distance >= min_separation) {
            return Err(MbdError::DegenerateGeometry {
                atoms: (i, j),
                distance,
                limit: min_separation,
            });
        }
    }
    Ok(())
}
