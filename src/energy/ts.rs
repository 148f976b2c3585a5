use crate::dipole::Damping;
use crate::error::MbdError;
use crate::initialization::System;
use crate::io::settings::DampingModel;
use crate::parallel::{RankOrderedSum, WorkPartition};
use crate::periodic::Images;
use nalgebra::Vector3;
use ndarray::prelude::*;

/// Pairwise Tkatchenko-Scheffler energy and its derivatives.
#[derive(Clone, Debug)]
pub struct TsResult {
    pub energy: f64,
    pub gradient: Option<Array2<f64>>,
    pub lattice_gradient: Option<Array2<f64>>,
}

/// Combination rule for the heteronuclear dispersion coefficient.
pub fn combined_c6(c6_i: f64, c6_j: f64, alpha_i: f64, alpha_j: f64) -> f64 {
    2.0 * c6_i * c6_j / (alpha_j / alpha_i * c6_i + alpha_i / alpha_j * c6_j)
}

/// E = -1/2 sum'_ij f(r_ij) C6_ij / r_ij^6 over all pairs and periodic images, damped with
/// the Fermi function of the free-atom vdW radii.
pub fn ts_energy(
    system: &System,
    partition: &WorkPartition,
    want_gradients: bool,
) -> Result<TsResult, MbdError> {
    let n_atoms: usize = system.n_atoms;
    let positions: Vec<Vector3<f64>> = system.positions();
    let images: Images = system.images();
    let pairs: Vec<(usize, usize)> = images.pairs(n_atoms);
    let damping: Damping = Damping::new(DampingModel::Fermi, &system.config.damping);
    let alpha: Array1<f64> = system.alpha_0();
    let r_vdw: Array1<f64> = system.r_vdw();
    let c6: Array1<f64> = system.atoms.iter().map(|atom| atom.c6()).collect();
    // [energy, dE/dR (3N), dE/dA (9)]
    let len: usize = 1 + 3 * n_atoms + 9;

    let total: Array1<f64> = partition.map_reduce(&pairs, len, &RankOrderedSum, |_, chunk| {
        let mut partial: Array1<f64> = Array1::zeros(len);
        for (i, j) in chunk.iter().cloned() {
            let multiplicity: f64 = if i == j { 1.0 } else { 2.0 };
            let c6_ij: f64 = combined_c6(c6[i], c6[j], alpha[i], alpha[j]);
            let radius: f64 = r_vdw[i] + r_vdw[j];
            images.visit(&positions, i, j, |n, r| {
                let distance: f64 = r.norm();
                let fermi = damping.fermi(distance, radius);
                let r6: f64 = distance.powi(6);
                partial[0] -= 0.5 * multiplicity * fermi.value * c6_ij / r6;
                if want_gradients {
                    let d_e: f64 = -0.5
                        * multiplicity
                        * c6_ij
                        * (fermi.d_r / r6 - 6.0 * fermi.value / (r6 * distance));
                    for c in 0..3 {
                        let g: f64 = d_e * r[c] / distance;
                        partial[1 + 3 * i + c] += g;
                        partial[1 + 3 * j + c] -= g;
                        for m in 0..3 {
                            partial[1 + 3 * n_atoms + 3 * m + c] -= n[m] as f64 * g;
                        }
                    }
                }
            })?;
        }
        Ok(partial)
    })?;

    let (gradient, lattice_gradient) = if want_gradients {
        (
            Some(Array2::from_shape_fn((n_atoms, 3), |(i, c)| total[1 + 3 * i + c])),
            Some(Array2::from_shape_fn((3, 3), |(m, c)| {
                total[1 + 3 * n_atoms + 3 * m + c]
            })),
        )
    } else {
        (None, None)
    };
    Ok(TsResult {
        energy: total[0],
        gradient,
        lattice_gradient,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::tests::get_dimer;
    use approx::assert_relative_eq;

    #[test]
    fn homonuclear_combination_rule() {
        assert_relative_eq!(combined_c6(37.5, 37.5, 10.0, 10.0), 37.5);
        // symmetric in the two atoms
        assert_relative_eq!(
            combined_c6(37.5, 12.0, 10.0, 5.0),
            combined_c6(12.0, 37.5, 5.0, 10.0),
            max_relative = 1e-15
        );
    }

    #[test]
    fn dimer_energy_is_the_damped_pair_term() {
        let system: System = get_dimer(5.0);
        let result: TsResult = ts_energy(&system, &WorkPartition::serial(), false).unwrap();
        let r: f64 = (system.atoms[0].xyz - system.atoms[1].xyz).norm();
        let radius: f64 = 2.0 * system.atoms[0].r_vdw;
        let s: f64 = system.config.damping.beta * radius;
        let f: f64 = 1.0 / (1.0 + (-system.config.damping.a * (r / s - 1.0)).exp());
        let c6: f64 = system.atoms[0].c6();
        assert_relative_eq!(result.energy, -f * c6 / r.powi(6), max_relative = 1e-13);
        assert!(result.gradient.is_none());
    }
}
