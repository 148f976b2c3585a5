use itertools::iproduct;
use num_complex::Complex64;
use serde::Serialize;
use std::f64::consts::PI;

/// Point of the Brillouin-zone sampling in fractional reciprocal coordinates.
#[derive(Serialize, Clone, Copy, Debug, PartialEq)]
pub struct KPoint {
    pub fractional: [f64; 3],
    pub weight: f64,
}

impl KPoint {
    pub fn gamma() -> Self {
        Self {
            fractional: [0.0; 3],
            weight: 1.0,
        }
    }

    pub fn is_gamma(&self) -> bool {
        self.fractional.iter().all(|x| *x == 0.0)
    }

    /// Bloch phase exp(-i k . L) of the lattice translation L = sum_m n_m a_m. Since
    /// a_m . b_n = 2 pi delta_mn this is exp(-2 pi i kappa . n) for any lattice.
    pub fn phase(&self, n: &[i32; 3]) -> Complex64 {
        let kappa_n: f64 = self
            .fractional
            .iter()
            .zip(n.iter())
            .map(|(kappa, n)| kappa * *n as f64)
            .sum();
        Complex64::from_polar(1.0, -2.0 * PI * kappa_n)
    }
}

/// Maps a fractional coordinate onto the interval (-1/2, 1/2].
fn fold(x: f64) -> f64 {
    let folded: f64 = x - x.floor();
    if folded > 0.5 {
        folded - 1.0
    } else {
        folded
    }
}

/// Gamma-centred Monkhorst-Pack grid. The points kappa_m = (n_m + shift) / N_m are folded into
/// the first Brillouin zone and all carry the same weight 1 / (N_0 N_1 N_2). Without a shift
/// the Gamma point is the first point of the grid.
pub fn monkhorst_pack(grid: [usize; 3], shift: f64) -> Vec<KPoint> {
    let n_points: usize = grid.iter().product();
    let weight: f64 = 1.0 / n_points as f64;
    iproduct!(0..grid[0], 0..grid[1], 0..grid[2])
        .map(|(n0, n1, n2)| KPoint {
            fractional: [
                fold((n0 as f64 + shift) / grid[0] as f64),
                fold((n1 as f64 + shift) / grid[1] as f64),
                fold((n2 as f64 + shift) / grid[2] as f64),
            ],
            weight,
        })
        .collect()
}
