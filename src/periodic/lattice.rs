use crate::error::MbdError;
use itertools::iproduct;
use nalgebra::Vector3;
use ndarray::prelude::*;
use std::f64::consts::PI;

/// Unit cell of a periodic system. The lattice vectors are the rows of the 3x3 input matrix.
#[derive(Clone, Debug)]
pub struct Lattice {
    vectors: [Vector3<f64>; 3],
    /// Reciprocal vectors b_m with a_m . b_n = 2 pi delta_mn
    reciprocal: [Vector3<f64>; 3],
    volume: f64,
}

impl Lattice {
    pub fn new(vectors: ArrayView2<f64>) -> Result<Self, MbdError> {
        if vectors.dim() != (3, 3) {
            return Err(MbdError::InvalidInput(format!(
                "the lattice must be a 3x3 matrix, got shape {:?}",
                vectors.shape()
            )));
        }
        if vectors.iter().any(|x| !x.is_finite()) {
            return Err(MbdError::InvalidInput(String::from(
                "the lattice contains non-finite values",
            )));
        }
        let a: [Vector3<f64>; 3] = [
            Vector3::new(vectors[[0, 0]], vectors[[0, 1]], vectors[[0, 2]]),
            Vector3::new(vectors[[1, 0]], vectors[[1, 1]], vectors[[1, 2]]),
            Vector3::new(vectors[[2, 0]], vectors[[2, 1]], vectors[[2, 2]]),
        ];
        let signed_volume: f64 = a[0].dot(&a[1].cross(&a[2]));
        let scale: f64 = a[0].norm() * a[1].norm() * a[2].norm();
        if !(signed_volume.abs() > 1.0e-10 * scale) {
            return Err(MbdError::InvalidInput(format!(
                "the lattice vectors are linearly dependent (cell volume {:e} bohr^3)",
                signed_volume
            )));
        }
        let factor: f64 = 2.0 * PI / signed_volume;
        let reciprocal: [Vector3<f64>; 3] = [
            a[1].cross(&a[2]) * factor,
            a[2].cross(&a[0]) * factor,
            a[0].cross(&a[1]) * factor,
        ];
        Ok(Self {
            vectors: a,
            reciprocal,
            volume: signed_volume.abs(),
        })
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    /// Lattice vectors as rows of a 3x3 array.
    pub fn vectors(&self) -> Array2<f64> {
        Array2::from_shape_fn((3, 3), |(m, c)| self.vectors[m][c])
    }

    /// Reciprocal lattice vectors (including the factor 2 pi) as rows of a 3x3 array.
    pub fn reciprocal(&self) -> Array2<f64> {
        Array2::from_shape_fn((3, 3), |(m, c)| self.reciprocal[m][c])
    }

    /// Cartesian translation n_0 a_0 + n_1 a_1 + n_2 a_2.
    pub fn translation(&self, n: &[i32; 3]) -> Vector3<f64> {
        self.vectors[0] * n[0] as f64 + self.vectors[1] * n[1] as f64 + self.vectors[2] * n[2] as f64
    }

    /// Fractional coordinates of a Cartesian position.
    pub fn fractional(&self, xyz: &Vector3<f64>) -> Vector3<f64> {
        Vector3::new(
            xyz.dot(&self.reciprocal[0]),
            xyz.dot(&self.reciprocal[1]),
            xyz.dot(&self.reciprocal[2]),
        ) / (2.0 * PI)
    }

    /// Distance between neighboring lattice planes spanned by the two other vectors.
    fn plane_spacing(&self, m: usize) -> f64 {
        2.0 * PI / self.reciprocal[m].norm()
    }

    /// Largest translation index along each lattice vector that can bring any pair of the
    /// given positions within `cutoff`. A component of the fractional separation can not
    /// exceed |r| / d_m, therefore |n_m| <= cutoff / d_m + (spread of the fractional
    /// coordinates along m).
    pub fn image_range(&self, cutoff: f64, positions: &[Vector3<f64>]) -> [i32; 3] {
        let mut range: [i32; 3] = [0; 3];
        for (m, n_max) in range.iter_mut().enumerate() {
            let (low, high): (f64, f64) = positions
                .iter()
                .map(|xyz| self.fractional(xyz)[m])
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(low, high), f| {
                    (low.min(f), high.max(f))
                });
            let spread: f64 = if positions.is_empty() { 0.0 } else { high - low };
            *n_max = (cutoff / self.plane_spacing(m) + spread).ceil() as i32;
        }
        range
    }

    /// All translations with |n_m| <= range_m, the zero translation comes first.
    pub fn translations(&self, range: [i32; 3]) -> Vec<([i32; 3], Vector3<f64>)> {
        let mut cells: Vec<[i32; 3]> = iproduct!(
            -range[0]..=range[0],
            -range[1]..=range[1],
            -range[2]..=range[2]
        )
        .map(|(n0, n1, n2)| [n0, n1, n2])
        .collect();
        cells.sort_by_key(|n| n.iter().map(|x| x.abs()).sum::<i32>());
        cells
            .into_iter()
            .map(|n| {
                let shift: Vector3<f64> = self.translation(&n);
                (n, shift)
            })
            .collect()
    }
}
