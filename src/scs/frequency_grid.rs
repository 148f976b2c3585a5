use ndarray::prelude::*;
use std::f64::consts::PI;

/// Nodes and weights of the n-point Gauss-Legendre quadrature on [-1, 1] in ascending order.
/// The nodes are the roots of the Legendre polynomial P_n, found by Newton iterations.
pub fn gauss_legendre(n: usize) -> (Array1<f64>, Array1<f64>) {
    let mut nodes: Array1<f64> = Array1::zeros(n);
    let mut weights: Array1<f64> = Array1::zeros(n);
    for i in 0..n {
        let mut x: f64 = (PI * (i as f64 + 0.75) / (n as f64 + 0.5)).cos();
        let mut derivative: f64 = 0.0;
        for _ in 0..100 {
            let (p, dp) = legendre(n, x);
            derivative = dp;
            let dx: f64 = p / dp;
            x -= dx;
            if dx.abs() < 1.0e-15 {
                break;
            }
        }
        let (_, dp) = legendre(n, x);
        if dp.is_finite() {
            derivative = dp;
        }
        // the roots come out in descending order
        nodes[n - 1 - i] = x;
        weights[n - 1 - i] = 2.0 / ((1.0 - x * x) * derivative * derivative);
    }
    (nodes, weights)
}

/// P_n(x) and its derivative by the three-term recurrence.
fn legendre(n: usize, x: f64) -> (f64, f64) {
    let mut p_prev: f64 = 1.0;
    let mut p: f64 = x;
    if n == 0 {
        return (1.0, 0.0);
    }
    for k in 2..=n {
        let k: f64 = k as f64;
        let p_next: f64 = ((2.0 * k - 1.0) * x * p - (k - 1.0) * p_prev) / k;
        p_prev = p;
        p = p_next;
    }
    let dp: f64 = n as f64 * (x * p - p_prev) / (x * x - 1.0);
    (p, dp)
}

/// Grid on the imaginary frequency axis for the Casimir-Polder integrals. The Gauss-Legendre
/// nodes are mapped onto [0, inf) by u = L (1 + x) / (1 - x). The static limit u = 0 is
/// prepended with a zero weight, so the point with index 0 always yields the static
/// polarizabilities.
#[derive(Clone, Debug)]
pub struct FrequencyGrid {
    pub points: Array1<f64>,
    pub weights: Array1<f64>,
}

impl FrequencyGrid {
    pub fn new(n_points: usize, scale: f64) -> Self {
        let (nodes, gl_weights) = gauss_legendre(n_points);
        let mut points: Array1<f64> = Array1::zeros(n_points + 1);
        let mut weights: Array1<f64> = Array1::zeros(n_points + 1);
        for (k, (x, w)) in nodes.iter().zip(gl_weights.iter()).enumerate() {
            points[k + 1] = scale * (1.0 + x) / (1.0 - x);
            weights[k + 1] = w * 2.0 * scale / (1.0 - x).powi(2);
        }
        Self { points, weights }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
