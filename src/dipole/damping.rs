use crate::dipole::tensor::{t_bare, t_bare_grad, t_gaussian, t_gaussian_with_derivatives};
use crate::io::settings::{DampingConfig, DampingModel};
use nalgebra::{Matrix3, Vector3};
use std::f64::consts::PI;

/// Width of the Gaussian charge density of a quantum harmonic oscillator with the
/// polarizability `alpha`: sigma = (sqrt(2/pi) alpha / 3)^(1/3).
pub fn gaussian_width(alpha: f64) -> f64 {
    ((2.0 / PI).sqrt() * alpha / 3.0).cbrt()
}

/// Derivative of [gaussian_width] with respect to the polarizability.
pub fn gaussian_width_derivative(alpha: f64) -> f64 {
    gaussian_width(alpha) / (3.0 * alpha)
}

/// Damped dipole tensor of one pair together with all derivatives that are needed for the
/// analytic gradients.
#[derive(Clone, Copy, Debug)]
pub struct DampedTensor {
    pub value: Matrix3<f64>,
    /// dT/dr_c for c = x, y, z
    pub grad: [Matrix3<f64>; 3],
    /// Derivative with respect to the sum of the vdW radii R_i + R_j.
    pub d_radius: Matrix3<f64>,
    /// Derivative with respect to the combined Gaussian width sigma_ij.
    pub d_sigma: Matrix3<f64>,
}

/// Fermi-type damping f = 1 / (1 + exp(-a (r / S - 1))) with S = beta (R_i + R_j) and its
/// derivatives with respect to r and to R_i + R_j.
#[derive(Clone, Copy, Debug)]
pub struct FermiDamping {
    pub value: f64,
    pub d_r: f64,
    pub d_radius: f64,
}

#[derive(Clone, Copy, Debug)]
pub struct Damping {
    pub model: DampingModel,
    pub beta: f64,
    pub a: f64,
}

impl Damping {
    pub fn new(model: DampingModel, config: &DampingConfig) -> Self {
        Self {
            model,
            beta: config.beta,
            a: config.a,
        }
    }

    /// Damping of the long-range coupling between the oscillators, as configured by the user.
    pub fn long_range(config: &DampingConfig) -> Self {
        Self::new(config.model, config)
    }

    /// Short-range complement used in the self-consistent screening.
    pub fn short_range(config: &DampingConfig) -> Self {
        Self::new(DampingModel::FermiGaussian, config)
    }

    pub fn fermi(&self, r: f64, radius: f64) -> FermiDamping {
        let s: f64 = self.beta * radius;
        let value: f64 = 1.0 / (1.0 + (-self.a * (r / s - 1.0)).exp());
        let slope: f64 = value * (1.0 - value);
        FermiDamping {
            value,
            d_r: self.a / s * slope,
            d_radius: -self.a * r / (s * s) * slope * self.beta,
        }
    }

    /// Does the model depend on the vdW radii?
    pub fn uses_radius(&self) -> bool {
        matches!(self.model, DampingModel::Fermi | DampingModel::FermiGaussian)
    }

    /// Does the model depend on the Gaussian widths?
    pub fn uses_width(&self) -> bool {
        matches!(
            self.model,
            DampingModel::Gaussian | DampingModel::FermiGaussian
        )
    }

    /// Damped dipole tensor for the separation `r`, the sum of the vdW radii `radius` and the
    /// combined Gaussian width `sigma`.
    pub fn tensor(&self, r: &Vector3<f64>, radius: f64, sigma: f64) -> Matrix3<f64> {
        match self.model {
            DampingModel::Bare => t_bare(r),
            DampingModel::Fermi => t_bare(r) * self.fermi(r.norm(), radius).value,
            DampingModel::Gaussian => t_gaussian(r, sigma),
            DampingModel::FermiGaussian => {
                t_gaussian(r, sigma) * (1.0 - self.fermi(r.norm(), radius).value)
            }
        }
    }

    pub fn tensor_with_derivatives(
        &self,
        r: &Vector3<f64>,
        radius: f64,
        sigma: f64,
    ) -> DampedTensor {
        match self.model {
            DampingModel::Bare => DampedTensor {
                value: t_bare(r),
                grad: t_bare_grad(r),
                d_radius: Matrix3::zeros(),
                d_sigma: Matrix3::zeros(),
            },
            DampingModel::Fermi => {
                let distance: f64 = r.norm();
                let f: FermiDamping = self.fermi(distance, radius);
                let t: Matrix3<f64> = t_bare(r);
                let mut grad: [Matrix3<f64>; 3] = t_bare_grad(r);
                for (c, dt) in grad.iter_mut().enumerate() {
                    *dt = *dt * f.value + t * (f.d_r * r[c] / distance);
                }
                DampedTensor {
                    value: t * f.value,
                    grad,
                    d_radius: t * f.d_radius,
                    d_sigma: Matrix3::zeros(),
                }
            }
            DampingModel::Gaussian => {
                let (value, grad, d_sigma) = t_gaussian_with_derivatives(r, sigma);
                DampedTensor {
                    value,
                    grad,
                    d_radius: Matrix3::zeros(),
                    d_sigma,
                }
            }
            DampingModel::FermiGaussian => {
                let distance: f64 = r.norm();
                let f: FermiDamping = self.fermi(distance, radius);
                let (t, mut grad, d_sigma) = t_gaussian_with_derivatives(r, sigma);
                for (c, dt) in grad.iter_mut().enumerate() {
                    *dt = *dt * (1.0 - f.value) - t * (f.d_r * r[c] / distance);
                }
                DampedTensor {
                    value: t * (1.0 - f.value),
                    grad,
                    d_radius: t * (-f.d_radius),
                    d_sigma: d_sigma * (1.0 - f.value),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const MODELS: [DampingModel; 4] = [
        DampingModel::Bare,
        DampingModel::Fermi,
        DampingModel::Gaussian,
        DampingModel::FermiGaussian,
    ];

    fn damping(model: DampingModel) -> Damping {
        Damping {
            model,
            beta: 0.83,
            a: 6.0,
        }
    }

    #[test]
    fn fermi_damping_limits() {
        let d: Damping = damping(DampingModel::Fermi);
        assert!(d.fermi(0.5, 6.0).value < 0.01);
        assert_abs_diff_eq!(d.fermi(4.98, 6.0).value, 0.5, epsilon = 1e-12);
        assert!(d.fermi(40.0, 6.0).value > 0.9999);
    }

    #[test]
    fn short_range_damping_vanishes_at_long_range() {
        let d: Damping = damping(DampingModel::FermiGaussian);
        let t: Matrix3<f64> = d.tensor(&Vector3::new(30.0, 0.0, 0.0), 6.0, 2.0);
        assert!(t.amax() < 1.0e-10);
    }

    #[test]
    fn derivatives_of_all_models() {
        let r: Vector3<f64> = Vector3::new(2.1, -1.3, 3.4);
        let radius: f64 = 5.2;
        let sigma: f64 = 1.7;
        let h: f64 = 1.0e-5;
        for model in MODELS.iter() {
            let d: Damping = damping(*model);
            let analytic: DampedTensor = d.tensor_with_derivatives(&r, radius, sigma);
            assert!((analytic.value - d.tensor(&r, radius, sigma)).amax() < 1e-14);
            for c in 0..3 {
                let mut rp = r;
                let mut rm = r;
                rp[c] += h;
                rm[c] -= h;
                let numerical: Matrix3<f64> =
                    (d.tensor(&rp, radius, sigma) - d.tensor(&rm, radius, sigma)) / (2.0 * h);
                assert!((analytic.grad[c] - numerical).amax() < 1e-8, "{:?}", model);
            }
            let numerical_radius: Matrix3<f64> = (d.tensor(&r, radius + h, sigma)
                - d.tensor(&r, radius - h, sigma))
                / (2.0 * h);
            assert!((analytic.d_radius - numerical_radius).amax() < 1e-8);
            let numerical_sigma: Matrix3<f64> = (d.tensor(&r, radius, sigma + h)
                - d.tensor(&r, radius, sigma - h))
                / (2.0 * h);
            assert!((analytic.d_sigma - numerical_sigma).amax() < 1e-8);
        }
    }

    #[test]
    fn gaussian_width_derivative_is_consistent() {
        let h: f64 = 1.0e-6;
        let numerical: f64 = (gaussian_width(10.0 + h) - gaussian_width(10.0 - h)) / (2.0 * h);
        assert_abs_diff_eq!(gaussian_width_derivative(10.0), numerical, epsilon = 1e-9);
    }
}
