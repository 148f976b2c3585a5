use crate::constants::PI_SQRT;
use nalgebra::{Matrix3, Vector3};

/// Bare dipole-dipole interaction tensor T = (-3 r r^T + r^2 I) / r^5, i.e. minus the
/// Hessian of 1/r.
pub fn t_bare(r: &Vector3<f64>) -> Matrix3<f64> {
    let r2: f64 = r.norm_squared();
    let r1: f64 = r2.sqrt();
    let r5: f64 = r2 * r2 * r1;
    (r * r.transpose()) * (-3.0 / r5) + Matrix3::identity() * (1.0 / (r2 * r1))
}

/// Derivatives of the bare dipole tensor with respect to the components of r.
/// Element `c` of the returned array is dT/dr_c.
pub fn t_bare_grad(r: &Vector3<f64>) -> [Matrix3<f64>; 3] {
    let r2: f64 = r.norm_squared();
    let r1: f64 = r2.sqrt();
    let r5: f64 = r2 * r2 * r1;
    let r7: f64 = r5 * r2;
    let mut grad: [Matrix3<f64>; 3] = [Matrix3::zeros(); 3];
    for (c, dt) in grad.iter_mut().enumerate() {
        for a in 0..3 {
            for b in 0..3 {
                let mut value: f64 = 15.0 * r[a] * r[b] * r[c] / r7;
                if a == c {
                    value -= 3.0 * r[b] / r5;
                }
                if b == c {
                    value -= 3.0 * r[a] / r5;
                }
                if a == b {
                    value -= 3.0 * r[c] / r5;
                }
                dt[(a, b)] = value;
            }
        }
    }
    grad
}

/// Radial functions of the dipole tensor between two Gaussian charge distributions with a
/// combined width sigma:
///
/// T_gg = E(r) T + h(r) r r^T,  E = erf(z) - theta,  h = 2 z^2 theta / r^5
///
/// with z = r / sigma and theta = 2 z exp(-z^2) / sqrt(pi). The derivatives with respect
/// to r and sigma are stored as well.
#[derive(Clone, Copy, Debug)]
struct ErfScreening {
    e: f64,
    h: f64,
    de_dr: f64,
    dh_dr: f64,
    de_dsigma: f64,
    dh_dsigma: f64,
}

impl ErfScreening {
    fn new(r: f64, sigma: f64) -> Self {
        let z: f64 = r / sigma;
        let z2: f64 = z * z;
        let theta: f64 = 2.0 * z / PI_SQRT * (-z2).exp();
        let e: f64 = libm::erf(z) - theta;
        let r5: f64 = r.powi(5);
        Self {
            e,
            h: 2.0 * z2 * theta / r5,
            de_dr: 2.0 * z2 * theta / r,
            dh_dr: -4.0 * z2 * theta * (1.0 + z2) / (r5 * r),
            de_dsigma: -2.0 * z2 * theta / sigma,
            dh_dsigma: -2.0 * z2 * theta * (3.0 - 2.0 * z2) / (sigma * r5),
        }
    }
}

/// Dipole tensor of two Gaussian charge densities.
pub fn t_gaussian(r: &Vector3<f64>, sigma: f64) -> Matrix3<f64> {
    let screening = ErfScreening::new(r.norm(), sigma);
    t_bare(r) * screening.e + (r * r.transpose()) * screening.h
}

/// Dipole tensor of two Gaussian charge densities together with its derivatives with respect
/// to the components of r and to sigma.
pub fn t_gaussian_with_derivatives(
    r: &Vector3<f64>,
    sigma: f64,
) -> (Matrix3<f64>, [Matrix3<f64>; 3], Matrix3<f64>) {
    let distance: f64 = r.norm();
    let screening = ErfScreening::new(distance, sigma);
    let bare: Matrix3<f64> = t_bare(r);
    let bare_grad: [Matrix3<f64>; 3] = t_bare_grad(r);
    let rr: Matrix3<f64> = r * r.transpose();
    let value: Matrix3<f64> = bare * screening.e + rr * screening.h;
    let mut grad: [Matrix3<f64>; 3] = [Matrix3::zeros(); 3];
    for (c, dt) in grad.iter_mut().enumerate() {
        let radial: f64 = r[c] / distance;
        let mut product: Matrix3<f64> = Matrix3::zeros();
        for a in 0..3 {
            product[(a, c)] += r[a];
            product[(c, a)] += r[a];
        }
        *dt = bare * (screening.de_dr * radial)
            + bare_grad[c] * screening.e
            + rr * (screening.dh_dr * radial)
            + product * screening.h;
    }
    let d_sigma: Matrix3<f64> = bare * screening.de_dsigma + rr * screening.dh_dsigma;
    (value, grad, d_sigma)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn numerical_grad<F: Fn(&Vector3<f64>) -> Matrix3<f64>>(
        f: F,
        r: &Vector3<f64>,
    ) -> [Matrix3<f64>; 3] {
        let h: f64 = 1.0e-5;
        let mut grad: [Matrix3<f64>; 3] = [Matrix3::zeros(); 3];
        for c in 0..3 {
            let mut rp = *r;
            let mut rm = *r;
            rp[c] += h;
            rm[c] -= h;
            grad[c] = (f(&rp) - f(&rm)) / (2.0 * h);
        }
        grad
    }

    #[test]
    fn bare_tensor_is_symmetric_and_traceless() {
        let r: Vector3<f64> = Vector3::new(1.3, -0.4, 2.2);
        let t: Matrix3<f64> = t_bare(&r);
        assert_abs_diff_eq!(t.trace(), 0.0, epsilon = 1e-14);
        assert_eq!(t, t.transpose());
        // along the z axis: T_zz = -2/r^3, T_xx = T_yy = 1/r^3
        let t_z: Matrix3<f64> = t_bare(&Vector3::new(0.0, 0.0, 2.0));
        assert_abs_diff_eq!(t_z[(2, 2)], -0.25, epsilon = 1e-15);
        assert_abs_diff_eq!(t_z[(0, 0)], 0.125, epsilon = 1e-15);
    }

    #[test]
    fn bare_tensor_gradient() {
        let r: Vector3<f64> = Vector3::new(1.3, -0.4, 2.2);
        let analytic = t_bare_grad(&r);
        let numerical = numerical_grad(t_bare, &r);
        for c in 0..3 {
            assert!((analytic[c] - numerical[c]).amax() < 1e-8);
        }
    }

    #[test]
    fn gaussian_tensor_reaches_bare_tensor_at_long_range() {
        let r: Vector3<f64> = Vector3::new(8.0, 3.0, -5.0);
        assert!((t_gaussian(&r, 0.8) - t_bare(&r)).amax() < 1e-14);
        // and stays finite at short range
        let short: Matrix3<f64> = t_gaussian(&Vector3::new(1.0e-3, 0.0, 0.0), 1.0);
        assert!(short.iter().all(|x| x.is_finite()));
    }

    #[test]
    fn gaussian_tensor_derivatives() {
        let r: Vector3<f64> = Vector3::new(1.1, 0.7, -1.9);
        let sigma: f64 = 1.4;
        let (value, grad, d_sigma) = t_gaussian_with_derivatives(&r, sigma);
        assert!((value - t_gaussian(&r, sigma)).amax() < 1e-15);
        let numerical = numerical_grad(|x| t_gaussian(x, sigma), &r);
        for c in 0..3 {
            assert!((grad[c] - numerical[c]).amax() < 1e-8);
        }
        let h: f64 = 1.0e-5;
        let numerical_sigma: Matrix3<f64> =
            (t_gaussian(&r, sigma + h) - t_gaussian(&r, sigma - h)) / (2.0 * h);
        assert!((d_sigma - numerical_sigma).amax() < 1e-8);
    }
}
