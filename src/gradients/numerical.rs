use ndarray::prelude::*;
use ndarray_stats::QuantileExt;

/// Test the gradient of a function.
/// * function: The function whose derivatives must be tested, takes one argument
/// * analytic_grad: The gradient that is tested, one entry per component of `origin`
/// * origin: The point at which the derivatives are computed.
/// * stepsize: The initial (maximal) step size for the finite difference method.
/// * tol: The allowed absolute error on the derivative.
///   The idea of this function comes from the derivcheck
///   Python package by T. Verstraelen.
pub fn assert_deriv<F>(
    mut function: F,
    analytic_grad: ArrayView1<f64>,
    origin: ArrayView1<f64>,
    stepsize: f64,
    tol: f64,
) where
    F: FnMut(ArrayView1<f64>) -> f64,
{
    assert!(
        stepsize > 0.0,
        "The stepsize has to be > 0.0, but it is {}",
        stepsize
    );
    assert_eq!(analytic_grad.len(), origin.len());

    let mut errors: Vec<bool> = Vec::with_capacity(origin.len());
    let mut error_values: Array1<f64> = Array1::zeros([origin.len()]);
    let mut string = format!(
        "{: <5} {: >18} {: >18} {: >18} {: >18} {: <8} \n",
        "Index", "Analytic", "Numerical", "Error", "Acc. Num.", "Correct?"
    );
    for i in 0..origin.len() {
        let analytic_deriv: f64 = analytic_grad[i];
        let (numerical_deriv, deriv_error): (f64, f64) =
            ridders_method(&mut function, origin, i, stepsize);
        let diff: f64 = (numerical_deriv - analytic_deriv).abs();
        let correct: bool = diff <= tol;
        errors.push(correct);
        error_values[i] = diff;
        string += &format!(
            "{: >5} {:>18.10e} {:>18.10e} {:>18.10e} {:>18.10e} {: >5} \n",
            i, analytic_deriv, numerical_deriv, diff, deriv_error, correct
        );
    }
    println!("{}", string);
    let rmsd: f64 = (&error_values * &error_values).mean().unwrap_or(0.0).sqrt();
    let max: f64 = error_values.max().map(|x| *x).unwrap_or(0.0);
    println!("{: <30} {:>18.4e}", "RMSD of Gradient", rmsd);
    println!("{: <30} {:18.4e}", "Max deviation of Gradient", max);

    assert!(!errors.contains(&false), "Gradient test failed")
}

/// Central difference (f(x + h e_i) - f(x - h e_i)) / 2h.
pub fn central_difference<F>(
    function: &mut F,
    origin: ArrayView1<f64>,
    index: usize,
    stepsize: f64,
) -> f64
where
    F: FnMut(ArrayView1<f64>) -> f64,
{
    let mut step: Array1<f64> = Array1::zeros([origin.len()]);
    step[index] = stepsize;
    let forward: Array1<f64> = &origin + &step;
    let backward: Array1<f64> = &origin - &step;
    (function(forward.view()) - function(backward.view())) / (2.0 * stepsize)
}

/// Derivative of `function` along the coordinate `index` and an estimate of its error with
/// Ridders' extrapolation of central differences to zero step size.
pub fn ridders_method<F>(
    function: &mut F,
    origin: ArrayView1<f64>,
    index: usize,
    stepsize: f64,
) -> (f64, f64)
where
    F: FnMut(ArrayView1<f64>) -> f64,
{
    // rate at which the step size is contracted
    let con: f64 = 1.4;
    let con2: f64 = con.powi(2);
    // terminate if the higher order is worse by this factor
    let safe: f64 = 2.0;
    let maxiter: usize = 10;

    let mut stepsize: f64 = stepsize;
    let mut error: f64 = f64::INFINITY;
    let mut table: Vec<Vec<f64>> = vec![vec![central_difference(
        function, origin, index, stepsize,
    )]];
    let mut estimate: f64 = table[0][0];

    // Successive columns in the Neville tableau go to smaller step sizes and higher orders
    // of extrapolation.
    for i in 1..maxiter {
        stepsize /= con;
        table.push(vec![central_difference(function, origin, index, stepsize)]);
        let mut fac: f64 = con2;
        for j in 1..(i + 1) {
            let tmp: f64 = (table[i][j - 1] * fac - table[i - 1][j - 1]) / (fac - 1.0);
            table[i].push(tmp);
            fac *= con2;
            // compare each new extrapolation to one order lower, both at the present step
            // size and the previous one
            let current_error: f64 = (table[i][j] - table[i][j - 1])
                .abs()
                .max((table[i][j] - table[i - 1][j - 1]).abs());
            if current_error <= error {
                error = current_error;
                estimate = table[i][j];
            }
        }
        if (table[i][i] - table[i - 1][i - 1]).abs() >= safe * error {
            break;
        }
    }
    (estimate, error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn ridders_method_differentiates_smooth_functions() {
        let origin: Array1<f64> = array![0.3, -1.2];
        let mut function = |x: ArrayView1<f64>| x[0].sin() * (0.5 * x[1]).exp();
        let (d0, _) = ridders_method(&mut function, origin.view(), 0, 0.1);
        let (d1, _) = ridders_method(&mut function, origin.view(), 1, 0.1);
        assert_abs_diff_eq!(d0, 0.3_f64.cos() * (-0.6_f64).exp(), epsilon = 1e-10);
        assert_abs_diff_eq!(d1, 0.5 * 0.3_f64.sin() * (-0.6_f64).exp(), epsilon = 1e-10);
    }
}
