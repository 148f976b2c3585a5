use crate::constants::{HARTREE_TO_EV, HARTREE_TO_KCAL_MOL};
use crate::energy::MbdResult;
use log::{debug, info};
use ndarray::ArrayView2;

pub fn print_energy(result: &MbdResult) {
    info!("{:^80}", "");
    info!("{: ^80}", "Dispersion energy");
    info!("{:-^80}", "");
    info!("{: <25} {:?}", "method:", result.method);
    info!("{: <25} {}", "linear algebra backend:", result.diagnostics.kernel);
    info!("{: <25} {}", "number of workers:", result.diagnostics.n_workers);
    info!("{: <25} {}", "number of k-points:", result.diagnostics.n_k_points);
    if let Some(lowest) = result.diagnostics.lowest_eigenvalue {
        info!("{: <25} {:>18.10e}", "lowest eigenvalue:", lowest);
        info!(
            "{: <25} {}",
            "clamped eigenvalues:", result.diagnostics.clamped_eigenvalues
        );
    }
    info!("{:^80}", "");
    info!("{: <25} {:>18.14} Hartree", "energy:", result.energy);
    info!(
        "{: <25} {:>18.10} eV",
        "",
        result.energy * HARTREE_TO_EV
    );
    info!(
        "{: <25} {:>18.10} kcal/mol",
        "",
        result.energy * HARTREE_TO_KCAL_MOL
    );
    if let Some(stress) = result.stress.as_ref() {
        info!("{:^80}", "");
        info!("{: <35} ", "stress tensor in Hartree/bohr^3");
        for row in stress.rows() {
            info!("{:>18.10e} {:>18.10e} {:>18.10e}", row[0], row[1], row[2]);
        }
    }
    info!("{:-^80}", "");
}

pub fn print_gradient(gradient: ArrayView2<f64>) {
    debug!("");
    debug!("{: <35} ", "gradient in Hartree/bohr");
    debug!("{:-^62}", "");
    debug!("{: >5} {: >18} {: >18} {: >18}", "Atom", "x", "y", "z");
    for (idx, row) in gradient.rows().into_iter().enumerate() {
        debug!(
            "{: >5} {:>18.10e} {:>18.10e} {:>18.10e}",
            idx + 1,
            row[0],
            row[1],
            row[2]
        );
    }
    debug!("{:-^62}", "");
}
