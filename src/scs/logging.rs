use crate::scs::ScreenedPolarizabilities;
use log::{debug, info};
use ndarray::ArrayView1;

pub fn print_screened_polarizabilities(scs: &ScreenedPolarizabilities, alpha_0: ArrayView1<f64>) {
    info!("{:^80}", "");
    info!("{: ^80}", "Self-consistent screening");
    info!("{:-^80}", "");
    info!(
        "{: <25} {:>12.4e}",
        "largest condition number:", scs.max_condition
    );
    debug!("{:^80}", "");
    debug!(
        "{: >6} {:>14} {:>14} {:>14} {:>14}",
        "Atom", "alpha_0", "alpha_scs", "omega_scs", "C6_scs"
    );
    debug!("{:-^66}", "");
    for (idx, a0) in alpha_0.iter().enumerate() {
        debug!(
            "{: >6} {:>14.8} {:>14.8} {:>14.8} {:>14.6}",
            idx + 1,
            a0,
            scs.alpha[idx],
            scs.omega[idx],
            scs.c6[idx]
        );
    }
    debug!("{:-^66}", "");
}
