use crate::energy::MbdResult;
use anyhow::{Context, Result};
use log::info;
use std::fs;
use std::path::Path;

/// Writes the result as JSON. Arrays are stored in the ndarray serde format
/// (`{"v": 1, "dim": [..], "data": [..]}`).
pub fn write_result(result: &MbdResult, path: &Path) -> Result<()> {
    let json: String = serde_json::to_string_pretty(result).context("Unable to serialize result")?;
    fs::write(path, json)
        .with_context(|| format!("Unable to write result file {}", path.display()))?;
    info!("results were written to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::tests::get_dimer;
    use serde_json::Value;

    #[test]
    fn result_is_valid_json() {
        let result: MbdResult = get_dimer(6.0).calculate(true).unwrap();
        let json: String = serde_json::to_string(&result).unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["method"], "mbd-rsscs");
        assert_eq!(value["gradient"]["dim"][0], 2);
        assert!(value["stress"].is_null());
        assert_eq!(value["diagnostics"]["n_k_points"], 1);
        assert_eq!(value["diagnostics"]["clamped_eigenvalues"], 0);
    }
}
