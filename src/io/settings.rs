use crate::defaults::*;
use crate::error::MbdError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

fn default_jobtype() -> String {
    String::from(JOBTYPE)
}
fn default_verbose() -> i8 {
    0
}
fn default_method() -> Method {
    Method::MbdRsScs
}
fn default_damping_model() -> DampingModel {
    DampingModel::Fermi
}
fn default_beta() -> f64 {
    RANGE_SEPARATION_BETA
}
fn default_steepness() -> f64 {
    DAMPING_STEEPNESS
}
fn default_min_separation() -> f64 {
    MIN_SEPARATION
}
fn default_n_frequencies() -> usize {
    N_FREQUENCIES
}
fn default_frequency_grid_scale() -> f64 {
    FREQUENCY_GRID_SCALE
}
fn default_condition_limit() -> f64 {
    SCREENING_CONDITION_LIMIT
}
fn default_eigenvalue_clamp() -> f64 {
    EIGENVALUE_CLAMP
}
fn default_negative_eigenvalue_limit() -> f64 {
    NEGATIVE_EIGENVALUE_LIMIT
}
fn default_save_modes() -> bool {
    false
}
fn default_k_grid() -> [usize; 3] {
    K_GRID
}
fn default_k_grid_shift() -> f64 {
    K_GRID_SHIFT
}
fn default_real_space_cutoff() -> f64 {
    REAL_SPACE_CUTOFF
}
fn default_gradient_policy() -> GradientPolicy {
    GradientPolicy::Full
}
fn default_number_of_workers() -> usize {
    NUMBER_OF_WORKERS
}
fn default_number_of_cores() -> usize {
    NUMBER_OF_CORES
}

/// Energy expression that is evaluated.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Method {
    /// Pairwise Tkatchenko-Scheffler energy.
    Ts,
    /// Coupled oscillators built from the bare polarizabilities and frequencies.
    Mbd,
    /// Random-phase approximation of the dipole-coupled oscillators, integrated over the
    /// imaginary frequency axis.
    Rpa,
    /// Full-range self-consistent screening followed by the coupled oscillator energy.
    MbdScs,
    /// Range-separated self-consistent screening followed by the coupled oscillator energy.
    #[serde(rename = "mbd-rsscs")]
    MbdRsScs,
}

/// Short-range damping of the dipole tensor.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum DampingModel {
    Bare,
    Fermi,
    Gaussian,
    FermiGaussian,
}

/// Treatment of the geometry dependence of the screened polarizabilities in the gradient.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum GradientPolicy {
    /// Chain rule through the screening equation, exact gradient of the energy.
    Full,
    /// Screened polarizabilities are taken as geometry independent.
    Decoupled,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Configuration {
    #[serde(default = "default_jobtype")]
    pub jobtype: String,
    #[serde(default = "default_verbose")]
    pub verbose: i8,
    #[serde(default = "default_method")]
    pub method: Method,
    #[serde(default)]
    pub damping: DampingConfig,
    #[serde(default)]
    pub scs: ScsConfig,
    #[serde(default)]
    pub eigen: EigenConfig,
    #[serde(default)]
    pub periodic: PeriodicConfig,
    #[serde(default)]
    pub gradients: GradientConfig,
    #[serde(default)]
    pub parallelization: ParallelizationConfig,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            jobtype: default_jobtype(),
            verbose: default_verbose(),
            method: default_method(),
            damping: DampingConfig::default(),
            scs: ScsConfig::default(),
            eigen: EigenConfig::default(),
            periodic: PeriodicConfig::default(),
            gradients: GradientConfig::default(),
            parallelization: ParallelizationConfig::default(),
        }
    }
}

impl Configuration {
    /// Reads the configuration file from the working directory. If it does not exist the
    /// default settings are used and written to the directory, so that the user can see
    /// all the used options.
    pub fn new() -> Result<Self> {
        Self::from_path(Path::new(CONFIG_FILE_NAME))
    }

    pub fn from_path(config_file_path: &Path) -> Result<Self> {
        let config_string: String = if config_file_path.exists() {
            fs::read_to_string(config_file_path).with_context(|| {
                format!("Unable to read config file {}", config_file_path.display())
            })?
        } else {
            String::new()
        };
        let config: Self = toml::from_str(&config_string).context("Malformed config file")?;
        if !config_file_path.exists() {
            let config_string: String = toml::to_string(&config)?;
            fs::write(config_file_path, config_string).with_context(|| {
                format!("Unable to write config file {}", config_file_path.display())
            })?;
        }
        Ok(config)
    }

    /// Checks that every recognized option lies in its allowed range.
    pub fn validate(&self) -> Result<(), MbdError> {
        if self.jobtype != "energy" && self.jobtype != "gradient" {
            return Err(MbdError::invalid_config(
                "jobtype",
                format!("'{}' is neither 'energy' nor 'gradient'", self.jobtype),
            ));
        }
        positive("damping.beta", self.damping.beta)?;
        positive("damping.a", self.damping.a)?;
        positive("damping.min_separation", self.damping.min_separation)?;
        if self.scs.n_frequencies == 0 {
            return Err(MbdError::invalid_config(
                "scs.n_frequencies",
                String::from("at least one frequency point is required"),
            ));
        }
        positive("scs.frequency_grid_scale", self.scs.frequency_grid_scale)?;
        if !(self.scs.condition_limit > 1.0) {
            return Err(MbdError::invalid_config(
                "scs.condition_limit",
                format!("{} must be larger than one", self.scs.condition_limit),
            ));
        }
        if !(self.eigen.clamp >= 0.0) || !self.eigen.clamp.is_finite() {
            return Err(MbdError::invalid_config(
                "eigen.clamp",
                format!("{} must be a finite non-negative number", self.eigen.clamp),
            ));
        }
        if !(self.eigen.negative_eigenvalue_limit >= self.eigen.clamp) {
            return Err(MbdError::invalid_config(
                "eigen.negative_eigenvalue_limit",
                format!(
                    "{} must not be smaller than the clamp threshold {}",
                    self.eigen.negative_eigenvalue_limit, self.eigen.clamp
                ),
            ));
        }
        if self.periodic.k_grid.iter().any(|n| *n == 0) {
            return Err(MbdError::invalid_config(
                "periodic.k_grid",
                format!("{:?} contains a zero", self.periodic.k_grid),
            ));
        }
        if !(self.periodic.k_grid_shift >= 0.0 && self.periodic.k_grid_shift < 1.0) {
            return Err(MbdError::invalid_config(
                "periodic.k_grid_shift",
                format!("{} is not in [0, 1)", self.periodic.k_grid_shift),
            ));
        }
        positive("periodic.real_space_cutoff", self.periodic.real_space_cutoff)?;
        if self.parallelization.number_of_workers == 0 {
            return Err(MbdError::invalid_config(
                "parallelization.number_of_workers",
                String::from("at least one worker is required"),
            ));
        }
        Ok(())
    }

    pub fn gradients_requested(&self) -> bool {
        self.jobtype == "gradient"
    }
}

fn positive(option: &str, value: f64) -> Result<(), MbdError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(MbdError::invalid_config(
            option,
            format!("{} must be a positive finite number", value),
        ))
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug)]
pub struct DampingConfig {
    #[serde(default = "default_damping_model")]
    pub model: DampingModel,
    #[serde(default = "default_beta")]
    pub beta: f64,
    #[serde(default = "default_steepness")]
    pub a: f64,
    #[serde(default = "default_min_separation")]
    pub min_separation: f64,
}

impl Default for DampingConfig {
    fn default() -> Self {
        Self {
            model: default_damping_model(),
            beta: default_beta(),
            a: default_steepness(),
            min_separation: default_min_separation(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug)]
pub struct ScsConfig {
    #[serde(default = "default_n_frequencies")]
    pub n_frequencies: usize,
    #[serde(default = "default_frequency_grid_scale")]
    pub frequency_grid_scale: f64,
    #[serde(default = "default_condition_limit")]
    pub condition_limit: f64,
}

impl Default for ScsConfig {
    fn default() -> Self {
        Self {
            n_frequencies: default_n_frequencies(),
            frequency_grid_scale: default_frequency_grid_scale(),
            condition_limit: default_condition_limit(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug)]
pub struct EigenConfig {
    #[serde(default = "default_eigenvalue_clamp")]
    pub clamp: f64,
    #[serde(default = "default_negative_eigenvalue_limit")]
    pub negative_eigenvalue_limit: f64,
    #[serde(default = "default_save_modes")]
    pub save_modes: bool,
}

impl Default for EigenConfig {
    fn default() -> Self {
        Self {
            clamp: default_eigenvalue_clamp(),
            negative_eigenvalue_limit: default_negative_eigenvalue_limit(),
            save_modes: default_save_modes(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug)]
pub struct PeriodicConfig {
    #[serde(default = "default_k_grid")]
    pub k_grid: [usize; 3],
    #[serde(default = "default_k_grid_shift")]
    pub k_grid_shift: f64,
    #[serde(default = "default_real_space_cutoff")]
    pub real_space_cutoff: f64,
}

impl Default for PeriodicConfig {
    fn default() -> Self {
        Self {
            k_grid: default_k_grid(),
            k_grid_shift: default_k_grid_shift(),
            real_space_cutoff: default_real_space_cutoff(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug)]
pub struct GradientConfig {
    #[serde(default = "default_gradient_policy")]
    pub policy: GradientPolicy,
}

impl Default for GradientConfig {
    fn default() -> Self {
        Self {
            policy: default_gradient_policy(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug)]
pub struct ParallelizationConfig {
    /// Number of partitions of the work units. Together with the fixed reduction order this
    /// determines the floating-point summation order of the results.
    #[serde(default = "default_number_of_workers")]
    pub number_of_workers: usize,
    /// Size of the global thread pool that executes the workers.
    #[serde(default = "default_number_of_cores")]
    pub number_of_cores: usize,
}

impl Default for ParallelizationConfig {
    fn default() -> Self {
        Self {
            number_of_workers: default_number_of_workers(),
            number_of_cores: default_number_of_cores(),
        }
    }
}
