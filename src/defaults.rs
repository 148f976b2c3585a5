// CALCULATION
// jobtype, either "energy" or "gradient"
pub const JOBTYPE: &str = "gradient";
// config file
pub const CONFIG_FILE_NAME: &str = "mbd.toml";
pub const RESULT_FILE_NAME: &str = "mbd_result.json";

// DAMPING
// range-separation parameter of MBD@rsSCS for the PBE functional
// Ref: J. Chem. Phys. 140, 18A508 (2014)
pub const RANGE_SEPARATION_BETA: f64 = 0.83;
// steepness of the Fermi-type damping function
pub const DAMPING_STEEPNESS: f64 = 6.0;
// two atoms (or periodic images) closer than this distance in bohr
// are rejected as a degenerate geometry
pub const MIN_SEPARATION: f64 = 0.2;

// SCREENING
// number of points of the imaginary frequency grid used for the
// Casimir-Polder integration of the screened C6 coefficients
pub const N_FREQUENCIES: usize = 15;
// the mapping of the Gauss-Legendre grid onto [0, inf) is u = L (1 + x) / (1 - x)
pub const FREQUENCY_GRID_SCALE: f64 = 0.6;
// largest accepted condition estimate of the screening matrix
pub const SCREENING_CONDITION_LIMIT: f64 = 1.0e12;

// EIGENVALUES OF THE COUPLED OSCILLATOR MATRIX
// eigenvalues below this value are clamped to zero before the square root
pub const EIGENVALUE_CLAMP: f64 = 1.0e-10;
// eigenvalues below minus this value indicate a polarization catastrophe
pub const NEGATIVE_EIGENVALUE_LIMIT: f64 = 1.0e-4;

// PERIODIC SYSTEMS
pub const K_GRID: [usize; 3] = [1, 1, 1];
pub const K_GRID_SHIFT: f64 = 0.0;
// real-space cutoff in bohr for the lattice sums of the dipole tensor
pub const REAL_SPACE_CUTOFF: f64 = 40.0;

// PARALLELIZATION
pub const NUMBER_OF_WORKERS: usize = 1;
pub const NUMBER_OF_CORES: usize = 1;
