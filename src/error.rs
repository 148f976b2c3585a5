use std::fmt;

/// Failure reported by the dense linear-algebra kernel. The calling stage maps it onto the
/// physical failure kind ([MbdError]) together with the context it knows about.
#[derive(Debug, Clone, PartialEq)]
pub enum LinalgError {
    /// The matrix is (numerically) singular. The condition estimate is infinite if the
    /// factorization broke down completely.
    Singular { condition: f64 },
    /// The eigenvalue iteration did not converge.
    NoConvergence,
    /// Any other error reported by the backend.
    Backend(String),
}

impl fmt::Display for LinalgError {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        match self {
            LinalgError::Singular { condition } => {
                write!(f, "singular matrix (condition estimate {:e})", condition)
            }
            LinalgError::NoConvergence => write!(f, "eigenvalue iteration did not converge"),
            LinalgError::Backend(message) => write!(f, "linear algebra backend: {}", message),
        }
    }
}

impl std::error::Error for LinalgError {}

/// Error kinds of an MBD calculation. None of them is recovered from: they signal invalid
/// physical input or a numerical breakdown and carry enough context to reproduce the failure.
#[derive(Debug, Clone)]
pub enum MbdError {
    /// Two atoms (or an atom and a periodic image) are closer than the minimum separation.
    DegenerateGeometry {
        atoms: (usize, usize),
        distance: f64,
        limit: f64,
    },
    /// The linear system of the self-consistent screening is singular or ill-conditioned.
    /// `frequency` is the index on the imaginary frequency grid (0 is the static limit).
    SingularScreening { frequency: usize, condition: f64 },
    /// The diagonalization of the coupled oscillator matrix did not converge.
    NonConvergentEigen { k_point: [f64; 3] },
    /// An eigenvalue of the coupled oscillator matrix is clearly negative, the system is
    /// beyond a polarization catastrophe.
    NegativeEigenvalue { k_point: [f64; 3], eigenvalue: f64 },
    /// A configuration value is out of its allowed range.
    InvalidConfiguration { option: String, reason: String },
    /// Inconsistent input arrays or an invalid lattice.
    InvalidInput(String),
    /// Error raised inside a worker of the parallel reduction.
    Worker { rank: usize, source: Box<MbdError> },
}

impl MbdError {
    pub fn invalid_config(option: &str, reason: String) -> Self {
        MbdError::InvalidConfiguration {
            option: String::from(option),
            reason,
        }
    }

    /// Attach the rank of the worker in which the error occurred. Errors that already carry
    /// a rank are not wrapped twice.
    pub fn in_worker(self, rank: usize) -> Self {
        match self {
            MbdError::Worker { .. } => self,
            other => MbdError::Worker {
                rank,
                source: Box::new(other),
            },
        }
    }

    /// The error without the worker context.
    pub fn root(&self) -> &MbdError {
        match self {
            MbdError::Worker { source, .. } => source.root(),
            other => other,
        }
    }
}

impl fmt::Display for MbdError {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        match self {
            MbdError::DegenerateGeometry {
                atoms,
                distance,
                limit,
            } => write!(
                f,
                "Degenerate geometry: the atoms {} and {} are {:.6} bohr apart, \
                 the minimum separation is {:.6} bohr",
                atoms.0 + 1,
                atoms.1 + 1,
                distance,
                limit
            ),
            MbdError::SingularScreening {
                frequency,
                condition,
            } => write!(
                f,
                "Self-consistent screening failed at frequency point {}: \
                 the screening matrix is singular (condition estimate {:e})",
                frequency, condition
            ),
            MbdError::NonConvergentEigen { k_point } => write!(
                f,
                "Diagonalization of the coupled oscillator matrix did not converge at k = {:?}",
                k_point
            ),
            MbdError::NegativeEigenvalue {
                k_point,
                eigenvalue,
            } => write!(
                f,
                "Negative eigenvalue {:e} of the coupled oscillator matrix at k = {:?}",
                eigenvalue, k_point
            ),
            MbdError::InvalidConfiguration { option, reason } => {
                write!(f, "Invalid configuration for '{}': {}", option, reason)
            }
            MbdError::InvalidInput(message) => write!(f, "Invalid input: {}", message),
            MbdError::Worker { rank, source } => write!(f, "Worker {}: {}", rank, source),
        }
    }
}

impl std::error::Error for MbdError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MbdError::Worker { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}
