//! Errors raised while setting up or running the solver.

use std::path::PathBuf;

/// Possible solver errors.
#[derive(Debug)]
pub enum SnicarError {
    /// The inputs don't have the expected shape(s)
    InconsistentInputs(String),
    /// A layer has a non-positive thickness, density, or grain radius
    InvalidLayer {
        /// Zero-based layer index, counted from the top of the column
        layer: usize,
        /// Which quantity was rejected
        reason: &'static str,
    },
    /// A grain shape tag outside 1 to 4
    InvalidGrainShape(i64),
    /// Impurity and algae burdens use up the layer mass, leaving no ice
    InvalidImpurityLoad {
        /// Zero-based layer index, counted from the top of the column
        layer: usize,
        /// Mass fraction of the layer taken by impurities and algae
        fraction: f64,
    },
    /// No optical property table for this key
    MissingOpticalProperty(String),
    /// A table does not line up with the wavelength grid
    GridMismatch(PathBuf),
    /// A table has a malformed line
    Parse {
        /// File being read
        path: PathBuf,
        /// One-based line number
        line: usize,
    },
    /// A configuration value is out of range
    InvalidConfig(String),
    /// Underlying I/O failure
    Io(std::io::Error),
    /// Configuration is not valid JSON for [`RunConfig`](crate::RunConfig)
    Json(serde_json::Error),
    /// The operation was aborted early
    Cancelled,
}

impl std::fmt::Display for SnicarError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SnicarError::InconsistentInputs(what) => {
                write!(f, "inputs to the solver have the wrong shape: {what}")
            }
            SnicarError::InvalidLayer { layer, reason } => {
                write!(f, "layer {layer} is invalid: {reason}")
            }
            SnicarError::InvalidGrainShape(tag) => {
                write!(f, "unknown grain shape tag {tag} (expected 1 to 4)")
            }
            SnicarError::InvalidImpurityLoad { layer, fraction } => write!(
                f,
                "impurities make up {fraction:.3} of the mass of layer {layer}, leaving no ice"
            ),
            SnicarError::MissingOpticalProperty(key) => {
                write!(f, "no optical property file for {key}")
            }
            SnicarError::GridMismatch(path) => write!(
                f,
                "{} does not match the wavelength grid",
                path.display()
            ),
            SnicarError::Parse { path, line } => {
                write!(f, "couldn't parse line {line} of {}", path.display())
            }
            SnicarError::InvalidConfig(what) => write!(f, "invalid configuration: {what}"),
            SnicarError::Io(e) => write!(f, "I/O error: {e}"),
            SnicarError::Json(e) => write!(f, "failed to parse JSON: {e}"),
            SnicarError::Cancelled => write!(f, "operation cancelled early"),
        }
    }
}

impl std::error::Error for SnicarError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SnicarError::Io(e) => Some(e),
            SnicarError::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for SnicarError {
    fn from(err: std::io::Error) -> SnicarError {
        SnicarError::Io(err)
    }
}

impl From<serde_json::Error> for SnicarError {
    fn from(err: serde_json::Error) -> SnicarError {
        SnicarError::Json(err)
    }
}
