//! Error types for convergence-club analysis

use thiserror::Error;

/// Convergence-club error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// The club collection is malformed or violates its invariants
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A caller-supplied parameter (time trim, method selector, threshold) is invalid
    #[error("Parameter error: {0}")]
    Parameter(String),

    /// Malformed arguments handed to a numerical routine
    #[error("Validation error: {0}")]
    Validation(String),

    /// Numerical failure (singular design, degenerate dispersion)
    #[error("Computation error: {0}")]
    Computation(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_carries_kind() {
        let e = Error::Parameter("time_trim must be in (0, 1]".into());
        assert_eq!(e.to_string(), "Parameter error: time_trim must be in (0, 1]");
        let e = Error::InvalidInput("unit 3 appears twice".into());
        assert!(e.to_string().starts_with("Invalid input"));
    }
}
