//! Error types for chala-slam.

use thiserror::Error;

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the rolling-window mapper and its collaborators.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (config file, snapshot export, thread spawn).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or unreadable configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// No pose could be resolved for the requested timestamp.
    #[error("Pose unavailable at t={timestamp_us}us")]
    PoseUnavailable { timestamp_us: u64 },

    /// A scan whose angular layout is inconsistent.
    #[error("Invalid scan: {0}")]
    InvalidScan(String),

    /// Grid storage could not be allocated.
    #[error("Failed to allocate grid of {cells} cells")]
    Allocation { cells: usize },

    /// The particle set is empty where a map is required.
    #[error("Particle set is empty")]
    EmptyParticleSet,

    /// The best particle has no usable measurement history.
    #[error("Measurement history is empty")]
    EmptyHistory,

    /// No map snapshot has been produced yet.
    #[error("Map not ready")]
    MapNotReady,

    /// An internal consistency check failed.
    #[error("Invariant violated: {0}")]
    InvariantViolation(String),
}

impl Error {
    /// Whether the scan path must halt instead of skipping the scan.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::EmptyParticleSet | Error::EmptyHistory | Error::InvariantViolation(_)
        )
    }
}

impl From<basic_toml::Error> for Error {
    fn from(e: basic_toml::Error) -> Self {
        Error::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(Error::EmptyParticleSet.is_fatal());
        assert!(Error::InvariantViolation("bounds".into()).is_fatal());
        assert!(!Error::PoseUnavailable { timestamp_us: 5 }.is_fatal());
        assert!(!Error::Allocation { cells: 10 }.is_fatal());
    }

    #[test]
    fn test_display() {
        let e = Error::PoseUnavailable { timestamp_us: 42 };
        assert_eq!(e.to_string(), "Pose unavailable at t=42us");
    }
}
