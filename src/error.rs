//! Error handling module for the snapshot automation
//!
//! Provides the crate error type using thiserror. Only conditions that end a
//! run surface as `SnapshotError`; failures of a single create/tag/delete call
//! are recorded as `ResourceFailure` entries in the phase reports instead.

use thiserror::Error;

use crate::ec2::ApiError;

/// Main error type for a snapshot automation run
#[derive(Error, Debug)]
pub enum SnapshotError {
    /// Configuration errors (selector format, credential flags, log level)
    #[error("Configuration error: {0}")]
    Config(String),

    /// The EC2 client or its runtime could not be constructed
    #[error("Connecting to the EC2 API failed: {0}")]
    Connect(String),

    /// A listing call the run depends on failed
    #[error("Failed to get {what}: {source}")]
    Discovery {
        what: String,
        #[source]
        source: ApiError,
    },
}

/// Result type alias for snapshot automation operations
pub type Result<T> = std::result::Result<T, SnapshotError>;

impl SnapshotError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a connection error
    pub fn connect(msg: impl Into<String>) -> Self {
        Self::Connect(msg.into())
    }

    /// Create a discovery error for a failed listing call
    pub fn discovery(what: impl Into<String>, source: ApiError) -> Self {
        Self::Discovery {
            what: what.into(),
            source,
        }
    }

    /// True when the error was raised before any API call was attempted.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ec2::ApiOperation;

    #[test]
    fn test_error_display() {
        let err = SnapshotError::config("tag must be key:value");
        assert_eq!(err.to_string(), "Configuration error: tag must be key:value");

        let err = SnapshotError::connect("no region");
        assert_eq!(err.to_string(), "Connecting to the EC2 API failed: no region");
    }

    #[test]
    fn test_discovery_keeps_source() {
        let api = ApiError::new(ApiOperation::DescribeSnapshots, "throttled");
        let err = SnapshotError::discovery("previously created snapshots", api);
        assert!(err.to_string().contains("previously created snapshots"));
        assert!(err.to_string().contains("throttled"));
        assert!(std::error::Error::source(&err).is_some());
        assert!(!err.is_config());
    }
}
