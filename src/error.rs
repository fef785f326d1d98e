//! Error taxonomy shared across the crate.
//!
//! Every fallible operation returns [`FleetError`]. The variants mirror how
//! failures are reported to tool callers: per-host variants end up inside a
//! dispatch result keyed by host name, while `BlockedCommand` and
//! `Configuration` abort an operation before any device is touched.

use thiserror::Error;

/// Crate-wide error type.
#[derive(Error, Debug)]
pub enum FleetError {
    /// Unknown host or group selector.
    #[error("not found: {0}")]
    NotFound(String),

    /// Capability not implemented by a platform's driver.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// Session or connectivity failure talking to a device.
    #[error("transport error: {0}")]
    Transport(String),

    /// Per-host deadline exceeded.
    #[error("timeout: {0}")]
    Timeout(String),

    /// Command rejected by the safety filter.
    #[error("command blocked: {0}")]
    BlockedCommand(String),

    /// Malformed blacklist rule or inventory record, raised at load time.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl FleetError {
    /// Stable wire-format name for this error kind, used in failure outcomes
    /// returned to tool callers.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NotFoundError",
            Self::Unsupported(_) => "UnsupportedOperationError",
            Self::Transport(_) => "TransportError",
            Self::Timeout(_) => "TimeoutError",
            Self::BlockedCommand(_) => "BlockedCommandError",
            Self::Configuration(_) => "ConfigurationError",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_strings_are_stable() {
        assert_eq!(FleetError::NotFound("x".into()).kind(), "NotFoundError");
        assert_eq!(
            FleetError::Unsupported("x".into()).kind(),
            "UnsupportedOperationError"
        );
        assert_eq!(FleetError::Transport("x".into()).kind(), "TransportError");
        assert_eq!(FleetError::Timeout("x".into()).kind(), "TimeoutError");
        assert_eq!(
            FleetError::BlockedCommand("x".into()).kind(),
            "BlockedCommandError"
        );
        assert_eq!(
            FleetError::Configuration("x".into()).kind(),
            "ConfigurationError"
        );
    }
}
