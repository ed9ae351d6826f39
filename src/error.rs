//! Error types for laser streaming.
//!
//! Malformed ILDA sections and IWP commands are never errors: the decoders
//! truncate and return what they parsed. The variants here cover the places
//! where the outside world can fail us: files, sockets, configuration and
//! background tasks.
//!
//! ## Error Categories
//!
//! - **File Errors**: reading an ILDA file or a configuration file
//! - **Socket Errors**: binding, sending or receiving UDP datagrams
//! - **Configuration Errors**: YAML that does not match the config schema
//! - **Lifecycle Errors**: sending while disconnected, cancelled pacing loops
//!
//! ## Recovery and Retry
//!
//! Nothing in the crate retries on its own. Callers decide, guided by
//! [`LaserError::is_retryable`]:
//!
//! ```rust
//! use lasercast::LaserError;
//!
//! let error = LaserError::socket("send", std::io::Error::other("network unreachable"));
//! if error.is_retryable() {
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for lasercast operations.
pub type Result<T, E = LaserError> = std::result::Result<T, E>;

/// Main error type for lasercast operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum LaserError {
    #[error("File error: {path}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to bind UDP socket on {address}")]
    Bind {
        address: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("UDP {operation} failed")]
    Socket {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {details}")]
    Config { details: String },

    #[error("Invalid transmission target: {target}")]
    InvalidTarget { target: String },

    #[error("Transmitter is not connected")]
    NotConnected,

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Background task failed: {details}")]
    Task { details: String },
}

impl LaserError {
    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            LaserError::Socket { .. } => true,
            LaserError::NotConnected => true,
            LaserError::Bind { .. } => true,
            LaserError::File { .. } => false,
            LaserError::Config { .. } => false,
            LaserError::InvalidTarget { .. } => false,
            LaserError::Cancelled => false,
            LaserError::Task { .. } => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            LaserError::File { .. } => vec![
                "Check the file exists and is readable",
                "Verify the file is an ILDA file (sections start with \"ILDA\")",
                "Check file permissions",
            ],
            LaserError::Bind { .. } => vec![
                "Check no other process is listening on the port",
                "Use port 0 to let the OS pick a free port",
                "Verify the bind address belongs to a local interface",
            ],
            LaserError::Socket { .. } => vec![
                "Check the projector is reachable on the network",
                "Verify the target IP and port",
                "Reconnect the transmitter",
            ],
            LaserError::Config { .. } => vec![
                "Check the YAML field names against LasercastConfig",
                "Remove unknown keys or fix value types",
            ],
            LaserError::InvalidTarget { .. } => vec![
                "Use a numeric IPv4 or IPv6 address",
                "Use a port between 1 and 65535",
            ],
            LaserError::NotConnected => vec![
                "Call reconnect() before sending frames",
                "Inspect the last transmit error in the stats snapshot",
            ],
            LaserError::Cancelled => vec!["Start a new pacing loop if playback should continue"],
            LaserError::Task { .. } => vec![
                "Check the logs for a panic in the background task",
                "Restart the component",
            ],
        }
    }

    /// Helper constructor for file errors with path context.
    pub fn file_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LaserError::File { path: path.into(), source }
    }

    /// Helper constructor for socket errors.
    pub fn socket(operation: impl Into<String>, source: std::io::Error) -> Self {
        LaserError::Socket { operation: operation.into(), source }
    }

    /// Helper constructor for configuration errors.
    pub fn config(details: impl Into<String>) -> Self {
        LaserError::Config { details: details.into() }
    }

    /// Helper constructor for invalid target errors.
    pub fn invalid_target(target: impl Into<String>) -> Self {
        LaserError::InvalidTarget { target: target.into() }
    }
}

impl From<std::io::Error> for LaserError {
    fn from(err: std::io::Error) -> Self {
        LaserError::File { path: PathBuf::from("<unknown>"), source: err }
    }
}

impl From<serde_yaml_ng::Error> for LaserError {
    fn from(err: serde_yaml_ng::Error) -> Self {
        LaserError::Config { details: err.to_string() }
    }
}

impl From<tokio::task::JoinError> for LaserError {
    fn from(err: tokio::task::JoinError) -> Self {
        LaserError::Task { details: err.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn error_messages_carry_their_context(
                operation in "[a-z]{1,12}",
                details in ".*",
                port in 1u16..=u16::MAX,
            ) {
                let socket_err = LaserError::socket(operation.clone(), std::io::Error::other("boom"));
                prop_assert!(socket_err.to_string().contains(&operation));

                let config_err = LaserError::config(details.clone());
                prop_assert!(config_err.to_string().contains(&details));

                let address = SocketAddr::from(([127, 0, 0, 1], port));
                let bind_err = LaserError::Bind {
                    address,
                    source: std::io::Error::new(std::io::ErrorKind::AddrInUse, "in use"),
                };
                prop_assert!(bind_err.to_string().contains(&port.to_string()));
            }

            #[test]
            fn io_conversion_preserves_message(reason in ".*") {
                let converted: LaserError = std::io::Error::other(reason.clone()).into();
                match converted {
                    LaserError::File { source, .. } => prop_assert_eq!(source.to_string(), reason),
                    other => prop_assert!(false, "expected File variant, got {other:?}"),
                }
            }
        }
    }

    #[test]
    fn source_chain_is_exposed() {
        let err = LaserError::socket("send", std::io::Error::other("host unreachable"));
        let source = std::error::Error::source(&err).expect("socket errors carry a source");
        assert_eq!(source.to_string(), "host unreachable");
    }

    #[test]
    fn error_traits_validation() {
        fn assert_send_sync_static<T: Send + Sync + 'static>() {}
        assert_send_sync_static::<LaserError>();
    }

    #[test]
    fn retry_classification() {
        assert!(LaserError::NotConnected.is_retryable());
        assert!(LaserError::socket("send", std::io::Error::other("x")).is_retryable());
        assert!(!LaserError::Cancelled.is_retryable());
        assert!(!LaserError::config("bad").is_retryable());

        for err in [LaserError::NotConnected, LaserError::Cancelled, LaserError::config("bad")] {
            let suggestions = err.recovery_suggestions();
            assert!(!suggestions.is_empty());
            assert!(suggestions.iter().all(|s| s.len() > 5));
        }
    }

    #[test]
    fn yaml_errors_become_config_errors() {
        let yaml_err = serde_yaml_ng::from_str::<u32>("not: [a number").unwrap_err();
        let err: LaserError = yaml_err.into();
        assert!(matches!(err, LaserError::Config { .. }));
    }
}
