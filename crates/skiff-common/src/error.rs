//! Common error types for the skiff runtime.

use miette::Diagnostic;
use thiserror::Error;

/// Result type alias using [`SkiffError`].
pub type SkiffResult<T> = Result<T, SkiffError>;

/// Common errors across the skiff crates.
#[derive(Error, Diagnostic, Debug)]
pub enum SkiffError {
    /// Container not found.
    #[error("Container not found: {name}")]
    #[diagnostic(code(skiff::container::not_found))]
    ContainerNotFound {
        /// The container name that was not found.
        name: String,
    },

    /// Network not found in the registry.
    #[error("Network not found: {name}")]
    #[diagnostic(
        code(skiff::network::not_found),
        help("Create it first with `skiff network create`")
    )]
    NetworkNotFound {
        /// The network name that was not found.
        name: String,
    },

    /// No driver registered under the given name.
    #[error("Unknown network driver: {name}")]
    #[diagnostic(code(skiff::network::unknown_driver))]
    UnknownDriver {
        /// The driver name.
        name: String,
    },

    /// Subnet has no free addresses left.
    #[error("No free address left in subnet {subnet}")]
    #[diagnostic(code(skiff::ipam::exhausted))]
    SubnetExhausted {
        /// The exhausted subnet.
        subnet: String,
    },

    /// Invalid container ID format.
    #[error("Invalid container ID: {id}")]
    #[diagnostic(
        code(skiff::container::invalid_id),
        help("Container IDs must be alphanumeric with hyphens and underscores, 1-64 characters")
    )]
    InvalidContainerId {
        /// The invalid container ID.
        id: String,
    },

    /// Invalid resource quantity format.
    #[error("Invalid resource quantity: {value}")]
    #[diagnostic(
        code(skiff::resource::invalid_quantity),
        help("Use formats like '100m', '1g', '512Mi', or a plain byte count")
    )]
    InvalidResourceQuantity {
        /// The invalid value.
        value: String,
    },

    /// Invalid subnet string.
    #[error("Invalid subnet: {value}")]
    #[diagnostic(code(skiff::network::invalid_subnet))]
    InvalidSubnet {
        /// The invalid CIDR string.
        value: String,
    },

    /// An external command (`ip`, `iptables`, ...) failed.
    #[error("{program} failed: {message}")]
    #[diagnostic(code(skiff::command))]
    Command {
        /// The program that was executed.
        program: String,
        /// Failure detail.
        message: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    #[diagnostic(code(skiff::io))]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    #[diagnostic(code(skiff::serialization))]
    Serialization(String),

    /// Permission denied.
    #[error("Permission denied: {operation}")]
    #[diagnostic(
        code(skiff::permission_denied),
        help("Try running with elevated privileges (sudo)")
    )]
    PermissionDenied {
        /// The operation that was denied.
        operation: String,
    },

    /// Configuration error.
    #[error("Configuration error: {message}")]
    #[diagnostic(code(skiff::config))]
    Config {
        /// The error message.
        message: String,
    },

    /// Internal error (should not happen).
    #[error("Internal error: {message}")]
    #[diagnostic(code(skiff::internal))]
    Internal {
        /// The error message.
        message: String,
    },
}

impl From<serde_json::Error> for SkiffError {
    fn from(err: serde_json::Error) -> Self {
        SkiffError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = SkiffError::NetworkNotFound {
            name: "testnet".to_string(),
        };
        assert_eq!(err.to_string(), "Network not found: testnet");
    }

    #[test]
    fn error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: SkiffError = io_err.into();
        assert!(matches!(err, SkiffError::Io(_)));
    }
}
