//! Error types for certificate monitoring.
//!
//! Every failure is scoped to the smallest unit it affects: a [`CheckError`]
//! belongs to one site, a [`NotifyError`] to one notification, and a
//! [`RegistryError`] to the registry file as a whole. Only registry errors
//! raised while loading abort a run.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Error raised while retrieving a site's certificate.
///
/// Recorded as an `ERROR` status for the site; the run moves on to the next one.
#[derive(Debug, Error)]
pub enum CheckError {
    /// DNS resolution failed for the given hostname
    #[error("Failed to resolve hostname: {hostname}")]
    DnsResolution {
        /// The hostname that failed to resolve
        hostname: String,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// TCP connection failed to the target address
    #[error("Connection failed to: {address}")]
    ConnectionFailed {
        /// The address (host:port) that connection failed to
        address: String,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// TLS handshake failed
    #[error("TLS handshake failed: {details}")]
    HandshakeFailed {
        /// Details about why the handshake failed
        details: String,
    },

    /// The peer sent no certificate or its validity bounds are unusable
    #[error("Certificate error: {reason}")]
    CertificateError {
        /// Description of what went wrong
        reason: String,
    },

    /// Network operation timeout
    #[error("Operation timed out: {operation}")]
    Timeout {
        /// Description of which operation timed out
        operation: String,
    },

    /// Invalid input provided to the inspector
    #[error("Invalid input for '{field}': {reason}")]
    InvalidInput {
        /// Which field/parameter was invalid
        field: String,
        /// Why it was invalid
        reason: String,
    },

    /// OpenSSL error occurred
    #[error("OpenSSL error: {details}")]
    OpenSSLError {
        /// The underlying OpenSSL error
        details: String,
    },
}

impl From<openssl::error::ErrorStack> for CheckError {
    fn from(e: openssl::error::ErrorStack) -> Self {
        Self::OpenSSLError {
            details: e.to_string(),
        }
    }
}

impl<S: std::fmt::Debug> From<openssl::ssl::HandshakeError<S>> for CheckError {
    fn from(e: openssl::ssl::HandshakeError<S>) -> Self {
        Self::HandshakeFailed {
            details: format!("{}", e),
        }
    }
}

/// Error raised by the site registry.
///
/// Load failures are fatal for the run. Persist failures are reported as an
/// `ERROR` entry but never undo results that were already evaluated.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The registry file could not be read
    #[error("Cannot read registry '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The registry file is not valid JSON
    #[error("Invalid JSON in '{}': {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The JSON root is something other than a list of site objects
    #[error("JSON root of '{}' should be a list of site objects", .path.display())]
    NotAList { path: PathBuf },

    /// The in-memory registry could not be serialized
    #[error("Cannot serialize registry: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Writing the new registry or its backup failed
    #[error("Failed to update '{}': {source}", .path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Error raised while dispatching an alert or reminder email.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// Sender or recipient is not a valid mailbox
    #[error("Invalid email address '{address}': {source}")]
    Address {
        address: String,
        #[source]
        source: lettre::address::AddressError,
    },

    /// The message could not be assembled
    #[error("Failed to build email: {0}")]
    Build(#[from] lettre::error::Error),

    /// A content type header could not be parsed
    #[error("Invalid content type '{0}'")]
    ContentType(String),

    /// The SMTP transport rejected or failed to deliver the message
    #[error("Failed to send email: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CheckError::InvalidInput {
            field: "hostname".to_string(),
            reason: "cannot be empty".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid input for 'hostname': cannot be empty"
        );
    }

    #[test]
    fn test_registry_error_display() {
        let err = RegistryError::NotAList {
            path: PathBuf::from("sites.json"),
        };
        assert_eq!(
            err.to_string(),
            "JSON root of 'sites.json' should be a list of site objects"
        );
    }

    #[test]
    fn test_handshake_error_conversion() {
        let handshake: openssl::ssl::HandshakeError<std::net::TcpStream> =
            openssl::ssl::HandshakeError::SetupFailure(openssl::error::ErrorStack::get());
        let err = CheckError::from(handshake);
        assert!(matches!(err, CheckError::HandshakeFailed { .. }));
        assert!(err.to_string().starts_with("TLS handshake failed"));
    }

    #[test]
    fn test_check_error_keeps_source() {
        use std::error::Error as _;

        let err = CheckError::ConnectionFailed {
            address: "example.com:443".to_string(),
            source: io::Error::new(io::ErrorKind::ConnectionRefused, "refused"),
        };
        assert!(err.source().is_some());
        assert!(err.to_string().contains("example.com:443"));
    }
}
