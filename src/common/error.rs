//! Error handling module
//!
//! This module defines the error types and result type aliases used in the application.

use thiserror::Error;
use std::io;

/// Dual-mode transport error type
#[derive(Error, Debug)]
pub enum TransportError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// OpenSSL error
    #[error("OpenSSL error: {0}")]
    Ssl(#[from] openssl::error::ErrorStack),

    /// TLS handshake error
    ///
    /// The message is compared verbatim when classifying probe failures,
    /// see [`crate::tls::probe::NON_TLS_SIGNALS`].
    #[error("{0}")]
    TlsHandshake(String),

    /// Failure raised while a pipeline stage was decoding inbound bytes
    #[error("Decoder error: {0}")]
    Decoder(#[source] Box<TransportError>),

    /// A stage was driven after it had already left the pipeline
    #[error("Pipeline stage '{0}' is no longer part of the pipeline")]
    StageRemoved(&'static str),

    /// Invalid pipeline mutation
    #[error("Pipeline error: {0}")]
    Pipeline(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Other error
    #[error("Other error: {0}")]
    Other(String),
}

impl TransportError {
    /// Wrap an error raised inside a decoding stage
    pub fn decoder(cause: TransportError) -> Self {
        Self::Decoder(Box::new(cause))
    }

    /// Strip a single level of decoder wrapping
    ///
    /// Only one level is removed: the wrapped error is what gets reported,
    /// whatever it is.
    pub fn into_cause(self) -> Self {
        match self {
            Self::Decoder(cause) => *cause,
            other => other,
        }
    }
}

/// Result type alias
///
/// This is a `Result` type alias that uses our custom `TransportError`.
pub type Result<T> = std::result::Result<T, TransportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "File not found");
        let err: TransportError = io_err.into();

        match err {
            TransportError::Io(_) => {}
            _ => panic!("Should convert to IO error"),
        }
    }

    #[test]
    fn test_error_display() {
        let err = TransportError::Config("Invalid configuration".to_string());
        assert!(err.to_string().contains("Invalid configuration"));

        // Handshake messages are displayed verbatim
        let err = TransportError::TlsHandshake("Connection closed by peer".to_string());
        assert_eq!(err.to_string(), "Connection closed by peer");
    }

    #[test]
    fn test_into_cause_unwraps_one_level() {
        let err = TransportError::decoder(TransportError::TlsHandshake("bad record".to_string()));
        match err.into_cause() {
            TransportError::TlsHandshake(msg) => assert_eq!(msg, "bad record"),
            other => panic!("Expected handshake error, got {:?}", other),
        }

        let nested = TransportError::decoder(TransportError::decoder(TransportError::Other("x".into())));
        assert!(matches!(nested.into_cause(), TransportError::Decoder(_)));

        let plain = TransportError::Other("plain".to_string());
        assert!(matches!(plain.into_cause(), TransportError::Other(_)));
    }
}
