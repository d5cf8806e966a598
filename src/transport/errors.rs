//! Connection error reporting

use log::error;

use crate::common::TransportError;

/// Sink for connection errors
pub trait ErrorReporter: Send + Sync {
    /// Record `cause`; `critical` marks errors that threaten the node
    fn report(&self, cause: &TransportError, critical: bool);
}

/// Reporter that writes to the log and counts errors
#[derive(Debug, Default, Clone, Copy)]
pub struct LogErrorReporter;

impl ErrorReporter for LogErrorReporter {
    fn report(&self, cause: &TransportError, critical: bool) {
        metrics::counter!("dual_mode.errors", "critical" => if critical { "true" } else { "false" }).increment(1);
        if critical {
            error!("Critical transport error: {}", cause);
        } else {
            error!("Transport error: {}", cause);
        }
    }
}

/// Handles errors raised while a connection is being set up
pub struct ExceptionHandler<'a> {
    reporter: &'a dyn ErrorReporter,
}

impl<'a> ExceptionHandler<'a> {
    pub fn new(reporter: &'a dyn ErrorReporter) -> Self {
        Self { reporter }
    }

    /// Report `err` and hand back its cause
    ///
    /// One level of decoder wrapping is stripped before reporting. The
    /// caller closes the connection afterwards.
    pub fn on_exception(&self, err: TransportError) -> TransportError {
        let cause = err.into_cause();
        self.reporter.report(&cause, false);
        error!("Exception during establishing a SSL connection: {}", cause);
        cause
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingReporter {
        seen: Mutex<Vec<(String, bool)>>,
    }

    impl ErrorReporter for RecordingReporter {
        fn report(&self, cause: &TransportError, critical: bool) {
            self.seen.lock().unwrap().push((cause.to_string(), critical));
        }
    }

    #[test]
    fn test_decoder_error_reported_unwrapped() {
        let reporter = RecordingReporter::default();
        let handler = ExceptionHandler::new(&reporter);

        let err = TransportError::decoder(TransportError::TlsHandshake("bad certificate".to_string()));
        let cause = handler.on_exception(err);

        assert!(matches!(cause, TransportError::TlsHandshake(_)));
        assert_eq!(*reporter.seen.lock().unwrap(), vec![("bad certificate".to_string(), false)]);
    }

    #[test]
    fn test_plain_error_reported_as_is() {
        let reporter = RecordingReporter::default();
        let handler = ExceptionHandler::new(&reporter);

        handler.on_exception(TransportError::Other("boom".to_string()));
        let seen = reporter.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].0.contains("boom"));
        assert!(!seen[0].1);
    }
}
