//! Error taxonomy for proxy validation
//!
//! Per-proxy failures (`MalformedAddress`, `Network`) are recovered inside the
//! engine and turned into an invalid classification. Sink and configuration
//! failures abort the run and reach the caller, as does a worker task
//! that dies without handing back its item.

use std::io;
use thiserror::Error;

/// Errors produced by the parser, the probe executor and the validation engine
#[derive(Debug, Error)]
pub enum SieveError {
    /// No supported notation matched the descriptor
    #[error("malformed proxy address '{line}': {reason}")]
    MalformedAddress { line: String, reason: String },

    /// Timeout, refused connection, TLS or DNS failure while probing
    #[error("network failure: {0}")]
    Network(String),

    /// Writing a classified proxy to an output sink failed
    #[error("failed to write to {sink} output: {source}")]
    SinkWrite {
        sink: &'static str,
        #[source]
        source: io::Error,
    },

    /// Invalid run settings, detected before any work is dispatched
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A worker task died without reporting the item it held
    #[error("validation worker failed: {0}")]
    Worker(String),
}

impl SieveError {
    pub fn malformed<L: Into<String>, R: Into<String>>(line: L, reason: R) -> Self {
        Self::MalformedAddress {
            line: line.into(),
            reason: reason.into(),
        }
    }

    pub fn configuration<M: Into<String>>(message: M) -> Self {
        Self::Configuration(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_display() {
        let err = SieveError::malformed("not-a-proxy", "no supported notation matched");
        assert_eq!(
            err.to_string(),
            "malformed proxy address 'not-a-proxy': no supported notation matched"
        );
    }

    #[test]
    fn test_run_level_display() {
        let sink_err = SieveError::SinkWrite {
            sink: "valid",
            source: io::Error::new(io::ErrorKind::Other, "disk full"),
        };
        assert_eq!(sink_err.to_string(), "failed to write to valid output: disk full");
        assert_eq!(
            SieveError::Worker("task 3 panicked".into()).to_string(),
            "validation worker failed: task 3 panicked"
        );
    }
}
