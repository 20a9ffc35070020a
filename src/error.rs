//! Error taxonomy for the benchmark engine.
//!
//! Five kinds with distinct propagation rules: `Connection` and `Setup` are
//! fatal to the current (adapter, workload) execution, `Operation` is
//! recovered per-iteration, `Configuration` is fatal before any I/O, and
//! `Capability` is fatal before measurement for a given pair.

use crate::adapter::Capability;
use crate::operation::OperationKind;
use thiserror::Error;

pub type BenchResult<T> = std::result::Result<T, BenchError>;

#[derive(Debug, Error)]
pub enum BenchError {
    /// The adapter failed to establish or validate a connection.
    #[error("connection failed for adapter `{adapter_id}`: {message}")]
    Connection {
        adapter_id: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A single operation faulted unrecoverably.
    #[error("operation `{operation_id}` ({kind}) failed: {message}")]
    Operation {
        operation_id: String,
        kind: OperationKind,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Test environment setup or initial data load failed.
    #[error("setup failed: {message}")]
    Setup {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// User-supplied input was invalid.
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// A workload requires a capability the adapter does not advertise.
    #[error("capability {capability} not supported by adapter `{adapter_id}`")]
    Capability {
        capability: Capability,
        adapter_id: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BenchError {
    pub fn connection(adapter_id: impl Into<String>, message: impl Into<String>) -> Self {
        BenchError::Connection {
            adapter_id: adapter_id.into(),
            message: message.into(),
            source: None,
        }
    }

    pub fn operation(
        operation_id: impl Into<String>,
        kind: OperationKind,
        message: impl Into<String>,
    ) -> Self {
        BenchError::Operation {
            operation_id: operation_id.into(),
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn setup(message: impl Into<String>) -> Self {
        BenchError::Setup {
            message: message.into(),
            source: None,
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        BenchError::Configuration {
            message: message.into(),
        }
    }

    pub fn capability(capability: Capability, adapter_id: impl Into<String>) -> Self {
        BenchError::Capability {
            capability,
            adapter_id: adapter_id.into(),
        }
    }

    /// True for errors that abort the current (adapter, workload) execution.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, BenchError::Operation { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_errors_are_recoverable() {
        let err = BenchError::operation("op-1", OperationKind::Read, "boom");
        assert!(!err.is_fatal());
        assert!(err.to_string().contains("op-1"));
    }

    #[test]
    fn connection_errors_are_fatal() {
        let err = BenchError::connection("seqscan", "refused");
        assert!(err.is_fatal());
    }
}
