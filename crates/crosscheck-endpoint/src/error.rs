use crosscheck_signal::CodecError;

use crate::transport::TransportFault;

#[derive(Debug, thiserror::Error)]
pub enum EndpointError {
    #[error("{endpoint}: connection failed: {source}")]
    Connection {
        endpoint: String,
        #[source]
        source: TransportFault,
    },

    #[error("{endpoint}: transport failure: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: TransportFault,
    },

    #[error("{endpoint}: no notification within {waited_ms} ms")]
    Timeout { endpoint: String, waited_ms: u64 },

    #[error("{endpoint}: protocol violation: {detail}")]
    ProtocolViolation { endpoint: String, detail: String },

    #[error("{endpoint}: malformed signal data: {source}")]
    Codec {
        endpoint: String,
        #[source]
        source: CodecError,
    },
}

impl EndpointError {
    /// Connection failures and protocol violations abort a run; every
    /// other kind is a per-test failure.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            EndpointError::Connection { .. } | EndpointError::ProtocolViolation { .. }
        )
    }

    pub fn endpoint(&self) -> &str {
        match self {
            EndpointError::Connection { endpoint, .. }
            | EndpointError::Transport { endpoint, .. }
            | EndpointError::Timeout { endpoint, .. }
            | EndpointError::ProtocolViolation { endpoint, .. }
            | EndpointError::Codec { endpoint, .. } => endpoint,
        }
    }

    pub(crate) fn transport(endpoint: &str, source: TransportFault) -> Self {
        EndpointError::Transport {
            endpoint: endpoint.to_string(),
            source,
        }
    }

    pub(crate) fn violation(endpoint: &str, detail: impl Into<String>) -> Self {
        EndpointError::ProtocolViolation {
            endpoint: endpoint.to_string(),
            detail: detail.into(),
        }
    }
}
