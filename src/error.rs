//! Error types for dataset discovery, capability calls and response decoding.

use std::path::PathBuf;
use thiserror::Error;

use crate::transport::{BoxError, Method};
use crate::types::CapabilityKind;

/// Errors raised by the client.
///
/// A non-success HTTP status is not an error: it comes back to the caller as
/// [`Outcome::Failure`](crate::Outcome::Failure). The variants here always
/// surface, whatever [`ResponseMode`](crate::ResponseMode) was asked for.
#[derive(Debug, Error)]
pub enum Error {
    // Capability errors (exit code 2)
    #[error("dataset has no {kind} api")]
    CapabilityUnavailable { kind: CapabilityKind },

    // Decode errors (exit code 2)
    #[error("cannot decode {format} response: {message}")]
    Decode {
        format: &'static str,
        message: String,
    },

    #[error("cannot encode {format}: {message}")]
    Encode {
        format: &'static str,
        message: String,
    },

    #[error("SPARQL select result binding for \"{variable}\" is not a URI, Literal or BNode")]
    MalformedBinding { variable: String },

    // Configuration errors (exit code 2)
    #[error("invalid configuration: {message}")]
    Configuration { message: String },

    // IO errors (exit code 3)
    #[error("{method} {url} failed: {source}")]
    Transport {
        method: Method,
        url: String,
        #[source]
        source: BoxError,
    },

    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Transport { .. } | Error::FileNotFound { .. } | Error::ReadError { .. } => 3,
            _ => 2,
        }
    }

    pub(crate) fn decode(format: &'static str, message: impl ToString) -> Self {
        Error::Decode {
            format,
            message: message.to_string(),
        }
    }

    pub(crate) fn encode(format: &'static str, message: impl ToString) -> Self {
        Error::Encode {
            format,
            message: message.to_string(),
        }
    }

    pub(crate) fn sub_graph_unsupported() -> Self {
        Error::Configuration {
            message: "graph_uri not currently supported".to_string(),
        }
    }
}
