//! Response classification and the result type every capability call returns.

use serde_json::Value;

use crate::error::Error;
use crate::transport::HttpResponse;
use crate::types::ResponseMode;

/// True when `status` is in the 2xx success band.
pub fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

/// Result of a capability call.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    /// Success status, body decoded.
    Success(T),
    /// Non-success status; the body is left for the caller to interpret.
    Failure { status: u16, body: String },
    /// The caller asked for [`ResponseMode::Raw`]; nothing was decoded.
    Raw { status: u16, body: String },
}

impl<T> Outcome<T> {
    /// Classify `response` and decode it when the mode and status allow.
    ///
    /// Decoding errors are only possible on success statuses.
    pub(crate) fn settle<F>(response: HttpResponse, mode: ResponseMode, decode: F) -> Result<Self, Error>
    where
        F: FnOnce(&HttpResponse) -> Result<T, Error>,
    {
        if mode == ResponseMode::Raw {
            return Ok(Outcome::Raw {
                status: response.status,
                body: response.body,
            });
        }
        if !is_success(response.status) {
            return Ok(Outcome::Failure {
                status: response.status,
                body: response.body,
            });
        }
        decode(&response).map(Outcome::Success)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    /// HTTP status, when one was kept.
    pub fn status(&self) -> Option<u16> {
        match self {
            Outcome::Success(_) => None,
            Outcome::Failure { status, .. } | Outcome::Raw { status, .. } => Some(*status),
        }
    }

    pub fn success(self) -> Option<T> {
        match self {
            Outcome::Success(value) => Some(value),
            _ => None,
        }
    }
}

/// Decode a JSON body.
pub fn decode_json(body: &str) -> Result<Value, Error> {
    serde_json::from_str(body).map_err(|e| Error::decode("JSON", e))
}
