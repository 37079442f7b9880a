use reqwest::StatusCode;
use thiserror::Error;
use uuid::Uuid;

use crate::wire::DecodeError;

#[derive(Debug, Error)]
pub enum ClientError {
    /// The request itself failed: connection refused, TLS, timeout, or an
    /// unreadable response body. Never retried here; the caller owns retry
    /// policy.
    #[error("{operation} failed: {source}")]
    Transport {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// The remote answered with a status outside the documented success set
    /// for this operation.
    #[error("{operation} returned unexpected status {status}")]
    UnexpectedStatus {
        operation: &'static str,
        status: StatusCode,
    },

    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// A supplied identifier failed format validation. Raised before any
    /// network I/O happens.
    #[error("invalid identifier '{value}': {source}")]
    InvalidIdentifier {
        value: String,
        #[source]
        source: uuid::Error,
    },

    #[error("{operation} aborted: cancellation requested")]
    Cancelled { operation: &'static str },

    #[error("invalid configuration: {message}")]
    Configuration { message: String },
}

/// Parse an opaque identifier string into a [`Uuid`].
///
/// Identifiers come back from the remote as UUIDs; anything else in a
/// declared record is a caller mistake we want to catch before dialing out.
pub fn parse_identifier(value: &str) -> Result<Uuid, ClientError> {
    Uuid::parse_str(value).map_err(|source| ClientError::InvalidIdentifier {
        value: value.to_string(),
        source,
    })
}
