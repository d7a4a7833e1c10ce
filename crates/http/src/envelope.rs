//! Success/failure envelope returned by the pipeline instead of errors.

use serde::de::DeserializeOwned;
use serde::ser::{SerializeStruct, Serializer};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Sentinel status for failures where no HTTP response was obtained.
pub const NETWORK_ERROR: &str = "NETWORK_ERROR";

/// Failure status: an HTTP status code, or the network sentinel.
///
/// Serializes as the bare number or as `"NETWORK_ERROR"`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum FailureStatus {
    Http(u16),
    NetworkError,
}

impl FailureStatus {
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::Http(code) => Some(*code),
            Self::NetworkError => None,
        }
    }
}

impl core::fmt::Display for FailureStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Http(code) => write!(f, "{code}"),
            Self::NetworkError => f.write_str(NETWORK_ERROR),
        }
    }
}

impl Serialize for FailureStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Http(code) => serializer.serialize_u16(*code),
            Self::NetworkError => serializer.serialize_str(NETWORK_ERROR),
        }
    }
}

/// Failure payload: status plus the remote body (or raw transport error).
#[derive(Debug, Clone, PartialEq, Serialize, Error)]
#[error("request failed with status {status}")]
pub struct RequestFailure {
    pub status: FailureStatus,
    pub body: Value,
}

/// Result of one pipeline call.
///
/// Serializes as `{"ok":true,"data":…}` or `{"ok":false,"error":{"status":…,"body":…}}`.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseEnvelope {
    Success { data: Value },
    Failure { error: RequestFailure },
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error(transparent)]
    Failed(#[from] RequestFailure),

    #[error("unexpected response payload: {0}")]
    Payload(#[from] serde_json::Error),
}

impl ResponseEnvelope {
    /// Envelope for an HTTP response: 2xx succeeds, everything else fails.
    pub fn from_response(status: u16, body: &[u8]) -> Self {
        let parsed = parse_body(body);
        if (200..300).contains(&status) {
            Self::Success { data: parsed }
        } else {
            Self::Failure {
                error: RequestFailure {
                    status: FailureStatus::Http(status),
                    body: parsed,
                },
            }
        }
    }

    /// Envelope for a call that never produced a response.
    pub fn network_error(raw: impl core::fmt::Display) -> Self {
        Self::Failure {
            error: RequestFailure {
                status: FailureStatus::NetworkError,
                body: Value::String(raw.to_string()),
            },
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn data(&self) -> Option<&Value> {
        match self {
            Self::Success { data } => Some(data),
            Self::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&RequestFailure> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { error } => Some(error),
        }
    }

    pub fn into_result(self) -> Result<Value, RequestFailure> {
        match self {
            Self::Success { data } => Ok(data),
            Self::Failure { error } => Err(error),
        }
    }

    /// Deserialize the success payload into `T`.
    pub fn decode<T: DeserializeOwned>(self) -> Result<T, DecodeError> {
        let data = self.into_result()?;
        Ok(serde_json::from_value(data)?)
    }
}

impl Serialize for ResponseEnvelope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ResponseEnvelope", 2)?;
        match self {
            Self::Success { data } => {
                state.serialize_field("ok", &true)?;
                state.serialize_field("data", data)?;
            }
            Self::Failure { error } => {
                state.serialize_field("ok", &false)?;
                state.serialize_field("error", error)?;
            }
        }
        state.end()
    }
}

/// Parse a response body as JSON.
///
/// Never fails: an empty body is `null`, a non-JSON body is kept as a
/// string holding the raw text.
pub fn parse_body(body: &[u8]) -> Value {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Value::Null;
    }

    serde_json::from_slice(body)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(body).into_owned()))
}
