//! Transport seam: sends a fully prepared request and returns the raw reply.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use thiserror::Error;

use crate::config::{ClientConfig, ConfigError};
use crate::request::{MultipartForm, PartContent};

pub const AUTHORIZATION: &str = "authorization";
pub const CONTENT_TYPE: &str = "content-type";

/// Serialized request body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreparedBody {
    Empty,
    /// Already-encoded JSON text.
    Json(String),
    /// Forwarded untouched; encoded by the transport.
    Multipart(MultipartForm),
}

/// A request with URL, headers, and body fully resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedRequest {
    pub method: Method,
    pub url: String,
    /// Lowercase header names.
    pub headers: Vec<(&'static str, String)>,
    pub body: PreparedBody,
}

impl PreparedRequest {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Status and body bytes of a received response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// The request could not be built (bad URL, invalid header value, ...).
    InvalidRequest,
    Connect,
    Timeout,
    /// Response headers arrived but the body could not be read.
    Body,
    Other,
}

impl TransportErrorKind {
    /// Whether sending the same request again could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connect | Self::Timeout | Self::Body)
    }
}

impl core::fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Self::InvalidRequest => "invalid request",
            Self::Connect => "connection failed",
            Self::Timeout => "timed out",
            Self::Body => "failed to read response body",
            Self::Other => "transport error",
        })
    }
}

/// No usable response was obtained.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_builder() {
            TransportErrorKind::InvalidRequest
        } else if err.is_timeout() {
            TransportErrorKind::Timeout
        } else if err.is_connect() {
            TransportErrorKind::Connect
        } else if err.is_body() || err.is_decode() {
            TransportErrorKind::Body
        } else {
            TransportErrorKind::Other
        };
        Self::new(kind, err.to_string())
    }
}

/// Sends prepared requests.
///
/// Implementations must not interpret status codes: every received response
/// is returned as `Ok`, whatever its status.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: PreparedRequest) -> Result<RawResponse, TransportError>;
}

#[async_trait]
impl<T> Transport for Arc<T>
where
    T: Transport + ?Sized,
{
    async fn send(&self, request: PreparedRequest) -> Result<RawResponse, TransportError> {
        (**self).send(request).await
    }
}

/// `reqwest`-backed transport.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;
        Ok(Self { client })
    }

    /// Wrap a preconfigured client (custom TLS, DNS overrides, proxies).
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: PreparedRequest) -> Result<RawResponse, TransportError> {
        let url = reqwest::Url::parse(&request.url).map_err(|e| {
            TransportError::new(
                TransportErrorKind::InvalidRequest,
                format!("invalid url '{}': {e}", request.url),
            )
        })?;

        let mut builder = self.client.request(request.method, url);
        for (name, value) in &request.headers {
            builder = builder.header(*name, value.as_str());
        }

        builder = match request.body {
            PreparedBody::Empty => builder,
            PreparedBody::Json(text) => builder.body(text),
            PreparedBody::Multipart(form) => builder.multipart(to_reqwest_form(form)?),
        };

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;

        Ok(RawResponse {
            status,
            body: body.to_vec(),
        })
    }
}

fn to_reqwest_form(form: MultipartForm) -> Result<reqwest::multipart::Form, TransportError> {
    let mut out = reqwest::multipart::Form::new();
    for part in form.parts() {
        out = match &part.content {
            PartContent::Text(value) => out.text(part.name.clone(), value.clone()),
            PartContent::File {
                file_name,
                mime,
                bytes,
            } => {
                let mut file = reqwest::multipart::Part::bytes(bytes.clone())
                    .file_name(file_name.clone());
                if let Some(mime) = mime {
                    file = file.mime_str(mime).map_err(|e| {
                        TransportError::new(
                            TransportErrorKind::InvalidRequest,
                            format!("invalid mime type '{mime}' for part '{}': {e}", part.name),
                        )
                    })?;
                }
                out.part(part.name.clone(), file)
            }
        };
    }
    Ok(out)
}
