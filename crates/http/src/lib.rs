//! `bizdesk-http`: tenant-resolving request pipeline.
//!
//! Turns a logical [`RequestDescriptor`] plus an explicit [`Session`](bizdesk_core::Session)
//! into an authenticated call against the tenant's backend, and hands back a
//! [`ResponseEnvelope`] instead of an error.

pub mod cache;
pub mod config;
pub mod envelope;
pub mod pipeline;
pub mod request;
pub mod resource;
pub mod tenant;
pub mod transport;

pub use cache::{CacheLimits, CacheTag, Invalidation, QueryCache, ReadTicket, Subscription};
pub use config::{ClientConfig, ConfigError, DEFAULT_API_DOMAIN, RetryPolicy, Scheme};
pub use envelope::{DecodeError, FailureStatus, NETWORK_ERROR, RequestFailure, ResponseEnvelope};
pub use pipeline::RequestPipeline;
pub use request::{MultipartForm, QueryValue, RequestBody, RequestDescriptor};
pub use resource::{DeletionStrategy, ResourceClient, ResourceConfig, ResourceFactory};
pub use tenant::TenantResolver;
pub use transport::{
    PreparedBody, PreparedRequest, RawResponse, ReqwestTransport, Transport, TransportError,
    TransportErrorKind,
};

pub use reqwest::Method;
