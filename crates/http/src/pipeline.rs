//! Tenant-resolving request pipeline.
//!
//! One pipeline instance serves every resource: it resolves the tenant
//! origin, injects the bearer token, serializes the body, sends the request
//! through a [`Transport`], and normalizes the outcome into a
//! [`ResponseEnvelope`].
//!
//! ## Guarantees
//!
//! - **No caching**: every call reaches the transport.
//! - **Failures are data**: HTTP errors and transport failures come back as
//!   `ResponseEnvelope::Failure`, never as `Err` or a panic.
//! - **Only GET is retried**, and only when no response was obtained and the
//!   failure is transient (connect, timeout, body).
//! - **No shared mutable state**: the session is borrowed read-only for the
//!   duration of the call, so concurrent calls are independent.
//!
//! Cancellation is cooperative: dropping the returned future stops waiting.

use std::sync::Arc;
use std::time::Instant;

use reqwest::Method;

use bizdesk_core::Session;

use crate::config::{ClientConfig, ConfigError, RetryPolicy};
use crate::envelope::ResponseEnvelope;
use crate::request::{RequestBody, RequestDescriptor};
use crate::tenant::TenantResolver;
use crate::transport::{
    AUTHORIZATION, CONTENT_TYPE, PreparedBody, PreparedRequest, ReqwestTransport, Transport,
};

#[derive(Clone)]
pub struct RequestPipeline {
    resolver: TenantResolver,
    transport: Arc<dyn Transport>,
    retry: RetryPolicy,
}

impl core::fmt::Debug for RequestPipeline {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RequestPipeline")
            .field("resolver", &self.resolver)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl RequestPipeline {
    /// Pipeline over the default `reqwest` transport.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ConfigError> {
        Ok(Self::with_transport(
            TenantResolver::from_config(config),
            ReqwestTransport::new(config)?,
            config.retry,
        ))
    }

    pub fn with_transport<T>(resolver: TenantResolver, transport: T, retry: RetryPolicy) -> Self
    where
        T: Transport + 'static,
    {
        Self {
            resolver,
            transport: Arc::new(transport),
            retry,
        }
    }

    pub fn resolver(&self) -> &TenantResolver {
        &self.resolver
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Resolve URL, headers, and body without sending anything.
    pub fn prepare(&self, descriptor: &RequestDescriptor, session: &Session) -> PreparedRequest {
        let mut url = self.resolver.resolve(session);
        url.push_str(&descriptor.path);
        if let Some(query) = descriptor.query_string() {
            url.push(if descriptor.path.contains('?') { '&' } else { '?' });
            url.push_str(&query);
        }

        let mut headers = Vec::with_capacity(2);
        if let Some(token) = session.bearer_token() {
            headers.push((AUTHORIZATION, format!("Bearer {token}")));
        }

        let body = match &descriptor.body {
            None => PreparedBody::Empty,
            Some(RequestBody::Json(value)) => PreparedBody::Json(value.to_string()),
            Some(RequestBody::Multipart(form)) => PreparedBody::Multipart(form.clone()),
        };

        // Multipart: the transport writes its own boundary.
        if !matches!(body, PreparedBody::Multipart(_)) {
            headers.push((CONTENT_TYPE, "application/json".to_string()));
        }

        PreparedRequest {
            method: descriptor.effective_method(),
            url,
            headers,
            body,
        }
    }

    /// Issue `descriptor` against the session's tenant.
    pub async fn execute(&self, descriptor: &RequestDescriptor, session: &Session) -> ResponseEnvelope {
        self.send(self.prepare(descriptor, session)).await
    }

    /// Send a request built by [`prepare`](Self::prepare).
    pub async fn send(&self, request: PreparedRequest) -> ResponseEnvelope {
        let retries = if request.method == Method::GET {
            self.retry.max_get_retries
        } else {
            0
        };

        let started = Instant::now();
        let mut attempt: u32 = 0;

        loop {
            match self.transport.send(request.clone()).await {
                Ok(response) => {
                    tracing::debug!(
                        method = %request.method,
                        url = %request.url,
                        status = response.status,
                        attempts = attempt + 1,
                        duration_ms = started.elapsed().as_millis() as u64,
                        "request completed"
                    );
                    return ResponseEnvelope::from_response(response.status, &response.body);
                }
                Err(err) if attempt < retries && err.kind.is_transient() => {
                    attempt += 1;
                    tracing::warn!(
                        method = %request.method,
                        url = %request.url,
                        attempt,
                        max_retries = retries,
                        error = %err,
                        "transport failure; retrying"
                    );
                    tokio::time::sleep(self.retry.backoff * attempt).await;
                }
                Err(err) => {
                    tracing::warn!(
                        method = %request.method,
                        url = %request.url,
                        attempts = attempt + 1,
                        duration_ms = started.elapsed().as_millis() as u64,
                        error = %err,
                        "request failed without a response"
                    );
                    return ResponseEnvelope::network_error(err);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::json;

    use crate::config::Scheme;
    use crate::envelope::FailureStatus;
    use crate::request::MultipartForm;
    use crate::transport::{RawResponse, TransportError, TransportErrorKind};

    /// Replays scripted outcomes and records what was sent.
    #[derive(Default)]
    struct ScriptedTransport {
        outcomes: Mutex<VecDeque<Result<RawResponse, TransportError>>>,
        sent: Mutex<Vec<PreparedRequest>>,
    }

    impl ScriptedTransport {
        fn new(outcomes: Vec<Result<RawResponse, TransportError>>) -> Arc<Self> {
            Arc::new(Self {
                outcomes: Mutex::new(outcomes.into()),
                sent: Mutex::new(Vec::new()),
            })
        }

        fn sent(&self) -> Vec<PreparedRequest> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send(&self, request: PreparedRequest) -> Result<RawResponse, TransportError> {
            self.sent.lock().unwrap().push(request);
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(TransportError::new(TransportErrorKind::Other, "script exhausted")))
        }
    }

    fn reply(status: u16, body: &str) -> Result<RawResponse, TransportError> {
        Ok(RawResponse {
            status,
            body: body.as_bytes().to_vec(),
        })
    }

    fn refused() -> Result<RawResponse, TransportError> {
        Err(TransportError::new(TransportErrorKind::Connect, "connection refused"))
    }

    fn pipeline(transport: Arc<ScriptedTransport>, retries: u32) -> RequestPipeline {
        RequestPipeline::with_transport(
            TenantResolver::new(Scheme::Https, Some("erp.example.com")),
            transport,
            RetryPolicy {
                max_get_retries: retries,
                backoff: Duration::from_millis(1),
            },
        )
    }

    #[test]
    fn anonymous_json_post_is_prepared_without_authorization() {
        let p = pipeline(ScriptedTransport::new(Vec::new()), 0);
        let session = Session {
            tenant_schema_name: Some("acme".to_string()),
            ..Session::default()
        };
        let descriptor = RequestDescriptor::post("/x/").json(json!({"n": 1}));

        let request = p.prepare(&descriptor, &session);

        assert_eq!(request.method, Method::POST);
        assert_eq!(request.url, "https://acme.erp.example.com/x/");
        assert_eq!(request.header(AUTHORIZATION), None);
        assert_eq!(request.header(CONTENT_TYPE), Some("application/json"));
        assert_eq!(request.body, PreparedBody::Json(r#"{"n":1}"#.to_string()));
    }

    #[test]
    fn bearer_token_and_filtered_query_are_applied() {
        let p = pipeline(ScriptedTransport::new(Vec::new()), 0);
        let session = Session::new("acme", "secret-token");
        let descriptor = RequestDescriptor::new("/purchase/products/")
            .query("a", "1")
            .query("b", "")
            .query("c", None::<String>);

        let request = p.prepare(&descriptor, &session);

        assert_eq!(request.method, Method::GET);
        assert_eq!(request.url, "https://acme.erp.example.com/purchase/products/?a=1");
        assert_eq!(request.header(AUTHORIZATION), Some("Bearer secret-token"));
        assert_eq!(request.body, PreparedBody::Empty);
    }

    #[test]
    fn query_is_appended_to_existing_query() {
        let p = pipeline(ScriptedTransport::new(Vec::new()), 0);
        let descriptor = RequestDescriptor::get("/reports/?format=pdf").query("year", 2024);
        let request = p.prepare(&descriptor, &Session::new("acme", "t"));
        assert!(request.url.ends_with("/reports/?format=pdf&year=2024"));
    }

    #[test]
    fn multipart_leaves_content_type_unset() {
        let p = pipeline(ScriptedTransport::new(Vec::new()), 0);
        let form = MultipartForm::new().text("name", "Widget");
        let descriptor = RequestDescriptor::post("/inventory/items/").multipart(form.clone());

        let request = p.prepare(&descriptor, &Session::new("acme", "t"));

        assert_eq!(request.header(CONTENT_TYPE), None);
        assert_eq!(request.header(AUTHORIZATION), Some("Bearer t"));
        assert_eq!(request.body, PreparedBody::Multipart(form));
    }

    #[tokio::test]
    async fn http_errors_are_returned_as_data() {
        let transport = ScriptedTransport::new(vec![reply(400, r#"{"name":["required"]}"#)]);
        let p = pipeline(transport.clone(), 3);

        let envelope = p
            .execute(&RequestDescriptor::get("/x/"), &Session::new("acme", "t"))
            .await;

        let failure = envelope.error().unwrap();
        assert_eq!(failure.status, FailureStatus::Http(400));
        assert_eq!(failure.body, json!({"name": ["required"]}));
        // HTTP errors are never retried.
        assert_eq!(transport.sent().len(), 1);
    }

    #[tokio::test]
    async fn get_is_retried_after_transport_failures() {
        let transport = ScriptedTransport::new(vec![refused(), refused(), reply(200, r#"[1]"#)]);
        let p = pipeline(transport.clone(), 2);

        let envelope = p
            .execute(&RequestDescriptor::new("/x/"), &Session::new("acme", "t"))
            .await;

        assert_eq!(envelope.data(), Some(&json!([1])));
        assert_eq!(transport.sent().len(), 3);
    }

    #[tokio::test]
    async fn exhausted_retries_report_network_error() {
        let transport = ScriptedTransport::new(vec![refused(), refused()]);
        let p = pipeline(transport.clone(), 1);

        let envelope = p
            .execute(&RequestDescriptor::get("/x/"), &Session::new("acme", "t"))
            .await;

        let failure = envelope.error().unwrap();
        assert_eq!(failure.status, FailureStatus::NetworkError);
        assert_eq!(failure.body, json!("connection failed: connection refused"));
        assert_eq!(transport.sent().len(), 2);
    }

    #[tokio::test]
    async fn invalid_requests_are_not_retried() {
        let transport = ScriptedTransport::new(vec![
            Err(TransportError::new(TransportErrorKind::InvalidRequest, "bad url")),
            reply(200, "[]"),
        ]);
        let p = pipeline(transport.clone(), 3);

        let envelope = p
            .execute(&RequestDescriptor::get("/x/"), &Session::new("acme", "t"))
            .await;

        let failure = envelope.error().unwrap();
        assert_eq!(failure.status, FailureStatus::NetworkError);
        assert_eq!(failure.body, json!("invalid request: bad url"));
        assert_eq!(transport.sent().len(), 1);
    }

    #[tokio::test]
    async fn timeouts_are_retried() {
        let transport = ScriptedTransport::new(vec![
            Err(TransportError::new(TransportErrorKind::Timeout, "slow")),
            reply(200, "[]"),
        ]);
        let p = pipeline(transport.clone(), 1);

        let envelope = p
            .execute(&RequestDescriptor::get("/x/"), &Session::new("acme", "t"))
            .await;

        assert!(envelope.is_ok());
        assert_eq!(transport.sent().len(), 2);
    }

    #[tokio::test]
    async fn send_uses_the_prepared_request_as_is() {
        let transport = ScriptedTransport::new(vec![reply(200, "{}")]);
        let p = pipeline(transport.clone(), 0);
        let request = p.prepare(
            &RequestDescriptor::get("/purchase/products/").query("page", 2),
            &Session::new("acme", "t"),
        );

        let envelope = p.send(request.clone()).await;

        assert!(envelope.is_ok());
        assert_eq!(transport.sent(), vec![request]);
    }

    #[tokio::test]
    async fn non_get_is_never_retried() {
        let transport = ScriptedTransport::new(vec![refused(), reply(201, "{}")]);
        let p = pipeline(transport.clone(), 5);

        let envelope = p
            .execute(
                &RequestDescriptor::post("/x/").json(json!({})),
                &Session::new("acme", "t"),
            )
            .await;

        assert_eq!(envelope.error().unwrap().status, FailureStatus::NetworkError);
        assert_eq!(transport.sent().len(), 1);
    }
}
