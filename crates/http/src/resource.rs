//! Per-resource clients built from one shared pipeline.
//!
//! Every business resource (products, vendors, purchase orders, ...) gets the
//! same list/retrieve/create/update/delete surface from a small
//! [`ResourceConfig`] instead of its own copy of the request plumbing.

use std::sync::Arc;

use bizdesk_core::Session;

use crate::cache::{CacheTag, QueryCache};
use crate::envelope::ResponseEnvelope;
use crate::pipeline::RequestPipeline;
use crate::request::{QueryValue, RequestBody, RequestDescriptor, join_path};

/// How a resource deletes records.
///
/// Backends differ per resource, so this is configured rather than assumed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DeletionStrategy {
    /// `DELETE {prefix}{id}/`
    #[default]
    Method,
    /// `POST {prefix}{id}/{segment}/`
    SoftDeletePath(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceConfig {
    /// Path of the collection, always ending in `/` (e.g. `/purchase/products/`).
    pub resource_path_prefix: String,
    /// Tag kinds this resource's reads provide and its writes invalidate.
    pub cache_tag_names: Vec<String>,
    pub deletion: DeletionStrategy,
}

impl ResourceConfig {
    pub fn new(resource_path_prefix: impl Into<String>) -> Self {
        let mut prefix: String = resource_path_prefix.into();
        if !prefix.starts_with('/') {
            prefix.insert(0, '/');
        }
        if !prefix.ends_with('/') {
            prefix.push('/');
        }

        Self {
            resource_path_prefix: prefix,
            cache_tag_names: Vec::new(),
            deletion: DeletionStrategy::default(),
        }
    }

    pub fn tags<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cache_tag_names = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn soft_delete(mut self, segment: impl Into<String>) -> Self {
        self.deletion = DeletionStrategy::SoftDeletePath(segment.into());
        self
    }

    fn list_tags(&self) -> Vec<CacheTag> {
        self.cache_tag_names.iter().map(CacheTag::list).collect()
    }

    fn item_tags(&self, id: &str) -> Vec<CacheTag> {
        self.cache_tag_names
            .iter()
            .map(|name| CacheTag::item(name, id))
            .collect()
    }

    fn item_path(&self, id: &str) -> String {
        join_path(&self.resource_path_prefix, &format!("{id}/"))
    }
}

/// Builds resource clients sharing one pipeline and one cache.
#[derive(Debug, Clone)]
pub struct ResourceFactory {
    pipeline: RequestPipeline,
    cache: Arc<QueryCache>,
}

impl ResourceFactory {
    pub fn new(pipeline: RequestPipeline) -> Self {
        Self::with_cache(pipeline, Arc::new(QueryCache::new()))
    }

    pub fn with_cache(pipeline: RequestPipeline, cache: Arc<QueryCache>) -> Self {
        Self { pipeline, cache }
    }

    pub fn cache(&self) -> &Arc<QueryCache> {
        &self.cache
    }

    pub fn resource(&self, config: ResourceConfig) -> ResourceClient {
        ResourceClient {
            pipeline: self.pipeline.clone(),
            cache: Arc::clone(&self.cache),
            config,
        }
    }
}

impl RequestPipeline {
    /// Factory for resource clients over this pipeline with a fresh cache.
    pub fn resources(&self) -> ResourceFactory {
        ResourceFactory::new(self.clone())
    }
}

#[derive(Debug, Clone)]
pub struct ResourceClient {
    pipeline: RequestPipeline,
    cache: Arc<QueryCache>,
    config: ResourceConfig,
}

impl ResourceClient {
    pub fn config(&self) -> &ResourceConfig {
        &self.config
    }

    /// `GET {prefix}` with query parameters; cached under the list tags.
    pub async fn list<K, V, I>(&self, session: &Session, query: I) -> ResponseEnvelope
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<QueryValue>,
    {
        let descriptor = query.into_iter().fold(
            RequestDescriptor::get(self.config.resource_path_prefix.clone()),
            |d, (k, v)| d.query(k, v),
        );
        self.cached_read(session, &descriptor, self.config.list_tags())
            .await
    }

    /// `GET {prefix}{id}/`; cached under the item tags.
    pub async fn retrieve(&self, session: &Session, id: &str) -> ResponseEnvelope {
        let descriptor = RequestDescriptor::get(self.config.item_path(id));
        self.cached_read(session, &descriptor, self.config.item_tags(id))
            .await
    }

    /// `POST {prefix}`; invalidates the list tags on success.
    pub async fn create(&self, session: &Session, body: impl Into<RequestBody>) -> ResponseEnvelope {
        let descriptor = RequestDescriptor::post(self.config.resource_path_prefix.clone()).body(body);
        self.write(session, &descriptor, self.config.list_tags()).await
    }

    /// `PATCH {prefix}{id}/`; invalidates the record and the list tags on success.
    pub async fn update(
        &self,
        session: &Session,
        id: &str,
        body: impl Into<RequestBody>,
    ) -> ResponseEnvelope {
        let descriptor = RequestDescriptor::patch(self.config.item_path(id)).body(body);
        self.write(session, &descriptor, self.config.item_tags(id)).await
    }

    /// Delete per the configured [`DeletionStrategy`].
    pub async fn delete(&self, session: &Session, id: &str) -> ResponseEnvelope {
        let descriptor = match &self.config.deletion {
            DeletionStrategy::Method => RequestDescriptor::delete(self.config.item_path(id)),
            DeletionStrategy::SoftDeletePath(segment) => {
                RequestDescriptor::post(join_path(&self.config.item_path(id), &format!("{segment}/")))
            }
        };
        self.write(session, &descriptor, self.config.item_tags(id)).await
    }

    /// Uncached call with a path relative to the resource prefix.
    pub async fn custom(&self, session: &Session, descriptor: RequestDescriptor) -> ResponseEnvelope {
        let descriptor = descriptor.under(&self.config.resource_path_prefix);
        self.pipeline.execute(&descriptor, session).await
    }

    async fn cached_read(
        &self,
        session: &Session,
        descriptor: &RequestDescriptor,
        tags: Vec<CacheTag>,
    ) -> ResponseEnvelope {
        let request = self.pipeline.prepare(descriptor, session);
        // The resolved URL carries the tenant subdomain, so tenants never share keys.
        let key = request.url.clone();

        if let Some(data) = self.cache.get(&key) {
            tracing::debug!(key = %key, "cache hit");
            return ResponseEnvelope::Success { data };
        }

        let ticket = self.cache.begin_read(&tags);
        let envelope = self.pipeline.send(request).await;
        if let Some(data) = envelope.data() {
            if !self.cache.insert_fresh(&ticket, key.clone(), data.clone(), tags) {
                tracing::debug!(key = %key, "read overlapped an invalidation; not cached");
            }
        }
        envelope
    }

    async fn write(
        &self,
        session: &Session,
        descriptor: &RequestDescriptor,
        tags: Vec<CacheTag>,
    ) -> ResponseEnvelope {
        let envelope = self.pipeline.execute(descriptor, session).await;
        if envelope.is_ok() {
            self.cache.invalidate(&tags);
        }
        envelope
    }
}
