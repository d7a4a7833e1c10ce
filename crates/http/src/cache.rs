//! Tag-based query cache with invalidation subscriptions.
//!
//! Cached reads declare the tags they depend on; mutations invalidate tags.
//! Invalidation removes matching entries and notifies every subscriber whose
//! tags match, so dependent views know to refetch.
//!
//! This layer sits above [`RequestPipeline`](crate::RequestPipeline), which
//! itself never caches.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak, mpsc};
use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::Value;

/// Label a cached query depends on: a kind, optionally narrowed to one id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct CacheTag {
    pub kind: String,
    pub id: Option<String>,
}

impl CacheTag {
    /// Tag for every record of `kind` (lists, aggregates).
    pub fn list(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: None,
        }
    }

    /// Tag for one record of `kind`.
    pub fn item(kind: impl Into<String>, id: impl core::fmt::Display) -> Self {
        Self {
            kind: kind.into(),
            id: Some(id.to_string()),
        }
    }

    /// Same kind, and either side is a list tag or both ids are equal.
    pub fn matches(&self, other: &CacheTag) -> bool {
        self.kind == other.kind
            && match (&self.id, &other.id) {
                (Some(a), Some(b)) => a == b,
                _ => true,
            }
    }
}

impl core::fmt::Display for CacheTag {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match &self.id {
            Some(id) => write!(f, "{}#{}", self.kind, id),
            None => f.write_str(&self.kind),
        }
    }
}

fn intersects(a: &[CacheTag], b: &[CacheTag]) -> bool {
    a.iter().any(|x| b.iter().any(|y| x.matches(y)))
}

/// Notification sent to subscribers when their tags are invalidated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invalidation {
    /// Tags passed to [`QueryCache::invalidate`].
    pub tags: Vec<CacheTag>,
    /// Cache keys that were evicted, sorted.
    pub keys: Vec<String>,
}

/// Receiving end of a cache subscription.
///
/// Dropping it unsubscribes; the sender is pruned on the next subscribe or
/// invalidation, whatever its tags.
#[derive(Debug)]
pub struct Subscription {
    receiver: mpsc::Receiver<Invalidation>,
    _alive: Arc<()>,
}

impl Subscription {
    /// Block until the next invalidation.
    pub fn recv(&self) -> Result<Invalidation, mpsc::RecvError> {
        self.receiver.recv()
    }

    pub fn try_recv(&self) -> Result<Invalidation, mpsc::TryRecvError> {
        self.receiver.try_recv()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Result<Invalidation, mpsc::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }
}

/// Snapshot of the invalidation generations a read depends on.
///
/// Taken with [`QueryCache::begin_read`] before fetching; a result is only
/// stored if no invalidation touched its tags in between.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadTicket {
    generations: Vec<(String, u64)>,
}

/// Bounds on what a [`QueryCache`] keeps.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CacheLimits {
    /// Oldest entries are evicted past this count. `0` disables storing.
    pub max_entries: usize,
    /// Entries older than this are treated as absent. `None` keeps them until evicted.
    pub ttl: Option<Duration>,
}

impl Default for CacheLimits {
    fn default() -> Self {
        Self {
            max_entries: 256,
            ttl: Some(Duration::from_secs(300)),
        }
    }
}

#[derive(Debug)]
struct CacheEntry {
    value: Value,
    tags: Vec<CacheTag>,
    stored_at: Instant,
    seq: u64,
}

#[derive(Debug)]
struct Subscriber {
    tags: Vec<CacheTag>,
    sender: mpsc::Sender<Invalidation>,
    alive: Weak<()>,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    subscribers: Vec<Subscriber>,
    /// Per tag kind, bumped on every invalidation naming that kind.
    generations: HashMap<String, u64>,
    next_seq: u64,
}

impl CacheState {
    fn prune_subscribers(&mut self) {
        self.subscribers.retain(|sub| sub.alive.strong_count() > 0);
    }

    fn generation(&self, kind: &str) -> u64 {
        self.generations.get(kind).copied().unwrap_or(0)
    }
}

/// In-memory query cache shared by every resource client of a session.
#[derive(Debug, Default)]
pub struct QueryCache {
    state: Mutex<CacheState>,
    limits: CacheLimits,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(limits: CacheLimits) -> Self {
        Self {
            state: Mutex::default(),
            limits,
        }
    }

    pub fn limits(&self) -> CacheLimits {
        self.limits
    }

    // Poisoning is ignored: every write replaces whole entries.
    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_expired(&self, entry: &CacheEntry) -> bool {
        self.limits
            .ttl
            .is_some_and(|ttl| entry.stored_at.elapsed() >= ttl)
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        let mut state = self.lock();
        let entry = state.entries.get(key)?;
        if !self.is_expired(entry) {
            return Some(entry.value.clone());
        }
        state.entries.remove(key);
        None
    }

    /// Store unconditionally. Reads racing with writes should use
    /// [`begin_read`](Self::begin_read) and [`insert_fresh`](Self::insert_fresh).
    pub fn insert(&self, key: impl Into<String>, value: Value, tags: Vec<CacheTag>) {
        let mut state = self.lock();
        self.store(&mut state, key.into(), value, tags);
    }

    /// Record the current generations of `tags` before fetching.
    pub fn begin_read(&self, tags: &[CacheTag]) -> ReadTicket {
        let state = self.lock();
        let mut generations: Vec<(String, u64)> = tags
            .iter()
            .map(|tag| (tag.kind.clone(), state.generation(&tag.kind)))
            .collect();
        generations.sort();
        generations.dedup();
        ReadTicket { generations }
    }

    /// Store unless an invalidation touched the ticket's tags since it was taken.
    ///
    /// Returns whether the value was stored.
    pub fn insert_fresh(
        &self,
        ticket: &ReadTicket,
        key: impl Into<String>,
        value: Value,
        tags: Vec<CacheTag>,
    ) -> bool {
        let mut state = self.lock();
        let stale = ticket
            .generations
            .iter()
            .any(|(kind, generation)| state.generation(kind) != *generation);
        if stale {
            return false;
        }
        self.store(&mut state, key.into(), value, tags)
    }

    fn store(&self, state: &mut CacheState, key: String, value: Value, tags: Vec<CacheTag>) -> bool {
        if self.limits.max_entries == 0 {
            return false;
        }

        if self.limits.ttl.is_some() {
            state.entries.retain(|_, entry| !self.is_expired(entry));
        }

        while !state.entries.contains_key(&key) && state.entries.len() >= self.limits.max_entries {
            let oldest = state
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.seq)
                .map(|(k, _)| k.clone());
            match oldest {
                Some(oldest) => {
                    state.entries.remove(&oldest);
                }
                None => break,
            }
        }

        let seq = state.next_seq;
        state.next_seq += 1;
        state.entries.insert(
            key,
            CacheEntry {
                value,
                tags,
                stored_at: Instant::now(),
                seq,
            },
        );
        true
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry (e.g. at logout or tenant switch).
    pub fn clear(&self) {
        self.lock().entries.clear();
    }

    /// Observe invalidations touching any of `tags`.
    pub fn subscribe(&self, tags: Vec<CacheTag>) -> Subscription {
        let (sender, receiver) = mpsc::channel();
        let alive = Arc::new(());

        let mut state = self.lock();
        state.prune_subscribers();
        state.subscribers.push(Subscriber {
            tags,
            sender,
            alive: Arc::downgrade(&alive),
        });

        Subscription {
            receiver,
            _alive: alive,
        }
    }

    /// Evict entries depending on `tags` and notify matching subscribers.
    ///
    /// Reads begun before this call will not store their results.
    /// Returns the evicted keys, sorted.
    pub fn invalidate(&self, tags: &[CacheTag]) -> Vec<String> {
        if tags.is_empty() {
            return Vec::new();
        }

        let mut state = self.lock();

        for tag in tags {
            *state.generations.entry(tag.kind.clone()).or_insert(0) += 1;
        }

        let mut keys: Vec<String> = state
            .entries
            .iter()
            .filter(|(_, entry)| intersects(&entry.tags, tags))
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        for key in &keys {
            state.entries.remove(key);
        }

        let message = Invalidation {
            tags: tags.to_vec(),
            keys: keys.clone(),
        };

        state.prune_subscribers();
        state.subscribers.retain(|sub| {
            if intersects(&sub.tags, tags) {
                sub.sender.send(message.clone()).is_ok()
            } else {
                true
            }
        });

        tracing::debug!(
            tags = ?tags.iter().map(ToString::to_string).collect::<Vec<_>>(),
            evicted = keys.len(),
            "cache tags invalidated"
        );

        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tag_matching_rules() {
        let list = CacheTag::list("Product");
        let one = CacheTag::item("Product", 1);
        let two = CacheTag::item("Product", 2);

        assert!(list.matches(&one));
        assert!(one.matches(&list));
        assert!(one.matches(&CacheTag::item("Product", "1")));
        assert!(!one.matches(&two));
        assert!(!list.matches(&CacheTag::list("Vendor")));
    }

    #[test]
    fn invalidation_evicts_only_dependent_entries() {
        let cache = QueryCache::new();
        cache.insert("products", json!([1, 2]), vec![CacheTag::list("Product")]);
        cache.insert("product/1", json!({"id": 1}), vec![CacheTag::item("Product", 1)]);
        cache.insert("product/2", json!({"id": 2}), vec![CacheTag::item("Product", 2)]);
        cache.insert("vendors", json!([]), vec![CacheTag::list("Vendor")]);

        let evicted = cache.invalidate(&[CacheTag::item("Product", 1)]);

        assert_eq!(evicted, vec!["product/1", "products"]);
        assert!(cache.get("product/2").is_some());
        assert!(cache.get("vendors").is_some());
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn subscribers_hear_only_their_tags() {
        let cache = QueryCache::new();
        let products = cache.subscribe(vec![CacheTag::list("Product")]);
        let vendors = cache.subscribe(vec![CacheTag::list("Vendor")]);
        cache.insert("products", json!([]), vec![CacheTag::list("Product")]);

        cache.invalidate(&[CacheTag::item("Product", 7)]);

        let message = products.try_recv().unwrap();
        assert_eq!(message.tags, vec![CacheTag::item("Product", 7)]);
        assert_eq!(message.keys, vec!["products"]);
        assert!(vendors.try_recv().is_err());
    }

    #[test]
    fn dropped_subscriptions_are_pruned() {
        let cache = QueryCache::new();
        let sub = cache.subscribe(vec![CacheTag::list("Product")]);
        drop(sub);

        cache.invalidate(&[CacheTag::list("Product")]);

        assert!(cache.lock().subscribers.is_empty());
    }

    #[test]
    fn dropped_subscriptions_to_untouched_tags_are_pruned() {
        let cache = QueryCache::new();
        drop(cache.subscribe(vec![CacheTag::list("Vendor")]));
        let _products = cache.subscribe(vec![CacheTag::list("Product")]);
        assert_eq!(cache.lock().subscribers.len(), 1);

        drop(cache.subscribe(vec![CacheTag::list("Vendor")]));
        cache.invalidate(&[CacheTag::list("Invoice")]);
        assert_eq!(cache.lock().subscribers.len(), 1);
    }

    #[test]
    fn read_overlapping_an_invalidation_is_not_stored() {
        let cache = QueryCache::new();
        let tags = vec![CacheTag::list("Product")];

        let ticket = cache.begin_read(&tags);
        cache.invalidate(&[CacheTag::item("Product", 4)]);

        assert!(!cache.insert_fresh(&ticket, "products", json!({"version": 0}), tags.clone()));
        assert!(cache.get("products").is_none());

        let ticket = cache.begin_read(&tags);
        assert!(cache.insert_fresh(&ticket, "products", json!({"version": 1}), tags));
        assert_eq!(cache.get("products"), Some(json!({"version": 1})));
    }

    #[test]
    fn unrelated_invalidations_keep_reads_fresh() {
        let cache = QueryCache::new();
        let tags = vec![CacheTag::list("Product")];

        let ticket = cache.begin_read(&tags);
        cache.invalidate(&[CacheTag::list("Vendor")]);

        assert!(cache.insert_fresh(&ticket, "products", json!([]), tags));
    }

    #[test]
    fn oldest_entries_are_evicted_past_capacity() {
        let cache = QueryCache::with_limits(CacheLimits {
            max_entries: 2,
            ttl: None,
        });
        cache.insert("a", json!(1), Vec::new());
        cache.insert("b", json!(2), Vec::new());
        cache.insert("a", json!(10), Vec::new());
        assert_eq!(cache.len(), 2);

        cache.insert("c", json!(3), Vec::new());

        // Rewriting "a" made "b" the oldest.
        assert_eq!(cache.len(), 2);
        assert!(cache.get("b").is_none());
        assert_eq!(cache.get("a"), Some(json!(10)));
        assert_eq!(cache.get("c"), Some(json!(3)));
    }

    #[test]
    fn expired_entries_are_absent() {
        let cache = QueryCache::with_limits(CacheLimits {
            max_entries: 8,
            ttl: Some(Duration::ZERO),
        });
        cache.insert("products", json!([]), Vec::new());
        assert!(cache.get("products").is_none());
        assert!(cache.is_empty());

        let cache = QueryCache::with_limits(CacheLimits {
            max_entries: 8,
            ttl: Some(Duration::from_secs(60)),
        });
        cache.insert("products", json!([]), Vec::new());
        assert_eq!(cache.get("products"), Some(json!([])));
    }

    #[test]
    fn zero_capacity_stores_nothing() {
        let cache = QueryCache::with_limits(CacheLimits {
            max_entries: 0,
            ttl: None,
        });
        cache.insert("products", json!([]), Vec::new());
        assert!(cache.is_empty());
    }
}
