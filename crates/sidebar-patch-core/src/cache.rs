use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use async_trait::async_trait;

use crate::destination::resolve;
use crate::visibility::VisibilityFlag;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    #[error("persistent cache is unavailable")]
    Unavailable,
    #[error("cache backend failed: {0}")]
    Backend(String),
}

/// Key-value store behind the visibility cache.
///
/// Reads are async; writes and purges are fire-and-forget and may complete
/// after a later read of the same key.
#[async_trait(?Send)]
pub trait CacheBackend {
    async fn lookup(&self, url: &str) -> Result<Option<String>, CacheError>;
    fn store(&self, url: &str, body: &str);
    fn purge(&self);
}

/// Per-destination sidebar visibility, keyed by the URL path's destination.
///
/// Paths that do not resolve to a destination never touch the backend.
#[derive(Debug, Clone)]
pub struct VisibilityCache<B> {
    backend: B,
}

impl<B: CacheBackend> VisibilityCache<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Missing entries, unreadable values and backend failures all read as `None`.
    pub async fn get(&self, path: &str) -> Option<VisibilityFlag> {
        let key = resolve(path)?;
        let url = key.cache_url();
        match self.backend.lookup(&url).await {
            Ok(Some(raw)) => {
                let flag = VisibilityFlag::parse(&raw);
                if flag.is_none() {
                    tracing::warn!(url = %url, value = %raw, "ignoring unrecognized visibility entry");
                }
                flag
            }
            Ok(None) => None,
            Err(error) => {
                tracing::debug!(url = %url, %error, "visibility lookup failed");
                None
            }
        }
    }

    pub fn set(&self, path: &str, flag: VisibilityFlag) {
        let Some(key) = resolve(path) else {
            return;
        };
        self.backend.store(&key.cache_url(), flag.as_str());
    }

    pub fn clear_all(&self) {
        self.backend.purge();
    }
}

/// In-memory backend for pages where persistent storage is denied.
///
/// Entries live as long as the page; clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct SessionBackend {
    inner: Rc<RefCell<SessionEntries>>,
}

#[derive(Debug, Default)]
struct SessionEntries {
    entries: BTreeMap<String, String>,
    lookups: usize,
    stores: usize,
}

impl SessionBackend {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn entry(&self, url: &str) -> Option<String> {
        self.inner.borrow().entries.get(url).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.borrow().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of reads and writes that reached this backend.
    #[must_use]
    pub fn access_count(&self) -> usize {
        let inner = self.inner.borrow();
        inner.lookups + inner.stores
    }
}

#[async_trait(?Send)]
impl CacheBackend for SessionBackend {
    async fn lookup(&self, url: &str) -> Result<Option<String>, CacheError> {
        let mut inner = self.inner.borrow_mut();
        inner.lookups += 1;
        Ok(inner.entries.get(url).cloned())
    }

    fn store(&self, url: &str, body: &str) {
        let mut inner = self.inner.borrow_mut();
        inner.stores += 1;
        inner.entries.insert(url.to_string(), body.to_string());
    }

    fn purge(&self) {
        self.inner.borrow_mut().entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    struct FailingBackend;

    #[async_trait(?Send)]
    impl CacheBackend for FailingBackend {
        async fn lookup(&self, _url: &str) -> Result<Option<String>, CacheError> {
            Err(CacheError::Unavailable)
        }

        fn store(&self, _url: &str, _body: &str) {}

        fn purge(&self) {}
    }

    #[test]
    fn entries_are_shared_across_channels_of_one_server() {
        let cache = VisibilityCache::new(SessionBackend::new());
        cache.set("/channels/123/456", VisibilityFlag::Hidden);

        assert_eq!(
            block_on(cache.get("/channels/123/789")),
            Some(VisibilityFlag::Hidden)
        );
        assert_eq!(block_on(cache.get("/channels/999/456")), None);
        assert_eq!(cache.backend().entry("/123").as_deref(), Some("1"));
    }

    #[test]
    fn later_write_wins() {
        let cache = VisibilityCache::new(SessionBackend::new());
        cache.set("/channels/@me/1", VisibilityFlag::Hidden);
        cache.set("/channels/@me/2", VisibilityFlag::Shown);

        assert_eq!(
            block_on(cache.get("/channels/@me")),
            Some(VisibilityFlag::Shown)
        );
        assert_eq!(cache.backend().len(), 1);
    }

    #[test]
    fn unresolvable_paths_never_reach_the_backend() {
        let cache = VisibilityCache::new(SessionBackend::new());
        cache.set("/login", VisibilityFlag::Hidden);
        let read = block_on(cache.get("/channels/settings/1"));

        assert_eq!(read, None);
        assert_eq!(cache.backend().access_count(), 0);
        assert!(cache.backend().is_empty());
    }

    #[test]
    fn garbage_entries_read_as_missing() {
        let backend = SessionBackend::new();
        backend.store("/123", "yes");
        let cache = VisibilityCache::new(backend);

        assert_eq!(block_on(cache.get("/channels/123/1")), None);
    }

    #[test]
    fn backend_failure_reads_as_missing() {
        let cache = VisibilityCache::new(FailingBackend);
        assert_eq!(block_on(cache.get("/channels/123/1")), None);
    }

    #[test]
    fn clear_all_drops_every_destination() {
        let cache = VisibilityCache::new(SessionBackend::new());
        cache.set("/channels/1/1", VisibilityFlag::Hidden);
        cache.set("/channels/2/1", VisibilityFlag::Shown);
        cache.clear_all();

        assert!(cache.backend().is_empty());
        assert_eq!(block_on(cache.get("/channels/1/1")), None);
    }
}
