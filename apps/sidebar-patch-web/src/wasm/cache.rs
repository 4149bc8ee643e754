use async_trait::async_trait;
use sidebar_patch_core::{CacheBackend, CacheError, SessionBackend};
use web_sys::{Request, Response};

use super::*;

/// Where visibility flags are kept for this page.
///
/// Entries in the Cache API are `Response`s whose body is the flag, stored
/// under the destination URL.
#[derive(Debug, Clone)]
pub(super) enum PageCache {
    Persistent(web_sys::Cache),
    /// The Cache API is unavailable; flags last until the page unloads.
    Session(SessionBackend),
}

fn backend_error(context: &str, error: JsValue) -> CacheError {
    match js_error(context, error) {
        PatchError::Host(detail) => CacheError::Backend(detail),
        other => CacheError::Backend(other.to_string()),
    }
}

#[async_trait(?Send)]
impl CacheBackend for PageCache {
    async fn lookup(&self, url: &str) -> Result<Option<String>, CacheError> {
        let cache = match self {
            Self::Persistent(cache) => cache,
            Self::Session(session) => return session.lookup(url).await,
        };
        let matched = JsFuture::from(cache.match_with_str(url))
            .await
            .map_err(|error| backend_error("cache match", error))?;
        if matched.is_undefined() || matched.is_null() {
            return Ok(None);
        }
        let response: Response = matched
            .dyn_into()
            .map_err(|_| CacheError::Backend("cache entry is not a Response".to_string()))?;
        let body = response
            .text()
            .map_err(|error| backend_error("read cache entry", error))?;
        let body = JsFuture::from(body)
            .await
            .map_err(|error| backend_error("read cache entry", error))?;
        Ok(body.as_string())
    }

    fn store(&self, url: &str, body: &str) {
        let cache = match self {
            Self::Persistent(cache) => cache,
            Self::Session(session) => {
                session.store(url, body);
                return;
            }
        };
        let response = match Response::new_with_opt_str(Some(body)) {
            Ok(response) => response,
            Err(error) => {
                tracing::warn!(%url, error = %backend_error("build cache entry", error), "visibility not persisted");
                return;
            }
        };
        let write = cache.put_with_str(url, &response);
        let url = url.to_string();
        spawn_local(async move {
            if let Err(error) = JsFuture::from(write).await {
                tracing::warn!(%url, error = %backend_error("cache put", error), "visibility not persisted");
            }
        });
    }

    fn purge(&self) {
        let cache = match self {
            Self::Persistent(cache) => cache.clone(),
            Self::Session(session) => {
                session.purge();
                return;
            }
        };
        spawn_local(async move {
            let keys = match JsFuture::from(cache.keys()).await {
                Ok(keys) => js_sys::Array::from(&keys),
                Err(error) => {
                    tracing::warn!(error = %backend_error("cache keys", error), "visibility cache not cleared");
                    return;
                }
            };
            let mut removed = 0_u32;
            for key in keys.iter() {
                let Ok(request) = key.dyn_into::<Request>() else {
                    continue;
                };
                match JsFuture::from(cache.delete_with_request(&request)).await {
                    Ok(_) => removed += 1,
                    Err(error) => {
                        tracing::warn!(error = %backend_error("cache delete", error), "visibility entry not cleared");
                    }
                }
            }
            tracing::info!(removed, "visibility cache cleared");
        });
    }
}
