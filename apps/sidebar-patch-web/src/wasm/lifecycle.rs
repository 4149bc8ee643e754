use sidebar_patch_core::{PatchConfig, SessionBackend};

use super::*;

/// Page global holding an optional JSON override of [`PatchConfig`].
const CONFIG_OVERRIDE_KEY: &str = "__SIDEBAR_PATCH_CONFIG__";

pub(super) fn load_config() -> PatchConfig {
    let Some(raw) = config_override() else {
        return PatchConfig::default();
    };
    match PatchConfig::from_json(&raw) {
        Ok(config) => {
            tracing::info!("config override applied");
            config
        }
        Err(error) => {
            tracing::warn!(%error, "ignoring config override");
            PatchConfig::default()
        }
    }
}

/// Accepts either a JSON string or a plain object.
fn config_override() -> Option<String> {
    let window = web_sys::window()?;
    let value = js_sys::Reflect::get(&window, &JsValue::from_str(CONFIG_OVERRIDE_KEY)).ok()?;
    if value.is_undefined() || value.is_null() {
        return None;
    }
    if let Some(raw) = value.as_string() {
        return Some(raw);
    }
    js_sys::JSON::stringify(&value).ok()?.as_string()
}

/// Asks the browser not to evict the visibility cache. A refusal only means
/// flags may be lost under storage pressure.
pub(super) async fn request_persistence() {
    let Some(window) = web_sys::window() else {
        return;
    };
    let granted = match window.navigator().storage().persist() {
        Ok(promise) => JsFuture::from(promise)
            .await
            .ok()
            .and_then(|granted| granted.as_bool()),
        Err(_) => None,
    };
    if granted != Some(true) {
        tracing::warn!("persistent storage denied; sidebar visibility may be evicted");
    }
}

pub(super) async fn open_cache(name: &str) -> PageCache {
    match open_persistent_cache(name).await {
        Ok(cache) => PageCache::Persistent(cache),
        Err(error) => {
            tracing::warn!(%error, "cache storage unavailable; visibility kept for this page only");
            PageCache::Session(SessionBackend::new())
        }
    }
}

async fn open_persistent_cache(name: &str) -> Result<web_sys::Cache, PatchError> {
    let window =
        web_sys::window().ok_or_else(|| PatchError::Host("window is unavailable".to_string()))?;
    let storage = window
        .caches()
        .map_err(|error| js_error("cache storage", error))?;
    let cache = JsFuture::from(storage.open(name))
        .await
        .map_err(|error| js_error("open cache", error))?;
    cache
        .dyn_into::<web_sys::Cache>()
        .map_err(|_| PatchError::Host("opened cache is not a Cache".to_string()))
}
