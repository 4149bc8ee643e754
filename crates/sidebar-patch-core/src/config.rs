use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::markers::HostMarkers;

pub const DEFAULT_CACHE_NAME: &str = "hide-side";
pub const DEFAULT_ANIMATION_MS: u64 = 200;
pub const DEFAULT_PEEK_DELAY_MS: u64 = 100;
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 100;
pub const DEFAULT_BOOTSTRAP_INTERVAL_MS: u64 = 1_000;
pub const DEFAULT_BOOTSTRAP_MAX_ATTEMPTS: u32 = 600;
pub const DEFAULT_COLLAPSED_WIDTH: &str = "20px";
/// The overlay is absolutely positioned, so its height has to be pinned.
pub const DEFAULT_COLLAPSED_HEIGHT: &str = "calc(100vh - 22px)";
pub const DEFAULT_OVERLAY_Z_INDEX: u32 = 2;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config override is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("bootstrap interval must be greater than zero")]
    ZeroBootstrapInterval,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatchConfig {
    pub cache_name: String,
    pub animation_ms: u64,
    pub peek_delay_ms: u64,
    pub settle_delay_ms: u64,
    pub bootstrap_interval_ms: u64,
    pub bootstrap_max_attempts: u32,
    pub collapsed_width: String,
    pub collapsed_height: String,
    pub overlay_z_index: u32,
    pub markers: HostMarkers,
}

impl Default for PatchConfig {
    fn default() -> Self {
        Self {
            cache_name: DEFAULT_CACHE_NAME.to_string(),
            animation_ms: DEFAULT_ANIMATION_MS,
            peek_delay_ms: DEFAULT_PEEK_DELAY_MS,
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
            bootstrap_interval_ms: DEFAULT_BOOTSTRAP_INTERVAL_MS,
            bootstrap_max_attempts: DEFAULT_BOOTSTRAP_MAX_ATTEMPTS,
            collapsed_width: DEFAULT_COLLAPSED_WIDTH.to_string(),
            collapsed_height: DEFAULT_COLLAPSED_HEIGHT.to_string(),
            overlay_z_index: DEFAULT_OVERLAY_Z_INDEX,
            markers: HostMarkers::default(),
        }
    }
}

impl PatchConfig {
    /// Parses a JSON override; omitted fields keep their defaults.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        if config.bootstrap_interval_ms == 0 {
            return Err(ConfigError::ZeroBootstrapInterval);
        }
        Ok(config)
    }

    #[must_use]
    pub fn animation(&self) -> Duration {
        Duration::from_millis(self.animation_ms)
    }

    #[must_use]
    pub fn peek_delay(&self) -> Duration {
        Duration::from_millis(self.peek_delay_ms)
    }

    #[must_use]
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    #[must_use]
    pub fn bootstrap_interval(&self) -> Duration {
        Duration::from_millis(self.bootstrap_interval_ms)
    }

    /// CSS `transition` applied to the sidebar so width changes animate.
    #[must_use]
    pub fn width_transition(&self) -> String {
        let seconds = self.animation_ms as f64 / 1_000.0;
        format!("width {seconds}s ease-in-out")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_override_keeps_defaults() {
        let config = PatchConfig::from_json(
            r#"{"animation_ms": 300, "markers": {"banner": "toolbar-new"}}"#,
        )
        .expect("override parses");

        assert_eq!(config.animation_ms, 300);
        assert_eq!(config.peek_delay_ms, DEFAULT_PEEK_DELAY_MS);
        assert_eq!(config.markers.banner, "toolbar-new");
        assert_eq!(config.markers.sidebar, HostMarkers::default().sidebar);
        assert_eq!(config.cache_name, DEFAULT_CACHE_NAME);
    }

    #[test]
    fn rejects_malformed_and_zero_interval_overrides() {
        assert!(matches!(
            PatchConfig::from_json("{not json"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            PatchConfig::from_json(r#"{"bootstrap_interval_ms": 0}"#),
            Err(ConfigError::ZeroBootstrapInterval)
        ));
    }

    #[test]
    fn transition_uses_animation_seconds() {
        assert_eq!(
            PatchConfig::default().width_transition(),
            "width 0.2s ease-in-out"
        );
    }
}
