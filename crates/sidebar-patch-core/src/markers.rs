//! Structural class markers of the host client.
//!
//! These strings are the compatibility contract with one release of the host
//! application. A host redesign invalidates them; override them through
//! [`crate::config::PatchConfig`] instead of touching the controller.

use serde::{Deserialize, Serialize};

use crate::host::Region;

const SVG_PREFIX: &str = r#"<svg width="24" height="24" viewBox="0 0 24 24"><path fill="currentColor" d=""#;
const SVG_SUFFIX: &str = r#""></path></svg>"#;

/// Material chevron pointing left, shown while the sidebar is visible.
pub const ICON_COLLAPSE_PATH: &str = "M15.41 16.59L10.83 12l4.58-4.59L14 6l-6 6 6 6 1.41-1.41z";
/// Material chevron pointing right, shown while the sidebar is hidden.
pub const ICON_EXPAND_PATH: &str = "M8.59 16.59L13.17 12 8.59 7.41 10 6l6 6-6 6-1.41-1.41z";

#[must_use]
pub fn chevron_svg(path: &str) -> String {
    format!("{SVG_PREFIX}{path}{SVG_SUFFIX}")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostMarkers {
    /// Toolbar above the conversation; anchor for the toggle button.
    pub banner: String,
    /// Channel list next to the server rail.
    pub sidebar: String,
    /// Conversation column, swapped on channel switches.
    pub conversation: String,
    /// Row holding the sidebar and the conversation column.
    pub content: String,
    /// Scrollable message list inside the conversation.
    pub scroller: String,
    /// Host bar buttons, one of which jumps to the latest message.
    pub jump_button: String,
    pub jump_button_text: String,

    /// Set on a banner once the toggle button lives in it.
    pub banner_initialized: String,
    /// Set on the toggle button while the sidebar is hidden.
    pub button_hidden: String,
    /// Set on the sidebar while hover listeners are bound to it.
    pub sidebar_hover_bound: String,

    pub button_classes: Vec<String>,
    pub button_attributes: Vec<(String, String)>,
}

impl Default for HostMarkers {
    fn default() -> Self {
        Self {
            banner: "toolbar-1t6TWx".to_string(),
            sidebar: "sidebar-2K8pFh".to_string(),
            conversation: "chat-3bRxxu".to_string(),
            content: "content-98HsJk".to_string(),
            scroller: "scroller-2LSbBU".to_string(),
            jump_button: "barButtonAlt-mYL1lj".to_string(),
            jump_button_text: "Jump To Present".to_string(),
            banner_initialized: "hide-sidebar-init".to_string(),
            button_hidden: "hide-side".to_string(),
            sidebar_hover_bound: "sidebar-el".to_string(),
            button_classes: vec![
                "iconWrapper-2OrFZ1".to_string(),
                "clickable-3rdHwn".to_string(),
                "focusable-1YV_-H".to_string(),
            ],
            button_attributes: vec![
                ("role".to_string(), "button".to_string()),
                ("aria-label".to_string(), "Toggle Sidebar".to_string()),
                ("tabindex".to_string(), "0".to_string()),
            ],
        }
    }
}

impl HostMarkers {
    #[must_use]
    pub fn class_for(&self, region: Region) -> &str {
        match region {
            Region::Banner => &self.banner,
            Region::Sidebar => &self.sidebar,
            Region::Conversation => &self.conversation,
            Region::Content => &self.content,
            Region::Scroller => &self.scroller,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chevrons_embed_their_path() {
        let svg = chevron_svg(ICON_EXPAND_PATH);
        assert!(svg.starts_with("<svg"));
        assert!(svg.contains(ICON_EXPAND_PATH));
        assert!(svg.ends_with("</svg>"));
    }

    #[test]
    fn every_region_has_a_distinct_marker() {
        let markers = HostMarkers::default();
        let mut classes: Vec<&str> = Region::ALL
            .iter()
            .map(|region| markers.class_for(*region))
            .collect();
        classes.sort_unstable();
        classes.dedup();
        assert_eq!(classes.len(), Region::ALL.len());
    }
}
