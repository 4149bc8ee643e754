use std::fmt;

use serde::Serialize;

use crate::error::PatchError;
use crate::markers::HostMarkers;

/// Structural roles the patch looks up in the host page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Region {
    Banner,
    Sidebar,
    Conversation,
    Content,
    Scroller,
}

impl Region {
    pub const ALL: [Region; 5] = [
        Region::Banner,
        Region::Sidebar,
        Region::Conversation,
        Region::Content,
        Region::Scroller,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Banner => "banner",
            Self::Sidebar => "sidebar",
            Self::Conversation => "conversation",
            Self::Content => "content",
            Self::Scroller => "scroller",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The three child-list observers the watchdog keeps armed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ObserverSlot {
    Sidebar,
    Content,
    Conversation,
}

impl ObserverSlot {
    pub const ALL: [ObserverSlot; 3] = [
        ObserverSlot::Sidebar,
        ObserverSlot::Content,
        ObserverSlot::Conversation,
    ];
}

/// The live host document, as seen by the controller and the watchdog.
///
/// Listener bindings route back into the controller: a bound click calls
/// `toggle`, bound hover events call `pointer_entered`/`pointer_left`, the
/// keyboard handler dispatches shortcuts, and an observed child-list change
/// calls the watchdog's `on_mutation` for that slot.
pub trait HostDocument {
    type Element: Clone + PartialEq + fmt::Debug;

    fn pathname(&self) -> String;
    /// Attached elements carrying `class`, in document order.
    fn elements_by_class(&self, class: &str) -> Vec<Self::Element>;
    fn create_element(&self, tag: &str) -> Result<Self::Element, PatchError>;

    fn parent(&self, element: &Self::Element) -> Option<Self::Element>;
    fn children(&self, element: &Self::Element) -> Vec<Self::Element>;
    /// Moves `child` to the end of `parent`, detaching it from any previous parent.
    fn append_child(&self, parent: &Self::Element, child: &Self::Element)
    -> Result<(), PatchError>;
    /// Moves `child` before `reference`; `None` appends.
    fn insert_before(
        &self,
        parent: &Self::Element,
        child: &Self::Element,
        reference: Option<&Self::Element>,
    ) -> Result<(), PatchError>;
    fn remove_child(&self, parent: &Self::Element, child: &Self::Element)
    -> Result<(), PatchError>;

    fn has_class(&self, element: &Self::Element, class: &str) -> bool;
    fn add_class(&self, element: &Self::Element, class: &str) -> Result<(), PatchError>;
    fn remove_class(&self, element: &Self::Element, class: &str) -> Result<(), PatchError>;
    fn set_attribute(
        &self,
        element: &Self::Element,
        name: &str,
        value: &str,
    ) -> Result<(), PatchError>;
    fn set_inner_html(&self, element: &Self::Element, html: &str);
    /// An empty `value` removes the inline property.
    fn set_style(
        &self,
        element: &Self::Element,
        property: &str,
        value: &str,
    ) -> Result<(), PatchError>;
    fn first_child_text(&self, element: &Self::Element) -> Option<String>;

    fn click(&self, element: &Self::Element);
    /// Smooth-scrolls `element` to its bottom edge.
    fn scroll_to_bottom(&self, element: &Self::Element);
    fn close_window(&self);

    fn bind_click(&self, button: &Self::Element) -> Result<(), PatchError>;
    fn bind_hover(&self, sidebar: &Self::Element) -> Result<(), PatchError>;
    fn unbind_hover(&self, sidebar: &Self::Element);
    fn bind_keyboard(&self) -> Result<(), PatchError>;

    /// Replaces whatever observer `slot` had with one watching `target`'s direct children.
    fn observe_children(&self, slot: ObserverSlot, target: &Self::Element)
    -> Result<(), PatchError>;
    fn disconnect(&self, slot: ObserverSlot);
}

/// Marker-based lookups, one per structural role.
pub struct Locator<'a, D> {
    document: &'a D,
    markers: &'a HostMarkers,
}

impl<'a, D: HostDocument> Locator<'a, D> {
    pub fn new(document: &'a D, markers: &'a HostMarkers) -> Self {
        Self { document, markers }
    }

    /// Exactly one element must carry the region's marker.
    pub fn find(&self, region: Region) -> Result<D::Element, PatchError> {
        let mut matches = self
            .document
            .elements_by_class(self.markers.class_for(region));
        if matches.len() != 1 {
            return Err(PatchError::MissingRegion {
                region,
                found: matches.len(),
            });
        }
        matches.pop().ok_or(PatchError::MissingRegion { region, found: 0 })
    }

    /// Toolbar above the conversation; the toggle button goes here.
    pub fn banner(&self) -> Result<D::Element, PatchError> {
        self.find(Region::Banner)
    }

    pub fn sidebar(&self) -> Result<D::Element, PatchError> {
        self.find(Region::Sidebar)
    }

    pub fn content_region(&self) -> Result<D::Element, PatchError> {
        self.find(Region::Content)
    }

    pub fn conversation_region(&self) -> Result<D::Element, PatchError> {
        self.find(Region::Conversation)
    }

    pub fn scroller(&self) -> Result<D::Element, PatchError> {
        self.find(Region::Scroller)
    }

    /// Region watched by `slot`'s observer.
    pub fn observed_region(&self, slot: ObserverSlot) -> Result<D::Element, PatchError> {
        match slot {
            ObserverSlot::Sidebar => self.sidebar(),
            ObserverSlot::Content => self.content_region(),
            ObserverSlot::Conversation => self.conversation_region(),
        }
    }

    /// The host's "jump to latest" bar button, if it is currently rendered.
    pub fn jump_to_present(&self) -> Option<D::Element> {
        self.document
            .elements_by_class(&self.markers.jump_button)
            .into_iter()
            .find(|button| {
                self.document
                    .first_child_text(button)
                    .is_some_and(|text| text.trim() == self.markers.jump_button_text)
            })
    }
}
