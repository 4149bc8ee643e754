//! Arena-backed [`HostDocument`] for tests.
//!
//! Mirrors the parts of the browser DOM the patch relies on: tree moves,
//! class lookups over attached nodes only, inline styles, and a record of
//! every listener binding, observer, click and scroll.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use crate::error::PatchError;
use crate::host::{HostDocument, ObserverSlot};
use crate::markers::HostMarkers;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Default)]
struct Node {
    tag: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    classes: Vec<String>,
    attributes: BTreeMap<String, String>,
    styles: BTreeMap<String, String>,
    inner_html: String,
    text: Option<String>,
}

#[derive(Debug, Default)]
struct Arena {
    nodes: Vec<Node>,
    pathname: String,
    click_bindings: BTreeMap<NodeId, usize>,
    hover_bound: BTreeSet<NodeId>,
    hover_bind_calls: usize,
    keyboard_bindings: usize,
    observers: BTreeMap<ObserverSlot, NodeId>,
    observe_calls: usize,
    clicks: Vec<NodeId>,
    scrolls: Vec<NodeId>,
    window_closed: bool,
    rejects_moves: bool,
}

impl Arena {
    fn node(&self, id: NodeId) -> Result<&Node, PatchError> {
        self.nodes
            .get(id.0)
            .ok_or_else(|| PatchError::Host(format!("unknown node {}", id.0)))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, PatchError> {
        self.nodes
            .get_mut(id.0)
            .ok_or_else(|| PatchError::Host(format!("unknown node {}", id.0)))
    }

    fn check_move(&self) -> Result<(), PatchError> {
        if self.rejects_moves {
            return Err(PatchError::Host("tree move rejected".to_string()));
        }
        Ok(())
    }

    fn unlink(&mut self, child: NodeId) -> Result<(), PatchError> {
        if let Some(parent) = self.node(child)?.parent {
            self.node_mut(parent)?.children.retain(|id| *id != child);
            self.node_mut(child)?.parent = None;
        }
        Ok(())
    }

    fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.nodes.get(id.0).and_then(|node| node.parent);
        }
        false
    }

    fn insert(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<(), PatchError> {
        if self.is_ancestor(child, parent) {
            return Err(PatchError::Host("hierarchy request error".to_string()));
        }
        if let Some(reference) = reference {
            if self.node(reference)?.parent != Some(parent) {
                return Err(PatchError::Host(
                    "reference node is not a child of parent".to_string(),
                ));
            }
        }
        self.unlink(child)?;
        let children = &mut self.node_mut(parent)?.children;
        let index = reference
            .and_then(|reference| children.iter().position(|id| *id == reference))
            .unwrap_or(children.len());
        children.insert(index, child);
        self.node_mut(child)?.parent = Some(parent);
        Ok(())
    }

    fn attached_in_order(&self) -> Vec<NodeId> {
        let mut ordered = Vec::new();
        let mut stack = vec![FakeDocument::ROOT];
        while let Some(id) = stack.pop() {
            ordered.push(id);
            if let Some(node) = self.nodes.get(id.0) {
                stack.extend(node.children.iter().rev().copied());
            }
        }
        ordered
    }
}

#[derive(Debug, Clone)]
pub struct FakeDocument {
    inner: Rc<RefCell<Arena>>,
}

/// Handles into the layout built by [`FakeDocument::chat_layout`].
///
/// ```text
/// body
/// └── base
///     └── slot
///         ├── sidebar
///         │   └── channel list
///         └── content
///             └── conversation
///                 ├── banner
///                 └── scroller
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ChatLayout {
    pub base: NodeId,
    pub slot: NodeId,
    pub sidebar: NodeId,
    pub channel_list: NodeId,
    pub content: NodeId,
    pub conversation: NodeId,
    pub banner: NodeId,
    pub scroller: NodeId,
}

impl FakeDocument {
    pub const ROOT: NodeId = NodeId(0);

    pub fn new(pathname: &str) -> Self {
        let arena = Arena {
            nodes: vec![Node {
                tag: "body".to_string(),
                ..Node::default()
            }],
            pathname: pathname.to_string(),
            ..Arena::default()
        };
        Self {
            inner: Rc::new(RefCell::new(arena)),
        }
    }

    /// The two-pane host layout with every marker the patch looks for.
    pub fn chat_layout(pathname: &str, markers: &HostMarkers) -> (Self, ChatLayout) {
        let document = Self::new(pathname);
        let base = document.element("div", &[]);
        let slot = document.element("div", &[]);
        let sidebar = document.element("nav", &[markers.sidebar.as_str()]);
        let channel_list = document.element("ul", &[]);
        let (content, conversation, banner, scroller) = document.content_region(markers);

        document.append(Self::ROOT, base);
        document.append(base, slot);
        document.append(slot, sidebar);
        document.append(sidebar, channel_list);
        document.append(slot, content);

        let layout = ChatLayout {
            base,
            slot,
            sidebar,
            channel_list,
            content,
            conversation,
            banner,
            scroller,
        };
        (document, layout)
    }

    /// A detached content region: `(content, conversation, banner, scroller)`.
    pub fn content_region(&self, markers: &HostMarkers) -> (NodeId, NodeId, NodeId, NodeId) {
        let content = self.element("div", &[markers.content.as_str()]);
        let conversation = self.element("main", &[markers.conversation.as_str()]);
        let banner = self.element("section", &[markers.banner.as_str()]);
        let scroller = self.element("div", &[markers.scroller.as_str()]);
        self.append(content, conversation);
        self.append(conversation, banner);
        self.append(conversation, scroller);
        (content, conversation, banner, scroller)
    }

    /// Creates a detached element.
    pub fn element(&self, tag: &str, classes: &[&str]) -> NodeId {
        let mut arena = self.inner.borrow_mut();
        let id = NodeId(arena.nodes.len());
        arena.nodes.push(Node {
            tag: tag.to_string(),
            classes: classes.iter().map(|class| (*class).to_string()).collect(),
            ..Node::default()
        });
        id
    }

    pub fn append(&self, parent: NodeId, child: NodeId) {
        let result = self.inner.borrow_mut().insert(parent, child, None);
        assert!(result.is_ok(), "append failed: {result:?}");
    }

    pub fn detach(&self, node: NodeId) {
        let result = self.inner.borrow_mut().unlink(node);
        assert!(result.is_ok(), "detach failed: {result:?}");
    }

    pub fn set_text(&self, node: NodeId, text: &str) {
        if let Some(node) = self.inner.borrow_mut().nodes.get_mut(node.0) {
            node.text = Some(text.to_string());
        }
    }

    /// While set, every append, insert and removal made through
    /// [`HostDocument`] fails with [`PatchError::Host`].
    pub fn reject_tree_moves(&self, reject: bool) {
        self.inner.borrow_mut().rejects_moves = reject;
    }

    pub fn set_pathname(&self, pathname: &str) {
        self.inner.borrow_mut().pathname = pathname.to_string();
    }

    pub fn parent_of(&self, node: NodeId) -> Option<NodeId> {
        self.inner.borrow().nodes.get(node.0).and_then(|node| node.parent)
    }

    pub fn children_of(&self, node: NodeId) -> Vec<NodeId> {
        self.inner
            .borrow()
            .nodes
            .get(node.0)
            .map(|node| node.children.clone())
            .unwrap_or_default()
    }

    pub fn tag_of(&self, node: NodeId) -> String {
        self.inner
            .borrow()
            .nodes
            .get(node.0)
            .map(|node| node.tag.clone())
            .unwrap_or_default()
    }

    pub fn classes_of(&self, node: NodeId) -> Vec<String> {
        self.inner
            .borrow()
            .nodes
            .get(node.0)
            .map(|node| node.classes.clone())
            .unwrap_or_default()
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.inner
            .borrow()
            .nodes
            .get(node.0)
            .and_then(|node| node.attributes.get(name).cloned())
    }

    pub fn style(&self, node: NodeId, property: &str) -> Option<String> {
        self.inner
            .borrow()
            .nodes
            .get(node.0)
            .and_then(|node| node.styles.get(property).cloned())
    }

    pub fn inner_html(&self, node: NodeId) -> String {
        self.inner
            .borrow()
            .nodes
            .get(node.0)
            .map(|node| node.inner_html.clone())
            .unwrap_or_default()
    }

    /// Attached elements carrying `class`.
    pub fn count_class(&self, class: &str) -> usize {
        self.elements_by_class(class).len()
    }

    /// Every element, attached or not, created through [`HostDocument::create_element`]
    /// or [`FakeDocument::element`].
    pub fn node_count(&self) -> usize {
        self.inner.borrow().nodes.len()
    }

    pub fn click_bindings(&self, node: NodeId) -> usize {
        self.inner
            .borrow()
            .click_bindings
            .get(&node)
            .copied()
            .unwrap_or(0)
    }

    pub fn hover_bound(&self, node: NodeId) -> bool {
        self.inner.borrow().hover_bound.contains(&node)
    }

    pub fn hover_bind_calls(&self) -> usize {
        self.inner.borrow().hover_bind_calls
    }

    pub fn keyboard_bindings(&self) -> usize {
        self.inner.borrow().keyboard_bindings
    }

    pub fn observed(&self, slot: ObserverSlot) -> Option<NodeId> {
        self.inner.borrow().observers.get(&slot).copied()
    }

    pub fn observe_calls(&self) -> usize {
        self.inner.borrow().observe_calls
    }

    pub fn clicks(&self) -> Vec<NodeId> {
        self.inner.borrow().clicks.clone()
    }

    pub fn scrolls(&self) -> Vec<NodeId> {
        self.inner.borrow().scrolls.clone()
    }

    pub fn window_closed(&self) -> bool {
        self.inner.borrow().window_closed
    }
}

impl HostDocument for FakeDocument {
    type Element = NodeId;

    fn pathname(&self) -> String {
        self.inner.borrow().pathname.clone()
    }

    fn elements_by_class(&self, class: &str) -> Vec<NodeId> {
        let arena = self.inner.borrow();
        arena
            .attached_in_order()
            .into_iter()
            .filter(|id| {
                arena
                    .nodes
                    .get(id.0)
                    .is_some_and(|node| node.classes.iter().any(|c| c == class))
            })
            .collect()
    }

    fn create_element(&self, tag: &str) -> Result<NodeId, PatchError> {
        Ok(self.element(tag, &[]))
    }

    fn parent(&self, element: &NodeId) -> Option<NodeId> {
        self.parent_of(*element)
    }

    fn children(&self, element: &NodeId) -> Vec<NodeId> {
        self.children_of(*element)
    }

    fn append_child(&self, parent: &NodeId, child: &NodeId) -> Result<(), PatchError> {
        let mut arena = self.inner.borrow_mut();
        arena.check_move()?;
        arena.insert(*parent, *child, None)
    }

    fn insert_before(
        &self,
        parent: &NodeId,
        child: &NodeId,
        reference: Option<&NodeId>,
    ) -> Result<(), PatchError> {
        let mut arena = self.inner.borrow_mut();
        arena.check_move()?;
        arena.insert(*parent, *child, reference.copied())
    }

    fn remove_child(&self, parent: &NodeId, child: &NodeId) -> Result<(), PatchError> {
        let mut arena = self.inner.borrow_mut();
        arena.check_move()?;
        if arena.node(*child)?.parent != Some(*parent) {
            return Err(PatchError::Host("node is not a child of parent".to_string()));
        }
        arena.unlink(*child)
    }

    fn has_class(&self, element: &NodeId, class: &str) -> bool {
        self.inner
            .borrow()
            .nodes
            .get(element.0)
            .is_some_and(|node| node.classes.iter().any(|c| c == class))
    }

    fn add_class(&self, element: &NodeId, class: &str) -> Result<(), PatchError> {
        let mut arena = self.inner.borrow_mut();
        let node = arena.node_mut(*element)?;
        if !node.classes.iter().any(|c| c == class) {
            node.classes.push(class.to_string());
        }
        Ok(())
    }

    fn remove_class(&self, element: &NodeId, class: &str) -> Result<(), PatchError> {
        let mut arena = self.inner.borrow_mut();
        arena.node_mut(*element)?.classes.retain(|c| c != class);
        Ok(())
    }

    fn set_attribute(&self, element: &NodeId, name: &str, value: &str) -> Result<(), PatchError> {
        let mut arena = self.inner.borrow_mut();
        arena
            .node_mut(*element)?
            .attributes
            .insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn set_inner_html(&self, element: &NodeId, html: &str) {
        if let Some(node) = self.inner.borrow_mut().nodes.get_mut(element.0) {
            node.inner_html = html.to_string();
        }
    }

    fn set_style(&self, element: &NodeId, property: &str, value: &str) -> Result<(), PatchError> {
        let mut arena = self.inner.borrow_mut();
        let styles = &mut arena.node_mut(*element)?.styles;
        if value.is_empty() {
            styles.remove(property);
        } else {
            styles.insert(property.to_string(), value.to_string());
        }
        Ok(())
    }

    fn first_child_text(&self, element: &NodeId) -> Option<String> {
        self.inner
            .borrow()
            .nodes
            .get(element.0)
            .and_then(|node| node.text.clone())
    }

    fn click(&self, element: &NodeId) {
        self.inner.borrow_mut().clicks.push(*element);
    }

    fn scroll_to_bottom(&self, element: &NodeId) {
        self.inner.borrow_mut().scrolls.push(*element);
    }

    fn close_window(&self) {
        self.inner.borrow_mut().window_closed = true;
    }

    fn bind_click(&self, button: &NodeId) -> Result<(), PatchError> {
        *self
            .inner
            .borrow_mut()
            .click_bindings
            .entry(*button)
            .or_insert(0) += 1;
        Ok(())
    }

    fn bind_hover(&self, sidebar: &NodeId) -> Result<(), PatchError> {
        let mut arena = self.inner.borrow_mut();
        arena.hover_bind_calls += 1;
        arena.hover_bound.insert(*sidebar);
        Ok(())
    }

    fn unbind_hover(&self, sidebar: &NodeId) {
        self.inner.borrow_mut().hover_bound.remove(sidebar);
    }

    fn bind_keyboard(&self) -> Result<(), PatchError> {
        self.inner.borrow_mut().keyboard_bindings += 1;
        Ok(())
    }

    fn observe_children(&self, slot: ObserverSlot, target: &NodeId) -> Result<(), PatchError> {
        let mut arena = self.inner.borrow_mut();
        arena.observe_calls += 1;
        arena.observers.insert(slot, *target);
        Ok(())
    }

    fn disconnect(&self, slot: ObserverSlot) {
        self.inner.borrow_mut().observers.remove(&slot);
    }
}
