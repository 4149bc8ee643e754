//! Sidebar toggle controller.
//!
//! Delayed work (the detach after the collapse animation, the settle after a
//! show, the hover peek) is never run by the controller itself. Operations
//! hand back a [`Scheduled`] step carrying a ticket; the driver sleeps for the
//! step's delay and feeds it to [`SidebarController::run_step`]. Starting a new
//! transition or injection issues a fresh ticket, so a step scheduled by an
//! earlier transition is dropped instead of racing the new one.

use std::time::Duration;

use serde::Serialize;

use crate::cache::{CacheBackend, VisibilityCache};
use crate::config::PatchConfig;
use crate::error::PatchError;
use crate::host::{HostDocument, Locator, Region};
use crate::markers::{ICON_COLLAPSE_PATH, ICON_EXPAND_PATH, chevron_svg};
use crate::shortcuts::Shortcut;
use crate::visibility::VisibilityFlag;

pub type Ticket = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SidebarPhase {
    /// Full width, in its original slot.
    Shown,
    /// Collapsing; detachment pending.
    Hiding,
    /// Collapsed. Detached into the overlay unless detaching failed.
    Hidden,
    /// Back in its slot; width/height overrides pending removal.
    Showing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Detach,
    Settle,
    Peek,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scheduled {
    pub step: Step,
    pub ticket: Ticket,
    pub delay: Duration,
}

/// The persisted flag for `path` should be read and handed to
/// [`SidebarController::apply_restored`] with `ticket`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreRequest {
    pub ticket: Ticket,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FollowUp {
    None,
    Restore(RestoreRequest),
    Schedule(Scheduled),
}

impl From<Option<Scheduled>> for FollowUp {
    fn from(step: Option<Scheduled>) -> Self {
        step.map_or(Self::None, Self::Schedule)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Injection {
    /// The host is not in a recognized layout yet.
    NotReady(PatchError),
    /// The banner already carries the toggle button.
    AlreadyInjected,
    Injected(RestoreRequest),
}

impl Injection {
    /// Whether the toggle button is present in the current banner.
    #[must_use]
    pub fn is_live(&self) -> bool {
        !matches!(self, Self::NotReady(_))
    }

    #[must_use]
    pub fn into_follow_up(self) -> FollowUp {
        match self {
            Self::Injected(request) => FollowUp::Restore(request),
            Self::NotReady(_) | Self::AlreadyInjected => FollowUp::None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Detachment<E> {
    /// Collapsed-width stand-in left in the sidebar's slot.
    placeholder: E,
    /// Absolutely positioned wrapper holding the sidebar.
    overlay: E,
    /// The sidebar's original parent.
    slot: E,
    /// The slot's parent; the overlay is appended here.
    base: E,
}

#[derive(Debug, Clone, PartialEq)]
struct InjectionState<E> {
    banner: E,
    sidebar: E,
    phase: SidebarPhase,
    detachment: Option<Detachment<E>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControllerSnapshot {
    pub button_created: bool,
    pub keyboard_bound: bool,
    pub injected: bool,
    pub phase: Option<SidebarPhase>,
    pub detached: bool,
    pub restoring: bool,
    pub in_flight: bool,
}

pub struct SidebarController<E, B> {
    config: PatchConfig,
    cache: VisibilityCache<B>,
    button: Option<E>,
    click_bound: bool,
    keyboard_bound: bool,
    injection: Option<InjectionState<E>>,
    last_ticket: Ticket,
    transition_ticket: Ticket,
    hover_ticket: Ticket,
    restoring: Option<Ticket>,
}

impl<E, B> SidebarController<E, B>
where
    E: Clone + PartialEq + std::fmt::Debug,
    B: CacheBackend,
{
    pub fn new(config: PatchConfig, cache: VisibilityCache<B>) -> Self {
        Self {
            config,
            cache,
            button: None,
            click_bound: false,
            keyboard_bound: false,
            injection: None,
            last_ticket: 0,
            transition_ticket: 0,
            hover_ticket: 0,
            restoring: None,
        }
    }

    pub fn config(&self) -> &PatchConfig {
        &self.config
    }

    pub fn cache(&self) -> &VisibilityCache<B> {
        &self.cache
    }

    #[must_use]
    pub fn phase(&self) -> Option<SidebarPhase> {
        self.injection.as_ref().map(|state| state.phase)
    }

    #[must_use]
    pub fn is_detached(&self) -> bool {
        self.injection
            .as_ref()
            .is_some_and(|state| state.detachment.is_some())
    }

    /// A restore or an animated transition has not finished yet.
    #[must_use]
    pub fn in_flight(&self) -> bool {
        self.restoring.is_some()
            || matches!(
                self.phase(),
                Some(SidebarPhase::Hiding | SidebarPhase::Showing)
            )
    }

    #[must_use]
    pub fn snapshot(&self) -> ControllerSnapshot {
        ControllerSnapshot {
            button_created: self.button.is_some(),
            keyboard_bound: self.keyboard_bound,
            injected: self.injection.is_some(),
            phase: self.phase(),
            detached: self.is_detached(),
            restoring: self.restoring.is_some(),
            in_flight: self.in_flight(),
        }
    }

    /// Puts the toggle button into the current banner unless it is already there.
    ///
    /// Zero or several banners/sidebars mean the host is mid-render or in a
    /// layout the patch does not handle; that is reported as
    /// [`Injection::NotReady`], not as an error.
    pub fn ensure_injected<D>(&mut self, document: &D) -> Result<Injection, PatchError>
    where
        D: HostDocument<Element = E>,
    {
        let markers = &self.config.markers;
        let locator = Locator::new(document, markers);
        let banner = match locator.banner() {
            Ok(banner) => banner,
            Err(error) => return Ok(Injection::NotReady(error)),
        };
        if document.has_class(&banner, &markers.banner_initialized) {
            return Ok(Injection::AlreadyInjected);
        }
        let sidebar = match locator.sidebar() {
            Ok(sidebar) => sidebar,
            Err(error) => return Ok(Injection::NotReady(error)),
        };

        let button = match &self.button {
            Some(button) => button.clone(),
            None => {
                let button = self.build_button(document)?;
                self.button = Some(button.clone());
                button
            }
        };
        if !self.click_bound {
            document.bind_click(&button)?;
            self.click_bound = true;
        }
        document.set_style(&sidebar, "transition", &self.config.width_transition())?;
        document.append_child(&banner, &button)?;
        if !self.keyboard_bound {
            document.bind_keyboard()?;
            self.keyboard_bound = true;
        }
        document.add_class(&banner, &self.config.markers.banner_initialized)?;

        // A channel switch rebuilds the banner but keeps the sidebar element;
        // what the controller did to that sidebar still holds.
        let state = match self.injection.take() {
            Some(previous) if previous.sidebar == sidebar => InjectionState {
                banner,
                ..previous
            },
            previous => {
                if let Some(previous) = previous {
                    self.discard_stale(document, &previous)?;
                }
                InjectionState {
                    banner,
                    sidebar,
                    phase: SidebarPhase::Shown,
                    detachment: None,
                }
            }
        };
        self.injection = Some(state);

        let ticket = self.begin_transition();
        self.restoring = Some(ticket);
        tracing::debug!(ticket, "toggle button injected");
        Ok(Injection::Injected(RestoreRequest {
            ticket,
            path: document.pathname(),
        }))
    }

    /// Injects if needed, then re-reads and re-applies the persisted flag.
    pub fn reinitialize<D>(&mut self, document: &D) -> Result<FollowUp, PatchError>
    where
        D: HostDocument<Element = E>,
    {
        match self.ensure_injected(document)? {
            Injection::Injected(request) => Ok(FollowUp::Restore(request)),
            Injection::AlreadyInjected if self.injection.is_some() => {
                let ticket = self.begin_transition();
                self.restoring = Some(ticket);
                Ok(FollowUp::Restore(RestoreRequest {
                    ticket,
                    path: document.pathname(),
                }))
            }
            Injection::AlreadyInjected => Ok(FollowUp::None),
            Injection::NotReady(error) => {
                tracing::debug!(%error, "reinitialize skipped");
                Ok(FollowUp::None)
            }
        }
    }

    /// Applies the flag read for a [`RestoreRequest`]; a missing flag shows the sidebar.
    pub fn apply_restored<D>(
        &mut self,
        document: &D,
        ticket: Ticket,
        flag: Option<VisibilityFlag>,
    ) -> Result<Option<Scheduled>, PatchError>
    where
        D: HostDocument<Element = E>,
    {
        if self.restoring != Some(ticket) {
            tracing::debug!(ticket, "dropping stale restore");
            return Ok(None);
        }
        self.restoring = None;
        match flag {
            Some(VisibilityFlag::Hidden) => self.hide(document),
            Some(VisibilityFlag::Shown) | None => self.show(document),
        }
    }

    /// User-initiated flip. Dropped while another transition is in flight.
    pub fn toggle<D>(&mut self, document: &D) -> Result<Option<Scheduled>, PatchError>
    where
        D: HostDocument<Element = E>,
    {
        if self.in_flight() {
            tracing::debug!("toggle dropped; transition in flight");
            return Ok(None);
        }
        match self.phase() {
            Some(SidebarPhase::Shown) => self.hide(document),
            Some(SidebarPhase::Hidden) => self.show(document),
            Some(SidebarPhase::Hiding | SidebarPhase::Showing) | None => Ok(None),
        }
    }

    pub fn hide<D>(&mut self, document: &D) -> Result<Option<Scheduled>, PatchError>
    where
        D: HostDocument<Element = E>,
    {
        self.cache.set(&document.pathname(), VisibilityFlag::Hidden);
        let Some(state) = self.injection.as_ref() else {
            return Ok(None);
        };
        let sidebar = state.sidebar.clone();
        let detached = state.detachment.is_some();

        self.render_button(document, VisibilityFlag::Hidden)?;
        document.set_style(&sidebar, "width", &self.config.collapsed_width)?;
        document.set_style(&sidebar, "height", &self.config.collapsed_height)?;

        let ticket = self.begin_transition();
        if detached {
            self.set_phase(SidebarPhase::Hidden);
            return Ok(None);
        }
        self.set_phase(SidebarPhase::Hiding);
        Ok(Some(Scheduled {
            step: Step::Detach,
            ticket,
            delay: self.config.animation(),
        }))
    }

    pub fn show<D>(&mut self, document: &D) -> Result<Option<Scheduled>, PatchError>
    where
        D: HostDocument<Element = E>,
    {
        self.cache.set(&document.pathname(), VisibilityFlag::Shown);
        let Some(state) = self.injection.as_ref() else {
            return Ok(None);
        };
        let sidebar = state.sidebar.clone();
        let detachment = state.detachment.clone();

        if let Some(detachment) = &detachment {
            verify_detachment(document, &sidebar, detachment)?;
        }
        self.render_button(document, VisibilityFlag::Shown)?;
        let ticket = self.begin_transition();

        let Some(detachment) = detachment else {
            document.set_style(&sidebar, "width", "")?;
            document.set_style(&sidebar, "height", "")?;
            self.set_phase(SidebarPhase::Shown);
            return Ok(None);
        };

        self.reattach(document, &sidebar, &detachment)?;
        if let Some(state) = self.injection.as_mut() {
            state.detachment = None;
            state.phase = SidebarPhase::Showing;
        }
        Ok(Some(Scheduled {
            step: Step::Settle,
            ticket,
            delay: self.config.settle_delay(),
        }))
    }

    /// Runs a step handed out earlier. Returns `false` when the step was stale.
    pub fn run_step<D>(&mut self, document: &D, scheduled: Scheduled) -> Result<bool, PatchError>
    where
        D: HostDocument<Element = E>,
    {
        let Some(state) = self.injection.as_ref() else {
            return Ok(false);
        };
        let sidebar = state.sidebar.clone();
        let phase = state.phase;

        match scheduled.step {
            Step::Peek => {
                if scheduled.ticket != self.hover_ticket || !self.hover_active() {
                    return Ok(false);
                }
                document.set_style(&sidebar, "width", "")?;
                Ok(true)
            }
            Step::Detach => {
                if scheduled.ticket != self.transition_ticket || phase != SidebarPhase::Hiding {
                    return Ok(false);
                }
                let detachment = self.detach(document, &sidebar);
                self.set_phase(SidebarPhase::Hidden);
                match detachment {
                    Ok(detachment) => {
                        if let Some(state) = self.injection.as_mut() {
                            state.detachment = Some(detachment);
                        }
                        Ok(true)
                    }
                    Err(error) if error.is_transient() => {
                        tracing::debug!(%error, "sidebar left in place while collapsed");
                        Ok(true)
                    }
                    Err(error) => Err(error),
                }
            }
            Step::Settle => {
                if scheduled.ticket != self.transition_ticket || phase != SidebarPhase::Showing {
                    return Ok(false);
                }
                document.set_style(&sidebar, "width", "")?;
                document.set_style(&sidebar, "height", "")?;
                self.set_phase(SidebarPhase::Shown);
                Ok(true)
            }
        }
    }

    /// Pointer entered the collapsed sidebar: peek after the debounce delay.
    pub fn pointer_entered(&mut self) -> Option<Scheduled> {
        if !self.hover_active() {
            return None;
        }
        self.hover_ticket = self.issue_ticket();
        Some(Scheduled {
            step: Step::Peek,
            ticket: self.hover_ticket,
            delay: self.config.peek_delay(),
        })
    }

    /// Pointer left: cancel a pending peek and collapse again immediately.
    pub fn pointer_left<D>(&mut self, document: &D) -> Result<(), PatchError>
    where
        D: HostDocument<Element = E>,
    {
        self.hover_ticket = self.issue_ticket();
        if !self.hover_active() {
            return Ok(());
        }
        if let Some(state) = self.injection.as_ref() {
            document.set_style(&state.sidebar, "width", &self.config.collapsed_width)?;
        }
        Ok(())
    }

    pub fn handle_shortcut<D>(
        &mut self,
        document: &D,
        shortcut: Shortcut,
    ) -> Result<FollowUp, PatchError>
    where
        D: HostDocument<Element = E>,
    {
        match shortcut {
            Shortcut::Reinitialize => self.reinitialize(document),
            Shortcut::Toggle => self.toggle(document).map(FollowUp::from),
            Shortcut::CloseWindow => {
                document.close_window();
                Ok(FollowUp::None)
            }
            Shortcut::ScrollToBottom => {
                self.scroll_to_bottom(document)?;
                Ok(FollowUp::None)
            }
        }
    }

    /// Activates the host's "jump to present" control, or scrolls the
    /// conversation directly when the control is not rendered.
    pub fn scroll_to_bottom<D>(&self, document: &D) -> Result<(), PatchError>
    where
        D: HostDocument<Element = E>,
    {
        let locator = Locator::new(document, &self.config.markers);
        if let Some(jump) = locator.jump_to_present() {
            document.click(&jump);
            return Ok(());
        }
        let scroller = locator.scroller()?;
        document.scroll_to_bottom(&scroller);
        Ok(())
    }

    fn build_button<D>(&self, document: &D) -> Result<E, PatchError>
    where
        D: HostDocument<Element = E>,
    {
        let button = document.create_element("div")?;
        for class in &self.config.markers.button_classes {
            document.add_class(&button, class)?;
        }
        for (name, value) in &self.config.markers.button_attributes {
            document.set_attribute(&button, name, value)?;
        }
        Ok(button)
    }

    fn render_button<D>(&self, document: &D, flag: VisibilityFlag) -> Result<(), PatchError>
    where
        D: HostDocument<Element = E>,
    {
        let Some(button) = self.button.as_ref() else {
            return Ok(());
        };
        let hidden_class = &self.config.markers.button_hidden;
        match flag {
            VisibilityFlag::Hidden => {
                document.add_class(button, hidden_class)?;
                document.set_inner_html(button, &chevron_svg(ICON_EXPAND_PATH));
            }
            VisibilityFlag::Shown => {
                document.remove_class(button, hidden_class)?;
                document.set_inner_html(button, &chevron_svg(ICON_COLLAPSE_PATH));
            }
        }
        Ok(())
    }

    /// Leaves a collapsed placeholder in the sidebar's slot and moves the
    /// sidebar into an overlay so it can expand over the conversation.
    fn detach<D>(&self, document: &D, sidebar: &E) -> Result<Detachment<E>, PatchError>
    where
        D: HostDocument<Element = E>,
    {
        let slot = document.parent(sidebar).ok_or(PatchError::MissingRegion {
            region: Region::Sidebar,
            found: 0,
        })?;
        let base = document.parent(&slot).ok_or(PatchError::MissingRegion {
            region: Region::Sidebar,
            found: 0,
        })?;

        let placeholder = document.create_element("div")?;
        document.set_style(&placeholder, "width", &self.config.collapsed_width)?;
        let overlay = document.create_element("div")?;
        document.set_style(&overlay, "position", "absolute")?;
        document.set_style(&overlay, "z-index", &self.config.overlay_z_index.to_string())?;

        document.insert_before(&slot, &placeholder, Some(sidebar))?;
        document.append_child(&overlay, sidebar)?;
        document.append_child(&base, &overlay)?;

        let hover_marker = &self.config.markers.sidebar_hover_bound;
        if !document.has_class(sidebar, hover_marker) {
            document.bind_hover(sidebar)?;
            document.add_class(sidebar, hover_marker)?;
        }

        Ok(Detachment {
            placeholder,
            overlay,
            slot,
            base,
        })
    }

    /// Reverses [`Self::detach`]. Callers verify the wrapper first.
    fn reattach<D>(
        &self,
        document: &D,
        sidebar: &E,
        detachment: &Detachment<E>,
    ) -> Result<(), PatchError>
    where
        D: HostDocument<Element = E>,
    {
        document.remove_child(&detachment.slot, &detachment.placeholder)?;
        let front = document.children(&detachment.slot).into_iter().next();
        document.insert_before(&detachment.slot, sidebar, front.as_ref())?;
        document.unbind_hover(sidebar);
        document.remove_class(sidebar, &self.config.markers.sidebar_hover_bound)?;
        document.remove_child(&detachment.base, &detachment.overlay)?;
        Ok(())
    }

    /// Drops the wrapper nodes and hover binding left around a sidebar the
    /// host has since replaced.
    fn discard_stale<D>(
        &self,
        document: &D,
        previous: &InjectionState<E>,
    ) -> Result<(), PatchError>
    where
        D: HostDocument<Element = E>,
    {
        let Some(detachment) = &previous.detachment else {
            return Ok(());
        };
        for node in [&detachment.placeholder, &detachment.overlay] {
            if let Some(parent) = document.parent(node) {
                document.remove_child(&parent, node)?;
            }
        }
        document.unbind_hover(&previous.sidebar);
        document.remove_class(&previous.sidebar, &self.config.markers.sidebar_hover_bound)?;
        tracing::debug!("discarded wrapper of a replaced sidebar");
        Ok(())
    }

    fn hover_active(&self) -> bool {
        self.injection.as_ref().is_some_and(|state| {
            state.phase == SidebarPhase::Hidden && state.detachment.is_some()
        })
    }

    fn set_phase(&mut self, phase: SidebarPhase) {
        if let Some(state) = self.injection.as_mut() {
            state.phase = phase;
        }
    }

    fn issue_ticket(&mut self) -> Ticket {
        self.last_ticket += 1;
        self.last_ticket
    }

    /// Invalidates every pending transition step and the pending restore.
    fn begin_transition(&mut self) -> Ticket {
        self.transition_ticket = self.issue_ticket();
        self.restoring = None;
        self.transition_ticket
    }
}

/// Checks that the wrapper built by a detach is still intact; the host may
/// have re-rendered around it.
fn verify_detachment<D>(
    document: &D,
    sidebar: &D::Element,
    detachment: &Detachment<D::Element>,
) -> Result<(), PatchError>
where
    D: HostDocument,
{
    let slot_children = document.children(&detachment.slot);
    if slot_children.len() != 2 || slot_children.first() != Some(&detachment.placeholder) {
        return Err(PatchError::invalid_structure(
            "detachment slot",
            format!(
                "expected placeholder followed by one pane, found {} children",
                slot_children.len()
            ),
        ));
    }
    let overlay_children = document.children(&detachment.overlay);
    if overlay_children.len() != 1 || overlay_children.first() != Some(sidebar) {
        return Err(PatchError::invalid_structure(
            "detachment overlay",
            format!(
                "expected only the sidebar, found {} children",
                overlay_children.len()
            ),
        ));
    }
    if document.parent(&detachment.overlay).as_ref() != Some(&detachment.base) {
        return Err(PatchError::invalid_structure(
            "detachment overlay",
            "overlay is no longer attached to its base",
        ));
    }
    Ok(())
}
