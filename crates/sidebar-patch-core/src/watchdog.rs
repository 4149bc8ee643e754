//! Keeps the toggle button alive across host re-renders.
//!
//! The host router replaces whole regions on navigation. Three child-list
//! observers catch that: the sidebar observer fires on server switches and
//! re-targets the other two, the content and conversation observers fire on
//! channel switches. Every fire funnels into
//! [`SidebarController::ensure_injected`], which is idempotent.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::cache::CacheBackend;
use crate::config::PatchConfig;
use crate::controller::{FollowUp, SidebarController};
use crate::error::PatchError;
use crate::host::{HostDocument, Locator, ObserverSlot};
use crate::markers::HostMarkers;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchdogState {
    Unarmed,
    Watching,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapTick {
    /// Injection succeeded and the observers are armed; stop polling.
    Armed(FollowUp),
    /// Host layout not recognized yet; poll again.
    Pending,
    /// Attempt budget spent without ever injecting.
    Exhausted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WatchdogSnapshot {
    pub state: WatchdogState,
    pub attempts: u32,
    pub max_attempts: u32,
    pub armed: Vec<ObserverSlot>,
}

#[derive(Debug)]
pub struct Watchdog<E> {
    state: WatchdogState,
    attempts: u32,
    max_attempts: u32,
    exhaustion_logged: bool,
    targets: BTreeMap<ObserverSlot, E>,
}

impl<E> Watchdog<E>
where
    E: Clone + PartialEq + fmt::Debug,
{
    pub fn new(config: &PatchConfig) -> Self {
        Self {
            state: WatchdogState::Unarmed,
            attempts: 0,
            max_attempts: config.bootstrap_max_attempts,
            exhaustion_logged: false,
            targets: BTreeMap::new(),
        }
    }

    pub fn state(&self) -> WatchdogState {
        self.state
    }

    /// Element currently observed for `slot`.
    pub fn target(&self, slot: ObserverSlot) -> Option<&E> {
        self.targets.get(&slot)
    }

    #[must_use]
    pub fn snapshot(&self) -> WatchdogSnapshot {
        WatchdogSnapshot {
            state: self.state,
            attempts: self.attempts,
            max_attempts: self.max_attempts,
            armed: self.targets.keys().copied().collect(),
        }
    }

    /// One iteration of the page-load retry loop.
    pub fn bootstrap_tick<B, D>(
        &mut self,
        controller: &mut SidebarController<E, B>,
        document: &D,
    ) -> Result<BootstrapTick, PatchError>
    where
        B: CacheBackend,
        D: HostDocument<Element = E>,
    {
        if self.state == WatchdogState::Watching {
            return Ok(BootstrapTick::Armed(FollowUp::None));
        }
        if self.attempts >= self.max_attempts {
            self.log_exhaustion();
            return Ok(BootstrapTick::Exhausted);
        }
        self.attempts += 1;

        let injection = controller.ensure_injected(document)?;
        if !injection.is_live() {
            if self.attempts >= self.max_attempts {
                self.log_exhaustion();
                return Ok(BootstrapTick::Exhausted);
            }
            return Ok(BootstrapTick::Pending);
        }

        self.state = WatchdogState::Watching;
        self.arm(document, &controller.config().markers, &ObserverSlot::ALL)?;
        tracing::info!(attempts = self.attempts, "sidebar patch armed");
        Ok(BootstrapTick::Armed(injection.into_follow_up()))
    }

    /// Starts watching after an injection that did not come from the
    /// bootstrap loop, e.g. the reinitialize shortcut after the budget ran out.
    pub fn resume<B, D>(
        &mut self,
        controller: &SidebarController<E, B>,
        document: &D,
    ) -> Result<bool, PatchError>
    where
        B: CacheBackend,
        D: HostDocument<Element = E>,
    {
        if self.state == WatchdogState::Watching || controller.phase().is_none() {
            return Ok(false);
        }
        self.state = WatchdogState::Watching;
        self.arm(document, &controller.config().markers, &ObserverSlot::ALL)?;
        tracing::info!("sidebar patch armed after manual injection");
        Ok(true)
    }

    /// Points each slot's observer at the slot's current region. A region that
    /// cannot be located leaves its slot disconnected until the next re-arm.
    pub fn arm<D>(
        &mut self,
        document: &D,
        markers: &HostMarkers,
        slots: &[ObserverSlot],
    ) -> Result<(), PatchError>
    where
        D: HostDocument<Element = E>,
    {
        let locator = Locator::new(document, markers);
        for slot in slots {
            match locator.observed_region(*slot) {
                Ok(target) => {
                    document.observe_children(*slot, &target)?;
                    self.targets.insert(*slot, target);
                }
                Err(error) => {
                    document.disconnect(*slot);
                    self.targets.remove(slot);
                    tracing::debug!(slot = ?slot, %error, "observer left unarmed");
                }
            }
        }
        Ok(())
    }

    /// Child-list change observed in `slot`.
    pub fn on_mutation<B, D>(
        &mut self,
        slot: ObserverSlot,
        controller: &mut SidebarController<E, B>,
        document: &D,
    ) -> Result<FollowUp, PatchError>
    where
        B: CacheBackend,
        D: HostDocument<Element = E>,
    {
        if self.state == WatchdogState::Unarmed {
            return Ok(FollowUp::None);
        }
        let injection = controller.ensure_injected(document);
        // Re-target before reporting a failed injection so the observers do
        // not stay on regions the host already dropped.
        if slot == ObserverSlot::Sidebar {
            self.arm(
                document,
                &controller.config().markers,
                &[ObserverSlot::Content, ObserverSlot::Conversation],
            )?;
        }
        Ok(injection?.into_follow_up())
    }

    fn log_exhaustion(&mut self) {
        if !self.exhaustion_logged {
            self.exhaustion_logged = true;
            tracing::warn!(
                attempts = self.attempts,
                "host layout never recognized; use the reinitialize shortcut to retry"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{SessionBackend, VisibilityCache};
    use crate::controller::SidebarPhase;
    use crate::fake_dom::{ChatLayout, FakeDocument, NodeId};

    const PATH: &str = "/channels/123/456";

    type Controller = SidebarController<NodeId, SessionBackend>;

    fn controller(config: PatchConfig) -> Controller {
        SidebarController::new(config, VisibilityCache::new(SessionBackend::new()))
    }

    fn armed() -> (FakeDocument, ChatLayout, Controller, Watchdog<NodeId>) {
        let config = PatchConfig::default();
        let (document, layout) = FakeDocument::chat_layout(PATH, &config.markers);
        let mut watchdog = Watchdog::new(&config);
        let mut controller = controller(config);
        let tick = watchdog
            .bootstrap_tick(&mut controller, &document)
            .expect("tick");
        let BootstrapTick::Armed(FollowUp::Restore(request)) = tick else {
            panic!("expected armed with restore, got {tick:?}");
        };
        controller
            .apply_restored(&document, request.ticket, None)
            .expect("restore");
        (document, layout, controller, watchdog)
    }

    fn button_parent(document: &FakeDocument, controller: &Controller) -> Option<NodeId> {
        let class = &controller.config().markers.button_classes[0];
        let buttons = document.elements_by_class(class);
        assert_eq!(buttons.len(), 1, "exactly one toggle button");
        document.parent_of(buttons[0])
    }

    #[test]
    fn bootstrap_polls_until_layout_appears() {
        let config = PatchConfig::default();
        let (document, layout) = FakeDocument::chat_layout(PATH, &config.markers);
        document.detach(layout.conversation);
        let mut watchdog = Watchdog::new(&config);
        let mut controller = controller(config);

        assert_eq!(
            watchdog.bootstrap_tick(&mut controller, &document),
            Ok(BootstrapTick::Pending)
        );
        assert_eq!(watchdog.state(), WatchdogState::Unarmed);
        assert_eq!(document.observe_calls(), 0);

        document.append(layout.content, layout.conversation);
        let tick = watchdog
            .bootstrap_tick(&mut controller, &document)
            .expect("tick");
        assert!(matches!(tick, BootstrapTick::Armed(FollowUp::Restore(_))));
        assert_eq!(watchdog.state(), WatchdogState::Watching);
        assert_eq!(document.observed(ObserverSlot::Sidebar), Some(layout.sidebar));
        assert_eq!(document.observed(ObserverSlot::Content), Some(layout.content));
        assert_eq!(
            document.observed(ObserverSlot::Conversation),
            Some(layout.conversation)
        );
        assert_eq!(watchdog.snapshot().attempts, 2);
    }

    #[test]
    fn bootstrap_gives_up_after_budget() {
        let config = PatchConfig {
            bootstrap_max_attempts: 2,
            ..PatchConfig::default()
        };
        let document = FakeDocument::new(PATH);
        let mut watchdog = Watchdog::new(&config);
        let mut controller = controller(config);

        assert_eq!(
            watchdog.bootstrap_tick(&mut controller, &document),
            Ok(BootstrapTick::Pending)
        );
        assert_eq!(
            watchdog.bootstrap_tick(&mut controller, &document),
            Ok(BootstrapTick::Exhausted)
        );
        assert_eq!(
            watchdog.bootstrap_tick(&mut controller, &document),
            Ok(BootstrapTick::Exhausted)
        );
        let snapshot = watchdog.snapshot();
        assert_eq!(snapshot.state, WatchdogState::Unarmed);
        assert_eq!(snapshot.attempts, 2);
        assert!(snapshot.armed.is_empty());
    }

    #[test]
    fn manual_injection_resumes_watching() {
        let config = PatchConfig {
            bootstrap_max_attempts: 1,
            ..PatchConfig::default()
        };
        let (document, layout) = FakeDocument::chat_layout(PATH, &config.markers);
        document.detach(layout.sidebar);
        let mut watchdog = Watchdog::new(&config);
        let mut controller = controller(config);

        assert_eq!(
            watchdog.bootstrap_tick(&mut controller, &document),
            Ok(BootstrapTick::Exhausted)
        );
        assert_eq!(watchdog.resume(&controller, &document), Ok(false));

        document.append(layout.slot, layout.sidebar);
        controller.reinitialize(&document).expect("reinitialize");
        assert_eq!(watchdog.resume(&controller, &document), Ok(true));
        assert_eq!(watchdog.state(), WatchdogState::Watching);
        assert_eq!(document.observed(ObserverSlot::Sidebar), Some(layout.sidebar));
    }

    #[test]
    fn mutations_are_ignored_until_armed() {
        let config = PatchConfig::default();
        let (document, _layout) = FakeDocument::chat_layout(PATH, &config.markers);
        let mut watchdog = Watchdog::new(&config);
        let mut controller = controller(config);

        assert_eq!(
            watchdog.on_mutation(ObserverSlot::Content, &mut controller, &document),
            Ok(FollowUp::None)
        );
        assert_eq!(controller.phase(), None);
    }

    #[test]
    fn server_switch_reinjects_and_retargets_observers() {
        let (document, layout, mut controller, mut watchdog) = armed();
        let markers = controller.config().markers.clone();

        let channels = document.element("ul", &[]);
        document.detach(layout.channel_list);
        document.append(layout.sidebar, channels);
        document.detach(layout.content);
        let (content, conversation, banner, _) = document.content_region(&markers);
        document.append(layout.slot, content);
        document.set_pathname("/channels/999/1");

        let follow_up = watchdog
            .on_mutation(ObserverSlot::Sidebar, &mut controller, &document)
            .expect("mutation");

        assert!(matches!(follow_up, FollowUp::Restore(_)));
        assert_eq!(button_parent(&document, &controller), Some(banner));
        assert_eq!(document.observed(ObserverSlot::Content), Some(content));
        assert_eq!(document.observed(ObserverSlot::Conversation), Some(conversation));
        assert_eq!(watchdog.target(ObserverSlot::Content), Some(&content));
        assert_eq!(document.observed(ObserverSlot::Sidebar), Some(layout.sidebar));
    }

    #[test]
    fn server_switch_while_detached_reattaches_sidebar() {
        let (document, layout, mut controller, mut watchdog) = armed();
        let markers = controller.config().markers.clone();
        let Some(detach) = controller.toggle(&document).expect("hide") else {
            panic!("hide schedules a detach");
        };
        assert!(controller.run_step(&document, detach).expect("detach"));
        assert!(controller.is_detached());

        let channels = document.element("ul", &[]);
        document.detach(layout.channel_list);
        document.append(layout.sidebar, channels);
        document.detach(layout.content);
        let (content, _, banner, _) = document.content_region(&markers);
        document.append(layout.slot, content);
        document.set_pathname("/channels/999/1");

        let follow_up = watchdog
            .on_mutation(ObserverSlot::Sidebar, &mut controller, &document)
            .expect("mutation");
        let FollowUp::Restore(request) = follow_up else {
            panic!("expected restore, got {follow_up:?}");
        };
        assert_eq!(button_parent(&document, &controller), Some(banner));

        let Some(settle) = controller
            .apply_restored(&document, request.ticket, None)
            .expect("restore")
        else {
            panic!("reattaching schedules a settle");
        };
        assert!(controller.run_step(&document, settle).expect("settle"));

        assert_eq!(controller.phase(), Some(SidebarPhase::Shown));
        assert!(!controller.is_detached());
        assert_eq!(document.children_of(layout.slot), vec![layout.sidebar, content]);
        assert_eq!(document.children_of(layout.base), vec![layout.slot]);
        assert!(!document.hover_bound(layout.sidebar));
        assert_eq!(controller.cache().backend().entry("/999").as_deref(), Some("0"));
        assert_eq!(controller.cache().backend().entry("/123").as_deref(), Some("1"));
    }

    #[test]
    fn failed_reinjection_still_retargets_observers() {
        let (document, layout, mut controller, mut watchdog) = armed();
        let markers = controller.config().markers.clone();

        document.detach(layout.content);
        let (content, conversation, _, _) = document.content_region(&markers);
        document.append(layout.slot, content);
        document.reject_tree_moves(true);

        let result = watchdog.on_mutation(ObserverSlot::Sidebar, &mut controller, &document);

        assert!(matches!(result, Err(PatchError::Host(_))));
        assert_eq!(document.observed(ObserverSlot::Content), Some(content));
        assert_eq!(document.observed(ObserverSlot::Conversation), Some(conversation));
        assert_eq!(watchdog.target(ObserverSlot::Conversation), Some(&conversation));
    }

    #[test]
    fn channel_switch_reinjects_without_rearming() {
        let (document, layout, mut controller, mut watchdog) = armed();
        let markers = controller.config().markers.clone();
        let observe_calls = document.observe_calls();

        document.detach(layout.conversation);
        let (_, conversation, banner, _) = document.content_region(&markers);
        document.append(layout.content, conversation);

        let follow_up = watchdog
            .on_mutation(ObserverSlot::Content, &mut controller, &document)
            .expect("mutation");

        assert!(matches!(follow_up, FollowUp::Restore(_)));
        assert_eq!(button_parent(&document, &controller), Some(banner));
        assert_eq!(document.observe_calls(), observe_calls);
        assert_eq!(
            document.observed(ObserverSlot::Conversation),
            Some(layout.conversation)
        );
    }

    #[test]
    fn unrelated_mutation_is_a_no_op() {
        let (document, layout, mut controller, mut watchdog) = armed();
        let node_count = document.node_count();

        let follow_up = watchdog
            .on_mutation(ObserverSlot::Conversation, &mut controller, &document)
            .expect("mutation");

        assert_eq!(follow_up, FollowUp::None);
        assert_eq!(document.node_count(), node_count);
        assert_eq!(button_parent(&document, &controller), Some(layout.banner));
        assert_eq!(controller.phase(), Some(SidebarPhase::Shown));
    }

    #[test]
    fn missing_region_leaves_slot_disconnected() {
        let (document, layout, mut controller, mut watchdog) = armed();
        document.detach(layout.content);

        let follow_up = watchdog
            .on_mutation(ObserverSlot::Sidebar, &mut controller, &document)
            .expect("mutation is not fatal");

        assert_eq!(follow_up, FollowUp::None);
        assert_eq!(document.observed(ObserverSlot::Content), None);
        assert_eq!(document.observed(ObserverSlot::Conversation), None);
        assert_eq!(watchdog.snapshot().armed, vec![ObserverSlot::Sidebar]);
        assert_eq!(watchdog.state(), WatchdogState::Watching);
    }
}
