//! Reactive DOM patch that adds a collapsible sidebar toggle to a host chat
//! client.
//!
//! Everything here is independent of the browser: the host page is reached
//! through [`host::HostDocument`] and persistent storage through
//! [`cache::CacheBackend`]. The wasm entrypoint lives in `sidebar-patch-web`.

pub mod cache;
pub mod config;
pub mod controller;
pub mod destination;
pub mod error;
pub mod host;
pub mod markers;
pub mod shortcuts;
pub mod visibility;
pub mod watchdog;

#[cfg(any(test, feature = "testing"))]
pub mod fake_dom;

pub use cache::{CacheBackend, CacheError, SessionBackend, VisibilityCache};
pub use config::{ConfigError, PatchConfig};
pub use controller::{
    ControllerSnapshot, FollowUp, Injection, RestoreRequest, Scheduled, SidebarController,
    SidebarPhase, Step, Ticket,
};
pub use destination::{DestinationKey, resolve};
pub use error::PatchError;
pub use host::{HostDocument, Locator, ObserverSlot, Region};
pub use markers::HostMarkers;
pub use shortcuts::{KeyChord, Shortcut};
pub use visibility::VisibilityFlag;
pub use watchdog::{BootstrapTick, Watchdog, WatchdogSnapshot, WatchdogState};
