#[cfg(any(target_arch = "wasm32", test))]
mod console_lines;

#[cfg(target_arch = "wasm32")]
mod wasm {
    use std::cell::RefCell;
    use std::collections::HashMap;

    use gloo_timers::future::sleep;
    use serde::Serialize;
    use sidebar_patch_core::{
        BootstrapTick, ControllerSnapshot, FollowUp, HostDocument, KeyChord, ObserverSlot,
        PatchError, RestoreRequest, Scheduled, Shortcut, SidebarController, VisibilityCache,
        Watchdog, WatchdogSnapshot, resolve,
    };
    use wasm_bindgen::JsCast;
    use wasm_bindgen::prelude::*;
    use wasm_bindgen_futures::{JsFuture, spawn_local};
    use web_sys::Element;

    mod cache;
    mod dom;
    mod lifecycle;
    mod logging;

    use cache::PageCache;
    use dom::{HoverHandlers, RegionObserver, WebDocument};
    use lifecycle::*;

    thread_local! {
        static PATCH: RefCell<Option<PatchRuntime>> = const { RefCell::new(None) };
        static BUTTON_CLICK_HANDLER: RefCell<Option<Closure<dyn FnMut(web_sys::Event)>>> = const { RefCell::new(None) };
        static GLOBAL_SHORTCUT_HANDLER: RefCell<Option<Closure<dyn FnMut(web_sys::KeyboardEvent)>>> = const { RefCell::new(None) };
        static SIDEBAR_HOVER_HANDLERS: RefCell<Option<HoverHandlers>> = const { RefCell::new(None) };
        static REGION_OBSERVERS: RefCell<HashMap<ObserverSlot, RegionObserver>> = RefCell::new(HashMap::new());
    }

    struct PatchRuntime {
        document: WebDocument,
        controller: SidebarController<Element, PageCache>,
        watchdog: Watchdog<Element>,
    }

    #[derive(Debug, Serialize)]
    struct PatchStateSnapshot {
        pathname: String,
        destination: Option<String>,
        controller: ControllerSnapshot,
        watchdog: WatchdogSnapshot,
    }

    #[wasm_bindgen(start)]
    pub fn start() {
        console_error_panic_hook::set_once();
        logging::install();
        spawn_local(async {
            if let Err(error) = boot().await {
                tracing::error!(%error, "sidebar patch failed to start");
            }
        });
    }

    #[wasm_bindgen]
    pub fn sidebar_patch_state_json() -> String {
        with_runtime(|runtime| {
            let pathname = runtime.document.pathname();
            let snapshot = PatchStateSnapshot {
                destination: resolve(&pathname).map(|key| key.to_string()),
                pathname,
                controller: runtime.controller.snapshot(),
                watchdog: runtime.watchdog.snapshot(),
            };
            serde_json::to_string(&snapshot).ok()
        })
        .flatten()
        .unwrap_or_else(|| "{}".to_string())
    }

    /// Forgets the persisted visibility of every destination.
    #[wasm_bindgen]
    pub fn clear_visibility_cache() {
        with_runtime(|runtime| runtime.controller.cache().clear_all());
    }

    #[wasm_bindgen]
    pub fn reinitialize_sidebar_patch() {
        run_shortcut(Shortcut::Reinitialize);
    }

    #[wasm_bindgen]
    pub fn toggle_sidebar() {
        run_shortcut(Shortcut::Toggle);
    }

    async fn boot() -> Result<(), PatchError> {
        let document = WebDocument::current()?;
        let config = load_config();
        request_persistence().await;
        let cache = open_cache(&config.cache_name).await;

        let interval = config.bootstrap_interval();
        let watchdog = Watchdog::new(&config);
        let controller = SidebarController::new(config, VisibilityCache::new(cache));
        // Bound before the first injection so the reinitialize shortcut works
        // even if the bootstrap budget runs out.
        document.bind_keyboard()?;
        PATCH.with(|slot| {
            *slot.borrow_mut() = Some(PatchRuntime {
                document,
                controller,
                watchdog,
            });
        });

        loop {
            sleep(interval).await;
            let Some(tick) = with_runtime(|runtime| {
                runtime
                    .watchdog
                    .bootstrap_tick(&mut runtime.controller, &runtime.document)
            }) else {
                continue;
            };
            match tick {
                Ok(BootstrapTick::Armed(follow_up)) => {
                    dispatch(Ok(follow_up));
                    return Ok(());
                }
                Ok(BootstrapTick::Pending) => {}
                Ok(BootstrapTick::Exhausted) => return Ok(()),
                Err(error) => report(&error),
            }
        }
    }

    fn with_runtime<R>(f: impl FnOnce(&mut PatchRuntime) -> R) -> Option<R> {
        PATCH.with(|slot| {
            let Ok(mut runtime) = slot.try_borrow_mut() else {
                tracing::debug!("sidebar patch busy; event dropped");
                return None;
            };
            runtime.as_mut().map(f)
        })
    }

    fn report(error: &PatchError) {
        if error.is_transient() {
            tracing::debug!(%error, "host layout not ready");
        } else {
            tracing::warn!(%error, "sidebar patch operation failed");
        }
    }

    fn dispatch(result: Result<FollowUp, PatchError>) {
        match result {
            Ok(FollowUp::None) => {}
            Ok(FollowUp::Schedule(step)) => schedule(step),
            Ok(FollowUp::Restore(request)) => request_restore(request),
            Err(error) => report(&error),
        }
    }

    fn schedule(step: Scheduled) {
        spawn_local(async move {
            sleep(step.delay).await;
            let result =
                with_runtime(|runtime| runtime.controller.run_step(&runtime.document, step));
            if let Some(Err(error)) = result {
                report(&error);
            }
        });
    }

    fn request_restore(request: RestoreRequest) {
        let Some(cache) = with_runtime(|runtime| runtime.controller.cache().clone()) else {
            return;
        };
        spawn_local(async move {
            let flag = cache.get(&request.path).await;
            let result = with_runtime(|runtime| {
                runtime
                    .controller
                    .apply_restored(&runtime.document, request.ticket, flag)
                    .map(FollowUp::from)
            });
            if let Some(result) = result {
                dispatch(result);
            }
        });
    }

    fn run_shortcut(shortcut: Shortcut) {
        let result = with_runtime(|runtime| {
            let result = runtime
                .controller
                .handle_shortcut(&runtime.document, shortcut);
            if shortcut == Shortcut::Reinitialize {
                if let Err(error) = runtime.watchdog.resume(&runtime.controller, &runtime.document)
                {
                    report(&error);
                }
            }
            result
        });
        if let Some(result) = result {
            dispatch(result);
        }
    }

    fn handle_button_click() {
        run_shortcut(Shortcut::Toggle);
    }

    fn handle_keydown(event: web_sys::KeyboardEvent) {
        let key = event.key();
        let chord = KeyChord {
            key: &key,
            ctrl: event.ctrl_key(),
            alt: event.alt_key(),
        };
        if let Some(shortcut) = Shortcut::from_chord(chord) {
            run_shortcut(shortcut);
        }
    }

    fn handle_pointer_enter() {
        if let Some(Some(step)) = with_runtime(|runtime| runtime.controller.pointer_entered()) {
            schedule(step);
        }
    }

    fn handle_pointer_leave() {
        let result = with_runtime(|runtime| runtime.controller.pointer_left(&runtime.document));
        if let Some(Err(error)) = result {
            report(&error);
        }
    }

    fn handle_mutation(slot: ObserverSlot) {
        let result = with_runtime(|runtime| {
            runtime
                .watchdog
                .on_mutation(slot, &mut runtime.controller, &runtime.document)
        });
        if let Some(result) = result {
            dispatch(result);
        }
    }

    fn js_error(context: &str, error: JsValue) -> PatchError {
        let detail = error
            .as_string()
            .or_else(|| {
                error
                    .dyn_ref::<js_sys::Error>()
                    .and_then(|error| error.message().as_string())
            })
            .unwrap_or_else(|| format!("{error:?}"));
        PatchError::Host(format!("{context}: {detail}"))
    }
}
