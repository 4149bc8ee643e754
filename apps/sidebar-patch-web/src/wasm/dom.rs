use super::*;

use web_sys::{HtmlElement, MutationObserver, MutationObserverInit, ScrollBehavior, ScrollToOptions};

/// Listeners attached to the sidebar while it is detached. Created once and
/// re-attached on every hide, so removal always finds the same function.
pub(super) struct HoverHandlers {
    enter: Closure<dyn FnMut(web_sys::Event)>,
    leave: Closure<dyn FnMut(web_sys::Event)>,
}

pub(super) struct RegionObserver {
    observer: MutationObserver,
    _callback: Closure<dyn FnMut(js_sys::Array, MutationObserver)>,
}

#[derive(Debug, Clone)]
pub(super) struct WebDocument {
    window: web_sys::Window,
    document: web_sys::Document,
}

impl WebDocument {
    pub(super) fn current() -> Result<Self, PatchError> {
        let window =
            web_sys::window().ok_or_else(|| PatchError::Host("window is unavailable".to_string()))?;
        let document = window
            .document()
            .ok_or_else(|| PatchError::Host("document is unavailable".to_string()))?;
        Ok(Self { window, document })
    }
}

fn html_element<'a>(element: &'a Element, context: &str) -> Result<&'a HtmlElement, PatchError> {
    element
        .dyn_ref::<HtmlElement>()
        .ok_or_else(|| PatchError::Host(format!("{context}: element is not an HtmlElement")))
}

fn collect(collection: &web_sys::HtmlCollection) -> Vec<Element> {
    (0..collection.length())
        .filter_map(|index| collection.item(index))
        .collect()
}

impl HostDocument for WebDocument {
    type Element = Element;

    fn pathname(&self) -> String {
        self.window.location().pathname().unwrap_or_default()
    }

    fn elements_by_class(&self, class: &str) -> Vec<Element> {
        collect(&self.document.get_elements_by_class_name(class))
    }

    fn create_element(&self, tag: &str) -> Result<Element, PatchError> {
        self.document
            .create_element(tag)
            .map_err(|error| js_error("create element", error))
    }

    fn parent(&self, element: &Element) -> Option<Element> {
        element.parent_element()
    }

    fn children(&self, element: &Element) -> Vec<Element> {
        collect(&element.children())
    }

    fn append_child(&self, parent: &Element, child: &Element) -> Result<(), PatchError> {
        parent
            .append_child(child)
            .map(|_| ())
            .map_err(|error| js_error("append child", error))
    }

    fn insert_before(
        &self,
        parent: &Element,
        child: &Element,
        reference: Option<&Element>,
    ) -> Result<(), PatchError> {
        let reference: Option<&web_sys::Node> = reference.map(|element| element.as_ref());
        parent
            .insert_before(child, reference)
            .map(|_| ())
            .map_err(|error| js_error("insert before", error))
    }

    fn remove_child(&self, parent: &Element, child: &Element) -> Result<(), PatchError> {
        parent
            .remove_child(child)
            .map(|_| ())
            .map_err(|error| js_error("remove child", error))
    }

    fn has_class(&self, element: &Element, class: &str) -> bool {
        element.class_list().contains(class)
    }

    fn add_class(&self, element: &Element, class: &str) -> Result<(), PatchError> {
        element
            .class_list()
            .add_1(class)
            .map_err(|error| js_error("add class", error))
    }

    fn remove_class(&self, element: &Element, class: &str) -> Result<(), PatchError> {
        element
            .class_list()
            .remove_1(class)
            .map_err(|error| js_error("remove class", error))
    }

    fn set_attribute(&self, element: &Element, name: &str, value: &str) -> Result<(), PatchError> {
        element
            .set_attribute(name, value)
            .map_err(|error| js_error("set attribute", error))
    }

    fn set_inner_html(&self, element: &Element, html: &str) {
        element.set_inner_html(html);
    }

    fn set_style(&self, element: &Element, property: &str, value: &str) -> Result<(), PatchError> {
        let style = html_element(element, "set style")?.style();
        if value.is_empty() {
            style
                .remove_property(property)
                .map(|_| ())
                .map_err(|error| js_error("remove style", error))
        } else {
            style
                .set_property(property, value)
                .map_err(|error| js_error("set style", error))
        }
    }

    fn first_child_text(&self, element: &Element) -> Option<String> {
        element.first_child().and_then(|child| child.text_content())
    }

    fn click(&self, element: &Element) {
        if let Some(element) = element.dyn_ref::<HtmlElement>() {
            element.click();
        }
    }

    fn scroll_to_bottom(&self, element: &Element) {
        let options = ScrollToOptions::new();
        options.set_top(f64::from(element.scroll_height()));
        options.set_behavior(ScrollBehavior::Smooth);
        element.scroll_to_with_scroll_to_options(&options);
    }

    fn close_window(&self) {
        if let Err(error) = self.window.close() {
            tracing::warn!(error = %js_error("close window", error), "window refused to close");
        }
    }

    fn bind_click(&self, button: &Element) -> Result<(), PatchError> {
        BUTTON_CLICK_HANDLER.with(|slot| {
            let mut slot = slot.borrow_mut();
            let callback = slot.get_or_insert_with(|| {
                Closure::<dyn FnMut(web_sys::Event)>::wrap(Box::new(move |_event| {
                    handle_button_click();
                }))
            });
            button
                .add_event_listener_with_callback("click", callback.as_ref().unchecked_ref())
                .map_err(|error| js_error("bind click", error))
        })
    }

    fn bind_hover(&self, sidebar: &Element) -> Result<(), PatchError> {
        SIDEBAR_HOVER_HANDLERS.with(|slot| {
            let mut slot = slot.borrow_mut();
            let handlers = slot.get_or_insert_with(|| HoverHandlers {
                enter: Closure::<dyn FnMut(web_sys::Event)>::wrap(Box::new(move |_event| {
                    handle_pointer_enter();
                })),
                leave: Closure::<dyn FnMut(web_sys::Event)>::wrap(Box::new(move |_event| {
                    handle_pointer_leave();
                })),
            });
            sidebar
                .add_event_listener_with_callback("mouseenter", handlers.enter.as_ref().unchecked_ref())
                .map_err(|error| js_error("bind mouseenter", error))?;
            sidebar
                .add_event_listener_with_callback("mouseleave", handlers.leave.as_ref().unchecked_ref())
                .map_err(|error| js_error("bind mouseleave", error))
        })
    }

    fn unbind_hover(&self, sidebar: &Element) {
        SIDEBAR_HOVER_HANDLERS.with(|slot| {
            let slot = slot.borrow();
            let Some(handlers) = slot.as_ref() else {
                return;
            };
            let _ = sidebar.remove_event_listener_with_callback(
                "mouseenter",
                handlers.enter.as_ref().unchecked_ref(),
            );
            let _ = sidebar.remove_event_listener_with_callback(
                "mouseleave",
                handlers.leave.as_ref().unchecked_ref(),
            );
        });
    }

    fn bind_keyboard(&self) -> Result<(), PatchError> {
        GLOBAL_SHORTCUT_HANDLER.with(|slot| {
            if slot.borrow().is_some() {
                return Ok(());
            }
            let callback = Closure::<dyn FnMut(web_sys::KeyboardEvent)>::wrap(Box::new(
                move |event: web_sys::KeyboardEvent| {
                    handle_keydown(event);
                },
            ));
            self.document
                .add_event_listener_with_callback("keydown", callback.as_ref().unchecked_ref())
                .map_err(|error| js_error("bind keydown", error))?;
            *slot.borrow_mut() = Some(callback);
            Ok(())
        })
    }

    fn observe_children(&self, slot: ObserverSlot, target: &Element) -> Result<(), PatchError> {
        self.disconnect(slot);
        let callback = Closure::<dyn FnMut(js_sys::Array, MutationObserver)>::wrap(Box::new(
            move |_records: js_sys::Array, _observer: MutationObserver| {
                handle_mutation(slot);
            },
        ));
        let observer = MutationObserver::new(callback.as_ref().unchecked_ref())
            .map_err(|error| js_error("create mutation observer", error))?;
        let options = MutationObserverInit::new();
        options.set_child_list(true);
        observer
            .observe_with_options(target, &options)
            .map_err(|error| js_error("observe region", error))?;
        REGION_OBSERVERS.with(|observers| {
            observers.borrow_mut().insert(
                slot,
                RegionObserver {
                    observer,
                    _callback: callback,
                },
            );
        });
        tracing::debug!(slot = ?slot, "region observer armed");
        Ok(())
    }

    fn disconnect(&self, slot: ObserverSlot) {
        let previous = REGION_OBSERVERS.with(|observers| observers.borrow_mut().remove(&slot));
        if let Some(previous) = previous {
            previous.observer.disconnect();
        }
    }
}
