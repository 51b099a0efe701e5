#![forbid(unsafe_code)]

//! `wasm-bindgen` exports.
//!
//! [`install_language_sync`] builds one [`LanguageSync`] for the page, wires
//! every browser event it listens to, and hands back a
//! [`LanguageSyncHandle`]. Dropping the handle (or calling `dispose`)
//! removes the listeners.

use std::cell::RefCell;
use std::rc::Rc;

use langsync_core::{LanguageSync, Phase, PreferenceStore, SyncConfig};
use tracing::{debug, warn};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{
    Event, EventTarget, HtmlIFrameElement, HtmlSelectElement, MessageEvent, StorageEvent,
    VisibilityState, Window,
};

use crate::channels::{DocumentCookies, LocationUrl, WebStorage};
use crate::dom::DomPage;
use crate::js::{describe, install_panic_hook, stringify};
use crate::window::{WebWindow, same_page_frames, upstream_targets};

type SharedSync = Rc<RefCell<LanguageSync<WebWindow, DomPage>>>;

/// Run `f` against the shared instance unless an outer handler holds it.
fn with_sync<R>(
    shared: &SharedSync,
    f: impl FnOnce(&mut LanguageSync<WebWindow, DomPage>) -> R,
) -> Option<R> {
    match shared.try_borrow_mut() {
        Ok(mut sync) => Some(f(&mut sync)),
        Err(_) => {
            warn!("re-entrant event dropped");
            None
        }
    }
}

/// Read-only counterpart of [`with_sync`] for getters called from JS,
/// which may run while a DOM rewrite holds the instance.
fn peek_sync<R>(
    shared: &SharedSync,
    f: impl FnOnce(&LanguageSync<WebWindow, DomPage>) -> R,
) -> Option<R> {
    match shared.try_borrow() {
        Ok(sync) => Some(f(&sync)),
        Err(_) => {
            warn!("sync state busy; getter returned nothing");
            None
        }
    }
}

struct Listener {
    target: EventTarget,
    event: &'static str,
    callback: Closure<dyn FnMut(Event)>,
}

impl Listener {
    fn attach(
        target: EventTarget,
        event: &'static str,
        callback: Closure<dyn FnMut(Event)>,
    ) -> Result<Self, JsValue> {
        target.add_event_listener_with_callback(event, callback.as_ref().unchecked_ref())?;
        Ok(Self {
            target,
            event,
            callback,
        })
    }

    fn detach(&self) {
        let _ = self.target.remove_event_listener_with_callback(
            self.event,
            self.callback.as_ref().unchecked_ref(),
        );
    }
}

/// JS-facing handle to the page's language sync instance.
#[wasm_bindgen]
pub struct LanguageSyncHandle {
    shared: SharedSync,
    listeners: Vec<Listener>,
}

#[wasm_bindgen]
impl LanguageSyncHandle {
    /// Select a language as if the user picked it. Returns whether it was applied.
    #[wasm_bindgen(js_name = changeLanguage)]
    pub fn change_language(&self, language: &str) -> bool {
        with_sync(&self.shared, |sync| sync.change_language(language))
            .is_some_and(|d| d.applied().is_some())
    }

    /// Active language code, or `undefined` when called from inside a page
    /// rewrite.
    #[wasm_bindgen(js_name = currentLanguage)]
    pub fn current_language(&self) -> Option<String> {
        peek_sync(&self.shared, |sync| {
            sync.current_language().as_str().to_string()
        })
    }

    /// `"uninitialized"`, `"initializing"` or `"active"`; `undefined` when
    /// called from inside a page rewrite.
    pub fn phase(&self) -> Option<String> {
        peek_sync(&self.shared, |sync| {
            match sync.phase() {
                Phase::Uninitialized => "uninitialized",
                Phase::Initializing => "initializing",
                Phase::Active => "active",
            }
            .to_string()
        })
    }

    /// Track a window returned by `window.open` so it receives changes.
    #[wasm_bindgen(js_name = addWindow)]
    pub fn add_window(&self, window: JsValue) -> bool {
        let Some(window) = WebWindow::from_js(window) else {
            return false;
        };
        with_sync(&self.shared, |sync| sync.register_window(window)).is_some()
    }

    /// Track an iframe added after installation.
    #[wasm_bindgen(js_name = addFrame)]
    pub fn add_frame(&self, frame: &HtmlIFrameElement) -> bool {
        let Some(window) = WebWindow::from_iframe(frame) else {
            return false;
        };
        with_sync(&self.shared, |sync| sync.register_frame(window)).is_some()
    }

    /// Remove every browser listener. Already scheduled timers still run.
    pub fn dispose(&mut self) {
        for listener in self.listeners.drain(..) {
            listener.detach();
        }
    }
}

impl Drop for LanguageSyncHandle {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Create the page's sync instance from a JS options object and start it.
///
/// Call once the DOM is ready. `options` uses the camelCase keys of
/// [`SyncConfig`]; `trustedOrigin` is required.
#[wasm_bindgen(js_name = installLanguageSync)]
pub fn install_language_sync(options: JsValue) -> Result<LanguageSyncHandle, JsValue> {
    install_panic_hook();

    let json = stringify(&options).ok_or_else(|| JsValue::from_str("options are not JSON"))?;
    let config =
        SyncConfig::from_json(&json).map_err(|err| JsValue::from_str(&err.to_string()))?;
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;

    let store = PreferenceStore::new(&config)
        .with_storage(WebStorage::new(window.clone()))
        .with_cookies(DocumentCookies::new(window.clone()))
        .with_url(LocationUrl::new(window.clone()));
    let page = DomPage::new(window.clone(), config.selector_ids.clone());
    let source = window.location().hostname().unwrap_or_default();

    let mut sync = LanguageSync::new(config, page)
        .with_store(store)
        .with_targets(upstream_targets(&window))
        .with_source(source);
    for frame in same_page_frames(&window) {
        sync.register_frame(frame);
    }

    let locale = window.navigator().language();
    let plan = sync.start(locale.as_deref());
    let shared: SharedSync = Rc::new(RefCell::new(sync));

    let mut handle = LanguageSyncHandle {
        shared: Rc::clone(&shared),
        listeners: Vec::new(),
    };
    handle.listeners = bind_events(&window, &shared)?;

    if let Some(plan) = plan {
        debug!(language = %plan.language, source = ?plan.source, "installed");
        let delay = i32::try_from(plan.broadcast_after.as_millis()).unwrap_or(i32::MAX);
        schedule(&window, delay, {
            let shared = Rc::clone(&shared);
            let window = window.clone();
            move || {
                with_sync(&shared, |sync| sync.complete_initialization());
                schedule_reconnect(&window, &shared);
            }
        });
    }
    Ok(handle)
}

fn bind_events(window: &Window, shared: &SharedSync) -> Result<Vec<Listener>, JsValue> {
    let mut listeners = Vec::new();
    let window_target: EventTarget = window.clone().into();

    let on_message = {
        let shared = Rc::clone(shared);
        Closure::<dyn FnMut(Event)>::new(move |event: Event| {
            let Ok(event) = event.dyn_into::<MessageEvent>() else {
                return;
            };
            let origin = event.origin();
            let Some(payload) = stringify(&event.data()) else {
                return;
            };
            let reply_to = event.source().and_then(|src| WebWindow::from_js(src.into()));
            with_sync(&shared, |sync| sync.handle_raw_message(&origin, reply_to, &payload));
        })
    };
    listeners.push(Listener::attach(window_target.clone(), "message", on_message)?);

    let on_storage = {
        let shared = Rc::clone(shared);
        Closure::<dyn FnMut(Event)>::new(move |event: Event| {
            let Ok(event) = event.dyn_into::<StorageEvent>() else {
                return;
            };
            let key = event.key();
            let value = event.new_value();
            with_sync(&shared, |sync| {
                sync.handle_storage_event(key.as_deref(), value.as_deref())
            });
        })
    };
    listeners.push(Listener::attach(window_target.clone(), "storage", on_storage)?);

    let on_focus = {
        let shared = Rc::clone(shared);
        Closure::<dyn FnMut(Event)>::new(move |_event: Event| {
            with_sync(&shared, |sync| sync.on_focus());
        })
    };
    listeners.push(Listener::attach(window_target, "focus", on_focus)?);

    if let Some(document) = window.document() {
        let on_visibility = {
            let shared = Rc::clone(shared);
            let document = document.clone();
            Closure::<dyn FnMut(Event)>::new(move |_event: Event| {
                if document.visibility_state() == VisibilityState::Visible {
                    with_sync(&shared, |sync| sync.on_focus());
                }
            })
        };
        listeners.push(Listener::attach(
            document.into(),
            "visibilitychange",
            on_visibility,
        )?);
    }

    let selectors = peek_sync(shared, |sync| sync.page().selectors()).unwrap_or_default();
    for select in selectors {
        let on_change = {
            let shared = Rc::clone(shared);
            Closure::<dyn FnMut(Event)>::new(move |event: Event| {
                let Some(select) = event
                    .target()
                    .and_then(|t| t.dyn_into::<HtmlSelectElement>().ok())
                else {
                    return;
                };
                let value = select.value();
                let disposition = with_sync(&shared, |sync| sync.change_language(&value));
                debug!(?disposition, "selector changed");
            })
        };
        listeners.push(Listener::attach(select.into(), "change", on_change)?);
    }

    Ok(listeners)
}

fn schedule(window: &Window, delay_ms: i32, f: impl FnOnce() + 'static) {
    let callback = Closure::once_into_js(f);
    if let Err(err) = window
        .set_timeout_with_callback_and_timeout_and_arguments_0(callback.unchecked_ref(), delay_ms)
    {
        warn!(error = %describe(&err), "setTimeout failed");
    }
}

fn schedule_reconnect(window: &Window, shared: &SharedSync) {
    let Some(delay) = peek_sync(shared, |sync| sync.reconnect_delay()).flatten() else {
        return;
    };
    let delay = i32::try_from(delay.as_millis()).unwrap_or(i32::MAX);
    let next_window = window.clone();
    let shared = Rc::clone(shared);
    schedule(window, delay, move || {
        let sent = with_sync(&shared, |sync| sync.on_reconnect_tick()).flatten();
        if sent.is_some() {
            schedule_reconnect(&next_window, &shared);
        }
    });
}
