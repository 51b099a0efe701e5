#![forbid(unsafe_code)]

use langsync_core::{DeliveryError, SyncMessage, TargetRegistry, WindowHandle};
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{HtmlIFrameElement, Window};

use crate::js::describe;

/// Handle to another browsing context.
///
/// Cross-origin contexts are `WindowProxy` objects that fail `instanceof
/// Window`, so handles are wrapped unchecked; every call is allowed to throw.
#[derive(Debug, Clone)]
pub struct WebWindow {
    window: Window,
}

impl WebWindow {
    pub fn new(window: Window) -> Self {
        Self { window }
    }

    /// Wrap any JS value that should be a window (`window.open` result,
    /// `MessageEvent.source`). `null`/`undefined` yield `None`.
    pub fn from_js(value: JsValue) -> Option<Self> {
        if value.is_null() || value.is_undefined() {
            return None;
        }
        Some(Self::new(value.unchecked_into()))
    }

    /// Content window of a same-page iframe, once it has one.
    pub fn from_iframe(frame: &HtmlIFrameElement) -> Option<Self> {
        frame.content_window().map(Self::new)
    }
}

impl WindowHandle for WebWindow {
    fn is_closed(&self) -> bool {
        // A throwing getter means the context is gone or unreachable.
        self.window.closed().unwrap_or(true)
    }

    fn post(&self, message: &SyncMessage, target_origin: &str) -> Result<(), DeliveryError> {
        let payload = js_sys::JSON::parse(&message.to_json())
            .map_err(|err| DeliveryError::Rejected(describe(&err)))?;
        self.window
            .post_message(&payload, target_origin)
            .map_err(|err| DeliveryError::Rejected(describe(&err)))
    }
}

/// Parent (only when framed) and opener of `window`.
pub fn upstream_targets(window: &Window) -> TargetRegistry<WebWindow> {
    let mut targets = TargetRegistry::new();
    if let Ok(Some(parent)) = window.parent() {
        if !js_sys::Object::is(&parent, window) {
            targets = targets.with_parent(WebWindow::new(parent));
        }
    }
    if let Some(opener) = window.opener().ok().and_then(WebWindow::from_js) {
        targets = targets.with_opener(opener);
    }
    targets
}

/// Every iframe currently in the document with a reachable content window.
pub fn same_page_frames(window: &Window) -> Vec<WebWindow> {
    let Some(document) = window.document() else {
        return Vec::new();
    };
    let Ok(nodes) = document.query_selector_all("iframe") else {
        return Vec::new();
    };
    (0..nodes.length())
        .filter_map(|idx| nodes.item(idx))
        .filter_map(|node| node.dyn_into::<HtmlIFrameElement>().ok())
        .filter_map(|frame| WebWindow::from_iframe(&frame))
        .collect()
}
