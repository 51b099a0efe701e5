#![forbid(unsafe_code)]

//! Durable channels backed by `localStorage`, `document.cookie` and the
//! page URL.
//!
//! Every browser call here can throw (sandboxed iframes, disabled storage,
//! `file://` pages); each throw becomes a [`ChannelError`] that the
//! preference store logs and moves past.

use langsync_core::cookie::find_cookie;
use langsync_core::{
    ChannelError, ChannelKind, CookieChannel, CookieConfig, StorageChannel, UrlChannel,
};
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{HtmlDocument, Storage, Url, Window};

use crate::js::describe;

/// `window.localStorage`, looked up lazily so a throwing getter only
/// disables this channel.
pub struct WebStorage {
    window: Window,
}

impl WebStorage {
    pub fn new(window: Window) -> Self {
        Self { window }
    }

    fn storage(&self) -> Result<Storage, ChannelError> {
        match self.window.local_storage() {
            Ok(Some(storage)) => Ok(storage),
            Ok(None) => Err(ChannelError::unavailable(
                ChannelKind::Storage,
                "localStorage is null",
            )),
            Err(err) => Err(ChannelError::unavailable(ChannelKind::Storage, describe(&err))),
        }
    }
}

impl StorageChannel for WebStorage {
    fn get(&self, key: &str) -> Result<Option<String>, ChannelError> {
        self.storage()?
            .get_item(key)
            .map_err(|err| ChannelError::rejected(ChannelKind::Storage, "get", describe(&err)))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), ChannelError> {
        self.storage()?
            .set_item(key, value)
            .map_err(|err| ChannelError::rejected(ChannelKind::Storage, "set", describe(&err)))
    }
}

/// `document.cookie`.
pub struct DocumentCookies {
    window: Window,
}

impl DocumentCookies {
    pub fn new(window: Window) -> Self {
        Self { window }
    }

    fn document(&self) -> Result<HtmlDocument, ChannelError> {
        self.window
            .document()
            .and_then(|doc| doc.dyn_into::<HtmlDocument>().ok())
            .ok_or_else(|| ChannelError::unavailable(ChannelKind::Cookie, "no HTML document"))
    }
}

impl CookieChannel for DocumentCookies {
    fn read(&self, name: &str) -> Result<Option<String>, ChannelError> {
        let jar = self
            .document()?
            .cookie()
            .map_err(|err| ChannelError::rejected(ChannelKind::Cookie, "read", describe(&err)))?;
        Ok(find_cookie(&jar, name))
    }

    fn write(&mut self, cookie: &CookieConfig, value: &str) -> Result<(), ChannelError> {
        self.document()?
            .set_cookie(&cookie.set_cookie_line(value))
            .map_err(|err| ChannelError::rejected(ChannelKind::Cookie, "write", describe(&err)))
    }
}

/// `location.search`, rewritten with `history.replaceState` so changing the
/// parameter never navigates or reloads.
pub struct LocationUrl {
    window: Window,
}

impl LocationUrl {
    pub fn new(window: Window) -> Self {
        Self { window }
    }

    fn current(&self) -> Result<Url, ChannelError> {
        let href = self
            .window
            .location()
            .href()
            .map_err(|err| ChannelError::unavailable(ChannelKind::Url, describe(&err)))?;
        Url::new(&href).map_err(|err| ChannelError::unavailable(ChannelKind::Url, describe(&err)))
    }
}

impl UrlChannel for LocationUrl {
    fn param(&self, name: &str) -> Option<String> {
        self.current().ok()?.search_params().get(name)
    }

    fn replace_param(&mut self, name: &str, value: &str) -> Result<(), ChannelError> {
        let url = self.current()?;
        if url.search_params().get(name).as_deref() == Some(value) {
            return Ok(());
        }
        url.search_params().set(name, value);
        let history = self
            .window
            .history()
            .map_err(|err| ChannelError::unavailable(ChannelKind::Url, describe(&err)))?;
        let state = history.state().unwrap_or(JsValue::NULL);
        history
            .replace_state_with_url(&state, "", Some(&url.href()))
            .map_err(|err| {
                ChannelError::rejected(ChannelKind::Url, "replaceState", describe(&err))
            })
    }
}
