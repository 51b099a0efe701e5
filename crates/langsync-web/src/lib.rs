#![forbid(unsafe_code)]

//! Browser host for [`langsync_core`].
//!
//! On `wasm32` this crate binds the core's seams to the live page:
//! `localStorage`, `document.cookie` and `history.replaceState` back the
//! preference store, `postMessage` carries protocol messages between
//! windows, and [`DomPage`] rewrites translated markup. JavaScript calls
//! `installLanguageSync(options)` once per page and keeps the returned
//! handle alive.
//!
//! The attribute naming rules in [`markup`] have no browser dependency and
//! build on every target.

pub mod markup;

#[cfg(target_arch = "wasm32")]
mod js;

#[cfg(target_arch = "wasm32")]
pub mod channels;

#[cfg(target_arch = "wasm32")]
pub mod dom;

#[cfg(target_arch = "wasm32")]
pub mod window;

#[cfg(target_arch = "wasm32")]
mod wasm;

pub use langsync_core;
pub use markup::{ContentTarget, MarkupScheme};

#[cfg(target_arch = "wasm32")]
pub use channels::{DocumentCookies, LocationUrl, WebStorage};
#[cfg(target_arch = "wasm32")]
pub use dom::DomPage;
#[cfg(target_arch = "wasm32")]
pub use wasm::{LanguageSyncHandle, install_language_sync};
#[cfg(target_arch = "wasm32")]
pub use window::WebWindow;
