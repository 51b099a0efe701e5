#![forbid(unsafe_code)]

//! Keeps one "selected language" preference consistent across browser tabs,
//! iframes and windows of the same site.
//!
//! # Role
//! `langsync-core` is the host-agnostic half: it knows the protocol (who to
//! tell, whom to believe, when to stay quiet) but never touches a browser API.
//! Every side effect goes through a trait:
//!
//! | Seam | Trait | Browser counterpart |
//! |------|-------|---------------------|
//! | durable channels | [`StorageChannel`], [`CookieChannel`], [`UrlChannel`] | `localStorage`, `document.cookie`, `location` + `history` |
//! | related contexts | [`WindowHandle`] | `window.parent`, `window.opener`, `window.open` results, iframes |
//! | the page | [`PageSink`] | DOM rewriting |
//! | time | [`Clock`] | `Date.now()` |
//!
//! `langsync-web` implements those traits with `web-sys`; the [`memory`]
//! module implements them in plain Rust for tests and non-browser hosts.
//!
//! # Loop prevention
//! Local changes go through [`LanguageSync::apply_and_broadcast`]; anything
//! learned from another context goes through
//! [`LanguageSync::apply_without_rebroadcast`]. The two never share a flag.

pub mod applier;
pub mod broadcast;
pub mod clock;
pub mod config;
pub mod cookie;
pub mod error;
pub mod language;
pub mod memory;
pub mod message;
pub mod receiver;
pub mod reconnect;
pub mod store;
pub mod sync;

pub use applier::{PageSink, UiApplier};
pub use broadcast::{BroadcastReport, Broadcaster, TargetRegistry, TargetRole, WindowHandle};
pub use clock::{Clock, SystemClock};
pub use config::SyncConfig;
pub use cookie::{CookieConfig, SameSite};
pub use error::{
    ChannelError, ChannelKind, ConfigError, DeliveryError, LanguageError, MessageError,
};
pub use language::{LanguageCode, SupportedLanguages};
pub use message::{Inbound, MessageKind, SyncMessage};
pub use receiver::{Disposition, IgnoreReason};
pub use reconnect::{BackoffStrategy, ReconnectPolicy};
pub use store::{
    CookieChannel, PersistReport, PreferenceSource, PreferenceStore, StorageChannel, UrlChannel,
};
pub use sync::{LanguageSync, Phase, StartPlan};
