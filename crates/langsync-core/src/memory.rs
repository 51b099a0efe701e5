#![forbid(unsafe_code)]

//! In-memory implementations of every host seam.
//!
//! Each type is a cheap handle over shared state: cloning it and handing the
//! clone to a [`LanguageSync`](crate::sync::LanguageSync) leaves the original
//! free for inspection. Two pages sharing one [`MemoryStorage`] behave like
//! two same-origin tabs sharing `localStorage` (minus the change events,
//! which the caller delivers explicitly).

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::applier::PageSink;
use crate::broadcast::WindowHandle;
use crate::clock::Clock;
use crate::cookie::CookieConfig;
use crate::error::{ChannelError, ChannelKind, DeliveryError};
use crate::language::LanguageCode;
use crate::message::SyncMessage;
use crate::store::{CookieChannel, StorageChannel, UrlChannel};

#[derive(Debug, Default)]
struct StorageState {
    values: BTreeMap<String, String>,
    fail_reads: bool,
    fail_writes: bool,
    writes: usize,
}

/// Shared key-value storage with switchable failure modes.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    state: Rc<RefCell<StorageState>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn with(key: &str, value: &str) -> Self {
        let storage = Self::default();
        storage
            .state
            .borrow_mut()
            .values
            .insert(key.to_string(), value.to_string());
        storage
    }

    #[must_use]
    pub fn value(&self, key: &str) -> Option<String> {
        self.state.borrow().values.get(key).cloned()
    }

    /// Number of successful writes so far.
    #[must_use]
    pub fn writes(&self) -> usize {
        self.state.borrow().writes
    }

    pub fn clear(&self) {
        self.state.borrow_mut().values.clear();
    }

    /// Simulate storage that throws on read (sandboxed frame, disabled storage).
    pub fn fail_reads(&self, fail: bool) {
        self.state.borrow_mut().fail_reads = fail;
    }

    /// Simulate storage that throws on write (quota, private browsing).
    pub fn fail_writes(&self, fail: bool) {
        self.state.borrow_mut().fail_writes = fail;
    }
}

impl StorageChannel for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, ChannelError> {
        let state = self.state.borrow();
        if state.fail_reads {
            return Err(ChannelError::unavailable(ChannelKind::Storage, "SecurityError"));
        }
        Ok(state.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), ChannelError> {
        let mut state = self.state.borrow_mut();
        if state.fail_writes {
            return Err(ChannelError::rejected(
                ChannelKind::Storage,
                "set",
                "QuotaExceededError",
            ));
        }
        state.values.insert(key.to_string(), value.to_string());
        state.writes += 1;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct CookieState {
    values: BTreeMap<String, String>,
    lines: Vec<String>,
}

/// Cookie jar that records every `Set-Cookie` line it is given.
#[derive(Debug, Clone, Default)]
pub struct MemoryCookies {
    state: Rc<RefCell<CookieState>>,
}

impl MemoryCookies {
    #[must_use]
    pub fn with(name: &str, value: &str) -> Self {
        let jar = Self::default();
        jar.state
            .borrow_mut()
            .values
            .insert(name.to_string(), value.to_string());
        jar
    }

    #[must_use]
    pub fn value(&self, name: &str) -> Option<String> {
        self.state.borrow().values.get(name).cloned()
    }

    /// Raw lines written, oldest first.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.state.borrow().lines.clone()
    }

    pub fn clear(&self) {
        self.state.borrow_mut().values.clear();
    }
}

impl CookieChannel for MemoryCookies {
    fn read(&self, name: &str) -> Result<Option<String>, ChannelError> {
        Ok(self.state.borrow().values.get(name).cloned())
    }

    fn write(&mut self, cookie: &CookieConfig, value: &str) -> Result<(), ChannelError> {
        let mut state = self.state.borrow_mut();
        state.lines.push(cookie.set_cookie_line(value));
        state.values.insert(cookie.name.clone(), value.to_string());
        Ok(())
    }
}

#[derive(Debug, Default)]
struct UrlState {
    params: BTreeMap<String, String>,
    replacements: usize,
}

/// Query parameters of a page that never navigates.
#[derive(Debug, Clone, Default)]
pub struct MemoryUrl {
    state: Rc<RefCell<UrlState>>,
}

impl MemoryUrl {
    #[must_use]
    pub fn with_param(name: &str, value: &str) -> Self {
        let url = Self::default();
        url.state
            .borrow_mut()
            .params
            .insert(name.to_string(), value.to_string());
        url
    }

    #[must_use]
    pub fn value(&self, name: &str) -> Option<String> {
        self.state.borrow().params.get(name).cloned()
    }

    #[must_use]
    pub fn replacements(&self) -> usize {
        self.state.borrow().replacements
    }

    pub fn clear(&self) {
        self.state.borrow_mut().params.clear();
    }
}

impl UrlChannel for MemoryUrl {
    fn param(&self, name: &str) -> Option<String> {
        self.value(name)
    }

    fn replace_param(&mut self, name: &str, value: &str) -> Result<(), ChannelError> {
        let mut state = self.state.borrow_mut();
        state.params.insert(name.to_string(), value.to_string());
        state.replacements += 1;
        Ok(())
    }
}

/// A message as it landed in a [`MemoryWindow`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Posted {
    pub message: SyncMessage,
    pub target_origin: String,
}

#[derive(Debug, Default)]
struct WindowState {
    inbox: Vec<Posted>,
    reject_posts: bool,
}

/// Another browsing context whose inbox can be drained.
#[derive(Debug, Clone, Default)]
pub struct MemoryWindow {
    state: Rc<RefCell<WindowState>>,
    closed: Rc<Cell<bool>>,
}

impl MemoryWindow {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn close(&self) {
        self.closed.set(true);
    }

    /// Make posts fail while the window still looks open
    /// (cross-origin navigation, detached frame).
    pub fn reject_posts(&self, reject: bool) {
        self.state.borrow_mut().reject_posts = reject;
    }

    /// Take everything posted so far.
    pub fn drain(&self) -> Vec<Posted> {
        std::mem::take(&mut self.state.borrow_mut().inbox)
    }

    #[must_use]
    pub fn received(&self) -> usize {
        self.state.borrow().inbox.len()
    }
}

impl WindowHandle for MemoryWindow {
    fn is_closed(&self) -> bool {
        self.closed.get()
    }

    fn post(&self, message: &SyncMessage, target_origin: &str) -> Result<(), DeliveryError> {
        if self.closed.get() {
            return Err(DeliveryError::Closed);
        }
        let mut state = self.state.borrow_mut();
        if state.reject_posts {
            return Err(DeliveryError::Rejected("DataCloneError".to_string()));
        }
        state.inbox.push(Posted {
            message: message.clone(),
            target_origin: target_origin.to_string(),
        });
        Ok(())
    }
}

#[derive(Debug, Default)]
struct PageState {
    renders: Vec<LanguageCode>,
    selector_updates: Vec<LanguageCode>,
}

/// Page sink that records what would have been rewritten.
#[derive(Debug, Clone, Default)]
pub struct RecordingPage {
    state: Rc<RefCell<PageState>>,
}

impl RecordingPage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Languages rendered, in order.
    #[must_use]
    pub fn renders(&self) -> Vec<LanguageCode> {
        self.state.borrow().renders.clone()
    }

    #[must_use]
    pub fn render_count(&self) -> usize {
        self.state.borrow().renders.len()
    }

    #[must_use]
    pub fn selector_updates(&self) -> Vec<LanguageCode> {
        self.state.borrow().selector_updates.clone()
    }
}

impl PageSink for RecordingPage {
    fn render(&mut self, language: LanguageCode) {
        self.state.borrow_mut().renders.push(language);
    }

    fn sync_selectors(&mut self, language: LanguageCode) {
        self.state.borrow_mut().selector_updates.push(language);
    }
}

/// Clock advanced by hand.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now_ms: Rc<Cell<u64>>,
}

impl ManualClock {
    #[must_use]
    pub fn starting_at(now_ms: u64) -> Self {
        let clock = Self::default();
        clock.now_ms.set(now_ms);
        clock
    }

    pub fn advance(&self, ms: u64) {
        self.now_ms.set(self.now_ms.get().saturating_add(ms));
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageKind;

    #[test]
    fn clones_share_storage_state() {
        let a = MemoryStorage::default();
        let mut b = a.clone();
        b.set("k", "jp").unwrap();
        assert_eq!(a.value("k").as_deref(), Some("jp"));
        assert_eq!(a.writes(), 1);
    }

    #[test]
    fn closed_window_refuses_posts() {
        let window = MemoryWindow::new();
        let msg = SyncMessage::new(MessageKind::Handshake, "t", None, 0);
        window.post(&msg, "https://example.com").unwrap();
        window.close();
        assert!(window.is_closed());
        assert_eq!(
            window.post(&msg, "https://example.com"),
            Err(DeliveryError::Closed)
        );
        assert_eq!(window.drain().len(), 1);
        assert_eq!(window.received(), 0);
    }

    #[test]
    fn cookie_jar_records_lines() {
        let mut jar = MemoryCookies::default();
        jar.write(&CookieConfig::default(), "cn").unwrap();
        assert_eq!(jar.value("preferredLanguage").as_deref(), Some("cn"));
        assert!(jar.lines()[0].starts_with("preferredLanguage=cn;"));
    }

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::starting_at(10);
        clock.clone().advance(5);
        assert_eq!(clock.now_ms(), 15);
    }
}
