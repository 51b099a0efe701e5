//! Multi-context simulations built from the in-memory host seams.
//!
//! Each simulated page owns an inbox (a [`MemoryWindow`] other pages post
//! into). `pump` delivers inbox contents until every inbox is empty, which is
//! how these tests detect ping-pong: a loop would never drain.

use langsync_core::memory::{MemoryStorage, MemoryUrl, MemoryWindow, RecordingPage};
use langsync_core::{
    Disposition, IgnoreReason, Inbound, LanguageCode, LanguageSync, MessageKind, PreferenceStore,
    SyncConfig, SyncMessage, TargetRegistry,
};
use pretty_assertions::assert_eq;

const ORIGIN: &str = "https://example.com";
const PUMP_LIMIT: usize = 64;

struct SimPage {
    name: &'static str,
    sync: LanguageSync<MemoryWindow, RecordingPage>,
    inbox: MemoryWindow,
    page: RecordingPage,
}

impl SimPage {
    fn new(
        name: &'static str,
        storage: &MemoryStorage,
        url_lang: Option<&str>,
        targets: TargetRegistry<MemoryWindow>,
    ) -> Self {
        let mut config = SyncConfig::new(ORIGIN);
        config.cookie = None;
        let url = url_lang.map_or_else(MemoryUrl::default, |lang| {
            MemoryUrl::with_param("lang", lang)
        });
        let store = PreferenceStore::new(&config)
            .with_storage(storage.clone())
            .with_url(url);
        let page = RecordingPage::new();
        let sync = LanguageSync::new(config, page.clone())
            .with_store(store)
            .with_targets(targets)
            .with_source(name);
        Self {
            name,
            sync,
            inbox: MemoryWindow::new(),
            page,
        }
    }

    fn boot(&mut self, locale: &str) {
        self.sync.start(Some(locale));
        self.sync.complete_initialization();
    }

    fn lang(&self) -> LanguageCode {
        self.sync.current_language()
    }
}

/// Deliver queued posts until quiet, returning how many were delivered.
///
/// The sender of a post is looked up by its `source` field so requests get a
/// reply handle, the way `MessageEvent.source` works in a browser.
fn pump(pages: &mut [SimPage]) -> usize {
    let mut delivered = 0;
    for _ in 0..PUMP_LIMIT {
        let mut progressed = false;
        for idx in 0..pages.len() {
            let posts = pages[idx].inbox.drain();
            for posted in posts {
                progressed = true;
                delivered += 1;
                let reply_to = pages
                    .iter()
                    .find(|p| p.name == posted.message.source)
                    .map(|p| p.inbox.clone());
                pages[idx]
                    .sync
                    .handle_message(Inbound::new(ORIGIN, reply_to, posted.message));
            }
        }
        if !progressed {
            return delivered;
        }
    }
    panic!("messages still flowing after {PUMP_LIMIT} rounds");
}

/// Opener `a` and the window `b` it opened, sharing one storage area.
fn opener_and_child(storage: &MemoryStorage, child_url_lang: Option<&str>) -> Vec<SimPage> {
    let mut a = SimPage::new("a", storage, None, TargetRegistry::new());
    a.boot("en-US");
    let a_handle = a.inbox.clone();
    let mut b = SimPage::new(
        "b",
        storage,
        child_url_lang,
        TargetRegistry::new().with_opener(a_handle),
    );
    a.sync.register_window(b.inbox.clone());
    b.boot("en-US");
    vec![a, b]
}

#[test]
fn child_url_choice_propagates_to_opener_without_echo() {
    let storage = MemoryStorage::default();
    let mut pages = opener_and_child(&storage, Some("jp"));

    let delivered = pump(&mut pages);
    assert_eq!(delivered, 1, "only the child's initial CHANGE should travel");
    assert_eq!(pages[0].lang(), LanguageCode::Jp);
    assert_eq!(pages[1].lang(), LanguageCode::Jp);
    assert_eq!(storage.value("preferredLanguage").as_deref(), Some("jp"));
}

#[test]
fn user_change_in_opener_reaches_child_and_stops() {
    let storage = MemoryStorage::default();
    let mut pages = opener_and_child(&storage, None);
    pump(&mut pages);
    assert_eq!(pages[1].lang(), LanguageCode::En);

    let renders_before = pages[1].page.render_count();
    assert_eq!(
        pages[0].sync.change_language("cn"),
        Disposition::Applied(LanguageCode::Cn)
    );
    let delivered = pump(&mut pages);
    assert_eq!(delivered, 1);
    assert_eq!(pages[1].lang(), LanguageCode::Cn);
    assert_eq!(pages[1].page.render_count(), renders_before + 1);
}

#[test]
fn rapid_changes_in_both_contexts_still_drain() {
    let storage = MemoryStorage::default();
    let mut pages = opener_and_child(&storage, None);
    pump(&mut pages);

    pages[0].sync.change_language("jp");
    pages[1].sync.change_language("cn");
    pages[0].sync.change_language("cn");
    let delivered = pump(&mut pages);
    assert!(delivered <= 3, "delivered {delivered} messages");
    // Order of arrival decides; both end on a supported value and nothing loops.
    assert_eq!(pages[0].inbox.received(), 0);
    assert_eq!(pages[1].inbox.received(), 0);
}

#[test]
fn focus_handshake_pulls_opener_language_into_child() {
    let storage = MemoryStorage::default();
    let mut pages = opener_and_child(&storage, None);
    pump(&mut pages);

    // The child misses a change (e.g. it was registered after the broadcast).
    pages[0].sync.apply_without_rebroadcast(LanguageCode::Jp);
    assert_eq!(pages[1].lang(), LanguageCode::En);

    pages[1].sync.on_focus();
    let delivered = pump(&mut pages);
    assert_eq!(delivered, 2, "handshake plus its single ack");
    assert_eq!(pages[1].lang(), LanguageCode::Jp);
}

#[test]
fn sibling_tab_follows_storage_events_without_writing_back() {
    let storage = MemoryStorage::default();
    let mut a = SimPage::new("a", &storage, None, TargetRegistry::new());
    let mut c = SimPage::new("c", &storage, None, TargetRegistry::new());
    a.boot("en");
    c.boot("en");

    a.sync.change_language("jp");
    let writes = storage.writes();
    let value = storage.value("preferredLanguage");
    assert_eq!(
        c.sync
            .handle_storage_event(Some("preferredLanguage"), value.as_deref()),
        Disposition::Applied(LanguageCode::Jp)
    );
    assert_eq!(storage.writes(), writes);
    assert_eq!(c.inbox.received(), 0);
}

#[test]
fn duplicate_and_stale_messages_are_harmless() {
    let storage = MemoryStorage::default();
    let mut page = SimPage::new("a", &storage, None, TargetRegistry::new());
    page.boot("en");

    let change = SyncMessage::change("b", LanguageCode::Jp, 10);
    assert_eq!(
        page.sync.handle_message(Inbound::new(ORIGIN, None, change.clone())),
        Disposition::Applied(LanguageCode::Jp)
    );
    assert_eq!(
        page.sync.handle_message(Inbound::new(ORIGIN, None, change)),
        Disposition::Ignored(IgnoreReason::SameLanguage)
    );
    assert_eq!(page.page.render_count(), 2);
}

#[test]
fn handshake_reply_is_single_whatever_the_language() {
    for language in LanguageCode::ALL {
        let storage = MemoryStorage::with("preferredLanguage", language.as_str());
        let mut page = SimPage::new("a", &storage, None, TargetRegistry::new());
        page.boot("en");
        let requester = MemoryWindow::new();
        page.sync.handle_message(Inbound::new(
            ORIGIN,
            Some(requester.clone()),
            SyncMessage::new(MessageKind::Handshake, "b", None, 1),
        ));
        let replies = requester.drain();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].message.language_code(), Some(language));
    }
}
