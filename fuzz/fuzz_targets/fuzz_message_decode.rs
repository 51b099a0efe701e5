#![no_main]

use langsync_core::memory::{ManualClock, MemoryWindow, RecordingPage};
use langsync_core::{LanguageSync, SyncConfig, SyncMessage};
use libfuzzer_sys::fuzz_target;

const ORIGIN: &str = "https://www.example.com";

fuzz_target!(|data: &[u8]| {
    let Ok(payload) = std::str::from_utf8(data) else {
        return;
    };

    // Decoding must never panic, and whatever decodes must re-encode.
    if let Ok(message) = SyncMessage::from_json(payload) {
        let _ = SyncMessage::from_json(&message.to_json());
    }

    // Push the same bytes through an active instance from both a trusted
    // and an untrusted origin, with and without a reply target.
    let mut sync: LanguageSync<MemoryWindow, RecordingPage> =
        LanguageSync::new(SyncConfig::new(ORIGIN), RecordingPage::new())
            .with_clock(ManualClock::starting_at(0));
    let _ = sync.start(None);
    let _ = sync.complete_initialization();

    let before = sync.current_language();
    let _ = sync.handle_raw_message("https://evil.example", Some(MemoryWindow::new()), payload);
    assert_eq!(sync.current_language(), before);

    let peer = MemoryWindow::new();
    let _ = sync.handle_raw_message(ORIGIN, Some(peer.clone()), payload);
    assert!(peer.received() <= 1);
    let _ = sync.handle_raw_message(ORIGIN, None, payload);
});
