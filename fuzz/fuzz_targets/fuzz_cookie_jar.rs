#![no_main]

use langsync_core::cookie::find_cookie;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Arbitrary `document.cookie` strings must never panic the lookup,
    // including truncated or non-ASCII percent escapes.
    let Ok(jar) = std::str::from_utf8(data) else {
        return;
    };
    let _ = find_cookie(jar, "preferredLanguage");
    if let Some((name, _)) = jar.split_once('=') {
        let _ = find_cookie(jar, name.trim());
    }
});
