#![forbid(unsafe_code)]

//! Cookie attributes plus `document.cookie` formatting and parsing.
//!
//! Browsers expose cookies as one `name=value; name2=value2` string and accept
//! writes as a single `Set-Cookie`-style line. Both directions are plain string
//! work, so they live here where they can be tested without a document.

use serde::{Deserialize, Serialize};

const DEFAULT_COOKIE_NAME: &str = "preferredLanguage";
const DEFAULT_MAX_AGE_SECS: u64 = 365 * 24 * 60 * 60;

/// `SameSite` cookie attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SameSite {
    Strict,
    #[default]
    Lax,
    None,
}

impl SameSite {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Strict => "Strict",
            Self::Lax => "Lax",
            Self::None => "None",
        }
    }
}

/// Where and how long the language cookie lives.
///
/// Setting `domain` to a parent domain (`.example.com`) is what lets the
/// preference follow the user across subdomains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CookieConfig {
    pub name: String,
    pub domain: Option<String>,
    pub path: String,
    pub max_age_secs: u64,
    pub same_site: SameSite,
    pub secure: bool,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_COOKIE_NAME.to_string(),
            domain: None,
            path: "/".to_string(),
            max_age_secs: DEFAULT_MAX_AGE_SECS,
            same_site: SameSite::Lax,
            secure: false,
        }
    }
}

impl CookieConfig {
    /// Line to assign to `document.cookie` to store `value`.
    #[must_use]
    pub fn set_cookie_line(&self, value: &str) -> String {
        let mut line = format!(
            "{}={}; Path={}; Max-Age={}; SameSite={}",
            self.name,
            encode_component(value),
            self.path,
            self.max_age_secs,
            self.same_site.as_str()
        );
        if let Some(domain) = self.domain.as_deref().filter(|d| !d.is_empty()) {
            line.push_str("; Domain=");
            line.push_str(domain);
        }
        // Browsers drop SameSite=None cookies that are not Secure.
        if self.secure || self.same_site == SameSite::None {
            line.push_str("; Secure");
        }
        line
    }
}

/// Look up `name` in a `document.cookie` string.
///
/// The first matching pair wins, matching browser ordering (most specific
/// path first).
#[must_use]
pub fn find_cookie(cookie_string: &str, name: &str) -> Option<String> {
    cookie_string
        .split(';')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| decode_component(value.trim()))
}

/// Percent-encode bytes that are not allowed in a cookie value.
fn encode_component(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char);
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

fn decode_component(value: &str) -> String {
    let value = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value);
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut idx = 0;
    while idx < bytes.len() {
        if bytes[idx] == b'%' && idx + 2 < bytes.len() {
            if let Some(byte) = hex_pair(bytes[idx + 1], bytes[idx + 2]) {
                out.push(byte);
                idx += 3;
                continue;
            }
        }
        out.push(bytes[idx]);
        idx += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_pair(hi: u8, lo: u8) -> Option<u8> {
    let hi = (hi as char).to_digit(16)?;
    let lo = (lo as char).to_digit(16)?;
    u8::try_from(hi * 16 + lo).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_line_has_path_age_and_samesite() {
        let line = CookieConfig::default().set_cookie_line("jp");
        assert_eq!(
            line,
            "preferredLanguage=jp; Path=/; Max-Age=31536000; SameSite=Lax"
        );
    }

    #[test]
    fn domain_and_secure_are_appended() {
        let config = CookieConfig {
            name: "lang".into(),
            domain: Some(".example.com".into()),
            secure: true,
            ..CookieConfig::default()
        };
        let line = config.set_cookie_line("cn");
        assert!(line.starts_with("lang=cn; "));
        assert!(line.contains("; Domain=.example.com"));
        assert!(line.ends_with("; Secure"));
    }

    #[test]
    fn samesite_none_forces_secure() {
        let config = CookieConfig {
            same_site: SameSite::None,
            ..CookieConfig::default()
        };
        assert!(config.set_cookie_line("en").ends_with("SameSite=None; Secure"));
    }

    #[test]
    fn find_cookie_picks_named_pair() {
        let jar = "theme=dark; preferredLanguage=cn;  other=1";
        assert_eq!(find_cookie(jar, "preferredLanguage").as_deref(), Some("cn"));
        assert_eq!(find_cookie(jar, "theme").as_deref(), Some("dark"));
        assert_eq!(find_cookie(jar, "missing"), None);
        assert_eq!(find_cookie("", "theme"), None);
    }

    #[test]
    fn find_cookie_does_not_match_name_prefix() {
        assert_eq!(find_cookie("xpreferredLanguage=jp", "preferredLanguage"), None);
    }

    #[test]
    fn values_are_percent_encoded_and_decoded() {
        let line = CookieConfig::default().set_cookie_line("a b;c");
        assert!(line.starts_with("preferredLanguage=a%20b%3Bc;"));
        assert_eq!(
            find_cookie("preferredLanguage=a%20b%3Bc", "preferredLanguage").as_deref(),
            Some("a b;c")
        );
        assert_eq!(
            find_cookie("k=\"jp\"; j=%zz", "k").as_deref(),
            Some("jp")
        );
        assert_eq!(find_cookie("j=%zz", "j").as_deref(), Some("%zz"));
        assert_eq!(find_cookie("j=%4", "j").as_deref(), Some("%4"));
    }
}
