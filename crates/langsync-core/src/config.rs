#![forbid(unsafe_code)]

//! Options for one [`LanguageSync`](crate::sync::LanguageSync) instance.
//!
//! Keys are camelCase so a host can hand over a JS options object verbatim:
//!
//! ```
//! use langsync_core::config::SyncConfig;
//!
//! let config = SyncConfig::from_json(
//!     r#"{"trustedOrigin":"https://example.com","languages":["en","jp"]}"#,
//! ).unwrap();
//! assert_eq!(config.storage_key, "preferredLanguage");
//! ```

use serde::{Deserialize, Serialize};
use web_time::Duration;

use crate::cookie::CookieConfig;
use crate::error::ConfigError;
use crate::language::SupportedLanguages;
use crate::reconnect::ReconnectPolicy;

pub const DEFAULT_STORAGE_KEY: &str = "preferredLanguage";
pub const DEFAULT_URL_PARAM: &str = "lang";
pub const DEFAULT_INITIAL_BROADCAST_DELAY_MS: u64 = 1000;
pub const DEFAULT_SELECTOR_IDS: [&str; 3] = [
    "language-selector",
    "mobile-language-selector",
    "footer-language-selector",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SyncConfig {
    /// Origin every inbound message must declare, and the target origin of
    /// every outbound post.
    pub trusted_origin: String,
    /// Storage key holding the raw language code.
    pub storage_key: String,
    pub languages: SupportedLanguages,
    /// Cookie mirror; `None` disables the cookie channel.
    pub cookie: Option<CookieConfig>,
    /// Query parameter mirror; `None` disables the URL channel.
    pub url_param: Option<String>,
    pub initial_broadcast_delay_ms: u64,
    /// Send a handshake to the opener/parent when the page regains focus.
    pub handshake_on_focus: bool,
    /// `None` disables the reconnect timer.
    pub reconnect: Option<ReconnectPolicy>,
    /// Ids of `<select>` controls kept in sync with the active language.
    pub selector_ids: Vec<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            trusted_origin: String::new(),
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            languages: SupportedLanguages::default(),
            cookie: Some(CookieConfig::default()),
            url_param: Some(DEFAULT_URL_PARAM.to_string()),
            initial_broadcast_delay_ms: DEFAULT_INITIAL_BROADCAST_DELAY_MS,
            handshake_on_focus: true,
            reconnect: Some(ReconnectPolicy::default()),
            selector_ids: DEFAULT_SELECTOR_IDS.iter().map(ToString::to_string).collect(),
        }
    }
}

impl SyncConfig {
    /// Defaults with the given trusted origin.
    #[must_use]
    pub fn new(trusted_origin: impl Into<String>) -> Self {
        Self {
            trusted_origin: trusted_origin.into(),
            ..Self::default()
        }
    }

    /// Parse and validate a JSON options object.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for malformed JSON or any failure reported by
    /// [`validate`](Self::validate).
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the invariants the protocol relies on.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_origin(&self.trusted_origin) {
            return Err(ConfigError::InvalidOrigin(self.trusted_origin.clone()));
        }
        if self.storage_key.is_empty() {
            return Err(ConfigError::EmptyField {
                field: "storageKey",
            });
        }
        if self.cookie.as_ref().is_some_and(|c| c.name.is_empty()) {
            return Err(ConfigError::EmptyField {
                field: "cookie.name",
            });
        }
        if self.url_param.as_deref().is_some_and(str::is_empty) {
            return Err(ConfigError::EmptyField { field: "urlParam" });
        }
        Ok(())
    }

    #[must_use]
    pub fn initial_broadcast_delay(&self) -> Duration {
        Duration::from_millis(self.initial_broadcast_delay_ms)
    }
}

/// `scheme://host[:port]` with nothing after the authority.
fn is_origin(raw: &str) -> bool {
    let Some((scheme, rest)) = raw.split_once("://") else {
        return false;
    };
    let scheme_ok = !scheme.is_empty()
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    scheme_ok && !rest.is_empty() && !rest.contains(['/', '?', '#']) && !rest.ends_with(':')
}
