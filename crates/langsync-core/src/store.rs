#![forbid(unsafe_code)]

//! Preference store: where the chosen language is read from on load and
//! mirrored to afterwards.
//!
//! Resolution priority is URL parameter, cookie, storage, then the browser
//! locale. Writes go to storage always and to the cookie and URL when they
//! are configured. No channel failure ever reaches the caller: failures are
//! logged and collected in a [`PersistReport`].

use tracing::{debug, warn};

use crate::config::SyncConfig;
use crate::cookie::CookieConfig;
use crate::error::{ChannelError, ChannelKind};
use crate::language::{LanguageCode, SupportedLanguages};

/// Key-value storage shared by same-origin contexts (`localStorage`).
pub trait StorageChannel {
    fn get(&self, key: &str) -> Result<Option<String>, ChannelError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), ChannelError>;
}

/// Cookie jar of the current document.
pub trait CookieChannel {
    fn read(&self, name: &str) -> Result<Option<String>, ChannelError>;
    fn write(&mut self, cookie: &CookieConfig, value: &str) -> Result<(), ChannelError>;
}

/// Query string of the current page, rewritten in place without navigation.
pub trait UrlChannel {
    fn param(&self, name: &str) -> Option<String>;
    fn replace_param(&mut self, name: &str, value: &str) -> Result<(), ChannelError>;
}

/// Which input decided the initial language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreferenceSource {
    Url,
    Cookie,
    Storage,
    BrowserLocale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub language: LanguageCode,
    pub source: PreferenceSource,
}

/// Outcome of a persist call. Failures are informational only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistReport {
    pub written: Vec<ChannelKind>,
    pub failures: Vec<ChannelError>,
}

impl PersistReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn record(&mut self, kind: ChannelKind, result: Result<(), ChannelError>) {
        match result {
            Ok(()) => self.written.push(kind),
            Err(err) => self.failures.push(err),
        }
    }
}

/// Reads and mirrors the preference across the durable channels a host provides.
///
/// A store without any channel attached keeps the preference in memory only.
pub struct PreferenceStore {
    storage_key: String,
    cookie: Option<CookieConfig>,
    url_param: Option<String>,
    storage: Option<Box<dyn StorageChannel>>,
    cookies: Option<Box<dyn CookieChannel>>,
    url: Option<Box<dyn UrlChannel>>,
}

impl core::fmt::Debug for PreferenceStore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PreferenceStore")
            .field("storage_key", &self.storage_key)
            .field("cookie", &self.cookie)
            .field("url_param", &self.url_param)
            .field("storage", &self.storage.is_some())
            .field("cookies", &self.cookies.is_some())
            .field("url", &self.url.is_some())
            .finish()
    }
}

impl PreferenceStore {
    /// Store with names taken from `config` and no channels attached.
    #[must_use]
    pub fn new(config: &SyncConfig) -> Self {
        Self {
            storage_key: config.storage_key.clone(),
            cookie: config.cookie.clone(),
            url_param: config.url_param.clone(),
            storage: None,
            cookies: None,
            url: None,
        }
    }

    #[must_use]
    pub fn with_storage(mut self, storage: impl StorageChannel + 'static) -> Self {
        self.storage = Some(Box::new(storage));
        self
    }

    /// Attach a cookie jar. Ignored unless the config enables the cookie channel.
    #[must_use]
    pub fn with_cookies(mut self, cookies: impl CookieChannel + 'static) -> Self {
        self.cookies = Some(Box::new(cookies));
        self
    }

    /// Attach the page URL. Ignored unless the config names a URL parameter.
    #[must_use]
    pub fn with_url(mut self, url: impl UrlChannel + 'static) -> Self {
        self.url = Some(Box::new(url));
        self
    }

    /// Initial language: first valid value from URL, cookie, storage, else
    /// the browser-locale default.
    #[must_use]
    pub fn resolve_initial(
        &self,
        languages: &SupportedLanguages,
        browser_locale: Option<&str>,
    ) -> LanguageCode {
        self.resolve(languages, browser_locale).language
    }

    /// Like [`resolve_initial`](Self::resolve_initial), also reporting which
    /// input won.
    #[must_use]
    pub fn resolve(
        &self,
        languages: &SupportedLanguages,
        browser_locale: Option<&str>,
    ) -> Resolution {
        let candidates = [
            (PreferenceSource::Url, self.read_url()),
            (PreferenceSource::Cookie, self.read_cookie()),
            (PreferenceSource::Storage, self.read_storage()),
        ];
        for (source, raw) in candidates {
            let Some(raw) = raw else { continue };
            match languages.accept(&raw) {
                Some(language) => {
                    debug!(?source, %language, "resolved initial language");
                    return Resolution { language, source };
                }
                None => debug!(?source, value = %raw, "ignoring unsupported stored language"),
            }
        }
        let language = languages.for_locale(browser_locale);
        debug!(%language, locale = ?browser_locale, "falling back to browser locale");
        Resolution {
            language,
            source: PreferenceSource::BrowserLocale,
        }
    }

    /// Mirror `language` to every configured channel.
    pub fn persist(&mut self, language: LanguageCode) -> PersistReport {
        let mut report = PersistReport::default();
        if let Some(result) = self.write_storage(language) {
            report.record(ChannelKind::Storage, result);
        }
        if let Some(result) = self.write_cookie(language) {
            report.record(ChannelKind::Cookie, result);
        }
        if let Some(result) = self.write_url(language) {
            report.record(ChannelKind::Url, result);
        }
        report
    }

    /// Write only the storage channel, which is what notifies sibling tabs.
    pub fn persist_storage(&mut self, language: LanguageCode) -> PersistReport {
        let mut report = PersistReport::default();
        if let Some(result) = self.write_storage(language) {
            report.record(ChannelKind::Storage, result);
        }
        report
    }

    fn read_url(&self) -> Option<String> {
        let name = self.url_param.as_deref()?;
        self.url.as_ref()?.param(name)
    }

    fn read_cookie(&self) -> Option<String> {
        let cookie = self.cookie.as_ref()?;
        let jar = self.cookies.as_ref()?;
        jar.read(&cookie.name)
            .inspect_err(|err| warn!(error = %err, "cookie read failed"))
            .ok()
            .flatten()
    }

    fn read_storage(&self) -> Option<String> {
        self.storage
            .as_ref()?
            .get(&self.storage_key)
            .inspect_err(|err| warn!(error = %err, "storage read failed"))
            .ok()
            .flatten()
    }

    fn write_storage(&mut self, language: LanguageCode) -> Option<Result<(), ChannelError>> {
        let storage = self.storage.as_mut()?;
        let result = storage.set(&self.storage_key, language.as_str());
        if let Err(err) = &result {
            warn!(error = %err, %language, "storage write failed; preference not persisted");
        }
        Some(result)
    }

    fn write_cookie(&mut self, language: LanguageCode) -> Option<Result<(), ChannelError>> {
        let cookie = self.cookie.as_ref()?;
        let jar = self.cookies.as_mut()?;
        let result = jar.write(cookie, language.as_str());
        if let Err(err) = &result {
            warn!(error = %err, %language, "cookie write failed");
        }
        Some(result)
    }

    fn write_url(&mut self, language: LanguageCode) -> Option<Result<(), ChannelError>> {
        let name = self.url_param.as_deref()?;
        let url = self.url.as_mut()?;
        let result = url.replace_param(name, language.as_str());
        if let Err(err) = &result {
            warn!(error = %err, %language, "url rewrite failed");
        }
        Some(result)
    }
}
