#![forbid(unsafe_code)]

//! The fixed set of languages a page can be switched between.
//!
//! [`LanguageCode`] is the only language value the rest of the crate accepts.
//! Raw strings coming from URLs, cookies, storage or other windows are parsed
//! with [`LanguageCode::parse`] and then checked against the configured
//! [`SupportedLanguages`] before they are allowed to change anything.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::LanguageError;

/// A supported language, in wire form `cn`, `en` or `jp`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LanguageCode {
    /// Simplified Chinese.
    Cn,
    /// English.
    En,
    /// Japanese.
    Jp,
}

impl LanguageCode {
    /// Every known code, in default preference order.
    pub const ALL: [Self; 3] = [Self::Cn, Self::En, Self::Jp];

    /// Parse the exact wire form. Case-sensitive; surrounding whitespace is rejected.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "cn" => Some(Self::Cn),
            "en" => Some(Self::En),
            "jp" => Some(Self::Jp),
            _ => None,
        }
    }

    /// Wire form stored in channels and carried in messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cn => "cn",
            Self::En => "en",
            Self::Jp => "jp",
        }
    }

    /// BCP 47 tag written to the document language attribute.
    #[must_use]
    pub const fn bcp47(self) -> &'static str {
        match self {
            Self::Cn => "zh-CN",
            Self::En => "en",
            Self::Jp => "ja",
        }
    }

    /// Map a browser locale (`navigator.language`, `LANG`-style strings) to a code.
    ///
    /// `zh*` maps to [`Cn`](Self::Cn), `ja*` to [`Jp`](Self::Jp), everything
    /// else to [`En`](Self::En).
    #[must_use]
    pub fn from_locale(locale: &str) -> Self {
        match primary_subtag(locale).as_deref() {
            Some("zh") => Self::Cn,
            Some("ja") => Self::Jp,
            _ => Self::En,
        }
    }
}

impl fmt::Display for LanguageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LanguageCode {
    type Err = LanguageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| LanguageError::Unknown(s.to_string()))
    }
}

/// Lower-cased primary language subtag with encoding and modifier suffixes stripped.
fn primary_subtag(locale: &str) -> Option<String> {
    let raw = locale.trim();
    let raw = raw.split('@').next().unwrap_or(raw);
    let raw = raw.split('.').next().unwrap_or(raw);
    let primary = raw.split(['-', '_']).next().unwrap_or(raw).trim();
    if primary.is_empty() {
        return None;
    }
    Some(primary.to_ascii_lowercase())
}

/// Ordered, duplicate-free subset of [`LanguageCode`] a page accepts.
///
/// The first entry is the value the page starts with before any channel has
/// been consulted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<LanguageCode>", into = "Vec<LanguageCode>")]
pub struct SupportedLanguages {
    codes: Vec<LanguageCode>,
}

impl SupportedLanguages {
    /// Build a set from an ordered list.
    ///
    /// # Errors
    ///
    /// Returns [`LanguageError::EmptySet`] for an empty list and
    /// [`LanguageError::Duplicate`] when a code appears twice.
    pub fn new(codes: impl IntoIterator<Item = LanguageCode>) -> Result<Self, LanguageError> {
        let mut out: Vec<LanguageCode> = Vec::new();
        for code in codes {
            if out.contains(&code) {
                return Err(LanguageError::Duplicate(code));
            }
            out.push(code);
        }
        if out.is_empty() {
            return Err(LanguageError::EmptySet);
        }
        Ok(Self { codes: out })
    }

    /// Whether `code` is a member.
    #[must_use]
    pub fn contains(&self, code: LanguageCode) -> bool {
        self.codes.contains(&code)
    }

    /// Parse `raw` and accept it only when it is a member of this set.
    #[must_use]
    pub fn accept(&self, raw: &str) -> Option<LanguageCode> {
        LanguageCode::parse(raw).filter(|code| self.contains(*code))
    }

    /// The pre-resolution default (first entry).
    #[must_use]
    pub fn default_language(&self) -> LanguageCode {
        self.codes[0]
    }

    /// Locale-derived default, falling back to the first entry when the
    /// mapped code is not supported.
    #[must_use]
    pub fn for_locale(&self, locale: Option<&str>) -> LanguageCode {
        let mapped = locale.map_or(LanguageCode::En, LanguageCode::from_locale);
        if self.contains(mapped) {
            mapped
        } else {
            self.default_language()
        }
    }

    /// Members in configured order.
    pub fn iter(&self) -> impl Iterator<Item = LanguageCode> + '_ {
        self.codes.iter().copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

impl Default for SupportedLanguages {
    fn default() -> Self {
        Self {
            codes: LanguageCode::ALL.to_vec(),
        }
    }
}

impl TryFrom<Vec<LanguageCode>> for SupportedLanguages {
    type Error = LanguageError;

    fn try_from(codes: Vec<LanguageCode>) -> Result<Self, Self::Error> {
        Self::new(codes)
    }
}

impl From<SupportedLanguages> for Vec<LanguageCode> {
    fn from(set: SupportedLanguages) -> Self {
        set.codes
    }
}
