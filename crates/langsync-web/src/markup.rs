#![forbid(unsafe_code)]

//! Attribute conventions translated markup uses.
//!
//! ```html
//! <h1 data-lang-cn="欢迎" data-lang-en="Welcome" data-lang-jp="ようこそ">Welcome</h1>
//! <input data-placeholder-en="Search" data-placeholder-jp="検索">
//! <meta name="description" data-lang-en="..." data-lang-jp="...">
//! ```
//!
//! Kept free of `web-sys` so the naming rules are testable natively.

use langsync_core::LanguageCode;

/// Names of the per-language attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkupScheme {
    content_prefix: String,
    placeholder_prefix: String,
}

impl Default for MarkupScheme {
    fn default() -> Self {
        Self {
            content_prefix: "data-lang-".to_string(),
            placeholder_prefix: "data-placeholder-".to_string(),
        }
    }
}

impl MarkupScheme {
    #[must_use]
    pub fn content_attr(&self, language: LanguageCode) -> String {
        format!("{}{}", self.content_prefix, language.as_str())
    }

    #[must_use]
    pub fn placeholder_attr(&self, language: LanguageCode) -> String {
        format!("{}{}", self.placeholder_prefix, language.as_str())
    }

    /// Elements that declare content for `language`.
    #[must_use]
    pub fn content_selector(&self, language: LanguageCode) -> String {
        format!("[{}]", self.content_attr(language))
    }

    /// Elements that declare a placeholder for `language`.
    #[must_use]
    pub fn placeholder_selector(&self, language: LanguageCode) -> String {
        format!("[{}]", self.placeholder_attr(language))
    }
}

/// How a matched element receives its translated content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentTarget {
    /// `<meta>`: the `content` attribute.
    MetaContent,
    /// `<title>`: the document title.
    DocumentTitle,
    /// Anything else: inner HTML.
    InnerHtml,
}

impl ContentTarget {
    /// Pick the target for an element by its (case-insensitive) tag name.
    #[must_use]
    pub fn for_tag(tag_name: &str) -> Self {
        if tag_name.eq_ignore_ascii_case("meta") {
            Self::MetaContent
        } else if tag_name.eq_ignore_ascii_case("title") {
            Self::DocumentTitle
        } else {
            Self::InnerHtml
        }
    }
}
