#![forbid(unsafe_code)]

use tracing::{debug, trace};

use crate::language::LanguageCode;

/// The page being translated.
///
/// Implementations rewrite text, placeholders, metadata and the document
/// language attribute for one language, and move selector controls to it.
pub trait PageSink {
    fn render(&mut self, language: LanguageCode);
    fn sync_selectors(&mut self, language: LanguageCode);
}

/// Applies the active language to a [`PageSink`], at most once per change.
#[derive(Debug)]
pub struct UiApplier<P> {
    page: P,
    active: LanguageCode,
    rendered: bool,
}

impl<P> UiApplier<P> {
    /// `initial` is the value the page shows before anything was applied.
    pub fn new(page: P, initial: LanguageCode) -> Self {
        Self {
            page,
            active: initial,
            rendered: false,
        }
    }

    #[must_use]
    pub fn active(&self) -> LanguageCode {
        self.active
    }

    /// Whether anything has been rendered since load.
    #[must_use]
    pub fn has_rendered(&self) -> bool {
        self.rendered
    }

    pub fn page(&self) -> &P {
        &self.page
    }
}

impl<P: PageSink> UiApplier<P> {
    /// Make `language` active and rewrite the page.
    ///
    /// Returns `false` without touching the page when `language` is already
    /// active and has been rendered. The first call after load always renders.
    pub fn apply(&mut self, language: LanguageCode) -> bool {
        if self.rendered && self.active == language {
            trace!(%language, "language already active");
            return false;
        }
        debug!(from = %self.active, to = %language, "applying language");
        self.active = language;
        self.rendered = true;
        self.page.render(language);
        self.page.sync_selectors(language);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::RecordingPage;

    #[test]
    fn repeated_apply_renders_once() {
        for language in LanguageCode::ALL {
            let page = RecordingPage::new();
            let mut applier = UiApplier::new(page.clone(), LanguageCode::Cn);
            assert!(applier.apply(language));
            assert!(!applier.apply(language));
            assert_eq!(page.renders(), vec![language]);
            assert_eq!(page.selector_updates(), vec![language]);
        }
    }

    #[test]
    fn first_apply_renders_even_when_equal_to_initial() {
        let page = RecordingPage::new();
        let mut applier = UiApplier::new(page.clone(), LanguageCode::En);
        assert!(!applier.has_rendered());
        assert!(applier.apply(LanguageCode::En));
        assert!(applier.has_rendered());
        assert_eq!(page.render_count(), 1);
    }

    #[test]
    fn accessors_do_not_need_a_page_sink() {
        let applier = UiApplier::new("not a page", LanguageCode::Jp);
        assert_eq!(applier.active(), LanguageCode::Jp);
        assert!(!applier.has_rendered());
        assert_eq!(*applier.page(), "not a page");
    }

    #[test]
    fn switching_languages_renders_each_change() {
        let page = RecordingPage::new();
        let mut applier = UiApplier::new(page.clone(), LanguageCode::Cn);
        applier.apply(LanguageCode::En);
        applier.apply(LanguageCode::Jp);
        applier.apply(LanguageCode::Jp);
        applier.apply(LanguageCode::En);
        assert_eq!(
            page.renders(),
            vec![LanguageCode::En, LanguageCode::Jp, LanguageCode::En]
        );
        assert_eq!(applier.active(), LanguageCode::En);
    }
}
