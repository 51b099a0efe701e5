#![forbid(unsafe_code)]

use langsync_core::{LanguageCode, PageSink};
use tracing::{trace, warn};
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, HtmlSelectElement, Window};

use crate::markup::{ContentTarget, MarkupScheme};

/// Rewrites the live document for a language.
pub struct DomPage {
    window: Window,
    scheme: MarkupScheme,
    selector_ids: Vec<String>,
}

impl DomPage {
    pub fn new(window: Window, selector_ids: Vec<String>) -> Self {
        Self {
            window,
            scheme: MarkupScheme::default(),
            selector_ids,
        }
    }

    fn document(&self) -> Option<Document> {
        self.window.document()
    }

    /// `<select>` controls that exist on this page.
    pub fn selectors(&self) -> Vec<HtmlSelectElement> {
        let Some(document) = self.document() else {
            return Vec::new();
        };
        self.selector_ids
            .iter()
            .filter_map(|id| document.get_element_by_id(id))
            .filter_map(|el| el.dyn_into::<HtmlSelectElement>().ok())
            .collect()
    }

    fn for_each_match(document: &Document, selector: &str, mut f: impl FnMut(Element)) {
        let nodes = match document.query_selector_all(selector) {
            Ok(nodes) => nodes,
            Err(_) => {
                warn!(selector, "invalid selector");
                return;
            }
        };
        (0..nodes.length())
            .filter_map(|idx| nodes.item(idx))
            .filter_map(|node| node.dyn_into::<Element>().ok())
            .for_each(&mut f);
    }
}

impl PageSink for DomPage {
    fn render(&mut self, language: LanguageCode) {
        let Some(document) = self.document() else {
            warn!("no document to render into");
            return;
        };

        let content_attr = self.scheme.content_attr(language);
        let mut rewritten = 0usize;
        Self::for_each_match(&document, &self.scheme.content_selector(language), |el| {
            let Some(text) = el.get_attribute(&content_attr) else {
                return;
            };
            match ContentTarget::for_tag(&el.tag_name()) {
                ContentTarget::MetaContent => {
                    let _ = el.set_attribute("content", &text);
                }
                ContentTarget::DocumentTitle => document.set_title(&text),
                ContentTarget::InnerHtml => el.set_inner_html(&text),
            }
            rewritten += 1;
        });

        let placeholder_attr = self.scheme.placeholder_attr(language);
        Self::for_each_match(
            &document,
            &self.scheme.placeholder_selector(language),
            |el| {
                if let Some(text) = el.get_attribute(&placeholder_attr) {
                    let _ = el.set_attribute("placeholder", &text);
                    rewritten += 1;
                }
            },
        );

        if let Some(root) = document.document_element() {
            let _ = root.set_attribute("lang", language.bcp47());
        }
        trace!(%language, rewritten, "page rendered");
    }

    fn sync_selectors(&mut self, language: LanguageCode) {
        for select in self.selectors() {
            if select.value() != language.as_str() {
                select.set_value(language.as_str());
            }
        }
    }
}
