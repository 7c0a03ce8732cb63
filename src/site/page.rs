// src/site/page.rs
use crate::utils::error::SiteError;
use scraper::{Html, Selector};

/// Selector of the embedded report viewer on a document page.
pub const DEFAULT_VIEWER_SELECTOR: &str = "#annual-report";

/// Finds the embedded viewer on a document page.
pub struct ViewerLocator {
    css: String,
    selector: Selector,
}

impl ViewerLocator {
    pub fn new(css: &str) -> Result<Self, SiteError> {
        let selector =
            Selector::parse(css).map_err(|_| SiteError::InvalidSelector(css.to_string()))?;
        Ok(Self { css: css.to_string(), selector })
    }

    /// Returns the viewer's `src` attribute.
    ///
    /// A missing element is an error (the page did not render the viewer); an
    /// element without a `src` is `Ok(None)` and left to the URL resolver.
    pub fn viewer_src(&self, html: &str, page_url: &str) -> Result<Option<String>, SiteError> {
        let document = Html::parse_document(html);
        let element = document
            .select(&self.selector)
            .next()
            .ok_or_else(|| SiteError::ElementNotFound {
                selector: self.css.clone(),
                url: page_url.to_string(),
            })?;

        Ok(element.value().attr("src").map(|s| s.trim().to_string()))
    }
}

impl Default for ViewerLocator {
    fn default() -> Self {
        Self {
            css: DEFAULT_VIEWER_SELECTOR.to_string(),
            selector: Selector::parse(DEFAULT_VIEWER_SELECTOR)
                .expect("Failed to compile DEFAULT_VIEWER_SELECTOR"),
        }
    }
}
