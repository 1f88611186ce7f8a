//! Chapter construction from URLs, files, and raw markup strings.

use std::fs;
use std::path::Path;

use url::Url;

use crate::chapter::Chapter;
use crate::clean::{self, CleanFn};
use crate::dom;
use crate::error::Result;
use crate::fetch;

/// Title used when none is supplied and none can be extracted.
pub const DEFAULT_TITLE: &str = "Ebook Chapter";

/// Builds [`Chapter`]s from one of three sources, applying a consistent
/// sanitize → XHTML-convert → title-infer pipeline.
///
/// The sanitizer is an injected policy; [`ChapterBuilder::new`] uses the
/// baseline [`clean::clean`].
pub struct ChapterBuilder {
    clean: CleanFn,
    agent: ureq::Agent,
}

impl Default for ChapterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ChapterBuilder {
    pub fn new() -> Self {
        Self::with_cleaner(clean::clean)
    }

    /// Use a custom sanitization policy instead of the default cleaner.
    pub fn with_cleaner(clean: CleanFn) -> Self {
        Self {
            clean,
            agent: fetch::page_agent(),
        }
    }

    pub(crate) fn page_agent(&self) -> &ureq::Agent {
        &self.agent
    }

    /// Build a chapter from the page at `url`.
    ///
    /// The page is fetched with redirects disabled; connection failures,
    /// malformed URLs, and TLS failures all surface as the uniform
    /// [`Error::Source`](crate::Error::Source). The page as served (before
    /// any scripting) becomes the chapter content, and `url` its source.
    pub fn from_url(&self, url: &str, title: Option<&str>) -> Result<Chapter> {
        let body = fetch::fetch_page(&self.agent, url)?;
        self.from_string(&body, Some(url), title)
    }

    /// Build a chapter from an HTML or XHTML file, read as UTF-8.
    ///
    /// An optional `url` records where the file's content came from and
    /// serves as the base for relative image references.
    pub fn from_file(
        &self,
        file_name: impl AsRef<Path>,
        url: Option<&str>,
        title: Option<&str>,
    ) -> Result<Chapter> {
        let content = fs::read_to_string(file_name)?;
        self.from_string(&content, url, title)
    }

    /// Build a chapter from a raw markup string: the shared terminal step.
    ///
    /// Runs the injected sanitizer, converts to XHTML, and resolves the
    /// title: supplied value, else the raw markup's `<title>` text, else
    /// [`DEFAULT_TITLE`].
    pub fn from_string(&self, raw: &str, url: Option<&str>, title: Option<&str>) -> Result<Chapter> {
        let cleaned = (self.clean)(raw)?;
        let xhtml = clean::html_to_xhtml(&cleaned)?;
        let title = match title {
            Some(title) => title.to_string(),
            None => infer_title(raw),
        };
        let url = url.map(Url::parse).transpose()?;
        Chapter::new(xhtml, title, url)
    }
}

/// Extract the markup's `<title>` text, falling back to [`DEFAULT_TITLE`]
/// when absent, empty, or malformed.
fn infer_title(raw: &str) -> String {
    let tree = dom::parse_html(raw);
    tree.find_by_tag("title")
        .map(|node| tree.text_content(node).trim().to_string())
        .filter(|title| !title.is_empty())
        .unwrap_or_else(|| DEFAULT_TITLE.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_title_inferred_from_markup() {
        let builder = ChapterBuilder::new();
        let chapter = builder
            .from_string(
                "<html><head><title>Example</title></head><body><p>x</p></body></html>",
                None,
                None,
            )
            .unwrap();
        assert_eq!(chapter.title(), "Example");
    }

    #[test]
    fn test_default_title_when_absent() {
        let builder = ChapterBuilder::new();
        let chapter = builder
            .from_string("<html><body><p>x</p></body></html>", None, None)
            .unwrap();
        assert_eq!(chapter.title(), DEFAULT_TITLE);
    }

    #[test]
    fn test_supplied_title_wins() {
        let builder = ChapterBuilder::new();
        let chapter = builder
            .from_string(
                "<html><head><title>Ignored</title></head><body>x</body></html>",
                None,
                Some("Chosen"),
            )
            .unwrap();
        assert_eq!(chapter.title(), "Chosen");
    }

    #[test]
    fn test_content_is_sanitized_xhtml() {
        let builder = ChapterBuilder::new();
        let chapter = builder
            .from_string(
                "<html><body><script>alert('x')</script><p>keep<br>this</p></body></html>",
                None,
                None,
            )
            .unwrap();
        assert!(!chapter.content().contains("script"));
        assert!(chapter.content().contains("<br/>"));
        assert!(chapter.content().starts_with("<?xml"));
    }

    #[test]
    fn test_custom_cleaner_injected() {
        fn shouty(_raw: &str) -> Result<String> {
            Ok("<html><body><p>CLEANED</p></body></html>".to_string())
        }
        let builder = ChapterBuilder::with_cleaner(shouty);
        let chapter = builder.from_string("<p>whatever</p>", None, None).unwrap();
        assert!(chapter.content().contains("CLEANED"));
    }

    #[test]
    fn test_unreachable_url_is_source_error() {
        let builder = ChapterBuilder::new();
        let err = builder.from_url("not-a-url", None).unwrap_err();
        assert!(matches!(err, Error::Source { .. }));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let builder = ChapterBuilder::new();
        let err = builder.from_file("no/such/file.html", None, None).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
