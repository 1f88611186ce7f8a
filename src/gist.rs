//! Expansion of embedded GitHub Gist script tags into plain-text listings.
//!
//! Pages embed gists as `<script src="https://gist.github.com/...">` tags
//! whose fetched body injects a syntax-highlighted table via
//! `document.write` calls. An ebook can run none of that, so before the
//! standard pipeline the script tag is replaced with the listing
//! reconstructed as a `<pre>` block: one line per table row, line numbers
//! right-aligned, original row order preserved.

use std::path::Path;
use std::sync::OnceLock;

use html5ever::{LocalName, QualName, local_name, ns};
use regex::Regex;
use url::Url;

use crate::builder::ChapterBuilder;
use crate::chapter::Chapter;
use crate::clean::CleanFn;
use crate::dom::{self, Attribute, Dom, NodeData, NodeId};
use crate::error::{Error, Result};
use crate::fetch::{self, FetchError};

/// Host whose script tags get expanded; all others are left untouched.
const GIST_HOST: &str = "gist.github.com";

/// Class marker of the line-number cell in the injected table.
const BLOB_NUM: &str = "blob-num";
/// Class marker of the code cell.
const BLOB_CODE: &str = "blob-code";
/// Class marker of the attribution footer.
const GIST_META: &str = "gist-meta";

fn docwrite_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"document\.write\('(.+)'\)").unwrap())
}

/// A [`ChapterBuilder`] front end that materializes embedded gist snippets
/// before running the standard from-string pipeline.
pub struct GistExpander {
    builder: ChapterBuilder,
    agent: ureq::Agent,
}

impl Default for GistExpander {
    fn default() -> Self {
        Self::new()
    }
}

impl GistExpander {
    pub fn new() -> Self {
        Self::with_cleaner_builder(ChapterBuilder::new())
    }

    /// Use a custom sanitization policy in the wrapped builder.
    pub fn with_cleaner(clean: CleanFn) -> Self {
        Self::with_cleaner_builder(ChapterBuilder::with_cleaner(clean))
    }

    fn with_cleaner_builder(builder: ChapterBuilder) -> Self {
        Self {
            builder,
            agent: fetch::resource_agent(),
        }
    }

    /// Build a chapter from the page at `url`, expanding embedded gists.
    pub fn from_url(&self, url: &str, title: Option<&str>) -> Result<Chapter> {
        let body = fetch::fetch_page(self.builder.page_agent(), url)?;
        self.from_string(&body, Some(url), title)
    }

    /// Build a chapter from a file, expanding embedded gists.
    pub fn from_file(
        &self,
        file_name: impl AsRef<Path>,
        url: Option<&str>,
        title: Option<&str>,
    ) -> Result<Chapter> {
        let content = std::fs::read_to_string(file_name)?;
        self.from_string(&content, url, title)
    }

    /// Build a chapter from a raw markup string, expanding embedded gists
    /// first and then delegating to the standard pipeline with the
    /// originally supplied URL and title.
    pub fn from_string(&self, raw: &str, url: Option<&str>, title: Option<&str>) -> Result<Chapter> {
        let expanded = self.expand(raw)?;
        self.builder.from_string(&expanded, url, title)
    }

    /// Replace every gist-hosted script tag with its reconstructed listing.
    ///
    /// Script tags without a `src`, or pointing at any other host, are left
    /// alone. A snippet that cannot be fetched aborts the whole chapter;
    /// there is no fallback rendering for an unexpanded script.
    fn expand(&self, raw: &str) -> Result<String> {
        let mut tree = dom::parse_html(raw);
        for script in tree.find_all_by_tag("script") {
            let Some(src) = tree.attr(script, "src").map(str::to_string) else {
                continue;
            };
            let Ok(parsed) = Url::parse(&src) else {
                continue;
            };
            if parsed.host_str() != Some(GIST_HOST) {
                continue;
            }
            let js = self.fetch_listing(&src)?;
            splice_listing(&mut tree, script, &js);
        }
        Ok(dom::serialize(&tree))
    }

    /// Fetch the gist's JavaScript body, redirects enabled. A non-success
    /// status is a hard failure.
    fn fetch_listing(&self, url: &str) -> Result<String> {
        let bytes = fetch::fetch_bytes(&self.agent, url).map_err(|err| match err {
            FetchError::Status(status) => Error::Snippet {
                url: url.to_string(),
                status,
            },
            FetchError::Transport(reason) => Error::Source {
                url: url.to_string(),
                reason,
            },
        })?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Convenience constructor mirroring [`GistExpander::from_url`] with the
/// default configuration.
pub fn chapter_from_url(url: &str, title: Option<&str>) -> Result<Chapter> {
    GistExpander::new().from_url(url, title)
}

/// Convenience constructor mirroring [`GistExpander::from_file`].
pub fn chapter_from_file(
    file_name: impl AsRef<Path>,
    url: Option<&str>,
    title: Option<&str>,
) -> Result<Chapter> {
    GistExpander::new().from_file(file_name, url, title)
}

/// Convenience constructor mirroring [`GistExpander::from_string`].
pub fn chapter_from_string(raw: &str, url: Option<&str>, title: Option<&str>) -> Result<Chapter> {
    GistExpander::new().from_string(raw, url, title)
}

/// Replace `script` in `tree` with the listing reconstructed from the
/// fetched gist JavaScript.
fn splice_listing(tree: &mut Dom, script: NodeId, js: &str) {
    let fragment = extract_injected_markup(js);
    let frag = dom::parse_html(&fragment);

    let lines = collect_lines(&frag);
    let last_width = lines
        .last()
        .map(|(num, _)| num.chars().count() + 1)
        .unwrap_or(0);

    // The table layout cannot keep indentation, so the listing becomes a
    // pre block: "<num>: <code>" per row, numbers right-aligned to the
    // width of the last row's label.
    let mut text = String::from("\n");
    for (num, code) in &lines {
        text.push_str(&format!("{num:>last_width$}: {code}"));
        text.push('\n');
    }

    let pre = tree.create_element(
        QualName::new(None, ns!(html), local_name!("pre")),
        vec![Attribute {
            name: QualName::new(None, ns!(), LocalName::from("style")),
            value: "font-size: 80%;".to_string(),
        }],
    );
    tree.append_text(pre, &text);

    let mut replacements = vec![pre];
    if let Some(meta) = find_meta(&frag) {
        let copy = tree.import(&frag, meta);
        if copy.is_some() {
            replacements.push(copy);
        }
    }

    tree.replace_with(script, &replacements);
}

/// Pull the HTML fragment out of the gist's `document.write` calls.
///
/// Each call's argument is matched, escaped slashes are restored, and the
/// JavaScript string escapes are decoded; matches concatenate in order of
/// appearance.
fn extract_injected_markup(js: &str) -> String {
    let mut content = String::new();
    for capture in docwrite_regex().captures_iter(js) {
        content.push_str(&decode_js_escapes(&capture[1].replace("\\/", "/")));
    }
    content
}

/// Collect `(line number, code text)` pairs in row order.
///
/// Rows missing either recognized cell are skipped.
fn collect_lines(frag: &Dom) -> Vec<(String, String)> {
    let mut lines = Vec::new();
    for row in frag.find_all_by_tag("tr") {
        let num_cell = frag.find_from(row, |node| cell_with_class(node, BLOB_NUM));
        let code_cell = frag.find_from(row, |node| cell_with_class(node, BLOB_CODE));
        let (Some(num_cell), Some(code_cell)) = (num_cell, code_cell) else {
            continue;
        };
        let Some(number) = frag.attr(num_cell, "data-line-number") else {
            continue;
        };
        lines.push((number.to_string(), frag.text_content(code_cell)));
    }
    lines
}

fn cell_with_class(node: &crate::dom::Node, class: &str) -> bool {
    match &node.data {
        NodeData::Element { name, classes, .. } => {
            name.local.as_ref() == "td" && classes.iter().any(|c| c == class)
        }
        _ => false,
    }
}

/// The attribution footer, when the fragment carries one.
fn find_meta(frag: &Dom) -> Option<NodeId> {
    frag.find(|node| match &node.data {
        NodeData::Element { name, classes, .. } => {
            name.local.as_ref() == "div" && classes.iter().any(|c| c == GIST_META)
        }
        _ => false,
    })
}

/// Decode JavaScript string escape sequences into literal text.
///
/// Handles the simple escapes, `\xNN`, and `\uNNNN` including surrogate
/// pairs. An unknown escape decodes to the escaped character itself, which
/// also covers `\\`, `\'`, `\"`, and `\/`.
fn decode_js_escapes(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('b') => out.push('\u{0008}'),
            Some('f') => out.push('\u{000C}'),
            Some('v') => out.push('\u{000B}'),
            Some('0') => out.push('\0'),
            Some('x') => {
                if let Some(code) = take_hex(&mut chars, 2) {
                    if let Some(decoded) = char::from_u32(code) {
                        out.push(decoded);
                    }
                }
            }
            Some('u') => {
                if let Some(code) = take_hex(&mut chars, 4) {
                    if (0xD800..=0xDBFF).contains(&code) {
                        // High surrogate: the pair must follow as \uNNNN
                        let mut rest = chars.clone();
                        if rest.next() == Some('\\') && rest.next() == Some('u') {
                            if let Some(low) = take_hex(&mut rest, 4) {
                                if (0xDC00..=0xDFFF).contains(&low) {
                                    let combined =
                                        0x10000 + ((code - 0xD800) << 10) + (low - 0xDC00);
                                    if let Some(decoded) = char::from_u32(combined) {
                                        out.push(decoded);
                                        chars = rest;
                                    }
                                }
                            }
                        }
                    } else if let Some(decoded) = char::from_u32(code) {
                        out.push(decoded);
                    }
                }
            }
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

fn take_hex(chars: &mut std::str::Chars<'_>, digits: usize) -> Option<u32> {
    let mut value = 0u32;
    for _ in 0..digits {
        let digit = chars.next()?.to_digit(16)?;
        value = value * 16 + digit;
    }
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_simple_escapes() {
        assert_eq!(decode_js_escapes(r"a\nb\tc"), "a\nb\tc");
        assert_eq!(decode_js_escapes(r#"say \"hi\""#), r#"say "hi""#);
        assert_eq!(decode_js_escapes(r"it\'s"), "it's");
        assert_eq!(decode_js_escapes(r"back\\slash"), r"back\slash");
    }

    #[test]
    fn test_decode_hex_and_unicode() {
        assert_eq!(decode_js_escapes(r"\x41\x42"), "AB");
        assert_eq!(decode_js_escapes(r"caf\u00e9"), "café");
        // Surrogate pair
        assert_eq!(decode_js_escapes(r"\ud83d\ude00"), "\u{1F600}");
    }

    #[test]
    fn test_extract_concatenates_matches_in_order() {
        let js = concat!(
            "document.write('<div class=\\\"gist\\\">')\n",
            "document.write('<p>one<\\/p>')\n",
            "document.write('<\\/div>')\n",
        );
        assert_eq!(
            extract_injected_markup(js),
            "<div class=\"gist\"><p>one</p></div>"
        );
    }

    #[test]
    fn test_collect_lines_preserves_row_order() {
        let frag = dom::parse_html(
            r#"<table>
                <tr><td class="blob-num" data-line-number="10"></td><td class="blob-code">a</td></tr>
                <tr><td class="blob-num" data-line-number="11"></td><td class="blob-code">b</td></tr>
                <tr><td>no cells</td></tr>
                <tr><td class="blob-num" data-line-number="12"></td><td class="blob-code">c</td></tr>
            </table>"#,
        );
        let lines = collect_lines(&frag);
        assert_eq!(
            lines,
            vec![
                ("10".to_string(), "a".to_string()),
                ("11".to_string(), "b".to_string()),
                ("12".to_string(), "c".to_string()),
            ]
        );
    }

    #[test]
    fn test_splice_renders_aligned_listing() {
        let js = concat!(
            "document.write('<div id=\\\"gist\\\"><table>",
            "<tr><td class=\\\"blob-num js-line-number\\\" data-line-number=\\\"10\\\"><\\/td>",
            "<td class=\\\"blob-code blob-code-inner\\\">a<\\/td><\\/tr>",
            "<tr><td class=\\\"blob-num js-line-number\\\" data-line-number=\\\"11\\\"><\\/td>",
            "<td class=\\\"blob-code blob-code-inner\\\">b<\\/td><\\/tr>",
            "<tr><td class=\\\"blob-num js-line-number\\\" data-line-number=\\\"12\\\"><\\/td>",
            "<td class=\\\"blob-code blob-code-inner\\\">c<\\/td><\\/tr>",
            "<\\/table><\\/div>')",
        );

        let mut tree = dom::parse_html(r#"<body><p>before</p><script src="x"></script></body>"#);
        let script = tree.find_by_tag("script").unwrap();
        splice_listing(&mut tree, script, js);

        let out = dom::serialize(&tree);
        assert!(!out.contains("<script"));
        // Width of the last label ("12") plus one: numbers right-align to 3.
        assert!(out.contains("<pre style=\"font-size: 80%;\">\n 10: a\n 11: b\n 12: c\n</pre>"));
        let pre = tree.find_by_tag("pre").unwrap();
        assert_eq!(tree.text_content(pre), "\n 10: a\n 11: b\n 12: c\n");
    }

    #[test]
    fn test_splice_appends_meta_when_present() {
        let js = concat!(
            "document.write('<table>",
            "<tr><td class=\\\"blob-num\\\" data-line-number=\\\"1\\\"><\\/td>",
            "<td class=\\\"blob-code\\\">x = 1<\\/td><\\/tr>",
            "<\\/table>",
            "<div class=\\\"gist-meta\\\"><a href=\\\"https:\\/\\/gist.github.com\\/raw\\\">view raw<\\/a><\\/div>')",
        );

        let mut tree = dom::parse_html(r#"<body><script src="x"></script></body>"#);
        let script = tree.find_by_tag("script").unwrap();
        splice_listing(&mut tree, script, js);

        let out = dom::serialize(&tree);
        let pre_pos = out.find("<pre").unwrap();
        let meta_pos = out.find("gist-meta").unwrap();
        assert!(meta_pos > pre_pos);
        assert!(out.contains("view raw"));
    }

    #[test]
    fn test_splice_without_meta_omits_it() {
        let js = concat!(
            "document.write('<table>",
            "<tr><td class=\\\"blob-num\\\" data-line-number=\\\"1\\\"><\\/td>",
            "<td class=\\\"blob-code\\\">x<\\/td><\\/tr>",
            "<\\/table>')",
        );

        let mut tree = dom::parse_html(r#"<body><script src="x"></script></body>"#);
        let script = tree.find_by_tag("script").unwrap();
        splice_listing(&mut tree, script, js);

        let out = dom::serialize(&tree);
        assert!(out.contains("<pre"));
        assert!(!out.contains("gist-meta"));
    }

    #[test]
    fn test_code_with_markup_chars_survives_escaped() {
        let js = concat!(
            "document.write('<table>",
            "<tr><td class=\\\"blob-num\\\" data-line-number=\\\"1\\\"><\\/td>",
            "<td class=\\\"blob-code\\\">if a &lt; b {<\\/td><\\/tr>",
            "<\\/table>')",
        );

        let mut tree = dom::parse_html(r#"<body><script src="x"></script></body>"#);
        let script = tree.find_by_tag("script").unwrap();
        splice_listing(&mut tree, script, js);

        let pre = tree.find_by_tag("pre").unwrap();
        assert_eq!(tree.text_content(pre), "\n1: if a < b {\n");
        // Serialization re-escapes for XHTML safety
        assert!(dom::serialize(&tree).contains("if a &lt; b {"));
    }
}
