//! End-to-end pipeline tests for the builder front ends (offline paths).

use std::fs;

use chapterize::{ChapterBuilder, DEFAULT_TITLE, Error, GistExpander, Result};
use tempfile::TempDir;

// ============================================================================
// String Pipeline Tests
// ============================================================================

#[test]
fn test_title_extracted_from_markup() {
    let chapter = ChapterBuilder::new()
        .from_string(
            "<html><head><title>Example</title></head><body><p>x</p></body></html>",
            None,
            None,
        )
        .unwrap();
    assert_eq!(chapter.title(), "Example");
}

#[test]
fn test_title_defaults_when_no_title_tag() {
    let chapter = ChapterBuilder::new()
        .from_string("<html><body><p>x</p></body></html>", None, None)
        .unwrap();
    assert_eq!(chapter.title(), DEFAULT_TITLE);
}

#[test]
fn test_pipeline_produces_wellformed_xhtml() {
    let chapter = ChapterBuilder::new()
        .from_string(
            "<html><body><p onclick=\"evil()\">a<br>b</p><script>x()</script></body></html>",
            Some("https://example.com/page"),
            Some("T"),
        )
        .unwrap();

    let content = chapter.content();
    assert!(content.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
    assert!(content.contains(r#"xmlns="http://www.w3.org/1999/xhtml""#));
    assert!(content.contains("<br/>"));
    assert!(!content.contains("onclick"));
    assert!(!content.contains("script"));
    assert_eq!(chapter.url().unwrap().as_str(), "https://example.com/page");
}

// ============================================================================
// File Pipeline Tests
// ============================================================================

#[test]
fn test_from_file_reads_utf8_and_keeps_optional_url() {
    let dir = TempDir::new().unwrap();
    let page = dir.path().join("saved.html");
    fs::write(
        &page,
        "<html><head><title>Saved Page</title></head><body><p>café</p></body></html>",
    )
    .unwrap();

    let chapter = ChapterBuilder::new()
        .from_file(&page, Some("https://example.com/mirror"), None)
        .unwrap();
    assert_eq!(chapter.title(), "Saved Page");
    assert!(chapter.content().contains("café"));
    assert_eq!(
        chapter.url().unwrap().as_str(),
        "https://example.com/mirror"
    );
}

// ============================================================================
// Gist Expander Tests (no gist host contacted)
// ============================================================================

/// Pass-through cleaner so script tags survive the pipeline and the
/// expander's selectivity is observable.
fn keep_everything(raw: &str) -> Result<String> {
    Ok(raw.to_string())
}

#[test]
fn test_non_gist_scripts_left_untouched() {
    let expander = GistExpander::with_cleaner(keep_everything);
    let chapter = expander
        .from_string(
            r#"<html><body><script src="https://cdn.example.com/app.js"></script><p>x</p></body></html>"#,
            None,
            Some("T"),
        )
        .unwrap();
    assert!(
        chapter
            .content()
            .contains(r#"<script src="https://cdn.example.com/app.js">"#)
    );
}

#[test]
fn test_scripts_without_src_left_untouched() {
    let expander = GistExpander::with_cleaner(keep_everything);
    let chapter = expander
        .from_string(
            "<html><body><script>inline()</script><p>x</p></body></html>",
            None,
            Some("T"),
        )
        .unwrap();
    assert!(chapter.content().contains("inline()"));
}

#[test]
fn test_expander_matches_standard_pipeline_without_gists() {
    let raw = "<html><head><title>Same</title></head><body><p>body</p></body></html>";
    let via_builder = ChapterBuilder::new().from_string(raw, None, None).unwrap();
    let via_expander = GistExpander::new().from_string(raw, None, None).unwrap();

    assert_eq!(via_builder.title(), via_expander.title());
    assert_eq!(via_builder.content(), via_expander.content());
}

// ============================================================================
// Error Surface Tests
// ============================================================================

#[test]
fn test_invalid_url_is_uniform_source_error() {
    let err = ChapterBuilder::new()
        .from_url("htp:/broken url", None)
        .unwrap_err();
    match err {
        Error::Source { url, .. } => assert_eq!(url, "htp:/broken url"),
        other => panic!("expected Source error, got {other:?}"),
    }
}

#[test]
fn test_missing_input_file_errors() {
    let err = ChapterBuilder::new()
        .from_file("does/not/exist.html", None, None)
        .unwrap_err();
    assert!(matches!(err, Error::Io(_)));
}
