//! # chapterize
//!
//! Turn web pages, local files, and raw markup strings into self-contained
//! ebook chapters: inline-safe XHTML content, a validated title, and images
//! downloaded and rewritten to reference local copies.
//!
//! ## Features
//!
//! - Build chapters from a URL, a file, or a string through one
//!   sanitize → XHTML-convert → title-infer pipeline
//! - Download embedded images, sniff their real format, and rewrite
//!   references to an `images/` directory; broken images are dropped, not
//!   left dangling
//! - Expand embedded GitHub Gist script tags into plain-text code listings
//!   with aligned line numbers
//!
//! ## Quick Start
//!
//! ```no_run
//! use chapterize::chapter_from_url;
//!
//! // Fetch a page, expand gists, sanitize, and localize its images
//! let mut chapter = chapter_from_url("https://example.com/article", None).unwrap();
//! chapter.localize_images("my-ebook").unwrap(); // my-ebook/images must exist
//! chapter.write("my-ebook/article.xhtml").unwrap();
//! ```
//!
//! ## Working with raw markup
//!
//! ```
//! use chapterize::ChapterBuilder;
//!
//! let builder = ChapterBuilder::new();
//! let chapter = builder
//!     .from_string(
//!         "<html><head><title>One</title></head><body><p>Text</p></body></html>",
//!         None,
//!         None,
//!     )
//!     .unwrap();
//! assert_eq!(chapter.title(), "One");
//! ```

pub mod builder;
pub mod chapter;
pub mod clean;
pub(crate) mod dom;
pub mod error;
pub(crate) mod fetch;
pub mod gist;
pub mod image;

pub use builder::{ChapterBuilder, DEFAULT_TITLE};
pub use chapter::Chapter;
pub use clean::CleanFn;
pub use error::{Error, Result};
pub use fetch::USER_AGENT;
pub use gist::{GistExpander, chapter_from_file, chapter_from_string, chapter_from_url};
pub use image::{ImageFormat, save_image};
