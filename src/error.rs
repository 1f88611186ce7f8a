//! Error types for chapter construction and image handling.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while building or persisting a chapter.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("chapter title cannot be empty")]
    EmptyTitle,

    #[error("chapter content cannot be empty")]
    EmptyContent,

    #[error("chapter file name must end with .xhtml: {}", .0.display())]
    InvalidExtension(PathBuf),

    #[error("chapter has no source URL")]
    NoUrl,

    #[error("{} does not contain an images subdirectory", .0.display())]
    MissingImagesDir(PathBuf),

    #[error("error downloading image from {url}")]
    Image { url: String },

    #[error("{url} is not a usable source: {reason}")]
    Source { url: String, reason: String },

    #[error("error fetching snippet {url}: status {status}")]
    Snippet { url: String, status: u16 },
}

pub type Result<T> = std::result::Result<T, Error>;
