//! The validated chapter entity.

use std::fs;
use std::path::Path;

use log::warn;
use url::Url;
use uuid::Uuid;

use crate::dom::{self, Dom, NodeData};
use crate::error::{Error, Result};
use crate::image;

/// One unit of ebook content: a validated title, XHTML body, and optional
/// source URL.
///
/// By and large this shouldn't be constructed directly; use
/// [`ChapterBuilder`](crate::ChapterBuilder) or
/// [`GistExpander`](crate::GistExpander), which run raw markup through the
/// sanitize/convert pipeline first.
#[derive(Debug)]
pub struct Chapter {
    title: String,
    html_title: String,
    content: String,
    url: Option<Url>,
    tree: Dom,
}

impl Chapter {
    /// Create a chapter from already-converted XHTML content.
    ///
    /// Fails with [`Error::EmptyTitle`] or [`Error::EmptyContent`] when
    /// either string is empty. The escaped title variant is computed here
    /// and cached.
    pub fn new(
        content: impl Into<String>,
        title: impl Into<String>,
        url: Option<Url>,
    ) -> Result<Self> {
        let content = content.into();
        let title = title.into();
        if title.is_empty() {
            return Err(Error::EmptyTitle);
        }
        if content.is_empty() {
            return Err(Error::EmptyContent);
        }
        let html_title = dom::escape_text(&title);
        let tree = dom::parse_html(&content);
        Ok(Self {
            title,
            html_title,
            content,
            url,
            tree,
        })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Title with markup-special characters replaced by entities, safe for
    /// embedding in display contexts.
    pub fn html_title(&self) -> &str {
        &self.html_title
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// The source URL, or [`Error::NoUrl`] for chapters built without one.
    ///
    /// Callers relying on URL-derived behavior (resolving relative image
    /// paths, attribution) must handle the error explicitly.
    pub fn url(&self) -> Result<&Url> {
        self.url.as_ref().ok_or(Error::NoUrl)
    }

    /// Write the chapter content to an `.xhtml` file as UTF-8 bytes.
    ///
    /// Any other extension is rejected before the filesystem is touched.
    pub fn write(&self, file_name: impl AsRef<Path>) -> Result<()> {
        let path = file_name.as_ref();
        if !path.to_string_lossy().ends_with(".xhtml") {
            return Err(Error::InvalidExtension(path.to_path_buf()));
        }
        fs::write(path, self.content.as_bytes())?;
        Ok(())
    }

    /// Download every embedded image and rewrite its reference to a local
    /// copy under `<ebook_dir>/images`.
    ///
    /// The `images` subdirectory must already exist; its absence is a
    /// configuration error, never silently corrected. An image that cannot
    /// be resolved or fetched is removed from the content rather than left
    /// dangling. The content string is regenerated once at the end.
    pub fn localize_images(&mut self, ebook_dir: impl AsRef<Path>) -> Result<()> {
        let ebook_dir = ebook_dir.as_ref();
        let image_dir = ebook_dir.join("images");
        if !image_dir.is_dir() {
            return Err(Error::MissingImagesDir(ebook_dir.to_path_buf()));
        }

        let images = self.tree.find_all(|node| match &node.data {
            NodeData::Element { name, attrs, .. } => {
                name.local.as_ref() == "img"
                    && attrs.iter().any(|a| a.name.local.as_ref() == "src")
            }
            _ => false,
        });

        for node in images {
            let src = match self.tree.attr(node, "src") {
                Some(src) => src.to_string(),
                None => continue,
            };
            let Some(target) = self.resolve_reference(&src) else {
                warn!("dropping image {src}: unresolvable without a base URL");
                self.tree.detach(node);
                continue;
            };

            let name = Uuid::new_v4().to_string();
            match image::save_image(&target, &image_dir, &name) {
                Ok(format) => {
                    let local = format!("images/{name}.{}", format.extension());
                    self.tree.set_attr(node, "src", &local);
                }
                Err(err) => {
                    warn!("dropping image {target}: {err}");
                    self.tree.detach(node);
                }
            }
        }

        self.content = dom::serialize(&self.tree);
        self.tree = dom::parse_html(&self.content);
        Ok(())
    }

    /// Resolve an image reference against the chapter's base URL.
    ///
    /// A reference that is an existing local path resolves as itself.
    /// Without a base URL only absolute references resolve; anything else
    /// is reported unresolvable and handled by the caller's drop policy.
    fn resolve_reference(&self, src: &str) -> Option<String> {
        if Path::new(src).exists() {
            return Some(src.to_string());
        }
        match &self.url {
            Some(base) => base.join(src).ok().map(|u| u.to_string()),
            None => Url::parse(src).ok().map(|u| u.to_string()),
        }
    }
}
