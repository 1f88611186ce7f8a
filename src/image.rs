//! Image resolution: type detection and local capture.
//!
//! Given an image reference (remote URL or local path), [`save_image`]
//! produces exactly one `<name>.<ext>` file in the target directory, or
//! fails with [`Error::Image`] carrying the offending reference. The write
//! is staged through a temp file so a failed fetch never leaves a partial
//! file behind.

use std::fs;
use std::io::Write;
use std::path::Path;

use log::debug;
use tempfile::NamedTempFile;

use crate::error::{Error, Result};
use crate::fetch;

/// Detected raster image format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Gif,
    WebP,
}

impl ImageFormat {
    /// File extension used when saving.
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Png => "png",
            ImageFormat::Gif => "gif",
            ImageFormat::WebP => "webp",
        }
    }
}

/// Fast-path detection from the reference's trailing characters.
///
/// Only a small set of suffixes is trusted; everything else falls through
/// to content sniffing.
fn format_from_reference(reference: &str) -> Option<ImageFormat> {
    if reference.ends_with("jpg") || reference.ends_with("jpeg") {
        Some(ImageFormat::Jpeg)
    } else if reference.ends_with(".gif") {
        Some(ImageFormat::Gif)
    } else if reference.ends_with(".png") {
        Some(ImageFormat::Png)
    } else {
        None
    }
}

/// Classify an image by its leading byte signature.
pub fn sniff_format(data: &[u8]) -> Option<ImageFormat> {
    if data.len() >= 4 {
        // JPEG: FF D8
        if data[0] == 0xFF && data[1] == 0xD8 {
            return Some(ImageFormat::Jpeg);
        }
        // PNG: 89 50 4E 47 (.PNG)
        if data[0] == 0x89 && data[1] == 0x50 && data[2] == 0x4E && data[3] == 0x47 {
            return Some(ImageFormat::Png);
        }
        // GIF: 47 49 46 (GIF)
        if data[0] == 0x47 && data[1] == 0x49 && data[2] == 0x46 {
            return Some(ImageFormat::Gif);
        }
        // WebP: 52 49 46 46 ... 57 45 42 50 (RIFF...WEBP)
        if data.len() >= 12
            && data[0] == 0x52
            && data[1] == 0x49
            && data[2] == 0x46
            && data[3] == 0x46
            && data[8] == 0x57
            && data[9] == 0x45
            && data[10] == 0x42
            && data[11] == 0x50
        {
            return Some(ImageFormat::WebP);
        }
    }
    None
}

/// Save the image at `reference` into `image_dir` as `<name>.<ext>`,
/// reporting the detected format.
///
/// A reference that is an existing path on the local filesystem is read
/// directly, with no network access. Anything else is fetched over HTTP
/// with redirects enabled. Every failure mode (fetch, empty body,
/// unrecognizable type, write) collapses into [`Error::Image`] so the
/// caller can apply its drop-on-failure policy in one branch.
pub fn save_image(reference: &str, image_dir: &Path, name: &str) -> Result<ImageFormat> {
    let image_error = || Error::Image {
        url: reference.to_string(),
    };

    let data = if Path::new(reference).exists() {
        fs::read(reference).map_err(|_| image_error())?
    } else {
        let agent = fetch::resource_agent();
        fetch::fetch_bytes(&agent, reference).map_err(|_| image_error())?
    };
    if data.is_empty() {
        return Err(image_error());
    }

    let format = format_from_reference(reference)
        .or_else(|| sniff_format(&data))
        .ok_or_else(image_error)?;

    let target = image_dir.join(format!("{name}.{}", format.extension()));
    debug!("saving image {reference} as {}", target.display());

    let mut staged = NamedTempFile::new_in(image_dir).map_err(|_| image_error())?;
    staged.write_all(&data).map_err(|_| image_error())?;
    staged.persist(&target).map_err(|_| image_error())?;

    Ok(format)
}
