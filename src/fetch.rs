//! Blocking HTTP helpers shared by the page, image, and snippet fetch paths.
//!
//! Two agents with different redirect policies: page fetches never follow
//! redirects, resource fetches (images, snippets) do. Both send a fixed
//! desktop-browser user-agent, since some hosts reject requests without one.

use std::borrow::Cow;
use std::io::Read;
use std::time::Duration;

use log::debug;

use crate::error::{Error, Result};

/// Fixed desktop-browser user-agent sent with every request.
pub const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 6.1; WOW64; rv:31.0) Gecko/20100101 Firefox/31.0";

const TIMEOUT: Duration = Duration::from_secs(30);

/// Agent for page fetches: redirects disabled.
pub(crate) fn page_agent() -> ureq::Agent {
    ureq::builder()
        .redirects(0)
        .user_agent(USER_AGENT)
        .timeout(TIMEOUT)
        .build()
}

/// Agent for image and snippet fetches: redirects followed.
pub(crate) fn resource_agent() -> ureq::Agent {
    ureq::builder().user_agent(USER_AGENT).timeout(TIMEOUT).build()
}

/// Fetch a page body as decoded text.
///
/// Transport-level failures (malformed URL, DNS, connect, TLS) map to the
/// uniform [`Error::Source`]. An HTTP error status is not a failure: the
/// response body is still returned, the way a browser would render it.
pub(crate) fn fetch_page(agent: &ureq::Agent, url: &str) -> Result<String> {
    debug!("fetching page {url}");
    let response = match agent.get(url).call() {
        Ok(response) => response,
        Err(ureq::Error::Status(_, response)) => response,
        Err(err) => {
            return Err(Error::Source {
                url: url.to_string(),
                reason: err.to_string(),
            });
        }
    };

    let charset = response.charset().to_string();
    let mut bytes = Vec::new();
    response
        .into_reader()
        .read_to_end(&mut bytes)
        .map_err(|err| Error::Source {
            url: url.to_string(),
            reason: err.to_string(),
        })?;

    Ok(decode_text(&bytes, Some(&charset)).into_owned())
}

/// Fetch a resource body as raw bytes. Any failure, including an HTTP error
/// status, is an error; the status (when there is one) is reported.
pub(crate) fn fetch_bytes(agent: &ureq::Agent, url: &str) -> std::result::Result<Vec<u8>, FetchError> {
    debug!("fetching resource {url}");
    let response = agent.get(url).call().map_err(|err| match err {
        ureq::Error::Status(status, _) => FetchError::Status(status),
        other => FetchError::Transport(other.to_string()),
    })?;

    let mut bytes = Vec::new();
    response
        .into_reader()
        .read_to_end(&mut bytes)
        .map_err(|err| FetchError::Transport(err.to_string()))?;
    Ok(bytes)
}

/// Low-level fetch failure, classified for the two callers: image handling
/// treats both the same, snippet handling reports the status.
#[derive(Debug)]
pub(crate) enum FetchError {
    Status(u16),
    Transport(String),
}

/// Decode bytes to a string, handling various encodings.
///
/// Tries UTF-8 first (BOM handled automatically), then the hint encoding
/// from the Content-Type header, then falls back to Windows-1252.
pub(crate) fn decode_text<'a>(bytes: &'a [u8], hint_encoding: Option<&str>) -> Cow<'a, str> {
    let (result, _encoding, malformed) = encoding_rs::UTF_8.decode(bytes);

    if !malformed {
        return result;
    }

    if let Some(name) = hint_encoding
        && let Some(encoding) = encoding_rs::Encoding::for_label(name.as_bytes())
    {
        let (result, _, _) = encoding.decode(bytes);
        return result;
    }

    let (result, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_utf8() {
        assert_eq!(decode_text("héllo".as_bytes(), None), "héllo");
    }

    #[test]
    fn test_decode_with_hint() {
        // "café" in ISO-8859-1
        let bytes = [0x63, 0x61, 0x66, 0xE9];
        assert_eq!(decode_text(&bytes, Some("iso-8859-1")), "café");
    }

    #[test]
    fn test_decode_fallback_windows_1252() {
        // 0x93/0x94 are curly quotes in CP1252, invalid UTF-8
        let bytes = [0x93, 0x68, 0x69, 0x94];
        let decoded = decode_text(&bytes, None);
        assert_eq!(decoded, "\u{201c}hi\u{201d}");
    }

    #[test]
    fn test_transport_error_is_uniform_source_error() {
        let agent = page_agent();
        let err = fetch_page(&agent, "not a url").unwrap_err();
        assert!(matches!(err, Error::Source { .. }));
    }
}
