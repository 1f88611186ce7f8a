//! Baseline markup sanitization and XHTML conversion.
//!
//! These are the two collaborators the chapter pipeline runs raw markup
//! through before a [`Chapter`](crate::Chapter) is constructed. The
//! sanitizer is replaceable: [`ChapterBuilder`](crate::ChapterBuilder)
//! accepts any [`CleanFn`], defaulting to [`clean`].

use crate::dom::{self, NodeData};
use crate::error::Result;

/// A sanitization policy: raw markup in, cleaned markup out.
pub type CleanFn = fn(&str) -> Result<String>;

/// Attributes stripped from every element by the default cleaner.
const REMOVABLE_ATTRS: &[&str] = &[
    "onclick",
    "onload",
    "onerror",
    "onmouseover",
    "onmouseout",
    "onfocus",
    "onblur",
];

/// Default cleaner: removes active content and scripting hooks.
///
/// Drops `script`, `noscript`, and `style` elements, strips inline event
/// handlers and `data-*` attributes, and re-serializes.
pub fn clean(html: &str) -> Result<String> {
    let mut tree = dom::parse_html(html);

    let to_remove = tree.find_all(|node| match &node.data {
        NodeData::Element { name, .. } => {
            matches!(name.local.as_ref(), "script" | "noscript" | "style")
        }
        _ => false,
    });
    for node in to_remove {
        tree.detach(node);
    }

    let elements = tree.find_all(|node| matches!(node.data, NodeData::Element { .. }));
    for id in elements {
        let dropped: Vec<String> = match tree.get(id).map(|n| &n.data) {
            Some(NodeData::Element { attrs, .. }) => attrs
                .iter()
                .map(|a| a.name.local.as_ref().to_string())
                .filter(|name| REMOVABLE_ATTRS.contains(&name.as_str()) || name.starts_with("data-"))
                .collect(),
            _ => Vec::new(),
        };
        for name in dropped {
            tree.remove_attr(id, &name);
        }
    }

    Ok(dom::serialize(&tree))
}

/// Convert cleaned markup to a well-formed XHTML document.
///
/// Parses with the browser algorithm (which supplies `html`/`head`/`body`
/// structure), forces the XHTML namespace onto the root element, and
/// serializes through the XHTML-safe serializer. An XML declaration is
/// prepended when missing.
pub fn html_to_xhtml(html: &str) -> Result<String> {
    let mut tree = dom::parse_html(html);

    if let Some(root) = tree.find_by_tag("html") {
        tree.set_attr(root, "xmlns", "http://www.w3.org/1999/xhtml");
    }

    let mut result = dom::serialize(&tree);
    if !result.starts_with("<?xml") {
        result = format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{result}");
    }

    Ok(result)
}
