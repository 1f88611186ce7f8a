//! XHTML serialization for the arena [`Dom`].
//!
//! Emits strict, well-formed markup: void elements are self-closing
//! (`<br/>`, never `<br>`), attributes are double-quoted, and text content
//! is entity-escaped. This is the single point where the parser's HTML-style
//! serialization artifacts are corrected for XHTML output.

use std::fmt::Write;

use super::{Dom, NodeData, NodeId};

/// Elements with no content model, serialized in self-closing form.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Serialize the children of the document root back to markup text.
pub fn serialize(dom: &Dom) -> String {
    let mut out = String::new();
    for child in dom.children(dom.document()) {
        serialize_node(dom, child, &mut out);
    }
    out
}

fn serialize_node(dom: &Dom, id: NodeId, out: &mut String) {
    let Some(node) = dom.get(id) else {
        return;
    };

    match &node.data {
        NodeData::Document => {
            for child in dom.children(id) {
                serialize_node(dom, child, out);
            }
        }
        NodeData::Doctype { name, .. } => {
            let _ = write!(out, "<!DOCTYPE {name}>");
        }
        NodeData::Comment(text) => {
            let _ = write!(out, "<!--{text}-->");
        }
        NodeData::Text(text) => {
            out.push_str(&escape_text(text));
        }
        NodeData::Element { name, attrs, .. } => {
            let tag = name.local.as_ref();
            out.push('<');
            out.push_str(tag);
            for attr in attrs {
                let _ = write!(
                    out,
                    " {}=\"{}\"",
                    attr.name.local.as_ref(),
                    escape_text(&attr.value)
                );
            }

            if VOID_ELEMENTS.contains(&tag) {
                out.push_str("/>");
                return;
            }

            out.push('>');
            for child in dom.children(id) {
                serialize_node(dom, child, out);
            }
            let _ = write!(out, "</{tag}>");
        }
    }
}

/// Escape XML special characters.
pub fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
