//! Arena-based content tree for chapter markup.
//!
//! Chapter content is parsed once into a [`Dom`] and mutated in place
//! (image sources rewritten, dead nodes detached, snippet scripts replaced),
//! then serialized back into the canonical XHTML string. All nodes live in a
//! contiguous vector; parent/child/sibling links are indices into it.

mod serialize;
mod sink;

pub use serialize::{escape_text, serialize};

use html5ever::driver::ParseOpts;
use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use html5ever::{LocalName, QualName, ns};

use sink::Sink;

/// Parse markup into a [`Dom`] using the browser parsing algorithm.
pub fn parse_html(html: &str) -> Dom {
    let sink = Sink::new();
    let result = parse_document(sink, ParseOpts::default())
        .from_utf8()
        .one(html.as_bytes());
    result.into_dom()
}

/// Unique identifier for a node in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

impl NodeId {
    /// Sentinel value for no node.
    pub const NONE: NodeId = NodeId(u32::MAX);

    pub fn is_some(self) -> bool {
        self.0 != u32::MAX
    }

    pub fn is_none(self) -> bool {
        self.0 == u32::MAX
    }
}

/// Node type in the content tree.
#[derive(Debug, Clone)]
pub enum NodeData {
    /// Document root.
    Document,
    /// Element with name and attributes.
    Element {
        name: QualName,
        attrs: Vec<Attribute>,
        /// Pre-split class list for fast class queries.
        classes: Vec<String>,
    },
    /// Text content.
    Text(String),
    /// Comment (preserved through serialization).
    Comment(String),
    /// Document type declaration.
    Doctype {
        name: String,
        public_id: String,
        system_id: String,
    },
}

/// Markup attribute.
#[derive(Debug, Clone)]
pub struct Attribute {
    pub name: QualName,
    pub value: String,
}

/// A node in the content tree.
#[derive(Debug)]
pub struct Node {
    pub data: NodeData,
    pub parent: NodeId,
    pub first_child: NodeId,
    pub last_child: NodeId,
    pub prev_sibling: NodeId,
    pub next_sibling: NodeId,
}

impl Node {
    fn new(data: NodeData) -> Self {
        Self {
            data,
            parent: NodeId::NONE,
            first_child: NodeId::NONE,
            last_child: NodeId::NONE,
            prev_sibling: NodeId::NONE,
            next_sibling: NodeId::NONE,
        }
    }
}

/// Arena-allocated content tree.
#[derive(Debug)]
pub struct Dom {
    nodes: Vec<Node>,
    document: NodeId,
}

impl Dom {
    /// Create a new empty tree with a document root.
    pub fn new() -> Self {
        let mut dom = Self {
            nodes: Vec::new(),
            document: NodeId::NONE,
        };
        dom.document = dom.alloc(Node::new(NodeData::Document));
        dom
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    /// Get the document root ID.
    pub fn document(&self) -> NodeId {
        self.document
    }

    /// Get a node by ID.
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        if id.is_none() {
            return None;
        }
        self.nodes.get(id.0 as usize)
    }

    /// Get a mutable node by ID.
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        if id.is_none() {
            return None;
        }
        self.nodes.get_mut(id.0 as usize)
    }

    /// Create a new element node.
    pub fn create_element(&mut self, name: QualName, attrs: Vec<Attribute>) -> NodeId {
        let classes = attrs
            .iter()
            .find(|a| a.name.local.as_ref() == "class")
            .map(|a| a.value.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();

        self.alloc(Node::new(NodeData::Element {
            name,
            attrs,
            classes,
        }))
    }

    /// Create a new text node.
    pub fn create_text(&mut self, text: String) -> NodeId {
        self.alloc(Node::new(NodeData::Text(text)))
    }

    /// Create a new comment node.
    pub fn create_comment(&mut self, text: String) -> NodeId {
        self.alloc(Node::new(NodeData::Comment(text)))
    }

    /// Create a doctype node.
    pub fn create_doctype(&mut self, name: String, public_id: String, system_id: String) -> NodeId {
        self.alloc(Node::new(NodeData::Doctype {
            name,
            public_id,
            system_id,
        }))
    }

    /// Append a child to a parent node.
    pub fn append(&mut self, parent: NodeId, child: NodeId) {
        let last_child = self.get(parent).map(|n| n.last_child).unwrap_or(NodeId::NONE);

        if let Some(child_node) = self.get_mut(child) {
            child_node.parent = parent;
            child_node.prev_sibling = last_child;
        }

        if last_child.is_some() {
            if let Some(last_node) = self.get_mut(last_child) {
                last_node.next_sibling = child;
            }
        }

        if let Some(parent_node) = self.get_mut(parent) {
            if parent_node.first_child.is_none() {
                parent_node.first_child = child;
            }
            parent_node.last_child = child;
        }
    }

    /// Insert a node before a sibling.
    pub fn insert_before(&mut self, sibling: NodeId, new_node: NodeId) {
        let parent = self.get(sibling).map(|n| n.parent).unwrap_or(NodeId::NONE);
        let prev = self
            .get(sibling)
            .map(|n| n.prev_sibling)
            .unwrap_or(NodeId::NONE);

        if let Some(new) = self.get_mut(new_node) {
            new.parent = parent;
            new.prev_sibling = prev;
            new.next_sibling = sibling;
        }

        if let Some(sib) = self.get_mut(sibling) {
            sib.prev_sibling = new_node;
        }

        if prev.is_some() {
            if let Some(p) = self.get_mut(prev) {
                p.next_sibling = new_node;
            }
        } else if let Some(par) = self.get_mut(parent) {
            par.first_child = new_node;
        }
    }

    /// Append text to an existing text node, or create new if last child isn't text.
    pub fn append_text(&mut self, parent: NodeId, text: &str) {
        let last_child = self.get(parent).map(|n| n.last_child).unwrap_or(NodeId::NONE);

        if let Some(last) = self.get_mut(last_child) {
            if let NodeData::Text(ref mut existing) = last.data {
                existing.push_str(text);
                return;
            }
        }

        let text_node = self.create_text(text.to_string());
        self.append(parent, text_node);
    }

    /// Unlink a node from its parent and siblings. The node stays in the
    /// arena but is no longer reachable from the document root.
    pub fn detach(&mut self, target: NodeId) {
        let (parent, prev, next) = {
            let node = match self.get(target) {
                Some(n) => n,
                None => return,
            };
            (node.parent, node.prev_sibling, node.next_sibling)
        };

        if prev.is_some() {
            if let Some(p) = self.get_mut(prev) {
                p.next_sibling = next;
            }
        } else if parent.is_some() {
            if let Some(p) = self.get_mut(parent) {
                p.first_child = next;
            }
        }

        if next.is_some() {
            if let Some(n) = self.get_mut(next) {
                n.prev_sibling = prev;
            }
        } else if parent.is_some() {
            if let Some(p) = self.get_mut(parent) {
                p.last_child = prev;
            }
        }

        if let Some(target_node) = self.get_mut(target) {
            target_node.parent = NodeId::NONE;
            target_node.prev_sibling = NodeId::NONE;
            target_node.next_sibling = NodeId::NONE;
        }
    }

    /// Replace a node with a sequence of new nodes, in order.
    pub fn replace_with(&mut self, target: NodeId, replacements: &[NodeId]) {
        for &node in replacements {
            self.insert_before(target, node);
        }
        self.detach(target);
    }

    /// Iterate over children of a node.
    pub fn children(&self, parent: NodeId) -> ChildrenIter<'_> {
        let first = self
            .get(parent)
            .map(|n| n.first_child)
            .unwrap_or(NodeId::NONE);
        ChildrenIter {
            dom: self,
            current: first,
        }
    }

    /// Find the first node matching a predicate (document-order DFS).
    pub fn find<F>(&self, predicate: F) -> Option<NodeId>
    where
        F: Fn(&Node) -> bool,
    {
        self.find_from(self.document, predicate)
    }

    /// Find the first matching node within a subtree.
    pub fn find_from<F>(&self, root: NodeId, predicate: F) -> Option<NodeId>
    where
        F: Fn(&Node) -> bool,
    {
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if let Some(node) = self.get(id) {
                if id != root && predicate(node) {
                    return Some(id);
                }
                let mut children: Vec<_> = self.children(id).collect();
                children.reverse();
                stack.extend(children);
            }
        }
        None
    }

    /// Collect all nodes matching a predicate, in document order.
    pub fn find_all<F>(&self, predicate: F) -> Vec<NodeId>
    where
        F: Fn(&Node) -> bool,
    {
        let mut results = Vec::new();
        let mut stack = vec![self.document];
        while let Some(id) = stack.pop() {
            if let Some(node) = self.get(id) {
                if predicate(node) {
                    results.push(id);
                }
                let mut children: Vec<_> = self.children(id).collect();
                children.reverse();
                stack.extend(children);
            }
        }
        results
    }

    /// First element with the given tag name.
    pub fn find_by_tag(&self, tag: &str) -> Option<NodeId> {
        self.find(|node| node_has_tag(node, tag))
    }

    /// All elements with the given tag name, in document order.
    pub fn find_all_by_tag(&self, tag: &str) -> Vec<NodeId> {
        self.find_all(|node| node_has_tag(node, tag))
    }

    /// First descendant of `root` with the given tag name.
    pub fn find_by_tag_from(&self, root: NodeId, tag: &str) -> Option<NodeId> {
        self.find_from(root, |node| node_has_tag(node, tag))
    }

    /// Get element's local name (tag).
    pub fn tag_name(&self, id: NodeId) -> Option<&LocalName> {
        self.get(id).and_then(|n| match &n.data {
            NodeData::Element { name, .. } => Some(&name.local),
            _ => None,
        })
    }

    /// Get an attribute value.
    pub fn attr(&self, id: NodeId, attr_name: &str) -> Option<&str> {
        self.get(id).and_then(|n| match &n.data {
            NodeData::Element { attrs, .. } => attrs
                .iter()
                .find(|a| a.name.local.as_ref() == attr_name)
                .map(|a| a.value.as_str()),
            _ => None,
        })
    }

    /// Set an attribute, replacing any existing value.
    pub fn set_attr(&mut self, id: NodeId, attr_name: &str, value: &str) {
        if let Some(node) = self.get_mut(id) {
            if let NodeData::Element { attrs, .. } = &mut node.data {
                for attr in attrs.iter_mut() {
                    if attr.name.local.as_ref() == attr_name {
                        attr.value = value.to_string();
                        return;
                    }
                }
                attrs.push(Attribute {
                    name: QualName::new(None, ns!(), LocalName::from(attr_name)),
                    value: value.to_string(),
                });
            }
        }
    }

    /// Remove an attribute if present.
    pub fn remove_attr(&mut self, id: NodeId, attr_name: &str) {
        if let Some(node) = self.get_mut(id) {
            if let NodeData::Element { attrs, .. } = &mut node.data {
                attrs.retain(|a| a.name.local.as_ref() != attr_name);
            }
        }
    }

    /// Check whether an element carries the given class token.
    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.get(id).is_some_and(|n| match &n.data {
            NodeData::Element { classes, .. } => classes.iter().any(|c| c == class),
            _ => false,
        })
    }

    /// Concatenated text of a subtree, tags ignored.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut text = String::new();
        self.collect_text(id, &mut text);
        text
    }

    fn collect_text(&self, id: NodeId, text: &mut String) {
        match self.get(id).map(|n| &n.data) {
            Some(NodeData::Text(s)) => text.push_str(s),
            Some(NodeData::Element { .. }) | Some(NodeData::Document) => {
                for child in self.children(id).collect::<Vec<_>>() {
                    self.collect_text(child, text);
                }
            }
            _ => {}
        }
    }

    /// Deep-copy a subtree from another tree into this one. Returns the ID
    /// of the copied root. The copy is detached; the caller decides where
    /// to attach it.
    pub fn import(&mut self, other: &Dom, node: NodeId) -> NodeId {
        let data = match other.get(node) {
            Some(n) => n.data.clone(),
            None => return NodeId::NONE,
        };
        let copy = self.alloc(Node::new(data));
        for child in other.children(node).collect::<Vec<_>>() {
            let child_copy = self.import(other, child);
            if child_copy.is_some() {
                self.append(copy, child_copy);
            }
        }
        copy
    }

    /// Get the number of nodes allocated (including detached ones).
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the tree is empty (only has the document root).
    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }
}

fn node_has_tag(node: &Node, tag: &str) -> bool {
    match &node.data {
        NodeData::Element { name, .. } => name.local.as_ref() == tag,
        _ => false,
    }
}

impl Default for Dom {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over children of a node.
pub struct ChildrenIter<'a> {
    dom: &'a Dom,
    current: NodeId,
}

impl Iterator for ChildrenIter<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current.is_none() {
            return None;
        }
        let id = self.current;
        self.current = self
            .dom
            .get(id)
            .map(|n| n.next_sibling)
            .unwrap_or(NodeId::NONE);
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use html5ever::{LocalName, QualName, ns};

    use super::*;

    fn make_qname(local: &str) -> QualName {
        QualName::new(None, ns!(html), LocalName::from(local))
    }

    #[test]
    fn test_parse_and_query() {
        let dom = parse_html(r#"<html><body><p class="lead intro">Hello</p></body></html>"#);

        let p = dom.find_by_tag("p").expect("should find p");
        assert_eq!(dom.tag_name(p).unwrap().as_ref(), "p");
        assert!(dom.has_class(p, "lead"));
        assert!(dom.has_class(p, "intro"));
        assert!(!dom.has_class(p, "other"));
        assert_eq!(dom.text_content(p), "Hello");
    }

    #[test]
    fn test_attributes() {
        let mut dom = parse_html(r#"<img src="a.png" alt="pic">"#);

        let img = dom.find_by_tag("img").expect("should find img");
        assert_eq!(dom.attr(img, "src"), Some("a.png"));

        dom.set_attr(img, "src", "images/b.png");
        assert_eq!(dom.attr(img, "src"), Some("images/b.png"));

        dom.set_attr(img, "width", "10");
        assert_eq!(dom.attr(img, "width"), Some("10"));

        dom.remove_attr(img, "alt");
        assert_eq!(dom.attr(img, "alt"), None);
    }

    #[test]
    fn test_detach() {
        let dom_src = "<div><p>one</p><p>two</p><p>three</p></div>";
        let mut dom = parse_html(dom_src);

        let paragraphs = dom.find_all_by_tag("p");
        assert_eq!(paragraphs.len(), 3);

        dom.detach(paragraphs[1]);
        let remaining = dom.find_all_by_tag("p");
        assert_eq!(remaining.len(), 2);
        assert_eq!(dom.text_content(remaining[0]), "one");
        assert_eq!(dom.text_content(remaining[1]), "three");
    }

    #[test]
    fn test_replace_with() {
        let mut dom = parse_html("<div><span>old</span></div>");
        let span = dom.find_by_tag("span").unwrap();

        let pre = dom.create_element(make_qname("pre"), vec![]);
        dom.append_text(pre, "new");
        dom.replace_with(span, &[pre]);

        assert!(dom.find_by_tag("span").is_none());
        let div = dom.find_by_tag("div").unwrap();
        assert_eq!(dom.text_content(div), "new");
    }

    #[test]
    fn test_import_subtree() {
        let src = parse_html(r#"<div class="meta"><a href="x">link</a></div>"#);
        let div = src.find_by_tag("div").unwrap();

        let mut dst = parse_html("<body></body>");
        let body = dst.find_by_tag("body").unwrap();
        let copy = dst.import(&src, div);
        dst.append(body, copy);

        let copied = dst.find_by_tag("div").expect("imported div");
        assert!(dst.has_class(copied, "meta"));
        let a = dst.find_by_tag_from(copied, "a").expect("imported anchor");
        assert_eq!(dst.attr(a, "href"), Some("x"));
        assert_eq!(dst.text_content(copied), "link");
    }

    #[test]
    fn test_text_merging() {
        let mut dom = Dom::new();
        let p = dom.create_element(make_qname("p"), vec![]);
        let doc = dom.document();
        dom.append(doc, p);

        dom.append_text(p, "Hello, ");
        dom.append_text(p, "World!");

        let children: Vec<_> = dom.children(p).collect();
        assert_eq!(children.len(), 1);
        assert_eq!(dom.text_content(p), "Hello, World!");
    }
}
