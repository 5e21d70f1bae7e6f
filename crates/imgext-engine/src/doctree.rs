//! Document tree.
//!
//! A document is a list of [`Node`]s. Elements carry an open attribute map so
//! that directives and extensions can attach arbitrary typed values (an
//! option coerced to an integer stays an integer).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Attribute map of an [`Element`].
pub type Attributes = BTreeMap<String, Value>;

/// Element kinds understood by the writers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Paragraph,
    Image,
    Figure,
    Caption,
    Legend,
    /// Unresolved reference to a non-image source, replaced before writing.
    ImagePlaceholder,
    /// Diagnostic left in the tree where a directive failed.
    SystemMessage,
}

/// A tree node: an element or a run of text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Node {
    Text(String),
    Element(Element),
}

impl From<Element> for Node {
    fn from(element: Element) -> Self {
        Self::Element(element)
    }
}

/// A tagged element with attributes and children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: Attributes,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Node>,
}

impl Element {
    #[must_use]
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            attributes: Attributes::new(),
            children: Vec::new(),
        }
    }

    /// Builder-style [`set`](Self::set).
    #[must_use]
    pub fn with_attr(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    /// Builder-style child append.
    #[must_use]
    pub fn with_child(mut self, child: impl Into<Node>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// String attribute, `None` when absent or not a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(Value::as_str)
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.attributes.insert(key.to_owned(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.attributes.remove(key)
    }

    /// The `uri` attribute.
    pub fn uri(&self) -> Option<&str> {
        self.get_str("uri")
    }

    /// Concatenated text of all descendants.
    pub fn text(&self) -> String {
        let mut out = String::new();
        collect_text(&self.children, &mut out);
        out
    }

    /// Direct element children of the given kind.
    pub fn children_of_kind(&self, kind: NodeKind) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(move |node| match node {
            Node::Element(el) if el.kind == kind => Some(el),
            _ => None,
        })
    }
}

fn collect_text(nodes: &[Node], out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) => collect_text(&el.children, out),
        }
    }
}

/// What to do with an element visited by [`transform_nodes`].
#[derive(Debug)]
pub enum Transform {
    /// Keep the element and descend into its children.
    Keep,
    /// Substitute another node; the replacement is not visited.
    Replace(Node),
    /// Drop the element and its subtree.
    Remove,
}

/// Visit every element in document order, letting `f` keep, replace or
/// remove it.
pub fn transform_nodes<F>(nodes: &mut Vec<Node>, f: &mut F)
where
    F: FnMut(&mut Element) -> Transform,
{
    let mut idx = 0;
    while idx < nodes.len() {
        let action = match &mut nodes[idx] {
            Node::Element(el) => f(el),
            Node::Text(_) => Transform::Keep,
        };
        match action {
            Transform::Keep => {
                if let Node::Element(el) = &mut nodes[idx] {
                    transform_nodes(&mut el.children, f);
                }
                idx += 1;
            }
            Transform::Replace(node) => {
                nodes[idx] = node;
                idx += 1;
            }
            Transform::Remove => {
                nodes.remove(idx);
            }
        }
    }
}

fn walk_mut<F>(nodes: &mut [Node], f: &mut F)
where
    F: FnMut(&mut Element),
{
    for node in nodes {
        if let Node::Element(el) = node {
            f(el);
            walk_mut(&mut el.children, f);
        }
    }
}

fn walk<'a>(nodes: &'a [Node], out: &mut Vec<&'a Element>) {
    for node in nodes {
        if let Node::Element(el) = node {
            out.push(el);
            walk(&el.children, out);
        }
    }
}

/// A parsed document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Source-relative name without suffix, `/`-separated (e.g. `guide/index`).
    pub docname: String,
    #[serde(default)]
    pub children: Vec<Node>,
}

impl Document {
    #[must_use]
    pub fn new(docname: impl Into<String>) -> Self {
        Self {
            docname: docname.into(),
            children: Vec::new(),
        }
    }

    /// All elements in document order.
    pub fn elements(&self) -> Vec<&Element> {
        let mut out = Vec::new();
        walk(&self.children, &mut out);
        out
    }

    /// All elements of `kind` in document order.
    pub fn find_all(&self, kind: NodeKind) -> Vec<&Element> {
        self.elements()
            .into_iter()
            .filter(|el| el.kind == kind)
            .collect()
    }

    /// Call `f` on every element, parents before children.
    pub fn for_each_element_mut<F>(&mut self, mut f: F)
    where
        F: FnMut(&mut Element),
    {
        walk_mut(&mut self.children, &mut f);
    }

    /// See [`transform_nodes`].
    pub fn transform<F>(&mut self, mut f: F)
    where
        F: FnMut(&mut Element) -> Transform,
    {
        transform_nodes(&mut self.children, &mut f);
    }
}
