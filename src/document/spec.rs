//! Tree literals for building and loading document subtrees.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Serializable description of a subtree.
///
/// In JSON a text node is a bare string and an element is
/// `{"tag": "...", "attrs": {...}, "children": [...]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeSpec {
    /// Text node.
    Text(String),
    /// Element node.
    Element(ElementSpec),
}

/// Element part of a [`NodeSpec`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementSpec {
    /// Tag name.
    pub tag: String,
    /// Attributes.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attrs: BTreeMap<String, String>,
    /// Child nodes in document order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeSpec>,
}

impl NodeSpec {
    /// Element with no attributes or children.
    pub fn element(tag: impl Into<String>) -> Self {
        Self::Element(ElementSpec {
            tag: tag.into(),
            attrs: BTreeMap::new(),
            children: Vec::new(),
        })
    }

    /// Text node.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Set an attribute. Ignored on text nodes.
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        if let Self::Element(el) = &mut self {
            el.attrs.insert(name.into(), value.into());
        }
        self
    }

    /// Add a class to the `class` attribute. Ignored on text nodes.
    pub fn class(mut self, class: &str) -> Self {
        if let Self::Element(el) = &mut self {
            let entry = el.attrs.entry("class".to_string()).or_default();
            if !entry.is_empty() {
                entry.push(' ');
            }
            entry.push_str(class);
        }
        self
    }

    /// Append a child. Ignored on text nodes.
    pub fn child(mut self, child: NodeSpec) -> Self {
        if let Self::Element(el) = &mut self {
            el.children.push(child);
        }
        self
    }

    /// Append several children. Ignored on text nodes.
    pub fn children(mut self, children: impl IntoIterator<Item = NodeSpec>) -> Self {
        if let Self::Element(el) = &mut self {
            el.children.extend(children);
        }
        self
    }

    /// Parse a tree literal from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
