//! Mutable tree nodes used while authoring a silo.

use bitflags::bitflags;
use smallvec::SmallVec;

use crate::silo::{ATTR_SIZE, NODE_SIZE};

bitflags! {
    /// Behavior flags on a [`BuilderNode`].
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct NodeFlags: u8 {
        /// Exclude this subtree's payload from the compiled output
        const IGNORE_CDATA = 0x01;
        /// The text content is known-good; downstream whitespace collapsing
        /// is disabled for this node
        const LITERAL_TEXT = 0x02;
    }
}

/// One attribute on a builder node, with its string-table offsets once the
/// intern passes have run.
#[derive(Debug, Clone)]
pub(crate) struct NodeAttr {
    pub(crate) name: String,
    pub(crate) value: String,
    pub(crate) name_idx: u32,
    pub(crate) value_idx: u32,
}

/// A mutable XML tree node under construction.
///
/// Nodes are produced by the parser driver or built manually and added to a
/// builder with [`Builder::import_node`]. Attribute order mirrors source
/// order and duplicate attribute names are kept as-is.
///
/// [`Builder::import_node`]: crate::Builder::import_node
///
/// # Examples
///
/// ```
/// use xmlsilo::BuilderNode;
///
/// let mut release = BuilderNode::new("release");
/// release.add_attribute("version", "1.2.3");
/// let mut description = BuilderNode::new("description");
/// description.set_text("Fixes a crash on startup");
/// release.add_child(description);
/// assert_eq!(release.children().len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct BuilderNode {
    element: String,
    text: Option<String>,
    flags: NodeFlags,
    pub(crate) attrs: SmallVec<[NodeAttr; 4]>,
    children: Vec<BuilderNode>,
    // Transient compile state, valid only after the respective pass.
    pub(crate) element_idx: u32,
    pub(crate) text_idx: u32,
    pub(crate) offset: u32,
}

impl BuilderNode {
    /// Create a node with the given element name.
    pub fn new(element: impl Into<String>) -> Self {
        Self {
            element: element.into(),
            text: None,
            flags: NodeFlags::empty(),
            attrs: SmallVec::new(),
            children: Vec::new(),
            element_idx: 0,
            text_idx: 0,
            offset: 0,
        }
    }

    /// The element name.
    pub fn element(&self) -> &str {
        &self.element
    }

    /// The text content, if any.
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// Set the text content. A later call replaces the previous value.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = Some(text.into());
    }

    /// Append an attribute. Order is preserved and names are not deduplicated.
    pub fn add_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attrs.push(NodeAttr {
            name: name.into(),
            value: value.into(),
            name_idx: 0,
            value_idx: 0,
        });
    }

    /// Attributes in insertion order as (name, value) pairs.
    pub fn attrs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attrs.iter().map(|a| (a.name.as_str(), a.value.as_str()))
    }

    /// Set one or more flags.
    pub fn add_flag(&mut self, flags: NodeFlags) {
        self.flags |= flags;
    }

    /// Whether every given flag is set.
    pub fn has_flag(&self, flags: NodeFlags) -> bool {
        self.flags.contains(flags)
    }

    /// Append a child node, preserving document order.
    pub fn add_child(&mut self, child: BuilderNode) {
        self.children.push(child);
    }

    /// Children in document order.
    pub fn children(&self) -> &[BuilderNode] {
        &self.children
    }

    pub(crate) fn children_mut(&mut self) -> &mut [BuilderNode] {
        &mut self.children
    }

    pub(crate) fn take_children(&mut self) -> Vec<BuilderNode> {
        std::mem::take(&mut self.children)
    }

    /// Serialized byte size of this node's record assuming text is present;
    /// callers subtract one u32 when it is not.
    pub(crate) fn size(&self) -> u32 {
        NODE_SIZE + ATTR_SIZE * self.attrs.len() as u32
    }
}
