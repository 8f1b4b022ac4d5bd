//! Record-level access to a loaded silo.
//!
//! [`SiloNode`] is a cheap cursor over the flat node table: the first child
//! of a node is the record immediately following it (attributes included)
//! unless that record is a sentinel, siblings are reached through the
//! stored `next` offset, and `parent` points back up. Every access is
//! bounds-checked so a damaged silo reports an error instead of panicking.

use crate::common::binary::{read_cstr, read_u32_le};
use crate::error::{Error, Result};
use crate::silo::Silo;
use crate::silo::format::{
    HEADER_SIZE, NODE_ELEMENT_OFFSET, NODE_NEXT_OFFSET, NODE_PARENT_OFFSET, NODE_TEXT_OFFSET,
    NodePrefix,
};

/// A node record inside a [`Silo`].
#[derive(Clone, Copy)]
pub struct SiloNode<'a> {
    silo: &'a Silo,
    offset: u32,
}

impl Silo {
    /// The first top-level node, or `None` for an empty silo.
    pub fn root(&self) -> Result<Option<SiloNode<'_>>> {
        if self.strtab_offset() <= HEADER_SIZE as u32 {
            return Ok(None);
        }
        self.node_at(HEADER_SIZE as u32)
    }

    /// Decode the record at `offset`; `None` when it is a sentinel.
    pub(crate) fn node_at(&self, offset: u32) -> Result<Option<SiloNode<'_>>> {
        let prefix = self.prefix_at(offset)?;
        if !prefix.is_node {
            return Ok(None);
        }
        Ok(Some(SiloNode { silo: self, offset }))
    }

    pub(crate) fn prefix_at(&self, offset: u32) -> Result<NodePrefix> {
        if offset < HEADER_SIZE as u32 || offset >= self.strtab_offset() {
            return Err(Error::InvalidData(format!(
                "node offset {offset} outside the node table"
            )));
        }
        Ok(NodePrefix::from_byte(self.bytes()[offset as usize]))
    }

    /// Resolve a string-table offset into the backing string.
    pub(crate) fn strtab_str(&self, idx: u32) -> Result<&str> {
        let abs = self.strtab_offset() as usize + idx as usize;
        read_cstr(self.bytes(), abs)
    }
}

impl<'a> SiloNode<'a> {
    /// Byte offset of this record within the silo.
    pub fn offset(&self) -> u32 {
        self.offset
    }

    fn prefix(&self) -> Result<NodePrefix> {
        self.silo.prefix_at(self.offset)
    }

    fn field(&self, rel: usize) -> Result<u32> {
        read_u32_le(self.silo.bytes(), self.offset as usize + rel)
    }

    /// Element name, resolved through the string table.
    pub fn element(&self) -> Result<&'a str> {
        self.silo.strtab_str(self.field(NODE_ELEMENT_OFFSET)?)
    }

    /// Text content, if the node has any.
    pub fn text(&self) -> Result<Option<&'a str>> {
        if !self.prefix()?.has_text {
            return Ok(None);
        }
        self.silo.strtab_str(self.field(NODE_TEXT_OFFSET)?).map(Some)
    }

    /// Attributes in source order as (name, value) pairs.
    pub fn attrs(&self) -> Result<Vec<(&'a str, &'a str)>> {
        let prefix = self.prefix()?;
        let mut base = self.offset as usize
            + if prefix.has_text {
                NODE_TEXT_OFFSET + 4
            } else {
                NODE_TEXT_OFFSET
            };
        let mut attrs = Vec::with_capacity(prefix.nr_attrs as usize);
        for _ in 0..prefix.nr_attrs {
            let name = self.silo.strtab_str(read_u32_le(self.silo.bytes(), base)?)?;
            let value = self
                .silo
                .strtab_str(read_u32_le(self.silo.bytes(), base + 4)?)?;
            attrs.push((name, value));
            base += 8;
        }
        Ok(attrs)
    }

    /// The next sibling, reached through the stored `next` offset.
    pub fn next(&self) -> Result<Option<SiloNode<'a>>> {
        let next = self.field(NODE_NEXT_OFFSET)?;
        if next == 0 {
            return Ok(None);
        }
        match self.silo.node_at(next)? {
            Some(node) => Ok(Some(node)),
            None => Err(Error::InvalidData(format!(
                "next offset {next} points at a sentinel"
            ))),
        }
    }

    /// The parent node; `None` for top-level nodes.
    pub fn parent(&self) -> Result<Option<SiloNode<'a>>> {
        let parent = self.field(NODE_PARENT_OFFSET)?;
        if parent == 0 {
            return Ok(None);
        }
        match self.silo.node_at(parent)? {
            Some(node) => Ok(Some(node)),
            None => Err(Error::InvalidData(format!(
                "parent offset {parent} points at a sentinel"
            ))),
        }
    }

    /// The first child: the record immediately following this one, unless
    /// it is a sentinel or the node table ends.
    pub fn first_child(&self) -> Result<Option<SiloNode<'a>>> {
        let after = self.offset + self.prefix()?.record_size();
        if after >= self.silo.strtab_offset() {
            return Ok(None);
        }
        self.silo.node_at(after)
    }

    /// All children in document order.
    pub fn children(&self) -> Result<Vec<SiloNode<'a>>> {
        let mut children = Vec::new();
        let mut cursor = self.first_child()?;
        while let Some(node) = cursor {
            cursor = node.next()?;
            children.push(node);
        }
        Ok(children)
    }
}

impl std::fmt::Debug for SiloNode<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SiloNode")
            .field("offset", &self.offset)
            .field("element", &self.element().unwrap_or("<invalid>"))
            .finish()
    }
}
