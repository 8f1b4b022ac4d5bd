//! The compile pipeline: imports to silo bytes.
//!
//! A compile runs fixed stages over a merged builder tree: a size pass
//! reserves the node table, four level-order intern passes populate the
//! string table (element names first, because `strtab_ntags` is defined as
//! the distinct count after that pass), a pre-order emit pass writes node
//! records with depth-tracked sentinels, and a fixup pass back-patches the
//! `next` and `parent` offsets that are only known once every record has
//! been placed.

use std::collections::VecDeque;

use zerocopy::IntoBytes;

use crate::builder::CompileFlags;
use crate::builder::driver;
use crate::builder::import::Import;
use crate::builder::intern::StringTable;
use crate::builder::node::{BuilderNode, NodeFlags};
use crate::common::binary::write_u32_le;
use crate::common::cancel::Cancellable;
use crate::error::{Error, Result};
use crate::guid;
use crate::silo::{
    HEADER_SIZE, MAX_ATTRS, NODE_NEXT_OFFSET, NODE_PARENT_OFFSET, SENTINEL, SILO_MAGIC,
    SILO_VERSION, SiloHeader, node_prefix,
};

/// Per-compile state: the merged tree and the string table under construction.
pub(crate) struct CompileHelper {
    flags: CompileFlags,
    locales: Vec<String>,
    root: BuilderNode,
    strtab: StringTable,
}

impl CompileHelper {
    pub(crate) fn new(flags: CompileFlags, locales: Vec<String>) -> Self {
        Self {
            flags,
            locales,
            root: BuilderNode::new(""),
            strtab: StringTable::new(),
        }
    }

    /// Parse one import and splice its top-level nodes into the merged tree.
    ///
    /// The import parses into its own synthetic root, so a damaged source
    /// contributes nothing and never corrupts the nodes of other imports.
    pub(crate) fn parse_import(&mut self, import: &Import, cancel: &Cancellable) -> Result<()> {
        let stream = import.open()?;
        let mut parsed =
            driver::parse_stream(stream, self.flags, &self.locales, import.info(), cancel)?;
        for child in parsed.take_children() {
            self.root.add_child(child);
        }
        Ok(())
    }

    /// Deep-copy a manually built node tree into the merged tree.
    pub(crate) fn add_manual_node(&mut self, node: &BuilderNode) {
        self.root.add_child(node.clone());
    }

    /// Run the layout passes and emit the silo byte buffer.
    pub(crate) fn build(mut self, guid_text: &str) -> Result<Vec<u8>> {
        // size pass: upper bound that the emit pass meets exactly, because
        // every emitted node's child list is closed by exactly one sentinel
        let mut nodetabsz = HEADER_SIZE as u32;
        size_pass(self.root.children(), &mut nodetabsz)?;

        // element names first; the header records how many there were
        for_each_level_order(&mut self.root, &mut self.strtab, |n, strtab| {
            n.element_idx = strtab.intern(n.element());
        });
        let strtab_ntags = self.strtab.count();
        for_each_level_order(&mut self.root, &mut self.strtab, |n, strtab| {
            for attr in n.attrs.iter_mut() {
                attr.name_idx = strtab.intern(&attr.name);
            }
        });
        for_each_level_order(&mut self.root, &mut self.strtab, |n, strtab| {
            for attr in n.attrs.iter_mut() {
                attr.value_idx = strtab.intern(&attr.value);
            }
        });
        for_each_level_order(&mut self.root, &mut self.strtab, |n, strtab| {
            let idx = n.text().map(|t| strtab.intern(t));
            if let Some(idx) = idx {
                n.text_idx = idx;
            }
        });

        let header = SiloHeader {
            magic: SILO_MAGIC,
            version: SILO_VERSION.into(),
            strtab: nodetabsz.into(),
            strtab_ntags: strtab_ntags.into(),
            guid: guid::derive(guid_text),
        };

        let mut buf = Vec::with_capacity(nodetabsz as usize + self.strtab.len());
        buf.extend_from_slice(header.as_bytes());

        // pre-order emit; `level` is the depth of the last emitted node,
        // with top-level nodes at depth 2 (the synthetic root is depth 1)
        let mut level = 0u32;
        for child in self.root.children_mut() {
            emit_node(&mut buf, child, 2, &mut level);
        }
        // close every still-open descent down to, but not including, the root
        for _ in 1..level {
            buf.push(SENTINEL);
        }
        debug_assert_eq!(buf.len(), nodetabsz as usize);

        fixup_offsets(&mut buf, None, self.root.children())?;

        buf.extend_from_slice(self.strtab.as_bytes());
        Ok(buf)
    }
}

fn size_pass(nodes: &[BuilderNode], total: &mut u32) -> Result<()> {
    for node in nodes {
        if node.has_flag(NodeFlags::IGNORE_CDATA) {
            continue;
        }
        if node.attrs.len() > MAX_ATTRS {
            return Err(Error::InvalidData(format!(
                "element <{}> has {} attributes, the record limit is {MAX_ATTRS}",
                node.element(),
                node.attrs.len()
            )));
        }
        // +1 for the sentinel closing this node's child list
        *total += node.size() + 1;
        if node.text().is_none() {
            *total -= 4;
        }
        size_pass(node.children(), total)?;
    }
    Ok(())
}

/// Level-order traversal over non-ignored nodes, skipping pruned subtrees.
fn for_each_level_order<F>(root: &mut BuilderNode, strtab: &mut StringTable, mut f: F)
where
    F: FnMut(&mut BuilderNode, &mut StringTable),
{
    let mut queue: VecDeque<&mut BuilderNode> = root.children_mut().iter_mut().collect();
    while let Some(node) = queue.pop_front() {
        if node.has_flag(NodeFlags::IGNORE_CDATA) {
            continue;
        }
        f(node, strtab);
        queue.extend(node.children_mut().iter_mut());
    }
}

fn emit_node(buf: &mut Vec<u8>, node: &mut BuilderNode, depth: u32, level: &mut u32) {
    if node.has_flag(NodeFlags::IGNORE_CDATA) {
        return;
    }

    // close child lists of everything deeper than, or at, this depth
    for _ in depth..=*level {
        buf.push(SENTINEL);
    }
    *level = depth;

    // remember where this record landed so fixup can patch pointers to it
    node.offset = buf.len() as u32;

    let has_text = node.text().is_some();
    buf.push(node_prefix(has_text, node.attrs.len() as u8));
    buf.extend_from_slice(&node.element_idx.to_le_bytes());
    buf.extend_from_slice(&0u32.to_le_bytes()); // next, patched later
    buf.extend_from_slice(&0u32.to_le_bytes()); // parent, patched later
    if has_text {
        buf.extend_from_slice(&node.text_idx.to_le_bytes());
    }
    for attr in &node.attrs {
        buf.extend_from_slice(&attr.name_idx.to_le_bytes());
        buf.extend_from_slice(&attr.value_idx.to_le_bytes());
    }

    for child in node.children_mut() {
        emit_node(buf, child, depth + 1, level);
    }
}

/// Patch `parent` and `next` in the emitted records. `next` links to the
/// following sibling that was actually emitted, so pruned siblings never
/// break the chain.
fn fixup_offsets(buf: &mut [u8], parent: Option<u32>, siblings: &[BuilderNode]) -> Result<()> {
    for (i, node) in siblings.iter().enumerate() {
        if node.has_flag(NodeFlags::IGNORE_CDATA) {
            continue;
        }
        if let Some(parent_offset) = parent {
            write_u32_le(buf, node.offset as usize + NODE_PARENT_OFFSET, parent_offset)?;
        }
        if let Some(next) = siblings[i + 1..]
            .iter()
            .find(|s| !s.has_flag(NodeFlags::IGNORE_CDATA))
        {
            write_u32_le(buf, node.offset as usize + NODE_NEXT_OFFSET, next.offset)?;
        }
        fixup_offsets(buf, Some(node.offset), node.children())?;
    }
    Ok(())
}
