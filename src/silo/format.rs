//! On-disk silo layout.
//!
//! ```text
//! Header      @ 0                    32 bytes, see [`SiloHeader`]
//! NodeTable   @ 32                   ends at Header.strtab
//! StringTable @ Header.strtab        packed NUL-terminated strings
//! ```
//!
//! A node record starts with one prefix byte (bit 0 `is_node`, bit 1
//! `has_text`, bits 2-7 `nr_attrs`), followed by little-endian u32 fields:
//! `element_name`, `next`, `parent`, and `text` only when `has_text` is set.
//! `nr_attrs` attribute records of two u32s each come immediately after. A
//! sentinel is a single zero byte: it closes the child list of the
//! preceding descent so a reader can reconstruct depth without recursion.

use zerocopy::{LE, U32};
use zerocopy_derive::{
    FromBytes as DeriveFromBytes, Immutable, IntoBytes as DeriveIntoBytes, KnownLayout, Unaligned,
};

/// Magic bytes every silo starts with.
pub const SILO_MAGIC: [u8; 4] = *b"XSLO";

/// Current format version.
pub const SILO_VERSION: u32 = 1;

/// Size of the on-disk header in bytes.
pub const HEADER_SIZE: usize = size_of::<SiloHeader>();

/// Byte size of a node record with a text field, excluding attribute records.
pub(crate) const NODE_SIZE: u32 = 17;

/// Byte size of one attribute record.
pub(crate) const ATTR_SIZE: u32 = 8;

/// `nr_attrs` is packed into six bits of the prefix byte.
pub(crate) const MAX_ATTRS: usize = 63;

/// A sentinel record is a single zero byte.
pub(crate) const SENTINEL: u8 = 0;

// Field offsets within a node record, relative to the record start.
pub(crate) const NODE_ELEMENT_OFFSET: usize = 1;
pub(crate) const NODE_NEXT_OFFSET: usize = 5;
pub(crate) const NODE_PARENT_OFFSET: usize = 9;
pub(crate) const NODE_TEXT_OFFSET: usize = 13;

/// Raw silo header structure (32 bytes, little-endian).
///
/// All leading fields are four bytes wide, so the GUID lands on a 16-byte
/// boundary without padding.
#[derive(Debug, Clone, Copy, DeriveFromBytes, DeriveIntoBytes, Immutable, KnownLayout, Unaligned)]
#[repr(C)]
pub(crate) struct SiloHeader {
    /// Fixed magic bytes, [`SILO_MAGIC`]
    pub magic: [u8; 4],
    /// Format version, [`SILO_VERSION`]
    pub version: U32<LE>,
    /// Byte offset of the string table (equals the node table end)
    pub strtab: U32<LE>,
    /// Count of distinct element-name strings at the start of the string table
    pub strtab_ntags: U32<LE>,
    /// Identity fingerprint of the input set
    pub guid: [u8; 16],
}

/// Decoded node-record prefix byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct NodePrefix {
    pub is_node: bool,
    pub has_text: bool,
    pub nr_attrs: u8,
}

impl NodePrefix {
    pub(crate) fn from_byte(byte: u8) -> Self {
        Self {
            is_node: byte & 0b01 != 0,
            has_text: byte & 0b10 != 0,
            nr_attrs: byte >> 2,
        }
    }

    /// Byte length of the record this prefix introduces, attributes included.
    pub(crate) fn record_size(self) -> u32 {
        if !self.is_node {
            return 1;
        }
        let mut size = NODE_SIZE + ATTR_SIZE * u32::from(self.nr_attrs);
        if !self.has_text {
            size -= 4;
        }
        size
    }
}

/// Encode the prefix byte of a real (non-sentinel) node record.
pub(crate) fn node_prefix(has_text: bool, nr_attrs: u8) -> u8 {
    0b01 | (u8::from(has_text) << 1) | (nr_attrs << 2)
}
