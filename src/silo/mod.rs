//! The compiled silo artifact.
//!
//! A silo is a single contiguous byte buffer: a fixed header carrying the
//! identity GUID, a flat node table linked by byte offsets, and a packed
//! string table. Loading validates the header; the buffer itself is
//! immutable and cheap to clone, so a silo can be shared, saved and
//! reloaded without copying.

mod format;
mod node;

use std::path::Path;
use std::sync::Arc;

use zerocopy::FromBytes;

use crate::error::{Error, Result};
use crate::guid;

pub use format::{HEADER_SIZE, SILO_MAGIC, SILO_VERSION};
pub use node::SiloNode;

pub(crate) use format::{
    ATTR_SIZE, MAX_ATTRS, NODE_NEXT_OFFSET, NODE_PARENT_OFFSET, NODE_SIZE, SENTINEL, SiloHeader,
    node_prefix,
};

/// A compiled, immutable silo.
#[derive(Clone)]
pub struct Silo {
    blob: Arc<[u8]>,
    header: SiloHeader,
}

impl Silo {
    /// Validate a byte buffer and take ownership of it as a silo.
    pub fn load_from_bytes(blob: Vec<u8>) -> Result<Self> {
        if blob.len() < HEADER_SIZE {
            return Err(Error::Truncated {
                expected: HEADER_SIZE,
                available: blob.len(),
            });
        }
        let header = SiloHeader::read_from_bytes(&blob[..HEADER_SIZE])
            .map_err(|_| Error::NotSiloFile)?;
        if header.magic != SILO_MAGIC {
            return Err(Error::NotSiloFile);
        }
        if header.version.get() != SILO_VERSION {
            return Err(Error::UnsupportedVersion(header.version.get()));
        }
        let strtab = header.strtab.get() as usize;
        if strtab < HEADER_SIZE || strtab > blob.len() {
            return Err(Error::InvalidData(format!(
                "string table offset {strtab} outside the buffer"
            )));
        }
        Ok(Self {
            blob: Arc::from(blob),
            header,
        })
    }

    /// Load a silo from a file on disk.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load_from_bytes(std::fs::read(path)?)
    }

    /// Write the silo bytes to a file.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, &self.blob)?;
        Ok(())
    }

    /// The identity GUID in hyphenated lowercase form.
    pub fn guid(&self) -> String {
        guid::to_string(&self.header.guid)
    }

    /// The raw silo bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.blob
    }

    /// Count of distinct element-name strings at the start of the string table.
    pub fn strtab_ntags(&self) -> u32 {
        self.header.strtab_ntags.get()
    }

    pub(crate) fn strtab_offset(&self) -> u32 {
        self.header.strtab.get()
    }
}

impl std::fmt::Debug for Silo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Silo")
            .field("guid", &self.guid())
            .field("len", &self.blob.len())
            .finish()
    }
}
