//! xmlsilo - compile XML documents into compact binary silos
//!
//! This library transforms one or more XML documents (optionally
//! gzip-compressed) into a *silo*: a single contiguous, mmap-friendly byte
//! buffer holding a flat node table and a deduplicated string table,
//! fingerprinted by a GUID derived from the input set.
//!
//! # Features
//!
//! - **String interning**: every distinct string is stored once
//! - **Flat node table**: fixed-layout records linked by byte offsets, with
//!   sentinel markers so a reader walks the tree without recursion
//! - **Locale pruning**: drop subtrees whose `xml:lang` the process does
//!   not accept
//! - **Cached compilation**: [`Builder::ensure`] reuses an on-disk silo
//!   whose GUID already matches the current inputs
//!
//! # Example - Compiling XML
//!
//! ```
//! use xmlsilo::{Builder, CompileFlags};
//!
//! # fn main() -> xmlsilo::Result<()> {
//! let mut builder = Builder::new();
//! builder.import_xml(
//!     "<component type=\"desktop\">\
//!        <id>org.example.App</id>\
//!        <name>Example</name>\
//!      </component>",
//! )?;
//! let silo = builder.compile(CompileFlags::NONE)?;
//!
//! let component = silo.root()?.unwrap();
//! assert_eq!(component.element()?, "component");
//! assert_eq!(component.attrs()?, [("type", "desktop")]);
//! assert_eq!(component.children()?.len(), 2);
//! # Ok(())
//! # }
//! ```
//!
//! # Example - Caching with ensure
//!
//! ```no_run
//! use xmlsilo::{Builder, CompileFlags};
//!
//! # fn main() -> xmlsilo::Result<()> {
//! let mut builder = Builder::new();
//! builder.import_dir("/usr/share/metainfo", None)?;
//! // compiles once; later runs reuse the cached file while the
//! // inputs' fingerprint still matches
//! let silo = builder.ensure("/var/cache/app/components.silo", CompileFlags::IGNORE_INVALID)?;
//! println!("silo {} ({} bytes)", silo.guid(), silo.bytes().len());
//! # Ok(())
//! # }
//! ```

/// Building silos from XML sources
pub mod builder;

/// Shared binary, cancellation and locale utilities
pub mod common;

/// The compiled silo artifact and record-level access to it
pub mod silo;

mod error;
mod guid;

// Re-export commonly used types for convenience
pub use builder::node::{BuilderNode, NodeFlags};
pub use builder::{Builder, CompileFlags};
pub use common::cancel::Cancellable;
pub use error::{Error, Result};
pub use silo::{Silo, SiloNode};
