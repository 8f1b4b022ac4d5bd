//! Unified error types for the xmlsilo library.
//!
//! All fallible operations return [`Result`], whether they fail in file I/O,
//! XML parsing, silo validation or compilation.

use thiserror::Error;

/// Main error type for xmlsilo operations.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed input that is not attributable to the XML parser itself
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// XML parsing error with the byte position in the input stream
    #[error("XML error at byte {position}: {message}")]
    Xml { position: u64, message: String },

    /// The blob does not start with the silo magic bytes
    #[error("Not a silo file")]
    NotSiloFile,

    /// The silo was written by an incompatible version of the format
    #[error("Unsupported silo version: {0}")]
    UnsupportedVersion(u32),

    /// Fewer bytes available than a record or table requires
    #[error("Truncated silo: expected {expected} bytes, got {available}")]
    Truncated { expected: usize, available: usize },

    /// A cooperative cancellation token was triggered during a read
    #[error("Operation cancelled")]
    Cancelled,

    /// A specific import failed to compile
    #[error("failed to compile {guid}: {source}")]
    Import {
        guid: String,
        #[source]
        source: Box<Error>,
    },
}

/// Result type for xmlsilo operations.
pub type Result<T> = std::result::Result<T, Error>;
