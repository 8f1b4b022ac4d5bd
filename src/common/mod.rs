//! Utilities shared across the builder and the silo reader.

/// Little-endian reads and writes over raw byte buffers
pub mod binary;

/// Cooperative cancellation token
pub mod cancel;

/// Accepted-locale list derivation
pub(crate) mod locale;
