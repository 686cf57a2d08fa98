//! Error taxonomy shared by every layer of the engine.

use std::path::PathBuf;

use crate::types::ScAddr;

/// Errors produced by storage, iterator, transaction and persistence operations.
#[derive(thiserror::Error, Debug)]
pub enum ScError {
    /// Malformed arguments: empty address, bad arity, iterator index out of range.
    #[error("invalid params: {0}")]
    InvalidParams(&'static str),
    /// The element type does not support the requested operation.
    #[error("invalid type: {0}")]
    InvalidType(&'static str),
    /// The address does not resolve to a live element.
    #[error("address {0} does not denote a live element")]
    AddrNotValid(ScAddr),
    /// Every segment is allocated and no free slot is left.
    #[error("full memory: all {max_segments} segments are engaged")]
    FullMemory {
        /// Configured segment limit that was exhausted.
        max_segments: u16,
    },
    /// Operation is not allowed in the current lifecycle state.
    #[error("invalid state: {0}")]
    InvalidState(&'static str),
    /// Context read level is below the element's read level.
    #[error("no read rights")]
    NoReadRights,
    /// Context write level is below the element's write level.
    #[error("no write rights")]
    NoWriteRights,
    /// Lookup found nothing.
    #[error("not found: {0}")]
    NotFound(&'static str),
    /// A system identifier contains characters outside `[A-Za-z0-9_.]`.
    #[error("invalid system identifier `{0}`")]
    InvalidSystemIdentifier(String),
    /// A system identifier is already attached to another element.
    #[error("system identifier `{0}` is already used")]
    DuplicatedSystemIdentifier(String),
    /// Keynode bootstrap failed for one entry.
    #[error("failed to resolve keynode `{idtf}`: {source}")]
    Keynode {
        /// Identifier of the keynode that failed.
        idtf: String,
        /// Underlying failure.
        source: Box<ScError>,
    },
    /// Repository path is missing or is not a directory.
    #[error("repository path is not set or is not a directory")]
    NoRepoPath,
    /// Persistence read failure.
    #[error("failed to read {path}: {source}")]
    ReadError {
        /// File being read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Persistence write failure.
    #[error("failed to write {path}: {source}")]
    WriteError {
        /// File being written.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Persisted state failed validation.
    #[error("corruption: {0}")]
    Corruption(&'static str),
}

/// Result alias used across the crate.
pub type ScResult<T> = std::result::Result<T, ScError>;

impl ScError {
    /// Returns true for errors caused by a concurrently erased element.
    pub fn is_addr_not_valid(&self) -> bool {
        matches!(self, ScError::AddrNotValid(_))
    }
}
