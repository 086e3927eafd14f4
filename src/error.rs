//! Crate-level error aggregation.

use thiserror::Error;

use crate::accessor::AccessorError;
use crate::checksum::ChecksumError;
use crate::diff::DiffError;
use crate::execute::ExecuteError;
use crate::path::PathError;

/// Any failure surfaced by this crate's public operations.
///
/// Per-file classification failures are *not* part of this type — they are
/// recorded as [`crate::diff::Classification::Error`] and never propagate.
/// Only enumeration, path, and execution failures reach a caller this way.
#[derive(Debug, Error)]
pub enum Error {
    /// The diff engine could not enumerate the source root.
    #[error(transparent)]
    Diff(#[from] DiffError),
    /// A root or relative path operation failed.
    #[error(transparent)]
    Path(#[from] PathError),
    /// A planned action failed to execute.
    #[error(transparent)]
    Execute(#[from] ExecuteError),
    /// A direct accessor call failed outside the diff/execute pipeline.
    #[error(transparent)]
    Accessor(#[from] AccessorError),
    /// A caller hashed a stream directly (via [`crate::Checksum::of_reader`])
    /// and the underlying reader failed mid-hash.
    #[error(transparent)]
    Checksum(#[from] ChecksumError),
}

/// Shorthand for this crate's fallible operations.
pub type Result<T> = std::result::Result<T, Error>;
