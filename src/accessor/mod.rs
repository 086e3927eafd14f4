//! The filesystem accessor: the sole boundary between the diff/plan core and
//! a real filesystem.
//!
//! The diff engine ([`crate::diff`]) and copy actions ([`crate::execute`])
//! consume only this trait. Keeping it small and trait-object-friendly lets
//! tests drive the core against [`memory::MemoryAccessor`] without touching
//! disk, while [`os::OsAccessor`] backs production use.

mod os;

pub use os::OsAccessor;

#[cfg(any(test, feature = "test-util"))]
mod memory;
#[cfg(any(test, feature = "test-util"))]
pub use memory::MemoryAccessor;

use std::io::{self, Read, Write};

use camino::{Utf8Path, Utf8PathBuf};
use jiff::Timestamp;
use thiserror::Error;

use crate::checksum::{Checksum, HashingReader};

/// Whether the accessor follows a symbolic link encountered in the source
/// tree (treating it as the file/directory it points to) or reads it as a
/// link (treating its target string as the "file's" content).
///
/// Mirrors the corresponding `Read`/`Dereference` choice made by
/// content-addressed backup tools when walking a tree; CopySnap defaults to
/// `Read` so a snapshot never silently follows a link outside the source
/// tree.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
pub enum SymlinkPolicy {
    /// Treat a symlink as its own entry; never follow it.
    #[default]
    Read,
    /// Follow the symlink and treat its target as the entry's content.
    Dereference,
}

/// A failure reported by a [`FilesystemAccessor`] method.
#[derive(Debug, Error)]
pub enum AccessorError {
    /// An I/O operation on `path` failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// The path the operation was performed against.
        path: Utf8PathBuf,
        /// The underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// A path contained bytes that are not valid UTF-8, and so cannot be
    /// represented as a [`camino::Utf8Path`].
    #[error("{0:?} is not valid UTF-8")]
    NotUtf8(std::path::PathBuf),
}

impl AccessorError {
    pub(crate) fn io(path: &Utf8Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Abstract filesystem I/O consumed by the diff engine and copy actions.
///
/// Implementations must be free to back this with OS calls, an in-memory
/// map, or a recording mock — the core never assumes which.
pub trait FilesystemAccessor {
    /// Enumerates every regular file beneath `abs_dir`. The returned
    /// iterator is finite and single-pass: implementations and callers must
    /// not assume it can be restarted or iterated more than once.
    fn find_files(
        &self,
        abs_dir: &Utf8Path,
    ) -> Result<Box<dyn Iterator<Item = Result<Utf8PathBuf, AccessorError>> + '_>, AccessorError>;

    /// The last modification time of the file at `abs_path`.
    fn last_modified(&self, abs_path: &Utf8Path) -> Result<Timestamp, AccessorError>;

    /// Streams the file at `abs_path` and computes its checksum.
    fn compute_checksum(&self, abs_path: &Utf8Path) -> Result<Checksum, AccessorError>;

    /// Streams the file at `abs_path` and compares its checksum against
    /// `expected`, without the caller needing to hold the freshly computed
    /// checksum.
    fn checksums_equal(
        &self,
        expected: Checksum,
        abs_path: &Utf8Path,
    ) -> Result<bool, AccessorError> {
        Ok(self.compute_checksum(abs_path)? == expected)
    }

    /// Creates `abs_path` and any missing parent directories.
    fn create_directories(&self, abs_path: &Utf8Path) -> Result<(), AccessorError>;

    /// Creates a symbolic link at `link_path` pointing at `target_path`.
    fn create_symlink(
        &self,
        link_path: &Utf8Path,
        target_path: &Utf8Path,
    ) -> Result<(), AccessorError>;

    /// Opens `abs_path` for reading.
    fn open_input_stream<'a>(
        &'a self,
        abs_path: &Utf8Path,
    ) -> Result<Box<dyn Read + 'a>, AccessorError>;

    /// Opens `abs_path` for writing, creating or truncating it.
    fn open_output_stream<'a>(
        &'a self,
        abs_path: &Utf8Path,
    ) -> Result<Box<dyn Write + 'a>, AccessorError>;

    /// Copies the file at `from` to `to`, returning the checksum of the
    /// bytes actually written.
    ///
    /// The checksum is computed in the same pass as the copy, via
    /// [`HashingReader`], rather than by re-reading `to` afterward.
    ///
    /// The default implementation streams through
    /// [`open_input_stream`](Self::open_input_stream)/
    /// [`open_output_stream`](Self::open_output_stream). Implementations
    /// backed by a real filesystem should override this to write through a
    /// temporary file and rename it into place, so a concurrent reader (or
    /// the next run's enumeration) never observes a partially written file —
    /// see [`os::OsAccessor`].
    fn copy_file(&self, from: &Utf8Path, to: &Utf8Path) -> Result<Checksum, AccessorError> {
        let mut input = HashingReader::new(self.open_input_stream(from)?);
        let mut output = self.open_output_stream(to)?;
        io::copy(&mut input, &mut output).map_err(|e| AccessorError::io(to, e))?;
        let (checksum, _) = input.finalize();
        Ok(checksum)
    }
}
