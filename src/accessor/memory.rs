//! An in-memory accessor, useful for testing the diff engine and planner
//! without touching a real filesystem.

use std::cell::RefCell;
use std::io::{self, Read, Write};

use camino::{Utf8Path, Utf8PathBuf};
use jiff::Timestamp;
use rustc_hash::{FxHashMap, FxHashSet};

use super::{AccessorError, FilesystemAccessor};
use crate::checksum::Checksum;

#[derive(Clone)]
enum Entry {
    File { contents: Vec<u8>, mtime: Timestamp },
    Symlink { target: Utf8PathBuf },
}

/// A [`FilesystemAccessor`] backed by an in-memory map from path to
/// contents, analogous to a memory-backed mock used to exercise code that
/// would otherwise need a real filesystem.
#[derive(Default)]
pub struct MemoryAccessor {
    entries: RefCell<FxHashMap<Utf8PathBuf, Entry>>,
    poisoned: RefCell<FxHashSet<Utf8PathBuf>>,
}

impl MemoryAccessor {
    /// An accessor with no files.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a file with the given content and modification time,
    /// creating it (and overwriting it, if already present).
    pub fn put_file(&self, abs_path: impl Into<Utf8PathBuf>, contents: impl Into<Vec<u8>>, mtime: Timestamp) {
        self.entries.borrow_mut().insert(
            abs_path.into(),
            Entry::File {
                contents: contents.into(),
                mtime,
            },
        );
    }

    /// Removes a path previously inserted with [`Self::put_file`].
    pub fn remove(&self, abs_path: &Utf8Path) {
        self.entries.borrow_mut().remove(abs_path);
    }

    /// Makes every subsequent [`last_modified`](FilesystemAccessor::last_modified)
    /// or [`compute_checksum`](FilesystemAccessor::compute_checksum) call
    /// against `abs_path` fail with an I/O error, standing in for a read
    /// that fails partway through a real run.
    pub fn poison(&self, abs_path: impl Into<Utf8PathBuf>) {
        self.poisoned.borrow_mut().insert(abs_path.into());
    }

    fn check_poisoned(&self, abs_path: &Utf8Path) -> Result<(), AccessorError> {
        if self.poisoned.borrow().contains(abs_path) {
            return Err(AccessorError::io(
                abs_path,
                io::Error::new(io::ErrorKind::Other, "poisoned for testing"),
            ));
        }
        Ok(())
    }

    fn resolve_target(&self, abs_path: &Utf8Path) -> Result<Utf8PathBuf, AccessorError> {
        let entries = self.entries.borrow();
        match entries.get(abs_path) {
            Some(Entry::File { .. }) | None => Ok(abs_path.to_path_buf()),
            Some(Entry::Symlink { target }) => {
                let target = target.clone();
                drop(entries);
                self.resolve_target(&target)
            }
        }
    }
}

impl FilesystemAccessor for MemoryAccessor {
    fn find_files(
        &self,
        abs_dir: &Utf8Path,
    ) -> Result<Box<dyn Iterator<Item = Result<Utf8PathBuf, AccessorError>> + '_>, AccessorError> {
        let prefix = abs_dir.to_path_buf();
        let paths: Vec<Utf8PathBuf> = self
            .entries
            .borrow()
            .iter()
            .filter(|(path, entry)| matches!(entry, Entry::File { .. }) && path.starts_with(&prefix))
            .map(|(path, _)| path.clone())
            .collect();
        Ok(Box::new(paths.into_iter().map(Ok)))
    }

    fn last_modified(&self, abs_path: &Utf8Path) -> Result<Timestamp, AccessorError> {
        self.check_poisoned(abs_path)?;
        match self.entries.borrow().get(abs_path) {
            Some(Entry::File { mtime, .. }) => Ok(*mtime),
            _ => Err(AccessorError::io(
                abs_path,
                io::Error::new(io::ErrorKind::NotFound, "no such file"),
            )),
        }
    }

    fn compute_checksum(&self, abs_path: &Utf8Path) -> Result<Checksum, AccessorError> {
        self.check_poisoned(abs_path)?;
        let resolved = self.resolve_target(abs_path)?;
        match self.entries.borrow().get(&resolved) {
            Some(Entry::File { contents, .. }) => Ok(Checksum::of_bytes(contents)),
            _ => Err(AccessorError::io(
                abs_path,
                io::Error::new(io::ErrorKind::NotFound, "no such file"),
            )),
        }
    }

    fn create_directories(&self, _abs_path: &Utf8Path) -> Result<(), AccessorError> {
        // Directories are implicit in this map: any prefix of a stored
        // file's path "exists".
        Ok(())
    }

    fn create_symlink(
        &self,
        link_path: &Utf8Path,
        target_path: &Utf8Path,
    ) -> Result<(), AccessorError> {
        self.entries.borrow_mut().insert(
            link_path.to_path_buf(),
            Entry::Symlink {
                target: target_path.to_path_buf(),
            },
        );
        Ok(())
    }

    fn open_input_stream<'a>(
        &'a self,
        abs_path: &Utf8Path,
    ) -> Result<Box<dyn Read + 'a>, AccessorError> {
        let resolved = self.resolve_target(abs_path)?;
        match self.entries.borrow().get(&resolved) {
            Some(Entry::File { contents, .. }) => Ok(Box::new(io::Cursor::new(contents.clone()))),
            _ => Err(AccessorError::io(
                abs_path,
                io::Error::new(io::ErrorKind::NotFound, "no such file"),
            )),
        }
    }

    fn open_output_stream<'a>(
        &'a self,
        abs_path: &Utf8Path,
    ) -> Result<Box<dyn Write + 'a>, AccessorError> {
        Ok(Box::new(MemoryWriter {
            accessor: self,
            path: abs_path.to_path_buf(),
            buffer: Vec::new(),
        }))
    }

    fn copy_file(&self, from: &Utf8Path, to: &Utf8Path) -> Result<Checksum, AccessorError> {
        let resolved = self.resolve_target(from)?;
        let contents = match self.entries.borrow().get(&resolved) {
            Some(Entry::File { contents, .. }) => contents.clone(),
            _ => {
                return Err(AccessorError::io(
                    from,
                    io::Error::new(io::ErrorKind::NotFound, "no such file"),
                ));
            }
        };
        let checksum = Checksum::of_bytes(&contents);
        // Whole-buffer writes are already atomic from the point of view of
        // any reader of this in-memory map: there's no partially written
        // state to observe.
        let now = self.last_modified(&resolved).unwrap_or(Timestamp::UNIX_EPOCH);
        self.put_file(to.to_path_buf(), contents, now);
        Ok(checksum)
    }
}

struct MemoryWriter<'a> {
    accessor: &'a MemoryAccessor,
    path: Utf8PathBuf,
    buffer: Vec<u8>,
}

impl Write for MemoryWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for MemoryWriter<'_> {
    fn drop(&mut self) {
        self.accessor
            .put_file(self.path.clone(), std::mem::take(&mut self.buffer), Timestamp::UNIX_EPOCH);
    }
}
