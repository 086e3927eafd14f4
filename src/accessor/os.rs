//! An accessor backed by the real filesystem.

use std::fs::{self, File};
use std::io::{self, Read, Write};

use camino::{Utf8Path, Utf8PathBuf};
use jiff::Timestamp;
use tempfile::NamedTempFile;
use walkdir::WalkDir;

use super::{AccessorError, FilesystemAccessor, SymlinkPolicy};
use crate::checksum::{Checksum, HashingReader};

/// A [`FilesystemAccessor`] backed by `std::fs` and a recursive directory
/// walk, the implementation a real CopySnap run uses.
pub struct OsAccessor {
    symlink_policy: SymlinkPolicy,
}

impl Default for OsAccessor {
    fn default() -> Self {
        Self::new()
    }
}

impl OsAccessor {
    /// An accessor that never follows symlinks found while walking the
    /// source tree.
    #[must_use]
    pub fn new() -> Self {
        Self {
            symlink_policy: SymlinkPolicy::Read,
        }
    }

    /// An accessor using the given symlink policy while walking the source
    /// tree.
    #[must_use]
    pub fn with_symlink_policy(symlink_policy: SymlinkPolicy) -> Self {
        Self { symlink_policy }
    }

    fn to_utf8(path: &std::path::Path) -> Result<Utf8PathBuf, AccessorError> {
        Utf8PathBuf::from_path_buf(path.to_path_buf())
            .map_err(|p| AccessorError::NotUtf8(p))
    }

    fn system_time_to_timestamp(
        abs_path: &Utf8Path,
        time: std::time::SystemTime,
    ) -> Result<Timestamp, AccessorError> {
        Timestamp::try_from(time).map_err(|e| {
            AccessorError::io(abs_path, io::Error::new(io::ErrorKind::InvalidData, e))
        })
    }
}

impl FilesystemAccessor for OsAccessor {
    fn find_files(
        &self,
        abs_dir: &Utf8Path,
    ) -> Result<Box<dyn Iterator<Item = Result<Utf8PathBuf, AccessorError>> + '_>, AccessorError> {
        let follow_links = matches!(self.symlink_policy, SymlinkPolicy::Dereference);
        // Fail fast if the root itself can't be listed at all, matching the
        // "enumeration failure is fatal" contract: a single eager read of
        // the top directory surfaces a missing/unreadable root immediately
        // instead of only on the first iterator step.
        fs::read_dir(abs_dir).map_err(|e| AccessorError::io(abs_dir, e))?;

        let abs_dir_owned = abs_dir.to_path_buf();
        let walker = WalkDir::new(abs_dir)
            .follow_links(follow_links)
            .into_iter()
            .filter_map(move |entry| match entry {
                Ok(entry) if entry.file_type().is_file() => Some(Self::to_utf8(entry.path())),
                Ok(_) => None,
                Err(err) => {
                    let path = err
                        .path()
                        .and_then(Utf8Path::from_path)
                        .map(Utf8Path::to_path_buf)
                        .unwrap_or_else(|| abs_dir_owned.clone());
                    Some(Err(AccessorError::io(&path, io::Error::other(err))))
                }
            });
        Ok(Box::new(walker))
    }

    fn last_modified(&self, abs_path: &Utf8Path) -> Result<Timestamp, AccessorError> {
        let metadata = fs::metadata(abs_path).map_err(|e| AccessorError::io(abs_path, e))?;
        let modified = metadata
            .modified()
            .map_err(|e| AccessorError::io(abs_path, e))?;
        Self::system_time_to_timestamp(abs_path, modified)
    }

    fn compute_checksum(&self, abs_path: &Utf8Path) -> Result<Checksum, AccessorError> {
        let file = File::open(abs_path).map_err(|e| AccessorError::io(abs_path, e))?;
        Checksum::of_reader(file).map_err(|e| AccessorError::io(abs_path, e.into_io_error()))
    }

    fn create_directories(&self, abs_path: &Utf8Path) -> Result<(), AccessorError> {
        fs::create_dir_all(abs_path).map_err(|e| AccessorError::io(abs_path, e))
    }

    fn create_symlink(
        &self,
        link_path: &Utf8Path,
        target_path: &Utf8Path,
    ) -> Result<(), AccessorError> {
        #[cfg(unix)]
        {
            std::os::unix::fs::symlink(target_path, link_path)
                .map_err(|e| AccessorError::io(link_path, e))
        }
        #[cfg(windows)]
        {
            if target_path.is_dir() {
                std::os::windows::fs::symlink_dir(target_path, link_path)
            } else {
                std::os::windows::fs::symlink_file(target_path, link_path)
            }
            .map_err(|e| AccessorError::io(link_path, e))
        }
        #[cfg(not(any(unix, windows)))]
        {
            let _ = (link_path, target_path);
            Err(AccessorError::io(
                link_path,
                io::Error::new(io::ErrorKind::Unsupported, "symlinks unsupported here"),
            ))
        }
    }

    fn open_input_stream<'a>(
        &'a self,
        abs_path: &Utf8Path,
    ) -> Result<Box<dyn Read + 'a>, AccessorError> {
        Ok(Box::new(
            File::open(abs_path).map_err(|e| AccessorError::io(abs_path, e))?,
        ))
    }

    fn open_output_stream<'a>(
        &'a self,
        abs_path: &Utf8Path,
    ) -> Result<Box<dyn Write + 'a>, AccessorError> {
        Ok(Box::new(
            File::create(abs_path).map_err(|e| AccessorError::io(abs_path, e))?,
        ))
    }

    fn copy_file(&self, from: &Utf8Path, to: &Utf8Path) -> Result<Checksum, AccessorError> {
        let parent = to.parent().unwrap_or(to);
        let mut temp =
            NamedTempFile::new_in(parent).map_err(|e| AccessorError::io(parent, e))?;
        let source = File::open(from).map_err(|e| AccessorError::io(from, e))?;
        let mut hashing = HashingReader::new(source);
        io::copy(&mut hashing, temp.as_file_mut()).map_err(|e| AccessorError::io(to, e))?;
        let (checksum, _) = hashing.finalize();
        temp.persist(to)
            .map_err(|e| AccessorError::io(to, e.error))?;
        Ok(checksum)
    }
}
