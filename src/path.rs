//! Root-anchored, UTF-8 relative paths.
//!
//! Everything else in this crate compares files by a [`RelativePath`] that
//! begins with a [`Root`]'s root-directory name, never by absolute paths.
//! Absolute paths only appear at the [`crate::accessor`] boundary.

use std::fmt;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;

/// Failure constructing or resolving a [`Root`] or [`RelativePath`].
#[derive(Debug, Error)]
pub enum PathError {
    /// The path handed to [`Root::new`] has no final component to use as a
    /// root directory name (e.g. `/`).
    #[error("{0} has no file name to use as a root directory")]
    NoRootDir(Utf8PathBuf),
    /// An absolute path was outside the root it was relativized against.
    #[error("{path} is not inside root location {location}")]
    NotUnderRoot {
        /// The absolute path that escaped the root.
        path: Utf8PathBuf,
        /// The root location it was checked against.
        location: Utf8PathBuf,
    },
}

/// An absolute anchor: the parent directory of a snapshot root, plus the
/// root directory's own name.
///
/// Given an absolute path `/a/b/c/r` to the root directory, the root's
/// [`Root::location`] is `/a/b/c` and its [`Root::root_dir`] is `r`. Every
/// [`crate::FileState`] path produced against this root is relative to
/// `location`, so it begins with `r/...`.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Root {
    location: Utf8PathBuf,
    root_dir: String,
}

impl Root {
    /// Builds a [`Root`] from an absolute path to the root directory itself.
    pub fn new(path_to_root_dir: &Utf8Path) -> Result<Self, PathError> {
        let root_dir = path_to_root_dir
            .file_name()
            .ok_or_else(|| PathError::NoRootDir(path_to_root_dir.to_path_buf()))?
            .to_owned();
        let location = path_to_root_dir
            .parent()
            .map(Utf8Path::to_path_buf)
            .unwrap_or_default();
        Ok(Self { location, root_dir })
    }

    /// The absolute directory that all of this root's relative paths are
    /// resolved against.
    #[must_use]
    pub fn location(&self) -> &Utf8Path {
        &self.location
    }

    /// The name of the topmost directory anchored by this root.
    #[must_use]
    pub fn root_dir(&self) -> &str {
        &self.root_dir
    }

    /// The absolute path to the root directory itself (`location/root_dir`).
    #[must_use]
    pub fn path_to_root_dir(&self) -> Utf8PathBuf {
        self.location.join(&self.root_dir)
    }

    /// Turns an absolute path beneath this root's location into a
    /// [`RelativePath`] beginning with the root-dir name.
    pub fn relativize(&self, absolute: &Utf8Path) -> Result<RelativePath, PathError> {
        let rel = absolute
            .strip_prefix(&self.location)
            .map_err(|_| PathError::NotUnderRoot {
                path: absolute.to_path_buf(),
                location: self.location.clone(),
            })?;
        Ok(RelativePath::new(rel.to_path_buf()))
    }

    /// Resolves a path relative to this root's location back to an absolute path.
    #[must_use]
    pub fn resolve(&self, rel: &RelativePath) -> Utf8PathBuf {
        self.location.join(rel.as_path())
    }
}

/// A path relative to a [`Root`]'s location, always beginning with the
/// root-dir name.
///
/// The subtree-promotion walk in [`crate::plan`] operates on path-segment
/// boundaries, never on string prefixes: it splits each path on `/` rather
/// than comparing path strings directly, so `foo` and `foobar` are never
/// mistaken for ancestor and descendant.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct RelativePath(Utf8PathBuf);

impl RelativePath {
    pub(crate) fn new(path: Utf8PathBuf) -> Self {
        Self(path)
    }

    /// Borrows the underlying path.
    #[must_use]
    pub fn as_path(&self) -> &Utf8Path {
        &self.0
    }

    /// Joins an additional path segment onto this path.
    #[must_use]
    pub fn join(&self, segment: &str) -> Self {
        Self(self.0.join(segment))
    }
}

impl fmt::Display for RelativePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Utf8PathBuf> for RelativePath {
    fn from(path: Utf8PathBuf) -> Self {
        Self(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_location_and_root_dir() {
        let root = Root::new(Utf8Path::new("/x/y/z/r")).unwrap();
        assert_eq!(root.location(), Utf8Path::new("/x/y/z"));
        assert_eq!(root.root_dir(), "r");
        assert_eq!(root.path_to_root_dir(), Utf8PathBuf::from("/x/y/z/r"));
    }

    #[test]
    fn relativize_round_trips_through_resolve() {
        let root = Root::new(Utf8Path::new("/x/y/z/r")).unwrap();
        let abs = Utf8PathBuf::from("/x/y/z/r/a/b/c/f");
        let rel = root.relativize(&abs).unwrap();
        assert_eq!(rel.as_path(), Utf8Path::new("r/a/b/c/f"));
        assert_eq!(root.resolve(&rel), abs);
    }

    #[test]
    fn relativize_rejects_paths_outside_location() {
        let root = Root::new(Utf8Path::new("/x/y/z/r")).unwrap();
        assert!(root.relativize(Utf8Path::new("/other/path")).is_err());
    }
}
