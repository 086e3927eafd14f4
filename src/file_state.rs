//! Per-file records and the set of them that make up a recorded snapshot.

use camino::{Utf8Path, Utf8PathBuf};
use jiff::Timestamp;
use rustc_hash::FxHashMap;

use crate::checksum::Checksum;
use crate::path::RelativePath;

/// One regular file at one point in time: its path, modification time, and
/// content checksum.
///
/// Immutable once created; equality is structural over all three fields.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FileState {
    rel_path: RelativePath,
    last_modified: Timestamp,
    checksum: Checksum,
}

#[cfg(feature = "serde")]
impl serde::Serialize for RelativePath {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_path().as_str())
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for RelativePath {
    fn deserialize<D>(deserializer: D) -> Result<RelativePath, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(RelativePath::from(Utf8PathBuf::from(s)))
    }
}

impl FileState {
    /// Builds a new file record.
    #[must_use]
    pub fn new(rel_path: RelativePath, last_modified: Timestamp, checksum: Checksum) -> Self {
        Self {
            rel_path,
            last_modified,
            checksum,
        }
    }

    /// The path of this file, relative to its [`crate::Root`]'s location.
    #[must_use]
    pub fn rel_path(&self) -> &RelativePath {
        &self.rel_path
    }

    /// The modification time recorded when this file was last classified.
    #[must_use]
    pub fn last_modified(&self) -> Timestamp {
        self.last_modified
    }

    /// The content checksum recorded when this file was last classified.
    #[must_use]
    pub fn checksum(&self) -> Checksum {
        self.checksum
    }
}

/// An immutable, unordered collection of [`FileState`] with pairwise-unique
/// relative paths, anchored at an absolute location.
///
/// Built incrementally via [`FileSystemStateBuilder`], then frozen. Whether
/// and how this is persisted between runs is outside this crate's scope —
/// see the `serde` feature for a caller-supplied serialization hook.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FileSystemState {
    location: Utf8PathBuf,
    entries: FxHashMap<RelativePath, FileState>,
}

impl FileSystemState {
    /// Starts building a new state anchored at `location`.
    #[must_use]
    pub fn builder(location: Utf8PathBuf) -> FileSystemStateBuilder {
        FileSystemStateBuilder {
            location,
            entries: FxHashMap::default(),
        }
    }

    /// An empty state anchored at `location`, with no recorded files.
    #[must_use]
    pub fn empty(location: Utf8PathBuf) -> Self {
        Self::builder(location).build()
    }

    /// The absolute location every entry's relative path resolves against.
    #[must_use]
    pub fn location(&self) -> &Utf8Path {
        &self.location
    }

    /// Looks up the recorded state for a path, if any.
    #[must_use]
    pub fn get(&self, rel_path: &RelativePath) -> Option<&FileState> {
        self.entries.get(rel_path)
    }

    /// Number of recorded files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no files are recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over every recorded file, in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = &FileState> {
        self.entries.values()
    }
}

/// Accumulates [`FileState`] entries before freezing them into a
/// [`FileSystemState`].
///
/// Mirrors the add-then-build lifecycle the diff engine needs: a fresh
/// builder is filled in while walking the source tree, then frozen once at
/// the end of the run.
pub struct FileSystemStateBuilder {
    location: Utf8PathBuf,
    entries: FxHashMap<RelativePath, FileState>,
}

impl FileSystemStateBuilder {
    /// Records a file's state. Returns `false` (and leaves the existing
    /// entry in place) if `state`'s path was already recorded — the
    /// pairwise-unique-path invariant means callers should never actually
    /// hit this in practice, since every relative path is visited at most
    /// once while walking a tree.
    pub fn add(&mut self, state: FileState) -> bool {
        use std::collections::hash_map::Entry;
        match self.entries.entry(state.rel_path.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(state);
                true
            }
        }
    }

    /// Freezes the builder into an immutable [`FileSystemState`].
    #[must_use]
    pub fn build(self) -> FileSystemState {
        FileSystemState {
            location: self.location,
            entries: self.entries,
        }
    }
}
