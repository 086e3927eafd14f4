//! The diff engine: compares the current source tree against a prior
//! [`FileSystemState`] and classifies every path.

use rustc_hash::FxHashMap;
use thiserror::Error;
use tracing::{debug, trace};

use crate::accessor::{AccessorError, FilesystemAccessor};
#[cfg(test)]
use crate::checksum::Checksum;
use crate::file_state::{FileState, FileSystemState};
use crate::path::{PathError, RelativePath, Root};

/// What happened to one path between the prior state and the current tree.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Classification {
    /// Present now, absent from the prior state.
    New,
    /// Present in both, but content differs.
    Changed,
    /// Present in both, same mtime recorded — content assumed unchanged
    /// without re-reading it.
    Unchanged,
    /// Present in both, mtime differs but content is identical once
    /// compared. Treated as [`Classification::Unchanged`] for planning; the
    /// new state's mtime is refreshed.
    UnchangedButTouched,
    /// Present in the prior state, absent now.
    Removed,
    /// Classifying this path failed; it is dropped from the new state.
    Error,
}

impl Classification {
    /// Whether the planner should treat this as unchanged for the purposes
    /// of subtree-alias promotion.
    #[must_use]
    pub fn is_unchanged_for_planning(self) -> bool {
        matches!(self, Self::Unchanged | Self::UnchangedButTouched)
    }
}

/// One path's classification result, plus the new state it produced (absent
/// for [`Classification::Removed`] and [`Classification::Error`]).
#[derive(Debug, Clone)]
pub struct ClassifiedEntry {
    rel_path: RelativePath,
    classification: Classification,
    new_state: Option<FileState>,
}

impl ClassifiedEntry {
    /// The path this entry describes.
    #[must_use]
    pub fn rel_path(&self) -> &RelativePath {
        &self.rel_path
    }

    /// How this path changed (or didn't) relative to the prior state.
    #[must_use]
    pub fn classification(&self) -> Classification {
        self.classification
    }

    /// The freshly recorded state for this path, if it has one.
    #[must_use]
    pub fn new_state(&self) -> Option<&FileState> {
        self.new_state.as_ref()
    }
}

/// Per-run counters, for reporting only — never consulted for correctness.
///
/// Positions mirror the tuple shape a caller might log or assert against:
/// `(errors, removed, new_or_changed, unchanged, _reserved)`. The fifth slot
/// is always `0`; nothing in this crate's contract assigns it a meaning.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct DiffCounts {
    /// Number of paths that failed classification.
    pub errors: usize,
    /// Number of paths present in the prior state but not the current tree.
    pub removed: usize,
    /// Number of paths classified NEW or CHANGED.
    pub new_or_changed: usize,
    /// Number of paths classified UNCHANGED or UNCHANGED_BUT_TOUCHED.
    pub unchanged: usize,
}

impl DiffCounts {
    fn record(&mut self, classification: Classification) {
        match classification {
            Classification::New | Classification::Changed => self.new_or_changed += 1,
            Classification::Unchanged | Classification::UnchangedButTouched => {
                self.unchanged += 1;
            }
            Classification::Removed => self.removed += 1,
            Classification::Error => self.errors += 1,
        }
    }

    /// The reserved fifth reporting slot, fixed at `0`.
    #[must_use]
    pub fn reserved(&self) -> usize {
        0
    }
}

/// A fatal failure in the diff engine: the source root couldn't be
/// enumerated at all, or a classified path couldn't be related back to the
/// source root. Per-file I/O failures are *not* represented here — they're
/// recorded as [`Classification::Error`] and the run continues.
#[derive(Debug, Error)]
pub enum DiffError {
    /// The source root could not be listed.
    #[error("failed to enumerate {0}: {1}")]
    Enumeration(camino::Utf8PathBuf, #[source] AccessorError),
    /// An enumerated path could not be relativized against the source root.
    #[error(transparent)]
    Path(#[from] PathError),
}

/// The result of diffing a source tree against a prior state: every
/// classified path, the freshly built state, and summary counts.
#[derive(Debug)]
pub struct FileSystemDiff {
    source_root: Root,
    entries: FxHashMap<RelativePath, ClassifiedEntry>,
    new_state: FileSystemState,
    counts: DiffCounts,
    errors: Vec<(RelativePath, String)>,
}

impl FileSystemDiff {
    /// The root the current tree was walked from.
    #[must_use]
    pub fn source_root(&self) -> &Root {
        &self.source_root
    }

    /// Looks up a path's classification, if it was touched by this diff.
    #[must_use]
    pub fn get(&self, rel_path: &RelativePath) -> Option<&ClassifiedEntry> {
        self.entries.get(rel_path)
    }

    /// Every classified entry, in unspecified order.
    pub fn entries(&self) -> impl Iterator<Item = &ClassifiedEntry> {
        self.entries.values()
    }

    /// The freshly built state: every path currently present and
    /// successfully classified, NEW/CHANGED with fresh checksums and
    /// UNCHANGED reusing the prior checksum.
    #[must_use]
    pub fn new_state(&self) -> &FileSystemState {
        &self.new_state
    }

    /// Summary counters for this run.
    #[must_use]
    pub fn counts(&self) -> DiffCounts {
        self.counts
    }

    /// Paths that failed classification, paired with the failure message,
    /// for callers that want to surface them beyond the `errors` count.
    #[must_use]
    pub fn errors(&self) -> &[(RelativePath, String)] {
        &self.errors
    }
}

/// Walks `source_root`, classifies every file against `prior_state`, and
/// returns the full diff.
///
/// Per-file I/O errors are isolated and recorded as
/// [`Classification::Error`]; only a failure to enumerate the root itself is
/// fatal.
pub fn diff_tree(
    source_root: &Root,
    prior_state: &FileSystemState,
    fsa: &dyn FilesystemAccessor,
) -> Result<FileSystemDiff, DiffError> {
    let mut entries = FxHashMap::default();
    let mut new_state = FileSystemState::builder(source_root.location().to_path_buf());
    let mut counts = DiffCounts::default();
    let mut errors = Vec::new();
    let mut seen = rustc_hash::FxHashSet::default();

    let root_dir = source_root.path_to_root_dir();
    let files = fsa
        .find_files(&root_dir)
        .map_err(|e| DiffError::Enumeration(root_dir.clone(), e))?;

    for file in files {
        let abs_path = match file {
            Ok(p) => p,
            Err(_) => {
                // The accessor couldn't even name this path; there's no
                // relPath to record it under, so it's neither NEW nor
                // ERROR in the output — it simply never existed as far as
                // classification is concerned. A fatal enumeration failure
                // (the common case) is caught above before any iteration.
                continue;
            }
        };
        let rel_path = source_root.relativize(&abs_path)?;
        let prior = prior_state.get(&rel_path);
        let entry = match classify_one(fsa, &abs_path, &rel_path, prior) {
            Ok(entry) => entry,
            Err(e) => {
                errors.push((rel_path.clone(), e.to_string()));
                error_entry(&rel_path)
            }
        };

        trace!(path = %rel_path, classification = ?entry.classification, "classified path");
        counts.record(entry.classification);
        if let Some(state) = entry.new_state.clone() {
            new_state.add(state);
        }
        seen.insert(rel_path.clone());
        entries.insert(rel_path, entry);
    }

    for file_state in prior_state.iter() {
        let rel_path = file_state.rel_path();
        if !seen.contains(rel_path) {
            trace!(path = %rel_path, "classified path as removed");
            counts.record(Classification::Removed);
            entries.insert(
                rel_path.clone(),
                ClassifiedEntry {
                    rel_path: rel_path.clone(),
                    classification: Classification::Removed,
                    new_state: None,
                },
            );
        }
    }

    debug!(?counts, "diff complete");

    Ok(FileSystemDiff {
        source_root: source_root.clone(),
        entries,
        new_state: new_state.build(),
        counts,
        errors,
    })
}

fn classify_one(
    fsa: &dyn FilesystemAccessor,
    abs_path: &camino::Utf8Path,
    rel_path: &RelativePath,
    prior: Option<&FileState>,
) -> Result<ClassifiedEntry, AccessorError> {
    let Some(prior) = prior else {
        let mtime = fsa.last_modified(abs_path)?;
        let checksum = fsa.compute_checksum(abs_path)?;
        return Ok(ClassifiedEntry {
            rel_path: rel_path.clone(),
            classification: Classification::New,
            new_state: Some(FileState::new(rel_path.clone(), mtime, checksum)),
        });
    };

    let current_mtime = fsa.last_modified(abs_path)?;

    if current_mtime == prior.last_modified() {
        return Ok(ClassifiedEntry {
            rel_path: rel_path.clone(),
            classification: Classification::Unchanged,
            new_state: Some(FileState::new(rel_path.clone(), current_mtime, prior.checksum())),
        });
    }

    if fsa.checksums_equal(prior.checksum(), abs_path)? {
        Ok(ClassifiedEntry {
            rel_path: rel_path.clone(),
            classification: Classification::UnchangedButTouched,
            new_state: Some(FileState::new(rel_path.clone(), current_mtime, prior.checksum())),
        })
    } else {
        let checksum = fsa.compute_checksum(abs_path)?;
        Ok(ClassifiedEntry {
            rel_path: rel_path.clone(),
            classification: Classification::Changed,
            new_state: Some(FileState::new(rel_path.clone(), current_mtime, checksum)),
        })
    }
}

fn error_entry(rel_path: &RelativePath) -> ClassifiedEntry {
    ClassifiedEntry {
        rel_path: rel_path.clone(),
        classification: Classification::Error,
        new_state: None,
    }
}
