//! Incremental filesystem snapshotting.
//!
//! Given a source directory tree and a previously recorded
//! [`FileSystemState`], [`diff::diff_tree`] classifies every current file
//! against it, [`plan::plan_copy_actions`] turns the classified diff into a
//! minimal set of [`plan::CopyAction`]s (plain copies for new or changed
//! content, symbolic links aliasing into the prior snapshot everywhere
//! else), and [`execute::execute_plan`] carries that plan out against a
//! [`accessor::FilesystemAccessor`].
//!
//! The accessor is the sole boundary against a real filesystem; swapping in
//! [`accessor::MemoryAccessor`] (behind the `test-util` feature, always on
//! for this crate's own tests) lets the diff/plan pipeline be exercised
//! without touching disk.

pub mod accessor;
pub mod checksum;
pub mod diff;
pub mod error;
pub mod execute;
pub mod file_state;
pub mod path;
pub mod plan;

pub use accessor::{AccessorError, FilesystemAccessor, OsAccessor, SymlinkPolicy};
pub use checksum::{Checksum, ChecksumError};
pub use diff::{Classification, ClassifiedEntry, DiffCounts, FileSystemDiff, diff_tree};
pub use error::{Error, Result};
pub use execute::{execute_action, execute_plan};
pub use file_state::{FileState, FileSystemState, FileSystemStateBuilder};
pub use path::{PathError, RelativePath, Root};
pub use plan::{CopyAction, plan_copy_actions};
