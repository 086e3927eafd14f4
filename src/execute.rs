//! Executing a single planned [`CopyAction`] against an accessor.

use camino::Utf8Path;
use thiserror::Error;
use tracing::debug;

use crate::accessor::{AccessorError, FilesystemAccessor};
use crate::file_state::FileState;
use crate::path::RelativePath;
use crate::plan::CopyAction;

/// A planned action could not be carried out.
#[derive(Debug, Error)]
#[error("failed to execute action for {rel_path}: {source}")]
pub struct ExecuteError {
    rel_path: RelativePath,
    #[source]
    source: AccessorError,
}

/// Executes one [`CopyAction`] against `fsa`, materializing its destination
/// path. Ensures parent directories exist first, then performs the action's
/// single primitive: a stream-copy for [`CopyAction::Plain`], or
/// `create_symlink` for [`CopyAction::Symlink`].
///
/// Returns the freshly recorded [`FileState`] for a `Plain` action; `None`
/// for `Symlink`, whose state the caller inherits from the prior snapshot.
pub fn execute_action(
    action: &CopyAction,
    fsa: &dyn FilesystemAccessor,
) -> Result<Option<FileState>, ExecuteError> {
    match action {
        CopyAction::Plain {
            source_location,
            destination_location,
            rel_path,
        } => {
            let from = source_location.join(rel_path.as_path());
            let to = destination_location.join(rel_path.as_path());
            ensure_parent(&to, fsa, rel_path)?;
            let checksum = fsa.copy_file(&from, &to).map_err(|e| wrap(rel_path, e))?;
            let mtime = fsa.last_modified(&to).map_err(|e| wrap(rel_path, e))?;
            debug!(path = %rel_path, "copied file");
            Ok(Some(FileState::new(rel_path.clone(), mtime, checksum)))
        }
        CopyAction::Symlink {
            source_location,
            destination_location,
            rel_path,
        } => {
            let target = source_location.join(rel_path.as_path());
            let link = destination_location.join(rel_path.as_path());
            ensure_parent(&link, fsa, rel_path)?;
            fsa.create_symlink(&link, &target)
                .map_err(|e| wrap(rel_path, e))?;
            debug!(path = %rel_path, "created symlink");
            Ok(None)
        }
    }
}

/// Executes every action in `plan`, in order, stopping at the first failure.
///
/// Actions are independent of each other (no action depends on another
/// having run first, apart from shared parent directories, which each
/// action creates itself), so a caller that wants partial-failure tolerance
/// can instead call [`execute_action`] per entry and continue past errors.
pub fn execute_plan(
    plan: &[CopyAction],
    fsa: &dyn FilesystemAccessor,
) -> Result<Vec<(RelativePath, Option<FileState>)>, ExecuteError> {
    plan.iter()
        .map(|action| Ok((action.rel_path().clone(), execute_action(action, fsa)?)))
        .collect()
}

fn ensure_parent(
    abs_path: &Utf8Path,
    fsa: &dyn FilesystemAccessor,
    rel_path: &RelativePath,
) -> Result<(), ExecuteError> {
    if let Some(parent) = abs_path.parent() {
        fsa.create_directories(parent)
            .map_err(|e| wrap(rel_path, e))?;
    }
    Ok(())
}

fn wrap(rel_path: &RelativePath, source: AccessorError) -> ExecuteError {
    ExecuteError {
        rel_path: rel_path.clone(),
        source,
    }
}
