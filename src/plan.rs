//! The copy-action planner: turns a classified diff into a minimal set of
//! [`CopyAction`]s, promoting whole unchanged subtrees to a single symlink.

use std::collections::BTreeMap;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::debug;

use crate::diff::{Classification, FileSystemDiff};
use crate::path::RelativePath;

/// A single primitive the [`crate::execute`] module can carry out to
/// materialize one path in the new snapshot.
///
/// Equality is structural over the variant tag and all three fields —
/// deliberately, since tests assert on the exact action set a plan produces.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum CopyAction {
    /// Stream the current file's bytes from `source_location/rel_path` to
    /// `destination_location/rel_path`.
    Plain {
        /// Where the live content is read from.
        source_location: Utf8PathBuf,
        /// Where the new snapshot is materialized.
        destination_location: Utf8PathBuf,
        /// Path relative to both locations.
        rel_path: RelativePath,
    },
    /// Create a symbolic link at `destination_location/rel_path` pointing at
    /// `source_location/rel_path`, aliasing into the prior snapshot.
    Symlink {
        /// The prior snapshot's location, the link's target.
        source_location: Utf8PathBuf,
        /// Where the new snapshot is materialized.
        destination_location: Utf8PathBuf,
        /// Path relative to both locations.
        rel_path: RelativePath,
    },
}

impl CopyAction {
    /// The path, relative to both locations, this action materializes.
    #[must_use]
    pub fn rel_path(&self) -> &RelativePath {
        match self {
            Self::Plain { rel_path, .. } | Self::Symlink { rel_path, .. } => rel_path,
        }
    }
}

enum DirChild {
    File(Classification),
    Dir(DirNode),
}

#[derive(Default)]
struct DirNode {
    children: BTreeMap<String, DirChild>,
}

impl DirNode {
    fn insert(&mut self, segments: &[&str], classification: Classification) {
        match segments {
            [] => {}
            [only] => {
                self.children
                    .insert((*only).to_string(), DirChild::File(classification));
            }
            [head, rest @ ..] => {
                let child = self
                    .children
                    .entry((*head).to_string())
                    .or_insert_with(|| DirChild::Dir(DirNode::default()));
                if let DirChild::Dir(node) = child {
                    node.insert(rest, classification);
                }
            }
        }
    }

    /// A directory is purely-unchanged if every file descendant is
    /// UNCHANGED (or UNCHANGED_BUT_TOUCHED) and no descendant was REMOVED,
    /// NEW, CHANGED, or ERROR.
    fn purely_unchanged(&self) -> bool {
        self.children.values().all(|child| match child {
            DirChild::File(classification) => classification.is_unchanged_for_planning(),
            DirChild::Dir(node) => node.purely_unchanged(),
        })
    }
}

/// Computes the minimal [`CopyAction`] set that materializes `diff`'s
/// current tree at `destination`, aliasing into `prior_root_location` for
/// every purely-unchanged subtree.
///
/// A pure function: performs no I/O and depends only on its inputs.
#[must_use]
pub fn plan_copy_actions(
    diff: &FileSystemDiff,
    destination: &Utf8Path,
    prior_root_location: &Utf8Path,
) -> Vec<CopyAction> {
    let mut root = DirNode::default();
    for entry in diff.entries() {
        let rel_path = entry.rel_path();
        let segments: Vec<&str> = rel_path.as_path().as_str().split('/').collect();
        root.insert(&segments, entry.classification());
    }

    let source_location = diff.source_root().location();
    let mut actions = Vec::new();
    for (name, child) in &root.children {
        let rel_path = RelativePath::from(Utf8PathBuf::from(name.as_str()));
        walk(
            child,
            &rel_path,
            source_location,
            destination,
            prior_root_location,
            &mut actions,
        );
    }
    actions
}

fn walk(
    child: &DirChild,
    rel_path: &RelativePath,
    source_location: &Utf8Path,
    destination: &Utf8Path,
    prior_root_location: &Utf8Path,
    actions: &mut Vec<CopyAction>,
) {
    match child {
        DirChild::File(classification) => {
            if let Some(action) = leaf_action(
                *classification,
                rel_path,
                source_location,
                destination,
                prior_root_location,
            ) {
                actions.push(action);
            }
        }
        DirChild::Dir(node) => {
            if node.purely_unchanged() {
                debug!(path = %rel_path, "aliasing purely-unchanged subtree");
                actions.push(CopyAction::Symlink {
                    source_location: prior_root_location.to_path_buf(),
                    destination_location: destination.to_path_buf(),
                    rel_path: rel_path.clone(),
                });
                return;
            }
            for (name, grandchild) in &node.children {
                let child_rel = rel_path.join(name);
                walk(
                    grandchild,
                    &child_rel,
                    source_location,
                    destination,
                    prior_root_location,
                    actions,
                );
            }
        }
    }
}

fn leaf_action(
    classification: Classification,
    rel_path: &RelativePath,
    source_location: &Utf8Path,
    destination: &Utf8Path,
    prior_root_location: &Utf8Path,
) -> Option<CopyAction> {
    let action = match classification {
        Classification::New | Classification::Changed => Some(CopyAction::Plain {
            source_location: source_location.to_path_buf(),
            destination_location: destination.to_path_buf(),
            rel_path: rel_path.clone(),
        }),
        Classification::Unchanged | Classification::UnchangedButTouched => Some(CopyAction::Symlink {
            source_location: prior_root_location.to_path_buf(),
            destination_location: destination.to_path_buf(),
            rel_path: rel_path.clone(),
        }),
        // REMOVED has nothing to materialize; ERROR was dropped from the
        // new state entirely, so it is likewise absent from the plan.
        Classification::Removed | Classification::Error => None,
    };
    if let Some(action) = &action {
        let kind = match action {
            CopyAction::Plain { .. } => "plain",
            CopyAction::Symlink { .. } => "symlink",
        };
        debug!(path = %rel_path, kind, "emitting leaf action");
    }
    action
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accessor::MemoryAccessor;
    use crate::checksum::Checksum;
    use crate::diff::diff_tree;
    use crate::file_state::{FileState, FileSystemState};
    use crate::path::Root;
    use jiff::Timestamp;

    fn t(seconds: i64) -> Timestamp {
        Timestamp::from_second(seconds).unwrap()
    }

    #[test]
    fn s1_plain_copy_of_single_changed_file() {
        let fsa = MemoryAccessor::new();
        fsa.put_file("/x/y/z/r/a/b/c/f", b"newHash".to_vec(), t(1));
        let source_root = Root::new(Utf8Path::new("/x/y/z/r")).unwrap();
        let rel = source_root.relativize(Utf8Path::new("/x/y/z/r/a/b/c/f")).unwrap();

        let mut builder = FileSystemState::builder(source_root.location().to_path_buf());
        builder.add(FileState::new(rel.clone(), t(0), Checksum::of_bytes(b"oldHash")));
        let prior_state = builder.build();

        let diff = diff_tree(&source_root, &prior_state, &fsa).unwrap();
        let actions = plan_copy_actions(&diff, Utf8Path::new("/p/q/rnew"), Utf8Path::new("/p/q/rold"));

        assert_eq!(
            actions,
            vec![CopyAction::Plain {
                source_location: Utf8PathBuf::from("/x/y/z"),
                destination_location: Utf8PathBuf::from("/p/q/rnew"),
                rel_path: rel,
            }]
        );
    }

    #[test]
    fn s2_whole_tree_alias_when_nothing_changed() {
        let fsa = MemoryAccessor::new();
        fsa.put_file("/x/y/z/r/a/b/c/f", b"{0}".to_vec(), t(1));
        let source_root = Root::new(Utf8Path::new("/x/y/z/r")).unwrap();
        let rel = source_root.relativize(Utf8Path::new("/x/y/z/r/a/b/c/f")).unwrap();

        let mut builder = FileSystemState::builder(source_root.location().to_path_buf());
        builder.add(FileState::new(rel, t(0), Checksum::of_bytes(b"{0}")));
        let prior_state = builder.build();

        let diff = diff_tree(&source_root, &prior_state, &fsa).unwrap();
        let actions = plan_copy_actions(&diff, Utf8Path::new("/p/q/rnew"), Utf8Path::new("/p/q/rold"));

        assert_eq!(
            actions,
            vec![CopyAction::Symlink {
                source_location: Utf8PathBuf::from("/p/q/rold"),
                destination_location: Utf8PathBuf::from("/p/q/rnew"),
                rel_path: RelativePath::from(Utf8PathBuf::from("r")),
            }]
        );
    }

    #[test]
    fn s3_mixed_changed_and_unchanged_sibling_subtrees() {
        let fsa = MemoryAccessor::new();
        fsa.put_file("/x/y/z/r/a/b/c/f", b"0".to_vec(), t(1));
        fsa.put_file("/x/y/z/r/a/v/w/F", b"9".to_vec(), t(1));
        let source_root = Root::new(Utf8Path::new("/x/y/z/r")).unwrap();
        let rel_changed = source_root.relativize(Utf8Path::new("/x/y/z/r/a/b/c/f")).unwrap();
        let rel_unchanged = source_root.relativize(Utf8Path::new("/x/y/z/r/a/v/w/F")).unwrap();

        let mut builder = FileSystemState::builder(source_root.location().to_path_buf());
        builder.add(FileState::new(rel_changed.clone(), t(0), Checksum::of_bytes(b"1")));
        builder.add(FileState::new(rel_unchanged, t(1), Checksum::of_bytes(b"9")));
        let prior_state = builder.build();

        let diff = diff_tree(&source_root, &prior_state, &fsa).unwrap();
        let mut actions = plan_copy_actions(
            &diff,
            Utf8Path::new("/p/q/rnew"),
            Utf8Path::new("/p/q/rold/r"),
        );
        actions.sort_by(|a, b| a.rel_path().as_path().cmp(b.rel_path().as_path()));

        assert_eq!(
            actions,
            vec![
                CopyAction::Plain {
                    source_location: Utf8PathBuf::from("/x/y/z"),
                    destination_location: Utf8PathBuf::from("/p/q/rnew"),
                    rel_path: rel_changed,
                },
                CopyAction::Symlink {
                    source_location: Utf8PathBuf::from("/p/q/rold/r"),
                    destination_location: Utf8PathBuf::from("/p/q/rnew"),
                    rel_path: RelativePath::from(Utf8PathBuf::from("r/a/v")),
                },
            ]
        );
    }

    #[test]
    fn s4_deletion_forces_direct_copy_of_sibling() {
        let fsa = MemoryAccessor::new();
        fsa.put_file("/src/tmp/d/file.txt", b"C9".to_vec(), t(1));
        let source_root = Root::new(Utf8Path::new("/src/tmp/d")).unwrap();
        let rel_file = source_root.relativize(Utf8Path::new("/src/tmp/d/file.txt")).unwrap();
        let rel_removed = source_root
            .relativize(Utf8Path::new("/src/tmp/d/d2/fileOld.txt"))
            .unwrap();

        let mut builder = FileSystemState::builder(source_root.location().to_path_buf());
        builder.add(FileState::new(rel_file.clone(), t(0), Checksum::of_bytes(b"C0")));
        builder.add(FileState::new(rel_removed, t(0), Checksum::of_bytes(b"C0")));
        let prior_state = builder.build();

        let diff = diff_tree(&source_root, &prior_state, &fsa).unwrap();
        let actions = plan_copy_actions(&diff, Utf8Path::new("/dest"), Utf8Path::new("/priorloc/d"));

        assert_eq!(
            actions,
            vec![CopyAction::Plain {
                source_location: Utf8PathBuf::from("/src/tmp"),
                destination_location: Utf8PathBuf::from("/dest"),
                rel_path: rel_file,
            }]
        );
    }

    #[test]
    fn s5_deletion_forces_per_file_alias_for_unchanged_sibling() {
        let fsa = MemoryAccessor::new();
        fsa.put_file("/src/tmp/d/file.txt", b"C1".to_vec(), t(0));
        let source_root = Root::new(Utf8Path::new("/src/tmp/d")).unwrap();
        let rel_file = source_root.relativize(Utf8Path::new("/src/tmp/d/file.txt")).unwrap();
        let rel_removed = source_root
            .relativize(Utf8Path::new("/src/tmp/d/d2/fileOld.txt"))
            .unwrap();

        let mut builder = FileSystemState::builder(source_root.location().to_path_buf());
        builder.add(FileState::new(rel_file.clone(), t(0), Checksum::of_bytes(b"C1")));
        builder.add(FileState::new(rel_removed, t(0), Checksum::of_bytes(b"C0")));
        let prior_state = builder.build();

        let diff = diff_tree(&source_root, &prior_state, &fsa).unwrap();
        let actions = plan_copy_actions(&diff, Utf8Path::new("/dest"), Utf8Path::new("/priorloc/d"));

        assert_eq!(
            actions,
            vec![CopyAction::Symlink {
                source_location: Utf8PathBuf::from("/priorloc/d"),
                destination_location: Utf8PathBuf::from("/dest"),
                rel_path: rel_file,
            }]
        );
    }

    #[test]
    fn s6_all_new_tree_is_all_plain() {
        let fsa = MemoryAccessor::new();
        fsa.put_file("/x/r/a", b"1".to_vec(), t(1));
        fsa.put_file("/x/r/b", b"2".to_vec(), t(1));
        let source_root = Root::new(Utf8Path::new("/x/r")).unwrap();
        let prior_state = FileSystemState::empty(source_root.location().to_path_buf());

        let diff = diff_tree(&source_root, &prior_state, &fsa).unwrap();
        let actions = plan_copy_actions(&diff, Utf8Path::new("/dest"), Utf8Path::new("/does/not/matter"));

        assert_eq!(actions.len(), 2);
        assert!(actions.iter().all(|a| matches!(a, CopyAction::Plain { .. })));
    }

    #[test]
    fn repeated_runs_over_identical_input_produce_equal_output() {
        let fsa = MemoryAccessor::new();
        fsa.put_file("/x/y/z/r/a/b/c/f", b"0".to_vec(), t(1));
        fsa.put_file("/x/y/z/r/a/v/w/F", b"9".to_vec(), t(1));
        let source_root = Root::new(Utf8Path::new("/x/y/z/r")).unwrap();
        let rel_changed = source_root.relativize(Utf8Path::new("/x/y/z/r/a/b/c/f")).unwrap();
        let rel_unchanged = source_root.relativize(Utf8Path::new("/x/y/z/r/a/v/w/F")).unwrap();

        let mut builder = FileSystemState::builder(source_root.location().to_path_buf());
        builder.add(FileState::new(rel_changed, t(0), Checksum::of_bytes(b"1")));
        builder.add(FileState::new(rel_unchanged, t(1), Checksum::of_bytes(b"9")));
        let prior_state = builder.build();

        let destination = Utf8Path::new("/p/q/rnew");
        let prior_root_location = Utf8Path::new("/p/q/rold/r");

        let diff_a = diff_tree(&source_root, &prior_state, &fsa).unwrap();
        let mut actions_a = plan_copy_actions(&diff_a, destination, prior_root_location);
        actions_a.sort_by(|a, b| a.rel_path().as_path().cmp(b.rel_path().as_path()));

        let diff_b = diff_tree(&source_root, &prior_state, &fsa).unwrap();
        let mut actions_b = plan_copy_actions(&diff_b, destination, prior_root_location);
        actions_b.sort_by(|a, b| a.rel_path().as_path().cmp(b.rel_path().as_path()));

        assert_eq!(diff_a.counts(), diff_b.counts());
        assert_eq!(actions_a, actions_b);
    }

    #[test]
    fn no_two_actions_share_a_destination_rel_path() {
        let fsa = MemoryAccessor::new();
        fsa.put_file("/x/y/z/r/a/b/c/f", b"0".to_vec(), t(1));
        fsa.put_file("/x/y/z/r/a/v/w/F", b"9".to_vec(), t(1));
        let source_root = Root::new(Utf8Path::new("/x/y/z/r")).unwrap();
        let rel_changed = source_root.relativize(Utf8Path::new("/x/y/z/r/a/b/c/f")).unwrap();
        let rel_unchanged = source_root.relativize(Utf8Path::new("/x/y/z/r/a/v/w/F")).unwrap();

        let mut builder = FileSystemState::builder(source_root.location().to_path_buf());
        builder.add(FileState::new(rel_changed, t(0), Checksum::of_bytes(b"1")));
        builder.add(FileState::new(rel_unchanged, t(1), Checksum::of_bytes(b"9")));
        let prior_state = builder.build();

        let diff = diff_tree(&source_root, &prior_state, &fsa).unwrap();
        let actions = plan_copy_actions(&diff, Utf8Path::new("/p/q/rnew"), Utf8Path::new("/p/q/rold/r"));

        let mut seen = std::collections::HashSet::new();
        for action in &actions {
            assert!(seen.insert(action.rel_path().clone()));
        }
    }
}
