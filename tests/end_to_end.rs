//! Exercises the full diff → plan → execute pipeline against a real
//! filesystem, round-tripping through two snapshot generations.

use std::fs;
use std::os::unix::fs::MetadataExt;
use std::time::{Duration, SystemTime};

use camino::Utf8PathBuf;
use copysnap_core::{OsAccessor, Root, diff_tree, execute_plan, plan_copy_actions, FileSystemState};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().try_init();
}

fn utf8(path: std::path::PathBuf) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(path).unwrap()
}

fn touch(path: &std::path::Path, contents: &[u8], mtime: SystemTime) {
    fs::write(path, contents).unwrap();
    let mtime = filetime::FileTime::from_system_time(mtime);
    filetime::set_file_mtime(path, mtime).unwrap();
}

#[test]
fn first_snapshot_is_all_plain_copies() {
    init_tracing();
    let workdir = tempfile::tempdir().unwrap();
    let source = workdir.path().join("source/r");
    fs::create_dir_all(source.join("a/b")).unwrap();
    fs::write(source.join("a/b/f"), b"hello").unwrap();
    fs::write(source.join("top"), b"world").unwrap();

    let source_root = Root::new(&utf8(source)).unwrap();
    let prior_state = FileSystemState::empty(source_root.location().to_path_buf());
    let accessor = OsAccessor::new();

    let diff = diff_tree(&source_root, &prior_state, &accessor).unwrap();
    assert_eq!(diff.counts().new_or_changed, 2);
    assert_eq!(diff.counts().removed, 0);

    // `destination` is a location (a parent directory), matching the shape
    // of `Root::location()`: every rel_path already carries the root-dir
    // name, so the new root ends up at `destination/r`.
    let destination = utf8(workdir.path().join("snapshot-1"));
    let actions = plan_copy_actions(&diff, &destination, source_root.location());
    assert_eq!(actions.len(), 2);
    assert!(actions.iter().all(|a| matches!(a, copysnap_core::CopyAction::Plain { .. })));

    execute_plan(&actions, &accessor).unwrap();
    assert_eq!(fs::read(destination.join("r/a/b/f")).unwrap(), b"hello");
    assert_eq!(fs::read(destination.join("r/top")).unwrap(), b"world");
}

#[test]
fn second_snapshot_of_unchanged_tree_is_a_single_symlink() {
    init_tracing();
    let workdir = tempfile::tempdir().unwrap();
    let source = workdir.path().join("source/r");
    fs::create_dir_all(&source).unwrap();
    let old_time = SystemTime::now() - Duration::from_secs(60);
    touch(&source.join("f"), b"stable content", old_time);

    let source_root = Root::new(&utf8(source.clone())).unwrap();
    let accessor = OsAccessor::new();

    let prior_state = FileSystemState::empty(source_root.location().to_path_buf());
    let first_diff = diff_tree(&source_root, &prior_state, &accessor).unwrap();
    let snapshot_1 = utf8(workdir.path().join("snapshot-1"));
    let first_actions = plan_copy_actions(&first_diff, &snapshot_1, source_root.location());
    execute_plan(&first_actions, &accessor).unwrap();

    // Re-diff with the state the first run produced. Nothing in the source
    // tree has changed, so the second snapshot should collapse to one
    // top-level symlink back into the source (standing in for "the prior
    // snapshot" in this single-generation test).
    let recorded_state = first_diff.new_state().clone();
    let second_diff = diff_tree(&source_root, &recorded_state, &accessor).unwrap();
    assert_eq!(second_diff.counts().new_or_changed, 0);
    assert_eq!(second_diff.counts().unchanged, 1);

    let snapshot_2 = utf8(workdir.path().join("snapshot-2"));
    let second_actions = plan_copy_actions(&second_diff, &snapshot_2, source_root.location());
    assert_eq!(second_actions.len(), 1);
    assert!(matches!(second_actions[0], copysnap_core::CopyAction::Symlink { .. }));

    execute_plan(&second_actions, &accessor).unwrap();
    let linked_root = snapshot_2.join("r");
    assert_eq!(fs::read(linked_root.join("f")).unwrap(), b"stable content");
    let meta = fs::symlink_metadata(&linked_root).unwrap();
    assert!(meta.file_type().is_symlink());
    let _ = meta.ino();
}

#[test]
fn removed_file_forces_direct_copy_of_sibling() {
    init_tracing();
    let workdir = tempfile::tempdir().unwrap();
    let source = workdir.path().join("source/r");
    fs::create_dir_all(source.join("d2")).unwrap();
    fs::write(source.join("file.txt"), b"C9").unwrap();

    let source_root = Root::new(&utf8(source)).unwrap();
    let rel_file = source_root
        .relativize(&source_root.path_to_root_dir().join("file.txt"))
        .unwrap();
    let rel_removed = source_root
        .relativize(&source_root.path_to_root_dir().join("d2/fileOld.txt"))
        .unwrap();

    let mut builder = FileSystemState::builder(source_root.location().to_path_buf());
    builder.add(copysnap_core::FileState::new(
        rel_file,
        jiff::Timestamp::UNIX_EPOCH,
        copysnap_core::Checksum::of_bytes(b"C0"),
    ));
    builder.add(copysnap_core::FileState::new(
        rel_removed,
        jiff::Timestamp::UNIX_EPOCH,
        copysnap_core::Checksum::of_bytes(b"C0"),
    ));
    let prior_state = builder.build();

    let accessor = OsAccessor::new();
    let diff = diff_tree(&source_root, &prior_state, &accessor).unwrap();
    assert_eq!(diff.counts().removed, 1);

    let destination = utf8(workdir.path().join("snapshot"));
    let actions = plan_copy_actions(&diff, &destination, source_root.location());
    assert_eq!(actions.len(), 1);
    assert!(matches!(actions[0], copysnap_core::CopyAction::Plain { .. }));
}
