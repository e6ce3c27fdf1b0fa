//! Integration tests for create, delete, move, copy, rename and paste

mod common;

use std::io::Write;

use common::{VolumeBuilder, init_tracing, p, read_volume_file};
use encvol_core::codec::CodecOp;
use encvol_core::{
    Clipboard, NoProgress, OperationStatus, OperationTracker, PasteMode, ProgressCounter,
    VolumeError,
};

fn tree() -> VolumeBuilder {
    VolumeBuilder::new()
        .with_file("A/b.txt", b"bee")
        .with_file("A/C/d.txt", b"dee")
}

// ==================== create / mkdir ====================

#[test]
fn test_create_file_collision_and_missing_parent() {
    let (_volume, session) = VolumeBuilder::new().with_file("a.txt", b"a").build();

    assert!(matches!(
        session.create_file(&p("a.txt")),
        Err(VolumeError::AlreadyExists { .. })
    ));
    assert!(matches!(
        session.create_file(&p("missing/x.txt")),
        Err(VolumeError::ParentNotFound { .. })
    ));

    let node = session.create_file(&p("new.txt")).unwrap();
    assert!(node.is_file());
    assert_eq!(node.len(), 0);
    assert!(session.path_exists(&p("new.txt")).unwrap());
}

#[test]
fn test_make_dir_missing_parent_is_operation_failed() {
    let (_volume, session) = VolumeBuilder::new().build();
    let err = session.make_dir(&p("no/such/parent")).unwrap_err();
    assert!(matches!(err, VolumeError::OperationFailed { .. }));
    assert!(err.to_string().starts_with("Unable to create folder 'parent'"));
}

// ==================== delete ====================

#[test]
fn test_delete_recursive_counts_root_and_removes_tree() {
    init_tracing();
    let (_volume, session) = tree().build();
    let progress = ProgressCounter::new();

    let stats = session.delete(&p("A"), true, &progress).unwrap();

    assert_eq!(progress.bound(), 4);
    assert_eq!(progress.completed(), 4);
    assert_eq!(stats.total(), 4);
    assert!(!session.path_exists(&p("A")).unwrap());
}

#[test]
fn test_delete_single_file() {
    let (_volume, session) = tree().build();
    let progress = ProgressCounter::new();

    let stats = session.delete(&p("A/b.txt"), false, &progress).unwrap();

    assert_eq!(stats.files_deleted, 1);
    assert_eq!(progress.bound(), 1);
    assert!(!session.path_exists(&p("A/b.txt")).unwrap());
    assert!(session.path_exists(&p("A/C/d.txt")).unwrap());
}

#[test]
fn test_delete_aborts_on_first_failure_without_rollback() {
    let (volume, session) = tree().build();
    // Children are visited in codec order: "C" sorts before "b.txt".
    volume.inject_fault(CodecOp::Delete, "A/b.txt");
    let progress = ProgressCounter::new();

    let err = session.delete(&p("A"), true, &progress).unwrap_err();

    assert!(matches!(err, VolumeError::OperationFailed { .. }));
    assert!(err.to_string().starts_with("Failed to delete 'A'"));
    // C and d.txt were deleted before the failure and stay deleted
    assert!(!session.path_exists(&p("A/C")).unwrap());
    assert!(session.path_exists(&p("A")).unwrap());
    assert!(session.path_exists(&p("A/b.txt")).unwrap());
    assert_eq!(progress.bound(), 4);
    assert_eq!(progress.completed(), 2);
}

#[test]
fn test_delete_missing_path() {
    let (_volume, session) = VolumeBuilder::new().build();
    assert!(matches!(
        session.delete(&p("ghost"), true, &NoProgress),
        Err(VolumeError::NotFound { .. })
    ));
}

#[test]
fn test_delete_root_is_refused() {
    let (_volume, session) = tree().build();
    let root = session.root().path().clone();
    assert!(session.delete(&root, true, &NoProgress).is_err());
    assert!(session.path_exists(&p("A/b.txt")).unwrap());
}

#[test]
fn test_delete_through_tracker_records_failure_detail() {
    let (volume, session) = tree().build();
    volume.inject_fault(CodecOp::Delete, "A/C/d.txt");
    let tracker = OperationTracker::new("delete");

    let result = tracker.run(|progress| session.delete(&p("A"), true, progress));

    assert!(result.is_err());
    let OperationStatus::Failed { detail } = tracker.status() else {
        panic!("expected failed status, got {}", tracker.status());
    };
    assert!(detail.starts_with("Failed to delete 'A'"));
    assert!(detail.contains("/A/C/d.txt"));
}

// ==================== move vs copy ====================

#[test]
fn test_move_file_between_directories() {
    let (_volume, session) = tree().with_dir("Z").build();
    let before = session.lookup(&p("A/b.txt")).unwrap();
    let progress = ProgressCounter::new();

    let moved = session.move_path(&p("A/b.txt"), &p("Z/b.txt"), &progress).unwrap();

    assert!(!session.path_exists(&p("A/b.txt")).unwrap());
    assert!(session.path_exists(&p("Z/b.txt")).unwrap());
    assert_eq!(moved.id(), before.id());
    assert_eq!(progress.bound(), 1);
    assert_eq!(progress.completed(), 1);
}

#[test]
fn test_copy_file_leaves_independent_copies() {
    let (_volume, session) = tree().with_dir("Z").build();

    session.copy_path(&p("A/b.txt"), &p("Z/b.txt"), &NoProgress).unwrap();

    assert!(session.path_exists(&p("A/b.txt")).unwrap());
    assert!(session.path_exists(&p("Z/b.txt")).unwrap());
    assert_eq!(read_volume_file(&session, "Z/b.txt"), b"bee");

    // Rewriting the original does not touch the copy
    let mut writer = session.open_write(&p("A/b.txt"), 6).unwrap();
    writer.write_all(b"buzzzz").unwrap();
    writer.finish().unwrap();
    assert_eq!(read_volume_file(&session, "A/b.txt"), b"buzzzz");
    assert_eq!(read_volume_file(&session, "Z/b.txt"), b"bee");
}

#[test]
fn test_copy_directory_progress_in_nodes() {
    let (_volume, session) = tree().build();
    let progress = ProgressCounter::new();

    let stats = session.copy_path(&p("A"), &p("B"), &progress).unwrap();

    assert_eq!(progress.bound(), 4);
    assert_eq!(progress.completed(), 4);
    assert_eq!(stats.files, 2);
    assert_eq!(stats.directories, 2);
    assert_eq!(read_volume_file(&session, "B/C/d.txt"), b"dee");
    assert!(session.path_exists(&p("A/C/d.txt")).unwrap());
}

#[test]
fn test_copy_file_progress_in_bytes() {
    let content = common::test_files::create_sized_content(20_000);
    let (_volume, session) = VolumeBuilder::new().with_file("big.bin", &content).build();
    let progress = ProgressCounter::new();

    session.copy_path(&p("big.bin"), &p("big2.bin"), &progress).unwrap();

    assert_eq!(progress.bound(), 20_000);
    assert_eq!(progress.completed(), 20_000);
    assert_eq!(read_volume_file(&session, "big2.bin"), content);
}

#[test]
fn test_copy_failure_leaves_partial_destination() {
    let (volume, session) = tree().build();
    volume.inject_fault(CodecOp::OpenRead, "A/b.txt");

    let err = session.copy_path(&p("A"), &p("B"), &NoProgress).unwrap_err();

    assert!(err.to_string().starts_with("Failed to copy 'A' to '/'"));
    // C was copied before b.txt failed
    assert!(session.path_exists(&p("B/C/d.txt")).unwrap());
    assert!(!session.path_exists(&p("B/b.txt")).unwrap());
}

#[test]
fn test_copy_onto_existing_destination_fails() {
    let (_volume, session) = tree().with_file("Z/b.txt", b"zzz").build();
    let err = session
        .copy_path(&p("A/b.txt"), &p("Z/b.txt"), &NoProgress)
        .unwrap_err();
    assert!(matches!(err, VolumeError::OperationFailed { .. }));
    assert_eq!(read_volume_file(&session, "Z/b.txt"), b"zzz");
}

#[test]
fn test_move_into_own_subtree_fails() {
    let (volume, session) = tree().build();
    let before = volume.node_count();
    let err = session.move_path(&p("A"), &p("A/C/A"), &NoProgress).unwrap_err();
    assert!(err.to_string().contains("cannot be placed inside itself"));
    assert_eq!(volume.node_count(), before);
    assert!(session.path_exists(&p("A/C/d.txt")).unwrap());
}

#[test]
fn test_move_collision_leaves_source() {
    let (_volume, session) = tree().with_file("Z/b.txt", b"zzz").build();
    let err = session
        .move_path(&p("A/b.txt"), &p("Z/b.txt"), &NoProgress)
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Failed to move 'b.txt' to '/Z': '/Z/b.txt' already exists"
    );
    assert!(session.path_exists(&p("A/b.txt")).unwrap());
}

// ==================== paste ====================

#[test]
fn test_paste_copy_picks_copy_n_names() {
    let (_volume, session) = VolumeBuilder::new().with_file("report.txt", b"r").build();
    let report = session.lookup(&p("report.txt")).unwrap();
    let mut clipboard = Clipboard::new();

    clipboard.copy(report.clone());
    let first = session.paste(&mut clipboard, session.root(), &NoProgress).unwrap();
    assert_eq!(first.mode, PasteMode::Copy);
    assert_eq!(first.node.name(), "(Copy 1) report.txt");
    assert!(clipboard.is_empty());

    clipboard.copy(report);
    let second = session.paste(&mut clipboard, session.root(), &NoProgress).unwrap();
    assert_eq!(second.node.name(), "(Copy 2) report.txt");

    assert_eq!(read_volume_file(&session, "(Copy 2) report.txt"), b"r");
}

#[test]
fn test_paste_copy_without_collision_keeps_name() {
    let (_volume, session) = VolumeBuilder::new()
        .with_file("report.txt", b"r")
        .with_dir("Archive")
        .build();
    let mut clipboard = Clipboard::new();
    clipboard.copy(session.lookup(&p("report.txt")).unwrap());
    let archive = session.lookup(&p("Archive")).unwrap();

    let outcome = session.paste(&mut clipboard, &archive, &NoProgress).unwrap();

    assert_eq!(outcome.node.path().as_str(), "Archive/report.txt");
}

#[test]
fn test_paste_cut_moves() {
    let (_volume, session) = tree().with_dir("Z").build();
    let mut clipboard = Clipboard::new();
    clipboard.cut(session.lookup(&p("A")).unwrap());
    let z = session.lookup(&p("Z")).unwrap();

    let outcome = session.paste(&mut clipboard, &z, &NoProgress).unwrap();

    assert_eq!(outcome.mode, PasteMode::Cut);
    assert_eq!(outcome.node.path().as_str(), "Z/A");
    assert!(!session.path_exists(&p("A")).unwrap());
    assert_eq!(read_volume_file(&session, "Z/A/C/d.txt"), b"dee");
}

#[test]
fn test_paste_cut_collision_fails_and_clears_clipboard() {
    let (_volume, session) = tree().with_file("b.txt", b"root b").build();
    let mut clipboard = Clipboard::new();
    clipboard.cut(session.lookup(&p("A/b.txt")).unwrap());

    let err = session
        .paste(&mut clipboard, session.root(), &NoProgress)
        .unwrap_err();

    assert!(err.to_string().starts_with("Failed to move 'b.txt' to '/'"));
    assert!(clipboard.is_empty());
    assert!(session.path_exists(&p("A/b.txt")).unwrap());
}

#[test]
fn test_paste_with_empty_clipboard() {
    let (_volume, session) = VolumeBuilder::new().build();
    let mut clipboard = Clipboard::new();
    assert!(matches!(
        session.paste(&mut clipboard, session.root(), &NoProgress),
        Err(VolumeError::ClipboardEmpty)
    ));
}

// ==================== rename ====================

#[test]
fn test_rename_directory_keeps_contents() {
    let (_volume, session) = tree().build();
    let a = session.lookup(&p("A")).unwrap();

    let renamed = session.rename(&a, "Archive", &NoProgress).unwrap();

    assert_eq!(renamed.path().as_str(), "Archive");
    assert_eq!(read_volume_file(&session, "Archive/C/d.txt"), b"dee");
    assert!(!session.path_exists(&p("A")).unwrap());
}
