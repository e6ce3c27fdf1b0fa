//! Integration tests for host import, export and sync-back

mod common;

use std::fs;

use common::test_files::create_sized_content;
use common::{VolumeBuilder, init_tracing, p, read_volume_file};
use encvol_core::codec::ENCFS_CONFIG_FILE_NAME;
use encvol_core::{LogicalPath, NoProgress, ProgressCounter, VolumeError};
use tempfile::TempDir;

#[test]
fn test_import_export_roundtrip_edge_sizes() {
    init_tracing();
    let host = TempDir::new().unwrap();
    let (_volume, session) = VolumeBuilder::new().build();

    // Empty, single byte, and one byte past a copy buffer
    for size in [0usize, 1, 8193] {
        let content = create_sized_content(size);
        let local_in = host.path().join(format!("in_{size}.bin"));
        fs::write(&local_in, &content).unwrap();
        let dst = p(&format!("file_{size}.bin"));

        let progress = ProgressCounter::new();
        let stats = session.import(&local_in, &dst, &progress).unwrap();
        assert_eq!(stats.bytes, size as u64, "import size {size}");
        assert_eq!(progress.bound(), size as u64);
        assert_eq!(progress.completed(), size as u64);
        assert_eq!(session.length(&dst).unwrap(), size as u64);
        assert_eq!(
            read_volume_file(&session, &format!("file_{size}.bin")),
            content,
            "volume content size {size}"
        );

        let local_out = host.path().join(format!("out_{size}.bin"));
        session.export(&dst, &local_out, &NoProgress).unwrap();
        assert_eq!(fs::read(&local_out).unwrap(), content, "export size {size}");
    }
}

#[test]
fn test_import_directory_counts_host_nodes() {
    let host = TempDir::new().unwrap();
    let src = host.path().join("photos");
    fs::create_dir_all(src.join("sub")).unwrap();
    fs::write(src.join("a.txt"), b"alpha").unwrap();
    fs::write(src.join("sub").join("x.jpg"), b"jpeg").unwrap();

    let (_volume, session) = VolumeBuilder::new().build();
    let progress = ProgressCounter::new();

    let stats = session.import(&src, &p("Photos"), &progress).unwrap();

    // photos, a.txt, sub, sub/x.jpg
    assert_eq!(progress.bound(), 4);
    assert_eq!(progress.completed(), 4);
    assert_eq!(stats.files, 2);
    assert_eq!(stats.directories, 2);
    assert_eq!(session.list_path(&p("Photos")).unwrap().names(), vec!["sub", "a.txt"]);
    assert_eq!(read_volume_file(&session, "Photos/sub/x.jpg"), b"jpeg");
}

#[test]
fn test_import_skips_host_config_file() {
    let host = TempDir::new().unwrap();
    let src = host.path().join("other_volume");
    fs::create_dir(&src).unwrap();
    fs::write(src.join(ENCFS_CONFIG_FILE_NAME), b"<xml/>").unwrap();
    fs::write(src.join("data.bin"), b"data").unwrap();

    let (_volume, session) = VolumeBuilder::new().build();
    let progress = ProgressCounter::new();

    session.import(&src, &p("Imported"), &progress).unwrap();

    assert_eq!(progress.bound(), 2);
    assert!(!session.path_exists(&p(&format!("Imported/{ENCFS_CONFIG_FILE_NAME}"))).unwrap());
    assert_eq!(session.list_path(&p("Imported")).unwrap().names(), vec!["data.bin"]);
}

#[test]
fn test_import_onto_existing_destination_fails() {
    let host = TempDir::new().unwrap();
    let local = host.path().join("a.txt");
    fs::write(&local, b"new").unwrap();
    let (_volume, session) = VolumeBuilder::new().with_file("a.txt", b"old").build();

    let err = session.import(&local, &p("a.txt"), &NoProgress).unwrap_err();

    assert!(err.to_string().starts_with("Failed to import 'a.txt'"));
    assert_eq!(read_volume_file(&session, "a.txt"), b"old");
}

#[test]
fn test_import_missing_host_path() {
    let host = TempDir::new().unwrap();
    let (_volume, session) = VolumeBuilder::new().build();
    let err = session
        .import(&host.path().join("missing"), &p("x"), &NoProgress)
        .unwrap_err();
    assert!(matches!(err, VolumeError::OperationFailed { .. }));
    assert!(!session.path_exists(&p("x")).unwrap());
}

#[test]
fn test_export_directory_tree() {
    let host = TempDir::new().unwrap();
    let (_volume, session) = VolumeBuilder::new()
        .with_file("A/b.txt", b"bee")
        .with_file("A/C/d.txt", b"dee")
        .with_dir("A/Empty")
        .build();
    let out = host.path().join("A");
    let progress = ProgressCounter::new();

    let stats = session.export(&p("A"), &out, &progress).unwrap();

    assert_eq!(progress.bound(), 5);
    assert_eq!(progress.completed(), 5);
    assert_eq!(stats.files, 2);
    assert_eq!(fs::read(out.join("b.txt")).unwrap(), b"bee");
    assert_eq!(fs::read(out.join("C").join("d.txt")).unwrap(), b"dee");
    assert!(out.join("Empty").is_dir());
}

#[test]
fn test_export_refuses_to_overwrite() {
    let host = TempDir::new().unwrap();
    let local = host.path().join("report.txt");
    fs::write(&local, b"host copy").unwrap();
    let (_volume, session) = VolumeBuilder::new().with_file("report.txt", b"volume").build();

    let err = session.export(&p("report.txt"), &local, &NoProgress).unwrap_err();

    assert_eq!(
        err.to_string(),
        format!("File '{}' already exists", local.display())
    );
    assert_eq!(fs::read(&local).unwrap(), b"host copy");
}

#[test]
fn test_export_root_skips_config_file() {
    let host = TempDir::new().unwrap();
    let (_volume, session) = VolumeBuilder::new().with_file("a.txt", b"a").build();
    let out = host.path().join("volume");

    session.export(&LogicalPath::root(), &out, &NoProgress).unwrap();

    assert!(out.join("a.txt").is_file());
    assert!(!out.join(ENCFS_CONFIG_FILE_NAME).exists());
}

#[test]
fn test_sync_back_edited_copy() {
    let host = TempDir::new().unwrap();
    let (_volume, session) = VolumeBuilder::new().with_file("notes.txt", b"draft").build();
    let local = host.path().join("notes.txt");

    session.export(&p("notes.txt"), &local, &NoProgress).unwrap();
    fs::write(&local, b"final version").unwrap();

    let progress = ProgressCounter::new();
    let written = session.sync_file(&local, &p("notes.txt"), &progress).unwrap();

    assert_eq!(written, 13);
    assert_eq!(progress.completed(), 13);
    assert_eq!(read_volume_file(&session, "notes.txt"), b"final version");
}

#[test]
fn test_sync_requires_existing_volume_file() {
    let host = TempDir::new().unwrap();
    let local = host.path().join("x.txt");
    fs::write(&local, b"x").unwrap();
    let (_volume, session) = VolumeBuilder::new().with_dir("D").build();

    assert!(matches!(
        session.sync_file(&local, &p("missing.txt"), &NoProgress),
        Err(VolumeError::NotFound { .. })
    ));
    let err = session.sync_file(&local, &p("D"), &NoProgress).unwrap_err();
    assert!(err.to_string().contains("is a folder"));
}
