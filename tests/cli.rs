//! CLI command integration tests.
//!
//! These run the built binary against archives in a temp directory.

#![cfg(feature = "cli")]

use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;
use zipsession::{ArchiveSession, OpenMode};

mod common;

fn run(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_zipsession"))
        .current_dir(dir)
        .args(args)
        .output()
        .expect("Failed to run binary")
}

#[test]
fn test_add_list_cat() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir(dir.path().join("docs")).unwrap();
    std::fs::write(dir.path().join("docs/a.txt"), b"alpha").unwrap();
    std::fs::write(dir.path().join("docs/b.log"), b"log").unwrap();

    let out = run(dir.path(), &["-q", "add", "out.zip", "docs", "-r", "-x", "*.log"]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let mut session = ArchiveSession::open(dir.path().join("out.zip"), OpenMode::ReadOnly).unwrap();
    let names: Vec<_> = session.entries().into_iter().map(|e| e.name).collect();
    assert_eq!(names, vec![b"docs/".to_vec(), b"docs/a.txt".to_vec()]);
    assert_eq!(session.read_entry_to_vec(1, None).unwrap(), b"alpha");

    let out = run(dir.path(), &["cat", "out.zip", "docs/a.txt"]);
    assert!(out.status.success());
    assert_eq!(out.stdout, b"alpha");

    let out = run(dir.path(), &["-f", "json", "list", "out.zip"]);
    assert!(out.status.success());
    let text = String::from_utf8(out.stdout).unwrap();
    assert!(text.contains("\"docs/a.txt\""));
}

#[test]
fn test_rm_and_mv() {
    let (dir, path) = common::archive_file(&[("keep.txt", b"k"), ("drop.tmp", b"d")]);

    let out = run(dir.path(), &["-q", "rm", "test.zip", "*.tmp"]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let out = run(dir.path(), &["-q", "mv", "test.zip", "keep.txt", "kept.txt"]);
    assert!(out.status.success());

    let session = ArchiveSession::open(&path, OpenMode::ReadOnly).unwrap();
    assert_eq!(session.count(), 1);
    assert_eq!(session.locate(b"kept.txt").unwrap(), 0);
}

#[test]
fn test_cat_missing_entry_fails() {
    let (dir, _path) = common::archive_file(&[("a", b"1")]);
    let out = run(dir.path(), &["cat", "test.zip", "nope"]);
    assert_eq!(out.status.code(), Some(255));
}

#[test]
fn test_comment_roundtrip() {
    let (dir, _path) = common::archive_file(&[("a", b"1")]);
    let out = run(dir.path(), &["comment", "test.zip", "hello"]);
    assert!(out.status.success());
    let out = run(dir.path(), &["comment", "test.zip"]);
    assert_eq!(String::from_utf8_lossy(&out.stdout).trim(), "hello");
}

#[test]
fn test_test_command_reports_ok() {
    let (dir, _path) = common::archive_file(&[("a", b"1"), ("b", b"2")]);
    let out = run(dir.path(), &["test", "test.zip"]);
    assert!(out.status.success());
    assert!(String::from_utf8_lossy(&out.stdout).contains("2 files tested"));
}
