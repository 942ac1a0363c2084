//! Session lifecycle tests: discard, failed commits, open streams and
//! progress reporting.

use zipsession::{
    ArchiveSession, CommitOptions, CompressionMethod, EntrySource, Error, Missing, OpenMode,
    Registry,
};

mod common;

use common::RecordingProgress;

#[test]
fn test_discard_leaves_archive_untouched() {
    let (dir, path) = common::archive_file(&[("a", b"alpha"), ("b", b"beta")]);
    let before = std::fs::read(&path).unwrap();

    let mut session = ArchiveSession::open(&path, OpenMode::Create).unwrap();
    session.remove(0).unwrap();
    session.rename(1, b"renamed").unwrap();
    session.add_buffer(b"c", b"gamma".to_vec()).unwrap();
    session.set_archive_comment(Some(b"changed")).unwrap();
    session.discard();

    assert_eq!(std::fs::read(&path).unwrap(), before);
    assert!(common::stray_files(dir.path(), &path).is_empty());
}

#[test]
fn test_unmodified_close_does_not_write() {
    let (_dir, path) = common::archive_file(&[("a", b"alpha")]);
    let before = std::fs::metadata(&path).unwrap().modified().unwrap();

    let session = ArchiveSession::open(&path, OpenMode::Create).unwrap();
    let mut progress = RecordingProgress::default();
    let result = session.close(Some(&mut progress)).unwrap();
    assert!(!result.rewritten);
    assert!(progress.values.is_empty());
    assert_eq!(std::fs::metadata(&path).unwrap().modified().unwrap(), before);
}

#[test]
fn test_failed_commit_leaves_original() {
    let (dir, path) = common::archive_file(&[("a", b"alpha"), ("b", b"beta")]);
    let before = std::fs::read(&path).unwrap();

    let source = dir.path().join("source.txt");
    std::fs::write(&source, b"will vanish").unwrap();

    let mut session = ArchiveSession::open(&path, OpenMode::Create).unwrap();
    session.remove(0).unwrap();
    session.add_file(b"c", &source).unwrap();
    std::fs::remove_file(&source).unwrap();

    let err = session.close(None).unwrap_err();
    assert!(matches!(err, Error::Io(_)), "{:?}", err);
    assert_eq!(std::fs::read(&path).unwrap(), before);
    assert!(common::stray_files(dir.path(), &path).is_empty());
}

#[test]
fn test_missing_source_is_rejected_early() {
    let (dir, path) = common::archive_file(&[("a", b"alpha")]);
    let mut session = ArchiveSession::open(&path, OpenMode::Create).unwrap();
    let result = session.add_file(b"x", dir.path().join("nope"));
    assert!(matches!(result, Err(Error::NotFound(Missing::Archive(_)))));
    assert_eq!(session.count(), 1);
}

#[test]
fn test_open_streams_block_close() {
    let (_dir, path) = common::archive_file(&[("a", b"alpha")]);
    let before = std::fs::read(&path).unwrap();

    let mut session = ArchiveSession::open(&path, OpenMode::Create).unwrap();
    session.rename(0, b"z").unwrap();
    let _stream = session.open_entry(0, None).unwrap();
    assert!(matches!(
        session.close(None),
        Err(Error::StreamsOpen { count: 1 })
    ));
    assert_eq!(std::fs::read(&path).unwrap(), before);
}

#[test]
fn test_locate_returns_lowest_duplicate() {
    let (_dir, path) = common::archive_file(&[("x", b"0")]);
    let mut session = ArchiveSession::open(&path, OpenMode::Create).unwrap();
    let first = session.add_buffer(b"same", b"1".to_vec()).unwrap();
    let second = session.add_buffer(b"same", b"2".to_vec()).unwrap();
    assert_eq!((first, second), (1, 2));
    assert_eq!(session.locate(b"same").unwrap(), 1);
    assert!(session.close(None).unwrap().rewritten);

    let mut session = ArchiveSession::open(&path, OpenMode::ReadOnly).unwrap();
    let index = session.locate(b"same").unwrap();
    assert_eq!(index, 1);
    assert_eq!(session.read_entry_to_vec(index, None).unwrap(), b"1");
}

#[test]
fn test_removed_index_is_not_found() {
    let (_dir, path) = common::archive_file(&[("a", b"1"), ("b", b"2")]);
    let mut session = ArchiveSession::open(&path, OpenMode::Create).unwrap();
    session.remove(0).unwrap();

    assert!(matches!(session.stat(0), Err(Error::NotFound(Missing::Index(0)))));
    assert!(matches!(session.rename(0, b"x"), Err(Error::NotFound(_))));
    assert!(matches!(session.remove(0), Err(Error::NotFound(_))));
    assert!(matches!(session.open_entry(0, None), Err(Error::NotFound(_))));
    assert!(matches!(session.stat(5), Err(Error::NotFound(Missing::Index(5)))));
    assert_eq!(session.stat(1).unwrap().name, b"b");
}

#[test]
fn test_validation_failures_change_nothing() {
    let (_dir, path) = common::archive_file(&[("a", b"1")]);
    let mut session = ArchiveSession::open(&path, OpenMode::Create).unwrap();

    assert!(matches!(session.rename(0, b""), Err(Error::InvalidArgument(_))));
    let long = vec![b'n'; 70_000];
    assert!(matches!(
        session.rename(0, &long),
        Err(Error::LimitExceeded { .. })
    ));
    assert!(matches!(
        session.set_compression(0, CompressionMethod::Deflate, 12),
        Err(Error::InvalidArgument(_))
    ));
    assert!(matches!(
        session.set_compression(0, CompressionMethod::Other(14), 0),
        Err(Error::UnsupportedMethod { method_id: 14, .. })
    ));
    assert!(!session.is_modified());
    assert_eq!(session.stat(0).unwrap().name, b"a");
}

#[test]
fn test_read_only_session() {
    let (_dir, path) = common::archive_file(&[("a", b"1")]);
    let mut session = ArchiveSession::open(&path, OpenMode::ReadOnly).unwrap();
    assert!(matches!(session.remove(0), Err(Error::ReadOnly)));
    assert!(matches!(
        session.add(b"b", EntrySource::Buffer(Vec::new()), CompressionMethod::Store),
        Err(Error::ReadOnly)
    ));
    assert!(matches!(session.set_mod_time(0, 0), Err(Error::ReadOnly)));
    let result = session.close(None).unwrap();
    assert!(!result.rewritten);
}

#[test]
fn test_progress_is_monotonic_and_complete() {
    let data = common::sample_data(200_000, 9);
    let (_dir, path) = common::archive_file(&[("big", &data), ("small", b"s")]);

    let mut session = ArchiveSession::open(&path, OpenMode::Create).unwrap();
    session.set_commit_options(CommitOptions::new().progress_step(0.01));
    session.add_buffer(b"more", data.clone()).unwrap();
    session.rename(1, b"tiny").unwrap();

    let mut progress = RecordingProgress::default();
    assert!(session.close(Some(&mut progress)).unwrap().rewritten);

    assert!(!progress.values.is_empty());
    assert!(progress.values.windows(2).all(|w| w[0] <= w[1]));
    assert!(progress.values.iter().all(|&v| v <= 100));
    assert_eq!(progress.values.last(), Some(&100));
    assert_eq!(
        progress.entries,
        vec![b"big".to_vec(), b"tiny".to_vec(), b"more".to_vec()]
    );
}

#[test]
fn test_registry_tokens_die_with_session() {
    let (_dir, path) = common::archive_file(&[("a", b"alpha")]);
    let mut registry = Registry::new();

    let token = registry.open(&path, OpenMode::Create).unwrap();
    assert_eq!(registry.count(token).unwrap(), 1);
    let stream = registry.open_entry_stream(token, 0, None).unwrap();
    assert_eq!(registry.read(stream, 100).unwrap(), b"alpha");
    registry.close_stream(stream).unwrap();

    registry.rename(token, 0, b"beta").unwrap();
    let result = registry.close(token, None).unwrap();
    assert!(result.rewritten);

    assert!(matches!(registry.count(token), Err(Error::SessionClosed)));
    assert!(matches!(registry.read(stream, 1), Err(Error::SessionClosed)));
    assert!(matches!(registry.close(token, None), Err(Error::SessionClosed)));

    let token = registry.open(&path, OpenMode::ReadOnly).unwrap();
    assert_eq!(registry.locate(token, b"beta").unwrap(), 0);
    registry.discard(token).unwrap();
}
