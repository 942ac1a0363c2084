//! Shared test utilities for integration tests.
//!
//! Note: `#![allow(dead_code)]` is required because each integration test file
//! compiles as a separate crate and may only use a subset of these helpers.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use zipsession::{
    ArchiveSession, CompressionMethod, EntrySource, OpenMode, OpenOptions, ProgressReporter,
};

/// Creates an archive file at `path` holding `entries`, all with `method`.
pub fn write_archive(
    path: &Path,
    method: CompressionMethod,
    entries: &[(&str, &[u8])],
) -> zipsession::Result<()> {
    let mut session = ArchiveSession::open(path, OpenMode::Truncate)?;
    for (name, data) in entries {
        session.add(name.as_bytes(), EntrySource::Buffer(data.to_vec()), method)?;
    }
    let result = session.close(None)?;
    assert!(result.rewritten || entries.is_empty());
    Ok(())
}

/// Creates a temp directory with `test.zip` holding stored `entries`.
pub fn archive_file(entries: &[(&str, &[u8])]) -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("test.zip");
    write_archive(&path, CompressionMethod::Store, entries).expect("Failed to write archive");
    (dir, path)
}

/// Builds an in-memory archive holding `entries`.
pub fn archive_bytes(method: CompressionMethod, entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut session = ArchiveSession::open_buffer(Vec::new(), OpenOptions::new().create(true))
        .expect("Failed to open buffer");
    for (name, data) in entries {
        session
            .add(name.as_bytes(), EntrySource::Buffer(data.to_vec()), method)
            .expect("Failed to add entry");
    }
    let (_, bytes) = session.close_to_vec(None).expect("Failed to commit");
    bytes
}

/// Reads an entry through the stream API in small chunks.
pub fn read_chunked(
    session: &mut ArchiveSession,
    index: usize,
    password: Option<&[u8]>,
) -> zipsession::Result<Vec<u8>> {
    let stream = session.open_entry(index, password)?;
    let mut out = Vec::new();
    let drained = loop {
        match session.read(stream, 1000) {
            Ok(chunk) if chunk.is_empty() => break Ok(()),
            Ok(chunk) => {
                assert!(chunk.len() <= 1000);
                out.extend_from_slice(&chunk);
            }
            Err(e) => break Err(e),
        }
    };
    let closed = session.close_stream(stream);
    drained?;
    closed?;
    Ok(out)
}

/// Returns the (name, data) pairs of every live entry.
pub fn contents(session: &mut ArchiveSession) -> Vec<(Vec<u8>, Vec<u8>)> {
    session
        .entries()
        .into_iter()
        .map(|record| {
            let data = session
                .read_entry_to_vec(record.index, None)
                .expect("Failed to read entry");
            (record.name, data)
        })
        .collect()
}

/// Files in `dir` other than `keep`.
pub fn stray_files(dir: &Path, keep: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .expect("Failed to read dir")
        .map(|e| e.expect("Failed to read dir entry").path())
        .filter(|p| p != keep)
        .collect()
}

/// Deterministic, mildly compressible test data.
pub fn sample_data(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed) % 64 + b' ')
        .collect()
}

/// Records every percentage it is given.
#[derive(Debug, Default)]
pub struct RecordingProgress {
    pub values: Vec<u8>,
    pub entries: Vec<Vec<u8>>,
}

impl ProgressReporter for RecordingProgress {
    fn on_progress(&mut self, percent: u8) {
        self.values.push(percent);
    }

    fn on_entry_start(&mut self, name: &[u8]) {
        self.entries.push(name.to_vec());
    }
}
