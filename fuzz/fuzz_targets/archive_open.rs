//! Fuzz target for opening arbitrary bytes as an archive session.
//!
//! Parses the central directory with and without the consistency check,
//! then streams every entry and commits a rename into memory.
//!
//! Run with: cargo +nightly fuzz run archive_open

#![no_main]

use libfuzzer_sys::fuzz_target;
use zipsession::{ArchiveSession, OpenOptions};

fuzz_target!(|data: &[u8]| {
    let _ = ArchiveSession::open_buffer(data.to_vec(), OpenOptions::new().check_consistency(true));

    let Ok(mut session) = ArchiveSession::open_buffer(data.to_vec(), OpenOptions::new()) else {
        return;
    };
    for record in session.entries() {
        let _ = record.name_lossy();
        if let Ok(stream) = session.open_entry(record.index, Some(b"fuzz")) {
            while let Ok(chunk) = session.read(stream, 4096) {
                if chunk.is_empty() {
                    break;
                }
            }
            let _ = session.close_stream(stream);
        }
    }

    if session.count() > 0 && session.rename(0, b"renamed").is_ok() {
        let _ = session.close_to_vec(None);
    }
});
