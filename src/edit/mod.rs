//! Pending archive modifications and the commit that applies them.
//!
//! Mutations made through a session are recorded in a [`MutationJournal`]
//! rather than applied to the file:
//! - adding entries from memory, a file region, or as directories
//! - replacing entry data
//! - removing and renaming entries
//! - changing compression, encryption, comments and modification times
//!
//! # Example
//!
//! ```rust,no_run
//! use zipsession::{ArchiveSession, CompressionMethod, EncryptionMethod, OpenMode};
//!
//! let mut session = ArchiveSession::open("archive.zip", OpenMode::Create)?;
//! let index = session.add_buffer(b"notes.txt", b"remember".to_vec())?;
//! session.set_compression(index, CompressionMethod::Deflate, 9)?;
//! session.set_encryption(index, EncryptionMethod::Aes256, Some(b"secret"))?;
//! session.rename(index, b"docs/notes.txt")?;
//!
//! let result = session.close(None)?;
//! println!("Wrote {} entries", result.entries_written);
//! # Ok::<(), zipsession::Error>(())
//! ```
//!
//! # Implementation Notes
//!
//! On close the journal is replayed against the original archive:
//! 1. Removed entries are skipped
//! 2. Entries with only header changes are copied without decoding
//! 3. Entries whose data, compression or encryption changed are decoded and
//!    encoded again
//! 4. Added entries are appended in the order they were journaled
//!
//! The new body goes to a temporary file next to the archive, which then
//! replaces the original.

mod commit;
mod journal;
mod operation;

pub(crate) use commit::{CommitInput, write_archive};
pub use commit::{CommitOptions, CommitResult};
pub use journal::{EntryChanges, MAX_LEVEL, MutationJournal};
pub use operation::{EntrySource, JournalEntry, Operation};
