//! # zipsession
//!
//! Session-based access to ZIP archives.
//!
//! An archive is opened as an [`ArchiveSession`]. Within a session you can
//! query the catalog, read entries through their cipher and codec, and journal
//! changes: add, replace, remove and rename entries, change their compression,
//! encryption, comments and timestamps. Nothing is written until the session is
//! closed; then the archive is rebuilt into a temporary file and atomically
//! renamed over the original. [`ArchiveSession::discard`] throws all changes
//! away.
//!
//! ## Quick Start
//!
//! ### Reading an Archive
//!
//! ```rust,no_run
//! use zipsession::{ArchiveSession, OpenMode, Result};
//!
//! fn main() -> Result<()> {
//!     let mut session = ArchiveSession::open("archive.zip", OpenMode::ReadOnly)?;
//!
//!     for entry in session.entries() {
//!         println!("{}: {} bytes", entry.name_lossy(), entry.size);
//!     }
//!
//!     let index = session.locate(b"readme.txt")?;
//!     let stream = session.open_entry(index, None)?;
//!     loop {
//!         let chunk = session.read(stream, 8192)?;
//!         if chunk.is_empty() {
//!             break;
//!         }
//!         // ...
//!     }
//!     session.close_stream(stream)?;
//!     session.discard();
//!     Ok(())
//! }
//! ```
//!
//! ### Modifying an Archive
//!
//! ```rust,no_run
//! use zipsession::{ArchiveSession, CompressionMethod, EncryptionMethod, OpenMode, Result};
//!
//! fn main() -> Result<()> {
//!     let mut session = ArchiveSession::open("archive.zip", OpenMode::Create)?;
//!
//!     let index = session.add_file(b"data/report.csv", "report.csv")?;
//!     session.set_compression(index, CompressionMethod::Deflate, 9)?;
//!     session.set_encryption(index, EncryptionMethod::Aes256, Some(b"secret"))?;
//!
//!     let old = session.locate(b"stale.txt")?;
//!     session.remove(old)?;
//!
//!     let result = session.close(None)?;
//!     println!("Wrote {} entries ({} bytes)", result.entries_written, result.archive_size);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `deflate` | Yes | Deflate compression (method 8) |
//! | `bzip2` | Yes | BZip2 compression (method 12) |
//! | `aes` | Yes | WinZip AES-128/192/256 encryption |
//! | `cli` | No | Command-line interface tool |
//!
//! Store and traditional PKWARE encryption are always available. Methods whose
//! feature is disabled fail with [`Error::UnsupportedMethod`].
//!
//! ## Error Handling
//!
//! All operations return [`Result<T>`], which is an alias for
//! `std::result::Result<T, Error>`. See [`Error`] for the taxonomy.
//!
//! ## Minimum Supported Rust Version (MSRV)
//!
//! This crate requires **Rust 1.85** or later.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]

/// Working buffer size for entry streams and commit copies (8 KiB).
pub(crate) const READ_BUFFER_SIZE: usize = 8192;

pub mod checksum;
pub mod codec;
pub mod crypto;
pub mod edit;
pub mod error;
pub mod format;
pub mod handle;
pub mod progress;
pub mod read;
pub mod session;
pub mod timestamp;

pub use codec::CompressionMethod;
pub use crypto::{EncryptionMethod, Password};
pub use edit::{CommitOptions, CommitResult, EntrySource};
pub use error::{Error, MethodKind, Missing, Result};
pub use handle::{Registry, SessionToken, StreamToken};
pub use progress::{
    AtomicProgress, ChannelProgress, NoProgress, ProgressReporter, progress_fn,
};
pub use read::{EntryCatalog, EntryRecord, StreamId};
pub use session::{ArchiveSession, OpenMode, OpenOptions, Origin};
