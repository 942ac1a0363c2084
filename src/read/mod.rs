//! Reading the entries of an opened archive.
//!
//! This module provides the catalog of existing entries and per-entry read
//! streams. Sessions build on both; most callers go through
//! [`ArchiveSession`](crate::ArchiveSession) rather than using them directly.
//!
//! # Example
//!
//! ```rust,no_run
//! use zipsession::{ArchiveSession, OpenMode};
//!
//! let mut session = ArchiveSession::open("archive.zip", OpenMode::ReadOnly)?;
//! for entry in session.entries() {
//!     println!("{}: {} bytes", entry.name_lossy(), entry.size);
//! }
//!
//! let index = session.locate(b"notes.txt")?;
//! let stream = session.open_entry(index, None)?;
//! loop {
//!     let chunk = session.read(stream, 4096)?;
//!     if chunk.is_empty() {
//!         break;
//!     }
//!     // use chunk
//! }
//! session.close_stream(stream)?;
//! # Ok::<(), zipsession::Error>(())
//! ```

mod catalog;
mod entry;
mod stream;

pub(crate) use catalog::CatalogEntry;
pub use catalog::EntryCatalog;
pub use entry::{EntryRecord, is_dir_name};
pub(crate) use stream::{DecodePlan, attach_entry};
pub use stream::{EntryStream, ReadSeek, StreamId};
