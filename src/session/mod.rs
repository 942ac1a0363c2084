//! Archive sessions.
//!
//! An [`ArchiveSession`] is an open archive: the catalog read at open, a
//! journal of pending changes, the password context, and any live entry
//! streams. Nothing touches the archive on disk until [`ArchiveSession::close`]
//! writes a new body next to it and renames it over the original.
//!
//! # Example
//!
//! ```rust,no_run
//! use zipsession::{ArchiveSession, OpenMode};
//!
//! let mut session = ArchiveSession::open("photos.zip", OpenMode::Create)?;
//! let old = session.locate(b"old.jpg")?;
//! session.remove(old)?;
//! session.add_file(b"new.jpg", "new.jpg")?;
//! let result = session.close(None)?;
//! assert!(result.rewritten);
//! # Ok::<(), zipsession::Error>(())
//! ```

mod options;

pub use options::{OpenMode, OpenOptions, open_flags};

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Cursor, Seek, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::codec::CompressionMethod;
use crate::crypto::{CryptoContext, EncryptionMethod, Password};
use crate::edit::{
    CommitInput, CommitOptions, CommitResult, EntrySource, MutationJournal, write_archive,
};
use crate::error::Missing;
use crate::format::{MAX_FIELD_LEN, parser};
use crate::progress::ProgressReporter;
use crate::read::{EntryCatalog, EntryRecord, EntryStream, ReadSeek, StreamId, is_dir_name};
use crate::{Error, Result};

/// Where a session's archive lives.
#[derive(Debug, Clone)]
pub enum Origin {
    /// A file on disk.
    File(PathBuf),
    /// An immutable in-memory archive.
    Memory(Arc<[u8]>),
}

impl Origin {
    fn open_reader(&self) -> Result<Box<dyn ReadSeek>> {
        match self {
            Self::File(path) => Ok(Box::new(BufReader::new(File::open(path)?))),
            Self::Memory(bytes) => Ok(Box::new(Cursor::new(Arc::clone(bytes)))),
        }
    }
}

/// An open archive with pending, uncommitted changes.
///
/// All operations take `&mut self`, so catalog queries, mutations and stream
/// reads on one session are serialized by the borrow checker. Sessions are
/// `Send` and fully independent of each other.
pub struct ArchiveSession {
    origin: Origin,
    options: OpenOptions,
    commit_options: CommitOptions,
    catalog: EntryCatalog,
    journal: MutationJournal,
    crypto: CryptoContext,
    comment: Vec<u8>,
    comment_changed: bool,
    truncated: bool,
    streams: BTreeMap<StreamId, EntryStream>,
    next_stream: usize,
}

impl std::fmt::Debug for ArchiveSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveSession")
            .field("origin", &self.origin)
            .field("options", &self.options)
            .field("entries", &self.catalog.count())
            .field("pending", &self.journal.len())
            .field("streams", &self.streams.len())
            .finish_non_exhaustive()
    }
}

impl ArchiveSession {
    /// Opens an archive on disk.
    pub fn open(path: impl AsRef<Path>, mode: OpenMode) -> Result<Self> {
        Self::open_with(path, OpenOptions::from(mode))
    }

    /// Opens an archive on disk with full options.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] if the archive is missing and `create` is unset
    /// - [`Error::AlreadyExists`] if it exists and `exclusive` is set
    /// - [`Error::Corrupt`] if its directory cannot be read
    pub fn open_with(path: impl AsRef<Path>, options: OpenOptions) -> Result<Self> {
        options.validate()?;
        let path = path.as_ref().to_path_buf();

        let exists = match std::fs::metadata(&path) {
            Ok(meta) if meta.is_dir() => {
                return Err(Error::InvalidArgument(format!(
                    "'{}' is a directory",
                    path.display()
                )));
            }
            Ok(_) => true,
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(e) => return Err(Error::Io(e)),
        };

        if exists && options.exclusive {
            return Err(Error::AlreadyExists { path });
        }
        if !exists && !options.create {
            return Err(Error::NotFound(Missing::Archive(path)));
        }

        let catalog = if exists && !options.truncate {
            let mut reader = BufReader::new(File::open(&path)?);
            EntryCatalog::load(&mut reader, options.check_consistency)?
        } else {
            EntryCatalog::empty()
        };

        log::debug!(
            "Opened {} ({} entries, flags {:#x})",
            path.display(),
            catalog.count(),
            options.bits()
        );
        Ok(Self::from_parts(
            Origin::File(path),
            options,
            catalog,
            exists && options.truncate,
        ))
    }

    /// Opens an archive held in memory.
    ///
    /// Sessions over a buffer have no file to replace: commit them with
    /// [`ArchiveSession::close_to_vec`] or [`ArchiveSession::write_to`].
    pub fn open_buffer(bytes: impl Into<Arc<[u8]>>, options: OpenOptions) -> Result<Self> {
        options.validate()?;
        let bytes: Arc<[u8]> = bytes.into();
        let catalog = if options.truncate {
            EntryCatalog::empty()
        } else {
            let mut reader = Cursor::new(Arc::clone(&bytes));
            EntryCatalog::load(&mut reader, options.check_consistency)?
        };
        let truncated = options.truncate && !bytes.is_empty();
        Ok(Self::from_parts(
            Origin::Memory(bytes),
            options,
            catalog,
            truncated,
        ))
    }

    fn from_parts(
        origin: Origin,
        options: OpenOptions,
        catalog: EntryCatalog,
        truncated: bool,
    ) -> Self {
        Self {
            origin,
            options,
            commit_options: CommitOptions::default(),
            journal: MutationJournal::new(catalog.count()),
            comment: catalog.comment().to_vec(),
            catalog,
            crypto: CryptoContext::new(),
            comment_changed: false,
            truncated,
            streams: BTreeMap::new(),
            next_stream: 0,
        }
    }

    /// Sets the options used when this session is committed.
    pub fn set_commit_options(&mut self, options: CommitOptions) {
        self.commit_options = options;
    }

    /// Where the archive lives.
    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    /// The options the session was opened with.
    pub fn options(&self) -> OpenOptions {
        self.options
    }

    /// The catalog as read at open.
    pub fn catalog(&self) -> &EntryCatalog {
        &self.catalog
    }

    /// The pending changes.
    pub fn journal(&self) -> &MutationJournal {
        &self.journal
    }

    /// Returns true if closing would write a new archive.
    pub fn is_modified(&self) -> bool {
        !self.journal.is_empty() || self.comment_changed || self.truncated
    }

    // ---- catalog queries ----

    /// Number of indices handed out, including pending removals and
    /// additions.
    ///
    /// Every index below this is either live or removed; [`stat`] tells them
    /// apart.
    ///
    /// [`stat`]: ArchiveSession::stat
    pub fn count(&self) -> usize {
        self.journal.index_count()
    }

    /// Returns the lowest live index whose pending name equals `name`.
    ///
    /// Names are compared as raw bytes.
    pub fn locate(&self, name: &[u8]) -> Result<usize> {
        (0..self.count())
            .filter(|&i| !self.journal.is_removed(i))
            .find(|&i| self.effective_name(i) == Some(name))
            .ok_or_else(|| Error::NotFound(Missing::Name(name.to_vec())))
    }

    /// Returns the record of a live index with pending changes applied.
    pub fn stat(&self, index: usize) -> Result<EntryRecord> {
        self.journal.check_live(index)?;
        let changes = self.journal.changes(index);

        let mut record = match self.catalog.stat(index) {
            Ok(record) => record.clone(),
            Err(_) => EntryRecord {
                index,
                name: Vec::new(),
                size: 0,
                compressed_size: 0,
                mtime: 0,
                crc32: 0,
                compression: CompressionMethod::Store,
                encryption: EncryptionMethod::None,
                comment: None,
            },
        };
        if let Some(changes) = changes {
            if let Some(name) = changes.name() {
                record.name = name.to_vec();
            }
            if let Some(source) = changes.source() {
                record.size = source.len();
                record.compressed_size = 0;
                record.crc32 = 0;
            }
            if let Some((method, _)) = changes.compression() {
                record.compression = method;
            }
            if let Some(method) = changes.encryption() {
                record.encryption = method;
            }
            if let Some(comment) = changes.comment() {
                record.comment = comment.map(<[u8]>::to_vec);
            }
            if let Some(mtime) = changes.mtime() {
                record.mtime = mtime;
            }
        }
        Ok(record)
    }

    /// Returns the record of an existing entry as read from the archive.
    pub fn stat_unchanged(&self, index: usize) -> Result<EntryRecord> {
        self.catalog.stat(index).cloned()
    }

    /// Records of all live entries, in index order.
    pub fn entries(&self) -> Vec<EntryRecord> {
        (0..self.count())
            .filter_map(|i| self.stat(i).ok())
            .collect()
    }

    fn effective_name(&self, index: usize) -> Option<&[u8]> {
        self.journal
            .changes(index)
            .and_then(|c| c.name())
            .or_else(|| self.catalog.stat(index).ok().map(|r| r.name.as_slice()))
    }

    // ---- mutations ----

    fn ensure_writable(&self) -> Result<()> {
        if self.options.read_only {
            return Err(Error::ReadOnly);
        }
        Ok(())
    }

    /// Journals a new entry and returns its index.
    ///
    /// Names ending in `/` are directories: stored, empty, never encrypted.
    pub fn add(
        &mut self,
        name: &[u8],
        source: EntrySource,
        compression: CompressionMethod,
    ) -> Result<usize> {
        self.ensure_writable()?;
        self.journal.add(name, source, compression)
    }

    /// Adds an entry from memory using the default compression method.
    pub fn add_buffer(&mut self, name: &[u8], data: Vec<u8>) -> Result<usize> {
        self.add(name, EntrySource::Buffer(data), CompressionMethod::default())
    }

    /// Adds an entry from a whole file using the default compression method.
    pub fn add_file(&mut self, name: &[u8], path: impl AsRef<Path>) -> Result<usize> {
        self.add(name, EntrySource::file(path), CompressionMethod::default())
    }

    /// Adds a directory entry.
    pub fn add_dir(&mut self, name: &[u8]) -> Result<usize> {
        self.add(name, EntrySource::Directory, CompressionMethod::Store)
    }

    /// Replaces the data of a live entry, keeping its name and position.
    pub fn replace(&mut self, index: usize, source: EntrySource) -> Result<()> {
        self.ensure_writable()?;
        self.journal.check_live(index)?;
        if self.effective_name(index).is_some_and(is_dir_name) {
            return Err(Error::InvalidArgument(format!(
                "entry {} is a directory",
                index
            )));
        }
        self.journal.replace(index, source)
    }

    /// Marks a live entry for removal.
    pub fn remove(&mut self, index: usize) -> Result<()> {
        self.ensure_writable()?;
        self.journal.remove(index)
    }

    /// Renames a live entry.
    pub fn rename(&mut self, index: usize, name: &[u8]) -> Result<()> {
        self.ensure_writable()?;
        self.journal.rename(index, name)
    }

    /// Sets the comment of a live entry; `None` or empty clears it.
    pub fn set_comment(&mut self, index: usize, comment: Option<&[u8]>) -> Result<()> {
        self.ensure_writable()?;
        self.journal.set_comment(index, comment)
    }

    /// Sets the modification time of a live entry, in epoch seconds.
    ///
    /// Use [`truncate_epoch`](crate::timestamp::truncate_epoch) to convert a
    /// wider clock.
    pub fn set_mod_time(&mut self, index: usize, mtime: u32) -> Result<()> {
        self.ensure_writable()?;
        self.journal.set_mod_time(index, mtime)
    }

    /// Sets the compression method and level (1-9, 0 for default).
    pub fn set_compression(
        &mut self,
        index: usize,
        method: CompressionMethod,
        level: u32,
    ) -> Result<()> {
        self.ensure_writable()?;
        self.journal.set_compression(index, method, level)
    }

    /// Sets the encryption method of a live entry.
    ///
    /// `password` applies to this entry only; `None` or empty uses the
    /// default password at commit. A missing password is reported by
    /// [`ArchiveSession::close`], not here.
    pub fn set_encryption(
        &mut self,
        index: usize,
        method: EncryptionMethod,
        password: Option<&[u8]>,
    ) -> Result<()> {
        self.ensure_writable()?;
        let password = password.and_then(Password::non_empty);
        self.journal
            .set_encryption(index, method, password.clone())?;
        self.crypto.set_override(index, password);
        Ok(())
    }

    /// The archive comment, with any pending change applied.
    pub fn archive_comment(&self) -> &[u8] {
        &self.comment
    }

    /// Sets the archive comment; `None` clears it.
    pub fn set_archive_comment(&mut self, comment: Option<&[u8]>) -> Result<()> {
        self.ensure_writable()?;
        let comment = comment.unwrap_or_default();
        if comment.len() > MAX_FIELD_LEN {
            return Err(Error::LimitExceeded {
                field: "archive comment",
                len: comment.len(),
                max: MAX_FIELD_LEN,
            });
        }
        if comment != self.comment.as_slice() {
            self.comment = comment.to_vec();
            self.comment_changed = true;
        }
        Ok(())
    }

    /// Sets the default password; an empty one clears it.
    pub fn set_default_password(&mut self, password: &[u8]) {
        self.crypto.set_default_password(password);
    }

    /// The default password, if set.
    pub fn default_password(&self) -> Option<&[u8]> {
        self.crypto.default_password().map(Password::as_bytes)
    }

    // ---- streams ----

    /// Opens a read stream over a live entry.
    ///
    /// Entries added or replaced in this session are read from their pending
    /// source. Otherwise the stored bytes are decrypted and decoded; the
    /// password is `password` if given and non-empty, else the default. A
    /// pending `set_encryption` password only applies to the rewritten entry.
    ///
    /// # Errors
    ///
    /// - [`Error::UnsupportedMethod`] if no codec or cipher is available
    /// - [`Error::NoPassword`] / [`Error::WrongPassword`] for encrypted entries
    pub fn open_entry(&mut self, index: usize, password: Option<&[u8]>) -> Result<StreamId> {
        self.journal.check_live(index)?;
        let id = StreamId(self.next_stream);
        let name = self.effective_name(index).unwrap_or_default().to_vec();

        let stream = match self.journal.changes(index).and_then(|c| c.source()) {
            Some(source) => {
                EntryStream::open_plain(id, index, &name, source.open_owned()?, source.len())
            }
            None => {
                let entry = self
                    .catalog
                    .entry(index)
                    .ok_or(Error::NotFound(Missing::Index(index)))?;
                let explicit = password.and_then(Password::non_empty);
                let password = explicit.as_ref().or_else(|| self.crypto.default_password());

                // fail on methods before touching the file
                entry.record.compression.ensure_supported()?;
                entry.record.encryption.ensure_supported()?;

                let mut reader = self.origin.open_reader()?;
                let data_offset = parser::data_offset(&mut reader, &entry.header)?;
                let plan = entry.decode_plan(data_offset, password);
                EntryStream::open_stored(id, index, &name, reader, plan)?
            }
        };

        self.next_stream += 1;
        self.streams.insert(id, stream);
        log::trace!("Opened stream {} on entry {}", id, index);
        Ok(id)
    }

    /// Reads up to `max_bytes` from a stream; an empty result means end of
    /// data.
    ///
    /// At most 8 KiB is returned per call; loop until empty.
    pub fn read(&mut self, stream: StreamId, max_bytes: usize) -> Result<Vec<u8>> {
        self.stream_mut(stream)?.read(max_bytes)
    }

    /// Reads into `buf`, returning the number of bytes read.
    pub fn read_into(&mut self, stream: StreamId, buf: &mut [u8]) -> Result<usize> {
        self.stream_mut(stream)?.read_into(buf)
    }

    /// Closes a stream, verifying the CRC if it was read to the end.
    pub fn close_stream(&mut self, stream: StreamId) -> Result<()> {
        self.streams
            .remove(&stream)
            .ok_or(Error::StreamClosed { stream: stream.0 })?
            .close()
    }

    /// Number of open streams.
    pub fn open_streams(&self) -> usize {
        self.streams.len()
    }

    fn stream_mut(&mut self, stream: StreamId) -> Result<&mut EntryStream> {
        self.streams
            .get_mut(&stream)
            .ok_or(Error::StreamClosed { stream: stream.0 })
    }

    /// Reads a whole entry into memory.
    pub fn read_entry_to_vec(&mut self, index: usize, password: Option<&[u8]>) -> Result<Vec<u8>> {
        let id = self.open_entry(index, password)?;
        let mut out = Vec::new();
        let drained = loop {
            match self.read(id, crate::READ_BUFFER_SIZE) {
                Ok(chunk) if chunk.is_empty() => break Ok(()),
                Ok(chunk) => out.extend_from_slice(&chunk),
                Err(e) => break Err(e),
            }
        };
        let closed = self.close_stream(id);
        drained?;
        closed?;
        Ok(out)
    }

    // ---- lifecycle ----

    /// Commits pending changes and ends the session.
    ///
    /// Nothing is written when there are no changes. Otherwise a new archive
    /// is written to a temporary file in the same directory and renamed over
    /// the original; on any failure the temporary file is removed and the
    /// original is left untouched. If every entry was removed the result is
    /// an empty archive.
    ///
    /// The session is consumed whatever the outcome.
    ///
    /// # Errors
    ///
    /// - [`Error::StreamsOpen`] if streams are still open; nothing is written
    /// - any error raised while producing the new body
    pub fn close(self, progress: Option<&mut dyn ProgressReporter>) -> Result<CommitResult> {
        self.check_closable()?;
        if !self.is_modified() {
            log::debug!("Closing unmodified session");
            return Ok(CommitResult::unchanged());
        }
        let path = match &self.origin {
            Origin::File(path) => path.clone(),
            Origin::Memory(_) => {
                return Err(Error::InvalidArgument(
                    "in-memory session has no file to replace".into(),
                ));
            }
        };

        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let mut temp = tempfile::NamedTempFile::new_in(&dir)?;
        let result = {
            let mut out = BufWriter::new(temp.as_file_mut());
            let result = self.commit_into(&mut out, progress)?;
            out.flush()?;
            result
        };
        temp.as_file().sync_all()?;

        if let Ok(meta) = std::fs::metadata(&path) {
            if let Err(e) = std::fs::set_permissions(temp.path(), meta.permissions()) {
                log::warn!("Could not copy permissions to {}: {}", path.display(), e);
            }
        }
        temp.persist(&path).map_err(|e| Error::Io(e.error))?;

        log::debug!(
            "Committed {} ({} entries, {} bytes)",
            path.display(),
            result.entries_written,
            result.archive_size
        );
        Ok(result)
    }

    /// Commits into a new in-memory archive and ends the session.
    ///
    /// Returns the original bytes unchanged if nothing was modified and the
    /// session is over a buffer, or an empty vector for an unmodified file
    /// session.
    pub fn close_to_vec(
        self,
        progress: Option<&mut dyn ProgressReporter>,
    ) -> Result<(CommitResult, Vec<u8>)> {
        self.check_closable()?;
        if !self.is_modified() {
            let bytes = match &self.origin {
                Origin::Memory(bytes) => bytes.to_vec(),
                Origin::File(_) => Vec::new(),
            };
            return Ok((CommitResult::unchanged(), bytes));
        }
        let mut out = Cursor::new(Vec::new());
        let result = self.commit_into(&mut out, progress)?;
        Ok((result, out.into_inner()))
    }

    /// Writes the committed archive to `out` and ends the session.
    ///
    /// Unlike [`ArchiveSession::close`] this always writes, even without
    /// changes, and never touches the origin.
    pub fn write_to<W: Write + Seek + Send>(
        self,
        out: &mut W,
        progress: Option<&mut dyn ProgressReporter>,
    ) -> Result<CommitResult> {
        self.check_closable()?;
        self.commit_into(out, progress)
    }

    /// Drops all pending changes and ends the session without writing.
    pub fn discard(self) {
        log::debug!(
            "Discarding session ({} pending operations, {} open streams)",
            self.journal.len(),
            self.streams.len()
        );
    }

    fn check_closable(&self) -> Result<()> {
        if !self.streams.is_empty() {
            return Err(Error::StreamsOpen {
                count: self.streams.len(),
            });
        }
        Ok(())
    }

    fn commit_into<W: Write + Seek + Send>(
        &self,
        out: &mut W,
        progress: Option<&mut dyn ProgressReporter>,
    ) -> Result<CommitResult> {
        let input = CommitInput {
            catalog: &self.catalog,
            journal: &self.journal,
            crypto: &self.crypto,
            comment: &self.comment,
            options: &self.commit_options,
        };
        let mut reader = if self.catalog.count() > 0 {
            Some(self.origin.open_reader()?)
        } else {
            None
        };
        write_archive(
            &input,
            reader.as_mut().map(|r| &mut **r as &mut dyn ReadSeek),
            out,
            progress,
        )
    }
}
