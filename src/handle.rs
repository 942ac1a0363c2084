//! Token-addressed sessions and streams.
//!
//! [`Registry`] owns any number of [`ArchiveSession`]s and hands out small
//! copyable tokens for them. Every call takes a token and checks it is still
//! live, so using a session after `close` or `discard` is an ordinary
//! [`Error::SessionClosed`] instead of a dangling reference. Slots are reused;
//! a generation counter keeps stale tokens from reaching the new occupant.
//!
//! ```rust,no_run
//! use zipsession::{OpenMode, Registry};
//!
//! let mut registry = Registry::new();
//! let session = registry.open("archive.zip", OpenMode::ReadOnly)?;
//! let stream = registry.open_entry_stream(session, 0, None)?;
//! while !registry.read(stream, 8192)?.is_empty() {}
//! registry.close_stream(stream)?;
//! registry.discard(session)?;
//! assert!(registry.count(session).is_err());
//! # Ok::<(), zipsession::Error>(())
//! ```

use std::fmt;
use std::path::Path;

use crate::codec::CompressionMethod;
use crate::crypto::EncryptionMethod;
use crate::edit::{CommitResult, EntrySource};
use crate::progress::ProgressReporter;
use crate::read::{EntryRecord, StreamId};
use crate::session::{ArchiveSession, OpenOptions};
use crate::{Error, Result};

/// Identifies a session in a [`Registry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionToken {
    slot: u32,
    generation: u32,
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session {}.{}", self.slot, self.generation)
    }
}

/// Identifies an entry stream of a session in a [`Registry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamToken {
    session: SessionToken,
    stream: StreamId,
}

impl StreamToken {
    /// The session the stream belongs to.
    pub fn session(&self) -> SessionToken {
        self.session
    }
}

struct Slot {
    generation: u32,
    session: Option<ArchiveSession>,
}

/// An arena of open sessions addressed by tokens.
#[derive(Default)]
pub struct Registry {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("slots", &self.slots.len())
            .field("live", &self.live())
            .finish()
    }
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live sessions.
    pub fn live(&self) -> usize {
        self.slots.iter().filter(|s| s.session.is_some()).count()
    }

    /// Opens an archive and registers the session.
    pub fn open(
        &mut self,
        path: impl AsRef<Path>,
        options: impl Into<OpenOptions>,
    ) -> Result<SessionToken> {
        let session = ArchiveSession::open_with(path, options.into())?;
        Ok(self.insert(session))
    }

    /// Registers an already open session.
    pub fn insert(&mut self, session: ArchiveSession) -> SessionToken {
        match self.free.pop() {
            Some(slot) => {
                let entry = &mut self.slots[slot as usize];
                entry.session = Some(session);
                SessionToken {
                    slot,
                    generation: entry.generation,
                }
            }
            None => {
                let slot = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    session: Some(session),
                });
                SessionToken {
                    slot,
                    generation: 0,
                }
            }
        }
    }

    /// Borrows a live session.
    pub fn get(&self, token: SessionToken) -> Result<&ArchiveSession> {
        self.slots
            .get(token.slot as usize)
            .filter(|s| s.generation == token.generation)
            .and_then(|s| s.session.as_ref())
            .ok_or(Error::SessionClosed)
    }

    /// Mutably borrows a live session.
    pub fn get_mut(&mut self, token: SessionToken) -> Result<&mut ArchiveSession> {
        self.slots
            .get_mut(token.slot as usize)
            .filter(|s| s.generation == token.generation)
            .and_then(|s| s.session.as_mut())
            .ok_or(Error::SessionClosed)
    }

    /// Unregisters a session, invalidating its token and stream tokens.
    pub fn take(&mut self, token: SessionToken) -> Result<ArchiveSession> {
        let slot = self
            .slots
            .get_mut(token.slot as usize)
            .filter(|s| s.generation == token.generation)
            .ok_or(Error::SessionClosed)?;
        let session = slot.session.take().ok_or(Error::SessionClosed)?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(token.slot);
        Ok(session)
    }

    /// See [`ArchiveSession::count`].
    pub fn count(&self, token: SessionToken) -> Result<usize> {
        Ok(self.get(token)?.count())
    }

    /// See [`ArchiveSession::locate`].
    pub fn locate(&self, token: SessionToken, name: &[u8]) -> Result<usize> {
        self.get(token)?.locate(name)
    }

    /// See [`ArchiveSession::stat`].
    pub fn stat(&self, token: SessionToken, index: usize) -> Result<EntryRecord> {
        self.get(token)?.stat(index)
    }

    /// See [`ArchiveSession::add`].
    pub fn add(
        &mut self,
        token: SessionToken,
        name: &[u8],
        source: EntrySource,
        compression: CompressionMethod,
    ) -> Result<usize> {
        self.get_mut(token)?.add(name, source, compression)
    }

    /// See [`ArchiveSession::replace`].
    pub fn replace(&mut self, token: SessionToken, index: usize, source: EntrySource) -> Result<()> {
        self.get_mut(token)?.replace(index, source)
    }

    /// See [`ArchiveSession::remove`].
    pub fn remove(&mut self, token: SessionToken, index: usize) -> Result<()> {
        self.get_mut(token)?.remove(index)
    }

    /// See [`ArchiveSession::rename`].
    pub fn rename(&mut self, token: SessionToken, index: usize, name: &[u8]) -> Result<()> {
        self.get_mut(token)?.rename(index, name)
    }

    /// See [`ArchiveSession::set_comment`].
    pub fn set_comment(
        &mut self,
        token: SessionToken,
        index: usize,
        comment: Option<&[u8]>,
    ) -> Result<()> {
        self.get_mut(token)?.set_comment(index, comment)
    }

    /// See [`ArchiveSession::set_mod_time`].
    pub fn set_mod_time(&mut self, token: SessionToken, index: usize, mtime: u32) -> Result<()> {
        self.get_mut(token)?.set_mod_time(index, mtime)
    }

    /// See [`ArchiveSession::set_compression`].
    pub fn set_compression(
        &mut self,
        token: SessionToken,
        index: usize,
        method: CompressionMethod,
        level: u32,
    ) -> Result<()> {
        self.get_mut(token)?.set_compression(index, method, level)
    }

    /// See [`ArchiveSession::set_encryption`].
    pub fn set_encryption(
        &mut self,
        token: SessionToken,
        index: usize,
        method: EncryptionMethod,
        password: Option<&[u8]>,
    ) -> Result<()> {
        self.get_mut(token)?.set_encryption(index, method, password)
    }

    /// See [`ArchiveSession::set_archive_comment`].
    pub fn set_archive_comment(&mut self, token: SessionToken, comment: Option<&[u8]>) -> Result<()> {
        self.get_mut(token)?.set_archive_comment(comment)
    }

    /// The archive comment, with any pending change applied.
    pub fn archive_comment(&self, token: SessionToken) -> Result<Vec<u8>> {
        Ok(self.get(token)?.archive_comment().to_vec())
    }

    /// Sets the session's default password; empty clears it.
    pub fn set_default_password(&mut self, token: SessionToken, password: &[u8]) -> Result<()> {
        self.get_mut(token)?.set_default_password(password);
        Ok(())
    }

    /// The session's default password, if set.
    pub fn default_password(&self, token: SessionToken) -> Result<Option<Vec<u8>>> {
        Ok(self.get(token)?.default_password().map(<[u8]>::to_vec))
    }

    /// Opens a stream over an entry of a live session.
    pub fn open_entry_stream(
        &mut self,
        token: SessionToken,
        index: usize,
        password: Option<&[u8]>,
    ) -> Result<StreamToken> {
        let stream = self.get_mut(token)?.open_entry(index, password)?;
        Ok(StreamToken {
            session: token,
            stream,
        })
    }

    /// Reads from a stream.
    ///
    /// Fails with [`Error::SessionClosed`] if the owning session is gone and
    /// [`Error::StreamClosed`] if only the stream is.
    pub fn read(&mut self, token: StreamToken, max_bytes: usize) -> Result<Vec<u8>> {
        self.get_mut(token.session)?.read(token.stream, max_bytes)
    }

    /// Closes a stream, verifying its CRC if it was read to the end.
    pub fn close_stream(&mut self, token: StreamToken) -> Result<()> {
        self.get_mut(token.session)?.close_stream(token.stream)
    }

    /// Commits and closes a session.
    ///
    /// The token is dead afterwards whatever the outcome.
    pub fn close(
        &mut self,
        token: SessionToken,
        progress: Option<&mut dyn ProgressReporter>,
    ) -> Result<CommitResult> {
        self.take(token)?.close(progress)
    }

    /// Drops a session's pending changes and closes it.
    pub fn discard(&mut self, token: SessionToken) -> Result<()> {
        self.take(token)?.discard();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::OpenMode;

    fn memory_session() -> ArchiveSession {
        ArchiveSession::open_buffer(Vec::new(), OpenOptions::new().create(true)).unwrap()
    }

    #[test]
    fn test_dead_tokens_fail() {
        let mut registry = Registry::new();
        let token = registry.insert(memory_session());
        registry
            .add(token, b"a", EntrySource::Buffer(b"x".to_vec()), CompressionMethod::Store)
            .unwrap();
        assert_eq!(registry.count(token).unwrap(), 1);

        registry.discard(token).unwrap();
        assert!(matches!(registry.count(token), Err(Error::SessionClosed)));
        assert!(matches!(registry.discard(token), Err(Error::SessionClosed)));
        assert_eq!(registry.live(), 0);
    }

    #[test]
    fn test_reused_slot_rejects_stale_token() {
        let mut registry = Registry::new();
        let old = registry.insert(memory_session());
        registry.discard(old).unwrap();
        let new = registry.insert(memory_session());
        assert_ne!(old, new);
        assert!(registry.get(old).is_err());
        assert!(registry.get(new).is_ok());
    }

    #[test]
    fn test_stream_tokens() {
        let mut registry = Registry::new();
        let token = registry.insert(memory_session());
        registry
            .add(token, b"a", EntrySource::Buffer(b"xyz".to_vec()), CompressionMethod::Store)
            .unwrap();
        let stream = registry.open_entry_stream(token, 0, None).unwrap();
        assert_eq!(stream.session(), token);
        assert_eq!(registry.read(stream, 16).unwrap(), b"xyz");
        registry.close_stream(stream).unwrap();
        assert!(matches!(
            registry.read(stream, 16),
            Err(Error::StreamClosed { .. })
        ));

        let stream = registry.open_entry_stream(token, 0, None).unwrap();
        registry.discard(token).unwrap();
        assert!(matches!(registry.read(stream, 16), Err(Error::SessionClosed)));
    }

    #[test]
    fn test_failed_close_invalidates() {
        let mut registry = Registry::new();
        let token = registry.insert(memory_session());
        registry.set_archive_comment(token, Some(b"c")).unwrap();
        // in-memory sessions have nothing to replace
        assert!(registry.close(token, None).is_err());
        assert!(matches!(registry.count(token), Err(Error::SessionClosed)));
    }

    #[test]
    fn test_open_missing_archive() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = Registry::new();
        let result = registry.open(dir.path().join("none.zip"), OpenMode::ReadOnly);
        assert!(matches!(result, Err(Error::NotFound(_))));
        assert_eq!(registry.live(), 0);
    }
}
