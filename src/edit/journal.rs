//! The journal of uncommitted changes.

use std::collections::BTreeMap;

use super::operation::{EntrySource, JournalEntry, Operation};
use crate::codec::{CompressionMethod, DEFAULT_LEVEL};
use crate::crypto::{EncryptionMethod, Password};
use crate::error::Missing;
use crate::format::MAX_FIELD_LEN;
use crate::read::is_dir_name;
use crate::timestamp;
use crate::{Error, Result};

/// Highest accepted compression level.
pub const MAX_LEVEL: u32 = 9;

/// The accumulated pending state of one index.
///
/// Fields left as `None` mean "as in the archive".
#[derive(Debug, Clone, Default)]
pub struct EntryChanges {
    pub(crate) name: Option<Vec<u8>>,
    pub(crate) source: Option<EntrySource>,
    pub(crate) compression: Option<(CompressionMethod, u32)>,
    pub(crate) encryption: Option<(EncryptionMethod, Option<Password>)>,
    pub(crate) comment: Option<Option<Vec<u8>>>,
    pub(crate) mtime: Option<u32>,
    pub(crate) added: bool,
    pub(crate) removed: bool,
}

impl EntryChanges {
    /// The pending name, if renamed or added.
    pub fn name(&self) -> Option<&[u8]> {
        self.name.as_deref()
    }

    /// The pending data source, if added or replaced.
    pub fn source(&self) -> Option<&EntrySource> {
        self.source.as_ref()
    }

    /// The pending compression method and level.
    pub fn compression(&self) -> Option<(CompressionMethod, u32)> {
        self.compression
    }

    /// The pending encryption method.
    pub fn encryption(&self) -> Option<EncryptionMethod> {
        self.encryption.as_ref().map(|(m, _)| *m)
    }

    /// The pending comment; `Some(None)` clears it.
    pub fn comment(&self) -> Option<Option<&[u8]>> {
        self.comment.as_ref().map(|c| c.as_deref())
    }

    /// The pending modification time.
    pub fn mtime(&self) -> Option<u32> {
        self.mtime
    }

    /// Returns true if the index was created by an add.
    pub fn is_added(&self) -> bool {
        self.added
    }

    /// Returns true if the index is pending removal.
    pub fn is_removed(&self) -> bool {
        self.removed
    }

    /// Returns true if the entry's stored bytes must be produced anew.
    pub(crate) fn needs_data(&self) -> bool {
        self.source.is_some() || self.compression.is_some() || self.encryption.is_some()
    }
}

/// Records pending add/remove/rename/recompress/re-encrypt operations.
///
/// Indices below the catalog size refer to existing entries; every add
/// allocates the next index past the last one handed out, so indices stay
/// dense and stable for the life of the session. Removed indices are never
/// reused.
///
/// All validation happens before anything is recorded, so a failed call
/// leaves the journal as it was.
#[derive(Debug, Clone, Default)]
pub struct MutationJournal {
    base_len: usize,
    changes: BTreeMap<usize, EntryChanges>,
    added: Vec<usize>,
    log: Vec<JournalEntry>,
}

impl MutationJournal {
    /// Creates an empty journal over a catalog of `base_len` entries.
    pub fn new(base_len: usize) -> Self {
        Self {
            base_len,
            ..Default::default()
        }
    }

    /// Returns true if nothing has been journaled.
    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }

    /// Number of journaled operations.
    pub fn len(&self) -> usize {
        self.log.len()
    }

    /// Number of indices handed out: catalog entries plus additions.
    pub fn index_count(&self) -> usize {
        self.base_len + self.added.len()
    }

    /// Added indices in insertion order.
    pub fn added(&self) -> &[usize] {
        &self.added
    }

    /// All journaled operations in the order they were made.
    pub fn operations(&self) -> &[JournalEntry] {
        &self.log
    }

    /// The pending state of an index, if it has any.
    pub fn changes(&self, index: usize) -> Option<&EntryChanges> {
        self.changes.get(&index)
    }

    /// Returns true if the index is pending removal.
    pub fn is_removed(&self, index: usize) -> bool {
        self.changes.get(&index).is_some_and(|c| c.removed)
    }

    /// Fails with [`Error::NotFound`] unless `index` is live.
    pub fn check_live(&self, index: usize) -> Result<()> {
        if index >= self.index_count() || self.is_removed(index) {
            return Err(Error::NotFound(Missing::Index(index)));
        }
        Ok(())
    }

    /// Journals a new entry and returns its index.
    ///
    /// A name ending in `/` makes a directory entry: its method is forced to
    /// Store and its source must be empty. A [`EntrySource::Directory`] source
    /// gets a trailing `/` appended to its name if missing.
    pub fn add(
        &mut self,
        name: &[u8],
        source: EntrySource,
        compression: CompressionMethod,
    ) -> Result<usize> {
        let mut name = name.to_vec();
        let is_dir = matches!(source, EntrySource::Directory) || is_dir_name(&name);
        if matches!(source, EntrySource::Directory) && !is_dir_name(&name) {
            name.push(b'/');
        }
        check_name(&name)?;

        let (source, compression) = if is_dir {
            if !source.is_empty() {
                return Err(Error::InvalidArgument(format!(
                    "directory entry '{}' cannot carry data",
                    String::from_utf8_lossy(&name)
                )));
            }
            (EntrySource::Directory, CompressionMethod::Store)
        } else {
            compression.ensure_supported()?;
            (source.resolve()?, compression)
        };

        let index = self.index_count();
        self.added.push(index);
        self.changes.insert(
            index,
            EntryChanges {
                name: Some(name.clone()),
                source: Some(source.clone()),
                compression: Some((compression, DEFAULT_LEVEL)),
                mtime: Some(timestamp::now()),
                added: true,
                ..Default::default()
            },
        );
        self.record(
            index,
            Operation::Add {
                name,
                source,
                compression,
            },
        );
        Ok(index)
    }

    /// Replaces the data of a live entry.
    pub fn replace(&mut self, index: usize, source: EntrySource) -> Result<()> {
        self.check_live(index)?;
        let source = source.resolve()?;
        self.entry(index).source = Some(source.clone());
        self.record(index, Operation::Replace { source });
        Ok(())
    }

    /// Marks a live entry for removal.
    pub fn remove(&mut self, index: usize) -> Result<()> {
        self.check_live(index)?;
        self.entry(index).removed = true;
        self.record(index, Operation::Remove);
        Ok(())
    }

    /// Renames a live entry.
    pub fn rename(&mut self, index: usize, name: &[u8]) -> Result<()> {
        self.check_live(index)?;
        check_name(name)?;
        self.entry(index).name = Some(name.to_vec());
        self.record(index, Operation::Rename { name: name.to_vec() });
        Ok(())
    }

    /// Sets or clears the comment of a live entry.
    pub fn set_comment(&mut self, index: usize, comment: Option<&[u8]>) -> Result<()> {
        self.check_live(index)?;
        if let Some(c) = comment {
            check_limit("comment", c.len())?;
        }
        let comment = comment.filter(|c| !c.is_empty()).map(<[u8]>::to_vec);
        self.entry(index).comment = Some(comment.clone());
        self.record(index, Operation::SetComment { comment });
        Ok(())
    }

    /// Sets the modification time of a live entry.
    pub fn set_mod_time(&mut self, index: usize, mtime: u32) -> Result<()> {
        self.check_live(index)?;
        self.entry(index).mtime = Some(mtime);
        self.record(index, Operation::SetModTime { mtime });
        Ok(())
    }

    /// Sets the compression method and level of a live entry.
    pub fn set_compression(
        &mut self,
        index: usize,
        method: CompressionMethod,
        level: u32,
    ) -> Result<()> {
        self.check_live(index)?;
        method.ensure_supported()?;
        if level > MAX_LEVEL {
            return Err(Error::InvalidArgument(format!(
                "compression level {} out of range 0-{}",
                level, MAX_LEVEL
            )));
        }
        self.entry(index).compression = Some((method, level));
        self.record(index, Operation::SetCompression { method, level });
        Ok(())
    }

    /// Sets the encryption method of a live entry.
    ///
    /// A missing password is not an error here; it surfaces at commit.
    pub fn set_encryption(
        &mut self,
        index: usize,
        method: EncryptionMethod,
        password: Option<Password>,
    ) -> Result<()> {
        self.check_live(index)?;
        method.ensure_supported()?;
        let password = password.filter(|p| !p.is_empty());
        self.entry(index).encryption = Some((method, password.clone()));
        self.record(index, Operation::SetEncryption { method, password });
        Ok(())
    }

    /// Drops every pending change.
    pub fn clear(&mut self) {
        let base_len = self.base_len;
        *self = Self::new(base_len);
    }

    fn entry(&mut self, index: usize) -> &mut EntryChanges {
        self.changes.entry(index).or_default()
    }

    fn record(&mut self, index: usize, op: Operation) {
        log::trace!("Journaled {} on entry {}", op.operation_type(), index);
        self.log.push(JournalEntry { index, op });
    }
}

fn check_name(name: &[u8]) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidArgument("entry name is empty".into()));
    }
    check_limit("name", name.len())
}

fn check_limit(field: &'static str, len: usize) -> Result<()> {
    if len > MAX_FIELD_LEN {
        return Err(Error::LimitExceeded {
            field,
            len,
            max: MAX_FIELD_LEN,
        });
    }
    Ok(())
}
