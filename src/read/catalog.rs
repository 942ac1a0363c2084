//! The queryable table of an archive's existing entries.

use std::io::{Read, Seek};

use super::{DecodePlan, EntryRecord};
use crate::crypto::{Password, zip_crypto};
use crate::error::Missing;
use crate::format::extra::AesExtra;
use crate::format::header::CentralDirectoryHeader;
use crate::format::parser::{self, ArchiveDirectory};
use crate::format::{METHOD_AES, flags};
use crate::{Error, Result};

/// A catalog row together with the header it was read from.
#[derive(Debug, Clone)]
pub(crate) struct CatalogEntry {
    pub(crate) record: EntryRecord,
    pub(crate) header: CentralDirectoryHeader,
}

impl CatalogEntry {
    /// Describes how to decode this entry's stored bytes at `data_offset`.
    pub(crate) fn decode_plan<'p>(
        &self,
        data_offset: u64,
        password: Option<&'p Password>,
    ) -> DecodePlan<'p> {
        let uses_descriptor = self.header.flags & flags::DATA_DESCRIPTOR != 0;
        // AE-2 stores no CRC; integrity rests on the authentication code
        let crc_stored = AesExtra::find_in(&self.header.extra)
            .is_none_or(|aes| aes.vendor_version != 2 || self.header.method != METHOD_AES);
        DecodePlan {
            data_offset,
            stored_len: self.header.compressed_size as u64,
            compression: self.record.compression,
            encryption: self.record.encryption,
            password,
            check_byte: zip_crypto::check_byte(
                self.header.crc32,
                self.header.modified.time,
                uses_descriptor,
            ),
            size: self.header.uncompressed_size as u64,
            crc32: crc_stored.then_some(self.header.crc32),
        }
    }
}

/// The central directory of the archive a session was opened on.
///
/// The catalog is immutable: pending changes live in the
/// [`MutationJournal`](crate::edit::MutationJournal) and are overlaid by the
/// session.
#[derive(Debug, Clone, Default)]
pub struct EntryCatalog {
    entries: Vec<CatalogEntry>,
    comment: Vec<u8>,
}

impl EntryCatalog {
    /// Creates an empty catalog.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Reads the catalog of an archive.
    ///
    /// With `check_consistency`, every local header is cross-checked against
    /// the central directory before the catalog is returned.
    pub fn load<R: Read + Seek>(reader: &mut R, check_consistency: bool) -> Result<Self> {
        let directory = parser::read_directory(reader)?;
        if check_consistency {
            parser::verify_consistency(reader, &directory)?;
        }
        Ok(Self::from_directory(directory))
    }

    /// Builds a catalog from a parsed central directory.
    pub fn from_directory(directory: ArchiveDirectory) -> Self {
        let entries = directory
            .entries
            .into_iter()
            .enumerate()
            .map(|(index, header)| CatalogEntry {
                record: EntryRecord::from_central(index, &header),
                header,
            })
            .collect();
        Self {
            entries,
            comment: directory.comment,
        }
    }

    /// Number of entries.
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    /// Returns the index of the first entry with exactly this raw name.
    pub fn locate(&self, name: &[u8]) -> Result<usize> {
        self.entries
            .iter()
            .position(|e| e.record.name == name)
            .ok_or_else(|| Error::NotFound(Missing::Name(name.to_vec())))
    }

    /// Returns the record at `index`.
    pub fn stat(&self, index: usize) -> Result<&EntryRecord> {
        self.entries
            .get(index)
            .map(|e| &e.record)
            .ok_or(Error::NotFound(Missing::Index(index)))
    }

    /// Iterates all records in index order.
    pub fn records(&self) -> impl Iterator<Item = &EntryRecord> {
        self.entries.iter().map(|e| &e.record)
    }

    /// The archive comment.
    pub fn comment(&self) -> &[u8] {
        &self.comment
    }

    pub(crate) fn entry(&self, index: usize) -> Option<&CatalogEntry> {
        self.entries.get(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog(names: &[&[u8]]) -> EntryCatalog {
        let directory = ArchiveDirectory {
            entries: names
                .iter()
                .map(|n| CentralDirectoryHeader {
                    name: n.to_vec(),
                    ..Default::default()
                })
                .collect(),
            comment: b"c".to_vec(),
            ..Default::default()
        };
        EntryCatalog::from_directory(directory)
    }

    #[test]
    fn test_locate_first_duplicate() {
        let cat = catalog(&[b"a", b"dup", b"b", b"dup"]);
        assert_eq!(cat.count(), 4);
        assert_eq!(cat.locate(b"dup").unwrap(), 1);
        assert_eq!(cat.stat(3).unwrap().index, 3);
    }

    #[test]
    fn test_locate_is_byte_exact() {
        let cat = catalog(&[b"Readme.txt", &[0xC3, 0xA9]]);
        assert!(matches!(
            cat.locate(b"readme.txt"),
            Err(Error::NotFound(Missing::Name(_)))
        ));
        assert_eq!(cat.locate(&[0xC3, 0xA9]).unwrap(), 1);
    }

    #[test]
    fn test_stat_out_of_range() {
        let cat = catalog(&[b"a"]);
        assert!(matches!(
            cat.stat(1),
            Err(Error::NotFound(Missing::Index(1)))
        ));
        assert_eq!(cat.comment(), b"c");
        assert!(EntryCatalog::empty().records().next().is_none());
    }
}
