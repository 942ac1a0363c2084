//! Catalog rows.

use std::borrow::Cow;

use crate::codec::CompressionMethod;
use crate::crypto::{EncryptionMethod, method as crypto_method};
use crate::format::extra::{self, AesExtra};
use crate::format::header::CentralDirectoryHeader;
use crate::format::{METHOD_AES, flags};

/// One entry of an archive, as seen by a session.
///
/// Records returned by [`ArchiveSession::stat`] reflect pending changes
/// (renames, comments, methods); [`ArchiveSession::stat_unchanged`] returns
/// the record as read from the archive.
///
/// This struct is marked `#[non_exhaustive]` to allow adding new fields
/// in future versions without breaking downstream code.
///
/// [`ArchiveSession::stat`]: crate::ArchiveSession::stat
/// [`ArchiveSession::stat_unchanged`]: crate::ArchiveSession::stat_unchanged
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct EntryRecord {
    /// Stable 0-based ordinal within the session.
    pub index: usize,
    /// Raw entry name; not necessarily UTF-8.
    pub name: Vec<u8>,
    /// Uncompressed size in bytes.
    pub size: u64,
    /// Stored size in bytes, including any encryption overhead.
    pub compressed_size: u64,
    /// Modification time in seconds since the Unix epoch.
    pub mtime: u32,
    /// CRC-32 of the uncompressed content.
    ///
    /// Zero for AE-2 encrypted entries, which do not store it.
    pub crc32: u32,
    /// Compression method.
    pub compression: CompressionMethod,
    /// Encryption method.
    pub encryption: EncryptionMethod,
    /// Raw entry comment, if any.
    pub comment: Option<Vec<u8>>,
}

impl EntryRecord {
    /// Builds a record from a central directory header.
    pub fn from_central(index: usize, header: &CentralDirectoryHeader) -> Self {
        let aes = if header.method == METHOD_AES {
            AesExtra::find_in(&header.extra)
        } else {
            None
        };

        let compression = match aes {
            Some(aes) => CompressionMethod::from_id(aes.method),
            None => CompressionMethod::from_id(header.method),
        };

        let encryption = if header.flags & flags::ENCRYPTED == 0 {
            EncryptionMethod::None
        } else if let Some(aes) = aes {
            EncryptionMethod::from_aes_strength(aes.strength)
        } else if header.flags & flags::STRONG_ENCRYPTION != 0 || header.method == METHOD_AES {
            EncryptionMethod::Unknown(crypto_method::UNKNOWN)
        } else {
            EncryptionMethod::Traditional
        };

        let mtime =
            extra::find_mtime(&header.extra).unwrap_or_else(|| header.modified.to_epoch());

        Self {
            index,
            name: header.name.clone(),
            size: header.uncompressed_size as u64,
            compressed_size: header.compressed_size as u64,
            mtime,
            crc32: header.crc32,
            compression,
            encryption,
            comment: if header.comment.is_empty() {
                None
            } else {
                Some(header.comment.clone())
            },
        }
    }

    /// Returns true if the name denotes a directory (ends with `/`).
    pub fn is_dir(&self) -> bool {
        is_dir_name(&self.name)
    }

    /// Returns true if the entry is encrypted.
    pub fn is_encrypted(&self) -> bool {
        self.encryption.is_encrypted()
    }

    /// Returns the name decoded as UTF-8, replacing invalid sequences.
    pub fn name_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.name)
    }
}

/// Returns true if a raw name denotes a directory.
pub fn is_dir_name(name: &[u8]) -> bool {
    name.last() == Some(&b'/')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timestamp::DosDateTime;

    fn header(method: u16, flags: u16, extra_block: Vec<u8>) -> CentralDirectoryHeader {
        CentralDirectoryHeader {
            method,
            flags,
            modified: DosDateTime::from_epoch(1_600_000_000),
            crc32: 0x1234,
            compressed_size: 7,
            uncompressed_size: 9,
            name: b"x/y.bin".to_vec(),
            extra: extra_block,
            ..Default::default()
        }
    }

    #[test]
    fn test_plain_record() {
        let record = EntryRecord::from_central(4, &header(8, 0, Vec::new()));
        assert_eq!(record.index, 4);
        assert_eq!(record.compression, CompressionMethod::Deflate);
        assert_eq!(record.encryption, EncryptionMethod::None);
        assert_eq!(record.mtime, 1_600_000_000);
        assert_eq!(record.size, 9);
        assert!(record.comment.is_none());
        assert!(!record.is_dir());
    }

    #[test]
    fn test_aes_record_uses_real_method() {
        let mut block = Vec::new();
        let aes = AesExtra {
            vendor_version: 2,
            strength: 3,
            method: 12,
        };
        extra::push(&mut block, extra::WINZIP_AES, &aes.to_bytes());
        let record = EntryRecord::from_central(0, &header(METHOD_AES, flags::ENCRYPTED, block));
        assert_eq!(record.compression, CompressionMethod::Bzip2);
        assert_eq!(record.encryption, EncryptionMethod::Aes256);
    }

    #[test]
    fn test_traditional_and_strong() {
        let record = EntryRecord::from_central(0, &header(0, flags::ENCRYPTED, Vec::new()));
        assert_eq!(record.encryption, EncryptionMethod::Traditional);

        let record = EntryRecord::from_central(
            0,
            &header(0, flags::ENCRYPTED | flags::STRONG_ENCRYPTION, Vec::new()),
        );
        assert_eq!(record.encryption, EncryptionMethod::Unknown(0xFFFF));
    }

    #[test]
    fn test_extended_timestamp_preferred() {
        let mut block = Vec::new();
        extra::push(&mut block, extra::EXTENDED_TIMESTAMP, &extra::mtime_body(1_600_000_001));
        let record = EntryRecord::from_central(0, &header(0, 0, block));
        assert_eq!(record.mtime, 1_600_000_001);
    }

    #[test]
    fn test_dir_names() {
        assert!(is_dir_name(b"a/"));
        assert!(!is_dir_name(b"a"));
        assert!(!is_dir_name(b""));
    }
}
