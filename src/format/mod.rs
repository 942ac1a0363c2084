//! ZIP container format constants, definitions, and low-level parsing utilities.
//!
//! This module contains the signatures, flag bits, and extra-field ids defined
//! by PKWARE's APPNOTE and the WinZip AES specification, restricted to the
//! subset this crate reads and writes: classic (non-ZIP64), single-disk
//! archives.

pub mod extra;
pub mod header;
pub mod parser;
pub mod reader;

/// Local file header signature (`PK\x03\x04`).
pub const LOCAL_FILE_HEADER_SIG: u32 = 0x0403_4B50;

/// Central directory file header signature (`PK\x01\x02`).
pub const CENTRAL_DIR_HEADER_SIG: u32 = 0x0201_4B50;

/// End of central directory record signature (`PK\x05\x06`).
pub const END_OF_CENTRAL_DIR_SIG: u32 = 0x0605_4B50;

/// ZIP64 end of central directory locator signature (`PK\x06\x07`).
pub const ZIP64_EOCD_LOCATOR_SIG: u32 = 0x0706_4B50;

/// Optional data descriptor signature (`PK\x07\x08`).
pub const DATA_DESCRIPTOR_SIG: u32 = 0x0807_4B50;

/// Fixed part of a local file header.
pub const LOCAL_FILE_HEADER_SIZE: u64 = 30;

/// Fixed part of a central directory file header.
pub const CENTRAL_DIR_HEADER_SIZE: u64 = 46;

/// Fixed part of the end of central directory record.
pub const END_OF_CENTRAL_DIR_SIZE: u64 = 22;

/// Size of a data descriptor with signature (classic, non-ZIP64).
pub const DATA_DESCRIPTOR_SIZE: u64 = 16;

/// Largest value of any 16-bit length field (names, extra, comments).
pub const MAX_FIELD_LEN: usize = 0xFFFF;

/// The EOCD may be followed by at most a 64 KiB comment.
pub const MAX_EOCD_SEARCH: u64 = END_OF_CENTRAL_DIR_SIZE + MAX_FIELD_LEN as u64;

/// Value marking a 32-bit field as relocated to the ZIP64 extra field.
pub const ZIP64_MARKER_32: u32 = 0xFFFF_FFFF;

/// Value marking a 16-bit count as relocated to the ZIP64 record.
pub const ZIP64_MARKER_16: u16 = 0xFFFF;

/// General purpose bit flags.
pub mod flags {
    /// Entry data is encrypted.
    pub const ENCRYPTED: u16 = 0x0001;
    /// CRC and sizes follow the data in a data descriptor.
    pub const DATA_DESCRIPTOR: u16 = 0x0008;
    /// Strong encryption (PKWARE SES), never supported.
    pub const STRONG_ENCRYPTION: u16 = 0x0040;
    /// Name and comment are UTF-8 (informational only; names stay raw bytes).
    pub const UTF8: u16 = 0x0800;
    /// Central directory is encrypted (PKWARE SES), never supported.
    pub const MASKED_HEADERS: u16 = 0x2000;
}

/// Compression method id stored for WinZip AES entries.
///
/// The real method is carried in the AES extra field.
pub const METHOD_AES: u16 = 99;

/// "Version needed to extract" values written by this crate.
pub mod version {
    /// Deflate, directories, traditional encryption.
    pub const DEFAULT: u16 = 20;
    /// BZip2 compression.
    pub const BZIP2: u16 = 46;
    /// WinZip AES encryption.
    pub const AES: u16 = 51;
    /// "Version made by": UNIX host, specification 6.3.
    pub const MADE_BY: u16 = (3 << 8) | 63;
}

/// Unix mode bits stored in the upper half of external attributes.
pub mod attributes {
    /// `S_IFDIR | 0755`, plus the MS-DOS directory bit.
    pub const DIRECTORY: u32 = (0o040755 << 16) | 0x10;
    /// `S_IFREG | 0644`.
    pub const FILE: u32 = 0o100644 << 16;
}
