//! Local file header, central directory header and end of central directory
//! record.
//!
//! Each record is read by fetching its fixed part in one `read_exact` and then
//! the variable-length name/extra/comment fields that follow.

use std::io::{Read, Write};

use super::reader::{FieldCursor, read_vec, write_u16_le, write_u32_le};
use super::{
    CENTRAL_DIR_HEADER_SIG, CENTRAL_DIR_HEADER_SIZE, DATA_DESCRIPTOR_SIG, END_OF_CENTRAL_DIR_SIG,
    END_OF_CENTRAL_DIR_SIZE, LOCAL_FILE_HEADER_SIG, LOCAL_FILE_HEADER_SIZE,
};
use crate::timestamp::DosDateTime;
use crate::{Error, Result};

/// A local file header, as found in front of each entry's data.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LocalFileHeader {
    /// Version needed to extract.
    pub version_needed: u16,
    /// General purpose bit flags.
    pub flags: u16,
    /// Stored compression method id (99 for AES).
    pub method: u16,
    /// Last modification date and time.
    pub modified: DosDateTime,
    /// CRC-32 of the uncompressed data.
    pub crc32: u32,
    /// Size of the stored data, including any encryption header and trailer.
    pub compressed_size: u32,
    /// Size of the uncompressed data.
    pub uncompressed_size: u32,
    /// Raw entry name.
    pub name: Vec<u8>,
    /// Extra field block.
    pub extra: Vec<u8>,
}

impl LocalFileHeader {
    /// Reads a local header. `offset` is used for error reporting only.
    pub fn read<R: Read + ?Sized>(r: &mut R, offset: u64) -> Result<Self> {
        let mut fixed = [0u8; LOCAL_FILE_HEADER_SIZE as usize];
        r.read_exact(&mut fixed)?;
        let mut c = FieldCursor::new(&fixed);
        if c.u32() != LOCAL_FILE_HEADER_SIG {
            return Err(Error::corrupt(offset, "bad local header signature"));
        }
        let version_needed = c.u16();
        let flags = c.u16();
        let method = c.u16();
        let time = c.u16();
        let date = c.u16();
        let crc32 = c.u32();
        let compressed_size = c.u32();
        let uncompressed_size = c.u32();
        let name_len = c.u16() as usize;
        let extra_len = c.u16() as usize;

        Ok(Self {
            version_needed,
            flags,
            method,
            modified: DosDateTime::new(date, time),
            crc32,
            compressed_size,
            uncompressed_size,
            name: read_vec(r, name_len)?,
            extra: read_vec(r, extra_len)?,
        })
    }

    /// Writes the header.
    pub fn write<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        write_u32_le(w, LOCAL_FILE_HEADER_SIG)?;
        write_u16_le(w, self.version_needed)?;
        write_u16_le(w, self.flags)?;
        write_u16_le(w, self.method)?;
        write_u16_le(w, self.modified.time)?;
        write_u16_le(w, self.modified.date)?;
        write_u32_le(w, self.crc32)?;
        write_u32_le(w, self.compressed_size)?;
        write_u32_le(w, self.uncompressed_size)?;
        write_u16_le(w, self.name.len() as u16)?;
        write_u16_le(w, self.extra.len() as u16)?;
        w.write_all(&self.name)?;
        w.write_all(&self.extra)
    }

    /// Total encoded length of the header.
    pub fn encoded_len(&self) -> u64 {
        LOCAL_FILE_HEADER_SIZE + self.name.len() as u64 + self.extra.len() as u64
    }

    /// Offset of the CRC field relative to the start of the header.
    ///
    /// The CRC and both size fields are contiguous from here, which lets a
    /// writer patch them after the data has been streamed.
    pub const CRC_FIELD_OFFSET: u64 = 14;
}

/// A central directory file header.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CentralDirectoryHeader {
    /// Version made by.
    pub version_made_by: u16,
    /// Version needed to extract.
    pub version_needed: u16,
    /// General purpose bit flags.
    pub flags: u16,
    /// Stored compression method id (99 for AES).
    pub method: u16,
    /// Last modification date and time.
    pub modified: DosDateTime,
    /// CRC-32 of the uncompressed data.
    pub crc32: u32,
    /// Size of the stored data.
    pub compressed_size: u32,
    /// Size of the uncompressed data.
    pub uncompressed_size: u32,
    /// Disk number where the entry starts.
    pub disk_start: u16,
    /// Internal file attributes.
    pub internal_attributes: u16,
    /// External file attributes.
    pub external_attributes: u32,
    /// Offset of the local header from the start of the archive.
    pub local_header_offset: u32,
    /// Raw entry name.
    pub name: Vec<u8>,
    /// Extra field block.
    pub extra: Vec<u8>,
    /// Raw entry comment.
    pub comment: Vec<u8>,
}

impl CentralDirectoryHeader {
    /// Reads a central directory header.
    pub fn read<R: Read + ?Sized>(r: &mut R, offset: u64) -> Result<Self> {
        let mut fixed = [0u8; CENTRAL_DIR_HEADER_SIZE as usize];
        r.read_exact(&mut fixed)
            .map_err(|_| Error::corrupt(offset, "truncated central directory"))?;
        let mut c = FieldCursor::new(&fixed);
        if c.u32() != CENTRAL_DIR_HEADER_SIG {
            return Err(Error::corrupt(offset, "bad central directory signature"));
        }
        let version_made_by = c.u16();
        let version_needed = c.u16();
        let flags = c.u16();
        let method = c.u16();
        let time = c.u16();
        let date = c.u16();
        let crc32 = c.u32();
        let compressed_size = c.u32();
        let uncompressed_size = c.u32();
        let name_len = c.u16() as usize;
        let extra_len = c.u16() as usize;
        let comment_len = c.u16() as usize;
        let disk_start = c.u16();
        let internal_attributes = c.u16();
        let external_attributes = c.u32();
        let local_header_offset = c.u32();

        let truncated = |_| Error::corrupt(offset, "truncated central directory");
        Ok(Self {
            version_made_by,
            version_needed,
            flags,
            method,
            modified: DosDateTime::new(date, time),
            crc32,
            compressed_size,
            uncompressed_size,
            disk_start,
            internal_attributes,
            external_attributes,
            local_header_offset,
            name: read_vec(r, name_len).map_err(truncated)?,
            extra: read_vec(r, extra_len).map_err(truncated)?,
            comment: read_vec(r, comment_len).map_err(truncated)?,
        })
    }

    /// Writes the header.
    pub fn write<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        write_u32_le(w, CENTRAL_DIR_HEADER_SIG)?;
        write_u16_le(w, self.version_made_by)?;
        write_u16_le(w, self.version_needed)?;
        write_u16_le(w, self.flags)?;
        write_u16_le(w, self.method)?;
        write_u16_le(w, self.modified.time)?;
        write_u16_le(w, self.modified.date)?;
        write_u32_le(w, self.crc32)?;
        write_u32_le(w, self.compressed_size)?;
        write_u32_le(w, self.uncompressed_size)?;
        write_u16_le(w, self.name.len() as u16)?;
        write_u16_le(w, self.extra.len() as u16)?;
        write_u16_le(w, self.comment.len() as u16)?;
        write_u16_le(w, self.disk_start)?;
        write_u16_le(w, self.internal_attributes)?;
        write_u32_le(w, self.external_attributes)?;
        write_u32_le(w, self.local_header_offset)?;
        w.write_all(&self.name)?;
        w.write_all(&self.extra)?;
        w.write_all(&self.comment)
    }

    /// Total encoded length of the header.
    pub fn encoded_len(&self) -> u64 {
        CENTRAL_DIR_HEADER_SIZE
            + self.name.len() as u64
            + self.extra.len() as u64
            + self.comment.len() as u64
    }
}

/// The end of central directory record.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EndOfCentralDirectory {
    /// Number of this disk.
    pub disk_number: u16,
    /// Disk where the central directory starts.
    pub cd_disk: u16,
    /// Central directory records on this disk.
    pub entries_on_disk: u16,
    /// Total central directory records.
    pub total_entries: u16,
    /// Size of the central directory in bytes.
    pub cd_size: u32,
    /// Offset of the central directory from the start of the archive.
    pub cd_offset: u32,
    /// Raw archive comment.
    pub comment: Vec<u8>,
}

impl EndOfCentralDirectory {
    /// Parses the record from a buffer starting at its signature.
    ///
    /// A comment length running past the buffer is clamped to what is there;
    /// some writers get it wrong.
    pub fn parse(data: &[u8], offset: u64) -> Result<Self> {
        if data.len() < END_OF_CENTRAL_DIR_SIZE as usize {
            return Err(Error::corrupt(offset, "truncated end of central directory"));
        }
        let mut c = FieldCursor::new(data);
        if c.u32() != END_OF_CENTRAL_DIR_SIG {
            return Err(Error::corrupt(offset, "bad end of central directory signature"));
        }
        let disk_number = c.u16();
        let cd_disk = c.u16();
        let entries_on_disk = c.u16();
        let total_entries = c.u16();
        let cd_size = c.u32();
        let cd_offset = c.u32();
        let comment_len = c.u16() as usize;
        let start = c.position();
        let end = (start + comment_len).min(data.len());

        Ok(Self {
            disk_number,
            cd_disk,
            entries_on_disk,
            total_entries,
            cd_size,
            cd_offset,
            comment: data[start..end].to_vec(),
        })
    }

    /// Writes the record.
    pub fn write<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        write_u32_le(w, END_OF_CENTRAL_DIR_SIG)?;
        write_u16_le(w, self.disk_number)?;
        write_u16_le(w, self.cd_disk)?;
        write_u16_le(w, self.entries_on_disk)?;
        write_u16_le(w, self.total_entries)?;
        write_u32_le(w, self.cd_size)?;
        write_u32_le(w, self.cd_offset)?;
        write_u16_le(w, self.comment.len() as u16)?;
        w.write_all(&self.comment)
    }
}

/// Writes a data descriptor with signature.
pub fn write_data_descriptor<W: Write>(
    w: &mut W,
    crc32: u32,
    compressed_size: u32,
    uncompressed_size: u32,
) -> std::io::Result<()> {
    write_u32_le(w, DATA_DESCRIPTOR_SIG)?;
    write_u32_le(w, crc32)?;
    write_u32_le(w, compressed_size)?;
    write_u32_le(w, uncompressed_size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample_central() -> CentralDirectoryHeader {
        CentralDirectoryHeader {
            version_made_by: 0x033F,
            version_needed: 20,
            flags: 0x0800,
            method: 8,
            modified: DosDateTime::from_epoch(1_700_000_000),
            crc32: 0xDEAD_BEEF,
            compressed_size: 10,
            uncompressed_size: 20,
            external_attributes: 0o100644 << 16,
            local_header_offset: 1234,
            name: b"dir/file.txt".to_vec(),
            extra: vec![0x55, 0x54, 0x01, 0x00, 0x00],
            comment: b"note".to_vec(),
            ..Default::default()
        }
    }

    #[test]
    fn test_central_header_roundtrip() {
        let header = sample_central();
        let mut buf = Vec::new();
        header.write(&mut buf).unwrap();
        assert_eq!(buf.len() as u64, header.encoded_len());

        let parsed = CentralDirectoryHeader::read(&mut Cursor::new(&buf), 0).unwrap();
        assert_eq!(parsed, header);
    }

    #[test]
    fn test_local_header_bad_signature() {
        let buf = [0u8; 30];
        let err = LocalFileHeader::read(&mut Cursor::new(&buf), 77).unwrap_err();
        assert!(matches!(err, Error::Corrupt { offset: 77, .. }));
    }

    #[test]
    fn test_local_header_crc_field_offset() {
        let header = LocalFileHeader {
            crc32: 0x0403_0201,
            name: b"a".to_vec(),
            ..Default::default()
        };
        let mut buf = Vec::new();
        header.write(&mut buf).unwrap();
        let at = LocalFileHeader::CRC_FIELD_OFFSET as usize;
        assert_eq!(&buf[at..at + 4], &[1, 2, 3, 4]);
        assert_eq!(buf.len() as u64, header.encoded_len());
    }

    #[test]
    fn test_truncated_central_header() {
        let mut buf = Vec::new();
        sample_central().write(&mut buf).unwrap();
        buf.truncate(50);
        let err = CentralDirectoryHeader::read(&mut Cursor::new(&buf), 5).unwrap_err();
        assert!(matches!(err, Error::Corrupt { offset: 5, .. }));
    }

    #[test]
    fn test_eocd_comment_clamped() {
        let eocd = EndOfCentralDirectory {
            comment: b"hello".to_vec(),
            ..Default::default()
        };
        let mut buf = Vec::new();
        eocd.write(&mut buf).unwrap();
        buf.truncate(buf.len() - 2);
        let parsed = EndOfCentralDirectory::parse(&buf, 0).unwrap();
        assert_eq!(parsed.comment, b"hel");
    }
}
