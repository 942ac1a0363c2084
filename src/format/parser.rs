//! Archive directory parsing.
//!
//! Opening an archive reads only its tail: the end of central directory record
//! and the central directory it points at. Local headers are visited lazily,
//! when an entry's data is first located, or eagerly by
//! [`verify_consistency`].

use std::io::{Cursor, Read, Seek, SeekFrom};

use super::extra;
use super::header::{CentralDirectoryHeader, EndOfCentralDirectory, LocalFileHeader};
use super::{
    END_OF_CENTRAL_DIR_SIG, END_OF_CENTRAL_DIR_SIZE, MAX_EOCD_SEARCH, ZIP64_EOCD_LOCATOR_SIG,
    ZIP64_MARKER_16, ZIP64_MARKER_32, flags,
};
use crate::{Error, Result};

/// The parsed central directory of an archive.
#[derive(Debug, Clone, Default)]
pub struct ArchiveDirectory {
    /// Central directory records in on-disk order.
    pub entries: Vec<CentralDirectoryHeader>,
    /// Raw archive comment.
    pub comment: Vec<u8>,
    /// Offset of the central directory.
    pub cd_offset: u64,
    /// Offset of the end of central directory record.
    pub eocd_offset: u64,
}

/// Reads the central directory of an archive.
///
/// A zero-length input is an empty archive.
pub fn read_directory<R: Read + Seek>(r: &mut R) -> Result<ArchiveDirectory> {
    let file_len = r.seek(SeekFrom::End(0))?;
    if file_len == 0 {
        return Ok(ArchiveDirectory::default());
    }

    let (eocd_offset, eocd) = find_eocd(r, file_len)?;
    check_supported(r, eocd_offset, &eocd)?;

    let cd_offset = eocd.cd_offset as u64;
    let cd_size = eocd.cd_size as u64;
    if cd_offset + cd_size > eocd_offset {
        return Err(Error::corrupt(
            eocd_offset,
            "central directory extends past its end record",
        ));
    }

    let cd = read_block(r, cd_offset, cd_size as usize)?;
    let mut cursor = Cursor::new(cd.as_slice());
    let mut entries = Vec::with_capacity(eocd.total_entries as usize);
    for _ in 0..eocd.total_entries {
        let at = cd_offset + cursor.position();
        let header = CentralDirectoryHeader::read(&mut cursor, at)?;
        if header.compressed_size == ZIP64_MARKER_32
            || header.uncompressed_size == ZIP64_MARKER_32
            || header.local_header_offset == ZIP64_MARKER_32
            || extra::find(&header.extra, extra::ZIP64).is_some()
        {
            return Err(Error::UnsupportedFeature { feature: "ZIP64" });
        }
        if header.local_header_offset as u64 >= cd_offset {
            return Err(Error::corrupt(at, "local header offset inside central directory"));
        }
        entries.push(header);
    }

    log::debug!(
        "Read central directory: {} entries at {:#x}, comment {} bytes",
        entries.len(),
        cd_offset,
        eocd.comment.len()
    );

    Ok(ArchiveDirectory {
        entries,
        comment: eocd.comment,
        cd_offset,
        eocd_offset,
    })
}

/// Locates the end of central directory record.
///
/// Scans backwards from the end of the file; the first signature whose
/// comment fits inside the file wins.
fn find_eocd<R: Read + Seek>(r: &mut R, file_len: u64) -> Result<(u64, EndOfCentralDirectory)> {
    if file_len < END_OF_CENTRAL_DIR_SIZE {
        return Err(Error::corrupt(0, "file too small to be a ZIP archive"));
    }
    let tail_len = file_len.min(MAX_EOCD_SEARCH);
    let tail_start = file_len - tail_len;
    let tail = read_block(r, tail_start, tail_len as usize)?;

    let sig = END_OF_CENTRAL_DIR_SIG.to_le_bytes();
    let last = tail.len() - END_OF_CENTRAL_DIR_SIZE as usize;
    for i in (0..=last).rev() {
        if tail[i..i + 4] != sig {
            continue;
        }
        let comment_len = u16::from_le_bytes([tail[i + 20], tail[i + 21]]) as usize;
        if i + END_OF_CENTRAL_DIR_SIZE as usize + comment_len > tail.len() {
            continue;
        }
        let offset = tail_start + i as u64;
        let eocd = EndOfCentralDirectory::parse(&tail[i..], offset)?;
        return Ok((offset, eocd));
    }

    Err(Error::corrupt(
        file_len,
        "end of central directory record not found",
    ))
}

fn check_supported<R: Read + Seek>(
    r: &mut R,
    eocd_offset: u64,
    eocd: &EndOfCentralDirectory,
) -> Result<()> {
    if eocd.total_entries == ZIP64_MARKER_16
        || eocd.cd_size == ZIP64_MARKER_32
        || eocd.cd_offset == ZIP64_MARKER_32
    {
        return Err(Error::UnsupportedFeature { feature: "ZIP64" });
    }
    if eocd_offset >= 20 {
        r.seek(SeekFrom::Start(eocd_offset - 20))?;
        let mut sig = [0u8; 4];
        r.read_exact(&mut sig)?;
        if u32::from_le_bytes(sig) == ZIP64_EOCD_LOCATOR_SIG {
            return Err(Error::UnsupportedFeature { feature: "ZIP64" });
        }
    }
    if eocd.disk_number != 0 || eocd.cd_disk != 0 || eocd.entries_on_disk != eocd.total_entries {
        return Err(Error::UnsupportedFeature {
            feature: "multi-disk archives",
        });
    }
    Ok(())
}

fn read_block<R: Read + Seek>(r: &mut R, offset: u64, len: usize) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|_| Error::OutOfMemory { requested: len })?;
    buf.resize(len, 0);
    r.seek(SeekFrom::Start(offset))?;
    r.read_exact(&mut buf)
        .map_err(|_| Error::corrupt(offset, "unexpected end of file"))?;
    Ok(buf)
}

/// Returns the offset of an entry's stored data.
///
/// The local header is read to learn the length of its own name and extra
/// fields, which may differ from the central directory's.
pub fn data_offset<R: Read + Seek + ?Sized>(
    r: &mut R,
    header: &CentralDirectoryHeader,
) -> Result<u64> {
    let offset = header.local_header_offset as u64;
    let local = read_local_header(r, offset)?;
    Ok(offset + local.encoded_len())
}

fn read_local_header<R: Read + Seek + ?Sized>(
    r: &mut R,
    offset: u64,
) -> Result<LocalFileHeader> {
    r.seek(SeekFrom::Start(offset))?;
    LocalFileHeader::read(r, offset).map_err(|e| match e {
        Error::Io(_) => Error::corrupt(offset, "truncated local header"),
        other => other,
    })
}

/// Cross-checks every local header against its central directory record.
///
/// Checks that the name and method agree, that CRC and sizes agree unless the
/// entry uses a data descriptor, that all entry data lies before the central
/// directory, and that no two entries overlap.
pub fn verify_consistency<R: Read + Seek>(r: &mut R, dir: &ArchiveDirectory) -> Result<()> {
    let mut spans = Vec::with_capacity(dir.entries.len());

    for central in &dir.entries {
        let offset = central.local_header_offset as u64;
        let local = read_local_header(r, offset)?;

        if local.name != central.name {
            return Err(Error::corrupt(offset, "local and central names differ"));
        }
        if local.method != central.method {
            return Err(Error::corrupt(offset, "local and central methods differ"));
        }
        if local.flags & flags::DATA_DESCRIPTOR == 0
            && (local.crc32 != central.crc32
                || local.compressed_size != central.compressed_size
                || local.uncompressed_size != central.uncompressed_size)
        {
            return Err(Error::corrupt(
                offset,
                "local and central CRC or sizes differ",
            ));
        }

        let end = offset + local.encoded_len() + central.compressed_size as u64;
        if end > dir.cd_offset {
            return Err(Error::corrupt(offset, "entry data overlaps central directory"));
        }
        spans.push((offset, end));
    }

    spans.sort_unstable();
    for pair in spans.windows(2) {
        if pair[1].0 < pair[0].1 {
            return Err(Error::corrupt(pair[1].0, "entries overlap"));
        }
    }
    Ok(())
}
