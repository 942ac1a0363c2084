//! Writing a new archive body from the catalog and the journal.
//!
//! Entries are emitted in index order: surviving catalog entries first, then
//! additions in the order they were journaled. An entry whose stored bytes are
//! still valid is copied verbatim; anything else is streamed from its source
//! (the decoded original, or a journaled [`EntrySource`]) through a fresh
//! encoder and encryptor.
//!
//! The local header is written before the data with zero CRC and sizes, then
//! patched once they are known. Traditional encryption is the exception: its
//! check byte must be fixed before the CRC is known, so those entries use a
//! data descriptor keyed on the modification time instead.

use std::io::{self, BufReader, Read, Seek, SeekFrom, Write};

use super::journal::{EntryChanges, MutationJournal};
use super::operation::EntrySource;
use crate::READ_BUFFER_SIZE;
use crate::checksum::Crc32;
use crate::codec::{self, CompressionMethod, DEFAULT_LEVEL};
use crate::crypto::{self, CryptoContext, DecryptParams, EncryptionMethod, Password, zip_crypto};
use crate::format::extra::{self, AesExtra};
use crate::format::header::{
    CentralDirectoryHeader, EndOfCentralDirectory, LocalFileHeader, write_data_descriptor,
};
use crate::format::{METHOD_AES, attributes, flags, parser, version};
use crate::progress::{DEFAULT_STEP, ProgressReporter, ProgressTracker};
use crate::read::{CatalogEntry, EntryCatalog, ReadSeek, attach_entry, is_dir_name};
use crate::timestamp::DosDateTime;
use crate::{Error, Result};

/// AES extra field vendor version written by this crate (AE-1, CRC kept).
const AES_VENDOR_VERSION: u16 = 1;

/// Options controlling how a session is committed.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitOptions {
    /// Minimum progress step as a fraction of total work.
    pub progress_step: f64,
    /// Level for entries whose level was not set explicitly; 0 is the codec
    /// default.
    pub default_level: u32,
}

impl Default for CommitOptions {
    fn default() -> Self {
        Self {
            progress_step: DEFAULT_STEP,
            default_level: DEFAULT_LEVEL,
        }
    }
}

impl CommitOptions {
    /// Creates default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the minimum progress step.
    pub fn progress_step(mut self, step: f64) -> Self {
        self.progress_step = step;
        self
    }

    /// Sets the fallback compression level (0-9).
    pub fn default_level(mut self, level: u32) -> Self {
        self.default_level = level.min(super::journal::MAX_LEVEL);
        self
    }
}

/// Outcome of closing a session.
#[must_use = "commit result should be checked to verify the archive was written"]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[non_exhaustive]
pub struct CommitResult {
    /// Whether a new archive body was written.
    pub rewritten: bool,
    /// Entries in the new archive.
    pub entries_written: usize,
    /// Entries copied without decoding.
    pub entries_copied: usize,
    /// Existing entries decoded and encoded again.
    pub entries_recoded: usize,
    /// Entries added in this session.
    pub entries_added: usize,
    /// Entries dropped.
    pub entries_removed: usize,
    /// Size of the new archive in bytes.
    pub archive_size: u64,
}

impl CommitResult {
    /// The result of a close that wrote nothing.
    pub(crate) fn unchanged() -> Self {
        Self::default()
    }
}

/// Everything a commit reads from the session.
pub(crate) struct CommitInput<'a> {
    pub(crate) catalog: &'a EntryCatalog,
    pub(crate) journal: &'a MutationJournal,
    pub(crate) crypto: &'a CryptoContext,
    pub(crate) comment: &'a [u8],
    pub(crate) options: &'a CommitOptions,
}

/// What will be written for one surviving index.
struct Planned<'a> {
    index: usize,
    name: Vec<u8>,
    comment: Vec<u8>,
    mtime: Option<u32>,
    kind: PlanKind<'a>,
}

enum PlanKind<'a> {
    /// Stored bytes reused as they are.
    Copy { entry: &'a CatalogEntry },
    /// Data produced anew from `input`.
    Encode {
        input: Input<'a>,
        base: Option<&'a CatalogEntry>,
        compression: CompressionMethod,
        level: u32,
        encryption: EncryptionMethod,
        password: Option<&'a Password>,
    },
}

enum Input<'a> {
    Stored(&'a CatalogEntry),
    Source(&'a EntrySource),
}

impl Planned<'_> {
    fn work(&self) -> u64 {
        match &self.kind {
            PlanKind::Copy { entry } => entry.header.compressed_size as u64,
            PlanKind::Encode {
                input: Input::Stored(entry),
                ..
            } => entry.header.uncompressed_size as u64,
            PlanKind::Encode {
                input: Input::Source(source),
                ..
            } => source.len(),
        }
    }
}

/// Writes the new archive to `out`.
///
/// `origin` must be provided whenever the catalog is non-empty.
pub(crate) fn write_archive<W: Write + Seek + Send>(
    input: &CommitInput<'_>,
    mut origin: Option<&mut dyn ReadSeek>,
    out: &mut W,
    progress: Option<&mut dyn ProgressReporter>,
) -> Result<CommitResult> {
    let (plan, removed) = build_plan(input)?;
    let total: u64 = plan.iter().map(Planned::work).sum();
    let mut tracker = ProgressTracker::new(progress, total, input.options.progress_step);
    tracker.start();

    log::debug!(
        "Committing {} entries ({} removed, {} bytes of work)",
        plan.len(),
        removed,
        total
    );

    let mut result = CommitResult {
        rewritten: true,
        entries_removed: removed,
        ..Default::default()
    };
    let mut central = Vec::with_capacity(plan.len());

    for planned in &plan {
        tracker.entry(&planned.name);
        let header = match &planned.kind {
            PlanKind::Copy { entry } => {
                let src = require_origin(&mut origin)?;
                result.entries_copied += 1;
                copy_entry(planned, entry, src, out, &mut tracker)?
            }
            PlanKind::Encode { input: source, .. } => {
                match source {
                    Input::Stored(_) => result.entries_recoded += 1,
                    Input::Source(_) => {}
                }
                let src = match source {
                    Input::Stored(_) => Some(require_origin(&mut origin)?),
                    Input::Source(_) => None,
                };
                encode_entry(planned, input, src, out, &mut tracker)?
            }
        };
        log::trace!(
            "Wrote entry {} ({}) at {:#x}",
            planned.index,
            String::from_utf8_lossy(&planned.name),
            header.local_header_offset
        );
        central.push(header);
    }
    result.entries_added = plan
        .iter()
        .filter(|p| input.journal.changes(p.index).is_some_and(EntryChanges::is_added))
        .count();
    result.entries_written = central.len();

    let cd_offset = position(out)?;
    for header in &central {
        header.write(out)?;
    }
    let cd_end = position(out)?;
    let entries = u16::try_from(central.len()).map_err(|_| Error::UnsupportedFeature {
        feature: "more than 65535 entries (ZIP64)",
    })?;
    EndOfCentralDirectory {
        entries_on_disk: entries,
        total_entries: entries,
        cd_size: to_u32(cd_end - cd_offset)?,
        cd_offset: to_u32(cd_offset)?,
        comment: input.comment.to_vec(),
        ..Default::default()
    }
    .write(out)?;
    out.flush()?;

    result.archive_size = position(out)?;
    tracker.finish();
    Ok(result)
}

fn build_plan<'a>(input: &CommitInput<'a>) -> Result<(Vec<Planned<'a>>, usize)> {
    let journal = input.journal;
    let mut plan = Vec::with_capacity(journal.index_count());
    let mut removed = 0;

    for index in 0..journal.index_count() {
        let changes = journal.changes(index);
        if changes.is_some_and(EntryChanges::is_removed) {
            if index < input.catalog.count() {
                removed += 1;
            }
            continue;
        }
        let entry = input.catalog.entry(index);
        let planned = match (entry, changes) {
            (Some(entry), None) => Planned {
                index,
                name: entry.header.name.clone(),
                comment: entry.header.comment.clone(),
                mtime: None,
                kind: PlanKind::Copy { entry },
            },
            (Some(entry), Some(changes)) => plan_existing(index, entry, changes, input)?,
            (None, Some(changes)) => plan_added(index, changes, input)?,
            (None, None) => continue,
        };
        plan.push(planned);
    }

    Ok((plan, removed))
}

fn plan_existing<'a>(
    index: usize,
    entry: &'a CatalogEntry,
    changes: &'a EntryChanges,
    input: &CommitInput<'a>,
) -> Result<Planned<'a>> {
    let record = &entry.record;
    let name = changes
        .name()
        .map_or_else(|| entry.header.name.clone(), <[u8]>::to_vec);
    let comment = match changes.comment() {
        Some(c) => c.map(<[u8]>::to_vec).unwrap_or_default(),
        None => entry.header.comment.clone(),
    };
    let mtime = changes.mtime().filter(|&t| t != record.mtime);

    let (compression, level) = changes
        .compression()
        .unwrap_or((record.compression, DEFAULT_LEVEL));
    let recompress = compression != record.compression || level != DEFAULT_LEVEL;

    let (encryption, password, rekey) = match &changes.encryption {
        Some((method, pw)) => (*method, pw.as_ref(), pw.is_some() && method.is_encrypted()),
        None => (record.encryption, None, false),
    };
    let reencrypt = encryption != record.encryption || rekey;

    let transcode =
        changes.needs_data() && (changes.source().is_some() || recompress || reencrypt);
    let kind = if transcode {
        let input_data = match changes.source() {
            Some(source) => Input::Source(source),
            None => Input::Stored(entry),
        };
        PlanKind::Encode {
            input: input_data,
            base: Some(entry),
            compression,
            level,
            encryption,
            password: resolve_password(index, encryption, password, input.crypto)?,
        }
    } else {
        PlanKind::Copy { entry }
    };

    Ok(Planned {
        index,
        name,
        comment,
        mtime,
        kind,
    })
}

fn plan_added<'a>(
    index: usize,
    changes: &'a EntryChanges,
    input: &CommitInput<'a>,
) -> Result<Planned<'a>> {
    let name = changes.name().map(<[u8]>::to_vec).unwrap_or_default();
    let source = changes.source().ok_or_else(|| {
        Error::InvalidArgument(format!("added entry {} has no data source", index))
    })?;
    let (compression, level) = changes
        .compression()
        .unwrap_or((CompressionMethod::Store, DEFAULT_LEVEL));
    let (encryption, password) = match &changes.encryption {
        Some((method, pw)) => (*method, pw.as_ref()),
        None => (EncryptionMethod::None, None),
    };

    Ok(Planned {
        index,
        name,
        comment: changes
            .comment()
            .flatten()
            .map(<[u8]>::to_vec)
            .unwrap_or_default(),
        mtime: Some(changes.mtime().unwrap_or_else(crate::timestamp::now)),
        kind: PlanKind::Encode {
            input: Input::Source(source),
            base: None,
            compression,
            level,
            encryption,
            password: resolve_password(index, encryption, password, input.crypto)?,
        },
    })
}

fn resolve_password<'a>(
    index: usize,
    encryption: EncryptionMethod,
    explicit: Option<&'a Password>,
    crypto: &'a CryptoContext,
) -> Result<Option<&'a Password>> {
    if !encryption.is_encrypted() {
        return Ok(None);
    }
    explicit
        .or_else(|| crypto.resolve(index))
        .map(Some)
        .ok_or(Error::NoPassword { entry_index: index })
}

fn require_origin<'o>(origin: &'o mut Option<&mut dyn ReadSeek>) -> Result<&'o mut dyn ReadSeek> {
    match origin {
        Some(src) => Ok(&mut **src),
        None => Err(Error::InvalidArgument(
            "archive data is not available for copying".into(),
        )),
    }
}

fn copy_entry<W: Write + Seek>(
    planned: &Planned<'_>,
    entry: &CatalogEntry,
    src: &mut dyn ReadSeek,
    out: &mut W,
    tracker: &mut ProgressTracker<'_>,
) -> Result<CentralDirectoryHeader> {
    let original = &entry.header;
    let data_offset = parser::data_offset(src, original)?;

    let mut header = original.clone();
    if header.name != planned.name {
        header.flags = (header.flags & !flags::UTF8) | utf8_flag(&planned.name);
        header.name = planned.name.clone();
    }
    header.comment = planned.comment.clone();
    if let Some(mtime) = planned.mtime {
        // the check byte of a traditional data-descriptor entry is keyed on
        // the DOS time, so only the extended timestamp moves
        if !keyed_on_time(entry) {
            header.modified = DosDateTime::from_epoch(mtime);
        }
        header.extra = timestamp_extra(&header.extra, mtime);
    }

    let uses_descriptor = header.flags & flags::DATA_DESCRIPTOR != 0;
    let local_offset = position(out)?;
    let local = LocalFileHeader {
        version_needed: header.version_needed,
        flags: header.flags,
        method: header.method,
        modified: header.modified,
        crc32: if uses_descriptor { 0 } else { header.crc32 },
        compressed_size: if uses_descriptor { 0 } else { header.compressed_size },
        uncompressed_size: if uses_descriptor { 0 } else { header.uncompressed_size },
        name: header.name.clone(),
        extra: header.extra.clone(),
    };
    local.write(out)?;

    src.seek(SeekFrom::Start(data_offset))?;
    let mut stored = src.take(original.compressed_size as u64);
    let copied = pump(&mut stored, out, tracker, None)?;
    if copied != original.compressed_size as u64 {
        return Err(Error::corrupt(
            data_offset + copied,
            format!("entry {} data truncated", entry.record.index),
        ));
    }
    if uses_descriptor {
        write_data_descriptor(
            out,
            header.crc32,
            header.compressed_size,
            header.uncompressed_size,
        )?;
    }

    header.local_header_offset = to_u32(local_offset)?;
    header.disk_start = 0;
    Ok(header)
}

fn keyed_on_time(entry: &CatalogEntry) -> bool {
    entry.record.encryption == EncryptionMethod::Traditional
        && entry.header.flags & flags::DATA_DESCRIPTOR != 0
}

fn encode_entry<W: Write + Seek + Send>(
    planned: &Planned<'_>,
    input: &CommitInput<'_>,
    src: Option<&mut dyn ReadSeek>,
    out: &mut W,
    tracker: &mut ProgressTracker<'_>,
) -> Result<CentralDirectoryHeader> {
    let PlanKind::Encode {
        input: data,
        base,
        compression,
        level,
        encryption,
        password,
    } = &planned.kind
    else {
        return Err(Error::InvalidArgument("entry is not planned for encoding".into()));
    };

    let is_dir = is_dir_name(&planned.name) && matches!(data, Input::Source(EntrySource::Directory));
    let (compression, encryption) = if is_dir {
        if encryption.is_encrypted() {
            log::warn!(
                "Not encrypting directory entry {} ({})",
                planned.index,
                String::from_utf8_lossy(&planned.name)
            );
        }
        (CompressionMethod::Store, EncryptionMethod::None)
    } else {
        (*compression, *encryption)
    };
    compression.ensure_supported()?;
    encryption.ensure_supported()?;
    let level = if *level == DEFAULT_LEVEL {
        input.options.default_level
    } else {
        *level
    };

    let mtime = planned
        .mtime
        .or_else(|| base.map(|b| b.record.mtime))
        .unwrap_or_else(crate::timestamp::now);
    let modified = match (planned.mtime, base) {
        (None, Some(b)) => b.header.modified,
        _ => DosDateTime::from_epoch(mtime),
    };

    let traditional = encryption == EncryptionMethod::Traditional;
    let aes_strength = encryption.aes_strength();

    let mut general = utf8_flag(&planned.name) | codec::flag_bits(compression, level);
    if encryption.is_encrypted() {
        general |= flags::ENCRYPTED;
    }
    if traditional {
        general |= flags::DATA_DESCRIPTOR;
    }

    let base_extra = base.map(|b| b.header.extra.as_slice()).unwrap_or_default();
    let mut extra_block = extra::strip(
        base_extra,
        &[extra::WINZIP_AES, extra::EXTENDED_TIMESTAMP, extra::ZIP64],
    );
    extra::push(&mut extra_block, extra::EXTENDED_TIMESTAMP, &extra::mtime_body(mtime));
    let method_id = match aes_strength {
        Some(strength) => {
            let aes = AesExtra {
                vendor_version: AES_VENDOR_VERSION,
                strength,
                method: compression.id(),
            };
            extra::push(&mut extra_block, extra::WINZIP_AES, &aes.to_bytes());
            METHOD_AES
        }
        None => compression.id(),
    };
    let version_needed = if aes_strength.is_some() {
        version::AES
    } else if compression == CompressionMethod::Bzip2 {
        version::BZIP2
    } else {
        version::DEFAULT
    };

    let local_offset = position(out)?;
    let mut local = LocalFileHeader {
        version_needed,
        flags: general,
        method: method_id,
        modified,
        crc32: 0,
        compressed_size: 0,
        uncompressed_size: 0,
        name: planned.name.clone(),
        extra: extra_block,
    };
    local.write(out)?;
    let data_start = position(out)?;

    // plaintext input
    let mut expected = None;
    let mut reader: Box<dyn Read + Send + '_> = match data {
        Input::Source(source) => source.open()?,
        Input::Stored(entry) => {
            let src = src.ok_or_else(|| {
                Error::InvalidArgument("archive data is not available for decoding".into())
            })?;
            let data_offset = parser::data_offset(src, &entry.header)?;
            let plan = entry.decode_plan(data_offset, input.crypto.default_password());
            expected = Some((plan.size, plan.crc32));
            open_stored(entry, src, plan)?
        }
    };

    let check = zip_crypto::check_byte(0, modified.time, true);
    let mut crc = Crc32::new();
    let written = {
        let mut encryptor = crypto::build_encryptor(&mut *out, encryption, *password, check)
            .map_err(|e| attach_entry(e, planned.index, &planned.name))?;
        let mut encoder = codec::build_encoder(&mut encryptor, compression, level)?;
        let n = pump(&mut reader, &mut encoder, tracker, Some(&mut crc))?;
        encoder.finish()?;
        encryptor.finish()?;
        n
    };
    let data_end = position(out)?;
    let crc32 = crc.finalize();

    match (data, expected) {
        (Input::Stored(entry), Some((size, crc_expected))) => {
            if written != size {
                return Err(Error::corrupt(
                    data_start,
                    format!("entry {} decoded to {} of {} bytes", entry.record.index, written, size),
                ));
            }
            if let Some(exp) = crc_expected.filter(|&e| e != crc32) {
                return Err(Error::CrcMismatch {
                    entry_index: entry.record.index,
                    entry_name: Some(entry.record.name_lossy().into_owned()),
                    expected: exp,
                    actual: crc32,
                });
            }
        }
        (Input::Source(source), _) if written != source.len() => {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "source for entry {} yielded {} of {} bytes",
                    planned.index,
                    written,
                    source.len()
                ),
            )));
        }
        _ => {}
    }

    local.crc32 = crc32;
    local.compressed_size = to_u32(data_end - data_start)?;
    local.uncompressed_size = to_u32(written)?;
    if traditional {
        write_data_descriptor(out, local.crc32, local.compressed_size, local.uncompressed_size)?;
    } else {
        let resume = position(out)?;
        out.seek(SeekFrom::Start(local_offset + LocalFileHeader::CRC_FIELD_OFFSET))?;
        out.write_all(&local.crc32.to_le_bytes())?;
        out.write_all(&local.compressed_size.to_le_bytes())?;
        out.write_all(&local.uncompressed_size.to_le_bytes())?;
        out.seek(SeekFrom::Start(resume))?;
    }

    let (made_by, attrs, internal) = match base {
        Some(b) => (
            b.header.version_made_by,
            b.header.external_attributes,
            b.header.internal_attributes,
        ),
        None if is_dir => (version::MADE_BY, attributes::DIRECTORY, 0),
        None => (version::MADE_BY, attributes::FILE, 0),
    };

    Ok(CentralDirectoryHeader {
        version_made_by: made_by,
        version_needed,
        flags: local.flags,
        method: local.method,
        modified: local.modified,
        crc32: local.crc32,
        compressed_size: local.compressed_size,
        uncompressed_size: local.uncompressed_size,
        disk_start: 0,
        internal_attributes: internal,
        external_attributes: attrs,
        local_header_offset: to_u32(local_offset)?,
        name: local.name,
        extra: local.extra,
        comment: planned.comment.clone(),
    })
}

/// Opens the decoded plaintext of a stored entry.
fn open_stored<'s>(
    entry: &CatalogEntry,
    src: &'s mut dyn ReadSeek,
    plan: crate::read::DecodePlan<'_>,
) -> Result<Box<dyn Read + Send + 's>> {
    let index = entry.record.index;
    plan.compression.ensure_supported()?;
    plan.encryption.ensure_supported()?;
    if plan.encryption.is_encrypted() && plan.password.is_none() {
        return Err(Error::NoPassword { entry_index: index });
    }
    src.seek(SeekFrom::Start(plan.data_offset))?;
    let stored = src.take(plan.stored_len);
    let params = DecryptParams {
        stored_len: plan.stored_len,
        check_byte: plan.check_byte,
    };
    let plain = crypto::build_decryptor(stored, plan.encryption, plan.password, params)
        .map_err(|e| attach_entry(e, index, &entry.record.name))?;
    let decoder = codec::build_decoder(
        BufReader::with_capacity(READ_BUFFER_SIZE, plain),
        plan.compression,
        plan.size,
    )?;
    Ok(Box::new(decoder))
}

/// Copies `input` to `output` in working-buffer chunks, reporting progress.
fn pump<R, W>(
    input: &mut R,
    output: &mut W,
    tracker: &mut ProgressTracker<'_>,
    mut crc: Option<&mut Crc32>,
) -> Result<u64>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    let mut total = 0u64;
    loop {
        let n = match input.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                return Err(Error::corrupt(total, e.to_string()));
            }
            Err(e) => return Err(Error::Io(e)),
        };
        if let Some(crc) = crc.as_deref_mut() {
            crc.update(&buf[..n]);
        }
        output.write_all(&buf[..n])?;
        total += n as u64;
        tracker.advance(n as u64);
    }
    Ok(total)
}

fn timestamp_extra(extra_block: &[u8], mtime: u32) -> Vec<u8> {
    let mut out = extra::strip(extra_block, &[extra::EXTENDED_TIMESTAMP]);
    extra::push(&mut out, extra::EXTENDED_TIMESTAMP, &extra::mtime_body(mtime));
    out
}

fn utf8_flag(name: &[u8]) -> u16 {
    if !name.is_ascii() && std::str::from_utf8(name).is_ok() {
        flags::UTF8
    } else {
        0
    }
}

fn position<S: Seek + ?Sized>(s: &mut S) -> Result<u64> {
    Ok(s.stream_position()?)
}

fn to_u32(value: u64) -> Result<u32> {
    u32::try_from(value).map_err(|_| Error::UnsupportedFeature {
        feature: "archives larger than 4 GiB (ZIP64)",
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::progress_fn;
    use std::io::Cursor;

    fn commit(
        catalog: &EntryCatalog,
        journal: &MutationJournal,
        crypto: &CryptoContext,
        origin: Option<&mut dyn ReadSeek>,
    ) -> Result<(Vec<u8>, CommitResult)> {
        let options = CommitOptions::default();
        let input = CommitInput {
            catalog,
            journal,
            crypto,
            comment: b"",
            options: &options,
        };
        let mut out = Cursor::new(Vec::new());
        let result = write_archive(&input, origin, &mut out, None)?;
        Ok((out.into_inner(), result))
    }

    fn read_all(archive: &[u8], index: usize, password: Option<&Password>) -> Vec<u8> {
        let mut cursor = Cursor::new(archive.to_vec());
        let catalog = EntryCatalog::load(&mut cursor, true).unwrap();
        let entry = catalog.entry(index).unwrap();
        let offset = parser::data_offset(&mut cursor, &entry.header).unwrap();
        let plan = entry.decode_plan(offset, password);
        let mut reader = open_stored(entry, &mut cursor, plan).unwrap();
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        out
    }

    fn fresh(entries: &[(&[u8], &[u8], CompressionMethod)]) -> Vec<u8> {
        let catalog = EntryCatalog::empty();
        let mut journal = MutationJournal::new(0);
        for (name, data, method) in entries {
            journal
                .add(name, EntrySource::Buffer(data.to_vec()), *method)
                .unwrap();
        }
        commit(&catalog, &journal, &CryptoContext::new(), None)
            .unwrap()
            .0
    }

    #[test]
    fn test_new_archive_roundtrip() {
        let data = b"hello hello hello hello".repeat(20);
        let archive = fresh(&[
            (b"a.txt", &data, CompressionMethod::Store),
            (b"b.txt", &data, CompressionMethod::default()),
        ]);
        let mut cursor = Cursor::new(archive.clone());
        let catalog = EntryCatalog::load(&mut cursor, true).unwrap();
        assert_eq!(catalog.count(), 2);
        let record = catalog.stat(1).unwrap();
        assert_eq!(record.crc32, Crc32::compute(&data));
        assert_eq!(record.size, data.len() as u64);
        assert_eq!(read_all(&archive, 0, None), data);
        assert_eq!(read_all(&archive, 1, None), data);
    }

    #[test]
    fn test_rename_and_remove_copy_raw() {
        let archive = fresh(&[
            (b"keep", b"one", CompressionMethod::Store),
            (b"drop", b"two", CompressionMethod::Store),
        ]);
        let mut cursor = Cursor::new(archive);
        let catalog = EntryCatalog::load(&mut cursor, false).unwrap();
        let mut journal = MutationJournal::new(catalog.count());
        journal.remove(1).unwrap();
        journal.rename(0, b"kept").unwrap();

        let (out, result) =
            commit(&catalog, &journal, &CryptoContext::new(), Some(&mut cursor)).unwrap();
        assert_eq!(result.entries_written, 1);
        assert_eq!(result.entries_copied, 1);
        assert_eq!(result.entries_removed, 1);

        let mut reread = Cursor::new(out.clone());
        let catalog = EntryCatalog::load(&mut reread, true).unwrap();
        assert_eq!(catalog.count(), 1);
        assert_eq!(catalog.locate(b"kept").unwrap(), 0);
        assert_eq!(read_all(&out, 0, None), b"one");
    }

    #[test]
    fn test_encrypt_existing_entry() {
        let archive = fresh(&[(b"plain", b"secret data", CompressionMethod::Store)]);
        let mut cursor = Cursor::new(archive);
        let catalog = EntryCatalog::load(&mut cursor, false).unwrap();
        let mut journal = MutationJournal::new(1);
        let password = Password::from("pw");
        journal
            .set_encryption(0, EncryptionMethod::Traditional, Some(password.clone()))
            .unwrap();

        let (out, result) =
            commit(&catalog, &journal, &CryptoContext::new(), Some(&mut cursor)).unwrap();
        assert_eq!(result.entries_recoded, 1);

        let mut reread = Cursor::new(out.clone());
        let catalog = EntryCatalog::load(&mut reread, true).unwrap();
        assert_eq!(catalog.stat(0).unwrap().encryption, EncryptionMethod::Traditional);
        assert_eq!(read_all(&out, 0, Some(&password)), b"secret data");
    }

    #[cfg(feature = "aes")]
    #[test]
    fn test_aes_entry_records_real_method() {
        let catalog = EntryCatalog::empty();
        let mut journal = MutationJournal::new(0);
        let idx = journal
            .add(
                b"x.bin",
                EntrySource::Buffer(b"aes payload".repeat(30)),
                CompressionMethod::default(),
            )
            .unwrap();
        journal
            .set_encryption(idx, EncryptionMethod::Aes256, Some(Password::from("k")))
            .unwrap();
        let (out, _) = commit(&catalog, &journal, &CryptoContext::new(), None).unwrap();

        let mut reread = Cursor::new(out.clone());
        let catalog = EntryCatalog::load(&mut reread, true).unwrap();
        let record = catalog.stat(0).unwrap();
        assert_eq!(record.encryption, EncryptionMethod::Aes256);
        assert_eq!(record.compression, CompressionMethod::default());
        assert_eq!(
            read_all(&out, 0, Some(&Password::from("k"))),
            b"aes payload".repeat(30)
        );
    }

    #[test]
    fn test_missing_password_fails_before_writing() {
        let catalog = EntryCatalog::empty();
        let mut journal = MutationJournal::new(0);
        let idx = journal
            .add(b"x", EntrySource::Buffer(b"x".to_vec()), CompressionMethod::Store)
            .unwrap();
        journal
            .set_encryption(idx, EncryptionMethod::Traditional, None)
            .unwrap();
        let err = commit(&catalog, &journal, &CryptoContext::new(), None).unwrap_err();
        assert!(matches!(err, Error::NoPassword { entry_index: 0 }));
    }

    #[test]
    fn test_default_password_applies() {
        let catalog = EntryCatalog::empty();
        let mut journal = MutationJournal::new(0);
        let idx = journal
            .add(b"x", EntrySource::Buffer(b"xyz".to_vec()), CompressionMethod::Store)
            .unwrap();
        journal
            .set_encryption(idx, EncryptionMethod::Traditional, None)
            .unwrap();
        let mut crypto = CryptoContext::new();
        crypto.set_default_password(b"default");
        let (out, _) = commit(&catalog, &journal, &crypto, None).unwrap();
        assert_eq!(read_all(&out, 0, Some(&Password::from("default"))), b"xyz");
    }

    #[test]
    fn test_directory_and_empty_archive() {
        let archive = fresh(&[(b"dir/", b"", CompressionMethod::Deflate)]);
        let mut cursor = Cursor::new(archive);
        let catalog = EntryCatalog::load(&mut cursor, true).unwrap();
        let record = catalog.stat(0).unwrap();
        assert!(record.is_dir());
        assert_eq!(record.compression, CompressionMethod::Store);

        let empty = fresh(&[]);
        assert_eq!(empty.len() as u64, crate::format::END_OF_CENTRAL_DIR_SIZE);
        let catalog = EntryCatalog::load(&mut Cursor::new(empty), true).unwrap();
        assert_eq!(catalog.count(), 0);
    }

    /// Accepts `limit` bytes, then fails every write.
    struct FailAfter {
        inner: Cursor<Vec<u8>>,
        limit: u64,
    }

    impl Write for FailAfter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let room = self.limit.saturating_sub(self.inner.position());
            if room == 0 {
                return Err(io::Error::other("disk full"));
            }
            let n = buf.len().min(room as usize);
            self.inner.write(&buf[..n])
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Seek for FailAfter {
        fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
            self.inner.seek(pos)
        }
    }

    #[test]
    fn test_sink_failure_aborts_commit() {
        let data = vec![7u8; READ_BUFFER_SIZE * 4];
        let archive = fresh(&[(b"big", &data, CompressionMethod::Store)]);
        let mut cursor = Cursor::new(archive);
        let catalog = EntryCatalog::load(&mut cursor, false).unwrap();
        let mut journal = MutationJournal::new(1);
        journal.rename(0, b"renamed").unwrap();
        journal
            .add(b"more", EntrySource::Buffer(data.clone()), CompressionMethod::Store)
            .unwrap();
        let options = CommitOptions::default();
        let crypto = CryptoContext::new();
        let input = CommitInput {
            catalog: &catalog,
            journal: &journal,
            crypto: &crypto,
            comment: b"",
            options: &options,
        };

        // inside the first header, inside the copied body, inside the encoded body
        for limit in [10, 1_000, data.len() as u64 + 1_000] {
            let mut out = FailAfter {
                inner: Cursor::new(Vec::new()),
                limit,
            };
            let result = write_archive(&input, Some(&mut cursor), &mut out, None);
            assert!(matches!(result, Err(Error::Io(_))), "limit {}: {:?}", limit, result);
            assert!(out.inner.get_ref().len() as u64 <= limit);
        }
    }

    #[test]
    fn test_progress_reaches_100() {
        let catalog = EntryCatalog::empty();
        let mut journal = MutationJournal::new(0);
        journal
            .add(
                b"big",
                EntrySource::Buffer(vec![1u8; READ_BUFFER_SIZE * 10]),
                CompressionMethod::Store,
            )
            .unwrap();
        let options = CommitOptions::default();
        let crypto = CryptoContext::new();
        let input = CommitInput {
            catalog: &catalog,
            journal: &journal,
            crypto: &crypto,
            comment: b"archive comment",
            options: &options,
        };
        let mut seen = Vec::new();
        let mut sink = progress_fn(|p| seen.push(p));
        let mut out = Cursor::new(Vec::new());
        let result = write_archive(&input, None, &mut out, Some(&mut sink)).unwrap();
        drop(sink);
        assert_eq!(seen.first(), Some(&0));
        assert_eq!(seen.last(), Some(&100));
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(result.entries_written, 1);

        let catalog = EntryCatalog::load(&mut Cursor::new(out.into_inner()), true).unwrap();
        assert_eq!(catalog.comment(), b"archive comment");
    }
}
