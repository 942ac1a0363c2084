//! Per-entry read streams.
//!
//! A stream composes, lazily and in this order: a bounded view of the
//! entry's stored bytes, the cipher, a read buffer, and the codec. Reads are
//! served through a fixed [`READ_BUFFER_SIZE`] working buffer, so a single
//! [`EntryStream::read`] never returns more than that; callers loop until an
//! empty result.

use std::io::{self, BufReader, Read, Seek, SeekFrom};

use crate::READ_BUFFER_SIZE;
use crate::checksum::Crc32;
use crate::codec::{self, CompressionMethod, Decoder};
use crate::crypto::{self, DecryptParams, EncryptionMethod, Password};
use crate::{Error, Result};

/// Any seekable byte source a stream can own.
pub trait ReadSeek: Read + Seek + Send {}

impl<T: Read + Seek + Send> ReadSeek for T {}

/// Identifies an open stream within its session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamId(pub(crate) usize);

impl StreamId {
    /// The numeric id.
    pub fn get(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for StreamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Everything needed to decode one stored entry.
#[derive(Debug)]
pub(crate) struct DecodePlan<'p> {
    pub(crate) data_offset: u64,
    pub(crate) stored_len: u64,
    pub(crate) compression: CompressionMethod,
    pub(crate) encryption: EncryptionMethod,
    pub(crate) password: Option<&'p Password>,
    pub(crate) check_byte: u8,
    pub(crate) size: u64,
    /// `None` when the archive does not store a usable CRC (AE-2).
    pub(crate) crc32: Option<u32>,
}

#[derive(Debug)]
enum StreamState {
    Open,
    Errored(Error),
}

/// An open read cursor over one entry's decoded bytes.
pub struct EntryStream {
    id: StreamId,
    index: usize,
    name: Vec<u8>,
    decoder: Box<dyn Decoder>,
    buffer: Box<[u8]>,
    crc: Crc32,
    produced: u64,
    size: u64,
    expected_crc: Option<u32>,
    eof: bool,
    state: StreamState,
}

impl std::fmt::Debug for EntryStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntryStream")
            .field("id", &self.id)
            .field("index", &self.index)
            .field("produced", &self.produced)
            .field("size", &self.size)
            .field("eof", &self.eof)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl EntryStream {
    /// Opens a stream over a stored entry of the origin archive.
    ///
    /// Method support is checked before any buffer is allocated. The cipher
    /// header is consumed here, so a wrong password fails the open.
    pub(crate) fn open_stored(
        id: StreamId,
        index: usize,
        name: &[u8],
        mut source: Box<dyn ReadSeek>,
        plan: DecodePlan<'_>,
    ) -> Result<Self> {
        plan.compression.ensure_supported()?;
        plan.encryption.ensure_supported()?;
        if plan.encryption.is_encrypted() && plan.password.is_none() {
            return Err(Error::NoPassword { entry_index: index });
        }

        source.seek(SeekFrom::Start(plan.data_offset))?;
        let stored = source.take(plan.stored_len);
        let params = DecryptParams {
            stored_len: plan.stored_len,
            check_byte: plan.check_byte,
        };
        let plain = crypto::build_decryptor(stored, plan.encryption, plan.password, params)
            .map_err(|e| attach_entry(e, index, name))?;
        let buffered = BufReader::with_capacity(READ_BUFFER_SIZE, plain);
        let decoder = codec::build_decoder(buffered, plan.compression, plan.size)?;

        Ok(Self::new(id, index, name, decoder, plan.size, plan.crc32))
    }

    /// Opens a stream over plaintext bytes of a known length.
    pub(crate) fn open_plain(
        id: StreamId,
        index: usize,
        name: &[u8],
        source: Box<dyn Read + Send>,
        size: u64,
    ) -> Self {
        let decoder = Box::new(codec::CopyDecoder::new(source, size));
        Self::new(id, index, name, decoder, size, None)
    }

    fn new(
        id: StreamId,
        index: usize,
        name: &[u8],
        decoder: Box<dyn Decoder>,
        size: u64,
        expected_crc: Option<u32>,
    ) -> Self {
        Self {
            id,
            index,
            name: name.to_vec(),
            decoder,
            buffer: vec![0u8; READ_BUFFER_SIZE].into_boxed_slice(),
            crc: Crc32::new(),
            produced: 0,
            size,
            expected_crc,
            eof: false,
            state: StreamState::Open,
        }
    }

    /// The stream id.
    pub fn id(&self) -> StreamId {
        self.id
    }

    /// The entry index this stream reads.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Decoded bytes returned so far.
    pub fn position(&self) -> u64 {
        self.produced
    }

    /// Returns true once end-of-data has been reached.
    pub fn is_eof(&self) -> bool {
        self.eof
    }

    /// Reads up to `max_bytes` decoded bytes.
    ///
    /// The result is shorter than requested only at end of data or when
    /// `max_bytes` exceeds the 8 KiB working buffer. An empty result means end
    /// of data. After any failure the stream is errored and every further
    /// read returns the same error.
    pub fn read(&mut self, max_bytes: usize) -> Result<Vec<u8>> {
        let n = self.fill(max_bytes.min(READ_BUFFER_SIZE))?;
        Ok(self.buffer[..n].to_vec())
    }

    /// Reads into `out`, with the same semantics as [`EntryStream::read`].
    pub fn read_into(&mut self, out: &mut [u8]) -> Result<usize> {
        let n = self.fill(out.len().min(READ_BUFFER_SIZE))?;
        out[..n].copy_from_slice(&self.buffer[..n]);
        Ok(n)
    }

    fn fill(&mut self, want: usize) -> Result<usize> {
        if let StreamState::Errored(e) = &self.state {
            return Err(e.duplicate());
        }
        match self.fill_inner(want) {
            Ok(n) => Ok(n),
            Err(e) => {
                log::debug!("Stream {} for entry {} failed: {}", self.id, self.index, e);
                let reported = e.duplicate();
                self.state = StreamState::Errored(e);
                Err(reported)
            }
        }
    }

    fn fill_inner(&mut self, want: usize) -> Result<usize> {
        let mut filled = 0;
        while filled < want && !self.eof {
            let n = match self.decoder.read(&mut self.buffer[filled..want]) {
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(self.decode_error(e)),
            };
            if n == 0 {
                self.eof = true;
                if self.produced + filled as u64 != self.size {
                    return Err(Error::corrupt(
                        self.produced + filled as u64,
                        format!(
                            "entry {} ended after {} of {} bytes",
                            self.index,
                            self.produced + filled as u64,
                            self.size
                        ),
                    ));
                }
                break;
            }
            filled += n;
            if self.produced + filled as u64 > self.size {
                return Err(Error::corrupt(
                    self.produced + filled as u64,
                    format!("entry {} is longer than its declared size", self.index),
                ));
            }
        }
        self.crc.update(&self.buffer[..filled]);
        self.produced += filled as u64;
        Ok(filled)
    }

    fn decode_error(&self, e: io::Error) -> Error {
        match e.kind() {
            io::ErrorKind::InvalidData | io::ErrorKind::InvalidInput => {
                Error::corrupt(self.produced, format!("entry {}: {}", self.index, e))
            }
            io::ErrorKind::UnexpectedEof => Error::corrupt(
                self.produced,
                format!("entry {} data truncated", self.index),
            ),
            _ => Error::Io(e),
        }
    }

    /// Finishes the stream.
    ///
    /// If end of data was reached, the CRC-32 of everything produced is
    /// compared with the directory's. A stream closed early, or one already
    /// errored, closes without a check.
    pub fn close(self) -> Result<()> {
        if matches!(self.state, StreamState::Errored(_)) || !self.eof {
            return Ok(());
        }
        let actual = self.crc.finalize();
        match self.expected_crc {
            Some(expected) if expected != actual => Err(Error::CrcMismatch {
                entry_index: self.index,
                entry_name: Some(String::from_utf8_lossy(&self.name).into_owned()),
                expected,
                actual,
            }),
            _ => Ok(()),
        }
    }
}

impl Read for EntryStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_into(buf).map_err(|e| match e {
            Error::Io(io) => io,
            other => io::Error::other(other),
        })
    }
}

/// Fills in the entry identity on password errors raised below the session.
pub(crate) fn attach_entry(e: Error, index: usize, name: &[u8]) -> Error {
    match e {
        Error::WrongPassword { .. } => Error::WrongPassword {
            entry_index: Some(index),
            entry_name: Some(String::from_utf8_lossy(name).into_owned()),
        },
        Error::NoPassword { .. } => Error::NoPassword { entry_index: index },
        Error::Corrupt { offset, reason } => Error::Corrupt {
            offset,
            reason: format!("entry {}: {}", index, reason),
        },
        other => other,
    }
}
