//! Compression codec infrastructure for ZIP entries.
//!
//! This module provides the abstraction layer over the compression methods a
//! ZIP entry may use. Store is always available; Deflate and BZip2 are backed
//! by `flate2` and `bzip2` behind the `deflate` and `bzip2` features. Any other
//! method id is carried through the catalog but cannot be decoded or encoded.

#[cfg(feature = "deflate")]
pub mod deflate;

#[cfg(feature = "bzip2")]
pub mod bzip2;

mod copy;

use std::io::{self, BufRead, Read, Write};

use crate::{Error, MethodKind, Result};

/// A decoder that reads compressed data and produces uncompressed output.
pub trait Decoder: Read + Send {
    /// Returns the method this decoder implements.
    fn method(&self) -> CompressionMethod;
}

/// An encoder that takes uncompressed data and produces compressed output.
pub trait Encoder: Write + Send {
    /// Returns the method this encoder implements.
    fn method(&self) -> CompressionMethod;

    /// Finishes encoding and flushes any remaining data.
    fn finish(self: Box<Self>) -> io::Result<()>;
}

pub use copy::{CopyDecoder, CopyEncoder};

#[cfg(feature = "deflate")]
pub use deflate::{DeflateDecoder, DeflateEncoder, DeflateEncoderOptions};

#[cfg(feature = "bzip2")]
pub use bzip2::{Bzip2Decoder, Bzip2Encoder, Bzip2EncoderOptions};

/// Method ids for compression algorithms, as stored in ZIP headers.
pub mod method {
    /// Stored (no compression).
    pub const STORE: u16 = 0;
    /// Deflate.
    pub const DEFLATE: u16 = 8;
    /// BZip2.
    pub const BZIP2: u16 = 12;
}

/// Compression level meaning "the codec's own default".
pub const DEFAULT_LEVEL: u32 = 0;

/// The compression method of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompressionMethod {
    /// No compression.
    Store,
    /// Deflate (RFC 1951).
    Deflate,
    /// BZip2.
    Bzip2,
    /// A method id this crate recognizes only as a number.
    Other(u16),
}

impl CompressionMethod {
    /// Returns the method id stored in ZIP headers.
    pub fn id(self) -> u16 {
        match self {
            Self::Store => method::STORE,
            Self::Deflate => method::DEFLATE,
            Self::Bzip2 => method::BZIP2,
            Self::Other(id) => id,
        }
    }

    /// Maps a stored method id to a method.
    pub fn from_id(id: u16) -> Self {
        match id {
            method::STORE => Self::Store,
            method::DEFLATE => Self::Deflate,
            method::BZIP2 => Self::Bzip2,
            other => Self::Other(other),
        }
    }

    /// Returns true if a codec for this method is compiled in.
    pub fn is_supported(self) -> bool {
        match self {
            Self::Store => true,
            Self::Deflate => cfg!(feature = "deflate"),
            Self::Bzip2 => cfg!(feature = "bzip2"),
            Self::Other(_) => false,
        }
    }

    /// Fails with [`Error::UnsupportedMethod`] if no codec is compiled in.
    pub fn ensure_supported(self) -> Result<()> {
        if self.is_supported() {
            Ok(())
        } else {
            Err(Error::UnsupportedMethod {
                kind: MethodKind::Compression,
                method_id: self.id(),
            })
        }
    }

    /// Returns a short human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Store => "Store",
            Self::Deflate => "Deflate",
            Self::Bzip2 => "BZip2",
            Self::Other(_) => "Unknown",
        }
    }
}

impl Default for CompressionMethod {
    /// Deflate when compiled in, otherwise Store.
    fn default() -> Self {
        if cfg!(feature = "deflate") {
            Self::Deflate
        } else {
            Self::Store
        }
    }
}

impl std::fmt::Display for CompressionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Other(id) => write!(f, "method {}", id),
            known => f.write_str(known.name()),
        }
    }
}

/// General purpose flag bits advertising the compression level, if any.
pub fn flag_bits(method: CompressionMethod, level: u32) -> u16 {
    if level == DEFAULT_LEVEL {
        return 0;
    }
    match method {
        #[cfg(feature = "deflate")]
        CompressionMethod::Deflate => DeflateEncoderOptions::with_level(level).flag_bits(),
        _ => 0,
    }
}

/// Builds a decoder over an entry's (already decrypted) stored bytes.
///
/// `size` is the expected uncompressed length; Store uses it to stop at the
/// entry boundary.
pub fn build_decoder<'a, R>(
    input: R,
    method: CompressionMethod,
    size: u64,
) -> Result<Box<dyn Decoder + 'a>>
where
    R: BufRead + Send + 'a,
{
    match method {
        CompressionMethod::Store => Ok(Box::new(CopyDecoder::new(input, size))),
        #[cfg(feature = "deflate")]
        CompressionMethod::Deflate => Ok(Box::new(DeflateDecoder::new(input))),
        #[cfg(feature = "bzip2")]
        CompressionMethod::Bzip2 => Ok(Box::new(Bzip2Decoder::new(input))),
        other => Err(Error::UnsupportedMethod {
            kind: MethodKind::Compression,
            method_id: other.id(),
        }),
    }
}

/// Builds an encoder writing compressed bytes to `output`.
///
/// `level` is 1 (fastest) to 9 (best); [`DEFAULT_LEVEL`] selects the codec's
/// default. Store ignores it.
pub fn build_encoder<'a, W>(
    output: W,
    method: CompressionMethod,
    level: u32,
) -> Result<Box<dyn Encoder + 'a>>
where
    W: Write + Send + 'a,
{
    match method {
        CompressionMethod::Store => Ok(Box::new(CopyEncoder::new(output))),
        #[cfg(feature = "deflate")]
        CompressionMethod::Deflate => {
            let options = if level == DEFAULT_LEVEL {
                DeflateEncoderOptions::default()
            } else {
                DeflateEncoderOptions::with_level(level)
            };
            Ok(Box::new(DeflateEncoder::new(output, &options)))
        }
        #[cfg(feature = "bzip2")]
        CompressionMethod::Bzip2 => {
            let options = if level == DEFAULT_LEVEL {
                Bzip2EncoderOptions::default()
            } else {
                Bzip2EncoderOptions::with_level(level)
            };
            Ok(Box::new(Bzip2Encoder::new(output, &options)))
        }
        other => Err(Error::UnsupportedMethod {
            kind: MethodKind::Compression,
            method_id: other.id(),
        }),
    }
}
