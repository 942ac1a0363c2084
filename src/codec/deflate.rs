//! Deflate codec (method 8).
//!
//! ZIP stores raw Deflate streams: no zlib header and no trailing Adler-32.
//! Integrity is covered by the entry's CRC-32 instead.

use std::io::{self, BufRead, Read, Write};

use flate2::Compression;
use flate2::bufread::DeflateDecoder as RawInflater;
use flate2::write::DeflateEncoder as RawDeflater;

use super::{CompressionMethod, Decoder, Encoder};

/// Deflate decoder over a buffered source.
pub struct DeflateDecoder<R> {
    inner: RawInflater<R>,
}

impl<R> std::fmt::Debug for DeflateDecoder<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeflateDecoder")
            .field("total_in", &self.inner.total_in())
            .field("total_out", &self.inner.total_out())
            .finish()
    }
}

impl<R: BufRead + Send> DeflateDecoder<R> {
    /// Creates a decoder reading a raw Deflate stream from `input`.
    pub fn new(input: R) -> Self {
        Self {
            inner: RawInflater::new(input),
        }
    }

    /// Compressed bytes consumed so far.
    pub fn total_in(&self) -> u64 {
        self.inner.total_in()
    }
}

impl<R: BufRead + Send> Read for DeflateDecoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<R: BufRead + Send> Decoder for DeflateDecoder<R> {
    fn method(&self) -> CompressionMethod {
        CompressionMethod::Deflate
    }
}

/// Deflate encoder options.
#[derive(Debug, Clone)]
pub struct DeflateEncoderOptions {
    /// Compression level (1-9, default 6).
    pub level: u32,
}

impl Default for DeflateEncoderOptions {
    fn default() -> Self {
        Self { level: 6 }
    }
}

impl DeflateEncoderOptions {
    /// Creates options with the given compression level, clamped to 1-9.
    pub fn with_level(level: u32) -> Self {
        Self {
            level: level.clamp(1, 9),
        }
    }

    /// The general purpose flag bits 1-2 that advertise this level.
    ///
    /// Purely informational for readers; APPNOTE 4.4.4.
    pub fn flag_bits(&self) -> u16 {
        match self.level {
            1 => 0b110,
            2 => 0b100,
            9 => 0b010,
            _ => 0,
        }
    }
}

/// Deflate encoder writing a raw stream into `W`.
pub struct DeflateEncoder<W: Write> {
    inner: RawDeflater<W>,
}

impl<W: Write> std::fmt::Debug for DeflateEncoder<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeflateEncoder")
            .field("total_in", &self.inner.total_in())
            .finish_non_exhaustive()
    }
}

impl<W: Write + Send> DeflateEncoder<W> {
    /// Creates an encoder with the given options.
    pub fn new(output: W, options: &DeflateEncoderOptions) -> Self {
        Self {
            inner: RawDeflater::new(output, Compression::new(options.level)),
        }
    }
}

impl<W: Write + Send> Write for DeflateEncoder<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<W: Write + Send> Encoder for DeflateEncoder<W> {
    fn method(&self) -> CompressionMethod {
        CompressionMethod::Deflate
    }

    fn finish(self: Box<Self>) -> io::Result<()> {
        let mut output = self.inner.finish()?;
        output.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compress(data: &[u8], level: u32) -> Vec<u8> {
        let mut compressed = Vec::new();
        let mut encoder = Box::new(DeflateEncoder::new(
            &mut compressed,
            &DeflateEncoderOptions::with_level(level),
        ));
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap();
        compressed
    }

    #[test]
    fn test_raw_stream_has_no_zlib_header() {
        let compressed = compress(b"aaaaaaaaaaaaaaaaaaaaaaaa", 6);
        // a zlib stream would start with 0x78
        assert_ne!(compressed[0], 0x78);

        let mut decoder = DeflateDecoder::new(&compressed[..]);
        let mut out = Vec::new();
        decoder.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"aaaaaaaaaaaaaaaaaaaaaaaa");
        assert_eq!(decoder.total_in(), compressed.len() as u64);
    }

    #[test]
    fn test_levels_compress_repetitive_input() {
        let data = b"The quick brown fox jumps over the lazy dog. ".repeat(200);
        for level in [1, 6, 9] {
            let compressed = compress(&data, level);
            assert!(compressed.len() < data.len() / 4, "level {}", level);
        }
    }

    #[test]
    fn test_options_clamp_and_flags() {
        assert_eq!(DeflateEncoderOptions::with_level(0).level, 1);
        assert_eq!(DeflateEncoderOptions::with_level(42).level, 9);
        assert_eq!(DeflateEncoderOptions::with_level(9).flag_bits(), 0b010);
        assert_eq!(DeflateEncoderOptions::default().flag_bits(), 0);
    }

    #[test]
    fn test_garbage_input_errors() {
        let garbage = [0xFFu8; 16];
        let mut decoder = DeflateDecoder::new(&garbage[..]);
        let mut out = Vec::new();
        assert!(decoder.read_to_end(&mut out).is_err());
        assert_eq!(decoder.method(), CompressionMethod::Deflate);
    }
}
