//! BZip2 codec (method 12).

use std::io::{self, Read, Write};

use bzip2::Compression;
use bzip2::read::BzDecoder;
use bzip2::write::BzEncoder;

use super::{CompressionMethod, Decoder, Encoder};

/// BZip2 decoder.
pub struct Bzip2Decoder<R> {
    inner: BzDecoder<R>,
}

impl<R> std::fmt::Debug for Bzip2Decoder<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bzip2Decoder").finish_non_exhaustive()
    }
}

impl<R: Read + Send> Bzip2Decoder<R> {
    /// Creates a decoder reading a BZip2 stream from `input`.
    pub fn new(input: R) -> Self {
        Self {
            inner: BzDecoder::new(input),
        }
    }
}

impl<R: Read + Send> Read for Bzip2Decoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<R: Read + Send> Decoder for Bzip2Decoder<R> {
    fn method(&self) -> CompressionMethod {
        CompressionMethod::Bzip2
    }
}

/// BZip2 encoder options.
#[derive(Debug, Clone)]
pub struct Bzip2EncoderOptions {
    /// Block size in units of 100 KiB (1-9, default 9).
    pub level: u32,
}

impl Default for Bzip2EncoderOptions {
    fn default() -> Self {
        Self { level: 9 }
    }
}

impl Bzip2EncoderOptions {
    /// Creates options with the given level, clamped to 1-9.
    pub fn with_level(level: u32) -> Self {
        Self {
            level: level.clamp(1, 9),
        }
    }
}

/// BZip2 encoder.
pub struct Bzip2Encoder<W: Write> {
    inner: BzEncoder<W>,
}

impl<W: Write> std::fmt::Debug for Bzip2Encoder<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bzip2Encoder").finish_non_exhaustive()
    }
}

impl<W: Write + Send> Bzip2Encoder<W> {
    /// Creates an encoder with the given options.
    pub fn new(output: W, options: &Bzip2EncoderOptions) -> Self {
        Self {
            inner: BzEncoder::new(output, Compression::new(options.level)),
        }
    }
}

impl<W: Write + Send> Write for Bzip2Encoder<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<W: Write + Send> Encoder for Bzip2Encoder<W> {
    fn method(&self) -> CompressionMethod {
        CompressionMethod::Bzip2
    }

    fn finish(self: Box<Self>) -> io::Result<()> {
        let mut output = self.inner.finish()?;
        output.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bzip2_stream_magic() {
        let mut compressed = Vec::new();
        let mut encoder = Box::new(Bzip2Encoder::new(
            &mut compressed,
            &Bzip2EncoderOptions::with_level(1),
        ));
        encoder.write_all(b"entry payload").unwrap();
        encoder.finish().unwrap();

        // "BZh" followed by the block size digit
        assert_eq!(&compressed[..4], b"BZh1");

        let mut decoder = Bzip2Decoder::new(&compressed[..]);
        let mut out = Vec::new();
        decoder.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"entry payload");
    }

    #[test]
    fn test_bzip2_options_clamp() {
        assert_eq!(Bzip2EncoderOptions::default().level, 9);
        assert_eq!(Bzip2EncoderOptions::with_level(0).level, 1);
        assert_eq!(Bzip2EncoderOptions::with_level(100).level, 9);
    }

    #[test]
    fn test_bzip2_truncated_stream_errors() {
        let mut compressed = Vec::new();
        let mut encoder = Box::new(Bzip2Encoder::new(
            &mut compressed,
            &Bzip2EncoderOptions::default(),
        ));
        encoder.write_all(&b"x".repeat(10_000)).unwrap();
        encoder.finish().unwrap();
        compressed.truncate(compressed.len() / 2);

        let mut decoder = Bzip2Decoder::new(&compressed[..]);
        let mut out = Vec::new();
        assert!(decoder.read_to_end(&mut out).is_err());
        assert_eq!(decoder.method(), CompressionMethod::Bzip2);
    }
}
