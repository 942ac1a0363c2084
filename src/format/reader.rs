//! Low-level binary reading utilities for ZIP format parsing.
//!
//! ZIP stores every integer little-endian. Headers are parsed from fixed-size
//! byte blocks with [`FieldCursor`] so that a single `read_exact` fetches the
//! whole fixed part and truncation is detected once.

use std::io::{self, Read, Write};

/// A forward-only cursor over a fixed-size header block.
pub struct FieldCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> FieldCursor<'a> {
    /// Creates a cursor at the start of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Reads a little-endian u16.
    ///
    /// Panics if the block is too short; callers size blocks from the
    /// format's fixed header lengths.
    pub fn u16(&mut self) -> u16 {
        let v = u16::from_le_bytes([self.data[self.pos], self.data[self.pos + 1]]);
        self.pos += 2;
        v
    }

    /// Reads a little-endian u32.
    pub fn u32(&mut self) -> u32 {
        let bytes = [
            self.data[self.pos],
            self.data[self.pos + 1],
            self.data[self.pos + 2],
            self.data[self.pos + 3],
        ];
        self.pos += 4;
        u32::from_le_bytes(bytes)
    }

    /// Returns the number of bytes consumed so far.
    pub fn position(&self) -> usize {
        self.pos
    }
}

/// Reads a little-endian u32 directly from a reader.
pub fn read_u32_le<R: Read + ?Sized>(r: &mut R) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

/// Reads exactly `len` bytes into a new vector.
///
/// The buffer is grown fallibly; a length taken from a damaged header must
/// not abort the process.
pub fn read_vec<R: Read + ?Sized>(r: &mut R, len: usize) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|_| io::Error::new(io::ErrorKind::OutOfMemory, "header field too large"))?;
    buf.resize(len, 0);
    r.read_exact(&mut buf)?;
    Ok(buf)
}

/// Writes a little-endian u16.
pub fn write_u16_le<W: Write>(w: &mut W, value: u16) -> io::Result<()> {
    w.write_all(&value.to_le_bytes())
}

/// Writes a little-endian u32.
pub fn write_u32_le<W: Write>(w: &mut W, value: u32) -> io::Result<()> {
    w.write_all(&value.to_le_bytes())
}
