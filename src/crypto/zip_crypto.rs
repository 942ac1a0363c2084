//! Traditional PKWARE encryption ("ZipCrypto").
//!
//! A byte-oriented stream cipher keyed by three 32-bit registers that are
//! stirred with the password and then with every plaintext byte. Each
//! encrypted entry starts with a 12-byte header whose last byte checks the
//! password: the high byte of the CRC-32, or of the DOS time when the entry
//! uses a data descriptor.
//!
//! The scheme is cryptographically weak; it is supported for compatibility.

use std::io::{self, Read, Write};

use super::Password;
use crate::{Error, Result};

/// Length of the encryption header that precedes the data.
pub const HEADER_LEN: usize = 12;

const CRC_TABLE: [u32; 256] = {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut c = i as u32;
        let mut k = 0;
        while k < 8 {
            c = if c & 1 != 0 { 0xEDB8_8320 ^ (c >> 1) } else { c >> 1 };
            k += 1;
        }
        table[i] = c;
        i += 1;
    }
    table
};

fn crc_step(crc: u32, byte: u8) -> u32 {
    (crc >> 8) ^ CRC_TABLE[((crc ^ byte as u32) & 0xFF) as usize]
}

#[derive(Clone)]
struct Keys {
    k0: u32,
    k1: u32,
    k2: u32,
}

impl Keys {
    fn new(password: &Password) -> Self {
        let mut keys = Self {
            k0: 0x1234_5678,
            k1: 0x2345_6789,
            k2: 0x3456_7890,
        };
        for &b in password.as_bytes() {
            keys.update(b);
        }
        keys
    }

    fn update(&mut self, plain: u8) {
        self.k0 = crc_step(self.k0, plain);
        self.k1 = self
            .k1
            .wrapping_add(self.k0 & 0xFF)
            .wrapping_mul(134_775_813)
            .wrapping_add(1);
        self.k2 = crc_step(self.k2, (self.k1 >> 24) as u8);
    }

    fn stream_byte(&self) -> u8 {
        let t = (self.k2 | 2) as u16;
        (t.wrapping_mul(t ^ 1) >> 8) as u8
    }

    fn decrypt(&mut self, buf: &mut [u8]) {
        for b in buf {
            let plain = *b ^ self.stream_byte();
            self.update(plain);
            *b = plain;
        }
    }

    fn encrypt(&mut self, buf: &mut [u8]) {
        for b in buf {
            let cipher = *b ^ self.stream_byte();
            self.update(*b);
            *b = cipher;
        }
    }
}

impl Drop for Keys {
    fn drop(&mut self) {
        self.k0 = 0;
        self.k1 = 0;
        self.k2 = 0;
    }
}

/// Returns the password check byte for an entry.
pub fn check_byte(crc32: u32, dos_time: u16, uses_data_descriptor: bool) -> u8 {
    if uses_data_descriptor {
        (dos_time >> 8) as u8
    } else {
        (crc32 >> 24) as u8
    }
}

/// Decrypting reader.
pub struct ZipCryptoReader<R> {
    inner: R,
    keys: Keys,
}

impl<R: Read> ZipCryptoReader<R> {
    /// Consumes the encryption header from `inner` and checks the password.
    ///
    /// Fails with [`Error::WrongPassword`] when the check byte differs. One
    /// wrong password in 256 passes this check; the CRC catches the rest.
    pub fn new(mut inner: R, password: &Password, expected_check: u8) -> Result<Self> {
        let mut keys = Keys::new(password);
        let mut header = [0u8; HEADER_LEN];
        inner
            .read_exact(&mut header)
            .map_err(|_| Error::corrupt(0, "truncated encryption header"))?;
        keys.decrypt(&mut header);
        if header[HEADER_LEN - 1] != expected_check {
            return Err(Error::WrongPassword {
                entry_index: None,
                entry_name: None,
            });
        }
        Ok(Self { inner, keys })
    }
}

impl<R: Read> Read for ZipCryptoReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.keys.decrypt(&mut buf[..n]);
        Ok(n)
    }
}

/// Encrypting writer.
pub struct ZipCryptoWriter<W> {
    inner: W,
    keys: Keys,
    scratch: Vec<u8>,
}

impl<W: Write> ZipCryptoWriter<W> {
    /// Writes a fresh encryption header to `inner`.
    pub fn new(mut inner: W, password: &Password, check: u8) -> io::Result<Self> {
        let mut keys = Keys::new(password);
        let mut header = [0u8; HEADER_LEN];
        getrandom::getrandom(&mut header[..HEADER_LEN - 1])
            .map_err(|e| io::Error::other(e.to_string()))?;
        header[HEADER_LEN - 1] = check;
        keys.encrypt(&mut header);
        inner.write_all(&header)?;
        Ok(Self {
            inner,
            keys,
            scratch: Vec::new(),
        })
    }

    /// Returns the inner writer.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for ZipCryptoWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.scratch.clear();
        self.scratch.extend_from_slice(buf);
        self.keys.encrypt(&mut self.scratch);
        // the key schedule has consumed all of buf, so it must all be written
        self.inner.write_all(&self.scratch)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn encrypt(data: &[u8], password: &Password, check: u8) -> Vec<u8> {
        let mut out = Vec::new();
        let mut writer = ZipCryptoWriter::new(&mut out, password, check).unwrap();
        writer.write_all(data).unwrap();
        out
    }

    #[test]
    fn test_roundtrip() {
        let password = Password::from("secret");
        let data = b"attack at dawn".repeat(50);
        let encrypted = encrypt(&data, &password, 0xAB);
        assert_eq!(encrypted.len(), data.len() + HEADER_LEN);
        assert_ne!(&encrypted[HEADER_LEN..], &data[..]);

        let mut reader = ZipCryptoReader::new(Cursor::new(encrypted), &password, 0xAB).unwrap();
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn test_wrong_password_detected_by_check_byte() {
        let encrypted = encrypt(b"data", &Password::from("right"), 0x5A);
        // "wrong" happens to decrypt the header to something else
        let result = ZipCryptoReader::new(Cursor::new(&encrypted), &Password::from("wrong"), 0x5A);
        match result {
            Err(Error::WrongPassword { .. }) => {}
            Ok(mut reader) => {
                // 1 in 256 chance: then the plaintext must differ
                let mut out = Vec::new();
                reader.read_to_end(&mut out).unwrap();
                assert_ne!(out, b"data");
            }
            Err(other) => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_check_byte_source() {
        assert_eq!(check_byte(0xAABB_CCDD, 0x1234, false), 0xAA);
        assert_eq!(check_byte(0xAABB_CCDD, 0x1234, true), 0x12);
    }

    #[test]
    fn test_known_keystream() {
        // Keys after the empty password are the documented initial values.
        let keys = Keys::new(&Password::new(b"".to_vec()));
        assert_eq!((keys.k0, keys.k1, keys.k2), (0x1234_5678, 0x2345_6789, 0x3456_7890));
        // one table step is a full CRC-32 of a single byte
        assert_eq!(!crc_step(0xFFFF_FFFF, b'a'), crate::checksum::Crc32::compute(b"a"));
    }

    #[test]
    fn test_truncated_header() {
        let err = ZipCryptoReader::new(Cursor::new(vec![0u8; 5]), &Password::from("x"), 0)
            .err()
            .unwrap();
        assert!(matches!(err, Error::Corrupt { .. }));
    }
}
