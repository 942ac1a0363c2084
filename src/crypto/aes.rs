//! WinZip AES encryption (AE-1 / AE-2).
//!
//! Layout of an encrypted entry's stored data:
//!
//! ```text
//! salt (8/12/16) | verifier (2) | ciphertext | HMAC-SHA1 (first 10 bytes)
//! ```
//!
//! Keys come from PBKDF2-HMAC-SHA1 over the password and salt with 1000
//! iterations, producing the AES key, the HMAC key and the verifier back to
//! back. Data is encrypted with AES in CTR mode using a little-endian block
//! counter starting at 1. The HMAC authenticates the ciphertext.

use std::io::{self, Read, Write};

use aes::cipher::{BlockEncrypt, KeyInit};
use aes::{Aes128, Aes192, Aes256, Block};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use zeroize::Zeroizing;

use super::Password;
use crate::{Error, Result};

type HmacSha1 = Hmac<Sha1>;

/// PBKDF2 iteration count fixed by the WinZip format.
pub const PBKDF2_ITERATIONS: u32 = 1000;

/// Length of the stored password verifier.
pub const VERIFIER_LEN: usize = 2;

/// Length of the truncated HMAC-SHA1 authentication code.
pub const AUTH_CODE_LEN: usize = 10;

/// AES key strength, as stored in the AES extra field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AesStrength {
    /// AES-128.
    Aes128,
    /// AES-192.
    Aes192,
    /// AES-256.
    Aes256,
}

impl AesStrength {
    /// Parses the extra field strength byte.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Aes128),
            2 => Some(Self::Aes192),
            3 => Some(Self::Aes256),
            _ => None,
        }
    }

    /// The extra field strength byte.
    pub fn code(self) -> u8 {
        match self {
            Self::Aes128 => 1,
            Self::Aes192 => 2,
            Self::Aes256 => 3,
        }
    }

    /// AES key length in bytes.
    pub fn key_len(self) -> usize {
        match self {
            Self::Aes128 => 16,
            Self::Aes192 => 24,
            Self::Aes256 => 32,
        }
    }

    /// Salt length in bytes (half the key length).
    pub fn salt_len(self) -> usize {
        self.key_len() / 2
    }

    /// Bytes the cipher adds around the ciphertext.
    pub fn overhead(self) -> u64 {
        (self.salt_len() + VERIFIER_LEN + AUTH_CODE_LEN) as u64
    }
}

struct DerivedKeys {
    material: Zeroizing<Vec<u8>>,
    key_len: usize,
    strength: AesStrength,
}

impl DerivedKeys {
    fn derive(password: &Password, salt: &[u8], strength: AesStrength) -> Self {
        let key_len = strength.key_len();
        let mut material = Zeroizing::new(vec![0u8; 2 * key_len + VERIFIER_LEN]);
        pbkdf2::pbkdf2_hmac::<Sha1>(password.as_bytes(), salt, PBKDF2_ITERATIONS, &mut material);
        Self {
            material,
            key_len,
            strength,
        }
    }

    fn encryption_key(&self) -> &[u8] {
        &self.material[..self.key_len]
    }

    fn mac_key(&self) -> &[u8] {
        &self.material[self.key_len..2 * self.key_len]
    }

    fn verifier(&self) -> [u8; VERIFIER_LEN] {
        let v = &self.material[2 * self.key_len..];
        [v[0], v[1]]
    }
}

enum BlockCipher {
    Aes128(Aes128),
    Aes192(Aes192),
    Aes256(Aes256),
}

impl BlockCipher {
    fn new(strength: AesStrength, key: &[u8]) -> Self {
        match strength {
            AesStrength::Aes128 => Self::Aes128(Aes128::new(key.into())),
            AesStrength::Aes192 => Self::Aes192(Aes192::new(key.into())),
            AesStrength::Aes256 => Self::Aes256(Aes256::new(key.into())),
        }
    }

    fn encrypt_block(&self, block: &mut Block) {
        match self {
            Self::Aes128(c) => c.encrypt_block(block),
            Self::Aes192(c) => c.encrypt_block(block),
            Self::Aes256(c) => c.encrypt_block(block),
        }
    }
}

/// AES-CTR keystream with WinZip's little-endian counter.
struct Keystream {
    cipher: BlockCipher,
    counter: u128,
    block: Block,
    used: usize,
}

impl Keystream {
    fn new(keys: &DerivedKeys) -> Self {
        Self {
            cipher: BlockCipher::new(keys.strength, keys.encryption_key()),
            counter: 0,
            block: Block::default(),
            used: 16,
        }
    }

    fn apply(&mut self, buf: &mut [u8]) {
        for b in buf {
            if self.used == 16 {
                self.counter = self.counter.wrapping_add(1);
                self.block = Block::from(self.counter.to_le_bytes());
                self.cipher.encrypt_block(&mut self.block);
                self.used = 0;
            }
            *b ^= self.block[self.used];
            self.used += 1;
        }
    }
}

fn new_mac(keys: &DerivedKeys) -> io::Result<HmacSha1> {
    <HmacSha1 as Mac>::new_from_slice(keys.mac_key())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "invalid HMAC key length"))
}

/// Decrypting reader over an entry's complete stored data.
pub struct AesReader<R> {
    inner: R,
    keystream: Keystream,
    mac: Option<HmacSha1>,
    remaining: u64,
}

impl<R: Read> AesReader<R> {
    /// Reads the salt and verifier and checks the password.
    ///
    /// `stored_len` is the entry's compressed size, which includes the salt,
    /// verifier and authentication code.
    pub fn new(
        mut inner: R,
        password: &Password,
        strength: AesStrength,
        stored_len: u64,
    ) -> Result<Self> {
        if stored_len < strength.overhead() {
            return Err(Error::corrupt(0, "AES entry shorter than its header"));
        }
        let mut salt = vec![0u8; strength.salt_len()];
        let mut verifier = [0u8; VERIFIER_LEN];
        inner
            .read_exact(&mut salt)
            .and_then(|_| inner.read_exact(&mut verifier))
            .map_err(|_| Error::corrupt(0, "truncated AES header"))?;

        let keys = DerivedKeys::derive(password, &salt, strength);
        if keys.verifier() != verifier {
            return Err(Error::WrongPassword {
                entry_index: None,
                entry_name: None,
            });
        }

        Ok(Self {
            inner,
            keystream: Keystream::new(&keys),
            mac: Some(new_mac(&keys)?),
            remaining: stored_len - strength.overhead(),
        })
    }

    fn verify_auth_code(&mut self) -> io::Result<()> {
        let Some(mac) = self.mac.take() else {
            return Ok(());
        };
        let mut code = [0u8; AUTH_CODE_LEN];
        self.inner.read_exact(&mut code)?;
        mac.verify_truncated_left(&code).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidData, "AES authentication code mismatch")
        })
    }
}

impl<R: Read> Read for AesReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 {
            self.verify_auth_code()?;
            return Ok(0);
        }
        let want = self.remaining.min(buf.len() as u64) as usize;
        let n = self.inner.read(&mut buf[..want])?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "AES ciphertext truncated",
            ));
        }
        if let Some(mac) = self.mac.as_mut() {
            mac.update(&buf[..n]);
        }
        self.keystream.apply(&mut buf[..n]);
        self.remaining -= n as u64;
        Ok(n)
    }
}

/// Encrypting writer. Call [`AesWriter::finish`] to append the
/// authentication code.
pub struct AesWriter<W> {
    inner: W,
    keystream: Keystream,
    mac: HmacSha1,
    scratch: Vec<u8>,
}

impl<W: Write> AesWriter<W> {
    /// Generates a salt and writes it with the verifier to `inner`.
    pub fn new(mut inner: W, password: &Password, strength: AesStrength) -> io::Result<Self> {
        let mut salt = vec![0u8; strength.salt_len()];
        getrandom::getrandom(&mut salt).map_err(|e| io::Error::other(e.to_string()))?;
        let keys = DerivedKeys::derive(password, &salt, strength);
        inner.write_all(&salt)?;
        inner.write_all(&keys.verifier())?;
        Ok(Self {
            inner,
            keystream: Keystream::new(&keys),
            mac: new_mac(&keys)?,
            scratch: Vec::new(),
        })
    }

    /// Writes the authentication code and returns the inner writer.
    pub fn finish(mut self) -> io::Result<W> {
        let code = self.mac.finalize().into_bytes();
        self.inner.write_all(&code[..AUTH_CODE_LEN])?;
        Ok(self.inner)
    }
}

impl<W: Write> Write for AesWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.scratch.clear();
        self.scratch.extend_from_slice(buf);
        self.keystream.apply(&mut self.scratch);
        self.mac.update(&self.scratch);
        self.inner.write_all(&self.scratch)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
