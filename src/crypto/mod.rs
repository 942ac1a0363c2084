//! Encryption support for ZIP entries.
//!
//! Two schemes are implemented:
//! - traditional PKWARE encryption ([`zip_crypto`]), always available
//! - WinZip AES-128/192/256 ([`aes`]), behind the `aes` feature
//!
//! Both are exposed through [`build_decryptor`] and [`build_encryptor`], which
//! wrap a byte stream given an [`EncryptionMethod`] and a [`Password`].
//! Passwords are resolved per entry by [`CryptoContext`].

#[cfg(feature = "aes")]
pub mod aes;
mod context;
mod password;
pub mod zip_crypto;

use std::io::{self, Read, Write};

pub use context::CryptoContext;
pub use password::Password;

use crate::{Error, MethodKind, Result};

/// Encryption method ids, as exposed to callers.
///
/// ZIP headers do not store these directly: traditional encryption is flag
/// bit 0, AES is method 99 plus an extra field.
pub mod method {
    /// Not encrypted.
    pub const NONE: u16 = 0x0000;
    /// Traditional PKWARE encryption.
    pub const TRADITIONAL: u16 = 0x0001;
    /// WinZip AES-128.
    pub const AES_128: u16 = 0x0101;
    /// WinZip AES-192.
    pub const AES_192: u16 = 0x0102;
    /// WinZip AES-256.
    pub const AES_256: u16 = 0x0103;
    /// Encrypted by a scheme this crate cannot identify.
    pub const UNKNOWN: u16 = 0xFFFF;
}

/// The encryption method of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EncryptionMethod {
    /// Not encrypted.
    #[default]
    None,
    /// Traditional PKWARE encryption.
    Traditional,
    /// WinZip AES with a 128-bit key.
    Aes128,
    /// WinZip AES with a 192-bit key.
    Aes192,
    /// WinZip AES with a 256-bit key.
    Aes256,
    /// Any other method id.
    Unknown(u16),
}

impl EncryptionMethod {
    /// Returns the method id.
    pub fn id(self) -> u16 {
        match self {
            Self::None => method::NONE,
            Self::Traditional => method::TRADITIONAL,
            Self::Aes128 => method::AES_128,
            Self::Aes192 => method::AES_192,
            Self::Aes256 => method::AES_256,
            Self::Unknown(id) => id,
        }
    }

    /// Maps a method id to a method.
    pub fn from_id(id: u16) -> Self {
        match id {
            method::NONE => Self::None,
            method::TRADITIONAL => Self::Traditional,
            method::AES_128 => Self::Aes128,
            method::AES_192 => Self::Aes192,
            method::AES_256 => Self::Aes256,
            other => Self::Unknown(other),
        }
    }

    /// Maps the strength byte of an AES extra field to a method.
    pub fn from_aes_strength(strength: u8) -> Self {
        match strength {
            1 => Self::Aes128,
            2 => Self::Aes192,
            3 => Self::Aes256,
            _ => Self::Unknown(method::UNKNOWN),
        }
    }

    /// The AES extra field strength byte, for AES methods.
    pub fn aes_strength(self) -> Option<u8> {
        match self {
            Self::Aes128 => Some(1),
            Self::Aes192 => Some(2),
            Self::Aes256 => Some(3),
            _ => None,
        }
    }

    /// Returns true for every method other than [`EncryptionMethod::None`].
    pub fn is_encrypted(self) -> bool {
        self != Self::None
    }

    /// Returns true if a cipher for this method is compiled in.
    pub fn is_supported(self) -> bool {
        match self {
            Self::None | Self::Traditional => true,
            Self::Aes128 | Self::Aes192 | Self::Aes256 => cfg!(feature = "aes"),
            Self::Unknown(_) => false,
        }
    }

    /// Fails with [`Error::UnsupportedMethod`] if no cipher is compiled in.
    pub fn ensure_supported(self) -> Result<()> {
        if self.is_supported() {
            Ok(())
        } else {
            Err(Error::UnsupportedMethod {
                kind: MethodKind::Encryption,
                method_id: self.id(),
            })
        }
    }

    /// Bytes the cipher adds to the stored size, excluding compression.
    pub fn overhead(self) -> u64 {
        match self {
            Self::Traditional => zip_crypto::HEADER_LEN as u64,
            // salt + verifier + auth code
            Self::Aes128 => 8 + 2 + 10,
            Self::Aes192 => 12 + 2 + 10,
            Self::Aes256 => 16 + 2 + 10,
            Self::None | Self::Unknown(_) => 0,
        }
    }
}

impl std::fmt::Display for EncryptionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => f.write_str("none"),
            Self::Traditional => f.write_str("ZipCrypto"),
            Self::Aes128 => f.write_str("AES-128"),
            Self::Aes192 => f.write_str("AES-192"),
            Self::Aes256 => f.write_str("AES-256"),
            Self::Unknown(id) => write!(f, "unknown ({:#06x})", id),
        }
    }
}

/// Parameters the decryptor needs from the entry's directory record.
#[derive(Debug, Clone, Copy)]
pub struct DecryptParams {
    /// Stored size of the entry, including cipher overhead.
    pub stored_len: u64,
    /// Expected ZipCrypto check byte.
    pub check_byte: u8,
}

/// Wraps `input` (the entry's stored bytes) in a decrypting reader.
///
/// For [`EncryptionMethod::None`] the input is returned unchanged.
pub fn build_decryptor<'a, R>(
    input: R,
    method: EncryptionMethod,
    password: Option<&Password>,
    params: DecryptParams,
) -> Result<Box<dyn Read + Send + 'a>>
where
    R: Read + Send + 'a,
{
    if !method.is_encrypted() {
        return Ok(Box::new(input));
    }
    method.ensure_supported()?;
    let password = password.ok_or(Error::NoPassword { entry_index: 0 })?;

    match method {
        EncryptionMethod::Traditional => Ok(Box::new(zip_crypto::ZipCryptoReader::new(
            input,
            password,
            params.check_byte,
        )?)),
        #[cfg(feature = "aes")]
        EncryptionMethod::Aes128 | EncryptionMethod::Aes192 | EncryptionMethod::Aes256 => {
            let strength = method
                .aes_strength()
                .and_then(self::aes::AesStrength::from_code)
                .ok_or(Error::UnsupportedMethod {
                    kind: MethodKind::Encryption,
                    method_id: method.id(),
                })?;
            Ok(Box::new(self::aes::AesReader::new(
                input,
                password,
                strength,
                params.stored_len,
            )?))
        }
        other => Err(Error::UnsupportedMethod {
            kind: MethodKind::Encryption,
            method_id: other.id(),
        }),
    }
}

/// An encrypting writer.
pub trait Encryptor: Write + Send {
    /// Writes any trailer (the AES authentication code) and flushes.
    fn finish(self: Box<Self>) -> io::Result<()>;
}

struct Plain<W>(W);

impl<W: Write + Send> Write for Plain<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

impl<W: Write + Send> Encryptor for Plain<W> {
    fn finish(mut self: Box<Self>) -> io::Result<()> {
        self.0.flush()
    }
}

impl<W: Write + Send> Encryptor for zip_crypto::ZipCryptoWriter<W> {
    fn finish(self: Box<Self>) -> io::Result<()> {
        self.into_inner().flush()
    }
}

#[cfg(feature = "aes")]
impl<W: Write + Send> Encryptor for self::aes::AesWriter<W> {
    fn finish(self: Box<Self>) -> io::Result<()> {
        let mut inner = self::aes::AesWriter::finish(*self)?;
        inner.flush()
    }
}

/// Wraps `output` in an encrypting writer, emitting the cipher header.
///
/// `check_byte` is only used by traditional encryption.
pub fn build_encryptor<'a, W>(
    output: W,
    method: EncryptionMethod,
    password: Option<&Password>,
    check_byte: u8,
) -> Result<Box<dyn Encryptor + 'a>>
where
    W: Write + Send + 'a,
{
    if !method.is_encrypted() {
        return Ok(Box::new(Plain(output)));
    }
    method.ensure_supported()?;
    let password = password.ok_or(Error::NoPassword { entry_index: 0 })?;

    match method {
        EncryptionMethod::Traditional => Ok(Box::new(zip_crypto::ZipCryptoWriter::new(
            output, password, check_byte,
        )?)),
        #[cfg(feature = "aes")]
        EncryptionMethod::Aes128 | EncryptionMethod::Aes192 | EncryptionMethod::Aes256 => {
            let strength = method
                .aes_strength()
                .and_then(self::aes::AesStrength::from_code)
                .ok_or(Error::UnsupportedMethod {
                    kind: MethodKind::Encryption,
                    method_id: method.id(),
                })?;
            Ok(Box::new(self::aes::AesWriter::new(output, password, strength)?))
        }
        other => Err(Error::UnsupportedMethod {
            kind: MethodKind::Encryption,
            method_id: other.id(),
        }),
    }
}
