//! Error types for ZIP archive sessions.
//!
//! This module provides the [`Error`] enum which represents all possible
//! failure modes when opening, querying, mutating, streaming from, or
//! committing a ZIP archive, along with a convenient [`Result<T>`] type alias.
//!
//! # Error Handling
//!
//! All fallible operations in this crate return `Result<T, Error>`. The
//! variants are distinct enough that callers can tell a wrong password from an
//! unsupported method from a plain I/O failure without inspecting messages:
//!
//! ```rust,no_run
//! use zipsession::{ArchiveSession, Error, OpenMode};
//!
//! fn dump_first(path: &str, password: Option<&[u8]>) -> zipsession::Result<Vec<u8>> {
//!     let mut session = ArchiveSession::open(path, OpenMode::ReadOnly)?;
//!     match session.read_entry_to_vec(0, password) {
//!         Ok(data) => Ok(data),
//!         Err(e @ (Error::WrongPassword { .. } | Error::NoPassword { .. })) => {
//!             eprintln!("Entry is encrypted: {}", e);
//!             Err(e)
//!         }
//!         Err(Error::UnsupportedMethod { kind, method_id }) => {
//!             eprintln!("No {} available for method {:#x}", kind, method_id);
//!             Err(Error::UnsupportedMethod { kind, method_id })
//!         }
//!         Err(e) => Err(e),
//!     }
//! }
//! ```

use std::io;
use std::path::PathBuf;

/// What a [`Error::NotFound`] refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Missing {
    /// An entry index that is out of range or was removed in this session.
    Index(usize),
    /// A raw entry name with no matching live entry.
    Name(Vec<u8>),
    /// An archive file that does not exist and was not opened for creation.
    Archive(PathBuf),
}

impl std::fmt::Display for Missing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Index(index) => write!(f, "entry {}", index),
            Self::Name(name) => write!(f, "entry '{}'", String::from_utf8_lossy(name)),
            Self::Archive(path) => write!(f, "archive '{}'", path.display()),
        }
    }
}

/// Which capability a method id was looked up in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    /// A compression method (codec).
    Compression,
    /// An encryption method (cipher).
    Encryption,
}

impl std::fmt::Display for MethodKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Compression => write!(f, "codec"),
            Self::Encryption => write!(f, "cipher"),
        }
    }
}

/// Helper struct for formatting WrongPassword error messages.
struct WrongPasswordDisplay<'a> {
    entry_index: Option<usize>,
    entry_name: Option<&'a str>,
}

impl std::fmt::Display for WrongPasswordDisplay<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Wrong password")?;
        match (self.entry_index, self.entry_name) {
            (Some(idx), Some(name)) => write!(f, " for entry {} ({})", idx, name),
            (Some(idx), None) => write!(f, " for entry {}", idx),
            (None, Some(name)) => write!(f, " for entry '{}'", name),
            (None, None) => Ok(()),
        }
    }
}

/// Helper struct for formatting CrcMismatch error messages.
struct CrcMismatchDisplay<'a> {
    entry_index: usize,
    entry_name: Option<&'a str>,
    expected: u32,
    actual: u32,
}

impl std::fmt::Display for CrcMismatchDisplay<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CRC mismatch for entry {}", self.entry_index)?;
        if let Some(name) = self.entry_name {
            write!(f, " ({})", name)?;
        }
        write!(f, ": expected {:#010x}, got {:#010x}", self.expected, self.actual)
    }
}

/// The main error type for archive session operations.
///
/// # Error Categories
///
/// | Category | Variants | Typical Cause |
/// |----------|----------|---------------|
/// | Lookup | [`NotFound`][Self::NotFound], [`AlreadyExists`][Self::AlreadyExists] | Bad index/name, create-exclusive collision |
/// | I/O | [`Io`][Self::Io], [`OutOfMemory`][Self::OutOfMemory] | File system or allocation failure |
/// | Format | [`Corrupt`][Self::Corrupt], [`UnsupportedFeature`][Self::UnsupportedFeature] | Damaged or out-of-scope archive |
/// | Credentials | [`WrongPassword`][Self::WrongPassword], [`NoPassword`][Self::NoPassword] | Encrypted entry |
/// | Capability | [`UnsupportedMethod`][Self::UnsupportedMethod] | No codec/cipher for a method id |
/// | Integrity | [`CrcMismatch`][Self::CrcMismatch] | Decoded data differs from the directory |
/// | Lifecycle | [`SessionClosed`][Self::SessionClosed], [`StreamsOpen`][Self::StreamsOpen], [`StreamClosed`][Self::StreamClosed], [`ReadOnly`][Self::ReadOnly] | Misuse of a session or stream |
/// | Arguments | [`LimitExceeded`][Self::LimitExceeded], [`InvalidArgument`][Self::InvalidArgument] | Caller input rejected |
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// An I/O error occurred while reading the origin or writing the new body.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// An index, name, or archive path does not resolve.
    ///
    /// Indices removed by a pending `remove` are reported as missing as well.
    #[error("Not found: {0}")]
    NotFound(Missing),

    /// The archive exists but was opened with [`OpenMode::CreateExclusive`].
    ///
    /// [`OpenMode::CreateExclusive`]: crate::OpenMode::CreateExclusive
    #[error("Archive already exists: {}", path.display())]
    AlreadyExists {
        /// The colliding path.
        path: PathBuf,
    },

    /// The archive directory is damaged or inconsistent with the file.
    #[error("Corrupt archive at offset {offset:#x}: {reason}")]
    Corrupt {
        /// The byte offset where the problem was detected.
        offset: u64,
        /// A description of the problem.
        reason: String,
    },

    /// The password does not decrypt the entry.
    ///
    /// Returned when the password verifier stored with the entry rejects the
    /// key. If no password was available at all, [`Error::NoPassword`] is
    /// returned instead.
    #[error("{}", WrongPasswordDisplay { entry_index: *entry_index, entry_name: entry_name.as_deref() })]
    WrongPassword {
        /// The entry index (if known).
        entry_index: Option<usize>,
        /// The entry name, lossily decoded (if known).
        entry_name: Option<String>,
    },

    /// The entry is encrypted and no password was supplied or resolvable.
    #[error("Entry {entry_index} is encrypted and no password was provided")]
    NoPassword {
        /// The entry index.
        entry_index: usize,
    },

    /// No codec or cipher is available for a method id.
    ///
    /// This happens for methods this crate never implements (e.g. LZMA in a
    /// ZIP) and for methods whose Cargo feature is disabled.
    #[error("Unsupported method: no {kind} for {method_id:#x}")]
    UnsupportedMethod {
        /// Whether a codec or a cipher was requested.
        kind: MethodKind,
        /// The method id as stored in the archive.
        method_id: u16,
    },

    /// A container feature outside the supported subset (ZIP64, spanning).
    #[error("Unsupported feature: {feature}")]
    UnsupportedFeature {
        /// The name of the unsupported feature.
        feature: &'static str,
    },

    /// A buffer could not be grown.
    #[error("Out of memory allocating {requested} bytes")]
    OutOfMemory {
        /// The number of bytes requested.
        requested: usize,
    },

    /// The session handle is no longer valid.
    #[error("Session closed")]
    SessionClosed,

    /// The session still has open entry streams.
    #[error("{count} entry stream(s) still open")]
    StreamsOpen {
        /// Number of streams still open.
        count: usize,
    },

    /// The stream handle was already closed.
    #[error("Stream {stream} is closed")]
    StreamClosed {
        /// The stream id.
        stream: usize,
    },

    /// A mutation was issued against a read-only session.
    #[error("Archive is opened read-only")]
    ReadOnly,

    /// The decoded content does not match the CRC-32 in the directory.
    #[error("{}", CrcMismatchDisplay { entry_index: *entry_index, entry_name: entry_name.as_deref(), expected: *expected, actual: *actual })]
    CrcMismatch {
        /// The entry index with the CRC mismatch.
        entry_index: usize,
        /// The entry name, lossily decoded (if known).
        entry_name: Option<String>,
        /// The expected CRC value from the archive.
        expected: u32,
        /// The actual CRC value of the decoded data.
        actual: u32,
    },

    /// A length-limited field would overflow its on-disk width.
    #[error("{field} too long: {len} bytes (max {max})")]
    LimitExceeded {
        /// The field being set.
        field: &'static str,
        /// The requested length.
        len: usize,
        /// The maximum length.
        max: usize,
    },

    /// An argument was rejected.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl Error {
    /// Creates a [`Error::Corrupt`] error.
    pub(crate) fn corrupt(offset: u64, reason: impl Into<String>) -> Self {
        Self::Corrupt {
            offset,
            reason: reason.into(),
        }
    }

    /// Returns true if this error is about credentials.
    pub fn is_password_error(&self) -> bool {
        matches!(self, Self::WrongPassword { .. } | Self::NoPassword { .. })
    }

    /// Produces an equivalent error value.
    ///
    /// [`io::Error`] is not `Clone`; I/O errors are rebuilt from their kind
    /// and message. Used to report the same fault on every read of a stream
    /// that has entered the errored state.
    pub(crate) fn duplicate(&self) -> Self {
        match self {
            Self::Io(e) => Self::Io(io::Error::new(e.kind(), e.to_string())),
            Self::NotFound(m) => Self::NotFound(m.clone()),
            Self::AlreadyExists { path } => Self::AlreadyExists { path: path.clone() },
            Self::Corrupt { offset, reason } => Self::Corrupt {
                offset: *offset,
                reason: reason.clone(),
            },
            Self::WrongPassword {
                entry_index,
                entry_name,
            } => Self::WrongPassword {
                entry_index: *entry_index,
                entry_name: entry_name.clone(),
            },
            Self::NoPassword { entry_index } => Self::NoPassword {
                entry_index: *entry_index,
            },
            Self::UnsupportedMethod { kind, method_id } => Self::UnsupportedMethod {
                kind: *kind,
                method_id: *method_id,
            },
            Self::UnsupportedFeature { feature } => Self::UnsupportedFeature { feature: *feature },
            Self::OutOfMemory { requested } => Self::OutOfMemory {
                requested: *requested,
            },
            Self::SessionClosed => Self::SessionClosed,
            Self::StreamsOpen { count } => Self::StreamsOpen { count: *count },
            Self::StreamClosed { stream } => Self::StreamClosed { stream: *stream },
            Self::ReadOnly => Self::ReadOnly,
            Self::CrcMismatch {
                entry_index,
                entry_name,
                expected,
                actual,
            } => Self::CrcMismatch {
                entry_index: *entry_index,
                entry_name: entry_name.clone(),
                expected: *expected,
                actual: *actual,
            },
            Self::LimitExceeded { field, len, max } => Self::LimitExceeded {
                field: *field,
                len: *len,
                max: *max,
            },
            Self::InvalidArgument(msg) => Self::InvalidArgument(msg.clone()),
        }
    }
}

/// A specialized Result type for archive session operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrong_password_display() {
        let err = Error::WrongPassword {
            entry_index: Some(3),
            entry_name: Some("secret.txt".into()),
        };
        assert_eq!(err.to_string(), "Wrong password for entry 3 (secret.txt)");

        let err = Error::WrongPassword {
            entry_index: None,
            entry_name: None,
        };
        assert_eq!(err.to_string(), "Wrong password");
    }

    #[test]
    fn test_crc_mismatch_display() {
        let err = Error::CrcMismatch {
            entry_index: 1,
            entry_name: Some("a.bin".into()),
            expected: 0xDEADBEEF,
            actual: 0x1,
        };
        assert_eq!(
            err.to_string(),
            "CRC mismatch for entry 1 (a.bin): expected 0xdeadbeef, got 0x00000001"
        );
    }

    #[test]
    fn test_not_found_display_lossy_name() {
        let err = Error::NotFound(Missing::Name(vec![b'a', 0xFF, b'b']));
        assert_eq!(err.to_string(), "Not found: entry 'a\u{FFFD}b'");
    }

    #[test]
    fn test_duplicate_preserves_variant() {
        let err = Error::Io(io::Error::new(io::ErrorKind::UnexpectedEof, "short"));
        match err.duplicate() {
            Error::Io(e) => {
                assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof);
                assert!(e.to_string().contains("short"));
            }
            other => panic!("expected Io, got {:?}", other),
        }

        let err = Error::corrupt(0x10, "bad header");
        assert!(matches!(err.duplicate(), Error::Corrupt { offset: 0x10, .. }));
    }

    #[test]
    fn test_is_password_error() {
        assert!(Error::NoPassword { entry_index: 0 }.is_password_error());
        assert!(!Error::SessionClosed.is_password_error());
    }
}
