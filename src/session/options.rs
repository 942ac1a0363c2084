//! Options for opening a session.

use crate::{Error, Result};

/// Integer open flags, as used by the classic C-style API.
pub mod open_flags {
    /// Create the archive if it does not exist.
    pub const CREATE: u32 = 1;
    /// Fail if the archive already exists.
    pub const EXCL: u32 = 2;
    /// Verify local headers against the central directory on open.
    pub const CHECKCONS: u32 = 4;
    /// Start from an empty archive even if one exists.
    pub const TRUNCATE: u32 = 8;
    /// Reject every mutation.
    pub const RDONLY: u32 = 16;

    pub(crate) const ALL: u32 = CREATE | EXCL | CHECKCONS | TRUNCATE | RDONLY;
}

/// Common ways to open an archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OpenMode {
    /// Open an existing archive; mutations fail with [`Error::ReadOnly`].
    #[default]
    ReadOnly,
    /// Open an existing archive for changes, creating it if missing.
    Create,
    /// Create a new archive; fail with [`Error::AlreadyExists`] if it exists.
    CreateExclusive,
    /// Start from an empty archive, creating it if missing.
    Truncate,
}

/// Full open configuration.
///
/// Follows the semantics of the integer flags: `exclusive` only fails on an
/// existing archive, and a missing archive is an error unless `create` is
/// set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OpenOptions {
    /// Create the archive if it does not exist.
    pub create: bool,
    /// Fail if the archive exists.
    pub exclusive: bool,
    /// Discard existing entries.
    pub truncate: bool,
    /// Reject mutations.
    pub read_only: bool,
    /// Cross-check local headers on open.
    pub check_consistency: bool,
}

impl OpenOptions {
    /// Creates options for opening an existing archive for changes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether a missing archive is created.
    pub fn create(mut self, create: bool) -> Self {
        self.create = create;
        self
    }

    /// Sets whether an existing archive is an error.
    pub fn exclusive(mut self, exclusive: bool) -> Self {
        self.exclusive = exclusive;
        self
    }

    /// Sets whether existing entries are discarded.
    pub fn truncate(mut self, truncate: bool) -> Self {
        self.truncate = truncate;
        self
    }

    /// Sets whether mutations are rejected.
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Sets whether local headers are verified on open.
    pub fn check_consistency(mut self, check: bool) -> Self {
        self.check_consistency = check;
        self
    }

    /// Builds options from [`open_flags`] bits.
    pub fn from_bits(bits: u32) -> Result<Self> {
        if bits & !open_flags::ALL != 0 {
            return Err(Error::InvalidArgument(format!(
                "unknown open flags {:#x}",
                bits & !open_flags::ALL
            )));
        }
        let options = Self {
            create: bits & open_flags::CREATE != 0,
            exclusive: bits & open_flags::EXCL != 0,
            truncate: bits & open_flags::TRUNCATE != 0,
            read_only: bits & open_flags::RDONLY != 0,
            check_consistency: bits & open_flags::CHECKCONS != 0,
        };
        options.validate()?;
        Ok(options)
    }

    /// Converts back to [`open_flags`] bits.
    pub fn bits(&self) -> u32 {
        let mut bits = 0;
        for (set, flag) in [
            (self.create, open_flags::CREATE),
            (self.exclusive, open_flags::EXCL),
            (self.check_consistency, open_flags::CHECKCONS),
            (self.truncate, open_flags::TRUNCATE),
            (self.read_only, open_flags::RDONLY),
        ] {
            if set {
                bits |= flag;
            }
        }
        bits
    }

    /// Rejects combinations that cannot be honored.
    pub fn validate(&self) -> Result<()> {
        if self.read_only && (self.create || self.exclusive || self.truncate) {
            return Err(Error::InvalidArgument(
                "read-only cannot be combined with create, exclusive or truncate".into(),
            ));
        }
        Ok(())
    }
}

impl From<OpenMode> for OpenOptions {
    fn from(mode: OpenMode) -> Self {
        match mode {
            OpenMode::ReadOnly => Self::new().read_only(true),
            OpenMode::Create => Self::new().create(true),
            OpenMode::CreateExclusive => Self::new().create(true).exclusive(true),
            OpenMode::Truncate => Self::new().create(true).truncate(true),
        }
    }
}
