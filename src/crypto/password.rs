//! Password handling for ZIP encryption.

use zeroize::Zeroizing;

/// A password for entry encryption/decryption.
///
/// ZIP ciphers consume the password as raw bytes with no text encoding
/// applied, so passwords are stored as bytes and zeroed on drop.
#[derive(Clone, PartialEq, Eq)]
pub struct Password {
    inner: Zeroizing<Vec<u8>>,
}

impl Password {
    /// Creates a new password from raw bytes.
    pub fn new<B: Into<Vec<u8>>>(password: B) -> Self {
        Self {
            inner: Zeroizing::new(password.into()),
        }
    }

    /// Creates a password, treating empty input as "no password".
    pub fn non_empty(bytes: &[u8]) -> Option<Self> {
        if bytes.is_empty() {
            None
        } else {
            Some(Self::new(bytes))
        }
    }

    /// Returns the password bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.inner
    }

    /// Returns true if the password is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns the length of the password in bytes.
    pub fn len(&self) -> usize {
        self.inner.len()
    }
}

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Don't expose the actual password in debug output
        f.debug_struct("Password")
            .field("len", &self.inner.len())
            .finish()
    }
}

impl From<&str> for Password {
    fn from(s: &str) -> Self {
        Self::new(s.as_bytes())
    }
}

impl From<String> for Password {
    fn from(s: String) -> Self {
        Self::new(s.into_bytes())
    }
}

impl From<&[u8]> for Password {
    fn from(bytes: &[u8]) -> Self {
        Self::new(bytes)
    }
}

impl From<Vec<u8>> for Password {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}
