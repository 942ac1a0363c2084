//! Per-session password resolution.

use std::collections::HashMap;

use super::Password;

/// Holds the archive-wide default password and per-entry overrides.
///
/// Overrides come from `set_encryption` calls and only live as long as the
/// session; nothing here is persisted.
#[derive(Clone, Default)]
pub struct CryptoContext {
    default: Option<Password>,
    overrides: HashMap<usize, Password>,
}

impl CryptoContext {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the default password; empty input clears it.
    pub fn set_default_password(&mut self, password: &[u8]) {
        self.default = Password::non_empty(password);
    }

    /// Returns the default password, if any.
    pub fn default_password(&self) -> Option<&Password> {
        self.default.as_ref()
    }

    /// Sets or clears the override for one entry.
    pub fn set_override(&mut self, index: usize, password: Option<Password>) {
        match password.filter(|p| !p.is_empty()) {
            Some(p) => {
                self.overrides.insert(index, p);
            }
            None => {
                self.overrides.remove(&index);
            }
        }
    }

    /// Resolves the password an entry is written with: override, then
    /// default.
    pub fn resolve(&self, index: usize) -> Option<&Password> {
        self.overrides.get(&index).or(self.default.as_ref())
    }
}

impl std::fmt::Debug for CryptoContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CryptoContext")
            .field("has_default", &self.default.is_some())
            .field("overrides", &self.overrides.len())
            .finish()
    }
}
