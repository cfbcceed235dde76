//! Credential handling for the upstream API key.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A string that is wiped from memory on drop and never printed.
#[derive(Clone, Default, Zeroize, ZeroizeOnDrop)]
pub struct SecretString {
    inner: String,
}

impl SecretString {
    /// Wrap a secret value.
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            inner: value.into(),
        }
    }

    /// Read a secret from an environment variable, ignoring empty values.
    pub fn from_env(name: &str) -> Option<Self> {
        crate::env::get_var(name).map(Self::new)
    }

    /// Expose the secret value. Use only where the raw value is sent on the wire.
    pub fn expose_secret(&self) -> &str {
        &self.inner
    }

    /// Whether the secret holds no value.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Format as an HTTP `Authorization` bearer value.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.inner)
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl<'de> Deserialize<'de> for SecretString {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(Self::new)
    }
}

impl Serialize for SecretString {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        // Written back verbatim so a saved config stays loadable.
        self.inner.serialize(serializer)
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}
