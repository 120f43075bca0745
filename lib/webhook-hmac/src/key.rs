use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Secret shared between the webhook sender and the receiver
///
/// The key material is wiped from memory once the value is dropped and never shows up in `Debug` output
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize), serde(from = "String"))]
pub struct SharedKey {
    bytes: Vec<u8>,
}

impl SharedKey {
    #[inline]
    pub fn new<K>(key: K) -> Self
    where
        K: Into<Vec<u8>>,
    {
        Self { bytes: key.into() }
    }

    #[inline]
    pub(crate) fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for SharedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedKey").finish_non_exhaustive()
    }
}

impl From<&str> for SharedKey {
    #[inline]
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SharedKey {
    #[inline]
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&[u8]> for SharedKey {
    #[inline]
    fn from(value: &[u8]) -> Self {
        Self::new(value)
    }
}

impl From<Vec<u8>> for SharedKey {
    #[inline]
    fn from(value: Vec<u8>) -> Self {
        Self::new(value)
    }
}
