use crate::{signatures_match, SharedKey, Signature};
use hex_simd::AsciiCase;
use hmac::{Hmac, Mac};
use sha2::Sha256;

/// Incremental signature computation
///
/// Feed it the body chunk by chunk, then finalise it into a [`Signature`] or verify a candidate directly
#[derive(Clone)]
pub struct SignatureDigest {
    mac: Hmac<Sha256>,
}

impl SignatureDigest {
    #[must_use]
    pub fn new(key: &SharedKey) -> Self {
        let mac = Hmac::<Sha256>::new_from_slice(key.as_bytes())
            .expect("[Bug] HMAC accepts keys of any length");

        Self { mac }
    }

    #[inline]
    pub fn update(&mut self, chunk: &[u8]) {
        self.mac.update(chunk);
    }

    #[must_use]
    pub fn finalize(self) -> Signature {
        let digest = self.mac.finalize().into_bytes();
        hex_simd::encode_to_string(digest, AsciiCase::Lower).into()
    }

    /// Finalise the digest and compare it against the candidate in constant time
    #[inline]
    #[must_use]
    pub fn verify(self, candidate: &str) -> bool {
        signatures_match(&self.finalize(), candidate)
    }
}
