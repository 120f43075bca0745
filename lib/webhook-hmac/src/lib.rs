//!
//! HMAC-SHA256 webhook signatures
//!
//! Signatures are the lowercase hex encoding of the HMAC-SHA256 digest of the raw body,
//! keyed with a secret shared between sender and receiver.
//! Signing a buffer and signing a stream carrying the same bytes always yields the same signature.
//!

use futures_util::{TryStream, TryStreamExt};
use std::pin::pin;
use subtle::ConstantTimeEq;

pub use self::{
    digest::SignatureDigest,
    error::{BoxError, StreamError},
    key::SharedKey,
    newtypes::*,
};

mod digest;
mod error;
mod key;

/// Length of a hex-encoded HMAC-SHA256 signature
pub const SIGNATURE_LEN: usize = 64;

/// Name of the query parameter carrying the signature
pub const SIGNATURE_PARAM: &str = "signature";

mod newtypes {
    #[aliri_braid::braid]
    pub struct Signature;
}

/// Compare the expected signature against an untrusted candidate
///
/// The length check short-circuits, the content comparison runs in constant time
#[inline]
fn signatures_match(expected: &SignatureRef, candidate: &str) -> bool {
    let (expected, candidate) = (expected.as_str().as_bytes(), candidate.as_bytes());
    if expected.len() != candidate.len() {
        return false;
    }

    expected.ct_eq(candidate).into()
}

/// Sign an in-memory buffer
#[inline]
#[must_use]
pub fn sign<D>(key: &SharedKey, data: D) -> Signature
where
    D: AsRef<[u8]>,
{
    let mut digest = SignatureDigest::new(key);
    digest.update(data.as_ref());
    digest.finalize()
}

/// Verify the candidate signature against an in-memory buffer
#[inline]
#[must_use]
pub fn verify<D>(key: &SharedKey, data: D, candidate: &str) -> bool
where
    D: AsRef<[u8]>,
{
    signatures_match(&sign(key, data), candidate)
}

/// Sign a stream of byte chunks
///
/// The stream is consumed until it ends. The first error it yields aborts the computation.
///
/// # Errors
///
/// - The stream yielded an error
pub async fn sign_stream<S>(key: &SharedKey, stream: S) -> Result<Signature, StreamError>
where
    S: TryStream,
    S::Ok: AsRef<[u8]>,
    S::Error: Into<BoxError>,
{
    let mut digest = SignatureDigest::new(key);
    let mut stream = pin!(stream.into_stream());

    while let Some(chunk) = stream.try_next().await.map_err(StreamError::new)? {
        digest.update(chunk.as_ref());
    }

    Ok(digest.finalize())
}

/// Verify the candidate signature against a stream of byte chunks
///
/// # Errors
///
/// - The stream yielded an error
///
/// A mismatching signature is *not* an error, it's signalled by `Ok(false)`
pub async fn verify_stream<S>(key: &SharedKey, stream: S, candidate: &str) -> Result<bool, StreamError>
where
    S: TryStream,
    S::Ok: AsRef<[u8]>,
    S::Error: Into<BoxError>,
{
    let signature = sign_stream(key, stream).await?;
    Ok(signatures_match(&signature, candidate))
}

#[cfg(test)]
mod test {
    use super::signatures_match;
    use crate::Signature;

    #[test]
    fn length_mismatch() {
        let expected = Signature::from("abcd");
        assert!(!signatures_match(&expected, "abc"));
        assert!(!signatures_match(&expected, "abcde"));
        assert!(!signatures_match(&expected, ""));
    }

    #[test]
    fn content_mismatch() {
        let expected = Signature::from("abcd");
        assert!(signatures_match(&expected, "abcd"));
        assert!(!signatures_match(&expected, "abce"));
        assert!(!signatures_match(&expected, "ABCD"));
    }
}
