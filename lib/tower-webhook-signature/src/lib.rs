//!
//! Tower middleware verifying HMAC-SHA256 webhook signatures
//!
//! Verification is split into two phases:
//!
//! 1. **Capture**: [`VerifySignatureLayer`] reads the `signature` query parameter and wraps the request body
//!    so the signature is computed over the raw bytes while a downstream stage reads them.
//!    This layer has to sit in front of anything that consumes the body.
//!
//! 2. **Enforce**: once the body has been read, [`Verifier::enforce`] waits for the outcome and rejects the request
//!    unless the signature matched (or the unsigned `GET` escape hatch applies).
//!
//! With the `axum` feature enabled, the `VerifiedBody` extractor buffers the body and runs the enforce phase for you.
//!

#[macro_use]
extern crate tracing;

use http::{
    header::{CONTENT_LENGTH, TRANSFER_ENCODING},
    HeaderMap, Uri,
};

pub use self::{
    body::SignatureBody,
    config::{Configuration, DEFAULT_STORAGE_KEY},
    error::{Error, BODY_CODE, INTEGRATION_CODE, SIGNATURE_MISMATCH_CODE},
    future::ResponseFuture,
    handle::PendingVerification,
    layer::VerifySignatureLayer,
    service::VerifySignatureService,
    verifier::Verifier,
};
pub use webhook_hmac::{BoxError, SharedKey, SIGNATURE_PARAM};

#[cfg(feature = "axum")]
pub use self::axum::VerifiedBody;

#[cfg(feature = "axum")]
mod axum;
mod body;
mod config;
mod error;
mod future;
mod handle;
mod layer;
mod service;
mod verifier;

/// Marker inserted into the request extensions by stages that consumed the body
///
/// The capture phase refuses to run on requests carrying this marker, since it couldn't see the raw body anymore.
#[derive(Clone, Copy, Debug, Default)]
pub struct BodyParsed;

/// Read the untrusted signature from the query string
///
/// Only the first occurrence counts. An empty value is treated as if there was no signature at all.
fn query_signature(uri: &Uri) -> Option<String> {
    let query = uri.query()?;
    let pairs: Vec<(String, String)> = match serde_urlencoded::from_str(query) {
        Ok(pairs) => pairs,
        Err(error) => {
            debug!(?error, "failed to decode query string");
            return None;
        }
    };

    pairs
        .into_iter()
        .find(|(name, _value)| name == SIGNATURE_PARAM)
        .map(|(_name, value)| value)
        .filter(|value| !value.is_empty())
}

/// Whether the request headers announce a non-empty body
///
/// Either a chunked transfer encoding or a content length other than zero.
/// An unparseable content length counts as a body.
fn declares_body(headers: &HeaderMap) -> bool {
    let chunked = headers
        .get_all(TRANSFER_ENCODING)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .any(|coding| coding.trim().eq_ignore_ascii_case("chunked"));

    if chunked {
        return true;
    }

    headers.get(CONTENT_LENGTH).is_some_and(|value| {
        value
            .to_str()
            .ok()
            .and_then(|value| value.trim().parse::<u64>().ok())
            != Some(0)
    })
}
