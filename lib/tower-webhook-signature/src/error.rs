use miette::Diagnostic;
use thiserror::Error;
use webhook_hmac::BoxError;

/// Code attached to signature mismatches
pub const SIGNATURE_MISMATCH_CODE: &str = "E_WEBHOOK_SIG";

/// Code attached to pipeline wiring errors
pub const INTEGRATION_CODE: &str = "E_WEBHOOK_ORDER";

/// Code attached to unreadable bodies
pub const BODY_CODE: &str = "E_WEBHOOK_BODY";

#[derive(Debug, Diagnostic, Error)]
#[non_exhaustive]
pub enum Error {
    /// The body was parsed before the capture phase ran
    #[diagnostic(
        code(E_WEBHOOK_ORDER),
        help("install the signature layer in front of any body parser")
    )]
    #[error("webhook signature middleware must run before any body parser")]
    OutOfOrderMiddleware,

    /// The capture phase ran twice for the same storage key
    #[diagnostic(code(E_WEBHOOK_ORDER))]
    #[error("webhook signature was already captured for storage key {storage_key:?}")]
    DuplicateCapture { storage_key: String },

    /// The enforce phase found nothing to enforce
    ///
    /// Either the capture phase never ran, or the verification was already consumed
    #[diagnostic(
        code(E_WEBHOOK_ORDER),
        help("wrap the service with the signature layer using the same storage key")
    )]
    #[error("no pending webhook signature verification for storage key {storage_key:?}")]
    NotCaptured { storage_key: String },

    /// The signature is missing or doesn't match the body
    #[diagnostic(code(E_WEBHOOK_SIG))]
    #[error(
        "?signature={signature} does not match sha256 hmac of the request body using the shared key"
    )]
    SignatureMismatch { signature: String },

    /// Reading the body failed
    #[diagnostic(code(E_WEBHOOK_BODY))]
    #[error("failed to read the request body")]
    Body(#[source] BoxError),
}

impl Error {
    /// Stable, machine-readable error code
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::OutOfOrderMiddleware | Self::DuplicateCapture { .. } | Self::NotCaptured { .. } => {
                INTEGRATION_CODE
            }
            Self::SignatureMismatch { .. } => SIGNATURE_MISMATCH_CODE,
            Self::Body(..) => BODY_CODE,
        }
    }
}
