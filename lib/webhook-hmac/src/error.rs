use miette::Diagnostic;
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Reading the body stream failed before it ended
#[derive(Debug, Diagnostic, Error)]
#[diagnostic(code(webhook_hmac::stream))]
#[error("failed to read the body stream")]
pub struct StreamError {
    #[source]
    inner: BoxError,
}

impl StreamError {
    #[inline]
    pub fn new<E>(inner: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self {
            inner: inner.into(),
        }
    }

    #[must_use]
    pub fn into_inner(self) -> BoxError {
        self.inner
    }
}
