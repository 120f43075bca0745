use bytes::{Buf, Bytes};
use http_body::{Body, Frame, SizeHint};
use pin_project_lite::pin_project;
use std::{
    pin::Pin,
    task::{self, ready, Poll},
};
use tokio::sync::oneshot;
use webhook_hmac::SignatureDigest;

/// Signature computation riding along the body
pub(crate) struct Digesting {
    digest: SignatureDigest,
    candidate: String,
    sender: oneshot::Sender<bool>,
}

impl Digesting {
    pub(crate) fn new(
        digest: SignatureDigest,
        candidate: String,
        sender: oneshot::Sender<bool>,
    ) -> Self {
        Self {
            digest,
            candidate,
            sender,
        }
    }

    fn finish(self) {
        let valid = self.digest.verify(&self.candidate);
        if self.sender.send(valid).is_err() {
            trace!("verification handle dropped before the body ended");
        }
    }
}

pin_project! {
    /// Request body feeding every data frame into the signature digest on its way to the consumer
    ///
    /// Once the inner body ends, the pending verification resolves.
    /// If the inner body errors out or this body gets dropped early, the verification resolves to `false`.
    /// The error itself is passed through untouched for the consumer to handle.
    pub struct SignatureBody<B> {
        #[pin]
        inner: B,
        state: Option<Digesting>,
    }
}

impl<B> SignatureBody<B> {
    pub(crate) fn new(inner: B, state: Option<Digesting>) -> Self {
        Self { inner, state }
    }
}

impl<B> Body for SignatureBody<B>
where
    B: Body,
{
    type Data = Bytes;
    type Error = B::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let mut this = self.project();

        match ready!(this.inner.as_mut().poll_frame(cx)) {
            Some(Ok(frame)) => {
                let frame = frame.map_data(|mut data| data.copy_to_bytes(data.remaining()));
                if let (Some(state), Some(data)) = (this.state.as_mut(), frame.data_ref()) {
                    state.digest.update(data);
                }

                if this.inner.is_end_stream() {
                    if let Some(state) = this.state.take() {
                        state.finish();
                    }
                }

                Poll::Ready(Some(Ok(frame)))
            }
            Some(Err(error)) => {
                if this.state.take().is_some() {
                    // Reporting the error is up to whoever consumes the body
                    debug!("body stream failed while computing the signature");
                }

                Poll::Ready(Some(Err(error)))
            }
            None => {
                if let Some(state) = this.state.take() {
                    state.finish();
                }

                Poll::Ready(None)
            }
        }
    }

    #[inline]
    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    #[inline]
    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}
