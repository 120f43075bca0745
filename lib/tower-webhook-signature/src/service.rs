use crate::{ResponseFuture, SignatureBody, Verifier};
use http::Request;
use http_body::Body;
use std::task::{self, Poll};
use tower_service::Service;
use webhook_hmac::BoxError;

/// Service running the capture phase before handing the request to the inner service
#[derive(Clone, Debug)]
pub struct VerifySignatureService<S> {
    inner: S,
    verifier: Verifier,
}

impl<S> VerifySignatureService<S> {
    pub fn new(inner: S, verifier: Verifier) -> Self {
        Self { inner, verifier }
    }
}

impl<S, ReqBody> Service<Request<ReqBody>> for VerifySignatureService<S>
where
    S: Service<Request<SignatureBody<ReqBody>>>,
    ReqBody: Body,
    S::Error: Into<BoxError>,
{
    type Response = S::Response;
    type Error = BoxError;
    type Future = ResponseFuture<S::Future>;

    fn poll_ready(&mut self, cx: &mut task::Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(Into::into)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        match self.verifier.capture(req) {
            Ok(req) => ResponseFuture::Inner {
                future: self.inner.call(req),
            },
            Err(error) => {
                debug!(%error, "webhook signature capture failed");
                ResponseFuture::Rejected { error: Some(error) }
            }
        }
    }
}
