use crate::Error;
use pin_project_lite::pin_project;
use std::{
    future::Future,
    pin::Pin,
    task::{self, Poll},
};
use webhook_hmac::BoxError;

pin_project! {
    #[project = ResponseFutureProj]
    pub enum ResponseFuture<F> {
        Inner {
            #[pin]
            future: F,
        },
        Rejected {
            error: Option<Error>,
        },
    }
}

impl<F, T, E> Future for ResponseFuture<F>
where
    F: Future<Output = Result<T, E>>,
    E: Into<BoxError>,
{
    type Output = Result<T, BoxError>;

    fn poll(self: Pin<&mut Self>, cx: &mut task::Context<'_>) -> Poll<Self::Output> {
        match self.project() {
            ResponseFutureProj::Inner { future } => future.poll(cx).map_err(Into::into),
            ResponseFutureProj::Rejected { error } => {
                let error = error.take().expect("[Bug] Future polled after completion");
                Poll::Ready(Err(error.into()))
            }
        }
    }
}
