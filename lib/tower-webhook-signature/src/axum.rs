use crate::{BodyParsed, Error, Verifier};
use axum_core::{
    extract::{FromRef, FromRequest, Request},
    response::{IntoResponse, Response},
    RequestExt,
};
use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, LengthLimitError};
use std::error::Error as StdError;

fn exceeds_length_limit(error: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(error);
    while let Some(error) = current {
        if error.is::<LengthLimitError>() {
            return true;
        }

        current = error.source();
    }

    false
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        debug!(error = %self, code = self.code());

        let status_code = match self {
            Self::SignatureMismatch { .. } => StatusCode::UNAUTHORIZED,
            Self::Body(ref error) if exceeds_length_limit(error.as_ref()) => {
                StatusCode::PAYLOAD_TOO_LARGE
            }
            Self::Body(..) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status_code, self.to_string()).into_response()
    }
}

/// Buffers the request body and enforces the webhook signature
///
/// The request needs to pass through the [`VerifySignatureLayer`](crate::VerifySignatureLayer) of the same [`Verifier`] first.
/// The body size is capped by axum's `DefaultBodyLimit`.
pub struct VerifiedBody(pub Bytes);

impl<S> FromRequest<S> for VerifiedBody
where
    S: Send + Sync,
    Verifier: FromRef<S>,
{
    type Rejection = Error;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let verifier = Verifier::from_ref(state);
        let (mut parts, body) = req.with_limited_body().into_parts();

        let body = body
            .collect()
            .await
            .map_err(|error| Error::Body(error.into()))?
            .to_bytes();
        parts.extensions.insert(BodyParsed);

        verifier.enforce(&parts).await?;

        Ok(Self(body))
    }
}
