use bytes::Bytes;
use futures::{executor, stream};
use http::{header, Method, Request};
use http_body::{Body, Frame};
use http_body_util::{BodyExt, Empty, Full, StreamBody};
use std::io;
use tower::{service_fn, Layer, ServiceExt};
use tower_webhook_signature::{
    BodyParsed, BoxError, Configuration, Error, SignatureBody, Verifier,
};

const SECRET: &str = "secret";
const PAYLOAD: &str = r#"{"event":"document_state_changed","data":{"id":"msFYActMfJHqNTKH8YSvF1"}}"#;

fn signed_uri(payload: &str) -> String {
    let signature = webhook_hmac::sign(&SECRET.into(), payload);
    format!("/webhook?signature={signature}")
}

/// Capture layer in front of a service that buffers the body and then enforces the signature
fn call<B>(verifier: &Verifier, req: Request<B>) -> Result<Bytes, Error>
where
    B: Body,
    B::Error: Into<BoxError>,
{
    let inner = {
        let verifier = verifier.clone();
        service_fn(move |req: Request<SignatureBody<B>>| {
            let verifier = verifier.clone();
            async move {
                let (mut parts, body) = req.into_parts();
                let body = body
                    .collect()
                    .await
                    .map_err(|error| Error::Body(error.into()))?
                    .to_bytes();
                parts.extensions.insert(BodyParsed);

                verifier.enforce(&parts).await?;

                Ok::<_, Error>(body)
            }
        })
    };

    let service = verifier.layer().layer(inner);
    executor::block_on(service.oneshot(req)).map_err(|error| *error.downcast::<Error>().unwrap())
}

fn post<B>(uri: &str, body: B) -> Request<B> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .body(body)
        .unwrap()
}

fn post_with_length(uri: &str, payload: &'static str) -> Request<Full<Bytes>> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_LENGTH, payload.len())
        .body(Full::new(Bytes::from_static(payload.as_bytes())))
        .unwrap()
}

fn chunked_post(
    uri: &str,
    chunks: Vec<Result<Frame<Bytes>, io::Error>>,
) -> Request<StreamBody<stream::Iter<std::vec::IntoIter<Result<Frame<Bytes>, io::Error>>>>> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::TRANSFER_ENCODING, "chunked")
        .body(StreamBody::new(stream::iter(chunks)))
        .unwrap()
}

#[test]
fn valid_signature() {
    let verifier = Verifier::new(SECRET);
    let req = post_with_length(&signed_uri(PAYLOAD), PAYLOAD);

    let body = call(&verifier, req).unwrap();
    assert_eq!(body, PAYLOAD);
}

#[test]
fn valid_signature_chunked() {
    let verifier = Verifier::new(SECRET);
    let chunks = PAYLOAD
        .as_bytes()
        .chunks(7)
        .map(|chunk| Ok(Frame::data(Bytes::copy_from_slice(chunk))))
        .collect();
    let req = chunked_post(&signed_uri(PAYLOAD), chunks);

    let body = call(&verifier, req).unwrap();
    assert_eq!(body, PAYLOAD);
}

#[test]
fn signature_of_other_body() {
    let verifier = Verifier::new(SECRET);
    let signature = webhook_hmac::sign(&SECRET.into(), "some other body");
    let req = post_with_length(&format!("/webhook?signature={signature}"), PAYLOAD);

    let error = call(&verifier, req).unwrap_err();
    assert_eq!(error.code(), "E_WEBHOOK_SIG");
    assert!(error.to_string().contains(signature.as_str()));
    assert!(error
        .to_string()
        .contains("sha256 hmac of the request body using the shared key"));

    match error {
        Error::SignatureMismatch {
            signature: rejected,
        } => assert_eq!(rejected, signature.as_str()),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn wrong_key() {
    let verifier = Verifier::new("not the secret");
    let req = post_with_length(&signed_uri(PAYLOAD), PAYLOAD);

    assert!(matches!(
        call(&verifier, req),
        Err(Error::SignatureMismatch { .. })
    ));
}

#[test]
fn empty_body_resolves_synchronously() {
    let verifier = Verifier::new(SECRET);
    let req = post(&signed_uri(""), Empty::<Bytes>::new());

    let req = verifier.capture(req).unwrap();
    let verification = verifier.pending(req.extensions()).unwrap();
    assert!(verification.is_ready());

    executor::block_on(verifier.enforce_request(&req)).unwrap();
}

#[test]
fn zero_content_length() {
    let verifier = Verifier::new(SECRET);
    let req = Request::builder()
        .method(Method::POST)
        .uri(signed_uri(""))
        .header(header::CONTENT_LENGTH, 0)
        .body(Empty::<Bytes>::new())
        .unwrap();

    let req = verifier.capture(req).unwrap();
    assert!(verifier.pending(req.extensions()).unwrap().is_ready());
    executor::block_on(verifier.enforce_request(&req)).unwrap();
}

#[test]
fn announced_body_is_pending() {
    let verifier = Verifier::new(SECRET);
    let req = post_with_length(&signed_uri(PAYLOAD), PAYLOAD);

    let req = verifier.capture(req).unwrap();
    let verification = verifier.pending(req.extensions()).unwrap();
    assert!(!verification.is_ready());

    let (parts, body) = req.into_parts();
    executor::block_on(body.collect()).unwrap();

    assert!(verification.is_ready());
    executor::block_on(verifier.enforce(&parts)).unwrap();
}

#[test]
fn unannounced_body_is_hashed() {
    let verifier = Verifier::new(SECRET);
    let req = post(
        &signed_uri(""),
        Full::new(Bytes::from_static(br#"{"evil":true}"#)),
    );

    let req = verifier.capture(req).unwrap();
    assert!(!verifier.pending(req.extensions()).unwrap().is_ready());

    let (parts, body) = req.into_parts();
    executor::block_on(body.collect()).unwrap();

    let error = executor::block_on(verifier.enforce(&parts)).unwrap_err();
    assert!(matches!(error, Error::SignatureMismatch { .. }));
}

#[test]
fn unannounced_body_with_valid_signature() {
    let verifier = Verifier::new(SECRET);
    let req = post(
        &signed_uri(PAYLOAD),
        Full::new(Bytes::from_static(PAYLOAD.as_bytes())),
    );

    let body = call(&verifier, req).unwrap();
    assert_eq!(body, PAYLOAD);
}

#[test]
fn missing_signature() {
    let verifier = Verifier::new(SECRET);
    let req = post_with_length("/webhook", PAYLOAD);

    let req = verifier.capture(req).unwrap();
    assert!(verifier.pending(req.extensions()).unwrap().is_ready());

    let error = executor::block_on(verifier.enforce_request(&req)).unwrap_err();
    assert!(matches!(error, Error::SignatureMismatch { ref signature } if signature.is_empty()));
}

#[test]
fn unsigned_get_allowed() {
    let config = Configuration {
        allow_unsigned_get: true,
        ..Configuration::default()
    };
    let verifier = Verifier::with_config(SECRET, config);
    let req = Request::get("/webhook").body(Empty::<Bytes>::new()).unwrap();

    assert!(call(&verifier, req).is_ok());
}

#[test]
fn unsigned_get_rejected_by_default() {
    let verifier = Verifier::new(SECRET);
    let req = Request::get("/webhook").body(Empty::<Bytes>::new()).unwrap();

    assert!(matches!(
        call(&verifier, req),
        Err(Error::SignatureMismatch { .. })
    ));
}

#[test]
fn unsigned_get_does_not_cover_bad_signatures() {
    let config = Configuration {
        allow_unsigned_get: true,
        ..Configuration::default()
    };
    let verifier = Verifier::with_config(SECRET, config);
    let req = Request::get("/webhook?signature=0000")
        .body(Empty::<Bytes>::new())
        .unwrap();

    assert!(matches!(
        call(&verifier, req),
        Err(Error::SignatureMismatch { .. })
    ));
}

#[test]
fn unsigned_post_rejected_even_with_escape_hatch() {
    let config = Configuration {
        allow_unsigned_get: true,
        ..Configuration::default()
    };
    let verifier = Verifier::with_config(SECRET, config);
    let req = post_with_length("/webhook", PAYLOAD);

    assert!(matches!(
        call(&verifier, req),
        Err(Error::SignatureMismatch { .. })
    ));
}

#[test]
fn out_of_order() {
    let verifier = Verifier::new(SECRET);
    let mut req = post_with_length(&signed_uri(PAYLOAD), PAYLOAD);
    req.extensions_mut().insert(BodyParsed);

    let error = call(&verifier, req).unwrap_err();
    assert!(matches!(error, Error::OutOfOrderMiddleware));
    assert_eq!(error.code(), "E_WEBHOOK_ORDER");
}

#[test]
fn out_of_order_regardless_of_signature() {
    let verifier = Verifier::new(SECRET);
    let wrong_signature = webhook_hmac::sign(&SECRET.into(), "some other body");

    for uri in [
        "/webhook".to_owned(),
        format!("/webhook?signature={wrong_signature}"),
    ] {
        let mut req = post_with_length(&uri, PAYLOAD);
        req.extensions_mut().insert(BodyParsed);

        assert!(matches!(
            call(&verifier, req),
            Err(Error::OutOfOrderMiddleware)
        ));
    }
}

#[test]
fn stream_error_reported_once() {
    let verifier = Verifier::new(SECRET);
    let chunks = vec![
        Ok(Frame::data(Bytes::from_static(b"{\"event\":"))),
        Err(io::Error::new(io::ErrorKind::ConnectionReset, "peer went away")),
    ];
    let req = chunked_post(&signed_uri(PAYLOAD), chunks);

    // The body consumer sees the stream error, the signature check doesn't add its own
    let error = call(&verifier, req).unwrap_err();
    let Error::Body(source) = error else {
        panic!("expected body error, got {error}");
    };
    assert!(source.downcast_ref::<io::Error>().is_some());
}

#[test]
fn stream_error_resolves_invalid() {
    let verifier = Verifier::new(SECRET);
    let chunks = vec![Err(io::Error::new(io::ErrorKind::ConnectionReset, "peer went away"))];
    let req = chunked_post(&signed_uri(PAYLOAD), chunks);

    let req = verifier.capture(req).unwrap();
    let (parts, body) = req.into_parts();
    assert!(executor::block_on(body.collect()).is_err());

    let error = executor::block_on(verifier.enforce(&parts)).unwrap_err();
    assert!(matches!(error, Error::SignatureMismatch { .. }));
}

#[test]
fn dropped_body_resolves_invalid() {
    let verifier = Verifier::new(SECRET);
    let req = post_with_length(&signed_uri(PAYLOAD), PAYLOAD);

    let req = verifier.capture(req).unwrap();
    let (parts, body) = req.into_parts();
    drop(body);

    let error = executor::block_on(verifier.enforce(&parts)).unwrap_err();
    assert!(matches!(error, Error::SignatureMismatch { .. }));
}

#[test]
fn enforce_without_capture() {
    let verifier = Verifier::new(SECRET);
    let req = post_with_length(&signed_uri(PAYLOAD), PAYLOAD);

    let error = executor::block_on(verifier.enforce_request(&req)).unwrap_err();
    assert!(matches!(error, Error::NotCaptured { .. }));
}

#[test]
fn enforce_consumes_verification() {
    let verifier = Verifier::new(SECRET);
    let req = post(&signed_uri(""), Empty::<Bytes>::new());
    let req = verifier.capture(req).unwrap();

    executor::block_on(verifier.enforce_request(&req)).unwrap();

    let error = executor::block_on(verifier.enforce_request(&req)).unwrap_err();
    assert!(matches!(error, Error::NotCaptured { .. }));
}

#[test]
fn duplicate_capture() {
    let verifier = Verifier::new(SECRET);
    let req = post(&signed_uri(""), Empty::<Bytes>::new());

    let req = verifier.capture(req).unwrap();
    let Err(error) = verifier.capture(req) else {
        panic!("second capture succeeded");
    };
    assert!(matches!(error, Error::DuplicateCapture { .. }));
}

#[test]
fn stacked_verifiers() {
    let first = Verifier::new(SECRET);
    let second = Verifier::with_config(
        "second secret",
        Configuration {
            storage_key: "second-signature".into(),
            ..Configuration::default()
        },
    );

    let req = post_with_length(&signed_uri(PAYLOAD), PAYLOAD);
    let req = first.capture(req).unwrap();
    let req = second.capture(req).unwrap();

    let (parts, body) = req.into_parts();
    let body = executor::block_on(body.collect()).unwrap().to_bytes();
    assert_eq!(body, PAYLOAD);

    executor::block_on(first.enforce(&parts)).unwrap();

    // Same signature parameter, different key
    let error = executor::block_on(second.enforce(&parts)).unwrap_err();
    assert!(matches!(error, Error::SignatureMismatch { .. }));
}
