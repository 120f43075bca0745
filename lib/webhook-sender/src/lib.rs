//!
//! Send JSON webhooks signed with a shared key
//!
//! The payload is serialised exactly once. The signature is computed over those bytes,
//! and those very same bytes are what goes over the wire.
//!

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

use bytes::Bytes;
use http::{
    header::{ACCEPT, CONTENT_TYPE, USER_AGENT},
    HeaderMap, HeaderName, HeaderValue, Method, Request, Response as HttpResponse, StatusCode,
};
use http_body::Body as HttpBody;
use http_body_util::{BodyExt, Full, Limited};
use hyper_rustls::HttpsConnectorBuilder;
use hyper_util::{client::legacy::Client as HyperClient, rt::TokioExecutor};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{de::DeserializeOwned, Serialize};
use std::{error::Error as StdError, fmt, time::Duration};
use tower::{
    timeout::TimeoutLayer, util::BoxCloneService, BoxError, Service, ServiceBuilder, ServiceExt,
};
use url::Url;
use webhook_hmac::{SharedKey, SignatureRef, SIGNATURE_PARAM};

type BoxBody = http_body_util::combinators::BoxBody<Bytes, BoxError>;
type Result<T, E = Error> = std::result::Result<T, E>;

/// Default body limit of 1MB
const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

/// Default request timeout of 30s
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const DEFAULT_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

const JSON_MIME: &str = "application/json";

/// Matches `application/json`, parameters like `; charset=utf-8`, and suffixes like `application/vnd.github.v3+json`
static JSON_CONTENT_TYPE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[/+]json($|;\s)").expect("[Bug] Failed to compile JSON content type regex")
});

/// Request body type
pub type Body = Full<Bytes>;

/// Sender error type
pub struct Error {
    inner: BoxError,
}

impl Error {
    #[inline]
    fn new<E>(inner: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self {
            inner: inner.into(),
        }
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.inner.fmt(f)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.inner.fmt(f)
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(self.inner.as_ref())
    }
}

/// Set the `signature` query parameter, replacing any existing one
///
/// # Errors
///
/// - The URL failed to parse
pub fn signed_uri(uri: &str, signature: &SignatureRef) -> Result<String> {
    let mut url = Url::parse(uri).map_err(Error::new)?;
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(name, _value)| name != SIGNATURE_PARAM)
        .map(|(name, value)| (name.into_owned(), value.into_owned()))
        .collect();

    url.query_pairs_mut()
        .clear()
        .extend_pairs(pairs)
        .append_pair(SIGNATURE_PARAM, signature.as_str());

    Ok(url.into())
}

/// Serialise the payload as JSON and build a signed `POST` request carrying it
///
/// # Errors
///
/// - Serialising the payload failed
/// - The URL failed to parse
pub fn sign_request<T>(key: &SharedKey, uri: &str, payload: &T) -> Result<Request<Body>>
where
    T: Serialize + ?Sized,
{
    let body = Bytes::from(sonic_rs::to_vec(payload).map_err(Error::new)?);
    let signature = webhook_hmac::sign(key, &body);
    let uri = signed_uri(uri, &signature)?;

    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(ACCEPT, JSON_MIME)
        .header(CONTENT_TYPE, JSON_MIME)
        .body(Full::new(body))
        .map_err(Error::new)
}

/// Builder for the webhook client
pub struct ClientBuilder {
    content_length_limit: Option<usize>,
    default_headers: HeaderMap,
    timeout: Option<Duration>,
}

impl ClientBuilder {
    /// Set the content length limit of response bodies
    ///
    /// Defaults to 1MB
    #[must_use]
    pub fn content_length_limit(self, content_length_limit: Option<usize>) -> Self {
        Self {
            content_length_limit,
            ..self
        }
    }

    /// Set a default header
    ///
    /// These headers are added to every request sent via this client
    ///
    /// # Errors
    ///
    /// - The header name failed to convert
    /// - The header value failed to convert
    pub fn default_header<K, V>(mut self, key: K, value: V) -> Result<Self>
    where
        K: TryInto<HeaderName>,
        K::Error: Into<BoxError>,
        V: TryInto<HeaderValue>,
        V::Error: Into<BoxError>,
    {
        self.default_headers.insert(
            key.try_into().map_err(Error::new)?,
            value.try_into().map_err(Error::new)?,
        );

        Ok(self)
    }

    /// Set the User-Agent header
    ///
    /// Defaults to `webhook-sender/<version>`
    ///
    /// # Errors
    ///
    /// - The header value failed to convert
    pub fn user_agent<V>(self, value: V) -> Result<Self>
    where
        V: TryInto<HeaderValue>,
        V::Error: Into<BoxError>,
    {
        self.default_header(USER_AGENT, value)
    }

    /// Set a timeout
    ///
    /// Defaults to 30 seconds
    #[must_use]
    pub fn timeout(self, timeout: Option<Duration>) -> Self {
        Self { timeout, ..self }
    }

    /// Build the client on top of a `hyper` client with `rustls`
    ///
    /// # Panics
    ///
    /// - The native certificate store couldn't be loaded
    #[must_use]
    pub fn build(self) -> Client {
        let connector = HttpsConnectorBuilder::new()
            .with_native_roots()
            .expect("Failed to fetch native certificates")
            .https_or_http()
            .enable_http1()
            .enable_http2()
            .build();

        let client = HyperClient::builder(TokioExecutor::new()).build(connector);
        self.service(client)
    }

    /// Build the client by wrapping another HTTP client service
    #[must_use]
    pub fn service<S, B>(self, client: S) -> Client
    where
        S: Service<Request<Body>, Response = HttpResponse<B>> + Clone + Send + 'static,
        S::Error: StdError + Send + Sync + 'static,
        S::Future: Send,
        B: HttpBody<Data = Bytes> + Send + Sync + 'static,
        B::Error: StdError + Send + Sync + 'static,
    {
        let content_length_limit = self.content_length_limit;
        let client = client
            .map_response(move |response: HttpResponse<B>| {
                response.map(|body| match content_length_limit {
                    Some(limit) => BoxBody::new(Limited::new(body, limit)),
                    None => BoxBody::new(body.map_err(BoxError::from)),
                })
            })
            .map_err(BoxError::from);

        let inner = ServiceBuilder::new()
            .option_layer(self.timeout.map(TimeoutLayer::new))
            .service(client);

        Client {
            default_headers: self.default_headers,
            inner: BoxCloneService::new(inner),
        }
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        let builder = ClientBuilder {
            content_length_limit: Some(DEFAULT_BODY_LIMIT),
            default_headers: HeaderMap::default(),
            timeout: Some(DEFAULT_REQUEST_TIMEOUT),
        };

        builder
            .user_agent(DEFAULT_USER_AGENT)
            .expect("[Bug] Default user agent is an invalid header value")
    }
}

/// Client sending signed webhooks
#[derive(Clone)]
pub struct Client {
    default_headers: HeaderMap,
    inner: BoxCloneService<Request<Body>, HttpResponse<BoxBody>, BoxError>,
}

impl Client {
    /// Build a new client
    #[must_use]
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    fn prepare_request(&self, mut req: Request<Body>) -> Request<Body> {
        for (name, value) in &self.default_headers {
            if !req.headers().contains_key(name) {
                req.headers_mut().insert(name.clone(), value.clone());
            }
        }

        req
    }

    /// Execute an HTTP request
    ///
    /// # Errors
    ///
    /// - The inner client service isn't ready
    /// - The request failed
    pub async fn execute(&self, req: Request<Body>) -> Result<Response> {
        let req = self.prepare_request(req);
        let response = self.inner.clone().oneshot(req).await.map_err(Error::new)?;

        Ok(Response { inner: response })
    }

    /// Sign the JSON payload and send it to the URL
    ///
    /// # Errors
    ///
    /// - Building the signed request failed
    /// - Executing the request failed
    pub async fn send<T>(&self, key: &SharedKey, uri: &str, payload: &T) -> Result<Response>
    where
        T: Serialize + ?Sized,
    {
        let req = sign_request(key, uri, payload)?;
        debug!(uri = %req.uri(), "sending signed webhook");

        self.execute(req).await
    }
}

impl Default for Client {
    fn default() -> Self {
        ClientBuilder::default().build()
    }
}

/// HTTP response
#[derive(Debug)]
pub struct Response {
    inner: HttpResponse<BoxBody>,
}

impl Response {
    /// Convert the response into its inner representation
    #[must_use]
    pub fn into_inner(self) -> HttpResponse<BoxBody> {
        self.inner
    }

    /// Get the status of the request
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.inner.status()
    }

    /// Get a reference to the headers
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    /// Whether the `Content-Type` header denotes a JSON body
    #[must_use]
    pub fn is_json(&self) -> bool {
        self.headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|content_type| JSON_CONTENT_TYPE_REGEX.is_match(content_type))
    }

    /// Read the body into a `Bytes`
    ///
    /// # Errors
    ///
    /// Reading the body from the remote failed
    pub async fn bytes(self) -> Result<Bytes> {
        Ok(self.inner.collect().await.map_err(Error::new)?.to_bytes())
    }

    /// Read the body and attempt to interpret it as a UTF-8 encoded string
    ///
    /// # Errors
    ///
    /// - Reading the body from the remote failed
    /// - The body isn't a UTF-8 encoded string
    pub async fn text(self) -> Result<String> {
        let body = self.bytes().await?;
        simdutf8::basic::from_utf8(&body)
            .map(ToOwned::to_owned)
            .map_err(Error::new)
    }

    /// Read the body and deserialise it as JSON into a `serde` enabled structure
    ///
    /// # Errors
    ///
    /// - Reading the body from the remote failed
    /// - Deserialising the body into the structure failed
    pub async fn json<T>(self) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let bytes = self.bytes().await?;
        sonic_rs::from_slice(&bytes).map_err(Error::new)
    }
}
