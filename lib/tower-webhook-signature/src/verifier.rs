use crate::{
    body::{Digesting, SignatureBody},
    declares_body,
    handle::{PendingVerification, VerificationSlots},
    query_signature, BodyParsed, Configuration, Error, VerifySignatureLayer,
};
use http::{request::Parts, Extensions, Method, Request, Uri};
use http_body::Body;
use std::fmt;
use tokio::sync::oneshot;
use triomphe::Arc;
use webhook_hmac::{SharedKey, SignatureDigest};

/// Whether the body is known to be empty without polling it
///
/// Headers alone don't suffice, HTTP/2 and in-process bodies carry content without announcing a length
fn is_empty<B>(body: &B) -> bool
where
    B: Body,
{
    body.is_end_stream() || body.size_hint().exact() == Some(0)
}

struct Inner {
    key: SharedKey,
    config: Configuration,
}

/// Webhook signature verifier
///
/// Holds the shared key and the configuration and drives both phases of the verification.
/// Cloning is cheap.
#[derive(Clone)]
pub struct Verifier {
    inner: Arc<Inner>,
}

impl Verifier {
    /// Verifier with the default configuration
    #[must_use]
    pub fn new<K>(key: K) -> Self
    where
        K: Into<SharedKey>,
    {
        Self::with_config(key, Configuration::default())
    }

    #[must_use]
    pub fn with_config<K>(key: K, config: Configuration) -> Self
    where
        K: Into<SharedKey>,
    {
        Self {
            inner: Arc::new(Inner {
                key: key.into(),
                config,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &Configuration {
        &self.inner.config
    }

    /// Layer running the capture phase on every request
    #[must_use]
    pub fn layer(&self) -> VerifySignatureLayer {
        VerifySignatureLayer::new(self.clone())
    }

    /// Pending verification this verifier stored on the request, if any
    #[must_use]
    pub fn pending(&self, extensions: &Extensions) -> Option<PendingVerification> {
        extensions
            .get::<VerificationSlots>()
            .and_then(|slots| slots.get(&self.inner.config.storage_key))
            .cloned()
    }

    /// Capture phase
    ///
    /// Has to run before anything reads the body.
    /// Only requests announcing no body *and* carrying a provably empty one are verified right away.
    /// Never waits on the body, the signature is computed while the returned request's body is being read.
    ///
    /// # Errors
    ///
    /// - The request carries the [`BodyParsed`] marker
    /// - The capture phase already ran for the configured storage key
    pub fn capture<B>(&self, mut req: Request<B>) -> Result<Request<SignatureBody<B>>, Error>
    where
        B: Body,
    {
        if req.extensions().get::<BodyParsed>().is_some() {
            return Err(Error::OutOfOrderMiddleware);
        }

        let storage_key = &self.inner.config.storage_key;
        if req
            .extensions()
            .get::<VerificationSlots>()
            .is_some_and(|slots| slots.contains(storage_key))
        {
            return Err(Error::DuplicateCapture {
                storage_key: storage_key.to_string(),
            });
        }

        let (verification, state) = match query_signature(req.uri()) {
            None => {
                trace!("no signature supplied");
                (PendingVerification::ready(false), None)
            }
            Some(candidate) if !declares_body(req.headers()) && is_empty(req.body()) => {
                trace!("no body announced, verifying against empty body");
                let valid = webhook_hmac::verify(&self.inner.key, b"", &candidate);
                (PendingVerification::ready(valid), None)
            }
            Some(candidate) => {
                let (sender, receiver) = oneshot::channel();
                let state = Digesting::new(SignatureDigest::new(&self.inner.key), candidate, sender);
                (PendingVerification::pending(receiver), Some(state))
            }
        };

        let mut slots = req
            .extensions_mut()
            .remove::<VerificationSlots>()
            .unwrap_or_default();
        slots.insert(storage_key.clone(), verification);
        req.extensions_mut().insert(slots);

        Ok(req.map(|body| SignatureBody::new(body, state)))
    }

    /// Enforce phase
    ///
    /// Run this after the body has been read to its end, otherwise this waits forever.
    ///
    /// # Errors
    ///
    /// - The capture phase didn't run for this request, or the verification was already enforced
    /// - The signature is missing or doesn't match (unless the unsigned `GET` escape hatch applies)
    pub async fn enforce(&self, parts: &Parts) -> Result<(), Error> {
        self.enforce_raw(&parts.method, &parts.uri, &parts.extensions)
            .await
    }

    /// Enforce phase operating on a full request
    ///
    /// See [`Verifier::enforce`]
    ///
    /// # Errors
    ///
    /// See [`Verifier::enforce`]
    pub async fn enforce_request<B>(&self, req: &Request<B>) -> Result<(), Error> {
        self.enforce_raw(req.method(), req.uri(), req.extensions())
            .await
    }

    async fn enforce_raw(
        &self,
        method: &Method,
        uri: &Uri,
        extensions: &Extensions,
    ) -> Result<(), Error> {
        let config = &self.inner.config;
        let outcome = self
            .pending(extensions)
            .and_then(|verification| verification.take())
            .ok_or_else(|| Error::NotCaptured {
                storage_key: config.storage_key.to_string(),
            })?;

        if outcome.resolve().await {
            debug!("webhook signature verified");
            return Ok(());
        }

        let candidate = query_signature(uri);
        if config.allow_unsigned_get && method == Method::GET && candidate.is_none() {
            debug!("letting unsigned GET request through");
            return Ok(());
        }

        let signature = candidate.unwrap_or_default();
        debug!(%signature, "webhook signature mismatch");

        Err(Error::SignatureMismatch { signature })
    }
}

impl fmt::Debug for Verifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Verifier")
            .field("key", &self.inner.key)
            .field("config", &self.inner.config)
            .finish()
    }
}
