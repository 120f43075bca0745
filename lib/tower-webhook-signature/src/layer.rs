use crate::{Verifier, VerifySignatureService};
use tower_layer::Layer;

#[derive(Clone, Debug)]
pub struct VerifySignatureLayer {
    verifier: Verifier,
}

impl VerifySignatureLayer {
    #[must_use]
    pub fn new(verifier: Verifier) -> Self {
        Self { verifier }
    }
}

impl<S> Layer<S> for VerifySignatureLayer {
    type Service = VerifySignatureService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        VerifySignatureService::new(inner, self.verifier.clone())
    }
}
