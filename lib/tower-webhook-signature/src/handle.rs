use smol_str::SmolStr;
use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
};
use tokio::sync::oneshot::{self, error::TryRecvError};
use triomphe::Arc;

pub(crate) enum Outcome {
    Ready(bool),
    Pending(oneshot::Receiver<bool>),
}

impl Outcome {
    /// Wait for the verification to finish
    ///
    /// A dropped sender means the body errored out or was never read to its end
    pub(crate) async fn resolve(self) -> bool {
        match self {
            Self::Ready(valid) => valid,
            Self::Pending(receiver) => receiver.await.unwrap_or(false),
        }
    }
}

/// Verification outcome of a single request
///
/// Created by the capture phase, consumed exactly once by the enforce phase
#[derive(Clone)]
pub struct PendingVerification {
    inner: Arc<Mutex<Option<Outcome>>>,
}

impl PendingVerification {
    fn new(outcome: Outcome) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Some(outcome))),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Outcome>> {
        // The guarded state can't be left half-updated, so a poisoned lock is fine to reuse
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn ready(valid: bool) -> Self {
        Self::new(Outcome::Ready(valid))
    }

    pub(crate) fn pending(receiver: oneshot::Receiver<bool>) -> Self {
        Self::new(Outcome::Pending(receiver))
    }

    /// Whether the outcome is known without waiting
    ///
    /// Returns `false` once the outcome was consumed by the enforce phase
    #[must_use]
    pub fn is_ready(&self) -> bool {
        let mut guard = self.lock();
        let resolved = match *guard {
            Some(Outcome::Ready(..)) => return true,
            Some(Outcome::Pending(ref mut receiver)) => match receiver.try_recv() {
                Ok(valid) => valid,
                Err(TryRecvError::Empty) => return false,
                Err(TryRecvError::Closed) => false,
            },
            None => return false,
        };

        *guard = Some(Outcome::Ready(resolved));
        true
    }

    pub(crate) fn take(&self) -> Option<Outcome> {
        self.lock().take()
    }
}

/// All pending verifications of a request, keyed by their storage key
#[derive(Clone, Default)]
pub(crate) struct VerificationSlots {
    slots: HashMap<SmolStr, PendingVerification>,
}

impl VerificationSlots {
    pub(crate) fn contains(&self, storage_key: &str) -> bool {
        self.slots.contains_key(storage_key)
    }

    pub(crate) fn get(&self, storage_key: &str) -> Option<&PendingVerification> {
        self.slots.get(storage_key)
    }

    pub(crate) fn insert(&mut self, storage_key: SmolStr, verification: PendingVerification) {
        self.slots.insert(storage_key, verification);
    }
}

#[cfg(test)]
mod test {
    use super::PendingVerification;
    use tokio::sync::oneshot;

    #[test]
    fn ready_is_ready() {
        let verification = PendingVerification::ready(true);
        assert!(verification.is_ready());

        let outcome = verification.take().unwrap();
        assert!(futures::executor::block_on(outcome.resolve()));
        assert!(verification.take().is_none());
        assert!(!verification.is_ready());
    }

    #[test]
    fn pending_becomes_ready() {
        let (sender, receiver) = oneshot::channel();
        let verification = PendingVerification::pending(receiver);
        assert!(!verification.is_ready());

        sender.send(true).unwrap();
        assert!(verification.is_ready());

        let outcome = verification.take().unwrap();
        assert!(futures::executor::block_on(outcome.resolve()));
    }

    #[test]
    fn dropped_sender_is_invalid() {
        let (sender, receiver) = oneshot::channel();
        let verification = PendingVerification::pending(receiver);
        drop(sender);

        let outcome = verification.take().unwrap();
        assert!(!futures::executor::block_on(outcome.resolve()));
    }
}
