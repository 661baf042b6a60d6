//! Cooperative cancellation of entity operations.
//!
//! A [`CancelToken`] is handed to every operation through its
//! [`OperationContext`](crate::context::OperationContext). Reads race the token, so a
//! search returns as soon as the signal arrives or the deadline passes; writes only check
//! it before the store is touched, so a write that was already issued is never
//! half-abandoned.

use std::{
    fmt,
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};

use futures::{
    FutureExt,
    channel::oneshot,
    future::{Either, Shared, pending, select},
    pin_mut,
};
use futures_timer::Delay;

use crate::error::{DocumentStoreError, DocumentStoreResult};

/// Signals cancellation to every clone of its [`CancelToken`].
#[derive(Debug)]
pub struct CancelHandle {
    sender: oneshot::Sender<()>,
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn cancel(self) {
        self.flag.store(true, Ordering::SeqCst);
        let _ = self.sender.send(());
    }
}

/// Observes cancellation requested through a [`CancelHandle`] or an elapsed deadline.
///
/// Dropping the handle without calling [`CancelHandle::cancel`] leaves the token
/// uncancelled for good.
#[derive(Clone, Default)]
pub struct CancelToken {
    signal: Option<Shared<oneshot::Receiver<()>>>,
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelToken {
    pub fn new() -> (CancelHandle, CancelToken) {
        let (sender, receiver) = oneshot::channel();
        let flag = Arc::new(AtomicBool::new(false));

        (
            CancelHandle { sender, flag: flag.clone() },
            CancelToken {
                signal: Some(receiver.shared()),
                flag,
                deadline: None,
            },
        )
    }

    /// A token that is never cancelled.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
            || self
                .deadline
                .is_some_and(|deadline| Instant::now() >= deadline)
    }

    pub fn check(&self) -> DocumentStoreResult<()> {
        if self.is_cancelled() {
            Err(DocumentStoreError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Resolves once [`CancelHandle::cancel`] was called.
    async fn cancelled(&self) {
        match &self.signal {
            Some(signal) => {
                if signal.clone().await.is_err() {
                    pending::<()>().await;
                }
            }
            None => pending::<()>().await,
        }
    }

    /// Resolves once the deadline has passed.
    async fn elapsed(&self) {
        match self.deadline {
            Some(deadline) => Delay::new(deadline.saturating_duration_since(Instant::now())).await,
            None => pending::<()>().await,
        }
    }

    /// Runs `future` unless the token is cancelled or its deadline passes first.
    pub async fn race<F>(&self, future: F) -> DocumentStoreResult<F::Output>
    where
        F: Future,
    {
        self.check()?;

        let cancelled = self.cancelled();
        let elapsed = self.elapsed();
        pin_mut!(future, cancelled, elapsed);

        match select(future, select(cancelled, elapsed)).await {
            Either::Left((output, _)) => Ok(output),
            Either::Right(_) => Err(DocumentStoreError::Cancelled),
        }
    }

    /// [`race`](Self::race) for fallible store calls.
    pub async fn guard<F, T>(&self, future: F) -> DocumentStoreResult<T>
    where
        F: Future<Output = DocumentStoreResult<T>>,
    {
        self.race(future).await?
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .field("deadline", &self.deadline)
            .finish()
    }
}
