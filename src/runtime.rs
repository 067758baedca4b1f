//! Thin async helpers over tokio
//!
//! Captures run on the caller's task; these helpers cover the two places the
//! crate needs more than that: waiting for the map to settle, and running an
//! analysis in the background with a handle that can cancel it.

use crate::prelude::Future;
use crate::{Error, Result};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Sleeps for `duration` unless `cancel` fires first.
pub async fn delay(duration: Duration, cancel: &CancellationToken) -> Result<()> {
    tokio::select! {
        _ = cancel.cancelled() => Err(Error::Cancelled),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}

/// Races `future` against `cancel`, returning `Error::Cancelled` if the token wins.
pub async fn cancellable<F, T>(future: F, cancel: &CancellationToken) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        result = future => result,
    }
}

/// Handle to a spawned task
pub trait AsyncHandle: Send + Sync {
    /// Check if the task is finished
    fn is_finished(&self) -> bool;

    /// Request cancellation; the task observes it at its next suspension point
    fn cancel(&self);
}

/// Handle to a spawned task that produces a value
pub struct TaskHandle<T> {
    handle: Arc<Mutex<Option<JoinHandle<T>>>>,
    cancel: CancellationToken,
}

impl<T: Send + 'static> TaskHandle<T> {
    /// Waits for the task to finish and returns its output
    pub async fn join(self) -> Result<T> {
        let handle = self.handle.lock().ok().and_then(|mut guard| guard.take());
        match handle {
            Some(handle) => handle.await.map_err(|e| {
                if e.is_cancelled() {
                    Error::Cancelled
                } else {
                    Error::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
                }
            }),
            None => Err(Error::Cancelled),
        }
    }

    /// The token handed to the task
    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }
}

impl<T: Send + 'static> AsyncHandle for TaskHandle<T> {
    fn is_finished(&self) -> bool {
        if let Ok(guard) = self.handle.lock() {
            if let Some(handle) = guard.as_ref() {
                return handle.is_finished();
            }
        }
        true
    }

    fn cancel(&self) {
        self.cancel.cancel();
    }
}

/// Spawns `task` on the current tokio runtime, passing it a fresh cancellation token
pub fn spawn<F, Fut, T>(task: F) -> TaskHandle<T>
where
    F: FnOnce(CancellationToken) -> Fut,
    Fut: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(task(cancel.clone()));
    log::debug!("spawned background task");
    TaskHandle {
        handle: Arc::new(Mutex::new(Some(handle))),
        cancel,
    }
}
