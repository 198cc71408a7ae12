//! [`AsyncHandle`] adapter for Rust futures.
//!
//! Lets a pipeline stage join futures produced by the transport layer
//! (fetches, extractions) with [`FanIn`](crate::fan_in::FanIn):
//!
//! ```rust,no_run
//! use harvest_core::fan_in::{FanIn, FanInInput};
//! use harvest_core::handle::FutureHandle;
//!
//! # async fn run() {
//! let (_join, results) = FanIn::<String, String>::channel(vec![
//!     FanInInput::ready("cached".to_string()),
//!     FutureHandle::new(async { Ok("fetched".to_string()) }).into(),
//! ]);
//! let ordered = results.await;
//! # }
//! ```

use std::future::Future;
use std::pin::Pin;

use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

use crate::fan_in::FanInInput;
use crate::traits::{AsyncHandle, Continuation};

type BoxedOutcome<T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send>>;

/// Drives a future on a tokio task and delivers its outcome to the attached
/// continuations.
///
/// The task is spawned on the runtime given to [`on_runtime`](Self::on_runtime),
/// or else on the runtime current when the handle is attached. With neither,
/// the outcome is never delivered and the error is logged; the owning join
/// stays pending until cancelled. Detaching stops the task.
pub struct FutureHandle<T, E> {
    future: Option<BoxedOutcome<T, E>>,
    runtime: Option<Handle>,
    cancel: CancellationToken,
}

impl<T, E> FutureHandle<T, E> {
    pub fn new<F>(future: F) -> Self
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
    {
        Self {
            future: Some(Box::pin(future)),
            runtime: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Spawn on `runtime` instead of the runtime current at attach time.
    pub fn on_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Token cancelled when this handle is detached.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

impl<T, E> AsyncHandle<T, E> for FutureHandle<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    fn attach(&mut self, on_success: Continuation<T>, on_failure: Continuation<E>) {
        let runtime = match self.runtime.clone().map_or_else(Handle::try_current, Ok) {
            Ok(runtime) => runtime,
            Err(e) => {
                tracing::error!(error = %e, "Future handle attached outside a tokio runtime");
                return;
            }
        };
        let Some(future) = self.future.take() else {
            tracing::warn!("Future handle attached more than once");
            return;
        };
        let cancel = self.cancel.clone();

        runtime.spawn(async move {
            tokio::select! {
                () = cancel.cancelled() => {
                    tracing::debug!("Future handle detached before completion");
                }
                outcome = future => {
                    let delivered = match outcome {
                        Ok(value) => on_success.call(value),
                        Err(error) => on_failure.call(error),
                    };
                    if let Err(e) = delivered {
                        tracing::warn!(error = %e, "Future outcome rejected");
                    }
                }
            }
        });
    }

    fn detach(&mut self) {
        self.cancel.cancel();
    }
}

impl<T, E> From<FutureHandle<T, E>> for FanInInput<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    fn from(handle: FutureHandle<T, E>) -> Self {
        FanInInput::pending(handle)
    }
}
