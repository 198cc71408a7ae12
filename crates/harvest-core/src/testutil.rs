//! Test utilities: mock async handles and completion recorders.
//!
//! Handwritten mocks for driving fan-in joins in unit tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! tests to resolve handles after construction and assert on delivery.

use std::sync::{Arc, Mutex};

use tracing_subscriber::EnvFilter;

use crate::error::AppError;
use crate::fan_in::FanInResults;
use crate::traits::{AsyncHandle, Continuation};

/// Install a test-friendly tracing subscriber once per process.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ---------------------------------------------------------------------------
// MockHandle
// ---------------------------------------------------------------------------

/// Handle resolved manually by the test. Clones share state, so the test
/// keeps one clone and hands the other to the join.
pub struct MockHandle<T, E> {
    attached: Arc<Mutex<Option<(Continuation<T>, Continuation<E>)>>>,
    detached: Arc<Mutex<bool>>,
}

impl<T, E> MockHandle<T, E> {
    pub fn new() -> Self {
        Self {
            attached: Arc::new(Mutex::new(None)),
            detached: Arc::new(Mutex::new(false)),
        }
    }

    /// Deliver a success. Can be called repeatedly to simulate a faulty
    /// transport that completes twice.
    pub fn resolve(&self, value: T) -> Result<(), AppError> {
        let on_success = self.continuations().0;
        on_success.call(value)
    }

    pub fn reject(&self, error: E) -> Result<(), AppError> {
        let on_failure = self.continuations().1;
        on_failure.call(error)
    }

    pub fn is_detached(&self) -> bool {
        *self.detached.lock().unwrap()
    }

    fn continuations(&self) -> (Continuation<T>, Continuation<E>) {
        self.attached
            .lock()
            .unwrap()
            .clone()
            .expect("handle was never attached")
    }
}

impl<T, E> Clone for MockHandle<T, E> {
    fn clone(&self) -> Self {
        Self {
            attached: Arc::clone(&self.attached),
            detached: Arc::clone(&self.detached),
        }
    }
}

impl<T: Send, E: Send> AsyncHandle<T, E> for MockHandle<T, E> {
    fn attach(&mut self, on_success: Continuation<T>, on_failure: Continuation<E>) {
        *self.attached.lock().unwrap() = Some((on_success, on_failure));
    }

    fn detach(&mut self) {
        *self.detached.lock().unwrap() = true;
    }
}

// ---------------------------------------------------------------------------
// ImmediateHandle
// ---------------------------------------------------------------------------

/// Handle that delivers its outcome synchronously inside `attach`.
pub struct ImmediateHandle<T, E> {
    outcome: Option<Result<T, E>>,
}

impl<T, E> ImmediateHandle<T, E> {
    pub fn new(outcome: Result<T, E>) -> Self {
        Self {
            outcome: Some(outcome),
        }
    }
}

impl<T: Send, E: Send> AsyncHandle<T, E> for ImmediateHandle<T, E> {
    fn attach(&mut self, on_success: Continuation<T>, on_failure: Continuation<E>) {
        let delivered = match self.outcome.take() {
            Some(Ok(value)) => on_success.call(value),
            Some(Err(error)) => on_failure.call(error),
            None => Ok(()),
        };
        delivered.unwrap();
    }
}

// ---------------------------------------------------------------------------
// CompletionRecorder
// ---------------------------------------------------------------------------

/// Records every invocation of a fan-in terminal callback.
pub struct CompletionRecorder<T, E> {
    deliveries: Arc<Mutex<Vec<FanInResults<T, E>>>>,
}

impl<T, E> CompletionRecorder<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    pub fn new() -> Self {
        Self {
            deliveries: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn callback(&self) -> impl FnOnce(FanInResults<T, E>) + Send + use<T, E> {
        let deliveries = Arc::clone(&self.deliveries);
        move |results| deliveries.lock().unwrap().push(results)
    }

    /// Number of times the callback ran.
    pub fn calls(&self) -> usize {
        self.deliveries.lock().unwrap().len()
    }

    /// Results of the last delivery.
    pub fn results(&self) -> Option<FanInResults<T, E>> {
        self.deliveries.lock().unwrap().last().cloned()
    }

    /// Success values of the last delivery, panicking on a failed slot.
    pub fn values(&self) -> Option<Vec<T>> {
        self.results().map(|results| {
            results
                .into_iter()
                .map(|result| result.unwrap_or_else(|_| panic!("slot holds a failure")))
                .collect()
        })
    }
}
