//! Fan-in join over a fixed, ordered set of operations.
//!
//! Each input is either an already-available result or a pending
//! [`AsyncHandle`]. The terminal callback fires exactly once, with results in
//! input order, when the last slot is filled.
//!
//! # States
//!
//! ```text
//! PENDING --[last slot filled]--> FIRED
//!    |
//!    +------[cancel()]----------> CANCELLED (never fires)
//! ```
//!
//! The callback runs synchronously on the call stack of the completion that
//! filled the last slot (or inside [`FanIn::new`] when every input is ready),
//! after the internal lock has been released.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::oneshot;
use uuid::Uuid;

use crate::error::AppError;
use crate::traits::{AsyncHandle, Continuation};

/// Ordered results delivered by a fan-in join.
pub type FanInResults<T, E> = Vec<Result<T, E>>;

type Terminal<T, E> = Box<dyn FnOnce(FanInResults<T, E>) + Send>;

/// One input of a fan-in join.
pub enum FanInInput<T, E> {
    /// Result already available at construction.
    Ready(Result<T, E>),
    /// Operation that will deliver its result through continuations.
    Pending(Box<dyn AsyncHandle<T, E>>),
}

impl<T, E> FanInInput<T, E> {
    pub fn ready(value: T) -> Self {
        FanInInput::Ready(Ok(value))
    }

    pub fn failed(error: E) -> Self {
        FanInInput::Ready(Err(error))
    }

    pub fn pending(handle: impl AsyncHandle<T, E> + 'static) -> Self {
        FanInInput::Pending(Box::new(handle))
    }
}

impl<T, E> fmt::Debug for FanInInput<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FanInInput::Ready(Ok(_)) => write!(f, "Ready(Ok)"),
            FanInInput::Ready(Err(_)) => write!(f, "Ready(Err)"),
            FanInInput::Pending(_) => write!(f, "Pending"),
        }
    }
}

/// Lifecycle state of a fan-in join.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanInState {
    /// Waiting for at least one slot.
    Pending,
    /// Terminal callback delivered; no further mutation.
    Fired,
    /// Cancelled before completion; will never fire.
    Cancelled,
}

impl fmt::Display for FanInState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FanInState::Pending => write!(f, "pending"),
            FanInState::Fired => write!(f, "fired"),
            FanInState::Cancelled => write!(f, "cancelled"),
        }
    }
}

struct FanInInner<T, E> {
    slots: Vec<Option<Result<T, E>>>,
    set_count: usize,
    state: FanInState,
    on_complete: Option<Terminal<T, E>>,
}

/// State shared between the aggregator and the continuations it hands out.
struct Shared<T, E> {
    id: Uuid,
    total: usize,
    inner: Mutex<FanInInner<T, E>>,
}

impl<T, E> Shared<T, E> {
    /// Acquires the inner mutex lock, recovering from poison if necessary.
    fn lock_inner(&self) -> MutexGuard<'_, FanInInner<T, E>> {
        self.inner.lock().unwrap_or_else(|poisoned| {
            tracing::warn!(aggregator = %self.id, "Recovered from poisoned mutex");
            poisoned.into_inner()
        })
    }

    /// Record the result for slot `index`, firing if it was the last one.
    fn complete(&self, index: usize, result: Result<T, E>) -> Result<(), AppError> {
        let fired = {
            let mut inner = self.lock_inner();
            match inner.state {
                FanInState::Pending => {}
                FanInState::Fired => {
                    tracing::warn!(aggregator = %self.id, slot = index, "Completion after fan-in fired");
                    return Err(AppError::AlreadyFired);
                }
                FanInState::Cancelled => {
                    tracing::warn!(aggregator = %self.id, slot = index, "Completion after fan-in cancelled");
                    return Err(AppError::Cancelled);
                }
            }

            match inner.slots.get_mut(index) {
                Some(slot) if slot.is_none() => *slot = Some(result),
                _ => {
                    tracing::warn!(aggregator = %self.id, slot = index, "Slot completed twice");
                    return Err(AppError::SlotAlreadySet(index));
                }
            }
            inner.set_count += 1;
            tracing::debug!(
                aggregator = %self.id,
                slot = index,
                set = inner.set_count,
                total = self.total,
                "Fan-in slot set"
            );
            self.take_if_complete(&mut inner)
        };

        if let Some((on_complete, results)) = fired {
            on_complete(results);
        }
        Ok(())
    }

    /// Transition to Fired when every slot is set. Returns the callback and
    /// results so the caller can invoke it outside the lock.
    fn take_if_complete(
        &self,
        inner: &mut FanInInner<T, E>,
    ) -> Option<(Terminal<T, E>, FanInResults<T, E>)> {
        if inner.state != FanInState::Pending || inner.set_count != self.total {
            return None;
        }
        inner.state = FanInState::Fired;
        let results: FanInResults<T, E> = inner.slots.iter_mut().filter_map(Option::take).collect();
        tracing::info!(aggregator = %self.id, total = self.total, "Fan-in fired");
        inner.on_complete.take().map(|on_complete| (on_complete, results))
    }

    fn fire_if_complete(&self) {
        let fired = {
            let mut inner = self.lock_inner();
            self.take_if_complete(&mut inner)
        };
        if let Some((on_complete, results)) = fired {
            on_complete(results);
        }
    }
}

/// Joins an ordered list of ready results and pending handles into one
/// completion event.
pub struct FanIn<T, E> {
    shared: Arc<Shared<T, E>>,
    handles: Vec<Box<dyn AsyncHandle<T, E>>>,
}

impl<T, E> FanIn<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Start a join over `inputs`. `on_complete` receives the results in
    /// input order exactly once. With no inputs, or only ready inputs, it
    /// runs before this returns.
    ///
    /// Each pending handle is attached here. A handle that never delivers
    /// (for example a [`FutureHandle`](crate::handle::FutureHandle) attached
    /// without a tokio runtime) keeps the join pending until [`cancel`](Self::cancel).
    pub fn new<I, F>(inputs: I, on_complete: F) -> Self
    where
        I: IntoIterator<Item = FanInInput<T, E>>,
        F: FnOnce(FanInResults<T, E>) + Send + 'static,
    {
        let inputs: Vec<FanInInput<T, E>> = inputs.into_iter().collect();
        let total = inputs.len();
        let shared = Arc::new(Shared {
            id: Uuid::new_v4(),
            total,
            inner: Mutex::new(FanInInner {
                slots: (0..total).map(|_| None).collect(),
                set_count: 0,
                state: FanInState::Pending,
                on_complete: Some(Box::new(on_complete)),
            }),
        });
        tracing::debug!(aggregator = %shared.id, total, "Fan-in created");

        let mut handles = Vec::new();
        for (index, input) in inputs.into_iter().enumerate() {
            match input {
                FanInInput::Ready(result) => {
                    let mut inner = shared.lock_inner();
                    inner.slots[index] = Some(result);
                    inner.set_count += 1;
                }
                FanInInput::Pending(mut handle) => {
                    let on_success = {
                        let shared = Arc::clone(&shared);
                        Continuation::new(move |value: T| shared.complete(index, Ok(value)))
                    };
                    let on_failure = {
                        let shared = Arc::clone(&shared);
                        Continuation::new(move |error: E| shared.complete(index, Err(error)))
                    };
                    handle.attach(on_success, on_failure);
                    handles.push(handle);
                }
            }
        }

        shared.fire_if_complete();
        Self { shared, handles }
    }

    /// Start a join whose results are delivered through a oneshot channel.
    ///
    /// The receiver yields an error if the join is cancelled.
    pub fn channel<I>(inputs: I) -> (Self, oneshot::Receiver<FanInResults<T, E>>)
    where
        I: IntoIterator<Item = FanInInput<T, E>>,
    {
        let (tx, rx) = oneshot::channel();
        let fan_in = Self::new(inputs, move |results| {
            if tx.send(results).is_err() {
                tracing::debug!("Fan-in receiver dropped before results arrived");
            }
        });
        (fan_in, rx)
    }
}

impl<T, E> FanIn<T, E> {
    /// Identifier used in log output.
    pub fn id(&self) -> Uuid {
        self.shared.id
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.shared.total
    }

    pub fn is_empty(&self) -> bool {
        self.shared.total == 0
    }

    /// Number of slots holding a result. Equals `len()` once fired.
    pub fn set_count(&self) -> usize {
        self.shared.lock_inner().set_count
    }

    pub fn state(&self) -> FanInState {
        self.shared.lock_inner().state
    }

    pub fn is_fired(&self) -> bool {
        self.state() == FanInState::Fired
    }

    /// Abandon the join: detach every pending handle and drop the terminal
    /// callback. The join stays unfired forever; later completions are
    /// rejected with [`AppError::Cancelled`]. Cancelling twice is a no-op.
    pub fn cancel(&mut self) -> Result<(), AppError> {
        {
            let mut inner = self.shared.lock_inner();
            match inner.state {
                FanInState::Fired => return Err(AppError::AlreadyFired),
                FanInState::Cancelled => return Ok(()),
                FanInState::Pending => {
                    inner.state = FanInState::Cancelled;
                    inner.on_complete = None;
                }
            }
            tracing::info!(
                aggregator = %self.shared.id,
                set = inner.set_count,
                total = self.shared.total,
                "Fan-in cancelled"
            );
        }

        for handle in &mut self.handles {
            handle.detach();
        }
        Ok(())
    }
}

impl<T, E> fmt::Debug for FanIn<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.shared.lock_inner();
        f.debug_struct("FanIn")
            .field("id", &self.shared.id)
            .field("total", &self.shared.total)
            .field("set_count", &inner.set_count)
            .field("state", &inner.state)
            .finish()
    }
}
