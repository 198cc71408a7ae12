use std::fmt;
use std::sync::Arc;

use crate::error::AppError;

/// Callback handed to an [`AsyncHandle`] for delivering one outcome.
///
/// Cheap to clone. Calling it returns an error when the receiving side no
/// longer accepts the value (for a fan-in slot: already set, already fired,
/// or cancelled); the handle decides whether to log or propagate that.
pub struct Continuation<V> {
    inner: Arc<dyn Fn(V) -> Result<(), AppError> + Send + Sync>,
}

impl<V> Continuation<V> {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(V) -> Result<(), AppError> + Send + Sync + 'static,
    {
        Self { inner: Arc::new(f) }
    }

    pub fn call(&self, value: V) -> Result<(), AppError> {
        (self.inner)(value)
    }
}

impl<V> Clone for Continuation<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> fmt::Debug for Continuation<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Continuation").finish_non_exhaustive()
    }
}

/// A pending operation owned by the transport layer.
///
/// The only capability required is attaching a success and a failure
/// continuation. Implementations call at most one of them, at most once,
/// at any time after `attach` (including synchronously inside it).
pub trait AsyncHandle<T, E>: Send {
    fn attach(&mut self, on_success: Continuation<T>, on_failure: Continuation<E>);

    /// Stop delivering the outcome. Called when a join over this handle is
    /// cancelled; the default does nothing.
    fn detach(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_continuation_clones_share_callback() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let continuation = Continuation::new(move |value: u32| {
            sink.lock().unwrap().push(value);
            Ok(())
        });

        let other = continuation.clone();
        continuation.call(1).unwrap();
        other.call(2).unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_continuation_propagates_rejection() {
        let continuation = Continuation::new(|_: ()| Err(AppError::AlreadyFired));
        assert!(matches!(continuation.call(()), Err(AppError::AlreadyFired)));
    }
}
