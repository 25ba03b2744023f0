#[macro_use]
extern crate tracing;

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use parking_lot::Mutex;

/// A dispatched execution that can be awaited from several places at once.
///
/// The first completion is cached, later awaits get a clone of the result.
pub type SharedExecution<T> = Shared<BoxFuture<'static, T>>;

/// A dispatch guard that delivers responses in request order.
///
/// Every dispatch is stamped with a generation taken from a monotonic
/// counter and installed as the latest execution. When an execution
/// completes it re-checks the counter; if a newer dispatch has been issued
/// in the meantime the execution's own result is discarded and the latest
/// dispatch's result is delivered to its awaiters instead.
///
/// This means a caller holding an older execution can never observe a
/// response that predates the most recent request, no matter in which
/// order the underlying calls actually resolve.
pub struct Dispatcher<T> {
    inner: Arc<DispatcherInner<T>>,
}

struct DispatcherInner<T> {
    /// Monotonic dispatch counter. Incremented for every dispatch and
    /// every reset, never decremented.
    generation: AtomicU64,

    /// The most recently dispatched execution.
    ///
    /// Written under the same lock that bumps the generation, so a stale
    /// execution always finds a strictly newer entry here (or none at
    /// all after a reset) and can never end up awaiting itself.
    latest: Mutex<Option<SharedExecution<T>>>,
}

impl<T> Dispatcher<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            inner: Arc::new(DispatcherInner {
                generation: AtomicU64::new(0),
                latest: Mutex::new(None),
            }),
        }
    }

    /// Dispatches a new execution, superseding anything currently in
    /// flight.
    ///
    /// The returned execution is also installed as the latest one and can
    /// be re-fetched via [`Dispatcher::latest`] until the next dispatch
    /// or reset.
    pub fn dispatch<F>(&self, fut: F) -> SharedExecution<T>
    where
        F: Future<Output = T> + Send + 'static,
    {
        let mut latest = self.inner.latest.lock();
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let inner = self.inner.clone();
        let guarded = async move {
            let result = fut.await;

            let delegate = {
                let latest = inner.latest.lock();
                if inner.generation.load(Ordering::SeqCst) == generation {
                    None
                } else {
                    latest.clone()
                }
            };

            match delegate {
                Some(newer) => {
                    debug!(
                        "response for dispatch generation={} superseded, \
                        delivering latest result instead",
                        generation,
                    );
                    newer.await
                },
                // Either still current, or superseded by a reset with
                // nothing re-dispatched yet. The result only reaches the
                // awaiters of this particular execution.
                None => result,
            }
        }
        .boxed()
        .shared();

        *latest = Some(guarded.clone());

        guarded
    }

    /// The most recently dispatched execution, if any.
    pub fn latest(&self) -> Option<SharedExecution<T>> {
        self.inner.latest.lock().clone()
    }

    /// Drops the cached execution and supersedes anything in flight.
    ///
    /// In-flight work is not cancelled; its eventual result is simply no
    /// longer delivered as the current one.
    pub fn reset(&self) {
        let mut latest = self.inner.latest.lock();
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        *latest = None;
    }

    /// The current dispatch generation.
    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }
}

impl<T> Default for Dispatcher<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
