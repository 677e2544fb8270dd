//! Controllable subscription source for tests.
//!
//! [`MockSource`] emits values only when told to, which makes subscription
//! behavior deterministic: no timers, no I/O.
//!
//! ```
//! use rivulet::subscription::{Subscription, mock::MockSource};
//!
//! let mock = MockSource::<i32>::new();
//! let subscription = Subscription::new(mock.clone()).map(|n| n * 2);
//!
//! // Nothing listens until the runtime starts the subscription
//! assert!(mock.emit(1).is_err());
//! # drop(subscription);
//! ```
//!
//! Clones share the same channel and the same identity, so the copy kept by a
//! test and the copy handed out from `subscriptions()` are the same
//! subscription as far as the runtime is concerned.

use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};

use futures::StreamExt;
use futures::stream::BoxStream;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use super::{SubscriptionId, SubscriptionSource};

static NEXT_MOCK: AtomicU64 = AtomicU64::new(0);

/// A subscription source that emits values on demand.
///
/// Every call to [`MockSource::new`] creates a distinct source with its own id.
#[derive(Debug, Clone)]
pub struct MockSource<T: Clone> {
    sender: broadcast::Sender<T>,
    id: SubscriptionId,
}

impl<T: Clone + Send + 'static> MockSource<T> {
    /// Creates a source that buffers up to `capacity` values per listener.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let mut hasher = DefaultHasher::new();
        NEXT_MOCK.fetch_add(1, Ordering::Relaxed).hash(&mut hasher);

        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            id: SubscriptionId::of::<Self>(hasher.finish()),
        }
    }

    /// Creates a source with a buffer of 100 values.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(100)
    }

    /// Emits a value to every running subscription of this source.
    ///
    /// # Errors
    ///
    /// Returns the value back if no subscription is running.
    pub fn emit(&self, value: T) -> Result<usize, broadcast::error::SendError<T>> {
        self.sender.send(value)
    }

    /// Number of running subscriptions listening to this source.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl<T: Clone + Send + 'static> Default for MockSource<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + 'static> SubscriptionSource for MockSource<T> {
    type Output = T;

    fn stream(&self) -> BoxStream<'static, T> {
        BroadcastStream::new(self.sender.subscribe())
            .filter_map(|result| async move { result.ok() })
            .boxed()
    }

    fn id(&self) -> SubscriptionId {
        self.id
    }
}
