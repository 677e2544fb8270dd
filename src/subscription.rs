//! Long-lived event sources and their lifecycle.
//!
//! A [`Subscription`] describes how to listen to an external source (a timer, a
//! socket, a channel). Unlike a [`Command`](crate::command::Command), a running
//! subscription outlives the render that asked for it: after every render the
//! runtime asks the application for the subscriptions it wants and reconciles
//! that set against the running ones by [`SubscriptionId`].
//!
//! - A subscription that is still requested keeps running untouched.
//! - A newly requested subscription is started.
//! - A subscription that is no longer requested is stopped exactly once, and
//!   nothing it emitted is applied afterwards, even if it was already queued.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use rivulet::subscription::{Subscription, time::Every};
//!
//! enum Message {
//!     Tick,
//! }
//!
//! let sub = Subscription::new(Every::new(Duration::from_secs(1))).map(|_| Message::Tick);
//! assert_eq!(sub.id(), Subscription::new(Every::new(Duration::from_secs(1))).id());
//! ```

pub mod mock;
pub mod time;

use std::any::TypeId;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::BoxStream;
use futures::{FutureExt, StreamExt};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::dispatch::{Dispatch, Envelope};
use crate::error::{Failure, panic_message};

/// Logical identity of a subscription.
///
/// Two subscriptions with the same id are considered the same subscription,
/// regardless of which closure or value instance describes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId {
    type_id: TypeId,
    type_name: &'static str,
    hash: u64,
}

impl SubscriptionId {
    /// Creates an id for source type `T` with a hash of its configuration.
    #[must_use]
    pub fn of<T: 'static>(hash: u64) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            hash,
        }
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{:016x}", self.type_name, self.hash)
    }
}

/// An external source of values.
///
/// Implementors describe how to open a stream of values and how to identify
/// themselves; the runtime takes care of starting, forwarding and stopping.
pub trait SubscriptionSource: Send + 'static {
    /// The values this source produces.
    type Output;

    /// Opens the source. Called once per start.
    fn stream(&self) -> BoxStream<'static, Self::Output>;

    /// The logical identity of this source, derived from its configuration.
    fn id(&self) -> SubscriptionId;
}

type Spawn<Msg> = Box<dyn Fn() -> BoxStream<'static, Msg> + Send>;

/// A subscription producing application messages.
pub struct Subscription<Msg> {
    id: SubscriptionId,
    spawn: Option<Spawn<Msg>>,
}

struct NoSource;

impl<Msg: Send + 'static> Subscription<Msg> {
    /// Wraps a source.
    pub fn new<S>(source: S) -> Self
    where
        S: SubscriptionSource<Output = Msg>,
    {
        Self {
            id: source.id(),
            spawn: Some(Box::new(move || source.stream())),
        }
    }

    /// A subscription that listens to nothing.
    ///
    /// Starting it yields a stop handle that has nothing to clean up.
    #[must_use]
    pub fn none() -> Self {
        Self {
            id: SubscriptionId::of::<NoSource>(0),
            spawn: None,
        }
    }

    #[must_use]
    pub const fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Converts the values of this subscription into another message type.
    ///
    /// The identity is unchanged: mapping the same source twice yields two
    /// subscriptions that are considered equal.
    pub fn map<T: Send + 'static>(self, f: impl Fn(Msg) -> T + Send + Sync + 'static) -> Subscription<T> {
        let f = Arc::new(f);
        let spawn = self.spawn.map(|spawn| -> Spawn<T> {
            Box::new(move || {
                let f = Arc::clone(&f);
                spawn().map(move |msg| f(msg)).boxed()
            })
        });
        Subscription { id: self.id, spawn }
    }
}

impl<Msg> fmt::Debug for Subscription<Msg> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish_non_exhaustive()
    }
}

/// One started run of a subscription.
///
/// A subscription that is stopped and later requested again gets a new
/// generation, so emissions from the earlier run can be told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Instance {
    pub(crate) id: SubscriptionId,
    pub(crate) generation: u64,
}

/// Stop handle of a running subscription.
#[derive(Debug)]
pub(crate) struct StopHandle {
    token: CancellationToken,
    join: Option<JoinHandle<()>>,
}

impl StopHandle {
    fn new(token: CancellationToken, join: JoinHandle<()>) -> Self {
        Self {
            token,
            join: Some(join),
        }
    }

    fn noop() -> Self {
        Self {
            token: CancellationToken::new(),
            join: None,
        }
    }

    /// Signals the subscription to stop. Calling it more than once is harmless.
    pub(crate) fn stop(&self) {
        self.token.cancel();
    }

    /// Signals the subscription to stop and waits up to `timeout` for its task.
    async fn cancel(mut self, timeout: Duration) -> Result<(), String> {
        self.stop();
        let Some(mut join) = self.join.take() else {
            return Ok(());
        };
        match tokio::time::timeout(timeout, &mut join).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) if err.is_panic() => Err(panic_message(err.into_panic().as_ref())),
            Ok(Err(err)) => Err(err.to_string()),
            Err(_) => {
                join.abort();
                Err(format!("task did not stop within {timeout:?}"))
            }
        }
    }
}

impl Drop for StopHandle {
    fn drop(&mut self) {
        // Never leave a forwarding task behind, even without an explicit stop
        self.token.cancel();
    }
}

struct Running {
    generation: u64,
    handle: StopHandle,
}

/// Owns every running subscription of a runtime.
pub(crate) struct SubscriptionManager<Msg> {
    active: HashMap<SubscriptionId, Running>,
    dispatch: Dispatch<Msg>,
    next_generation: u64,
    stop_timeout: Duration,
}

impl<Msg: Send + 'static> SubscriptionManager<Msg> {
    pub(crate) fn new(dispatch: Dispatch<Msg>, stop_timeout: Duration) -> Self {
        Self {
            active: HashMap::new(),
            dispatch,
            next_generation: 0,
            stop_timeout,
        }
    }

    /// Brings the running set in line with `subscriptions`.
    ///
    /// Returns the failures met while starting and stopping.
    pub(crate) async fn reconcile(&mut self, subscriptions: Vec<Subscription<Msg>>) -> Vec<Failure> {
        let requested: HashSet<SubscriptionId> = subscriptions.iter().map(Subscription::id).collect();

        let stale: Vec<SubscriptionId> = self
            .active
            .keys()
            .filter(|id| !requested.contains(id))
            .copied()
            .collect();

        let mut failures = Vec::new();
        for id in stale {
            failures.extend(self.stop(id).await);
        }

        for sub in subscriptions {
            if self.active.contains_key(&sub.id()) {
                continue;
            }
            match self.start(sub) {
                Ok((id, running)) => {
                    self.active.insert(id, running);
                }
                Err(failure) => failures.push(failure),
            }
        }
        failures
    }

    /// Whether messages from `instance` may still be applied.
    pub(crate) fn is_current(&self, instance: Instance) -> bool {
        self.active
            .get(&instance.id)
            .is_some_and(|running| running.generation == instance.generation)
    }

    /// Drops the entry of an instance whose task has already ended.
    ///
    /// Returns `false` if the instance was stopped or replaced in the meantime.
    pub(crate) fn forget(&mut self, instance: Instance) -> bool {
        if !self.is_current(instance) {
            return false;
        }
        self.active.remove(&instance.id);
        tracing::debug!(id = %instance.id, generation = instance.generation, "forgot dead subscription");
        true
    }

    /// Stops every running subscription.
    pub(crate) async fn stop_all(&mut self) -> Vec<Failure> {
        let ids: Vec<SubscriptionId> = self.active.keys().copied().collect();
        let mut failures = Vec::new();
        for id in ids {
            failures.extend(self.stop(id).await);
        }
        failures
    }

    pub(crate) fn len(&self) -> usize {
        self.active.len()
    }

    pub(crate) fn contains(&self, id: SubscriptionId) -> bool {
        self.active.contains_key(&id)
    }

    fn start(&mut self, sub: Subscription<Msg>) -> Result<(SubscriptionId, Running), Failure> {
        let id = sub.id();
        let generation = self.next_generation;
        self.next_generation += 1;

        let handle = match sub.spawn {
            None => StopHandle::noop(),
            Some(spawn) => {
                let mut stream = catch_unwind(AssertUnwindSafe(|| spawn())).map_err(|payload| {
                    Failure::SubscriptionStart {
                        id,
                        reason: panic_message(payload.as_ref()),
                    }
                })?;

                let instance = Instance { id, generation };
                let token = CancellationToken::new();
                let cancelled = token.clone();
                let dispatch = self.dispatch.clone();
                let join = tokio::spawn(async move {
                    loop {
                        let envelope = tokio::select! {
                            biased;
                            () = cancelled.cancelled() => break,
                            item = AssertUnwindSafe(stream.next()).catch_unwind() => match item {
                                Ok(Some(message)) => Envelope::Subscription { instance, message },
                                Ok(None) => break,
                                Err(payload) => {
                                    let reason = panic_message(payload.as_ref());
                                    tracing::warn!(%id, %reason, "subscription source panicked");
                                    let failure = Failure::SubscriptionPanicked { id, reason };
                                    // The loop forgets this instance when the failure arrives
                                    if dispatch.send(Envelope::SubscriptionFailed { instance, failure }).is_err() {
                                        tracing::trace!("runtime closed before subscription panic could be reported");
                                    }
                                    break;
                                }
                            },
                        };
                        if dispatch.send(envelope).is_err() {
                            break;
                        }
                    }
                });
                StopHandle::new(token, join)
            }
        };

        tracing::debug!(%id, generation, "started subscription");
        Ok((id, Running { generation, handle }))
    }

    async fn stop(&mut self, id: SubscriptionId) -> Option<Failure> {
        // Removed first so a failed stop never leaves a phantom entry
        let running = self.active.remove(&id)?;
        tracing::debug!(%id, generation = running.generation, "stopping subscription");
        running
            .handle
            .cancel(self.stop_timeout)
            .await
            .err()
            .map(|reason| Failure::SubscriptionStop { id, reason })
    }
}
