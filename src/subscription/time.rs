//! Interval timer subscription.

use std::hash::{DefaultHasher, Hash, Hasher};
use std::time::{Duration, Instant};

use futures::StreamExt;
use futures::stream::BoxStream;
use tokio::time::{MissedTickBehavior, interval_at};
use tokio_stream::wrappers::IntervalStream;

use super::{SubscriptionId, SubscriptionSource};

/// Emits the current [`Instant`] once per period.
///
/// The first tick arrives one full period after the subscription starts.
/// Ticks missed while the process was busy are skipped rather than
/// delivered in a burst.
///
/// Two timers with the same period are the same subscription, so a timer
/// requested on every render keeps its phase instead of restarting.
///
/// ```
/// use std::time::Duration;
/// use rivulet::subscription::{Subscription, time::Every};
///
/// enum Message {
///     Tick,
/// }
///
/// let sub = Subscription::new(Every::new(Duration::from_millis(16))).map(|_| Message::Tick);
/// # drop(sub);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Every {
    period: Duration,
}

impl Every {
    /// A timer with the given period.
    ///
    /// # Panics
    ///
    /// Starting the subscription panics if `period` is zero; the panic is
    /// reported as a subscription start failure.
    #[must_use]
    pub const fn new(period: Duration) -> Self {
        Self { period }
    }

    #[must_use]
    pub const fn period(&self) -> Duration {
        self.period
    }
}

impl SubscriptionSource for Every {
    type Output = Instant;

    fn stream(&self) -> BoxStream<'static, Instant> {
        let start = tokio::time::Instant::now() + self.period;
        let mut ticks = interval_at(start, self.period);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);

        IntervalStream::new(ticks)
            .map(tokio::time::Instant::into_std)
            .boxed()
    }

    fn id(&self) -> SubscriptionId {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        SubscriptionId::of::<Self>(hasher.finish())
    }
}
