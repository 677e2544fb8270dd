use std::time::Duration;

/// Configuration for runtime teardown behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// How long shutdown waits for in-flight commands before abandoning them.
    ///
    /// Messages emitted by commands after shutdown are discarded either way;
    /// a grace period only lets effects (writes, requests) run to completion.
    /// Zero abandons in-flight commands immediately.
    pub command_grace: Duration,

    /// How long stopping a subscription waits for its task to wind down.
    ///
    /// A task that is still running after this is aborted and reported as
    /// a [`Failure::SubscriptionStop`](crate::error::Failure::SubscriptionStop).
    pub stop_timeout: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            command_grace: Duration::ZERO,
            stop_timeout: Duration::from_secs(1),
        }
    }
}

impl RuntimeConfig {
    /// Creates a configuration with the given command grace period and stop timeout.
    #[must_use]
    pub const fn new(command_grace: Duration, stop_timeout: Duration) -> Self {
        Self {
            command_grace,
            stop_timeout,
        }
    }
}
