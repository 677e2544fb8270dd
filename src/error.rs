//! Error types for the runtime.
//!
//! Errors come in two flavours:
//!
//! - [`Error`] is returned from runtime and dispatch operations. An
//!   [`Error::Application`] is fatal: the runtime has already torn itself down
//!   by the time it is returned.
//! - [`Failure`] describes a non-fatal problem in a command or subscription.
//!   Failures are reported on the channel returned by
//!   [`Runtime::failures`](crate::runtime::Runtime::failures) and never stop
//!   the dispatch loop.

use std::any::Any;
use std::fmt;

use thiserror::Error;

use crate::subscription::SubscriptionId;

/// The application callback that panicked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Init,
    Update,
    View,
    Subscriptions,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::Update => "update",
            Self::View => "view",
            Self::Subscriptions => "subscriptions",
        };
        f.write_str(name)
    }
}

/// Errors returned by the runtime.
#[derive(Debug, Error)]
pub enum Error {
    /// The runtime has shut down and no longer accepts messages.
    #[error("runtime has shut down")]
    ShutDown,

    /// [`Runtime::start`](crate::runtime::Runtime::start) was called on a runtime
    /// that is already running or has shut down.
    #[error("runtime was already started")]
    AlreadyStarted,

    /// An application callback panicked. The runtime cannot continue since
    /// calling the same pure function again would fail the same way.
    #[error("application panicked in {stage}: {message}")]
    Application { stage: Stage, message: String },
}

/// The error a command reports when its effect fails.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct CommandError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl CommandError {
    /// Creates an error carrying only a message.
    pub fn msg(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Wraps an underlying error, keeping it available through `source()`.
    pub fn new(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self {
            message: error.to_string(),
            source: Some(Box::new(error)),
        }
    }

    /// The human readable description of the failure.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// A non-fatal failure in a command or subscription.
#[derive(Debug, Error)]
pub enum Failure {
    /// A command's effect returned an error.
    #[error("command failed: {0}")]
    Command(#[from] CommandError),

    /// A command's effect panicked.
    #[error("command panicked: {0}")]
    CommandPanicked(String),

    /// A subscription could not be started. It is not recorded as active.
    #[error("subscription {id} failed to start: {reason}")]
    SubscriptionStart { id: SubscriptionId, reason: String },

    /// A running subscription's source panicked. It is removed from the active
    /// set and started again on the next render that still requests it.
    #[error("subscription {id} panicked: {reason}")]
    SubscriptionPanicked { id: SubscriptionId, reason: String },

    /// A subscription did not stop cleanly. It is removed from the active set anyway.
    #[error("subscription {id} failed to stop: {reason}")]
    SubscriptionStop { id: SubscriptionId, reason: String },
}

/// Extracts a printable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
