//! The entry point through which messages reach the runtime.
//!
//! Every message source (renderer callbacks, commands, subscriptions, the host)
//! funnels through a single unbounded channel. The runtime is the only consumer,
//! which makes the channel the serialization point: transitions are applied one
//! at a time in the order messages were accepted.

use std::fmt;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Failure};
use crate::subscription::Instance;

/// What travels over the runtime channel.
pub(crate) enum Envelope<Msg> {
    /// A message from the host, the renderer or a command.
    Message(Msg),
    /// A message from a running subscription instance.
    Subscription { instance: Instance, message: Msg },
    /// A non-fatal failure to report to the host.
    Failure(Failure),
    /// A running subscription instance died and must be forgotten.
    SubscriptionFailed { instance: Instance, failure: Failure },
    /// A command asked the runtime to shut down.
    Quit,
}

/// A cloneable handle for enqueuing messages.
///
/// `Dispatch` is handed to [`Application::view`](crate::application::Application::view)
/// so that interaction callbacks in the element tree can send messages later,
/// and to the [`Renderer`](crate::renderer::Renderer) with every new tree.
///
/// Dispatching never blocks and never waits for the transition to happen.
/// Once shutdown has been requested every dispatch is rejected; a message that
/// was accepted is applied and rendered before the runtime tears down.
///
/// # Example
///
/// ```
/// use rivulet::dispatch::Dispatch;
/// use rivulet::element::Button;
///
/// #[derive(Debug, Clone, PartialEq)]
/// enum Message {
///     Increment,
/// }
///
/// let (dispatch, mut inbox) = Dispatch::channel();
/// let button = Button::new("+").on_press(dispatch.emit(Message::Increment));
///
/// button.press();
/// assert_eq!(inbox.drain(), vec![Message::Increment]);
/// ```
pub struct Dispatch<Msg> {
    tx: mpsc::UnboundedSender<Envelope<Msg>>,
    shutdown: CancellationToken,
}

impl<Msg> Clone for Dispatch<Msg> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            shutdown: self.shutdown.clone(),
        }
    }
}

impl<Msg> fmt::Debug for Dispatch<Msg> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatch")
            .field("closed", &(self.tx.is_closed() || self.shutdown.is_cancelled()))
            .finish()
    }
}

impl<Msg: Send + 'static> Dispatch<Msg> {
    pub(crate) fn new(tx: mpsc::UnboundedSender<Envelope<Msg>>, shutdown: CancellationToken) -> Self {
        Self { tx, shutdown }
    }

    /// Creates a dispatch that is not attached to a runtime, together with
    /// the [`Inbox`] that receives everything sent through it.
    ///
    /// Useful for exercising `view` functions and their callbacks in isolation.
    #[must_use]
    pub fn channel() -> (Self, Inbox<Msg>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx, CancellationToken::new()), Inbox { rx })
    }

    /// Enqueues a message for the runtime.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShutDown`] once shutdown has been requested.
    pub fn dispatch(&self, message: Msg) -> Result<(), Error> {
        self.send(Envelope::Message(message))
    }

    /// Returns `true` once shutdown has been requested.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled() || self.tx.is_closed()
    }

    /// Builds a callback that dispatches a copy of `message` each time it is called.
    ///
    /// Messages dispatched after shutdown are dropped.
    pub fn emit(&self, message: Msg) -> impl Fn() + Send + Sync + 'static
    where
        Msg: Clone + Sync,
    {
        let dispatch = self.clone();
        move || dispatch.forward(message.clone())
    }

    /// Builds a callback that converts its argument into a message and dispatches it.
    ///
    /// Messages dispatched after shutdown are dropped.
    pub fn map<T>(
        &self,
        f: impl Fn(T) -> Msg + Send + Sync + 'static,
    ) -> impl Fn(T) + Send + Sync + 'static {
        let dispatch = self.clone();
        move |value| dispatch.forward(f(value))
    }

    pub(crate) fn send(&self, envelope: Envelope<Msg>) -> Result<(), Error> {
        if self.shutdown.is_cancelled() {
            return Err(Error::ShutDown);
        }
        self.tx.send(envelope).map_err(|_| Error::ShutDown)
    }

    fn forward(&self, message: Msg) {
        if self.dispatch(message).is_err() {
            tracing::trace!("dropping message dispatched after shutdown");
        }
    }
}

/// The receiving side of [`Dispatch::channel`].
#[derive(Debug)]
pub struct Inbox<Msg> {
    rx: mpsc::UnboundedReceiver<Envelope<Msg>>,
}

impl<Msg> Inbox<Msg> {
    /// Returns the next message already sent, if any.
    pub fn try_next(&mut self) -> Option<Msg> {
        while let Ok(envelope) = self.rx.try_recv() {
            match envelope {
                Envelope::Message(message) | Envelope::Subscription { message, .. } => {
                    return Some(message);
                }
                Envelope::Failure(_) | Envelope::SubscriptionFailed { .. } | Envelope::Quit => {}
            }
        }
        None
    }

    /// Returns every message already sent, in order.
    pub fn drain(&mut self) -> Vec<Msg> {
        std::iter::from_fn(|| self.try_next()).collect()
    }
}

/// A host-side handle to a runtime: dispatch plus teardown.
///
/// Obtained from [`Runtime::handle`](crate::runtime::Runtime::handle). Cloneable
/// and usable from any task while the runtime loop is running.
#[derive(Debug)]
pub struct Handle<Msg> {
    dispatch: Dispatch<Msg>,
    token: CancellationToken,
}

impl<Msg> Clone for Handle<Msg> {
    fn clone(&self) -> Self {
        Self {
            dispatch: self.dispatch.clone(),
            token: self.token.clone(),
        }
    }
}

impl<Msg: Send + 'static> Handle<Msg> {
    pub(crate) fn new(dispatch: Dispatch<Msg>, token: CancellationToken) -> Self {
        Self { dispatch, token }
    }

    /// Enqueues a message for the runtime.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShutDown`] once shutdown has been requested.
    pub fn dispatch(&self, message: Msg) -> Result<(), Error> {
        self.dispatch.dispatch(message)
    }

    /// Returns the dispatch function of this runtime.
    #[must_use]
    pub fn dispatcher(&self) -> Dispatch<Msg> {
        self.dispatch.clone()
    }

    /// Requests teardown.
    ///
    /// Further dispatches are rejected right away. Messages accepted before the
    /// request are still applied, then the runtime tears down.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Returns `true` once teardown has been requested.
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }
}
