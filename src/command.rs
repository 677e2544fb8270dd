use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::{
    FutureExt, Stream, StreamExt, TryFutureExt,
    future::join_all,
    stream::{self, BoxStream},
};

use crate::dispatch::{Dispatch, Envelope};
use crate::error::{CommandError, Failure, panic_message};

/// An action that can be performed by a command.
///
/// Actions are emitted by command effects and processed by the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action<Msg> {
    /// Send a message to the application's update function.
    Message(Msg),

    /// Request the runtime to shut down.
    ///
    /// Handled exactly like [`Handle::shutdown`](crate::dispatch::Handle::shutdown).
    Quit,
}

impl<Msg> Action<Msg> {
    /// Converts the message carried by this action.
    pub fn map<T>(self, f: impl FnOnce(Msg) -> T) -> Action<T> {
        match self {
            Self::Message(msg) => Action::Message(f(msg)),
            Self::Quit => Action::Quit,
        }
    }
}

type Effect<Msg> = BoxStream<'static, Result<Action<Msg>, CommandError>>;

/// A one-shot asynchronous effect that produces messages.
///
/// `update` returns a command next to the new state; the runtime starts it
/// right away, concurrently with everything else, and feeds every message it
/// emits back through dispatch. A command runs once: it is never restarted by
/// later renders, and a failed command is not retried.
///
/// Messages of a single command arrive in the order it emits them. There is no
/// ordering between different commands, including the constituents of a batch.
///
/// # Examples
///
/// ```
/// use rivulet::command::Command;
///
/// enum Message {
///     GotResult(i32),
/// }
///
/// let cmd = Command::perform(async { 42 }, Message::GotResult);
/// assert!(!cmd.is_none());
/// ```
pub struct Command<Msg: Send + 'static> {
    pub(crate) effects: Vec<Effect<Msg>>,
}

/// What happened while executing a command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Completion {
    /// Messages accepted by dispatch.
    pub emitted: usize,
    /// Errors and panics raised by the constituents.
    pub failed: usize,
    /// Whether any constituent asked the runtime to quit.
    pub quit_requested: bool,
}

impl Completion {
    fn merge(self, other: Self) -> Self {
        Self {
            emitted: self.emitted + other.emitted,
            failed: self.failed + other.failed,
            quit_requested: self.quit_requested || other.quit_requested,
        }
    }
}

impl<Msg: Send + 'static> Command<Msg> {
    /// Create a command that does nothing.
    ///
    /// It completes immediately and emits no message.
    ///
    /// ```
    /// use rivulet::command::Command;
    ///
    /// let cmd: Command<i32> = Command::none();
    /// assert!(cmd.is_none());
    /// ```
    #[must_use]
    pub const fn none() -> Self {
        Self {
            effects: Vec::new(),
        }
    }

    /// Returns `true` if executing this command would do nothing.
    #[must_use]
    pub fn is_none(&self) -> bool {
        self.effects.is_empty()
    }

    /// Perform an asynchronous operation and convert its result to a message.
    pub fn perform<A>(
        future: impl Future<Output = A> + Send + 'static,
        f: impl FnOnce(A) -> Msg + Send + 'static,
    ) -> Self {
        Self::future(future.map(f))
    }

    /// Perform a fallible asynchronous operation.
    ///
    /// On success the value is converted to a message. On error nothing is
    /// dispatched; the error is reported as a
    /// [`Failure::Command`](crate::error::Failure::Command) instead.
    ///
    /// ```
    /// use rivulet::command::Command;
    ///
    /// enum Message {
    ///     Loaded(String),
    /// }
    ///
    /// let cmd = Command::try_perform(
    ///     async { std::fs::read_to_string("settings.toml") },
    ///     Message::Loaded,
    /// );
    /// # drop(cmd);
    /// ```
    pub fn try_perform<A, E>(
        future: impl Future<Output = Result<A, E>> + Send + 'static,
        f: impl FnOnce(A) -> Msg + Send + 'static,
    ) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        let effect = future
            .map_ok(|value| Action::Message(f(value)))
            .map_err(CommandError::new)
            .into_stream();
        Self {
            effects: vec![effect.boxed()],
        }
    }

    /// Create a command from a future that produces a message.
    pub fn future(future: impl Future<Output = Msg> + Send + 'static) -> Self {
        let effect = future.map(|msg| Ok(Action::Message(msg))).into_stream();
        Self {
            effects: vec![effect.boxed()],
        }
    }

    /// Create a command that performs a single action immediately.
    ///
    /// ```
    /// use rivulet::command::{Action, Command};
    ///
    /// // Shut the runtime down
    /// let cmd: Command<i32> = Command::effect(Action::Quit);
    ///
    /// // Send a message right away
    /// let cmd = Command::effect(Action::Message(42));
    /// ```
    pub fn effect(action: Action<Msg>) -> Self {
        Self {
            effects: vec![stream::once(async move { Ok(action) }).boxed()],
        }
    }

    /// Batch multiple commands into a single command.
    ///
    /// All constituents start together and run concurrently; the batch is
    /// complete once every constituent has completed. The order in which their
    /// messages arrive is not specified.
    ///
    /// ```
    /// use rivulet::command::Command;
    ///
    /// enum Message {
    ///     First(i32),
    ///     Second(String),
    /// }
    ///
    /// let cmd = Command::batch(vec![
    ///     Command::perform(async { 1 }, Message::First),
    ///     Command::perform(async { "data".to_string() }, Message::Second),
    ///     Command::none(),
    /// ]);
    /// ```
    pub fn batch(commands: impl IntoIterator<Item = Command<Msg>>) -> Self {
        Self {
            effects: commands.into_iter().flat_map(|cmd| cmd.effects).collect(),
        }
    }

    /// Create a command from a stream of messages.
    ///
    /// Each item is dispatched in stream order.
    pub fn stream(stream: impl Stream<Item = Msg> + Send + 'static) -> Self {
        Self {
            effects: vec![stream.map(|msg| Ok(Action::Message(msg))).boxed()],
        }
    }

    /// Run a stream and convert each item to a message.
    pub fn run<A>(
        stream: impl Stream<Item = A> + Send + 'static,
        f: impl Fn(A) -> Msg + Send + 'static,
    ) -> Self {
        Self::stream(stream.map(f))
    }

    /// Convert the messages this command produces.
    ///
    /// Lets a parent application embed the commands of a child component.
    pub fn map<T: Send + 'static>(self, f: impl Fn(Msg) -> T + Send + Sync + 'static) -> Command<T> {
        let f = Arc::new(f);
        let effects = self
            .effects
            .into_iter()
            .map(|effect| {
                let f = Arc::clone(&f);
                effect
                    .map(move |item| item.map(|action| action.map(|msg| f(msg))))
                    .boxed()
            })
            .collect();
        Command { effects }
    }

    /// Run every constituent to completion, feeding its output into `dispatch`.
    ///
    /// Constituents are polled concurrently. A constituent that panics is
    /// reported as a failure and stops; the others keep running. Once
    /// `dispatch` is closed, remaining output is discarded and the
    /// constituents are dropped.
    pub async fn execute(self, dispatch: Dispatch<Msg>) -> Completion {
        join_all(
            self.effects
                .into_iter()
                .map(|effect| drive(effect, dispatch.clone())),
        )
        .await
        .into_iter()
        .fold(Completion::default(), Completion::merge)
    }
}

impl<Msg: Send + 'static> Default for Command<Msg> {
    fn default() -> Self {
        Self::none()
    }
}

impl<Msg: Send + 'static> std::fmt::Debug for Command<Msg> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Command")
            .field("effects", &self.effects.len())
            .finish()
    }
}

async fn drive<Msg: Send + 'static>(mut effect: Effect<Msg>, dispatch: Dispatch<Msg>) -> Completion {
    let mut done = Completion::default();
    loop {
        let envelope = match AssertUnwindSafe(effect.next()).catch_unwind().await {
            Ok(None) => break,
            Ok(Some(Ok(Action::Message(msg)))) => Envelope::Message(msg),
            Ok(Some(Ok(Action::Quit))) => {
                done.quit_requested = true;
                Envelope::Quit
            }
            Ok(Some(Err(err))) => {
                done.failed += 1;
                Envelope::Failure(Failure::Command(err))
            }
            Err(payload) => {
                done.failed += 1;
                let failure = Failure::CommandPanicked(panic_message(payload.as_ref()));
                if dispatch.send(Envelope::Failure(failure)).is_err() {
                    tracing::trace!("runtime closed before command panic could be reported");
                }
                break;
            }
        };

        let is_message = matches!(envelope, Envelope::Message(_));
        if dispatch.send(envelope).is_err() {
            tracing::trace!("runtime closed; discarding remaining command output");
            break;
        }
        if is_message {
            done.emitted += 1;
        }
    }
    done
}
