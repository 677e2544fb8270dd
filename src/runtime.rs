use std::panic::{AssertUnwindSafe, catch_unwind};

use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::{
    application::Application,
    command::Command,
    config::RuntimeConfig,
    dispatch::{Dispatch, Envelope, Handle},
    error::{Error, Failure, Stage, panic_message},
    renderer::Renderer,
    subscription::{SubscriptionId, SubscriptionManager},
};

/// Lifecycle of a [`Runtime`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Created, `init` not called yet.
    Uninitialized,
    /// Processing messages.
    Running,
    /// Torn down. Terminal.
    ShutDown,
}

/// Owns the state of an [`Application`] and drives it.
///
/// The runtime is the single consumer of the message channel. For every
/// accepted message it runs `update`, replaces the state, starts the returned
/// command, renders the new state and reconciles subscriptions, all before
/// looking at the next message. Commands and subscriptions run concurrently on
/// tokio and only ever enqueue.
///
/// # Example
///
/// ```
/// use rivulet::prelude::*;
/// use rivulet::element::Text;
///
/// struct Hello;
///
/// impl Application for Hello {
///     type State = String;
///     type Message = String;
///
///     fn init(&self) -> (String, Command<String>) {
///         ("hello".into(), Command::none())
///     }
///
///     fn update(&self, _state: &String, msg: String) -> (String, Command<String>) {
///         (msg, Command::effect(Action::Quit))
///     }
///
///     fn view(&self, state: &String, _dispatch: &Dispatch<String>) -> Element {
///         Text::new(state.clone()).into()
///     }
/// }
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), rivulet::error::Error> {
/// let recorder = Recorder::new();
/// let runtime = Runtime::new(Hello, recorder.clone());
/// runtime.handle().dispatch("world".into())?;
///
/// let state = runtime.run().await?;
/// assert_eq!(state, "world");
/// assert_eq!(recorder.len(), 2);
/// # Ok(())
/// # }
/// ```
pub struct Runtime<A: Application, R: Renderer<A::Message>> {
    app: A,
    renderer: R,
    config: RuntimeConfig,
    phase: Phase,
    state: Option<A::State>,
    dispatch: Dispatch<A::Message>,
    rx: mpsc::UnboundedReceiver<Envelope<A::Message>>,
    subscriptions: SubscriptionManager<A::Message>,
    commands: TaskTracker,
    shutdown: CancellationToken,
    abandon: CancellationToken,
    failures_tx: mpsc::UnboundedSender<Failure>,
    failures_rx: Option<mpsc::UnboundedReceiver<Failure>>,
    processed: u64,
}

impl<A: Application, R: Renderer<A::Message>> Runtime<A, R> {
    pub fn new(app: A, renderer: R) -> Self {
        Self::with_config(app, renderer, RuntimeConfig::default())
    }

    pub fn with_config(app: A, renderer: R, config: RuntimeConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (failures_tx, failures_rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();
        let dispatch = Dispatch::new(tx, shutdown.clone());
        let subscriptions = SubscriptionManager::new(dispatch.clone(), config.stop_timeout);

        Self {
            app,
            renderer,
            config,
            phase: Phase::Uninitialized,
            state: None,
            dispatch,
            rx,
            subscriptions,
            commands: TaskTracker::new(),
            shutdown,
            abandon: CancellationToken::new(),
            failures_tx,
            failures_rx: Some(failures_rx),
            processed: 0,
        }
    }

    /// A handle for dispatching and shutting down from other tasks.
    ///
    /// Messages dispatched before [`start`](Self::start) are queued and
    /// processed after the first render.
    #[must_use]
    pub fn handle(&self) -> Handle<A::Message> {
        Handle::new(self.dispatch.clone(), self.shutdown.clone())
    }

    /// The dispatch function of this runtime.
    #[must_use]
    pub fn dispatcher(&self) -> Dispatch<A::Message> {
        self.dispatch.clone()
    }

    /// Takes the receiver of non-fatal failures.
    ///
    /// Returns `None` after the first call. Failures are always logged; they
    /// are only queued for the host once this receiver has been taken.
    pub fn failures(&mut self) -> Option<mpsc::UnboundedReceiver<Failure>> {
        self.failures_rx.take()
    }

    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// The current state, once started.
    #[must_use]
    pub const fn state(&self) -> Option<&A::State> {
        self.state.as_ref()
    }

    /// Number of subscriptions currently running.
    #[must_use]
    pub fn active_subscriptions(&self) -> usize {
        self.subscriptions.len()
    }

    /// Whether a subscription with `id` is currently running.
    #[must_use]
    pub fn is_subscribed(&self, id: SubscriptionId) -> bool {
        self.subscriptions.contains(id)
    }

    /// Calls `init`, renders the initial state, starts the requested
    /// subscriptions and the startup command.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyStarted`] unless the runtime is uninitialized,
    /// or [`Error::Application`] if an application callback panicked.
    pub async fn start(&mut self) -> Result<(), Error> {
        if self.phase != Phase::Uninitialized {
            return Err(Error::AlreadyStarted);
        }

        let (state, cmd) = match guarded(Stage::Init, || self.app.init()) {
            Ok(init) => init,
            Err(err) => return Err(self.fail(err).await),
        };

        tracing::debug!("runtime started");
        self.phase = Phase::Running;
        self.commit(state, cmd).await
    }

    /// Processes exactly one queued item, waiting for one if necessary.
    ///
    /// Starts the runtime first if it is uninitialized. Returns the phase
    /// afterwards; once [`Phase::ShutDown`] is returned, further calls return
    /// immediately.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Application`] if an application callback panicked. The
    /// runtime has shut down when this happens.
    pub async fn step(&mut self) -> Result<Phase, Error> {
        match self.phase {
            Phase::Uninitialized => {
                self.start().await?;
                return Ok(self.phase);
            }
            Phase::ShutDown => return Ok(Phase::ShutDown),
            Phase::Running => {}
        }

        let envelope = tokio::select! {
            biased;
            () = self.shutdown.cancelled() => None,
            envelope = self.rx.recv() => envelope,
        };

        match envelope {
            None => {
                tracing::debug!("shutdown requested");
                self.wind_down().await?;
            }
            Some(Envelope::Quit) => {
                tracing::debug!("command requested quit");
                self.wind_down().await?;
            }
            Some(envelope) => self.process(envelope).await?,
        }
        Ok(self.phase)
    }

    /// Runs until shutdown and returns the final state.
    ///
    /// The loop ends when a [`Handle`] requests shutdown or a command emits
    /// [`Action::Quit`](crate::command::Action::Quit).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Application`] if an application callback panicked, or
    /// [`Error::ShutDown`] if the runtime was shut down before it ever started.
    pub async fn run(mut self) -> Result<A::State, Error> {
        while self.step().await? != Phase::ShutDown {}
        self.state.take().ok_or(Error::ShutDown)
    }

    /// Shuts the runtime down.
    ///
    /// Closes the message channel first, so every later dispatch fails with
    /// [`Error::ShutDown`]. Messages accepted before that are still applied and
    /// rendered, in order. Then every subscription is stopped and in-flight
    /// commands get up to [`command_grace`](RuntimeConfig::command_grace)
    /// before they are abandoned; anything they emit is discarded.
    ///
    /// A runtime that never started has no state to apply messages to, so its
    /// queue is discarded. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Application`] if an application callback panicked while
    /// applying the queued messages.
    pub async fn shutdown(&mut self) -> Result<(), Error> {
        self.wind_down().await
    }

    async fn process(&mut self, envelope: Envelope<A::Message>) -> Result<(), Error> {
        match envelope {
            Envelope::Message(msg) => return self.apply(msg).await,
            Envelope::Subscription { instance, message } => {
                if self.subscriptions.is_current(instance) {
                    return self.apply(message).await;
                }
                tracing::trace!(id = %instance.id, "dropping emission from stopped subscription");
            }
            Envelope::SubscriptionFailed { instance, failure } => {
                if self.subscriptions.forget(instance) {
                    self.report(failure);
                } else {
                    tracing::trace!(id = %instance.id, "ignoring failure of stopped subscription");
                }
            }
            Envelope::Failure(failure) => self.report(failure),
            Envelope::Quit => {}
        }
        Ok(())
    }

    async fn wind_down(&mut self) -> Result<(), Error> {
        if self.phase == Phase::ShutDown {
            return Ok(());
        }
        self.shutdown.cancel();
        self.rx.close();

        // Nothing can be queued any more; apply what was accepted
        if self.phase == Phase::Running {
            while let Ok(envelope) = self.rx.try_recv() {
                self.process(envelope).await?;
            }
        }

        self.teardown().await;
        Ok(())
    }

    async fn apply(&mut self, msg: A::Message) -> Result<(), Error> {
        let Some(state) = self.state.as_ref() else {
            return Ok(());
        };

        self.processed += 1;
        tracing::trace!(seq = self.processed, "applying message");

        let (next, cmd) = match guarded(Stage::Update, || self.app.update(state, msg)) {
            Ok(transition) => transition,
            Err(err) => return Err(self.fail(err).await),
        };
        self.commit(next, cmd).await
    }

    /// Replaces the state, starts `cmd`, renders and reconciles subscriptions.
    async fn commit(&mut self, state: A::State, cmd: Command<A::Message>) -> Result<(), Error> {
        let tree = match guarded(Stage::View, || self.app.view(&state, &self.dispatch)) {
            Ok(tree) => tree,
            Err(err) => return Err(self.fail(err).await),
        };
        let wanted = match guarded(Stage::Subscriptions, || self.app.subscriptions(&state)) {
            Ok(wanted) => wanted,
            Err(err) => return Err(self.fail(err).await),
        };

        self.state = Some(state);
        self.spawn(cmd);
        self.renderer.render(tree, &self.dispatch);

        for failure in self.subscriptions.reconcile(wanted).await {
            self.report(failure);
        }
        Ok(())
    }

    fn spawn(&self, cmd: Command<A::Message>) {
        if cmd.is_none() {
            return;
        }

        tracing::debug!(effects = cmd.effects.len(), "spawning command");
        let dispatch = self.dispatch.clone();
        let abandon = self.abandon.clone();
        self.commands.spawn(async move {
            tokio::select! {
                () = abandon.cancelled() => tracing::debug!("abandoned in-flight command"),
                done = cmd.execute(dispatch) => tracing::trace!(?done, "command completed"),
            }
        });
    }

    fn report(&self, failure: Failure) {
        tracing::warn!(%failure, "non-fatal failure");
        // Only queue once the host has taken the receiver
        if self.failures_rx.is_none() && self.failures_tx.send(failure).is_err() {
            tracing::trace!("failure receiver dropped");
        }
    }

    async fn fail(&mut self, err: Error) -> Error {
        tracing::error!(%err, "fatal application error");
        self.teardown().await;
        err
    }

    async fn teardown(&mut self) {
        if self.phase == Phase::ShutDown {
            return;
        }
        self.phase = Phase::ShutDown;
        self.shutdown.cancel();
        self.rx.close();

        for failure in self.subscriptions.stop_all().await {
            self.report(failure);
        }

        self.commands.close();
        if !self.config.command_grace.is_zero()
            && timeout(self.config.command_grace, self.commands.wait())
                .await
                .is_err()
        {
            tracing::debug!(pending = self.commands.len(), "command grace period elapsed");
        }
        self.abandon.cancel();

        // Only reached with messages left after a fatal error; failures still get reported
        while let Ok(envelope) = self.rx.try_recv() {
            if let Envelope::Failure(failure) = envelope {
                self.report(failure);
            }
        }

        tracing::debug!(processed = self.processed, "runtime shut down");
    }
}

impl<A: Application, R: Renderer<A::Message>> Drop for Runtime<A, R> {
    fn drop(&mut self) {
        self.abandon.cancel();
    }
}

fn guarded<T>(stage: Stage, f: impl FnOnce() -> T) -> Result<T, Error> {
    catch_unwind(AssertUnwindSafe(f)).map_err(|payload| Error::Application {
        stage,
        message: panic_message(payload.as_ref()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Action;
    use crate::element::{Element, Text};
    use crate::renderer::Recorder;
    use crate::subscription::{Subscription, SubscriptionSource, mock::MockSource};
    use tokio::time::{Duration, sleep};

    #[derive(Debug, Clone, PartialEq)]
    enum Msg {
        Add(i32),
        Listen(bool),
        Quit,
        Explode,
    }

    #[derive(Debug, Clone, PartialEq)]
    struct State {
        total: i32,
        listening: bool,
    }

    struct Adder {
        source: MockSource<i32>,
    }

    impl Application for Adder {
        type State = State;
        type Message = Msg;

        fn init(&self) -> (State, Command<Msg>) {
            (
                State {
                    total: 0,
                    listening: true,
                },
                Command::none(),
            )
        }

        fn update(&self, state: &State, msg: Msg) -> (State, Command<Msg>) {
            match msg {
                Msg::Add(n) => (
                    State {
                        total: state.total + n,
                        ..state.clone()
                    },
                    Command::none(),
                ),
                Msg::Listen(listening) => (
                    State {
                        listening,
                        ..state.clone()
                    },
                    Command::none(),
                ),
                Msg::Quit => (state.clone(), Command::effect(Action::Quit)),
                Msg::Explode => panic!("update exploded"),
            }
        }

        fn view(&self, state: &State, _dispatch: &Dispatch<Msg>) -> Element {
            Text::new(state.total.to_string()).into()
        }

        fn subscriptions(&self, state: &State) -> Vec<Subscription<Msg>> {
            if state.listening {
                vec![Subscription::new(self.source.clone()).map(Msg::Add)]
            } else {
                vec![]
            }
        }
    }

    fn runtime() -> (Runtime<Adder, Recorder>, MockSource<i32>, Recorder) {
        let source = MockSource::new();
        let recorder = Recorder::new();
        let runtime = Runtime::new(
            Adder {
                source: source.clone(),
            },
            recorder.clone(),
        );
        (runtime, source, recorder)
    }

    #[tokio::test]
    async fn test_start_renders_initial_state() {
        let (mut runtime, source, recorder) = runtime();
        assert_eq!(runtime.phase(), Phase::Uninitialized);

        runtime.start().await.unwrap();

        assert_eq!(runtime.phase(), Phase::Running);
        assert_eq!(recorder.len(), 1);
        assert_eq!(recorder.last().as_ref().and_then(Element::text), Some("0"));
        assert!(runtime.is_subscribed(source.id()));
    }

    #[tokio::test]
    async fn test_start_twice_is_rejected() {
        let (mut runtime, _source, _recorder) = runtime();
        runtime.start().await.unwrap();

        assert!(matches!(runtime.start().await, Err(Error::AlreadyStarted)));
    }

    #[tokio::test]
    async fn test_queued_messages_apply_one_at_a_time() {
        let (mut runtime, _source, recorder) = runtime();
        let handle = runtime.handle();
        runtime.start().await.unwrap();

        handle.dispatch(Msg::Add(1)).unwrap();
        handle.dispatch(Msg::Add(10)).unwrap();

        runtime.step().await.unwrap();
        assert_eq!(runtime.state().map(|s| s.total), Some(1));
        assert_eq!(recorder.len(), 2);

        runtime.step().await.unwrap();
        assert_eq!(runtime.state().map(|s| s.total), Some(11));
        assert_eq!(recorder.len(), 3);
    }

    #[tokio::test]
    async fn test_queued_emission_from_stopped_subscription_is_dropped() {
        let (mut runtime, source, recorder) = runtime();
        let handle = runtime.handle();
        runtime.start().await.unwrap();

        handle.dispatch(Msg::Listen(false)).unwrap();
        source.emit(5).unwrap();
        sleep(Duration::from_millis(20)).await;

        runtime.step().await.unwrap();
        assert_eq!(runtime.active_subscriptions(), 0);

        runtime.step().await.unwrap();
        assert_eq!(runtime.state().map(|s| s.total), Some(0));
        assert_eq!(recorder.len(), 2, "a dropped emission must not render");
    }

    #[tokio::test]
    async fn test_quit_command_shuts_down() {
        let (mut runtime, source, _recorder) = runtime();
        let handle = runtime.handle();
        runtime.start().await.unwrap();

        handle.dispatch(Msg::Quit).unwrap();
        runtime.step().await.unwrap();
        let phase = runtime.step().await.unwrap();

        assert_eq!(phase, Phase::ShutDown);
        assert_eq!(source.receiver_count(), 0);
        assert!(matches!(handle.dispatch(Msg::Add(1)), Err(Error::ShutDown)));
    }

    #[tokio::test]
    async fn test_update_panic_is_fatal() {
        let (mut runtime, source, _recorder) = runtime();
        let handle = runtime.handle();
        runtime.start().await.unwrap();

        handle.dispatch(Msg::Explode).unwrap();
        let result = runtime.step().await;

        assert!(matches!(
            result,
            Err(Error::Application { stage: Stage::Update, ref message }) if message == "update exploded"
        ));
        assert_eq!(runtime.phase(), Phase::ShutDown);
        assert_eq!(source.receiver_count(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_applies_accepted_messages() {
        let (mut runtime, source, recorder) = runtime();
        let handle = runtime.handle();
        runtime.start().await.unwrap();

        handle.dispatch(Msg::Add(2)).unwrap();
        handle.dispatch(Msg::Add(3)).unwrap();
        runtime.shutdown().await.unwrap();

        assert_eq!(runtime.phase(), Phase::ShutDown);
        assert_eq!(runtime.state().map(|s| s.total), Some(5));
        assert_eq!(recorder.len(), 3);
        assert_eq!(source.receiver_count(), 0);
        assert!(matches!(handle.dispatch(Msg::Add(1)), Err(Error::ShutDown)));
    }

    #[tokio::test]
    async fn test_shutdown_before_start() {
        let (mut runtime, _source, recorder) = runtime();
        runtime.shutdown().await.unwrap();

        assert_eq!(runtime.phase(), Phase::ShutDown);
        assert!(recorder.is_empty());
        assert!(matches!(runtime.run().await, Err(Error::ShutDown)));
    }
}
