use crate::{command::Command, dispatch::Dispatch, element::Element, subscription::Subscription};

/// The pure core of an application following the Elm Architecture.
///
/// An application is three pure functions over an immutable state value plus
/// an optional description of the external sources it listens to:
///
/// - [`init`](Application::init) builds the first state,
/// - [`update`](Application::update) maps a state and a message to the next state,
/// - [`view`](Application::view) projects a state into an [`Element`] tree,
/// - [`subscriptions`](Application::subscriptions) names the event sources that should be running.
///
/// The runtime owns the state. It never hands out a mutable reference: every
/// transition produces a replacement value and the previous one is dropped.
///
/// # Example
///
/// ```
/// use rivulet::prelude::*;
/// use rivulet::element::{Button, Text};
///
/// #[derive(Debug, Clone)]
/// enum Message {
///     Increment,
///     Decrement,
/// }
///
/// #[derive(Debug, Clone, PartialEq)]
/// struct Counter {
///     value: i32,
/// }
///
/// struct CounterApp;
///
/// impl Application for CounterApp {
///     type State = Counter;
///     type Message = Message;
///
///     fn init(&self) -> (Counter, Command<Message>) {
///         (Counter { value: 0 }, Command::none())
///     }
///
///     fn update(&self, state: &Counter, msg: Message) -> (Counter, Command<Message>) {
///         let value = match msg {
///             Message::Increment => state.value + 1,
///             Message::Decrement => state.value - 1,
///         };
///         (Counter { value }, Command::none())
///     }
///
///     fn view(&self, state: &Counter, dispatch: &Dispatch<Message>) -> Element {
///         Element::column(vec![
///             Text::new(state.value.to_string()).into(),
///             Button::new("+").on_press(dispatch.emit(Message::Increment)).into(),
///             Button::new("-").on_press(dispatch.emit(Message::Decrement)).into(),
///         ])
///     }
/// }
///
/// let app = CounterApp;
/// let (state, _) = app.init();
/// let (state, _) = app.update(&state, Message::Increment);
/// assert_eq!(state, Counter { value: 1 });
/// ```
pub trait Application {
    /// The immutable snapshot everything else is derived from.
    type State;

    /// The events that can change the state.
    ///
    /// Messages come from interaction callbacks in the element tree, from
    /// command completions and from subscriptions.
    type Message: Send + 'static;

    /// Produces the initial state.
    ///
    /// Called exactly once, before the first render. The returned command runs
    /// right after the first render; use [`Command::none`] if there is nothing to do.
    fn init(&self) -> (Self::State, Command<Self::Message>);

    /// Computes the state that follows `state` once `msg` has happened.
    ///
    /// Must be deterministic and must not block, perform I/O or dispatch.
    /// Side effects are described by the returned command and run by the
    /// runtime. A panic here is fatal to the runtime.
    fn update(&self, state: &Self::State, msg: Self::Message) -> (Self::State, Command<Self::Message>);

    /// Describes the user interface for `state`.
    ///
    /// Callbacks attached to elements should be built from `dispatch`
    /// ([`Dispatch::emit`], [`Dispatch::map`]); they run later, when the renderer
    /// invokes them, never while `view` itself runs. A panic here is fatal to the
    /// runtime.
    fn view(&self, state: &Self::State, dispatch: &Dispatch<Self::Message>) -> Element;

    /// The subscriptions that should be running while in `state`.
    ///
    /// Evaluated after every render. Subscriptions are matched by identity, so
    /// returning an equivalent subscription again leaves the running one alone.
    fn subscriptions(&self, _state: &Self::State) -> Vec<Subscription<Self::Message>> {
        Vec::new()
    }
}
