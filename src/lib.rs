//! # Rivulet - Elm Architecture dispatch and effect runtime
//!
//! Rivulet runs applications written in the Elm Architecture style: an
//! immutable state value, a pure `update` function that produces the next
//! state for each message, and a pure `view` function that describes the
//! interface as a tree of [`Element`](element::Element)s. Side effects never
//! happen inside `update`; they are returned as [`Command`](command::Command)s
//! and long-lived event sources are declared as
//! [`Subscription`](subscription::Subscription)s.
//!
//! The crate does not draw anything. A [`Renderer`](renderer::Renderer)
//! receives every new tree together with the [`Dispatch`](dispatch::Dispatch)
//! function its interaction callbacks send messages through.
//!
//! ## Message flow
//!
//! 1. Something dispatches a message: a callback in the element tree, a
//!    finished command, a running subscription or the host.
//! 2. The message is queued on the runtime's single channel.
//! 3. The runtime applies `update`, replaces the state and starts the returned
//!    command.
//! 4. The runtime calls `view` and hands the tree to the renderer.
//! 5. The runtime reconciles the running subscriptions with the ones the new
//!    state asks for, then takes the next message.
//!
//! Each message is fully processed before the next one is looked at, no matter
//! how many threads dispatch concurrently.
//!
//! ## Core Components
//!
//! - [`Application`](application::Application): `init`, `update`, `view` and `subscriptions`
//! - [`Runtime`](runtime::Runtime): owns the state and drives the loop
//! - [`Command`](command::Command): one-shot asynchronous side effects
//! - [`Subscription`](subscription::Subscription): long-lived event sources
//! - [`Element`](element::Element): the renderer-agnostic interface tree
//!
//! ## Example
//!
//! ```
//! use rivulet::prelude::*;
//! use rivulet::element::{Button, Text};
//!
//! #[derive(Debug, Clone)]
//! enum Message {
//!     Increment,
//! }
//!
//! struct Counter;
//!
//! impl Application for Counter {
//!     type State = u32;
//!     type Message = Message;
//!
//!     fn init(&self) -> (u32, Command<Message>) {
//!         (0, Command::none())
//!     }
//!
//!     fn update(&self, count: &u32, msg: Message) -> (u32, Command<Message>) {
//!         match msg {
//!             Message::Increment => (count + 1, Command::none()),
//!         }
//!     }
//!
//!     fn view(&self, count: &u32, dispatch: &Dispatch<Message>) -> Element {
//!         Element::column(vec![
//!             Text::new(count.to_string()).into(),
//!             Button::new("+").on_press(dispatch.emit(Message::Increment)).into(),
//!         ])
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), rivulet::error::Error> {
//! let recorder = Recorder::new();
//! let mut runtime = Runtime::new(Counter, recorder.clone());
//! runtime.start().await?;
//!
//! // Press the button of the first frame, then process the message
//! let frame = recorder.last().expect("initial render");
//! let button = frame.get(&[1]).expect("button");
//! if let Element::Button(button) = button {
//!     button.press();
//! }
//! runtime.step().await?;
//!
//! assert_eq!(runtime.state(), Some(&1));
//! # Ok(())
//! # }
//! ```
//!
//! ## Design Inspiration
//!
//! The shape of [`Command`](command::Command) and
//! [`Subscription`](subscription::Subscription) follows
//! [iced](https://github.com/iced-rs/iced); the element catalog and the
//! immutable-state update loop follow Elm.

pub mod application;
pub mod command;
pub mod config;
pub mod dispatch;
pub mod element;
pub mod error;
pub mod platform;
pub mod prelude;
pub mod renderer;
pub mod runtime;
pub mod subscription;
