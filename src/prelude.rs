//! Prelude module for convenient imports.
//!
//! ```
//! use rivulet::prelude::*;
//! ```
//!
//! # What's included
//!
//! - [`Application`] - The application trait
//! - [`Command`] and [`Action`] - For performing side effects
//! - [`Subscription`] - For declaring event sources
//! - [`Dispatch`] and [`Handle`] - For sending messages
//! - [`Element`] - The interface tree
//! - [`Runtime`], [`Renderer`] and [`Recorder`] - For running an application

pub use crate::application::Application;
pub use crate::command::{Action, Command};
pub use crate::config::RuntimeConfig;
pub use crate::dispatch::{Dispatch, Handle};
pub use crate::element::Element;
pub use crate::error::{Error, Failure};
pub use crate::renderer::{Recorder, Renderer};
pub use crate::runtime::{Phase, Runtime};
pub use crate::subscription::Subscription;
