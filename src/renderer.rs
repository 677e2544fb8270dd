//! The boundary between the runtime and whatever paints the interface.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;

use crate::dispatch::Dispatch;
use crate::element::Element;

/// Receives a complete element tree after every accepted message.
///
/// The runtime calls [`render`](Renderer::render) once at start and once per
/// processed message, always with a whole tree; diffing against the previous
/// tree, if any, is the renderer's business. The renderer may keep `dispatch`
/// and call it at any time, from any thread.
///
/// Closures implement this trait, which is handy for small hosts:
///
/// ```
/// use rivulet::dispatch::Dispatch;
/// use rivulet::element::Element;
/// use rivulet::renderer::Renderer;
///
/// let mut seen = 0;
/// let mut renderer = |_tree: Element, _dispatch: &Dispatch<()>| seen += 1;
/// renderer.render(Element::column(vec![]), &Dispatch::channel().0);
/// ```
pub trait Renderer<Msg> {
    fn render(&mut self, tree: Element, dispatch: &Dispatch<Msg>);
}

impl<Msg, F> Renderer<Msg> for F
where
    F: FnMut(Element, &Dispatch<Msg>),
{
    fn render(&mut self, tree: Element, dispatch: &Dispatch<Msg>) {
        self(tree, dispatch);
    }
}

/// A renderer that keeps every tree it is given.
///
/// Clones share the same history, so a test can hand one clone to the runtime
/// and inspect the trees through another.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    frames: Arc<Mutex<Vec<Element>>>,
    rendered: Arc<Notify>,
}

impl Recorder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of trees rendered so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// The most recent tree.
    #[must_use]
    pub fn last(&self) -> Option<Element> {
        self.lock().last().cloned()
    }

    /// Every tree rendered so far, oldest first.
    #[must_use]
    pub fn frames(&self) -> Vec<Element> {
        self.lock().clone()
    }

    /// Waits until at least `count` trees have been rendered.
    pub async fn wait_for(&self, count: usize) {
        loop {
            let notified = self.rendered.notified();
            if self.len() >= count {
                return;
            }
            notified.await;
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Element>> {
        self.frames.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<Msg> Renderer<Msg> for Recorder {
    fn render(&mut self, tree: Element, _dispatch: &Dispatch<Msg>) {
        self.lock().push(tree);
        self.rendered.notify_waiters();
    }
}
