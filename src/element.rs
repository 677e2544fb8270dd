//! Declarative, renderer-agnostic description of the user interface.
//!
//! [`Application::view`](crate::application::Application::view) builds a fresh
//! [`Element`] tree on every render. Trees are plain values: nothing in a tree
//! is mutated after construction, and no two renders share nodes.
//!
//! Element kinds form a closed set so a renderer can match on [`Element`]
//! exhaustively. Leaves carry data and optional interaction callbacks;
//! containers own an ordered list of children.
//!
//! # Identity
//!
//! Any node may carry a [`key`](Element::key). Renderers use
//! [`Element::identities`] to associate persistent resources (focus, animation
//! state) with a logical node: keyed nodes are identified by their key,
//! everything else by its position in the tree.
//!
//! # Example
//!
//! ```
//! use rivulet::dispatch::Dispatch;
//! use rivulet::element::{Button, Element, Text};
//!
//! #[derive(Clone)]
//! enum Message {
//!     Increment,
//! }
//!
//! fn view(count: i32, dispatch: &Dispatch<Message>) -> Element {
//!     Element::column(vec![
//!         Text::new(count.to_string()).key("count").into(),
//!         Button::new("+").on_press(dispatch.emit(Message::Increment)).into(),
//!     ])
//! }
//!
//! let (dispatch, _inbox) = Dispatch::channel();
//! let tree = view(1, &dispatch);
//! assert_eq!(tree.find("count").and_then(Element::text), Some("1"));
//! ```

use std::fmt;
use std::sync::Arc;

type Callback<T> = Arc<dyn Fn(T) + Send + Sync>;

/// Stable identity of a node across renders.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ElementId {
    /// The node carries an explicit key.
    Key(String),
    /// The node has no key; it is identified by child indices from the root.
    Path(Vec<usize>),
}

/// A node of the element tree.
#[derive(Clone, PartialEq)]
pub enum Element {
    Text(Text),
    Column(Container),
    Row(Container),
    Card(Container),
    Button(Button),
    TextField(TextField),
    Checkbox(Toggle),
    Switch(Toggle),
    Spacer(Spacer),
}

impl Element {
    /// A vertical grouping of children.
    #[must_use]
    pub fn column(children: Vec<Element>) -> Self {
        Self::Column(Container::new(children))
    }

    /// A horizontal grouping of children.
    #[must_use]
    pub fn row(children: Vec<Element>) -> Self {
        Self::Row(Container::new(children))
    }

    /// A visually grouped (card-like) vertical grouping of children.
    #[must_use]
    pub fn card(children: Vec<Element>) -> Self {
        Self::Card(Container::new(children))
    }

    /// A checkbox built from a toggle.
    #[must_use]
    pub fn checkbox(toggle: Toggle) -> Self {
        Self::Checkbox(toggle)
    }

    /// A switch built from a toggle.
    #[must_use]
    pub fn switch(toggle: Toggle) -> Self {
        Self::Switch(toggle)
    }

    /// Replaces the key of this node.
    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        let key = Some(key.into());
        match &mut self {
            Self::Text(node) => node.key = key,
            Self::Column(node) | Self::Row(node) | Self::Card(node) => node.key = key,
            Self::Button(node) => node.key = key,
            Self::TextField(node) => node.key = key,
            Self::Checkbox(node) | Self::Switch(node) => node.key = key,
            Self::Spacer(node) => node.key = key,
        }
        self
    }

    /// The key of this node, if any.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        let key = match self {
            Self::Text(node) => &node.key,
            Self::Column(node) | Self::Row(node) | Self::Card(node) => &node.key,
            Self::Button(node) => &node.key,
            Self::TextField(node) => &node.key,
            Self::Checkbox(node) | Self::Switch(node) => &node.key,
            Self::Spacer(node) => &node.key,
        };
        key.as_deref()
    }

    /// A short name for the kind of this node.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Column(_) => "column",
            Self::Row(_) => "row",
            Self::Card(_) => "card",
            Self::Button(_) => "button",
            Self::TextField(_) => "text_field",
            Self::Checkbox(_) => "checkbox",
            Self::Switch(_) => "switch",
            Self::Spacer(_) => "spacer",
        }
    }

    /// The children of a container, or an empty slice for leaves.
    #[must_use]
    pub fn children(&self) -> &[Element] {
        match self {
            Self::Column(node) | Self::Row(node) | Self::Card(node) => &node.children,
            _ => &[],
        }
    }

    /// The content of a text node.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Text(node) => Some(&node.content),
            _ => None,
        }
    }

    /// Returns the node at `path`, where each index selects a child.
    #[must_use]
    pub fn get(&self, path: &[usize]) -> Option<&Element> {
        path.iter()
            .try_fold(self, |node, &index| node.children().get(index))
    }

    /// Returns the first node (in depth-first order) carrying `key`.
    #[must_use]
    pub fn find(&self, key: &str) -> Option<&Element> {
        self.walk()
            .into_iter()
            .map(|(_, node)| node)
            .find(|node| node.key() == Some(key))
    }

    /// Every node of the tree in depth-first pre-order, with its path from the root.
    #[must_use]
    pub fn walk(&self) -> Vec<(Vec<usize>, &Element)> {
        let mut out = Vec::new();
        let mut stack = vec![(Vec::new(), self)];
        while let Some((path, node)) = stack.pop() {
            for (index, child) in node.children().iter().enumerate().rev() {
                let mut child_path = path.clone();
                child_path.push(index);
                stack.push((child_path, child));
            }
            out.push((path, node));
        }
        out
    }

    /// The identity of every node, in depth-first pre-order.
    #[must_use]
    pub fn identities(&self) -> Vec<ElementId> {
        self.walk()
            .into_iter()
            .map(|(path, node)| match node.key() {
                Some(key) => ElementId::Key(key.to_string()),
                None => ElementId::Path(path),
            })
            .collect()
    }

    /// The identity of the node at `path`, if there is one.
    #[must_use]
    pub fn id_at(&self, path: &[usize]) -> Option<ElementId> {
        let node = self.get(path)?;
        Some(match node.key() {
            Some(key) => ElementId::Key(key.to_string()),
            None => ElementId::Path(path.to_vec()),
        })
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(node) => fmt::Debug::fmt(node, f),
            Self::Column(node) => f.debug_tuple("Column").field(node).finish(),
            Self::Row(node) => f.debug_tuple("Row").field(node).finish(),
            Self::Card(node) => f.debug_tuple("Card").field(node).finish(),
            Self::Button(node) => fmt::Debug::fmt(node, f),
            Self::TextField(node) => fmt::Debug::fmt(node, f),
            Self::Checkbox(node) => f.debug_tuple("Checkbox").field(node).finish(),
            Self::Switch(node) => f.debug_tuple("Switch").field(node).finish(),
            Self::Spacer(node) => fmt::Debug::fmt(node, f),
        }
    }
}

/// A run of text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Text {
    pub content: String,
    pub key: Option<String>,
}

impl Text {
    #[must_use]
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            key: None,
        }
    }

    #[must_use]
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }
}

impl From<Text> for Element {
    fn from(text: Text) -> Self {
        Self::Text(text)
    }
}

/// The children of a column, row or card.
#[derive(Debug, Clone, PartialEq)]
pub struct Container {
    pub children: Vec<Element>,
    pub key: Option<String>,
}

impl Container {
    #[must_use]
    pub const fn new(children: Vec<Element>) -> Self {
        Self {
            children,
            key: None,
        }
    }
}

/// A pressable button.
#[derive(Clone)]
pub struct Button {
    pub label: String,
    pub key: Option<String>,
    on_press: Option<Callback<()>>,
}

impl Button {
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            key: None,
            on_press: None,
        }
    }

    #[must_use]
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Sets the callback invoked when the button is pressed.
    #[must_use]
    pub fn on_press(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_press = Some(Arc::new(move |()| f()));
        self
    }

    /// Whether pressing the button does anything.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.on_press.is_some()
    }

    /// Invokes the press callback. Returns `false` if there is none.
    pub fn press(&self) -> bool {
        match &self.on_press {
            Some(f) => {
                f(());
                true
            }
            None => false,
        }
    }
}

impl PartialEq for Button {
    fn eq(&self, other: &Self) -> bool {
        self.label == other.label && self.key == other.key
    }
}

impl fmt::Debug for Button {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Button")
            .field("label", &self.label)
            .field("key", &self.key)
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

impl From<Button> for Element {
    fn from(button: Button) -> Self {
        Self::Button(button)
    }
}

/// A single-line editable text field.
#[derive(Clone)]
pub struct TextField {
    pub value: String,
    pub placeholder: String,
    pub key: Option<String>,
    on_change: Option<Callback<String>>,
}

impl TextField {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            placeholder: String::new(),
            key: None,
            on_change: None,
        }
    }

    #[must_use]
    pub fn placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = placeholder.into();
        self
    }

    #[must_use]
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Sets the callback invoked with the new value whenever the text changes.
    #[must_use]
    pub fn on_change(mut self, f: impl Fn(String) + Send + Sync + 'static) -> Self {
        self.on_change = Some(Arc::new(f));
        self
    }

    /// Invokes the change callback with `value`. Returns `false` if there is none.
    pub fn input(&self, value: impl Into<String>) -> bool {
        match &self.on_change {
            Some(f) => {
                f(value.into());
                true
            }
            None => false,
        }
    }
}

impl PartialEq for TextField {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value && self.placeholder == other.placeholder && self.key == other.key
    }
}

impl fmt::Debug for TextField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextField")
            .field("value", &self.value)
            .field("placeholder", &self.placeholder)
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl From<TextField> for Element {
    fn from(field: TextField) -> Self {
        Self::TextField(field)
    }
}

/// A boolean control, shown as a checkbox or a switch.
#[derive(Clone)]
pub struct Toggle {
    pub checked: bool,
    pub label: Option<String>,
    pub key: Option<String>,
    on_toggle: Option<Callback<bool>>,
}

impl Toggle {
    #[must_use]
    pub const fn new(checked: bool) -> Self {
        Self {
            checked,
            label: None,
            key: None,
            on_toggle: None,
        }
    }

    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    #[must_use]
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Sets the callback invoked with the requested new state.
    #[must_use]
    pub fn on_toggle(mut self, f: impl Fn(bool) + Send + Sync + 'static) -> Self {
        self.on_toggle = Some(Arc::new(f));
        self
    }

    /// Requests the opposite of the current state. Returns `false` if there is no callback.
    pub fn toggle(&self) -> bool {
        match &self.on_toggle {
            Some(f) => {
                f(!self.checked);
                true
            }
            None => false,
        }
    }
}

impl PartialEq for Toggle {
    fn eq(&self, other: &Self) -> bool {
        self.checked == other.checked && self.label == other.label && self.key == other.key
    }
}

impl fmt::Debug for Toggle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Toggle")
            .field("checked", &self.checked)
            .field("label", &self.label)
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

/// Empty space of a fixed size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spacer {
    pub size: u16,
    pub key: Option<String>,
}

impl Spacer {
    #[must_use]
    pub const fn new(size: u16) -> Self {
        Self { size, key: None }
    }
}

impl From<Spacer> for Element {
    fn from(spacer: Spacer) -> Self {
        Self::Spacer(spacer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::Dispatch;

    #[derive(Debug, Clone, PartialEq)]
    enum Message {
        Increment,
        Decrement,
        Input(String),
        Agree(bool),
    }

    fn counter(value: i32, dispatch: &Dispatch<Message>) -> Element {
        Element::column(vec![
            Text::new(format!("Count: {value}")).into(),
            Button::new("Increment")
                .on_press(dispatch.emit(Message::Increment))
                .into(),
            Button::new("Decrement")
                .on_press(dispatch.emit(Message::Decrement))
                .into(),
        ])
    }

    #[test]
    fn test_text_without_key() {
        let text = Text::new("Hello");
        assert_eq!(text.content, "Hello");
        assert_eq!(text.key, None);
    }

    #[test]
    fn test_text_with_key() {
        let element: Element = Text::new("Hello").key("greeting").into();
        assert_eq!(element.key(), Some("greeting"));
        assert_eq!(element.text(), Some("Hello"));
    }

    #[test]
    fn test_column_children() {
        let column = Element::column(vec![Text::new("Item 1").into(), Text::new("Item 2").into()]);
        assert_eq!(column.children().len(), 2);
        assert_eq!(column.key(), None);
        assert_eq!(column.kind(), "column");
    }

    #[test]
    fn test_leaves_have_no_children() {
        let button: Element = Button::new("Click me").into();
        assert!(button.children().is_empty());
    }

    #[test]
    fn test_with_key_sets_container_key() {
        let row = Element::row(vec![]).with_key("toolbar");
        assert_eq!(row.key(), Some("toolbar"));
    }

    #[test]
    fn test_button_press_dispatches_message() {
        let (dispatch, mut inbox) = Dispatch::channel();
        let view = counter(0, &dispatch);

        let Some(Element::Button(increment)) = view.get(&[1]) else {
            panic!("expected a button at [1]");
        };
        assert!(increment.press());

        assert_eq!(inbox.drain(), vec![Message::Increment]);
    }

    #[test]
    fn test_button_without_callback() {
        let button = Button::new("Inert");
        assert!(!button.is_enabled());
        assert!(!button.press());
    }

    #[test]
    fn test_text_field_and_toggle_callbacks() {
        let (dispatch, mut inbox) = Dispatch::channel();
        let field = TextField::new("").on_change(dispatch.map(Message::Input));
        let toggle = Toggle::new(false).on_toggle(dispatch.map(Message::Agree));

        assert!(field.input("milk"));
        assert!(toggle.toggle());

        assert_eq!(
            inbox.drain(),
            vec![Message::Input("milk".into()), Message::Agree(true)]
        );
    }

    #[test]
    fn test_equality_ignores_callbacks() {
        let (first, _a) = Dispatch::channel();
        let (second, _b) = Dispatch::channel();

        assert_eq!(counter(42, &first), counter(42, &second));
        assert_ne!(counter(42, &first), counter(41, &first));
    }

    #[test]
    fn test_walk_is_depth_first_preorder() {
        let tree = Element::column(vec![
            Element::row(vec![Text::new("a").into(), Text::new("b").into()]),
            Text::new("c").into(),
        ]);

        let paths: Vec<_> = tree.walk().into_iter().map(|(path, _)| path).collect();
        assert_eq!(
            paths,
            vec![vec![], vec![0], vec![0, 0], vec![0, 1], vec![1]]
        );
    }

    #[test]
    fn test_identities_prefer_keys() {
        let tree = Element::card(vec![
            Text::new("title").key("title").into(),
            Spacer::new(8).into(),
        ]);

        assert_eq!(
            tree.identities(),
            vec![
                ElementId::Path(vec![]),
                ElementId::Key("title".into()),
                ElementId::Path(vec![1]),
            ]
        );
    }

    #[test]
    fn test_keyed_identity_survives_reordering() {
        let before = Element::column(vec![
            Text::new("milk").key("todo-1").into(),
            Text::new("eggs").key("todo-2").into(),
        ]);
        let after = Element::column(vec![
            Text::new("eggs").key("todo-2").into(),
            Text::new("milk").key("todo-1").into(),
        ]);

        assert_eq!(before.find("todo-1"), after.find("todo-1"));
        assert_eq!(after.find("todo-1").and_then(Element::text), Some("milk"));
    }

    #[test]
    fn test_get_out_of_range() {
        let tree = Element::column(vec![Text::new("only").into()]);
        assert!(tree.get(&[3]).is_none());
        assert!(tree.get(&[0, 0]).is_none());
    }

    #[test]
    fn test_id_at() {
        let tree = Element::column(vec![
            Text::new("title").key("title").into(),
            Element::row(vec![Spacer::new(1).into()]),
        ]);

        assert_eq!(tree.id_at(&[0]), Some(ElementId::Key("title".into())));
        assert_eq!(tree.id_at(&[1, 0]), Some(ElementId::Path(vec![1, 0])));
        assert_eq!(tree.id_at(&[2]), None);
    }
}
