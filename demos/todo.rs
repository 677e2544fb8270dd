//! A todo list in the terminal.
//!
//! The application only knows about [`Element`] trees. This file is the host:
//! it draws each tree with ratatui, keeps track of which interactive element
//! has focus, and turns key presses into calls to that element's callbacks.
//!
//! Tab / Shift-Tab move the focus, Enter or Space activate buttons and
//! toggles, typing edits the focused text field, Esc quits.
//!
//! Set `RIVULET_LOG=debug` to write runtime logs to `rivulet-todo.log`.

use std::fs::File;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use color_eyre::eyre::Result;
use crossterm::event::{Event, EventStream, KeyCode, KeyEventKind};
use futures::StreamExt;
use ratatui::DefaultTerminal;
use ratatui::style::{Style, Stylize};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Paragraph};
use rivulet::element::{Button, ElementId, Spacer, Text, TextField, Toggle};
use rivulet::prelude::*;
use rivulet::subscription::time::Every;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
enum Message {
    UpdateInput(String),
    AddTodo,
    Toggle(u64, bool),
    RemoveTodo(u64),
    ClearCompleted,
    Tick,
}

#[derive(Debug, Clone)]
struct Todo {
    id: u64,
    title: String,
    done: bool,
}

#[derive(Debug, Clone, Default)]
struct Todos {
    todos: Vec<Todo>,
    input: String,
    next_id: u64,
    uptime: u64,
}

struct TodoApp;

impl Application for TodoApp {
    type State = Todos;
    type Message = Message;

    fn init(&self) -> (Todos, Command<Message>) {
        (Todos::default(), Command::none())
    }

    fn update(&self, state: &Todos, msg: Message) -> (Todos, Command<Message>) {
        let mut next = state.clone();
        match msg {
            Message::UpdateInput(input) => next.input = input,
            Message::AddTodo => {
                let title = state.input.trim();
                if !title.is_empty() {
                    next.todos.push(Todo {
                        id: state.next_id,
                        title: title.to_string(),
                        done: false,
                    });
                    next.next_id += 1;
                    next.input.clear();
                }
            }
            Message::Toggle(id, done) => {
                if let Some(todo) = next.todos.iter_mut().find(|todo| todo.id == id) {
                    todo.done = done;
                }
            }
            Message::RemoveTodo(id) => next.todos.retain(|todo| todo.id != id),
            Message::ClearCompleted => next.todos.retain(|todo| !todo.done),
            Message::Tick => next.uptime += 1,
        }
        (next, Command::none())
    }

    fn view(&self, state: &Todos, dispatch: &Dispatch<Message>) -> Element {
        let left = state.todos.iter().filter(|todo| !todo.done).count();
        let items = state
            .todos
            .iter()
            .map(|todo| {
                let id = todo.id;
                Element::row(vec![
                    Element::checkbox(
                        Toggle::new(todo.done)
                            .label(todo.title.clone())
                            .key(format!("todo-{id}"))
                            .on_toggle(dispatch.map(move |done| Message::Toggle(id, done))),
                    ),
                    Button::new("x")
                        .key(format!("remove-{id}"))
                        .on_press(dispatch.emit(Message::RemoveTodo(id)))
                        .into(),
                ])
            })
            .collect();

        Element::column(vec![
            Text::new(format!("{left} left, up {}s", state.uptime)).into(),
            Element::row(vec![
                TextField::new(state.input.clone())
                    .placeholder("What needs doing?")
                    .key("input")
                    .on_change(dispatch.map(Message::UpdateInput))
                    .into(),
                Button::new("Add")
                    .key("add")
                    .on_press(dispatch.emit(Message::AddTodo))
                    .into(),
            ]),
            Element::card(items),
            Button::new("Clear completed")
                .key("clear")
                .on_press(dispatch.emit(Message::ClearCompleted))
                .into(),
            Spacer::new(1).into(),
            Text::new("tab: focus  enter/space: activate  esc: quit").into(),
        ])
    }

    fn subscriptions(&self, _state: &Todos) -> Vec<Subscription<Message>> {
        vec![Subscription::new(Every::new(Duration::from_secs(1))).map(|_| Message::Tick)]
    }
}

/// What is on the terminal right now.
struct Screen {
    terminal: DefaultTerminal,
    tree: Option<Element>,
    focus: Option<ElementId>,
}

impl Screen {
    fn show(&mut self, tree: Element) {
        let focusable = focusable(&tree);
        // Keyed elements keep focus across renders even when they move
        if !self.focus.as_ref().is_some_and(|id| focusable.contains(id)) {
            self.focus = focusable.into_iter().next();
        }
        self.tree = Some(tree);
        self.draw();
    }

    fn move_focus(&mut self, forward: bool) {
        let Some(tree) = &self.tree else { return };
        let focusable = focusable(tree);
        if focusable.is_empty() {
            return;
        }
        let current = self
            .focus
            .as_ref()
            .and_then(|id| focusable.iter().position(|other| other == id))
            .unwrap_or(0);
        let next = if forward {
            (current + 1) % focusable.len()
        } else {
            (current + focusable.len() - 1) % focusable.len()
        };
        self.focus = focusable.into_iter().nth(next);
        self.draw();
    }

    fn focused(&self) -> Option<&Element> {
        let tree = self.tree.as_ref()?;
        let focus = self.focus.as_ref()?;
        tree.walk()
            .into_iter()
            .find(|(path, _)| tree.id_at(path).as_ref() == Some(focus))
            .map(|(_, node)| node)
    }

    fn draw(&mut self) {
        let Some(tree) = &self.tree else { return };
        let mut lines = Vec::new();
        layout(tree, tree, &mut Vec::new(), self.focus.as_ref(), &mut lines);

        let result = self.terminal.draw(|frame| {
            let block = Block::bordered().title(" rivulet todo ");
            frame.render_widget(Paragraph::new(lines).block(block), frame.area());
        });
        if let Err(err) = result {
            tracing::error!(%err, "failed to draw");
        }
    }
}

type Shared = Arc<Mutex<Screen>>;

fn lock(screen: &Shared) -> MutexGuard<'_, Screen> {
    screen.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Draws every tree the runtime produces.
struct TerminalRenderer(Shared);

impl Renderer<Message> for TerminalRenderer {
    fn render(&mut self, tree: Element, _dispatch: &Dispatch<Message>) {
        lock(&self.0).show(tree);
    }
}

fn is_focusable(node: &Element) -> bool {
    matches!(
        node,
        Element::Button(_) | Element::TextField(_) | Element::Checkbox(_) | Element::Switch(_)
    )
}

fn focusable(tree: &Element) -> Vec<ElementId> {
    tree.walk()
        .into_iter()
        .filter(|(_, node)| is_focusable(node))
        .filter_map(|(path, _)| tree.id_at(&path))
        .collect()
}

fn label(node: &Element) -> Option<String> {
    let label = match node {
        Element::Text(text) => text.content.clone(),
        Element::Button(button) => format!("[ {} ]", button.label),
        Element::TextField(field) if field.value.is_empty() => format!("> {}", field.placeholder),
        Element::TextField(field) => format!("> {}_", field.value),
        Element::Checkbox(toggle) => format!(
            "[{}] {}",
            if toggle.checked { 'x' } else { ' ' },
            toggle.label.as_deref().unwrap_or_default()
        ),
        Element::Switch(toggle) => format!(
            "({}) {}",
            if toggle.checked { "on" } else { "off" },
            toggle.label.as_deref().unwrap_or_default()
        ),
        Element::Column(_) | Element::Row(_) | Element::Card(_) | Element::Spacer(_) => return None,
    };
    Some(label)
}

fn span(root: &Element, node: &Element, path: &[usize], focus: Option<&ElementId>) -> Option<Span<'static>> {
    let text = label(node)?;
    let focused = focus.is_some_and(|id| root.id_at(path).as_ref() == Some(id));
    let style = if focused { Style::new().reversed() } else { Style::new() };
    Some(Span::styled(text, style))
}

fn layout(
    root: &Element,
    node: &Element,
    path: &mut Vec<usize>,
    focus: Option<&ElementId>,
    lines: &mut Vec<Line<'static>>,
) {
    match node {
        Element::Column(_) | Element::Card(_) => {
            let card = matches!(node, Element::Card(_));
            if card {
                lines.push(Line::from("─".repeat(32)).dim());
            }
            for (index, child) in node.children().iter().enumerate() {
                path.push(index);
                layout(root, child, path, focus, lines);
                path.pop();
            }
            if card {
                lines.push(Line::from("─".repeat(32)).dim());
            }
        }
        Element::Row(_) => {
            let mut spans = Vec::new();
            for (index, child) in node.children().iter().enumerate() {
                path.push(index);
                if let Some(item) = span(root, child, path, focus) {
                    if !spans.is_empty() {
                        spans.push(Span::raw(" "));
                    }
                    spans.push(item);
                }
                path.pop();
            }
            lines.push(Line::from(spans));
        }
        Element::Spacer(spacer) => {
            lines.extend((0..spacer.size).map(|_| Line::default()));
        }
        leaf => lines.extend(span(root, leaf, path, focus).map(Line::from)),
    }
}

/// Turns key presses into focus changes and element callbacks.
async fn handle_input(screen: Shared, handle: Handle<Message>) {
    let mut events = EventStream::new();
    while let Some(event) = events.next().await {
        let key = match event {
            Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => key,
            Ok(_) => continue,
            Err(err) => {
                tracing::error!(%err, "terminal input failed");
                break;
            }
        };

        let mut screen = lock(&screen);
        match key.code {
            KeyCode::Esc => break,
            KeyCode::Tab | KeyCode::Down => screen.move_focus(true),
            KeyCode::BackTab | KeyCode::Up => screen.move_focus(false),
            code => activate(&screen, code),
        }
    }
    handle.shutdown();
}

fn activate(screen: &Screen, code: KeyCode) {
    match (code, screen.focused()) {
        (KeyCode::Char(c), Some(Element::TextField(field))) => {
            field.input(format!("{}{c}", field.value));
        }
        (KeyCode::Backspace, Some(Element::TextField(field))) => {
            let mut value = field.value.clone();
            value.pop();
            field.input(value);
        }
        (KeyCode::Enter, Some(Element::TextField(_))) => {
            if let Some(Element::Button(add)) = screen.tree.as_ref().and_then(|tree| tree.find("add")) {
                add.press();
            }
        }
        (KeyCode::Enter | KeyCode::Char(' '), Some(Element::Button(button))) => {
            button.press();
        }
        (KeyCode::Enter | KeyCode::Char(' '), Some(Element::Checkbox(toggle) | Element::Switch(toggle))) => {
            toggle.toggle();
        }
        _ => {}
    }
}

fn init_tracing() -> Result<()> {
    if std::env::var_os("RIVULET_LOG").is_none() {
        return Ok(());
    }
    let file = File::create("rivulet-todo.log")?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_env("RIVULET_LOG"))
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    init_tracing()?;

    let screen = Arc::new(Mutex::new(Screen {
        terminal: ratatui::init(),
        tree: None,
        focus: None,
    }));

    let runtime = Runtime::new(TodoApp, TerminalRenderer(Arc::clone(&screen)));
    let input = tokio::spawn(handle_input(Arc::clone(&screen), runtime.handle()));

    let result = runtime.run().await;
    input.abort();
    ratatui::restore();

    let state = result?;
    let done = state.todos.iter().filter(|todo| todo.done).count();
    println!("{} todos, {done} done", state.todos.len());
    Ok(())
}
