//! Room client state and terminal UI rendering.
//!
//! This module owns the `App` struct (the "model" in an MVC sense) and the
//! `ui()` function that renders it into a ratatui terminal frame. The event
//! loop in `main.rs` feeds keys and dialog events into `App`, then calls
//! `ui()` on each tick.
//!
//! Every key goes through the global hotkey router first (`on_key`). Only if
//! the router doesn't swallow it does the focused widget get it
//! (`handle_key`).

use std::sync::Arc;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};

use crate::create_room::{DialogEvent, DialogOutcome};
use crate::dialog::{CreateRoomDialog, handle_text_input};
use crate::hotkeys::{HotkeyTarget, Hotkeys, KeyRoutingContext, MESSAGE_INPUT_ID};
use crate::search::{SearchModal, SearchResult};
use crate::service::{RoomDirectory, RoomId, RoomService, RoomSummary};
use crate::theme::Theme;

// ── App state ────────────────────────────────────────────────────────────────

/// Which part of the main screen has keyboard focus. Overlays (search, the
/// create-room dialog) take focus implicitly while they are open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    RoomList,
    MessageInput,
}

/// The main application state.
///
/// Fields are `pub` because `main.rs` and the tests read them directly; the
/// state transitions that matter go through methods.
pub struct App {
    pub directory: RoomDirectory,
    pub service: Arc<dyn RoomService>,
    pub user_id: String,
    /// Server part of `user_id`; new aliases live under it.
    pub server_name: String,
    pub selected: Option<RoomId>,
    pub focus: Focus,
    /// The message being typed (not yet sent).
    pub input: String,
    /// Cursor position within `input`, in characters.
    pub cursor_pos: usize,
    pub settings_panel_open: bool,
    pub search: Option<SearchModal>,
    pub dialog: Option<CreateRoomDialog>,
    pub hotkeys: Hotkeys,
    /// One-line notice shown in the hint bar until the next key press.
    pub notice: Option<String>,
    pub theme: Theme,
    pub should_quit: bool,
}

impl App {
    pub fn new(
        directory: RoomDirectory,
        service: Arc<dyn RoomService>,
        user_id: impl Into<String>,
        server_name: impl Into<String>,
        theme: Theme,
    ) -> Self {
        let mut hotkeys = Hotkeys::default();
        hotkeys.install();
        let selected = directory.rooms().first().map(|room| room.id.clone());
        Self {
            directory,
            service,
            user_id: user_id.into(),
            server_name: server_name.into(),
            selected,
            focus: Focus::RoomList,
            input: String::new(),
            cursor_pos: 0,
            settings_panel_open: false,
            search: None,
            dialog: None,
            hotkeys,
            notice: None,
            theme,
            should_quit: false,
        }
    }

    pub fn modal_open(&self) -> bool {
        self.search.is_some() || self.dialog.is_some()
    }

    pub fn selected_room(&self) -> Option<RoomSummary> {
        self.selected.as_ref().and_then(|id| self.directory.get(id))
    }

    /// Snapshot the UI for the hotkey router.
    pub fn routing_context(&self, key: KeyEvent) -> KeyRoutingContext {
        let focused_is_text_input = match (&self.dialog, &self.search) {
            (Some(dialog), _) => dialog.is_editing_text(),
            (None, Some(_)) => true,
            (None, None) => self.focus == Focus::MessageInput,
        };
        KeyRoutingContext {
            modal_open: self.modal_open(),
            settings_panel_open: self.settings_panel_open,
            focused_is_text_input,
            key,
        }
    }

    // ── Rooms ────────────────────────────────────────────────────────────

    pub fn select_room(&mut self, id: RoomId) {
        tracing::debug!(room_id = %id, "room selected");
        self.selected = Some(id);
        self.input.clear();
        self.cursor_pos = 0;
    }

    /// Move the room list selection up (`-1`) or down (`+1`).
    fn move_selection(&mut self, delta: isize) {
        let rooms = self.directory.rooms();
        if rooms.is_empty() {
            return;
        }
        let current = self
            .selected
            .as_ref()
            .and_then(|id| rooms.iter().position(|room| &room.id == id));
        let next = match current {
            // `saturating_add_signed` adds an `isize` to a `usize` without
            // wrapping below 0; `min` keeps it inside the list.
            Some(i) => i.saturating_add_signed(delta).min(rooms.len() - 1),
            None => 0,
        };
        self.select_room(rooms[next].id.clone());
    }

    fn send_message(&mut self) {
        // `drain(..)` moves the text out and leaves `input` empty.
        let text: String = self.input.drain(..).collect();
        self.cursor_pos = 0;
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        let Some(id) = self.selected.clone() else {
            return;
        };
        if !self.directory.push_message(&id, format!("{}: {text}", self.user_id)) {
            tracing::warn!(room_id = %id, "message dropped: room is gone");
        }
    }

    // ── Create-room dialog ───────────────────────────────────────────────

    pub fn open_create_dialog(&mut self) {
        if self.dialog.is_some() {
            return;
        }
        self.search = None;
        self.dialog = Some(CreateRoomDialog::open(
            Arc::clone(&self.service),
            &self.directory,
            self.server_name.clone(),
        ));
    }

    /// Wait for the open dialog's next event. Never resolves while no dialog
    /// is open, so it can sit in a `select!` permanently.
    pub async fn next_dialog_event(&mut self) -> DialogEvent {
        match &mut self.dialog {
            Some(dialog) => dialog.next_event().await,
            None => std::future::pending().await,
        }
    }

    pub fn handle_dialog_event(&mut self, event: DialogEvent) {
        let outcome = match &mut self.dialog {
            Some(dialog) => dialog.handle_event(event),
            // Closed between the event being received and handled.
            None => None,
        };
        if let Some(outcome) = outcome {
            self.finish_dialog(outcome);
        }
    }

    /// Close the dialog. Dropping it unsubscribes from room announcements and
    /// discards any result still on its way.
    pub fn finish_dialog(&mut self, outcome: DialogOutcome) {
        self.dialog = None;
        if let DialogOutcome::Created(id) = outcome {
            let name = self
                .directory
                .get(&id)
                .map_or_else(|| id.to_string(), |room| room.name);
            self.notice = Some(format!("created {name}"));
            self.select_room(id);
            self.focus = Focus::MessageInput;
        }
    }

    // ── Keys ─────────────────────────────────────────────────────────────

    /// Entry point for every key press.
    pub fn on_key(&mut self, key: KeyEvent) {
        self.notice = None;
        let ctx = self.routing_context(key);
        // `Hotkeys` is `Copy`, so this doesn't keep `self` borrowed while the
        // router calls back into it.
        let hotkeys = self.hotkeys;
        if hotkeys.handle(&ctx, self) {
            return;
        }
        self.handle_key(key);
    }

    /// Normal key handling for whatever has focus.
    pub fn handle_key(&mut self, key: KeyEvent) {
        // Quit works everywhere, overlays included.
        if key.modifiers.contains(KeyModifiers::CONTROL)
            && matches!(key.code, KeyCode::Char('q' | 'c'))
        {
            self.should_quit = true;
            return;
        }
        if let Some(dialog) = &mut self.dialog {
            if let Some(outcome) = dialog.handle_key(key) {
                self.finish_dialog(outcome);
            }
            return;
        }
        if let Some(search) = &mut self.search {
            let rooms = self.directory.rooms();
            match search.handle_key(key, &rooms) {
                SearchResult::Selected(id) => {
                    self.search = None;
                    self.select_room(id);
                    self.focus = Focus::MessageInput;
                }
                SearchResult::Cancelled => self.search = None,
                SearchResult::Searching => {}
            }
            return;
        }

        if key.modifiers.contains(KeyModifiers::CONTROL) {
            match key.code {
                KeyCode::Char('n') => self.open_create_dialog(),
                KeyCode::Char('e') => self.toggle_settings_panel(),
                KeyCode::Char('t') => self.theme.toggle(),
                _ => {}
            }
            return;
        }

        match self.focus {
            Focus::RoomList => match key.code {
                KeyCode::Up => self.move_selection(-1),
                KeyCode::Down => self.move_selection(1),
                KeyCode::Enter | KeyCode::Tab => {
                    self.focus_element(MESSAGE_INPUT_ID);
                }
                _ => {}
            },
            Focus::MessageInput => match key.code {
                KeyCode::Enter => self.send_message(),
                KeyCode::Esc | KeyCode::Tab => self.focus = Focus::RoomList,
                _ => {
                    handle_text_input(&mut self.input, &mut self.cursor_pos, key);
                }
            },
        }
    }
}

impl HotkeyTarget for App {
    fn open_search(&mut self) {
        self.search = Some(SearchModal::new());
    }

    fn toggle_settings_panel(&mut self) {
        self.settings_panel_open = !self.settings_panel_open;
    }

    /// The message input only exists while a room is open.
    fn focus_element(&mut self, id: &str) -> bool {
        if id == MESSAGE_INPUT_ID && self.selected.is_some() {
            self.focus = Focus::MessageInput;
            true
        } else {
            false
        }
    }
}

// ── UI ───────────────────────────────────────────────────────────────────────
//
// Immediate mode: every frame is rebuilt from `App`. Overlays are drawn last
// so they sit on top of everything else.

pub fn ui(f: &mut ratatui::Frame, app: &App) {
    let theme = &app.theme;
    f.render_widget(
        Block::default().style(Style::default().bg(theme.bg)),
        f.area(),
    );

    let [main, input_area, hints_area] = Layout::vertical([
        Constraint::Min(1),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(f.area());

    let rooms = app.directory.rooms();
    let selected = app.selected_room();

    let columns = if app.settings_panel_open {
        Layout::horizontal([
            Constraint::Length(28),
            Constraint::Min(1),
            Constraint::Length(34),
        ])
        .split(main)
    } else {
        Layout::horizontal([Constraint::Length(28), Constraint::Min(1)]).split(main)
    };

    render_room_list(f, columns[0], app, &rooms);
    render_timeline(f, columns[1], app, selected.as_ref());
    if app.settings_panel_open {
        render_settings(f, columns[2], app, selected.as_ref());
    }
    render_input(f, input_area, app, selected.as_ref());
    render_hints(f, hints_area, app);

    if let Some(search) = &app.search {
        search.render(f, &rooms, theme);
    }
    if let Some(dialog) = &app.dialog {
        dialog.render(f, theme);
    }
}

fn panel<'a>(title: &'a str, focused: bool, theme: &Theme) -> Block<'a> {
    Block::default()
        .borders(Borders::ALL)
        .style(Style::default().bg(theme.bg))
        .border_style(Style::default().fg(if focused {
            theme.border_focused
        } else {
            theme.border
        }))
        .title(title)
        .title_style(Style::default().fg(theme.title))
}

fn render_room_list(f: &mut ratatui::Frame, area: Rect, app: &App, rooms: &[RoomSummary]) {
    let theme = &app.theme;
    let lines: Vec<Line> = if rooms.is_empty() {
        vec![Line::from(Span::styled(
            "no rooms yet",
            Style::default()
                .fg(theme.text_dim)
                .add_modifier(Modifier::ITALIC),
        ))]
    } else {
        rooms
            .iter()
            .map(|room| {
                let marker = if room.is_public { '#' } else { '*' };
                let style = if app.selected.as_ref() == Some(&room.id) {
                    Style::default()
                        .fg(theme.selected_fg)
                        .bg(theme.selected_bg)
                        .add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(theme.room_name)
                };
                Line::from(Span::styled(format!("{marker} {}", room.name), style))
            })
            .collect()
    };
    let focused = !app.modal_open() && app.focus == Focus::RoomList;
    f.render_widget(
        Paragraph::new(lines).block(panel("rooms", focused, theme)),
        area,
    );
}

fn render_timeline(
    f: &mut ratatui::Frame,
    area: Rect,
    app: &App,
    room: Option<&RoomSummary>,
) {
    let theme = &app.theme;
    let Some(room) = room else {
        let hint = Paragraph::new(Line::from(Span::styled(
            "No room selected. Press Ctrl+N to create one.",
            Style::default()
                .fg(theme.text_dim)
                .add_modifier(Modifier::ITALIC),
        )))
        .block(panel("piper-rooms", false, theme));
        f.render_widget(hint, area);
        return;
    };

    let mut lines = Vec::new();
    if let Some(topic) = &room.topic {
        lines.push(Line::from(Span::styled(
            topic.as_str(),
            Style::default()
                .fg(theme.text_dim)
                .add_modifier(Modifier::ITALIC),
        )));
    }
    lines.extend(room.messages.iter().map(|message| {
        // Messages are stored as "sender: text".
        match message.split_once(": ") {
            Some((sender, text)) => Line::from(vec![
                Span::styled(
                    sender,
                    Style::default()
                        .fg(theme.room_name)
                        .add_modifier(Modifier::BOLD),
                ),
                Span::styled(format!(": {text}"), Style::default().fg(theme.text)),
            ]),
            None => Line::from(Span::styled(
                message.as_str(),
                Style::default().fg(theme.text),
            )),
        }
    }));

    // Auto-scroll so the newest messages stay visible.
    let visible = area.height.saturating_sub(2) as usize;
    let scroll = lines.len().saturating_sub(visible) as u16;

    f.render_widget(
        Paragraph::new(lines)
            .scroll((scroll, 0))
            .block(panel(&room.name, false, theme)),
        area,
    );
}

fn render_settings(
    f: &mut ratatui::Frame,
    area: Rect,
    app: &App,
    room: Option<&RoomSummary>,
) {
    let theme = &app.theme;
    let label = Style::default().fg(theme.text_dim);
    let value = Style::default().fg(theme.text);
    let row = |name: &'static str, text: String| {
        Line::from(vec![
            Span::styled(format!("{name:<12}"), label),
            Span::styled(text, value),
        ])
    };
    let lines = match room {
        Some(room) => vec![
            row("Name", room.name.clone()),
            row("Topic", room.topic.clone().unwrap_or_else(|| "-".into())),
            row("Address", room.alias.clone().unwrap_or_else(|| "-".into())),
            row(
                "Visibility",
                if room.is_public { "public" } else { "private" }.into(),
            ),
            row(
                "Encryption",
                if room.is_encrypted { "on" } else { "off" }.into(),
            ),
            row("Your power", room.creator_power_level.to_string()),
            row("Room ID", room.id.to_string()),
        ],
        None => vec![Line::from(Span::styled("no room selected", label))],
    };
    f.render_widget(
        Paragraph::new(lines).block(panel("room settings (Esc)", false, theme)),
        area,
    );
}

fn render_input(
    f: &mut ratatui::Frame,
    area: Rect,
    app: &App,
    room: Option<&RoomSummary>,
) {
    let theme = &app.theme;
    let focused = !app.modal_open() && app.focus == Focus::MessageInput;
    let content = if room.is_some() {
        Line::from(vec![
            Span::styled("> ", Style::default().fg(theme.input_prompt)),
            Span::styled(app.input.as_str(), Style::default().fg(theme.text)),
        ])
    } else {
        Line::from(Span::styled(
            "select a room to chat",
            Style::default().fg(theme.text_muted),
        ))
    };
    f.render_widget(
        Paragraph::new(content).block(panel("message", focused, theme)),
        area,
    );
    if focused {
        // Border (1) plus the "> " prompt (2).
        f.set_cursor_position((area.x + 3 + app.cursor_pos as u16, area.y + 1));
    }
}

fn render_hints(f: &mut ratatui::Frame, area: Rect, app: &App) {
    let theme = &app.theme;
    let line = match &app.notice {
        Some(notice) => Line::from(Span::styled(
            format!(" {notice}"),
            Style::default().fg(theme.accent),
        )),
        None => {
            let key = Style::default()
                .fg(theme.hint_key)
                .add_modifier(Modifier::BOLD);
            let text = Style::default().fg(theme.hint_text);
            Line::from(vec![
                Span::styled(" Ctrl+N", key),
                Span::styled(" new room  ", text),
                Span::styled("Ctrl+K", key),
                Span::styled(" search  ", text),
                Span::styled("Ctrl+E", key),
                Span::styled(" settings  ", text),
                Span::styled("Ctrl+T", key),
                Span::styled(" theme  ", text),
                Span::styled("Ctrl+Q", key),
                Span::styled(" quit", text),
            ])
        }
    };
    f.render_widget(Paragraph::new(line), area);
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use tokio::time::Duration;

    use super::*;
    use crate::homeserver::LocalHomeserver;
    use crate::service::DEFAULT_CREATOR_POWER_LEVEL;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    fn room(id: &str, name: &str) -> RoomSummary {
        RoomSummary {
            id: RoomId::new(id),
            name: name.into(),
            topic: None,
            alias: None,
            is_public: false,
            is_encrypted: true,
            creator_power_level: DEFAULT_CREATOR_POWER_LEVEL,
            messages: Vec::new(),
        }
    }

    fn app_with(rooms: &[(&str, &str)]) -> App {
        let directory = RoomDirectory::new();
        for (id, name) in rooms {
            directory.insert(room(id, name));
        }
        let hs = LocalHomeserver::new("localhost", directory.clone(), Duration::from_millis(10));
        App::new(directory, Arc::new(hs), "@me:localhost", "localhost", Theme::dark())
    }

    #[test]
    fn starts_on_first_room_with_hotkeys_installed() {
        let app = app_with(&[("!b:localhost", "Beta"), ("!a:localhost", "Alpha")]);
        // Rooms are ordered by ID.
        assert_eq!(app.selected, Some(RoomId::new("!a:localhost")));
        assert_eq!(app.focus, Focus::RoomList);
        assert!(app.hotkeys.is_installed());
    }

    #[test]
    fn printable_key_jumps_into_message_input() {
        let mut app = app_with(&[("!a:localhost", "Alpha")]);
        app.on_key(key(KeyCode::Char('h')));
        app.on_key(key(KeyCode::Char('i')));
        assert_eq!(app.focus, Focus::MessageInput);
        // The first key is not swallowed; it lands in the input.
        assert_eq!(app.input, "hi");
    }

    #[test]
    fn printable_key_without_room_does_nothing() {
        let mut app = app_with(&[]);
        app.on_key(key(KeyCode::Char('h')));
        assert_eq!(app.focus, Focus::RoomList);
        assert!(app.input.is_empty());
    }

    #[test]
    fn enter_sends_message_to_room() {
        let mut app = app_with(&[("!a:localhost", "Alpha")]);
        for c in "hello".chars() {
            app.on_key(key(KeyCode::Char(c)));
        }
        app.on_key(key(KeyCode::Enter));
        assert!(app.input.is_empty());
        assert_eq!(
            app.selected_room().unwrap().messages,
            ["@me:localhost: hello"]
        );
    }

    #[test]
    fn ctrl_k_opens_search() {
        let mut app = app_with(&[("!a:localhost", "Alpha")]);
        app.on_key(ctrl('k'));
        assert!(app.search.is_some());
        assert!(app.modal_open());
    }

    #[test]
    fn ctrl_k_inside_dialog_is_swallowed() {
        let mut app = app_with(&[]);
        app.open_create_dialog();
        app.on_key(ctrl('k'));
        assert!(app.search.is_none());
        // The dialog never saw the key either.
        assert_eq!(app.dialog.as_ref().unwrap().controller().form().title, None);
    }

    #[test]
    fn esc_closes_settings_panel() {
        let mut app = app_with(&[("!a:localhost", "Alpha")]);
        app.on_key(ctrl('e'));
        assert!(app.settings_panel_open);
        app.on_key(key(KeyCode::Esc));
        assert!(!app.settings_panel_open);
        assert!(!app.should_quit);
        app.on_key(ctrl('q'));
        assert!(app.should_quit);
    }

    #[test]
    fn esc_in_message_input_returns_to_room_list() {
        let mut app = app_with(&[("!a:localhost", "Alpha")]);
        app.on_key(key(KeyCode::Enter));
        assert_eq!(app.focus, Focus::MessageInput);
        app.on_key(key(KeyCode::Esc));
        assert_eq!(app.focus, Focus::RoomList);
        assert!(!app.should_quit);
    }

    #[test]
    fn search_selection_opens_room() {
        let mut app = app_with(&[("!a:localhost", "Alpha"), ("!b:localhost", "Beta")]);
        app.on_key(ctrl('k'));
        app.on_key(key(KeyCode::Char('b')));
        app.on_key(key(KeyCode::Enter));
        assert!(app.search.is_none());
        assert_eq!(app.selected, Some(RoomId::new("!b:localhost")));
        assert_eq!(app.focus, Focus::MessageInput);
    }

    #[test]
    fn arrows_move_room_selection() {
        let mut app = app_with(&[("!a:localhost", "Alpha"), ("!b:localhost", "Beta")]);
        app.on_key(key(KeyCode::Down));
        assert_eq!(app.selected, Some(RoomId::new("!b:localhost")));
        app.on_key(key(KeyCode::Down));
        assert_eq!(app.selected, Some(RoomId::new("!b:localhost")));
        app.on_key(key(KeyCode::Up));
        assert_eq!(app.selected, Some(RoomId::new("!a:localhost")));
    }

    #[test]
    fn removed_hotkeys_leave_keys_to_widgets() {
        let mut app = app_with(&[("!a:localhost", "Alpha")]);
        app.hotkeys.remove();
        app.on_key(ctrl('k'));
        assert!(app.search.is_none());
        app.on_key(key(KeyCode::Char('x')));
        assert_eq!(app.focus, Focus::RoomList);
    }

    #[tokio::test(start_paused = true)]
    async fn created_room_is_selected_and_dialog_closed() {
        let mut app = app_with(&[]);
        app.on_key(ctrl('n'));
        assert!(app.dialog.is_some());
        for c in "Lobby".chars() {
            app.on_key(key(KeyCode::Char(c)));
        }
        app.on_key(key(KeyCode::Enter));

        while app.dialog.is_some() {
            let event = app.next_dialog_event().await;
            app.handle_dialog_event(event);
        }
        let room = app.selected_room().unwrap();
        assert_eq!(room.name, "Lobby");
        assert_eq!(app.focus, Focus::MessageInput);
        assert_eq!(app.notice.as_deref(), Some("created Lobby"));
    }

    #[test]
    fn ctrl_chords_in_dialog_are_not_typed() {
        let mut app = app_with(&[]);
        app.on_key(ctrl('n'));
        app.on_key(ctrl('t'));
        assert_eq!(app.dialog.as_ref().unwrap().controller().form().title, None);

        app.on_key(ctrl('q'));
        assert!(app.should_quit);
        assert_eq!(app.dialog.as_ref().unwrap().controller().form().title, None);
    }

    #[test]
    fn ctrl_chords_in_search_are_not_typed() {
        let mut app = app_with(&[("!a:localhost", "Alpha")]);
        app.on_key(ctrl('k'));
        app.on_key(ctrl('x'));
        assert_eq!(app.search.as_ref().unwrap().query(), "");
        app.on_key(ctrl('c'));
        assert!(app.should_quit);
    }

    #[test]
    fn cancelling_dialog_keeps_selection() {
        let mut app = app_with(&[("!a:localhost", "Alpha")]);
        app.on_key(ctrl('n'));
        app.on_key(key(KeyCode::Esc));
        assert!(app.dialog.is_none());
        assert!(!app.should_quit);
        assert_eq!(app.selected, Some(RoomId::new("!a:localhost")));
    }
}
