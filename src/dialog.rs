//! The "Create room" modal.
//!
//! A form-based overlay drawn on top of the room view. This module only
//! handles keys and rendering: every edit is forwarded to the `CreateRoom`
//! controller, which owns the real form state, the address check and the
//! submission. The text buffers and cursors here are what the user sees while
//! typing; the controller gets a copy of the buffer on every change.

use std::sync::Arc;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    layout::{Alignment, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
};

use crate::alias::AddressStatus;
use crate::create_room::{CreateRoom, DialogEvent, DialogOutcome, Field, Role, SubmissionState};
use crate::service::{RoomDirectory, RoomService};
use crate::theme::Theme;

// ── Focus ────────────────────────────────────────────────────────────────────

/// Which form row has keyboard focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DialogField {
    Name,
    Topic,
    Visibility,
    /// Only shown for public rooms.
    Address,
    /// Only shown for private rooms.
    Encryption,
    Role,
}

impl DialogField {
    fn is_text(self) -> bool {
        matches!(self, Self::Name | Self::Topic | Self::Address)
    }
}

// ── Dialog ───────────────────────────────────────────────────────────────────

pub struct CreateRoomDialog {
    controller: CreateRoom,
    field: DialogField,
    name: String,
    name_cursor: usize,
    topic: String,
    topic_cursor: usize,
    address: String,
    address_cursor: usize,
}

impl CreateRoomDialog {
    pub fn open(
        service: Arc<dyn RoomService>,
        directory: &RoomDirectory,
        server_name: impl Into<String>,
    ) -> Self {
        Self::from_controller(CreateRoom::open(service, directory, server_name))
    }

    fn from_controller(controller: CreateRoom) -> Self {
        Self {
            controller,
            field: DialogField::Name,
            name: String::new(),
            name_cursor: 0,
            topic: String::new(),
            topic_cursor: 0,
            address: String::new(),
            address_cursor: 0,
        }
    }

    pub fn controller(&self) -> &CreateRoom {
        &self.controller
    }

    /// Whether keyboard focus is in a text field.
    pub fn is_editing_text(&self) -> bool {
        self.field.is_text()
    }

    pub async fn next_event(&mut self) -> DialogEvent {
        self.controller.next_event().await
    }

    pub fn handle_event(&mut self, event: DialogEvent) -> Option<DialogOutcome> {
        self.controller.handle_event(event)
    }

    // ── Navigation ───────────────────────────────────────────────────────

    /// The row below `Visibility` depends on whether the room is public.
    fn option_row(&self) -> DialogField {
        if self.controller.form().is_public {
            DialogField::Address
        } else {
            DialogField::Encryption
        }
    }

    fn next_field(&mut self) {
        self.field = match self.field {
            DialogField::Name => DialogField::Topic,
            DialogField::Topic => DialogField::Visibility,
            DialogField::Visibility => self.option_row(),
            DialogField::Address | DialogField::Encryption => DialogField::Role,
            DialogField::Role => DialogField::Name,
        };
    }

    fn prev_field(&mut self) {
        self.field = match self.field {
            DialogField::Name => DialogField::Role,
            DialogField::Topic => DialogField::Name,
            DialogField::Visibility => DialogField::Topic,
            DialogField::Address | DialogField::Encryption => DialogField::Visibility,
            DialogField::Role => self.option_row(),
        };
    }

    // ── Keys ─────────────────────────────────────────────────────────────

    /// Handle a key press. Returns `Some` when the dialog should close.
    pub fn handle_key(&mut self, key: KeyEvent) -> Option<DialogOutcome> {
        match key.code {
            KeyCode::Esc => return Some(self.controller.cancel()),
            KeyCode::Tab if key.modifiers.contains(KeyModifiers::SHIFT) => self.prev_field(),
            KeyCode::Tab | KeyCode::Down => self.next_field(),
            KeyCode::BackTab | KeyCode::Up => self.prev_field(),
            KeyCode::Enter => {
                // The outcome (started, refused, already running) shows up in
                // the controller's state, which is what gets rendered.
                self.controller.submit();
            }
            _ => self.handle_field_key(key),
        }
        None
    }

    fn handle_field_key(&mut self, key: KeyEvent) {
        let toggle = matches!(
            key.code,
            KeyCode::Left | KeyCode::Right | KeyCode::Char(' ')
        );
        match self.field {
            DialogField::Name => {
                if handle_text_input(&mut self.name, &mut self.name_cursor, key) {
                    self.controller.edit_field(Field::Title, &self.name);
                }
            }
            DialogField::Topic => {
                if handle_text_input(&mut self.topic, &mut self.topic_cursor, key) {
                    self.controller.edit_field(Field::Topic, &self.topic);
                }
            }
            DialogField::Address => {
                if handle_text_input(&mut self.address, &mut self.address_cursor, key) {
                    self.controller.edit_field(Field::Address, &self.address);
                }
            }
            DialogField::Visibility if toggle => {
                let is_public = !self.controller.form().is_public;
                self.controller.set_public(is_public);
            }
            DialogField::Encryption if toggle => {
                let is_encrypted = !self.controller.form().is_encrypted;
                self.controller.set_encrypted(is_encrypted);
            }
            DialogField::Role if toggle => {
                let role = match self.controller.form().role {
                    Role::Admin => Role::Founder,
                    Role::Founder => Role::Admin,
                };
                self.controller.set_role(role);
            }
            _ => {}
        }
    }

    // ── Rendering ────────────────────────────────────────────────────────

    pub fn render(&self, f: &mut ratatui::Frame, theme: &Theme) {
        let area = f.area();

        let card_w: u16 = 60;
        let card_h: u16 = 18;
        let x = area.width.saturating_sub(card_w) / 2;
        let y = area.height.saturating_sub(card_h) / 2;
        let card = Rect::new(x, y, card_w.min(area.width), card_h.min(area.height));

        f.render_widget(Clear, card);
        let block = Block::default()
            .borders(Borders::ALL)
            .style(Style::default().bg(theme.bg))
            .border_style(Style::default().fg(theme.border_focused))
            .title(" Create room ")
            .title_style(Style::default().fg(theme.title))
            .title_alignment(Alignment::Center);
        f.render_widget(block, card);

        let inner = Rect::new(
            card.x + 2,
            card.y + 1,
            card.width.saturating_sub(4),
            card.height.saturating_sub(2),
        );

        let form = self.controller.form();
        let mut lines: Vec<Line> = Vec::new();
        // (row, column) of the terminal cursor when a text field is focused.
        let mut cursor = None;

        lines.push(Line::from(""));

        let name_row = lines.len();
        lines.push(self.text_row("Name", &self.name, DialogField::Name, theme));
        let topic_row = lines.len();
        lines.push(self.text_row("Topic", &self.topic, DialogField::Topic, theme));
        lines.push(Line::from(""));

        lines.push(self.choice_row(
            "Visibility",
            ("Private", "Public"),
            form.is_public,
            DialogField::Visibility,
            theme,
        ));

        if form.is_public {
            let address_row = lines.len();
            lines.push(self.text_row("Address", &self.address, DialogField::Address, theme));
            lines.push(self.address_status_line(theme));
            if self.field == DialogField::Address {
                cursor = Some((address_row, self.address_cursor));
            }
        } else {
            lines.push(self.choice_row(
                "Encryption",
                ("On", "Off"),
                !form.is_encrypted,
                DialogField::Encryption,
                theme,
            ));
            lines.push(Line::from(Span::styled(
                "              Can't be changed later",
                Style::default().fg(theme.text_muted),
            )));
        }

        lines.push(self.choice_row(
            "Role",
            ("Admin", "Founder"),
            form.role == Role::Founder,
            DialogField::Role,
            theme,
        ));
        lines.push(Line::from(""));
        lines.push(self.status_line(theme));

        match self.field {
            DialogField::Name => cursor = Some((name_row, self.name_cursor)),
            DialogField::Topic => cursor = Some((topic_row, self.topic_cursor)),
            _ => {}
        }

        f.render_widget(Paragraph::new(lines), inner);

        if let Some((row, col)) = cursor {
            f.set_cursor_position((
                inner.x + LABEL_WIDTH + col as u16,
                inner.y + row as u16,
            ));
        }
    }

    fn label(&self, text: &str, field: DialogField, theme: &Theme) -> Span<'static> {
        let focused = self.field == field;
        let style = if focused {
            Style::default()
                .fg(theme.accent)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(theme.text)
        };
        let marker = if focused { '>' } else { ' ' };
        Span::styled(format!("{marker} {:<12}", format!("{text}:")), style)
    }

    fn text_row<'a>(
        &self,
        label: &str,
        value: &'a str,
        field: DialogField,
        theme: &Theme,
    ) -> Line<'a> {
        Line::from(vec![
            self.label(label, field, theme),
            Span::styled(value, Style::default().fg(theme.text)),
        ])
    }

    /// Two options side by side; `second` selects the right-hand one.
    fn choice_row(
        &self,
        label: &str,
        (left, right): (&'static str, &'static str),
        second: bool,
        field: DialogField,
        theme: &Theme,
    ) -> Line<'static> {
        let on = Style::default()
            .fg(theme.accent_on_bg)
            .bg(theme.accent_bg)
            .add_modifier(Modifier::BOLD);
        let off = Style::default().fg(theme.text_dim);
        let (left_style, right_style) = if second { (off, on) } else { (on, off) };
        Line::from(vec![
            self.label(label, field, theme),
            Span::styled(format!(" {left} "), left_style),
            Span::raw("  "),
            Span::styled(format!(" {right} "), right_style),
        ])
    }

    fn address_status_line(&self, theme: &Theme) -> Line<'static> {
        let indent = " ".repeat(LABEL_WIDTH as usize);
        let form = self.controller.form();
        let Some(address) = &form.address else {
            return Line::from(Span::styled(
                format!("{indent}e.g. my_room"),
                Style::default().fg(theme.text_muted),
            ));
        };
        let validity = self.controller.validity();
        let alias = self.controller.full_alias(address);
        let (text, color) = match validity.status {
            AddressStatus::Unknown => (format!("{alias} (checking...)"), theme.address_unknown),
            AddressStatus::Valid => (format!("{alias} is available"), theme.address_valid),
            AddressStatus::Invalid => (
                validity.error.clone().unwrap_or(alias),
                theme.address_invalid,
            ),
        };
        Line::from(Span::styled(
            format!("{indent}{text}"),
            Style::default().fg(color),
        ))
    }

    fn status_line(&self, theme: &Theme) -> Line<'static> {
        if self.controller.submission() == SubmissionState::Submitting {
            return Line::from(Span::styled(
                "  Creating room...",
                Style::default()
                    .fg(theme.busy)
                    .add_modifier(Modifier::ITALIC),
            ));
        }
        if let Some(err) = self.controller.error() {
            return Line::from(Span::styled(
                format!("  {err}"),
                Style::default()
                    .fg(theme.error)
                    .add_modifier(Modifier::BOLD),
            ));
        }
        let key = Style::default()
            .fg(theme.hint_key)
            .add_modifier(Modifier::BOLD);
        let text = Style::default().fg(theme.hint_text);
        let create_style = if self.controller.can_submit() {
            key
        } else {
            Style::default().fg(theme.text_muted)
        };
        Line::from(vec![
            Span::styled("  Enter", create_style),
            Span::styled(" create  ", text),
            Span::styled("Tab", key),
            Span::styled(" next field  ", text),
            Span::styled("Space", key),
            Span::styled(" toggle  ", text),
            Span::styled("Esc", key),
            Span::styled(" cancel", text),
        ])
    }
}

/// Width of "> Label:     " before every field value.
const LABEL_WIDTH: u16 = 14;

// ── Text input ───────────────────────────────────────────────────────────────

/// Apply a key to a single-line text buffer. `cursor` counts characters, not
/// bytes. Returns `true` if the text changed.
pub fn handle_text_input(text: &mut String, cursor: &mut usize, key: KeyEvent) -> bool {
    // `char_indices().nth(n)` maps a character position to its byte offset;
    // past the end it's `None`, which means "append".
    fn byte_at(text: &str, n: usize) -> usize {
        text.char_indices().nth(n).map_or(text.len(), |(i, _)| i)
    }
    let chord = key
        .modifiers
        .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SUPER);
    match key.code {
        // Shortcuts, not text.
        KeyCode::Char(_) if chord => false,
        KeyCode::Char(c) => {
            let at = byte_at(text, *cursor);
            text.insert(at, c);
            *cursor += 1;
            true
        }
        KeyCode::Backspace if *cursor > 0 => {
            *cursor -= 1;
            let at = byte_at(text, *cursor);
            text.remove(at);
            true
        }
        KeyCode::Left => {
            *cursor = cursor.saturating_sub(1);
            false
        }
        KeyCode::Right => {
            if *cursor < text.chars().count() {
                *cursor += 1;
            }
            false
        }
        KeyCode::Home => {
            *cursor = 0;
            false
        }
        KeyCode::End => {
            *cursor = text.chars().count();
            false
        }
        _ => false,
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use tokio::time::{Duration, sleep};

    use super::*;
    use crate::homeserver::LocalHomeserver;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn dialog() -> CreateRoomDialog {
        let directory = RoomDirectory::new();
        let hs = LocalHomeserver::new("localhost", directory.clone(), Duration::from_millis(10));
        CreateRoomDialog::open(Arc::new(hs), &directory, "localhost")
    }

    fn type_str(d: &mut CreateRoomDialog, s: &str) {
        for c in s.chars() {
            d.handle_key(key(KeyCode::Char(c)));
        }
    }

    // ── Text input ───────────────────────────────────────────────────────

    #[test]
    fn text_input_insert_and_backspace() {
        let mut text = String::new();
        let mut cursor = 0;
        for c in "abc".chars() {
            assert!(handle_text_input(&mut text, &mut cursor, key(KeyCode::Char(c))));
        }
        assert_eq!((text.as_str(), cursor), ("abc", 3));
        assert!(handle_text_input(&mut text, &mut cursor, key(KeyCode::Backspace)));
        assert_eq!((text.as_str(), cursor), ("ab", 2));
    }

    #[test]
    fn text_input_backspace_at_start_is_noop() {
        let mut text = "hi".to_string();
        let mut cursor = 0;
        assert!(!handle_text_input(&mut text, &mut cursor, key(KeyCode::Backspace)));
        assert_eq!(text, "hi");
    }

    #[test]
    fn text_input_handles_multibyte_chars() {
        let mut text = "héllo".to_string();
        let mut cursor = 2;
        handle_text_input(&mut text, &mut cursor, key(KeyCode::Backspace));
        assert_eq!(text, "hllo");
        handle_text_input(&mut text, &mut cursor, key(KeyCode::Char('é')));
        assert_eq!(text, "héllo");
        handle_text_input(&mut text, &mut cursor, key(KeyCode::End));
        assert_eq!(cursor, 5);
    }

    #[test]
    fn text_input_ignores_modifier_chords() {
        let mut text = "ab".to_string();
        let mut cursor = 2;
        for modifiers in [KeyModifiers::CONTROL, KeyModifiers::ALT, KeyModifiers::SUPER] {
            let chord = KeyEvent::new(KeyCode::Char('q'), modifiers);
            assert!(!handle_text_input(&mut text, &mut cursor, chord));
        }
        assert_eq!((text.as_str(), cursor), ("ab", 2));

        // Shift is just capitalization.
        let shifted = KeyEvent::new(KeyCode::Char('C'), KeyModifiers::SHIFT);
        assert!(handle_text_input(&mut text, &mut cursor, shifted));
        assert_eq!(text, "abC");
    }

    #[test]
    fn cursor_moves_are_clamped() {
        let mut text = "ab".to_string();
        let mut cursor = 0;
        handle_text_input(&mut text, &mut cursor, key(KeyCode::Left));
        assert_eq!(cursor, 0);
        cursor = 2;
        handle_text_input(&mut text, &mut cursor, key(KeyCode::Right));
        assert_eq!(cursor, 2);
    }

    // ── Navigation ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn tab_order_follows_visibility() {
        let mut d = dialog();
        d.handle_key(key(KeyCode::Tab));
        d.handle_key(key(KeyCode::Tab));
        assert_eq!(d.field, DialogField::Visibility);
        d.handle_key(key(KeyCode::Tab));
        assert_eq!(d.field, DialogField::Encryption);

        d.field = DialogField::Visibility;
        d.handle_key(key(KeyCode::Char(' ')));
        assert!(d.controller().form().is_public);
        d.handle_key(key(KeyCode::Tab));
        assert_eq!(d.field, DialogField::Address);
        d.handle_key(key(KeyCode::Tab));
        assert_eq!(d.field, DialogField::Role);
        d.handle_key(key(KeyCode::BackTab));
        assert_eq!(d.field, DialogField::Address);
    }

    #[tokio::test]
    async fn typing_updates_controller() {
        let mut d = dialog();
        type_str(&mut d, "Lobby");
        assert_eq!(d.controller().form().title.as_deref(), Some("Lobby"));
        assert!(d.is_editing_text());

        d.handle_key(key(KeyCode::Tab));
        type_str(&mut d, "  ");
        assert_eq!(d.controller().form().topic, None);
    }

    #[tokio::test]
    async fn toggles_change_form() {
        let mut d = dialog();
        d.field = DialogField::Encryption;
        d.handle_key(key(KeyCode::Right));
        assert!(!d.controller().form().is_encrypted);

        d.field = DialogField::Role;
        d.handle_key(key(KeyCode::Char(' ')));
        assert_eq!(d.controller().form().role, Role::Founder);
        assert!(!d.is_editing_text());
    }

    #[tokio::test]
    async fn esc_cancels() {
        let mut d = dialog();
        type_str(&mut d, "Lobby");
        assert_eq!(d.handle_key(key(KeyCode::Esc)), Some(DialogOutcome::Cancelled));
        assert_eq!(d.controller().form().title, None);
    }

    #[tokio::test(start_paused = true)]
    async fn enter_creates_room_through_homeserver() {
        let mut d = dialog();
        type_str(&mut d, "Lobby");
        assert_eq!(d.handle_key(key(KeyCode::Enter)), None);
        assert_eq!(d.controller().submission(), SubmissionState::Submitting);

        let outcome = loop {
            let event = d.next_event().await;
            if let Some(outcome) = d.handle_event(event) {
                break outcome;
            }
        };
        assert!(matches!(outcome, DialogOutcome::Created(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn enter_without_name_shows_error() {
        let mut d = dialog();
        d.handle_key(key(KeyCode::Enter));
        sleep(Duration::from_millis(100)).await;
        assert_eq!(d.controller().submission(), SubmissionState::Idle);
        assert_eq!(
            d.controller().error().map(ToString::to_string).as_deref(),
            Some("Room name is required")
        );
    }
}
