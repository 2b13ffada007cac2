//! Modal room search overlay.
//!
//! Opened with Ctrl+K. The user types part of a room name or alias and picks
//! one of the matches. Uses the same `Clear` pattern as the create-room
//! dialog to draw on top of the room view.

use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
};

use crate::dialog::handle_text_input;
use crate::service::{RoomId, RoomSummary};
use crate::theme::Theme;

/// The result of processing a key event in the search overlay.
#[derive(Debug, PartialEq, Eq)]
pub enum SearchResult {
    /// User picked this room.
    Selected(RoomId),
    /// User cancelled (Esc).
    Cancelled,
    /// Still typing or moving the selection.
    Searching,
}

#[derive(Debug, Default)]
pub struct SearchModal {
    query: String,
    cursor: usize,
    /// Index into the current matches.
    selected: usize,
}

impl SearchModal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    /// Rooms whose name or alias contains the query, ignoring case. An empty
    /// query matches everything.
    pub fn matches<'a>(&self, rooms: &'a [RoomSummary]) -> Vec<&'a RoomSummary> {
        let needle = self.query().trim().to_lowercase();
        rooms
            .iter()
            .filter(|room| {
                needle.is_empty()
                    || room.name.to_lowercase().contains(&needle)
                    || room
                        .alias
                        .as_deref()
                        .is_some_and(|alias| alias.to_lowercase().contains(&needle))
            })
            .collect()
    }

    pub fn handle_key(&mut self, key: KeyEvent, rooms: &[RoomSummary]) -> SearchResult {
        let count = self.matches(rooms).len();
        match key.code {
            KeyCode::Esc => return SearchResult::Cancelled,
            KeyCode::Enter => {
                if let Some(room) = self.matches(rooms).get(self.selected) {
                    return SearchResult::Selected(room.id.clone());
                }
            }
            KeyCode::Up => self.selected = self.selected.saturating_sub(1),
            KeyCode::Down => {
                if self.selected + 1 < count {
                    self.selected += 1;
                }
            }
            _ => {
                if handle_text_input(&mut self.query, &mut self.cursor, key) {
                    // The match list changed; start again from the top.
                    self.selected = 0;
                }
            }
        }
        SearchResult::Searching
    }

    /// Render the overlay on top of the existing UI.
    pub fn render(&self, f: &mut ratatui::Frame, rooms: &[RoomSummary], theme: &Theme) {
        let area = f.area();

        let card_w = (area.width * 60 / 100).max(40).min(area.width);
        let card_h = (area.height * 60 / 100).max(8).min(area.height);
        let x = area.width.saturating_sub(card_w) / 2;
        let y = area.height.saturating_sub(card_h) / 2;
        let card = Rect::new(x, y, card_w, card_h);

        f.render_widget(Clear, card);
        let block = Block::default()
            .borders(Borders::ALL)
            .style(Style::default().bg(theme.bg))
            .border_style(Style::default().fg(theme.border_focused))
            .title(" Search rooms (Enter=open, Esc=cancel) ")
            .title_style(Style::default().fg(theme.title))
            .title_alignment(Alignment::Center);
        let inner = block.inner(card);
        f.render_widget(block, card);

        let [query_area, list_area] =
            Layout::vertical([Constraint::Length(2), Constraint::Min(1)]).areas(inner);

        let query = Paragraph::new(Line::from(vec![
            Span::styled("> ", Style::default().fg(theme.input_prompt)),
            Span::styled(self.query(), Style::default().fg(theme.text)),
        ]));
        f.render_widget(query, query_area);
        f.set_cursor_position((query_area.x + 2 + self.cursor as u16, query_area.y));

        let matches = self.matches(rooms);
        let lines: Vec<Line> = if matches.is_empty() {
            vec![Line::from(Span::styled(
                "no matching rooms",
                Style::default()
                    .fg(theme.text_dim)
                    .add_modifier(Modifier::ITALIC),
            ))]
        } else {
            matches
                .iter()
                .enumerate()
                .map(|(i, room)| {
                    let (name_style, alias_style) = if i == self.selected {
                        let s = Style::default().fg(theme.selected_fg).bg(theme.selected_bg);
                        (s.add_modifier(Modifier::BOLD), s)
                    } else {
                        (
                            Style::default().fg(theme.room_name),
                            Style::default().fg(theme.room_alias),
                        )
                    };
                    let mut spans = vec![Span::styled(format!(" {} ", room.name), name_style)];
                    if let Some(alias) = &room.alias {
                        spans.push(Span::styled(format!("{alias} "), alias_style));
                    }
                    Line::from(spans)
                })
                .collect()
        };
        f.render_widget(Paragraph::new(lines), list_area);
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
