//! Centralized color theme for the TUI.
//!
//! Defines a `Theme` struct with named color slots for every semantic role used
//! across the UI. Two palettes are provided, dark (default) and light, and a
//! runtime toggle switches between them with Ctrl+T.

use ratatui::style::Color;
use serde::Deserialize;

/// Which palette is currently active. Spelled `"dark"` / `"light"` in the
/// config file.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    Dark,
    Light,
}

/// A complete color palette for the TUI.
///
/// Every color used by the UI is looked up here; no hardcoded `Color::*`
/// constants elsewhere in the codebase.
#[derive(Debug, Clone)]
pub struct Theme {
    pub mode: ThemeMode,

    // ── Background ─────────────────────────────────────────────────────
    pub bg: Color,

    // ── Surfaces / borders ───────────────────────────────────────────────
    pub border: Color,
    pub border_focused: Color,
    pub title: Color,

    // ── Text ─────────────────────────────────────────────────────────────
    pub text: Color,
    pub text_dim: Color,
    pub text_muted: Color,

    // ── Accents ──────────────────────────────────────────────────────────
    pub accent: Color,
    pub accent_bg: Color,
    pub accent_on_bg: Color,

    // ── Rooms ────────────────────────────────────────────────────────────
    pub room_name: Color,
    pub room_alias: Color,
    pub selected_fg: Color,
    pub selected_bg: Color,

    // ── Address check ────────────────────────────────────────────────────
    pub address_valid: Color,
    pub address_invalid: Color,
    pub address_unknown: Color,

    // ── Status / hints ───────────────────────────────────────────────────
    pub busy: Color,
    pub error: Color,
    pub hint_key: Color,
    pub hint_text: Color,

    // ── Input ────────────────────────────────────────────────────────────
    pub input_prompt: Color,
}

impl Theme {
    /// Dark theme: dark grey background, purple accent.
    pub fn dark() -> Self {
        Self {
            mode: ThemeMode::Dark,

            bg: Color::Rgb(25, 20, 35),

            border: Color::Rgb(100, 80, 140),
            border_focused: Color::Rgb(180, 130, 255),
            title: Color::Rgb(180, 130, 255),

            text: Color::Rgb(220, 220, 220),
            text_dim: Color::Rgb(120, 115, 130),
            text_muted: Color::Rgb(100, 100, 110),

            accent: Color::Rgb(180, 130, 255),
            accent_bg: Color::Rgb(180, 130, 255),
            accent_on_bg: Color::Rgb(20, 15, 30),

            room_name: Color::Rgb(200, 160, 255),
            room_alias: Color::Rgb(220, 180, 100),
            selected_fg: Color::Rgb(20, 15, 30),
            selected_bg: Color::Rgb(180, 130, 255),

            address_valid: Color::Rgb(100, 220, 100),
            address_invalid: Color::Rgb(255, 100, 100),
            address_unknown: Color::Rgb(100, 100, 110),

            busy: Color::Rgb(220, 180, 100),
            error: Color::Rgb(255, 100, 100),
            hint_key: Color::Rgb(140, 200, 140),
            hint_text: Color::Rgb(120, 115, 130),

            input_prompt: Color::Rgb(180, 130, 255),
        }
    }

    /// Light theme: off-white feel, deeper purples.
    pub fn light() -> Self {
        Self {
            mode: ThemeMode::Light,

            bg: Color::Rgb(240, 236, 245),

            border: Color::Rgb(180, 160, 200),
            border_focused: Color::Rgb(120, 60, 200),
            title: Color::Rgb(120, 60, 200),

            text: Color::Rgb(50, 50, 60),
            text_dim: Color::Rgb(110, 100, 120),
            text_muted: Color::Rgb(140, 130, 150),

            accent: Color::Rgb(120, 60, 200),
            accent_bg: Color::Rgb(120, 60, 200),
            accent_on_bg: Color::Rgb(255, 255, 255),

            room_name: Color::Rgb(100, 40, 180),
            room_alias: Color::Rgb(160, 100, 20),
            selected_fg: Color::Rgb(255, 255, 255),
            selected_bg: Color::Rgb(120, 60, 200),

            address_valid: Color::Rgb(30, 140, 30),
            address_invalid: Color::Rgb(200, 40, 40),
            address_unknown: Color::Rgb(140, 130, 150),

            busy: Color::Rgb(160, 100, 20),
            error: Color::Rgb(200, 40, 40),
            hint_key: Color::Rgb(30, 140, 30),
            hint_text: Color::Rgb(140, 130, 150),

            input_prompt: Color::Rgb(120, 60, 200),
        }
    }

    pub fn for_mode(mode: ThemeMode) -> Self {
        match mode {
            ThemeMode::Dark => Self::dark(),
            ThemeMode::Light => Self::light(),
        }
    }

    /// Toggle between dark and light palettes.
    pub fn toggle(&mut self) {
        *self = Self::for_mode(match self.mode {
            ThemeMode::Dark => ThemeMode::Light,
            ThemeMode::Light => ThemeMode::Dark,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggle_flips_mode_and_back() {
        let mut theme = Theme::dark();
        theme.toggle();
        assert_eq!(theme.mode, ThemeMode::Light);
        assert_eq!(theme.bg, Theme::light().bg);
        theme.toggle();
        assert_eq!(theme.mode, ThemeMode::Dark);
    }
}
