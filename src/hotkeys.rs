//! Global keyboard routing.
//!
//! Every key press passes through `route()` before anything else sees it. The
//! router looks at a snapshot of the UI (`KeyRoutingContext`) and decides
//! whether the key is an application shortcut, a reason to jump into the
//! message box, or nothing at all. It never touches UI state itself: the
//! caller applies the returned `Route` with `dispatch()`.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Well-known id of the message composer.
pub const MESSAGE_INPUT_ID: &str = "message-textarea";

/// What the UI looks like at the moment a key arrives.
#[derive(Debug, Clone, Copy)]
pub struct KeyRoutingContext {
    pub modal_open: bool,
    pub settings_panel_open: bool,
    /// The focused widget accepts typed text.
    pub focused_is_text_input: bool,
    pub key: KeyEvent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotkeyAction {
    OpenSearch,
    ToggleSettingsPanel,
    FocusMessageInput,
}

/// The router's verdict for one key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Route {
    pub action: Option<HotkeyAction>,
    /// Swallow the key: its normal handling must not run.
    pub prevent_default: bool,
}

impl Route {
    const NONE: Route = Route {
        action: None,
        prevent_default: false,
    };

    fn action(action: HotkeyAction) -> Self {
        Self {
            action: Some(action),
            prevent_default: false,
        }
    }
}

/// Decide what a key press means. At most one action per key.
pub fn route(ctx: &KeyRoutingContext) -> Route {
    let mods = ctx.key.modifiers;
    // Ctrl on Linux/Windows, Cmd (reported as SUPER) on macOS terminals that
    // forward it.
    let command = mods.intersects(KeyModifiers::CONTROL | KeyModifiers::SUPER);
    let alt = mods.contains(KeyModifiers::ALT);

    if command && matches!(ctx.key.code, KeyCode::Char('k' | 'K')) {
        // Always swallowed, even under a modal.
        return Route {
            action: (!ctx.modal_open).then_some(HotkeyAction::OpenSearch),
            prevent_default: true,
        };
    }
    if command || alt {
        return Route::NONE;
    }

    if ctx.modal_open || ctx.focused_is_text_input {
        return Route::NONE;
    }
    if ctx.key.code == KeyCode::Esc && ctx.settings_panel_open {
        return Route::action(HotkeyAction::ToggleSettingsPanel);
    }
    if is_ignored_key(ctx.key.code) {
        return Route::NONE;
    }
    Route::action(HotkeyAction::FocusMessageInput)
}

/// Keys that never pull focus into the message box: navigation, editing
/// keys other than Backspace, function, lock, media and modifier keys, and
/// space.
pub fn is_ignored_key(code: KeyCode) -> bool {
    match code {
        KeyCode::Char(' ') => true,
        KeyCode::Char(_) | KeyCode::Backspace => false,
        _ => true,
    }
}

/// The parts of the application the router can act on.
pub trait HotkeyTarget {
    fn open_search(&mut self);
    fn toggle_settings_panel(&mut self);
    /// Focus the widget with `id`. Returns `false` if there is no such widget
    /// right now.
    fn focus_element(&mut self, id: &str) -> bool;
}

/// Apply a route to the application.
pub fn dispatch(route: Route, target: &mut impl HotkeyTarget) {
    let Some(action) = route.action else {
        return;
    };
    tracing::trace!(?action, "hotkey");
    match action {
        HotkeyAction::OpenSearch => target.open_search(),
        HotkeyAction::ToggleSettingsPanel => target.toggle_settings_panel(),
        HotkeyAction::FocusMessageInput => {
            if !target.focus_element(MESSAGE_INPUT_ID) {
                tracing::trace!("no message input to focus");
            }
        }
    }
}

/// The global key listener. While installed, every key press is routed
/// before normal handling; once removed, keys go straight to the widgets.
#[derive(Debug, Default, Clone, Copy)]
pub struct Hotkeys {
    installed: bool,
}

impl Hotkeys {
    pub fn install(&mut self) {
        self.installed = true;
    }

    pub fn remove(&mut self) {
        self.installed = false;
    }

    pub fn is_installed(&self) -> bool {
        self.installed
    }

    /// Route and dispatch one key. Returns `true` if the key was consumed.
    pub fn handle(&self, ctx: &KeyRoutingContext, target: &mut impl HotkeyTarget) -> bool {
        if !self.installed {
            return false;
        }
        let route = route(ctx);
        dispatch(route, target);
        route.prevent_default
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
