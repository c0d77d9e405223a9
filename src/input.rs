// ============================================================================
// input.rs — Life GPU
// Keyboard/pointer mapping to simulation commands, and window chrome state
// (fullscreen toggle with saved windowed geometry).
// ============================================================================

use winit::dpi::{PhysicalPosition, PhysicalSize};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Fullscreen, Window};

use crate::config::{InitialMode, ModelSize};

/// Everything the keyboard, the pointer and the UI strip can ask for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    Quit,
    ToggleFullscreen,
    SetModelSize(ModelSize),
    /// Index into the rule catalog.
    SelectRule(usize),
    SetInitialMode(InitialMode),
    Reset,
    Screenshot,
    ToggleVsync,
}

pub const KEY_HELP: &[(&str, &str)] = &[
    ("Esc", "quit"),
    ("F1", "toggle fullscreen"),
    ("Space / right click", "restart"),
    ("1 - 4", "grid 128 / 256 / 512 / 1024"),
    ("Left drag", "draw cells (Empty mode)"),
    ("F12", "save grid as PNG"),
    ("V", "toggle vsync"),
];

pub fn command_for_key(key: &Key) -> Option<Command> {
    match key {
        Key::Named(NamedKey::Escape) => Some(Command::Quit),
        Key::Named(NamedKey::F1) => Some(Command::ToggleFullscreen),
        Key::Named(NamedKey::Space) => Some(Command::Reset),
        Key::Named(NamedKey::F12) => Some(Command::Screenshot),
        Key::Character(c) => match c.as_str() {
            "1" => Some(Command::SetModelSize(ModelSize::S128)),
            "2" => Some(Command::SetModelSize(ModelSize::S256)),
            "3" => Some(Command::SetModelSize(ModelSize::S512)),
            "4" => Some(Command::SetModelSize(ModelSize::S1024)),
            "v" | "V" => Some(Command::ToggleVsync),
            _ => None,
        },
        _ => None,
    }
}

// ======================== Pointer ========================

/// Left button and cursor, polled once per frame while drawing.
#[derive(Default)]
pub struct PointerState {
    pub left_held: bool,
    pub position: Option<(f64, f64)>,
}

impl PointerState {
    /// Cursor position while the left button is held.
    pub fn drawing_at(&self) -> Option<(f64, f64)> {
        if self.left_held {
            self.position
        } else {
            None
        }
    }
}

// ======================== Window Chrome ========================

/// Fullscreen flag plus the windowed geometry to restore when leaving it.
#[derive(Default)]
pub struct WindowChrome {
    fullscreen: bool,
    saved: Option<(Option<PhysicalPosition<i32>>, PhysicalSize<u32>)>,
}

impl WindowChrome {
    pub fn is_fullscreen(&self) -> bool {
        self.fullscreen
    }

    pub fn toggle(&mut self, window: &Window) {
        if self.fullscreen {
            window.set_fullscreen(None);
            if let Some((position, size)) = self.leave() {
                let _ = window.request_inner_size(size);
                if let Some(position) = position {
                    window.set_outer_position(position);
                }
            }
        } else {
            self.enter(window.outer_position().ok(), window.inner_size());
            window.set_fullscreen(Some(Fullscreen::Borderless(None)));
        }
        log::info!("Fullscreen: {}", if self.is_fullscreen() { "ON" } else { "OFF" });
    }

    fn enter(&mut self, position: Option<PhysicalPosition<i32>>, size: PhysicalSize<u32>) {
        self.saved = Some((position, size));
        self.fullscreen = true;
    }

    fn leave(&mut self) -> Option<(Option<PhysicalPosition<i32>>, PhysicalSize<u32>)> {
        self.fullscreen = false;
        self.saved.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_mapping() {
        assert_eq!(command_for_key(&Key::Named(NamedKey::Escape)), Some(Command::Quit));
        assert_eq!(command_for_key(&Key::Named(NamedKey::F1)), Some(Command::ToggleFullscreen));
        assert_eq!(command_for_key(&Key::Named(NamedKey::Space)), Some(Command::Reset));
        assert_eq!(
            command_for_key(&Key::Character("4".into())),
            Some(Command::SetModelSize(ModelSize::S1024))
        );
        assert_eq!(command_for_key(&Key::Character("V".into())), Some(Command::ToggleVsync));
        assert_eq!(command_for_key(&Key::Character("5".into())), None);
        assert_eq!(command_for_key(&Key::Named(NamedKey::Tab)), None);
    }

    #[test]
    fn test_pointer_only_draws_while_held() {
        let mut pointer = PointerState::default();
        assert_eq!(pointer.drawing_at(), None);
        pointer.position = Some((400.0, 300.0));
        assert_eq!(pointer.drawing_at(), None);
        pointer.left_held = true;
        assert_eq!(pointer.drawing_at(), Some((400.0, 300.0)));
    }

    #[test]
    fn test_chrome_restores_saved_geometry() {
        let mut chrome = WindowChrome::default();
        let pos = PhysicalPosition::new(40, 60);
        let size = PhysicalSize::new(800, 600);
        chrome.enter(Some(pos), size);
        assert!(chrome.is_fullscreen());
        assert_eq!(chrome.leave(), Some((Some(pos), size)));
        assert!(!chrome.is_fullscreen());
        assert_eq!(chrome.leave(), None);
    }
}
