use anyhow::{Context, Result, anyhow};
use enigo::Keyboard as _;
use enigo::Mouse as _;
use enigo::{Button as EButton, Coordinate, Direction, Enigo, Key as EKey, Settings};
use std::sync::{Mutex, MutexGuard};
use tracing::trace;

use super::driver::{InputDriver, Key, Point};
use crate::steps::MouseButton;
use crate::utils::browser;

/// Input driver that simulates real pointer and keyboard events through Enigo.
pub struct DesktopDriver {
    enigo: Mutex<Enigo>,
}

impl DesktopDriver {
    /// Connect to the desktop input subsystem.
    ///
    /// Fails when no interactive session is available; callers treat that as fatal.
    pub fn new() -> Result<Self> {
        trace!(target: "macrobot::driver", "Initializing Enigo");
        let enigo = Enigo::new(&Settings::default())
            .context("Failed to initialize Enigo. Is a desktop session available?")?;
        Ok(Self {
            enigo: Mutex::new(enigo),
        })
    }

    fn enigo(&self) -> Result<MutexGuard<'_, Enigo>> {
        self.enigo.lock().map_err(|_| anyhow!("Enigo lock poisoned"))
    }

    fn key(&self, key: Key, direction: Direction) -> Result<()> {
        trace!(target: "macrobot::driver", ?key, ?direction, "key");
        self.enigo()?
            .key(map_key(key), direction)
            .with_context(|| format!("key {key:?} {direction:?} failed"))
    }

    fn button(&self, button: MouseButton, direction: Direction) -> Result<()> {
        trace!(target: "macrobot::driver", ?button, ?direction, "button");
        self.enigo()?
            .button(map_mouse_button(button), direction)
            .with_context(|| format!("button {button:?} {direction:?} failed"))
    }
}

impl InputDriver for DesktopDriver {
    fn name(&self) -> &'static str {
        "enigo"
    }

    fn move_to(&self, x: i32, y: i32) -> Result<()> {
        trace!(target: "macrobot::driver", x, y, "move_to");
        self.enigo()?
            .move_mouse(x, y, Coordinate::Abs)
            .context("move_mouse failed")
    }

    fn location(&self) -> Result<Point> {
        let (x, y) = self
            .enigo()?
            .location()
            .context("Failed to query pointer location")?;
        Ok(Point::new(x, y))
    }

    fn button_press(&self, button: MouseButton) -> Result<()> {
        self.button(button, Direction::Press)
    }

    fn button_release(&self, button: MouseButton) -> Result<()> {
        self.button(button, Direction::Release)
    }

    fn key_press(&self, key: Key) -> Result<()> {
        self.key(key, Direction::Press)
    }

    fn key_release(&self, key: Key) -> Result<()> {
        self.key(key, Direction::Release)
    }

    fn open_url(&self, url: &str) -> Result<()> {
        browser::open_url(url)
    }
}

fn map_mouse_button(btn: MouseButton) -> EButton {
    match btn {
        MouseButton::Left => EButton::Left,
        MouseButton::Right => EButton::Right,
    }
}

fn map_key(key: Key) -> EKey {
    match key {
        Key::Control => EKey::Control,
        Key::Shift => EKey::Shift,
        Key::Enter => EKey::Return,
        Key::Escape => EKey::Escape,
        Key::Tab => EKey::Tab,
        Key::Space => EKey::Space,
        Key::Char(c) => EKey::Unicode(c),
    }
}
