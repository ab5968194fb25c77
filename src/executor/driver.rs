use anyhow::{Context, Result, anyhow};
use std::sync::Mutex;
use tracing::info;

use crate::steps::MouseButton;

/// Logical key understood by every driver.
///
/// `Char` always carries the unshifted base character of a key (`'a'`, `'1'`,
/// `'/'`); shifted symbols are produced by holding [`Key::Shift`] around it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Control,
    Shift,
    Enter,
    Escape,
    Tab,
    Space,
    Char(char),
}

/// Screen coordinates in pixels.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, serde::Serialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x.saturating_add(dx), self.y.saturating_add(dy))
    }
}

/// Capability surface used to simulate input.
///
/// Every call is synchronous and expected to return promptly. Implementations
/// are shared between the playback worker and the HTTP layer (pointer queries),
/// hence `&self` receivers and the `Send + Sync` bound.
pub trait InputDriver: Send + Sync + 'static {
    /// Static human-readable identifier (used in logs).
    fn name(&self) -> &'static str;

    fn move_to(&self, x: i32, y: i32) -> Result<()>;

    fn location(&self) -> Result<Point>;

    fn button_press(&self, button: MouseButton) -> Result<()>;

    fn button_release(&self, button: MouseButton) -> Result<()>;

    fn key_press(&self, key: Key) -> Result<()>;

    fn key_release(&self, key: Key) -> Result<()>;

    /// Best-effort: callers ignore failures.
    fn open_url(&self, url: &str) -> Result<()>;
}

/// Driver that only logs what it would do.
///
/// Keeps a virtual pointer so relative moves and `/mouse/position` stay coherent.
#[derive(Debug, Default)]
pub struct DryRunDriver {
    pointer: Mutex<Point>,
}

impl DryRunDriver {
    pub fn new() -> Self {
        Self::default()
    }

    fn pointer(&self) -> Result<std::sync::MutexGuard<'_, Point>> {
        self.pointer
            .lock()
            .map_err(|_| anyhow!("dry-run pointer lock poisoned"))
    }
}

impl InputDriver for DryRunDriver {
    fn name(&self) -> &'static str {
        "dry-run"
    }

    fn move_to(&self, x: i32, y: i32) -> Result<()> {
        info!(target: "macrobot::driver", x, y, "DRY-RUN move_to");
        *self.pointer()? = Point::new(x, y);
        Ok(())
    }

    fn location(&self) -> Result<Point> {
        let p = *self.pointer().context("location unavailable")?;
        Ok(p)
    }

    fn button_press(&self, button: MouseButton) -> Result<()> {
        info!(target: "macrobot::driver", ?button, "DRY-RUN button_press");
        Ok(())
    }

    fn button_release(&self, button: MouseButton) -> Result<()> {
        info!(target: "macrobot::driver", ?button, "DRY-RUN button_release");
        Ok(())
    }

    fn key_press(&self, key: Key) -> Result<()> {
        info!(target: "macrobot::driver", ?key, "DRY-RUN key_press");
        Ok(())
    }

    fn key_release(&self, key: Key) -> Result<()> {
        info!(target: "macrobot::driver", ?key, "DRY-RUN key_release");
        Ok(())
    }

    fn open_url(&self, url: &str) -> Result<()> {
        info!(target: "macrobot::driver", %url, "DRY-RUN open_url");
        Ok(())
    }
}
