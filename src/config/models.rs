use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for Macrobot.
///
/// Deserialized from an optional JSON file; every field has a default so an
/// empty object (or no file at all) yields a working local setup.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind the HTTP listener on.
    pub host: String,

    /// TCP port for the HTTP listener.
    pub port: u16,

    /// Directory served for any path not handled by the macro routes.
    pub ui_root: String,

    /// Log driver calls instead of simulating real input.
    pub dry_run: bool,

    /// Playback timing and limits.
    pub engine: EngineConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8080,
            ui_root: "backend".into(),
            dry_run: false,
            engine: EngineConfig::default(),
        }
    }
}

impl ServerConfig {
    /// `host:port` string suitable for binding.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Timing and safety limits used by the step interpreter.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    /// Settle delay after every dispatched step (default: 20).
    pub step_delay_ms: u64,

    /// Pause after each press/release pair of a click (default: 60).
    pub click_delay_ms: u64,

    /// Pause after each typed character (default: 20).
    pub char_delay_ms: u64,

    /// Deepest allowed nesting of `REPEAT` steps (default: 64).
    pub max_repeat_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            step_delay_ms: 20,
            click_delay_ms: 60,
            char_delay_ms: 20,
            max_repeat_depth: 64,
        }
    }
}

impl EngineConfig {
    pub fn step_delay(&self) -> Duration {
        Duration::from_millis(self.step_delay_ms)
    }

    pub fn click_delay(&self) -> Duration {
        Duration::from_millis(self.click_delay_ms)
    }

    pub fn char_delay(&self) -> Duration {
        Duration::from_millis(self.char_delay_ms)
    }

    /// Zero delays, for driving the interpreter in tests.
    pub fn instant() -> Self {
        Self {
            step_delay_ms: 0,
            click_delay_ms: 0,
            char_delay_ms: 0,
            ..Self::default()
        }
    }
}
