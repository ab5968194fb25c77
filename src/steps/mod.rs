/*!
Macro step model.

A run is an ordered list of [`MacroStep`]s. Steps arrive as loosely typed JSON
objects tagged by a `"type"` string; decoding turns each one into a closed sum
type up front so the interpreter never inspects raw JSON:

- integer fields accept JSON numbers or numeric strings, anything else reads as `0`
- counts are clamped to at least 1 and waits to at least 0
- unknown `type` values (and objects without one) decode to [`MacroStep::Unknown`],
  which the interpreter treats as a no-op
- key names outside the supported set decode to `None` and are skipped at playback
*/

mod decode;

use serde::{Deserialize, Deserializer};

/// Mouse button a click step uses.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum MouseButton {
    #[default]
    Left,
    Right,
}

/// Keys allowed in a `CTRL_KEY` chord.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ChordKey {
    A,
    C,
    V,
}

/// Keys (and the one compound combo) allowed in a `PRESS_KEY` step.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum NamedKey {
    Enter,
    Escape,
    /// Control+L, usually "focus the address bar".
    CtrlL,
}

/// One unit of playback.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "serde_json::Value")]
pub enum MacroStep {
    /// Move the pointer by an offset from wherever it currently is.
    MoveRelative { dx: i32, dy: i32 },

    /// Move the pointer to absolute screen coordinates.
    MoveAbsolute { x: i32, y: i32 },

    /// Press and release a button `count` times.
    Click { button: MouseButton, count: u32 },

    /// Type literal text one character at a time.
    TypeText { text: String },

    /// Pause playback.
    Wait { ms: u64 },

    /// Control + key. `None` when the requested key is not supported.
    ChordCtrl { key: Option<ChordKey> },

    /// A single named key press. `None` when the requested key is not supported.
    PressKey { key: Option<NamedKey> },

    /// Ask the OS to open a URL in its default handler.
    OpenUrl { url: String },

    /// Run `steps` `count` times.
    Repeat { count: u32, steps: Vec<MacroStep> },

    /// A step kind this version does not implement.
    Unknown { kind: Option<String> },
}

impl MacroStep {
    /// Wire name of the step, for logs.
    pub fn kind(&self) -> &str {
        match self {
            MacroStep::MoveRelative { .. } => "MOUSE_MOVE",
            MacroStep::MoveAbsolute { .. } => "MOUSE_MOVE_TO",
            MacroStep::Click { .. } => "MOUSE_CLICK",
            MacroStep::TypeText { .. } => "TYPE_TEXT",
            MacroStep::Wait { .. } => "WAIT_MS",
            MacroStep::ChordCtrl { .. } => "CTRL_KEY",
            MacroStep::PressKey { .. } => "PRESS_KEY",
            MacroStep::OpenUrl { .. } => "OPEN_URL",
            MacroStep::Repeat { .. } => "REPEAT",
            MacroStep::Unknown { kind } => kind.as_deref().unwrap_or("<untyped>"),
        }
    }
}

/// Body of a run submission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RunRequest {
    /// Steps to play back in order. Missing or `null` means an empty run.
    #[serde(default, deserialize_with = "nullable_steps")]
    pub steps: Vec<MacroStep>,
}

impl RunRequest {
    pub fn new(steps: Vec<MacroStep>) -> Self {
        Self { steps }
    }
}

fn nullable_steps<'de, D>(deserializer: D) -> Result<Vec<MacroStep>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<MacroStep>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Deepest `REPEAT` nesting in `steps`; a flat list has depth 0.
///
/// Walks with an explicit stack so arbitrarily nested input cannot exhaust
/// the call stack.
pub fn nesting_depth(steps: &[MacroStep]) -> usize {
    let mut deepest = 0;
    let mut stack: Vec<(&[MacroStep], usize)> = vec![(steps, 0)];
    while let Some((block, depth)) = stack.pop() {
        for step in block {
            if let MacroStep::Repeat { steps: body, .. } = step {
                deepest = deepest.max(depth + 1);
                stack.push((body, depth + 1));
            }
        }
    }
    deepest
}
