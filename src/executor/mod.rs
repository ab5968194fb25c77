#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

/*!
Executor module for Macrobot.

This module wires together:
- `driver`: the `InputDriver` capability surface plus a logging dry-run driver
- `desktop`: the Enigo-backed driver that simulates real input
- `keymap`: character and named-key translation for keyboard steps
- `interpreter`: walks a step list and dispatches driver calls with cancellation checkpoints
- `controller`: run lifecycle (submit, supersede, stop) on a dedicated worker thread

Typical usage:
- Build a driver (`DesktopDriver::new()?` or `DryRunDriver::new()`).
- Start a `RunController` with it once at startup and share it with the HTTP layer.

Example:
```no_run
use std::sync::Arc;
use macrobot::config::EngineConfig;
use macrobot::executor::{DryRunDriver, RunController};
use macrobot::steps::{MacroStep, RunRequest};

let controller = RunController::start(Arc::new(DryRunDriver::new()), EngineConfig::default())?;
let started = controller.submit(RunRequest::new(vec![MacroStep::MoveAbsolute { x: 10, y: 20 }]))?;
assert_eq!(started.steps, 1);
controller.stop();
# Ok::<(), anyhow::Error>(())
```
*/

pub mod controller;
pub mod desktop;
pub mod driver;
pub mod interpreter;
pub mod keymap;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports for convenient access from `macrobot::executor::*`
pub use controller::{RunController, RunError, RunStarted, RunStatus};
pub use desktop::DesktopDriver;
pub use driver::{DryRunDriver, InputDriver, Key, Point};
pub use interpreter::{RunOutcome, StepInterpreter};
