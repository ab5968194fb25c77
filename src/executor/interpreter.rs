use anyhow::Result;
use std::future::Future;
use std::ops::ControlFlow;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::driver::{InputDriver, Key};
use super::keymap;
use crate::config::EngineConfig;
use crate::steps::{MacroStep, MouseButton};

type Flow = ControlFlow<()>;
type BlockFuture<'a> = Pin<Box<dyn Future<Output = Flow> + Send + 'a>>;

/// How a call to [`StepInterpreter::execute`] ended.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every step ran.
    Completed,
    /// The cancellation token fired and the remaining steps were skipped.
    Cancelled,
}

/// Walks a step list and turns it into Input Driver calls.
///
/// The interpreter keeps no state between runs. The only thing that stops a
/// run early is `cancel`, checked before every step, every `REPEAT`
/// iteration, every click and every typed character. Sleeps wake as soon as
/// the token fires. Driver failures are logged and the run carries on.
pub struct StepInterpreter {
    driver: Arc<dyn InputDriver>,
    engine: EngineConfig,
}

impl StepInterpreter {
    pub fn new(driver: Arc<dyn InputDriver>, engine: EngineConfig) -> Self {
        Self { driver, engine }
    }

    /// Play `steps` in order until they run out or `cancel` fires.
    pub async fn execute(&self, steps: &[MacroStep], cancel: &CancellationToken) -> RunOutcome {
        match self.run_block(steps, cancel, 0).await {
            ControlFlow::Continue(()) => RunOutcome::Completed,
            ControlFlow::Break(()) => RunOutcome::Cancelled,
        }
    }

    fn run_block<'a>(
        &'a self,
        steps: &'a [MacroStep],
        cancel: &'a CancellationToken,
        depth: usize,
    ) -> BlockFuture<'a> {
        Box::pin(async move {
            for (idx, step) in steps.iter().enumerate() {
                if cancel.is_cancelled() {
                    debug!(target: "macrobot::interpreter", depth, step_index = idx, "Cancellation observed");
                    return ControlFlow::Break(());
                }
                trace!(
                    target: "macrobot::interpreter",
                    depth, step_index = idx, kind = step.kind(),
                    "Executing step"
                );
                if self.dispatch(step, cancel, depth).await.is_break() {
                    return ControlFlow::Break(());
                }
                pause(cancel, self.engine.step_delay()).await;
            }
            ControlFlow::Continue(())
        })
    }

    async fn dispatch(&self, step: &MacroStep, cancel: &CancellationToken, depth: usize) -> Flow {
        match step {
            MacroStep::MoveRelative { dx, dy } => {
                // Read-then-write: pointer motion between the two calls is not corrected.
                match self.driver.location() {
                    Ok(at) => {
                        let to = at.offset(*dx, *dy);
                        self.call("move_to", self.driver.move_to(to.x, to.y));
                    }
                    Err(err) => {
                        warn!(target: "macrobot::interpreter", error = %err, "Pointer location unavailable; skipping relative move");
                    }
                }
                ControlFlow::Continue(())
            }

            MacroStep::MoveAbsolute { x, y } => {
                self.call("move_to", self.driver.move_to(*x, *y));
                ControlFlow::Continue(())
            }

            MacroStep::Click { button, count } => self.click(*button, *count, cancel).await,

            MacroStep::TypeText { text } => self.type_text(text, cancel).await,

            MacroStep::Wait { ms } => {
                pause(cancel, Duration::from_millis(*ms)).await;
                ControlFlow::Continue(())
            }

            MacroStep::ChordCtrl { key } => {
                if let Some(key) = key {
                    self.chord(&[Key::Control, key.key()]);
                }
                ControlFlow::Continue(())
            }

            MacroStep::PressKey { key } => {
                if let Some(key) = key {
                    self.chord(key.keys());
                }
                ControlFlow::Continue(())
            }

            MacroStep::OpenUrl { url } => {
                if !url.trim().is_empty() {
                    if let Err(err) = self.driver.open_url(url) {
                        debug!(target: "macrobot::interpreter", %url, error = %err, "open_url failed; ignoring");
                    }
                }
                ControlFlow::Continue(())
            }

            MacroStep::Repeat { count, steps } => {
                if depth + 1 > self.engine.max_repeat_depth {
                    warn!(
                        target: "macrobot::interpreter",
                        depth, limit = self.engine.max_repeat_depth,
                        "REPEAT nested too deeply; skipping"
                    );
                    return ControlFlow::Continue(());
                }
                for iteration in 0..*count {
                    if cancel.is_cancelled() {
                        debug!(target: "macrobot::interpreter", depth, iteration, "REPEAT interrupted");
                        return ControlFlow::Break(());
                    }
                    if self.run_block(steps, cancel, depth + 1).await.is_break() {
                        return ControlFlow::Break(());
                    }
                }
                ControlFlow::Continue(())
            }

            MacroStep::Unknown { kind } => {
                trace!(target: "macrobot::interpreter", ?kind, "Unrecognized step; ignoring");
                ControlFlow::Continue(())
            }
        }
    }

    async fn click(&self, button: MouseButton, count: u32, cancel: &CancellationToken) -> Flow {
        for _ in 0..count {
            if cancel.is_cancelled() {
                return ControlFlow::Break(());
            }
            self.call("button_press", self.driver.button_press(button));
            self.call("button_release", self.driver.button_release(button));
            pause(cancel, self.engine.click_delay()).await;
        }
        ControlFlow::Continue(())
    }

    async fn type_text(&self, text: &str, cancel: &CancellationToken) -> Flow {
        for ch in text.chars() {
            if cancel.is_cancelled() {
                return ControlFlow::Break(());
            }
            let Some(stroke) = keymap::stroke_for_char(ch) else {
                trace!(target: "macrobot::interpreter", ?ch, "No key for character; skipping");
                continue;
            };
            if stroke.shift {
                self.call("key_press", self.driver.key_press(Key::Shift));
            }
            self.call("key_press", self.driver.key_press(stroke.key));
            self.call("key_release", self.driver.key_release(stroke.key));
            if stroke.shift {
                self.call("key_release", self.driver.key_release(Key::Shift));
            }
            pause(cancel, self.engine.char_delay()).await;
        }
        ControlFlow::Continue(())
    }

    /// Press `keys` in order, then release them in reverse.
    fn chord(&self, keys: &[Key]) {
        for key in keys {
            self.call("key_press", self.driver.key_press(*key));
        }
        for key in keys.iter().rev() {
            self.call("key_release", self.driver.key_release(*key));
        }
    }

    fn call(&self, op: &'static str, result: Result<()>) {
        if let Err(err) = result {
            warn!(
                target: "macrobot::interpreter",
                driver = self.driver.name(), op, error = %err,
                "Driver call failed; continuing"
            );
        }
    }
}

/// Sleep for `duration`, returning early if `cancel` fires.
async fn pause(cancel: &CancellationToken, duration: Duration) {
    if duration.is_zero() {
        return;
    }
    tokio::select! {
        _ = tokio::time::sleep(duration) => {}
        _ = cancel.cancelled() => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::testing::{Call, RecordingDriver};
    use crate::steps::{ChordKey, NamedKey};
    use std::time::Instant;

    fn interpreter(driver: &Arc<RecordingDriver>, engine: EngineConfig) -> StepInterpreter {
        StepInterpreter::new(driver.clone(), engine)
    }

    #[tokio::test]
    async fn empty_run_touches_nothing() {
        let driver = Arc::new(RecordingDriver::new());
        let outcome = interpreter(&driver, EngineConfig::instant())
            .execute(&[], &CancellationToken::new())
            .await;
        assert_eq!(outcome, RunOutcome::Completed);
        assert!(driver.calls().is_empty());
    }

    #[tokio::test]
    async fn repeat_runs_body_count_times() {
        let driver = Arc::new(RecordingDriver::new());
        let steps = vec![MacroStep::Repeat {
            count: 3,
            steps: vec![MacroStep::MoveAbsolute { x: 10, y: 20 }],
        }];
        interpreter(&driver, EngineConfig::instant())
            .execute(&steps, &CancellationToken::new())
            .await;
        assert_eq!(driver.calls(), vec![Call::MoveTo(10, 20); 3]);
    }

    #[tokio::test]
    async fn cancelling_mid_repeat_skips_remaining_iterations() {
        let driver = Arc::new(RecordingDriver::new());
        let steps = vec![
            MacroStep::Repeat {
                count: 5,
                steps: vec![
                    MacroStep::MoveAbsolute { x: 1, y: 1 },
                    MacroStep::Wait { ms: 50 },
                ],
            },
            MacroStep::MoveAbsolute { x: 99, y: 99 },
        ];
        let cancel = CancellationToken::new();
        let stopper = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(120)).await;
            stopper.cancel();
        });

        let started = Instant::now();
        let outcome = interpreter(&driver, EngineConfig::default())
            .execute(&steps, &cancel)
            .await;

        assert_eq!(outcome, RunOutcome::Cancelled);
        let moves = driver.calls();
        assert!(!moves.is_empty());
        assert!(moves.len() < 5, "completed {} iterations", moves.len());
        assert!(!moves.contains(&Call::MoveTo(99, 99)));
        assert!(started.elapsed() < Duration::from_millis(400));
    }

    #[tokio::test]
    async fn cancellation_wakes_a_long_wait() {
        let driver = Arc::new(RecordingDriver::new());
        let steps = vec![
            MacroStep::Wait { ms: 10_000 },
            MacroStep::MoveAbsolute { x: 1, y: 1 },
        ];
        let cancel = CancellationToken::new();
        let stopper = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            stopper.cancel();
        });

        let started = Instant::now();
        let outcome = interpreter(&driver, EngineConfig::default())
            .execute(&steps, &cancel)
            .await;
        assert_eq!(outcome, RunOutcome::Cancelled);
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(driver.calls().is_empty());
    }

    #[tokio::test]
    async fn typed_text_wraps_shift_only_where_needed() {
        let driver = Arc::new(RecordingDriver::new());
        let steps = vec![MacroStep::TypeText { text: "Ab1".into() }];
        interpreter(&driver, EngineConfig::instant())
            .execute(&steps, &CancellationToken::new())
            .await;
        assert_eq!(
            driver.calls(),
            vec![
                Call::KeyDown(Key::Shift),
                Call::KeyDown(Key::Char('a')),
                Call::KeyUp(Key::Char('a')),
                Call::KeyUp(Key::Shift),
                Call::KeyDown(Key::Char('b')),
                Call::KeyUp(Key::Char('b')),
                Call::KeyDown(Key::Char('1')),
                Call::KeyUp(Key::Char('1')),
            ]
        );
    }

    #[tokio::test]
    async fn unmappable_characters_are_skipped() {
        let driver = Arc::new(RecordingDriver::new());
        let steps = vec![MacroStep::TypeText { text: "é!".into() }];
        interpreter(&driver, EngineConfig::instant())
            .execute(&steps, &CancellationToken::new())
            .await;
        assert_eq!(
            driver.calls(),
            vec![
                Call::KeyDown(Key::Shift),
                Call::KeyDown(Key::Char('1')),
                Call::KeyUp(Key::Char('1')),
                Call::KeyUp(Key::Shift),
            ]
        );
    }

    #[tokio::test]
    async fn clicks_are_spaced_by_the_click_delay() {
        let driver = Arc::new(RecordingDriver::new());
        let steps = vec![MacroStep::Click {
            button: MouseButton::Left,
            count: 2,
        }];
        interpreter(&driver, EngineConfig::default())
            .execute(&steps, &CancellationToken::new())
            .await;

        let calls = driver.timed_calls();
        let kinds: Vec<Call> = calls.iter().map(|(_, c)| c.clone()).collect();
        assert_eq!(
            kinds,
            vec![
                Call::Press(MouseButton::Left),
                Call::Release(MouseButton::Left),
                Call::Press(MouseButton::Left),
                Call::Release(MouseButton::Left),
            ]
        );
        let gap = calls[2].0.duration_since(calls[1].0);
        assert!(gap >= Duration::from_millis(60), "gap was {gap:?}");
    }

    #[tokio::test]
    async fn long_click_sequence_stops_mid_way() {
        let driver = Arc::new(RecordingDriver::new());
        let steps = vec![
            MacroStep::Click {
                button: MouseButton::Left,
                count: 100,
            },
            MacroStep::MoveAbsolute { x: 9, y: 9 },
        ];
        let cancel = CancellationToken::new();
        let stopper = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(150)).await;
            stopper.cancel();
        });

        let outcome = interpreter(&driver, EngineConfig::default())
            .execute(&steps, &cancel)
            .await;

        assert_eq!(outcome, RunOutcome::Cancelled);
        let calls = driver.calls();
        assert!(!calls.is_empty());
        assert!(calls.len() < 40, "made {} calls", calls.len());
        assert_eq!(calls.len() % 2, 0, "press without release: {calls:?}");
        assert!(!calls.contains(&Call::MoveTo(9, 9)));
    }

    #[tokio::test]
    async fn cancelled_typing_leaves_the_tail_untyped() {
        let driver = Arc::new(RecordingDriver::new());
        let steps = vec![MacroStep::TypeText {
            text: format!("{}z", "a".repeat(200)),
        }];
        let cancel = CancellationToken::new();
        let stopper = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            stopper.cancel();
        });

        let outcome = interpreter(&driver, EngineConfig::default())
            .execute(&steps, &cancel)
            .await;

        assert_eq!(outcome, RunOutcome::Cancelled);
        let calls = driver.calls();
        assert!(calls.contains(&Call::KeyDown(Key::Char('a'))));
        assert!(calls.len() < 100, "typed {} keys", calls.len() / 2);
        assert!(!calls.contains(&Call::KeyDown(Key::Char('z'))));
    }

    #[tokio::test]
    async fn unknown_step_does_not_abort_the_run() {
        let driver = Arc::new(RecordingDriver::new());
        let steps = vec![
            MacroStep::MoveAbsolute { x: 1, y: 2 },
            MacroStep::Unknown {
                kind: Some("SET_MODE".into()),
            },
            MacroStep::MoveAbsolute { x: 3, y: 4 },
        ];
        let outcome = interpreter(&driver, EngineConfig::instant())
            .execute(&steps, &CancellationToken::new())
            .await;
        assert_eq!(outcome, RunOutcome::Completed);
        assert_eq!(driver.calls(), vec![Call::MoveTo(1, 2), Call::MoveTo(3, 4)]);
    }

    #[tokio::test]
    async fn relative_move_reads_then_moves() {
        let driver = Arc::new(RecordingDriver::at(100, 100));
        let steps = vec![MacroStep::MoveRelative { dx: 15, dy: -20 }];
        interpreter(&driver, EngineConfig::instant())
            .execute(&steps, &CancellationToken::new())
            .await;
        assert_eq!(driver.calls(), vec![Call::Location, Call::MoveTo(115, 80)]);
    }

    #[tokio::test]
    async fn chords_and_named_keys() {
        let driver = Arc::new(RecordingDriver::new());
        let steps = vec![
            MacroStep::ChordCtrl {
                key: Some(ChordKey::C),
            },
            MacroStep::ChordCtrl { key: None },
            MacroStep::PressKey {
                key: Some(NamedKey::Enter),
            },
            MacroStep::PressKey {
                key: Some(NamedKey::CtrlL),
            },
            MacroStep::PressKey { key: None },
        ];
        interpreter(&driver, EngineConfig::instant())
            .execute(&steps, &CancellationToken::new())
            .await;
        assert_eq!(
            driver.calls(),
            vec![
                Call::KeyDown(Key::Control),
                Call::KeyDown(Key::Char('c')),
                Call::KeyUp(Key::Char('c')),
                Call::KeyUp(Key::Control),
                Call::KeyDown(Key::Enter),
                Call::KeyUp(Key::Enter),
                Call::KeyDown(Key::Control),
                Call::KeyDown(Key::Char('l')),
                Call::KeyUp(Key::Char('l')),
                Call::KeyUp(Key::Control),
            ]
        );
    }

    #[tokio::test]
    async fn open_url_failure_is_swallowed() {
        let driver = Arc::new(RecordingDriver::failing_open_url());
        let steps = vec![
            MacroStep::OpenUrl {
                url: "https://example.com".into(),
            },
            MacroStep::OpenUrl { url: "  ".into() },
            MacroStep::MoveAbsolute { x: 5, y: 5 },
        ];
        let outcome = interpreter(&driver, EngineConfig::instant())
            .execute(&steps, &CancellationToken::new())
            .await;
        assert_eq!(outcome, RunOutcome::Completed);
        assert_eq!(
            driver.calls(),
            vec![
                Call::OpenUrl("https://example.com".into()),
                Call::MoveTo(5, 5)
            ]
        );
    }

    #[tokio::test]
    async fn repeat_beyond_depth_limit_is_skipped() {
        let driver = Arc::new(RecordingDriver::new());
        let engine = EngineConfig {
            max_repeat_depth: 1,
            ..EngineConfig::instant()
        };
        let steps = vec![MacroStep::Repeat {
            count: 2,
            steps: vec![
                MacroStep::MoveAbsolute { x: 1, y: 1 },
                MacroStep::Repeat {
                    count: 2,
                    steps: vec![MacroStep::MoveAbsolute { x: 2, y: 2 }],
                },
            ],
        }];
        interpreter(&driver, engine)
            .execute(&steps, &CancellationToken::new())
            .await;
        assert_eq!(driver.calls(), vec![Call::MoveTo(1, 1); 2]);
    }

    #[tokio::test]
    async fn already_cancelled_token_runs_nothing() {
        let driver = Arc::new(RecordingDriver::new());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcome = interpreter(&driver, EngineConfig::instant())
            .execute(&[MacroStep::MoveAbsolute { x: 1, y: 1 }], &cancel)
            .await;
        assert_eq!(outcome, RunOutcome::Cancelled);
        assert!(driver.calls().is_empty());
    }
}
