use anyhow::{Context, Result};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::driver::InputDriver;
use super::interpreter::StepInterpreter;
use crate::config::EngineConfig;
use crate::steps::{MacroStep, RunRequest, nesting_depth};

/// Why a submission was refused.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RunError {
    #[error("REPEAT nesting depth {depth} exceeds the limit of {limit}")]
    NestingTooDeep { depth: usize, limit: usize },

    #[error("macro worker is not running")]
    WorkerUnavailable,
}

/// Returned by [`RunController::submit`] once a run has been queued.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct RunStarted {
    pub run_id: u64,
    /// Number of top-level steps accepted.
    pub steps: usize,
}

/// Point-in-time view of the controller.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct RunStatus {
    pub running: bool,
    pub run_id: Option<u64>,
    pub steps: Option<usize>,
}

struct ActiveRun {
    id: u64,
    cancel: CancellationToken,
    steps: Arc<[MacroStep]>,
}

enum RunState {
    Idle,
    Running(ActiveRun),
}

struct RunJob {
    id: u64,
    cancel: CancellationToken,
    steps: Arc<[MacroStep]>,
}

struct Shared {
    state: Mutex<RunState>,
    last_request: Mutex<Option<Arc<[MacroStep]>>>,
    /// Next run id to hand out. Only advanced under the `state` lock.
    next_id: AtomicU64,
    /// Id of the most recent run the worker has finished with.
    finished: watch::Sender<u64>,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, RunState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return to idle unless a newer run has already taken over.
    fn finish(&self, id: u64) {
        {
            let mut state = self.state();
            if matches!(&*state, RunState::Running(run) if run.id == id) {
                *state = RunState::Idle;
            }
        }
        self.finished.send_modify(|last| *last = (*last).max(id));
    }
}

/// Owns the run lifecycle: at most one active run, supersession and stop.
///
/// Runs execute one after another on a dedicated `macro-worker` thread, so
/// two runs never drive input at the same time. `submit` and `stop` only flip
/// cancellation tokens and enqueue work; neither waits for the worker. A
/// superseded run stops at its next checkpoint (its current driver call
/// finishes first) and the new run starts right after.
pub struct RunController {
    shared: Arc<Shared>,
    jobs: mpsc::UnboundedSender<RunJob>,
    max_depth: usize,
}

impl RunController {
    /// Spawn the worker thread and return a controller bound to it.
    ///
    /// Failing to create the worker is a startup error.
    pub fn start(driver: Arc<dyn InputDriver>, engine: EngineConfig) -> Result<Self> {
        let (finished, _) = watch::channel(0);
        let shared = Arc::new(Shared {
            state: Mutex::new(RunState::Idle),
            last_request: Mutex::new(None),
            next_id: AtomicU64::new(1),
            finished,
        });
        let (jobs, rx) = mpsc::unbounded_channel();

        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("failed to build macro worker runtime")?;
        let interpreter = StepInterpreter::new(driver, engine);
        let worker_shared = shared.clone();
        std::thread::Builder::new()
            .name("macro-worker".into())
            .spawn(move || rt.block_on(worker_loop(interpreter, worker_shared, rx)))
            .context("failed to spawn macro worker thread")?;

        Ok(Self {
            shared,
            jobs,
            max_depth: engine.max_repeat_depth,
        })
    }

    /// Queue `request` as the new active run, cancelling whatever was running.
    pub fn submit(&self, request: RunRequest) -> Result<RunStarted, RunError> {
        let depth = nesting_depth(&request.steps);
        if depth > self.max_depth {
            return Err(RunError::NestingTooDeep {
                depth,
                limit: self.max_depth,
            });
        }

        let steps: Arc<[MacroStep]> = request.steps.into();
        let cancel = CancellationToken::new();

        let mut state = self.shared.state();
        if let RunState::Running(prev) = &*state {
            prev.cancel.cancel();
            info!(target: "macrobot::controller", run_id = prev.id, "Run superseded");
        }

        // Ids are handed out under the state lock so the worker sees them in order.
        let id = self.shared.next_id.fetch_add(1, Ordering::SeqCst);
        self.jobs
            .send(RunJob {
                id,
                cancel: cancel.clone(),
                steps: steps.clone(),
            })
            .map_err(|_| RunError::WorkerUnavailable)?;
        *state = RunState::Running(ActiveRun {
            id,
            cancel,
            steps: steps.clone(),
        });
        drop(state);

        *self
            .shared
            .last_request
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(steps.clone());

        info!(target: "macrobot::controller", run_id = id, steps = steps.len(), "Run submitted");
        Ok(RunStarted {
            run_id: id,
            steps: steps.len(),
        })
    }

    /// Cancel the active run, if any. Returns whether one was active.
    ///
    /// Returns immediately; the worker notices at its next checkpoint.
    pub fn stop(&self) -> bool {
        let prev = std::mem::replace(&mut *self.shared.state(), RunState::Idle);
        match prev {
            RunState::Running(run) => {
                run.cancel.cancel();
                info!(target: "macrobot::controller", run_id = run.id, "Stop requested");
                true
            }
            RunState::Idle => {
                debug!(target: "macrobot::controller", "Stop requested with no active run");
                false
            }
        }
    }

    /// Whether a run is active and not yet cancelled. Racy by nature.
    pub fn is_running(&self) -> bool {
        matches!(&*self.shared.state(), RunState::Running(run) if !run.cancel.is_cancelled())
    }

    pub fn status(&self) -> RunStatus {
        match &*self.shared.state() {
            RunState::Running(run) if !run.cancel.is_cancelled() => RunStatus {
                running: true,
                run_id: Some(run.id),
                steps: Some(run.steps.len()),
            },
            _ => RunStatus {
                running: false,
                run_id: None,
                steps: None,
            },
        }
    }

    /// Steps of the most recent submission, whether or not it is still running.
    pub fn last_request(&self) -> Option<Arc<[MacroStep]>> {
        self.shared
            .last_request
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Resolve once the worker has finished every run submitted so far.
    pub async fn idle(&self) {
        let target = self.shared.next_id.load(Ordering::SeqCst) - 1;
        let mut rx = self.shared.finished.subscribe();
        // The sender lives in `shared`, which we hold, so this only errors if it is dropped.
        let _ = rx.wait_for(|&done| done >= target).await;
    }
}

impl Drop for RunController {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn worker_loop(
    interpreter: StepInterpreter,
    shared: Arc<Shared>,
    mut jobs: mpsc::UnboundedReceiver<RunJob>,
) {
    info!(target: "macrobot::controller", "Macro worker started");
    while let Some(job) = jobs.recv().await {
        if job.cancel.is_cancelled() {
            debug!(target: "macrobot::controller", run_id = job.id, "Run cancelled before it started");
            shared.finish(job.id);
            continue;
        }
        info!(target: "macrobot::controller", run_id = job.id, steps = job.steps.len(), "Run started");
        let started = Instant::now();
        let outcome = interpreter.execute(&job.steps, &job.cancel).await;
        shared.finish(job.id);
        info!(
            target: "macrobot::controller",
            run_id = job.id, ?outcome, elapsed_ms = started.elapsed().as_millis() as u64,
            "Run finished"
        );
    }
    info!(target: "macrobot::controller", "Job channel closed; macro worker exiting");
}
