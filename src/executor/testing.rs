//! Instrumented driver shared by the unit tests.

use anyhow::{Result, bail};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use super::driver::{InputDriver, Key, Point};
use crate::steps::MouseButton;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    MoveTo(i32, i32),
    Location,
    Press(MouseButton),
    Release(MouseButton),
    KeyDown(Key),
    KeyUp(Key),
    OpenUrl(String),
}

/// Records every call with a timestamp and tracks how many calls overlap.
#[derive(Debug, Default)]
pub struct RecordingDriver {
    calls: Mutex<Vec<(Instant, Call)>>,
    pointer: Mutex<Point>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    latency: Duration,
    fail_open_url: bool,
}

impl RecordingDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call blocks for `latency`, widening the window for overlap.
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    pub fn failing_open_url() -> Self {
        Self {
            fail_open_url: true,
            ..Self::default()
        }
    }

    pub fn at(x: i32, y: i32) -> Self {
        let d = Self::default();
        *d.pointer.lock().unwrap() = Point::new(x, y);
        d
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().iter().map(|(_, c)| c.clone()).collect()
    }

    pub fn timed_calls(&self) -> Vec<(Instant, Call)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn record(&self, call: Call) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.latency.is_zero() {
            std::thread::sleep(self.latency);
        }
        self.calls.lock().unwrap().push((Instant::now(), call));
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl InputDriver for RecordingDriver {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn move_to(&self, x: i32, y: i32) -> Result<()> {
        self.record(Call::MoveTo(x, y));
        *self.pointer.lock().unwrap() = Point::new(x, y);
        Ok(())
    }

    fn location(&self) -> Result<Point> {
        self.record(Call::Location);
        Ok(*self.pointer.lock().unwrap())
    }

    fn button_press(&self, button: MouseButton) -> Result<()> {
        self.record(Call::Press(button));
        Ok(())
    }

    fn button_release(&self, button: MouseButton) -> Result<()> {
        self.record(Call::Release(button));
        Ok(())
    }

    fn key_press(&self, key: Key) -> Result<()> {
        self.record(Call::KeyDown(key));
        Ok(())
    }

    fn key_release(&self, key: Key) -> Result<()> {
        self.record(Call::KeyUp(key));
        Ok(())
    }

    fn open_url(&self, url: &str) -> Result<()> {
        self.record(Call::OpenUrl(url.to_string()));
        if self.fail_open_url {
            bail!("no browser available");
        }
        Ok(())
    }
}

/// Poll `cond` until it holds or `timeout` elapses.
pub async fn wait_until(timeout: Duration, cond: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    cond()
}
