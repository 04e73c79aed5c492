//! Quiescence-window debouncing of a changing value.
//!
//! Every `push` cancels the pending propagation and schedules a new one, so
//! only the last value of a burst reaches subscribers, no earlier than the
//! window after the burst ended.

use std::time::Duration;

use tokio::{sync::watch, task::JoinHandle};
use tracing::debug;

pub const DEFAULT_QUIESCENCE_WINDOW: Duration = Duration::from_millis(500);

/// Window for a raw millisecond setting; missing or non-positive values use the default.
pub fn quiescence_window(raw_millis: Option<i64>) -> Duration {
    match raw_millis {
        Some(millis) if millis > 0 => Duration::from_millis(millis as u64),
        _ => DEFAULT_QUIESCENCE_WINDOW,
    }
}

/// Like [`quiescence_window`] but for untrusted text such as env vars.
pub fn parse_quiescence_window(raw: &str) -> Duration {
    quiescence_window(raw.trim().parse::<i64>().ok())
}

pub struct Debouncer<T> {
    input: watch::Sender<T>,
    output: watch::Receiver<T>,
    window: Duration,
    task: JoinHandle<()>,
}

impl<T> Debouncer<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Must be called inside a tokio runtime.
    pub fn new(initial: T, window: Duration) -> Self {
        let window = if window.is_zero() {
            DEFAULT_QUIESCENCE_WINDOW
        } else {
            window
        };
        let (input, input_rx) = watch::channel(initial.clone());
        let (output_tx, output) = watch::channel(initial);
        let task = tokio::spawn(run_debounce(input_rx, output_tx, window));
        Self {
            input,
            output,
            window,
            task,
        }
    }

    pub fn push(&self, value: T) {
        self.input.send_replace(value);
    }

    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.output.clone()
    }

    /// Last propagated value.
    pub fn current(&self) -> T {
        self.output.borrow().clone()
    }

    /// Most recent input, propagated or not.
    pub fn pending(&self) -> T {
        self.input.borrow().clone()
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}

impl<T> Drop for Debouncer<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run_debounce<T>(
    mut input: watch::Receiver<T>,
    output: watch::Sender<T>,
    window: Duration,
) where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    while input.changed().await.is_ok() {
        loop {
            tokio::select! {
                changed = input.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
                _ = tokio::time::sleep(window) => {
                    let value = input.borrow_and_update().clone();
                    let propagated = output.send_if_modified(|current| {
                        if *current == value {
                            false
                        } else {
                            *current = value;
                            true
                        }
                    });
                    if !propagated {
                        debug!("debounce: settled value unchanged, nothing propagated");
                    }
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/debounce_tests.rs"]
mod tests;
