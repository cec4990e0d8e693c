// Live elapsed-time status line shown while a completion call is in flight
//
// One ticking task per in-flight call. `stop` is synchronous with respect to
// the caller: it returns only after the task has exited and the line has been
// cleared, so nothing printed afterwards can land on top of the status line.

use crossterm::{
    cursor::MoveToColumn,
    execute,
    style::{Print, Stylize},
    terminal::{Clear, ClearType},
};
use std::future::Future;
use std::io::{self, IsTerminal, Write};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

const SPINNER_FRAMES: [char; 10] = ['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];

/// Where progress output goes
pub trait ProgressSink: Send + Sync {
    /// Overwrite the status line in place
    fn update(&self, line: &str);

    /// Remove the status line
    fn clear(&self);

    /// Print a short one-off message (e.g. a transient failure)
    fn notice(&self, message: &str);
}

/// Draws the status line on stderr.
///
/// When stderr is not a terminal the status line is suppressed entirely;
/// notices are still printed.
pub struct TerminalSink {
    interactive: bool,
}

impl TerminalSink {
    pub fn new() -> Self {
        Self {
            interactive: io::stderr().is_terminal(),
        }
    }
}

impl Default for TerminalSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for TerminalSink {
    fn update(&self, line: &str) {
        if !self.interactive {
            return;
        }
        let mut stderr = io::stderr();
        let _ = execute!(
            stderr,
            MoveToColumn(0),
            Clear(ClearType::CurrentLine),
            Print(line.dark_grey())
        );
        let _ = stderr.flush();
    }

    fn clear(&self) {
        if !self.interactive {
            return;
        }
        let mut stderr = io::stderr();
        let _ = execute!(stderr, MoveToColumn(0), Clear(ClearType::CurrentLine));
        let _ = stderr.flush();
    }

    fn notice(&self, message: &str) {
        eprintln!("{} {}", "⚠".yellow(), message.yellow());
    }
}

/// Format one status line: spinner, label, elapsed seconds with one decimal
pub fn render_status(label: &str, elapsed: Duration, frame: usize) -> String {
    format!(
        "{} {} {:.1}s",
        SPINNER_FRAMES[frame % SPINNER_FRAMES.len()],
        label,
        elapsed.as_secs_f64()
    )
}

/// Spawns status-line tasks against a sink at a fixed redraw interval
#[derive(Clone)]
pub struct ProgressReporter {
    sink: Arc<dyn ProgressSink>,
    tick: Duration,
}

impl ProgressReporter {
    pub fn new(sink: Arc<dyn ProgressSink>, tick: Duration) -> Self {
        Self { sink, tick }
    }

    pub fn sink(&self) -> &Arc<dyn ProgressSink> {
        &self.sink
    }

    /// Start redrawing `label` with time elapsed since `clock_start`.
    ///
    /// Must be paired with exactly one [`ProgressHandle::stop`].
    pub fn start(&self, label: impl Into<String>, clock_start: Instant) -> ProgressHandle {
        let label = label.into();
        let sink = Arc::clone(&self.sink);
        let tick = self.tick;
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut frame = 0usize;

            loop {
                tokio::select! {
                    biased;
                    _ = &mut stop_rx => break,
                    _ = interval.tick() => {
                        sink.update(&render_status(&label, clock_start.elapsed(), frame));
                        frame = frame.wrapping_add(1);
                    }
                }
            }
        });

        ProgressHandle {
            stop_tx: Some(stop_tx),
            task: Some(task),
            sink: Arc::clone(&self.sink),
        }
    }

    /// Run `future` with a status line shown for its whole duration
    pub async fn track<F, T>(&self, label: impl Into<String>, clock_start: Instant, future: F) -> T
    where
        F: Future<Output = T>,
    {
        let handle = self.start(label, clock_start);
        let output = future.await;
        handle.stop().await;
        output
    }
}

/// Running status-line task
pub struct ProgressHandle {
    stop_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
    sink: Arc<dyn ProgressSink>,
}

impl ProgressHandle {
    /// Signal the task, wait for it to exit, then clear the line
    pub async fn stop(mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!("Progress task ended abnormally: {}", e);
            }
        }
        self.sink.clear();
    }
}

impl Drop for ProgressHandle {
    fn drop(&mut self) {
        // Only reached without `stop` when the owning future was cancelled
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    pub(crate) enum SinkEvent {
        Update(String),
        Clear,
        Notice(String),
    }

    /// Sink that records everything for assertions
    #[derive(Default)]
    pub(crate) struct RecordingSink {
        events: Mutex<Vec<SinkEvent>>,
    }

    impl RecordingSink {
        pub(crate) fn events(&self) -> Vec<SinkEvent> {
            self.events.lock().unwrap().clone()
        }

        pub(crate) fn notices(&self) -> Vec<String> {
            self.events()
                .into_iter()
                .filter_map(|e| match e {
                    SinkEvent::Notice(msg) => Some(msg),
                    _ => None,
                })
                .collect()
        }

        pub(crate) fn updates(&self) -> Vec<String> {
            self.events()
                .into_iter()
                .filter_map(|e| match e {
                    SinkEvent::Update(line) => Some(line),
                    _ => None,
                })
                .collect()
        }
    }

    impl ProgressSink for RecordingSink {
        fn update(&self, line: &str) {
            self.events
                .lock()
                .unwrap()
                .push(SinkEvent::Update(line.to_string()));
        }

        fn clear(&self) {
            self.events.lock().unwrap().push(SinkEvent::Clear);
        }

        fn notice(&self, message: &str) {
            self.events
                .lock()
                .unwrap()
                .push(SinkEvent::Notice(message.to_string()));
        }
    }

    #[test]
    fn test_render_status_one_decimal() {
        let line = render_status("Thinking (Iter 2)", Duration::from_millis(12_345), 0);
        assert_eq!(line, "⠋ Thinking (Iter 2) 12.3s");
    }

    #[test]
    fn test_render_status_spinner_wraps() {
        let line = render_status("x", Duration::ZERO, SPINNER_FRAMES.len() + 1);
        assert!(line.starts_with('⠙'));
    }

    #[tokio::test(start_paused = true)]
    async fn test_track_redraws_until_future_completes() {
        let sink = Arc::new(RecordingSink::default());
        let reporter = ProgressReporter::new(sink.clone(), Duration::from_millis(100));

        let value = reporter
            .track("Thinking (Initial)", Instant::now(), async {
                tokio::time::sleep(Duration::from_millis(350)).await;
                7
            })
            .await;

        assert_eq!(value, 7);
        let updates = sink.updates();
        assert!(updates.len() >= 3, "expected several redraws, got {updates:?}");
        assert!(updates.iter().all(|u| u.contains("Thinking (Initial)")));
        assert!(updates.iter().any(|u| u.ends_with("0.3s")));
        assert_eq!(sink.events().last(), Some(&SinkEvent::Clear));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_redraws_after_stop() {
        let sink = Arc::new(RecordingSink::default());
        let reporter = ProgressReporter::new(sink.clone(), Duration::from_millis(100));

        let handle = reporter.start("Validation (Iter 1)", Instant::now());
        tokio::time::sleep(Duration::from_millis(250)).await;
        handle.stop().await;
        let after_stop = sink.events().len();

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(sink.events().len(), after_stop);
        assert_eq!(sink.events().last(), Some(&SinkEvent::Clear));
    }

    #[tokio::test(start_paused = true)]
    async fn test_elapsed_measured_from_given_clock() {
        let sink = Arc::new(RecordingSink::default());
        let reporter = ProgressReporter::new(sink.clone(), Duration::from_millis(100));

        let phase_start = Instant::now();
        tokio::time::sleep(Duration::from_secs(5)).await;
        reporter
            .track("Thinking (Iter 3)", phase_start, async {
                tokio::time::sleep(Duration::from_millis(50)).await;
            })
            .await;

        let first = sink.updates().into_iter().next().unwrap();
        assert!(first.ends_with("5.0s"), "got {first}");
    }
}
