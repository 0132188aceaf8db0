//! Nested step-stack progress tracer.
//!
//! Indexing code reports progress through the small [`Tracer`] API: open a
//! step, log lines, close the step. [`IndexTracer`] turns that stream into
//! the three views a UI needs without the caller computing any of them:
//!
//! - **title**: breadcrumb of the open steps, `topic [completed/total]`;
//! - **message**: the most recent log line;
//! - **percentage**: weighted completion of the whole stack.
//!
//! Closing a step advances its parent by exactly one unit, whatever the
//! child's own size. The percentage folds over the steps that have a total,
//! outermost first: the outer step spans 0–100 and each inner level
//! subdivides one unit of its parent. Being on sub-step 3 of 10 inside step
//! 2 of 5 gives `1/5 * 100 + 2/10 * 20 = 24`.
//!
//! Steps must stay balanced on every exit path. [`TracerExt::step`] returns
//! a guard that closes its step on drop, so `?` cannot leak an open step.
//!
//! ```rust
//! use docsync_core::tracer::{IndexTracer, Tracer, TracerExt};
//!
//! let mut tracer = IndexTracer::new();
//! {
//!     let mut outer = tracer.step("Indexing", "2 documents", Some(2));
//!     {
//!         let mut doc = outer.step("a.txt", "", None);
//!         doc.log("embedding 3 chunks");
//!     }
//!     assert_eq!(outer.depth(), 1);
//! }
//! assert_eq!(tracer.percentage(), 0.0);
//! assert_eq!(tracer.message(), "embedding 3 chunks");
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Severity of a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// One open step of the stack.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Step {
    pub topic: String,
    pub message: String,
    pub completed: usize,
    /// `None` (or zero) marks work that cannot report progress.
    pub total: Option<usize>,
}

impl Step {
    fn progress_total(&self) -> Option<usize> {
        self.total.filter(|&t| t > 0)
    }
}

/// The progress-reporting surface used by indexing code.
pub trait Tracer: Send {
    /// Append an info-level log line.
    fn log(&mut self, message: &str);

    /// Append a warning-level log line.
    fn warn(&mut self, message: &str);

    /// Push a step. `total` is the number of sub-steps, `None` if unknown.
    fn on_step_start(&mut self, topic: &str, message: &str, total: Option<usize>);

    /// Pop the current step and advance its parent by one.
    fn on_step_end(&mut self);
}

/// Scoped steps for any [`Tracer`].
pub trait TracerExt: Tracer {
    /// Open a step that is closed when the returned guard drops.
    fn step(&mut self, topic: &str, message: &str, total: Option<usize>) -> StepGuard<'_, Self> {
        self.on_step_start(topic, message, total);
        StepGuard { tracer: self }
    }
}

impl<T: Tracer + ?Sized> TracerExt for T {}

/// An open step. Itself a [`Tracer`], so nested steps are opened on it.
pub struct StepGuard<'a, T: Tracer + ?Sized> {
    tracer: &'a mut T,
}

impl<T: Tracer + ?Sized> Tracer for StepGuard<'_, T> {
    fn log(&mut self, message: &str) {
        self.tracer.log(message);
    }

    fn warn(&mut self, message: &str) {
        self.tracer.warn(message);
    }

    fn on_step_start(&mut self, topic: &str, message: &str, total: Option<usize>) {
        self.tracer.on_step_start(topic, message, total);
    }

    fn on_step_end(&mut self) {
        self.tracer.on_step_end();
    }
}

impl<T: Tracer + ?Sized> std::ops::Deref for StepGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.tracer
    }
}

impl<T: Tracer + ?Sized> Drop for StepGuard<'_, T> {
    fn drop(&mut self) {
        self.tracer.on_step_end();
    }
}

/// What changed in an [`IndexTracer`].
#[derive(Debug, Clone, Copy)]
pub enum TracerEvent<'a> {
    StepStarted,
    StepEnded,
    Logged(&'a LogEntry),
    Reset,
}

/// Read-only view of a tracer, handed to observers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TracerSnapshot {
    pub title: String,
    pub message: String,
    pub percentage: f64,
    /// Bumped on every mutation.
    pub updated: u64,
}

/// Observer notified after every tracer mutation.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: TracerEvent<'_>, snapshot: &TracerSnapshot);
}

/// Owned step stack and log, the concrete [`Tracer`] used by the indexer.
#[derive(Default)]
pub struct IndexTracer {
    steps: Vec<Step>,
    logs: Vec<LogEntry>,
    updated: u64,
    reporter: Option<Box<dyn ProgressReporter>>,
}

impl IndexTracer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reporter(reporter: Box<dyn ProgressReporter>) -> Self {
        Self {
            reporter: Some(reporter),
            ..Self::default()
        }
    }

    /// Clear the stack and the log.
    pub fn reset(&mut self) {
        self.steps.clear();
        self.logs.clear();
        self.updated = 0;
        self.notify(TracerEvent::Reset);
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn logs(&self) -> &[LogEntry] {
        &self.logs
    }

    pub fn depth(&self) -> usize {
        self.steps.len()
    }

    pub fn updated(&self) -> u64 {
        self.updated
    }

    pub fn title(&self) -> String {
        let title: String = self
            .steps
            .iter()
            .map(|step| match step.progress_total() {
                Some(total) => format!("{} [{}/{}] ", step.topic, step.completed, total),
                None => format!("{} ", step.topic),
            })
            .collect();
        let title = title.trim_end();
        if title.is_empty() {
            "Preparing...".to_string()
        } else {
            title.to_string()
        }
    }

    pub fn message(&self) -> &str {
        self.logs
            .last()
            .map(|entry| entry.message.as_str())
            .unwrap_or("...")
    }

    /// Weighted completion in `[0, 100]`, rounded to one decimal.
    pub fn percentage(&self) -> f64 {
        let (acc, _) = self
            .steps
            .iter()
            .filter_map(|step| {
                let total = step.progress_total()? as f64;
                Some(((step.completed as f64 / total).min(1.0), 1.0 / total))
            })
            .fold((0.0, 100.0), |(acc, scale), (done, unit)| {
                (acc + done * scale, scale * unit)
            });
        ((acc * 10.0).round() / 10.0).clamp(0.0, 100.0)
    }

    pub fn snapshot(&self) -> TracerSnapshot {
        TracerSnapshot {
            title: self.title(),
            message: self.message().to_string(),
            percentage: self.percentage(),
            updated: self.updated,
        }
    }

    fn push_log(&mut self, level: LogLevel, message: &str) {
        self.logs.push(LogEntry {
            level,
            message: message.to_string(),
            timestamp: Utc::now(),
        });
        self.updated += 1;
        if let Some(reporter) = &self.reporter {
            let snapshot = self.snapshot();
            if let Some(entry) = self.logs.last() {
                reporter.report(TracerEvent::Logged(entry), &snapshot);
            }
        }
    }

    fn notify(&self, event: TracerEvent<'_>) {
        if let Some(reporter) = &self.reporter {
            reporter.report(event, &self.snapshot());
        }
    }
}

impl Tracer for IndexTracer {
    fn log(&mut self, message: &str) {
        self.push_log(LogLevel::Info, message);
    }

    fn warn(&mut self, message: &str) {
        self.push_log(LogLevel::Warning, message);
    }

    fn on_step_start(&mut self, topic: &str, message: &str, total: Option<usize>) {
        self.steps.push(Step {
            topic: topic.to_string(),
            message: message.to_string(),
            completed: 0,
            total,
        });
        self.updated += 1;
        self.notify(TracerEvent::StepStarted);
    }

    fn on_step_end(&mut self) {
        if self.steps.pop().is_none() {
            tracing::warn!("on_step_end without a matching on_step_start");
            return;
        }
        if let Some(parent) = self.steps.last_mut() {
            parent.completed += 1;
        }
        self.updated += 1;
        self.notify(TracerEvent::StepEnded);
    }
}

/// A tracer that discards everything.
pub struct NoopTracer;

impl Tracer for NoopTracer {
    fn log(&mut self, _message: &str) {}
    fn warn(&mut self, _message: &str) {}
    fn on_step_start(&mut self, _topic: &str, _message: &str, _total: Option<usize>) {}
    fn on_step_end(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn advance(tracer: &mut IndexTracer, n: usize) {
        for _ in 0..n {
            tracer.on_step_start("child", "", None);
            tracer.on_step_end();
        }
    }

    #[test]
    fn nested_percentage() {
        let mut tracer = IndexTracer::new();
        tracer.on_step_start("outer", "", Some(5));
        advance(&mut tracer, 1);
        tracer.on_step_start("inner", "", Some(10));
        advance(&mut tracer, 2);
        assert_eq!(tracer.percentage(), 24.0);
        assert_eq!(tracer.title(), "outer [1/5] inner [2/10]");
    }

    #[test]
    fn steps_without_total_are_skipped() {
        let mut tracer = IndexTracer::new();
        tracer.on_step_start("sync", "", None);
        tracer.on_step_start("docs", "", Some(4));
        advance(&mut tracer, 1);
        tracer.on_step_start("zero", "", Some(0));
        assert_eq!(tracer.percentage(), 25.0);
        assert_eq!(tracer.title(), "sync docs [1/4] zero");
    }

    #[test]
    fn rounds_to_one_decimal() {
        let mut tracer = IndexTracer::new();
        tracer.on_step_start("thirds", "", Some(3));
        advance(&mut tracer, 1);
        assert_eq!(tracer.percentage(), 33.3);
    }

    #[test]
    fn empty_views() {
        let tracer = IndexTracer::new();
        assert_eq!(tracer.title(), "Preparing...");
        assert_eq!(tracer.message(), "...");
        assert_eq!(tracer.percentage(), 0.0);
    }

    #[test]
    fn message_is_latest_log() {
        let mut tracer = IndexTracer::new();
        tracer.log("first");
        tracer.on_step_start("step", "step message", None);
        tracer.warn("second");
        assert_eq!(tracer.message(), "second");
        assert_eq!(tracer.logs()[1].level, LogLevel::Warning);
    }

    #[test]
    fn unbalanced_end_is_ignored() {
        let mut tracer = IndexTracer::new();
        tracer.on_step_start("only", "", Some(2));
        advance(&mut tracer, 1);
        tracer.on_step_end();
        let before = tracer.percentage();
        let updated = tracer.updated();
        tracer.on_step_end();
        tracer.on_step_end();
        assert_eq!(tracer.percentage(), before);
        assert_eq!(tracer.updated(), updated);
        assert_eq!(tracer.depth(), 0);
    }

    #[test]
    fn overfull_step_caps_at_hundred() {
        let mut tracer = IndexTracer::new();
        tracer.on_step_start("outer", "", Some(2));
        advance(&mut tracer, 3);
        tracer.on_step_start("inner", "", Some(2));
        advance(&mut tracer, 1);
        assert_eq!(tracer.percentage(), 100.0);
    }

    #[test]
    fn balanced_sequences_stay_in_range() {
        // Small LCG so the walk is reproducible.
        let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
        let mut next = move || {
            seed = seed
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            (seed >> 33) as usize
        };
        let mut tracer = IndexTracer::new();
        for _ in 0..2_000 {
            if tracer.depth() > 0 && next() % 2 == 0 {
                tracer.on_step_end();
            } else if tracer.depth() < 6 {
                let total = match next() % 4 {
                    0 => None,
                    n => Some(n),
                };
                tracer.on_step_start("s", "", total);
            }
            let p = tracer.percentage();
            assert!((0.0..=100.0).contains(&p), "percentage out of range: {p}");
        }
    }

    fn failing_work(tracer: &mut dyn Tracer) -> Result<(), String> {
        let mut step = tracer.step("work", "", Some(2));
        let _inner = step.step("inner", "", None);
        Err("boom".to_string())
    }

    #[test]
    fn guards_close_steps_on_error() {
        let mut tracer = IndexTracer::new();
        tracer.on_step_start("root", "", Some(1));
        assert!(failing_work(&mut tracer).is_err());
        assert_eq!(tracer.depth(), 1);
        assert_eq!(tracer.steps()[0].completed, 1);
    }

    #[test]
    fn reset_clears_everything() {
        let mut tracer = IndexTracer::new();
        tracer.on_step_start("a", "", Some(1));
        tracer.log("x");
        tracer.reset();
        assert_eq!(tracer.depth(), 0);
        assert!(tracer.logs().is_empty());
        assert_eq!(tracer.updated(), 0);
    }

    struct Recorder(Arc<Mutex<Vec<String>>>);

    impl ProgressReporter for Recorder {
        fn report(&self, event: TracerEvent<'_>, snapshot: &TracerSnapshot) {
            let tag = match event {
                TracerEvent::StepStarted => "start",
                TracerEvent::StepEnded => "end",
                TracerEvent::Logged(_) => "log",
                TracerEvent::Reset => "reset",
            };
            self.0
                .lock()
                .unwrap()
                .push(format!("{tag}:{}", snapshot.percentage));
        }
    }

    #[test]
    fn reporter_sees_every_mutation() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut tracer = IndexTracer::with_reporter(Box::new(Recorder(seen.clone())));
        tracer.on_step_start("a", "", Some(2));
        advance(&mut tracer, 1);
        tracer.log("hi");
        assert_eq!(
            *seen.lock().unwrap(),
            vec!["start:0", "start:0", "end:50", "log:50"]
        );
    }
}
