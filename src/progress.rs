//! Sync progress reporting.
//!
//! Renders [`IndexTracer`](docsync_core::IndexTracer) updates during
//! `docsync sync` so users see which document is being worked on and how far
//! along the run is. Progress is emitted on **stderr** so stdout remains
//! parseable for scripts.

use std::io::Write;
use std::str::FromStr;

use docsync_core::tracer::{LogLevel, ProgressReporter, TracerEvent, TracerSnapshot};

/// Human-friendly progress on stderr: `[ 24.0%] Syncing ns [1/2] Indexing [3/10]  embedded 4 chunks`.
///
/// Prints when a step opens or a line is logged; step ends only move the
/// percentage and are folded into the next line.
pub struct StderrProgress;

impl ProgressReporter for StderrProgress {
    fn report(&self, event: TracerEvent<'_>, snapshot: &TracerSnapshot) {
        let line = match event {
            TracerEvent::StepStarted => format!(
                "[{:>5.1}%] {}\n",
                snapshot.percentage, snapshot.title
            ),
            TracerEvent::Logged(entry) => {
                let marker = match entry.level {
                    LogLevel::Info => "",
                    LogLevel::Warning => "warning: ",
                    LogLevel::Error => "error: ",
                };
                format!(
                    "[{:>5.1}%] {}  {}{}\n",
                    snapshot.percentage, snapshot.title, marker, entry.message
                )
            }
            TracerEvent::StepEnded | TracerEvent::Reset => return,
        };
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(line.as_bytes());
        let _ = stderr.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl ProgressReporter for JsonProgress {
    fn report(&self, event: TracerEvent<'_>, snapshot: &TracerSnapshot) {
        if let Ok(line) = serde_json::to_string(&json_event(event, snapshot)) {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "{}", line);
            let _ = stderr.flush();
        }
    }
}

fn json_event(event: TracerEvent<'_>, snapshot: &TracerSnapshot) -> serde_json::Value {
    let name = match event {
        TracerEvent::StepStarted => "step_start",
        TracerEvent::StepEnded => "step_end",
        TracerEvent::Logged(_) => "log",
        TracerEvent::Reset => "reset",
    };
    let mut obj = serde_json::json!({
        "event": name,
        "title": snapshot.title,
        "message": snapshot.message,
        "percentage": snapshot.percentage,
        "updated": snapshot.updated,
    });
    if let TracerEvent::Logged(entry) = event {
        obj["level"] = serde_json::json!(entry.level);
        obj["timestamp"] = serde_json::json!(entry.timestamp.to_rfc3339());
    }
    obj
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _event: TracerEvent<'_>, _snapshot: &TracerSnapshot) {}
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn ProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

impl FromStr for ProgressMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "off" => Ok(ProgressMode::Off),
            "human" => Ok(ProgressMode::Human),
            "json" => Ok(ProgressMode::Json),
            other => Err(format!(
                "invalid progress mode '{}': expected off, human or json",
                other
            )),
        }
    }
}
