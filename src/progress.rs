//! Batch progress reporting.
//!
//! Directory uploads and bulk deletions report one event per finished item
//! so users can see how much is left. Progress goes to **stderr** so stdout
//! stays parseable for scripts.

use std::io::Write;

/// A single progress event for a batch operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BatchProgressEvent {
    /// The batch is about to start; `total` items are queued.
    Started { operation: String, total: u64 },
    /// One more item finished (successfully or not).
    Item {
        operation: String,
        name: String,
        ok: bool,
        n: u64,
        total: u64,
    },
    /// Every item finished.
    Finished {
        operation: String,
        succeeded: u64,
        failed: u64,
    },
}

/// Receives batch progress. Called from the batch loop, never concurrently.
pub trait BatchProgressReporter: Send + Sync {
    fn report(&self, event: BatchProgressEvent);
}

/// Human-friendly progress on stderr: "upload  12 / 1,300  notes/a.md".
pub struct StderrProgress;

impl BatchProgressReporter for StderrProgress {
    fn report(&self, event: BatchProgressEvent) {
        let line = match &event {
            BatchProgressEvent::Started { operation, total } => {
                format!("{}  {} items queued\n", operation, format_number(*total))
            }
            BatchProgressEvent::Item {
                operation,
                name,
                ok,
                n,
                total,
            } => {
                let marker = if *ok { "" } else { "  FAILED" };
                format!(
                    "{}  {} / {}  {}{}\n",
                    operation,
                    format_number(*n),
                    format_number(*total),
                    name,
                    marker
                )
            }
            BatchProgressEvent::Finished {
                operation,
                succeeded,
                failed,
            } => format!(
                "{}  done: {} succeeded, {} failed\n",
                operation,
                format_number(*succeeded),
                format_number(*failed)
            ),
        };
        let mut err = std::io::stderr().lock();
        let _ = err.write_all(line.as_bytes());
        let _ = err.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl BatchProgressReporter for JsonProgress {
    fn report(&self, event: BatchProgressEvent) {
        let obj = event_json(&event);
        if let Ok(line) = serde_json::to_string(&obj) {
            let mut err = std::io::stderr().lock();
            let _ = writeln!(err, "{}", line);
            let _ = err.flush();
        }
    }
}

fn event_json(event: &BatchProgressEvent) -> serde_json::Value {
    match event {
        BatchProgressEvent::Started { operation, total } => serde_json::json!({
            "event": "progress",
            "operation": operation,
            "phase": "started",
            "total": total
        }),
        BatchProgressEvent::Item {
            operation,
            name,
            ok,
            n,
            total,
        } => serde_json::json!({
            "event": "progress",
            "operation": operation,
            "phase": "item",
            "name": name,
            "ok": ok,
            "n": n,
            "total": total
        }),
        BatchProgressEvent::Finished {
            operation,
            succeeded,
            failed,
        } => serde_json::json!({
            "event": "progress",
            "operation": operation,
            "phase": "finished",
            "succeeded": succeeded,
            "failed": failed
        }),
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl BatchProgressReporter for NoProgress {
    fn report(&self, _event: BatchProgressEvent) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    /// Human progress when stderr is a terminal, otherwise off.
    Auto,
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    /// Build a reporter for this mode.
    pub fn reporter(&self) -> Box<dyn BatchProgressReporter> {
        match self {
            ProgressMode::Auto => Self::default_for_tty().reporter(),
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_number_comma() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1_234_567), "1,234,567");
    }

    #[test]
    fn item_event_json_shape() {
        let obj = event_json(&BatchProgressEvent::Item {
            operation: "upload".into(),
            name: "a.md".into(),
            ok: false,
            n: 2,
            total: 3,
        });
        assert_eq!(obj["phase"], "item");
        assert_eq!(obj["ok"], false);
        assert_eq!(obj["n"], 2);
    }

    #[test]
    fn auto_mode_resolves_to_concrete_reporter() {
        // Only checks that Auto never recurses forever.
        let _ = ProgressMode::Auto.reporter();
        let resolved = ProgressMode::default_for_tty();
        assert!(matches!(resolved, ProgressMode::Human | ProgressMode::Off));
    }
}
