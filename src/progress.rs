//! Progress reporting boundary. Rich, human-facing rendering is out of
//! scope (§1); this only defines the trait drivers call into, plus a
//! minimal terminal implementation using the same crates the teacher used
//! for its own progress bars.

use indicatif::{ProgressBar, ProgressStyle};
use pretty_bytes::converter::convert;

/// What the orchestrator and drivers report as an upload proceeds. Kept
/// deliberately small: no ETA/throughput modeling, just enough for a
/// caller to drive a progress bar or log line.
pub trait ProgressSink: Send + Sync {
    fn descriptor_started(&self, display_name: &str, size: u64);
    fn descriptor_finished(&self, display_name: &str, succeeded: bool);
}

/// Discards every event. The default when no caller-supplied sink is
/// given.
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn descriptor_started(&self, _display_name: &str, _size: u64) {}
    fn descriptor_finished(&self, _display_name: &str, _succeeded: bool) {}
}

/// A single indeterminate-length spinner bar, updated with the name of
/// whichever descriptor most recently started or finished. Good enough for
/// a CLI run; anything richer is the external collaborator's job.
pub struct TerminalProgress {
    bar: ProgressBar,
}

impl TerminalProgress {
    pub fn new() -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        TerminalProgress { bar }
    }
}

impl Default for TerminalProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for TerminalProgress {
    fn descriptor_started(&self, display_name: &str, size: u64) {
        self.bar
            .set_message(format!("uploading {display_name} ({})", convert(size as f64)));
        self.bar.tick();
    }

    fn descriptor_finished(&self, display_name: &str, succeeded: bool) {
        let verb = if succeeded { "done" } else { "failed" };
        self.bar.set_message(format!("{verb}: {display_name}"));
        self.bar.tick();
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn noop_progress_accepts_events_without_panicking() {
        let sink = NoopProgress;
        sink.descriptor_started("a.txt", 1024);
        sink.descriptor_finished("a.txt", true);
    }
}
