//! Spinner shown while a sync session runs.

use std::time::Duration;

use anisync_lib::{SyncEvent, SyncPhase};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

pub(crate) struct SyncSpinner {
    bar: ProgressBar,
    count: usize,
}

impl SyncSpinner {
    /// When `quiet` is true the spinner is hidden.
    pub(crate) fn new(quiet: bool) -> Self {
        let bar = ProgressBar::new_spinner();
        if quiet {
            bar.set_draw_target(ProgressDrawTarget::hidden());
        }
        let style = ProgressStyle::with_template("  {spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("/-\\|");
        bar.set_style(style);
        bar.enable_steady_tick(Duration::from_millis(100));
        bar.set_message("Starting sync...");
        Self { bar, count: 0 }
    }

    /// Reflect a session event in the spinner message.
    pub(crate) fn update(&mut self, event: &SyncEvent) {
        if event.is_terminal() {
            self.finish();
            return;
        }
        match event {
            SyncEvent::Phase(phase) => {
                let msg = match phase {
                    SyncPhase::Fetching => format!("Fetching catalog ({} releases)", self.count),
                    SyncPhase::Diffing => format!("Comparing ({} releases)", self.count),
                    SyncPhase::Applying => format!("Saving ({} releases)", self.count),
                    SyncPhase::Flushing => "Uploading history and favorites".to_string(),
                    SyncPhase::Idle | SyncPhase::Error => return,
                };
                self.bar.set_message(msg);
            }
            SyncEvent::Progress { count } => {
                self.count = *count;
                self.bar
                    .set_message(format!("Fetching catalog ({} releases)", count));
            }
            _ => {}
        }
    }

    /// Stop ticking and clear the line.
    pub(crate) fn finish(&self) {
        if self.bar.is_finished() {
            return;
        }
        self.bar.disable_steady_tick();
        self.bar.finish_and_clear();
    }
}
