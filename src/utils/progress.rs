//! Terminal progress for downloads.
//!
//! Set `UPDRAFT_NO_PROGRESS` to hide every bar (useful in CI and when the
//! scheduler runs unattended).

use crate::download::DownloadObserver;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

fn is_progress_disabled() -> bool {
    std::env::var("UPDRAFT_NO_PROGRESS").is_ok()
}

fn download_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{prefix:.bold.cyan} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("━╸━")
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{prefix:.bold} {spinner:.cyan} {bytes}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
}

/// Progress bar fed by the downloader.
///
/// Shows a byte bar when the server reports a length and a spinner
/// otherwise.
pub struct DownloadProgress {
    bar: ProgressBar,
}

impl DownloadProgress {
    /// Hidden bar labelled with `prefix` (usually the source name); it is
    /// shaped and shown once the download starts.
    pub fn new(prefix: impl Into<String>) -> Self {
        let bar = ProgressBar::hidden();
        bar.set_prefix(prefix.into());
        Self { bar }
    }
}

impl DownloadObserver for DownloadProgress {
    fn started(&self, total: Option<u64>) {
        if is_progress_disabled() {
            return;
        }
        match total {
            Some(len) => {
                self.bar.set_length(len);
                self.bar.set_style(download_style());
            }
            None => {
                self.bar.set_style(spinner_style());
                self.bar.enable_steady_tick(Duration::from_millis(100));
            }
        }
        self.bar.set_draw_target(indicatif::ProgressDrawTarget::stderr());
    }

    fn advanced(&self, bytes: u64) {
        self.bar.inc(bytes);
    }

    fn finished(&self, success: bool) {
        if success {
            self.bar.finish();
        } else {
            self.bar.abandon();
        }
    }
}
