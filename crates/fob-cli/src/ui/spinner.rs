//! Spinner for builds without a known duration.

use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::Style;
use std::time::Duration;

use super::paint;

/// Spinner shown while units compile.
///
/// Draws nothing unless stderr is an attended terminal outside CI. Quiet and
/// `--json` runs use [`Spinner::hidden`].
///
/// ```no_run
/// use fob_cli::ui::Spinner;
///
/// let spinner = Spinner::new("Compiling 3 units...");
/// spinner.finish("Compiled");
/// ```
pub struct Spinner {
    pb: ProgressBar,
}

impl Spinner {
    /// Create and start a new spinner.
    pub fn new(message: &str) -> Self {
        if !super::is_interactive() {
            return Self::hidden();
        }

        let pb = ProgressBar::new_spinner();
        let style = ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg} {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["◐", "◓", "◑", "◒", "●"]);
        pb.set_style(style);
        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));

        Self { pb }
    }

    /// A spinner that never draws.
    pub fn hidden() -> Self {
        Self {
            pb: ProgressBar::hidden(),
        }
    }

    /// Update spinner message while it's running.
    pub fn set_message(&self, message: &str) {
        self.pb.set_message(message.to_string());
    }

    /// Finish with a green checkmark.
    pub fn finish(&self, message: &str) {
        self.pb
            .finish_with_message(format!("{} {}", paint("✓", Style::new().green()), message));
    }

    /// Finish with a red cross.
    pub fn fail(&self, message: &str) {
        self.pb
            .finish_with_message(format!("{} {}", paint("✗", Style::new().red()), message));
    }

    /// Remove the spinner line without leaving a message.
    pub fn clear(&self) {
        self.pb.finish_and_clear();
    }
}
