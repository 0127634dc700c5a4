//! Status message functions for terminal output.
//!
//! All messages go to stderr so that stdout stays free for `--json` reports.
//! Nothing is printed after [`set_quiet`](super::set_quiet) except errors.

use owo_colors::Style;

use super::{is_quiet, paint};

/// Print a success message to stderr.
pub fn success(message: &str) {
    if !is_quiet() {
        eprintln!("{} {}", paint("✓", Style::new().green().bold()), message);
    }
}

/// Print an info message to stderr.
pub fn info(message: &str) {
    if !is_quiet() {
        eprintln!("{} {}", paint("ℹ", Style::new().blue().bold()), message);
    }
}

/// Print a warning message to stderr.
pub fn warning(message: &str) {
    if !is_quiet() {
        eprintln!(
            "{} {}",
            paint("⚠", Style::new().yellow().bold()),
            paint(message, Style::new().yellow())
        );
    }
}

/// Print an error message to stderr.
pub fn error(message: &str) {
    eprintln!(
        "{} {}",
        paint("✗", Style::new().red().bold()),
        paint(message, Style::new().red())
    );
}
