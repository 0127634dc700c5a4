//! Terminal UI utilities for progress and formatted output.
//!
//! Handles environment detection (CI, TTY, `NO_COLOR`) and degrades to plain
//! text when terminal features aren't available.
//!
//! # Examples
//!
//! ```no_run
//! use fob_cli::ui;
//!
//! ui::init_colors(false);
//!
//! let spinner = ui::Spinner::new("Compiling 2 units...");
//! spinner.finish("Compiled");
//!
//! ui::success("Build successful");
//! ui::error("Failed to read fob.toml");
//! ```

mod format;
mod messages;
mod spinner;

pub use format::{emitted_size, format_duration, format_size, print_build_summary, summary_line};
pub use messages::{error, info, success, warning};
pub use spinner::Spinner;

use owo_colors::{OwoColorize, Style};
use std::fmt::Display;
use std::sync::atomic::{AtomicBool, Ordering};

static COLORS: AtomicBool = AtomicBool::new(true);
static QUIET: AtomicBool = AtomicBool::new(false);

/// Check if running in a CI environment.
pub fn is_ci() -> bool {
    ["CI", "GITHUB_ACTIONS", "GITLAB_CI", "CIRCLECI", "TRAVIS"]
        .iter()
        .any(|var| std::env::var_os(var).is_some())
}

/// Check if color output should be enabled.
///
/// Respects `NO_COLOR` and `FORCE_COLOR`, then falls back to terminal
/// capability detection.
pub fn should_use_color() -> bool {
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }
    if std::env::var_os("FORCE_COLOR").is_some() {
        return true;
    }
    console::user_attended_stderr()
}

/// Initialize color support. `--no-color` always wins.
pub fn init_colors(no_color: bool) {
    COLORS.store(!no_color && should_use_color(), Ordering::Relaxed);
}

pub fn colors_enabled() -> bool {
    COLORS.load(Ordering::Relaxed)
}

/// Suppress everything but errors.
pub fn set_quiet(quiet: bool) {
    QUIET.store(quiet, Ordering::Relaxed);
}

pub fn is_quiet() -> bool {
    QUIET.load(Ordering::Relaxed)
}

/// True when animated output makes sense.
pub fn is_interactive() -> bool {
    !is_quiet() && !is_ci() && console::user_attended_stderr()
}

/// Apply `style` when colors are enabled.
pub(crate) fn paint(text: impl Display, style: Style) -> String {
    if colors_enabled() {
        text.style(style).to_string()
    } else {
        text.to_string()
    }
}
