//! Terminal status helpers. Respects the `NO_COLOR` env-var and the
//! `--no-color` CLI flag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

static COLOR_DISABLED: AtomicBool = AtomicBool::new(false);

/// Initialise the colour system. Checks `NO_COLOR` and the `--no-color` flag.
pub fn init_color(no_color_flag: bool) {
    if no_color_flag
        || std::env::var("NO_COLOR")
            .map(|v| !v.is_empty())
            .unwrap_or(false)
    {
        COLOR_DISABLED.store(true, Ordering::Relaxed);
        colored::control::set_override(false);
    }
}

fn is_color() -> bool {
    !COLOR_DISABLED.load(Ordering::Relaxed)
}

/// Success state.
pub fn ok(text: &str) -> String {
    if is_color() { text.green().to_string() } else { text.to_string() }
}

/// Warning / attention.
pub fn warn(text: &str) -> String {
    if is_color() { text.yellow().to_string() } else { text.to_string() }
}

/// Error / failure.
pub fn fail(text: &str) -> String {
    if is_color() { text.red().to_string() } else { text.to_string() }
}

/// De-emphasis / metadata.
pub fn muted(text: &str) -> String {
    if is_color() { text.dimmed().to_string() } else { text.to_string() }
}

/// Green ✓
pub fn icon_ok(label: &str) -> String {
    format!("{} {}", ok("✓"), label)
}

/// Red ✗
pub fn icon_fail(label: &str) -> String {
    format!("{} {}", fail("✗"), label)
}

// ── Spinner helpers ─────────────────────────────────────────────────────────

/// Create an indeterminate spinner with a message.
///
/// The caller finishes it with [`spinner_ok`] or [`spinner_fail`].
pub fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner}  {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// Finish a spinner with a success icon + message.
pub fn spinner_ok(pb: &ProgressBar, message: &str) {
    pb.finish_with_message(icon_ok(message));
}

/// Finish a spinner with a failure icon + message.
pub fn spinner_fail(pb: &ProgressBar, message: &str) {
    pb.finish_with_message(icon_fail(message));
}
