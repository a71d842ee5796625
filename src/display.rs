//! Single-line terminal rendering of the engine state.

use crate::timer::EngineState;

const BAR_WIDTH: usize = 20;

/// `MM:SS` of the remaining time, truncated to whole seconds.
#[must_use]
pub fn clock_digits(remaining_ms: u64) -> String {
    let minutes = remaining_ms / 60_000;
    let seconds = (remaining_ms % 60_000) / 1000;
    format!("{minutes:02}:{seconds:02}")
}

/// Progress bar filled in proportion to [`EngineState::progress`].
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn progress_bar(progress: f64) -> String {
    let filled = ((progress.clamp(0.0, 1.0) * BAR_WIDTH as f64).round() as usize).min(BAR_WIDTH);
    format!("{}{}", "█".repeat(filled), "░".repeat(BAR_WIDTH - filled))
}

/// Line shown while a run is in progress, prefixed with `\r` so it
/// overwrites itself.
#[must_use]
pub fn render_line(state: &EngineState) -> String {
    format!(
        "\r⏱️  {} [{}] {:<20}",
        clock_digits(state.time_remaining_ms),
        progress_bar(state.progress()),
        state.status_text
    )
}
