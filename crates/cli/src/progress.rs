//! Progress indicators for refreshes and other waits

use indicatif::{ProgressBar, ProgressStyle};
use larder_core::state::RefreshState;
use std::time::Duration;

use crate::output::{format_duration, format_state};

/// Create a spinner for indeterminate progress
pub fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .template("{spinner:.blue} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// Spinner shown while a refresh is in flight
pub fn refresh_spinner(collection: &str) -> ProgressBar {
    spinner(&format!("Refreshing {collection}..."))
}

/// Finish a refresh spinner with its outcome
pub fn finish_refresh(pb: &ProgressBar, state: &RefreshState, elapsed: Duration) {
    let message = match state {
        RefreshState::Failed(_) => format!("✗ Refresh {}", format_state(state)),
        _ => format!("✓ Refreshed in {}", format_duration(elapsed)),
    };
    pb.finish_with_message(message);
}

#[cfg(test)]
mod tests {
    use super::*;
    use larder_core::state::RefreshFailure;

    #[test]
    fn test_spinner_creation() {
        let pb = refresh_spinner("entities");
        assert_eq!(pb.message(), "Refreshing entities...");
        pb.finish();
    }

    #[test]
    fn test_finish_refresh_reports_failure() {
        let pb = spinner("Refreshing");
        let failed = RefreshState::Failed(RefreshFailure::parse("not an array"));
        finish_refresh(&pb, &failed, Duration::from_millis(20));
        assert_eq!(pb.message(), "✗ Refresh failed (parse): not an array");
    }

    #[test]
    fn test_finish_refresh_reports_elapsed() {
        let pb = spinner("Refreshing");
        finish_refresh(&pb, &RefreshState::Idle, Duration::from_millis(250));
        assert_eq!(pb.message(), "✓ Refreshed in 250ms");
    }
}
