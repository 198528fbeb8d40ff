//! Terminal output utilities
//!
//! Consistent formatting for status lines, cached entities and refresh
//! state.

use chrono::{DateTime, Utc};
use larder_core::entity::Entity;
use larder_core::state::RefreshState;
use owo_colors::OwoColorize;
use serde_json::Value;

/// Longest rendered field summary before it is cut
const MAX_SUMMARY_WIDTH: usize = 60;

/// Status message helpers
pub struct Status;

impl Status {
    /// Print a success message
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Print an error message
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Print a warning message
    pub fn warning(message: &str) {
        eprintln!("{} {}", "⚠".yellow(), message);
    }

    /// Print an info message
    pub fn info(message: &str) {
        println!("{} {}", "ℹ".blue(), message);
    }

    /// Print a header
    pub fn header(message: &str) {
        println!();
        println!("{}", message.bold());
        println!("{}", "─".repeat(message.chars().count()));
    }

    /// Print the outcome of a refresh with the matching marker
    pub fn refresh(state: &RefreshState) {
        match state {
            RefreshState::Failed(_) => Self::error(&format_state(state)),
            RefreshState::Refreshing => Self::info(&format_state(state)),
            RefreshState::Idle => Self::success("Refresh committed"),
        }
    }
}

/// Format a duration for display
pub fn format_duration(duration: std::time::Duration) -> String {
    let secs = duration.as_secs_f32();
    if secs < 1.0 {
        format!("{:.0}ms", secs * 1000.0)
    } else if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        let mins = (secs / 60.0).floor();
        let remaining_secs = secs % 60.0;
        format!("{}m {:.0}s", mins, remaining_secs)
    }
}

/// Format a count with singular/plural
pub fn format_count(count: usize, singular: &str, plural: &str) -> String {
    if count == 1 {
        format!("{} {}", count, singular)
    } else {
        format!("{} {}", count, plural)
    }
}

/// How long ago `at` was, relative to `now`
pub fn format_age(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - at).num_seconds();
    match secs {
        s if s < 5 => "just now".to_string(),
        s if s < 60 => format!("{s}s ago"),
        s if s < 3600 => format!("{}m ago", s / 60),
        s if s < 86_400 => format!("{}h ago", s / 3600),
        s => format!("{}d ago", s / 86_400),
    }
}

/// One-line description of a refresh state
pub fn format_state(state: &RefreshState) -> String {
    match state {
        RefreshState::Idle => "idle".to_string(),
        RefreshState::Refreshing => "refreshing".to_string(),
        RefreshState::Failed(failure) => {
            format!("failed ({}): {}", failure.kind, failure.message)
        }
    }
}

/// Render a payload value without JSON quoting for plain strings
pub fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// `name=value` pairs for an entity's payload, cut to a readable width
pub fn summarize(entity: &Entity) -> String {
    let summary = entity
        .payload()
        .iter()
        .map(|(name, value)| format!("{name}={}", format_value(value)))
        .collect::<Vec<_>>()
        .join(", ");

    if summary.chars().count() > MAX_SUMMARY_WIDTH {
        let cut: String = summary.chars().take(MAX_SUMMARY_WIDTH - 1).collect();
        format!("{cut}…")
    } else {
        summary
    }
}

/// Table rows for a list of entities: id, payload summary, age
pub fn entity_rows(entities: &[Entity], now: DateTime<Utc>) -> Vec<String> {
    let id_width = entities
        .iter()
        .map(|e| e.id().as_str().chars().count())
        .max()
        .unwrap_or(0)
        .max(2);

    entities
        .iter()
        .map(|e| {
            format!(
                "{:<id_width$}  {}  {}",
                e.id().as_str(),
                summarize(e),
                format_age(e.refreshed_at(), now)
            )
        })
        .collect()
}

/// Print entities as a table, or a note when there are none
pub fn print_entities(entities: &[Entity]) {
    if entities.is_empty() {
        Status::info("No cached entities");
        return;
    }
    for row in entity_rows(entities, Utc::now()) {
        println!("{row}");
    }
    println!(
        "{}",
        format_count(entities.len(), "entity", "entities").dimmed()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use larder_core::entity::payload;
    use larder_core::state::RefreshFailure;
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn test_format_duration_ms() {
        let d = Duration::from_millis(500);
        assert_eq!(format_duration(d), "500ms");
    }

    #[test]
    fn test_format_duration_secs() {
        let d = Duration::from_secs_f32(5.5);
        assert_eq!(format_duration(d), "5.5s");
    }

    #[test]
    fn test_format_duration_mins() {
        let d = Duration::from_secs(125);
        assert_eq!(format_duration(d), "2m 5s");
    }

    #[test]
    fn test_format_count() {
        assert_eq!(format_count(1, "entity", "entities"), "1 entity");
        assert_eq!(format_count(0, "entity", "entities"), "0 entities");
    }

    #[test]
    fn test_format_age() {
        let now = Utc::now();
        assert_eq!(format_age(now, now), "just now");
        assert_eq!(format_age(now - ChronoDuration::seconds(30), now), "30s ago");
        assert_eq!(format_age(now - ChronoDuration::minutes(5), now), "5m ago");
        assert_eq!(format_age(now - ChronoDuration::hours(3), now), "3h ago");
        assert_eq!(format_age(now - ChronoDuration::days(2), now), "2d ago");
    }

    #[test]
    fn test_format_state() {
        assert_eq!(format_state(&RefreshState::Idle), "idle");
        assert_eq!(
            format_state(&RefreshState::Failed(RefreshFailure::network("timed out"))),
            "failed (network): timed out"
        );
    }

    #[test]
    fn test_summarize_unquotes_strings() {
        let entity = Entity::new(1i64, payload([("name", json!("A")), ("price", json!(10))]));
        assert_eq!(summarize(&entity), "name=A, price=10");
    }

    #[test]
    fn test_summarize_cuts_long_payloads() {
        let entity = Entity::new(1i64, payload([("notes", json!("x".repeat(200)))]));
        let summary = summarize(&entity);
        assert_eq!(summary.chars().count(), MAX_SUMMARY_WIDTH);
        assert!(summary.ends_with('…'));
    }

    #[test]
    fn test_entity_rows_align_ids() {
        let now = Utc::now();
        let entities = vec![
            Entity::new(1i64, payload([("name", json!("A"))])).with_refreshed_at(now),
            Entity::new(1000i64, payload([("name", json!("B"))])).with_refreshed_at(now),
        ];
        let rows = entity_rows(&entities, now);
        assert_eq!(rows[0], "1     name=A  just now");
        assert_eq!(rows[1], "1000  name=B  just now");
    }
}
