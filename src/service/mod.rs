//! Service layer: task lifecycle and goal aggregation.

pub mod goals;
pub mod lifecycle;

pub use goals::GoalAggregator;
pub use lifecycle::TaskLifecycle;

use chrono::{TimeZone, Utc};

/// Render an epoch-millisecond timestamp the way the UI shows task dates,
/// e.g. `Mon Jan 01 2024`.
pub fn format_date_string(ms: i64) -> String {
    match Utc.timestamp_millis_opt(ms).single() {
        Some(dt) => dt.format("%a %b %d %Y").to_string(),
        None => "Invalid Date".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_string_matches_ui_format() {
        // 2024-01-01T00:00:00Z was a Monday
        assert_eq!(format_date_string(1_704_067_200_000), "Mon Jan 01 2024");
    }
}
