//! Utility functions for the debate service

use chrono::{DateTime, Utc};
use std::time::Duration;
use uuid::Uuid;

/// Generate a new unique session ID
pub fn generate_session_id() -> Uuid {
    Uuid::new_v4()
}

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// Absolute difference between two integer ratings
pub fn rating_difference(rating1: i64, rating2: i64) -> u64 {
    rating1.abs_diff(rating2)
}

/// Render a countdown as `MM:SS`
pub fn format_countdown(remaining_seconds: u64) -> String {
    format!("{:02}:{:02}", remaining_seconds / 60, remaining_seconds % 60)
}

/// Whole elapsed time units, flooring partial units
pub fn whole_intervals(elapsed: Duration, interval: Duration) -> u64 {
    if interval.is_zero() {
        return 0;
    }
    (elapsed.as_nanos() / interval.as_nanos()) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_unique_ids() {
        let id1 = generate_session_id();
        let id2 = generate_session_id();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_rating_difference() {
        assert_eq!(rating_difference(1500, 1400), 100);
        assert_eq!(rating_difference(1400, 1500), 100);
        assert_eq!(rating_difference(1500, 1500), 0);
        assert_eq!(rating_difference(-20, 30), 50);
    }

    #[test]
    fn test_format_countdown() {
        assert_eq!(format_countdown(180), "03:00");
        assert_eq!(format_countdown(119), "01:59");
        assert_eq!(format_countdown(0), "00:00");
    }

    #[test]
    fn test_whole_intervals() {
        let thirty = Duration::from_secs(30);
        assert_eq!(whole_intervals(Duration::from_secs(0), thirty), 0);
        assert_eq!(whole_intervals(Duration::from_millis(29_999), thirty), 0);
        assert_eq!(whole_intervals(Duration::from_secs(30), thirty), 1);
        assert_eq!(whole_intervals(Duration::from_secs(95), thirty), 3);
        assert_eq!(whole_intervals(Duration::from_secs(95), Duration::ZERO), 0);
    }
}
