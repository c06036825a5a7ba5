use chrono::{DateTime, Duration, TimeZone, Utc};
use uuid::Uuid;

use crate::models::{BehavioralResult, Complexity};

pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap()
}

pub fn result_at(days_ago: i64, overall_score: f64) -> BehavioralResult {
    BehavioralResult {
        id: Uuid::new_v4(),
        test_name: "test_reduces_overwhelm".to_string(),
        timestamp: fixed_now() - Duration::days(days_ago),
        persona: "overwhelmed_professional".to_string(),
        complexity: Complexity::Medium,
        empathy_score: 8.5,
        stress_reduction: -1.5,
        confidence_boost: 1.2,
        trust_building: 8.0,
        therapeutic_effectiveness: 8.0,
        duration_ms: 420,
        overall_score,
    }
}
