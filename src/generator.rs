use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::models::{round_to, BehavioralResult, Complexity};

pub const PERSONAS: [&str; 5] = [
    "overwhelmed_professional",
    "student_with_adhd",
    "caregiver_burnout",
    "perfectionist_user",
    "chronic_illness_user",
];

pub const SCENARIOS: [&str; 5] = [
    "stress_reduction",
    "empathy_validation",
    "cognitive_load",
    "confidence_building",
    "behavioral_activation",
];

/// Deterministic source of synthetic behavioral results for seeding and demos.
pub struct Generator {
    rng: StdRng,
}

impl Generator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// `count` results spread round-robin over the `days` calendar days
    /// ending at `now`.
    pub fn generate(&mut self, count: usize, days: i64, now: DateTime<Utc>) -> Vec<BehavioralResult> {
        let days = days.max(1);
        (0..count)
            .map(|index| {
                let days_ago = index as i64 % days;
                // At most six hours back so the oldest day stays inside the window.
                let seconds_back = self.rng.gen_range(1..=6 * 3600);
                let timestamp = now - Duration::days(days_ago) - Duration::seconds(seconds_back);
                self.next_result(timestamp)
            })
            .collect()
    }

    fn next_result(&mut self, timestamp: DateTime<Utc>) -> BehavioralResult {
        let persona = PERSONAS[self.rng.gen_range(0..PERSONAS.len())];
        let scenario = SCENARIOS[self.rng.gen_range(0..SCENARIOS.len())];
        let complexity = Complexity::ALL[self.rng.gen_range(0..Complexity::ALL.len())];
        let penalty: f64 = match complexity {
            Complexity::Simple => 0.0,
            Complexity::Medium => 0.5,
            Complexity::Complex => 1.2,
        };

        let empathy_score = round_to((self.rng.gen_range(7.0..9.8) - penalty).clamp(0.0, 10.0), 1);
        let relief = (self.rng.gen_range(0.3..2.8) - penalty * 0.4).clamp(-0.5, 3.0);
        let stress_reduction = round_to(-relief, 2);
        let confidence_boost = round_to(self.rng.gen_range(0.2..2.0) - penalty * 0.3, 2);
        let trust_building = round_to((self.rng.gen_range(6.5..9.5) - penalty).clamp(0.0, 10.0), 1);
        let therapeutic_effectiveness =
            round_to((self.rng.gen_range(6.5..9.5) - penalty).clamp(0.0, 10.0), 1);
        let overall_score = round_to(
            BehavioralResult::derive_overall(
                empathy_score,
                stress_reduction,
                confidence_boost,
                trust_building,
                therapeutic_effectiveness,
            ),
            2,
        );

        BehavioralResult {
            id: uuid::Builder::from_random_bytes(self.rng.gen()).into_uuid(),
            test_name: format!("test_{scenario}_{persona}_{complexity}"),
            timestamp,
            persona: persona.to_string(),
            complexity,
            empathy_score,
            stress_reduction,
            confidence_boost,
            trust_building,
            therapeutic_effectiveness,
            duration_ms: self.rng.gen_range(150..2500),
            overall_score,
        }
    }
}
