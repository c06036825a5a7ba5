use std::collections::BTreeMap;

use crate::config::ScoringConfig;
use crate::models::{round_to, HealthScore, HealthStatus, QualityIndicator, Summaries, WindowStats};

pub const THERAPEUTIC_WEIGHT: f64 = 0.40;
pub const EMPATHY_WEIGHT: f64 = 0.25;
pub const STRESS_WEIGHT: f64 = 0.20;
pub const SUCCESS_RATE_WEIGHT: f64 = 0.15;

pub fn score(stats: &WindowStats, config: &ScoringConfig) -> HealthScore {
    match stats.require_summaries() {
        Ok(summaries) => score_summaries(summaries, config),
        Err(err) => {
            tracing::debug!(error = %err, "health score unavailable");
            HealthScore {
                score: 0.0,
                status: HealthStatus::Error,
                components: BTreeMap::new(),
            }
        }
    }
}

pub fn score_summaries(summaries: &Summaries, config: &ScoringConfig) -> HealthScore {
    let components = [
        (
            "therapeutic_effectiveness",
            THERAPEUTIC_WEIGHT,
            component(summaries.overall_score.average / 10.0 * 100.0),
        ),
        (
            "empathy",
            EMPATHY_WEIGHT,
            component(summaries.empathy.average / 10.0 * 100.0),
        ),
        (
            "stress_reduction",
            STRESS_WEIGHT,
            component(summaries.stress_reduction.average.abs() / config.stress_health_cap * 100.0),
        ),
        (
            "success_rate",
            SUCCESS_RATE_WEIGHT,
            component(summaries.overall_score.above_threshold * 100.0),
        ),
    ];

    let total: f64 = components
        .iter()
        .map(|(_, weight, value)| weight * value)
        .sum();
    let score = round_to(total.clamp(0.0, 100.0), 1);

    HealthScore {
        score,
        status: status_for(score),
        components: components
            .iter()
            .map(|(name, _, value)| (name.to_string(), round_to(*value, 2)))
            .collect(),
    }
}

fn component(value: f64) -> f64 {
    value.clamp(0.0, 100.0)
}

pub fn status_for(score: f64) -> HealthStatus {
    if score >= 90.0 {
        HealthStatus::Excellent
    } else if score >= 80.0 {
        HealthStatus::Good
    } else if score >= 70.0 {
        HealthStatus::Warning
    } else {
        HealthStatus::Critical
    }
}

fn band(value: f64, excellent: f64, good: f64, warning: f64) -> HealthStatus {
    if value >= excellent {
        HealthStatus::Excellent
    } else if value >= good {
        HealthStatus::Good
    } else if value >= warning {
        HealthStatus::Warning
    } else {
        HealthStatus::Critical
    }
}

/// Dashboard widgets, one per headline metric.
pub fn indicators(stats: &WindowStats) -> Vec<QualityIndicator> {
    let Some(summaries) = stats.summaries() else {
        return vec![QualityIndicator {
            name: "Data Collection".to_string(),
            value: "n/a".to_string(),
            status: HealthStatus::Error,
        }];
    };

    let effectiveness = summaries.overall_score.average;
    let empathy = summaries.empathy.average;
    let stress = summaries.stress_reduction.average;
    let success_rate = summaries.overall_score.above_threshold;

    vec![
        QualityIndicator {
            name: "Therapeutic Effectiveness".to_string(),
            value: format!("{effectiveness:.1}/10"),
            status: band(effectiveness, 8.5, 7.5, 6.5),
        },
        QualityIndicator {
            name: "AI Empathy Score".to_string(),
            value: format!("{empathy:.1}/10"),
            status: band(empathy, 9.0, 8.0, 7.0),
        },
        QualityIndicator {
            name: "Stress Reduction".to_string(),
            value: format!("{stress:.1} pts"),
            // Negated so deeper reductions land in the higher bands.
            status: band(-stress, 2.0, 1.5, 1.0),
        },
        QualityIndicator {
            name: "Success Rate".to_string(),
            value: format!("{:.1}%", success_rate * 100.0),
            status: band(success_rate, 0.95, 0.90, 0.80),
        },
    ]
}
