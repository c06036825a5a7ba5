use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::MetricsError;

/// Stress and confidence deltas are normalized against this many points when
/// folded into the 0-10 overall score.
pub const DELTA_SCALE_POINTS: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Simple,
    Medium,
    Complex,
}

impl Complexity {
    pub const ALL: [Complexity; 3] = [Complexity::Simple, Complexity::Medium, Complexity::Complex];

    pub fn as_str(&self) -> &'static str {
        match self {
            Complexity::Simple => "simple",
            Complexity::Medium => "medium",
            Complexity::Complex => "complex",
        }
    }
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Complexity {
    type Err = MetricsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "simple" => Ok(Complexity::Simple),
            "medium" => Ok(Complexity::Medium),
            "complex" => Ok(Complexity::Complex),
            other => Err(MetricsError::malformed(
                "complexity",
                format!("unknown complexity `{other}`"),
            )),
        }
    }
}

/// One evaluated interaction. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehavioralResult {
    pub id: Uuid,
    pub test_name: String,
    pub timestamp: DateTime<Utc>,
    pub persona: String,
    pub complexity: Complexity,
    pub empathy_score: f64,
    pub stress_reduction: f64,
    pub confidence_boost: f64,
    pub trust_building: f64,
    pub therapeutic_effectiveness: f64,
    pub duration_ms: i64,
    pub overall_score: f64,
}

impl BehavioralResult {
    /// Weighted 0-10 effectiveness rollup used when a record is first created.
    pub fn derive_overall(
        empathy_score: f64,
        stress_reduction: f64,
        confidence_boost: f64,
        trust_building: f64,
        therapeutic_effectiveness: f64,
    ) -> f64 {
        let stress = (stress_reduction.abs() / DELTA_SCALE_POINTS * 10.0).min(10.0);
        let confidence = (confidence_boost.max(0.0) / DELTA_SCALE_POINTS * 10.0).min(10.0);

        empathy_score * 0.25
            + stress * 0.20
            + confidence * 0.20
            + trust_building * 0.15
            + therapeutic_effectiveness * 0.20
    }

    pub fn value(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Empathy => self.empathy_score,
            Metric::StressReduction => self.stress_reduction,
            Metric::ConfidenceBoost => self.confidence_boost,
            Metric::Overall => self.overall_score,
        }
    }

    pub fn day(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }

    /// Rejects records the aggregator cannot summarize.
    pub fn validate(&self) -> Result<(), MetricsError> {
        if self.persona.trim().is_empty() {
            return Err(MetricsError::malformed("persona", "empty persona tag"));
        }

        let scalars = [
            ("empathy_score", self.empathy_score),
            ("stress_reduction", self.stress_reduction),
            ("confidence_boost", self.confidence_boost),
            ("trust_building", self.trust_building),
            ("therapeutic_effectiveness", self.therapeutic_effectiveness),
            ("overall_score", self.overall_score),
        ];
        for (field, value) in scalars {
            if !value.is_finite() {
                return Err(MetricsError::malformed(field, format!("{value} is not finite")));
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Empathy,
    StressReduction,
    ConfidenceBoost,
    Overall,
}

impl Metric {
    pub const ALL: [Metric; 4] = [
        Metric::Empathy,
        Metric::StressReduction,
        Metric::ConfidenceBoost,
        Metric::Overall,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Metric::Empathy => "empathy",
            Metric::StressReduction => "stress_reduction",
            Metric::ConfidenceBoost => "confidence_boost",
            Metric::Overall => "overall_score",
        }
    }

    /// Stress reduction is recorded as a negative delta, so lower is better.
    pub fn higher_is_better(&self) -> bool {
        !matches!(self, Metric::StressReduction)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Improving,
    Declining,
    Stable,
    Unknown,
}

impl Trend {
    pub fn label(&self) -> &'static str {
        match self {
            Trend::Improving => "improving",
            Trend::Declining => "declining",
            Trend::Stable => "stable",
            Trend::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub average: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub median: f64,
    pub above_threshold: f64,
    pub trend: Trend,
    pub effective_count: usize,
}

impl MetricSummary {
    pub fn rounded(&self, places: i32) -> MetricSummary {
        MetricSummary {
            average: round_to(self.average, places),
            std_dev: round_to(self.std_dev, places),
            min: round_to(self.min, places),
            max: round_to(self.max, places),
            median: round_to(self.median, places),
            above_threshold: round_to(self.above_threshold, places),
            trend: self.trend,
            effective_count: self.effective_count,
        }
    }
}

/// Per-metric summaries over one window. Every metric is present once the
/// window holds at least one result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summaries {
    pub total_results: usize,
    pub empathy: MetricSummary,
    pub stress_reduction: MetricSummary,
    pub confidence_boost: MetricSummary,
    pub overall_score: MetricSummary,
}

impl Summaries {
    pub fn get(&self, metric: Metric) -> &MetricSummary {
        match metric {
            Metric::Empathy => &self.empathy,
            Metric::StressReduction => &self.stress_reduction,
            Metric::ConfidenceBoost => &self.confidence_boost,
            Metric::Overall => &self.overall_score,
        }
    }

    pub fn rounded(&self, places: i32) -> Summaries {
        Summaries {
            total_results: self.total_results,
            empathy: self.empathy.rounded(places),
            stress_reduction: self.stress_reduction.rounded(places),
            confidence_boost: self.confidence_boost.rounded(places),
            overall_score: self.overall_score.rounded(places),
        }
    }
}

/// Aggregation outcome for a window. `InsufficientData` must be checked by
/// every consumer before touching summaries.
#[derive(Debug, Clone, PartialEq)]
pub enum WindowStats {
    Ready {
        summaries: Summaries,
        persona_breakdown: BTreeMap<String, Breakdown>,
        complexity_breakdown: BTreeMap<Complexity, Breakdown>,
    },
    InsufficientData {
        message: String,
    },
}

impl WindowStats {
    pub fn summaries(&self) -> Option<&Summaries> {
        match self {
            WindowStats::Ready { summaries, .. } => Some(summaries),
            WindowStats::InsufficientData { .. } => None,
        }
    }

    pub fn require_summaries(&self) -> Result<&Summaries, MetricsError> {
        match self {
            WindowStats::Ready { summaries, .. } => Ok(summaries),
            WindowStats::InsufficientData { message } => {
                Err(MetricsError::InsufficientData(message.clone()))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Breakdown {
    pub count: usize,
    pub average_overall: f64,
    pub average_empathy: f64,
    pub effectiveness_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendAnalysis {
    pub direction: Trend,
    pub daily_averages: BTreeMap<NaiveDate, f64>,
    pub recent_average: f64,
    pub data_points: usize,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Excellent,
    Good,
    Warning,
    Critical,
    Error,
}

impl HealthStatus {
    pub fn label(&self) -> &'static str {
        match self {
            HealthStatus::Excellent => "excellent",
            HealthStatus::Good => "good",
            HealthStatus::Warning => "warning",
            HealthStatus::Critical => "critical",
            HealthStatus::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthScore {
    pub score: f64,
    pub status: HealthStatus,
    pub components: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
    Critical,
    Warning,
}

impl AlertLevel {
    pub fn label(&self) -> &'static str {
        match self {
            AlertLevel::Critical => "critical",
            AlertLevel::Warning => "warning",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub level: AlertLevel,
    pub title: String,
    pub message: String,
    pub action: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityIndicator {
    pub name: String,
    pub value: String,
    pub status: HealthStatus,
}

/// Everything a renderer needs for one report, already rounded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardBundle {
    pub generated_at: DateTime<Utc>,
    pub window_days: i64,
    pub total_results: usize,
    pub summaries: Option<Summaries>,
    pub health_score: HealthScore,
    pub alerts: Vec<Alert>,
    pub recommendations: Vec<String>,
    pub indicators: Vec<QualityIndicator>,
    pub trend_analysis: Option<TrendAnalysis>,
    pub persona_breakdown: BTreeMap<String, Breakdown>,
    pub complexity_breakdown: BTreeMap<Complexity, Breakdown>,
    pub latency_p95_ms: Option<f64>,
}

pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complexity_parses_case_insensitively() {
        assert_eq!("Complex".parse::<Complexity>().unwrap(), Complexity::Complex);
        assert_eq!(" simple ".parse::<Complexity>().unwrap(), Complexity::Simple);
    }

    #[test]
    fn unknown_complexity_is_malformed() {
        let err = "extreme".parse::<Complexity>().unwrap_err();
        assert!(matches!(err, MetricsError::MalformedInput { .. }));
    }

    #[test]
    fn derived_overall_stays_on_ten_point_scale() {
        let top = BehavioralResult::derive_overall(10.0, -6.0, 5.0, 10.0, 10.0);
        assert!((top - 10.0).abs() < 1e-9);

        let bottom = BehavioralResult::derive_overall(0.0, 0.0, -1.0, 0.0, 0.0);
        assert_eq!(bottom, 0.0);
    }

    #[test]
    fn validate_rejects_blank_persona_and_nan() {
        let mut result = crate::test_support::result_at(1, 7.5);
        assert!(result.validate().is_ok());

        result.empathy_score = f64::NAN;
        let err = result.validate().unwrap_err();
        assert!(err.to_string().contains("empathy_score"));

        result.empathy_score = 8.0;
        result.persona = "  ".to_string();
        assert!(result.validate().is_err());
    }

    #[test]
    fn round_to_handles_places() {
        assert_eq!(round_to(90.3333, 1), 90.3);
        assert_eq!(round_to(0.666_666, 2), 0.67);
    }
}
