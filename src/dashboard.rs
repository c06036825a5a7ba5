use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::aggregate::{self, percentile, within_window};
use crate::alerts;
use crate::config::ScoringConfig;
use crate::db::ResultSource;
use crate::error::MetricsError;
use crate::health;
use crate::models::{round_to, Breakdown, DashboardBundle, TrendAnalysis, WindowStats};
use crate::telemetry::TelemetrySink;

const SUMMARY_PLACES: i32 = 2;

/// Builds one dashboard bundle per call from a single store read.
pub struct Dashboard {
    source: Arc<dyn ResultSource>,
    scoring: ScoringConfig,
    telemetry: Option<Arc<dyn TelemetrySink>>,
}

impl Dashboard {
    pub fn new(source: Arc<dyn ResultSource>, scoring: ScoringConfig) -> Self {
        Self {
            source,
            scoring,
            telemetry: None,
        }
    }

    pub fn with_telemetry(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry = Some(sink);
        self
    }

    pub async fn build(&self, window_days: i64, now: DateTime<Utc>) -> Result<DashboardBundle, MetricsError> {
        let started = std::time::Instant::now();
        let window_days = window_days.max(1);
        let results = self
            .source
            .fetch_results(aggregate::window_start(window_days, now), now)
            .await?;

        // Scores and alerts read the same rounded figures the bundle shows.
        let stats = round_stats(aggregate::summarize(&results, window_days, now, &self.scoring));
        let window = within_window(&results, window_days, now);
        let durations: Vec<f64> = window.iter().map(|result| result.duration_ms as f64).collect();

        let bundle = DashboardBundle {
            generated_at: now,
            window_days,
            total_results: window.len(),
            summaries: stats.summaries().cloned(),
            health_score: health::score(&stats, &self.scoring),
            alerts: alerts::alerts(&stats),
            recommendations: alerts::recommendations(&stats),
            indicators: health::indicators(&stats),
            trend_analysis: aggregate::trend_analysis(&window).map(round_trend),
            latency_p95_ms: percentile(&durations, 0.95),
            persona_breakdown: match &stats {
                WindowStats::Ready { persona_breakdown, .. } => persona_breakdown.clone(),
                WindowStats::InsufficientData { .. } => BTreeMap::new(),
            },
            complexity_breakdown: match stats {
                WindowStats::Ready { complexity_breakdown, .. } => complexity_breakdown,
                WindowStats::InsufficientData { .. } => BTreeMap::new(),
            },
        };

        tracing::info!(
            window_days,
            results = bundle.total_results,
            score = bundle.health_score.score,
            alerts = bundle.alerts.len(),
            "dashboard built"
        );
        self.record_telemetry(&bundle, started.elapsed().as_secs_f64() * 1000.0)
            .await;
        Ok(bundle)
    }

    async fn record_telemetry(&self, bundle: &DashboardBundle, elapsed_ms: f64) {
        let Some(sink) = &self.telemetry else {
            return;
        };

        let mut metadata = Map::new();
        metadata.insert("feature".to_string(), Value::from("dashboard"));
        metadata.insert("task_count".to_string(), Value::from(bundle.total_results));
        if let Err(err) = sink
            .log_event("report_generated", Some(elapsed_ms), metadata)
            .await
        {
            tracing::warn!(error = %err, "failed to record dashboard event");
        }
        if let Err(err) = sink
            .log_metric("health_score", bundle.health_score.score, "score")
            .await
        {
            tracing::warn!(error = %err, "failed to record health score metric");
        }
    }
}

fn round_stats(stats: WindowStats) -> WindowStats {
    match stats {
        WindowStats::Ready {
            summaries,
            persona_breakdown,
            complexity_breakdown,
        } => WindowStats::Ready {
            summaries: summaries.rounded(SUMMARY_PLACES),
            persona_breakdown: round_breakdowns(&persona_breakdown),
            complexity_breakdown: round_breakdowns(&complexity_breakdown),
        },
        insufficient => insufficient,
    }
}

fn round_breakdowns<K: Ord + Clone>(breakdowns: &BTreeMap<K, Breakdown>) -> BTreeMap<K, Breakdown> {
    breakdowns
        .iter()
        .map(|(key, breakdown)| {
            (
                key.clone(),
                Breakdown {
                    count: breakdown.count,
                    average_overall: round_to(breakdown.average_overall, SUMMARY_PLACES),
                    average_empathy: round_to(breakdown.average_empathy, SUMMARY_PLACES),
                    effectiveness_rate: round_to(breakdown.effectiveness_rate, SUMMARY_PLACES),
                },
            )
        })
        .collect()
}

fn round_trend(mut analysis: TrendAnalysis) -> TrendAnalysis {
    analysis.recent_average = round_to(analysis.recent_average, SUMMARY_PLACES);
    for average in analysis.daily_averages.values_mut() {
        *average = round_to(*average, SUMMARY_PLACES);
    }
    analysis
}
