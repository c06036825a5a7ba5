//! Privacy-conscious usage telemetry.
//!
//! Only aggregatable values are kept: metadata is filtered through an
//! allow-list before it reaches the store, and sessions are identified by a
//! short hash rather than anything user-derived.

use std::collections::BTreeSet;
use std::fmt::Write;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde_json::{Map, Value};
use sqlx::sqlite::SqlitePool;
use sqlx::Row;

use crate::aggregate::{percentile, window_start};
use crate::config::TelemetryConfig;
use crate::error::MetricsError;

pub const SAFE_METADATA_KEYS: [&str; 6] = [
    "task_count",
    "energy_level",
    "phase",
    "feature",
    "error_type",
    "correct",
];

/// Destination for telemetry. Components receive one at construction.
#[async_trait]
pub trait TelemetrySink: Send + Sync {
    async fn log_event(
        &self,
        event_type: &str,
        duration_ms: Option<f64>,
        metadata: Map<String, Value>,
    ) -> Result<(), MetricsError>;

    async fn log_metric(&self, metric_name: &str, value: f64, unit: &str) -> Result<(), MetricsError>;
}

pub fn sanitize_metadata(metadata: Map<String, Value>) -> Map<String, Value> {
    metadata
        .into_iter()
        .filter(|(key, _)| SAFE_METADATA_KEYS.contains(&key.as_str()))
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThroughputDelta {
    pub this_week: i64,
    pub last_week: i64,
    pub delta_percent: f64,
}

pub struct SqliteTelemetry {
    pool: SqlitePool,
    session_id: String,
}

impl SqliteTelemetry {
    /// `None` when the user has opted out.
    pub fn new(pool: SqlitePool, config: &TelemetryConfig) -> Option<Self> {
        config.enabled.then(|| Self {
            pool,
            session_id: config.session_id.clone(),
        })
    }

    async fn record_event(
        &self,
        event_type: &str,
        duration_ms: Option<f64>,
        metadata: Map<String, Value>,
        at: DateTime<Utc>,
    ) -> Result<(), MetricsError> {
        let metadata = Value::Object(sanitize_metadata(metadata)).to_string();
        sqlx::query(
            "INSERT INTO telemetry_events (session_id, event_type, duration_ms, metadata, recorded_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&self.session_id)
        .bind(event_type)
        .bind(duration_ms)
        .bind(metadata)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(MetricsError::StoreUnavailable)?;
        Ok(())
    }

    async fn count_events(
        &self,
        event_type: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<i64, MetricsError> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS total FROM telemetry_events \
             WHERE event_type = ?1 AND recorded_at > ?2 AND recorded_at <= ?3",
        )
        .bind(event_type)
        .bind(start)
        .bind(end)
        .fetch_one(&self.pool)
        .await
        .map_err(MetricsError::StoreUnavailable)?;
        Ok(row.try_get("total")?)
    }

    async fn event_days(&self, event_type: &str, since: DateTime<Utc>) -> Result<BTreeSet<NaiveDate>, MetricsError> {
        let rows = sqlx::query(
            "SELECT recorded_at FROM telemetry_events WHERE event_type = ?1 AND recorded_at > ?2",
        )
        .bind(event_type)
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(MetricsError::StoreUnavailable)?;

        let mut days = BTreeSet::new();
        for row in rows {
            let at: DateTime<Utc> = row.try_get("recorded_at")?;
            days.insert(at.date_naive());
        }
        Ok(days)
    }

    /// 95th percentile of `capture_task` durations over the last `days`.
    pub async fn capture_latency_p95(&self, days: i64, now: DateTime<Utc>) -> Result<f64, MetricsError> {
        let rows = sqlx::query(
            "SELECT duration_ms FROM telemetry_events \
             WHERE event_type = 'capture_task' AND duration_ms IS NOT NULL AND recorded_at > ?1",
        )
        .bind(window_start(days, now))
        .fetch_all(&self.pool)
        .await
        .map_err(MetricsError::StoreUnavailable)?;

        let mut durations = Vec::with_capacity(rows.len());
        for row in rows {
            durations.push(row.try_get::<f64, _>("duration_ms")?);
        }
        Ok(percentile(&durations, 0.95).unwrap_or(0.0))
    }

    /// Week-over-week change in completed tasks.
    pub async fn throughput_delta(&self, now: DateTime<Utc>) -> Result<ThroughputDelta, MetricsError> {
        let week_ago = now - Duration::days(7);
        let this_week = self.count_events("complete_task", week_ago, now).await?;
        let last_week = self
            .count_events("complete_task", now - Duration::days(14), week_ago)
            .await?;

        Ok(ThroughputDelta {
            this_week,
            last_week,
            delta_percent: (this_week - last_week) as f64 / last_week.max(1) as f64 * 100.0,
        })
    }

    /// Share of tagged contexts the user confirmed as correct, in percent.
    pub async fn context_accuracy(&self) -> Result<f64, MetricsError> {
        let row = sqlx::query(
            "SELECT \
               (SELECT COUNT(*) FROM telemetry_events WHERE event_type = 'context_tagged') AS total, \
               (SELECT COUNT(*) FROM telemetry_events WHERE event_type = 'context_feedback' \
                  AND json_extract(metadata, '$.correct') = 1) AS correct",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(MetricsError::StoreUnavailable)?;

        let total: i64 = row.try_get("total")?;
        let correct: i64 = row.try_get("correct")?;
        Ok(correct as f64 / total.max(1) as f64 * 100.0)
    }

    /// Percent of task days in the last 30 that also had a reflection.
    pub async fn reflection_adherence(&self, now: DateTime<Utc>) -> Result<f64, MetricsError> {
        let since = now - Duration::days(30);
        let task_days = self.event_days("complete_task", since).await?;
        let reflection_days = self.event_days("daily_reflection", since).await?;
        Ok(reflection_days.len() as f64 / task_days.len().max(1) as f64 * 100.0)
    }

    pub async fn weekly_report(&self, now: DateTime<Utc>) -> Result<String, MetricsError> {
        let capture_p95 = self.capture_latency_p95(7, now).await?;
        let throughput = self.throughput_delta(now).await?;
        let context_accuracy = self.context_accuracy().await?;
        let reflection_adherence = self.reflection_adherence(now).await?;

        let sessions = sqlx::query(
            "SELECT COUNT(DISTINCT session_id) AS sessions, COUNT(*) AS events, \
             AVG(duration_ms) AS avg_duration \
             FROM telemetry_events WHERE recorded_at > ?1",
        )
        .bind(now - Duration::days(7))
        .fetch_one(&self.pool)
        .await
        .map_err(MetricsError::StoreUnavailable)?;
        let session_count: i64 = sessions.try_get("sessions")?;
        let event_count: i64 = sessions.try_get("events")?;
        let avg_duration: Option<f64> = sessions.try_get("avg_duration")?;

        let mut output = String::new();
        let _ = writeln!(output, "# Weekly Telemetry Report");
        let _ = writeln!(output, "Generated: {}", now.format("%Y-%m-%d %H:%M"));
        let _ = writeln!(output);
        let _ = writeln!(output, "## Performance");
        let _ = writeln!(output, "- Capture latency (P95): {capture_p95:.1}ms");
        let _ = writeln!(
            output,
            "- Task throughput: {} tasks ({:+.1}% WoW)",
            throughput.this_week, throughput.delta_percent
        );
        let _ = writeln!(output, "- Context accuracy: {context_accuracy:.1}%");
        let _ = writeln!(output, "- Reflection adherence: {reflection_adherence:.1}%");
        let _ = writeln!(output);
        let _ = writeln!(output, "## Session Activity");
        let _ = writeln!(output, "- Active sessions: {session_count}");
        let _ = writeln!(output, "- Total events: {event_count}");
        let _ = writeln!(output, "- Avg event duration: {:.1}ms", avg_duration.unwrap_or(0.0));

        Ok(output)
    }
}

#[async_trait]
impl TelemetrySink for SqliteTelemetry {
    async fn log_event(
        &self,
        event_type: &str,
        duration_ms: Option<f64>,
        metadata: Map<String, Value>,
    ) -> Result<(), MetricsError> {
        self.record_event(event_type, duration_ms, metadata, Utc::now()).await
    }

    async fn log_metric(&self, metric_name: &str, value: f64, unit: &str) -> Result<(), MetricsError> {
        sqlx::query(
            "INSERT INTO telemetry_metrics (metric_name, value, unit, recorded_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(metric_name)
        .bind(value)
        .bind(unit)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(MetricsError::StoreUnavailable)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::db;
    use crate::test_support::fixed_now;

    async fn telemetry() -> SqliteTelemetry {
        let pool = db::connect("sqlite::memory:").await.unwrap();
        db::init_db(&pool).await.unwrap();
        SqliteTelemetry::new(pool, &TelemetryConfig::new(true)).unwrap()
    }

    fn metadata(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[test]
    fn sanitize_drops_unlisted_keys() {
        let cleaned = sanitize_metadata(metadata(json!({
            "task_count": 3,
            "task_title": "call my therapist",
            "feature": "capture",
        })));
        assert_eq!(cleaned.len(), 2);
        assert!(!cleaned.contains_key("task_title"));
    }

    #[tokio::test]
    async fn disabled_config_builds_no_sink() {
        let pool = db::connect("sqlite::memory:").await.unwrap();
        assert!(SqliteTelemetry::new(pool, &TelemetryConfig::disabled()).is_none());
    }

    #[tokio::test]
    async fn capture_p95_uses_nearest_rank() {
        let sink = telemetry().await;
        for duration in 1..=20 {
            sink.record_event("capture_task", Some(duration as f64 * 10.0), Map::new(), fixed_now() - Duration::hours(1))
                .await
                .unwrap();
        }
        sink.record_event("capture_task", Some(9_999.0), Map::new(), fixed_now() - Duration::days(9))
            .await
            .unwrap();

        // floor(20 * 0.95) = 19 -> the largest of the recent durations
        assert_eq!(sink.capture_latency_p95(7, fixed_now()).await.unwrap(), 200.0);
    }

    #[tokio::test]
    async fn throughput_compares_adjacent_weeks() {
        let sink = telemetry().await;
        for _ in 0..6 {
            sink.record_event("complete_task", None, Map::new(), fixed_now() - Duration::days(2))
                .await
                .unwrap();
        }
        for _ in 0..4 {
            sink.record_event("complete_task", None, Map::new(), fixed_now() - Duration::days(10))
                .await
                .unwrap();
        }

        let delta = sink.throughput_delta(fixed_now()).await.unwrap();
        assert_eq!(delta.this_week, 6);
        assert_eq!(delta.last_week, 4);
        assert_eq!(delta.delta_percent, 50.0);
    }

    #[tokio::test]
    async fn accuracy_and_adherence_are_percentages() {
        let sink = telemetry().await;
        let now = fixed_now();
        for _ in 0..4 {
            sink.record_event("context_tagged", None, Map::new(), now).await.unwrap();
        }
        sink.record_event("context_feedback", None, metadata(json!({"correct": 1})), now)
            .await
            .unwrap();
        sink.record_event("context_feedback", None, metadata(json!({"correct": 0})), now)
            .await
            .unwrap();
        assert_eq!(sink.context_accuracy().await.unwrap(), 25.0);

        for days_ago in [1, 2, 3, 4] {
            sink.record_event("complete_task", None, Map::new(), now - Duration::days(days_ago))
                .await
                .unwrap();
        }
        sink.record_event("daily_reflection", None, Map::new(), now - Duration::days(1))
            .await
            .unwrap();
        assert_eq!(sink.reflection_adherence(now).await.unwrap(), 25.0);
    }

    #[tokio::test]
    async fn weekly_report_lists_every_kpi() {
        let sink = telemetry().await;
        sink.log_event("capture_task", Some(120.0), Map::new()).await.unwrap();
        sink.log_metric("health_score", 86.8, "score").await.unwrap();

        let report = sink.weekly_report(Utc::now()).await.unwrap();
        assert!(report.contains("Capture latency (P95): 120.0ms"));
        assert!(report.contains("Active sessions: 1"));
        assert!(report.contains("Reflection adherence"));
    }
}
