use std::path::Path;
use std::str::FromStr;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use uuid::Uuid;

use crate::error::MetricsError;
use crate::generator::Generator;
use crate::models::{BehavioralResult, Complexity};

/// The only query shape the dashboard needs from a store.
#[async_trait]
pub trait ResultSource: Send + Sync {
    async fn fetch_results(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<BehavioralResult>, MetricsError>;
}

#[async_trait]
impl ResultSource for SqlitePool {
    async fn fetch_results(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<BehavioralResult>, MetricsError> {
        fetch_results(self, start, end).await
    }
}

pub async fn connect(database_url: &str) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)
        .with_context(|| format!("invalid database url `{database_url}`"))?
        .create_if_missing(true);
    // Every in-memory connection is its own database.
    let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await
        .context("failed to open the SQLite result store")?;
    Ok(pool)
}

pub async fn init_db(pool: &SqlitePool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::debug!("schema migrations applied");
    Ok(())
}

pub async fn record_result(pool: &SqlitePool, result: &BehavioralResult) -> Result<bool, MetricsError> {
    result.validate()?;

    let outcome = sqlx::query(
        r#"
        INSERT INTO behavioral_results
        (id, test_name, recorded_at, persona, complexity, empathy_score, stress_reduction,
         confidence_boost, trust_building, therapeutic_effectiveness, duration_ms, overall_score)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .bind(result.id)
    .bind(&result.test_name)
    .bind(result.timestamp)
    .bind(&result.persona)
    .bind(result.complexity.as_str())
    .bind(result.empathy_score)
    .bind(result.stress_reduction)
    .bind(result.confidence_boost)
    .bind(result.trust_building)
    .bind(result.therapeutic_effectiveness)
    .bind(result.duration_ms)
    .bind(result.overall_score)
    .execute(pool)
    .await
    .map_err(MetricsError::StoreUnavailable)?;

    Ok(outcome.rows_affected() > 0)
}

pub async fn fetch_results(
    pool: &SqlitePool,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<BehavioralResult>, MetricsError> {
    let rows = sqlx::query(
        "SELECT id, test_name, recorded_at, persona, complexity, empathy_score, \
         stress_reduction, confidence_boost, trust_building, therapeutic_effectiveness, \
         duration_ms, overall_score \
         FROM behavioral_results \
         WHERE recorded_at >= ?1 AND recorded_at <= ?2 \
         ORDER BY recorded_at",
    )
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await
    .map_err(MetricsError::StoreUnavailable)?;

    let mut results = Vec::with_capacity(rows.len());
    for row in rows {
        results.push(result_from_row(&row)?);
    }

    tracing::debug!(count = results.len(), %start, %end, "fetched behavioral results");
    Ok(results)
}

fn result_from_row(row: &SqliteRow) -> Result<BehavioralResult, MetricsError> {
    let complexity: String = row.try_get("complexity")?;

    let result = BehavioralResult {
        id: row.try_get("id")?,
        test_name: row.try_get("test_name")?,
        timestamp: row.try_get("recorded_at")?,
        persona: row.try_get("persona")?,
        complexity: complexity.parse()?,
        empathy_score: row.try_get("empathy_score")?,
        stress_reduction: row.try_get("stress_reduction")?,
        confidence_boost: row.try_get("confidence_boost")?,
        trust_building: row.try_get("trust_building")?,
        therapeutic_effectiveness: row.try_get("therapeutic_effectiveness")?,
        duration_ms: row.try_get("duration_ms")?,
        overall_score: row.try_get("overall_score")?,
    };
    result.validate()?;
    Ok(result)
}

pub async fn seed(pool: &SqlitePool, count: usize, days: i64, seed: u64) -> anyhow::Result<usize> {
    let results = Generator::new(seed).generate(count, days, Utc::now());
    let mut inserted = 0usize;

    for result in &results {
        if record_result(pool, result).await? {
            inserted += 1;
        }
    }

    tracing::info!(inserted, days, seed, "seeded synthetic behavioral results");
    Ok(inserted)
}

#[derive(serde::Deserialize)]
struct CsvRow {
    id: Option<Uuid>,
    test_name: Option<String>,
    timestamp: DateTime<Utc>,
    persona: String,
    complexity: String,
    empathy_score: f64,
    stress_reduction: f64,
    confidence_boost: f64,
    trust_building: f64,
    therapeutic_effectiveness: f64,
    duration_ms: Option<i64>,
    overall_score: Option<f64>,
}

impl CsvRow {
    fn into_result(self) -> Result<BehavioralResult, MetricsError> {
        let complexity = Complexity::from_str(&self.complexity)?;
        let overall_score = self.overall_score.unwrap_or_else(|| {
            BehavioralResult::derive_overall(
                self.empathy_score,
                self.stress_reduction,
                self.confidence_boost,
                self.trust_building,
                self.therapeutic_effectiveness,
            )
        });

        Ok(BehavioralResult {
            id: self.id.unwrap_or_else(Uuid::new_v4),
            test_name: self
                .test_name
                .unwrap_or_else(|| format!("import_{}_{}", self.persona, complexity)),
            timestamp: self.timestamp,
            persona: self.persona,
            complexity,
            empathy_score: self.empathy_score,
            stress_reduction: self.stress_reduction,
            confidence_boost: self.confidence_boost,
            trust_building: self.trust_building,
            therapeutic_effectiveness: self.therapeutic_effectiveness,
            duration_ms: self.duration_ms.unwrap_or(0),
            overall_score,
        })
    }
}

pub async fn import_csv(pool: &SqlitePool, csv_path: &Path) -> anyhow::Result<usize> {
    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut inserted = 0usize;

    for (line, row) in reader.deserialize::<CsvRow>().enumerate() {
        let row = row.with_context(|| format!("invalid CSV record {}", line + 1))?;
        let result = row
            .into_result()
            .with_context(|| format!("invalid CSV record {}", line + 1))?;

        if record_result(pool, &result).await? {
            inserted += 1;
        }
    }

    tracing::info!(inserted, path = %csv_path.display(), "imported behavioral results");
    Ok(inserted)
}

pub async fn export_csv(
    pool: &SqlitePool,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    csv_path: &Path,
) -> anyhow::Result<usize> {
    let results = fetch_results(pool, start, end).await?;
    let mut writer = csv::Writer::from_path(csv_path)
        .with_context(|| format!("failed to create {}", csv_path.display()))?;

    for result in &results {
        writer.serialize(result)?;
    }
    writer.flush()?;

    Ok(results.len())
}
