//! Error taxonomy for the metrics pipeline.

/// Failures surfaced by the store and the aggregation pipeline.
///
/// `InsufficientData` is a soft failure: the dashboard turns it into an
/// explicit `error`/`unknown` status instead of a score. The other two
/// propagate to the CLI and end the process with a non-zero exit code.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Result store unavailable: {0}")]
    StoreUnavailable(#[source] sqlx::Error),

    #[error("Malformed input in `{field}`: {reason}")]
    MalformedInput { field: String, reason: String },
}

impl MetricsError {
    pub fn malformed(field: impl Into<String>, reason: impl Into<String>) -> Self {
        MetricsError::MalformedInput {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl From<sqlx::Error> for MetricsError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::ColumnDecode { index, source } => MetricsError::malformed(index, source.to_string()),
            sqlx::Error::ColumnNotFound(column) => MetricsError::malformed(column, "column missing"),
            other => MetricsError::StoreUnavailable(other),
        }
    }
}
