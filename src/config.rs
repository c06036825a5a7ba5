use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Utc;
use serde::Deserialize;
use sha2::{Digest, Sha256};

/// Tunable constants behind the stress-related rules. Neither value has a
/// clinical derivation; both are overridable from a TOML file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// A result counts as stress-effective at or below this delta.
    pub stress_effective_threshold: f64,
    /// Reduction magnitude that earns the full stress health component.
    pub stress_health_cap: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            stress_effective_threshold: -0.5,
            stress_health_cap: 3.0,
        }
    }
}

impl ScoringConfig {
    pub fn from_toml_str(raw: &str) -> anyhow::Result<Self> {
        let config: ScoringConfig = toml::from_str(raw).context("invalid scoring config")?;
        anyhow::ensure!(
            config.stress_health_cap > 0.0,
            "stress_health_cap must be positive"
        );
        Ok(config)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml_str(&raw)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryConfig {
    pub enabled: bool,
    pub session_id: String,
}

impl TelemetryConfig {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            session_id: new_session_id(),
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            session_id: new_session_id(),
        }
    }
}

/// 12 hex chars derived from the start time and pid, not linked to the user.
pub fn new_session_id() -> String {
    let seed = format!("{}-{}", Utc::now().to_rfc3339(), std::process::id());
    let digest = Sha256::digest(seed.as_bytes());
    hex::encode(digest)[..12].to_string()
}

/// Resolved runtime configuration, built once in `main` and passed down.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub scoring: ScoringConfig,
    pub telemetry: TelemetryConfig,
}

impl Config {
    pub fn resolve(
        database_url: String,
        scoring_path: Option<&PathBuf>,
        telemetry_opt_out: bool,
        telemetry_env: Option<&str>,
    ) -> anyhow::Result<Self> {
        let scoring = match scoring_path {
            Some(path) => ScoringConfig::load(path)?,
            None => ScoringConfig::default(),
        };
        let env_off = telemetry_env
            .map(|value| value.eq_ignore_ascii_case("off"))
            .unwrap_or(false);

        Ok(Self {
            database_url,
            scoring,
            telemetry: if telemetry_opt_out || env_off {
                TelemetryConfig::disabled()
            } else {
                TelemetryConfig::new(true)
            },
        })
    }
}
