use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use clap::{ArgGroup, Parser, Subcommand};
use serde_json::Value;
use tracing_subscriber::{fmt, EnvFilter};

mod aggregate;
mod alerts;
mod config;
mod dashboard;
mod db;
mod error;
mod generator;
mod health;
mod models;
mod report;
mod server;
mod telemetry;
#[cfg(test)]
mod test_support;
mod validator;

use config::Config;
use dashboard::Dashboard;
use report::ReportFormat;
use telemetry::{SqliteTelemetry, TelemetrySink};
use validator::Validator;

#[derive(Parser)]
#[command(name = "behavioral-metrics")]
#[command(about = "Therapeutic-quality metrics, health scoring and alerts for AI responses", long_about = None)]
struct Cli {
    /// SQLite database holding results and telemetry
    #[arg(
        long,
        global = true,
        env = "BEHAVIORAL_METRICS_DB",
        default_value = "sqlite://behavioral_metrics.db"
    )]
    database_url: String,

    /// TOML file overriding scoring thresholds
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Do not record usage telemetry
    #[arg(long, global = true)]
    no_telemetry: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Insert synthetic behavioral results
    Seed {
        #[arg(long, default_value_t = 50)]
        count: usize,
        #[arg(long, default_value_t = 7)]
        days: i64,
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
    /// Import behavioral results from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Export recent behavioral results to a CSV file
    Export {
        #[arg(long)]
        csv: PathBuf,
        #[arg(long, default_value_t = 30)]
        days: i64,
    },
    /// Aggregate recent results into a health dashboard
    #[command(group(
        ArgGroup::new("view")
            .args(["alerts_only", "health_check"])
            .multiple(false)
    ))]
    Dashboard {
        #[arg(long, default_value_t = 7)]
        days: i64,
        #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
        format: ReportFormat,
        #[arg(long)]
        alerts_only: bool,
        #[arg(long)]
        health_check: bool,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Score AI response text against therapeutic standards
    #[command(group(
        ArgGroup::new("input")
            .args(["response", "batch_file"])
            .required(true)
            .multiple(false)
    ))]
    Validate {
        #[arg(long)]
        response: Option<String>,
        #[arg(long)]
        batch_file: Option<PathBuf>,
        #[arg(long)]
        json: bool,
        #[arg(long, conflicts_with = "batch_file")]
        quick_check: bool,
    },
    /// Serve the HTML dashboard over HTTP, rebuilt on every request
    Serve {
        #[arg(long, default_value_t = 8080)]
        port: u16,
        #[arg(long, default_value_t = 7)]
        days: i64,
    },
    /// Record a telemetry event from another process
    TrackEvent {
        event_type: String,
        #[arg(long)]
        duration_ms: Option<f64>,
        /// JSON object; keys outside the allow-list are dropped
        #[arg(long)]
        metadata: Option<String>,
    },
    /// Print the weekly telemetry KPI report
    TelemetryReport,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        _ => EnvFilter::new("debug"),
    };
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let telemetry_env = std::env::var("BEHAVIORAL_TELEMETRY").ok();
    let config = Config::resolve(
        cli.database_url,
        cli.config.as_ref(),
        cli.no_telemetry,
        telemetry_env.as_deref(),
    )?;

    // Validation is pure text scoring and never touches the store.
    if let Commands::Validate {
        response,
        batch_file,
        json,
        quick_check,
    } = &cli.command
    {
        return run_validate(response.as_deref(), batch_file.as_deref(), *json, *quick_check);
    }

    let pool = db::connect(&config.database_url).await?;
    db::init_db(&pool).await.context("failed to apply schema migrations")?;
    let telemetry = SqliteTelemetry::new(pool.clone(), &config.telemetry);

    match cli.command {
        Commands::InitDb => {
            println!("Schema ready.");
        }
        Commands::Seed { count, days, seed } => {
            let inserted = db::seed(&pool, count, days, seed).await?;
            println!("Inserted {inserted} synthetic results across {days} days.");
        }
        Commands::Import { csv } => {
            let inserted = db::import_csv(&pool, &csv).await?;
            println!("Inserted {inserted} results from {}.", csv.display());
        }
        Commands::Export { csv, days } => {
            let now = Utc::now();
            let written =
                db::export_csv(&pool, aggregate::window_start(days, now), now, &csv).await?;
            println!("Exported {written} results to {}.", csv.display());
        }
        Commands::Dashboard {
            days,
            format,
            alerts_only,
            health_check,
            out,
        } => {
            let mut dashboard = Dashboard::new(Arc::new(pool.clone()), config.scoring.clone());
            if let Some(sink) = telemetry {
                dashboard = dashboard.with_telemetry(Arc::new(sink));
            }
            let bundle = dashboard
                .build(days, Utc::now())
                .await
                .context("failed to build dashboard")?;

            let rendered = if health_check {
                report::health_view(&bundle)
            } else if alerts_only {
                report::alerts_view(&bundle)
            } else {
                report::render(&bundle, format)?
            };

            match out {
                Some(path) => {
                    std::fs::write(&path, rendered)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    println!("Dashboard written to {}.", path.display());
                }
                None => println!("{}", rendered.trim_end()),
            }
        }
        Commands::Serve { port, days } => {
            let mut dashboard = Dashboard::new(Arc::new(pool.clone()), config.scoring.clone());
            if let Some(sink) = telemetry {
                dashboard = dashboard.with_telemetry(Arc::new(sink));
            }
            let state = server::ServerState {
                dashboard: Arc::new(dashboard),
                window_days: days,
            };
            server::serve(state, port).await?;
        }
        Commands::TrackEvent {
            event_type,
            duration_ms,
            metadata,
        } => {
            let Some(sink) = telemetry else {
                println!("Telemetry disabled; event not recorded.");
                return Ok(());
            };
            let metadata = match metadata {
                Some(raw) => match serde_json::from_str::<Value>(&raw).context("invalid metadata JSON")? {
                    Value::Object(map) => map,
                    _ => anyhow::bail!("metadata must be a JSON object"),
                },
                None => Default::default(),
            };
            sink.log_event(&event_type, duration_ms, metadata).await?;
        }
        Commands::TelemetryReport => {
            let Some(sink) = telemetry else {
                println!("Telemetry disabled.");
                return Ok(());
            };
            print!("{}", sink.weekly_report(Utc::now()).await?);
        }
        Commands::Validate { .. } => {}
    }

    Ok(())
}

fn run_validate(
    response: Option<&str>,
    batch_file: Option<&Path>,
    json: bool,
    quick_check: bool,
) -> anyhow::Result<()> {
    let validator = Validator::standard().context("failed to compile validation rules")?;

    if let Some(path) = batch_file {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let report = validator.validate_batch(&raw)?;
        if json {
            println!("{}", serde_json::to_string_pretty(&report)?);
            return Ok(());
        }

        println!("Batch validation: {} responses", report.total_responses);
        let Some(stats) = report.statistics else {
            return Ok(());
        };
        println!("Average empathy score: {:.1}/10", stats.average_empathy);
        println!(
            "Average therapeutic effectiveness: {:.1}/10",
            stats.average_effectiveness
        );
        println!("Success rate: {:.1}%", stats.success_rate * 100.0);
        println!("Status: {}", stats.status.label().to_uppercase());
        println!("Recommendation: {}", stats.status.recommendation());
        return Ok(());
    }

    let text = response.unwrap_or_default();
    if quick_check {
        let passed = validator.quick_check(text);
        println!("{}", if passed { "PASS" } else { "FAIL" });
        if !passed {
            std::process::exit(1);
        }
        return Ok(());
    }

    let assessment = validator.validate(text);
    if json {
        println!("{}", serde_json::to_string_pretty(&assessment)?);
        return Ok(());
    }

    println!("Empathy score: {}/10", assessment.empathy_score);
    println!(
        "Therapeutic effectiveness: {}/10",
        assessment.therapeutic_effectiveness
    );
    if !assessment.issues.is_empty() {
        println!("Issues:");
        for issue in &assessment.issues {
            println!("  - {issue}");
        }
    }
    println!("Recommendations:");
    for recommendation in &assessment.recommendations {
        println!("  - {recommendation}");
    }
    Ok(())
}
