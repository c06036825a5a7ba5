use std::collections::BTreeMap;
use std::fmt::{Display, Write};

use clap::ValueEnum;

use crate::models::{Breakdown, DashboardBundle, Metric, Summaries};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    Json,
    Html,
    Markdown,
    Text,
}

pub fn render(bundle: &DashboardBundle, format: ReportFormat) -> Result<String, serde_json::Error> {
    Ok(match format {
        ReportFormat::Json => serde_json::to_string_pretty(bundle)?,
        ReportFormat::Html => build_html(bundle),
        ReportFormat::Markdown => build_markdown(bundle),
        ReportFormat::Text => build_text(bundle),
    })
}

pub fn health_view(bundle: &DashboardBundle) -> String {
    format!(
        "System Health: {:.1}/100 ({})",
        bundle.health_score.score,
        bundle.health_score.status.label().to_uppercase()
    )
}

pub fn alerts_view(bundle: &DashboardBundle) -> String {
    if bundle.alerts.is_empty() {
        return "No alerts - system is performing well".to_string();
    }

    let mut output = String::new();
    for alert in &bundle.alerts {
        let _ = writeln!(
            output,
            "[{}] {}: {}",
            alert.level.label().to_uppercase(),
            alert.title,
            alert.message
        );
        let _ = writeln!(output, "  Action: {}", alert.action);
    }
    output
}

fn build_text(bundle: &DashboardBundle) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "{}", health_view(bundle));
    let _ = writeln!(
        output,
        "Window: last {} days, {} results",
        bundle.window_days, bundle.total_results
    );
    let _ = writeln!(output);

    for indicator in &bundle.indicators {
        let _ = writeln!(
            output,
            "{:<28}{:>10}  {}",
            indicator.name,
            indicator.value,
            indicator.status.label()
        );
    }
    let _ = writeln!(output);
    let _ = write!(output, "{}", alerts_view(bundle));
    if bundle.alerts.is_empty() {
        let _ = writeln!(output);
    }
    write_text_breakdown(&mut output, "Performance by persona", &bundle.persona_breakdown);
    write_text_breakdown(&mut output, "Performance by complexity", &bundle.complexity_breakdown);
    let _ = writeln!(output);
    let _ = writeln!(output, "Recommendations:");
    for recommendation in &bundle.recommendations {
        let _ = writeln!(output, "- {recommendation}");
    }
    output
}

fn write_text_breakdown<K: Display>(output: &mut String, heading: &str, breakdown: &BTreeMap<K, Breakdown>) {
    if breakdown.is_empty() {
        return;
    }
    let _ = writeln!(output);
    let _ = writeln!(output, "{heading}:");
    for (key, entry) in breakdown {
        let _ = writeln!(output, "  {}:", key.to_string().replace('_', " "));
        let _ = writeln!(output, "    Tests: {}", entry.count);
        let _ = writeln!(output, "    Effectiveness: {:.1}/10", entry.average_overall);
        let _ = writeln!(output, "    Success Rate: {:.1}%", entry.effectiveness_rate * 100.0);
    }
}

fn build_markdown(bundle: &DashboardBundle) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Behavioral Metrics Report");
    let _ = writeln!(
        output,
        "Generated {} for the last {} days ({} results)",
        bundle.generated_at.format("%Y-%m-%d %H:%M UTC"),
        bundle.window_days,
        bundle.total_results
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## System Health");
    let _ = writeln!(
        output,
        "**{:.1}/100** ({})",
        bundle.health_score.score,
        bundle.health_score.status.label()
    );
    for (name, value) in &bundle.health_score.components {
        let _ = writeln!(output, "- {name}: {value:.2}");
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Quality Indicators");
    for indicator in &bundle.indicators {
        let _ = writeln!(
            output,
            "- {}: {} ({})",
            indicator.name,
            indicator.value,
            indicator.status.label()
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Metric Summaries");
    match &bundle.summaries {
        Some(summaries) => write_summary_table(&mut output, summaries),
        None => {
            let _ = writeln!(output, "No results recorded for this window.");
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Alerts");
    if bundle.alerts.is_empty() {
        let _ = writeln!(output, "No active alerts.");
    } else {
        for alert in &bundle.alerts {
            let _ = writeln!(
                output,
                "- **{}** ({}): {}. {}",
                alert.title,
                alert.level.label(),
                alert.message,
                alert.action
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Recommendations");
    for recommendation in &bundle.recommendations {
        let _ = writeln!(output, "- {recommendation}");
    }

    write_breakdown(&mut output, "Persona Breakdown", &bundle.persona_breakdown);
    write_breakdown(&mut output, "Complexity Breakdown", &bundle.complexity_breakdown);

    if let Some(trend) = &bundle.trend_analysis {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Trend Analysis");
        let _ = writeln!(
            output,
            "Overall score is {} ({} to {}, recent average {:.2})",
            trend.direction.label(),
            trend.start,
            trend.end,
            trend.recent_average
        );
        for (day, average) in &trend.daily_averages {
            let _ = writeln!(output, "- {day}: {average:.2}");
        }
    }

    output
}

fn write_summary_table(output: &mut String, summaries: &Summaries) {
    let _ = writeln!(output, "| Metric | Average | Median | Min | Max | Std Dev | Pass Rate | Trend |");
    let _ = writeln!(output, "|---|---|---|---|---|---|---|---|");
    for metric in Metric::ALL {
        let summary = summaries.get(metric);
        let _ = writeln!(
            output,
            "| {} | {:.2} | {:.2} | {:.2} | {:.2} | {:.2} | {:.0}% | {} |",
            metric.name(),
            summary.average,
            summary.median,
            summary.min,
            summary.max,
            summary.std_dev,
            summary.above_threshold * 100.0,
            summary.trend.label()
        );
    }
}

fn write_breakdown<K: Display>(output: &mut String, heading: &str, breakdown: &BTreeMap<K, Breakdown>) {
    if breakdown.is_empty() {
        return;
    }
    let _ = writeln!(output);
    let _ = writeln!(output, "## {heading}");
    for (key, entry) in breakdown {
        let _ = writeln!(
            output,
            "- {}: {} results, overall {:.2}, empathy {:.2}, {:.0}% effective",
            key,
            entry.count,
            entry.average_overall,
            entry.average_empathy,
            entry.effectiveness_rate * 100.0
        );
    }
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

fn build_html(bundle: &DashboardBundle) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "<!DOCTYPE html>");
    let _ = writeln!(output, "<html><head><meta charset=\"utf-8\"><title>Behavioral Metrics Dashboard</title></head>");
    let _ = writeln!(output, "<body>");
    let _ = writeln!(output, "<h1>Behavioral Metrics Dashboard</h1>");
    let _ = writeln!(
        output,
        "<p>Generated {} &middot; last {} days &middot; {} results</p>",
        bundle.generated_at.format("%Y-%m-%d %H:%M UTC"),
        bundle.window_days,
        bundle.total_results
    );
    let _ = writeln!(
        output,
        "<section class=\"health {}\"><h2>System Health</h2><p>{:.1}/100</p></section>",
        bundle.health_score.status.label(),
        bundle.health_score.score
    );

    let _ = writeln!(output, "<section><h2>Quality Indicators</h2><ul>");
    for indicator in &bundle.indicators {
        let _ = writeln!(
            output,
            "<li class=\"{}\">{}: {}</li>",
            indicator.status.label(),
            escape_html(&indicator.name),
            escape_html(&indicator.value)
        );
    }
    let _ = writeln!(output, "</ul></section>");

    let _ = writeln!(output, "<section><h2>Alerts</h2>");
    if bundle.alerts.is_empty() {
        let _ = writeln!(output, "<p>No active alerts.</p>");
    } else {
        let _ = writeln!(output, "<ul>");
        for alert in &bundle.alerts {
            let _ = writeln!(
                output,
                "<li class=\"{}\"><strong>{}</strong>: {}<br><em>{}</em></li>",
                alert.level.label(),
                escape_html(&alert.title),
                escape_html(&alert.message),
                escape_html(&alert.action)
            );
        }
        let _ = writeln!(output, "</ul>");
    }
    let _ = writeln!(output, "</section>");

    let _ = writeln!(output, "<section><h2>Recommendations</h2><ul>");
    for recommendation in &bundle.recommendations {
        let _ = writeln!(output, "<li>{}</li>", escape_html(recommendation));
    }
    let _ = writeln!(output, "</ul></section>");
    let _ = writeln!(output, "</body></html>");
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate;
    use crate::alerts;
    use crate::config::ScoringConfig;
    use crate::health;
    use crate::models::{BehavioralResult, WindowStats};
    use crate::test_support::{fixed_now, result_at};

    fn bundle_for(results: &[BehavioralResult]) -> DashboardBundle {
        let config = ScoringConfig::default();
        let stats = aggregate::summarize(results, 7, fixed_now(), &config);
        let window = aggregate::within_window(results, 7, fixed_now());
        let (persona_breakdown, complexity_breakdown) = match &stats {
            WindowStats::Ready {
                persona_breakdown,
                complexity_breakdown,
                ..
            } => (persona_breakdown.clone(), complexity_breakdown.clone()),
            WindowStats::InsufficientData { .. } => Default::default(),
        };

        DashboardBundle {
            generated_at: fixed_now(),
            window_days: 7,
            total_results: window.len(),
            summaries: stats.summaries().map(|summaries| summaries.rounded(2)),
            health_score: health::score(&stats, &config),
            alerts: alerts::alerts(&stats),
            recommendations: alerts::recommendations(&stats),
            indicators: health::indicators(&stats),
            trend_analysis: aggregate::trend_analysis(&window),
            persona_breakdown,
            complexity_breakdown,
            latency_p95_ms: None,
        }
    }

    fn healthy() -> DashboardBundle {
        let results: Vec<BehavioralResult> = (1..=4)
            .map(|days_ago| {
                let mut result = result_at(days_ago, 8.0);
                result.stress_reduction = -3.0;
                result
            })
            .collect();
        // 0.40*80 + 0.25*85 + 0.20*100 + 0.15*100
        bundle_for(&results)
    }

    #[test]
    fn health_view_uses_upper_case_status() {
        let bundle = healthy();
        assert_eq!(
            health_view(&bundle),
            format!("System Health: {:.1}/100 (GOOD)", bundle.health_score.score)
        );
    }

    #[test]
    fn alerts_view_without_alerts() {
        let bundle = healthy();
        assert!(bundle.alerts.is_empty());
        assert_eq!(alerts_view(&bundle), "No alerts - system is performing well");
    }

    #[test]
    fn empty_window_renders_data_collection_alert() {
        let bundle = bundle_for(&[]);
        let view = alerts_view(&bundle);
        assert!(view.starts_with("[CRITICAL] Data Collection Error: No results found for the last 7 days"));
        assert_eq!(health_view(&bundle), "System Health: 0.0/100 (ERROR)");

        let markdown = render(&bundle, ReportFormat::Markdown).unwrap();
        assert!(markdown.contains("No results recorded for this window."));
    }

    #[test]
    fn markdown_lists_every_metric() {
        let markdown = render(&healthy(), ReportFormat::Markdown).unwrap();
        for metric in Metric::ALL {
            assert!(markdown.contains(&format!("| {} |", metric.name())));
        }
        assert!(markdown.contains("## Persona Breakdown"));
        assert!(markdown.contains("- overwhelmed_professional: 4 results"));
        assert!(markdown.contains("## Trend Analysis"));
    }

    #[test]
    fn json_round_trips_through_serde() {
        let rendered = render(&healthy(), ReportFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(value["total_results"], 4);
        assert_eq!(value["health_score"]["status"], "good");
        assert_eq!(value["complexity_breakdown"]["medium"]["count"], 4);
    }

    #[test]
    fn html_escapes_text() {
        assert_eq!(escape_html("<b>\"a\" & 'b'</b>"), "&lt;b&gt;&quot;a&quot; &amp; &#39;b&#39;&lt;/b&gt;");
        let html = render(&healthy(), ReportFormat::Html).unwrap();
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("System Health"));
    }

    #[test]
    fn text_report_lists_persona_success_rates() {
        let mut results: Vec<BehavioralResult> = (1..=4).map(|days_ago| result_at(days_ago, 8.0)).collect();
        results[0].persona = "caregiver_burnout".to_string();
        results[0].overall_score = 6.0;

        let text = render(&bundle_for(&results), ReportFormat::Text).unwrap();
        assert!(text.contains("Performance by persona:"));
        assert!(text.contains("  caregiver burnout:\n    Tests: 1\n    Effectiveness: 6.0/10\n    Success Rate: 0.0%"));
        assert!(text.contains("  overwhelmed professional:\n    Tests: 3\n    Effectiveness: 8.0/10\n    Success Rate: 100.0%"));
        assert!(text.contains("Performance by complexity:"));
    }
}
