use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::config::ScoringConfig;
use crate::models::{
    BehavioralResult, Breakdown, Metric, MetricSummary, Summaries, Trend,
    TrendAnalysis, WindowStats,
};

/// Distinct calendar days required before any trend is reported.
pub const TREND_MIN_DAYS: usize = 3;
/// Dead band around the earlier mean inside which a trend is `stable`.
pub const TREND_DELTA: f64 = 0.2;
pub const EMPATHY_PASS: f64 = 7.5;
pub const OVERALL_PASS: f64 = 7.0;
pub const CONFIDENCE_PASS: f64 = 0.5;

/// Start of the window ending at `now`. Windows reaching past the
/// representable range cover all history.
pub fn window_start(window_days: i64, now: DateTime<Utc>) -> DateTime<Utc> {
    Duration::try_days(window_days.max(1))
        .and_then(|span| now.checked_sub_signed(span))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

pub fn within_window(
    results: &[BehavioralResult],
    window_days: i64,
    now: DateTime<Utc>,
) -> Vec<&BehavioralResult> {
    let start = window_start(window_days, now);
    results
        .iter()
        .filter(|result| result.timestamp >= start && result.timestamp <= now)
        .collect()
}

/// Whether `value` lands on the metric's "good" side of its pass threshold.
pub fn passes(metric: Metric, value: f64, config: &ScoringConfig) -> bool {
    match metric {
        Metric::Empathy => value >= EMPATHY_PASS,
        Metric::StressReduction => value <= config.stress_effective_threshold,
        Metric::ConfidenceBoost => value >= CONFIDENCE_PASS,
        Metric::Overall => value >= OVERALL_PASS,
    }
}

pub fn summarize(
    results: &[BehavioralResult],
    window_days: i64,
    now: DateTime<Utc>,
    config: &ScoringConfig,
) -> WindowStats {
    let window = within_window(results, window_days, now);

    if window.is_empty() {
        return WindowStats::InsufficientData {
            message: format!(
                "No results found for the last {} days",
                window_days.max(1)
            ),
        };
    }

    let summaries = Summaries {
        total_results: window.len(),
        empathy: summarize_metric(&window, Metric::Empathy, config),
        stress_reduction: summarize_metric(&window, Metric::StressReduction, config),
        confidence_boost: summarize_metric(&window, Metric::ConfidenceBoost, config),
        overall_score: summarize_metric(&window, Metric::Overall, config),
    };

    WindowStats::Ready {
        summaries,
        persona_breakdown: breakdown_by(&window, |result| result.persona.clone()),
        complexity_breakdown: breakdown_by(&window, |result| result.complexity),
    }
}

pub fn summarize_metric(
    window: &[&BehavioralResult],
    metric: Metric,
    config: &ScoringConfig,
) -> MetricSummary {
    let values: Vec<f64> = window.iter().map(|result| result.value(metric)).collect();
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let effective_count = values
        .iter()
        .filter(|value| passes(metric, **value, config))
        .count();
    let daily: Vec<f64> = daily_averages(window, metric).into_values().collect();
    // Summation error can push the mean a hair past a constant series.
    let average = if min <= max {
        mean(&values).clamp(min, max)
    } else {
        mean(&values)
    };

    MetricSummary {
        average,
        std_dev: std_dev(&values),
        min,
        max,
        median: median(&values),
        above_threshold: effective_count as f64 / values.len() as f64,
        trend: classify_trend(&daily, metric.higher_is_better()),
        effective_count,
    }
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation.
pub fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let avg = mean(values);
    let variance = values.iter().map(|value| (value - avg).powi(2)).sum::<f64>()
        / values.len() as f64;
    variance.sqrt()
}

pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Nearest-rank percentile: index `floor(n * p)` clamped into the slice.
pub fn percentile(values: &[f64], p: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let index = ((sorted.len() as f64 * p).floor() as usize).min(sorted.len() - 1);
    Some(sorted[index])
}

pub fn daily_averages(window: &[&BehavioralResult], metric: Metric) -> BTreeMap<NaiveDate, f64> {
    let mut days: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();

    for result in window {
        let entry = days.entry(result.day()).or_insert((0.0, 0));
        entry.0 += result.value(metric);
        entry.1 += 1;
    }

    days.into_iter()
        .map(|(day, (total, count))| (day, total / count as f64))
        .collect()
}

/// Classifies ascending per-day averages. Needs `TREND_MIN_DAYS` days so a
/// single noisy day cannot produce a direction.
pub fn classify_trend(daily: &[f64], higher_is_better: bool) -> Trend {
    if daily.len() < TREND_MIN_DAYS {
        return Trend::Unknown;
    }

    let split = daily.len() - TREND_MIN_DAYS;
    let recent = mean(&daily[split..]);
    let earlier = if split > 0 { mean(&daily[..split]) } else { daily[0] };
    let delta = if higher_is_better {
        recent - earlier
    } else {
        earlier - recent
    };

    if delta > TREND_DELTA {
        Trend::Improving
    } else if delta < -TREND_DELTA {
        Trend::Declining
    } else {
        Trend::Stable
    }
}

pub fn breakdown_by<K, F>(window: &[&BehavioralResult], key: F) -> BTreeMap<K, Breakdown>
where
    K: Ord,
    F: Fn(&BehavioralResult) -> K,
{
    let mut groups: BTreeMap<K, Vec<&BehavioralResult>> = BTreeMap::new();
    for &result in window {
        groups.entry(key(result)).or_default().push(result);
    }

    groups
        .into_iter()
        .map(|(group, members)| {
            let overall: Vec<f64> = members.iter().map(|r| r.overall_score).collect();
            let empathy: Vec<f64> = members.iter().map(|r| r.empathy_score).collect();
            let effective = overall.iter().filter(|score| **score >= OVERALL_PASS).count();
            let breakdown = Breakdown {
                count: members.len(),
                average_overall: mean(&overall),
                average_empathy: mean(&empathy),
                effectiveness_rate: effective as f64 / members.len() as f64,
            };
            (group, breakdown)
        })
        .collect()
}

/// Day-level view of the overall score for the dashboard.
pub fn trend_analysis(window: &[&BehavioralResult]) -> Option<TrendAnalysis> {
    let daily_averages = daily_averages(window, Metric::Overall);
    let start = *daily_averages.keys().next()?;
    let end = *daily_averages.keys().next_back()?;
    let scores: Vec<f64> = daily_averages.values().copied().collect();
    let recent = &scores[scores.len().saturating_sub(TREND_MIN_DAYS)..];

    Some(TrendAnalysis {
        direction: classify_trend(&scores, true),
        recent_average: mean(recent),
        data_points: window.len(),
        start,
        end,
        daily_averages,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Complexity;
    use crate::test_support::{fixed_now, result_at};

    fn ten_results_over_five_days() -> Vec<BehavioralResult> {
        let empathy = [6.0, 7.0, 7.0, 7.5, 8.0, 8.5, 8.5, 9.0, 9.5, 9.0];
        let stress = [-1.0, -2.0, -0.5, -1.5, -1.0, -2.5, -0.25, -1.0, -1.5, -0.75];
        let overall = [6.0, 6.5, 7.0, 7.5, 8.0, 8.0, 8.5, 7.0, 9.0, 8.5];

        (0..10)
            .map(|i| {
                let days_ago = 5 - (i as i64 / 2);
                let mut result = result_at(days_ago, overall[i]);
                result.empathy_score = empathy[i];
                result.stress_reduction = stress[i];
                result
            })
            .collect()
    }

    fn ready(stats: WindowStats) -> Summaries {
        match stats {
            WindowStats::Ready { summaries, .. } => summaries,
            WindowStats::InsufficientData { message } => panic!("unexpected: {message}"),
        }
    }

    #[test]
    fn fixture_averages_and_medians_match_hand_computation() {
        let results = ten_results_over_five_days();
        let summaries = ready(summarize(&results, 7, fixed_now(), &ScoringConfig::default()));

        assert_eq!(summaries.total_results, 10);
        assert_eq!(summaries.empathy.average, 8.0);
        assert_eq!(summaries.empathy.median, 8.25);
        assert_eq!(summaries.empathy.min, 6.0);
        assert_eq!(summaries.empathy.max, 9.5);
        assert_eq!(summaries.stress_reduction.average, -1.2);
        assert_eq!(summaries.stress_reduction.median, -1.0);
        assert_eq!(summaries.stress_reduction.effective_count, 9);
        assert_eq!(summaries.stress_reduction.above_threshold, 0.9);
        assert_eq!(summaries.overall_score.average, 7.6);
        assert_eq!(summaries.overall_score.median, 7.75);
        assert_eq!(summaries.overall_score.above_threshold, 0.8);
        assert_eq!(summaries.overall_score.trend, Trend::Improving);
    }

    #[test]
    fn two_distinct_days_yield_unknown_trend() {
        let results: Vec<BehavioralResult> = [(3, 6.0), (3, 6.5), (3, 7.0), (1, 8.0), (1, 8.5), (1, 9.0)]
            .into_iter()
            .map(|(days_ago, score)| result_at(days_ago, score))
            .collect();

        let summaries = ready(summarize(&results, 7, fixed_now(), &ScoringConfig::default()));
        assert_eq!(summaries.overall_score.trend, Trend::Unknown);
        assert_eq!(summaries.empathy.trend, Trend::Unknown);
    }

    #[test]
    fn trend_bands_follow_dead_zone() {
        assert_eq!(classify_trend(&[8.0, 8.0, 7.0, 7.0], true), Trend::Declining);
        assert_eq!(classify_trend(&[7.0, 7.1, 7.2], true), Trend::Stable);
        assert_eq!(classify_trend(&[6.0, 7.0, 7.0], true), Trend::Improving);
        assert_eq!(classify_trend(&[7.0, 9.0], true), Trend::Unknown);
    }

    #[test]
    fn falling_stress_delta_counts_as_improving() {
        assert_eq!(classify_trend(&[-0.5, -1.0, -1.5, -2.0], false), Trend::Improving);
        assert_eq!(classify_trend(&[-2.0, -1.0, -0.5, -0.5], false), Trend::Declining);
    }

    #[test]
    fn empty_window_is_insufficient_data() {
        let results = vec![result_at(40, 8.0)];
        let stats = summarize(&results, 30, fixed_now(), &ScoringConfig::default());
        assert!(matches!(stats, WindowStats::InsufficientData { .. }));
    }

    #[test]
    fn oversized_window_covers_all_history() {
        assert_eq!(window_start(i64::MAX, fixed_now()), DateTime::<Utc>::MIN_UTC);
        assert_eq!(window_start(100_000_000, fixed_now()), DateTime::<Utc>::MIN_UTC);

        let results = vec![result_at(1, 8.0), result_at(4_000, 6.0)];
        let summaries = ready(summarize(&results, 100_000_000, fixed_now(), &ScoringConfig::default()));
        assert_eq!(summaries.total_results, 2);
    }

    #[test]
    fn window_excludes_old_and_future_results() {
        let results = vec![result_at(2, 8.0), result_at(10, 5.0), result_at(-1, 4.0)];
        let window = within_window(&results, 7, fixed_now());
        assert_eq!(window.len(), 1);
        assert_eq!(window[0].overall_score, 8.0);
    }

    #[test]
    fn average_stays_between_min_and_max() {
        let results: Vec<BehavioralResult> = (0..3).map(|_| result_at(1, 0.1)).collect();
        let summaries = ready(summarize(&results, 7, fixed_now(), &ScoringConfig::default()));
        let overall = &summaries.overall_score;
        assert!(overall.min <= overall.average && overall.average <= overall.max);
        assert!(overall.std_dev < 1e-12);
    }

    #[test]
    fn percentile_uses_nearest_rank_without_interpolation() {
        let values: Vec<f64> = (1..=10).map(f64::from).collect();
        assert_eq!(percentile(&values, 0.95), Some(10.0));
        assert_eq!(percentile(&values, 0.5), Some(6.0));
        assert_eq!(percentile(&values, 0.0), Some(1.0));
        assert_eq!(percentile(&values, 1.0), Some(10.0));
        assert_eq!(percentile(&[], 0.95), None);
    }

    #[test]
    fn breakdowns_group_by_persona_and_complexity() {
        let mut results = ten_results_over_five_days();
        for (index, result) in results.iter_mut().enumerate() {
            if index < 4 {
                result.persona = "caregiver_burnout".to_string();
                result.complexity = Complexity::Complex;
            }
        }

        let stats = summarize(&results, 7, fixed_now(), &ScoringConfig::default());
        let WindowStats::Ready {
            persona_breakdown,
            complexity_breakdown,
            ..
        } = stats
        else {
            panic!("expected ready stats");
        };

        let caregiver = &persona_breakdown["caregiver_burnout"];
        assert_eq!(caregiver.count, 4);
        // 6.0, 6.5, 7.0, 7.5
        assert_eq!(caregiver.effectiveness_rate, 0.5);
        assert_eq!(complexity_breakdown[&Complexity::Complex].count, 4);
        assert_eq!(complexity_breakdown[&Complexity::Medium].count, 6);
        assert_eq!(complexity_breakdown[&Complexity::Medium].effectiveness_rate, 1.0);
    }

    #[test]
    fn trend_analysis_reports_daily_averages() {
        let results = ten_results_over_five_days();
        let window = within_window(&results, 7, fixed_now());
        let analysis = trend_analysis(&window).unwrap();

        assert_eq!(analysis.daily_averages.len(), 5);
        assert_eq!(analysis.data_points, 10);
        assert_eq!(analysis.direction, Trend::Improving);
        assert!((analysis.recent_average - 24.5 / 3.0).abs() < 1e-9);
        assert!(analysis.start < analysis.end);
        assert!(trend_analysis(&[]).is_none());
    }
}
