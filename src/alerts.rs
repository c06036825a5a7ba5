use crate::models::{Alert, AlertLevel, Summaries, Trend, WindowStats};

pub const MAX_RECOMMENDATIONS: usize = 5;

/// Which rule fired. Title and action text are fixed per rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertRule {
    DataCollection,
    LowEffectiveness,
    EffectivenessBelowTarget,
    LowEmpathy,
    EmpathyBelowTarget,
    InsufficientStressReduction,
    StressReductionBelowTarget,
    DecliningTrend,
}

struct RuleText {
    rule: AlertRule,
    level: AlertLevel,
    title: &'static str,
    action: &'static str,
}

static RULES: [RuleText; 8] = [
    RuleText {
        rule: AlertRule::DataCollection,
        level: AlertLevel::Critical,
        title: "Data Collection Error",
        action: "Check behavioral metrics collection system",
    },
    RuleText {
        rule: AlertRule::LowEffectiveness,
        level: AlertLevel::Critical,
        title: "Low Therapeutic Effectiveness",
        action: "Immediate review of AI responses and user interactions required",
    },
    RuleText {
        rule: AlertRule::EffectivenessBelowTarget,
        level: AlertLevel::Warning,
        title: "Therapeutic Effectiveness Below Target",
        action: "Review and optimize therapeutic interaction patterns",
    },
    RuleText {
        rule: AlertRule::LowEmpathy,
        level: AlertLevel::Critical,
        title: "Low AI Empathy",
        action: "Review AI response templates and empathy training",
    },
    RuleText {
        rule: AlertRule::EmpathyBelowTarget,
        level: AlertLevel::Warning,
        title: "Empathy Score Needs Improvement",
        action: "Consider empathy enhancement in AI responses",
    },
    RuleText {
        rule: AlertRule::InsufficientStressReduction,
        level: AlertLevel::Critical,
        title: "Insufficient Stress Reduction",
        action: "Analyze and improve stress-reducing interaction patterns",
    },
    RuleText {
        rule: AlertRule::StressReductionBelowTarget,
        level: AlertLevel::Warning,
        title: "Stress Reduction Below Target",
        action: "Optimize calming and supportive interactions",
    },
    RuleText {
        rule: AlertRule::DecliningTrend,
        level: AlertLevel::Warning,
        title: "Declining Effectiveness Trend",
        action: "Investigate recent changes and implement corrective measures",
    },
];

impl AlertRule {
    fn text(&self) -> &'static RuleText {
        // RULES holds exactly one entry per variant.
        RULES
            .iter()
            .find(|entry| entry.rule == *self)
            .unwrap_or(&RULES[0])
    }

    fn alert(&self, message: String) -> Alert {
        let text = self.text();
        Alert {
            level: text.level,
            title: text.title.to_string(),
            message,
            action: text.action.to_string(),
        }
    }
}

/// Alerts in evaluation order: therapeutic, empathy, stress, trend.
pub fn alerts(stats: &WindowStats) -> Vec<Alert> {
    match stats {
        WindowStats::Ready { summaries, .. } => alerts_for(summaries),
        WindowStats::InsufficientData { message } => {
            vec![AlertRule::DataCollection.alert(message.clone())]
        }
    }
}

pub fn alerts_for(summaries: &Summaries) -> Vec<Alert> {
    let mut alerts = Vec::new();

    let effectiveness = summaries.overall_score.average;
    if effectiveness < 6.5 {
        alerts.push(AlertRule::LowEffectiveness.alert(format!(
            "Average effectiveness is {effectiveness:.1}/10, below critical threshold"
        )));
    } else if effectiveness < 7.5 {
        alerts.push(AlertRule::EffectivenessBelowTarget.alert(format!(
            "Average effectiveness is {effectiveness:.1}/10, below 7.5 target"
        )));
    }

    let empathy = summaries.empathy.average;
    if empathy < 7.0 {
        alerts.push(AlertRule::LowEmpathy.alert(format!(
            "AI empathy score is {empathy:.1}/10, below acceptable threshold"
        )));
    } else if empathy < 8.0 {
        alerts.push(AlertRule::EmpathyBelowTarget.alert(format!(
            "AI empathy score is {empathy:.1}/10, below 8.0 target"
        )));
    }

    let stress = summaries.stress_reduction.average;
    if stress > -0.5 {
        alerts.push(AlertRule::InsufficientStressReduction.alert(format!(
            "Average stress reduction is only {stress:.1} points"
        )));
    } else if stress > -1.0 {
        alerts.push(AlertRule::StressReductionBelowTarget.alert(format!(
            "Stress reduction is {stress:.1} points, target is -1.0 or lower"
        )));
    }

    if summaries.overall_score.trend == Trend::Declining {
        alerts.push(AlertRule::DecliningTrend.alert(
            "Therapeutic effectiveness is trending downward".to_string(),
        ));
    }

    alerts
}

pub fn recommendations(stats: &WindowStats) -> Vec<String> {
    let WindowStats::Ready {
        summaries,
        persona_breakdown,
        ..
    } = stats
    else {
        return vec!["Fix data collection system to enable proper monitoring".to_string()];
    };

    let mut recommendations = Vec::new();

    if summaries.empathy.average < 8.0 {
        recommendations.push("Enhance AI empathy through response template improvements".to_string());
    }
    if summaries.stress_reduction.average > -1.5 {
        recommendations.push("Implement additional stress-reduction interaction patterns".to_string());
    }
    if summaries.overall_score.above_threshold < 0.9 {
        recommendations.push("Focus on improving consistency across all user scenarios".to_string());
    }
    for (persona, breakdown) in persona_breakdown {
        if breakdown.effectiveness_rate < 0.8 {
            recommendations.push(format!("Improve {} user experience", persona.replace('_', " ")));
        }
    }

    if recommendations.is_empty() {
        recommendations
            .push("Maintain current high standards and explore advanced scenarios".to_string());
    }

    recommendations.truncate(MAX_RECOMMENDATIONS);
    recommendations
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::aggregate::summarize;
    use crate::config::ScoringConfig;
    use crate::models::{BehavioralResult, Breakdown, MetricSummary};
    use crate::test_support::{fixed_now, result_at};

    fn summary(average: f64, trend: Trend) -> MetricSummary {
        MetricSummary {
            average,
            std_dev: 0.0,
            min: average,
            max: average,
            median: average,
            above_threshold: 1.0,
            trend,
            effective_count: 0,
        }
    }

    fn healthy() -> Summaries {
        Summaries {
            total_results: 20,
            empathy: summary(8.5, Trend::Stable),
            stress_reduction: summary(-1.8, Trend::Stable),
            confidence_boost: summary(1.2, Trend::Stable),
            overall_score: summary(8.2, Trend::Stable),
        }
    }

    fn titles(alerts: &[Alert]) -> Vec<&str> {
        alerts.iter().map(|alert| alert.title.as_str()).collect()
    }

    #[test]
    fn healthy_summaries_raise_nothing() {
        assert!(alerts_for(&healthy()).is_empty());
    }

    #[test]
    fn low_effectiveness_alone_is_one_critical_alert() {
        let mut summaries = healthy();
        summaries.overall_score.average = 6.0;

        let alerts = alerts_for(&summaries);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].level, AlertLevel::Critical);
        assert_eq!(alerts[0].title, "Low Therapeutic Effectiveness");
        assert_eq!(alerts[0].message, "Average effectiveness is 6.0/10, below critical threshold");
    }

    #[test]
    fn alerts_follow_evaluation_order() {
        let mut summaries = healthy();
        summaries.overall_score = summary(7.0, Trend::Declining);
        summaries.empathy.average = 6.5;
        summaries.stress_reduction.average = -0.7;

        let alerts = alerts_for(&summaries);
        assert_eq!(
            titles(&alerts),
            vec![
                "Therapeutic Effectiveness Below Target",
                "Low AI Empathy",
                "Stress Reduction Below Target",
                "Declining Effectiveness Trend",
            ]
        );
        let levels: Vec<AlertLevel> = alerts.iter().map(|alert| alert.level).collect();
        assert_eq!(
            levels,
            vec![
                AlertLevel::Warning,
                AlertLevel::Critical,
                AlertLevel::Warning,
                AlertLevel::Warning
            ]
        );
    }

    #[test]
    fn stress_boundaries_are_half_open() {
        let mut summaries = healthy();
        summaries.stress_reduction.average = -0.5;
        assert_eq!(titles(&alerts_for(&summaries)), vec!["Stress Reduction Below Target"]);

        summaries.stress_reduction.average = -1.0;
        assert!(alerts_for(&summaries).is_empty());

        summaries.stress_reduction.average = -0.4;
        assert_eq!(titles(&alerts_for(&summaries)), vec!["Insufficient Stress Reduction"]);
    }

    #[test]
    fn threshold_edges_select_the_milder_level() {
        let mut summaries = healthy();
        summaries.overall_score.average = 6.5;
        summaries.empathy.average = 7.0;
        let alerts = alerts_for(&summaries);
        assert_eq!(
            titles(&alerts),
            vec!["Therapeutic Effectiveness Below Target", "Empathy Score Needs Improvement"]
        );

        summaries.overall_score.average = 7.5;
        summaries.empathy.average = 8.0;
        assert!(alerts_for(&summaries).is_empty());
    }

    #[test]
    fn insufficient_data_suppresses_other_rules() {
        let stats = WindowStats::InsufficientData {
            message: "No results found for the last 7 days".to_string(),
        };
        let alerts = alerts(&stats);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].title, "Data Collection Error");
        assert_eq!(alerts[0].level, AlertLevel::Critical);
        assert_eq!(alerts[0].message, "No results found for the last 7 days");
    }

    #[test]
    fn every_rule_has_table_text() {
        for rule in [
            AlertRule::DataCollection,
            AlertRule::LowEffectiveness,
            AlertRule::EffectivenessBelowTarget,
            AlertRule::LowEmpathy,
            AlertRule::EmpathyBelowTarget,
            AlertRule::InsufficientStressReduction,
            AlertRule::StressReductionBelowTarget,
            AlertRule::DecliningTrend,
        ] {
            assert!(RULES.iter().any(|entry| entry.rule == rule));
        }
        assert_eq!(AlertRule::LowEmpathy.text().level, AlertLevel::Critical);
        assert_eq!(AlertRule::DecliningTrend.text().title, "Declining Effectiveness Trend");
    }

    #[test]
    fn recommendations_flag_weak_personas_and_cap_at_five() {
        let mut summaries = healthy();
        summaries.empathy.average = 7.0;
        summaries.stress_reduction.average = -1.0;
        summaries.overall_score.above_threshold = 0.5;

        let weak = Breakdown {
            count: 3,
            average_overall: 6.0,
            average_empathy: 6.5,
            effectiveness_rate: 0.3,
        };
        let persona_breakdown: BTreeMap<String, Breakdown> = [
            ("caregiver_burnout".to_string(), weak.clone()),
            ("perfectionist_user".to_string(), weak.clone()),
            ("student_with_adhd".to_string(), weak),
        ]
        .into_iter()
        .collect();

        let stats = WindowStats::Ready {
            summaries,
            persona_breakdown,
            complexity_breakdown: BTreeMap::new(),
        };
        let recommendations = recommendations(&stats);
        assert_eq!(recommendations.len(), MAX_RECOMMENDATIONS);
        assert_eq!(recommendations[3], "Improve caregiver burnout user experience");
    }

    #[test]
    fn healthy_stats_get_maintenance_recommendation() {
        let stats = WindowStats::Ready {
            summaries: healthy(),
            persona_breakdown: BTreeMap::new(),
            complexity_breakdown: BTreeMap::new(),
        };
        assert_eq!(
            recommendations(&stats),
            vec!["Maintain current high standards and explore advanced scenarios".to_string()]
        );
    }

    #[test]
    fn alerts_ignore_result_ordering() {
        let overall = [8.5, 8.0, 7.0, 6.5, 6.0];
        let results: Vec<BehavioralResult> = overall
            .iter()
            .enumerate()
            .map(|(i, score)| {
                let mut result = result_at(5 - i as i64, *score);
                result.empathy_score = 6.8;
                result.stress_reduction = -0.7;
                result.persona = if i % 2 == 0 { "caregiver_burnout" } else { "student_with_adhd" }.to_string();
                result
            })
            .collect();
        let mut reversed = results.clone();
        reversed.reverse();

        let config = ScoringConfig::default();
        let forward = summarize(&results, 7, fixed_now(), &config);
        let backward = summarize(&reversed, 7, fixed_now(), &config);

        let forward_alerts = alerts(&forward);
        assert_eq!(
            titles(&forward_alerts),
            vec![
                "Therapeutic Effectiveness Below Target",
                "Low AI Empathy",
                "Stress Reduction Below Target",
                "Declining Effectiveness Trend",
            ]
        );
        assert_eq!(forward_alerts, alerts(&backward));
        assert_eq!(recommendations(&forward), recommendations(&backward));
    }
}
