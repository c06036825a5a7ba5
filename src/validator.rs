//! Heuristic scoring of AI response text against therapeutic standards.
//!
//! Every rule lives in [`RuleTable`] so the scoring loop stays generic:
//! keyword groups feed the empathy score, and each [`DimensionRule`] maps
//! its positive/negative cue hits onto a fixed four-way score table.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::MetricsError;
use crate::models::round_to;

const KEYWORD_GROUP_POINTS: f64 = 2.0;
const KEYWORD_CAP: f64 = 8.0;
const PENALTY_POINTS: f64 = 1.5;
const PENALTY_CAP: f64 = 4.0;
const BONUS_POINTS: f64 = 1.0;
const EMPATHY_WEIGHT: f64 = 0.25;
const EMPATHY_ISSUE_BELOW: f64 = 7.0;
const EMPATHY_ADVICE_BELOW: f64 = 8.0;
const QUICK_EMPATHY: f64 = 7.5;
const EFFECTIVE_AT: f64 = 7.0;

pub enum Cue {
    Phrase(&'static str),
    Pattern(Regex),
}

impl Cue {
    fn matches(&self, lowered: &str) -> bool {
        match self {
            Cue::Phrase(phrase) => lowered.contains(phrase),
            Cue::Pattern(pattern) => pattern.is_match(lowered),
        }
    }
}

fn any_match(cues: &[Cue], lowered: &str) -> bool {
    cues.iter().any(|cue| cue.matches(lowered))
}

fn phrases(list: &[&'static str]) -> Vec<Cue> {
    list.iter().copied().map(Cue::Phrase).collect()
}

fn patterns(list: &[&str]) -> Result<Vec<Cue>, regex::Error> {
    list.iter()
        .map(|pattern| Regex::new(pattern).map(Cue::Pattern))
        .collect()
}

/// Scores for the four combinations of positive and negative cue hits.
#[derive(Debug, Clone, Copy)]
pub struct ScoreTable {
    pub positive_only: f64,
    pub both: f64,
    pub negative_only: f64,
    pub neither: f64,
}

impl ScoreTable {
    fn pick(&self, positive: bool, negative: bool) -> f64 {
        match (positive, negative) {
            (true, false) => self.positive_only,
            (true, true) => self.both,
            (false, true) => self.negative_only,
            (false, false) => self.neither,
        }
    }
}

pub struct DimensionRule {
    pub name: &'static str,
    pub weight: f64,
    pub positive: Vec<Cue>,
    pub negative: Vec<Cue>,
    pub scores: ScoreTable,
    pub missing_issue: Option<&'static str>,
    pub negative_issue: Option<&'static str>,
    pub missing_advice: &'static [&'static str],
    pub negative_advice: &'static [&'static str],
}

pub struct RuleTable {
    pub keyword_groups: Vec<(&'static str, Vec<Cue>)>,
    pub penalties: Vec<Cue>,
    pub bonus: Vec<Cue>,
    pub dimensions: Vec<DimensionRule>,
}

impl RuleTable {
    pub fn standard() -> Result<Self, regex::Error> {
        Ok(Self {
            keyword_groups: vec![
                (
                    "validation",
                    phrases(&["understand", "hear you", "makes sense", "valid", "natural", "normal"]),
                ),
                (
                    "support",
                    phrases(&["support", "help", "here for you", "together", "not alone"]),
                ),
                (
                    "encouragement",
                    phrases(&["you can", "you've got", "proud", "progress", "small steps"]),
                ),
                (
                    "compassion",
                    phrases(&["difficult", "challenging", "hard", "tough", "struggle"]),
                ),
                (
                    "hope",
                    phrases(&["better", "improve", "possible", "hope", "future", "tomorrow"]),
                ),
            ],
            penalties: patterns(&[
                r"\bjust\s+(do|try|stop|start)",
                r"you\s+should\s+have",
                r"it'?s\s+not\s+that\s+hard",
                r"everyone\s+(else\s+)?can",
                r"simply|easily|obviously",
                r"you'?re\s+being\s+too",
            ])?,
            bonus: phrases(&["i understand", "that sounds"]),
            dimensions: vec![
                DimensionRule {
                    name: "validation",
                    weight: 0.20,
                    positive: phrases(&[
                        "understand",
                        "makes sense",
                        "hear you",
                        "valid",
                        "natural",
                        "normal",
                        "that sounds",
                        "i can see",
                    ]),
                    negative: phrases(&[
                        "you shouldn't feel",
                        "don't worry about",
                        "it's not that bad",
                        "you're overreacting",
                        "just get over",
                        "move on",
                    ]),
                    scores: ScoreTable {
                        positive_only: 8.0,
                        both: 5.0,
                        negative_only: 2.0,
                        neither: 6.0,
                    },
                    missing_issue: Some("No validation of user experience detected"),
                    negative_issue: Some("Invalidating language detected"),
                    missing_advice: &["Start with validation: 'I can see why you'd feel that way'"],
                    negative_advice: &[],
                },
                DimensionRule {
                    name: "non_judgment",
                    weight: 0.15,
                    positive: phrases(&[
                        "might consider",
                        "could try",
                        "what if",
                        "perhaps",
                        "one option",
                        "you might find",
                        "when you're ready",
                    ]),
                    negative: patterns(&[
                        r"you should have",
                        r"you need to",
                        r"you must",
                        r"wrong",
                        r"bad choice",
                        r"mistake",
                        r"stupid",
                        r"lazy",
                        r"procrastinating",
                        r"excuses",
                    ])?,
                    scores: ScoreTable {
                        positive_only: 9.0,
                        both: 3.0,
                        negative_only: 1.0,
                        neither: 7.0,
                    },
                    missing_issue: None,
                    negative_issue: Some("Judgmental language detected"),
                    missing_advice: &[],
                    negative_advice: &[
                        "Replace 'should' with 'might consider' or 'could try'",
                        "Use non-judgmental language focused on options rather than obligations",
                    ],
                },
                DimensionRule {
                    name: "action_orientation",
                    weight: 0.15,
                    positive: phrases(&[
                        "try",
                        "start",
                        "begin",
                        "take",
                        "consider",
                        "explore",
                        "practice",
                        "experiment",
                        "step",
                    ]),
                    negative: phrases(&[
                        "do all",
                        "everything",
                        "immediately",
                        "right now",
                        "must do",
                        "have to do",
                    ]),
                    scores: ScoreTable {
                        positive_only: 8.0,
                        both: 5.0,
                        negative_only: 3.0,
                        neither: 6.0,
                    },
                    missing_issue: None,
                    negative_issue: Some("Overwhelming action suggestions detected"),
                    missing_advice: &["Include gentle action suggestions: 'You might try...'"],
                    negative_advice: &[],
                },
                DimensionRule {
                    name: "hope",
                    weight: 0.15,
                    positive: phrases(&[
                        "better", "improve", "progress", "possible", "can", "will", "hope", "future",
                        "tomorrow", "next", "grow",
                    ]),
                    negative: phrases(&[
                        "never",
                        "impossible",
                        "hopeless",
                        "can't",
                        "won't work",
                        "no point",
                        "useless",
                        "failed",
                    ]),
                    scores: ScoreTable {
                        positive_only: 9.0,
                        both: 6.0,
                        negative_only: 2.0,
                        neither: 5.0,
                    },
                    missing_issue: None,
                    negative_issue: Some("Despair-inducing language detected"),
                    missing_advice: &["Add hopeful language about progress and possibility"],
                    negative_advice: &[],
                },
                DimensionRule {
                    name: "agency",
                    weight: 0.10,
                    positive: phrases(&[
                        "you decide",
                        "your choice",
                        "up to you",
                        "you know",
                        "you might",
                        "if you want",
                        "when you're ready",
                        "what feels right",
                        "your pace",
                    ]),
                    negative: phrases(&[
                        "you must",
                        "you have to",
                        "you need to",
                        "you should",
                        "i'm telling you",
                        "do exactly",
                        "follow these steps",
                    ]),
                    scores: ScoreTable {
                        positive_only: 9.0,
                        both: 7.0,
                        negative_only: 4.0,
                        neither: 6.0,
                    },
                    missing_issue: None,
                    negative_issue: Some("User agency undermining language detected"),
                    missing_advice: &[
                        "Preserve user choice: 'You decide what feels right'",
                        "Use phrases like 'when you're ready' or 'if you want'",
                    ],
                    negative_advice: &[],
                },
            ],
        })
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DimensionOutcome {
    pub name: String,
    pub positive: bool,
    pub negative: bool,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseAssessment {
    pub empathy_score: f64,
    pub dimensions: Vec<DimensionOutcome>,
    pub therapeutic_effectiveness: f64,
    pub issues: Vec<String>,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Excellent,
    Good,
    NeedsImprovement,
    Critical,
}

impl BatchStatus {
    fn from_scores(average_effectiveness: f64, success_rate: f64) -> Self {
        if average_effectiveness >= 8.5 && success_rate >= 0.95 {
            BatchStatus::Excellent
        } else if average_effectiveness >= 7.5 && success_rate >= 0.90 {
            BatchStatus::Good
        } else if average_effectiveness >= 6.5 && success_rate >= 0.80 {
            BatchStatus::NeedsImprovement
        } else {
            BatchStatus::Critical
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BatchStatus::Excellent => "excellent",
            BatchStatus::Good => "good",
            BatchStatus::NeedsImprovement => "needs_improvement",
            BatchStatus::Critical => "critical",
        }
    }

    pub fn recommendation(&self) -> &'static str {
        match self {
            BatchStatus::Excellent => {
                "Maintain current high standards. Consider sharing best practices with team."
            }
            BatchStatus::Good => {
                "Generally good therapeutic effectiveness. Focus on consistency improvements."
            }
            BatchStatus::NeedsImprovement => {
                "Therapeutic effectiveness below standards. Review empathy patterns and validation techniques."
            }
            BatchStatus::Critical => {
                "Immediate attention required. Comprehensive review of AI response patterns needed."
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchStatistics {
    pub average_empathy: f64,
    pub average_effectiveness: f64,
    pub empathy_range: (f64, f64),
    pub above_threshold: usize,
    pub success_rate: f64,
    pub status: BatchStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub total_responses: usize,
    pub assessments: Vec<ResponseAssessment>,
    /// Absent for an empty batch.
    pub statistics: Option<BatchStatistics>,
}

#[derive(Deserialize)]
struct BatchEntry {
    #[serde(default)]
    ai_response: String,
}

pub struct Validator {
    rules: RuleTable,
}

impl Validator {
    pub fn new(rules: RuleTable) -> Self {
        Self { rules }
    }

    pub fn standard() -> Result<Self, regex::Error> {
        Ok(Self::new(RuleTable::standard()?))
    }

    pub fn empathy_score(&self, lowered: &str) -> f64 {
        let groups = self
            .rules
            .keyword_groups
            .iter()
            .filter(|(_, cues)| any_match(cues, lowered))
            .count();
        let penalties = self
            .rules
            .penalties
            .iter()
            .filter(|cue| cue.matches(lowered))
            .count();

        let mut base = (groups as f64 * KEYWORD_GROUP_POINTS).min(KEYWORD_CAP);
        if any_match(&self.rules.bonus, lowered) {
            base += BONUS_POINTS;
        }
        let penalty = (penalties as f64 * PENALTY_POINTS).min(PENALTY_CAP);
        round_to((base - penalty).clamp(0.0, 10.0), 1)
    }

    pub fn validate(&self, response: &str) -> ResponseAssessment {
        let lowered = response.to_lowercase();
        let empathy_score = self.empathy_score(&lowered);

        let mut issues = Vec::new();
        let mut recommendations = Vec::new();
        if empathy_score < EMPATHY_ISSUE_BELOW {
            issues.push(format!("Low empathy score: {empathy_score}/10"));
        }
        if empathy_score < EMPATHY_ADVICE_BELOW {
            recommendations.push("Add more validating language like 'I understand' or 'That makes sense'".to_string());
            recommendations.push("Use emotional reflection: 'That sounds really challenging'".to_string());
        }

        let mut weighted = empathy_score * EMPATHY_WEIGHT;
        let mut dimensions = Vec::with_capacity(self.rules.dimensions.len());
        for rule in &self.rules.dimensions {
            let positive = any_match(&rule.positive, &lowered);
            let negative = any_match(&rule.negative, &lowered);
            let score = rule.scores.pick(positive, negative);
            weighted += score * rule.weight;

            if !positive {
                issues.extend(rule.missing_issue.map(str::to_string));
                recommendations.extend(rule.missing_advice.iter().map(|advice| advice.to_string()));
            }
            if negative {
                issues.extend(rule.negative_issue.map(str::to_string));
                recommendations.extend(rule.negative_advice.iter().map(|advice| advice.to_string()));
            }

            dimensions.push(DimensionOutcome {
                name: rule.name.to_string(),
                positive,
                negative,
                score,
            });
        }

        let therapeutic_effectiveness = round_to(weighted, 1);
        if therapeutic_effectiveness < EFFECTIVE_AT {
            issues.push(format!(
                "Overall therapeutic effectiveness below threshold: {therapeutic_effectiveness}/10"
            ));
        }
        if recommendations.is_empty() {
            recommendations.push("Response meets therapeutic standards - maintain this quality".to_string());
        }

        ResponseAssessment {
            empathy_score,
            dimensions,
            therapeutic_effectiveness,
            issues,
            recommendations,
        }
    }

    pub fn quick_check(&self, response: &str) -> bool {
        let assessment = self.validate(response);
        assessment.therapeutic_effectiveness >= EFFECTIVE_AT
            && assessment.empathy_score >= QUICK_EMPATHY
            && assessment.issues.is_empty()
    }

    /// Validates a JSON array of `{"ai_response": "..."}` objects.
    pub fn validate_batch(&self, raw_json: &str) -> Result<BatchReport, MetricsError> {
        let entries: Vec<BatchEntry> = serde_json::from_str(raw_json)
            .map_err(|err| MetricsError::malformed("batch_file", err.to_string()))?;
        let assessments: Vec<ResponseAssessment> = entries
            .iter()
            .map(|entry| self.validate(&entry.ai_response))
            .collect();

        Ok(BatchReport {
            total_responses: assessments.len(),
            statistics: batch_statistics(&assessments),
            assessments,
        })
    }
}

fn batch_statistics(assessments: &[ResponseAssessment]) -> Option<BatchStatistics> {
    if assessments.is_empty() {
        return None;
    }
    let count = assessments.len() as f64;
    let empathy: Vec<f64> = assessments.iter().map(|a| a.empathy_score).collect();
    let above_threshold = assessments
        .iter()
        .filter(|a| a.therapeutic_effectiveness >= EFFECTIVE_AT)
        .count();

    let average_effectiveness = round_to(
        assessments.iter().map(|a| a.therapeutic_effectiveness).sum::<f64>() / count,
        1,
    );
    let success_rate = above_threshold as f64 / count;

    Some(BatchStatistics {
        average_empathy: round_to(empathy.iter().sum::<f64>() / count, 1),
        average_effectiveness,
        empathy_range: (
            empathy.iter().copied().fold(f64::INFINITY, f64::min),
            empathy.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        ),
        above_threshold,
        success_rate,
        status: BatchStatus::from_scores(average_effectiveness, success_rate),
    })
}
