mod policy;

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::catalog::presentation_order;
use super::domain::{Category, Question, ResponseSet};
use super::enrichment::SuggestedCondition;
use super::progression::ADHD_MIN_AGE_MONTHS;
use super::scoring::{performance_impact, QuestionLookup, ScoreSnapshot};
use policy::{Finding, ADHD_HIGH_RISK_COUNT, SPEECH_SIGNIFICANT_TOTAL};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Concern {
    Autism,
    AdhdInattention,
    AdhdHyperactive,
    SpeechDelay,
}

impl Concern {
    pub const fn label(self) -> &'static str {
        match self {
            Concern::Autism => "autism",
            Concern::AdhdInattention => "adhd_inattention",
            Concern::AdhdHyperactive => "adhd_hyperactive",
            Concern::SpeechDelay => "speech_delay",
        }
    }

    pub const fn display_name(self) -> &'static str {
        match self {
            Concern::Autism => "Autism Spectrum Disorder",
            Concern::AdhdInattention => "ADHD - Inattentive Type",
            Concern::AdhdHyperactive => "ADHD - Hyperactive Type",
            Concern::SpeechDelay => "Speech and Language Delay",
        }
    }
}

/// Autism uses low/medium/high, speech uses moderate/significant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Moderate,
    Significant,
}

impl RiskLevel {
    pub const fn label(self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Moderate => "moderate",
            RiskLevel::Significant => "significant",
        }
    }

    /// Shared 1-3 scale across both vocabularies.
    pub const fn severity(self) -> u8 {
        match self {
            RiskLevel::Low => 1,
            RiskLevel::Medium | RiskLevel::Moderate => 2,
            RiskLevel::High | RiskLevel::Significant => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallRisk {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Urgent,
    Soon,
    Routine,
}

impl Urgency {
    pub const fn overall_risk(self) -> OverallRisk {
        match self {
            Urgency::Urgent => OverallRisk::High,
            Urgency::Soon => OverallRisk::Medium,
            Urgency::Routine => OverallRisk::Low,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreeningSummary {
    pub primary_issue: String,
    pub overall_risk: OverallRisk,
    pub confidence: Confidence,
    pub urgency: Urgency,
}

/// Clinical-style outcome of a completed screening. Immutable once stored on a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreeningResult {
    pub primary_concern: Option<Concern>,
    pub secondary_concern: Option<Concern>,
    pub risk_levels: BTreeMap<Concern, RiskLevel>,
    pub overall_risk: OverallRisk,
    pub urgency: Urgency,
    pub confidence: Confidence,
    pub red_flags: Vec<String>,
    pub positive_indicators: Vec<String>,
    pub recommendations: Vec<String>,
    pub next_steps: Vec<String>,
    pub summary: ScreeningSummary,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub supplementary_conditions: Vec<SuggestedCondition>,
    pub answered_count: usize,
}

impl ScreeningResult {
    pub fn has_concern(&self) -> bool {
        self.primary_concern.is_some()
    }
}

/// Build the final result from the frozen response set and scores.
pub fn synthesize<L>(
    age_months: u16,
    responses: &ResponseSet,
    scores: &ScoreSnapshot,
    questions: &L,
) -> ScreeningResult
where
    L: QuestionLookup + ?Sized,
{
    let impact = performance_impact(responses, questions);
    let findings = policy::evaluate_findings(age_months, scores, impact);
    let answered = responses.len();

    let mut risk_levels = BTreeMap::new();
    let mut recommendations = Vec::new();
    let mut next_steps = Vec::new();

    let urgency = policy::urgency(&findings);
    if let Some(step) = policy::urgency_step(urgency) {
        push_unique(&mut next_steps, step);
    }

    for finding in &findings {
        risk_levels.insert(finding.concern, finding.risk);
        let guidance = policy::guidance(*finding);
        for text in guidance.recommendations {
            push_unique(&mut recommendations, text);
        }
        for text in guidance.next_steps {
            push_unique(&mut next_steps, text);
        }
    }

    if findings.is_empty() {
        push_unique(&mut recommendations, policy::TYPICAL_RECOMMENDATION);
        push_unique(&mut next_steps, policy::TYPICAL_NEXT_STEP);
    }

    let primary_concern = findings.first().map(|finding| finding.concern);
    let secondary_concern = findings.get(1).map(|finding| finding.concern);
    let confidence = policy::confidence(&findings, answered);
    let overall_risk = urgency.overall_risk();

    let summary = ScreeningSummary {
        primary_issue: primary_concern
            .map(|concern| concern.display_name().to_string())
            .unwrap_or_else(|| "No significant concerns".to_string()),
        overall_risk,
        confidence,
        urgency,
    };

    ScreeningResult {
        primary_concern,
        secondary_concern,
        risk_levels,
        overall_risk,
        urgency,
        confidence,
        red_flags: red_flags(responses, scores, questions),
        positive_indicators: positive_indicators(age_months, responses, scores, questions, &findings),
        recommendations,
        next_steps,
        summary,
        supplementary_conditions: Vec::new(),
        answered_count: answered,
    }
}

fn red_flags<L>(responses: &ResponseSet, scores: &ScoreSnapshot, questions: &L) -> Vec<String>
where
    L: QuestionLookup + ?Sized,
{
    let mut critical: Vec<&Question> = responses
        .iter()
        .filter_map(|(id, recorded)| {
            questions
                .resolve(id)
                .filter(|question| question.is_critical)
                .filter(|question| question.is_negative_answer(&recorded.value))
        })
        .collect();
    critical.sort_by(|left, right| presentation_order(left, right));

    let mut flags: Vec<String> = critical
        .into_iter()
        .map(|question| format!("Critical sign: {}", question.text))
        .collect();

    if scores.adhd.inattention_count >= ADHD_HIGH_RISK_COUNT {
        flags.push(format!(
            "Frequent inattention symptoms ({} items at or above threshold)",
            scores.adhd.inattention_count
        ));
    }
    if scores.adhd.hyperactive_count >= ADHD_HIGH_RISK_COUNT {
        flags.push(format!(
            "Frequent hyperactive or impulsive symptoms ({} items at or above threshold)",
            scores.adhd.hyperactive_count
        ));
    }
    if scores.speech.total >= SPEECH_SIGNIFICANT_TOTAL {
        flags.push("Marked speech and language delay indicators".to_string());
    }

    flags
}

fn positive_indicators<L>(
    age_months: u16,
    responses: &ResponseSet,
    scores: &ScoreSnapshot,
    questions: &L,
    findings: &[Finding],
) -> Vec<String>
where
    L: QuestionLookup + ?Sized,
{
    let answered: BTreeSet<Category> = responses
        .keys()
        .filter_map(|id| questions.resolve(id))
        .map(|question| question.category)
        .collect();

    let mut indicators = Vec::new();
    if findings.is_empty() {
        indicators.push("Typical development for age".to_string());
    }
    if answered.contains(&Category::Autism)
        && scores.autism.critical_count == 0
        && scores.autism.total < 3
    {
        indicators.push("Good social communication skills".to_string());
    }
    let adhd_answered = answered.contains(&Category::AdhdInattention)
        || answered.contains(&Category::AdhdHyperactive);
    if age_months >= ADHD_MIN_AGE_MONTHS
        && adhd_answered
        && scores.adhd.inattention_count < 3
        && scores.adhd.hyperactive_count < 3
    {
        indicators.push("Age-appropriate attention span".to_string());
    }
    if answered.contains(&Category::Speech) && scores.speech.total < 4 {
        indicators.push("Language development on track".to_string());
    }

    indicators
}

pub(crate) fn push_unique(target: &mut Vec<String>, text: &str) {
    if !target.iter().any(|existing| existing == text) {
        target.push(text.to_string());
    }
}
