use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::scoring::ScoreSnapshot;
use super::synthesis::{push_unique, ScreeningResult};

/// Confidence at which the top suggestion earns its own next step.
pub const NEXT_STEP_CONFIDENCE: f64 = 0.7;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestedCondition {
    pub condition: String,
    pub confidence: f64,
    pub matched_terms: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum EnrichmentError {
    #[error("symptom description is empty")]
    EmptyDescription,
    #[error("symptom analyzer failed: {0}")]
    Analyzer(String),
}

/// Optional free-text analyzer that annotates a synthesized result.
pub trait SymptomAnalyzer: Send + Sync {
    fn analyze(&self, description: &str) -> Result<Vec<SuggestedCondition>, EnrichmentError>;
}

/// Plain-language description of a result, used as analyzer input.
pub fn describe_symptoms(
    age_months: u16,
    result: &ScreeningResult,
    scores: &ScoreSnapshot,
) -> String {
    let mut text = format!("Child {age_months} months old shows the following indicators:\n");

    for (concern, risk) in &result.risk_levels {
        let _ = writeln!(text, "- {}: {} risk", concern.display_name(), risk.label());
    }
    if scores.autism.critical_count > 0 || scores.autism.total > 0 {
        let _ = writeln!(
            text,
            "- Autism screening: {} critical signs, total score {}",
            scores.autism.critical_count, scores.autism.total
        );
    }
    if scores.adhd.inattention_count > 0 || scores.adhd.hyperactive_count > 0 {
        let _ = writeln!(
            text,
            "- Attention: {} inattention items, {} hyperactivity items",
            scores.adhd.inattention_count, scores.adhd.hyperactive_count
        );
    }
    if scores.speech.total > 0 {
        let _ = writeln!(text, "- Speech and language score {}", scores.speech.total);
    }
    if !result.red_flags.is_empty() {
        let _ = writeln!(text, "- Red flags: {}", result.red_flags.join("; "));
    }
    if !result.positive_indicators.is_empty() {
        let _ = writeln!(
            text,
            "- Positive indicators: {}",
            result.positive_indicators.join("; ")
        );
    }
    if !result.recommendations.is_empty() {
        let _ = writeln!(text, "- Recommendations: {}", result.recommendations.join("; "));
    }

    text
}

/// Run the analyzer and fold its suggestions into the result. Failures are logged and dropped.
pub(crate) fn enrich(
    analyzer: &dyn SymptomAnalyzer,
    age_months: u16,
    scores: &ScoreSnapshot,
    result: &mut ScreeningResult,
) {
    let description = describe_symptoms(age_months, result, scores);
    match analyzer.analyze(&description) {
        Ok(conditions) => {
            debug!(suggestions = conditions.len(), "symptom analysis finished");
            if let Some(top) = conditions
                .first()
                .filter(|top| top.confidence >= NEXT_STEP_CONFIDENCE)
            {
                let step = format!(
                    "Discuss {} indicators with a specialist ({:.0}% match)",
                    top.condition,
                    top.confidence * 100.0
                );
                push_unique(&mut result.next_steps, &step);
            }
            result.supplementary_conditions = conditions;
        }
        Err(err) => warn!(error = %err, "symptom analysis failed; keeping deterministic result"),
    }
}

struct ConditionProfile {
    condition: &'static str,
    phrases: &'static [&'static str],
    keywords: &'static [&'static str],
}

const PHRASE_WEIGHT: f64 = 5.0;
const KEYWORD_WEIGHT: f64 = 2.0;
/// Weight at which a condition reaches full confidence.
const SATURATION: f64 = 12.0;

const PROFILES: &[ConditionProfile] = &[
    ConditionProfile {
        condition: "Autism Spectrum Disorder",
        phrases: &[
            "does not respond to name",
            "avoids eye contact",
            "does not point",
            "repetitive movements",
            "autism spectrum disorder",
        ],
        keywords: &[
            "autism",
            "critical signs",
            "social communication",
            "eye contact",
            "echolalia",
            "sensory",
            "routine",
        ],
    },
    ConditionProfile {
        condition: "ADHD",
        phrases: &[
            "cannot sit still",
            "does not wait",
            "interrupts others",
            "adhd - inattentive type",
            "adhd - hyperactive type",
        ],
        keywords: &[
            "adhd",
            "inattention",
            "hyperactive",
            "hyperactivity",
            "impulsive",
            "distracted",
            "restless",
        ],
    },
    ConditionProfile {
        condition: "Speech and Language Delay",
        phrases: &[
            "speech and language delay",
            "speech-language pathologist",
            "no words",
            "hearing assessment",
        ],
        keywords: &["speech", "language", "words", "vocabulary", "babbling"],
    },
];

/// Deterministic phrase and keyword matcher used when no remote analyzer is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordSymptomAnalyzer;

impl SymptomAnalyzer for KeywordSymptomAnalyzer {
    fn analyze(&self, description: &str) -> Result<Vec<SuggestedCondition>, EnrichmentError> {
        let text = description.trim().to_lowercase();
        if text.is_empty() {
            return Err(EnrichmentError::EmptyDescription);
        }

        let mut suggestions: Vec<SuggestedCondition> = PROFILES
            .iter()
            .filter_map(|profile| {
                let mut weight = 0.0;
                let mut matched_terms = Vec::new();
                for phrase in profile.phrases.iter().filter(|p| text.contains(**p)) {
                    weight += PHRASE_WEIGHT;
                    matched_terms.push((*phrase).to_string());
                }
                for keyword in profile.keywords.iter().filter(|k| text.contains(**k)) {
                    weight += KEYWORD_WEIGHT;
                    matched_terms.push((*keyword).to_string());
                }
                (weight > 0.0).then(|| SuggestedCondition {
                    condition: profile.condition.to_string(),
                    confidence: (weight / SATURATION).min(1.0),
                    matched_terms,
                })
            })
            .collect();

        suggestions.sort_by(|left, right| {
            right
                .confidence
                .total_cmp(&left.confidence)
                .then_with(|| left.condition.cmp(&right.condition))
        });

        Ok(suggestions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_analyzer_ranks_best_match_first() {
        let suggestions = KeywordSymptomAnalyzer
            .analyze("Autism Spectrum Disorder: high risk. Avoids eye contact, 3 critical signs.")
            .expect("analysis succeeds");
        let top = suggestions.first().expect("at least one suggestion");
        assert_eq!(top.condition, "Autism Spectrum Disorder");
        assert!(top.confidence >= NEXT_STEP_CONFIDENCE);
        assert!(top.confidence <= 1.0);
    }

    #[test]
    fn keyword_analyzer_rejects_blank_input() {
        assert!(matches!(
            KeywordSymptomAnalyzer.analyze("   "),
            Err(EnrichmentError::EmptyDescription)
        ));
    }

    #[test]
    fn unrelated_text_yields_no_suggestions() {
        let suggestions = KeywordSymptomAnalyzer
            .analyze("enjoys football and drawing")
            .expect("analysis succeeds");
        assert!(suggestions.is_empty());
    }
}
