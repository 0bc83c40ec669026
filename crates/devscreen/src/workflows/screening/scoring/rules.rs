use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::super::domain::{normalize_key, AnswerValue, Category, Question};
use super::ScoreSnapshot;

/// Clinical item threshold on the 0-3 ADHD rating scale.
pub(crate) const ADHD_ITEM_THRESHOLD: f64 = 2.0;

/// Rating at or above which a performance question signals functional impact.
pub(crate) const PERFORMANCE_IMPACT_THRESHOLD: f64 = 4.0;

/// Per-question contribution rule. A question carries exactly one mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ScoringRule {
    /// Answer value mapped to points; unmapped answers contribute nothing.
    ValueMap { points: BTreeMap<String, u32> },
    /// Numeric answer bucketed into inclusive ranges. First matching range wins.
    Ranges { ranges: Vec<RangePoints> },
    /// Fixed points once a numeric answer reaches `at_least`.
    Threshold { at_least: f64, points: u32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangePoints {
    pub min: f64,
    pub max: f64,
    pub points: u32,
}

impl ScoringRule {
    pub fn contribution(&self, answer: &AnswerValue) -> u32 {
        match self {
            ScoringRule::ValueMap { points } => {
                let key = answer.key();
                points
                    .iter()
                    .find(|(candidate, _)| normalize_key(candidate) == key)
                    .map(|(_, points)| *points)
                    .unwrap_or(0)
            }
            ScoringRule::Ranges { ranges } => answer
                .as_number()
                .and_then(|value| {
                    ranges
                        .iter()
                        .find(|range| value >= range.min && value <= range.max)
                })
                .map(|range| range.points)
                .unwrap_or(0),
            ScoringRule::Threshold { at_least, points } => match answer.as_number() {
                Some(value) if value >= *at_least => *points,
                _ => 0,
            },
        }
    }
}

/// Snapshot slot a tally writes into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Counter {
    AutismTotal,
    AutismCritical,
    Inattention,
    Hyperactive,
    SpeechTotal,
}

/// How a category's answers aggregate into the snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Tally {
    /// Adds the question's scoring-rule contribution.
    Sum(Counter),
    /// Counts critical questions answered with their clinically-negative value.
    CriticalFlag(Counter),
    /// Counts items whose numeric answer reaches the threshold.
    ThresholdCount { counter: Counter, at_least: f64 },
}

const AUTISM_TALLIES: [Tally; 2] = [
    Tally::Sum(Counter::AutismTotal),
    Tally::CriticalFlag(Counter::AutismCritical),
];
const INATTENTION_TALLIES: [Tally; 1] = [Tally::ThresholdCount {
    counter: Counter::Inattention,
    at_least: ADHD_ITEM_THRESHOLD,
}];
const HYPERACTIVE_TALLIES: [Tally; 1] = [Tally::ThresholdCount {
    counter: Counter::Hyperactive,
    at_least: ADHD_ITEM_THRESHOLD,
}];
const SPEECH_TALLIES: [Tally; 1] = [Tally::Sum(Counter::SpeechTotal)];

pub(crate) fn tallies_for(category: Category) -> &'static [Tally] {
    match category {
        Category::Autism => &AUTISM_TALLIES,
        Category::AdhdInattention => &INATTENTION_TALLIES,
        Category::AdhdHyperactive => &HYPERACTIVE_TALLIES,
        Category::Speech => &SPEECH_TALLIES,
        Category::Performance | Category::General => &[],
    }
}

impl Tally {
    pub(crate) fn apply(
        &self,
        question: &Question,
        answer: &AnswerValue,
        snapshot: &mut ScoreSnapshot,
    ) {
        let (counter, increment) = match *self {
            Tally::Sum(counter) => (counter, question.contribution(answer)),
            Tally::CriticalFlag(counter) => (
                counter,
                u32::from(question.is_critical && question.is_negative_answer(answer)),
            ),
            Tally::ThresholdCount { counter, at_least } => (
                counter,
                u32::from(answer.as_number().is_some_and(|value| value >= at_least)),
            ),
        };

        let slot = snapshot.counter_mut(counter);
        *slot = slot.saturating_add(increment);
    }
}
