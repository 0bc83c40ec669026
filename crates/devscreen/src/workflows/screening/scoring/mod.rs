mod rules;

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::domain::{Category, Question, QuestionId, ResponseSet};
use rules::{tallies_for, Counter, PERFORMANCE_IMPACT_THRESHOLD};

pub use rules::{RangePoints, ScoringRule};

/// Resolves question metadata by identifier.
pub trait QuestionLookup {
    fn resolve(&self, id: &QuestionId) -> Option<&Question>;
}

impl QuestionLookup for BTreeMap<QuestionId, Question> {
    fn resolve(&self, id: &QuestionId) -> Option<&Question> {
        self.get(id)
    }
}

impl QuestionLookup for HashMap<QuestionId, Question> {
    fn resolve(&self, id: &QuestionId) -> Option<&Question> {
        self.get(id)
    }
}

impl QuestionLookup for [Question] {
    fn resolve(&self, id: &QuestionId) -> Option<&Question> {
        self.iter().find(|question| &question.id == id)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutismScore {
    pub total: u32,
    pub critical_count: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdhdScore {
    pub inattention_count: u32,
    pub hyperactive_count: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeechScore {
    pub total: u32,
}

/// Per-category scores derived from a full response set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreSnapshot {
    pub autism: AutismScore,
    pub adhd: AdhdScore,
    pub speech: SpeechScore,
}

impl ScoreSnapshot {
    fn counter_mut(&mut self, counter: Counter) -> &mut u32 {
        match counter {
            Counter::AutismTotal => &mut self.autism.total,
            Counter::AutismCritical => &mut self.autism.critical_count,
            Counter::Inattention => &mut self.adhd.inattention_count,
            Counter::Hyperactive => &mut self.adhd.hyperactive_count,
            Counter::SpeechTotal => &mut self.speech.total,
        }
    }
}

/// Recompute every sub-score from scratch. Answers whose question cannot be resolved are skipped.
pub fn compute_scores<L>(responses: &ResponseSet, questions: &L) -> ScoreSnapshot
where
    L: QuestionLookup + ?Sized,
{
    let mut snapshot = ScoreSnapshot::default();

    for (id, recorded) in responses {
        let Some(question) = questions.resolve(id) else {
            debug!(question_id = %id, "skipping answer without question metadata");
            continue;
        };

        for tally in tallies_for(question.category) {
            tally.apply(question, &recorded.value, &mut snapshot);
        }
    }

    snapshot
}

/// True when any answered performance question rates functional impact at 4 or above.
pub fn performance_impact<L>(responses: &ResponseSet, questions: &L) -> bool
where
    L: QuestionLookup + ?Sized,
{
    responses.iter().any(|(id, recorded)| {
        questions
            .resolve(id)
            .filter(|question| question.category == Category::Performance)
            .and_then(|_| recorded.value.as_number())
            .is_some_and(|value| value >= PERFORMANCE_IMPACT_THRESHOLD)
    })
}
