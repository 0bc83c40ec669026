use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::catalog::{CatalogError, QuestionCatalog};
use super::domain::{AgeBand, Category, Phase, Question, QuestionId};
use super::scoring::ScoreSnapshot;

/// Oldest age at which autism detailed questioning applies.
pub const AUTISM_MAX_AGE_MONTHS: u16 = 60;
/// Youngest age at which ADHD detailed and performance questioning applies.
pub const ADHD_MIN_AGE_MONTHS: u16 = 72;
/// ADHD item count that escalates a detailed assessment to the performance phase.
pub const PERFORMANCE_ESCALATION_COUNT: u32 = 6;

/// Next step chosen for a session.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Continue {
        question: Question,
    },
    TransitionTo {
        phase: Phase,
        question: Question,
        message: String,
    },
    Complete,
}

/// Inputs the state machine reads from a session.
#[derive(Debug, Clone, Copy)]
pub struct PhaseContext<'a> {
    pub age_months: u16,
    pub phase: Phase,
    pub scores: &'a ScoreSnapshot,
    pub answered: &'a BTreeSet<QuestionId>,
}

impl PhaseContext<'_> {
    fn band(&self) -> AgeBand {
        AgeBand::from_age_months(self.age_months)
    }
}

/// Which concern triggers fired for a band.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Triggers {
    pub autism: bool,
    pub speech: bool,
    pub inattention: bool,
    pub hyperactive: bool,
}

impl Triggers {
    pub fn evaluate(band: AgeBand, scores: &ScoreSnapshot) -> Self {
        match band {
            AgeBand::Toddler => Self {
                autism: scores.autism.critical_count >= 2 || scores.autism.total >= 3,
                ..Self::default()
            },
            AgeBand::Preschool => Self {
                autism: scores.autism.total >= 3,
                speech: scores.speech.total >= 4,
                ..Self::default()
            },
            AgeBand::SchoolAge => Self {
                speech: scores.speech.total >= 4,
                inattention: scores.adhd.inattention_count >= 3,
                hyperactive: scores.adhd.hyperactive_count >= 3,
                ..Self::default()
            },
        }
    }

    pub fn any(&self) -> bool {
        self.autism || self.speech || self.inattention || self.hyperactive
    }
}

/// Categories selected for detailed questioning, age gates applied. Recomputed on every call.
pub fn detailed_types(age_months: u16, scores: &ScoreSnapshot) -> Vec<Category> {
    let triggers = Triggers::evaluate(AgeBand::from_age_months(age_months), scores);
    let mut types = Vec::new();

    if triggers.autism && age_months <= AUTISM_MAX_AGE_MONTHS {
        types.push(Category::Autism);
    }
    if triggers.speech {
        types.push(Category::Speech);
    }
    if age_months >= ADHD_MIN_AGE_MONTHS {
        if triggers.inattention {
            types.push(Category::AdhdInattention);
        }
        if triggers.hyperactive {
            types.push(Category::AdhdHyperactive);
        }
    }

    types
}

pub fn needs_performance_assessment(age_months: u16, scores: &ScoreSnapshot) -> bool {
    age_months >= ADHD_MIN_AGE_MONTHS
        && (scores.adhd.inattention_count >= PERFORMANCE_ESCALATION_COUNT
            || scores.adhd.hyperactive_count >= PERFORMANCE_ESCALATION_COUNT)
}

/// Fixed initial set for a band.
pub fn initial_questions<C>(catalog: &C, band: AgeBand) -> Result<Vec<Question>, CatalogError>
where
    C: QuestionCatalog + ?Sized,
{
    catalog.find_initial_questions(band, band.initial_categories(), band.initial_quota())
}

/// Decide the next step. A phase whose question pool is already exhausted is never emitted;
/// evaluation falls through to the following phase rule instead.
pub fn advance<C>(catalog: &C, context: PhaseContext<'_>) -> Result<Decision, CatalogError>
where
    C: QuestionCatalog + ?Sized,
{
    let band = context.band();
    let mut phase = context.phase;
    let mut entered = false;

    loop {
        match phase {
            Phase::Initial => {
                let pending = initial_questions(catalog, band)?
                    .into_iter()
                    .find(|question| !context.answered.contains(&question.id));
                if let Some(question) = pending {
                    return Ok(Decision::Continue { question });
                }
                if !Triggers::evaluate(band, context.scores).any() {
                    return Ok(Decision::Complete);
                }
                phase = Phase::Detailed;
                entered = true;
            }
            Phase::Detailed => {
                let types = detailed_types(context.age_months, context.scores);
                if !types.is_empty() {
                    if let Some(question) =
                        catalog.find_next_question(band, &types, context.answered)?
                    {
                        return Ok(emit(phase, question, entered, &types));
                    }
                }
                if !needs_performance_assessment(context.age_months, context.scores) {
                    return Ok(Decision::Complete);
                }
                phase = Phase::Performance;
                entered = true;
            }
            Phase::Performance => {
                let types = [Category::Performance];
                return Ok(
                    match catalog.find_next_question(band, &types, context.answered)? {
                        Some(question) => emit(phase, question, entered, &types),
                        None => Decision::Complete,
                    },
                );
            }
            Phase::Completed => return Ok(Decision::Complete),
        }
    }
}

fn emit(phase: Phase, question: Question, entered: bool, types: &[Category]) -> Decision {
    if entered {
        Decision::TransitionTo {
            phase,
            question,
            message: phase_message(phase, types),
        }
    } else {
        Decision::Continue { question }
    }
}

fn phase_message(phase: Phase, types: &[Category]) -> String {
    match phase {
        Phase::Detailed => {
            let areas: Vec<&str> = types.iter().map(|category| area_label(*category)).collect();
            format!(
                "Some initial answers suggest a closer look at {}. The next questions go into more detail.",
                areas.join(" and ")
            )
        }
        Phase::Performance => {
            "A few final questions about how these behaviors affect daily life at home and school."
                .to_string()
        }
        Phase::Initial | Phase::Completed => String::new(),
    }
}

fn area_label(category: Category) -> &'static str {
    match category {
        Category::Autism => "social communication",
        Category::Speech => "speech and language",
        Category::AdhdInattention => "attention",
        Category::AdhdHyperactive => "activity level",
        Category::Performance => "daily functioning",
        Category::General => "general development",
    }
}
