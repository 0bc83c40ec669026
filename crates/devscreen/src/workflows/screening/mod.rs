//! Adaptive developmental screening: age-banded questionnaires, category scoring,
//! phase progression and result synthesis for autism, ADHD and speech-delay indicators.

pub mod catalog;
pub mod domain;
pub mod enrichment;
pub mod memory;
pub mod progression;
pub mod repository;
pub mod router;
pub mod scoring;
pub mod service;
pub mod synthesis;

#[cfg(test)]
mod tests;

pub use catalog::{CatalogError, QuestionCatalog};
pub use domain::{
    AgeBand, AgeGroup, AnswerValue, Category, ChildGender, ChildProfile, Phase, Question,
    QuestionId, QuestionType, RecordedAnswer, ResponseSet, ScreeningSession, SessionId,
};
pub use enrichment::{
    describe_symptoms, EnrichmentError, KeywordSymptomAnalyzer, SuggestedCondition,
    SymptomAnalyzer,
};
pub use memory::{CatalogLoadError, InMemoryQuestionCatalog, InMemorySessionStore};
pub use progression::{advance, Decision, PhaseContext};
pub use repository::{RepositoryError, SessionRepository, SessionStatusView};
pub use router::screening_router;
pub use scoring::{compute_scores, QuestionLookup, ScoreSnapshot, ScoringRule};
pub use service::{
    AnswerOutcome, AnswerSubmission, CompletedScreening, ProgressUpdate, QuestionView,
    ScreeningError, ScreeningService, ScreeningStarted, StartScreeningRequest,
};
pub use synthesis::{
    synthesize, Concern, Confidence, OverallRisk, RiskLevel, ScreeningResult, ScreeningSummary,
    Urgency,
};
