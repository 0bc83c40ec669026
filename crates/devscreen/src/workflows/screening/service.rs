use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::catalog::{CatalogError, QuestionCatalog};
use super::domain::{
    AgeBand, AgeGroup, AnswerValue, Category, ChildGender, ChildProfile, Phase, Question,
    QuestionId, QuestionType, ScreeningSession, SessionId,
};
use super::enrichment::{enrich, SymptomAnalyzer};
use super::progression::{self, Decision, PhaseContext};
use super::repository::{RepositoryError, SessionRepository, SessionStatusView};
use super::scoring::ScoreSnapshot;
use super::synthesis::{synthesize, ScreeningResult};

/// Request payload for starting a screening.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StartScreeningRequest {
    pub child_age_months: Option<i64>,
    #[serde(default)]
    pub child_gender: Option<ChildGender>,
    #[serde(default)]
    pub previous_diagnosis: Option<String>,
}

/// Request payload for a single answer.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnswerSubmission {
    pub question_id: Option<String>,
    pub answer: Option<AnswerValue>,
}

/// Question as shown to a parent; the scoring rule stays server-side.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestionView {
    pub id: QuestionId,
    pub text: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    pub category: Category,
    pub age_group: AgeGroup,
    pub order: i32,
}

impl From<&Question> for QuestionView {
    fn from(question: &Question) -> Self {
        Self {
            id: question.id.clone(),
            text: question.text.clone(),
            question_type: question.question_type,
            options: question.options.clone(),
            category: question.category,
            age_group: question.age_group,
            order: question.order,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScreeningStarted {
    pub session_id: SessionId,
    pub phase: Phase,
    pub initial_questions: Vec<QuestionView>,
    pub estimated_total_questions: u16,
    pub age_group_label: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProgressUpdate {
    pub completed: bool,
    pub next_question: QuestionView,
    pub phase: Phase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase_message: Option<String>,
    pub progress: u8,
    pub answered_count: usize,
    pub current_scores: ScoreSnapshot,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompletedScreening {
    pub completed: bool,
    pub result: ScreeningResult,
    pub scores: ScoreSnapshot,
    pub progress: u8,
}

/// Response to a submitted answer.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum AnswerOutcome {
    InProgress(ProgressUpdate),
    Completed(CompletedScreening),
}

impl AnswerOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, AnswerOutcome::Completed(_))
    }
}

/// Orchestrates catalog lookups, scoring, phase progression and synthesis per call.
pub struct ScreeningService<R, C> {
    repository: Arc<R>,
    catalog: Arc<C>,
    analyzer: Option<Arc<dyn SymptomAnalyzer>>,
}

impl<R, C> ScreeningService<R, C>
where
    R: SessionRepository + 'static,
    C: QuestionCatalog + 'static,
{
    pub fn new(repository: Arc<R>, catalog: Arc<C>) -> Self {
        Self {
            repository,
            catalog,
            analyzer: None,
        }
    }

    pub fn with_analyzer(mut self, analyzer: Arc<dyn SymptomAnalyzer>) -> Self {
        self.analyzer = Some(analyzer);
        self
    }

    pub fn catalog(&self) -> &Arc<C> {
        &self.catalog
    }

    /// Create a session and return the fixed initial question set for the child's age band.
    pub fn start_screening(
        &self,
        request: StartScreeningRequest,
    ) -> Result<ScreeningStarted, ScreeningError> {
        let age_months = validate_age(request.child_age_months)?;
        let band = AgeBand::from_age_months(age_months);
        let initial = progression::initial_questions(self.catalog.as_ref(), band)?;

        let child = ChildProfile {
            age_months,
            gender: request.child_gender,
            previous_diagnosis: request
                .previous_diagnosis
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty()),
        };
        let session = ScreeningSession::new(SessionId::generate(), child, Utc::now());
        let session_id = session.session_id().clone();
        self.repository
            .insert(session)
            .map_err(|err| store_error(&session_id, err))?;

        info!(
            session_id = %session_id,
            age_months,
            age_group = band.label(),
            initial_questions = initial.len(),
            "screening session started"
        );

        Ok(ScreeningStarted {
            session_id,
            phase: Phase::Initial,
            initial_questions: initial.iter().map(QuestionView::from).collect(),
            estimated_total_questions: band.estimated_total_questions(),
            age_group_label: band.label(),
        })
    }

    /// Record an answer, rescore, and decide the next step. Safe to retry with the same input.
    pub fn submit_answer(
        &self,
        session_id: &SessionId,
        submission: AnswerSubmission,
    ) -> Result<AnswerOutcome, ScreeningError> {
        let (question_id, value) = validate_submission(submission)?;
        let mut session = self.load(session_id)?;

        if session.is_completed() {
            debug!(session_id = %session_id, "answer ignored for completed session");
            let result = self.stored_result(session.clone())?;
            return Ok(AnswerOutcome::Completed(CompletedScreening {
                completed: true,
                result,
                scores: *session.scores(),
                progress: 100,
            }));
        }

        match self.catalog.find_question(&question_id)? {
            Some(question) => question
                .validate_answer(&value)
                .map_err(ScreeningError::InvalidInput)?,
            None => warn!(
                session_id = %session_id,
                question_id = %question_id,
                "answer references a question missing from the catalog; it will not be scored"
            ),
        }

        let loaded_version = session.version();
        let now = Utc::now();
        let mut answered = session.answered_ids();
        answered.insert(question_id.clone());
        let index = self.question_index(answered.iter())?;
        session.merge_answer(question_id, value, now, &index);

        let decision = progression::advance(
            self.catalog.as_ref(),
            PhaseContext {
                age_months: session.child().age_months,
                phase: session.phase(),
                scores: session.scores(),
                answered: &session.answered_ids(),
            },
        )?;

        let outcome = match decision {
            Decision::Continue { question } => {
                session.advance_to(session.phase(), now);
                self.in_progress(&session, &question, None)
            }
            Decision::TransitionTo {
                phase,
                question,
                message,
            } => {
                info!(
                    session_id = %session_id,
                    from = session.phase().label(),
                    to = phase.label(),
                    "screening phase transition"
                );
                session.advance_to(phase, now);
                self.in_progress(&session, &question, Some(message))
            }
            Decision::Complete => {
                let result = self.synthesize_with(&session, &index);
                session.complete(result.clone(), now);
                info!(
                    session_id = %session_id,
                    primary_concern = result.primary_concern.map(|concern| concern.label()),
                    urgency = ?result.urgency,
                    answered = session.answered_count(),
                    "screening completed"
                );
                AnswerOutcome::Completed(CompletedScreening {
                    completed: true,
                    result,
                    scores: *session.scores(),
                    progress: 100,
                })
            }
        };

        session.bump_version();
        self.repository
            .update(session, loaded_version)
            .map_err(|err| store_error(session_id, err))?;

        Ok(outcome)
    }

    /// Final result of a completed session, synthesized and stored on first read if missing.
    pub fn get_result(&self, session_id: &SessionId) -> Result<ScreeningResult, ScreeningError> {
        let session = self.load(session_id)?;
        if !session.is_completed() {
            return Err(ScreeningError::NotCompleted(session_id.clone()));
        }
        self.stored_result(session)
    }

    pub fn get_status(&self, session_id: &SessionId) -> Result<SessionStatusView, ScreeningError> {
        Ok(self.load(session_id)?.status_view())
    }

    pub fn get_session(&self, session_id: &SessionId) -> Result<ScreeningSession, ScreeningError> {
        self.load(session_id)
    }

    fn load(&self, session_id: &SessionId) -> Result<ScreeningSession, ScreeningError> {
        self.repository
            .fetch(session_id)
            .map_err(|err| store_error(session_id, err))?
            .ok_or_else(|| ScreeningError::SessionNotFound(session_id.clone()))
    }

    fn stored_result(&self, mut session: ScreeningSession) -> Result<ScreeningResult, ScreeningError> {
        if let Some(result) = session.result() {
            return Ok(result.clone());
        }

        let session_id = session.session_id().clone();
        debug!(session_id = %session_id, "synthesizing missing result for completed session");
        let index = self.question_index(session.responses().keys())?;
        let result = self.synthesize_with(&session, &index);
        let loaded_version = session.version();
        session.attach_result(result.clone(), Utc::now());
        session.bump_version();
        self.repository
            .update(session, loaded_version)
            .map_err(|err| store_error(&session_id, err))?;
        Ok(result)
    }

    fn synthesize_with(
        &self,
        session: &ScreeningSession,
        index: &BTreeMap<QuestionId, Question>,
    ) -> ScreeningResult {
        let age_months = session.child().age_months;
        let mut result = synthesize(age_months, session.responses(), session.scores(), index);
        if let Some(analyzer) = &self.analyzer {
            enrich(analyzer.as_ref(), age_months, session.scores(), &mut result);
        }
        result
    }

    /// Resolve metadata for every answered question. Unknown ids are left out.
    fn question_index<'a>(
        &self,
        ids: impl Iterator<Item = &'a QuestionId>,
    ) -> Result<BTreeMap<QuestionId, Question>, CatalogError> {
        let mut index = BTreeMap::new();
        for id in ids {
            if let Some(question) = self.catalog.find_question(id)? {
                index.insert(id.clone(), question);
            }
        }
        Ok(index)
    }

    fn in_progress(
        &self,
        session: &ScreeningSession,
        question: &Question,
        phase_message: Option<String>,
    ) -> AnswerOutcome {
        AnswerOutcome::InProgress(ProgressUpdate {
            completed: false,
            next_question: QuestionView::from(question),
            phase: session.phase(),
            phase_message,
            progress: session.progress(),
            answered_count: session.answered_count(),
            current_scores: *session.scores(),
        })
    }
}

fn validate_age(raw: Option<i64>) -> Result<u16, ScreeningError> {
    let age = raw.ok_or_else(|| {
        ScreeningError::InvalidInput("child_age_months is required".to_string())
    })?;
    let min = i64::from(AgeBand::MIN_AGE_MONTHS);
    let max = i64::from(AgeBand::MAX_AGE_MONTHS);
    if !(min..=max).contains(&age) {
        return Err(ScreeningError::InvalidInput(format!(
            "child_age_months must be between {min} and {max}, got {age}"
        )));
    }
    u16::try_from(age).map_err(|_| {
        ScreeningError::InvalidInput(format!("child_age_months out of range: {age}"))
    })
}

fn validate_submission(
    submission: AnswerSubmission,
) -> Result<(QuestionId, AnswerValue), ScreeningError> {
    let question_id = submission
        .question_id
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
        .ok_or_else(|| ScreeningError::InvalidInput("question_id is required".to_string()))?;
    let answer = submission
        .answer
        .filter(|value| !value.is_blank())
        .ok_or_else(|| ScreeningError::InvalidInput("answer is required".to_string()))?;
    Ok((QuestionId(question_id), answer))
}

fn store_error(session_id: &SessionId, err: RepositoryError) -> ScreeningError {
    match err {
        RepositoryError::Conflict => ScreeningError::Conflict(session_id.clone()),
        RepositoryError::NotFound => ScreeningError::SessionNotFound(session_id.clone()),
        other => ScreeningError::Persistence(other),
    }
}

/// Error raised by the screening service.
#[derive(Debug, thiserror::Error)]
pub enum ScreeningError {
    #[error("screening session {0} not found")]
    SessionNotFound(SessionId),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("screening session {0} is not completed yet")]
    NotCompleted(SessionId),
    #[error("screening session {0} changed concurrently; retry the request")]
    Conflict(SessionId),
    #[error(transparent)]
    Persistence(RepositoryError),
    #[error(transparent)]
    CatalogUnavailable(#[from] CatalogError),
}

impl ScreeningError {
    /// Infrastructure failures leave the session untouched and can be retried as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ScreeningError::Conflict(_)
                | ScreeningError::Persistence(_)
                | ScreeningError::CatalogUnavailable(_)
        )
    }
}
