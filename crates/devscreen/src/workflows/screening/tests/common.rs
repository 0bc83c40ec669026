use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{TimeZone, Utc};
use serde_json::Value;

use crate::workflows::screening::catalog::{CatalogError, QuestionCatalog};
use crate::workflows::screening::domain::{
    AgeBand, AgeGroup, AnswerValue, Category, Question, QuestionId, QuestionType, RecordedAnswer,
    ResponseSet, ScreeningSession, SessionId,
};
use crate::workflows::screening::enrichment::{
    EnrichmentError, SuggestedCondition, SymptomAnalyzer,
};
use crate::workflows::screening::memory::InMemoryQuestionCatalog;
use crate::workflows::screening::repository::{RepositoryError, SessionRepository};
use crate::workflows::screening::scoring::{RangePoints, ScoringRule};
use crate::workflows::screening::service::{
    AnswerOutcome, AnswerSubmission, ScreeningService, StartScreeningRequest,
};
use crate::workflows::screening::screening_router;

pub(super) fn binary(
    id: &str,
    category: Category,
    age_group: AgeGroup,
    order: i32,
    points_for_no: u32,
) -> Question {
    let mut points = BTreeMap::new();
    points.insert("no".to_string(), points_for_no);
    Question {
        id: QuestionId::new(id),
        text: format!("Question {id}"),
        question_type: QuestionType::Binary,
        options: vec!["yes".to_string(), "no".to_string()],
        scoring_rule: ScoringRule::ValueMap { points },
        age_group,
        category,
        order,
        is_critical: false,
        critical_value: None,
        is_initial: false,
    }
}

/// Yes-scored binary question, used for behaviors whose presence is the concern.
pub(super) fn binary_yes(
    id: &str,
    category: Category,
    age_group: AgeGroup,
    order: i32,
    points_for_yes: u32,
) -> Question {
    let mut question = binary(id, category, age_group, order, 0);
    question.scoring_rule = ScoringRule::ValueMap {
        points: BTreeMap::from([("yes".to_string(), points_for_yes)]),
    };
    question
}

/// 0-3 rating item scoring one point at 2 or above.
pub(super) fn rating(id: &str, category: Category, order: i32) -> Question {
    Question {
        id: QuestionId::new(id),
        text: format!("Rating {id}"),
        question_type: QuestionType::Scale,
        options: vec!["0".into(), "1".into(), "2".into(), "3".into()],
        scoring_rule: ScoringRule::Threshold {
            at_least: 2.0,
            points: 1,
        },
        age_group: AgeGroup::SchoolAge,
        category,
        order,
        is_critical: false,
        critical_value: None,
        is_initial: false,
    }
}

/// 1-5 impact rating for the performance phase.
pub(super) fn impact(id: &str, order: i32) -> Question {
    let mut question = rating(id, Category::Performance, order);
    question.options = (1..=5).map(|value| value.to_string()).collect();
    question.scoring_rule = ScoringRule::Ranges {
        ranges: vec![
            RangePoints {
                min: 1.0,
                max: 3.0,
                points: 0,
            },
            RangePoints {
                min: 4.0,
                max: 5.0,
                points: 1,
            },
        ],
    };
    question
}

pub(super) fn critical(mut question: Question) -> Question {
    question.is_critical = true;
    question
}

pub(super) fn initial(mut question: Question) -> Question {
    question.is_initial = true;
    question
}

/// Toddler, preschool and school-age questions with enough depth to reach every phase.
pub(super) fn fixture_questions() -> Vec<Question> {
    use AgeGroup::{All, Preschool, SchoolAge, Toddler};
    use Category::{AdhdHyperactive, AdhdInattention, Autism, General, Speech};

    let mut questions = vec![
        initial(critical(binary("t-aut-1", Autism, Toddler, 1, 1))),
        initial(critical(binary("t-aut-2", Autism, Toddler, 2, 1))),
        initial(binary_yes("t-aut-3", Autism, Toddler, 3, 1)),
        initial(binary("t-spc-1", Speech, Toddler, 4, 2)),
        initial(binary("t-gen-1", General, Toddler, 5, 0)),
        critical(binary("t-aut-4", Autism, Toddler, 10, 1)),
        critical(binary("t-aut-5", Autism, Toddler, 11, 1)),
        binary_yes("t-aut-6", Autism, Toddler, 12, 2),
        initial(binary("g-all-1", General, All, 50, 0)),
        initial(binary("p-aut-1", Autism, Preschool, 1, 1)),
        initial(binary("p-aut-2", Autism, Preschool, 2, 1)),
        initial(binary("p-aut-3", Autism, Preschool, 3, 1)),
        initial(binary("p-spc-1", Speech, Preschool, 4, 2)),
        initial(binary("p-spc-2", Speech, Preschool, 5, 2)),
        initial(binary("p-spc-3", Speech, Preschool, 6, 1)),
        binary("p-spc-4", Speech, Preschool, 20, 3),
        binary("p-aut-4", Autism, Preschool, 21, 1),
        initial(binary("s-spc-1", Speech, SchoolAge, 7, 1)),
        binary("s-spc-2", Speech, SchoolAge, 40, 3),
        impact("s-prf-1", 60),
        impact("s-prf-2", 61),
    ];

    for index in 1..=9 {
        let mut inattention = rating(&format!("s-ina-{index}"), AdhdInattention, index);
        let mut hyperactive = rating(&format!("s-hyp-{index}"), AdhdHyperactive, index + 10);
        if index <= 3 {
            inattention.is_initial = true;
            hyperactive.is_initial = true;
        }
        questions.push(inattention);
        questions.push(hyperactive);
    }

    questions
}

pub(super) fn fixture_catalog() -> InMemoryQuestionCatalog {
    InMemoryQuestionCatalog::from_questions(fixture_questions()).expect("fixture catalog loads")
}

pub(super) fn question_index() -> BTreeMap<QuestionId, Question> {
    fixture_questions()
        .into_iter()
        .map(|question| (question.id.clone(), question))
        .collect()
}

pub(super) fn yes() -> AnswerValue {
    AnswerValue::Text("yes".to_string())
}

pub(super) fn no() -> AnswerValue {
    AnswerValue::Text("no".to_string())
}

pub(super) fn number(value: f64) -> AnswerValue {
    AnswerValue::Number(value)
}

pub(super) fn responses(answers: &[(&str, AnswerValue)]) -> ResponseSet {
    let answered_at = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).single().expect("valid time");
    answers
        .iter()
        .map(|(id, value)| {
            (
                QuestionId::new(*id),
                RecordedAnswer {
                    value: value.clone(),
                    answered_at,
                },
            )
        })
        .collect()
}

pub(super) fn answered(ids: &[&str]) -> BTreeSet<QuestionId> {
    ids.iter().map(|id| QuestionId::new(*id)).collect()
}

pub(super) fn start_request(age_months: i64) -> StartScreeningRequest {
    StartScreeningRequest {
        child_age_months: Some(age_months),
        child_gender: None,
        previous_diagnosis: None,
    }
}

pub(super) fn submission(question_id: &str, answer: AnswerValue) -> AnswerSubmission {
    AnswerSubmission {
        question_id: Some(question_id.to_string()),
        answer: Some(answer),
    }
}

pub(super) type FixtureService = ScreeningService<MemoryRepository, InMemoryQuestionCatalog>;

pub(super) fn build_service() -> (FixtureService, Arc<MemoryRepository>) {
    let repository = Arc::new(MemoryRepository::default());
    let service = ScreeningService::new(repository.clone(), Arc::new(fixture_catalog()));
    (service, repository)
}

/// Submit answers in order, returning the last outcome.
pub(super) fn answer_all(
    service: &FixtureService,
    session_id: &SessionId,
    answers: &[(&str, AnswerValue)],
) -> AnswerOutcome {
    let mut last = None;
    for (id, value) in answers {
        last = Some(
            service
                .submit_answer(session_id, submission(id, value.clone()))
                .expect("answer accepted"),
        );
    }
    last.expect("at least one answer")
}

/// 20-month answers: two critical misses and an autism total of three.
pub(super) fn toddler_elevated_initial() -> Vec<(&'static str, AnswerValue)> {
    vec![
        ("t-aut-1", no()),
        ("t-aut-2", no()),
        ("t-aut-3", yes()),
        ("t-spc-1", yes()),
        ("t-gen-1", yes()),
    ]
}

pub(super) fn toddler_typical_initial() -> Vec<(&'static str, AnswerValue)> {
    vec![
        ("t-aut-1", yes()),
        ("t-aut-2", yes()),
        ("t-aut-3", no()),
        ("t-spc-1", yes()),
        ("t-gen-1", yes()),
    ]
}

#[derive(Default, Clone)]
pub(super) struct MemoryRepository {
    pub(super) sessions: Arc<Mutex<HashMap<SessionId, ScreeningSession>>>,
}

impl MemoryRepository {
    pub(super) fn stored(&self, id: &SessionId) -> ScreeningSession {
        self.sessions
            .lock()
            .expect("repository mutex poisoned")
            .get(id)
            .cloned()
            .expect("session stored")
    }

    pub(super) fn put(&self, session: ScreeningSession) {
        self.sessions
            .lock()
            .expect("repository mutex poisoned")
            .insert(session.session_id().clone(), session);
    }
}

impl SessionRepository for MemoryRepository {
    fn insert(&self, session: ScreeningSession) -> Result<ScreeningSession, RepositoryError> {
        let mut guard = self.sessions.lock().expect("repository mutex poisoned");
        if guard.contains_key(session.session_id()) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(session.session_id().clone(), session.clone());
        Ok(session)
    }

    fn update(
        &self,
        session: ScreeningSession,
        expected_version: u64,
    ) -> Result<(), RepositoryError> {
        let mut guard = self.sessions.lock().expect("repository mutex poisoned");
        match guard.get(session.session_id()) {
            Some(stored) if stored.version() != expected_version => Err(RepositoryError::Conflict),
            Some(_) => {
                guard.insert(session.session_id().clone(), session);
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn fetch(&self, id: &SessionId) -> Result<Option<ScreeningSession>, RepositoryError> {
        let guard = self.sessions.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }
}

/// Serves reads but rejects every write as a concurrent modification.
#[derive(Default, Clone)]
pub(super) struct ConflictRepository {
    pub(super) inner: MemoryRepository,
}

impl SessionRepository for ConflictRepository {
    fn insert(&self, session: ScreeningSession) -> Result<ScreeningSession, RepositoryError> {
        self.inner.insert(session)
    }

    fn update(
        &self,
        _session: ScreeningSession,
        _expected_version: u64,
    ) -> Result<(), RepositoryError> {
        Err(RepositoryError::Conflict)
    }

    fn fetch(&self, id: &SessionId) -> Result<Option<ScreeningSession>, RepositoryError> {
        self.inner.fetch(id)
    }
}

pub(super) struct UnavailableRepository;

impl SessionRepository for UnavailableRepository {
    fn insert(&self, _session: ScreeningSession) -> Result<ScreeningSession, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn update(
        &self,
        _session: ScreeningSession,
        _expected_version: u64,
    ) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _id: &SessionId) -> Result<Option<ScreeningSession>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

pub(super) struct UnavailableCatalog;

impl QuestionCatalog for UnavailableCatalog {
    fn find_initial_questions(
        &self,
        _band: AgeBand,
        _categories: &[Category],
        _limit: usize,
    ) -> Result<Vec<Question>, CatalogError> {
        Err(CatalogError::Unavailable("question bank offline".to_string()))
    }

    fn find_question(&self, _id: &QuestionId) -> Result<Option<Question>, CatalogError> {
        Err(CatalogError::Unavailable("question bank offline".to_string()))
    }

    fn find_next_question(
        &self,
        _band: AgeBand,
        _categories: &[Category],
        _exclude: &BTreeSet<QuestionId>,
    ) -> Result<Option<Question>, CatalogError> {
        Err(CatalogError::Unavailable("question bank offline".to_string()))
    }
}

pub(super) struct FailingAnalyzer;

impl SymptomAnalyzer for FailingAnalyzer {
    fn analyze(&self, _description: &str) -> Result<Vec<SuggestedCondition>, EnrichmentError> {
        Err(EnrichmentError::Analyzer("model timeout".to_string()))
    }
}

/// Always suggests a single condition with a fixed confidence.
pub(super) struct FixedAnalyzer(pub(super) f64);

impl SymptomAnalyzer for FixedAnalyzer {
    fn analyze(&self, _description: &str) -> Result<Vec<SuggestedCondition>, EnrichmentError> {
        Ok(vec![SuggestedCondition {
            condition: "Autism Spectrum Disorder".to_string(),
            confidence: self.0,
            matched_terms: vec!["autism".to_string()],
        }])
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

pub(super) fn screening_router_with_service(service: FixtureService) -> axum::Router {
    screening_router(Arc::new(service))
}
