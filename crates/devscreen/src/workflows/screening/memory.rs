use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use super::catalog::{matches, presentation_order, CatalogError, QuestionCatalog};
use super::domain::{AgeBand, Category, Question, QuestionId, ScreeningSession, SessionId};
use super::repository::{RepositoryError, SessionRepository};
use super::scoring::QuestionLookup;

/// Process-local session store. Sessions idle for longer than the TTL are dropped.
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<SessionId, ScreeningSession>>,
    ttl: Duration,
}

impl InMemorySessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Drop every session whose last update is older than the TTL. Returns how many were removed.
    pub fn evict_expired(&self, now: DateTime<Utc>) -> Result<usize, RepositoryError> {
        let mut guard = self.lock()?;
        Ok(sweep(&mut guard, now, self.ttl))
    }

    pub fn len(&self) -> Result<usize, RepositoryError> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, RepositoryError> {
        Ok(self.lock()?.is_empty())
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<SessionId, ScreeningSession>>, RepositoryError> {
        self.sessions
            .lock()
            .map_err(|_| RepositoryError::Unavailable("session store lock poisoned".to_string()))
    }

    fn is_expired(&self, session: &ScreeningSession, now: DateTime<Utc>) -> bool {
        now - session.updated_at() > self.ttl
    }
}

fn sweep(
    sessions: &mut HashMap<SessionId, ScreeningSession>,
    now: DateTime<Utc>,
    ttl: Duration,
) -> usize {
    let before = sessions.len();
    sessions.retain(|_, session| now - session.updated_at() <= ttl);
    let evicted = before - sessions.len();
    if evicted > 0 {
        debug!(evicted, "evicted expired screening sessions");
    }
    evicted
}

impl SessionRepository for InMemorySessionStore {
    fn insert(&self, session: ScreeningSession) -> Result<ScreeningSession, RepositoryError> {
        let mut guard = self.lock()?;
        sweep(&mut guard, Utc::now(), self.ttl);
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
        let mut guard = self.lock()?;
        let stored = guard
            .get_mut(session.session_id())
            .ok_or(RepositoryError::NotFound)?;
        if stored.version() != expected_version {
            return Err(RepositoryError::Conflict);
        }
        *stored = session;
        Ok(())
    }

    fn fetch(&self, id: &SessionId) -> Result<Option<ScreeningSession>, RepositoryError> {
        let mut guard = self.lock()?;
        let now = Utc::now();
        match guard.get(id) {
            Some(session) if self.is_expired(session, now) => {
                guard.remove(id);
                debug!(session_id = %id, "session expired on fetch");
                Ok(None)
            }
            Some(session) => Ok(Some(session.clone())),
            None => Ok(None),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogLoadError {
    #[error("unable to read question bank: {0}")]
    Io(#[from] std::io::Error),
    #[error("question bank is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("question bank lists {0} more than once")]
    DuplicateQuestion(QuestionId),
    #[error("question bank is empty")]
    Empty,
}

/// Question bank held in memory, kept in presentation order.
#[derive(Debug, Clone)]
pub struct InMemoryQuestionCatalog {
    questions: Vec<Question>,
}

const BUNDLED_QUESTION_BANK: &str = include_str!("../../../data/question_bank.json");

impl InMemoryQuestionCatalog {
    /// Question bank shipped with the crate.
    pub fn bundled() -> Result<Self, CatalogLoadError> {
        Self::from_json_str(BUNDLED_QUESTION_BANK)
    }

    pub fn from_questions(mut questions: Vec<Question>) -> Result<Self, CatalogLoadError> {
        if questions.is_empty() {
            return Err(CatalogLoadError::Empty);
        }

        let mut seen = BTreeSet::new();
        for question in &questions {
            if !seen.insert(question.id.clone()) {
                return Err(CatalogLoadError::DuplicateQuestion(question.id.clone()));
            }
        }

        questions.sort_by(presentation_order);
        Ok(Self { questions })
    }

    /// Parse a JSON array of questions.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, CatalogLoadError> {
        let questions: Vec<Question> = serde_json::from_reader(reader)?;
        Self::from_questions(questions)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, CatalogLoadError> {
        let questions: Vec<Question> = serde_json::from_str(raw)?;
        Self::from_questions(questions)
    }

    pub fn from_path(path: &Path) -> Result<Self, CatalogLoadError> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

impl QuestionLookup for InMemoryQuestionCatalog {
    fn resolve(&self, id: &QuestionId) -> Option<&Question> {
        self.questions.iter().find(|question| &question.id == id)
    }
}

impl QuestionCatalog for InMemoryQuestionCatalog {
    fn find_initial_questions(
        &self,
        band: AgeBand,
        categories: &[Category],
        limit: usize,
    ) -> Result<Vec<Question>, CatalogError> {
        Ok(self
            .questions
            .iter()
            .filter(|question| question.is_initial && matches(question, band, categories))
            .take(limit)
            .cloned()
            .collect())
    }

    fn find_question(&self, id: &QuestionId) -> Result<Option<Question>, CatalogError> {
        Ok(self.resolve(id).cloned())
    }

    fn find_next_question(
        &self,
        band: AgeBand,
        categories: &[Category],
        exclude: &BTreeSet<QuestionId>,
    ) -> Result<Option<Question>, CatalogError> {
        Ok(self
            .questions
            .iter()
            .find(|question| matches(question, band, categories) && !exclude.contains(&question.id))
            .cloned())
    }
}
