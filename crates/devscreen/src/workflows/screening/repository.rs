use serde::Serialize;

use super::domain::{AgeBand, Phase, ScreeningSession, SessionId};
use super::scoring::ScoreSnapshot;

/// Session store. Every write replaces the whole record.
pub trait SessionRepository: Send + Sync {
    fn insert(&self, session: ScreeningSession) -> Result<ScreeningSession, RepositoryError>;
    /// Replace the stored session when its version still equals `expected_version`.
    fn update(
        &self,
        session: ScreeningSession,
        expected_version: u64,
    ) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &SessionId) -> Result<Option<ScreeningSession>, RepositoryError>;
}

/// Error enumeration for session store failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("session record changed since it was loaded")]
    Conflict,
    #[error("session record not found")]
    NotFound,
    #[error("session store unavailable: {0}")]
    Unavailable(String),
}

/// Sanitized view of a session's progress.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatusView {
    pub session_id: SessionId,
    pub phase: Phase,
    pub age_group_label: &'static str,
    pub progress: u8,
    pub answered_count: usize,
    pub current_scores: ScoreSnapshot,
    pub completed: bool,
}

impl ScreeningSession {
    pub fn status_view(&self) -> SessionStatusView {
        SessionStatusView {
            session_id: self.session_id().clone(),
            phase: self.phase(),
            age_group_label: AgeBand::from_age_months(self.child().age_months).label(),
            progress: self.progress(),
            answered_count: self.answered_count(),
            current_scores: *self.scores(),
            completed: self.is_completed(),
        }
    }
}
