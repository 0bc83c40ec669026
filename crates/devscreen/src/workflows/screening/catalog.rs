use std::cmp::Ordering;
use std::collections::BTreeSet;

use super::domain::{AgeBand, Category, Question, QuestionId};

/// Read-only access to the externally supplied question bank.
pub trait QuestionCatalog: Send + Sync {
    /// Fixed initial set for a band, in presentation order, at most `limit` long.
    fn find_initial_questions(
        &self,
        band: AgeBand,
        categories: &[Category],
        limit: usize,
    ) -> Result<Vec<Question>, CatalogError>;

    fn find_question(&self, id: &QuestionId) -> Result<Option<Question>, CatalogError>;

    /// Lowest-ordered question for the band and categories not in `exclude`.
    fn find_next_question(
        &self,
        band: AgeBand,
        categories: &[Category],
        exclude: &BTreeSet<QuestionId>,
    ) -> Result<Option<Question>, CatalogError>;
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("question catalog unavailable: {0}")]
    Unavailable(String),
}

/// Ascending `order`, ties broken by ascending id.
pub fn presentation_order(left: &Question, right: &Question) -> Ordering {
    left.order
        .cmp(&right.order)
        .then_with(|| left.id.cmp(&right.id))
}

pub(crate) fn matches(question: &Question, band: AgeBand, categories: &[Category]) -> bool {
    question.age_group.includes(band) && categories.contains(&question.category)
}
