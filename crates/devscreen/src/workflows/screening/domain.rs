use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::scoring::{compute_scores, QuestionLookup, ScoreSnapshot, ScoringRule};
use super::synthesis::ScreeningResult;

/// Opaque identifier of a catalog question.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuestionId(pub String);

impl QuestionId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }
}

impl fmt::Display for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier wrapper for screening sessions.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn generate() -> Self {
        Self(format!("scr-{}", Uuid::new_v4().simple()))
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Age band governing which questions and thresholds apply to a child.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgeBand {
    #[serde(rename = "16-30m")]
    Toddler,
    #[serde(rename = "2.5-5y")]
    Preschool,
    #[serde(rename = "6y+")]
    SchoolAge,
}

impl AgeBand {
    pub const MIN_AGE_MONTHS: u16 = 1;
    pub const MAX_AGE_MONTHS: u16 = 216;

    /// Children under 16 months use the youngest band; 61-71 months stay in the preschool band.
    pub const fn from_age_months(months: u16) -> Self {
        if months <= 30 {
            Self::Toddler
        } else if months < 72 {
            Self::Preschool
        } else {
            Self::SchoolAge
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Toddler => "16-30m",
            Self::Preschool => "2.5-5y",
            Self::SchoolAge => "6y+",
        }
    }

    pub const fn initial_quota(self) -> usize {
        match self {
            Self::Toddler => 5,
            Self::Preschool => 7,
            Self::SchoolAge => 8,
        }
    }

    pub const fn estimated_total_questions(self) -> u16 {
        match self {
            Self::Toddler => 15,
            Self::Preschool => 20,
            Self::SchoolAge => 30,
        }
    }

    /// Categories the fixed initial question set is drawn from.
    pub const fn initial_categories(self) -> &'static [Category] {
        match self {
            Self::Toddler | Self::Preschool => {
                &[Category::Autism, Category::Speech, Category::General]
            }
            Self::SchoolAge => &[
                Category::AdhdInattention,
                Category::AdhdHyperactive,
                Category::Speech,
                Category::General,
            ],
        }
    }
}

/// Age group a question is tagged with in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgeGroup {
    #[serde(rename = "16-30m")]
    Toddler,
    #[serde(rename = "2.5-5y")]
    Preschool,
    #[serde(rename = "6y+")]
    SchoolAge,
    #[serde(rename = "all")]
    All,
}

impl AgeGroup {
    pub const fn includes(self, band: AgeBand) -> bool {
        matches!(
            (self, band),
            (Self::All, _)
                | (Self::Toddler, AgeBand::Toddler)
                | (Self::Preschool, AgeBand::Preschool)
                | (Self::SchoolAge, AgeBand::SchoolAge)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Autism,
    AdhdInattention,
    AdhdHyperactive,
    Speech,
    Performance,
    General,
}

impl Category {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Autism => "autism",
            Self::AdhdInattention => "adhd_inattention",
            Self::AdhdHyperactive => "adhd_hyperactive",
            Self::Speech => "speech",
            Self::Performance => "performance",
            Self::General => "general",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionType {
    Binary,
    Scale,
    MultipleChoice,
    FreeText,
}

/// Free-form answer as submitted by a parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Flag(bool),
    Number(f64),
    Text(String),
}

impl AnswerValue {
    /// Normalized lookup key: booleans become yes/no, whole numbers drop the fraction.
    pub fn key(&self) -> String {
        match self {
            AnswerValue::Flag(true) => "yes".to_string(),
            AnswerValue::Flag(false) => "no".to_string(),
            AnswerValue::Number(value)
                if value.fract() == 0.0 && value.abs() < INTEGRAL_KEY_LIMIT =>
            {
                format!("{}", *value as i64)
            }
            AnswerValue::Number(value) => value.to_string(),
            AnswerValue::Text(text) => normalize_key(text),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            AnswerValue::Number(value) if value.is_finite() => Some(*value),
            AnswerValue::Number(_) => None,
            AnswerValue::Flag(flag) => Some(if *flag { 1.0 } else { 0.0 }),
            AnswerValue::Text(text) => text.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        }
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, AnswerValue::Text(text) if text.trim().is_empty())
    }
}

/// Largest magnitude rendered as an integer key; beyond it the cast would saturate.
const INTEGRAL_KEY_LIMIT: f64 = 1e15;

/// Lowercased, trimmed key. Textual booleans fold into yes/no so they match `Flag` answers.
pub(crate) fn normalize_key(raw: &str) -> String {
    let key = raw.trim().to_lowercase();
    match key.as_str() {
        "true" => "yes".to_string(),
        "false" => "no".to_string(),
        _ => key,
    }
}

/// Catalog question as consumed by the engine. Read-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub text: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    #[serde(default)]
    pub options: Vec<String>,
    pub scoring_rule: ScoringRule,
    pub age_group: AgeGroup,
    pub category: Category,
    pub order: i32,
    #[serde(default)]
    pub is_critical: bool,
    /// Clinically-negative answer for critical questions; "no" when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub critical_value: Option<String>,
    #[serde(default)]
    pub is_initial: bool,
}

impl Question {
    pub fn is_negative_answer(&self, answer: &AnswerValue) -> bool {
        let negative = self
            .critical_value
            .as_deref()
            .map(normalize_key)
            .unwrap_or_else(|| "no".to_string());
        answer.key() == negative
    }

    pub fn contribution(&self, answer: &AnswerValue) -> u32 {
        self.scoring_rule.contribution(answer)
    }

    /// Check an answer against the question's type and listed options.
    pub fn validate_answer(&self, answer: &AnswerValue) -> Result<(), String> {
        if answer.is_blank() {
            return Err(format!("answer to question {} is blank", self.id));
        }

        match self.question_type {
            QuestionType::Binary => match answer.key().as_str() {
                "yes" | "no" => Ok(()),
                other => Err(format!(
                    "question {} expects yes/no, got '{other}'",
                    self.id
                )),
            },
            QuestionType::Scale => answer.as_number().map(|_| ()).ok_or_else(|| {
                format!("question {} expects a numeric scale answer", self.id)
            }),
            QuestionType::MultipleChoice => {
                if self.options.is_empty() {
                    return Ok(());
                }
                let key = answer.key();
                if self.options.iter().any(|option| normalize_key(option) == key) {
                    Ok(())
                } else {
                    Err(format!(
                        "answer '{key}' is not one of the options for question {}",
                        self.id
                    ))
                }
            }
            QuestionType::FreeText => Ok(()),
        }
    }
}

/// Coarse stage of a screening session. Declaration order is the only valid direction of travel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Initial,
    Detailed,
    Performance,
    Completed,
}

impl Phase {
    pub const fn label(self) -> &'static str {
        match self {
            Phase::Initial => "initial",
            Phase::Detailed => "detailed",
            Phase::Performance => "performance",
            Phase::Completed => "completed",
        }
    }

    /// Progress floor once a session has reached the phase.
    pub(crate) const fn progress_floor(self) -> u8 {
        match self {
            Phase::Initial => 0,
            Phase::Detailed => 40,
            Phase::Performance => 80,
            Phase::Completed => 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChildGender {
    Male,
    Female,
}

/// Immutable context captured when a session starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildProfile {
    pub age_months: u16,
    pub gender: Option<ChildGender>,
    pub previous_diagnosis: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedAnswer {
    pub value: AnswerValue,
    pub answered_at: DateTime<Utc>,
}

pub type ResponseSet = BTreeMap<QuestionId, RecordedAnswer>;

/// Aggregate root of a screening. Scores are only ever written by recomputing them from the
/// full response set, and nothing but re-reads happen once the session is completed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreeningSession {
    session_id: SessionId,
    child: ChildProfile,
    phase: Phase,
    responses: ResponseSet,
    scores: ScoreSnapshot,
    progress: u8,
    result: Option<ScreeningResult>,
    started_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    version: u64,
}

impl ScreeningSession {
    pub fn new(session_id: SessionId, child: ChildProfile, now: DateTime<Utc>) -> Self {
        Self {
            session_id,
            child,
            phase: Phase::Initial,
            responses: ResponseSet::new(),
            scores: ScoreSnapshot::default(),
            progress: 0,
            result: None,
            started_at: now,
            updated_at: now,
            completed_at: None,
            version: 0,
        }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn child(&self) -> &ChildProfile {
        &self.child
    }

    pub fn age_band(&self) -> AgeBand {
        AgeBand::from_age_months(self.child.age_months)
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn responses(&self) -> &ResponseSet {
        &self.responses
    }

    pub fn scores(&self) -> &ScoreSnapshot {
        &self.scores
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn result(&self) -> Option<&ScreeningResult> {
        self.result.as_ref()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Optimistic concurrency token, bumped on every persisted mutation.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn is_completed(&self) -> bool {
        self.phase == Phase::Completed
    }

    pub fn answered_count(&self) -> usize {
        self.responses.len()
    }

    pub fn answered_ids(&self) -> BTreeSet<QuestionId> {
        self.responses.keys().cloned().collect()
    }

    /// Merge an answer with overwrite semantics and recompute the scores from scratch.
    /// Re-submitting an identical value keeps the original timestamp.
    pub(crate) fn merge_answer<L>(
        &mut self,
        question_id: QuestionId,
        value: AnswerValue,
        now: DateTime<Utc>,
        questions: &L,
    ) where
        L: QuestionLookup + ?Sized,
    {
        if self.is_completed() {
            return;
        }

        let unchanged = self
            .responses
            .get(&question_id)
            .map(|recorded| recorded.value == value)
            .unwrap_or(false);
        if !unchanged {
            self.responses.insert(
                question_id,
                RecordedAnswer {
                    value,
                    answered_at: now,
                },
            );
        }

        self.scores = compute_scores(&self.responses, questions);
        self.updated_at = now;
    }

    /// Move forward to `phase` (never backward) and raise progress monotonically.
    pub(crate) fn advance_to(&mut self, phase: Phase, now: DateTime<Utc>) {
        if phase > self.phase && phase != Phase::Completed {
            self.phase = phase;
        }
        self.progress = self.progress.max(self.estimated_progress());
        self.updated_at = now;
    }

    pub(crate) fn complete(&mut self, result: ScreeningResult, now: DateTime<Utc>) {
        if self.completed_at.is_some() {
            return;
        }
        self.phase = Phase::Completed;
        self.progress = 100;
        self.result = Some(result);
        self.completed_at = Some(now);
        self.updated_at = now;
    }

    /// Store a lazily synthesized result on a session that completed without one.
    pub(crate) fn attach_result(&mut self, result: ScreeningResult, now: DateTime<Utc>) {
        if self.is_completed() && self.result.is_none() {
            self.result = Some(result);
            self.completed_at.get_or_insert(now);
            self.updated_at = now;
        }
    }

    pub(crate) fn bump_version(&mut self) {
        self.version = self.version.saturating_add(1);
    }

    fn estimated_progress(&self) -> u8 {
        let estimate = u64::from(self.age_band().estimated_total_questions().max(1));
        let answered = (self.responses.len() as u64).saturating_mul(100) / estimate;
        let answered = answered.min(99) as u8;
        self.phase.progress_floor().max(answered).min(99)
    }
}
