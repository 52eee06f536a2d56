//! Questions and question drafts.
//!
//! A draft is what a reviewer sees and edits. Once approved it becomes a
//! [`Question`] in the pool. Questions are never deleted, only retired.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::{Error, Result, UserRef, normalize};

/// Letters used to label multiple-choice options, in option order.
pub const OPTION_LETTERS: [char; 4] = ['A', 'B', 'C', 'D'];

// ─── Shape ───────────────────────────────────────────────────────────────────

/// How the question is asked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuestionKind {
  /// Free-text answer.
  Single,
  /// Exactly four options labelled A through D.
  MultipleChoice { options: [String; 4] },
}

impl QuestionKind {
  pub fn options(&self) -> Option<&[String; 4]> {
    match self {
      Self::Single => None,
      Self::MultipleChoice { options } => Some(options),
    }
  }
}

/// Where the correct answer comes from. Exactly one source per question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum AnswerSource {
  /// Fixed at authoring time. For multiple choice this is an option letter
  /// or the text of one option.
  Static(String),
  /// Computed from the game-statistics service when the session closes.
  Dynamic { query_type: String },
}

impl AnswerSource {
  pub fn is_dynamic(&self) -> bool { matches!(self, Self::Dynamic { .. }) }
}

/// How a question entered the system.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum QuestionOrigin {
  #[default]
  Authored,
  Generated,
}

/// Lifecycle of a question in the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionStatus {
  Available,
  Answered,
  Retired,
}

/// Ordering rule for [`crate::store::TriviaStore::next_available`].
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPriority {
  /// Never-used questions first, then least recently used, tie-broken by
  /// lowest usage count and then creation order.
  #[default]
  OldestUnused,
  /// Lowest usage count first, then least recently used.
  LeastUsed,
}

// ─── Draft ───────────────────────────────────────────────────────────────────

/// A candidate question awaiting (or undergoing) human review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionDraft {
  pub text:         String,
  pub kind:         QuestionKind,
  pub answer:       AnswerSource,
  #[serde(default)]
  pub category:     Option<String>,
  /// The moderator who authored the question, if any. They may not win it.
  #[serde(default)]
  pub submitter_id: Option<UserRef>,
  #[serde(default)]
  pub origin:       QuestionOrigin,
}

impl QuestionDraft {
  /// A single-answer draft with a static answer and no metadata.
  pub fn single(text: impl Into<String>, answer: impl Into<String>) -> Self {
    Self {
      text:         text.into(),
      kind:         QuestionKind::Single,
      answer:       AnswerSource::Static(answer.into()),
      category:     None,
      submitter_id: None,
      origin:       QuestionOrigin::Authored,
    }
  }

  /// Reject drafts that could never be resolved.
  pub fn validate(&self) -> Result<()> {
    if self.text.trim().is_empty() {
      return Err(Error::EmptyQuestion);
    }

    if let QuestionKind::MultipleChoice { options } = &self.kind {
      for (letter, option) in OPTION_LETTERS.iter().zip(options) {
        if option.trim().is_empty() {
          return Err(Error::EmptyOption(*letter));
        }
      }
    }

    match &self.answer {
      AnswerSource::Static(answer) => {
        if answer.trim().is_empty() {
          return Err(Error::EmptyAnswer);
        }
        if let Some(options) = self.kind.options()
          && normalize::resolve_option(answer, options).is_none()
        {
          return Err(Error::AnswerNotAnOption(answer.clone()));
        }
      }
      AnswerSource::Dynamic { query_type } => {
        let valid = !query_type.is_empty()
          && query_type
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid {
          return Err(Error::InvalidQueryType(query_type.clone()));
        }
      }
    }

    Ok(())
  }

  /// Stable identity of the draft's wording: SHA-256 over the normalized
  /// question text, hex-encoded.
  pub fn draft_key(&self) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize::normalize_text(&self.text).as_bytes());
    hex::encode(hasher.finalize())
  }
}

// ─── Question ────────────────────────────────────────────────────────────────

/// A question in the pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
  pub question_id:  Uuid,
  pub text:         String,
  pub kind:         QuestionKind,
  pub answer:       AnswerSource,
  pub category:     Option<String>,
  pub submitter_id: Option<UserRef>,
  pub origin:       QuestionOrigin,
  pub status:       QuestionStatus,
  pub usage_count:  u32,
  pub last_used_at: Option<DateTime<Utc>>,
  pub created_at:   DateTime<Utc>,
}

impl Question {
  /// Materialise an approved draft as a fresh, available question.
  pub fn from_draft(
    question_id: Uuid,
    draft: QuestionDraft,
    created_at: DateTime<Utc>,
  ) -> Self {
    Self {
      question_id,
      text: draft.text,
      kind: draft.kind,
      answer: draft.answer,
      category: draft.category,
      submitter_id: draft.submitter_id,
      origin: draft.origin,
      status: QuestionStatus::Available,
      usage_count: 0,
      last_used_at: None,
      created_at,
    }
  }

  pub fn is_dynamic(&self) -> bool { self.answer.is_dynamic() }

  /// Whether `user` authored this question.
  pub fn is_submitted_by(&self, user: &UserRef) -> bool {
    self.submitter_id.as_ref() == Some(user)
  }
}
