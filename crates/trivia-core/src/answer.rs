//! Answers: one per user per session.
//!
//! Answers are recorded without a verdict. Correctness, closeness and the
//! first-correct flag are written once, when the session closes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::UserRef;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
  pub answer_id:        Uuid,
  pub session_id:       Uuid,
  pub user_id:          UserRef,
  pub raw_text:         String,
  pub normalized_text:  String,
  /// Stamped by the store when it accepts the write.
  pub submitted_at:     DateTime<Utc>,
  /// Store-assigned, strictly increasing; breaks `submitted_at` ties.
  pub sequence:         i64,
  pub is_correct:       Option<bool>,
  pub is_first_correct: bool,
  pub has_conflict:     bool,
  pub is_close:         bool,
}

/// Input to [`crate::store::TriviaStore::insert_answer`].
/// `submitted_at` and `sequence` are always set by the store.
#[derive(Debug, Clone)]
pub struct NewAnswer {
  pub session_id:      Uuid,
  pub user_id:         UserRef,
  pub raw_text:        String,
  pub normalized_text: String,
  pub has_conflict:    bool,
}

/// The verdict for one answer, computed at close.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerVerdict {
  pub answer_id:        Uuid,
  /// `None` when the ground truth could not be resolved.
  pub is_correct:       Option<bool>,
  pub is_first_correct: bool,
  pub is_close:         bool,
}

/// Result of [`crate::store::TriviaStore::insert_answer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerInsert {
  Inserted(Answer),
  /// The user already has an answer in this session; nothing was written.
  Duplicate,
  /// The session is no longer active; nothing was written.
  SessionClosed,
}
