//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 UTC strings with millisecond
//! precision and a `Z` suffix, so lexical order is chronological order and
//! they compare equal to the `strftime('%Y-%m-%dT%H:%M:%fZ')` stamps SQLite
//! writes itself. Structured fields (options, drafts, calculated answers) are
//! stored as compact JSON. UUIDs are stored as hyphenated lowercase strings.

use chrono::{DateTime, SecondsFormat, Utc};
use trivia_core::{
  ChannelRef, MessageRef, UserRef,
  answer::Answer,
  approval::{ApprovalOutcome, ApprovalSession, ApprovalStep, PendingDraft},
  question::{
    AnswerSource, Question, QuestionKind, QuestionOrigin, QuestionStatus,
  },
  session::{CalculatedAnswer, SessionStatus, TriviaSession},
};
use uuid::Uuid;

use crate::{Error, Result};

fn unknown(field: &'static str, value: &str) -> Error {
  Error::Core(trivia_core::Error::UnknownVariant {
    field,
    value: value.to_owned(),
  })
}

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Counters ─────────────────────────────────────────────────────────────────

fn decode_count(n: i64) -> Result<u32> {
  u32::try_from(n).map_err(|_| Error::Counter(n))
}

// ─── Question enums ───────────────────────────────────────────────────────────

pub fn encode_question_status(s: QuestionStatus) -> &'static str {
  match s {
    QuestionStatus::Available => "available",
    QuestionStatus::Answered => "answered",
    QuestionStatus::Retired => "retired",
  }
}

pub fn decode_question_status(s: &str) -> Result<QuestionStatus> {
  match s {
    "available" => Ok(QuestionStatus::Available),
    "answered" => Ok(QuestionStatus::Answered),
    "retired" => Ok(QuestionStatus::Retired),
    other => Err(unknown("question status", other)),
  }
}

pub fn encode_origin(o: QuestionOrigin) -> &'static str {
  match o {
    QuestionOrigin::Authored => "authored",
    QuestionOrigin::Generated => "generated",
  }
}

pub fn decode_origin(s: &str) -> Result<QuestionOrigin> {
  match s {
    "authored" => Ok(QuestionOrigin::Authored),
    "generated" => Ok(QuestionOrigin::Generated),
    other => Err(unknown("question origin", other)),
  }
}

// ─── Session status ───────────────────────────────────────────────────────────

pub fn encode_session_status(s: SessionStatus) -> &'static str {
  match s {
    SessionStatus::Active => "active",
    SessionStatus::Completed => "completed",
    SessionStatus::Expired => "expired",
  }
}

pub fn decode_session_status(s: &str) -> Result<SessionStatus> {
  match s {
    "active" => Ok(SessionStatus::Active),
    "completed" => Ok(SessionStatus::Completed),
    "expired" => Ok(SessionStatus::Expired),
    other => Err(unknown("session status", other)),
  }
}

// ─── Approval step ────────────────────────────────────────────────────────────

/// Split a step into its `(step, outcome, approved_question_id)` columns.
pub fn encode_step(
  step: ApprovalStep,
) -> (&'static str, Option<&'static str>, Option<String>) {
  match step {
    ApprovalStep::AwaitingDecision => ("awaiting_decision", None, None),
    ApprovalStep::Editing => ("editing", None, None),
    ApprovalStep::Completed(ApprovalOutcome::Approved { question_id }) => {
      ("completed", Some("approved"), Some(encode_uuid(question_id)))
    }
    ApprovalStep::Completed(ApprovalOutcome::Rejected) => {
      ("completed", Some("rejected"), None)
    }
    ApprovalStep::Completed(ApprovalOutcome::Expired) => {
      ("completed", Some("expired"), None)
    }
  }
}

pub fn decode_step(
  step: &str,
  outcome: Option<&str>,
  question_id: Option<&str>,
) -> Result<ApprovalStep> {
  match (step, outcome) {
    ("awaiting_decision", None) => Ok(ApprovalStep::AwaitingDecision),
    ("editing", None) => Ok(ApprovalStep::Editing),
    ("completed", Some("approved")) => {
      let id = question_id.ok_or_else(|| unknown("approved question", ""))?;
      Ok(ApprovalStep::Completed(ApprovalOutcome::Approved {
        question_id: decode_uuid(id)?,
      }))
    }
    ("completed", Some("rejected")) => {
      Ok(ApprovalStep::Completed(ApprovalOutcome::Rejected))
    }
    ("completed", Some("expired")) => {
      Ok(ApprovalStep::Completed(ApprovalOutcome::Expired))
    }
    (step, outcome) => Err(unknown(
      "approval step",
      &format!("{step}/{}", outcome.unwrap_or("-")),
    )),
  }
}

// ─── Question columns ─────────────────────────────────────────────────────────

/// The owned column values for one `questions` row.
pub struct QuestionColumns {
  pub question_id:   String,
  pub text:          String,
  pub kind:          &'static str,
  pub options_json:  Option<String>,
  pub static_answer: Option<String>,
  pub dynamic_query: Option<String>,
  pub category:      Option<String>,
  pub submitter_id:  Option<String>,
  pub origin:        &'static str,
  pub status:        &'static str,
  pub usage_count:   i64,
  pub last_used_at:  Option<String>,
  pub created_at:    String,
}

impl QuestionColumns {
  pub fn encode(q: &Question) -> Result<Self> {
    let (kind, options_json) = match &q.kind {
      QuestionKind::Single => ("single", None),
      QuestionKind::MultipleChoice { options } => {
        ("multiple_choice", Some(serde_json::to_string(options)?))
      }
    };
    let (static_answer, dynamic_query) = match &q.answer {
      AnswerSource::Static(answer) => (Some(answer.clone()), None),
      AnswerSource::Dynamic { query_type } => (None, Some(query_type.clone())),
    };

    Ok(Self {
      question_id: encode_uuid(q.question_id),
      text: q.text.clone(),
      kind,
      options_json,
      static_answer,
      dynamic_query,
      category: q.category.clone(),
      submitter_id: q.submitter_id.as_ref().map(|u| u.0.clone()),
      origin: encode_origin(q.origin),
      status: encode_question_status(q.status),
      usage_count: i64::from(q.usage_count),
      last_used_at: q.last_used_at.map(encode_dt),
      created_at: encode_dt(q.created_at),
    })
  }

  /// Insert this row. Shared by plain inserts and the approval transaction.
  pub fn insert(&self, conn: &rusqlite::Connection) -> rusqlite::Result<usize> {
    conn.execute(
      "INSERT INTO questions (
         question_id, text, kind, options_json, static_answer, dynamic_query,
         category, submitter_id, origin, status, usage_count, last_used_at,
         created_at
       ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
      rusqlite::params![
        self.question_id,
        self.text,
        self.kind,
        self.options_json,
        self.static_answer,
        self.dynamic_query,
        self.category,
        self.submitter_id,
        self.origin,
        self.status,
        self.usage_count,
        self.last_used_at,
        self.created_at,
      ],
    )
  }
}

// ─── Approval columns ─────────────────────────────────────────────────────────

/// The owned column values for one `approval_sessions` row.
pub struct ApprovalColumns {
  pub approval_id:          String,
  pub reviewer_id:          String,
  pub draft_key:            String,
  pub draft_json:           String,
  pub step:                 &'static str,
  pub outcome:              Option<&'static str>,
  pub approved_question_id: Option<String>,
  pub review_message:       Option<String>,
  pub created_at:           String,
  pub last_activity_at:     String,
  pub expires_at:           String,
  pub restart_count:        i64,
  pub revision:             i64,
}

impl ApprovalColumns {
  pub fn encode(a: &ApprovalSession) -> Result<Self> {
    let (step, outcome, approved_question_id) = encode_step(a.step);
    Ok(Self {
      approval_id: encode_uuid(a.approval_id),
      reviewer_id: a.reviewer_id.0.clone(),
      draft_key: a.draft_key.clone(),
      draft_json: serde_json::to_string(&a.draft)?,
      step,
      outcome,
      approved_question_id,
      review_message: a.review_message.as_ref().map(|m| m.0.clone()),
      created_at: encode_dt(a.created_at),
      last_activity_at: encode_dt(a.last_activity_at),
      expires_at: encode_dt(a.expires_at),
      restart_count: i64::from(a.restart_count),
      revision: i64::from(a.revision),
    })
  }

  /// Compare-and-set update of every mutable column. Completed rows are
  /// immutable, so they never match.
  pub fn update_if(
    &self,
    conn: &rusqlite::Connection,
    expected_activity: &str,
  ) -> rusqlite::Result<usize> {
    conn.execute(
      "UPDATE approval_sessions SET
         draft_json = ?2, step = ?3, outcome = ?4, approved_question_id = ?5,
         review_message = ?6, last_activity_at = ?7, expires_at = ?8,
         restart_count = ?9, revision = ?10
       WHERE approval_id = ?1
         AND last_activity_at = ?11
         AND step != 'completed'",
      rusqlite::params![
        self.approval_id,
        self.draft_json,
        self.step,
        self.outcome,
        self.approved_question_id,
        self.review_message,
        self.last_activity_at,
        self.expires_at,
        self.restart_count,
        self.revision,
        expected_activity,
      ],
    )
  }
}

// ─── Row types ───────────────────────────────────────────────────────────────

pub const QUESTION_SELECT: &str = "SELECT
   question_id, text, kind, options_json, static_answer, dynamic_query,
   category, submitter_id, origin, status, usage_count, last_used_at,
   created_at
 FROM questions";

/// Raw values read directly from a `questions` row.
pub struct RawQuestion {
  pub question_id:   String,
  pub text:          String,
  pub kind:          String,
  pub options_json:  Option<String>,
  pub static_answer: Option<String>,
  pub dynamic_query: Option<String>,
  pub category:      Option<String>,
  pub submitter_id:  Option<String>,
  pub origin:        String,
  pub status:        String,
  pub usage_count:   i64,
  pub last_used_at:  Option<String>,
  pub created_at:    String,
}

impl RawQuestion {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      question_id:   row.get(0)?,
      text:          row.get(1)?,
      kind:          row.get(2)?,
      options_json:  row.get(3)?,
      static_answer: row.get(4)?,
      dynamic_query: row.get(5)?,
      category:      row.get(6)?,
      submitter_id:  row.get(7)?,
      origin:        row.get(8)?,
      status:        row.get(9)?,
      usage_count:   row.get(10)?,
      last_used_at:  row.get(11)?,
      created_at:    row.get(12)?,
    })
  }

  pub fn into_question(self) -> Result<Question> {
    let kind = match (self.kind.as_str(), self.options_json) {
      ("single", None) => QuestionKind::Single,
      ("multiple_choice", Some(json)) => QuestionKind::MultipleChoice {
        options: serde_json::from_str(&json)?,
      },
      (other, _) => return Err(unknown("question kind", other)),
    };

    let answer = match (self.static_answer, self.dynamic_query) {
      (Some(answer), None) => AnswerSource::Static(answer),
      (None, Some(query_type)) => AnswerSource::Dynamic { query_type },
      _ => return Err(unknown("answer source", &self.question_id)),
    };

    Ok(Question {
      question_id: decode_uuid(&self.question_id)?,
      text: self.text,
      kind,
      answer,
      category: self.category,
      submitter_id: self.submitter_id.map(UserRef),
      origin: decode_origin(&self.origin)?,
      status: decode_question_status(&self.status)?,
      usage_count: decode_count(self.usage_count)?,
      last_used_at: self.last_used_at.as_deref().map(decode_dt).transpose()?,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

pub const APPROVAL_SELECT: &str = "SELECT
   approval_id, reviewer_id, draft_key, draft_json, step, outcome,
   approved_question_id, review_message, created_at, last_activity_at,
   expires_at, restart_count, revision
 FROM approval_sessions";

/// Raw values read directly from an `approval_sessions` row.
pub struct RawApproval {
  pub approval_id:          String,
  pub reviewer_id:          String,
  pub draft_key:            String,
  pub draft_json:           String,
  pub step:                 String,
  pub outcome:              Option<String>,
  pub approved_question_id: Option<String>,
  pub review_message:       Option<String>,
  pub created_at:           String,
  pub last_activity_at:     String,
  pub expires_at:           String,
  pub restart_count:        i64,
  pub revision:             i64,
}

impl RawApproval {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      approval_id:          row.get(0)?,
      reviewer_id:          row.get(1)?,
      draft_key:            row.get(2)?,
      draft_json:           row.get(3)?,
      step:                 row.get(4)?,
      outcome:              row.get(5)?,
      approved_question_id: row.get(6)?,
      review_message:       row.get(7)?,
      created_at:           row.get(8)?,
      last_activity_at:     row.get(9)?,
      expires_at:           row.get(10)?,
      restart_count:        row.get(11)?,
      revision:             row.get(12)?,
    })
  }

  pub fn into_approval(self) -> Result<ApprovalSession> {
    Ok(ApprovalSession {
      approval_id:      decode_uuid(&self.approval_id)?,
      reviewer_id:      UserRef(self.reviewer_id),
      draft_key:        self.draft_key,
      draft:            serde_json::from_str(&self.draft_json)?,
      step:             decode_step(
        &self.step,
        self.outcome.as_deref(),
        self.approved_question_id.as_deref(),
      )?,
      created_at:       decode_dt(&self.created_at)?,
      last_activity_at: decode_dt(&self.last_activity_at)?,
      expires_at:       decode_dt(&self.expires_at)?,
      restart_count:    decode_count(self.restart_count)?,
      revision:         decode_count(self.revision)?,
      review_message:   self.review_message.map(MessageRef),
    })
  }
}

/// Raw values read directly from a `pending_drafts` row.
pub struct RawPending {
  pub pending_id:  String,
  pub reviewer_id: String,
  pub draft_json:  String,
  pub queued_at:   String,
}

impl RawPending {
  pub fn into_pending(self) -> Result<PendingDraft> {
    Ok(PendingDraft {
      pending_id:  decode_uuid(&self.pending_id)?,
      reviewer_id: UserRef(self.reviewer_id),
      draft:       serde_json::from_str(&self.draft_json)?,
      queued_at:   decode_dt(&self.queued_at)?,
    })
  }
}

pub const SESSION_SELECT: &str = "SELECT
   session_id, question_id, channel, started_by, started_at, ended_at,
   status, question_message, confirmation_message, calculated_answer,
   first_correct_user, participant_count, correct_count
 FROM trivia_sessions";

/// Raw values read directly from a `trivia_sessions` row.
pub struct RawSession {
  pub session_id:           String,
  pub question_id:          String,
  pub channel:              String,
  pub started_by:           String,
  pub started_at:           String,
  pub ended_at:             Option<String>,
  pub status:               String,
  pub question_message:     Option<String>,
  pub confirmation_message: Option<String>,
  pub calculated_answer:    Option<String>,
  pub first_correct_user:   Option<String>,
  pub participant_count:    i64,
  pub correct_count:        i64,
}

impl RawSession {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      session_id:           row.get(0)?,
      question_id:          row.get(1)?,
      channel:              row.get(2)?,
      started_by:           row.get(3)?,
      started_at:           row.get(4)?,
      ended_at:             row.get(5)?,
      status:               row.get(6)?,
      question_message:     row.get(7)?,
      confirmation_message: row.get(8)?,
      calculated_answer:    row.get(9)?,
      first_correct_user:   row.get(10)?,
      participant_count:    row.get(11)?,
      correct_count:        row.get(12)?,
    })
  }

  pub fn into_session(self) -> Result<TriviaSession> {
    let calculated_answer: Option<CalculatedAnswer> = self
      .calculated_answer
      .as_deref()
      .map(serde_json::from_str)
      .transpose()?;

    Ok(TriviaSession {
      session_id: decode_uuid(&self.session_id)?,
      question_id: decode_uuid(&self.question_id)?,
      channel: ChannelRef(self.channel),
      started_by: UserRef(self.started_by),
      started_at: decode_dt(&self.started_at)?,
      ended_at: self.ended_at.as_deref().map(decode_dt).transpose()?,
      status: decode_session_status(&self.status)?,
      question_message: self.question_message.map(MessageRef),
      confirmation_message: self.confirmation_message.map(MessageRef),
      calculated_answer,
      first_correct_user: self.first_correct_user.map(UserRef),
      participant_count: decode_count(self.participant_count)?,
      correct_count: decode_count(self.correct_count)?,
    })
  }
}

pub const ANSWER_SELECT: &str = "SELECT
   answer_id, session_id, user_id, raw_text, normalized_text, submitted_at,
   seq, is_correct, is_first_correct, has_conflict, is_close
 FROM answers";

/// Raw values read directly from an `answers` row.
pub struct RawAnswer {
  pub answer_id:        String,
  pub session_id:       String,
  pub user_id:          String,
  pub raw_text:         String,
  pub normalized_text:  String,
  pub submitted_at:     String,
  pub sequence:         i64,
  pub is_correct:       Option<bool>,
  pub is_first_correct: bool,
  pub has_conflict:     bool,
  pub is_close:         bool,
}

impl RawAnswer {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      answer_id:        row.get(0)?,
      session_id:       row.get(1)?,
      user_id:          row.get(2)?,
      raw_text:         row.get(3)?,
      normalized_text:  row.get(4)?,
      submitted_at:     row.get(5)?,
      sequence:         row.get(6)?,
      is_correct:       row.get(7)?,
      is_first_correct: row.get(8)?,
      has_conflict:     row.get(9)?,
      is_close:         row.get(10)?,
    })
  }

  pub fn into_answer(self) -> Result<Answer> {
    Ok(Answer {
      answer_id:        decode_uuid(&self.answer_id)?,
      session_id:       decode_uuid(&self.session_id)?,
      user_id:          UserRef(self.user_id),
      raw_text:         self.raw_text,
      normalized_text:  self.normalized_text,
      submitted_at:     decode_dt(&self.submitted_at)?,
      sequence:         self.sequence,
      is_correct:       self.is_correct,
      is_first_correct: self.is_first_correct,
      has_conflict:     self.has_conflict,
      is_close:         self.is_close,
    })
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  #[test]
  fn timestamps_sort_lexically() {
    let a = Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap();
    let b = a + chrono::Duration::milliseconds(5);
    assert!(encode_dt(a) < encode_dt(b));
    assert_eq!(encode_dt(a), "2026-01-01T09:00:00.000Z");
    assert_eq!(decode_dt(&encode_dt(b)).unwrap(), b);
  }

  #[test]
  fn step_columns() {
    let id = Uuid::new_v4();
    let step = ApprovalStep::Completed(ApprovalOutcome::Approved { question_id: id });
    let (s, o, q) = encode_step(step);
    assert_eq!(decode_step(s, o, q.as_deref()).unwrap(), step);
    assert!(decode_step("completed", None, None).is_err());
    assert!(decode_step("editing", Some("rejected"), None).is_err());
  }
}
