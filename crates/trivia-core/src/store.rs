//! The `TriviaStore` trait.
//!
//! The trait is implemented by storage backends (e.g. `trivia-store-sqlite`).
//! The engine depends on this abstraction, not on any concrete backend.
//!
//! Every invariant that must hold under concurrent access is pushed down to
//! the store as an atomic operation: insert-if-absent for answers and active
//! sessions, compare-and-set on `last_activity_at` for approvals, and
//! `status = active` guards on every session write. Lost races are reported
//! through the return value (`None`, `false`, [`AnswerInsert`]), never as
//! errors.

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  ChannelRef, MessageRef, UserRef,
  answer::{Answer, AnswerInsert, AnswerVerdict, NewAnswer},
  approval::{ApprovalSession, PendingDraft},
  question::{Question, QuestionStatus, SelectionPriority},
  session::{SessionResult, TriviaSession},
};

/// Backend errors must say whether retrying could help.
pub trait StoreError: std::error::Error + Send + Sync + 'static {
  /// Contention or other conditions expected to clear on their own.
  fn is_transient(&self) -> bool;
}

/// Abstraction over a trivia store backend.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait TriviaStore: Send + Sync {
  type Error: StoreError;

  // ── Questions ─────────────────────────────────────────────────────────

  /// Persist a new question.
  fn insert_question(
    &self,
    question: Question,
  ) -> impl Future<Output = Result<Question, Self::Error>> + Send + '_;

  /// Retrieve a question by UUID. Returns `None` if not found.
  fn get_question(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Question>, Self::Error>> + Send + '_;

  /// List questions, optionally filtered by status, oldest first.
  fn list_questions(
    &self,
    status: Option<QuestionStatus>,
  ) -> impl Future<Output = Result<Vec<Question>, Self::Error>> + Send + '_;

  /// The next `Available` question under `priority`, if any.
  fn next_available(
    &self,
    priority: SelectionPriority,
  ) -> impl Future<Output = Result<Option<Question>, Self::Error>> + Send + '_;

  /// Overwrite a question's status. Returns `false` if the question does not
  /// exist.
  fn set_question_status(
    &self,
    id: Uuid,
    status: QuestionStatus,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Increment `usage_count` and set `last_used_at`. Returns `false` if the
  /// question does not exist.
  fn record_question_usage(
    &self,
    id: Uuid,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Approvals ─────────────────────────────────────────────────────────

  /// Persist a new approval session. Returns `None` if an open session
  /// already exists for the same reviewer and draft key.
  fn insert_approval(
    &self,
    approval: ApprovalSession,
  ) -> impl Future<Output = Result<Option<ApprovalSession>, Self::Error>> + Send + '_;

  fn get_approval(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<ApprovalSession>, Self::Error>> + Send + '_;

  /// All sessions that have not completed, oldest first.
  fn open_approvals(
    &self,
  ) -> impl Future<Output = Result<Vec<ApprovalSession>, Self::Error>> + Send + '_;

  /// Open sessions whose `expires_at` is before `now`.
  fn expired_approvals(
    &self,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<Vec<ApprovalSession>, Self::Error>> + Send + '_;

  /// Write every mutable field of `approval`, but only if the stored
  /// `last_activity_at` still equals `expected_activity`. Returns `false`
  /// when another writer got there first.
  fn update_approval(
    &self,
    approval: ApprovalSession,
    expected_activity: DateTime<Utc>,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Atomically publish `question` and write `approval` (which must be
  /// completed as approved), under the same compare-and-set rule as
  /// [`Self::update_approval`]. Nothing is written when it returns `false`.
  fn approve_draft(
    &self,
    approval: ApprovalSession,
    expected_activity: DateTime<Utc>,
    question: Question,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  fn queue_pending_draft(
    &self,
    pending: PendingDraft,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Queued drafts, oldest first.
  fn pending_drafts(
    &self,
  ) -> impl Future<Output = Result<Vec<PendingDraft>, Self::Error>> + Send + '_;

  fn remove_pending_draft(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Reviewer channels ─────────────────────────────────────────────────

  /// Record where `reviewer` receives review cards, replacing any earlier
  /// channel.
  fn save_reviewer_channel(
    &self,
    reviewer: UserRef,
    channel: ChannelRef,
    registered_at: DateTime<Utc>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn delete_reviewer_channel(
    &self,
    reviewer: UserRef,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  fn reviewer_channels(
    &self,
  ) -> impl Future<Output = Result<Vec<(UserRef, ChannelRef)>, Self::Error>> + Send + '_;

  // ── Trivia sessions ───────────────────────────────────────────────────

  /// Persist a new active session. Returns `None` if another session is
  /// already active.
  fn create_session(
    &self,
    session: TriviaSession,
  ) -> impl Future<Output = Result<Option<TriviaSession>, Self::Error>> + Send + '_;

  fn get_session(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<TriviaSession>, Self::Error>> + Send + '_;

  fn active_session(
    &self,
  ) -> impl Future<Output = Result<Option<TriviaSession>, Self::Error>> + Send + '_;

  /// The most recent session whose question or confirmation message is
  /// `message`.
  fn find_session_by_message(
    &self,
    message: MessageRef,
  ) -> impl Future<Output = Result<Option<TriviaSession>, Self::Error>> + Send + '_;

  /// Record both message refs. Returns `false` unless the session exists and
  /// is active.
  fn set_message_refs(
    &self,
    id: Uuid,
    question: MessageRef,
    confirmation: MessageRef,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Atomically write all answer verdicts and move the session to
  /// `Completed`. Returns `false` (writing nothing) unless the session is
  /// still active.
  fn complete_session(
    &self,
    result: SessionResult,
    verdicts: Vec<AnswerVerdict>,
    ended_at: DateTime<Utc>,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Move an active session to `Expired`. Returns `false` unless it was
  /// active.
  fn expire_session(
    &self,
    id: Uuid,
    ended_at: DateTime<Utc>,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Answers ───────────────────────────────────────────────────────────

  /// Insert an answer, stamping `submitted_at` and `sequence` at the moment
  /// the write is accepted. Nothing is written if this user already answered
  /// in this session or the session is no longer active.
  fn insert_answer(
    &self,
    answer: NewAnswer,
  ) -> impl Future<Output = Result<AnswerInsert, Self::Error>> + Send + '_;

  /// All answers for a session ordered by `(submitted_at, sequence)`.
  fn answers_for_session(
    &self,
    session_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Answer>, Self::Error>> + Send + '_;
}
