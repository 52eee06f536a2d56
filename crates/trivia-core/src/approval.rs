//! Approval sessions: the human-in-the-loop review of question drafts.
//!
//! ```text
//! AwaitingDecision ──approve──▶ Completed(Approved)
//!        │  ▲      ──reject───▶ Completed(Rejected)
//!   edit │  │ edit submitted
//!        ▼  │
//!      Editing
//!
//! any non-completed step ──now > expires_at──▶ Completed(Expired)
//! ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{MessageRef, UserRef, question::QuestionDraft};

/// How long a review stays open without activity, in hours.
pub const DEFAULT_APPROVAL_TTL_HOURS: i64 = 24;

/// Terminal result of a review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ApprovalOutcome {
  /// The draft was published to the pool under this id.
  Approved { question_id: Uuid },
  Rejected,
  Expired,
}

/// Where a review currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum ApprovalStep {
  AwaitingDecision,
  /// An edit has been accepted and is being shown back to the reviewer.
  Editing,
  Completed(ApprovalOutcome),
}

impl ApprovalStep {
  pub fn is_open(&self) -> bool { !matches!(self, Self::Completed(_)) }

  pub fn outcome(&self) -> Option<ApprovalOutcome> {
    match self {
      Self::Completed(outcome) => Some(*outcome),
      _ => None,
    }
  }
}

/// A reviewer's decision on an open session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ReviewAction {
  Approve,
  /// Replace the draft wholesale.
  Edit { draft: QuestionDraft },
  Reject,
}

impl ReviewAction {
  pub fn name(&self) -> &'static str {
    match self {
      Self::Approve => "approve",
      Self::Edit { .. } => "edit",
      Self::Reject => "reject",
    }
  }
}

/// A durable review record. Survives process restarts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalSession {
  pub approval_id:      Uuid,
  pub reviewer_id:      UserRef,
  /// Identity of the draft as submitted; unchanged by edits.
  pub draft_key:        String,
  pub draft:            QuestionDraft,
  pub step:             ApprovalStep,
  pub created_at:       DateTime<Utc>,
  pub last_activity_at: DateTime<Utc>,
  pub expires_at:       DateTime<Utc>,
  pub restart_count:    u32,
  /// Number of accepted edits.
  pub revision:         u32,
  /// The last message used to show this review to the reviewer.
  pub review_message:   Option<MessageRef>,
}

impl ApprovalSession {
  /// A fresh session awaiting the reviewer's first decision.
  pub fn new(
    reviewer_id: UserRef,
    draft: QuestionDraft,
    now: DateTime<Utc>,
    ttl: Duration,
  ) -> Self {
    Self {
      approval_id: Uuid::new_v4(),
      reviewer_id,
      draft_key: draft.draft_key(),
      draft,
      step: ApprovalStep::AwaitingDecision,
      created_at: now,
      last_activity_at: now,
      expires_at: now + ttl,
      restart_count: 0,
      revision: 0,
      review_message: None,
    }
  }

  pub fn is_open(&self) -> bool { self.step.is_open() }

  /// Open and past its expiry.
  pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
    self.is_open() && now > self.expires_at
  }

  /// Record reviewer activity: pushes the expiry window forward.
  pub fn touch(&mut self, now: DateTime<Utc>, ttl: Duration) {
    self.last_activity_at = now;
    self.expires_at = now + ttl;
  }
}

/// A draft that could not be routed because its reviewer was unreachable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingDraft {
  pub pending_id:  Uuid,
  pub reviewer_id: UserRef,
  pub draft:       QuestionDraft,
  pub queued_at:   DateTime<Utc>,
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  fn session(now: DateTime<Utc>) -> ApprovalSession {
    ApprovalSession::new(
      UserRef::new("reviewer"),
      QuestionDraft::single("Master Chief's game?", "Halo"),
      now,
      Duration::hours(DEFAULT_APPROVAL_TTL_HOURS),
    )
  }

  #[test]
  fn expiry_is_measured_from_last_activity() {
    let t0 = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    let mut s = session(t0);
    assert_eq!(s.expires_at, t0 + Duration::hours(24));
    assert!(!s.is_expired_at(t0 + Duration::hours(23)));
    assert!(s.is_expired_at(t0 + Duration::hours(25)));

    s.touch(t0 + Duration::hours(20), Duration::hours(DEFAULT_APPROVAL_TTL_HOURS));
    assert!(!s.is_expired_at(t0 + Duration::hours(25)));
    assert!(s.is_expired_at(t0 + Duration::hours(45)));
  }

  #[test]
  fn completed_sessions_never_expire() {
    let t0 = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    let mut s = session(t0);
    s.step = ApprovalStep::Completed(ApprovalOutcome::Rejected);
    assert!(!s.is_expired_at(t0 + Duration::days(30)));
  }

  #[test]
  fn review_action_serde() {
    let action: ReviewAction =
      serde_json::from_str(r#"{"action":"approve"}"#).unwrap();
    assert_eq!(action, ReviewAction::Approve);
    assert_eq!(action.name(), "approve");
  }
}
