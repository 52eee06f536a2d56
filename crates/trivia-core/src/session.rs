//! Trivia sessions: one question, asked once, in one channel.
//!
//! At most one session is `Active` system-wide. `Completed` and `Expired`
//! are terminal and the record is immutable afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{ChannelRef, MessageRef, UserRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
  Active,
  Completed,
  /// Closed abnormally; results were not (fully) recorded.
  Expired,
}

/// The ground truth a session was judged against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CalculatedAnswer {
  Resolved { value: String },
  /// The statistics service could not produce an answer in time.
  Unresolved { reason: String },
}

impl CalculatedAnswer {
  pub fn value(&self) -> Option<&str> {
    match self {
      Self::Resolved { value } => Some(value),
      Self::Unresolved { .. } => None,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriviaSession {
  pub session_id:           Uuid,
  pub question_id:          Uuid,
  pub channel:              ChannelRef,
  pub started_by:           UserRef,
  pub started_at:           DateTime<Utc>,
  pub ended_at:             Option<DateTime<Utc>>,
  pub status:               SessionStatus,
  /// The posted question; replies to it are answers.
  pub question_message:     Option<MessageRef>,
  /// The follow-up confirmation post; replies to it count too.
  pub confirmation_message: Option<MessageRef>,
  pub calculated_answer:    Option<CalculatedAnswer>,
  pub first_correct_user:   Option<UserRef>,
  pub participant_count:    u32,
  pub correct_count:        u32,
}

impl TriviaSession {
  /// A new active session with no recorded message refs yet.
  pub fn new(
    question_id: Uuid,
    channel: ChannelRef,
    started_by: UserRef,
    started_at: DateTime<Utc>,
  ) -> Self {
    Self {
      session_id: Uuid::new_v4(),
      question_id,
      channel,
      started_by,
      started_at,
      ended_at: None,
      status: SessionStatus::Active,
      question_message: None,
      confirmation_message: None,
      calculated_answer: None,
      first_correct_user: None,
      participant_count: 0,
      correct_count: 0,
    }
  }

  pub fn is_active(&self) -> bool { self.status == SessionStatus::Active }

  /// Whether a reply to `message` belongs to this session.
  pub fn correlates(&self, message: &MessageRef) -> bool {
    self.question_message.as_ref() == Some(message)
      || self.confirmation_message.as_ref() == Some(message)
  }
}

/// Everything decided when a session closes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionResult {
  pub session_id:         Uuid,
  pub question_id:        Uuid,
  pub calculated_answer:  CalculatedAnswer,
  pub first_correct_user: Option<UserRef>,
  pub participant_count:  u32,
  pub correct_count:      u32,
  /// Eligible correct answerers in submission order.
  pub correct_users:      Vec<UserRef>,
  /// The question's submitter, if they answered.
  pub conflicted_users:   Vec<UserRef>,
  /// Near misses, for feedback only.
  pub close_users:        Vec<UserRef>,
}

/// An inbound reply from the chat transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyEvent {
  pub author_id:              UserRef,
  pub text:                   String,
  pub replied_to_message_ref: MessageRef,
  pub timestamp:              DateTime<Utc>,
  /// The reply itself, when the transport can react to it.
  #[serde(default)]
  pub message_ref:            Option<MessageRef>,
}
