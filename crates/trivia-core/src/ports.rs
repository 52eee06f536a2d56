//! Collaborators outside the engine: the chat transport, the
//! game-statistics service and the draft generator.

use std::{future::Future, time::Duration};

use thiserror::Error;

use crate::{ChannelRef, MessageRef, question::QuestionDraft};

/// Failure of an external collaborator.
#[derive(Debug, Error)]
pub enum PortError {
  #[error("timed out after {0:?}")]
  Timeout(Duration),

  #[error("unavailable: {0}")]
  Unavailable(String),

  #[error("rejected: {0}")]
  Rejected(String),
}

impl PortError {
  pub fn is_transient(&self) -> bool {
    matches!(self, Self::Timeout(_) | Self::Unavailable(_))
  }
}

/// Outbound side of the chat platform.
pub trait ChatTransport: Send + Sync {
  fn post_message<'a>(
    &'a self,
    channel: &'a ChannelRef,
    content: &'a str,
  ) -> impl Future<Output = Result<MessageRef, PortError>> + Send + 'a;

  fn react_to<'a>(
    &'a self,
    message: &'a MessageRef,
    symbol: &'a str,
  ) -> impl Future<Output = Result<(), PortError>> + Send + 'a;
}

/// Read-only queries against the game-statistics store.
pub trait StatsService: Send + Sync {
  fn compute_stat<'a>(
    &'a self,
    query_type: &'a str,
  ) -> impl Future<Output = Result<String, PortError>> + Send + 'a;
}

/// The AI question writer.
pub trait DraftGenerator: Send + Sync {
  fn generate_draft<'a>(
    &'a self,
    category: Option<&'a str>,
  ) -> impl Future<Output = Result<QuestionDraft, PortError>> + Send + 'a;
}
