//! Engine error type and its retry classification.

use thiserror::Error;
use trivia_core::{UserRef, ports::PortError, store::StoreError};
use uuid::Uuid;

/// How a caller should react to an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  /// Contention or a slow collaborator; worth retrying.
  Transient,
  /// The request itself is wrong; rejected without retry.
  Validation,
  /// A stale, expired or missing reference; the caller must start over.
  NotFound,
  /// Retries exhausted or state diverged; the affected session has been
  /// forced to its terminal expired state.
  Fatal,
}

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid draft: {0}")]
  Draft(#[from] trivia_core::Error),

  #[error("store error: {source}")]
  Store {
    transient: bool,
    #[source]
    source:    Box<dyn std::error::Error + Send + Sync>,
  },

  #[error("collaborator error: {0}")]
  Port(#[from] PortError),

  /// A conditional write lost its race or a read-back did not match.
  #[error("{0} was contended")]
  Contended(&'static str),

  #[error("{what} failed after {attempts} attempts: {source}")]
  RetriesExhausted {
    what:     &'static str,
    attempts: u32,
    #[source]
    source:   Box<Error>,
  },

  /// Closing failed part-way; the session was expired instead.
  #[error("trivia session {session} could not be closed: {source}")]
  CloseFailed {
    session: Uuid,
    #[source]
    source:  Box<Error>,
  },

  #[error("no available questions")]
  PoolExhausted,

  #[error("question {0} not found")]
  QuestionNotFound(Uuid),

  #[error("approval session {0} not found")]
  ApprovalNotFound(Uuid),

  #[error("approval session {0} has expired")]
  ApprovalExpired(Uuid),

  #[error("approval session {0} is already completed")]
  ApprovalCompleted(Uuid),

  #[error("reviewer {0} has no delivery channel; draft queued")]
  ReviewerUnreachable(UserRef),

  #[error("reviewer {0} already has an open review of this draft")]
  DuplicateReview(UserRef),

  #[error("a trivia session is already active")]
  SessionAlreadyActive,

  #[error("trivia session {0} not found")]
  SessionNotFound(Uuid),

  #[error("trivia session {0} is not active")]
  SessionNotActive(Uuid),

  #[error("reply does not belong to a trivia session")]
  UncorrelatedReply,

  #[error("{0} already answered this question")]
  DuplicateAnswer(UserRef),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
  /// Wrap a backend error, remembering whether it is worth retrying.
  pub fn store<E: StoreError>(e: E) -> Self {
    Self::Store {
      transient: e.is_transient(),
      source:    Box::new(e),
    }
  }

  pub fn kind(&self) -> ErrorKind {
    match self {
      Error::Store { transient: true, .. } | Error::Contended(_) => {
        ErrorKind::Transient
      }
      Error::Store { transient: false, .. }
      | Error::RetriesExhausted { .. }
      | Error::CloseFailed { .. } => ErrorKind::Fatal,
      Error::Port(e) if e.is_transient() => ErrorKind::Transient,
      Error::Port(_) => ErrorKind::Validation,
      Error::Draft(_)
      | Error::ApprovalCompleted(_)
      | Error::DuplicateReview(_)
      | Error::SessionAlreadyActive
      | Error::UncorrelatedReply
      | Error::DuplicateAnswer(_) => ErrorKind::Validation,
      Error::PoolExhausted
      | Error::QuestionNotFound(_)
      | Error::ApprovalNotFound(_)
      | Error::ApprovalExpired(_)
      | Error::ReviewerUnreachable(_)
      | Error::SessionNotFound(_)
      | Error::SessionNotActive(_) => ErrorKind::NotFound,
    }
  }

  pub fn is_transient(&self) -> bool { self.kind() == ErrorKind::Transient }
}

#[cfg(test)]
mod tests {
  use std::time::Duration;

  use super::*;

  #[test]
  fn classification() {
    assert_eq!(Error::Contended("approval").kind(), ErrorKind::Transient);
    assert_eq!(
      Error::Port(PortError::Timeout(Duration::from_secs(1))).kind(),
      ErrorKind::Transient
    );
    assert_eq!(
      Error::Port(PortError::Rejected("nope".into())).kind(),
      ErrorKind::Validation
    );
    assert_eq!(
      Error::DuplicateAnswer(UserRef::new("u")).kind(),
      ErrorKind::Validation
    );
    assert_eq!(Error::PoolExhausted.kind(), ErrorKind::NotFound);
    assert_eq!(
      Error::ApprovalExpired(Uuid::nil()).kind(),
      ErrorKind::NotFound
    );

    let exhausted = Error::RetriesExhausted {
      what:     "mark answered",
      attempts: 3,
      source:   Box::new(Error::Contended("question status")),
    };
    assert_eq!(exhausted.kind(), ErrorKind::Fatal);
    assert!(exhausted.to_string().contains("after 3 attempts"));

    let close = Error::CloseFailed {
      session: Uuid::nil(),
      source:  Box::new(Error::QuestionNotFound(Uuid::nil())),
    };
    assert_eq!(close.kind(), ErrorKind::Fatal);
  }
}
