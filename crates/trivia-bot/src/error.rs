//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use trivia_engine::ErrorKind;

/// An error returned by a handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("missing x-user-id header")]
  Unauthenticated,

  #[error("forbidden: {0}")]
  Forbidden(String),

  #[error(transparent)]
  Engine(#[from] trivia_engine::Error),
}

impl ApiError {
  fn status(&self) -> StatusCode {
    use trivia_engine::Error as E;

    match self {
      ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
      ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
      ApiError::Engine(E::Draft(_)) => StatusCode::UNPROCESSABLE_ENTITY,
      ApiError::Engine(E::ApprovalExpired(_)) => StatusCode::GONE,
      ApiError::Engine(e) => match e.kind() {
        ErrorKind::Validation => StatusCode::CONFLICT,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Transient => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Fatal => StatusCode::INTERNAL_SERVER_ERROR,
      },
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      tracing::error!(error = %self, "request failed");
    }
    (status, Json(json!({ "error": self.to_string() }))).into_response()
  }
}

#[cfg(test)]
mod tests {
  use trivia_core::UserRef;
  use uuid::Uuid;

  use super::*;

  #[test]
  fn engine_errors_map_by_kind() {
    let cases = [
      (trivia_engine::Error::SessionAlreadyActive, StatusCode::CONFLICT),
      (
        trivia_engine::Error::DuplicateAnswer(UserRef::new("a")),
        StatusCode::CONFLICT,
      ),
      (trivia_engine::Error::PoolExhausted, StatusCode::NOT_FOUND),
      (
        trivia_engine::Error::ApprovalExpired(Uuid::nil()),
        StatusCode::GONE,
      ),
      (
        trivia_engine::Error::Contended("question status"),
        StatusCode::SERVICE_UNAVAILABLE,
      ),
      (
        trivia_engine::Error::Draft(trivia_core::Error::EmptyQuestion),
        StatusCode::UNPROCESSABLE_ENTITY,
      ),
      (
        trivia_engine::Error::CloseFailed {
          session: Uuid::nil(),
          source:  Box::new(trivia_engine::Error::QuestionNotFound(Uuid::nil())),
        },
        StatusCode::INTERNAL_SERVER_ERROR,
      ),
    ];
    for (err, status) in cases {
      assert_eq!(ApiError::from(err).status(), status);
    }
  }
}
