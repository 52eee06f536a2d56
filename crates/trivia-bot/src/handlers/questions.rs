//! Handlers for `/questions` endpoints.

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
};
use serde::Deserialize;
use trivia_core::{
  ports::{ChatTransport, DraftGenerator},
  question::{Question, QuestionStatus},
};
use uuid::Uuid;

use crate::{AppState, auth::Moderator, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub status: Option<QuestionStatus>,
}

/// `GET /questions[?status=available|answered|retired]`
pub async fn list<T, G>(
  State(state): State<AppState<T, G>>,
  _: Moderator,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Question>>, ApiError>
where
  T: ChatTransport + 'static,
  G: DraftGenerator + 'static,
{
  Ok(Json(state.engine.pool().list(params.status).await?))
}

/// `POST /questions/{id}/retire`
pub async fn retire<T, G>(
  State(state): State<AppState<T, G>>,
  Moderator(moderator): Moderator,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  T: ChatTransport + 'static,
  G: DraftGenerator + 'static,
{
  state.engine.pool().retire(id).await?;
  tracing::info!(question_id = %id, moderator = %moderator, "question retired");
  Ok(StatusCode::NO_CONTENT)
}
