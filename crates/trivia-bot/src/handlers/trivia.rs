//! Handlers for `/trivia` endpoints.

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
};
use serde::Deserialize;
use trivia_core::{
  ChannelRef,
  ports::{ChatTransport, DraftGenerator},
  question::SelectionPriority,
  session::{SessionResult, TriviaSession},
};
use uuid::Uuid;

use crate::{AppState, auth::Moderator, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct StartBody {
  pub channel:  ChannelRef,
  #[serde(default)]
  pub priority: Option<SelectionPriority>,
}

/// `POST /trivia/start`, body: `{"channel":"general"}`
pub async fn start<T, G>(
  State(state): State<AppState<T, G>>,
  Moderator(moderator): Moderator,
  Json(body): Json<StartBody>,
) -> Result<(StatusCode, Json<TriviaSession>), ApiError>
where
  T: ChatTransport + 'static,
  G: DraftGenerator + 'static,
{
  let session = state
    .engine
    .start_trivia(body.channel, moderator, body.priority)
    .await?;
  Ok((StatusCode::CREATED, Json(session)))
}

/// `GET /trivia/active`, `null` when no round is running.
pub async fn active<T, G>(
  State(state): State<AppState<T, G>>,
) -> Result<Json<Option<TriviaSession>>, ApiError>
where
  T: ChatTransport + 'static,
  G: DraftGenerator + 'static,
{
  Ok(Json(state.engine.sessions().active().await?))
}

/// `POST /trivia/{id}/close`
pub async fn close<T, G>(
  State(state): State<AppState<T, G>>,
  Moderator(moderator): Moderator,
  Path(id): Path<Uuid>,
) -> Result<Json<SessionResult>, ApiError>
where
  T: ChatTransport + 'static,
  G: DraftGenerator + 'static,
{
  tracing::info!(session_id = %id, moderator = %moderator, "close requested");
  Ok(Json(state.engine.close_trivia(id).await?))
}
