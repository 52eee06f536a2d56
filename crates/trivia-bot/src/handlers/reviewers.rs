//! `PUT`/`DELETE /reviewers/{id}`: where a reviewer receives review cards.
//! Registrations are stored and restored on the next start.

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
};
use serde::Deserialize;
use serde_json::{Value, json};
use trivia_core::{
  ChannelRef, UserRef,
  ports::{ChatTransport, DraftGenerator},
};

use crate::{AppState, auth::Moderator, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct RegisterBody {
  pub channel: ChannelRef,
}

/// Register the channel, then route any drafts queued for this reviewer.
pub async fn register<T, G>(
  State(state): State<AppState<T, G>>,
  _: Moderator,
  Path(reviewer): Path<UserRef>,
  Json(body): Json<RegisterBody>,
) -> Result<Json<Value>, ApiError>
where
  T: ChatTransport + 'static,
  G: DraftGenerator + 'static,
{
  let flushed = state
    .engine
    .approvals()
    .register_reviewer(reviewer.clone(), body.channel)
    .await?;
  tracing::info!(reviewer = %reviewer, flushed, "reviewer registered");
  Ok(Json(json!({ "reviewer": reviewer, "flushed": flushed })))
}

pub async fn unregister<T, G>(
  State(state): State<AppState<T, G>>,
  _: Moderator,
  Path(reviewer): Path<UserRef>,
) -> Result<StatusCode, ApiError>
where
  T: ChatTransport + 'static,
  G: DraftGenerator + 'static,
{
  state.engine.approvals().unregister_reviewer(&reviewer).await?;
  tracing::info!(reviewer = %reviewer, "reviewer unregistered");
  Ok(StatusCode::NO_CONTENT)
}
