//! `POST /events/reply`: a chat reply forwarded by the bridge.

use axum::{Json, extract::State, http::StatusCode};
use trivia_core::{
  ports::{ChatTransport, DraftGenerator},
  session::ReplyEvent,
};
use trivia_engine::Recorded;

use crate::{AppState, error::ApiError};

pub async fn reply<T, G>(
  State(state): State<AppState<T, G>>,
  Json(event): Json<ReplyEvent>,
) -> Result<(StatusCode, Json<Recorded>), ApiError>
where
  T: ChatTransport + 'static,
  G: DraftGenerator + 'static,
{
  let recorded = state.engine.handle_reply(event).await?;
  Ok((StatusCode::ACCEPTED, Json(recorded)))
}
