//! Caller identity extractors.
//!
//! The chat bridge authenticates users and forwards their id in the
//! `x-user-id` header. Moderator-only routes additionally require the id to
//! be in the configured moderator set.

use axum::{extract::FromRequestParts, http::request::Parts};
use trivia_core::{
  UserRef,
  ports::{ChatTransport, DraftGenerator},
};

use crate::{AppState, error::ApiError};

pub const USER_HEADER: &str = "x-user-id";

/// Any identified caller.
pub struct Caller(pub UserRef);

/// A caller who may run rounds and manage the pool.
pub struct Moderator(pub UserRef);

fn user_from(parts: &Parts) -> Result<UserRef, ApiError> {
  parts
    .headers
    .get(USER_HEADER)
    .and_then(|v| v.to_str().ok())
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .map(UserRef::new)
    .ok_or(ApiError::Unauthenticated)
}

impl<T, G> FromRequestParts<AppState<T, G>> for Caller
where
  T: ChatTransport + 'static,
  G: DraftGenerator + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    _state: &AppState<T, G>,
  ) -> Result<Self, Self::Rejection> {
    user_from(parts).map(Caller)
  }
}

impl<T, G> FromRequestParts<AppState<T, G>> for Moderator
where
  T: ChatTransport + 'static,
  G: DraftGenerator + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<T, G>,
  ) -> Result<Self, Self::Rejection> {
    let user = user_from(parts)?;
    if !state.moderators.contains(&user) {
      tracing::warn!(user = %user, path = %parts.uri.path(), "moderator route refused");
      return Err(ApiError::Forbidden(format!("{user} is not a moderator")));
    }
    Ok(Moderator(user))
  }
}
