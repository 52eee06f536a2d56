//! Handlers for `/approvals` endpoints.

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use trivia_core::{
  UserRef,
  approval::{ApprovalSession, PendingDraft, ReviewAction},
  ports::{ChatTransport, DraftGenerator},
  question::QuestionDraft,
};
use uuid::Uuid;

use crate::{
  AppState,
  auth::{Caller, Moderator},
  error::ApiError,
};

fn created_or_queued(result: trivia_engine::Result<ApprovalSession>) -> Result<Response, ApiError> {
  match result {
    Ok(session) => Ok((StatusCode::CREATED, Json(session)).into_response()),
    Err(trivia_engine::Error::ReviewerUnreachable(reviewer)) => Ok(
      (
        StatusCode::ACCEPTED,
        Json(json!({ "queued": true, "reviewer": reviewer })),
      )
        .into_response(),
    ),
    Err(e) => Err(e.into()),
  }
}

// ─── Submit ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SubmitBody {
  pub reviewer: UserRef,
  pub draft:    QuestionDraft,
}

/// `POST /approvals`. `201` with the session, or `202` when the reviewer is
/// unreachable and the draft was queued.
pub async fn submit<T, G>(
  State(state): State<AppState<T, G>>,
  _: Moderator,
  Json(body): Json<SubmitBody>,
) -> Result<Response, ApiError>
where
  T: ChatTransport + 'static,
  G: DraftGenerator + 'static,
{
  created_or_queued(state.engine.approvals().submit(body.draft, body.reviewer).await)
}

#[derive(Debug, Deserialize)]
pub struct GenerateBody {
  pub reviewer: UserRef,
  #[serde(default)]
  pub category: Option<String>,
}

/// `POST /approvals/generate`
pub async fn generate<T, G>(
  State(state): State<AppState<T, G>>,
  _: Moderator,
  Json(body): Json<GenerateBody>,
) -> Result<Response, ApiError>
where
  T: ChatTransport + 'static,
  G: DraftGenerator + 'static,
{
  created_or_queued(
    state
      .engine
      .approvals()
      .generate_and_submit(body.reviewer, body.category)
      .await,
  )
}

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct Listing {
  pub open:    Vec<ApprovalSession>,
  pub pending: Vec<PendingDraft>,
}

/// `GET /approvals`
pub async fn list<T, G>(
  State(state): State<AppState<T, G>>,
  _: Moderator,
) -> Result<Json<Listing>, ApiError>
where
  T: ChatTransport + 'static,
  G: DraftGenerator + 'static,
{
  let approvals = state.engine.approvals();
  Ok(Json(Listing {
    open:    approvals.open().await?,
    pending: approvals.pending().await?,
  }))
}

// ─── Decide / resubmit ────────────────────────────────────────────────────────

/// `POST /approvals/{id}/decide`, body: `{"action":"approve"}`,
/// `{"action":"reject"}` or `{"action":"edit","draft":{...}}`.
pub async fn decide<T, G>(
  State(state): State<AppState<T, G>>,
  Caller(caller): Caller,
  Path(id): Path<Uuid>,
  Json(action): Json<ReviewAction>,
) -> Result<Json<ApprovalSession>, ApiError>
where
  T: ChatTransport + 'static,
  G: DraftGenerator + 'static,
{
  let approvals = state.engine.approvals();
  let session = approvals.get(id).await?;
  if session.reviewer_id != caller {
    return Err(ApiError::Forbidden(format!(
      "review {id} is assigned to {}",
      session.reviewer_id
    )));
  }
  Ok(Json(approvals.decide(id, action).await?))
}

/// `POST /approvals/{id}/resubmit`
pub async fn resubmit<T, G>(
  State(state): State<AppState<T, G>>,
  Caller(caller): Caller,
  Path(id): Path<Uuid>,
) -> Result<Response, ApiError>
where
  T: ChatTransport + 'static,
  G: DraftGenerator + 'static,
{
  let approvals = state.engine.approvals();
  let session = approvals.get(id).await?;
  if session.reviewer_id != caller && !state.moderators.contains(&caller) {
    return Err(ApiError::Forbidden(format!("{caller} may not resubmit review {id}")));
  }
  created_or_queued(approvals.resubmit(id).await)
}
