//! Route handlers, grouped by resource.
//!
//! | Method | Path | Caller |
//! |--------|------|--------|
//! | `GET`  | `/health` | anyone |
//! | `POST` | `/events/reply` | chat bridge |
//! | `POST` | `/trivia/start` | moderator |
//! | `GET`  | `/trivia/active` | anyone |
//! | `POST` | `/trivia/{id}/close` | moderator |
//! | `GET`  | `/questions` | moderator |
//! | `POST` | `/questions/{id}/retire` | moderator |
//! | `GET`/`POST` | `/approvals` | moderator |
//! | `POST` | `/approvals/generate` | moderator |
//! | `POST` | `/approvals/{id}/decide` | the session's reviewer |
//! | `POST` | `/approvals/{id}/resubmit` | the session's reviewer or a moderator |
//! | `PUT`/`DELETE` | `/reviewers/{id}` | moderator |

pub mod approvals;
pub mod events;
pub mod questions;
pub mod reviewers;
pub mod trivia;

use axum::Json;
use serde_json::{Value, json};

/// `GET /health`
pub async fn health() -> Json<Value> { Json(json!({ "status": "ok" })) }
