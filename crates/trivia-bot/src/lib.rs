//! HTTP ingress for the trivia bot.
//!
//! The chat bridge forwards replies and moderator commands here; the engine
//! talks back to the chat platform through a [`ChatTransport`].

pub mod auth;
pub mod error;
pub mod generator;
pub mod handlers;
pub mod transport;

pub use error::ApiError;

use std::{
  collections::{HashMap, HashSet},
  path::PathBuf,
  sync::Arc,
};

use axum::{
  Router,
  routing::{get, post, put},
};
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use trivia_core::{
  ChannelRef, UserRef,
  ports::{ChatTransport, DraftGenerator},
};
use trivia_engine::{ConfigError, EngineConfig, TriviaEngine, config::check_range};
use trivia_store_sqlite::{SqliteStatsService, SqliteStore};

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime configuration, deserialised from `config.toml` and `TRIVIA_*`
/// environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct BotConfig {
  pub host:              String,
  pub port:              u16,
  pub store_path:        PathBuf,
  /// Read-only game statistics database. Dynamic questions stay unresolved
  /// without it.
  #[serde(default)]
  pub stats_path:        Option<PathBuf>,
  /// Base URL of the chat bridge that posts messages and reactions.
  pub bridge_url:        String,
  /// Question-writer endpoint. Draft generation is unavailable without it.
  #[serde(default)]
  pub generator_url:     Option<String>,
  #[serde(default = "default_http_timeout_secs")]
  pub http_timeout_secs: u64,
  #[serde(default)]
  pub moderators:        Vec<UserRef>,
  /// Reviewer id to the channel their review cards are posted to.
  #[serde(default)]
  pub reviewers:         HashMap<UserRef, ChannelRef>,
  #[serde(default)]
  pub engine:            EngineConfig,
}

fn default_http_timeout_secs() -> u64 { 10 }

impl BotConfig {
  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.bridge_url.trim().is_empty() {
      return Err(ConfigError::Empty("bridge_url"));
    }
    check_range("http_timeout_secs", self.http_timeout_secs, 1, 300)?;
    self.engine.validate()
  }
}

// ─── Application state ────────────────────────────────────────────────────────

pub type Engine<T, G> = TriviaEngine<SqliteStore, T, SqliteStatsService, G>;

/// Shared state threaded through all axum handlers.
pub struct AppState<T, G> {
  pub engine:     Arc<Engine<T, G>>,
  pub moderators: Arc<HashSet<UserRef>>,
}

impl<T, G> Clone for AppState<T, G> {
  fn clone(&self) -> Self {
    Self {
      engine:     self.engine.clone(),
      moderators: self.moderators.clone(),
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the bot's axum [`Router`].
pub fn router<T, G>(state: AppState<T, G>) -> Router
where
  T: ChatTransport + 'static,
  G: DraftGenerator + 'static,
{
  use handlers::{approvals, events, questions, reviewers, trivia};

  Router::new()
    .route("/health",                   get(handlers::health))
    .route("/events/reply",             post(events::reply::<T, G>))
    .route("/trivia/start",             post(trivia::start::<T, G>))
    .route("/trivia/active",            get(trivia::active::<T, G>))
    .route("/trivia/{id}/close",        post(trivia::close::<T, G>))
    .route("/questions",                get(questions::list::<T, G>))
    .route("/questions/{id}/retire",    post(questions::retire::<T, G>))
    .route("/approvals",                get(approvals::list::<T, G>).post(approvals::submit::<T, G>))
    .route("/approvals/generate",       post(approvals::generate::<T, G>))
    .route("/approvals/{id}/decide",    post(approvals::decide::<T, G>))
    .route("/approvals/{id}/resubmit",  post(approvals::resubmit::<T, G>))
    .route("/reviewers/{id}",           put(reviewers::register::<T, G>).delete(reviewers::unregister::<T, G>))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

// ─── Integration tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use std::sync::Mutex;

  use axum::{
    body::Body,
    http::{Request, StatusCode},
  };
  use serde_json::{Value, json};
  use tower::ServiceExt as _;
  use trivia_core::{MessageRef, ports::PortError, question::QuestionDraft};
  use trivia_engine::{ReviewerDirectory, SystemClock};

  use super::*;

  #[derive(Default)]
  struct RecordingTransport {
    posts: Mutex<Vec<(ChannelRef, String)>>,
  }

  impl RecordingTransport {
    fn posts_to(&self, channel: &str) -> Vec<String> {
      self
        .posts
        .lock()
        .unwrap()
        .iter()
        .filter(|(c, _)| c.as_str() == channel)
        .map(|(_, body)| body.clone())
        .collect()
    }
  }

  impl ChatTransport for RecordingTransport {
    async fn post_message(
      &self,
      channel: &ChannelRef,
      content: &str,
    ) -> Result<MessageRef, PortError> {
      let mut posts = self.posts.lock().unwrap();
      posts.push((channel.clone(), content.to_owned()));
      Ok(MessageRef::new(format!("m{}", posts.len())))
    }

    async fn react_to(&self, _: &MessageRef, _: &str) -> Result<(), PortError> { Ok(()) }
  }

  struct OneDraft;

  impl DraftGenerator for OneDraft {
    async fn generate_draft(&self, category: Option<&str>) -> Result<QuestionDraft, PortError> {
      let mut draft = QuestionDraft::single("Which studio made Halo?", "Bungie");
      draft.category = category.map(str::to_owned);
      Ok(draft)
    }
  }

  struct Fixture {
    state:     AppState<RecordingTransport, OneDraft>,
    transport: Arc<RecordingTransport>,
  }

  async fn fixture() -> Fixture {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let stats = SqliteStatsService::open_in_memory().await.unwrap();
    let transport = Arc::new(RecordingTransport::default());
    let engine = TriviaEngine::new(
      Arc::new(store),
      transport.clone(),
      Arc::new(stats),
      Arc::new(OneDraft),
      Arc::new(ReviewerDirectory::new([(
        UserRef::new("rev"),
        ChannelRef::new("dm-rev"),
      )])),
      EngineConfig::default(),
      Arc::new(SystemClock),
    );
    Fixture {
      state: AppState {
        engine:     Arc::new(engine),
        moderators: Arc::new(HashSet::from([UserRef::new("mod")])),
      },
      transport,
    }
  }

  async fn call(
    state: &AppState<RecordingTransport, OneDraft>,
    method: &str,
    uri: &str,
    user: Option<&str>,
    body: Option<Value>,
  ) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
      builder = builder.header(auth::USER_HEADER, user);
    }
    let req = match body {
      Some(body) => builder
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap(),
      None => builder.body(Body::empty()).unwrap(),
    };
    let resp = router(state.clone()).oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
      Value::Null
    } else {
      serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
  }

  fn draft_body() -> Value {
    json!({
      "reviewer": "rev",
      "draft": {
        "text": "Best Xbox launch title?",
        "kind": { "type": "single" },
        "answer": { "type": "static", "value": "Halo" },
      },
    })
  }

  #[tokio::test]
  async fn health_is_public() {
    let f = fixture().await;
    let (status, body) = call(&f.state, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
  }

  #[tokio::test]
  async fn moderator_routes_check_the_caller() {
    let f = fixture().await;
    let start = json!({ "channel": "general" });

    let (status, _) = call(&f.state, "POST", "/trivia/start", None, Some(start.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) =
      call(&f.state, "POST", "/trivia/start", Some("player"), Some(start)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["error"].as_str().unwrap().contains("not a moderator"));
  }

  #[tokio::test]
  async fn approve_then_play_a_round() {
    let f = fixture().await;

    let (status, review) =
      call(&f.state, "POST", "/approvals", Some("mod"), Some(draft_body())).await;
    assert_eq!(status, StatusCode::CREATED);
    let approval_id = review["approval_id"].as_str().unwrap().to_owned();
    assert_eq!(f.transport.posts_to("dm-rev").len(), 1);

    // Only the assigned reviewer may decide.
    let decide = format!("/approvals/{approval_id}/decide");
    let (status, _) = call(
      &f.state,
      "POST",
      &decide,
      Some("mod"),
      Some(json!({ "action": "approve" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = call(
      &f.state,
      "POST",
      &decide,
      Some("rev"),
      Some(json!({ "action": "approve" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, session) = call(
      &f.state,
      "POST",
      "/trivia/start",
      Some("mod"),
      Some(json!({ "channel": "general" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let session_id = session["session_id"].as_str().unwrap().to_owned();
    let question_ref = session["question_message"].as_str().unwrap().to_owned();

    let reply = |user: &str, text: &str| {
      json!({
        "author_id": user,
        "text": text,
        "replied_to_message_ref": question_ref,
        "timestamp": "2026-03-01T20:00:05Z",
      })
    };
    let (status, recorded) =
      call(&f.state, "POST", "/events/reply", None, Some(reply("B", "HALO "))).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(recorded["has_conflict"], false);
    let (status, _) =
      call(&f.state, "POST", "/events/reply", None, Some(reply("B", "halo"))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, active) = call(&f.state, "GET", "/trivia/active", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(active["session_id"], session_id.as_str());

    let (status, result) = call(
      &f.state,
      "POST",
      &format!("/trivia/{session_id}/close"),
      Some("mod"),
      None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["first_correct_user"], "B");
    assert!(f.transport.posts_to("general").last().unwrap().contains("<@B>"));

    let (_, active) = call(&f.state, "GET", "/trivia/active", None, None).await;
    assert_eq!(active, Value::Null);
  }

  #[tokio::test]
  async fn start_with_an_empty_pool_is_not_found() {
    let f = fixture().await;
    let (status, body) = call(
      &f.state,
      "POST",
      "/trivia/start",
      Some("mod"),
      Some(json!({ "channel": "general" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "no available questions");
  }

  #[tokio::test]
  async fn unreachable_reviewer_queues_until_registered() {
    let f = fixture().await;
    let mut body = draft_body();
    body["reviewer"] = json!("new-rev");

    let (status, queued) = call(&f.state, "POST", "/approvals", Some("mod"), Some(body)).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(queued["queued"], true);

    let (_, listing) = call(&f.state, "GET", "/approvals", Some("mod"), None).await;
    assert_eq!(listing["pending"].as_array().unwrap().len(), 1);
    assert!(listing["open"].as_array().unwrap().is_empty());

    let (status, registered) = call(
      &f.state,
      "PUT",
      "/reviewers/new-rev",
      Some("mod"),
      Some(json!({ "channel": "dm-new" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(registered["flushed"], 1);
    assert_eq!(f.transport.posts_to("dm-new").len(), 1);

    let (status, _) = call(&f.state, "DELETE", "/reviewers/new-rev", Some("mod"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(
      f.state
        .engine
        .approvals()
        .reviewers()
        .channel_for(&UserRef::new("new-rev"))
        .is_none()
    );
  }

  #[tokio::test]
  async fn generated_drafts_go_to_review() {
    let f = fixture().await;
    let (status, review) = call(
      &f.state,
      "POST",
      "/approvals/generate",
      Some("mod"),
      Some(json!({ "reviewer": "rev", "category": "history" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(review["draft"]["origin"], "generated");
    assert_eq!(review["draft"]["category"], "history");
  }

  #[tokio::test]
  async fn invalid_drafts_are_unprocessable() {
    let f = fixture().await;
    let mut body = draft_body();
    body["draft"]["text"] = json!("   ");
    let (status, _) = call(&f.state, "POST", "/approvals", Some("mod"), Some(body)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
  }

  #[test]
  fn config_validation_rejects_unusable_values() {
    let base = json!({
      "host": "127.0.0.1",
      "port": 8080,
      "store_path": "trivia.db",
      "bridge_url": "http://bridge",
    });
    let config: BotConfig = serde_json::from_value(base.clone()).unwrap();
    config.validate().unwrap();

    let mut zero_sweep = base.clone();
    zero_sweep["engine"] = json!({ "sweep_interval_secs": 0 });
    let config: BotConfig = serde_json::from_value(zero_sweep).unwrap();
    assert!(config.validate().unwrap_err().to_string().contains("sweep_interval_secs"));

    let mut huge_ttl = base;
    huge_ttl["engine"] = json!({ "approval_ttl_hours": i64::MAX });
    let config: BotConfig = serde_json::from_value(huge_ttl).unwrap();
    assert!(config.validate().is_err());
  }
}
