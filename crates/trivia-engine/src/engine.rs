//! [`TriviaEngine`]: the components wired to the chat transport.

use std::sync::Arc;

use serde::Serialize;
use trivia_core::{
  ChannelRef, UserRef,
  ports::{ChatTransport, DraftGenerator, StatsService},
  question::SelectionPriority,
  session::{ReplyEvent, SessionResult, TriviaSession},
  store::TriviaStore,
};
use uuid::Uuid;

use crate::{
  Error, ErrorKind, Result,
  alert::OperatorAlerts,
  approval::{ApprovalWorkflow, ResumeReport, ReviewerDirectory},
  clock::Clock,
  config::EngineConfig,
  oracle::DynamicAnswerOracle,
  pool::QuestionPool,
  render,
  resolver::{AnswerResolver, Recorded},
  session::SessionManager,
};

/// What one pass of [`TriviaEngine::run_maintenance`] did.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct MaintenanceReport {
  pub expired_reviews: usize,
  pub flushed_drafts:  usize,
  pub closed_session:  Option<Uuid>,
}

pub struct TriviaEngine<S, T, O, G> {
  pool:      QuestionPool<S>,
  approvals: ApprovalWorkflow<S, T, G>,
  sessions:  SessionManager<S, O>,
  resolver:  AnswerResolver<S>,
  transport: Arc<T>,
  alerts:    OperatorAlerts<T>,
  config:    EngineConfig,
}

impl<S, T, O, G> TriviaEngine<S, T, O, G>
where
  S: TriviaStore,
  T: ChatTransport,
  O: StatsService,
  G: DraftGenerator,
{
  pub fn new(
    store: Arc<S>,
    transport: Arc<T>,
    stats: Arc<O>,
    generator: Arc<G>,
    reviewers: Arc<ReviewerDirectory>,
    config: EngineConfig,
    clock: Arc<dyn Clock>,
  ) -> Self {
    let retry = config.retry_policy();
    let pool = QuestionPool::new(store.clone(), clock.clone(), retry);
    let alerts = OperatorAlerts::new(transport.clone(), config.operator_channel.clone());
    let approvals = ApprovalWorkflow::new(
      store.clone(),
      pool.clone(),
      transport.clone(),
      generator,
      reviewers,
      alerts.clone(),
      clock.clone(),
      &config,
    );
    let oracle = DynamicAnswerOracle::new(stats, config.oracle_timeout(), retry);
    let sessions = SessionManager::new(
      store.clone(),
      pool.clone(),
      oracle,
      clock,
      config.close_distance,
    );

    Self {
      pool,
      approvals,
      sessions,
      resolver: AnswerResolver::new(store),
      transport,
      alerts,
      config,
    }
  }

  pub fn pool(&self) -> &QuestionPool<S> { &self.pool }

  pub fn approvals(&self) -> &ApprovalWorkflow<S, T, G> { &self.approvals }

  pub fn sessions(&self) -> &SessionManager<S, O> { &self.sessions }

  pub fn resolver(&self) -> &AnswerResolver<S> { &self.resolver }

  pub fn config(&self) -> &EngineConfig { &self.config }

  /// Pick a question, open a round in `channel` and post it.
  pub async fn start_trivia(
    &self,
    channel: ChannelRef,
    moderator: UserRef,
    priority: Option<SelectionPriority>,
  ) -> Result<TriviaSession> {
    let priority = priority.unwrap_or(self.config.selection);
    let question = match self.pool.next_available(priority).await {
      Ok(q) => q,
      Err(Error::PoolExhausted) => {
        self.request_draft().await;
        return Err(Error::PoolExhausted);
      }
      Err(e) => return Err(e),
    };

    let mut session = self
      .sessions
      .start(&question, channel.clone(), moderator)
      .await?;
    let id = session.session_id;

    let posted = async {
      let q = self
        .transport
        .post_message(&channel, &render::question_post(&question))
        .await?;
      let c = self
        .transport
        .post_message(&channel, &render::confirmation_post())
        .await?;
      Ok::<_, Error>((q, c))
    }
    .await;
    let (question_ref, confirmation_ref) = match posted {
      Ok(refs) => refs,
      Err(e) => {
        tracing::warn!(session_id = %id, error = %e, "question not posted, abandoning session");
        self.sessions.abort(id).await;
        return Err(e);
      }
    };

    if let Err(e) = self
      .sessions
      .record_message_refs(id, question_ref.clone(), confirmation_ref.clone())
      .await
    {
      self.sessions.abort(id).await;
      return Err(e);
    }
    session.question_message = Some(question_ref);
    session.confirmation_message = Some(confirmation_ref);
    Ok(session)
  }

  async fn request_draft(&self) {
    let Some(reviewer) = self.config.default_reviewer.clone() else {
      tracing::warn!("question pool exhausted and no default reviewer configured");
      return;
    };
    match self.approvals.generate_and_submit(reviewer, None).await {
      Ok(session) => {
        tracing::info!(approval_id = %session.approval_id, "question pool exhausted, draft requested");
      }
      // Queued for the reviewer; delivered once they are reachable.
      Err(Error::ReviewerUnreachable(_)) => {}
      Err(e) => {
        self
          .raise_alert(&format!("question pool exhausted and no draft could be requested: {e}"))
          .await;
      }
    }
  }

  /// Record a chat reply as an answer and acknowledge it.
  pub async fn handle_reply(&self, event: ReplyEvent) -> Result<Recorded> {
    let session = self
      .sessions
      .find_by_message(&event.replied_to_message_ref)
      .await?
      .ok_or(Error::UncorrelatedReply)?;

    let recorded = self
      .resolver
      .submit(
        session.session_id,
        &event.author_id,
        &event.text,
        &event.replied_to_message_ref,
      )
      .await?;

    if let Some(reply) = &event.message_ref
      && let Err(e) = self
        .transport
        .react_to(reply, &self.config.ack_symbol)
        .await
    {
      tracing::warn!(session_id = %session.session_id, error = %e, "answer acknowledgement not delivered");
    }
    Ok(recorded)
  }

  /// Close the round and post the results to its channel.
  pub async fn close_trivia(&self, id: Uuid) -> Result<SessionResult> {
    let session = self.sessions.get(id).await?;
    let result = match self.sessions.close(id).await {
      Ok(result) => result,
      Err(e) => {
        if e.kind() == ErrorKind::Fatal {
          self.raise_alert(&format!("{e}; the session was expired")).await;
        }
        return Err(e);
      }
    };

    match self.pool.get(result.question_id).await {
      Ok(question) => {
        let body = render::results(&question, &result);
        if let Err(e) = self.transport.post_message(&session.channel, &body).await {
          tracing::warn!(session_id = %id, error = %e, "results not posted");
        }
      }
      Err(e) => tracing::warn!(session_id = %id, error = %e, "results not rendered"),
    }
    Ok(result)
  }

  /// Close the active round if it has run past `session_max_minutes`.
  pub async fn close_overdue(&self) -> Result<Option<SessionResult>> {
    match self.sessions.overdue(self.config.session_max()).await? {
      Some(session) => {
        tracing::info!(session_id = %session.session_id, "closing overdue trivia session");
        self.close_trivia(session.session_id).await.map(Some)
      }
      None => Ok(None),
    }
  }

  pub async fn raise_alert(&self, message: &str) { self.alerts.raise(message).await }

  /// Reconcile reviews left open by the previous process.
  pub async fn resume_on_restart(&self) -> Result<ResumeReport> {
    self.approvals.resume_on_restart().await
  }

  /// One pass of background work. Each step is independent; failures are
  /// logged and the remaining steps still run.
  pub async fn run_maintenance(&self) -> MaintenanceReport {
    let mut report = MaintenanceReport::default();

    match self.approvals.sweep_expired().await {
      Ok(n) => report.expired_reviews = n,
      Err(e) => tracing::warn!(error = %e, "approval sweep failed"),
    }
    match self.approvals.flush_pending().await {
      Ok(n) => report.flushed_drafts = n,
      Err(e) => tracing::warn!(error = %e, "pending draft flush failed"),
    }
    match self.close_overdue().await {
      Ok(closed) => report.closed_session = closed.map(|r| r.session_id),
      Err(e) => tracing::warn!(error = %e, "overdue session close failed"),
    }
    report
  }
}

#[cfg(test)]
mod tests {
  use chrono::Duration;
  use trivia_core::{
    MessageRef,
    approval::ApprovalStep,
    question::{QuestionDraft, QuestionOrigin},
    session::SessionStatus,
  };
  use trivia_store_sqlite::SqliteStore;

  use super::*;
  use crate::{
    clock::ManualClock,
    testing::{FakeGenerator, FakeStats, FakeTransport, clock_at, t0},
  };

  type Engine = TriviaEngine<SqliteStore, FakeTransport, FakeStats, FakeGenerator>;

  struct Harness {
    engine:    Engine,
    transport: Arc<FakeTransport>,
    generator: Arc<FakeGenerator>,
    clock:     Arc<ManualClock>,
  }

  fn general() -> ChannelRef { ChannelRef::new("general") }
  fn ops() -> ChannelRef { ChannelRef::new("ops") }
  fn dm() -> ChannelRef { ChannelRef::new("dm-reviewer") }

  async fn harness() -> Harness {
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    let transport = Arc::new(FakeTransport::default());
    let generator = Arc::new(FakeGenerator::default());
    let clock = clock_at(t0());
    let config = EngineConfig {
      retry_backoff_ms: 1,
      operator_channel: Some(ops()),
      default_reviewer: Some(UserRef::new("reviewer")),
      ..EngineConfig::default()
    };
    let engine = TriviaEngine::new(
      store,
      transport.clone(),
      Arc::new(FakeStats::default()),
      generator.clone(),
      Arc::new(ReviewerDirectory::new([(UserRef::new("reviewer"), dm())])),
      config,
      clock.clone(),
    );
    Harness {
      engine,
      transport,
      generator,
      clock,
    }
  }

  fn reply(user: &str, text: &str, to: &MessageRef, own: &str) -> ReplyEvent {
    ReplyEvent {
      author_id:              UserRef::new(user),
      text:                   text.into(),
      replied_to_message_ref: to.clone(),
      timestamp:              t0(),
      message_ref:            Some(MessageRef::new(own)),
    }
  }

  #[tokio::test]
  async fn full_round() {
    let h = harness().await;
    h.engine
      .pool()
      .add(QuestionDraft::single("Best Xbox launch title?", "Halo"))
      .await
      .unwrap();

    let session = h
      .engine
      .start_trivia(general(), UserRef::new("mod"), None)
      .await
      .unwrap();
    let posts = h.transport.posts_to(&general());
    assert_eq!(posts.len(), 2);
    assert!(posts[0].contains("Best Xbox launch title?"));
    let refs = h.transport.refs_in(&general());
    assert_eq!(session.question_message.as_ref(), Some(&refs[0]));

    h.engine.handle_reply(reply("A", "gears", &refs[0], "r-1")).await.unwrap();
    h.engine.handle_reply(reply("B", "halo", &refs[1], "r-2")).await.unwrap();
    assert_eq!(
      h.transport.reactions(),
      vec![
        (MessageRef::new("r-1"), "\u{2705}".to_owned()),
        (MessageRef::new("r-2"), "\u{2705}".to_owned()),
      ]
    );

    let result = h.engine.close_trivia(session.session_id).await.unwrap();
    assert_eq!(result.first_correct_user, Some(UserRef::new("B")));
    let posts = h.transport.posts_to(&general());
    assert_eq!(posts.len(), 3);
    assert!(posts[2].contains("First correct: <@B>!"));

    let late = h.engine.handle_reply(reply("C", "halo", &refs[0], "r-3")).await;
    assert!(matches!(late, Err(Error::SessionNotActive(_))));
    assert_eq!(h.transport.reactions().len(), 2);
  }

  #[tokio::test]
  async fn stray_replies_are_uncorrelated() {
    let h = harness().await;
    let err = h
      .engine
      .handle_reply(reply("A", "halo", &MessageRef::new("random"), "r-1"))
      .await
      .unwrap_err();
    assert!(matches!(err, Error::UncorrelatedReply));
    assert!(h.transport.reactions().is_empty());
  }

  #[tokio::test]
  async fn exhausted_pool_requests_a_draft() {
    let h = harness().await;
    let mut draft = QuestionDraft::single("Who developed Halo?", "Bungie");
    draft.category = Some("history".into());
    h.generator.push(draft);

    let err = h
      .engine
      .start_trivia(general(), UserRef::new("mod"), None)
      .await
      .unwrap_err();
    assert!(matches!(err, Error::PoolExhausted));
    assert_eq!(h.generator.requests(), vec![None]);

    let open = h.engine.approvals().open().await.unwrap();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].draft.origin, QuestionOrigin::Generated);
    assert_eq!(open[0].step, ApprovalStep::AwaitingDecision);
    assert_eq!(h.transport.posts_to(&dm()).len(), 1);
    assert!(h.transport.posts_to(&ops()).is_empty());
  }

  #[tokio::test]
  async fn exhausted_pool_alerts_when_generation_fails() {
    let h = harness().await;

    let err = h
      .engine
      .start_trivia(general(), UserRef::new("mod"), None)
      .await
      .unwrap_err();
    assert!(matches!(err, Error::PoolExhausted));
    assert_eq!(h.generator.requests(), vec![None]);

    let alerts = h.transport.posts_to(&ops());
    assert_eq!(alerts.len(), 1);
    assert!(alerts[0].contains("generator offline"));
    assert!(h.engine.approvals().open().await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn failed_post_frees_the_session_slot() {
    let h = harness().await;
    h.engine.pool().add(QuestionDraft::single("q1?", "a")).await.unwrap();
    h.engine.pool().add(QuestionDraft::single("q2?", "b")).await.unwrap();

    h.transport.set_down(&general(), true);
    let err = h
      .engine
      .start_trivia(general(), UserRef::new("mod"), None)
      .await
      .unwrap_err();
    assert!(matches!(err, Error::Port(_)));
    assert!(h.engine.sessions().active().await.unwrap().is_none());

    h.transport.set_down(&general(), false);
    h.engine
      .start_trivia(general(), UserRef::new("mod"), None)
      .await
      .unwrap();
  }

  #[tokio::test]
  async fn only_one_round_at_a_time() {
    let h = harness().await;
    h.engine.pool().add(QuestionDraft::single("q1?", "a")).await.unwrap();
    h.engine.pool().add(QuestionDraft::single("q2?", "b")).await.unwrap();

    h.engine
      .start_trivia(general(), UserRef::new("mod"), None)
      .await
      .unwrap();
    let err = h
      .engine
      .start_trivia(ChannelRef::new("other"), UserRef::new("mod"), None)
      .await
      .unwrap_err();
    assert!(matches!(err, Error::SessionAlreadyActive));
    assert!(h.transport.posts_to(&ChannelRef::new("other")).is_empty());
  }

  #[tokio::test]
  async fn maintenance_closes_overdue_rounds() {
    let h = harness().await;
    h.engine.pool().add(QuestionDraft::single("q?", "a")).await.unwrap();
    let session = h
      .engine
      .start_trivia(general(), UserRef::new("mod"), None)
      .await
      .unwrap();

    let report = h.engine.run_maintenance().await;
    assert_eq!(report.closed_session, None);

    h.clock.advance(Duration::minutes(61));
    let report = h.engine.run_maintenance().await;
    assert_eq!(report.closed_session, Some(session.session_id));
    let stored = h.engine.sessions().get(session.session_id).await.unwrap();
    assert_eq!(stored.status, SessionStatus::Completed);
    let posts = h.transport.posts_to(&general());
    assert_eq!(posts.len(), 3);
    assert!(posts[2].starts_with("The correct answer to \"q?\" is: a."));
  }

  #[tokio::test]
  async fn fatal_close_raises_an_alert() {
    let dir = std::env::temp_dir().join(format!("trivia-engine-{}", Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("trivia.db");

    let transport = Arc::new(FakeTransport::default());
    let engine: Engine = TriviaEngine::new(
      Arc::new(SqliteStore::open(&path).await.unwrap()),
      transport.clone(),
      Arc::new(FakeStats::default()),
      Arc::new(FakeGenerator::default()),
      Arc::new(ReviewerDirectory::default()),
      EngineConfig {
        operator_channel: Some(ops()),
        ..EngineConfig::default()
      },
      clock_at(t0()),
    );
    engine.pool().add(QuestionDraft::single("q?", "a")).await.unwrap();
    let session = engine
      .start_trivia(general(), UserRef::new("mod"), None)
      .await
      .unwrap();

    rusqlite::Connection::open(&path)
      .unwrap()
      .execute_batch(
        "CREATE TRIGGER refuse_completion BEFORE UPDATE ON trivia_sessions
         WHEN NEW.status = 'completed'
         BEGIN SELECT RAISE(ABORT, 'disk on fire'); END;",
      )
      .unwrap();

    let err = engine.close_trivia(session.session_id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Fatal);

    let alerts = transport.posts_to(&ops());
    assert_eq!(alerts.len(), 1);
    assert!(alerts[0].starts_with("[trivia alert] trivia session"));
    assert_eq!(
      engine.sessions().get(session.session_id).await.unwrap().status,
      SessionStatus::Expired
    );
    // No results for an expired round.
    assert_eq!(transport.posts_to(&general()).len(), 2);

    std::fs::remove_dir_all(&dir).ok();
  }

  #[tokio::test]
  async fn missing_question_at_close_raises_an_alert() {
    let dir = std::env::temp_dir().join(format!("trivia-engine-{}", Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("trivia.db");

    let transport = Arc::new(FakeTransport::default());
    let engine: Engine = TriviaEngine::new(
      Arc::new(SqliteStore::open(&path).await.unwrap()),
      transport.clone(),
      Arc::new(FakeStats::default()),
      Arc::new(FakeGenerator::default()),
      Arc::new(ReviewerDirectory::default()),
      EngineConfig {
        operator_channel: Some(ops()),
        ..EngineConfig::default()
      },
      clock_at(t0()),
    );
    let question = engine.pool().add(QuestionDraft::single("q?", "a")).await.unwrap();
    let session = engine
      .start_trivia(general(), UserRef::new("mod"), None)
      .await
      .unwrap();

    // A fresh connection does not enforce foreign keys.
    rusqlite::Connection::open(&path)
      .unwrap()
      .execute(
        "DELETE FROM questions WHERE question_id = ?1",
        [question.question_id.to_string()],
      )
      .unwrap();

    let err = engine.close_trivia(session.session_id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Fatal);
    let Error::CloseFailed { source, .. } = &err else {
      panic!("unexpected error: {err}");
    };
    assert!(matches!(**source, Error::QuestionNotFound(_)));

    assert_eq!(transport.posts_to(&ops()).len(), 1);
    assert_eq!(
      engine.sessions().get(session.session_id).await.unwrap().status,
      SessionStatus::Expired
    );

    std::fs::remove_dir_all(&dir).ok();
  }
}
