//! [`SessionManager`]: the single active trivia round and its close.

use std::sync::Arc;

use chrono::Duration;
use trivia_core::{
  ChannelRef, MessageRef, UserRef,
  ports::StatsService,
  question::Question,
  session::{SessionResult, TriviaSession},
  store::TriviaStore,
};
use uuid::Uuid;

use crate::{
  Error, Result,
  clock::Clock,
  oracle::DynamicAnswerOracle,
  pool::QuestionPool,
  resolver::evaluate,
};

pub struct SessionManager<S, O> {
  store:          Arc<S>,
  pool:           QuestionPool<S>,
  oracle:         DynamicAnswerOracle<O>,
  clock:          Arc<dyn Clock>,
  close_distance: usize,
}

impl<S, O> SessionManager<S, O>
where
  S: TriviaStore,
  O: StatsService,
{
  pub fn new(
    store: Arc<S>,
    pool: QuestionPool<S>,
    oracle: DynamicAnswerOracle<O>,
    clock: Arc<dyn Clock>,
    close_distance: usize,
  ) -> Self {
    Self {
      store,
      pool,
      oracle,
      clock,
      close_distance,
    }
  }

  /// Open a round for `question`. Only one round may be active at a time.
  pub async fn start(
    &self,
    question: &Question,
    channel: ChannelRef,
    moderator: UserRef,
  ) -> Result<TriviaSession> {
    let now = self.clock.now();
    let session = TriviaSession::new(question.question_id, channel, moderator, now);
    let session = self
      .store
      .create_session(session)
      .await
      .map_err(Error::store)?
      .ok_or(Error::SessionAlreadyActive)?;
    if let Err(e) = self.pool.record_usage(question.question_id, now).await {
      tracing::error!(session_id = %session.session_id, error = %e, "question usage not recorded");
      self.abort(session.session_id).await;
      return Err(e);
    }

    tracing::info!(
      session_id = %session.session_id,
      question_id = %question.question_id,
      channel = %session.channel,
      "trivia session started"
    );
    Ok(session)
  }

  pub async fn record_message_refs(
    &self,
    id: Uuid,
    question: MessageRef,
    confirmation: MessageRef,
  ) -> Result<()> {
    let updated = self
      .store
      .set_message_refs(id, question, confirmation)
      .await
      .map_err(Error::store)?;
    if updated {
      return Ok(());
    }
    // Distinguish a missing session from a closed one.
    self.get(id).await?;
    Err(Error::SessionNotActive(id))
  }

  /// Judge the round and complete it. Any failure along the way expires the
  /// session instead, so it never blocks the next round.
  pub async fn close(&self, id: Uuid) -> Result<SessionResult> {
    let session = self.get(id).await?;
    if !session.is_active() {
      return Err(Error::SessionNotActive(id));
    }

    match self.finalize(&session).await {
      Ok(result) => {
        tracing::info!(
          session_id = %id,
          participants = result.participant_count,
          correct = result.correct_count,
          first_correct = ?result.first_correct_user,
          "trivia session completed"
        );
        Ok(result)
      }
      // Lost to a concurrent close; nothing to undo.
      Err(Error::SessionNotActive(_)) => Err(Error::SessionNotActive(id)),
      Err(e) => {
        tracing::error!(session_id = %id, error = %e, fatal = true, "closing trivia session failed");
        self.abort(id).await;
        Err(Error::CloseFailed {
          session: id,
          source:  Box::new(e),
        })
      }
    }
  }

  async fn finalize(&self, session: &TriviaSession) -> Result<SessionResult> {
    let answers = self
      .store
      .answers_for_session(session.session_id)
      .await
      .map_err(Error::store)?;
    let question = self.pool.get(session.question_id).await?;
    let truth = self.oracle.resolve(&question).await;
    let eval = evaluate(&question, &truth, &answers, self.close_distance);

    self.pool.mark_answered(question.question_id).await?;

    let result = SessionResult {
      session_id:         session.session_id,
      question_id:        question.question_id,
      calculated_answer:  truth,
      first_correct_user: eval.first_correct,
      participant_count:  u32::try_from(answers.len()).unwrap_or(u32::MAX),
      correct_count:      u32::try_from(eval.correct_users.len()).unwrap_or(u32::MAX),
      correct_users:      eval.correct_users,
      conflicted_users:   eval.conflicted_users,
      close_users:        eval.close_users,
    };

    let completed = self
      .store
      .complete_session(result.clone(), eval.verdicts, self.clock.now())
      .await
      .map_err(Error::store)?;
    if completed {
      Ok(result)
    } else {
      Err(Error::SessionNotActive(session.session_id))
    }
  }

  /// Force `id` to `Expired`. Logged, never fails.
  pub async fn abort(&self, id: Uuid) {
    match self.store.expire_session(id, self.clock.now()).await {
      Ok(true) => tracing::warn!(session_id = %id, "trivia session expired"),
      Ok(false) => {}
      Err(e) => {
        tracing::error!(session_id = %id, error = %e, fatal = true, "could not expire trivia session");
      }
    }
  }

  /// The active session, if it has run longer than `max_duration`.
  pub async fn overdue(&self, max_duration: Duration) -> Result<Option<TriviaSession>> {
    let now = self.clock.now();
    Ok(
      self
        .active()
        .await?
        .filter(|s| now - s.started_at > max_duration),
    )
  }

  /// Close the active session if it is overdue.
  pub async fn close_overdue(&self, max_duration: Duration) -> Result<Option<SessionResult>> {
    match self.overdue(max_duration).await? {
      Some(session) => {
        tracing::info!(session_id = %session.session_id, "closing overdue trivia session");
        self.close(session.session_id).await.map(Some)
      }
      None => Ok(None),
    }
  }

  pub async fn active(&self) -> Result<Option<TriviaSession>> {
    self.store.active_session().await.map_err(Error::store)
  }

  pub async fn get(&self, id: Uuid) -> Result<TriviaSession> {
    self
      .store
      .get_session(id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::SessionNotFound(id))
  }

  pub async fn find_by_message(&self, message: &MessageRef) -> Result<Option<TriviaSession>> {
    self
      .store
      .find_session_by_message(message.clone())
      .await
      .map_err(Error::store)
  }
}
