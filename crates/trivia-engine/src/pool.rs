//! [`QuestionPool`]: question lifecycle and selection.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use trivia_core::{
  question::{Question, QuestionDraft, QuestionStatus, SelectionPriority},
  store::TriviaStore,
};
use uuid::Uuid;

use crate::{Error, Result, clock::Clock, retry::RetryPolicy};

pub struct QuestionPool<S> {
  store: Arc<S>,
  clock: Arc<dyn Clock>,
  retry: RetryPolicy,
}

impl<S> Clone for QuestionPool<S> {
  fn clone(&self) -> Self {
    Self {
      store: self.store.clone(),
      clock: self.clock.clone(),
      retry: self.retry,
    }
  }
}

impl<S: TriviaStore> QuestionPool<S> {
  pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, retry: RetryPolicy) -> Self {
    Self {
      store,
      clock,
      retry,
    }
  }

  /// Validate `draft` and build the `Available` question it would become,
  /// without persisting it.
  pub fn prepare(&self, draft: QuestionDraft) -> Result<Question> {
    draft.validate()?;
    Ok(Question::from_draft(Uuid::new_v4(), draft, self.clock.now()))
  }

  /// Author a question directly into the pool.
  pub async fn add(&self, draft: QuestionDraft) -> Result<Question> {
    let question = self.prepare(draft)?;
    let question = self
      .store
      .insert_question(question)
      .await
      .map_err(Error::store)?;
    tracing::info!(question_id = %question.question_id, "question added");
    Ok(question)
  }

  pub async fn get(&self, id: Uuid) -> Result<Question> {
    self
      .store
      .get_question(id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::QuestionNotFound(id))
  }

  pub async fn list(&self, status: Option<QuestionStatus>) -> Result<Vec<Question>> {
    self.store.list_questions(status).await.map_err(Error::store)
  }

  pub async fn next_available(&self, priority: SelectionPriority) -> Result<Question> {
    self
      .store
      .next_available(priority)
      .await
      .map_err(Error::store)?
      .ok_or(Error::PoolExhausted)
  }

  pub async fn record_usage(&self, id: Uuid, at: DateTime<Utc>) -> Result<()> {
    let found = self
      .store
      .record_question_usage(id, at)
      .await
      .map_err(Error::store)?;
    if found { Ok(()) } else { Err(Error::QuestionNotFound(id)) }
  }

  /// `Available -> Answered`. Calling it again is a no-op, and retired
  /// questions stay retired.
  pub async fn mark_answered(&self, id: Uuid) -> Result<()> {
    self
      .retry
      .run("mark answered", || self.try_mark_answered(id))
      .await
  }

  async fn try_mark_answered(&self, id: Uuid) -> Result<()> {
    let current = self.get(id).await?;
    match current.status {
      QuestionStatus::Answered => return Ok(()),
      QuestionStatus::Retired => {
        tracing::warn!(question_id = %id, "not marking a retired question answered");
        return Ok(());
      }
      QuestionStatus::Available => {}
    }

    self
      .store
      .set_question_status(id, QuestionStatus::Answered)
      .await
      .map_err(Error::store)?;

    // Read back: a concurrent retire may have landed in between, and that
    // wins because retirement is terminal.
    match self.get(id).await?.status {
      QuestionStatus::Answered => Ok(()),
      QuestionStatus::Retired => {
        tracing::warn!(question_id = %id, "question retired while being marked answered");
        Ok(())
      }
      QuestionStatus::Available => Err(Error::Contended("question status")),
    }
  }

  /// Terminal from any status.
  pub async fn retire(&self, id: Uuid) -> Result<()> {
    let found = self
      .store
      .set_question_status(id, QuestionStatus::Retired)
      .await
      .map_err(Error::store)?;
    if !found {
      return Err(Error::QuestionNotFound(id));
    }
    tracing::info!(question_id = %id, "question retired");
    Ok(())
  }
}
