//! [`ApprovalWorkflow`]: human review of candidate questions.
//!
//! Every review is a durable [`ApprovalSession`] row, so a review started
//! hours ago survives restarts. Concurrent writers (a reviewer decision, the
//! expiry sweep, restart reconciliation) coordinate only through
//! compare-and-set on `last_activity_at`; whoever loses re-reads.

use std::{
  collections::HashMap,
  sync::{Arc, RwLock},
};

use chrono::{DateTime, Duration, Utc};
use trivia_core::{
  ChannelRef, MessageRef, UserRef,
  approval::{ApprovalOutcome, ApprovalSession, ApprovalStep, PendingDraft, ReviewAction},
  ports::{ChatTransport, DraftGenerator},
  question::{QuestionDraft, QuestionOrigin},
  store::TriviaStore,
};
use uuid::Uuid;

use crate::{
  Error, Result, alert::OperatorAlerts, clock::Clock, config::EngineConfig, pool::QuestionPool,
  render, retry::RetryPolicy,
};

// ─── Reviewer directory ──────────────────────────────────────────────────────

/// Where each reviewer receives review cards. A reviewer without an entry is
/// unreachable; drafts for them are queued until they register.
#[derive(Debug, Default)]
pub struct ReviewerDirectory {
  channels: RwLock<HashMap<UserRef, ChannelRef>>,
}

impl ReviewerDirectory {
  pub fn new(entries: impl IntoIterator<Item = (UserRef, ChannelRef)>) -> Self {
    Self {
      channels: RwLock::new(entries.into_iter().collect()),
    }
  }

  pub fn register(&self, reviewer: UserRef, channel: ChannelRef) {
    self
      .channels
      .write()
      .unwrap_or_else(|e| e.into_inner())
      .insert(reviewer, channel);
  }

  pub fn unregister(&self, reviewer: &UserRef) {
    self
      .channels
      .write()
      .unwrap_or_else(|e| e.into_inner())
      .remove(reviewer);
  }

  pub fn channel_for(&self, reviewer: &UserRef) -> Option<ChannelRef> {
    self
      .channels
      .read()
      .unwrap_or_else(|e| e.into_inner())
      .get(reviewer)
      .cloned()
  }
}

// ─── Workflow ────────────────────────────────────────────────────────────────

/// What [`ApprovalWorkflow::resume_on_restart`] did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ResumeReport {
  pub resumed: usize,
  pub expired: usize,
  pub flushed: usize,
}

pub struct ApprovalWorkflow<S, T, G> {
  store:                Arc<S>,
  pool:                 QuestionPool<S>,
  transport:            Arc<T>,
  generator:            Arc<G>,
  reviewers:            Arc<ReviewerDirectory>,
  alerts:               OperatorAlerts<T>,
  clock:                Arc<dyn Clock>,
  retry:                RetryPolicy,
  ttl:                  Duration,
  regenerate_on_reject: bool,
}

impl<S, T, G> ApprovalWorkflow<S, T, G>
where
  S: TriviaStore,
  T: ChatTransport,
  G: DraftGenerator,
{
  #[allow(clippy::too_many_arguments)]
  pub fn new(
    store: Arc<S>,
    pool: QuestionPool<S>,
    transport: Arc<T>,
    generator: Arc<G>,
    reviewers: Arc<ReviewerDirectory>,
    alerts: OperatorAlerts<T>,
    clock: Arc<dyn Clock>,
    config: &EngineConfig,
  ) -> Self {
    Self {
      store,
      pool,
      transport,
      generator,
      reviewers,
      alerts,
      clock,
      retry: config.retry_policy(),
      ttl: config.approval_ttl(),
      regenerate_on_reject: config.regenerate_on_reject,
    }
  }

  pub fn reviewers(&self) -> &ReviewerDirectory { &self.reviewers }

  /// Persist `reviewer`'s channel, then route drafts queued for them.
  /// Returns how many queued drafts were routed.
  pub async fn register_reviewer(&self, reviewer: UserRef, channel: ChannelRef) -> Result<usize> {
    self
      .store
      .save_reviewer_channel(reviewer.clone(), channel.clone(), self.clock.now())
      .await
      .map_err(Error::store)?;
    self.reviewers.register(reviewer, channel);
    self.flush_pending().await
  }

  pub async fn unregister_reviewer(&self, reviewer: &UserRef) -> Result<()> {
    self
      .store
      .delete_reviewer_channel(reviewer.clone())
      .await
      .map_err(Error::store)?;
    self.reviewers.unregister(reviewer);
    Ok(())
  }

  /// Open a review of `draft` and send it to `reviewer`.
  pub async fn submit(&self, draft: QuestionDraft, reviewer: UserRef) -> Result<ApprovalSession> {
    draft.validate()?;

    let Some(channel) = self.reviewers.channel_for(&reviewer) else {
      self.queue(draft, reviewer.clone()).await?;
      return Err(Error::ReviewerUnreachable(reviewer));
    };

    let session = ApprovalSession::new(reviewer.clone(), draft, self.clock.now(), self.ttl);
    let mut session = self
      .store
      .insert_approval(session)
      .await
      .map_err(Error::store)?
      .ok_or_else(|| Error::DuplicateReview(reviewer))?;
    tracing::info!(
      approval_id = %session.approval_id,
      reviewer = %session.reviewer_id,
      "review opened"
    );

    if let Some(message) = self.deliver(&session, &channel, false).await {
      let read = session.last_activity_at;
      let mut rendered = session.clone();
      rendered.review_message = Some(message);
      if self
        .store
        .update_approval(rendered.clone(), read)
        .await
        .map_err(Error::store)?
      {
        session = rendered;
      }
    }
    Ok(session)
  }

  /// Apply a reviewer's decision. Lost races against the sweeper or a second
  /// decision are retried from a fresh read.
  pub async fn decide(&self, id: Uuid, action: ReviewAction) -> Result<ApprovalSession> {
    if let ReviewAction::Edit { draft } = &action {
      draft.validate()?;
    }

    let decided = self
      .retry
      .run("approval decision", || self.try_decide(id, &action))
      .await?;
    tracing::info!(
      approval_id = %id,
      action = action.name(),
      revision = decided.revision,
      "review decision recorded"
    );

    match decided.step {
      ApprovalStep::Editing => self.finish_edit(decided).await,
      ApprovalStep::Completed(ApprovalOutcome::Rejected) => {
        if self.regenerate_on_reject {
          self.regenerate(&decided).await;
        }
        Ok(decided)
      }
      _ => Ok(decided),
    }
  }

  async fn try_decide(&self, id: Uuid, action: &ReviewAction) -> Result<ApprovalSession> {
    let current = self.load_open(id).await?;
    let read = current.last_activity_at;
    let mut next = current.clone();
    next.touch(self.next_activity(read), self.ttl);

    let committed = match action {
      ReviewAction::Approve => {
        let question = self.pool.prepare(current.draft)?;
        next.step = ApprovalStep::Completed(ApprovalOutcome::Approved {
          question_id: question.question_id,
        });
        self
          .store
          .approve_draft(next.clone(), read, question)
          .await
          .map_err(Error::store)?
      }
      ReviewAction::Edit { draft } => {
        next.draft = draft.clone();
        next.revision += 1;
        next.step = ApprovalStep::Editing;
        self.store.update_approval(next.clone(), read).await.map_err(Error::store)?
      }
      ReviewAction::Reject => {
        next.step = ApprovalStep::Completed(ApprovalOutcome::Rejected);
        self.store.update_approval(next.clone(), read).await.map_err(Error::store)?
      }
    };

    if committed { Ok(next) } else { Err(Error::Contended("approval session")) }
  }

  /// Re-render an edited draft, then hand the session back to the reviewer.
  async fn finish_edit(&self, editing: ApprovalSession) -> Result<ApprovalSession> {
    let read = editing.last_activity_at;
    let mut ready = editing.clone();
    ready.step = ApprovalStep::AwaitingDecision;
    ready.touch(self.next_activity(read), self.ttl);

    if let Some(channel) = self.reviewers.channel_for(&ready.reviewer_id)
      && let Some(message) = self.deliver(&ready, &channel, false).await
    {
      ready.review_message = Some(message);
    }

    if self
      .store
      .update_approval(ready.clone(), read)
      .await
      .map_err(Error::store)?
    {
      Ok(ready)
    } else {
      // Someone else moved it on; report what is stored now.
      tracing::warn!(approval_id = %ready.approval_id, "edited review changed concurrently");
      self.get(ready.approval_id).await
    }
  }

  async fn regenerate(&self, rejected: &ApprovalSession) {
    let reviewer = rejected.reviewer_id.clone();
    let category = rejected.draft.category.clone();
    match self.generate_and_submit(reviewer.clone(), category).await {
      Ok(session) => tracing::info!(
        rejected = %rejected.approval_id,
        approval_id = %session.approval_id,
        "replacement draft submitted"
      ),
      Err(Error::ReviewerUnreachable(_)) => {}
      Err(e) => {
        self
          .alerts
          .raise(&format!(
            "could not regenerate a draft for {reviewer} after review {} was rejected: {e}",
            rejected.approval_id
          ))
          .await;
      }
    }
  }

  /// Start a new review from an expired session's draft.
  pub async fn resubmit(&self, id: Uuid) -> Result<ApprovalSession> {
    let session = self.get(id).await?;
    match session.step {
      ApprovalStep::Completed(ApprovalOutcome::Expired) => {}
      ApprovalStep::Completed(_) => return Err(Error::ApprovalCompleted(id)),
      _ if session.is_expired_at(self.clock.now()) => {
        self.expire(session.clone()).await?;
      }
      _ => return Err(Error::DuplicateReview(session.reviewer_id)),
    }
    self.submit(session.draft, session.reviewer_id).await
  }

  /// Ask the generator for a draft and send it for review.
  pub async fn generate_and_submit(
    &self,
    reviewer: UserRef,
    category: Option<String>,
  ) -> Result<ApprovalSession> {
    let mut draft = self.generator.generate_draft(category.as_deref()).await?;
    draft.origin = QuestionOrigin::Generated;
    if draft.category.is_none() {
      draft.category = category;
    }
    self.submit(draft, reviewer).await
  }

  /// Route queued drafts whose reviewer has since become reachable.
  pub async fn flush_pending(&self) -> Result<usize> {
    let mut flushed = 0;
    for pending in self.store.pending_drafts().await.map_err(Error::store)? {
      if self.reviewers.channel_for(&pending.reviewer_id).is_none() {
        continue;
      }
      match self
        .submit(pending.draft.clone(), pending.reviewer_id.clone())
        .await
      {
        Ok(_) => flushed += 1,
        // Already under review, or re-queued by `submit` itself.
        Err(Error::DuplicateReview(_) | Error::ReviewerUnreachable(_)) => {}
        Err(Error::Draft(e)) => {
          tracing::warn!(pending_id = %pending.pending_id, error = %e, "dropping invalid queued draft");
        }
        Err(e) => {
          tracing::warn!(pending_id = %pending.pending_id, error = %e, "queued draft not routed");
          continue;
        }
      }
      self
        .store
        .remove_pending_draft(pending.pending_id)
        .await
        .map_err(Error::store)?;
    }
    Ok(flushed)
  }

  /// Reconcile after a restart: expire what is overdue, bump the restart
  /// counter of everything still open, put interrupted edits back in front
  /// of the reviewer, and route queued drafts.
  pub async fn resume_on_restart(&self) -> Result<ResumeReport> {
    let registered = self.store.reviewer_channels().await.map_err(Error::store)?;
    if !registered.is_empty() {
      tracing::info!(count = registered.len(), "restoring registered reviewer channels");
    }
    for (reviewer, channel) in registered {
      self.reviewers.register(reviewer, channel);
    }

    let expired = self.sweep_expired().await?;

    let mut resumed = 0;
    for session in self.store.open_approvals().await.map_err(Error::store)? {
      let read = session.last_activity_at;
      let mut next = session;
      next.restart_count += 1;
      // Move the version without extending the review's expiry.
      next.last_activity_at = self.next_activity(read);
      if next.step == ApprovalStep::Editing {
        next.step = ApprovalStep::AwaitingDecision;
      }

      match self.reviewers.channel_for(&next.reviewer_id) {
        Some(channel) => {
          if let Some(message) = self.deliver(&next, &channel, true).await {
            next.review_message = Some(message);
          }
        }
        None => tracing::warn!(
          approval_id = %next.approval_id,
          reviewer = %next.reviewer_id,
          "resumed review has no delivery channel"
        ),
      }

      if self
        .store
        .update_approval(next.clone(), read)
        .await
        .map_err(Error::store)?
      {
        resumed += 1;
      } else {
        tracing::debug!(approval_id = %next.approval_id, "review changed while resuming");
      }
    }

    let flushed = self.flush_pending().await?;
    let report = ResumeReport {
      resumed,
      expired,
      flushed,
    };
    tracing::info!(resumed, expired, flushed, "approval workflow resumed");
    Ok(report)
  }

  /// Expire every open review past its deadline. Returns how many this call
  /// expired.
  pub async fn sweep_expired(&self) -> Result<usize> {
    let now = self.clock.now();
    let mut swept = 0;
    for session in self
      .store
      .expired_approvals(now)
      .await
      .map_err(Error::store)?
    {
      if self.expire(session).await? {
        swept += 1;
      }
    }
    if swept > 0 {
      tracing::info!(swept, "expired stale reviews");
    }
    Ok(swept)
  }

  pub async fn get(&self, id: Uuid) -> Result<ApprovalSession> {
    self
      .store
      .get_approval(id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::ApprovalNotFound(id))
  }

  pub async fn open(&self) -> Result<Vec<ApprovalSession>> {
    self.store.open_approvals().await.map_err(Error::store)
  }

  pub async fn pending(&self) -> Result<Vec<PendingDraft>> {
    self.store.pending_drafts().await.map_err(Error::store)
  }

  // ── Helpers ───────────────────────────────────────────────────────────────

  async fn load_open(&self, id: Uuid) -> Result<ApprovalSession> {
    let session = self.get(id).await?;
    match session.step {
      ApprovalStep::Completed(ApprovalOutcome::Expired) => Err(Error::ApprovalExpired(id)),
      ApprovalStep::Completed(_) => Err(Error::ApprovalCompleted(id)),
      _ if session.is_expired_at(self.clock.now()) => {
        self.expire(session).await?;
        Err(Error::ApprovalExpired(id))
      }
      _ => Ok(session),
    }
  }

  /// Conditionally mark `session` expired. `false` when it changed since it
  /// was read.
  async fn expire(&self, session: ApprovalSession) -> Result<bool> {
    let read = session.last_activity_at;
    let mut expired = session;
    expired.step = ApprovalStep::Completed(ApprovalOutcome::Expired);
    if !self
      .store
      .update_approval(expired.clone(), read)
      .await
      .map_err(Error::store)?
    {
      tracing::debug!(approval_id = %expired.approval_id, "review touched before it could expire");
      return Ok(false);
    }
    tracing::info!(approval_id = %expired.approval_id, "review expired");

    if let Some(channel) = self.reviewers.channel_for(&expired.reviewer_id)
      && let Err(e) = self
        .transport
        .post_message(&channel, &render::expired_notice(&expired))
        .await
    {
      tracing::warn!(approval_id = %expired.approval_id, error = %e, "expiry notice not delivered");
    }
    Ok(true)
  }

  async fn queue(&self, draft: QuestionDraft, reviewer: UserRef) -> Result<()> {
    let pending = PendingDraft {
      pending_id: Uuid::new_v4(),
      reviewer_id: reviewer,
      draft,
      queued_at: self.clock.now(),
    };
    tracing::warn!(
      pending_id = %pending.pending_id,
      reviewer = %pending.reviewer_id,
      "reviewer unreachable, draft queued"
    );
    self
      .store
      .queue_pending_draft(pending)
      .await
      .map_err(Error::store)
  }

  async fn deliver(
    &self,
    session: &ApprovalSession,
    channel: &ChannelRef,
    resumed: bool,
  ) -> Option<MessageRef> {
    let body = render::review_prompt(session, resumed);
    match self.transport.post_message(channel, &body).await {
      Ok(message) => Some(message),
      Err(e) => {
        tracing::warn!(approval_id = %session.approval_id, error = %e, "review card not delivered");
        None
      }
    }
  }

  /// `last_activity_at` doubles as the row version, so every write must move
  /// it strictly forward.
  fn next_activity(&self, read: DateTime<Utc>) -> DateTime<Utc> {
    self.clock.now().max(read + Duration::milliseconds(1))
  }
}
