//! [`SqliteStore`], the SQLite implementation of [`TriviaStore`].

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use trivia_core::{
  ChannelRef, MessageRef, UserRef,
  answer::{Answer, AnswerInsert, AnswerVerdict, NewAnswer},
  approval::{ApprovalSession, PendingDraft},
  question::{Question, QuestionStatus, SelectionPriority},
  session::{SessionResult, TriviaSession},
  store::TriviaStore,
};

use crate::{
  Result,
  encode::{
    ANSWER_SELECT, APPROVAL_SELECT, ApprovalColumns, QUESTION_SELECT,
    QuestionColumns, RawAnswer, RawApproval, RawPending, RawQuestion,
    RawSession, SESSION_SELECT, decode_dt, encode_dt, encode_question_status,
    encode_session_status, encode_uuid,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A trivia store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    tracing::debug!("trivia schema ready");
    Ok(())
  }

  async fn query_questions(
    &self,
    sql: String,
    param: Option<String>,
  ) -> Result<Vec<Question>> {
    let raws: Vec<RawQuestion> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = match param {
          Some(p) => stmt
            .query_map(rusqlite::params![p], RawQuestion::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?,
          None => stmt
            .query_map([], RawQuestion::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?,
        };
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawQuestion::into_question).collect()
  }

  async fn query_approvals(
    &self,
    sql: String,
    param: Option<String>,
  ) -> Result<Vec<ApprovalSession>> {
    let raws: Vec<RawApproval> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = match param {
          Some(p) => stmt
            .query_map(rusqlite::params![p], RawApproval::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?,
          None => stmt
            .query_map([], RawApproval::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?,
        };
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawApproval::into_approval).collect()
  }

  async fn query_session(
    &self,
    sql: String,
    param: Option<String>,
  ) -> Result<Option<TriviaSession>> {
    let raw: Option<RawSession> = self
      .conn
      .call(move |conn| {
        let row = match param {
          Some(p) => conn
            .query_row(&sql, rusqlite::params![p], RawSession::from_row)
            .optional()?,
          None => conn.query_row(&sql, [], RawSession::from_row).optional()?,
        };
        Ok(row)
      })
      .await?;

    raw.map(RawSession::into_session).transpose()
  }
}

// ─── TriviaStore impl ────────────────────────────────────────────────────────

impl TriviaStore for SqliteStore {
  type Error = crate::Error;

  // ── Questions ─────────────────────────────────────────────────────────────

  async fn insert_question(&self, question: Question) -> Result<Question> {
    let cols = QuestionColumns::encode(&question)?;

    self
      .conn
      .call(move |conn| {
        cols.insert(conn)?;
        Ok(())
      })
      .await?;

    Ok(question)
  }

  async fn get_question(&self, id: Uuid) -> Result<Option<Question>> {
    let sql = format!("{QUESTION_SELECT} WHERE question_id = ?1");
    let mut found = self.query_questions(sql, Some(encode_uuid(id))).await?;
    Ok(found.pop())
  }

  async fn list_questions(
    &self,
    status: Option<QuestionStatus>,
  ) -> Result<Vec<Question>> {
    match status {
      Some(s) => {
        let sql = format!("{QUESTION_SELECT} WHERE status = ?1 ORDER BY created_at");
        self
          .query_questions(sql, Some(encode_question_status(s).to_owned()))
          .await
      }
      None => {
        let sql = format!("{QUESTION_SELECT} ORDER BY created_at");
        self.query_questions(sql, None).await
      }
    }
  }

  async fn next_available(
    &self,
    priority: SelectionPriority,
  ) -> Result<Option<Question>> {
    let order = match priority {
      SelectionPriority::OldestUnused => {
        "last_used_at IS NOT NULL, last_used_at, usage_count, created_at"
      }
      SelectionPriority::LeastUsed => {
        "usage_count, last_used_at IS NOT NULL, last_used_at, created_at"
      }
    };
    let sql = format!(
      "{QUESTION_SELECT} WHERE status = 'available' ORDER BY {order} LIMIT 1"
    );
    let mut found = self.query_questions(sql, None).await?;
    Ok(found.pop())
  }

  async fn set_question_status(
    &self,
    id: Uuid,
    status: QuestionStatus,
  ) -> Result<bool> {
    let id_str = encode_uuid(id);
    let status_str = encode_question_status(status);

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE questions SET status = ?2 WHERE question_id = ?1",
          rusqlite::params![id_str, status_str],
        )?)
      })
      .await?;

    Ok(changed == 1)
  }

  async fn record_question_usage(
    &self,
    id: Uuid,
    at: DateTime<Utc>,
  ) -> Result<bool> {
    let id_str = encode_uuid(id);
    let at_str = encode_dt(at);

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE questions
             SET usage_count = usage_count + 1, last_used_at = ?2
           WHERE question_id = ?1",
          rusqlite::params![id_str, at_str],
        )?)
      })
      .await?;

    Ok(changed == 1)
  }

  // ── Approvals ─────────────────────────────────────────────────────────────

  async fn insert_approval(
    &self,
    approval: ApprovalSession,
  ) -> Result<Option<ApprovalSession>> {
    let c = ApprovalColumns::encode(&approval)?;

    let inserted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "INSERT INTO approval_sessions (
             approval_id, reviewer_id, draft_key, draft_json, step, outcome,
             approved_question_id, review_message, created_at,
             last_activity_at, expires_at, restart_count, revision
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
           ON CONFLICT DO NOTHING",
          rusqlite::params![
            c.approval_id,
            c.reviewer_id,
            c.draft_key,
            c.draft_json,
            c.step,
            c.outcome,
            c.approved_question_id,
            c.review_message,
            c.created_at,
            c.last_activity_at,
            c.expires_at,
            c.restart_count,
            c.revision,
          ],
        )?)
      })
      .await?;

    Ok((inserted == 1).then_some(approval))
  }

  async fn get_approval(&self, id: Uuid) -> Result<Option<ApprovalSession>> {
    let sql = format!("{APPROVAL_SELECT} WHERE approval_id = ?1");
    let mut found = self.query_approvals(sql, Some(encode_uuid(id))).await?;
    Ok(found.pop())
  }

  async fn open_approvals(&self) -> Result<Vec<ApprovalSession>> {
    let sql = format!(
      "{APPROVAL_SELECT} WHERE step != 'completed' ORDER BY created_at"
    );
    self.query_approvals(sql, None).await
  }

  async fn expired_approvals(
    &self,
    now: DateTime<Utc>,
  ) -> Result<Vec<ApprovalSession>> {
    let sql = format!(
      "{APPROVAL_SELECT}
       WHERE step != 'completed' AND expires_at < ?1
       ORDER BY expires_at"
    );
    self.query_approvals(sql, Some(encode_dt(now))).await
  }

  async fn update_approval(
    &self,
    approval: ApprovalSession,
    expected_activity: DateTime<Utc>,
  ) -> Result<bool> {
    let cols = ApprovalColumns::encode(&approval)?;
    let expected = encode_dt(expected_activity);

    let changed = self
      .conn
      .call(move |conn| Ok(cols.update_if(conn, &expected)?))
      .await?;

    Ok(changed == 1)
  }

  async fn approve_draft(
    &self,
    approval: ApprovalSession,
    expected_activity: DateTime<Utc>,
    question: Question,
  ) -> Result<bool> {
    let approval_cols = ApprovalColumns::encode(&approval)?;
    let question_cols = QuestionColumns::encode(&question)?;
    let expected = encode_dt(expected_activity);

    let committed = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        // The question row must exist before the approval can reference it.
        question_cols.insert(&tx)?;
        if approval_cols.update_if(&tx, &expected)? != 1 {
          tx.rollback()?;
          return Ok(false);
        }
        tx.commit()?;
        Ok(true)
      })
      .await?;

    Ok(committed)
  }

  async fn queue_pending_draft(&self, pending: PendingDraft) -> Result<()> {
    let id_str = encode_uuid(pending.pending_id);
    let reviewer = pending.reviewer_id.0;
    let draft_json = serde_json::to_string(&pending.draft)?;
    let queued_at = encode_dt(pending.queued_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO pending_drafts (pending_id, reviewer_id, draft_json, queued_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![id_str, reviewer, draft_json, queued_at],
        )?;
        Ok(())
      })
      .await?;

    Ok(())
  }

  async fn pending_drafts(&self) -> Result<Vec<PendingDraft>> {
    let raws: Vec<RawPending> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT pending_id, reviewer_id, draft_json, queued_at
           FROM pending_drafts ORDER BY queued_at",
        )?;
        let rows = stmt
          .query_map([], |row| {
            Ok(RawPending {
              pending_id:  row.get(0)?,
              reviewer_id: row.get(1)?,
              draft_json:  row.get(2)?,
              queued_at:   row.get(3)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawPending::into_pending).collect()
  }

  async fn remove_pending_draft(&self, id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(id);

    let removed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM pending_drafts WHERE pending_id = ?1",
          rusqlite::params![id_str],
        )?)
      })
      .await?;

    Ok(removed == 1)
  }

  // ── Reviewer channels ─────────────────────────────────────────────────────

  async fn save_reviewer_channel(
    &self,
    reviewer: UserRef,
    channel: ChannelRef,
    registered_at: DateTime<Utc>,
  ) -> Result<()> {
    let reviewer = reviewer.0;
    let channel = channel.0;
    let registered_at = encode_dt(registered_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO reviewer_channels (reviewer_id, channel, registered_at)
           VALUES (?1, ?2, ?3)
           ON CONFLICT (reviewer_id) DO UPDATE
             SET channel = excluded.channel, registered_at = excluded.registered_at",
          rusqlite::params![reviewer, channel, registered_at],
        )?;
        Ok(())
      })
      .await?;

    Ok(())
  }

  async fn delete_reviewer_channel(&self, reviewer: UserRef) -> Result<bool> {
    let reviewer = reviewer.0;

    let removed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM reviewer_channels WHERE reviewer_id = ?1",
          rusqlite::params![reviewer],
        )?)
      })
      .await?;

    Ok(removed == 1)
  }

  async fn reviewer_channels(&self) -> Result<Vec<(UserRef, ChannelRef)>> {
    let rows: Vec<(String, String)> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT reviewer_id, channel FROM reviewer_channels ORDER BY registered_at",
        )?;
        let rows = stmt
          .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(
      rows
        .into_iter()
        .map(|(reviewer, channel)| (UserRef::new(reviewer), ChannelRef::new(channel)))
        .collect(),
    )
  }

  // ── Trivia sessions ───────────────────────────────────────────────────────

  async fn create_session(
    &self,
    session: TriviaSession,
  ) -> Result<Option<TriviaSession>> {
    let id_str = encode_uuid(session.session_id);
    let question_str = encode_uuid(session.question_id);
    let channel = session.channel.0.clone();
    let started_by = session.started_by.0.clone();
    let started_at = encode_dt(session.started_at);
    let status = encode_session_status(session.status);

    let inserted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "INSERT INTO trivia_sessions (
             session_id, question_id, channel, started_by, started_at, status
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
           ON CONFLICT DO NOTHING",
          rusqlite::params![
            id_str,
            question_str,
            channel,
            started_by,
            started_at,
            status
          ],
        )?)
      })
      .await?;

    Ok((inserted == 1).then_some(session))
  }

  async fn get_session(&self, id: Uuid) -> Result<Option<TriviaSession>> {
    let sql = format!("{SESSION_SELECT} WHERE session_id = ?1");
    self.query_session(sql, Some(encode_uuid(id))).await
  }

  async fn active_session(&self) -> Result<Option<TriviaSession>> {
    let sql = format!("{SESSION_SELECT} WHERE status = 'active'");
    self.query_session(sql, None).await
  }

  async fn find_session_by_message(
    &self,
    message: MessageRef,
  ) -> Result<Option<TriviaSession>> {
    let sql = format!(
      "{SESSION_SELECT}
       WHERE question_message = ?1 OR confirmation_message = ?1
       ORDER BY started_at DESC
       LIMIT 1"
    );
    self.query_session(sql, Some(message.0)).await
  }

  async fn set_message_refs(
    &self,
    id: Uuid,
    question: MessageRef,
    confirmation: MessageRef,
  ) -> Result<bool> {
    let id_str = encode_uuid(id);

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE trivia_sessions
             SET question_message = ?2, confirmation_message = ?3
           WHERE session_id = ?1 AND status = 'active'",
          rusqlite::params![id_str, question.0, confirmation.0],
        )?)
      })
      .await?;

    Ok(changed == 1)
  }

  async fn complete_session(
    &self,
    result: SessionResult,
    verdicts: Vec<AnswerVerdict>,
    ended_at: DateTime<Utc>,
  ) -> Result<bool> {
    let id_str = encode_uuid(result.session_id);
    let calculated = serde_json::to_string(&result.calculated_answer)?;
    let first_correct = result.first_correct_user.map(|u| u.0);
    let participants = i64::from(result.participant_count);
    let correct = i64::from(result.correct_count);
    let ended_str = encode_dt(ended_at);
    let verdicts: Vec<(String, Option<bool>, bool, bool)> = verdicts
      .into_iter()
      .map(|v| {
        (encode_uuid(v.answer_id), v.is_correct, v.is_first_correct, v.is_close)
      })
      .collect();

    let committed = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let changed = tx.execute(
          "UPDATE trivia_sessions
             SET status = 'completed', ended_at = ?2, calculated_answer = ?3,
                 first_correct_user = ?4, participant_count = ?5,
                 correct_count = ?6
           WHERE session_id = ?1 AND status = 'active'",
          rusqlite::params![
            id_str,
            ended_str,
            calculated,
            first_correct,
            participants,
            correct
          ],
        )?;
        if changed != 1 {
          tx.rollback()?;
          return Ok(false);
        }

        {
          let mut stmt = tx.prepare(
            "UPDATE answers
               SET is_correct = ?3, is_first_correct = ?4, is_close = ?5
             WHERE answer_id = ?1 AND session_id = ?2",
          )?;
          for (answer_id, is_correct, is_first, is_close) in &verdicts {
            stmt.execute(rusqlite::params![
              answer_id, id_str, is_correct, is_first, is_close
            ])?;
          }
        }

        tx.commit()?;
        Ok(true)
      })
      .await?;

    Ok(committed)
  }

  async fn expire_session(
    &self,
    id: Uuid,
    ended_at: DateTime<Utc>,
  ) -> Result<bool> {
    let id_str = encode_uuid(id);
    let ended_str = encode_dt(ended_at);

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE trivia_sessions SET status = 'expired', ended_at = ?2
           WHERE session_id = ?1 AND status = 'active'",
          rusqlite::params![id_str, ended_str],
        )?)
      })
      .await?;

    Ok(changed == 1)
  }

  // ── Answers ───────────────────────────────────────────────────────────────

  async fn insert_answer(&self, answer: NewAnswer) -> Result<AnswerInsert> {
    let answer_id = Uuid::new_v4();
    let id_str = encode_uuid(answer_id);
    let session_str = encode_uuid(answer.session_id);
    let user = answer.user_id.0.clone();
    let raw_text = answer.raw_text.clone();
    let normalized = answer.normalized_text.clone();
    let has_conflict = answer.has_conflict;

    // `None` means the session was not active.
    let stamped: Option<Option<(i64, String)>> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let active = tx
          .query_row(
            "SELECT 1 FROM trivia_sessions
             WHERE session_id = ?1 AND status = 'active'",
            rusqlite::params![session_str],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);
        if !active {
          tx.rollback()?;
          return Ok(None);
        }

        let row = tx
          .query_row(
            "INSERT INTO answers (
               answer_id, session_id, user_id, raw_text, normalized_text,
               submitted_at, has_conflict
             ) VALUES (
               ?1, ?2, ?3, ?4, ?5, strftime('%Y-%m-%dT%H:%M:%fZ', 'now'), ?6
             )
             ON CONFLICT (session_id, user_id) DO NOTHING
             RETURNING seq, submitted_at",
            rusqlite::params![
              id_str,
              session_str,
              user,
              raw_text,
              normalized,
              has_conflict
            ],
            |r| Ok((r.get(0)?, r.get(1)?)),
          )
          .optional()?;
        tx.commit()?;
        Ok(Some(row))
      })
      .await?;

    let Some(stamped) = stamped else {
      return Ok(AnswerInsert::SessionClosed);
    };
    let Some((sequence, submitted_at)) = stamped else {
      return Ok(AnswerInsert::Duplicate);
    };

    Ok(AnswerInsert::Inserted(Answer {
      answer_id,
      session_id: answer.session_id,
      user_id: answer.user_id,
      raw_text: answer.raw_text,
      normalized_text: answer.normalized_text,
      submitted_at: decode_dt(&submitted_at)?,
      sequence,
      is_correct: None,
      is_first_correct: false,
      has_conflict,
      is_close: false,
    }))
  }

  async fn answers_for_session(&self, session_id: Uuid) -> Result<Vec<Answer>> {
    let session_str = encode_uuid(session_id);
    let sql = format!(
      "{ANSWER_SELECT} WHERE session_id = ?1 ORDER BY submitted_at, seq"
    );

    let raws: Vec<RawAnswer> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![session_str], RawAnswer::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawAnswer::into_answer).collect()
  }
}
