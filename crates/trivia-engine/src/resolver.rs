//! [`AnswerResolver`]: turns chat replies into answers, and judges them once
//! the ground truth is known.

use std::sync::Arc;

use serde::Serialize;
use trivia_core::{
  MessageRef, UserRef,
  answer::{Answer, AnswerInsert, AnswerVerdict, NewAnswer},
  normalize::{is_close, normalize_reply},
  question::{Question, QuestionKind},
  session::CalculatedAnswer,
  store::TriviaStore,
};
use uuid::Uuid;

use crate::{Error, Result};

/// Neutral acknowledgement of a recorded answer. Correctness is only
/// revealed when the session closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Recorded {
  pub answer_id:    Uuid,
  pub has_conflict: bool,
}

/// Verdicts for every answer of a session, plus the derived outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Evaluation {
  pub verdicts:         Vec<AnswerVerdict>,
  pub first_correct:    Option<UserRef>,
  /// Eligible correct answerers in submission order.
  pub correct_users:    Vec<UserRef>,
  pub conflicted_users: Vec<UserRef>,
  pub close_users:      Vec<UserRef>,
}

/// Judge `answers` against `truth`.
///
/// Answers are considered in `(submitted_at, sequence)` order. The first
/// correct answer from someone other than the question's submitter wins.
/// With an unresolved truth nobody is correct and nobody wins.
pub fn evaluate(
  question: &Question,
  truth: &CalculatedAnswer,
  answers: &[Answer],
  close_distance: usize,
) -> Evaluation {
  let expected = truth.value().map(|v| normalize_reply(v, &question.kind));

  let mut ordered: Vec<&Answer> = answers.iter().collect();
  ordered.sort_by(|a, b| {
    (a.submitted_at, a.sequence).cmp(&(b.submitted_at, b.sequence))
  });

  let mut eval = Evaluation::default();
  for answer in ordered {
    let is_correct = expected.as_deref().map(|e| answer.normalized_text == e);
    let close = match (&question.kind, expected.as_deref()) {
      (QuestionKind::Single, Some(e)) => {
        is_close(&answer.normalized_text, e, close_distance)
      }
      _ => false,
    };
    let first = is_correct == Some(true)
      && !answer.has_conflict
      && eval.first_correct.is_none();

    if answer.has_conflict {
      eval.conflicted_users.push(answer.user_id.clone());
    } else if is_correct == Some(true) {
      eval.correct_users.push(answer.user_id.clone());
    }
    if close {
      eval.close_users.push(answer.user_id.clone());
    }
    if first {
      eval.first_correct = Some(answer.user_id.clone());
    }

    eval.verdicts.push(AnswerVerdict {
      answer_id: answer.answer_id,
      is_correct,
      is_first_correct: first,
      is_close: close,
    });
  }
  eval
}

pub struct AnswerResolver<S> {
  store: Arc<S>,
}

impl<S> Clone for AnswerResolver<S> {
  fn clone(&self) -> Self {
    Self {
      store: self.store.clone(),
    }
  }
}

impl<S: TriviaStore> AnswerResolver<S> {
  pub fn new(store: Arc<S>) -> Self { Self { store } }

  /// Record `user`'s reply to `replied_to` as their answer in `session_id`.
  pub async fn submit(
    &self,
    session_id: Uuid,
    user: &UserRef,
    raw_text: &str,
    replied_to: &MessageRef,
  ) -> Result<Recorded> {
    let session = self
      .store
      .get_session(session_id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::SessionNotFound(session_id))?;
    if !session.correlates(replied_to) {
      return Err(Error::UncorrelatedReply);
    }
    if !session.is_active() {
      return Err(Error::SessionNotActive(session_id));
    }

    let question = self
      .store
      .get_question(session.question_id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::QuestionNotFound(session.question_id))?;

    let has_conflict = question.is_submitted_by(user);
    let answer = NewAnswer {
      session_id,
      user_id: user.clone(),
      raw_text: raw_text.to_owned(),
      normalized_text: normalize_reply(raw_text, &question.kind),
      has_conflict,
    };

    match self.store.insert_answer(answer).await.map_err(Error::store)? {
      AnswerInsert::Inserted(answer) => {
        tracing::debug!(
          session_id = %session_id,
          user = %user,
          answer_id = %answer.answer_id,
          has_conflict,
          "answer recorded"
        );
        Ok(Recorded {
          answer_id: answer.answer_id,
          has_conflict,
        })
      }
      AnswerInsert::Duplicate => Err(Error::DuplicateAnswer(user.clone())),
      AnswerInsert::SessionClosed => Err(Error::SessionNotActive(session_id)),
    }
  }
}

#[cfg(test)]
mod tests {
  use chrono::{Duration, TimeZone, Utc};
  use trivia_core::question::{AnswerSource, QuestionDraft};

  use super::*;

  fn question(draft: QuestionDraft) -> Question {
    Question::from_draft(Uuid::new_v4(), draft, Utc::now())
  }

  fn answer(user: &str, raw: &str, kind: &QuestionKind, secs: i64, seq: i64) -> Answer {
    let t = Utc.with_ymd_and_hms(2026, 3, 1, 20, 0, 0).unwrap();
    Answer {
      answer_id:        Uuid::new_v4(),
      session_id:       Uuid::nil(),
      user_id:          UserRef::new(user),
      raw_text:         raw.into(),
      normalized_text:  normalize_reply(raw, kind),
      submitted_at:     t + Duration::seconds(secs),
      sequence:         seq,
      is_correct:       None,
      is_first_correct: false,
      has_conflict:     false,
      is_close:         false,
    }
  }

  fn resolved(v: &str) -> CalculatedAnswer {
    CalculatedAnswer::Resolved { value: v.into() }
  }

  #[test]
  fn earliest_submission_wins_regardless_of_arrival() {
    let q = question(QuestionDraft::single("Best Xbox launch title?", "Halo"));
    // A arrived first in storage order but was stamped later.
    let a = answer("A", "halo", &q.kind, 10, 1);
    let b = answer("B", "HALO ", &q.kind, 5, 2);

    let eval = evaluate(&q, &resolved("Halo"), &[a, b], 2);
    assert_eq!(eval.first_correct, Some(UserRef::new("B")));
    assert_eq!(eval.correct_users, vec![UserRef::new("B"), UserRef::new("A")]);
    assert_eq!(eval.verdicts.iter().filter(|v| v.is_first_correct).count(), 1);
  }

  #[test]
  fn sequence_breaks_timestamp_ties() {
    let q = question(QuestionDraft::single("q?", "Halo"));
    let a = answer("A", "halo", &q.kind, 5, 9);
    let b = answer("B", "halo", &q.kind, 5, 3);
    let eval = evaluate(&q, &resolved("Halo"), &[a, b], 2);
    assert_eq!(eval.first_correct, Some(UserRef::new("B")));
  }

  #[test]
  fn submitter_is_excluded_but_reported() {
    let mut draft = QuestionDraft::single("q?", "Halo");
    draft.submitter_id = Some(UserRef::new("M"));
    let q = question(draft);

    let mut m = answer("M", "Halo", &q.kind, 1, 1);
    m.has_conflict = true;
    let x = answer("X", "halo", &q.kind, 2, 2);

    let eval = evaluate(&q, &resolved("Halo"), &[m, x], 2);
    assert_eq!(eval.first_correct, Some(UserRef::new("X")));
    assert_eq!(eval.conflicted_users, vec![UserRef::new("M")]);
    assert_eq!(eval.correct_users, vec![UserRef::new("X")]);
    // The submitter's answer is still judged.
    assert_eq!(eval.verdicts[0].is_correct, Some(true));
    assert!(!eval.verdicts[0].is_first_correct);
  }

  #[test]
  fn near_misses_are_close_but_not_correct() {
    let q = question(QuestionDraft::single("q?", "Bungie"));
    let a = answer("A", "bungee", &q.kind, 1, 1);
    let b = answer("B", "valve", &q.kind, 2, 2);
    let eval = evaluate(&q, &resolved("Bungie"), &[a, b], 2);
    assert_eq!(eval.first_correct, None);
    assert_eq!(eval.close_users, vec![UserRef::new("A")]);
    assert_eq!(eval.verdicts[0].is_correct, Some(false));
    assert!(eval.verdicts[0].is_close);
    assert!(!eval.verdicts[1].is_close);
  }

  #[test]
  fn multiple_choice_matches_letters_and_option_text() {
    let mut draft = QuestionDraft::single("Which studio made Halo?", "B");
    draft.kind = QuestionKind::MultipleChoice {
      options: ["Valve".into(), "Bungie".into(), "Epic".into(), "id".into()],
    };
    let q = question(draft);

    let a = answer("A", "b) bungie", &q.kind, 1, 1);
    let b = answer("B", "Bungie", &q.kind, 2, 2);
    let c = answer("C", "a", &q.kind, 3, 3);
    let eval = evaluate(&q, &resolved("B"), &[a, b, c], 2);
    assert_eq!(eval.correct_users, vec![UserRef::new("A"), UserRef::new("B")]);
    assert_eq!(eval.verdicts[2].is_correct, Some(false));
    assert!(eval.close_users.is_empty());
  }

  #[test]
  fn dynamic_truth_is_compared_normalized() {
    let mut draft = QuestionDraft::single("Longest played game?", "");
    draft.answer = AnswerSource::Dynamic {
      query_type: "longest_playtime_game".into(),
    };
    let q = question(draft);
    let a = answer("A", "god of war", &q.kind, 1, 1);
    let eval = evaluate(&q, &resolved("God of War"), &[a], 2);
    assert_eq!(eval.first_correct, Some(UserRef::new("A")));
  }

  #[test]
  fn unresolved_truth_judges_nobody() {
    let q = question(QuestionDraft::single("q?", "Halo"));
    let a = answer("A", "halo", &q.kind, 1, 1);
    let truth = CalculatedAnswer::Unresolved {
      reason: "stats offline".into(),
    };
    let eval = evaluate(&q, &truth, &[a], 2);
    assert_eq!(eval.first_correct, None);
    assert_eq!(eval.verdicts[0].is_correct, None);
    assert!(eval.correct_users.is_empty());
  }
}
