//! Plain-text bodies for every outbound message.

use std::fmt::Write as _;

use trivia_core::{
  UserRef,
  approval::ApprovalSession,
  question::{AnswerSource, OPTION_LETTERS, Question, QuestionDraft, QuestionKind},
  session::{CalculatedAnswer, SessionResult},
};

fn mention(user: &UserRef) -> String { format!("<@{user}>") }

fn mentions(users: &[UserRef]) -> String {
  users.iter().map(mention).collect::<Vec<_>>().join(" ")
}

fn write_options(out: &mut String, kind: &QuestionKind) {
  if let Some(options) = kind.options() {
    for (letter, option) in OPTION_LETTERS.iter().zip(options) {
      let _ = writeln!(out, "{letter}) {option}");
    }
  }
}

pub fn draft_summary(draft: &QuestionDraft) -> String {
  let mut out = format!("Q: {}\n", draft.text);
  write_options(&mut out, &draft.kind);
  match &draft.answer {
    AnswerSource::Static(answer) => {
      let _ = writeln!(out, "Answer: {answer}");
    }
    AnswerSource::Dynamic { query_type } => {
      let _ = writeln!(out, "Answer: computed from `{query_type}` when the round closes");
    }
  }
  if let Some(category) = &draft.category {
    let _ = writeln!(out, "Category: {category}");
  }
  out
}

/// The review card sent to a reviewer.
pub fn review_prompt(session: &ApprovalSession, resumed: bool) -> String {
  let mut out = String::new();
  if resumed {
    out.push_str("(resumed after a restart)\n");
  }
  let _ = writeln!(
    out,
    "Review {} (revision {}):",
    session.approval_id, session.revision
  );
  out.push_str(&draft_summary(&session.draft));
  let _ = write!(
    out,
    "Reply `approve`, `reject` or `edit` before {}.",
    session.expires_at.format("%Y-%m-%d %H:%M UTC")
  );
  out
}

pub fn expired_notice(session: &ApprovalSession) -> String {
  format!(
    "Review {} expired without a decision. Use `resubmit {}` to review \"{}\" again.",
    session.approval_id, session.approval_id, session.draft.text
  )
}

pub fn question_post(question: &Question) -> String {
  let mut out = format!("Trivia time! {}\n", question.text);
  write_options(&mut out, &question.kind);
  out
}

pub fn confirmation_post() -> String {
  "Reply to the question or to this message with your answer. \
   One answer per person; results are revealed when the round closes."
    .to_owned()
}

pub fn results(question: &Question, result: &SessionResult) -> String {
  let mut out = match &result.calculated_answer {
    CalculatedAnswer::Resolved { value } => {
      format!("The correct answer to \"{}\" is: {value}.", question.text)
    }
    CalculatedAnswer::Unresolved { .. } => format!(
      "The answer to \"{}\" could not be determined this time, so no winner.",
      question.text
    ),
  };

  match &result.first_correct_user {
    Some(winner) => {
      let _ = write!(out, " First correct: {}!", mention(winner));
      let others: Vec<UserRef> = result
        .correct_users
        .iter()
        .filter(|u| *u != winner)
        .cloned()
        .collect();
      if !others.is_empty() {
        let _ = write!(out, " Also correct: {}.", mentions(&others));
      }
    }
    None if result.calculated_answer.value().is_some() => {
      out.push_str(" Nobody got it right...");
    }
    None => {}
  }

  if !result.close_users.is_empty() {
    let _ = write!(out, " So close: {}.", mentions(&result.close_users));
  }
  if !result.conflicted_users.is_empty() {
    let _ = write!(
      out,
      " Not eligible (submitted the question): {}.",
      mentions(&result.conflicted_users)
    );
  }
  let _ = write!(out, " {} answered.", result.participant_count);
  out
}
