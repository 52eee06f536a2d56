//! Error types for `trivia-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("question text must not be empty")]
  EmptyQuestion,

  #[error("multiple-choice option {0} is empty")]
  EmptyOption(char),

  #[error("static answer must not be empty")]
  EmptyAnswer,

  #[error("answer {0:?} is neither an option letter (A-D) nor an option text")]
  AnswerNotAnOption(String),

  #[error("invalid dynamic query type: {0:?}")]
  InvalidQueryType(String),

  #[error("unknown {field} value: {value:?}")]
  UnknownVariant { field: &'static str, value: String },

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
