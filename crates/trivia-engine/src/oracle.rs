//! [`DynamicAnswerOracle`]: ground truth for a question at close time.

use std::{sync::Arc, time::Duration};

use trivia_core::{
  ports::{PortError, StatsService},
  question::{AnswerSource, Question},
  session::CalculatedAnswer,
};

use crate::retry::RetryPolicy;

pub struct DynamicAnswerOracle<O> {
  stats:   Arc<O>,
  timeout: Duration,
  retry:   RetryPolicy,
}

impl<O: StatsService> DynamicAnswerOracle<O> {
  pub fn new(stats: Arc<O>, timeout: Duration, retry: RetryPolicy) -> Self {
    Self {
      stats,
      timeout,
      retry,
    }
  }

  /// Static answers resolve immediately. Dynamic answers are computed now,
  /// with a per-call timeout and bounded retries; any failure degrades to
  /// [`CalculatedAnswer::Unresolved`].
  pub async fn resolve(&self, question: &Question) -> CalculatedAnswer {
    let query_type = match &question.answer {
      AnswerSource::Static(value) => {
        return CalculatedAnswer::Resolved {
          value: value.clone(),
        };
      }
      AnswerSource::Dynamic { query_type } => query_type,
    };

    match self.compute(query_type).await {
      Ok(value) => {
        tracing::info!(
          question_id = %question.question_id,
          query_type = %query_type,
          value = %value,
          "dynamic answer resolved"
        );
        CalculatedAnswer::Resolved { value }
      }
      Err(e) => {
        tracing::warn!(
          question_id = %question.question_id,
          query_type = %query_type,
          error = %e,
          "dynamic answer unresolved"
        );
        CalculatedAnswer::Unresolved {
          reason: e.to_string(),
        }
      }
    }
  }

  async fn compute(&self, query_type: &str) -> Result<String, PortError> {
    let mut attempt = 0;
    loop {
      let call = self.stats.compute_stat(query_type);
      let err = match tokio::time::timeout(self.timeout, call).await {
        Ok(Ok(value)) if !value.trim().is_empty() => {
          return Ok(value.trim().to_owned());
        }
        Ok(Ok(_)) => PortError::Rejected(format!("`{query_type}` returned nothing")),
        Ok(Err(e)) => e,
        Err(_) => PortError::Timeout(self.timeout),
      };

      if !err.is_transient() || attempt + 1 >= self.retry.attempts() {
        return Err(err);
      }
      tracing::debug!(query_type, attempt = attempt + 1, error = %err, "retrying stat");
      tokio::time::sleep(self.retry.delay(attempt)).await;
      attempt += 1;
    }
  }
}
