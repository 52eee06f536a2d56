//! Engine tuning, deserialised as the `[engine]` table of the bot config.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use trivia_core::{ChannelRef, UserRef, question::SelectionPriority};

use crate::retry::RetryPolicy;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
  /// Idle time after which an open review expires.
  pub approval_ttl_hours:   i64,
  /// Attempts for storage writes that may hit contention.
  pub retry_attempts:       u32,
  /// First retry delay; doubles on each further attempt.
  pub retry_backoff_ms:     u64,
  /// Per-call deadline for the statistics service.
  pub oracle_timeout_secs:  u64,
  /// Maximum edit distance for a "close" answer.
  pub close_distance:       usize,
  /// Active sessions older than this are closed by the sweeper.
  pub session_max_minutes:  i64,
  pub sweep_interval_secs:  u64,
  /// Ask the generator for a replacement after a rejection.
  pub regenerate_on_reject: bool,
  /// Reaction used to acknowledge a recorded answer.
  pub ack_symbol:           String,
  pub selection:            SelectionPriority,
  /// Where operator alerts are posted. Alerts are only logged without it.
  pub operator_channel:     Option<ChannelRef>,
  /// Receives generated drafts when the pool runs dry.
  pub default_reviewer:     Option<UserRef>,
}

/// A configuration value the engine cannot run with.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
  #[error("`{field}` must be between {min} and {max}, got {value}")]
  OutOfRange {
    field: &'static str,
    value: i64,
    min:   i64,
    max:   i64,
  },

  #[error("`{0}` must not be empty")]
  Empty(&'static str),
}

/// Check that `value` lies in `min..=max`.
pub fn check_range(
  field: &'static str,
  value: impl TryInto<i64>,
  min: i64,
  max: i64,
) -> Result<(), ConfigError> {
  let value = value.try_into().unwrap_or(i64::MAX);
  if (min..=max).contains(&value) {
    Ok(())
  } else {
    Err(ConfigError::OutOfRange {
      field,
      value,
      min,
      max,
    })
  }
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      approval_ttl_hours:   trivia_core::approval::DEFAULT_APPROVAL_TTL_HOURS,
      retry_attempts:       3,
      retry_backoff_ms:     100,
      oracle_timeout_secs:  10,
      close_distance:       2,
      session_max_minutes:  60,
      sweep_interval_secs:  60,
      regenerate_on_reject: true,
      ack_symbol:           "\u{2705}".to_owned(),
      selection:            SelectionPriority::default(),
      operator_channel:     None,
      default_reviewer:     None,
    }
  }
}

impl EngineConfig {
  /// Reject values that would panic or stall the engine at runtime.
  pub fn validate(&self) -> Result<(), ConfigError> {
    check_range("engine.approval_ttl_hours", self.approval_ttl_hours, 1, 24 * 365)?;
    check_range("engine.session_max_minutes", self.session_max_minutes, 1, 60 * 24 * 7)?;
    check_range("engine.sweep_interval_secs", self.sweep_interval_secs, 1, 60 * 60 * 24)?;
    check_range("engine.oracle_timeout_secs", self.oracle_timeout_secs, 1, 60 * 10)?;
    check_range("engine.retry_attempts", self.retry_attempts, 1, 20)?;
    check_range("engine.retry_backoff_ms", self.retry_backoff_ms, 0, 60_000)?;
    if self.ack_symbol.trim().is_empty() {
      return Err(ConfigError::Empty("engine.ack_symbol"));
    }
    Ok(())
  }

  pub fn approval_ttl(&self) -> chrono::Duration {
    chrono::Duration::hours(self.approval_ttl_hours)
  }

  pub fn session_max(&self) -> chrono::Duration {
    chrono::Duration::minutes(self.session_max_minutes)
  }

  pub fn oracle_timeout(&self) -> Duration {
    Duration::from_secs(self.oracle_timeout_secs)
  }

  pub fn sweep_interval(&self) -> Duration {
    Duration::from_secs(self.sweep_interval_secs)
  }

  pub fn retry_policy(&self) -> RetryPolicy {
    RetryPolicy::new(
      self.retry_attempts,
      Duration::from_millis(self.retry_backoff_ms),
    )
  }
}
