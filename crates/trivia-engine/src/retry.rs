//! Bounded retry with exponential backoff for transient failures.

use std::{future::Future, time::Duration};

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
  attempts: u32,
  backoff:  Duration,
}

impl Default for RetryPolicy {
  fn default() -> Self { Self::new(3, Duration::from_millis(100)) }
}

impl RetryPolicy {
  /// `attempts` is clamped to at least one.
  pub fn new(attempts: u32, backoff: Duration) -> Self {
    Self {
      attempts: attempts.max(1),
      backoff,
    }
  }

  pub fn attempts(&self) -> u32 { self.attempts }

  /// Delay after the zero-based `attempt` failed.
  pub fn delay(&self, attempt: u32) -> Duration {
    self.backoff.saturating_mul(2u32.saturating_pow(attempt))
  }

  /// Run `op` until it succeeds, fails with a non-transient error, or the
  /// attempts run out. Exhaustion is reported as
  /// [`Error::RetriesExhausted`], which is fatal.
  pub async fn run<T, F, Fut>(&self, what: &'static str, mut op: F) -> Result<T>
  where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
  {
    let mut attempt = 0;
    loop {
      match op().await {
        Ok(value) => return Ok(value),
        Err(e) if e.is_transient() && attempt + 1 < self.attempts => {
          let delay = self.delay(attempt);
          tracing::warn!(
            error = %e,
            attempt = attempt + 1,
            delay_ms = delay.as_millis() as u64,
            "{what} failed, retrying"
          );
          tokio::time::sleep(delay).await;
          attempt += 1;
        }
        Err(e) if e.is_transient() => {
          return Err(Error::RetriesExhausted {
            what,
            attempts: self.attempts,
            source: Box::new(e),
          });
        }
        Err(e) => return Err(e),
      }
    }
  }
}
