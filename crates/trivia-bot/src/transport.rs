//! [`WebhookTransport`]: posts to the chat bridge over HTTP.
//!
//! | Method | Path | Body | Response |
//! |--------|------|------|----------|
//! | `POST` | `/messages` | `{"channel","content"}` | `{"message_ref"}` |
//! | `POST` | `/reactions` | `{"message_ref","symbol"}` | any `2xx` |

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use trivia_core::{ChannelRef, MessageRef, ports::{ChatTransport, PortError}};

/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct WebhookTransport {
  client:   Client,
  base_url: String,
  timeout:  Duration,
}

#[derive(Serialize)]
struct PostBody<'a> {
  channel: &'a ChannelRef,
  content: &'a str,
}

#[derive(Deserialize)]
struct Posted {
  message_ref: MessageRef,
}

#[derive(Serialize)]
struct ReactBody<'a> {
  message_ref: &'a MessageRef,
  symbol:      &'a str,
}

impl WebhookTransport {
  pub fn new(base_url: impl Into<String>, timeout: Duration) -> reqwest::Result<Self> {
    let client = Client::builder().timeout(timeout).build()?;
    Ok(Self {
      client,
      base_url: base_url.into(),
      timeout,
    })
  }

  fn url(&self, path: &str) -> String {
    format!("{}{}", self.base_url.trim_end_matches('/'), path)
  }

  async fn send<B: Serialize>(&self, path: &str, body: &B) -> Result<reqwest::Response, PortError> {
    let resp = self
      .client
      .post(self.url(path))
      .json(body)
      .send()
      .await
      .map_err(|e| port_error(e, self.timeout))?;
    check_status(path, resp.status())?;
    Ok(resp)
  }
}

/// Map a transport-level failure onto the port taxonomy.
pub(crate) fn port_error(e: reqwest::Error, timeout: Duration) -> PortError {
  if e.is_timeout() {
    PortError::Timeout(timeout)
  } else if e.is_decode() {
    PortError::Rejected(e.to_string())
  } else {
    PortError::Unavailable(e.to_string())
  }
}

/// Server errors and throttling may clear; anything else will not.
pub(crate) fn check_status(path: &str, status: StatusCode) -> Result<(), PortError> {
  if status.is_success() {
    Ok(())
  } else if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
    Err(PortError::Unavailable(format!("POST {path} -> {status}")))
  } else {
    Err(PortError::Rejected(format!("POST {path} -> {status}")))
  }
}

impl ChatTransport for WebhookTransport {
  async fn post_message(
    &self,
    channel: &ChannelRef,
    content: &str,
  ) -> Result<MessageRef, PortError> {
    let resp = self.send("/messages", &PostBody { channel, content }).await?;
    let posted: Posted = resp
      .json()
      .await
      .map_err(|e| port_error(e, self.timeout))?;
    tracing::debug!(channel = %channel, message = %posted.message_ref, "message posted");
    Ok(posted.message_ref)
  }

  async fn react_to(&self, message: &MessageRef, symbol: &str) -> Result<(), PortError> {
    self
      .send("/reactions", &ReactBody {
        message_ref: message,
        symbol,
      })
      .await?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn status_classification() {
    assert!(check_status("/messages", StatusCode::OK).is_ok());
    assert!(
      check_status("/messages", StatusCode::BAD_GATEWAY)
        .unwrap_err()
        .is_transient()
    );
    assert!(
      check_status("/messages", StatusCode::TOO_MANY_REQUESTS)
        .unwrap_err()
        .is_transient()
    );
    assert!(
      !check_status("/messages", StatusCode::NOT_FOUND)
        .unwrap_err()
        .is_transient()
    );
  }

  #[tokio::test]
  async fn unreachable_bridge_is_unavailable() {
    // Nothing listens on port 9 (discard) on a test host.
    let transport =
      WebhookTransport::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
    let err = transport
      .post_message(&ChannelRef::new("general"), "hello")
      .await
      .unwrap_err();
    assert!(err.is_transient(), "{err}");
  }
}
