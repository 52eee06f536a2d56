//! Operator alerts: logged at error level and posted to the operator channel
//! when one is configured.

use std::sync::Arc;

use trivia_core::{ChannelRef, ports::ChatTransport};

pub struct OperatorAlerts<T> {
  transport: Arc<T>,
  channel:   Option<ChannelRef>,
}

impl<T> Clone for OperatorAlerts<T> {
  fn clone(&self) -> Self {
    Self {
      transport: self.transport.clone(),
      channel:   self.channel.clone(),
    }
  }
}

impl<T: ChatTransport> OperatorAlerts<T> {
  pub fn new(transport: Arc<T>, channel: Option<ChannelRef>) -> Self {
    Self { transport, channel }
  }

  /// Never fails: a delivery problem is only logged.
  pub async fn raise(&self, message: &str) {
    tracing::error!(alert = true, "{message}");
    let Some(channel) = &self.channel else {
      return;
    };
    let body = format!("[trivia alert] {message}");
    if let Err(e) = self.transport.post_message(channel, &body).await {
      tracing::warn!(error = %e, channel = %channel, "operator alert not delivered");
    }
  }
}
