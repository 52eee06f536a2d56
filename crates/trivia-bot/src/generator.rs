//! [`HttpDraftGenerator`]: asks the question-writer service for a draft.

use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use trivia_core::{
  ports::{DraftGenerator, PortError},
  question::QuestionDraft,
};

use crate::transport::{check_status, port_error};

#[derive(Clone)]
pub struct HttpDraftGenerator {
  client:  Client,
  /// `None` when no generator is configured; every request then fails.
  url:     Option<String>,
  timeout: Duration,
}

#[derive(Serialize)]
struct Request<'a> {
  category: Option<&'a str>,
}

impl HttpDraftGenerator {
  pub fn new(url: Option<String>, timeout: Duration) -> reqwest::Result<Self> {
    let client = Client::builder().timeout(timeout).build()?;
    Ok(Self {
      client,
      url,
      timeout,
    })
  }
}

impl DraftGenerator for HttpDraftGenerator {
  async fn generate_draft(&self, category: Option<&str>) -> Result<QuestionDraft, PortError> {
    let Some(url) = &self.url else {
      return Err(PortError::Unavailable("no draft generator configured".into()));
    };
    let resp = self
      .client
      .post(url)
      .json(&Request { category })
      .send()
      .await
      .map_err(|e| port_error(e, self.timeout))?;
    check_status(url, resp.status())?;
    let draft: QuestionDraft = resp
      .json()
      .await
      .map_err(|e| port_error(e, self.timeout))?;
    tracing::info!(category = ?category, text = %draft.text, "draft generated");
    Ok(draft)
  }
}
