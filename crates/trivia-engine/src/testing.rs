//! In-memory collaborators for engine tests.

use std::{
  collections::{HashMap, HashSet, VecDeque},
  sync::{
    Arc, Mutex,
    atomic::{AtomicU32, Ordering},
  },
  time::Duration,
};

use chrono::{DateTime, TimeZone, Utc};
use trivia_core::{
  ChannelRef, MessageRef,
  ports::{ChatTransport, DraftGenerator, PortError, StatsService},
  question::QuestionDraft,
};

use crate::clock::ManualClock;

pub fn t0() -> DateTime<Utc> { Utc.with_ymd_and_hms(2026, 3, 1, 20, 0, 0).unwrap() }

pub fn clock_at(at: DateTime<Utc>) -> Arc<ManualClock> { Arc::new(ManualClock::new(at)) }

// ─── Transport ───────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeTransport {
  next_id:   AtomicU32,
  posts:     Mutex<Vec<(ChannelRef, MessageRef, String)>>,
  reactions: Mutex<Vec<(MessageRef, String)>>,
  down:      Mutex<HashSet<ChannelRef>>,
}

impl FakeTransport {
  pub fn set_down(&self, channel: &ChannelRef, down: bool) {
    let mut set = self.down.lock().unwrap();
    if down {
      set.insert(channel.clone());
    } else {
      set.remove(channel);
    }
  }

  pub fn posts_to(&self, channel: &ChannelRef) -> Vec<String> {
    self
      .posts
      .lock()
      .unwrap()
      .iter()
      .filter(|(c, _, _)| c == channel)
      .map(|(_, _, text)| text.clone())
      .collect()
  }

  /// Message refs posted to `channel`, oldest first.
  pub fn refs_in(&self, channel: &ChannelRef) -> Vec<MessageRef> {
    self
      .posts
      .lock()
      .unwrap()
      .iter()
      .filter(|(c, _, _)| c == channel)
      .map(|(_, m, _)| m.clone())
      .collect()
  }

  pub fn reactions(&self) -> Vec<(MessageRef, String)> {
    self.reactions.lock().unwrap().clone()
  }
}

impl ChatTransport for FakeTransport {
  async fn post_message(
    &self,
    channel: &ChannelRef,
    content: &str,
  ) -> Result<MessageRef, PortError> {
    if self.down.lock().unwrap().contains(channel) {
      return Err(PortError::Unavailable(format!("{channel} is down")));
    }
    let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
    let message = MessageRef::new(format!("msg-{id}"));
    self
      .posts
      .lock()
      .unwrap()
      .push((channel.clone(), message.clone(), content.to_owned()));
    Ok(message)
  }

  async fn react_to(&self, message: &MessageRef, symbol: &str) -> Result<(), PortError> {
    self
      .reactions
      .lock()
      .unwrap()
      .push((message.clone(), symbol.to_owned()));
    Ok(())
  }
}

// ─── Stats ───────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeStats {
  values:        Mutex<HashMap<String, String>>,
  fail_first:    u32,
  delay:         Option<Duration>,
  calls:         AtomicU32,
}

impl FakeStats {
  pub fn with(self, query_type: &str, value: &str) -> Self {
    self.set(query_type, value);
    self
  }

  pub fn failing_first(mut self, n: u32) -> Self {
    self.fail_first = n;
    self
  }

  pub fn delayed(mut self, by: Duration) -> Self {
    self.delay = Some(by);
    self
  }

  /// Change the underlying data, as the tracker would.
  pub fn set(&self, query_type: &str, value: &str) {
    self
      .values
      .lock()
      .unwrap()
      .insert(query_type.to_owned(), value.to_owned());
  }

  pub fn calls(&self) -> u32 { self.calls.load(Ordering::SeqCst) }
}

impl StatsService for FakeStats {
  async fn compute_stat(&self, query_type: &str) -> Result<String, PortError> {
    let call = self.calls.fetch_add(1, Ordering::SeqCst);
    if let Some(delay) = self.delay {
      tokio::time::sleep(delay).await;
    }
    if call < self.fail_first {
      return Err(PortError::Unavailable("stats store busy".into()));
    }
    self
      .values
      .lock()
      .unwrap()
      .get(query_type)
      .cloned()
      .ok_or_else(|| PortError::Rejected(format!("unknown query type `{query_type}`")))
  }
}

// ─── Generator ───────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeGenerator {
  drafts:     Mutex<VecDeque<QuestionDraft>>,
  categories: Mutex<Vec<Option<String>>>,
}

impl FakeGenerator {
  pub fn push(&self, draft: QuestionDraft) { self.drafts.lock().unwrap().push_back(draft); }

  /// Categories requested so far, in order.
  pub fn requests(&self) -> Vec<Option<String>> { self.categories.lock().unwrap().clone() }
}

impl DraftGenerator for FakeGenerator {
  async fn generate_draft(&self, category: Option<&str>) -> Result<QuestionDraft, PortError> {
    self
      .categories
      .lock()
      .unwrap()
      .push(category.map(str::to_owned));
    self
      .drafts
      .lock()
      .unwrap()
      .pop_front()
      .ok_or_else(|| PortError::Unavailable("generator offline".into()))
  }
}
