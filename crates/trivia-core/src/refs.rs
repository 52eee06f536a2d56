//! Opaque identifiers handed to us by the chat transport.
//!
//! The engine never interprets these; it only stores and compares them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A chat user (author of a reply, a moderator, a reviewer).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserRef(pub String);

/// A channel (or direct-message conversation) messages can be posted to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelRef(pub String);

/// A single posted message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageRef(pub String);

macro_rules! string_ref {
  ($ty:ident) => {
    impl $ty {
      pub fn new(value: impl Into<String>) -> Self { Self(value.into()) }

      pub fn as_str(&self) -> &str { &self.0 }
    }

    impl fmt::Display for $ty {
      fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
      }
    }

    impl From<String> for $ty {
      fn from(value: String) -> Self { Self(value) }
    }

    impl From<&str> for $ty {
      fn from(value: &str) -> Self { Self(value.to_owned()) }
    }
  };
}

string_ref!(UserRef);
string_ref!(ChannelRef);
string_ref!(MessageRef);
