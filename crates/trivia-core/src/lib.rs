//! Core types and trait definitions for the trivia engine.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! Storage backends and the engine depend on it; it depends on nothing
//! proprietary.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod answer;
pub mod approval;
pub mod error;
pub mod normalize;
pub mod ports;
pub mod question;
pub mod refs;
pub mod session;
pub mod store;

pub use error::{Error, Result};
pub use refs::{ChannelRef, MessageRef, UserRef};
