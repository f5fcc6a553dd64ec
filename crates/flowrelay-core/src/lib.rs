//! Flowrelay Core — transport-agnostic workflow invocation client and
//! output normalization.
//!
//! This crate contains the streaming protocol client that drives a remote
//! workflow API to completion, plus the tolerant normalizer that turns the
//! accumulated stream (or legacy textual dumps of it) into a stable,
//! human-readable result. It has **no HTTP framework dependency**: the
//! HTTP front door, agent-directory fetching/caching, and routing
//! decisions live in the surrounding service, which calls in through:
//!
//! - [`WorkflowClient::invoke`] / [`invoke`] — drive one query against a
//!   streaming workflow endpoint; always returns renderable text.
//! - [`ChatAgent::ask`] — single-shot chat-style agents.
//! - [`normalize`] / [`normalize_text`] — reconstruct categorized output
//!   from arbitrary or legacy text.
//!
//! Each query's state (session token, fragment buffer) is private to its
//! own call; concurrent queries share nothing mutable.

pub mod chat;
pub mod directory;
pub mod error;
pub mod invoke;
pub mod normalize;
pub mod render;

pub use chat::ChatAgent;
pub use directory::{AgentCard, AgentKind};
pub use error::RelayError;
pub use invoke::{invoke, WorkflowClient};
pub use normalize::{normalize, normalize_text, NormalizedResult};
pub use render::{Fragment, Transcript};
