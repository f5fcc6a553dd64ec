//! Workflow invocation protocol client.
//!
//! Drives a remote, stateful, server-streamed workflow API to completion:
//!
//! ```text
//! query ──► WorkflowClient ──► POST {invoke_url} (stream: true)
//!               │                     │
//!               │               data: <json> lines
//!               │                     ▼
//!               │               event_stream (decoder)
//!               │                     ▼
//!               └─ transcript ◄── interpret ──► inject input / terminate
//!                      │
//!                      ▼
//!                rendered text
//! ```
//!
//! At most two rounds per query: the first round, plus one input-injection
//! round when the workflow explicitly asks for `user_input`. Any later
//! interactive request ends the session instead of recursing again.

pub mod client;
mod decoder;
pub mod event;
mod interpreter;

pub use client::{invoke, WorkflowClient};
pub use event::{DecodedEvent, EventData, EventKind, EventStatus};
