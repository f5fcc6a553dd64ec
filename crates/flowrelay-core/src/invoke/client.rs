//! Invocation State Machine — drives one query against a remote workflow
//! endpoint until a final rendered result exists.
//!
//! A query traverses at most two rounds: the first round, plus a single
//! input-injection round when the workflow explicitly asks for
//! `user_input`. The continuation is an explicit bounded phase loop rather
//! than recursion — the maximum depth is fixed by design.

use std::time::Duration;

use serde_json::json;
use tokio_stream::StreamExt;

use super::decoder;
use super::interpreter::{interpret, Outcome};
use crate::error::RelayError;
use crate::render::{Fragment, Transcript};

/// Workflows may run long server-side computations, so the per-round
/// timeout is generous.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Upper bound on events consumed per round. The remote stream is
/// untrusted and may be unbounded or buggy.
const DEFAULT_MAX_EVENTS: usize = 1000;

/// Per-query mutable state: the continuation token and the output buffer.
/// Owned by exactly one `invoke` call; never shared across queries.
pub(crate) struct InvocationRun {
    pub query: String,
    pub session_id: Option<String>,
    pub transcript: Transcript,
}

impl InvocationRun {
    pub(crate) fn new(query: &str) -> Self {
        Self {
            query: query.to_string(),
            session_id: None,
            transcript: Transcript::new(),
        }
    }
}

/// Phases of one query.
enum Phase {
    Idle,
    FirstRound,
    InputInjection { node_id: String, input_key: String },
    Done,
}

/// Client for one remote workflow agent.
///
/// Holds no per-query state; concurrent `invoke` calls each get their own
/// private run.
#[derive(Debug)]
pub struct WorkflowClient {
    client: reqwest::Client,
    workflow_id: String,
    invoke_url: String,
    max_events: usize,
}

impl WorkflowClient {
    /// A missing invoke endpoint is a configuration error: fail fast here
    /// rather than at query time.
    pub fn new(
        workflow_id: impl Into<String>,
        invoke_url: impl Into<String>,
    ) -> Result<Self, RelayError> {
        Self::with_timeout(workflow_id, invoke_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(
        workflow_id: impl Into<String>,
        invoke_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, RelayError> {
        let invoke_url = invoke_url.into();
        if invoke_url.trim().is_empty() {
            return Err(RelayError::Configuration(
                "workflow agent has no invoke endpoint configured".to_string(),
            ));
        }
        Ok(Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            workflow_id: workflow_id.into(),
            invoke_url,
            max_events: DEFAULT_MAX_EVENTS,
        })
    }

    /// Override the per-round event cap.
    pub fn with_max_events(mut self, max_events: usize) -> Self {
        self.max_events = max_events;
        self
    }

    /// Drive `query` to a final rendered result.
    ///
    /// Remote failures never escape: connection errors, bad statuses,
    /// protocol violations, and runaway streams all land in the transcript
    /// as fragments, so the caller always gets renderable text.
    pub async fn invoke(&self, query: &str) -> String {
        let mut run = InvocationRun::new(query);
        let mut phase = Phase::Idle;

        loop {
            phase = match phase {
                Phase::Idle => Phase::FirstRound,
                Phase::FirstRound => match self.run_round(&mut run, None, true).await {
                    Outcome::Inject { node_id, input_key } => {
                        Phase::InputInjection { node_id, input_key }
                    }
                    _ => Phase::Done,
                },
                Phase::InputInjection { node_id, input_key } => {
                    let input = json!({ node_id: { input_key: run.query.clone() } });
                    // Any further interactive request inside this round
                    // ends the session instead of recursing again.
                    self.run_round(&mut run, Some(input), false).await;
                    Phase::Done
                }
                Phase::Done => break,
            };
        }

        if run.transcript.is_empty() {
            run.transcript.push(Fragment::System(
                "The workflow completed but produced no content. Try rephrasing the query."
                    .to_string(),
            ));
        }
        run.transcript.render()
    }

    /// Open one streaming round and consume its events.
    async fn run_round(
        &self,
        run: &mut InvocationRun,
        input: Option<serde_json::Value>,
        first_round: bool,
    ) -> Outcome {
        let mut payload = json!({
            "workflow_id": self.workflow_id,
            "stream": true,
        });
        if let Some(session_id) = &run.session_id {
            payload["session_id"] = json!(session_id);
        }
        if let Some(input) = input {
            payload["input"] = input;
        }

        tracing::info!(
            "[WorkflowClient] opening {} round against {}",
            if first_round { "first" } else { "injection" },
            self.invoke_url
        );

        let response = match self.client.post(&self.invoke_url).json(&payload).send().await {
            Ok(response) => response,
            Err(e) => {
                let msg = format!("workflow request failed: {e}");
                tracing::error!("[WorkflowClient] {}", RelayError::Transport(msg.clone()));
                run.transcript.push(Fragment::Error(msg));
                return Outcome::Terminate;
            }
        };

        let status = response.status();
        if !status.is_success() {
            let msg = format!("workflow request failed with status {}", status.as_u16());
            tracing::error!("[WorkflowClient] {}", RelayError::Transport(msg.clone()));
            run.transcript.push(Fragment::Error(msg));
            return Outcome::Terminate;
        }

        let events = decoder::event_stream(response.bytes_stream());
        tokio::pin!(events);

        let mut seen = 0usize;
        while let Some(event) = events.next().await {
            seen += 1;
            if seen > self.max_events {
                let err =
                    RelayError::ResourceLimit(format!("round exceeded {} events", self.max_events));
                tracing::warn!("[WorkflowClient] {}, forcing termination", err);
                run.transcript.push(Fragment::System(
                    "The workflow produced too many events and was terminated automatically."
                        .to_string(),
                ));
                return Outcome::Terminate;
            }
            match interpret(&event, run, first_round) {
                Outcome::Continue => {}
                outcome => return outcome,
            }
        }

        // Stream drained without a terminal event.
        Outcome::Terminate
    }
}

/// One-shot convenience: build a client and drive a single query.
///
/// Fails only for configuration problems; remote failures come back as
/// rendered text like every other result.
pub async fn invoke(
    workflow_id: &str,
    invoke_url: &str,
    query: &str,
) -> Result<String, RelayError> {
    let client = WorkflowClient::new(workflow_id, invoke_url)?;
    Ok(client.invoke(query).await)
}
