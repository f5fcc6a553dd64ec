//! Agent directory boundary — typed cards for downstream agents.
//!
//! The surrounding service fetches and caches the directory (behind its own
//! lock or copy-on-write swap); this module only defines what one entry
//! means to the core. Whether an agent speaks the streaming workflow
//! protocol or the plain chat protocol is decided once, at construction,
//! via the tagged `AgentKind` — never re-derived later.

use serde_json::Value;

use crate::error::RelayError;

/// How an agent is invoked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentKind {
    /// Streaming workflow protocol (multi-round, server-streamed).
    Workflow {
        workflow_id: String,
        invoke_url: String,
    },
    /// Single-shot chat-style request/response.
    Simple { url: String, model: String },
}

/// One entry from the agent directory.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentCard {
    pub name: String,
    pub description: String,
    pub version: String,
    pub kind: AgentKind,
}

impl AgentCard {
    /// Build a card from one raw directory entry.
    ///
    /// A `workflow` entry must carry `api.invoke_url`; its absence is a
    /// configuration error surfaced here rather than at query time.
    pub fn from_directory_entry(entry: &Value) -> Result<Self, RelayError> {
        let name = str_field(entry, "name");
        let description = str_field(entry, "description");
        let version = entry
            .get("version")
            .and_then(Value::as_str)
            .unwrap_or("1.0.0")
            .to_string();
        let model = entry
            .pointer("/parameters/model")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let category = entry
            .get("category")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let kind = if category == "workflow" {
            let invoke_url = entry
                .pointer("/api/invoke_url")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            if invoke_url.is_empty() {
                return Err(RelayError::Configuration(format!(
                    "workflow agent {name:?} has no invoke_url configured"
                )));
            }
            AgentKind::Workflow {
                workflow_id: model,
                invoke_url,
            }
        } else {
            AgentKind::Simple {
                url: str_field(entry, "url"),
                model,
            }
        };

        Ok(Self {
            name,
            description,
            version,
            kind,
        })
    }
}

fn str_field(entry: &Value, key: &str) -> String {
    entry
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}
