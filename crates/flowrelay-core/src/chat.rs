//! Plain chat-style remote agent client (single request/response).
//!
//! The streaming workflow protocol lives in [`crate::invoke`]; this is the
//! boundary for stateless agents that answer one chat completion at a
//! time. Like the workflow client, `ask` always returns answer text — API
//! and transport failures are surfaced as literal text, never as faults.

use std::time::Duration;

use serde_json::{json, Value};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

pub struct ChatAgent {
    client: reqwest::Client,
    url: String,
    model: String,
}

impl ChatAgent {
    pub fn new(url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(DEFAULT_TIMEOUT)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            url: url.into(),
            model: model.into(),
        }
    }

    /// Send one query and extract the answer from
    /// `choices[0].message.content`. Non-success statuses and unexpected
    /// response shapes come back as `API Error (status ...)` text.
    pub async fn ask(&self, query: &str) -> String {
        let payload = json!({
            "model": self.model,
            "messages": [{ "role": "user society", "content": query }],
            "temperature": 0,
            "stream": false,
        });

        tracing::info!("[ChatAgent] sending request to {}", self.url);

        let response = match self.client.post(&self.url).json(&payload).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!("[ChatAgent] request failed: {}", e);
                return format!("Error calling remote API: {e}");
            }
        };

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return format!("API Error (status {}): {}", status.as_u16(), body);
        }

        serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|value| {
                value
                    .pointer("/choices/0/message/content")
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .unwrap_or_else(|| format!("API Error (status {}): {}", status.as_u16(), body))
    }
}
