//! Decoded workflow stream events.
//!
//! The wire is tolerant by design: every field is optional, message bodies
//! may be a string or a list, and the event object may arrive wrapped in a
//! `{session_id, data}` envelope or bare at the top level. Events are
//! transient — consumed immediately, never stored.

use serde::Deserialize;
use serde_json::Value;

/// Recognized event kinds. Everything else lands in `Other` and is handled
/// best-effort.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    GuideWord,
    OutputMsg,
    OutputWithInputMsg,
    OutputWithChooseMsg,
    StreamMsg,
    GuideQuestion,
    Input,
    Close,
    End,
    Error,
    Success,
    Failure,
    Start,
    Progress,
    Status,
    Debug,
    Warning,
    Info,
    Other,
}

impl EventKind {
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "guide_word" => Self::GuideWord,
            "output_msg" => Self::OutputMsg,
            "output_with_input_msg" => Self::OutputWithInputMsg,
            "output_with_choose_msg" => Self::OutputWithChooseMsg,
            "stream_msg" => Self::StreamMsg,
            "guide_question" => Self::GuideQuestion,
            "input" => Self::Input,
            "close" => Self::Close,
            "end" => Self::End,
            "error" => Self::Error,
            "success" => Self::Success,
            "failure" => Self::Failure,
            "start" => Self::Start,
            "progress" => Self::Progress,
            "status" => Self::Status,
            "debug" => Self::Debug,
            "warning" => Self::Warning,
            "info" => Self::Info,
            _ => Self::Other,
        }
    }
}

/// Status projection. The wire carries free-form strings; only `end` marks
/// a terminal node output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventStatus {
    End,
    Other,
}

/// A message body that is either one string or a list of strings
/// (guide questions arrive as a list).
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MessageBody {
    Text(String),
    List(Vec<String>),
}

impl MessageBody {
    /// Non-empty text content, if this body is a string.
    pub fn text(&self) -> Option<&str> {
        match self {
            MessageBody::Text(s) if !s.is_empty() => Some(s),
            _ => None,
        }
    }

    /// List content, if this body is a list.
    pub fn list(&self) -> &[String] {
        match self {
            MessageBody::List(items) => items,
            MessageBody::Text(_) => &[],
        }
    }
}

/// One embedded file reference. Extra fields are ignored.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct FileRef {
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct OutputSchema {
    #[serde(default)]
    pub message: Option<MessageBody>,
    #[serde(default)]
    pub files: Vec<FileRef>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct InputField {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct InputSchema {
    #[serde(default)]
    pub value: Vec<InputField>,
}

/// The inner event object.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct EventData {
    #[serde(default)]
    pub event: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub node_id: Option<String>,
    #[serde(default)]
    pub output_schema: Option<OutputSchema>,
    #[serde(default)]
    pub input_schema: Option<InputSchema>,
    /// Some event kinds carry their text at the top level instead of in
    /// `output_schema`.
    #[serde(default)]
    pub message: Option<String>,
}

impl EventData {
    pub fn kind(&self) -> EventKind {
        EventKind::parse(&self.event)
    }

    pub fn status(&self) -> EventStatus {
        if self.status == "end" {
            EventStatus::End
        } else {
            EventStatus::Other
        }
    }

    /// Non-empty `output_schema.message` text.
    pub fn message_text(&self) -> Option<&str> {
        self.output_schema
            .as_ref()
            .and_then(|schema| schema.message.as_ref())
            .and_then(MessageBody::text)
    }

    /// `output_schema.message` as a list (empty for string bodies).
    pub fn message_list(&self) -> &[String] {
        self.output_schema
            .as_ref()
            .and_then(|schema| schema.message.as_ref())
            .map(MessageBody::list)
            .unwrap_or(&[])
    }

    pub fn files(&self) -> &[FileRef] {
        self.output_schema
            .as_ref()
            .map(|schema| schema.files.as_slice())
            .unwrap_or(&[])
    }
}

/// One fully decoded stream event: the optional continuation token from the
/// envelope plus the event payload.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedEvent {
    pub session_id: Option<String>,
    pub data: EventData,
}

impl DecodedEvent {
    /// Accept both wire shapes: `{session_id?, data: {...}}` and the event
    /// object directly at top level.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        let session_id = value
            .get("session_id")
            .and_then(Value::as_str)
            .map(str::to_string);
        let data_value = match value.get("data") {
            Some(data) if data.is_object() => data.clone(),
            _ => value,
        };
        let data = serde_json::from_value(data_value)?;
        Ok(Self { session_id, data })
    }
}
