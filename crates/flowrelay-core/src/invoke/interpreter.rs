//! Event Interpreter — classifies one decoded event and updates the run.
//!
//! The stream emits many intermediate/partial updates; only terminal node
//! outputs are user-meaningful, so most events are filtered out before
//! dispatch. The exceptions are `stream_msg` chunks and anything carrying
//! image evidence — media must not be dropped even mid-stream.

use super::client::InvocationRun;
use super::event::{DecodedEvent, EventData, EventKind, EventStatus};
use crate::error::RelayError;
use crate::render::Fragment;

/// What the state machine should do after one event.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Outcome {
    /// Keep consuming the current round.
    Continue,
    /// Re-open the endpoint with the original query injected at `node_id`.
    Inject { node_id: String, input_key: String },
    /// Stop processing this round; no further rounds.
    Terminate,
}

/// Apply one event to the run state, appending fragments as needed.
pub(crate) fn interpret(
    event: &DecodedEvent,
    run: &mut InvocationRun,
    first_round: bool,
) -> Outcome {
    // Continuation token: last write wins, captured even for events the
    // render filter drops.
    if let Some(id) = &event.session_id {
        run.session_id = Some(id.clone());
    }

    let data = &event.data;
    if !should_render(data) {
        tracing::debug!(
            "[Interpreter] skipping partial event: type={:?} status={:?}",
            data.event,
            data.status
        );
        return Outcome::Continue;
    }

    match data.kind() {
        EventKind::GuideWord => {
            if let Some(msg) = data.message_text() {
                run.transcript.push(Fragment::System(msg.to_string()));
            }
            Outcome::Continue
        }
        EventKind::OutputMsg
        | EventKind::OutputWithInputMsg
        | EventKind::OutputWithChooseMsg
        | EventKind::StreamMsg => {
            render_output(data, run);
            Outcome::Continue
        }
        EventKind::GuideQuestion => {
            let questions: Vec<String> = data
                .message_list()
                .iter()
                .filter(|q| !q.is_empty())
                .cloned()
                .collect();
            if !questions.is_empty() {
                run.transcript.push(Fragment::QuestionList(questions));
            }
            Outcome::Continue
        }
        EventKind::Input => handle_input(data, run, first_round),
        EventKind::Close => {
            if let Some(msg) = data.message_text() {
                run.transcript.push(Fragment::FinalResult(msg.to_string()));
            }
            Outcome::Terminate
        }
        EventKind::End => Outcome::Terminate,
        EventKind::Error => {
            let msg = data
                .message
                .clone()
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| "unknown error".to_string());
            tracing::error!("[Interpreter] workflow reported error: {}", msg);
            run.transcript.push(Fragment::Error(msg));
            Outcome::Terminate
        }
        EventKind::Success => {
            if let Some(msg) = data.message.as_deref().filter(|m| !m.is_empty()) {
                run.transcript.push(Fragment::Success(msg.to_string()));
            }
            Outcome::Continue
        }
        EventKind::Failure => {
            if let Some(msg) = data.message.as_deref().filter(|m| !m.is_empty()) {
                run.transcript.push(Fragment::Failure(msg.to_string()));
            }
            Outcome::Continue
        }
        EventKind::Start
        | EventKind::Progress
        | EventKind::Status
        | EventKind::Debug
        | EventKind::Warning
        | EventKind::Info => {
            tracing::debug!(
                "[Interpreter] {}: {}",
                data.event,
                data.message.as_deref().unwrap_or("")
            );
            Outcome::Continue
        }
        EventKind::Other => {
            // Best effort: surface whatever text an unknown event carries.
            let msg = data
                .message_text()
                .map(str::to_string)
                .or_else(|| data.message.clone())
                .filter(|m| !m.is_empty());
            match msg {
                Some(msg) => {
                    tracing::warn!(
                        "[Interpreter] unrecognized event type {:?}, keeping its message",
                        data.event
                    );
                    run.transcript.push(Fragment::System(msg));
                }
                None => {
                    tracing::warn!("[Interpreter] unrecognized event type {:?}", data.event);
                }
            }
            Outcome::Continue
        }
    }
}

/// Render gate: terminal events, stream chunks, and anything with image
/// evidence pass; all other partial updates are dropped.
fn should_render(data: &EventData) -> bool {
    data.status() == EventStatus::End
        || data.kind() == EventKind::StreamMsg
        || has_image_evidence(data)
}

fn has_image_evidence(data: &EventData) -> bool {
    if data.files().iter().any(|f| !f.url.is_empty()) {
        return true;
    }
    match data.message_text() {
        Some(msg) => {
            (msg.contains("![") && msg.contains("](")) || image_link_pattern().is_match(msg)
        }
        None => false,
    }
}

fn image_link_pattern() -> regex::Regex {
    regex::Regex::new(r"(!?)\[([^\]]*)\]\(([^)]+\.(?:png|jpg|jpeg|gif|webp))\)").unwrap()
}

/// Rewrite `[label](url.ext)` image links into image markdown. Pre-existing
/// `![...](...)` syntax passes through unchanged.
fn rewrite_image_links(msg: &str) -> String {
    image_link_pattern()
        .replace_all(msg, |caps: &regex::Captures| {
            if &caps[1] == "!" {
                caps[0].to_string()
            } else {
                format!("![{}]({})", &caps[2], &caps[3])
            }
        })
        .into_owned()
}

/// Output-family events: one image fragment per file entry, then the
/// message text (image links normalized) as an AI answer.
fn render_output(data: &EventData, run: &mut InvocationRun) {
    for file in data.files() {
        if !file.url.is_empty() {
            run.transcript.push(Fragment::Image {
                label: "image".to_string(),
                url: file.url.clone(),
            });
        }
    }

    // stream_msg chunks sometimes carry their text at the event's top level.
    let msg = data
        .message_text()
        .map(str::to_string)
        .or_else(|| {
            if data.kind() == EventKind::StreamMsg {
                data.message.clone()
            } else {
                None
            }
        })
        .filter(|m| !m.is_empty());

    if let Some(msg) = msg {
        run.transcript.push(Fragment::AiAnswer(rewrite_image_links(&msg)));
    }
}

/// Input requests are only actionable when terminal. The first `user_input`
/// request triggers the single injection round; a second one ends the
/// session's interactive capability without cutting the round short, since
/// a later `close` may still carry the real answer.
fn handle_input(data: &EventData, run: &mut InvocationRun, first_round: bool) -> Outcome {
    if data.status() != EventStatus::End {
        return Outcome::Continue;
    }

    let field = match data.input_schema.as_ref().and_then(|s| s.value.first()) {
        Some(field) => field,
        None => {
            tracing::info!("[Interpreter] input event without usable fields, round complete");
            return Outcome::Terminate;
        }
    };

    if field.key != "user_input" {
        tracing::info!(
            "[Interpreter] unsupported input key {:?}, round complete",
            field.key
        );
        return Outcome::Terminate;
    }

    let node_id = match &data.node_id {
        Some(id) => id.clone(),
        None => {
            let err = RelayError::Protocol("input event carries no node_id".to_string());
            tracing::error!("[Interpreter] {}", err);
            run.transcript
                .push(Fragment::Error("input event carries no node_id".to_string()));
            return Outcome::Terminate;
        }
    };

    if first_round && !run.query.is_empty() {
        run.transcript.push(Fragment::UserInput(run.query.clone()));
        return Outcome::Inject {
            node_id,
            input_key: field.key.clone(),
        };
    }

    // Already injected once. Drop the session so the next query starts
    // fresh, note the early end if nothing was produced yet, and keep
    // consuming the round.
    tracing::info!(
        "[Interpreter] workflow asked for further input ({:?}), none available",
        field.label
    );
    run.session_id = None;
    if run.transcript.is_empty() {
        run.transcript.push(Fragment::System(
            "The workflow finished its main task but asked for additional input \
             this client cannot provide; it was ended automatically."
                .to_string(),
        ));
    }
    Outcome::Continue
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::Fragment;
    use serde_json::json;

    fn event(value: serde_json::Value) -> DecodedEvent {
        DecodedEvent::from_value(value).unwrap()
    }

    fn run() -> InvocationRun {
        InvocationRun::new("what is the outlook?")
    }

    #[test]
    fn partial_output_without_images_is_suppressed() {
        let mut run = run();
        let outcome = interpret(
            &event(json!({
                "event": "output_msg",
                "status": "running",
                "output_schema": { "message": "partial text" }
            })),
            &mut run,
            true,
        );
        assert_eq!(outcome, Outcome::Continue);
        assert!(run.transcript.is_empty());
    }

    #[test]
    fn partial_output_with_files_is_forced_through() {
        let mut run = run();
        interpret(
            &event(json!({
                "event": "output_msg",
                "status": "running",
                "output_schema": {
                    "message": "rendering chart",
                    "files": [{ "url": "http://x/chart.png" }]
                }
            })),
            &mut run,
            true,
        );
        assert_eq!(
            run.transcript.fragments(),
            [
                Fragment::Image {
                    label: "image".into(),
                    url: "http://x/chart.png".into()
                },
                Fragment::AiAnswer("rendering chart".into()),
            ]
        );
    }

    #[test]
    fn image_links_are_rewritten_to_markdown_images() {
        let mut run = run();
        interpret(
            &event(json!({
                "event": "stream_msg",
                "status": "end",
                "output_schema": { "message": "see [chart](http://x/y.png) and ![done](http://x/z.png)" }
            })),
            &mut run,
            true,
        );
        assert_eq!(
            run.transcript.fragments(),
            [Fragment::AiAnswer(
                "see ![chart](http://x/y.png) and ![done](http://x/z.png)".into()
            )]
        );
    }

    #[test]
    fn session_id_is_captured_even_for_filtered_events() {
        let mut run = run();
        interpret(
            &event(json!({
                "session_id": "sess-9",
                "data": { "event": "output_msg", "status": "running" }
            })),
            &mut run,
            true,
        );
        assert_eq!(run.session_id.as_deref(), Some("sess-9"));
        assert!(run.transcript.is_empty());
    }

    #[test]
    fn first_round_user_input_requests_injection() {
        let mut run = run();
        let outcome = interpret(
            &event(json!({
                "event": "input",
                "status": "end",
                "node_id": "n1",
                "input_schema": { "value": [{ "key": "user_input", "label": "ask" }] }
            })),
            &mut run,
            true,
        );
        assert_eq!(
            outcome,
            Outcome::Inject {
                node_id: "n1".into(),
                input_key: "user_input".into()
            }
        );
        assert_eq!(
            run.transcript.fragments(),
            [Fragment::UserInput("what is the outlook?".into())]
        );
    }

    #[test]
    fn input_without_node_id_is_a_protocol_error() {
        let mut run = run();
        let outcome = interpret(
            &event(json!({
                "event": "input",
                "status": "end",
                "input_schema": { "value": [{ "key": "user_input" }] }
            })),
            &mut run,
            true,
        );
        assert_eq!(outcome, Outcome::Terminate);
        assert_eq!(
            run.transcript.fragments(),
            [Fragment::Error("input event carries no node_id".into())]
        );
    }

    #[test]
    fn second_input_request_clears_session_and_continues() {
        let mut run = run();
        run.session_id = Some("sess-1".into());
        let outcome = interpret(
            &event(json!({
                "event": "input",
                "status": "end",
                "node_id": "n1",
                "input_schema": { "value": [{ "key": "user_input", "label": "more?" }] }
            })),
            &mut run,
            false,
        );
        assert_eq!(outcome, Outcome::Continue);
        assert_eq!(run.session_id, None);
        // Nothing was rendered yet, so the early-termination note lands.
        assert!(matches!(
            run.transcript.fragments(),
            [Fragment::System(_)]
        ));
    }

    #[test]
    fn non_user_input_key_terminates_silently() {
        let mut run = run();
        let outcome = interpret(
            &event(json!({
                "event": "input",
                "status": "end",
                "node_id": "n1",
                "input_schema": { "value": [{ "key": "choice" }] }
            })),
            &mut run,
            true,
        );
        assert_eq!(outcome, Outcome::Terminate);
        assert!(run.transcript.is_empty());
    }

    #[test]
    fn guide_question_skips_empty_lists() {
        let mut run = run();
        interpret(
            &event(json!({
                "event": "guide_question",
                "status": "end",
                "output_schema": { "message": [""] }
            })),
            &mut run,
            true,
        );
        assert!(run.transcript.is_empty());

        interpret(
            &event(json!({
                "event": "guide_question",
                "status": "end",
                "output_schema": { "message": ["next step?", ""] }
            })),
            &mut run,
            true,
        );
        assert_eq!(
            run.transcript.fragments(),
            [Fragment::QuestionList(vec!["next step?".into()])]
        );
    }

    #[test]
    fn close_appends_final_result_and_terminates() {
        let mut run = run();
        let outcome = interpret(
            &event(json!({
                "event": "close",
                "status": "end",
                "output_schema": { "message": "done" }
            })),
            &mut run,
            true,
        );
        assert_eq!(outcome, Outcome::Terminate);
        assert_eq!(
            run.transcript.fragments(),
            [Fragment::FinalResult("done".into())]
        );
    }

    #[test]
    fn unrecognized_event_with_message_becomes_system_note() {
        let mut run = run();
        interpret(
            &event(json!({
                "event": "telemetry",
                "status": "end",
                "output_schema": { "message": "node finished" }
            })),
            &mut run,
            true,
        );
        assert_eq!(
            run.transcript.fragments(),
            [Fragment::System("node finished".into())]
        );
    }

    #[test]
    fn observability_events_render_nothing() {
        let mut run = run();
        for kind in ["start", "progress", "status", "debug", "warning", "info"] {
            let outcome = interpret(
                &event(json!({ "event": kind, "status": "end", "message": "noise" })),
                &mut run,
                true,
            );
            assert_eq!(outcome, Outcome::Continue);
        }
        assert!(run.transcript.is_empty());
    }
}
