//! Output Normalizer — tolerant reconstruction of categorized output.
//!
//! Accepts already-canonical rendered text, legacy textual dumps, or a
//! structured value, and produces a stable, sectioned, human-readable
//! result. Normalizing canonical text is a no-op, so
//! `normalize(normalize(x)) == normalize(x)`.
//!
//! Extraction is an ordered list of line rules evaluated top to bottom;
//! the final rule is a fallback that treats any unclaimed non-structural
//! line as conversational output. New legacy formats slot in above the
//! fallback without restructuring control flow.

use serde_json::Value;

/// Sentinel returned when nothing could be extracted. Never empty.
const NO_CONTENT: &str = "No valid message content found.";

/// Markers that identify text already in canonical rendered form.
const CANONICAL_MARKERS: &[&str] = &[
    "💬 System:",
    "🤖 AI answer:",
    "📝 User input:",
    "## Conversation record",
    "## Final result",
];

/// Categorized reconstruction of a workflow transcript. Rebuilt wholesale
/// from text or a structured value, never mutated in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedResult {
    pub messages: Vec<String>,
    pub questions: Vec<String>,
    pub final_result: Option<String>,
}

impl NormalizedResult {
    /// Assemble the sectioned presentation: conversation record, then
    /// suggested questions, then the final result.
    pub fn render(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        if !self.messages.is_empty() {
            parts.push("## Conversation record".to_string());
            parts.extend(self.messages.iter().cloned());
        }
        if !self.questions.is_empty() {
            parts.push("\n## Suggested questions".to_string());
            parts.extend(self.questions.iter().cloned());
        }
        if let Some(final_result) = &self.final_result {
            parts.push(format!("\n## Final result\n{final_result}"));
        }
        if parts.is_empty() {
            NO_CONTENT.to_string()
        } else {
            parts.join("\n")
        }
    }
}

/// Normalize raw text.
///
/// Canonical text and non-empty free prose pass through unchanged; only
/// empty input goes through extraction (which yields the no-content
/// sentinel).
pub fn normalize_text(text: &str) -> String {
    if CANONICAL_MARKERS.iter().any(|marker| text.contains(marker)) {
        return text.to_string();
    }
    if !text.trim().is_empty() {
        // Plain prose is not ours to mangle.
        return text.to_string();
    }
    extract_messages(text).render()
}

/// Normalize an arbitrary value: strings take the text path, everything
/// else is dumped and run through full extraction.
pub fn normalize(value: &Value) -> String {
    match value {
        Value::String(text) => normalize_text(text),
        other => {
            let dumped = serde_json::to_string_pretty(other).unwrap_or_default();
            extract_messages(&dumped).render()
        }
    }
}

// ─── Extraction ───────────────────────────────────────────────────────────

#[derive(Default)]
struct Extraction {
    messages: Vec<String>,
    questions: Vec<String>,
    /// Set by an explicit final-result section or a dumped `close` event.
    explicit_final: Option<String>,
    /// Set by the legacy "workflow ended:" marker.
    legacy_final: Option<String>,
    /// The previous line was a final-result heading.
    awaiting_final_payload: bool,
}

type Rule = fn(&str, &mut Extraction) -> bool;

/// Ordered extraction rules. A rule returns true once it has claimed the
/// line. The last rule is the fallback classifier.
const RULES: &[Rule] = &[
    rule_final_section_payload,
    rule_canonical_user_input,
    rule_canonical_ai_answer,
    rule_canonical_system,
    rule_final_heading,
    rule_question_heading,
    rule_numbered_question,
    rule_error_line,
    rule_success_line,
    rule_failure_line,
    rule_stream_line,
    rule_legacy_model_answer,
    rule_legacy_system_output,
    rule_debug_event_dump,
    rule_legacy_auto_input,
    rule_legacy_awaiting_input,
    rule_default_ai_answer,
];

/// Run the full line-by-line extraction over `text`.
pub fn extract_messages(text: &str) -> NormalizedResult {
    let mut extraction = Extraction::default();
    for raw_line in text.lines() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }
        for rule in RULES {
            if rule(line, &mut extraction) {
                break;
            }
        }
    }

    let final_result = extraction
        .explicit_final
        .or(extraction.legacy_final)
        .or_else(|| {
            // Best effort: fall back to the last collected message, minus
            // its category tag.
            extraction.messages.last().map(|m| strip_category_tag(m))
        });

    NormalizedResult {
        messages: extraction.messages,
        questions: extraction.questions,
        final_result,
    }
}

/// The text after `tag`, trimmed, if the tag occurs anywhere in the line.
fn tail_after<'a>(line: &'a str, tag: &str) -> Option<&'a str> {
    line.split_once(tag).map(|(_, rest)| rest.trim())
}

fn strip_category_tag(message: &str) -> String {
    for tag in ["🤖 AI answer:", "💬 System:"] {
        if let Some(rest) = tail_after(message, tag) {
            return rest.to_string();
        }
    }
    message.to_string()
}

fn rule_final_section_payload(line: &str, extraction: &mut Extraction) -> bool {
    if extraction.awaiting_final_payload {
        extraction.awaiting_final_payload = false;
        extraction.explicit_final = Some(line.to_string());
        return true;
    }
    false
}

fn rule_canonical_user_input(line: &str, extraction: &mut Extraction) -> bool {
    match tail_after(line, "📝 User input:") {
        Some(rest) => {
            if !rest.is_empty() {
                extraction.messages.push(format!("📝 User input: {rest}"));
            }
            true
        }
        None => false,
    }
}

fn rule_canonical_ai_answer(line: &str, extraction: &mut Extraction) -> bool {
    match tail_after(line, "🤖 AI answer:") {
        Some(rest) => {
            if !rest.is_empty() {
                extraction.messages.push(format!("🤖 AI answer: {rest}"));
            }
            true
        }
        None => false,
    }
}

fn rule_canonical_system(line: &str, extraction: &mut Extraction) -> bool {
    match tail_after(line, "💬 System:") {
        Some(rest) => {
            if !rest.is_empty() {
                extraction.messages.push(format!("💬 System: {rest}"));
            }
            true
        }
        None => false,
    }
}

fn rule_final_heading(line: &str, extraction: &mut Extraction) -> bool {
    if line.contains("## Final result") {
        extraction.awaiting_final_payload = true;
        return true;
    }
    false
}

fn rule_question_heading(line: &str, _extraction: &mut Extraction) -> bool {
    line.contains("## Suggested questions")
}

fn rule_numbered_question(line: &str, extraction: &mut Extraction) -> bool {
    if regex::Regex::new(r"^\d+\.\s+").unwrap().is_match(line) {
        extraction.questions.push(line.to_string());
        return true;
    }
    false
}

fn rule_error_line(line: &str, extraction: &mut Extraction) -> bool {
    match tail_after(line, "❌ Error:") {
        Some(rest) => {
            if !rest.is_empty() {
                extraction.messages.push(format!("❌ Error: {rest}"));
            }
            true
        }
        None => false,
    }
}

fn rule_success_line(line: &str, extraction: &mut Extraction) -> bool {
    match tail_after(line, "✅") {
        Some(rest) => {
            if !rest.is_empty() {
                extraction.messages.push(format!("✅ {rest}"));
            }
            true
        }
        None => false,
    }
}

fn rule_failure_line(line: &str, extraction: &mut Extraction) -> bool {
    if line.contains("Error:") {
        return false;
    }
    match tail_after(line, "❌") {
        Some(rest) => {
            if !rest.is_empty() {
                extraction.messages.push(format!("❌ {rest}"));
            }
            true
        }
        None => false,
    }
}

fn rule_stream_line(line: &str, extraction: &mut Extraction) -> bool {
    match tail_after(line, "[STREAM]") {
        Some(rest) => {
            if !rest.is_empty() {
                extraction.messages.push(format!("🤖 AI answer: {rest}"));
            }
            true
        }
        None => false,
    }
}

fn rule_legacy_model_answer(line: &str, extraction: &mut Extraction) -> bool {
    match tail_after(line, "[model answer]:") {
        Some(rest) => {
            if !rest.is_empty() {
                extraction.messages.push(format!("🤖 AI answer: {rest}"));
            }
            true
        }
        None => false,
    }
}

fn rule_legacy_system_output(line: &str, extraction: &mut Extraction) -> bool {
    let rest = match tail_after(line, "[system output]:") {
        Some(rest) => rest,
        None => return false,
    };
    if rest.is_empty() {
        return true;
    }
    if rest.contains("please choose a question:") {
        // Guide-question banner, not a message.
        return true;
    }
    if let Some(final_text) = rest.strip_prefix("workflow ended:") {
        extraction.legacy_final = Some(final_text.trim().to_string());
        return true;
    }
    extraction.messages.push(format!("💬 System: {rest}"));
    true
}

/// Legacy debug dumps embed the raw event with language-repr quoting
/// (single quotes, `None` literals); coerce to strict JSON before parsing.
fn rule_debug_event_dump(line: &str, extraction: &mut Extraction) -> bool {
    let raw = match tail_after(line, "[DEBUG] received event:") {
        Some(raw) => raw,
        None => return false,
    };
    let coerced = raw.replace('\'', "\"").replace("None", "null");
    let value: Value = match serde_json::from_str(&coerced) {
        Ok(value) => value,
        // An unparseable dump line is dropped, not misclassified.
        Err(_) => return true,
    };
    let event = match value.get("data") {
        Some(data) if data.is_object() => data.clone(),
        _ => value,
    };

    match event.get("event").and_then(Value::as_str).unwrap_or("") {
        "guide_word" => {
            if let Some(msg) = schema_message_text(&event) {
                extraction.messages.push(format!("💬 System: {msg}"));
            }
        }
        "output_msg" => {
            if let Some(msg) = schema_message_text(&event) {
                extraction.messages.push(format!("🤖 AI answer: {msg}"));
            }
        }
        "guide_question" => {
            if let Some(list) = event.pointer("/output_schema/message").and_then(Value::as_array) {
                let items: Vec<&str> = list
                    .iter()
                    .filter_map(Value::as_str)
                    .filter(|m| !m.is_empty())
                    .collect();
                for (idx, item) in items.iter().enumerate() {
                    extraction.questions.push(format!("{}. {}", idx + 1, item));
                }
            }
        }
        "close" => {
            if let Some(msg) = schema_message_text(&event) {
                extraction.explicit_final = Some(msg.to_string());
            }
        }
        _ => {}
    }
    true
}

fn schema_message_text(event: &Value) -> Option<&str> {
    event
        .pointer("/output_schema/message")
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty())
}

fn rule_legacy_auto_input(line: &str, extraction: &mut Extraction) -> bool {
    match tail_after(line, "[auto input]:") {
        Some(rest) => {
            if !rest.is_empty() {
                extraction.messages.push(format!("📝 User input: {rest}"));
            }
            true
        }
        None => false,
    }
}

fn rule_legacy_awaiting_input(line: &str, extraction: &mut Extraction) -> bool {
    if !line.contains("[awaiting input]") {
        return false;
    }
    if let Some(rest) = line.splitn(2, ':').nth(1) {
        let rest = rest.trim();
        if !rest.is_empty() {
            extraction.messages.push(format!("📝 User input: {rest}"));
        }
    }
    true
}

/// Fallback classifier. Known heuristic: any unclaimed, non-structural,
/// non-empty line is treated as conversational output rather than dropped,
/// which can misread structural noise (stray JSON lines) as conversation.
fn rule_default_ai_answer(line: &str, extraction: &mut Extraction) -> bool {
    if line.starts_with('[') || line.starts_with("##") {
        return true;
    }
    extraction.messages.push(format!("🤖 AI answer: {line}"));
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{Fragment, Transcript};
    use serde_json::json;

    #[test]
    fn canonical_text_passes_through_unchanged() {
        let canonical = "💬 System: hello\n🤖 AI answer: result";
        assert_eq!(normalize_text(canonical), canonical);
    }

    #[test]
    fn normalize_is_idempotent() {
        let inputs = [
            "💬 System: hello\n🤖 AI answer: result",
            "plain prose with no markers",
            "",
        ];
        for input in inputs {
            let once = normalize_text(input);
            assert_eq!(normalize_text(&once), once, "not idempotent for {input:?}");
        }
    }

    #[test]
    fn free_prose_is_not_mangled() {
        let prose = "The quarterly numbers look stable.";
        assert_eq!(normalize_text(prose), prose);
    }

    #[test]
    fn empty_text_yields_no_content_sentinel() {
        assert_eq!(normalize_text("   \n  "), NO_CONTENT);
        assert_eq!(normalize_text(""), NO_CONTENT);
    }

    #[test]
    fn extraction_round_trips_a_rendered_transcript() {
        let mut transcript = Transcript::new();
        transcript.push(Fragment::UserInput("what is the outlook?".into()));
        transcript.push(Fragment::AiAnswer("stable".into()));
        transcript.push(Fragment::QuestionList(vec![
            "need a chart?".into(),
            "need a forecast?".into(),
        ]));
        transcript.push(Fragment::FinalResult("outlook stable".into()));

        let result = extract_messages(&transcript.render());
        assert_eq!(
            result.messages,
            [
                "📝 User input: what is the outlook?",
                "🤖 AI answer: stable"
            ]
        );
        assert_eq!(result.questions, ["1. need a chart?", "2. need a forecast?"]);
        assert_eq!(result.final_result.as_deref(), Some("outlook stable"));
    }

    #[test]
    fn legacy_bracket_tags_are_reclassified() {
        let legacy = "\
[model answer]: the result is 42
[system output]: computing totals
[system output]: workflow ended: all totals computed
[STREAM] partial tail
[auto input]: rerun with Q3 data";

        let result = extract_messages(legacy);
        assert_eq!(
            result.messages,
            [
                "🤖 AI answer: the result is 42",
                "💬 System: computing totals",
                "🤖 AI answer: partial tail",
                "📝 User input: rerun with Q3 data",
            ]
        );
        assert_eq!(
            result.final_result.as_deref(),
            Some("all totals computed")
        );
    }

    #[test]
    fn debug_event_dump_is_coerced_and_parsed() {
        let dump = "\
[DEBUG] received event: {'data': {'event': 'output_msg', 'output_schema': {'message': 'from dump'}}}
[DEBUG] received event: {'data': {'event': 'guide_question', 'output_schema': {'message': ['a?', 'b?']}}}
[DEBUG] received event: {'data': {'event': 'close', 'output_schema': {'message': 'all done', 'files': None}}}
[DEBUG] received event: {totally broken";

        let result = extract_messages(dump);
        assert_eq!(result.messages, ["🤖 AI answer: from dump"]);
        assert_eq!(result.questions, ["1. a?", "2. b?"]);
        assert_eq!(result.final_result.as_deref(), Some("all done"));
    }

    #[test]
    fn explicit_final_section_wins_over_legacy_marker() {
        let text = "\
🤖 AI answer: working
[system output]: workflow ended: legacy final
## Final result
section final";
        let result = extract_messages(text);
        assert_eq!(result.final_result.as_deref(), Some("section final"));
    }

    #[test]
    fn last_message_is_the_fallback_final_result() {
        let result = extract_messages("🤖 AI answer: only answer");
        assert_eq!(result.final_result.as_deref(), Some("only answer"));
    }

    #[test]
    fn unclaimed_lines_default_to_ai_answers() {
        let result = extract_messages("just some text\n[internal] dropped\n## heading dropped");
        assert_eq!(result.messages, ["🤖 AI answer: just some text"]);
    }

    #[test]
    fn structured_values_go_through_extraction() {
        let rendered = normalize(&json!({ "note": "hello" }));
        assert!(rendered.starts_with("## Conversation record"));
        assert!(rendered.contains("hello"));
    }

    #[test]
    fn rendering_assembles_all_sections_in_order() {
        let result = NormalizedResult {
            messages: vec!["🤖 AI answer: body".into()],
            questions: vec!["1. next?".into()],
            final_result: Some("body".into()),
        };
        assert_eq!(
            result.render(),
            "## Conversation record\n🤖 AI answer: body\n\n## Suggested questions\n1. next?\n\n## Final result\nbody"
        );
    }

    #[test]
    fn nothing_extracted_renders_the_sentinel() {
        assert_eq!(NormalizedResult::default().render(), NO_CONTENT);
    }
}
