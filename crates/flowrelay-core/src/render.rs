//! Output Renderer — the ordered fragment buffer and its canonical text form.
//!
//! The fragment sequence accumulated over one query IS the observable result
//! of that query. Rendering is pure and total: every fragment kind has
//! exactly one rule, and nothing is ever reordered or silently dropped.

/// One categorized, renderable unit of output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    /// Echo of the query injected back into the workflow.
    UserInput(String),
    /// A node's answer text.
    AiAnswer(String),
    /// Workflow-level notice (greetings, forced-termination notes).
    System(String),
    /// One embedded media file.
    Image { label: String, url: String },
    Success(String),
    Failure(String),
    Error(String),
    /// Follow-up questions suggested by the workflow.
    QuestionList(Vec<String>),
    /// The workflow's closing answer.
    FinalResult(String),
}

impl Fragment {
    /// Serialize one fragment to its canonical tagged form.
    pub fn render(&self) -> String {
        match self {
            Fragment::UserInput(msg) => format!("📝 User input: {msg}"),
            Fragment::AiAnswer(msg) => format!("🤖 AI answer: {msg}"),
            Fragment::System(msg) => format!("💬 System: {msg}"),
            Fragment::Image { label, url } => format!("![{label}]({url})"),
            Fragment::Success(msg) => format!("✅ {msg}"),
            Fragment::Failure(msg) => format!("❌ {msg}"),
            Fragment::Error(msg) => format!("❌ Error: {msg}"),
            Fragment::QuestionList(questions) => {
                let mut out = String::from("## Suggested questions");
                for (idx, question) in questions.iter().enumerate() {
                    out.push_str(&format!("\n{}. {}", idx + 1, question));
                }
                out
            }
            Fragment::FinalResult(msg) => format!("## Final result\n{msg}"),
        }
    }
}

/// Ordered, append-only buffer of fragments for one query.
///
/// Fragments are appended in event-arrival order and frozen once the query
/// terminates; `render` never changes that order.
#[derive(Debug, Default)]
pub struct Transcript {
    fragments: Vec<Fragment>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, fragment: Fragment) {
        self.fragments.push(fragment);
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    /// Serialize the whole transcript, one rendered fragment per block,
    /// joined by newlines.
    pub fn render(&self) -> String {
        self.fragments
            .iter()
            .map(Fragment::render)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_fragment_kind_renders_non_empty() {
        let fragments = [
            Fragment::UserInput("q".into()),
            Fragment::AiAnswer("a".into()),
            Fragment::System("s".into()),
            Fragment::Image {
                label: "image".into(),
                url: "http://x/y.png".into(),
            },
            Fragment::Success("ok".into()),
            Fragment::Failure("nope".into()),
            Fragment::Error("boom".into()),
            Fragment::QuestionList(vec!["one?".into(), "two?".into()]),
            Fragment::FinalResult("done".into()),
        ];
        for fragment in &fragments {
            assert!(!fragment.render().is_empty(), "{fragment:?} rendered empty");
        }
    }

    #[test]
    fn question_list_is_numbered() {
        let rendered = Fragment::QuestionList(vec!["first?".into(), "second?".into()]).render();
        assert_eq!(
            rendered,
            "## Suggested questions\n1. first?\n2. second?"
        );
    }

    #[test]
    fn transcript_preserves_append_order() {
        let mut transcript = Transcript::new();
        transcript.push(Fragment::System("hello".into()));
        transcript.push(Fragment::AiAnswer("answer".into()));
        transcript.push(Fragment::FinalResult("done".into()));

        assert_eq!(
            transcript.render(),
            "💬 System: hello\n🤖 AI answer: answer\n## Final result\ndone"
        );
    }

    #[test]
    fn empty_transcript_renders_empty_string() {
        assert_eq!(Transcript::new().render(), "");
        assert!(Transcript::new().is_empty());
    }
}
