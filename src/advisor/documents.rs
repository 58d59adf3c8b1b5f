//! Shows which documents the retrieval advisor found for each question.
//!
//! The block is rendered by [`render_search_results`]:
//!
//! ```text
//!
//! [ Search Results ]
//! ===============================================
//! ▶ 1 Document, Score: 0.91
//! -----------------------------------------------
//! Milton peaked at Category 5.
//! ===============================================
//! ```

use std::{
    io::{self, Write},
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use tracing::debug;

use super::{Advisor, ChatRequest, RETRIEVED_DOCUMENTS};
use crate::{
    document::Document,
    error::{ChatbotError, Result},
};

const RULE_HEAVY: &str = "===============================================";
const RULE_LIGHT: &str = "-----------------------------------------------";
const LOG_TARGET: &str = "rag_chatbot::retrieved_documents";

/// Writer shared between the sink and whoever owns the terminal.
pub type SharedWriter = Arc<Mutex<dyn Write + Send>>;

/// Process stdout as a [`SharedWriter`].
pub fn stdout_writer() -> SharedWriter {
    Arc::new(Mutex::new(io::stdout()))
}

/// Where retrieved documents are reported.
#[derive(Clone)]
pub enum DocumentSink {
    /// Print the search results block.
    Console(SharedWriter),
    /// Emit `tracing` debug events under `rag_chatbot::retrieved_documents`.
    Log,
}

/// Lines of the search results block, in print order.
pub fn render_search_results(documents: &[Document]) -> Vec<String> {
    let mut lines = vec![
        String::new(),
        "[ Search Results ]".to_string(),
        RULE_HEAVY.to_string(),
    ];

    if documents.is_empty() {
        lines.push("  No search results found.".to_string());
        lines.push(RULE_HEAVY.to_string());
        return lines;
    }

    for (i, document) in documents.iter().enumerate() {
        lines.push(format!(
            "▶ {} Document, Score: {:.2}",
            i + 1,
            document.score.unwrap_or(0.0)
        ));
        lines.push(RULE_LIGHT.to_string());
        lines.extend(document.text.split('\n').map(str::to_string));
        lines.push(RULE_HEAVY.to_string());
    }
    lines
}

/// Same block as the console sink, one debug event per non-blank line.
fn log_search_results(documents: &[Document]) {
    debug!(target: LOG_TARGET, "Retrieved Documents Count - {}", documents.len());
    for line in render_search_results(documents) {
        if !line.trim().is_empty() {
            debug!(target: LOG_TARGET, "{}", line);
        }
    }
}

/// Reports the retrieved documents right before the model call. Never alters the request.
pub struct RetrievedDocumentsAdvisor {
    sink: DocumentSink,
}

impl RetrievedDocumentsAdvisor {
    pub fn new(sink: DocumentSink) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl Advisor for RetrievedDocumentsAdvisor {
    fn name(&self) -> &'static str {
        "RetrievedDocumentsAdvisor"
    }

    async fn before(&self, request: &mut ChatRequest) -> Result<()> {
        let documents = request
            .context
            .documents(RETRIEVED_DOCUMENTS)
            .unwrap_or_default();

        match &self.sink {
            DocumentSink::Console(writer) => {
                let mut out = writer
                    .lock()
                    .map_err(|e| ChatbotError::Io(io::Error::other(e.to_string())))?;
                for line in render_search_results(documents) {
                    writeln!(out, "{line}")?;
                }
                out.flush()?;
            }
            DocumentSink::Log => log_search_results(documents),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advisor::ContextValue;

    fn scored(text: &str, score: f32) -> Document {
        Document::new(text).with_score(score)
    }

    #[test]
    fn test_render_ranks_and_scores() {
        let docs = vec![
            scored("Milton peaked at Category 5.\nWinds reached 180 mph.", 0.9137),
            scored("Evacuations in Tampa.", 0.5549),
        ];
        let lines = render_search_results(&docs);

        assert_eq!(
            lines,
            vec![
                "",
                "[ Search Results ]",
                RULE_HEAVY,
                "▶ 1 Document, Score: 0.91",
                RULE_LIGHT,
                "Milton peaked at Category 5.",
                "Winds reached 180 mph.",
                RULE_HEAVY,
                "▶ 2 Document, Score: 0.55",
                RULE_LIGHT,
                "Evacuations in Tampa.",
                RULE_HEAVY,
            ]
        );
    }

    #[test]
    fn test_render_empty() {
        assert_eq!(
            render_search_results(&[]),
            vec!["", "[ Search Results ]", RULE_HEAVY, "  No search results found.", RULE_HEAVY]
        );
    }

    #[test]
    fn test_render_missing_score_is_zero() {
        let lines = render_search_results(&[Document::new("unscored")]);
        assert_eq!(lines[3], "▶ 1 Document, Score: 0.00");
    }

    #[tokio::test]
    async fn test_console_sink_prints_block_and_leaves_request_alone() {
        let buffer = Arc::new(Mutex::new(Vec::<u8>::new()));
        let advisor = RetrievedDocumentsAdvisor::new(DocumentSink::Console(buffer.clone()));

        let mut request = ChatRequest::new("system", "question");
        request.context.insert(
            RETRIEVED_DOCUMENTS,
            ContextValue::Documents(vec![scored("Surge of 10 feet.", 0.91), scored("Rainfall totals.", 0.55)]),
        );
        let before = request.clone();
        advisor.before(&mut request).await.unwrap();

        assert_eq!(request, before);
        let printed = String::from_utf8(buffer.lock().unwrap().clone()).unwrap();
        assert!(printed.starts_with("\n[ Search Results ]\n"));
        let first = printed.find("▶ 1 Document, Score: 0.91").unwrap();
        let second = printed.find("▶ 2 Document, Score: 0.55").unwrap();
        assert!(first < second);
        assert!(!printed.contains("▶ 3"));
    }

    #[derive(Clone, Default)]
    struct CapturedLog(Arc<Mutex<Vec<u8>>>);

    impl Write for CapturedLog {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn logged(documents: &[Document]) -> String {
        let captured = CapturedLog::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .finish();
        tracing::subscriber::with_default(subscriber, || log_search_results(documents));
        let bytes = captured.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_log_sink_uses_rendered_block() {
        let output = logged(&[scored("Surge of 10 feet.", 0.9137)]);

        assert!(output.contains("Retrieved Documents Count - 1"));
        assert!(output.contains("rag_chatbot::retrieved_documents"));
        assert!(output.contains("[ Search Results ]"));
        assert!(output.contains("▶ 1 Document, Score: 0.91"));
        assert!(output.contains("Surge of 10 feet."));
        assert!(output.contains(RULE_HEAVY));
        assert!(!output.contains("0.9137"));
    }

    #[test]
    fn test_log_sink_reports_empty_results() {
        let output = logged(&[]);

        assert!(output.contains("Retrieved Documents Count - 0"));
        assert!(output.contains("No search results found."));
        assert!(output.contains(RULE_HEAVY));
    }

    #[tokio::test]
    async fn test_missing_context_prints_empty_block() {
        let buffer = Arc::new(Mutex::new(Vec::<u8>::new()));
        let advisor = RetrievedDocumentsAdvisor::new(DocumentSink::Console(buffer.clone()));
        let mut request = ChatRequest::new("system", "question");
        advisor.before(&mut request).await.unwrap();

        let printed = String::from_utf8(buffer.lock().unwrap().clone()).unwrap();
        assert!(printed.contains("  No search results found."));
    }
}
