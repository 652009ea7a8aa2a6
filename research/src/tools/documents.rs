use std::sync::Arc;

use agent::llm::Message;
use agent::tools::{FunctionalTool, ToolCall, ToolDefinition};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;

use super::{tool_message, truncate_chars};
use crate::config::Config;
use crate::fetch::Fetcher;
use crate::session::Session;

pub struct DownloadPapers {
    session: Arc<Session>,
    fetcher: Arc<dyn Fetcher>,
}

#[derive(Deserialize, JsonSchema)]
struct DownloadArgs {
    /// Document URLs to download into the session.
    urls: Vec<String>,
}

impl DownloadPapers {
    pub fn new(session: Arc<Session>, fetcher: Arc<dyn Fetcher>) -> Self {
        Self { session, fetcher }
    }

    async fn download_one(&self, url: &str) -> Result<String, String> {
        let bytes = self
            .fetcher
            .fetch(url)
            .await
            .map_err(|err| err.to_string())?;

        // Landing pages and error bodies are not papers.
        if !bytes.starts_with(b"%PDF") && !url.to_ascii_lowercase().ends_with(".pdf") {
            return Err("not a PDF".to_string());
        }

        self.session
            .save_paper(url, &bytes)
            .map_err(|err| err.to_string())
    }
}

#[async_trait]
impl FunctionalTool for DownloadPapers {
    fn definition(&self) -> agent::Result<ToolDefinition> {
        ToolDefinition::new::<DownloadArgs>(
            "download_papers",
            "Download PDF documents from URLs into the session's pdfs folder. \
             Reports per-URL success and failure.",
        )
    }

    async fn invoke_fn(&mut self, call: &ToolCall) -> agent::Result<Message> {
        let args: DownloadArgs = call.args()?;

        let mut succeeded = Vec::new();
        let mut failed = Vec::new();

        // Per-URL isolation: one bad link never sinks the batch.
        for url in &args.urls {
            match self.download_one(url).await {
                Ok(filename) => succeeded.push(filename),
                Err(reason) => {
                    tracing::warn!(url = %url, reason = %reason, "download failed");
                    failed.push(serde_json::json!({"url": url, "reason": reason}));
                }
            }
        }

        tool_message(
            call,
            &serde_json::json!({
                "succeeded": succeeded,
                "failed": failed,
            }),
        )
    }
}

pub struct ReadDocument {
    session: Arc<Session>,
    max_pages: usize,
    max_text_chars: usize,
}

#[derive(Deserialize, JsonSchema)]
struct ReadArgs {
    /// Filename of a downloaded document in the session.
    filename: String,
    /// Maximum pages to extract (default 20).
    max_pages: Option<usize>,
}

impl ReadDocument {
    pub fn new(session: Arc<Session>, config: &Config) -> Self {
        Self {
            session,
            max_pages: config.max_pages,
            max_text_chars: config.max_text_chars,
        }
    }
}

#[async_trait]
impl FunctionalTool for ReadDocument {
    fn definition(&self) -> agent::Result<ToolDefinition> {
        ToolDefinition::new::<ReadArgs>(
            "read_document",
            "Extract text from a downloaded PDF, organized by page. Use after \
             download_papers to analyze a paper's content.",
        )
    }

    async fn invoke_fn(&mut self, call: &ToolCall) -> agent::Result<Message> {
        let args: ReadArgs = call.args()?;

        let mut filename = args.filename;
        if !filename.to_ascii_lowercase().ends_with(".pdf") {
            filename.push_str(".pdf");
        }

        let bytes = match self.session.read_paper(&filename) {
            Ok(bytes) => bytes,
            Err(err) => {
                return tool_message(
                    call,
                    &serde_json::json!({"filename": filename, "error": err.to_string()}),
                );
            }
        };

        let doc = match lopdf::Document::load_mem(&bytes) {
            Ok(doc) => doc,
            Err(err) => {
                return tool_message(
                    call,
                    &serde_json::json!({
                        "filename": filename,
                        "error": format!("could not parse document: {err}"),
                    }),
                );
            }
        };

        let pages = doc.get_pages();
        let page_count = pages.len();
        let max_pages = args.max_pages.unwrap_or(self.max_pages);

        let mut sections = Vec::new();
        for (number, _) in pages.iter().take(max_pages) {
            // A page that fails extraction is skipped, not fatal.
            match doc.extract_text(&[*number]) {
                Ok(text) if !text.trim().is_empty() => {
                    sections.push(format!("--- Page {number} ---\n{text}"));
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::debug!(file = %filename, page = number, error = %err, "page extraction failed");
                }
            }
        }

        if sections.is_empty() {
            return tool_message(
                call,
                &serde_json::json!({
                    "filename": filename,
                    "page_count": page_count,
                    "error": "no text could be extracted; the document may be image-based or encrypted",
                }),
            );
        }

        tool_message(
            call,
            &serde_json::json!({
                "filename": filename,
                "page_count": page_count,
                // Only pages that actually yielded text.
                "pages_read": sections.len(),
                "text": truncate_chars(&sections.join("\n\n"), self.max_text_chars),
            }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{StaticFetcher, call, payload, sample_pdf, sample_pdf_pages};
    use std::collections::HashMap;

    fn session() -> (tempfile::TempDir, Arc<Session>) {
        let base = tempfile::tempdir().unwrap();
        let session = Arc::new(Session::create("docs", base.path()).unwrap());
        (base, session)
    }

    #[tokio::test]
    async fn test_download_partitions_results() -> agent::Result<()> {
        let (_base, session) = session();
        let mut bodies = HashMap::new();
        bodies.insert("https://arxiv.org/a.pdf".to_string(), sample_pdf("alpha"));
        bodies.insert("https://arxiv.org/b.pdf".to_string(), sample_pdf("beta"));

        let mut tool = DownloadPapers::new(
            session.clone(),
            Arc::new(StaticFetcher {
                bodies,
                failure: "HTTP 404".to_string(),
            }),
        );

        let message = tool
            .invoke_fn(&call(
                "download_papers",
                serde_json::json!({"urls": [
                    "https://arxiv.org/a.pdf",
                    "https://arxiv.org/missing.pdf",
                    "https://arxiv.org/b.pdf",
                ]}),
            ))
            .await?;
        let value = payload(&message);

        assert_eq!(value["succeeded"].as_array().unwrap().len(), 2);
        assert_eq!(value["failed"].as_array().unwrap().len(), 1);
        assert_eq!(value["failed"][0]["reason"], "HTTP 404");
        assert_eq!(session.list_papers().unwrap().len(), 2);

        Ok(())
    }

    #[tokio::test]
    async fn test_download_rejects_non_pdf_body() -> agent::Result<()> {
        let (_base, session) = session();
        let mut bodies = HashMap::new();
        bodies.insert(
            "https://example.org/page".to_string(),
            b"<html>hi</html>".to_vec(),
        );

        let mut tool = DownloadPapers::new(
            session,
            Arc::new(StaticFetcher {
                bodies,
                failure: "HTTP 404".to_string(),
            }),
        );

        let message = tool
            .invoke_fn(&call(
                "download_papers",
                serde_json::json!({"urls": ["https://example.org/page"]}),
            ))
            .await?;
        let value = payload(&message);

        assert_eq!(value["failed"][0]["reason"], "not a PDF");

        Ok(())
    }

    #[tokio::test]
    async fn test_read_document_extracts_text() -> agent::Result<()> {
        let (_base, session) = session();
        session
            .save_paper("https://arxiv.org/a.pdf", &sample_pdf("attention is all"))
            .unwrap();

        let mut tool = ReadDocument::new(session, &Config::default());

        let message = tool
            .invoke_fn(&call("read_document", serde_json::json!({"filename": "a.pdf"})))
            .await?;
        let value = payload(&message);

        assert_eq!(value["page_count"], 1);
        assert_eq!(value["pages_read"], 1);
        assert!(value["text"].as_str().unwrap().contains("attention is all"));

        Ok(())
    }

    #[tokio::test]
    async fn test_read_document_truncates_long_text() -> agent::Result<()> {
        let (_base, session) = session();
        let long = "attention is all you need ".repeat(40);
        session
            .save_paper("https://arxiv.org/long.pdf", &sample_pdf(&long))
            .unwrap();

        let mut tool = ReadDocument::new(
            session,
            &Config {
                max_text_chars: 80,
                ..Config::default()
            },
        );

        let message = tool
            .invoke_fn(&call(
                "read_document",
                serde_json::json!({"filename": "long.pdf"}),
            ))
            .await?;
        let text = payload(&message)["text"].as_str().unwrap().to_string();

        assert!(text.ends_with("[... truncated ...]"));
        assert!(text.chars().count() < long.chars().count());

        Ok(())
    }

    #[tokio::test]
    async fn test_read_document_counts_only_pages_with_text() -> agent::Result<()> {
        let (_base, session) = session();
        session
            .save_paper(
                "https://arxiv.org/sparse.pdf",
                &sample_pdf_pages(&["alpha text", ""]),
            )
            .unwrap();

        let mut tool = ReadDocument::new(session, &Config::default());

        let message = tool
            .invoke_fn(&call(
                "read_document",
                serde_json::json!({"filename": "sparse.pdf"}),
            ))
            .await?;
        let value = payload(&message);

        assert_eq!(value["page_count"], 2);
        // The blank page contributes nothing and is not counted as read.
        assert_eq!(value["pages_read"], 1);
        assert!(value["text"].as_str().unwrap().contains("alpha text"));

        Ok(())
    }

    #[tokio::test]
    async fn test_read_document_appends_extension() -> agent::Result<()> {
        let (_base, session) = session();
        session
            .save_paper("https://arxiv.org/a.pdf", &sample_pdf("x"))
            .unwrap();

        let mut tool = ReadDocument::new(session, &Config::default());

        let message = tool
            .invoke_fn(&call("read_document", serde_json::json!({"filename": "a"})))
            .await?;

        assert_eq!(payload(&message)["filename"], "a.pdf");

        Ok(())
    }

    #[tokio::test]
    async fn test_read_document_missing_file() -> agent::Result<()> {
        let (_base, session) = session();
        let mut tool = ReadDocument::new(session, &Config::default());

        let message = tool
            .invoke_fn(&call(
                "read_document",
                serde_json::json!({"filename": "absent.pdf"}),
            ))
            .await?;

        assert!(
            payload(&message)["error"]
                .as_str()
                .unwrap()
                .contains("not found")
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_read_document_unreadable_file() -> agent::Result<()> {
        let (_base, session) = session();
        session
            .save_paper("https://arxiv.org/junk.pdf", b"%PDF-but not really")
            .unwrap();

        let mut tool = ReadDocument::new(session, &Config::default());

        let message = tool
            .invoke_fn(&call(
                "read_document",
                serde_json::json!({"filename": "junk.pdf"}),
            ))
            .await?;

        assert!(
            payload(&message)["error"]
                .as_str()
                .unwrap()
                .contains("could not parse")
        );

        Ok(())
    }
}
