use std::sync::Arc;

use agent::llm::Message;
use agent::tools::{Tool, ToolCall};

use crate::config::Config;
use crate::fetch::Fetcher;
use crate::search::SearchProvider;
use crate::session::Session;

mod documents;
mod notes;
mod report;
mod search;

pub use documents::{DownloadPapers, ReadDocument};
pub use notes::{ListNotes, SaveNote};
pub use report::WriteReport;
pub use search::WebSearch;

/// The full research tool set, each tool bound to the session handle for the
/// lifetime of one conversation turn.
pub fn research_tools(
    session: Arc<Session>,
    search: Arc<dyn SearchProvider>,
    fetcher: Arc<dyn Fetcher>,
    config: &Config,
) -> Vec<Box<dyn Tool + Send>> {
    vec![
        Box::new(WebSearch::new(search, config)),
        Box::new(DownloadPapers::new(session.clone(), fetcher)),
        Box::new(ReadDocument::new(session.clone(), config)),
        Box::new(SaveNote::new(session.clone())),
        Box::new(ListNotes::new(session.clone())),
        Box::new(WriteReport::new(session)),
    ]
}

// Every tool answers with a JSON payload, success or not. Failures stay
// inside the payload so the model can adapt instead of the turn aborting.
fn tool_message(call: &ToolCall, payload: &serde_json::Value) -> agent::Result<Message> {
    Ok(Message::Tool {
        id: call.id.clone(),
        name: call.name.clone(),
        result: serde_json::to_string_pretty(payload)?,
    })
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push_str("\n\n[... truncated ...]");
    out
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::error::{Error, Result};
    use crate::search::SearchHit;
    use async_trait::async_trait;
    use std::collections::HashMap;

    pub fn call(name: &str, args: serde_json::Value) -> ToolCall {
        ToolCall {
            id: "call1".to_string(),
            name: name.to_string(),
            args: args.to_string(),
        }
    }

    pub fn payload(message: &Message) -> serde_json::Value {
        match message {
            Message::Tool { result, .. } => serde_json::from_str(result).expect("json payload"),
            other => panic!("expected tool message, got {other:?}"),
        }
    }

    pub struct StaticSearch(pub Vec<SearchHit>);

    #[async_trait]
    impl SearchProvider for StaticSearch {
        async fn search(&self, _: &str, max_results: usize) -> Result<Vec<SearchHit>> {
            Ok(self.0.iter().take(max_results).cloned().collect())
        }
    }

    pub struct FailingSearch;

    #[async_trait]
    impl SearchProvider for FailingSearch {
        async fn search(&self, _: &str, _: usize) -> Result<Vec<SearchHit>> {
            Err(Error::Provider("timeout".to_string()))
        }
    }

    /// A one-page PDF containing `text`, built the way lopdf's own examples
    /// build documents.
    pub fn sample_pdf(text: &str) -> Vec<u8> {
        sample_pdf_pages(&[text])
    }

    /// One page per entry; an empty entry produces a page with no text.
    pub fn sample_pdf_pages(texts: &[&str]) -> Vec<u8> {
        use lopdf::content::{Content, Operation};
        use lopdf::{Document, Object, Stream, dictionary};

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids: Vec<Object> = Vec::new();
        for text in texts {
            let mut operations = vec![Operation::new("BT", vec![])];
            if !text.is_empty() {
                operations.push(Operation::new("Tf", vec!["F1".into(), 12.into()]));
                operations.push(Operation::new("Td", vec![100.into(), 600.into()]));
                operations.push(Operation::new("Tj", vec![Object::string_literal(*text)]));
            }
            operations.push(Operation::new("ET", vec![]));

            let content_id = doc.add_object(Stream::new(
                dictionary! {},
                Content { operations }.encode().expect("encode content"),
            ));
            kids.push(
                doc.add_object(dictionary! {
                    "Type" => "Page",
                    "Parent" => pages_id,
                    "Contents" => content_id,
                })
                .into(),
            );
        }

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => texts.len() as i64,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).expect("serialize pdf");
        buffer
    }

    /// Serves canned bodies per URL; unknown URLs fail with the given reason.
    pub struct StaticFetcher {
        pub bodies: HashMap<String, Vec<u8>>,
        pub failure: String,
    }

    #[async_trait]
    impl Fetcher for StaticFetcher {
        async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
            self.bodies
                .get(url)
                .cloned()
                .ok_or_else(|| Error::Provider(self.failure.clone()))
        }
    }
}
