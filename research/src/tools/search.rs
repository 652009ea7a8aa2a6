use std::sync::Arc;

use agent::llm::Message;
use agent::tools::{FunctionalTool, ToolCall, ToolDefinition};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;

use super::{tool_message, truncate_chars};
use crate::config::Config;
use crate::search::SearchProvider;

pub struct WebSearch {
    provider: Arc<dyn SearchProvider>,
    snippet_chars: usize,
    max_results_cap: usize,
}

#[derive(Deserialize, JsonSchema)]
struct WebSearchArgs {
    /// The search query.
    query: String,
    /// Maximum results to return (default 10).
    max_results: Option<usize>,
}

impl WebSearch {
    pub fn new(provider: Arc<dyn SearchProvider>, config: &Config) -> Self {
        Self {
            provider,
            snippet_chars: config.snippet_chars,
            max_results_cap: config.max_search_results,
        }
    }
}

#[async_trait]
impl FunctionalTool for WebSearch {
    fn definition(&self) -> agent::Result<ToolDefinition> {
        ToolDefinition::new::<WebSearchArgs>(
            "web_search",
            "Search the web for research papers and academic articles on a topic. \
             Returns titles, URLs, and snippets from academic sources.",
        )
    }

    async fn invoke_fn(&mut self, call: &ToolCall) -> agent::Result<Message> {
        let args: WebSearchArgs = call.args()?;
        let max_results = args.max_results.unwrap_or(10).min(self.max_results_cap);

        // A failed search is data, not an abort: the model can rephrase.
        let payload = match self.provider.search(&args.query, max_results).await {
            Ok(hits) => {
                let results: Vec<serde_json::Value> = hits
                    .iter()
                    .map(|hit| {
                        serde_json::json!({
                            "title": hit.title,
                            "url": hit.url,
                            "snippet": truncate_chars(&hit.snippet, self.snippet_chars),
                        })
                    })
                    .collect();
                serde_json::json!({
                    "query": args.query,
                    "count": results.len(),
                    "results": results,
                })
            }
            Err(err) => {
                tracing::warn!(query = %args.query, error = %err, "search failed");
                serde_json::json!({
                    "query": args.query,
                    "error": err.to_string(),
                    "results": [],
                })
            }
        };

        tool_message(call, &payload)
    }
}
