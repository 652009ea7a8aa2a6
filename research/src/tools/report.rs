use std::sync::Arc;

use agent::llm::Message;
use agent::tools::{FunctionalTool, ToolCall, ToolDefinition};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;

use super::tool_message;
use crate::session::Session;

pub struct WriteReport {
    session: Arc<Session>,
}

#[derive(Deserialize, JsonSchema)]
struct WriteReportArgs {
    /// Full markdown body of the report.
    content: String,
    /// Report title (default "Research Report").
    title: Option<String>,
}

impl WriteReport {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }
}

#[async_trait]
impl FunctionalTool for WriteReport {
    fn definition(&self) -> agent::Result<ToolDefinition> {
        ToolDefinition::new::<WriteReportArgs>(
            "write_report",
            "Write the final markdown research report into the session. Call \
             this once research is complete; writing again replaces the report.",
        )
    }

    async fn invoke_fn(&mut self, call: &ToolCall) -> agent::Result<Message> {
        let args: WriteReportArgs = call.args()?;
        let title = args.title.unwrap_or_else(|| "Research Report".to_string());

        let payload = match self.session.write_report(&args.content, &title) {
            Ok(path) => serde_json::json!({
                "saved": "report.md",
                "path": path.display().to_string(),
            }),
            Err(err) => serde_json::json!({"error": err.to_string()}),
        };

        tool_message(call, &payload)
    }
}
