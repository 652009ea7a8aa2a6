use std::sync::Arc;

use agent::llm::Message;
use agent::tools::{FunctionalTool, ToolCall, ToolDefinition};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;

use super::tool_message;
use crate::session::{Note, Session};

pub struct SaveNote {
    session: Arc<Session>,
}

#[derive(Deserialize, JsonSchema)]
struct SaveNoteArgs {
    /// Brief title for the note.
    title: String,
    /// The detailed note content.
    content: String,
    /// Kind of note, e.g. "finding", "summary", "insight" (default "finding").
    note_type: Option<String>,
    /// Source paper filename or URL.
    source: Option<String>,
}

impl SaveNote {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }
}

#[async_trait]
impl FunctionalTool for SaveNote {
    fn definition(&self) -> agent::Result<ToolDefinition> {
        ToolDefinition::new::<SaveNoteArgs>(
            "save_note",
            "Save a research note to track findings, paper summaries, and \
             insights for later synthesis into the report.",
        )
    }

    async fn invoke_fn(&mut self, call: &ToolCall) -> agent::Result<Message> {
        let args: SaveNoteArgs = call.args()?;

        let note = Note::new(
            args.title,
            args.content,
            args.note_type.unwrap_or_else(|| "finding".to_string()),
            args.source.unwrap_or_default(),
        );

        let payload = match self.session.save_note(&note) {
            Ok(filename) => serde_json::json!({"saved": filename, "title": note.title}),
            Err(err) => serde_json::json!({"error": err.to_string(), "title": note.title}),
        };

        tool_message(call, &payload)
    }
}

pub struct ListNotes {
    session: Arc<Session>,
}

#[derive(Deserialize, JsonSchema)]
struct ListNotesArgs {}

impl ListNotes {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }
}

#[async_trait]
impl FunctionalTool for ListNotes {
    fn definition(&self) -> agent::Result<ToolDefinition> {
        ToolDefinition::new::<ListNotesArgs>(
            "list_notes",
            "Read back every saved research note. Use before writing the \
             report to gather all findings.",
        )
    }

    async fn invoke_fn(&mut self, call: &ToolCall) -> agent::Result<Message> {
        let payload = match self.session.list_notes() {
            Ok(notes) => serde_json::json!({
                "count": notes.len(),
                "notes": notes,
            }),
            Err(err) => serde_json::json!({"error": err.to_string(), "notes": []}),
        };

        tool_message(call, &payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Session;
    use crate::tools::testing::{call, payload};

    #[tokio::test]
    async fn test_save_and_list_notes() -> agent::Result<()> {
        let base = tempfile::tempdir().unwrap();
        let session = Arc::new(Session::create("notes", base.path()).unwrap());

        let mut list = ListNotes::new(session.clone());
        let empty = payload(&list.invoke_fn(&call("list_notes", serde_json::json!({}))).await?);
        assert_eq!(empty["count"], 0);
        assert_eq!(empty["notes"].as_array().unwrap().len(), 0);

        let mut save = SaveNote::new(session.clone());
        let saved = payload(
            &save
                .invoke_fn(&call(
                    "save_note",
                    serde_json::json!({
                        "title": "Scaling laws",
                        "content": "loss falls as a power law",
                        "note_type": "insight",
                        "source": "2001.08361.pdf",
                    }),
                ))
                .await?,
        );
        assert_eq!(saved["title"], "Scaling laws");
        assert!(saved["saved"].as_str().unwrap().ends_with(".json"));

        // note_type and source default when omitted
        save.invoke_fn(&call(
            "save_note",
            serde_json::json!({"title": "Second", "content": "body"}),
        ))
        .await?;

        let listed = payload(&list.invoke_fn(&call("list_notes", serde_json::json!({}))).await?);
        assert_eq!(listed["count"], 2);

        let types: Vec<&str> = listed["notes"]
            .as_array()
            .unwrap()
            .iter()
            .map(|n| n["type"].as_str().unwrap())
            .collect();
        assert!(types.contains(&"insight"));
        assert!(types.contains(&"finding"));

        Ok(())
    }
}
