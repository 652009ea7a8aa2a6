use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use agent::llm::{LLM, Message};
use agent::{AgentBuilder, AgentEvent, EventSink, RunStats, StopCondition};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::fetch::{Fetcher, HttpFetcher};
use crate::search::{SearchProvider, TavilySearch};
use crate::session::Session;
use crate::tools::research_tools;

const RESEARCH_PROMPT: &str = include_str!("prompts/research.md");
const FOLLOWUP_PROMPT: &str = include_str!("prompts/followup.md");
const AUTONOMOUS_PROMPT: &str = include_str!("prompts/autonomous.md");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatMode {
    /// Fresh research with the full tool set.
    Research,
    /// Q&A over a completed session; no tools, the report is in the prompt.
    FollowUp,
}

pub struct ChatRequest {
    pub message: String,
    pub history: Vec<ChatTurn>,
    pub mode: ChatMode,
    /// Reused when present; otherwise a session is created under `base_dir`
    /// with the message as its topic.
    pub session: Option<Arc<Session>>,
    pub base_dir: PathBuf,
}

/// The turn is over once the assistant answers without asking for tools.
struct ReplyWithoutTools;

impl StopCondition for ReplyWithoutTools {
    fn done(&self, history: &[Message]) -> bool {
        matches!(history.last(), Some(Message::Assistant(_, tool_calls)) if tool_calls.is_empty())
    }
}

pub struct ResearchOutcome {
    pub root: PathBuf,
    pub reply: String,
    pub stats: RunStats,
    /// Populated when the turn ended in `Failed` rather than `Completed`.
    pub error: Option<String>,
}

/// Turns one user message into one agent run and exposes the run as an
/// ordered event stream. Each turn gets its own session-bound tool set;
/// nothing is shared between turns except the session directory itself.
pub struct Driver {
    config: Config,
    llm: Arc<dyn LLM + Send + Sync>,
    search: Arc<dyn SearchProvider>,
    fetcher: Arc<dyn Fetcher>,
}

impl Driver {
    pub fn new(
        config: Config,
        llm: Arc<dyn LLM + Send + Sync>,
        search: Arc<dyn SearchProvider>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Self {
        Self {
            config,
            llm,
            search,
            fetcher,
        }
    }

    pub fn from_env(config: Config) -> Result<Self> {
        if std::env::var("OPENAI_API_KEY").is_err() {
            return Err(Error::Provider("OPENAI_API_KEY is not set".to_string()));
        }

        let llm = agent::llm::OpenAI::new(config.model.clone());
        let search = Arc::new(TavilySearch::from_env(config.fetch_timeout)?);
        let fetcher = Arc::new(HttpFetcher::new(config.fetch_timeout)?);

        Ok(Self::new(config, llm, search, fetcher))
    }

    /// Starts one conversation turn. The returned stream yields events in
    /// production order and always ends with `Completed` or `Failed`.
    pub fn chat(
        &self,
        request: ChatRequest,
    ) -> Result<(Arc<Session>, UnboundedReceiverStream<AgentEvent>)> {
        let session = match request.session {
            Some(session) => session,
            None => {
                let session = Session::create(&request.message, &request.base_dir)?;
                session.write_metadata(&self.config.model)?;
                Arc::new(session)
            }
        };

        let system = match request.mode {
            ChatMode::Research => RESEARCH_PROMPT.to_string(),
            ChatMode::FollowUp => self.followup_prompt(&session),
        };

        let tools = match request.mode {
            ChatMode::Research => research_tools(
                session.clone(),
                self.search.clone(),
                self.fetcher.clone(),
                &self.config,
            ),
            ChatMode::FollowUp => Vec::new(),
        };

        let transcript = build_transcript(
            &request.history,
            &request.message,
            self.config.history_window,
        );

        let messages = vec![Message::System(system), Message::User(transcript)];

        let (sink, rx) = EventSink::channel();

        let mut agent = AgentBuilder::new()
            .llm(self.llm.clone())
            .tools(tools)
            .budget(self.config.budget)
            .events(sink.clone())
            .stop_condition(Box::new(ReplyWithoutTools))
            .build()?;

        tokio::spawn(async move {
            match agent.run(messages).await {
                Ok(run) => sink.emit(AgentEvent::Completed(run.stats)),
                Err(err) => {
                    tracing::error!(error = %err, "conversation turn failed");
                    sink.emit(AgentEvent::Failed {
                        error: err.to_string(),
                    });
                }
            }
        });

        Ok((session, UnboundedReceiverStream::new(rx)))
    }

    /// One autonomous research request, driven to completion. Tool activity
    /// is tallied into the session's `completion.json`.
    pub async fn run_research(&self, topic: &str, base_dir: &Path) -> Result<ResearchOutcome> {
        let session = Session::create(topic, base_dir)?;
        session.write_metadata(&self.config.model)?;

        let (session, events) = self.chat(ChatRequest {
            message: AUTONOMOUS_PROMPT.replace("{topic}", topic),
            history: Vec::new(),
            mode: ChatMode::Research,
            session: Some(Arc::new(session)),
            base_dir: base_dir.to_path_buf(),
        })?;

        let (reply, tool_counts, stats, error) = collect_run(events.into_inner()).await;

        session.write_completion(&serde_json::json!({
            "searches": tool_counts.get("web_search").copied().unwrap_or(0),
            "downloads": tool_counts.get("download_papers").copied().unwrap_or(0),
            "reads": tool_counts.get("read_document").copied().unwrap_or(0),
            "notes": tool_counts.get("save_note").copied().unwrap_or(0),
            "report": tool_counts.contains_key("write_report"),
            "turns": stats.turns,
            "cost_usd": stats.cost_usd,
        }))?;

        Ok(ResearchOutcome {
            root: session.root().to_path_buf(),
            reply,
            stats,
            error,
        })
    }

    fn followup_prompt(&self, session: &Session) -> String {
        let report = session
            .read_report()
            .map(|report| truncate_prompt(&report, self.config.report_context_chars))
            .unwrap_or_else(|| "No report available.".to_string());

        let papers = match session.list_papers() {
            Ok(papers) if !papers.is_empty() => papers
                .iter()
                .map(|name| format!("- {name}"))
                .collect::<Vec<_>>()
                .join("\n"),
            _ => "No papers downloaded.".to_string(),
        };

        FOLLOWUP_PROMPT
            .replace("{report}", &report)
            .replace("{papers}", &papers)
    }
}

async fn collect_run(
    mut rx: UnboundedReceiver<AgentEvent>,
) -> (String, HashMap<String, u32>, RunStats, Option<String>) {
    let mut reply = String::new();
    let mut tool_counts: HashMap<String, u32> = HashMap::new();
    let mut stats = RunStats::default();
    let mut error = None;

    while let Some(event) = rx.recv().await {
        match event {
            AgentEvent::TextChunk(text) => reply.push_str(&text),
            AgentEvent::ToolRequested { name, .. } => {
                *tool_counts.entry(name).or_insert(0) += 1;
            }
            AgentEvent::Completed(run_stats) => stats = run_stats,
            AgentEvent::Failed { error: err } => error = Some(err),
        }
    }

    (reply, tool_counts, stats, error)
}

fn build_transcript(history: &[ChatTurn], message: &str, window: usize) -> String {
    let mut transcript = String::new();
    let start = history.len().saturating_sub(window);

    for turn in &history[start..] {
        let role = match turn.role {
            Role::User => "User",
            Role::Assistant => "Assistant",
        };
        transcript.push_str(&format!("{role}: {}\n\n", turn.content));
    }

    transcript.push_str(&format!("User: {message}"));
    transcript
}

fn truncate_prompt(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        text.chars().take(max_chars).collect()
    }
}
