use crate::events::{AgentEvent, EventSink, RunStats};
use crate::llm;
use crate::llm::Message;
use crate::tools;
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

pub trait StopCondition {
    fn done(&self, history: &[llm::Message]) -> bool;
}

/// Ceilings for one run. Hitting either one ends the run with partial
/// results, it is not a failure.
#[derive(Debug, Clone, Copy)]
pub struct Budget {
    pub max_turns: u32,
    pub max_cost_usd: f64,
}

impl Default for Budget {
    fn default() -> Self {
        Self {
            max_turns: 50,
            max_cost_usd: 3.0,
        }
    }
}

pub struct AgentRun {
    pub messages: Vec<Message>,
    pub stats: RunStats,
}

type Tool = Box<dyn tools::Tool + Send>;

pub struct Agent {
    llm: Arc<dyn llm::LLM + Send + Sync>,
    tools: HashMap<String, Tool>,
    tool_defs: Vec<tools::ToolDefinition>,
    stop_condition: Box<dyn StopCondition + Send>,
    budget: Budget,
    events: EventSink,
}

impl Agent {
    async fn execute_tool_call(
        &mut self,
        tool_call: &tools::ToolCall,
        mut messages: Vec<llm::Message>,
    ) -> Result<Vec<llm::Message>> {
        let Some(tool) = self.tools.get_mut(&tool_call.name) else {
            messages.push(Message::Tool {
                id: tool_call.id.clone(),
                name: tool_call.name.clone(),
                result: format!("Error: tool {} does not exist", tool_call.name),
            });
            return Ok(messages);
        };

        tool.invoke(tool_call, messages).await
    }

    pub async fn run(&mut self, mut messages: Vec<Message>) -> Result<AgentRun> {
        let started = Instant::now();
        let mut stats = RunStats::default();

        while !self.stop_condition.done(&messages) {
            if stats.turns >= self.budget.max_turns || stats.cost_usd >= self.budget.max_cost_usd {
                tracing::info!(
                    turns = stats.turns,
                    cost_usd = stats.cost_usd,
                    "budget exhausted, ending run"
                );
                stats.budget_exhausted = true;
                break;
            }

            let next = self
                .llm
                .completion(llm::CompletionRequest {
                    messages: &messages,
                    tools: &self.tool_defs,
                })
                .await?;

            stats.turns += 1;
            stats.cost_usd += next.cost_usd;

            if !next.content.is_empty() {
                self.events.emit(AgentEvent::TextChunk(next.content.clone()));
            }

            messages.push(llm::Message::Assistant(
                next.content,
                next.tool_calls.clone(),
            ));

            for tool_call in &next.tool_calls {
                self.events.emit(AgentEvent::ToolRequested {
                    name: tool_call.name.clone(),
                    input: tool_call.input(),
                });
                messages = self.execute_tool_call(tool_call, messages).await?;
            }
        }

        stats.duration = started.elapsed();
        Ok(AgentRun { messages, stats })
    }
}

pub struct AgentBuilder {
    llm: Option<Arc<dyn llm::LLM + Send + Sync>>,
    tools: Vec<Tool>,
    stop_condition: Option<Box<dyn StopCondition + Send>>,
    budget: Budget,
    events: EventSink,
}

impl AgentBuilder {
    pub fn new() -> Self {
        Self {
            llm: None,
            tools: Vec::new(),
            stop_condition: None,
            budget: Budget::default(),
            events: EventSink::disabled(),
        }
    }

    pub fn llm(mut self, llm: Arc<dyn llm::LLM + Send + Sync>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn tool(mut self, tool: Tool) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn tools(mut self, tools: Vec<Tool>) -> Self {
        self.tools.extend(tools);
        self
    }

    pub fn budget(mut self, budget: Budget) -> Self {
        self.budget = budget;
        self
    }

    pub fn events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    pub fn stop_condition(mut self, cond: Box<dyn StopCondition + Send>) -> Self {
        self.stop_condition = Some(cond);
        self
    }

    pub fn build(self) -> Result<Agent> {
        let mut tool_defs = Vec::new();
        let mut tools = HashMap::new();

        for tool in self.tools {
            let def = tool.definition()?;
            tools.insert(def.name.clone(), tool);
            tool_defs.push(def);
        }

        Ok(Agent {
            llm: self
                .llm
                .ok_or(Error::MissingArg("llm is required for agent".to_string()))?,
            tools,
            tool_defs,
            stop_condition: self.stop_condition.ok_or(Error::MissingArg(
                "stop_condition is required for agent".to_string(),
            ))?,
            budget: self.budget,
            events: self.events,
        })
    }
}

impl Default for AgentBuilder {
    fn default() -> Self {
        Self::new()
    }
}
