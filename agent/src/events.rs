use std::time::Duration;

use tokio::sync::mpsc;

/// One ordered channel of everything that happens during a turn. Consumers
/// see events in production order; every turn ends with `Completed` or
/// `Failed`.
#[derive(Debug, Clone)]
pub enum AgentEvent {
    TextChunk(String),
    ToolRequested {
        name: String,
        input: serde_json::Value,
    },
    Completed(RunStats),
    Failed {
        error: String,
    },
}

#[derive(Debug, Clone, Default)]
pub struct RunStats {
    pub duration: Duration,
    pub cost_usd: f64,
    pub turns: u32,
    /// Set when the turn or cost ceiling ended the run before the stop
    /// condition was met. The run still completes with partial results.
    pub budget_exhausted: bool,
}

/// Fan-out point for agent events. A disabled sink drops everything, so the
/// agent loop emits unconditionally.
#[derive(Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::UnboundedSender<AgentEvent>>,
}

impl EventSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<AgentEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn emit(&self, event: AgentEvent) {
        if let Some(tx) = &self.tx {
            // A consumer that walked away is not an error for the agent.
            let _ = tx.send(event);
        }
    }
}
