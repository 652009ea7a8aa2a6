use std::time::Duration;

use agent::Budget;

/// Policy knobs for a research run. The content caps bound how much text a
/// single tool result feeds back into the model's context, they are not
/// correctness limits.
#[derive(Debug, Clone)]
pub struct Config {
    pub model: String,
    pub budget: Budget,
    /// Turns of history included in the transcript. Older turns fall off.
    pub history_window: usize,
    pub snippet_chars: usize,
    pub max_text_chars: usize,
    pub max_pages: usize,
    pub max_search_results: usize,
    pub fetch_timeout: Duration,
    /// How much of an existing report is embedded in the follow-up prompt.
    pub report_context_chars: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: "gpt-4o".to_string(),
            budget: Budget::default(),
            history_window: 10,
            snippet_chars: 500,
            max_text_chars: 50_000,
            max_pages: 20,
            max_search_results: 20,
            fetch_timeout: Duration::from_secs(30),
            report_context_chars: 10_000,
        }
    }
}
