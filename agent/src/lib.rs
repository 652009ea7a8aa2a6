mod agent;
mod error;
mod events;
pub mod llm;
pub mod tools;

pub use error::Error;
pub type Result<T> = std::result::Result<T, Error>;

pub use agent::{Agent, AgentBuilder, AgentRun, Budget, StopCondition};
pub use events::{AgentEvent, EventSink, RunStats};
