use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("{0} not found")]
    NotFound(String),

    #[error("provider error: {0}")]
    Provider(String),

    #[error("agent error: {0}")]
    Agent(#[from] agent::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
