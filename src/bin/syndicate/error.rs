use syndicate::config::LoadError;
use syndicate::infra::error::InfraError;
use syndicate::query::QueryError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to load configuration: {0}")]
    Config(#[from] LoadError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("{0}")]
    Query(#[from] QueryError),
    #[error("failed to render output: {0}")]
    Output(#[from] serde_json::Error),
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl AppError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }
}
