use thiserror::Error;

pub type Result<T> = std::result::Result<T, GraphError>;

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Thread not found: {0}")]
    ThreadNotFound(String),

    #[error("Invalid inference config: {0}")]
    InvalidConfig(String),
}
